//! # Vitals Hub
//!
//! Real-time patient telemetry fan-out hub: ingests vital-sign streams from
//! bedside devices over WebSocket and fans them out to any number of
//! monitoring dashboards, with per-patient liveness tracking and graceful
//! disconnect semantics.
//!
//! ## Architecture
//!
//! - **domain**: Patient records, vital samples, liveness, error types
//! - **protocol**: JSON wire frames and identifier canonicalization
//! - **application**: The hub event loop, fan-out router, patient table,
//!   grace scheduler and session registry
//! - **interfaces**: The WebSocket edge and the HTTP status surface
//! - **shared**: Graceful shutdown coordination

pub mod application;
pub mod config;
pub mod domain;
pub mod interfaces;
pub mod protocol;
pub mod shared;

pub use application::hub::{Hub, HubEvent, HubHandle, HubOptions};
pub use application::session::{Role, SessionRegistry, SharedSessionRegistry};
pub use config::{default_config_path, AppConfig};
pub use domain::{HubError, HubResult};
pub use interfaces::http::{create_api_router, ApiState};
pub use interfaces::ws::TelemetryServer;
pub use shared::ShutdownSignal;
