pub mod server;

pub use server::TelemetryServer;
