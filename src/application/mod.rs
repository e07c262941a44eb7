pub mod hub;
pub mod session;

pub use hub::{Hub, HubEvent, HubHandle, HubOptions};
pub use session::{Connection, Role, SessionRegistry, SharedSessionRegistry};
