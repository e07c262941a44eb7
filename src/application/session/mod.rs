pub mod connection;
pub mod registry;

pub use connection::{Connection, Role};
pub use registry::{SessionRegistry, SharedSessionRegistry};
