pub mod handlers;
pub mod router;

pub use handlers::ApiState;
pub use router::create_api_router;
