pub mod audit;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod tickets;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
