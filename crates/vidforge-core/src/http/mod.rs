pub mod api;
mod error;
mod router;
mod server;

pub use error::ApiError;
pub use router::build_router;
pub use server::HttpServer;
