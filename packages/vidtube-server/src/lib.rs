pub mod accounts;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod media;
pub mod response;
pub mod routes;
pub mod state;
pub mod storage;

pub use config::ServerConfig;
pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::build_router;
pub use state::ServerState;
