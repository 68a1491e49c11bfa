pub mod config;
mod conversion_routes;
pub mod error;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use conversion_routes::{ConvertRequest, ConvertResponse};
pub use error::{ApiError, ErrorResponse};
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
