pub mod config;
pub mod deploy;
pub mod error;
pub mod http;
pub mod logging;
pub mod service;

pub use config::{ConfigError, DatabaseLocation, ServerConfig};
pub use error::ApiError;
pub use http::router;
pub use service::{ContractService, ServiceError};
