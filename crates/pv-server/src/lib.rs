//! HTTP server for CSV files, views and saved zooms

pub mod config;
pub mod error;
pub mod routes;
pub mod service;

pub use config::{Cli, ServerConfig, StorageConfig};
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use service::{PlotService, Stores, Upload};
