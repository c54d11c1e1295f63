//! CSV series extraction and transforms for the plot viewer

pub mod config;
pub mod scale;
pub mod series;
pub mod sources;
pub mod transform;

use std::path::PathBuf;
use pv_core::CoreError;
use tokio::task::JoinError;
use thiserror::Error;

// Re-exports
pub use config::CsvOptions;
pub use scale::ScaleName;
pub use series::{Point, Series, SeriesBounds};
pub use sources::CsvSeriesExtractor;
pub use transform::{Transform, TransformRegistry};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("row {row} has neither column '{x_column}' nor column '{y_column}'")]
    MalformedRow {
        row: usize,
        x_column: String,
        y_column: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<DataError> for CoreError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::NotFound(path) => CoreError::not_found("file", path.display()),
            DataError::MalformedRow { .. } | DataError::Csv(_) => CoreError::MalformedInput(error.to_string()),
            DataError::InvalidOption(msg) => CoreError::ValidationFailed(msg),
            DataError::Io(_) | DataError::Join(_) => CoreError::Storage(error.to_string()),
        }
    }
}
