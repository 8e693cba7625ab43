//! Export functionality for collection worksheets and dose curves.

mod curve;
mod worksheet;

pub use curve::*;
pub use worksheet::*;

use thiserror::Error;

use crate::engine::DoseError;

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Calculation error: {0}")]
    Engine(#[from] DoseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;
