use std::time::Duration;

/// Job-fatal errors: the presentation could not be loaded or the output could not be written.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid PPTX: {0}")]
    InvalidPptx(String),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors scoped to a single slide. Never abort the job.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SlideError {
    /// Expected structural elements are missing or malformed.
    #[error("schema error: {0}")]
    Schema(String),
    /// The operation is not supported by this shape variant.
    #[error("structural error: {0}")]
    Structural(String),
}

/// Failure of one call to the translation collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("translation service error: {0}")]
    Service(String),
    #[error("translation timed out after {0:?}")]
    Timeout(Duration),
}
