use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export type is not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Conversion failed: {0}")]
    ConversionFailure(String),

    #[error("Malformed data url: {0}")]
    MalformedDataUrl(String),

    #[error("Target element not found: {0}")]
    TargetNotFound(String),

    #[error("Element is not a table: {0}")]
    NotATable(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export task failed: {0}")]
    TaskFailed(String),
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::InvalidOptions(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::ConversionFailure(format!("Xlsx: {e}"))
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::ConversionFailure(format!("Csv: {e}"))
    }
}

impl From<tokio::task::JoinError> for ExportError {
    fn from(e: tokio::task::JoinError) -> Self {
        ExportError::TaskFailed(e.to_string())
    }
}
