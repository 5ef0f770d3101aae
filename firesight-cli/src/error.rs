//! CLI error type and exit codes.

use thiserror::Error;

use firesight::FetchError;

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum CliError {
    /// Request arguments were rejected before any work happened.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Imagery is not currently available from any candidate layer.
    ///
    /// This is an upstream condition, not a fault in the tool.
    #[error("imagery not currently available: {0}")]
    Unavailable(String),

    /// Cache setup or maintenance failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(String),

    /// Could not write the fetched image to the output path.
    #[error("failed to write output: {0}")]
    Output(String),

    /// Could not load the layer catalog file.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// The run was cancelled before completing.
    #[error("cancelled")]
    Cancelled,
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// `2` marks "no imagery available", so scripts can distinguish an
    /// upstream data gap from a real failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Unavailable(_) => 2,
            CliError::Cancelled => 130,
            _ => 1,
        }
    }
}

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidRequest(e) => CliError::InvalidRequest(e.to_string()),
            FetchError::UnsupportedProduct(e) => CliError::InvalidRequest(e.to_string()),
            FetchError::Exhausted(e) => CliError::Unavailable(e.to_string()),
            FetchError::Cancelled => CliError::Cancelled,
        }
    }
}
