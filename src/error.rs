//! Error types for the rename pipeline.
//!
//! Per-item failures (`ExtractError`, `ProviderError`) are caught by the
//! orchestrator and recorded on the item; only `PipelineError` aborts a whole
//! operation, and only before any item has been touched.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a file on disk into an analyzable payload.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File is not valid UTF-8 text: {}", .path.display())]
    NotUtf8 { path: PathBuf },

    #[error("Could not open PDF file: {0}")]
    Pdf(String),

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Failed to read document: {0}")]
    Document(String),

    /// The blocking extraction task was cancelled or panicked.
    #[error("Extraction did not complete: {0}")]
    Interrupted(String),
}

impl ExtractError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Failure while asking a model for template values.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Callers pre-check credentials; this is hit only when a provider is
    /// constructed without one.
    #[error("No API key configured")]
    NoApiKey,

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Could not parse API response")]
    InvalidResponse,
}

impl ProviderError {
    /// Non-success HTTP exchange, keeping status and body in the detail.
    pub fn http(status: reqwest::StatusCode, body: &str) -> Self {
        ProviderError::RequestFailed(format!("HTTP {}: {}", status.as_u16(), body))
    }
}

/// Operation-level failures raised before any item is mutated.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No API key configured for {provider}")]
    NoCredential { provider: &'static str },

    /// The HTTP client for the selected provider could not be constructed.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_includes_status_and_body() {
        let err = ProviderError::http(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(err.to_string(), "API request failed: HTTP 401: bad key");
    }

    #[test]
    fn test_no_credential_names_provider() {
        let err = PipelineError::NoCredential { provider: "OpenAI" };
        assert_eq!(err.to_string(), "No API key configured for OpenAI");
    }
}
