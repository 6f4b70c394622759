//! # Error Handling
//!
//! Defines the application's error taxonomy and how each variant is converted
//! into an HTTP response. Every failure the pipelines can produce is surfaced
//! to the caller as a failed response; nothing silently falls back to a
//! default model or an empty output.
//!
//! ## Error Categories:
//! - **UnsupportedLanguage**: the requested language code has no model
//! - **ModelLoad**: a model resource exists but cannot be loaded
//! - **AudioFormat**: the audio file is unreadable or malformed
//! - **InvalidRange**: a selection range with `end <= start` or out-of-bounds start
//! - **EmptySelection**: a generation request selecting zero words
//! - **SourceUnavailable**: source media missing or corrupt at generation time
//! - **SessionNotFound**: generation against a session that never finished ingestion
//! - **Storage**: directory create/write/read failures
//! - **BadRequest**: malformed request shapes rejected at the boundary
//!
//! Keeping UnsupportedLanguage distinct from ModelLoad lets operators tell
//! "missing language support" apart from "corrupt model data".

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Application error type shared by the pipelines, storage, and handlers.
#[derive(Debug)]
pub enum AppError {
    /// The requested language code is not in the supported set
    UnsupportedLanguage(String),

    /// A model resource could not be loaded into memory
    ModelLoad(String),

    /// Audio data is unreadable or not in the expected format
    AudioFormat(String),

    /// A selection range is degenerate (`end <= start`) or starts out of bounds
    InvalidRange { start: f64, end: f64 },

    /// A generation request selected no words
    EmptySelection,

    /// The session's source media is missing or corrupt
    SourceUnavailable(String),

    /// The session directory or transcript does not exist
    SessionNotFound(String),

    /// Storage-level failure (directory create, artifact read/write)
    Storage(String),

    /// Client sent a malformed or incomplete request
    BadRequest(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::UnsupportedLanguage(code) => {
                write!(f, "Unsupported language: {}", code)
            }
            AppError::ModelLoad(msg) => write!(f, "Model load error: {}", msg),
            AppError::AudioFormat(msg) => write!(f, "Audio format error: {}", msg),
            AppError::InvalidRange { start, end } => {
                write!(f, "Invalid range: start {} end {}", start, end)
            }
            AppError::EmptySelection => write!(f, "Empty selection: no words chosen"),
            AppError::SourceUnavailable(msg) => write!(f, "Source unavailable: {}", msg),
            AppError::SessionNotFound(key) => write!(f, "Session not found: {}", key),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Machine-readable error type string used in JSON responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::UnsupportedLanguage(_) => "unsupported_language",
            AppError::ModelLoad(_) => "model_load_error",
            AppError::AudioFormat(_) => "audio_format_error",
            AppError::InvalidRange { .. } => "invalid_range",
            AppError::EmptySelection => "empty_selection",
            AppError::SourceUnavailable(_) => "source_unavailable",
            AppError::SessionNotFound(_) => "session_not_found",
            AppError::Storage(_) => "storage_error",
            AppError::BadRequest(_) => "bad_request",
        }
    }

    fn status(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            AppError::UnsupportedLanguage(_)
            | AppError::AudioFormat(_)
            | AppError::InvalidRange { .. }
            | AppError::EmptySelection
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::SourceUnavailable(_) | AppError::SessionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::ModelLoad(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Converts AppError values into JSON HTTP responses.
///
/// All errors share one body shape so clients can branch on `error.type`:
/// ```json
/// {
///   "error": {
///     "type": "invalid_range",
///     "message": "Invalid range: start 2 end 1",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status()).json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// JSON shape errors come from clients sending malformed bodies, so they map
/// to 400 rather than 500.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_client_errors_map_to_400() {
        assert_eq!(
            AppError::UnsupportedLanguage("xx".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidRange { start: 2.0, end: 1.0 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::EmptySelection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::AudioFormat("not a wav".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_missing_resources_map_to_404() {
        assert_eq!(
            AppError::SessionNotFound("123".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::SourceUnavailable("audio.wav".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_server_errors_map_to_500() {
        assert_eq!(
            AppError::ModelLoad("corrupt".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Storage("disk full".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unsupported_language_is_distinct_from_model_load() {
        // Operators must be able to tell missing language support apart
        // from corrupt model data.
        assert_ne!(
            AppError::UnsupportedLanguage("xx".into()).kind(),
            AppError::ModelLoad("xx".into()).kind()
        );
    }
}
