use thiserror::Error;

/// Failure taxonomy shared by ingestion, lookup, and the HTTP layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PuzzleError {
    /// Client input did not match `YYYY-MM-DD`
    #[error("Invalid date format. Expected YYYY-MM-DD")]
    InvalidDateFormat,

    /// Valid request, but no puzzle is stored for it
    #[error("Game not found")]
    PuzzleNotFound,

    /// Ingestion only: fetch, status, or payload problem at the external source
    #[error("Puzzle source unavailable: {0}")]
    SourceUnavailable(String),

    /// Any persistence failure
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

pub type PuzzleResult<T> = Result<T, PuzzleError>;

impl From<rusqlite::Error> for PuzzleError {
    fn from(err: rusqlite::Error) -> Self {
        PuzzleError::StorageFailure(err.to_string())
    }
}

// Stored JSON columns that no longer decode are a storage problem, not a client one.
impl From<serde_json::Error> for PuzzleError {
    fn from(err: serde_json::Error) -> Self {
        PuzzleError::StorageFailure(format!("corrupt stored document: {}", err))
    }
}

#[cfg(feature = "server")]
mod response {
    use super::PuzzleError;
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    };

    impl PuzzleError {
        pub fn status_code(&self) -> StatusCode {
            match self {
                PuzzleError::InvalidDateFormat => StatusCode::BAD_REQUEST,
                PuzzleError::PuzzleNotFound => StatusCode::NOT_FOUND,
                PuzzleError::SourceUnavailable(_) | PuzzleError::StorageFailure(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }

    impl IntoResponse for PuzzleError {
        fn into_response(self) -> Response {
            let status = self.status_code();

            // Internal details stay in the logs
            let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!("Request failed: {}", self);
                "Internal Server Error".to_string()
            } else {
                self.to_string()
            };

            (status, body).into_response()
        }
    }
}
