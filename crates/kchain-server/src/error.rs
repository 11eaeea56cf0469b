use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kchain_ledger::{EncodingError, LedgerError, StoreError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid transaction encoding: {0}")]
    Encoding(#[from] EncodingError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// HTTP status and machine-readable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Ledger(LedgerError::Verification(e)) => (StatusCode::BAD_REQUEST, e.code()),
            Self::Ledger(LedgerError::InvalidPageSize) => {
                (StatusCode::BAD_REQUEST, "invalid_page_size")
            }
            Self::Ledger(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "not_found"),
            Self::Ledger(LedgerError::Diverged) => (StatusCode::SERVICE_UNAVAILABLE, "diverged"),
            Self::Ledger(LedgerError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, "closed"),
            Self::Store(StoreError::NotFound(_)) | Self::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Self::Encoding(_) => (StatusCode::BAD_REQUEST, "invalid_encoding"),
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Ledger(_) | Self::Store(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, code, "request failed");
        }
        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use kchain_ledger::{TxLookup, VerificationError};
    use kchain_types::{AssetId, TxHash};

    use super::*;

    #[test]
    fn verification_errors_are_bad_requests() {
        let err = ServerError::from(LedgerError::from(VerificationError::StaleReference {
            asset_id: AssetId::new(1),
            expected: TxHash::null(),
            found: TxHash::null(),
        }));
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "stale_reference"));
    }

    #[test]
    fn lookup_misses_are_not_found() {
        let err = ServerError::from(LedgerError::from(StoreError::NotFound(TxLookup::Sequence(4))));
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unavailable_states() {
        assert_eq!(
            ServerError::from(LedgerError::Closed).status_and_code(),
            (StatusCode::SERVICE_UNAVAILABLE, "closed")
        );
        assert_eq!(
            ServerError::from(LedgerError::InvalidPageSize).status_and_code(),
            (StatusCode::BAD_REQUEST, "invalid_page_size")
        );
        assert_eq!(
            ServerError::Internal("boom".into()).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
