//! Mapping of [`SyncError`] onto HTTP responses

use crate::domain::SyncError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Handler error rendered as `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError(pub SyncError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::Validation(_) => StatusCode::BAD_REQUEST,
            SyncError::Authentication(_) => StatusCode::UNAUTHORIZED,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::AlreadyDispatched(_) => StatusCode::CONFLICT,
            SyncError::Jde(_) | SyncError::BakeryOps(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match &self.0 {
            SyncError::Authentication(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BakeryOpsError, JdeError};
    use test_case::test_case;

    #[test_case(SyncError::Validation("bad".into()), StatusCode::BAD_REQUEST ; "validation")]
    #[test_case(SyncError::Authentication("no".into()), StatusCode::UNAUTHORIZED ; "authentication")]
    #[test_case(SyncError::NotFound("gone".into()), StatusCode::NOT_FOUND ; "not found")]
    #[test_case(SyncError::AlreadyDispatched("T1".into()), StatusCode::CONFLICT ; "already dispatched")]
    #[test_case(JdeError::NotConfigured.into(), StatusCode::BAD_GATEWAY ; "jde")]
    #[test_case(BakeryOpsError::RateLimited(3).into(), StatusCode::BAD_GATEWAY ; "bakery ops")]
    #[test_case(SyncError::Database("down".into()), StatusCode::INTERNAL_SERVER_ERROR ; "database")]
    fn test_status_mapping(err: SyncError, expected: StatusCode) {
        assert_eq!(ApiError(err).status(), expected);
    }

    #[test]
    fn test_authentication_detail_is_bare_message() {
        let err = ApiError(SyncError::Authentication("Invalid username or password".into()));
        assert_eq!(err.detail(), "Invalid username or password");
    }
}
