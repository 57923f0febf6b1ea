use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::users::store::StoreError;

/// Every failure the account and access-control operations can produce.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    Expired,

    /// Request-shape failures detected at the HTTP boundary.
    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn user_not_found() -> Self {
        Self::NotFound("User not found".into())
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => Self::Conflict("Email already registered".into()),
            StoreError::NotFound => Self::user_not_found(),
            StoreError::Backend(e) => Self::Internal(e.context("credential store")),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AuthError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AuthError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            // Same body for both so callers cannot tell them apart.
            AuthError::InvalidToken | AuthError::Expired => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "invalid or expired token".to_string(),
            ),
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AuthError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AuthError) -> (StatusCode, String) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn invalid_and_expired_look_identical() {
        let invalid = body_of(AuthError::InvalidToken).await;
        let expired = body_of(AuthError::Expired).await;
        assert_eq!(invalid, expired);
        assert_eq!(invalid.0, StatusCode::UNAUTHORIZED);
        assert!(invalid.1.contains("invalid or expired token"));
    }

    #[tokio::test]
    async fn status_codes_follow_taxonomy() {
        assert_eq!(body_of(AuthError::user_not_found()).await.0, StatusCode::NOT_FOUND);
        assert_eq!(body_of(AuthError::Conflict("x".into())).await.0, StatusCode::CONFLICT);
        assert_eq!(body_of(AuthError::unauthorized("x")).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(AuthError::BadRequest("x".into())).await.0, StatusCode::BAD_REQUEST);

        let (status, body) = body_of(AuthError::Internal(anyhow::anyhow!("db down"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("db down"));
    }

    #[test]
    fn store_errors_map_to_taxonomy() {
        assert!(matches!(AuthError::from(StoreError::DuplicateEmail), AuthError::Conflict(_)));
        assert!(matches!(AuthError::from(StoreError::NotFound), AuthError::NotFound(_)));
        assert!(matches!(
            AuthError::from(StoreError::Backend(anyhow::anyhow!("boom"))),
            AuthError::Internal(_)
        ));
    }
}
