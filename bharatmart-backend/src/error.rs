use axum::{http::StatusCode, response::IntoResponse, Json};
use bharatmart_auth::{AuthError, PasswordError};
use bharatmart_db::repo::RepoError;
use bharatmart_db::DbError;
use bharatmart_job_queue::JobQueueError;
use serde_json::json;
use thiserror::Error;

type SerdeJsonError = serde_json::Error;

/// Top-level API error shared by all route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthError),
    /// Unknown email and wrong password both end up here.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password error: {0}")]
    Password(#[from] PasswordError),
    #[error("job queue error: {0}")]
    JobQueue(#[from] JobQueueError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("validation error")]
    Validation(serde_json::Value),
    #[error(transparent)]
    SerdeJson(#[from] SerdeJsonError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(db) if db.is_validation() => ApiError::BadRequest(db.to_string()),
            RepoError::Db(db) => ApiError::Database(db),
            RepoError::NotFound(what) => ApiError::NotFound(what),
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            RepoError::Invalid(msg) => ApiError::BadRequest(msg),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Authentication(AuthError::Subsystem(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Password(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::JobQueue(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::JobQueue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::SerdeJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn unauthorized() -> Self {
        Self::Authentication(AuthError::AuthenticationFailed)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let payload = match self {
            ApiError::Validation(v) => v,
            // Details of server-side failures stay in the logs.
            ref e if status.is_server_error() => {
                tracing::error!(error = %e, status = status.as_u16(), "request failed");
                if status == StatusCode::SERVICE_UNAVAILABLE {
                    json!({ "error": "service unavailable" })
                } else {
                    json!({ "error": "internal server error" })
                }
            }
            ref e => json!({ "error": e.to_string() }),
        };

        (status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_map_to_http_statuses() {
        assert_eq!(
            ApiError::from(RepoError::Conflict("user already exists".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(RepoError::NotFound("order o1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RepoError::Invalid("quantity".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RepoError::Db(DbError::InvalidIdentifier("x;".into()))).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RepoError::Db(DbError::Query("boom".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn queue_outage_is_service_unavailable() {
        let err = ApiError::from(JobQueueError::Unavailable("redis down".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err = ApiError::from(JobQueueError::InvalidPayload("bad".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let resp = ApiError::Database(DbError::Query("secret table missing".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "internal server error" }));
    }

    #[tokio::test]
    async fn credential_failures_share_one_body() {
        let resp = ApiError::InvalidCredentials.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "invalid credentials" }));
    }
}
