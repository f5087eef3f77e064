use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use nsccore::CoreError;

/// Error returned by handlers and database helpers.
///
/// Rendered as `{"error": "..."}` with the matching status code. Storage
/// failures are logged and reported without details.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("database error: {0}")]
    Database(DieselError),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    /// Log the error with the level its status deserves
    pub fn log(&self) {
        match self {
            ApiError::Database(e) => tracing::error!("Database error: {:?}", e),
            ApiError::Pool(e) => tracing::error!("Connection pool error: {:?}", e),
            ApiError::Internal(e) => tracing::error!("Internal error: {}", e),
            ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                tracing::warn!("Access denied: {}", msg)
            }
            other => tracing::debug!("Request rejected: {}", other),
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => ApiError::NotFound("record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                tracing::debug!("Unique violation: {}", info.message());
                ApiError::Conflict("record already exists".to_string())
            }
            other => ApiError::Database(other),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Token(_) => ApiError::Unauthorized("invalid or expired token".to_string()),
            CoreError::PasswordHash(msg) => ApiError::Internal(msg),
            CoreError::Overflow => ApiError::Internal("arithmetic overflow".to_string()),
            CoreError::KycRequired => ApiError::Forbidden(e.to_string()),
            CoreError::UnknownPlan(_) | CoreError::Invalid { .. } | CoreError::UnknownVariant { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            other => ApiError::Unprocessable(other.to_string()),
        }
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        ApiError::Internal(format!("blocking task failed: {e}"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.log();
        let message = match self {
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_error_body_is_json() {
        let resp = ApiError::BadRequest("amount required".into()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "amount required");
    }

    #[actix_web::test]
    async fn test_internal_details_hidden() {
        let resp = ApiError::Internal("pool exhausted at 10.0.0.3".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal server error");
    }

    #[test]
    fn test_diesel_mapping() {
        assert!(matches!(ApiError::from(DieselError::NotFound), ApiError::NotFound(_)));
        assert!(matches!(
            ApiError::from(DieselError::RollbackTransaction),
            ApiError::Database(_)
        ));
    }

    #[test]
    fn test_core_mapping() {
        assert_eq!(
            ApiError::from(CoreError::KycRequired).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(CoreError::Token("expired".into())).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(CoreError::BelowMinimum { min_cents: 1_000 }).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(CoreError::UnknownPlan("ruby".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
