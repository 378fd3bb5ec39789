use hyper::StatusCode;
use serde_json::{json, Value};
use spotx_common::Error as DomainError;
use spotx_db::DbError;
use thiserror::Error;
use tracing::error;

use crate::error::ServiceError;

/// Client is sent back after this long when no slot window is open
pub const BACK_AFTER_MS: u64 = 2000;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Admin authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("No active time window")]
    NoActiveSlot,

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Timeout(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::NoActiveSlot => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::Unauthorized => json!({ "error": self.to_string(), "redirect": "/login" }),
            ApiError::NoActiveSlot => {
                json!({ "error": self.to_string(), "back_after_ms": BACK_AFTER_MS })
            }
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NoActiveSlot => ApiError::NoActiveSlot,
            DomainError::InvalidSlot(_) => ApiError::BadRequest(err.to_string()),
            DomainError::Validation(_) => ApiError::Unprocessable(err.to_string()),
            DomainError::SlotAlreadyCompleted(_)
            | DomainError::InvalidState(_)
            | DomainError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ApiError::NotFound(what),
            DbError::Duplicate(what) | DbError::InvalidData(what) => ApiError::Conflict(what),
            DbError::Domain(e) => e.into(),
            other => {
                error!("Database error: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => e.into(),
            ServiceError::Db(e) => e.into(),
            ServiceError::NotFound(what) => ApiError::NotFound(what),
            ServiceError::Forbidden(what) => ApiError::Forbidden(what),
            ServiceError::AdLoadTimeout(_) => ApiError::Timeout(err.to_string()),
            ServiceError::Store(_) | ServiceError::Push(_) => {
                error!("Service error: {}", err);
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_active_slot_carries_back_hint() {
        let err = ApiError::from(ServiceError::from(DomainError::NoActiveSlot));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.body()["error"], "No active time window");
        assert_eq!(err.body()["back_after_ms"], 2000);
    }

    #[test]
    fn test_unauthorized_redirects_to_login() {
        let err = ApiError::Unauthorized;
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.body()["redirect"], "/login");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(DomainError::InvalidSlot(9)), StatusCode::BAD_REQUEST),
            (ApiError::from(DomainError::Validation("x".into())), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::from(DbError::NotFound("user".into())), StatusCode::NOT_FOUND),
            (ApiError::from(DbError::Duplicate("email".into())), StatusCode::CONFLICT),
            (ApiError::from(ServiceError::AdLoadTimeout(3)), StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{}", err);
        }
    }
}
