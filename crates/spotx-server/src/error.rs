use spotx_db::DbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] spotx_common::Error),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Local store error: {0}")]
    Store(#[from] crate::local_store::StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Ad load timed out after {0} seconds")]
    AdLoadTimeout(u64),

    #[error("Push delivery failed: {0}")]
    Push(String),
}

impl ServiceError {
    /// Collapse database not-found into the service variant
    pub fn normalize(self) -> Self {
        match self {
            ServiceError::Db(DbError::NotFound(what)) => ServiceError::NotFound(what),
            other => other,
        }
    }
}
