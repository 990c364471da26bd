use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Secret not found")]
    SecretNotFound,

    #[error("Secret already exists")]
    SecretAlreadyExists,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Access denied")]
    AccessDenied,

    #[error("Device code not found")]
    DeviceCodeNotFound,

    #[error("Device code expired")]
    DeviceCodeExpired,

    #[error("Device code already redeemed")]
    DeviceCodeConsumed,

    #[error("Decryption failed: {0}")]
    Corruption(String),

    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::SecretNotFound => AppError::NotFound(anyhow::anyhow!("Secret not found")),
            ServiceError::SecretAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("Secret already exists"))
            }
            ServiceError::TokenNotFound => AppError::NotFound(anyhow::anyhow!("Token not found")),
            // The three token liveness failures collapse to one message so a
            // caller cannot distinguish revoked from expired from unknown.
            ServiceError::InvalidToken
            | ServiceError::TokenExpired
            | ServiceError::TokenRevoked => {
                AppError::AuthError(anyhow::anyhow!("Invalid or expired token"))
            }
            // Deliberately uniform: the response never says which scope rule
            // failed, so a token cannot be used to probe the project layout.
            ServiceError::AccessDenied => AppError::Forbidden(anyhow::anyhow!("Access denied")),
            ServiceError::DeviceCodeNotFound => {
                AppError::NotFound(anyhow::anyhow!("Device code not found"))
            }
            ServiceError::DeviceCodeExpired => {
                AppError::BadRequest(anyhow::anyhow!("Device code expired"))
            }
            ServiceError::DeviceCodeConsumed => {
                AppError::BadRequest(anyhow::anyhow!("Device code already redeemed"))
            }
            ServiceError::Corruption(e) => AppError::Corruption(anyhow::anyhow!(e)),
            ServiceError::AuditWrite(e) => AppError::AuditWrite(anyhow::anyhow!(e)),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
