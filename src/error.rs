use log::error;

use crate::protocol::ErrorCode;

#[derive(serde::Serialize, Debug)]
pub struct DocshareError {
    pub code: ErrorCode,
    pub message: String,
}

impl DocshareError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            code: ErrorCode::BadRequest,
            message: msg.to_string(),
        }
    }
    pub fn auth_failed(msg: &str) -> Self {
        Self {
            code: ErrorCode::AuthFailed,
            message: msg.to_string(),
        }
    }
    pub fn not_found(msg: &str) -> Self {
        Self {
            code: ErrorCode::NotFound,
            message: msg.to_string(),
        }
    }
    pub fn forbidden(msg: &str) -> Self {
        Self {
            code: ErrorCode::Forbidden,
            message: msg.to_string(),
        }
    }
    pub fn invalid_grant(msg: &str) -> Self {
        Self {
            code: ErrorCode::InvalidGrant,
            message: msg.to_string(),
        }
    }
    pub fn upstream(msg: &str) -> Self {
        Self {
            code: ErrorCode::UpstreamError,
            message: msg.to_string(),
        }
    }
    pub fn internal(msg: &str) -> Self {
        Self {
            code: ErrorCode::InternalServerError,
            message: msg.to_string(),
        }
    }
}

impl std::fmt::Display for DocshareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Utility function for mapping any error into an Internal Server Error
pub fn internal_error<E>(err: E) -> DocshareError
where
    E: std::error::Error,
{
    error!("internal error: {:?}", err);
    DocshareError::internal(&err.to_string())
}

/// Maps failures of the object store or the redaction service
pub fn upstream_error<E>(err: E) -> DocshareError
where
    E: std::error::Error,
{
    error!("upstream error: {:?}", err);
    DocshareError::upstream(&err.to_string())
}
