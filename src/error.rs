//! Error types with HTTP status code mapping.

use hyper::StatusCode;

use crate::permission::Mode;

/// Error type for turnstile operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Authorization errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Principal not found: {0}")]
    PrincipalNotFound(String),

    #[error("Malformed permission: {0:?}")]
    MalformedPermission(String),

    #[error("Forbidden: requires {} of [{}]", mode.as_str(), required.join(", "))]
    Forbidden { required: Vec<String>, mode: Mode },

    // Data errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // System errors
    #[error("Invalid address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // An unknown principal is treated as "not authenticated"
            Error::Unauthorized
            | Error::InvalidCredentials
            | Error::TokenExpired
            | Error::PrincipalNotFound(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,

            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) | Error::AddrParse(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,

            // A malformed permission is a wiring bug in the caller, not a client error
            Error::MalformedPermission(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::Database(_)
            | Error::Jwt(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is an authorization decision rather than a failure.
    pub fn is_denial(&self) -> bool {
        matches!(self, Error::Forbidden { .. })
    }

    /// Convert error into HTTP response.
    pub fn into_response(self) -> crate::response::HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!("Internal error: {self}");
            "Internal server error".to_string()
        } else if let Error::PrincipalNotFound(_) = self {
            // Do not confirm which principal ids exist
            "Unauthorized".to_string()
        } else {
            self.to_string()
        };
        crate::response::error(status, &message)
    }
}

/// Result type alias using turnstile's Error.
pub type Result<T> = std::result::Result<T, Error>;
