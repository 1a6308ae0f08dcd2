//! Principal resolution from JWT bearer tokens and session cookies.
//!
//! Tokens are issued by the identity provider; this module only verifies
//! them and extracts the principal id from the `sub` claim. Whether that
//! principal holds any permission is the evaluator's job.

use hyper::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Auth as AuthConfig;
use crate::error::{Error, Result};

const MIN_SECRET_LENGTH: usize = 32;

fn validate_secret(config: &AuthConfig) -> Result<()> {
    if config.jwt_secret.len() < MIN_SECRET_LENGTH {
        return Err(Error::Config(format!(
            "JWT secret must be at least {MIN_SECRET_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Create a token for a principal.
pub fn create_token(config: &AuthConfig, principal_id: &str) -> Result<String> {
    validate_secret(config)?;
    let now = jiff::Timestamp::now();
    let hours = config.token_expiry_days as i64 * 24;
    let exp = now + jiff::Span::new().hours(hours);

    let claims = Claims {
        sub: principal_id.to_string(),
        exp: exp.as_second(),
        iat: now.as_second(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Token creation failed: {e}")))
}

/// Verify and decode a token.
///
/// # Returns
/// - `Ok(Claims)` if the token is valid
/// - `Err(Error::TokenExpired)` if the token has expired
/// - `Err(Error::Unauthorized)` for any other validation failure
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims> {
    validate_secret(config)?;
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
        _ => Error::Unauthorized,
    })?;

    Ok(token_data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    value
        .get(..7)
        .filter(|p| p.eq_ignore_ascii_case("bearer "))
        .map(|_| value[7..].trim())
        .filter(|t| !t.is_empty())
}

fn cookie_token<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all("Cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|t| !t.is_empty())
}

/// Extract the principal id from the `Authorization: Bearer <token>` header.
pub fn extract_principal_id(headers: &HeaderMap, config: &AuthConfig) -> Result<String> {
    let token = bearer_token(headers).ok_or(Error::Unauthorized)?;
    Ok(verify_token(config, token)?.sub)
}

/// Like [`extract_principal_id`], falling back to the session cookie.
pub fn extract_session_principal_id(headers: &HeaderMap, config: &AuthConfig) -> Result<String> {
    let token = bearer_token(headers)
        .or_else(|| cookie_token(headers, &config.session_cookie))
        .ok_or(Error::Unauthorized)?;
    Ok(verify_token(config, token)?.sub)
}
