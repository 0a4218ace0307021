use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError, models::Role, repository::RepositoryState};

/// The only token type this service issues or accepts.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims
///
/// Payload of every access token, signed with HS256 under `JWT_SECRET_KEY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account's email.
    pub sub: String,
    pub role: Role,
    /// Unique token id. The blacklist is keyed on it.
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    /// Fresh access-token claims valid from now for `ttl_hours`.
    pub fn access(email: &str, role: Role, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: email.to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
        }
    }
}

/// AuthError
///
/// Every reason a request is turned away with 401. Each one carries its own user-facing
/// message; `code` is the short machine-readable tag sent alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization token is missing. Please include it in the header.")]
    MissingToken,
    #[error("invalid authorization header format. Ensure it's in the form 'Bearer <token>'.")]
    InvalidHeader,
    #[error("error decoding token. The token may be malformed.")]
    Malformed,
    #[error("Token has expired, please log in again.")]
    Expired,
    #[error("token has been revoked. Please log in again.")]
    Revoked,
    #[error("wrong token type used. Ensure you're using the correct token type.")]
    WrongType,
    /// Login with a known email but the wrong password.
    #[error("invalid password")]
    InvalidPassword,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "authorization_required",
            AuthError::InvalidHeader => "invalid_header",
            AuthError::Malformed => "invalid_token",
            AuthError::Expired => "token_expired",
            AuthError::Revoked => "token_revoked",
            AuthError::WrongType => "wrong_token_type",
            AuthError::InvalidPassword => "invalid_credentials",
        }
    }
}

/// Signs the given claims.
pub fn encode_claims(
    config: &AppConfig,
    claims: &Claims,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(), // HS256
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// issue_token
///
/// Issues an access token for `email` carrying `role`, valid for the configured lifetime.
pub fn issue_token(
    config: &AppConfig,
    email: &str,
    role: Role,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode_claims(config, &Claims::access(email, role, config.token_ttl_hours))
}

/// verify_token
///
/// Checks signature, `exp`, `nbf` and the token type. Revocation is checked separately by
/// the extractor since it needs the blacklist store.
pub fn verify_token(config: &AppConfig, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Malformed,
    })?
    .claims;

    if claims.token_type != ACCESS_TOKEN_TYPE {
        return Err(AuthError::WrongType);
    }
    Ok(claims)
}

/// Pulls the raw token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::InvalidHeader),
    }
}

/// AuthUser Extractor Result
///
/// The verified identity behind a request. Handlers take it as an argument; the role gate
/// stores it in the request extensions so the token is verified once per request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub role: Role,
    pub jti: String,
    /// Token expiry (Unix seconds).
    pub exp: i64,
}

/// AuthUser Extractor Implementation
///
/// The whole verification stage:
/// 1. Reuse an identity the role gate already verified for this request.
/// 2. Token Extraction from the `Authorization` header.
/// 3. Signature, expiry and type checks (`verify_token`).
/// 4. Blacklist lookup by `jti`. A store failure rejects the request with 500.
///
/// Rejection: `AppError::Unauthorized` (401) with the matching message.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Already verified upstream
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // 2. Token Extraction
        let token = bearer_token(&parts.headers)?;

        // 3. Decode and Validate the Token
        let claims = verify_token(&config, token)?;

        // 4. Blacklist Lookup
        if repo.is_token_revoked(&claims.jti).await? {
            tracing::debug!(jti = %claims.jti, "Rejected revoked token");
            return Err(AuthError::Revoked.into());
        }

        Ok(AuthUser {
            email: claims.sub,
            role: claims.role,
            jti: claims.jti,
            exp: claims.exp,
        })
    }
}
