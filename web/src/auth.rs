//! Bearer-token authentication.
//!
//! Identity is owned by an external subsystem that issues HS256 JWTs whose
//! `sub` claim is the user id. This module only verifies them:
//!
//! - [`JwtVerifier`]: signature, expiry and optional issuer checks
//! - [`BearerToken`]: extracts `Authorization: Bearer <token>`
//! - [`AuthenticatedUser`]: extractor that yields the verified [`UserId`] or
//!   rejects the request with 401 before the handler runs
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn my_rsvps(user: AuthenticatedUser) -> Result<Json<Vec<Event>>, AppError> {
//!     // user.user_id is verified
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Utc};
use gather_core::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id (subject)
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Issued at, seconds since the epoch
    #[serde(default)]
    pub iat: i64,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Token verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token is past its `exp`.
    #[error("Token has expired")]
    Expired,

    /// Signature does not match.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is malformed or fails another check.
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Token could not be signed.
    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::unauthorized(err.to_string())
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
}

/// Verifies (and, for tests and tooling, issues) HS256 access tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    keys: Arc<Keys>,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("issuer", &self.keys.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Create a verifier for `secret`, optionally requiring issuer `issuer`.
    #[must_use]
    pub fn new(secret: &[u8], issuer: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if let Some(issuer) = &issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
                issuer,
            }),
        }
    }

    /// Verify `token` and return the user it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the token is expired, badly signed, malformed,
    /// has an empty subject, or carries the wrong issuer.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.keys.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Invalid(e.to_string()),
            },
        )?;

        let subject = data.claims.sub.trim();
        if subject.is_empty() {
            return Err(AuthError::Invalid("empty subject".to_string()));
        }
        Ok(UserId::new(subject))
    }

    /// Sign a token for `user_id` expiring at `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if encoding fails.
    pub fn issue(&self, user_id: &UserId, expires_at: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.as_str().to_string(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            iss: self.keys.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

/// Bearer token extracted from `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'")
            })?
            .trim();

        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token.to_string()))
    }
}

/// The verified caller of a protected endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Verified user id
    pub user_id: UserId,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    JwtVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let verifier = JwtVerifier::from_ref(state);

        match verifier.verify(&token) {
            Ok(user_id) => Ok(Self { user_id }),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                Err(e.into())
            }
        }
    }
}
