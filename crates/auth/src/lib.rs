//! Connection-time identity verification.
//!
//! Clients present an opaque bearer token when opening a chat socket. The
//! verifier checks it exactly once, before any message is processed, and
//! collapses the token's identity claims into a single canonical user id.
//! The three failure modes are distinct so clients can tell "log in again"
//! apart from a malformed deployment.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("invalid user identity")]
    MissingIdentity,
}

impl AuthError {
    /// WebSocket close code reported to the client on admission failure.
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::MissingToken => 4001,
            AuthError::InvalidToken(_) => 4002,
            AuthError::MissingIdentity => 4003,
        }
    }

    pub fn close_reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authentication required",
            AuthError::InvalidToken(_) => "Invalid token",
            AuthError::MissingIdentity => "Invalid user ID",
        }
    }
}

/// The identity claims a deployed client may carry. Older token issuers
/// used `id`, newer ones `userId`, and standards-shaped ones `sub`; the
/// first present wins.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, rename = "userId")]
    user_id: Option<i64>,
    #[serde(default)]
    sub: Option<String>,
}

impl Claims {
    fn identity(&self) -> Option<i64> {
        self.id
            .or(self.user_id)
            .or_else(|| self.sub.as_deref().and_then(|sub| sub.parse().ok()))
    }
}

/// Verifies bearer tokens against the deployment's shared signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Tokens are issued elsewhere; expiry is enforced when present but
        // no particular claim set is required.
        validation.required_spec_claims.clear();

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Validate a connection credential and extract the user identity.
    ///
    /// Evaluated exactly once per connection attempt, synchronously,
    /// before any message is accepted.
    pub fn verify(&self, token: Option<&str>) -> Result<i64, AuthError> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::MissingToken),
        };

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(AuthError::InvalidToken)?;

        let user_id = data.claims.identity().ok_or(AuthError::MissingIdentity)?;

        debug!(user_id, "verified connection credential");
        Ok(user_id)
    }
}
