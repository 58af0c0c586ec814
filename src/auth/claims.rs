/// Session token claims
///
/// Payload of a signed session token: standard time claims (RFC 7519)
/// plus the subject identity and the access/refresh role flag.

use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AuthError};

/// Claims carried by both access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (= iat)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token identifier, one per issuance
    pub jti: String,
    /// Subject (user id as decimal string)
    pub sub: String,
    /// Subject display name
    pub name: String,
    /// true = short-lived API access token, false = long-lived refresh token
    pub access: bool,
}

impl Claims {
    pub fn new(user_id: i64, name: &str, ttl_seconds: i64, access: bool) -> Self {
        let iat = chrono::Utc::now().timestamp();
        Self {
            iat,
            nbf: iat,
            exp: iat + ttl_seconds,
            jti: generate_jti(),
            sub: user_id.to_string(),
            name: name.to_string(),
            access,
        }
    }

    /// Extract the subject user id from the claims
    ///
    /// # Errors
    /// Returns `Unauthorized` if the subject is not a decimal integer
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::Auth(AuthError::Unauthorized))
    }

    /// Check whether the token is past its expiry
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}

/// Generate a collision-resistant token identifier (16 random bytes as hex)
fn generate_jti() -> String {
    let bytes: [u8; 16] = thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
