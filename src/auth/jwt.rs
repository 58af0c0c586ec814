/// Token Codec
///
/// Encodes and decodes the signed session tokens. Pure functions, no I/O.
///
/// Decoding is two-tiered: a token whose signature verifies but whose
/// expiry has passed still yields its claims (`Decoded::Expired`), while a
/// malformed or forged token yields nothing. The refresh flow depends on
/// reading `exp`/`jti` off an expired token in order to blacklist it.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

/// Result of decoding a structurally valid token
#[derive(Debug, Clone)]
pub enum Decoded {
    Valid(Claims),
    Expired(Claims),
}

impl Decoded {
    pub fn claims(&self) -> &Claims {
        match self {
            Decoded::Valid(claims) | Decoded::Expired(claims) => claims,
        }
    }
}

/// Build and sign a token for a subject
///
/// # Errors
/// Returns a config error if the signing secret is empty. That condition is
/// checked again at startup and treated as fatal there.
pub fn encode_token(
    user_id: i64,
    name: &str,
    ttl_seconds: i64,
    access: bool,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, name, ttl_seconds, access);
    encode_claims(&claims, config)
}

/// Sign a prepared claims set
pub fn encode_claims(claims: &Claims, config: &JwtSettings) -> Result<String, AppError> {
    if config.secret.is_empty() {
        return Err(AppError::Config(ConfigError::MissingSecret));
    }

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Verify signature and structure, classifying the expiry state
///
/// # Errors
/// Returns `Unauthorized` for anything that is not a well-formed token
/// signed with our secret. Expiry alone is not an error here; callers
/// decide how to treat the `Expired` tier.
pub fn decode_token(token: &str, config: &JwtSettings) -> Result<Decoded, AppError> {
    if config.secret.is_empty() {
        return Err(AppError::Config(ConfigError::MissingSecret));
    }

    // Expiry is classified manually below so that the claims of an expired
    // token remain readable.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| {
        if data.claims.is_expired() {
            Decoded::Expired(data.claims)
        } else {
            Decoded::Valid(data.claims)
        }
    })
    .map_err(|e| {
        tracing::warn!("Token validation error: {}", e);
        AppError::Auth(AuthError::Unauthorized)
    })
}
