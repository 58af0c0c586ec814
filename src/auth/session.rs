/// Session Issuance and Refresh
///
/// `issue` mints an access/refresh token pair for an authenticated
/// identity. `refresh_session` walks an inbound refresh attempt through
/// extraction, decoding, revocation/role/expiry checks, rotation, and
/// issuance; every rejection is a distinct typed error.

use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use crate::auth::blacklist::{blacklist_token, is_blacklisted, RevokeOutcome};
use crate::auth::jwt::{decode_token, encode_token, Decoded};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::router::RequestContext;

/// Freshly issued token pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token expiry, `%Y-%m-%d %H:%M:%S` UTC
    pub expires_at: String,
}

/// Identity a refresh attempt resolved to, along with its new pair
#[derive(Debug)]
pub struct RefreshedSession {
    pub pair: TokenPair,
    pub user_id: i64,
    pub name: String,
}

/// Mint an access/refresh pair for a subject
///
/// `expires_at` is read back out of the minted access token rather than
/// recomputed, so the reported expiry can never drift from the encoded one.
pub fn issue(user_id: i64, name: &str, config: &JwtSettings) -> Result<TokenPair, AppError> {
    let access_token = encode_token(user_id, name, config.access_token_expiry, true, config)?;
    let refresh_token = encode_token(user_id, name, config.refresh_token_expiry, false, config)?;

    let decoded = decode_token(&access_token, config)?;
    let expires_at = format_expiry(decoded.claims().exp)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_at,
    })
}

/// Validate and rotate a refresh token
///
/// Rejections, in order: no token in header or cookie, wrong auth scheme,
/// structural decode failure, already-spent identifier, access token in a
/// refresh slot (all `Unauthorized`), then past expiry (`ExpiredToken`).
/// The revocation insert is the race gate: a concurrent double-submission
/// of the same token leaves exactly one winner.
pub async fn refresh_session(
    pool: &PgPool,
    config: &JwtSettings,
    ctx: &RequestContext,
) -> Result<RefreshedSession, AppError> {
    let token = match ctx.bearer_token()? {
        Some(token) => token,
        None => ctx
            .cookie("refresh_token")
            .ok_or(AppError::Auth(AuthError::Unauthorized))?,
    };

    let decoded = decode_token(&token, config)?;
    let claims = decoded.claims().clone();

    if is_blacklisted(pool, &claims.jti).await? {
        return Err(AppError::Auth(AuthError::Unauthorized));
    }

    if claims.access {
        return Err(AppError::Auth(AuthError::Unauthorized));
    }

    if let Decoded::Expired(_) = decoded {
        return Err(AppError::Auth(AuthError::ExpiredToken));
    }

    let user_id = claims.user_id()?;

    match blacklist_token(pool, &claims.jti, user_id, claims.exp).await? {
        RevokeOutcome::Revoked => {}
        RevokeOutcome::AlreadyRevoked => return Err(AppError::Auth(AuthError::Unauthorized)),
    }

    let pair = issue(user_id, &claims.name, config)?;

    tracing::info!(user_id = user_id, "Refresh token rotated");

    Ok(RefreshedSession {
        pair,
        user_id,
        name: claims.name,
    })
}

fn format_expiry(epoch: i64) -> Result<String, AppError> {
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .ok_or_else(|| AppError::Internal("Invalid token expiry timestamp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 259200,
        }
    }

    #[test]
    fn test_issue_produces_access_and_refresh_roles() {
        let config = get_test_config();
        let pair = issue(7, "John Doe", &config).expect("Failed to issue pair");

        let access = decode_token(&pair.access_token, &config).unwrap();
        let refresh = decode_token(&pair.refresh_token, &config).unwrap();

        assert!(access.claims().access);
        assert!(!refresh.claims().access);
        assert_eq!(access.claims().sub, "7");
        assert_eq!(refresh.claims().name, "John Doe");
    }

    #[test]
    fn test_issue_ttls_follow_settings() {
        let config = get_test_config();
        let pair = issue(7, "John Doe", &config).expect("Failed to issue pair");

        let access = decode_token(&pair.access_token, &config).unwrap();
        let refresh = decode_token(&pair.refresh_token, &config).unwrap();

        assert_eq!(
            access.claims().exp - access.claims().iat,
            config.access_token_expiry
        );
        assert_eq!(
            refresh.claims().exp - refresh.claims().iat,
            config.refresh_token_expiry
        );
    }

    #[test]
    fn test_expires_at_matches_access_token_exp() {
        let config = get_test_config();
        let pair = issue(7, "John Doe", &config).expect("Failed to issue pair");

        let access = decode_token(&pair.access_token, &config).unwrap();
        let expected = format_expiry(access.claims().exp).unwrap();

        assert_eq!(pair.expires_at, expected);
    }

    #[test]
    fn test_pair_tokens_have_distinct_identifiers() {
        let config = get_test_config();
        let pair = issue(7, "John Doe", &config).expect("Failed to issue pair");

        let access = decode_token(&pair.access_token, &config).unwrap();
        let refresh = decode_token(&pair.refresh_token, &config).unwrap();

        assert_ne!(access.claims().jti, refresh.claims().jti);
    }

    #[test]
    fn test_format_expiry() {
        assert_eq!(format_expiry(0).unwrap(), "1970-01-01 00:00:00");
        assert_eq!(format_expiry(1700000000).unwrap(), "2023-11-14 22:13:20");
    }
}
