/// Token Revocation Store
///
/// Records consumed refresh tokens by their `jti`. A refresh token is
/// single-use: the moment it is redeemed its identifier goes in here, and
/// any later presentation of the same identifier is rejected.
///
/// The insert relies on the table's UNIQUE constraint on `jti`: of two
/// concurrent redemptions of the same token, exactly one insert succeeds
/// and the loser observes `AlreadyRevoked`. There is no separate
/// check-then-act window.

use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use crate::error::{is_unique_violation, AppError};

/// Result of attempting to consume a refresh token
#[derive(Debug, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
}

/// Check whether a token identifier has already been spent
pub async fn is_blacklisted(pool: &PgPool, jti: &str) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM blacklisted_tokens WHERE jti = $1",
    )
    .bind(jti)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Record a refresh token as spent
///
/// The expiry timestamp is copied from the token so the record can be
/// pruned once the token would have died on its own.
pub async fn blacklist_token(
    pool: &PgPool,
    jti: &str,
    user_id: i64,
    expires_at_epoch: i64,
) -> Result<RevokeOutcome, AppError> {
    let expired_at = Utc
        .timestamp_opt(expires_at_epoch, 0)
        .single()
        .ok_or_else(|| AppError::Internal("Invalid token expiry timestamp".to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO blacklisted_tokens (jti, user_id, expired_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expired_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            tracing::info!(user_id = user_id, "Refresh token consumed");
            Ok(RevokeOutcome::Revoked)
        }
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!(user_id = user_id, "Replay of a spent refresh token");
            Ok(RevokeOutcome::AlreadyRevoked)
        }
        Err(e) => Err(e.into()),
    }
}
