/// Access-Token Guard
///
/// Verification every protected handler runs before its business logic.
/// Accepts the bearer token from the Authorization header only; the
/// cookie fallback belongs to the refresh flow alone.

use sqlx::PgPool;

use crate::auth::jwt::{decode_token, Decoded};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::models::users;
use crate::router::RequestContext;

/// Authenticated identity, bound for the lifetime of one request
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: i64,
    pub name: String,
}

/// Verify the request's access token and resolve its principal
///
/// Rejects with `Unauthorized` when the header is missing or malformed,
/// the token fails to decode, it decodes only in the expired tier, it is a
/// refresh token presented as an access token, or its subject no longer
/// exists.
pub async fn authenticate(
    pool: &PgPool,
    config: &JwtSettings,
    ctx: &RequestContext,
) -> Result<Principal, AppError> {
    let token = ctx
        .bearer_token()?
        .ok_or(AppError::Auth(AuthError::Unauthorized))?;

    let claims = match decode_token(&token, config)? {
        Decoded::Valid(claims) => claims,
        Decoded::Expired(_) => return Err(AppError::Auth(AuthError::Unauthorized)),
    };

    if !claims.access {
        return Err(AppError::Auth(AuthError::Unauthorized));
    }

    let user_id = claims.user_id()?;

    // The subject must still exist; tokens outlive account deletion.
    if users::find_by_id(pool, user_id).await?.is_none() {
        return Err(AppError::Auth(AuthError::Unauthorized));
    }

    tracing::debug!(user_id = user_id, "Access token verified");

    Ok(Principal {
        user_id,
        name: claims.name,
    })
}
