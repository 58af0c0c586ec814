/// Authentication Routes
///
/// User registration, login, and refresh-token rotation. All three answer
/// with the same token-pair envelope; the refresh token is additionally
/// delivered as an HTTP-only cookie by the boundary.

use actix_web::http::StatusCode;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{hash_password, issue, refresh_session, verify_password, TokenPair};
use crate::error::{AppError, AuthError};
use crate::models::users;
use crate::router::{ApiResponse, HandlerFuture, RouteRequest};
use crate::startup::AppState;
use crate::validators::Validator;

/// POST /register
///
/// # Errors
/// - 422: validation errors
/// - 409: email already registered
pub fn register(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let body = req.body.unwrap_or_default();

        let rules: Vec<(&str, &[&str])> = vec![
            ("name", &["required", "alpha", "min_length:2", "max_length:50"]),
            ("email", &["required", "email", "max_length:100"]),
            (
                "password",
                &["required", "min_length:8", "max_length:255", "match:password_confirmation"],
            ),
            ("password_confirmation", &["required", "match:password"]),
        ];
        let validator = Validator::set_rules(&body, &rules);
        if validator.has_errors() {
            return Err(validator.into_errors().into());
        }

        let password_hash = hash_password(validator.validated("password"))?;
        let user = users::create_user(
            &state.pool,
            validator.validated("name"),
            validator.validated("email"),
            &password_hash,
        )
        .await?;

        let pair = issue(user.id, &user.name, &state.jwt)?;

        Ok(token_response(
            StatusCode::CREATED,
            "Register successful",
            &pair,
            user.id,
            &user.name,
            state.jwt.refresh_token_expiry,
        ))
    })
}

/// POST /login
///
/// The same `Unauthorized` answer covers both an unknown email and a wrong
/// password; callers cannot probe which emails exist.
///
/// # Errors
/// - 422: validation errors
/// - 401: bad credentials
pub fn login(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let body = req.body.unwrap_or_default();

        let rules: Vec<(&str, &[&str])> = vec![
            ("email", &["required", "email"]),
            ("password", &["required"]),
        ];
        let validator = Validator::set_rules(&body, &rules);
        if validator.has_errors() {
            return Err(validator.into_errors().into());
        }

        let (user_id, name, password_hash) =
            users::find_by_email(&state.pool, validator.validated("email"))
                .await?
                .ok_or(AppError::Auth(AuthError::Unauthorized))?;

        if !verify_password(validator.validated("password"), &password_hash)? {
            return Err(AppError::Auth(AuthError::Unauthorized));
        }

        let pair = issue(user_id, &name, &state.jwt)?;

        tracing::info!(user_id = user_id, "User logged in");

        Ok(token_response(
            StatusCode::OK,
            "Login successful",
            &pair,
            user_id,
            &name,
            state.jwt.refresh_token_expiry,
        ))
    })
}

/// GET /refresh
///
/// Rotates a refresh token: the presented token is consumed exactly once
/// and a fresh pair is returned.
///
/// # Errors
/// - 401: missing/malformed/spent token, or an access token in its place
/// - 401 with "Expired Token": structurally valid but timed out
pub fn refresh(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let session = refresh_session(&state.pool, &state.jwt, &req.ctx).await?;

        Ok(token_response(
            StatusCode::OK,
            "Refresh token successful",
            &session.pair,
            session.user_id,
            &session.name,
            state.jwt.refresh_token_expiry,
        ))
    })
}

fn token_response(
    status: StatusCode,
    message: &str,
    pair: &TokenPair,
    user_id: i64,
    name: &str,
    refresh_ttl_seconds: i64,
) -> ApiResponse {
    ApiResponse::with_status(
        status,
        json!({
            "message": message,
            "access_token": pair.access_token,
            "refresh_token": pair.refresh_token,
            "token_type": "Bearer",
            "expires_at": pair.expires_at,
            "user": {
                "id": user_id,
                "name": name,
            },
        }),
    )
    .refresh_cookie(&pair.refresh_token, refresh_ttl_seconds)
}
