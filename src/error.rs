/// Error Handling Module
///
/// Unified error handling for the whole application:
/// 1. Control flow errors (Result-based)
/// 2. Domain-specific error types (avoiding ball of mud)
/// 3. Status-code and body mapping consumed by the HTTP boundary
/// 4. Structured error logging with context
///
/// Core components (token codec, router, stores) only ever return these
/// typed errors; the boundary in `startup.rs` owns the response surface.

use actix_web::http::StatusCode;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

/// Authentication and session errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing/malformed/forged/wrong-role token, spent refresh token,
    /// or bad credentials.
    Unauthorized,
    /// Structurally valid token past its expiry. Distinguished so clients
    /// can tell "log in again" from "token stale, retry".
    ExpiredToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Unauthorized => write!(f, "Unauthorized"),
            AuthError::ExpiredToken => write!(f, "Expired Token"),
        }
    }
}

impl StdError for AuthError {}

/// Field-level validation failures, keyed by field name
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "validation failed for: {}", fields.join(", "))
    }
}

impl StdError for ValidationErrors {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueViolation(String),
    NotFound(String),
    ConnectionPool(String),
    Unexpected(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueViolation(msg) => write!(f, "{}", msg),
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::Unexpected(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Configuration errors; fatal at startup, never per-request
#[derive(Debug)]
pub enum ConfigError {
    MissingSecret,
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingSecret => write!(f, "JWT secret key is missing"),
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Validation(ValidationErrors),
    Database(DatabaseError),
    Config(ConfigError),
    NotFound(String),
    Forbidden(String),
    RateLimited,
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Forbidden(msg) => write!(f, "{}", msg),
            AppError::RateLimited => write!(f, "Too many request"),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

/// True when the error is a unique-constraint violation. The blacklist
/// insert relies on this to detect a refresh token that lost the race.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| code == "23505")
            .unwrap_or_else(|| db_err.message().contains("unique constraint")),
        _ => false,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return AppError::Database(DatabaseError::UniqueViolation(
                "Duplicate entry".to_string(),
            ));
        }

        match err {
            sqlx::Error::RowNotFound => {
                AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            other => AppError::Database(DatabaseError::Unexpected(other.to_string())),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(e) => match e {
                DatabaseError::UniqueViolation(_) => StatusCode::CONFLICT,
                DatabaseError::NotFound(_) => StatusCode::NOT_FOUND,
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                DatabaseError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for the boundary to serialize. Validation errors keep the
    /// per-field map; everything else is a single message.
    pub fn body(&self) -> Value {
        match self {
            AppError::Validation(ValidationErrors(errors)) => json!({ "errors": errors }),
            AppError::Config(_) | AppError::Internal(_) => {
                json!({ "message": "Internal server error" })
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                json!({ "message": "Service temporarily unavailable" })
            }
            AppError::Database(DatabaseError::Unexpected(_)) => {
                json!({ "message": "Internal server error" })
            }
            other => json!({ "message": other.to_string() }),
        }
    }

    pub fn log(&self, request_id: &str) {
        match self {
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::NotFound(msg) => {
                tracing::debug!(request_id = request_id, error = %msg, "Not found");
            }
            AppError::Forbidden(msg) => {
                tracing::warn!(request_id = request_id, error = %msg, "Forbidden");
            }
            AppError::RateLimited => {
                tracing::warn!(request_id = request_id, "Rate limit exceeded");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_401_with_distinct_messages() {
        let unauthorized = AppError::Auth(AuthError::Unauthorized);
        let expired = AppError::Auth(AuthError::ExpiredToken);

        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.body()["message"], "Unauthorized");
        assert_eq!(expired.body()["message"], "Expired Token");
    }

    #[test]
    fn validation_errors_expose_field_map() {
        let mut fields = BTreeMap::new();
        fields.insert("email".to_string(), "email field is required.".to_string());
        let err = AppError::Validation(ValidationErrors(fields));

        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body()["errors"]["email"], "email field is required.");
    }

    #[test]
    fn unique_violation_maps_to_409() {
        let err = AppError::Database(DatabaseError::UniqueViolation(
            "Email already registered".to_string(),
        ));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal("pool exploded".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body()["message"], "Internal server error");
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = AppError::RateLimited;
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.body()["message"], "Too many request");
    }
}
