use sqlx::PgPool;

use crate::error::{is_unique_violation, AppError, DatabaseError};

/// A stored user, without the password hash
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Insert a new user
///
/// The email column carries a unique constraint; a duplicate insert maps
/// to a 409 for the boundary.
pub async fn create_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, AppError> {
    let result = sqlx::query_as::<_, (i64,)>(
        r#"
        INSERT INTO users (name, email, password)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await;

    match result {
        Ok((id,)) => {
            tracing::info!(user_id = id, "User registered");
            Ok(User {
                id,
                name: name.to_string(),
                email: email.to_string(),
            })
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::Database(
            DatabaseError::UniqueViolation(
                "Email already registered. Please choose a different one.".to_string(),
            ),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Look up a user's id, name and password hash by email
pub async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(i64, String, String)>, AppError> {
    let row = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, password FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, name, email FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, name, email)| User { id, name, email }))
}
