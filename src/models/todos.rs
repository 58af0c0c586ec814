use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::error::AppError;

type TodoRow = (i64, i64, String, String, String, DateTime<Utc>, DateTime<Utc>);

const COLUMNS: &str = "id, user_id, title, description, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct Todo {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    fn from_row(row: TodoRow) -> Self {
        let (id, user_id, title, description, status, created_at, updated_at) = row;
        Self {
            id,
            user_id,
            title,
            description,
            status,
            created_at,
            updated_at,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "user_id": self.user_id,
            "title": self.title,
            "description": self.description,
            "status": self.status,
            "created_at": self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "updated_at": self.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }
}

pub async fn count(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM todos WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// Page of the principal's rows, optionally filtered by status and ordered
/// by creation time.
pub async fn list(
    pool: &PgPool,
    user_id: i64,
    status: Option<&str>,
    order: Option<&str>,
    start: i64,
    limit: i64,
) -> Result<Vec<Todo>, AppError> {
    // Direction is whitelisted, never interpolated from input
    let order_clause = match order.map(str::to_ascii_lowercase).as_deref() {
        Some("asc") => "ORDER BY created_at ASC",
        Some("desc") => "ORDER BY created_at DESC",
        _ => "ORDER BY id ASC",
    };

    let rows = if let Some(status) = status {
        let query = format!(
            "SELECT {} FROM todos WHERE user_id = $1 AND status = $2 {} LIMIT $3 OFFSET $4",
            COLUMNS, order_clause
        );
        sqlx::query_as::<_, TodoRow>(&query)
            .bind(user_id)
            .bind(status.to_ascii_lowercase())
            .bind(limit)
            .bind(start)
            .fetch_all(pool)
            .await?
    } else {
        let query = format!(
            "SELECT {} FROM todos WHERE user_id = $1 {} LIMIT $2 OFFSET $3",
            COLUMNS, order_clause
        );
        sqlx::query_as::<_, TodoRow>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(start)
            .fetch_all(pool)
            .await?
    };

    Ok(rows.into_iter().map(Todo::from_row).collect())
}

/// Fetch one row, enforcing ownership: absent rows are 404, rows owned by
/// another user are 403.
pub async fn find(pool: &PgPool, id: i64, user_id: i64) -> Result<Todo, AppError> {
    let query = format!("SELECT {} FROM todos WHERE id = $1", COLUMNS);
    let row = sqlx::query_as::<_, TodoRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let todo = row
        .map(Todo::from_row)
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

    if todo.user_id != user_id {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    Ok(todo)
}

pub async fn create(
    pool: &PgPool,
    user_id: i64,
    title: &str,
    description: &str,
) -> Result<Todo, AppError> {
    let query = format!(
        "INSERT INTO todos (user_id, title, description) VALUES ($1, $2, $3) RETURNING {}",
        COLUMNS
    );
    let row = sqlx::query_as::<_, TodoRow>(&query)
        .bind(user_id)
        .bind(title)
        .bind(description)
        .fetch_one(pool)
        .await?;

    Ok(Todo::from_row(row))
}

/// Update a row; absent fields keep their current values
pub async fn update(
    pool: &PgPool,
    id: i64,
    user_id: i64,
    title: Option<&str>,
    description: Option<&str>,
    status: Option<&str>,
) -> Result<Todo, AppError> {
    let current = find(pool, id, user_id).await?;

    let title = title.unwrap_or(&current.title);
    let description = description.unwrap_or(&current.description);
    let status = status.unwrap_or(&current.status);

    let query = format!(
        r#"
        UPDATE todos
        SET title = $1, description = $2, status = $3, updated_at = now()
        WHERE id = $4
        RETURNING {}
        "#,
        COLUMNS
    );
    let row = sqlx::query_as::<_, TodoRow>(&query)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(Todo::from_row(row))
}

pub async fn delete(pool: &PgPool, id: i64, user_id: i64) -> Result<(), AppError> {
    find(pool, id, user_id).await?;

    sqlx::query("DELETE FROM todos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
