/// To-do Routes
///
/// CRUD over the principal's to-do items. Every handler authenticates the
/// access token first; rows are always filtered by the principal's id.

use serde_json::json;
use std::sync::Arc;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::models::todos;
use crate::router::{ApiResponse, HandlerFuture, RouteRequest};
use crate::startup::AppState;
use crate::validators::Validator;

/// GET /todo
///
/// Paged listing. `page` and `limit` control the window (`limit` defaults
/// to the principal's total row count), `status` filters, `order` sorts by
/// creation time.
pub fn index(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let principal = authenticate(&state.pool, &state.jwt, &req.ctx).await?;

        let total = todos::count(&state.pool, principal.user_id).await?;

        let limit = req
            .ctx
            .query_param("limit")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(total);
        let page = req
            .ctx
            .query_param("page")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1);
        let start = if page > 1 { (page * limit) - limit } else { 0 };

        let items = todos::list(
            &state.pool,
            principal.user_id,
            req.ctx.query_param("status"),
            req.ctx.query_param("order"),
            start,
            limit,
        )
        .await?;

        let data: Vec<_> = items.iter().map(todos::Todo::to_json).collect();

        Ok(ApiResponse::ok(json!({
            "data": data,
            "page": page,
            "limit": limit,
            "total": total,
        })))
    })
}

/// POST /todo
pub fn create(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let principal = authenticate(&state.pool, &state.jwt, &req.ctx).await?;

        let body = req.body.unwrap_or_default();
        let rules: Vec<(&str, &[&str])> = vec![
            ("title", &["required", "min_length:3", "max_length:100"]),
            ("description", &["required", "max_length:1000"]),
        ];
        let validator = Validator::set_rules(&body, &rules);
        if validator.has_errors() {
            return Err(validator.into_errors().into());
        }

        let todo = todos::create(
            &state.pool,
            principal.user_id,
            validator.validated("title"),
            validator.validated("description"),
        )
        .await?;

        tracing::info!(user_id = principal.user_id, todo_id = todo.id, "Todo created");

        Ok(ApiResponse::created(json!({
            "message": "Create successful",
            "data": todo.to_json(),
        })))
    })
}

/// GET /todo/{id}
pub fn show(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let principal = authenticate(&state.pool, &state.jwt, &req.ctx).await?;
        let id = bound_id(&req)?;

        let todo = todos::find(&state.pool, id, principal.user_id).await?;

        Ok(ApiResponse::ok(json!({ "data": todo.to_json() })))
    })
}

/// PUT /todo/{id}
pub fn update(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let principal = authenticate(&state.pool, &state.jwt, &req.ctx).await?;
        let id = bound_id(&req)?;

        let body = req.body.unwrap_or_default();
        let rules: Vec<(&str, &[&str])> = vec![
            ("title", &["required", "min_length:3", "max_length:100"]),
            ("description", &["required", "max_length:1000"]),
        ];
        let validator = Validator::set_rules(&body, &rules);
        if validator.has_errors() {
            return Err(validator.into_errors().into());
        }

        let todo = todos::update(
            &state.pool,
            id,
            principal.user_id,
            Some(validator.validated("title")),
            Some(validator.validated("description")),
            None,
        )
        .await?;

        Ok(ApiResponse::ok(json!({
            "message": "Update successful",
            "data": todo.to_json(),
        })))
    })
}

/// PUT /todo/{id}/mark-in-progress and PUT /todo/{id}/mark-done
///
/// Status shortcut; the target state is read off the matched path.
pub fn mark(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let principal = authenticate(&state.pool, &state.jwt, &req.ctx).await?;
        let id = bound_id(&req)?;

        let status = if req.ctx.path.contains("mark-in-progress") {
            "in progress"
        } else {
            "done"
        };

        let todo = todos::update(
            &state.pool,
            id,
            principal.user_id,
            None,
            None,
            Some(status),
        )
        .await?;

        Ok(ApiResponse::ok(json!({
            "message": "Update successful",
            "data": todo.to_json(),
        })))
    })
}

/// DELETE /todo/{id}
pub fn delete(state: Arc<AppState>, req: RouteRequest) -> HandlerFuture {
    Box::pin(async move {
        let principal = authenticate(&state.pool, &state.jwt, &req.ctx).await?;
        let id = bound_id(&req)?;

        todos::delete(&state.pool, id, principal.user_id).await?;

        tracing::info!(user_id = principal.user_id, todo_id = id, "Todo deleted");

        Ok(ApiResponse::no_content())
    })
}

fn bound_id(req: &RouteRequest) -> Result<i64, AppError> {
    req.id
        .ok_or_else(|| AppError::Internal("Route pattern bound no id".to_string()))
}
