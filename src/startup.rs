/// HTTP boundary
///
/// Owns everything the core router does not: the actix server, the
/// throttle/rate-limit gate in front of dispatch, translation between the
/// framework request and the router's `RequestContext`, and the mapping of
/// typed errors to status codes, CORS headers, rate-limit headers, and the
/// refresh-token cookie.

use actix_web::cookie::{time, Cookie};
use actix_web::dev::Server;
use actix_web::http::{Method, StatusCode};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::configuration::JwtSettings;
use crate::error::AppError;
use crate::logger::RequestLogger;
use crate::rate_limit::{MemoryCounterStore, Quota, RateLimiter, Throttle};
use crate::router::{parse_query, ApiResponse, RequestContext, Router};
use crate::routes;

const RATE_LIMIT: u32 = 60;
const RATE_WINDOW_SECONDS: i64 = 60;
const THROTTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Shared state handed to every handler
pub struct AppState {
    pub pool: PgPool,
    pub jwt: JwtSettings,
    pub rate_limiter: RateLimiter,
    pub throttle: Throttle,
}

/// The application's route table
pub fn build_router() -> Router<Arc<AppState>> {
    let mut router = Router::new();

    router.register(Method::POST, "/register", "register", routes::register);
    router.register(Method::POST, "/login", "login", routes::login);
    router.register(Method::GET, "/refresh", "refresh", routes::refresh);

    router.register(Method::POST, "/todo", "todo_create", routes::todo_create);
    router.register(Method::GET, "/todo", "todo_index", routes::todo_index);
    router.register(Method::GET, "/todo/{id}", "todo_show", routes::todo_show);
    router.register(Method::PUT, "/todo/{id}", "todo_update", routes::todo_update);
    router.register(
        Method::PUT,
        "/todo/{id}/mark-in-progress",
        "todo_mark",
        routes::todo_mark,
    );
    router.register(
        Method::PUT,
        "/todo/{id}/mark-done",
        "todo_mark",
        routes::todo_mark,
    );
    router.register(Method::DELETE, "/todo/{id}", "todo_delete", routes::todo_delete);

    router
}

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let state = Arc::new(AppState {
        pool: connection,
        jwt: jwt_config,
        rate_limiter: RateLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            RATE_LIMIT,
            RATE_WINDOW_SECONDS,
        ),
        throttle: Throttle::new(THROTTLE_INTERVAL),
    });

    let state_data = web::Data::from(state);
    let router_data = web::Data::new(build_router());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(state_data.clone())
            .app_data(router_data.clone())
            .route("/health_check", web::get().to(routes::health_check))
            .default_service(web::route().to(api_entry))
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Single entry point for every API request: throttle, rate limit, build
/// the request context, dispatch, render.
async fn api_entry(
    req: HttpRequest,
    body: web::Bytes,
    router: web::Data<Router<Arc<AppState>>>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let client = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if let Some(delay) = state.throttle.check(&client) {
        tokio::time::sleep(delay).await;
    }

    let quota = state.rate_limiter.attempt(&client);
    if !quota.allowed {
        return render(Err(AppError::RateLimited), &quota);
    }

    let ctx = request_context(&req, &body);
    let result = router.dispatch(state.clone().into_inner(), ctx).await;

    render(result, &quota)
}

fn request_context(req: &HttpRequest, body: &web::Bytes) -> RequestContext {
    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    RequestContext {
        method: req.method().clone(),
        path: req.path().to_string(),
        headers,
        query: parse_query(req.query_string()),
        body: body.to_vec(),
    }
}

/// Serialize a handler result. CORS headers go on every response;
/// rate-limit headers on everything except server errors and 429.
fn render(result: Result<ApiResponse, AppError>, quota: &Quota) -> HttpResponse {
    let response = match result {
        Ok(response) => response,
        Err(error) => {
            let request_id = uuid::Uuid::new_v4().to_string();
            error.log(&request_id);
            ApiResponse::with_status(error.status_code(), error.body())
        }
    };

    let mut builder = HttpResponse::build(response.status);

    builder.insert_header(("Access-Control-Allow-Origin", "*"));
    builder.insert_header(("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE"));
    builder.insert_header((
        "Access-Control-Allow-Headers",
        "Content-Type, Authorization, X-RateLimit-Limit, X-RateLimit-Remaining, X-RateLimit-Reset",
    ));

    if !response.status.is_server_error() && response.status != StatusCode::TOO_MANY_REQUESTS {
        builder.insert_header(("X-RateLimit-Limit", quota.limit.to_string()));
        builder.insert_header(("X-RateLimit-Remaining", quota.remaining.to_string()));
        builder.insert_header(("X-RateLimit-Reset", quota.reset_at.to_string()));
    }

    if let Some(refresh) = &response.refresh_cookie {
        builder.cookie(
            Cookie::build("refresh_token", refresh.value.clone())
                .path("/")
                .http_only(true)
                .max_age(time::Duration::seconds(refresh.max_age_seconds))
                .finish(),
        );
    }

    if response.status == StatusCode::NO_CONTENT {
        builder.finish()
    } else {
        builder.json(response.body)
    }
}
