/// Router / Dispatcher
///
/// Matches an inbound method+path against registered route entries,
/// extracts the bound path id, parses the request body, and invokes the
/// handler. The router never writes HTTP responses; it returns an
/// `ApiResponse` or a typed error and leaves status mapping to the
/// boundary. There is no middleware chaining here: auth and rate limiting
/// run in handlers or the boundary, and exactly one handler executes per
/// request.
///
/// Requests arrive as an explicit `RequestContext` (method, path, headers,
/// query, raw body), so matching and dispatch are testable without a live
/// server.

use std::collections::HashMap;

use actix_web::http::{Method, StatusCode};
use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};

use crate::error::{AppError, AuthError};

/// Everything a handler may need from the inbound request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RequestContext {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Token from the `Authorization` header
    ///
    /// `Ok(None)` when the header is absent (callers decide whether that is
    /// fatal); `Unauthorized` when the header is present but the scheme is
    /// not literally `Bearer` or the token part is missing.
    pub fn bearer_token(&self) -> Result<Option<String>, AppError> {
        let header = match self.header("authorization") {
            Some(value) => value,
            None => return Ok(None),
        };

        let mut parts = header.splitn(2, ' ');
        if parts.next() != Some("Bearer") {
            return Err(AppError::Auth(AuthError::Unauthorized));
        }

        match parts.next().map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Ok(Some(token.to_string())),
            None => Err(AppError::Auth(AuthError::Unauthorized)),
        }
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.header("cookie")?;
        for pair in header.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name {
                    return Some(value.to_string());
                }
            }
        }
        None
    }
}

/// Response produced by a handler, serialized by the boundary
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
    /// Refresh token to be delivered as an HTTP-only cookie
    pub refresh_cookie: Option<RefreshCookie>,
}

#[derive(Debug, Clone)]
pub struct RefreshCookie {
    pub value: String,
    pub max_age_seconds: i64,
}

impl ApiResponse {
    pub fn with_status(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            refresh_cookie: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::with_status(StatusCode::OK, body)
    }

    pub fn created(body: Value) -> Self {
        Self::with_status(StatusCode::CREATED, body)
    }

    pub fn no_content() -> Self {
        Self::with_status(StatusCode::NO_CONTENT, Value::Null)
    }

    pub fn refresh_cookie(mut self, value: &str, max_age_seconds: i64) -> Self {
        self.refresh_cookie = Some(RefreshCookie {
            value: value.to_string(),
            max_age_seconds,
        });
        self
    }
}

/// What a matched route hands to its handler
#[derive(Debug)]
pub struct RouteRequest {
    pub ctx: RequestContext,
    /// Integer bound by the pattern's placeholder segment, if any
    pub id: Option<i64>,
    /// Parsed body for PUT/POST requests
    pub body: Option<Map<String, Value>>,
}

pub type HandlerFuture = LocalBoxFuture<'static, Result<ApiResponse, AppError>>;
pub type Handler<S> = fn(S, RouteRequest) -> HandlerFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder,
}

struct Route<S> {
    method: Method,
    segments: Vec<Segment>,
    operation: &'static str,
    handler: Handler<S>,
}

pub struct Router<S> {
    routes: Vec<Route<S>>,
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        operation: &'static str,
        handler: Handler<S>,
    ) {
        self.routes.push(Route {
            method,
            segments: parse_pattern(pattern),
            operation,
            handler,
        });
    }

    /// Resolve and run the handler for a request
    ///
    /// Entries are scanned in registration order, restricted to the
    /// request's method; the first full match wins. No match is `NotFound`.
    pub async fn dispatch(&self, state: S, ctx: RequestContext) -> Result<ApiResponse, AppError> {
        let path_segments = split_path(&ctx.path);

        let mut matched = None;
        for route in &self.routes {
            if route.method != ctx.method {
                continue;
            }
            if let Some(id) = match_segments(&route.segments, &path_segments) {
                matched = Some((route, id));
                break;
            }
        }

        let (route, id) = matched.ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

        let body = if ctx.method == Method::POST || ctx.method == Method::PUT {
            Some(parse_body(&ctx.body))
        } else {
            None
        };

        tracing::debug!(
            operation = route.operation,
            path = %ctx.path,
            "Dispatching request"
        );

        (route.handler)(state, RouteRequest { ctx, id, body }).await
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .trim_matches('/')
        .split('/')
        .map(|segment| {
            if segment.starts_with('{') && segment.ends_with('}') && segment.len() >= 2 {
                Segment::Placeholder
            } else {
                Segment::Literal(segment.to_string())
            }
        })
        .collect()
}

/// Trim surrounding slashes and strip characters that cannot appear in a
/// URL path before splitting.
fn split_path(path: &str) -> Vec<String> {
    let decoded = urlencoding::decode(path)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| path.to_string());

    let sanitized: String = decoded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=".contains(*c))
        .collect();

    sanitized
        .trim_matches('/')
        .split('/')
        .map(str::to_string)
        .collect()
}

/// Pairwise segment comparison. Equal counts required; a placeholder
/// matches a non-negative integer literal and binds it; the last bound id
/// wins when a pattern carries several placeholders.
fn match_segments(pattern: &[Segment], path: &[String]) -> Option<Option<i64>> {
    if pattern.len() != path.len() {
        return None;
    }

    let mut id = None;
    for (expected, actual) in pattern.iter().zip(path) {
        match expected {
            Segment::Literal(literal) => {
                if literal != actual {
                    return None;
                }
            }
            Segment::Placeholder => {
                if actual.is_empty() || !actual.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                id = Some(actual.parse::<i64>().ok()?);
            }
        }
    }

    Some(id)
}

/// Body decoding for PUT/POST: structured JSON first, form-encoded pairs
/// as the fallback. Handlers receive an untyped map either way; field
/// correctness is the validator's job.
fn parse_body(raw: &[u8]) -> Map<String, Value> {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(raw) {
        return map;
    }
    parse_form_pairs(&String::from_utf8_lossy(raw))
}

fn parse_form_pairs(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for pair in text.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.insert(
            decode_form_component(key),
            Value::String(decode_form_component(value)),
        );
    }
    map
}

fn decode_form_component(component: &str) -> String {
    let with_spaces = component.replace('+', " ");
    urlencoding::decode(&with_spaces)
        .map(|cow| cow.into_owned())
        .unwrap_or(with_spaces)
}

/// Query-string parsing for the boundary
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.insert(decode_form_component(key), decode_form_component(value));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_id(_state: (), req: RouteRequest) -> HandlerFuture {
        Box::pin(async move { Ok(ApiResponse::ok(json!({ "id": req.id }))) })
    }

    fn echo_body(_state: (), req: RouteRequest) -> HandlerFuture {
        Box::pin(async move {
            Ok(ApiResponse::ok(json!({
                "body": req.body.map(Value::Object)
            })))
        })
    }

    fn test_router() -> Router<()> {
        let mut router = Router::new();
        router.register(Method::GET, "/todo", "index", echo_id);
        router.register(Method::GET, "/todo/{id}", "show", echo_id);
        router.register(Method::PUT, "/todo/{id}/mark-done", "mark", echo_id);
        router.register(Method::POST, "/todo", "create", echo_body);
        router
    }

    #[tokio::test]
    async fn placeholder_binds_integer_id() {
        let router = test_router();
        let ctx = RequestContext::new(Method::GET, "/todo/42");

        let response = router.dispatch((), ctx).await.unwrap();
        assert_eq!(response.body["id"], 42);
    }

    #[tokio::test]
    async fn non_numeric_segment_does_not_match_placeholder() {
        let router = test_router();
        let ctx = RequestContext::new(Method::GET, "/todo/abc");

        let result = router.dispatch((), ctx).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn segment_count_mismatch_does_not_match() {
        let router = test_router();
        let ctx = RequestContext::new(Method::GET, "/todo/42/extra");

        let result = router.dispatch((), ctx).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn literal_route_matches_without_id() {
        let router = test_router();
        let ctx = RequestContext::new(Method::GET, "/todo");

        let response = router.dispatch((), ctx).await.unwrap();
        assert_eq!(response.body["id"], Value::Null);
    }

    #[tokio::test]
    async fn method_restricts_matching() {
        let router = test_router();
        let ctx = RequestContext::new(Method::DELETE, "/todo/42");

        let result = router.dispatch((), ctx).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn trailing_slash_is_trimmed() {
        let router = test_router();
        let ctx = RequestContext::new(Method::GET, "/todo/42/");

        let response = router.dispatch((), ctx).await.unwrap();
        assert_eq!(response.body["id"], 42);
    }

    #[tokio::test]
    async fn mixed_literal_and_placeholder_segments() {
        let router = test_router();
        let ctx = RequestContext::new(Method::PUT, "/todo/7/mark-done");

        let response = router.dispatch((), ctx).await.unwrap();
        assert_eq!(response.body["id"], 7);
    }

    #[tokio::test]
    async fn post_body_is_parsed_as_json() {
        let router = test_router();
        let mut ctx = RequestContext::new(Method::POST, "/todo");
        ctx.body = br#"{"title":"write tests","done":false}"#.to_vec();

        let response = router.dispatch((), ctx).await.unwrap();
        assert_eq!(response.body["body"]["title"], "write tests");
        assert_eq!(response.body["body"]["done"], false);
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_form_pairs() {
        let router = test_router();
        let mut ctx = RequestContext::new(Method::POST, "/todo");
        ctx.body = b"title=write+tests&description=now%21".to_vec();

        let response = router.dispatch((), ctx).await.unwrap();
        assert_eq!(response.body["body"]["title"], "write tests");
        assert_eq!(response.body["body"]["description"], "now!");
    }

    #[test]
    fn negative_id_does_not_match_placeholder() {
        let pattern = parse_pattern("/todo/{id}");
        let path = split_path("/todo/-5");

        assert_eq!(match_segments(&pattern, &path), None);
    }

    #[test]
    fn bearer_token_extraction() {
        let mut ctx = RequestContext::new(Method::GET, "/refresh");
        assert_eq!(ctx.bearer_token().unwrap(), None);

        ctx.headers
            .insert("authorization".to_string(), "Bearer abc.def.ghi".to_string());
        assert_eq!(ctx.bearer_token().unwrap(), Some("abc.def.ghi".to_string()));

        ctx.headers
            .insert("authorization".to_string(), "Basic dXNlcjpwYXNz".to_string());
        assert!(ctx.bearer_token().is_err());

        ctx.headers
            .insert("authorization".to_string(), "Bearer".to_string());
        assert!(ctx.bearer_token().is_err());
    }

    #[test]
    fn cookie_extraction() {
        let mut ctx = RequestContext::new(Method::GET, "/refresh");
        assert_eq!(ctx.cookie("refresh_token"), None);

        ctx.headers.insert(
            "cookie".to_string(),
            "theme=dark; refresh_token=tok123; lang=en".to_string(),
        );
        assert_eq!(ctx.cookie("refresh_token"), Some("tok123".to_string()));
        assert_eq!(ctx.cookie("missing"), None);
    }

    #[test]
    fn query_parsing() {
        let query = parse_query("page=2&limit=10&status=in+progress");
        assert_eq!(query.get("page").map(String::as_str), Some("2"));
        assert_eq!(query.get("status").map(String::as_str), Some("in progress"));
    }
}
