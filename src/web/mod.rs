//! HTTP surface: page routes, health probes, response hygiene headers.

pub mod pages;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use crate::errors::AppError;
use crate::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/about", get(about))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
}

/// GET / resolves the configured secrets and renders them. One full
/// resolution pass per request; a failure renders the error page instead.
async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let secrets = state.resolver.resolve(&state.config.secret_names).await?;
    tracing::info!("resolved {} secrets for index page", secrets.len());
    Ok(Html(pages::render_index(&state.config, &secrets)?))
}

/// GET /about describes what the page does. No vault access.
async fn about(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    Ok(Html(pages::render_about(&state.config)?))
}

/// GET /readyz probes the vault's health endpoint.
async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match crate::vault::health(&state.config.vault).await {
        Ok(true) => (StatusCode::OK, "ok"),
        Ok(false) => (StatusCode::SERVICE_UNAVAILABLE, "vault not ready"),
        Err(e) => {
            tracing::warn!("readiness probe failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "vault unreachable")
        }
    }
}

/// Middleware: injects a unique x-request-id into every response so page
/// errors can be correlated with logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
/// The index page carries live secret values, so caching is the main threat.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    // Nothing on this site may be cached; pages embed secrets.
    headers.insert("Cache-Control", "no-store".parse().unwrap());
    headers.insert("Pragma", "no-cache".parse().unwrap());

    // Prevent MIME-type sniffing
    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());

    // Prevent clickjacking by disallowing iframe embedding
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());

    // Strip Referrer so vault-facing URLs never leak
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());

    resp
}
