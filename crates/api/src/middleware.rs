use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use smsgate_infra::push_queue::API_KEY_HEADER;

use crate::app::errors::json_error;

/// The key push queue callbacks must present.
#[derive(Clone)]
pub struct ApiKeyState {
    pub api_key: Arc<str>,
}

pub async fn api_key_middleware(
    State(state): State<ApiKeyState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let authorized = matches!(
        extract_api_key(req.headers()),
        Some(key) if !state.api_key.is_empty() && key == &*state.api_key
    );
    if !authorized {
        tracing::warn!(path = %req.uri().path(), "request rejected: invalid api key");
        return Err(json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid api key"));
    }

    Ok(next.run(req).await)
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|k| !k.is_empty())
}
