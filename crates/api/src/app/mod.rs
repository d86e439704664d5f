pub mod errors;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use tower::ServiceBuilder;

use smsgate_infra::Dispatcher;
use smsgate_infra::realtime::BroadcastNotifier;

use crate::middleware::{ApiKeyState, api_key_middleware};

/// What the handlers need from the wired pipeline.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub realtime: BroadcastNotifier,
}

pub fn build_app(state: AppState, api_key: impl Into<Arc<str>>) -> Router {
    let protected = Router::new()
        .route("/events", post(routes::events::consume))
        .route("/stream", get(routes::stream::stream))
        .layer(Extension(state))
        .layer(axum::middleware::from_fn_with_state(
            ApiKeyState {
                api_key: api_key.into(),
            },
            api_key_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", protected)
        .layer(ServiceBuilder::new())
}
