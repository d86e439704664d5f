//! Realtime notifications as server-sent events.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Extension, Query},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Channel to follow; clients use their user id.
    pub channel: String,
}

/// GET /v1/stream?channel=<user id>
///
/// Each realtime notification on the channel becomes one SSE event named after the
/// pipeline event type. Notifications that overflow a slow client are dropped.
pub async fn stream(
    Extension(state): Extension<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let channel = query.channel;
    let rx = state.realtime.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.channel == channel => {
            let data = serde_json::to_string(&m).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.event).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
