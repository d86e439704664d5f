use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use smsgate_events::Event;

use crate::app::AppState;
use crate::app::errors::{dispatch_error_to_response, json_error};

/// POST /v1/events
///
/// Push queue callback: decodes the envelope in the body and dispatches it.
pub async fn consume(Extension(state): Extension<AppState>, body: Bytes) -> Response {
    let event = match Event::from_json(&body).and_then(|event| event.validate().map(|()| event)) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "rejected queued event");
            return json_error(StatusCode::BAD_REQUEST, "invalid_event", err.to_string());
        }
    };

    let event_id = event.id().to_string();
    let event_type = event.event_type();
    match state.dispatcher.dispatch(event).await {
        Ok(()) => {
            info!(event_id = %event_id, event_type = %event_type, "queued event consumed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => dispatch_error_to_response(err),
    }
}
