use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use smsgate_infra::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Event(e) => json_error(StatusCode::BAD_REQUEST, "invalid_event", e.to_string()),
        DispatchError::Store(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string()),
        DispatchError::Queue(e) => json_error(StatusCode::BAD_GATEWAY, "queue_error", e.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": {
                "code": code,
                "message": message.into(),
            }
        })),
    )
        .into_response()
}
