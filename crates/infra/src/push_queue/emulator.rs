use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use super::{HttpMethod, PushQueue, PushQueueError, PushQueueTask};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Local-development stand-in for the cloud queue.
///
/// Waits on a tokio timer and then performs the task's HTTP request itself, so the
/// consumer endpoint is exercised exactly as it would be in production.
pub struct EmulatorPushQueue {
    name: String,
    client: reqwest::Client,
}

impl EmulatorPushQueue {
    pub fn new(name: impl Into<String>) -> Result<Self, PushQueueError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PushQueueError::Enqueue(format!("cannot build http client: {e}")))?;
        Ok(Self::with_client(name, client))
    }

    pub fn with_client(name: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl PushQueue for EmulatorPushQueue {
    async fn enqueue(&self, task: PushQueueTask, delay: Duration) -> Result<String, PushQueueError> {
        let queue_id = Uuid::new_v4().to_string();
        let client = self.client.clone();
        let name = self.name.clone();
        let id = queue_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let method = match task.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
            };
            let mut request = client.request(method, &task.url).body(task.body);
            for (key, value) in &task.headers {
                request = request.header(key, value);
            }

            match request.send().await {
                Ok(response) => info!(
                    queue = %name,
                    queue_id = %id,
                    url = %task.url,
                    status = response.status().as_u16(),
                    "emulated queue task delivered"
                ),
                Err(err) => error!(
                    queue = %name,
                    queue_id = %id,
                    url = %task.url,
                    error = %err,
                    "cannot deliver emulated queue task"
                ),
            }
        });

        info!(
            queue = %self.name,
            queue_id = %queue_id,
            delay_ms = delay.as_millis() as u64,
            "item added to emulator queue"
        );
        Ok(queue_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use tokio::sync::mpsc;

    async fn capture(
        State(tx): State<mpsc::UnboundedSender<(Option<String>, Bytes)>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let _ = tx.send((key, body));
        StatusCode::NO_CONTENT
    }

    #[tokio::test]
    async fn performs_the_request_after_the_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let app = Router::new().route("/v1/events", post(capture)).with_state(tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let queue = EmulatorPushQueue::new("emulator").unwrap();
        let mut headers = BTreeMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        let task = PushQueueTask {
            method: HttpMethod::Post,
            url: format!("http://{addr}/v1/events"),
            body: b"{\"id\":\"1\"}".to_vec(),
            headers,
        };

        queue.enqueue(task, Duration::from_millis(20)).await.unwrap();

        let (key, body) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key.as_deref(), Some("secret"));
        assert_eq!(&body[..], b"{\"id\":\"1\"}");
    }
}
