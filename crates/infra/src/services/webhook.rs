//! Outbound webhooks.
//!
//! Each event is POSTed, as its envelope JSON, to every webhook of the user that
//! subscribed to the event type on the event's phone number. Webhooks are notified
//! concurrently. A webhook gets two attempts; when the second one fails too a
//! `webhook.send.failed` event is emitted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use smsgate_core::{UserId, Webhook};
use smsgate_events::{Event, WebhookSendFailed};

use super::ServiceError;
use crate::dispatcher::EventPublisher;
use crate::repositories::WebhookRepository;

const ATTEMPTS: u32 = 2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const TOKEN_LIFETIME_MINUTES: i64 = 10;
pub const DEFAULT_ISSUER: &str = "smsgate-api";

/// Claims of the bearer token sent to signed webhooks.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

struct Failure {
    status: Option<u16>,
    message: String,
}

#[derive(Clone)]
pub struct WebhookService {
    repository: Arc<dyn WebhookRepository>,
    publisher: Arc<dyn EventPublisher>,
    client: reqwest::Client,
    issuer: String,
}

impl WebhookService {
    pub fn new(repository: Arc<dyn WebhookRepository>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            repository,
            publisher,
            client: reqwest::Client::new(),
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Deliver `event` to every matching webhook and wait for all deliveries.
    pub async fn send(&self, user_id: &UserId, event: &Event, phone_number: &str) -> Result<(), ServiceError> {
        let webhooks = self
            .repository
            .load_by_event(user_id, event.event_type().as_str(), phone_number)
            .await?;

        if webhooks.is_empty() {
            info!(
                user_id = %user_id,
                event_type = %event.event_type(),
                "user has no webhook subscribed to event"
            );
            return Ok(());
        }

        let event = Arc::new(event.clone());
        let mut deliveries = JoinSet::new();
        for webhook in webhooks {
            let this = self.clone();
            let event = Arc::clone(&event);
            let owner = phone_number.to_string();
            deliveries.spawn(async move { this.deliver(&event, &owner, &webhook).await });
        }

        while let Some(joined) = deliveries.join_next().await {
            if let Err(err) = joined {
                error!(event_id = %event.id(), error = %err, "webhook delivery task failed");
            }
        }
        Ok(())
    }

    async fn deliver(&self, event: &Event, owner: &str, webhook: &Webhook) {
        let mut last = None;
        for attempt in 1..=ATTEMPTS {
            match self.attempt(event, webhook).await {
                Ok(status) => {
                    info!(
                        webhook_id = %webhook.id,
                        url = %webhook.url,
                        event_id = %event.id(),
                        event_type = %event.event_type(),
                        status,
                        attempt,
                        "webhook delivered"
                    );
                    return;
                }
                Err(failure) => {
                    warn!(
                        webhook_id = %webhook.id,
                        url = %webhook.url,
                        event_id = %event.id(),
                        status = ?failure.status,
                        error = %failure.message,
                        attempt,
                        "cannot deliver webhook"
                    );
                    last = Some(failure);
                }
            }
        }

        if let Some(failure) = last {
            self.report_failure(event, owner, webhook, failure).await;
        }
    }

    async fn attempt(&self, event: &Event, webhook: &Webhook) -> Result<u16, Failure> {
        let body = event.to_json().map_err(|err| Failure {
            status: None,
            message: err.to_string(),
        })?;

        let mut request = self
            .client
            .post(&webhook.url)
            .timeout(REQUEST_TIMEOUT)
            .header("x-event-type", event.event_type().as_str())
            .header("content-type", "application/json")
            .body(body);

        if webhook.is_signed() {
            let token = self.auth_token(webhook).map_err(|err| Failure {
                status: None,
                message: format!("cannot sign webhook token: {err}"),
            })?;
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| Failure {
            status: None,
            message: if err.is_timeout() {
                format!("timeout after {} seconds", REQUEST_TIMEOUT.as_secs())
            } else {
                err.to_string()
            },
        })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
            let message = match response.text().await {
                Ok(body) if !body.is_empty() => body,
                _ => fallback,
            };
            return Err(Failure {
                status: Some(status.as_u16()),
                message,
            });
        }
        Ok(status.as_u16())
    }

    /// HS256 bearer token for a signed webhook.
    pub fn auth_token(&self, webhook: &Webhook) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let lifetime = TOKEN_LIFETIME_MINUTES * 60;
        let claims = WebhookClaims {
            iss: self.issuer.clone(),
            aud: webhook.url.clone(),
            sub: webhook.user_id.to_string(),
            iat: now,
            nbf: now - lifetime,
            exp: now + lifetime,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(webhook.signing_key.as_bytes()),
        )
    }

    async fn report_failure(&self, event: &Event, owner: &str, webhook: &Webhook, failure: Failure) {
        let payload = WebhookSendFailed {
            webhook_id: webhook.id,
            webhook_url: webhook.url.clone(),
            owner: owner.to_string(),
            user_id: webhook.user_id.clone(),
            event_id: event.id().to_string(),
            event_type: event.event_type(),
            event_payload: event.data().to_string(),
            http_response_status_code: failure.status,
            error_message: failure.message,
        };

        let failed = match Event::new(event.source(), &payload) {
            Ok(failed) => failed,
            Err(err) => {
                error!(webhook_id = %webhook.id, error = %err, "cannot create webhook failure event");
                return;
            }
        };
        let failed_id = failed.id().to_string();

        match self.publisher.dispatch(failed).await {
            Ok(()) => info!(
                webhook_id = %webhook.id,
                event_id = %failed_id,
                "webhook failure event dispatched"
            ),
            Err(err) => error!(
                webhook_id = %webhook.id,
                error = %err,
                "cannot dispatch webhook failure event"
            ),
        }
    }
}
