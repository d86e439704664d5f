//! Process configuration read from the environment.

use std::str::FromStr;

use envconfig::Envconfig;
use thiserror::Error;

use crate::push_queue::PushQueueConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envconfig::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which push queue deferred events go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushQueueBackend {
    InMemory,
    Emulator,
}

impl FromStr for PushQueueBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-memory" | "memory" => Ok(Self::InMemory),
            "emulator" => Ok(Self::Emulator),
            other => Err(ConfigError::Invalid(format!("unknown push queue backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Envconfig)]
pub struct PipelineConfig {
    #[envconfig(from = "HTTP_PORT", default = "8080")]
    pub http_port: u16,

    /// Postgres stores are used when set; in-memory ones otherwise.
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[envconfig(from = "PUSH_QUEUE_BACKEND", default = "in-memory")]
    pub push_queue_backend: PushQueueBackend,

    #[envconfig(from = "PUSH_QUEUE_NAME", default = "events-queue")]
    pub push_queue_name: String,

    #[envconfig(from = "EVENTS_QUEUE_ENDPOINT", default = "http://localhost:8080/v1/events")]
    pub events_queue_endpoint: String,

    #[envconfig(from = "EVENTS_QUEUE_USER_API_KEY", default = "")]
    pub events_queue_user_api_key: String,

    #[envconfig(from = "EVENTS_QUEUE_USER_ID", default = "")]
    pub events_queue_user_id: String,

    #[envconfig(from = "EVENT_SOURCE", default = "smsgate-api")]
    pub event_source: String,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::init_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// The consumer endpoint authenticates queue callbacks with this key, so an
    /// empty one would accept anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events_queue_user_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "EVENTS_QUEUE_USER_API_KEY must be set".to_string(),
            ));
        }
        if self.event_source.trim().is_empty() {
            return Err(ConfigError::Invalid("EVENT_SOURCE must not be blank".to_string()));
        }
        Ok(())
    }

    pub fn queue_config(&self) -> PushQueueConfig {
        PushQueueConfig {
            name: self.push_queue_name.clone(),
            user_api_key: self.events_queue_user_api_key.clone(),
            user_id: self.events_queue_user_id.clone(),
            consumer_endpoint: self.events_queue_endpoint.clone(),
        }
    }
}
