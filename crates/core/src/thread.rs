//! Message thread: the per-conversation view derived from message lifecycle events.
//!
//! Lifecycle events for one message come from independent producers (the API
//! server and the phone) and may arrive in any order. [`MessageThread::evaluate`]
//! decides whether an incoming update is newer information about the thread or a
//! late echo that must be dropped.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::id::{MessageId, ThreadId, UserId};
use crate::message::MessageStatus;

/// UI colours assigned to new threads.
pub const COLORS: [&str; 17] = [
    "deep-purple",
    "indigo",
    "blue",
    "red",
    "pink",
    "purple",
    "light-blue",
    "cyan",
    "teal",
    "green",
    "light-green",
    "lime",
    "yellow",
    "amber",
    "orange",
    "deep-orange",
    "brown",
];

/// Pick a colour for a new thread.
pub fn random_color() -> &'static str {
    COLORS[rand::rng().random_range(0..COLORS.len())]
}

/// A lifecycle observation about one message, addressed to its thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUpdate {
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub message_id: MessageId,
    pub content: String,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of the update-acceptance rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    Accept,
    /// A placeholder status for the current message would undo confirmed progress.
    RejectRegression,
    /// The update is older than what the thread already shows for this message.
    RejectStale,
    /// The current message is delivered and cannot change any more.
    RejectTerminal,
}

impl UpdateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageThread {
    pub id: ThreadId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub is_archived: bool,
    pub color: String,
    pub last_message_id: MessageId,
    pub last_message_content: String,
    pub status: MessageStatus,
    pub order_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageThread {
    /// Seed a thread from the first update seen for its (owner, contact) pair.
    pub fn from_update(update: &ThreadUpdate, color: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ThreadId::new(),
            user_id: update.user_id.clone(),
            owner: update.owner.clone(),
            contact: update.contact.clone(),
            is_archived: false,
            color: color.into(),
            last_message_id: update.message_id,
            last_message_content: update.content.clone(),
            status: update.status,
            order_timestamp: update.timestamp,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decide whether `update` may overwrite this thread.
    ///
    /// Rules are checked in order; the first that matches wins.
    pub fn evaluate(&self, update: &ThreadUpdate) -> UpdateDecision {
        let same_message = self.last_message_id == update.message_id;

        if same_message
            && update.status.is_placeholder()
            && update.status.rank() < self.status.rank()
        {
            return UpdateDecision::RejectRegression;
        }

        if same_message
            && self.order_timestamp > update.timestamp
            && self.status != MessageStatus::Sending
        {
            return UpdateDecision::RejectStale;
        }

        if same_message && self.status == MessageStatus::Delivered {
            return UpdateDecision::RejectTerminal;
        }

        UpdateDecision::Accept
    }

    /// Overwrite the head of the thread. Callers check [`Self::evaluate`] first.
    pub fn apply(&mut self, update: &ThreadUpdate) {
        self.last_message_id = update.message_id;
        self.last_message_content = update.content.clone();
        self.status = update.status;
        self.order_timestamp = update.timestamp;
        self.updated_at = Utc::now();
    }

    /// Evaluate and apply in one step, returning the decision.
    pub fn try_apply(&mut self, update: &ThreadUpdate) -> UpdateDecision {
        let decision = self.evaluate(update);
        if decision.is_accepted() {
            self.apply(update);
        }
        decision
    }

    /// Point the thread back at the message that preceded a deleted head.
    pub fn rollback(
        &mut self,
        message_id: MessageId,
        content: impl Into<String>,
        status: MessageStatus,
    ) {
        self.last_message_id = message_id;
        self.last_message_content = content.into();
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_archived(&mut self, is_archived: bool) {
        self.is_archived = is_archived;
        self.updated_at = Utc::now();
    }
}
