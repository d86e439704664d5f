//! Message lifecycle status.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle status of an SMS message, as mirrored on its thread.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Scheduled,
    Sending,
    Sent,
    Delivered,
    Failed,
    Expired,
    Received,
}

impl MessageStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Received => "received",
        }
    }

    /// Progress of the status along the outbound lifecycle.
    ///
    /// Placeholder states rank below `sent`; every final outcome shares the top rank.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Scheduled => 1,
            Self::Sending => 2,
            Self::Sent => 3,
            Self::Delivered | Self::Failed | Self::Expired | Self::Received => 4,
        }
    }

    /// `true` for the early states reported before the phone confirms anything.
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled | Self::Sending)
    }
}

impl core::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            "received" => Ok(Self::Received),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_rank_below_sent() {
        for status in [MessageStatus::Pending, MessageStatus::Scheduled, MessageStatus::Sending] {
            assert!(status.is_placeholder());
            assert!(status.rank() < MessageStatus::Sent.rank());
        }
        assert!(!MessageStatus::Delivered.is_placeholder());
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("delivered".parse::<MessageStatus>().unwrap(), MessageStatus::Delivered);
        assert_eq!(
            serde_json::to_string(&MessageStatus::Sending).unwrap(),
            "\"sending\""
        );
        assert!(matches!(
            "lost".parse::<MessageStatus>(),
            Err(DomainError::UnknownStatus(_))
        ));
    }
}
