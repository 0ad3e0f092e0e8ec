//! Error types for subscription management.

use crate::types::MessageIdentifier;
use thiserror::Error;

/// Main error type for subscription operations.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Unsolicited acknowledgment: no pending subscription for message identifier {message_identifier}")]
    UnsolicitedAcknowledgment { message_identifier: MessageIdentifier },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Topic already subscribed: {0}")]
    AlreadySubscribed(String),

    #[error("Grant count mismatch for message identifier {message_identifier}: expected {expected}, got {got}")]
    GrantCountMismatch {
        message_identifier: MessageIdentifier,
        expected: usize,
        got: usize,
    },

    #[error("Invalid QoS value: {0}")]
    InvalidQos(u8),

    #[error("No free message identifiers: every identifier is pending")]
    IdentifiersExhausted,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Payload conversion error: {0}")]
    Conversion(String),

    #[error("Payload type mismatch: subscription carries {expected}, requested {requested}")]
    PayloadTypeMismatch {
        expected: &'static str,
        requested: &'static str,
    },

    #[error("Subscriptions manager has been disposed")]
    Disposed,
}

impl From<serde_json::Error> for SubscriptionError {
    fn from(e: serde_json::Error) -> Self {
        SubscriptionError::Conversion(e.to_string())
    }
}

/// Result type for subscription operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
