//! Subscriptions manager configuration.

use serde::{Deserialize, Serialize};

/// What to do when a topic is registered while already pending or active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReregistrationPolicy {
    /// Send another SUBSCRIBE. Each outstanding request resolves on its own;
    /// the latest acknowledgment determines the active record.
    #[default]
    Resubscribe,
    /// Refuse with `AlreadySubscribed`.
    Reject,
}

/// Subscriptions manager configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionsConfig {
    /// Policy for registering a topic that is already pending or active.
    pub reregistration: ReregistrationPolicy,

    /// Log a warning when the broker grants a lower QoS than requested.
    /// Default: true
    pub warn_on_downgrade: bool,
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            reregistration: ReregistrationPolicy::default(),
            warn_on_downgrade: true,
        }
    }
}

impl SubscriptionsConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
