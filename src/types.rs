//! Core types shared across the subscription engine.

use crate::error::{Result, SubscriptionError};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;

/// Identifier correlating a SUBSCRIBE with its SUBACK.
///
/// MQTT carries identifiers as non-zero 16-bit values; the default (0) is
/// never allocated and so never correlates with a pending request.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MessageIdentifier(pub u16);

impl MessageIdentifier {
    /// Lowest identifier ever handed out.
    pub const FIRST: MessageIdentifier = MessageIdentifier(1);

    /// The identifier following this one, wrapping from `u16::MAX` back to 1.
    pub fn next(self) -> Self {
        if self.0 == u16::MAX {
            Self::FIRST
        } else {
            MessageIdentifier(self.0 + 1)
        }
    }
}

impl fmt::Debug for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MsgId({})", self.0)
    }
}

impl fmt::Display for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for MessageIdentifier {
    fn from(value: u16) -> Self {
        MessageIdentifier(value)
    }
}

/// Delivery guarantee level for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl Qos {
    /// Wire value of this level.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Qos {
    type Error = SubscriptionError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(SubscriptionError::InvalidQos(other)),
        }
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Qos::AtMostOnce => "AtMostOnce",
            Qos::AtLeastOnce => "AtLeastOnce",
            Qos::ExactlyOnce => "ExactlyOnce",
        };
        f.write_str(name)
    }
}

/// Negotiation state of a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No SUBSCRIBE has been issued for the topic.
    NotSubscribed,
    /// SUBSCRIBE sent, SUBACK outstanding.
    Pending,
    /// Confirmed by the broker.
    Active,
}

/// Describes the payload type a subscription decodes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PayloadType {
    name: &'static str,
    id: TypeId,
}

impl PayloadType {
    /// Descriptor for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this descriptor names `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
