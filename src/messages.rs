//! Protocol messages exchanged with the connection handler.
//!
//! Only the shapes are modeled here; framing and wire encoding belong to the
//! transport.

use crate::types::{MessageIdentifier, Qos};
use serde::{Deserialize, Serialize};

/// MQTT v3 control packet types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Connect,
    ConnectAck,
    Publish,
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
}

/// SUBSCRIBE request: one identifier, ordered (topic, requested QoS) pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeMessage {
    pub message_identifier: MessageIdentifier,
    pub subscriptions: Vec<(String, Qos)>,
}

impl SubscribeMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message_identifier(mut self, id: MessageIdentifier) -> Self {
        self.message_identifier = id;
        self
    }

    pub fn add_subscription(mut self, topic: impl Into<String>, qos: Qos) -> Self {
        self.subscriptions.push((topic.into(), qos));
        self
    }

    /// Requested QoS for `topic`, if present.
    pub fn requested_qos(&self, topic: &str) -> Option<Qos> {
        self.subscriptions
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, qos)| *qos)
    }
}

/// SUBACK: one identifier, granted QoS per requested topic in request order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeAckMessage {
    pub message_identifier: MessageIdentifier,
    pub qos_grants: Vec<Qos>,
}

impl SubscribeAckMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message_identifier(mut self, id: impl Into<MessageIdentifier>) -> Self {
        self.message_identifier = id.into();
        self
    }

    pub fn add_qos_grant(mut self, qos: Qos) -> Self {
        self.qos_grants.push(qos);
        self
    }
}

/// A decoded protocol message as seen by this subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Subscribe(SubscribeMessage),
    SubscribeAck(SubscribeAckMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Subscribe(_) => MessageType::Subscribe,
            Message::SubscribeAck(_) => MessageType::SubscribeAck,
        }
    }
}

impl From<SubscribeMessage> for Message {
    fn from(msg: SubscribeMessage) -> Self {
        Message::Subscribe(msg)
    }
}

impl From<SubscribeAckMessage> for Message {
    fn from(msg: SubscribeAckMessage) -> Self {
        Message::SubscribeAck(msg)
    }
}
