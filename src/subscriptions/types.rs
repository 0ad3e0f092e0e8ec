//! Subscription record.

use crate::error::Result;
use crate::payload::ConverterHandle;
use crate::types::{MessageIdentifier, PayloadType, Qos, SubscriptionStatus};
use std::any::Any;

/// One topic's negotiation outcome.
///
/// Created `Pending` at registration and turned `Active` exactly once, when
/// the SUBACK for its message identifier arrives.
#[derive(Clone, Debug)]
pub struct Subscription {
    topic: String,
    /// Identifier of the SUBSCRIBE this record was created for.
    message_identifier: MessageIdentifier,
    requested_qos: Qos,
    /// Set on acknowledgment; authoritative over `requested_qos`.
    granted_qos: Option<Qos>,
    status: SubscriptionStatus,
    converter: ConverterHandle,
    /// Registration order within the registry; unlike the identifier it
    /// never wraps.
    pub(crate) sequence: u64,
}

impl Subscription {
    pub(crate) fn pending(
        message_identifier: MessageIdentifier,
        topic: String,
        requested_qos: Qos,
        converter: ConverterHandle,
    ) -> Self {
        Self {
            topic,
            message_identifier,
            requested_qos,
            granted_qos: None,
            status: SubscriptionStatus::Pending,
            converter,
            sequence: 0,
        }
    }

    pub(crate) fn activate(mut self, granted_qos: Qos) -> Self {
        self.granted_qos = Some(granted_qos);
        self.status = SubscriptionStatus::Active;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_identifier(&self) -> MessageIdentifier {
        self.message_identifier
    }

    pub fn requested_qos(&self) -> Qos {
        self.requested_qos
    }

    /// QoS granted by the broker. `None` while pending.
    pub fn granted_qos(&self) -> Option<Qos> {
        self.granted_qos
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn payload_type(&self) -> PayloadType {
        self.converter.payload_type()
    }

    pub fn converter(&self) -> &ConverterHandle {
        &self.converter
    }

    /// Decode a received payload with this subscription's converter.
    pub fn decode_payload<T: 'static>(&self, bytes: &[u8]) -> Result<T> {
        self.converter.decode(bytes)
    }

    pub fn decode_any(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>> {
        self.converter.decode_any(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::AsciiPayloadConverter;

    #[test]
    fn test_pending_then_active() {
        let sub = Subscription::pending(
            MessageIdentifier(4),
            "sensors/temp".to_string(),
            Qos::ExactlyOnce,
            ConverterHandle::new(AsciiPayloadConverter),
        );
        assert_eq!(sub.status(), SubscriptionStatus::Pending);
        assert_eq!(sub.granted_qos(), None);

        let sub = sub.activate(Qos::AtLeastOnce);
        assert!(sub.is_active());
        assert_eq!(sub.requested_qos(), Qos::ExactlyOnce);
        assert_eq!(sub.granted_qos(), Some(Qos::AtLeastOnce));
        assert_eq!(sub.message_identifier(), MessageIdentifier(4));
        assert!(sub.payload_type().is::<String>());
        assert_eq!(sub.decode_payload::<String>(b"21.5").unwrap(), "21.5");
    }
}
