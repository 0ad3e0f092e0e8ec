//! Subscriptions manager: drives SUBSCRIBE/SUBACK negotiation.

use crate::config::{ReregistrationPolicy, SubscriptionsConfig};
use crate::connection::{ConnectionHandler, MessageCallback, PublishingManager};
use crate::error::{Result, SubscriptionError};
use crate::messages::{Message, MessageType, SubscribeAckMessage, SubscribeMessage};
use crate::payload::{ConverterHandle, PayloadConverter};
use crate::types::{MessageIdentifier, Qos, SubscriptionStatus};
use parking_lot::Mutex;
use std::sync::Arc;

use super::allocator::MessageIdentifierDispenser;
use super::registry::SubscriptionRegistry;
use super::types::Subscription;

/// Longest topic MQTT can encode (length-prefixed UTF-8 string).
const MAX_TOPIC_LENGTH: usize = u16::MAX as usize;

/// Manages the subscription lifecycle of a client connection.
///
/// On construction the manager installs one SUBACK callback on the
/// connection handler. `register_subscription` returns as soon as the
/// SUBSCRIBE is handed to the transport; completion is observed later via
/// [`get_subscriptions_status`](Self::get_subscriptions_status) or
/// [`get_subscription`](Self::get_subscription).
pub struct SubscriptionsManager {
    connection: Arc<dyn ConnectionHandler>,
    publishing: Arc<dyn PublishingManager>,
    registry: Arc<SubscriptionRegistry>,
    dispenser: MessageIdentifierDispenser,
    config: SubscriptionsConfig,
    /// SUBACK callback; `None` once disposed.
    callback: Mutex<Option<MessageCallback>>,
}

impl SubscriptionsManager {
    /// Create a manager with default configuration.
    pub fn new(
        connection: Arc<dyn ConnectionHandler>,
        publishing: Arc<dyn PublishingManager>,
    ) -> Self {
        Self::with_config(connection, publishing, SubscriptionsConfig::default())
    }

    /// Create a manager with custom configuration.
    pub fn with_config(
        connection: Arc<dyn ConnectionHandler>,
        publishing: Arc<dyn PublishingManager>,
        config: SubscriptionsConfig,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());

        let callback: MessageCallback = {
            let registry = Arc::clone(&registry);
            let warn_on_downgrade = config.warn_on_downgrade;
            Arc::new(move |message: &Message| match message {
                Message::SubscribeAck(ack) => {
                    confirm_subscription(&registry, ack, warn_on_downgrade).map(|_| true)
                }
                _ => Ok(false),
            })
        };
        connection.register_for_message(MessageType::SubscribeAck, callback.clone());

        Self {
            connection,
            publishing,
            registry,
            dispenser: MessageIdentifierDispenser::new(),
            config,
            callback: Mutex::new(Some(callback)),
        }
    }

    /// Request a subscription to `topic`.
    ///
    /// Allocates a message identifier, records the request as pending and
    /// sends a SUBSCRIBE. Returns the allocated identifier. If the send
    /// fails the pending record is removed and the transport error returned.
    pub fn register_subscription<C: PayloadConverter>(
        &self,
        topic: &str,
        qos: Qos,
        converter: C,
    ) -> Result<MessageIdentifier> {
        if self.is_disposed() {
            return Err(SubscriptionError::Disposed);
        }
        validate_topic(topic)?;

        let converter = ConverterHandle::new(converter);
        let exclusive = self.config.reregistration == ReregistrationPolicy::Reject;
        let id = self.registry.allocate_pending(
            || self.dispenser.next(),
            topic,
            qos,
            converter,
            exclusive,
        )?;

        let message = SubscribeMessage::new()
            .with_message_identifier(id)
            .add_subscription(topic, qos);

        if let Err(e) = self.connection.send_message(message.into()) {
            self.registry.discard_pending(id);
            tracing::warn!(topic = %topic, id = %id, error = %e, "Failed to send SUBSCRIBE");
            return Err(e);
        }

        tracing::debug!(topic = %topic, id = %id, qos = %qos, "Sent SUBSCRIBE");
        Ok(id)
    }

    /// Negotiation state of `topic`.
    pub fn get_subscriptions_status(&self, topic: &str) -> SubscriptionStatus {
        self.registry.status(topic)
    }

    /// Active subscription for `topic`; `None` while pending or unknown.
    pub fn get_subscription(&self, topic: &str) -> Option<Subscription> {
        self.registry.lookup_active(topic)
    }

    /// Topics with an active subscription, sorted.
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.registry.active_topics()
    }

    /// Number of SUBSCRIBE requests awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    pub fn publishing_manager(&self) -> &Arc<dyn PublishingManager> {
        &self.publishing
    }

    pub fn config(&self) -> &SubscriptionsConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.callback.lock().is_none()
    }

    /// Detach the SUBACK callback from the connection handler.
    ///
    /// Subscription state is kept; requests still pending can no longer
    /// complete. Calling this more than once is a no-op.
    pub fn dispose(&self) {
        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            self.connection
                .unregister_for_message(MessageType::SubscribeAck, &callback);
            tracing::debug!(
                pending = self.registry.pending_count(),
                "Subscriptions manager disposed"
            );
        }
    }
}

impl Drop for SubscriptionsManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// SUBACK handler body. Errors are returned to the transport.
fn confirm_subscription(
    registry: &SubscriptionRegistry,
    ack: &SubscribeAckMessage,
    warn_on_downgrade: bool,
) -> Result<()> {
    let id = ack.message_identifier;
    let subscription = match registry.resolve_grants(id, &ack.qos_grants) {
        Ok(sub) => sub,
        Err(e) => {
            tracing::warn!(id = %id, grants = ack.qos_grants.len(), error = %e, "Rejected SUBACK");
            return Err(e);
        }
    };

    if subscription.message_identifier() != id {
        tracing::debug!(
            topic = %subscription.topic(),
            id = %id,
            active_id = %subscription.message_identifier(),
            "SUBACK for superseded registration"
        );
        return Ok(());
    }

    let requested = subscription.requested_qos();
    let granted = subscription.granted_qos().unwrap_or(requested);
    if warn_on_downgrade && granted < requested {
        tracing::warn!(
            topic = %subscription.topic(),
            requested = %requested,
            granted = %granted,
            "Broker granted lower QoS than requested"
        );
    }
    tracing::info!(
        topic = %subscription.topic(),
        id = %id,
        granted = %granted,
        "Subscription active"
    );
    Ok(())
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(SubscriptionError::InvalidTopic("topic is empty".to_string()));
    }
    if topic.len() > MAX_TOPIC_LENGTH {
        return Err(SubscriptionError::InvalidTopic(format!(
            "topic is {} bytes, limit is {}",
            topic.len(),
            MAX_TOPIC_LENGTH
        )));
    }
    if topic.contains('\0') {
        return Err(SubscriptionError::InvalidTopic(
            "topic contains a NUL character".to_string(),
        ));
    }
    Ok(())
}
