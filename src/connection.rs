//! Collaborator interfaces at the transport boundary.
//!
//! The subscriptions manager talks to the network only through
//! [`ConnectionHandler`]. [`ChannelConnectionHandler`] is an in-process
//! implementation: outbound messages land on a channel, inbound messages are
//! dispatched synchronously to registered callbacks on the caller's thread.

use crate::error::{Result, SubscriptionError};
use crate::messages::{Message, MessageType};
use crate::types::Qos;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback invoked for an inbound message.
///
/// Returns `Ok(true)` if the message was fully handled. Errors propagate to
/// whoever delivered the message.
pub type MessageCallback = Arc<dyn Fn(&Message) -> Result<bool> + Send + Sync>;

/// Frames, sends and receives protocol messages.
pub trait ConnectionHandler: Send + Sync {
    /// Install `callback` for messages of `message_type`.
    fn register_for_message(&self, message_type: MessageType, callback: MessageCallback);

    /// Remove a callback previously installed, matched by pointer identity.
    fn unregister_for_message(&self, message_type: MessageType, callback: &MessageCallback);

    /// Transmit a message.
    fn send_message(&self, message: Message) -> Result<()>;
}

/// Publishing/dispatch collaborator. Held by the subscriptions manager for
/// wiring; not driven by the subscription flow itself.
pub trait PublishingManager: Send + Sync {
    fn publish(&self, topic: &str, qos: Qos, payload: &[u8]) -> Result<()>;
}

/// In-process connection handler backed by a channel.
pub struct ChannelConnectionHandler {
    /// Registered callbacks by message type.
    handlers: RwLock<HashMap<MessageType, Vec<MessageCallback>>>,
    /// `None` once closed.
    outbound: RwLock<Option<Sender<Message>>>,
    receiver: Receiver<Message>,
}

impl ChannelConnectionHandler {
    pub fn new() -> Self {
        let (outbound, receiver) = unbounded();
        Self {
            handlers: RwLock::new(HashMap::new()),
            outbound: RwLock::new(Some(outbound)),
            receiver,
        }
    }

    /// Receiving end for messages passed to `send_message`.
    pub fn outbound(&self) -> &Receiver<Message> {
        &self.receiver
    }

    /// Close the outbound side. Messages already sent stay readable from
    /// [`outbound`](Self::outbound); later sends fail with `Transport`.
    pub fn close(&self) {
        if self.outbound.write().take().is_some() {
            tracing::debug!("Connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.read().is_none()
    }

    /// Number of callbacks registered for `message_type`.
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.handlers
            .read()
            .get(&message_type)
            .map_or(0, |list| list.len())
    }

    /// Dispatch an inbound message to every callback registered for its type.
    ///
    /// Returns whether any callback handled it. The first callback error
    /// aborts dispatch and is returned.
    pub fn deliver(&self, message: &Message) -> Result<bool> {
        // Snapshot so callbacks may (un)register without deadlocking.
        let callbacks: Vec<MessageCallback> = self
            .handlers
            .read()
            .get(&message.message_type())
            .cloned()
            .unwrap_or_default();

        let mut handled = false;
        for callback in callbacks {
            handled |= callback(message)?;
        }
        Ok(handled)
    }
}

impl Default for ChannelConnectionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionHandler for ChannelConnectionHandler {
    fn register_for_message(&self, message_type: MessageType, callback: MessageCallback) {
        self.handlers
            .write()
            .entry(message_type)
            .or_default()
            .push(callback);
        tracing::debug!(?message_type, "Registered message callback");
    }

    fn unregister_for_message(&self, message_type: MessageType, callback: &MessageCallback) {
        let mut handlers = self.handlers.write();
        if let Some(list) = handlers.get_mut(&message_type) {
            list.retain(|cb| !Arc::ptr_eq(cb, callback));
            if list.is_empty() {
                handlers.remove(&message_type);
            }
        }
        tracing::debug!(?message_type, "Unregistered message callback");
    }

    fn send_message(&self, message: Message) -> Result<()> {
        match self.outbound.read().as_ref() {
            Some(sender) => sender
                .send(message)
                .map_err(|e| SubscriptionError::Transport(e.to_string())),
            None => Err(SubscriptionError::Transport(
                "connection closed".to_string(),
            )),
        }
    }
}
