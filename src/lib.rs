//! # MQTT Subscriptions
//!
//! The subscription-lifecycle engine of an MQTT v3 client. It turns a
//! request to subscribe to a topic into a SUBSCRIBE/SUBACK exchange and
//! tracks each topic's negotiation state.
//!
//! ## Core Concepts
//!
//! - **Message identifiers**: Correlate a SUBSCRIBE with its SUBACK
//! - **Registry**: Pending requests by identifier, active subscriptions by topic
//! - **Manager**: Registers a SUBACK callback with the connection handler,
//!   sends requests and answers status queries
//! - **Payload converters**: Chosen per subscription, decode raw payloads
//!
//! The transport is reached only through [`ConnectionHandler`]; framing,
//! networking and publish dispatch live elsewhere.
//!
//! ## Example
//!
//! ```ignore
//! use mqtt_subscriptions::{
//!     ChannelConnectionHandler, Qos, SubscribeAckMessage, SubscriptionStatus,
//!     SubscriptionsManager, AsciiPayloadConverter,
//! };
//!
//! let connection = Arc::new(ChannelConnectionHandler::new());
//! let manager = SubscriptionsManager::new(connection.clone(), publisher);
//!
//! let id = manager.register_subscription("testtopic", Qos::AtMostOnce, AsciiPayloadConverter)?;
//!
//! // The network thread hands the broker's SUBACK to the connection handler.
//! connection.deliver(&SubscribeAckMessage::new()
//!     .with_message_identifier(id)
//!     .add_qos_grant(Qos::AtMostOnce)
//!     .into())?;
//!
//! assert_eq!(manager.get_subscriptions_status("testtopic"), SubscriptionStatus::Active);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod payload;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::{ReregistrationPolicy, SubscriptionsConfig};
pub use connection::{
    ChannelConnectionHandler, ConnectionHandler, MessageCallback, PublishingManager,
};
pub use error::{Result, SubscriptionError};
pub use messages::{Message, MessageType, SubscribeAckMessage, SubscribeMessage};
pub use payload::{
    AsciiPayloadConverter, ConverterHandle, JsonPayloadConverter, PassThroughPayloadConverter,
    PayloadConverter, Utf8PayloadConverter,
};
pub use subscriptions::{
    MessageIdentifierDispenser, Subscription, SubscriptionRegistry, SubscriptionsManager,
};
pub use types::*;
