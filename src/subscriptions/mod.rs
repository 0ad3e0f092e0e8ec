//! Subscription lifecycle for an MQTT client connection.
//!
//! This module turns subscribe requests into SUBSCRIBE/SUBACK exchanges:
//! - Message identifiers correlate each request with its acknowledgment
//! - Requests stay pending until the broker's SUBACK arrives
//! - Acknowledged subscriptions become active with the granted QoS
//!
//! Acknowledgments arrive on the transport's thread while application
//! threads register and query, so all state sits behind one lock.
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionsManager::new(connection, publisher);
//!
//! manager.register_subscription("sensors/temp", Qos::AtLeastOnce, Utf8PayloadConverter)?;
//! assert_eq!(manager.get_subscriptions_status("sensors/temp"), SubscriptionStatus::Pending);
//!
//! // ... the transport delivers the SUBACK ...
//!
//! if let Some(sub) = manager.get_subscription("sensors/temp") {
//!     let text: String = sub.decode_payload(b"21.5")?;
//! }
//! ```

mod allocator;
mod manager;
mod registry;
mod types;

pub use allocator::MessageIdentifierDispenser;
pub use manager::SubscriptionsManager;
pub use registry::SubscriptionRegistry;
pub use types::Subscription;
