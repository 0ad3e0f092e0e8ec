//! Pending and active subscription tables.

use crate::error::{Result, SubscriptionError};
use crate::payload::ConverterHandle;
use crate::types::{MessageIdentifier, Qos, SubscriptionStatus};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use super::types::Subscription;

/// Both tables live behind one lock so that resolving a request (remove from
/// pending, insert into active) is observed atomically by readers.
#[derive(Default)]
struct RegistryState {
    /// Outstanding requests by message identifier.
    pending: HashMap<MessageIdentifier, Subscription>,

    /// Topic to outstanding identifiers.
    pending_topics: HashMap<String, BTreeSet<MessageIdentifier>>,

    /// Confirmed subscriptions by topic.
    active: HashMap<String, Subscription>,

    /// Stamped on each pending entry; orders registrations of one topic.
    next_sequence: u64,
}

impl RegistryState {
    fn insert_pending(&mut self, mut subscription: Subscription) -> Result<()> {
        let id = subscription.message_identifier();
        if self.pending.contains_key(&id) {
            return Err(SubscriptionError::InvariantViolation(format!(
                "message identifier {} is already pending",
                id
            )));
        }

        subscription.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending_topics
            .entry(subscription.topic().to_string())
            .or_default()
            .insert(id);
        self.pending.insert(id, subscription);
        Ok(())
    }

    fn take_pending(&mut self, id: MessageIdentifier) -> Option<Subscription> {
        let subscription = self.pending.remove(&id)?;
        if let Some(ids) = self.pending_topics.get_mut(subscription.topic()) {
            ids.remove(&id);
            if ids.is_empty() {
                self.pending_topics.remove(subscription.topic());
            }
        }
        Some(subscription)
    }

    /// Make `subscription` the active record for its topic unless a later
    /// registration of the same topic is already active. Returns the record
    /// that is active afterwards.
    fn promote(&mut self, subscription: Subscription) -> Subscription {
        if let Some(current) = self.active.get(subscription.topic()) {
            if current.sequence > subscription.sequence {
                return current.clone();
            }
        }
        self.active
            .insert(subscription.topic().to_string(), subscription.clone());
        subscription
    }

    fn status(&self, topic: &str) -> SubscriptionStatus {
        if self.pending_topics.contains_key(topic) {
            SubscriptionStatus::Pending
        } else if self.active.contains_key(topic) {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::NotSubscribed
        }
    }
}

/// Authoritative store of subscription state.
#[derive(Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outstanding SUBSCRIBE.
    ///
    /// Fails with `InvariantViolation` if `id` is already pending.
    pub fn insert_pending(
        &self,
        id: MessageIdentifier,
        topic: &str,
        qos: Qos,
        converter: ConverterHandle,
    ) -> Result<()> {
        let subscription = Subscription::pending(id, topic.to_string(), qos, converter);
        self.state.write().insert_pending(subscription)
    }

    /// Allocate an identifier and record an outstanding SUBSCRIBE in one
    /// step.
    ///
    /// `allocate` is called until it yields an identifier that is not
    /// pending, at most once per identifier in the 16-bit space; if none is
    /// free this fails with `IdentifiersExhausted`. With `exclusive` set the
    /// call fails with `AlreadySubscribed` when `topic` is pending or
    /// active, without consuming an identifier. Everything happens under the
    /// write lock, so a concurrent insert cannot claim the chosen identifier.
    pub fn allocate_pending<F>(
        &self,
        mut allocate: F,
        topic: &str,
        qos: Qos,
        converter: ConverterHandle,
        exclusive: bool,
    ) -> Result<MessageIdentifier>
    where
        F: FnMut() -> MessageIdentifier,
    {
        let mut state = self.state.write();
        if exclusive && state.status(topic) != SubscriptionStatus::NotSubscribed {
            return Err(SubscriptionError::AlreadySubscribed(topic.to_string()));
        }

        for _ in 0..u16::MAX {
            let id = allocate();
            if state.pending.contains_key(&id) {
                continue;
            }
            let subscription = Subscription::pending(id, topic.to_string(), qos, converter);
            state.insert_pending(subscription)?;
            return Ok(id);
        }
        Err(SubscriptionError::IdentifiersExhausted)
    }

    /// Drop an outstanding request without activating it. Used when the
    /// SUBSCRIBE could not be sent.
    pub fn discard_pending(&self, id: MessageIdentifier) -> Option<Subscription> {
        self.state.write().take_pending(id)
    }

    /// Resolve a pending request with its granted QoS and return its topic.
    pub fn resolve(&self, id: MessageIdentifier, granted_qos: Qos) -> Result<String> {
        self.resolve_grants(id, &[granted_qos])
            .map(|sub| sub.topic().to_string())
    }

    /// Resolve a pending request from a SUBACK grant list.
    ///
    /// Each request carries a single topic, so exactly one grant is
    /// expected. The pending entry is always consumed, but it only replaces
    /// the topic's active record if it was registered after that record.
    /// A late SUBACK for an older registration therefore never overrides a
    /// newer one. Returns the record active for the topic afterwards; on
    /// any error both tables are left untouched.
    pub fn resolve_grants(&self, id: MessageIdentifier, grants: &[Qos]) -> Result<Subscription> {
        let mut state = self.state.write();

        if !state.pending.contains_key(&id) {
            return Err(SubscriptionError::UnsolicitedAcknowledgment {
                message_identifier: id,
            });
        }
        let granted_qos = match grants {
            [qos] => *qos,
            _ => {
                return Err(SubscriptionError::GrantCountMismatch {
                    message_identifier: id,
                    expected: 1,
                    got: grants.len(),
                })
            }
        };

        let subscription = state
            .take_pending(id)
            .ok_or(SubscriptionError::UnsolicitedAcknowledgment {
                message_identifier: id,
            })?
            .activate(granted_qos);

        Ok(state.promote(subscription))
    }

    /// Pending if any request for `topic` is outstanding, else Active if
    /// confirmed, else NotSubscribed.
    pub fn status(&self, topic: &str) -> SubscriptionStatus {
        self.state.read().status(topic)
    }

    /// Active subscription for `topic`. Pending topics yield `None`.
    pub fn lookup_active(&self, topic: &str) -> Option<Subscription> {
        self.state.read().active.get(topic).cloned()
    }

    pub fn is_pending(&self, id: MessageIdentifier) -> bool {
        self.state.read().pending.contains_key(&id)
    }

    /// Number of outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Outstanding identifiers for `topic`, ascending.
    pub fn pending_identifiers(&self, topic: &str) -> Vec<MessageIdentifier> {
        self.state
            .read()
            .pending_topics
            .get(topic)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Topics with an active subscription, sorted.
    pub fn active_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.state.read().active.keys().cloned().collect();
        topics.sort();
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{AsciiPayloadConverter, PassThroughPayloadConverter};

    fn ascii() -> ConverterHandle {
        ConverterHandle::new(AsciiPayloadConverter)
    }

    #[test]
    fn test_unknown_topic() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.status("nope"), SubscriptionStatus::NotSubscribed);
        assert!(registry.lookup_active("nope").is_none());
    }

    #[test]
    fn test_pending_not_visible() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtLeastOnce, ascii())
            .unwrap();

        assert_eq!(registry.status("a"), SubscriptionStatus::Pending);
        assert!(registry.lookup_active("a").is_none());
        assert!(registry.is_pending(MessageIdentifier(1)));
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_resolve_promotes() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::ExactlyOnce, ascii())
            .unwrap();

        let topic = registry.resolve(MessageIdentifier(1), Qos::AtLeastOnce).unwrap();
        assert_eq!(topic, "a");
        assert_eq!(registry.status("a"), SubscriptionStatus::Active);
        assert_eq!(registry.pending_count(), 0);

        let sub = registry.lookup_active("a").unwrap();
        assert_eq!(sub.requested_qos(), Qos::ExactlyOnce);
        assert_eq!(sub.granted_qos(), Some(Qos::AtLeastOnce));
        assert_eq!(registry.active_topics(), vec!["a".to_string()]);
    }

    #[test]
    fn test_resolve_unknown_id() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtMostOnce, ascii())
            .unwrap();

        let result = registry.resolve(MessageIdentifier(999), Qos::AtMostOnce);
        assert!(matches!(
            result,
            Err(SubscriptionError::UnsolicitedAcknowledgment {
                message_identifier: MessageIdentifier(999)
            })
        ));
        assert_eq!(registry.status("a"), SubscriptionStatus::Pending);
    }

    #[test]
    fn test_resolve_twice_is_unsolicited() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtMostOnce, ascii())
            .unwrap();
        registry.resolve(MessageIdentifier(1), Qos::AtMostOnce).unwrap();

        let result = registry.resolve(MessageIdentifier(1), Qos::AtMostOnce);
        assert!(matches!(
            result,
            Err(SubscriptionError::UnsolicitedAcknowledgment { .. })
        ));
        assert_eq!(registry.status("a"), SubscriptionStatus::Active);
    }

    #[test]
    fn test_duplicate_id_is_invariant_violation() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtMostOnce, ascii())
            .unwrap();

        let result = registry.insert_pending(MessageIdentifier(1), "b", Qos::AtMostOnce, ascii());
        assert!(matches!(result, Err(SubscriptionError::InvariantViolation(_))));
        assert_eq!(registry.status("b"), SubscriptionStatus::NotSubscribed);
    }

    #[test]
    fn test_grant_count_mismatch_leaves_pending() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtMostOnce, ascii())
            .unwrap();

        let result = registry.resolve_grants(MessageIdentifier(1), &[]);
        assert!(matches!(
            result,
            Err(SubscriptionError::GrantCountMismatch { expected: 1, got: 0, .. })
        ));
        assert_eq!(registry.status("a"), SubscriptionStatus::Pending);
    }

    #[test]
    fn test_reregistration_stays_pending_until_all_resolved() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtMostOnce, ascii())
            .unwrap();
        registry.resolve(MessageIdentifier(1), Qos::AtMostOnce).unwrap();

        registry
            .insert_pending(
                MessageIdentifier(2),
                "a",
                Qos::AtLeastOnce,
                ConverterHandle::new(PassThroughPayloadConverter),
            )
            .unwrap();
        assert_eq!(registry.status("a"), SubscriptionStatus::Pending);
        // The previously confirmed record is still retrievable.
        assert_eq!(
            registry.lookup_active("a").unwrap().granted_qos(),
            Some(Qos::AtMostOnce)
        );

        registry.resolve(MessageIdentifier(2), Qos::AtLeastOnce).unwrap();
        let sub = registry.lookup_active("a").unwrap();
        assert_eq!(registry.status("a"), SubscriptionStatus::Active);
        assert_eq!(sub.granted_qos(), Some(Qos::AtLeastOnce));
        assert!(sub.payload_type().is::<Vec<u8>>());
    }

    #[test]
    fn test_stale_ack_does_not_override_newer_registration() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtMostOnce, ascii())
            .unwrap();
        registry
            .insert_pending(
                MessageIdentifier(2),
                "a",
                Qos::ExactlyOnce,
                ConverterHandle::new(PassThroughPayloadConverter),
            )
            .unwrap();

        // Broker answers the newer request first.
        let active = registry
            .resolve_grants(MessageIdentifier(2), &[Qos::ExactlyOnce])
            .unwrap();
        assert_eq!(active.message_identifier(), MessageIdentifier(2));
        assert_eq!(registry.status("a"), SubscriptionStatus::Pending);

        let active = registry
            .resolve_grants(MessageIdentifier(1), &[Qos::AtMostOnce])
            .unwrap();
        assert_eq!(active.message_identifier(), MessageIdentifier(2));
        assert_eq!(registry.status("a"), SubscriptionStatus::Active);
        assert_eq!(registry.pending_count(), 0);

        let sub = registry.lookup_active("a").unwrap();
        assert_eq!(sub.message_identifier(), MessageIdentifier(2));
        assert_eq!(sub.requested_qos(), Qos::ExactlyOnce);
        assert_eq!(sub.granted_qos(), Some(Qos::ExactlyOnce));
        assert!(sub.payload_type().is::<Vec<u8>>());
    }

    #[test]
    fn test_sequence_survives_identifier_reuse() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(9), "a", Qos::AtMostOnce, ascii())
            .unwrap();
        registry
            .insert_pending(MessageIdentifier(2), "a", Qos::AtLeastOnce, ascii())
            .unwrap();

        // Lower identifier, later registration: it still wins.
        registry.resolve(MessageIdentifier(2), Qos::AtLeastOnce).unwrap();
        registry.resolve(MessageIdentifier(9), Qos::AtMostOnce).unwrap();
        assert_eq!(
            registry.lookup_active("a").unwrap().message_identifier(),
            MessageIdentifier(2)
        );
    }

    #[test]
    fn test_allocate_pending_skips_taken_identifiers() {
        let registry = SubscriptionRegistry::new();
        for id in [1, 2, 4] {
            registry
                .insert_pending(MessageIdentifier(id), "other", Qos::AtMostOnce, ascii())
                .unwrap();
        }

        let mut candidates = (1..=5u16).map(MessageIdentifier);
        let mut allocate = || candidates.next().unwrap_or(MessageIdentifier(5));
        let first = registry
            .allocate_pending(&mut allocate, "a", Qos::AtMostOnce, ascii(), false)
            .unwrap();
        let second = registry
            .allocate_pending(&mut allocate, "b", Qos::AtMostOnce, ascii(), false)
            .unwrap();

        assert_eq!(first, MessageIdentifier(3));
        assert_eq!(second, MessageIdentifier(5));
        assert_eq!(registry.pending_identifiers("a"), vec![MessageIdentifier(3)]);
    }

    #[test]
    fn test_allocate_pending_exhausted() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(1), "a", Qos::AtMostOnce, ascii())
            .unwrap();

        let mut calls = 0u32;
        let result = registry.allocate_pending(
            || {
                calls += 1;
                MessageIdentifier(1)
            },
            "b",
            Qos::AtMostOnce,
            ascii(),
            false,
        );
        assert!(matches!(result, Err(SubscriptionError::IdentifiersExhausted)));
        assert_eq!(calls, u32::from(u16::MAX));
        assert_eq!(registry.status("b"), SubscriptionStatus::NotSubscribed);
    }

    #[test]
    fn test_allocate_pending_exclusive() {
        let registry = SubscriptionRegistry::new();
        let mut next = 0u16;
        let mut allocate = || {
            next += 1;
            MessageIdentifier(next)
        };
        registry
            .allocate_pending(&mut allocate, "a", Qos::AtMostOnce, ascii(), true)
            .unwrap();

        let result = registry.allocate_pending(&mut allocate, "a", Qos::AtMostOnce, ascii(), true);
        assert!(matches!(result, Err(SubscriptionError::AlreadySubscribed(_))));
        assert_eq!(registry.pending_identifiers("a"), vec![MessageIdentifier(1)]);

        // No identifier was consumed by the rejected call.
        let id = registry
            .allocate_pending(&mut allocate, "b", Qos::AtMostOnce, ascii(), true)
            .unwrap();
        assert_eq!(id, MessageIdentifier(2));
    }

    #[test]
    fn test_discard_pending() {
        let registry = SubscriptionRegistry::new();
        registry
            .insert_pending(MessageIdentifier(3), "a", Qos::AtMostOnce, ascii())
            .unwrap();

        let discarded = registry.discard_pending(MessageIdentifier(3)).unwrap();
        assert_eq!(discarded.topic(), "a");
        assert_eq!(registry.status("a"), SubscriptionStatus::NotSubscribed);
        assert!(registry.discard_pending(MessageIdentifier(3)).is_none());
    }
}
