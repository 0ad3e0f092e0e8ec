//! Message identifier allocation.

use crate::types::MessageIdentifier;
use std::sync::atomic::{AtomicU16, Ordering};

/// Hands out message identifiers: 1, 2, 3, ... wrapping after `u16::MAX`.
///
/// Safe to share between threads; concurrent callers never receive the same
/// identifier within one cycle of the 16-bit space.
#[derive(Debug, Default)]
pub struct MessageIdentifierDispenser {
    /// Last identifier handed out (0 before the first call).
    last: AtomicU16,
}

impl MessageIdentifierDispenser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier.
    pub fn next(&self) -> MessageIdentifier {
        let advance = |cur: u16| Some(MessageIdentifier(cur).next().0);
        let prev = match self.last.fetch_update(Ordering::SeqCst, Ordering::SeqCst, advance) {
            Ok(prev) | Err(prev) => prev,
        };
        MessageIdentifier(prev).next()
    }

    /// Last identifier handed out, if any.
    pub fn current(&self) -> Option<MessageIdentifier> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            id => Some(MessageIdentifier(id)),
        }
    }
}
