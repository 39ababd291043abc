//! Idempotency: deriving a message's identity and remembering what was sent
//!
//! The set only grows for the lifetime of the orchestrator; nothing is ever
//! evicted.

use courier_common::{IdentityKey, Message};
use dashmap::{DashMap, mapref::entry::Entry};

/// Derives the [`IdentityKey`] a message is deduplicated by
///
/// Must be pure: the same message always yields the same key. Any
/// `Fn(&Message) -> IdentityKey` works.
pub trait KeyDeriver: Send + Sync {
    fn derive(&self, message: &Message) -> IdentityKey;
}

impl<F> KeyDeriver for F
where
    F: Fn(&Message) -> IdentityKey + Send + Sync,
{
    fn derive(&self, message: &Message) -> IdentityKey {
        self(message)
    }
}

/// Keys a message by `to-subject-body`
///
/// Coarse on purpose: two messages with identical fields are the same
/// submission.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldKeyDeriver;

impl KeyDeriver for FieldKeyDeriver {
    fn derive(&self, message: &Message) -> IdentityKey {
        IdentityKey::from(format!(
            "{}-{}-{}",
            message.to, message.subject, message.body
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    /// Claimed by a submission that has not finished yet
    Pending,
    Sent,
}

/// Keys of delivered (or in-flight) messages
#[derive(Debug, Default)]
pub struct SentSet {
    entries: DashMap<IdentityKey, KeyState, ahash::RandomState>,
}

impl SentSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for a submission
    ///
    /// Check and claim happen under one shard lock, so of several concurrent
    /// submissions with the same key exactly one gets the reservation. Returns
    /// `None` if the key is already sent or claimed.
    pub fn reserve(&self, key: IdentityKey) -> Option<Reservation<'_>> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(KeyState::Pending);
                Some(Reservation {
                    set: self,
                    key,
                    committed: false,
                })
            }
        }
    }

    /// `true` once a submission with this key has been delivered
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|state| *state == KeyState::Sent)
    }

    /// Number of delivered keys
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| *entry.value() == KeyState::Sent)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A claimed key; released on drop unless committed
#[derive(Debug)]
pub struct Reservation<'a> {
    set: &'a SentSet,
    key: IdentityKey,
    committed: bool,
}

impl Reservation<'_> {
    #[must_use]
    pub const fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// Mark the key as delivered for good
    pub fn commit(mut self) {
        self.set.entries.insert(self.key.clone(), KeyState::Sent);
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.set
                .entries
                .remove_if(&self.key, |_, state| *state == KeyState::Pending);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(s: &str) -> IdentityKey {
        IdentityKey::from(s)
    }

    #[test]
    fn test_field_key_deriver_format() {
        let message = Message::new("user@example.com", "Welcome", "Hello");
        assert_eq!(
            FieldKeyDeriver.derive(&message),
            key("user@example.com-Welcome-Hello")
        );
    }

    #[test]
    fn test_identical_fields_collide() {
        let a = Message::new("user@example.com", "Welcome", "Hello");
        let b = a.clone();
        let c = Message::new("user@example.com", "Welcome", "Hello again");

        assert_eq!(FieldKeyDeriver.derive(&a), FieldKeyDeriver.derive(&b));
        assert_ne!(FieldKeyDeriver.derive(&a), FieldKeyDeriver.derive(&c));
    }

    #[test]
    fn test_closure_key_deriver() {
        let by_recipient = |message: &Message| IdentityKey::from(message.to.as_str());
        let message = Message::new("user@example.com", "Welcome", "Hello");

        assert_eq!(by_recipient.derive(&message), key("user@example.com"));
    }

    #[test]
    fn test_committed_reservation_is_sent() {
        let set = SentSet::new();

        let reservation = set.reserve(key("a")).unwrap();
        assert!(!set.contains(&key("a")));
        reservation.commit();

        assert!(set.contains(&key("a")));
        assert_eq!(set.len(), 1);
        assert!(set.reserve(key("a")).is_none());
    }

    #[test]
    fn test_pending_reservation_blocks_second_claim() {
        let set = SentSet::new();

        let first = set.reserve(key("a")).unwrap();
        assert!(set.reserve(key("a")).is_none());
        assert_eq!(first.key(), &key("a"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_dropped_reservation_is_released() {
        let set = SentSet::new();

        drop(set.reserve(key("a")).unwrap());

        assert!(!set.contains(&key("a")));
        assert!(set.reserve(key("a")).is_some());
    }
}
