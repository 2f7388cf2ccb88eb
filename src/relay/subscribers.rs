//! Ordered set of upstream subscribers.

use core::fmt;

/// Hard upper bound on concurrent subscribers.
pub const MAX_SUBSCRIBERS: usize = 8;

/// Handle the upstream channel assigns to a subscribed client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u32);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Added,
    AlreadyPresent,
    /// The set was full; the oldest subscriber was evicted.
    Replaced(SubscriberId),
}

/// No duplicates, insertion order preserved, idempotent add/remove.
///
/// When full, adding evicts the oldest entry.  A capacity of 1 therefore
/// behaves as "newest subscriber replaces the previous one".
pub struct SubscriberSet {
    ids: heapless::Vec<SubscriberId, MAX_SUBSCRIBERS>,
    capacity: usize,
}

impl SubscriberSet {
    /// `capacity` is clamped to `1..=MAX_SUBSCRIBERS`.
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: heapless::Vec::new(),
            capacity: capacity.clamp(1, MAX_SUBSCRIBERS),
        }
    }

    pub fn insert(&mut self, id: SubscriberId) -> Insert {
        if self.contains(id) {
            return Insert::AlreadyPresent;
        }
        let evicted = if self.ids.len() >= self.capacity {
            Some(self.ids.remove(0))
        } else {
            None
        };
        // Room was made above.
        let _ = self.ids.push(id);
        match evicted {
            Some(old) => Insert::Replaced(old),
            None => Insert::Added,
        }
    }

    /// Returns whether `id` was present.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        match self.ids.iter().position(|s| *s == id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = SubscriberId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
