//! Bounded advertisement buffer.
//!
//! Holds sightings in arrival order until the relay flushes them.  Never
//! deduplicates: repeated sightings of the same address are all kept.

use crate::error::ResourceError;

use super::messages::{AdvertisementBatch, RawAdvertisement};

/// Largest batch the fixed-capacity storage can hold.
pub const MAX_BATCH_CAPACITY: usize = 16;

pub struct AdvertisementBuffer {
    entries: AdvertisementBatch,
    capacity: usize,
}

impl AdvertisementBuffer {
    /// Reserve a buffer for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Result<Self, ResourceError> {
        if capacity == 0 || capacity > MAX_BATCH_CAPACITY {
            return Err(ResourceError::BufferAllocation {
                requested: capacity,
                max: MAX_BATCH_CAPACITY,
            });
        }
        Ok(Self {
            entries: AdvertisementBatch::new(),
            capacity,
        })
    }

    /// Append at the tail.  Hands the entry back when the buffer is full.
    pub fn push(&mut self, adv: RawAdvertisement) -> Result<(), RawAdvertisement> {
        if self.is_full() {
            return Err(adv);
        }
        self.entries.push(adv)
    }

    /// Move every entry out, leaving the buffer empty.
    pub fn take_batch(&mut self) -> AdvertisementBatch {
        core::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[RawAdvertisement] {
        &self.entries
    }
}
