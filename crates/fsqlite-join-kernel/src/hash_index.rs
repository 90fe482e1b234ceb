//! Open-addressed address table.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{JoinKernelError, Result};

const MIN_CAPACITY: usize = 1024;
const MAX_LOAD_FACTOR: f64 = 0.75;
const EMPTY_SLOT: u32 = u32::MAX;

/// Maximum number of rows a single index can address.
///
/// Capped so the bucket-array capacity [`capacity_for`] picks never exceeds
/// `2^31`: the mask derived from that capacity (`capacity - 1`) must fit in
/// a `u32` with room to spare below `u32::MAX`, since `u32::MAX` is also the
/// empty-slot sentinel. At this row count, `capacity_for` lands exactly on
/// `2^31` without needing to double past it, so the mask is `2^31 - 1`.
pub const MAX_ROWS: u64 = 3 * (1u64 << 29);

/// Open-addressed, power-of-two bucket array over [`crate::page`] addresses.
///
/// Insertion resolves collisions by linear probing. Multi-match enumeration
/// ([`InMemoryJoinHash::get_next_join_position`]) continues that same probe
/// sequence past a found match, re-testing equality at each subsequent slot,
/// matching the source system's own `LookupSource` API shape (the caller
/// supplies the probe row again on every continuation call, rather than
/// this index retaining probe state).
#[derive(Debug)]
pub struct InMemoryJoinHash {
    buckets: Vec<u32>,
    mask: u32,
    addresses: Vec<u64>,
    slot_of: HashMap<u64, u32>,
}

impl InMemoryJoinHash {
    /// Build an index over `addresses`, whose row hashes are `hashes`
    /// (`hashes[i]` is the hash of `addresses[i]`, both in build order).
    ///
    /// # Errors
    ///
    /// Returns [`JoinKernelError::Capacity`] if `addresses.len()` exceeds
    /// [`MAX_ROWS`].
    ///
    /// # Panics
    ///
    /// Panics if `addresses.len() != hashes.len()`, or if `addresses`
    /// contains a duplicate; every inserted address must be unique, which is
    /// a caller contract, not a runtime condition this function checks.
    pub fn build(addresses: &[u64], hashes: &[i32]) -> Result<Self> {
        assert_eq!(addresses.len(), hashes.len(), "addresses and hashes must be parallel");

        if addresses.len() as u64 > MAX_ROWS {
            return Err(JoinKernelError::Capacity {
                requested_rows: addresses.len() as u64,
                max_rows: MAX_ROWS,
            });
        }

        let capacity = capacity_for(addresses.len());
        let mask = (capacity - 1) as u32;
        let mut buckets = vec![EMPTY_SLOT; capacity];
        let mut slot_of = HashMap::with_capacity(addresses.len());

        for (ordinal, (&address, &hash)) in addresses.iter().zip(hashes).enumerate() {
            let mut slot = (hash as u32) & mask;
            while buckets[slot as usize] != EMPTY_SLOT {
                slot = (slot + 1) & mask;
            }
            buckets[slot as usize] = ordinal as u32;
            let previous = slot_of.insert(address, slot);
            debug_assert!(previous.is_none(), "address {address:#018x} inserted more than once");
        }

        trace!(
            rows = addresses.len(),
            capacity,
            load_factor = addresses.len() as f64 / capacity as f64,
            "built in-memory join hash"
        );

        Ok(Self {
            buckets,
            mask,
            addresses: addresses.to_vec(),
            slot_of,
        })
    }

    /// Find the first build-side address whose row satisfies `equals`,
    /// linear-probing from `raw_hash & mask`.
    #[must_use]
    pub fn get_join_position(&self, raw_hash: i32, mut equals: impl FnMut(u64) -> bool) -> Option<u64> {
        let mut slot = (raw_hash as u32) & self.mask;
        loop {
            let ordinal = self.buckets[slot as usize];
            if ordinal == EMPTY_SLOT {
                return None;
            }
            let address = self.addresses[ordinal as usize];
            if equals(address) {
                return Some(address);
            }
            slot = (slot + 1) & self.mask;
        }
    }

    /// Continue enumerating matches after `previous_address`, for
    /// multi-match joins.
    #[must_use]
    pub fn get_next_join_position(&self, previous_address: u64, mut equals: impl FnMut(u64) -> bool) -> Option<u64> {
        let Some(&previous_slot) = self.slot_of.get(&previous_address) else {
            return None;
        };
        let mut slot = (previous_slot + 1) & self.mask;
        loop {
            let ordinal = self.buckets[slot as usize];
            if ordinal == EMPTY_SLOT {
                return None;
            }
            let address = self.addresses[ordinal as usize];
            if equals(address) {
                return Some(address);
            }
            slot = (slot + 1) & self.mask;
        }
    }

    /// Number of addresses stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Bucket array capacity (always a power of two).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Current load factor; always ≤ 0.75 after [`InMemoryJoinHash::build`].
    #[must_use]
    pub fn load_factor(&self) -> f64 {
        self.addresses.len() as f64 / self.capacity() as f64
    }

    /// Retained heap memory: bucket array plus address list plus the
    /// slot-reverse-lookup map.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.buckets.len() * std::mem::size_of::<u32>()
            + self.addresses.len() * std::mem::size_of::<u64>()
            + self.slot_of.len() * (std::mem::size_of::<u64>() + std::mem::size_of::<u32>())
    }
}

/// Smallest power-of-two capacity, at least [`MIN_CAPACITY`], keeping the
/// load factor at or under [`MAX_LOAD_FACTOR`].
fn capacity_for(row_count: usize) -> usize {
    let mut capacity = MIN_CAPACITY;
    while (row_count as f64) / (capacity as f64) > MAX_LOAD_FACTOR {
        capacity *= 2;
    }
    capacity
}
