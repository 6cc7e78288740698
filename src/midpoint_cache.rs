//! Transient memoisation of surface-evaluated triangle centroids, keyed by
//! the (unordered) triple of vertex indices that produced them.
//!
//! The cache is sized up-front to a prime bucket count (so the `sum mod
//! num_elem` hash spreads reasonably) and is never resized; it exists for
//! the lifetime of one phase and is dropped at the end of it. Rust's
//! ownership model gives us that lifecycle for free — there is no separate
//! `destroy()` call, the cache is simply dropped when the phase function
//! returns.

use crate::core::Point3;

/// Ascending prime bucket counts. `next_prime_at_least` picks the first
/// entry `>= capacity`, falling back to the largest table entry (itself
/// `2^31 - 1`) for absurd capacities.
const PRIME_TABLE: &[u32] = &[
    127, 251, 509, 1021, 2039, 4093, 8191, 16381, 32749, 65521, 131_071, 262_139, 524_287,
    1_048_573, 2_097_143, 4_194_301, 8_388_593, 16_777_213, 33_554_393, 67_108_859, 134_217_689,
    268_435_399, 536_870_909, 1_073_741_789, 2_147_483_647,
];

fn next_prime_at_least(capacity: usize) -> u32 {
    PRIME_TABLE
        .iter()
        .copied()
        .find(|&p| p as usize >= capacity)
        .unwrap_or(*PRIME_TABLE.last().unwrap())
}

/// The sorted triple used as a cache key, and the bucket-hash input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Key {
    sorted: [u32; 3],
    sum: u64,
}

fn sort_key(i0: u32, i1: u32, i2: u32) -> Key {
    let min = i0.min(i1).min(i2);
    let max = i0.max(i1).max(i2);
    let sum = u64::from(i0) + u64::from(i1) + u64::from(i2);
    let mid = sum - u64::from(min) - u64::from(max);
    Key { sorted: [min, mid as u32, max], sum }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: [u32; 3],
    close: bool,
    xyz: Point3,
}

/// Outcome of [`MidpointCache::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was chained in.
    Inserted,
    /// An entry for this vertex triple already existed; the cache is unchanged.
    Duplicate,
}

#[derive(Debug)]
pub struct MidpointCache {
    buckets: Vec<Vec<Entry>>,
    num_elem: u32,
}

impl MidpointCache {
    /// Creates a chained hash table with at least `requested_capacity`
    /// buckets, rounded up to the next table prime.
    #[must_use]
    pub fn create(requested_capacity: usize) -> Self {
        let num_elem = next_prime_at_least(requested_capacity.max(1));
        Self { buckets: vec![Vec::new(); num_elem as usize], num_elem }
    }

    fn bucket_index(&self, key: &Key) -> usize {
        (key.sum % u64::from(self.num_elem)) as usize
    }

    /// Looks up the cached centroid for an (unordered) vertex triple.
    #[must_use]
    pub fn find(&self, i0: u32, i1: u32, i2: u32) -> Option<(bool, Point3)> {
        let key = sort_key(i0, i1, i2);
        let bucket = &self.buckets[self.bucket_index(&key)];
        bucket
            .iter()
            .find(|e| e.key == key.sorted)
            .map(|e| (e.close, e.xyz))
    }

    /// Inserts a centroid for an (unordered) vertex triple, chaining on
    /// collision. Returns [`AddOutcome::Duplicate`] without mutating the
    /// table if an entry already exists for this triple.
    pub fn add(&mut self, i0: u32, i1: u32, i2: u32, close: bool, xyz: Point3) -> AddOutcome {
        let key = sort_key(i0, i1, i2);
        let idx = self.bucket_index(&key);
        if self.buckets[idx].iter().any(|e| e.key == key.sorted) {
            return AddOutcome::Duplicate;
        }
        self.buckets[idx].push(Entry { key: key.sorted, close, xyz });
        AddOutcome::Inserted
    }

    /// Removes any cached entry for this vertex triple, e.g. because the
    /// triangle it described was just restructured by a swap or split.
    pub fn invalidate(&mut self, i0: u32, i1: u32, i2: u32) {
        let key = sort_key(i0, i1, i2);
        let idx = self.bucket_index(&key);
        self.buckets[idx].retain(|e| e.key != key.sorted);
    }

    #[must_use]
    pub fn num_buckets(&self) -> u32 {
        self.num_elem
    }
}
