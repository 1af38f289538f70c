//! # Sharded Cache
//!
//! Fixed-capacity concurrent map partitioned into shards selected by an
//! FNV-1a hash of the key. Once a shard holds more than its capacity the
//! whole shard is reset before the next insert; there is no recency
//! tracking and no TTL.
//! Callers must tolerate sudden misses.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Default number of shards.
pub const DEFAULT_SHARD_COUNT: usize = 64;

/// Lower bound on per-shard capacity.
pub const MIN_SHARD_CAPACITY: usize = 64;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
#[must_use]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Sharded map with wholesale per-shard eviction.
pub struct ShardedCache<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
    shard_capacity: usize,
}

impl<V: Clone> ShardedCache<V> {
    /// Cache with the default shard layout.
    #[must_use]
    pub fn new(total_capacity: usize) -> Self {
        Self::with_shards(total_capacity, DEFAULT_SHARD_COUNT, MIN_SHARD_CAPACITY)
    }

    /// Cache with an explicit shard layout. A zero shard count is clamped to one.
    #[must_use]
    pub fn with_shards(total_capacity: usize, shard_count: usize, min_shard_capacity: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shard_capacity = (total_capacity / shard_count).max(min_shard_capacity).max(1);
        Self {
            shards: (0..shard_count)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
            shard_capacity,
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, V>> {
        let index = fnv1a_32(key.as_bytes()) as usize % self.shards.len();
        &self.shards[index]
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.shard(key).read().get(key).cloned()
    }

    /// Insert, resetting the target shard first if it exceeds its capacity.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut shard = self.shard(&key).write();
        if shard.len() > self.shard_capacity {
            *shard = HashMap::new();
        }
        shard.insert(key, value);
    }

    /// Remove `key` from whichever shard holds it. Every shard is scanned.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.shards.iter().find_map(|shard| shard.write().remove(key))
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_capacity(&self) -> usize {
        self.shard_capacity
    }
}
