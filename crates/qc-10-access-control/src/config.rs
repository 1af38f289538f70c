//! Node-local access-control configuration
//!
//! Chain-wide settings (auth type, trust roots, policies) come from the
//! chain config; this struct only carries what each node chooses for itself.

use crate::domain::cache::{ShardedCache, DEFAULT_SHARD_COUNT, MIN_SHARD_CAPACITY};
use crate::domain::errors::{AccessControlError, AccessControlResult};
use serde::{Deserialize, Serialize};

/// Access-control configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlConfig {
    /// Organization this node belongs to
    pub local_org_id: String,
    /// Resolved-member cache entries
    pub member_cache_capacity: usize,
    /// Certificate cache entries (hash/alias → PEM)
    pub cert_cache_capacity: usize,
    /// Payer cache entries
    pub payer_cache_capacity: usize,
    /// Shards per cache
    pub shard_count: usize,
    /// Floor for the per-shard capacity
    pub min_shard_capacity: usize,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            local_org_id: String::new(),
            member_cache_capacity: 1024,
            cert_cache_capacity: 1024,
            payer_cache_capacity: 1024,
            shard_count: DEFAULT_SHARD_COUNT,
            min_shard_capacity: MIN_SHARD_CAPACITY,
        }
    }
}

impl AccessControlConfig {
    /// Defaults for the given organization.
    pub fn for_org(local_org_id: impl Into<String>) -> Self {
        Self {
            local_org_id: local_org_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> AccessControlResult<()> {
        if self.shard_count == 0 {
            return Err(AccessControlError::ConfigurationError(
                "shard_count cannot be 0".to_string(),
            ));
        }
        if self.min_shard_capacity == 0 {
            return Err(AccessControlError::ConfigurationError(
                "min_shard_capacity cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style method to set the member cache capacity
    pub fn with_member_cache_capacity(mut self, capacity: usize) -> Self {
        self.member_cache_capacity = capacity;
        self
    }

    /// Builder-style method to set the cert cache capacity
    pub fn with_cert_cache_capacity(mut self, capacity: usize) -> Self {
        self.cert_cache_capacity = capacity;
        self
    }

    pub fn with_payer_cache_capacity(mut self, capacity: usize) -> Self {
        self.payer_cache_capacity = capacity;
        self
    }

    pub fn with_shards(mut self, shard_count: usize, min_shard_capacity: usize) -> Self {
        self.shard_count = shard_count;
        self.min_shard_capacity = min_shard_capacity;
        self
    }

    /// Cache sized from this configuration.
    pub(crate) fn cache<V: Clone>(&self, capacity: usize) -> ShardedCache<V> {
        ShardedCache::with_shards(capacity, self.shard_count, self.min_shard_capacity)
    }
}
