//! # Service Layer
//!
//! Wires the domain logic to the ports.
//!
//! ```text
//!                    ┌───────────────────────────────┐
//!   verifiers ──────→│ AccessControl<M>              │←────── event bus
//!                    │   ├── AccessControlService    │
//!                    │   │     settings, policies,   │
//!                    │   │     caches, store         │
//!                    │   └── M: MembershipMode       │
//!                    │         cert | pwk | public   │
//!                    └───────────────────────────────┘
//! ```
//!
//! The three provider modes share everything except how a wire member is
//! resolved and which trust state backs it.

pub mod cert_provider;
pub mod factory;
pub mod mode;
pub mod pk_provider;
pub mod provider;
pub mod pwk_provider;

use crate::config::AccessControlConfig;
use crate::domain::cache::ShardedCache;
use crate::domain::crypto;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::member::ResolvedMember;
use crate::domain::policy_table::PolicyTable;
use crate::ports::outbound::BlockchainStore;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use shared_types::{AddrType, AuthType, ChainConfig, ConsensusType, HashType, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Chain-wide settings taken from the chain config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSettings {
    pub chain_id: String,
    pub auth_type: AuthType,
    pub hash_type: HashType,
    pub addr_type: AddrType,
    pub consensus_type: ConsensusType,
    pub block_version: u32,
}

impl ChainSettings {
    pub fn from_chain_config(config: &ChainConfig) -> Self {
        Self {
            chain_id: config.chain_id.clone(),
            auth_type: config.auth_type,
            hash_type: config.crypto.hash,
            addr_type: config.vm.addr_type,
            consensus_type: config.consensus.consensus_type,
            block_version: config.block_version,
        }
    }
}

/// State shared by every provider mode.
///
/// Settings and the policy table are copy-on-write: readers clone the `Arc`
/// and keep a consistent snapshot for the whole request.
pub struct AccessControlService {
    config: AccessControlConfig,
    settings: RwLock<Arc<ChainSettings>>,
    policies: RwLock<Arc<PolicyTable>>,
    member_cache: ShardedCache<Arc<ResolvedMember>>,
    cert_cache: ShardedCache<Vec<u8>>,
    payer_cache: ShardedCache<Vec<u8>>,
    address_cache: ShardedCache<String>,
    store: Arc<dyn BlockchainStore>,
}

impl AccessControlService {
    pub fn new(
        config: AccessControlConfig,
        settings: ChainSettings,
        policies: PolicyTable,
        store: Arc<dyn BlockchainStore>,
    ) -> Self {
        Self {
            member_cache: config.cache(config.member_cache_capacity),
            cert_cache: config.cache(config.cert_cache_capacity),
            payer_cache: config.cache(config.payer_cache_capacity),
            address_cache: config.cache(config.member_cache_capacity),
            settings: RwLock::new(Arc::new(settings)),
            policies: RwLock::new(Arc::new(policies)),
            config,
            store,
        }
    }

    pub fn config(&self) -> &AccessControlConfig {
        &self.config
    }

    pub fn settings(&self) -> Arc<ChainSettings> {
        Arc::clone(&self.settings.read())
    }

    pub fn replace_settings(&self, settings: ChainSettings) {
        *self.settings.write() = Arc::new(settings);
    }

    pub fn policies(&self) -> Arc<PolicyTable> {
        Arc::clone(&self.policies.read())
    }

    pub fn replace_policies(&self, policies: PolicyTable) {
        *self.policies.write() = Arc::new(policies);
    }

    pub fn hash_type(&self) -> HashType {
        self.settings.read().hash_type
    }

    // =========================================================================
    // MEMBER CACHE
    // =========================================================================

    pub fn cached_member(&self, key: &str) -> Option<Arc<ResolvedMember>> {
        self.member_cache.get(key)
    }

    pub fn cache_member(&self, key: String, member: Arc<ResolvedMember>) {
        self.member_cache.put(key, member);
    }

    pub fn forget_member(&self, key: &str) -> bool {
        self.member_cache.remove(key).is_some()
    }

    pub fn clear_members(&self) {
        self.member_cache.clear();
    }

    pub fn cached_member_count(&self) -> usize {
        self.member_cache.len()
    }

    // =========================================================================
    // CERT CACHE
    // =========================================================================

    /// Certificate bytes by hex cert id or alias, from the cache or the
    /// `CERT_MANAGE` store namespace.
    pub fn lookup_cert(&self, id: &str) -> AccessControlResult<Vec<u8>> {
        if let Some(bytes) = self.cert_cache.get(id) {
            return Ok(bytes);
        }
        match self.read(crate::domain::defaults::contracts::CERT_MANAGE, id.as_bytes())? {
            Some(bytes) => {
                debug!(cert_id = %id, "Certificate loaded from store");
                self.cert_cache.put(id, bytes.clone());
                Ok(bytes)
            }
            None => Err(AccessControlError::UnknownMember(id.to_string())),
        }
    }

    pub fn forget_cert(&self, id: &str) -> bool {
        self.cert_cache.remove(id).is_some()
    }

    // =========================================================================
    // PAYER AND ADDRESS CACHES
    // =========================================================================

    pub fn payer(&self, key: &str) -> Option<Vec<u8>> {
        self.payer_cache.get(key)
    }

    pub fn set_payer(&self, key: &str, payer_pem: Vec<u8>) {
        self.payer_cache.put(key, payer_pem);
    }

    pub fn forget_payer(&self, key: &str) -> bool {
        self.payer_cache.remove(key).is_some()
    }

    /// Address of a PEM or DER public key under the chain address type.
    pub fn address(&self, public_key: &[u8]) -> AccessControlResult<String> {
        let key = crypto::parse_public_key(public_key)?;
        let cache_key = hex::encode(crypto::public_key_der(&key)?);
        if let Some(address) = self.address_cache.get(&cache_key) {
            return Ok(address);
        }
        let address = crypto::address(self.settings.read().addr_type, &key)?;
        self.address_cache.put(cache_key, address.clone());
        Ok(address)
    }

    pub fn clear_addresses(&self) {
        self.address_cache.clear();
    }

    // =========================================================================
    // STORE
    // =========================================================================

    pub fn read(&self, contract: &str, key: &[u8]) -> AccessControlResult<Option<Vec<u8>>> {
        Ok(self.store.read_object(contract, key)?)
    }

    /// Read and decode a JSON value.
    pub fn read_json<T: DeserializeOwned>(&self, contract: &str, key: &str) -> AccessControlResult<Option<T>> {
        let Some(bytes) = self.read(contract, key.as_bytes())? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            AccessControlError::Store(StoreError::Corrupt {
                contract: contract.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
    }
}
