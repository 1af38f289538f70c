//! # Chain Events
//!
//! Defines all event types that flow through the shared bus. Each variant is
//! published by the component that commits the corresponding on-chain change
//! and is consumed by the access-control subscriber.

use serde::{Deserialize, Serialize};
use shared_types::chain_config::ChainConfig;
use shared_types::entities::Block;

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockchainEvent {
    // =========================================================================
    // CHAIN CONFIG
    // =========================================================================
    /// A new chain configuration was committed.
    ChainConfigUpdated(ChainConfig),

    // =========================================================================
    // CERT MANAGEMENT
    // =========================================================================
    /// Certificates were frozen.
    CertsFrozen {
        /// PEM certificates.
        certs: Vec<String>,
    },

    /// Certificates were unfrozen.
    CertsUnfrozen {
        /// PEM certificates.
        certs: Vec<String>,
        /// Hex certificate ids to resolve through the store.
        cert_hashes: Vec<String>,
    },

    /// Certificate revocation lists were published.
    CertsRevoked {
        /// PEM encoded CRLs.
        crls: Vec<String>,
    },

    /// Certificates were deleted from the on-chain cert registry.
    CertsDeleted {
        /// Hex certificate ids.
        cert_hashes: Vec<String>,
    },

    /// Certificate aliases were deleted.
    CertAliasesDeleted {
        /// Alias names.
        aliases: Vec<String>,
    },

    /// A certificate alias was re-pointed to another certificate.
    CertAliasUpdated {
        /// Alias name.
        alias: String,
    },

    // =========================================================================
    // PUBKEY MANAGEMENT
    // =========================================================================
    /// A registered public key was deleted.
    PubkeyDeleted {
        /// PEM public key.
        pubkey: String,
    },

    // =========================================================================
    // CONSENSUS
    // =========================================================================
    /// A Maxbft epoch switch materialized pending membership changes.
    MaxbftEpochConfigured {
        /// The epoch that just started.
        epoch_id: u64,
    },

    // =========================================================================
    // BLOCK INFO
    // =========================================================================
    /// A block was committed.
    BlockCommitted(Block),
}

impl BlockchainEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ChainConfigUpdated(_) => EventTopic::ChainConfig,
            Self::CertsFrozen { .. } => EventTopic::CertManageCertsFreeze,
            Self::CertsUnfrozen { .. } => EventTopic::CertManageCertsUnfreeze,
            Self::CertsRevoked { .. } => EventTopic::CertManageCertsRevoke,
            Self::CertsDeleted { .. } => EventTopic::CertManageCertsDelete,
            Self::CertAliasesDeleted { .. } => EventTopic::CertManageCertsAliasDelete,
            Self::CertAliasUpdated { .. } => EventTopic::CertManageAliasUpdate,
            Self::PubkeyDeleted { .. } => EventTopic::PubkeyManageDelete,
            Self::MaxbftEpochConfigured { .. } => EventTopic::MaxbftEpochConf,
            Self::BlockCommitted(_) => EventTopic::BlockInfo,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Chain configuration committed.
    ChainConfig,
    /// Certificates frozen.
    CertManageCertsFreeze,
    /// Certificates unfrozen.
    CertManageCertsUnfreeze,
    /// CRLs published.
    CertManageCertsRevoke,
    /// Certificates deleted.
    CertManageCertsDelete,
    /// Aliases deleted.
    CertManageCertsAliasDelete,
    /// Alias updated.
    CertManageAliasUpdate,
    /// Public key deleted.
    PubkeyManageDelete,
    /// Maxbft epoch switch.
    MaxbftEpochConf,
    /// Block committed.
    BlockInfo,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &BlockchainEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
