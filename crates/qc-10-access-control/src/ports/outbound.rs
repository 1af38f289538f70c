//! # Outbound Ports (Driven Ports / SPI)
//!
//! Read access to the blockchain store under the system-contract
//! namespaces.
//!
//! ## Store Layout
//!
//! | Contract | Key | Value |
//! |---|---|---|
//! | `CERT_MANAGE` | `CERT_FREEZE` | JSON array of hex cert ids |
//! | `CERT_MANAGE` | `CERT_CRL` | JSON array of hex AKIs |
//! | `CERT_MANAGE` | hex AKI | CRL PEM |
//! | `CERT_MANAGE` | hex cert id or alias | certificate PEM |
//! | `PUBKEY_MANAGE` | hex hash of the key DER | JSON [`PubkeyInfo`] |

use serde::{Deserialize, Serialize};
use shared_types::StoreError;

/// Key holding the frozen certificate ids.
pub const CERT_FREEZE_KEY: &str = "CERT_FREEZE";

/// Key holding the AKIs that have a CRL on record.
pub const CERT_REVOKE_KEY: &str = "CERT_CRL";

/// Registered public key, as stored by `PUBKEY_MANAGE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubkeyInfo {
    /// PEM or DER public key.
    pub pk_bytes: Vec<u8>,
    /// Role name (`admin`, `client`, ...).
    pub role: String,
    pub org_id: String,
}

/// Read-only KV access to committed state.
///
/// Reads happen on the verifying thread, outside every provider lock.
pub trait BlockchainStore: Send + Sync {
    /// Value stored under `key` in `contract`'s namespace.
    fn read_object(&self, contract: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
}
