//! # Chain Configuration
//!
//! The on-chain configuration consumed by the access-control subsystem.
//! It is produced by the chain-config contract and delivered either at
//! startup or through the `ChainConfig` bus topic.

use serde::{Deserialize, Serialize};

/// Credential mode of the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Members are identified by X.509 certificates.
    #[default]
    PermissionedWithCert,
    /// Members are identified by raw public keys registered per organization.
    PermissionedWithKey,
    /// Open chain; members are raw public keys, admins are pinned keys.
    Public,
}

/// Hash algorithm configured for the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashType {
    /// SHA-256.
    #[default]
    #[serde(rename = "SHA256")]
    Sha256,
    /// SHA3-256.
    #[serde(rename = "SHA3_256")]
    Sha3_256,
    /// SM3.
    #[serde(rename = "SM3")]
    Sm3,
}

impl HashType {
    /// Configuration name of the hash type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha3_256 => "SHA3_256",
            Self::Sm3 => "SM3",
        }
    }
}

/// Address derivation scheme for accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddrType {
    /// Native address format.
    #[default]
    Chainmaker,
    /// ZXL address format (`ZX` prefix, SM3 based).
    Zxl,
    /// Ethereum address format (Keccak-256 of the uncompressed point).
    Ethereum,
}

/// Consensus algorithm in force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusType {
    /// Single node.
    Solo,
    /// Raft.
    Raft,
    /// Tendermint-style BFT.
    #[default]
    Tbft,
    /// Maxbft (chained HotStuff); membership changes apply per epoch.
    Maxbft,
    /// Delegated proof of stake.
    Dpos,
}

/// Crypto section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Hash algorithm.
    #[serde(default)]
    pub hash: HashType,
}

/// VM section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Address type used for accounts.
    #[serde(default)]
    pub addr_type: AddrType,
}

/// Consensus node ids of one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Organization id.
    pub org_id: String,
    /// Consensus node ids.
    #[serde(default)]
    pub node_id: Vec<String>,
}

/// Consensus section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Consensus algorithm.
    #[serde(rename = "type", default)]
    pub consensus_type: ConsensusType,
    /// Consensus nodes per organization.
    #[serde(default)]
    pub nodes: Vec<OrgConfig>,
}

/// Trust roots of one organization.
///
/// In certificate mode `root` holds CA certificates (roots and
/// intermediates); in key modes it holds administrator public keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRootConfig {
    /// Organization id (`"public"` in public mode).
    pub org_id: String,
    /// PEM blocks.
    #[serde(default)]
    pub root: Vec<String>,
}

/// A pinned identity that bypasses certificate chain validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustMemberConfig {
    /// PEM certificate.
    pub member_info: String,
    /// Organization the member is pinned to.
    pub org_id: String,
    /// Role name (`admin`, `client`, `consensus`, `common`, `light`).
    pub role: String,
    /// Node id for consensus/common trust members.
    #[serde(default)]
    pub node_id: String,
}

/// Policy as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Rule string: `ANY`, `ALL`, `MAJORITY`, `SELF`, `FORBIDDEN`, `DELETE`,
    /// an integer `"N"` or a fraction `"N/D"`.
    pub rule: String,
    /// Organizations the rule ranges over; empty means all.
    #[serde(default)]
    pub org_list: Vec<String>,
    /// Roles the rule ranges over; empty means all.
    #[serde(default)]
    pub role_list: Vec<String>,
}

/// A resource-policy override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicyConfig {
    /// Resource name.
    pub resource_name: String,
    /// Policy for the resource.
    pub policy: PolicyConfig,
}

/// Chain configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain identifier.
    pub chain_id: String,
    /// Block version in force.
    #[serde(default)]
    pub block_version: u32,
    /// Credential mode.
    #[serde(default)]
    pub auth_type: AuthType,
    /// Crypto section.
    #[serde(default)]
    pub crypto: CryptoConfig,
    /// VM section.
    #[serde(default)]
    pub vm: VmConfig,
    /// Consensus section.
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Trust roots per organization.
    #[serde(default)]
    pub trust_roots: Vec<TrustRootConfig>,
    /// Pinned trust members.
    #[serde(default)]
    pub trust_members: Vec<TrustMemberConfig>,
    /// Resource-policy overrides.
    #[serde(default)]
    pub resource_policies: Vec<ResourcePolicyConfig>,
}

impl ChainConfig {
    /// Parse a chain configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error on malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
