//! # Core Chain Entities
//!
//! Defines the chain entities consumed by the access-control subsystem.
//! Shapes follow the node's wire messages so that RPC, consensus and the
//! store can hand them over without conversion.
//!
//! ## Clusters
//!
//! - **Identity**: `Member`, `MemberType`, `EndorsementEntry`
//! - **Chain**: `Payload`, `Transaction`, `Block`, `BlockHeader`
//! - **Multi-sign**: `MultiSignInfo`, `MultiSignVoteInfo`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// A 32-byte hash.
pub type Hash = [u8; 32];

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Kind of credential carried by a [`Member`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberType {
    /// Full PEM encoded X.509 certificate.
    Cert,
    /// Hash of the DER encoded certificate under the chain hash type.
    CertHash,
    /// Human readable alias registered for a certificate.
    Alias,
    /// PEM encoded public key.
    PublicKey,
}

impl MemberType {
    /// Wire name of the member type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cert => "CERT",
            Self::CertHash => "CERT_HASH",
            Self::Alias => "ALIAS",
            Self::PublicKey => "PUBLIC_KEY",
        }
    }
}

/// A signer identity as it travels on the wire.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Organization the signer claims to belong to.
    pub org_id: String,
    /// Credential kind.
    pub member_type: MemberType,
    /// Encoded credential or lookup key.
    #[serde_as(as = "Bytes")]
    pub member_info: Vec<u8>,
}

impl Member {
    /// Member carrying a full PEM certificate.
    pub fn cert(org_id: impl Into<String>, pem: impl Into<Vec<u8>>) -> Self {
        Self {
            org_id: org_id.into(),
            member_type: MemberType::Cert,
            member_info: pem.into(),
        }
    }

    /// Member carrying a certificate hash (raw hash bytes).
    pub fn cert_hash(org_id: impl Into<String>, hash: impl Into<Vec<u8>>) -> Self {
        Self {
            org_id: org_id.into(),
            member_type: MemberType::CertHash,
            member_info: hash.into(),
        }
    }

    /// Member carrying a certificate alias.
    pub fn alias(org_id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            member_type: MemberType::Alias,
            member_info: alias.into().into_bytes(),
        }
    }

    /// Member carrying a PEM public key.
    pub fn public_key(org_id: impl Into<String>, pem: impl Into<Vec<u8>>) -> Self {
        Self {
            org_id: org_id.into(),
            member_type: MemberType::PublicKey,
            member_info: pem.into(),
        }
    }
}

/// A `{signer, signature}` pair attached to a transaction or message.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementEntry {
    /// The signer; `None` entries are skipped during refinement.
    pub signer: Option<Member>,
    /// Signature over the endorsed bytes.
    #[serde_as(as = "Bytes")]
    pub signature: Vec<u8>,
}

impl EndorsementEntry {
    /// Create an endorsement.
    pub fn new(signer: Member, signature: Vec<u8>) -> Self {
        Self {
            signer: Some(signer),
            signature,
        }
    }
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// Transaction type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    /// Read-only contract query.
    QueryContract,
    /// State changing contract invocation.
    InvokeContract,
    /// Block/tx/event subscription.
    Subscribe,
    /// Archive/restore of historical blocks.
    Archive,
}

impl TxType {
    /// All transaction types.
    pub const ALL: [TxType; 4] = [
        TxType::QueryContract,
        TxType::InvokeContract,
        TxType::Subscribe,
        TxType::Archive,
    ];

    /// Wire name, also used as the tx-type resource name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryContract => "QUERY_CONTRACT",
            Self::InvokeContract => "INVOKE_CONTRACT",
            Self::Subscribe => "SUBSCRIBE",
            Self::Archive => "ARCHIVE",
        }
    }
}

/// Status codes returned on the wire for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatusCode {
    /// Executed / accepted.
    Success,
    /// Unexpected failure inside the node.
    InternalError,
    /// Authentication or authorization failed.
    AuthFailed,
    /// Contract execution failed.
    ContractFail,
}

/// A key/value parameter of a contract call.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Parameter name.
    pub key: String,
    /// Raw parameter value.
    #[serde_as(as = "Bytes")]
    pub value: Vec<u8>,
}

impl KeyValuePair {
    /// Create a parameter.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The signed part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Chain identifier.
    pub chain_id: String,
    /// Transaction type.
    pub tx_type: TxType,
    /// Transaction identifier.
    pub tx_id: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    /// Expiration time, 0 for none.
    pub expiration_time: i64,
    /// Contract being invoked.
    pub contract_name: String,
    /// Method being invoked.
    pub method: String,
    /// Call parameters.
    pub parameters: Vec<KeyValuePair>,
    /// Sequence number for config transactions.
    pub sequence: u64,
}

impl Payload {
    /// Look up a call parameter by key.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&[u8]> {
        self.parameters
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_slice())
    }

    /// Look up a call parameter and decode it as UTF-8.
    #[must_use]
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameter(key)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    /// The bytes covered by sender, endorser and payer signatures.
    ///
    /// # Errors
    ///
    /// Returns the bincode error if the payload cannot be serialized.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Resource name `"<contract>-<method>"` of this call.
    #[must_use]
    pub fn resource_name(&self) -> String {
        format!("{}-{}", self.contract_name, self.method)
    }
}

/// Execution result recorded for a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// Status code.
    pub code: TxStatusCode,
    /// Optional message.
    pub message: String,
}

/// A transaction as received from clients or carried in blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The signed payload.
    pub payload: Payload,
    /// Sender signature over the payload.
    pub sender: Option<EndorsementEntry>,
    /// Endorser signatures over the payload.
    pub endorsers: Vec<EndorsementEntry>,
    /// Optional gas payer signature over the payload.
    pub payer: Option<EndorsementEntry>,
    /// Execution result, present once the transaction is in a block.
    pub result: Option<TxResult>,
}

impl Transaction {
    /// Create an unsigned transaction around a payload.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            sender: None,
            endorsers: Vec::new(),
            payer: None,
            result: None,
        }
    }

    /// Whether the transaction executed successfully.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(
            self.result,
            Some(TxResult {
                code: TxStatusCode::Success,
                ..
            })
        )
    }
}

/// The header of a committed block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain identifier.
    pub chain_id: String,
    /// Block protocol version.
    pub block_version: u32,
    /// Block height.
    pub block_height: u64,
    /// Block hash.
    pub block_hash: Hash,
}

/// A committed block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Transactions in block order.
    pub txs: Vec<Transaction>,
}

// =============================================================================
// CLUSTER C: MULTI-SIGN
// =============================================================================

/// Status of a multi-sign proposal.
///
/// State progression: Processing → Passed | Refused (both terminal)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultiSignStatus {
    /// Collecting votes.
    #[default]
    Processing,
    /// Agree votes satisfied the resource policy.
    Passed,
    /// Reject votes made the policy unreachable.
    Refused,
}

impl MultiSignStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// A single multi-sign vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteStatus {
    /// Endorses the proposal.
    Agree,
    /// Rejects the proposal.
    Reject,
}

/// A vote together with the voter's endorsement over the proposal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSignVoteInfo {
    /// Vote direction.
    pub vote: VoteStatus,
    /// Voter signature over the proposal payload.
    pub endorsement: EndorsementEntry,
}

/// Accumulated state of a multi-sign proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSignInfo {
    /// The proposed call; its contract/method name the governed resource.
    pub payload: Payload,
    /// Current status.
    pub status: MultiSignStatus,
    /// Votes collected so far.
    pub vote_infos: Vec<MultiSignVoteInfo>,
}

impl MultiSignInfo {
    /// A fresh proposal in `Processing`.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            status: MultiSignStatus::Processing,
            vote_infos: Vec::new(),
        }
    }

    /// Endorsements of all votes in the given direction.
    #[must_use]
    pub fn endorsements(&self, vote: VoteStatus) -> Vec<EndorsementEntry> {
        self.vote_infos
            .iter()
            .filter(|info| info.vote == vote)
            .map(|info| info.endorsement.clone())
            .collect()
    }
}
