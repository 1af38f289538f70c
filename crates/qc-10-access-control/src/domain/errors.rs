//! # Access Control Errors
//!
//! Error kinds surfaced by member resolution, trust validation and policy
//! evaluation, plus their mapping onto wire status codes.

use shared_types::{MultiSignStatus, StoreError, TxStatusCode};
use thiserror::Error;

/// Errors that can occur during access-control operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessControlError {
    /// PEM/DER decode failure or a member kind the provider cannot handle.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// A cert hash or alias that neither the cache nor the store can resolve.
    #[error("Unknown member: {0}")]
    UnknownMember(String),

    /// The certificate chains to a root outside the claimed organization.
    #[error("Untrusted issuer for org {org_id}: {reason}")]
    UntrustedIssuer { org_id: String, reason: String },

    /// A certificate serial listed in the current CRL of its issuer.
    #[error("Revoked credential: {0}")]
    RevokedCredential(String),

    /// A certificate present in the frozen set.
    #[error("Frozen credential: {0}")]
    FrozenCredential(String),

    /// Cryptographic verification of a signature failed.
    #[error("Invalid signature from {0}")]
    InvalidSignature(String),

    /// The refined endorsements do not satisfy the resource policy.
    #[error(
        "Policy {rule} unsatisfied for {resource}: required {required}, received {received}{detail}"
    )]
    PolicyUnsatisfied {
        resource: String,
        rule: String,
        required: usize,
        received: usize,
        /// Pre-formatted suffix naming the failing org/role constraint.
        detail: String,
    },

    /// A mandatory policy lookup found nothing.
    #[error("Policy not found for resource {0}")]
    PolicyNotFound(String),

    /// A configuration entry was rejected at load time.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The resource is forbidden outright in this provider mode.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The multi-sign proposal already reached a terminal status.
    #[error("Multi-sign proposal already finished with status {0:?}")]
    MultiSignFinished(MultiSignStatus),

    /// The resource policy cannot be collected through multi-sign.
    #[error("Rule {rule} of resource {resource} is not supported by multi-sign")]
    RuleNotSupportedByMultiSign { resource: String, rule: String },

    /// The blockchain store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The crypto library failed for reasons unrelated to the input.
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl AccessControlError {
    /// Build a policy shortfall error.
    pub fn unsatisfied(
        resource: &str,
        rule: impl ToString,
        required: usize,
        received: usize,
        detail: impl Into<String>,
    ) -> Self {
        let detail = detail.into();
        Self::PolicyUnsatisfied {
            resource: resource.to_string(),
            rule: rule.to_string(),
            required,
            received,
            detail: if detail.is_empty() {
                detail
            } else {
                format!(" ({detail})")
            },
        }
    }

    /// Wire status code for a failed verification.
    #[must_use]
    pub fn tx_status_code(&self) -> TxStatusCode {
        match self {
            Self::Store(_) | Self::Crypto(_) => TxStatusCode::InternalError,
            _ => TxStatusCode::AuthFailed,
        }
    }
}

/// Crate result alias.
pub type AccessControlResult<T> = Result<T, AccessControlError>;
