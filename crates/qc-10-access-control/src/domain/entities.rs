//! # Access Control Entities
//!
//! Roles, member status and the principal handed to the evaluator.

use crate::domain::errors::AccessControlError;
use serde::{Deserialize, Serialize};
use shared_types::EndorsementEntry;
use std::fmt;
use std::str::FromStr;

/// Role of a resolved member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Organization administrator.
    Admin,
    /// Ordinary client.
    Client,
    /// Consensus node.
    ConsensusNode,
    /// Synchronizing, non-voting node.
    CommonNode,
    /// Light client.
    Light,
}

impl Role {
    /// All roles.
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Client,
        Role::ConsensusNode,
        Role::CommonNode,
        Role::Light,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Client => "CLIENT",
            Self::ConsensusNode => "CONSENSUS",
            Self::CommonNode => "COMMON",
            Self::Light => "LIGHT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessControlError;

    /// Accepts the certificate OU spellings (`admin`, `client`, `consensus`,
    /// `common`, `light`) case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "client" => Ok(Self::Client),
            "consensus" | "consensus_node" => Ok(Self::ConsensusNode),
            "common" | "common_node" => Ok(Self::CommonNode),
            "light" => Ok(Self::Light),
            other => Err(AccessControlError::ConfigurationError(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// Status of a member as seen by the RPC layer's peer checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Resolvable and in good standing.
    Normal,
    /// Present in the frozen set.
    Frozen,
    /// Listed in a current CRL.
    Revoked,
    /// Malformed, unknown or untrusted.
    Invalid,
}

impl From<&AccessControlError> for MemberStatus {
    fn from(err: &AccessControlError) -> Self {
        match err {
            AccessControlError::FrozenCredential(_) => Self::Frozen,
            AccessControlError::RevokedCredential(_) => Self::Revoked,
            _ => Self::Invalid,
        }
    }
}

/// Kind of administrative material passed to `verify_related_material`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedMaterialKind {
    /// PEM encoded certificate revocation list(s).
    Crl,
}

/// A boxed verification request: who signed what, for which resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    resource_name: String,
    endorsements: Vec<EndorsementEntry>,
    message: Vec<u8>,
    target_org_id: Option<String>,
}

impl Principal {
    /// Principal without a target organization.
    pub fn new(
        resource_name: impl Into<String>,
        endorsements: Vec<EndorsementEntry>,
        message: Vec<u8>,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            endorsements,
            message,
            target_org_id: None,
        }
    }

    /// Principal scoped to one organization, as required by `SELF` rules.
    pub fn for_target_org(
        resource_name: impl Into<String>,
        endorsements: Vec<EndorsementEntry>,
        message: Vec<u8>,
        target_org_id: impl Into<String>,
    ) -> Self {
        Self {
            target_org_id: Some(target_org_id.into()),
            ..Self::new(resource_name, endorsements, message)
        }
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn endorsements(&self) -> &[EndorsementEntry] {
        &self.endorsements
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn target_org_id(&self) -> Option<&str> {
        self.target_org_id.as_deref()
    }
}
