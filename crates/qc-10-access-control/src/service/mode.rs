//! # Membership Modes
//!
//! The seam between the generic provider and the credential model of the
//! chain. A mode owns the trust state of its auth type and turns wire
//! members into resolved ones; everything else lives in the provider.

use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::evaluator::CountingMode;
use crate::domain::member::ResolvedMember;
use crate::service::AccessControlService;
use shared_bus::BlockchainEvent;
use shared_types::{AuthType, ChainConfig, Member};
use std::collections::HashSet;

/// Credential model of one auth type.
pub trait MembershipMode: Send + Sync {
    fn auth_type(&self) -> AuthType;

    /// Rebuild the mode's trust state from a chain config.
    ///
    /// Broken entries are logged and skipped; the call fails only when the
    /// resulting state would be unusable.
    fn load_config(&self, config: &ChainConfig, service: &AccessControlService) -> AccessControlResult<()>;

    /// Restore state persisted by the management contracts.
    fn load_from_store(&self, _service: &AccessControlService) -> AccessControlResult<()> {
        Ok(())
    }

    /// Decode and classify a wire member. Signatures are not checked here.
    fn resolve_member(&self, member: &Member, service: &AccessControlService) -> AccessControlResult<ResolvedMember>;

    /// Whether a cached resolution may serve a request carrying `member`.
    fn accepts_cached(&self, resolved: &ResolvedMember, member: &Member) -> AccessControlResult<()> {
        if resolved.org_id() == member.org_id {
            Ok(())
        } else {
            Err(AccessControlError::UntrustedIssuer {
                org_id: member.org_id.clone(),
                reason: format!("member belongs to {}", resolved.org_id()),
            })
        }
    }

    /// Organizations (or voters, on public chains) that policies count over.
    fn org_count(&self) -> usize;

    /// Organization ids accepted in policy org lists. Empty disables the check.
    fn known_orgs(&self) -> HashSet<String>;

    fn counting_mode(&self) -> CountingMode {
        CountingMode::PerOrganization
    }

    /// Organization owning a consensus node id.
    fn lookup_consensus_node(&self, node_id: &str) -> Option<String>;

    /// Apply a mode-specific event. Returns `false` when the event does not
    /// concern this mode.
    fn handle_event(&self, _event: &BlockchainEvent, _service: &AccessControlService) -> AccessControlResult<bool> {
        Ok(false)
    }

    /// Validate a CRL bundle. Returns the CRL count.
    fn validate_crl(&self, _crl_pem: &[u8]) -> AccessControlResult<usize> {
        Err(AccessControlError::Forbidden(format!(
            "CRLs are not used by {:?} chains",
            self.auth_type()
        )))
    }
}
