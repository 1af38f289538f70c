//! # Inbound Ports (Driving Ports / API)
//!
//! Traits that define the public API of this subsystem.

use crate::domain::entities::{MemberStatus, Principal, RelatedMaterialKind};
use crate::domain::errors::AccessControlResult;
use crate::domain::member::ResolvedMember;
use crate::domain::policy::Policy;
use shared_bus::BlockchainEvent;
use shared_types::{
    AuthType, EndorsementEntry, HashType, Member, MultiSignInfo, MultiSignStatus, Transaction,
};
use std::sync::Arc;

/// Primary Access Control API.
///
/// Every block-version-aware call selects the policy stratum in force for
/// `block_version`. Implementations must be thread-safe (`Send + Sync`).
pub trait AccessControlProvider: Send + Sync {
    // =========================================================================
    // Members
    // =========================================================================

    /// Resolve a wire member and cache the result.
    fn new_member(&self, member: &Member) -> AccessControlResult<Arc<ResolvedMember>>;

    /// Standing of a member, for RPC-layer peer checks.
    fn get_member_status(&self, member: &Member) -> MemberStatus;

    // =========================================================================
    // Principals
    // =========================================================================

    /// Box a verification request.
    fn create_principal(
        &self,
        resource_name: &str,
        endorsements: Vec<EndorsementEntry>,
        message: Vec<u8>,
    ) -> Principal {
        Principal::new(resource_name, endorsements, message)
    }

    /// Box a verification request scoped to one organization.
    fn create_principal_for_target_org(
        &self,
        resource_name: &str,
        endorsements: Vec<EndorsementEntry>,
        message: Vec<u8>,
        target_org_id: &str,
    ) -> Principal {
        Principal::for_target_org(resource_name, endorsements, message, target_org_id)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Tx-type, sender and endorsement checks of a transaction.
    fn verify_tx_principal(
        &self,
        tx: &Transaction,
        resource_name: &str,
        block_version: u32,
    ) -> AccessControlResult<()>;

    /// Check an inter-node message against its message-type policy.
    fn verify_msg_principal(&self, principal: &Principal, block_version: u32) -> AccessControlResult<()>;

    /// Next status of a multi-sign proposal.
    fn verify_multi_sign_tx_principal(
        &self,
        info: &MultiSignInfo,
        block_version: u32,
    ) -> AccessControlResult<MultiSignStatus>;

    /// Fail unless the resource policy can be collected through multi-sign.
    fn is_rule_supported_by_multi_sign(&self, resource_name: &str, block_version: u32) -> AccessControlResult<()>;

    /// Endorsements that survive refinement.
    fn get_valid_endorsements(
        &self,
        principal: &Principal,
        block_version: u32,
    ) -> AccessControlResult<Vec<EndorsementEntry>>;

    // =========================================================================
    // Adjunct caches
    // =========================================================================

    /// Account address of a public key (PEM or DER).
    fn get_address_from_cache(&self, public_key: &[u8]) -> AccessControlResult<String>;

    /// Certificate bytes by hex cert id or alias.
    fn get_cert_from_cache(&self, cert_id: &str) -> AccessControlResult<Vec<u8>>;

    /// Payer public-key PEM bound to `contract` or `contract-method`.
    fn get_payer_from_cache(&self, key: &str) -> Option<Vec<u8>>;

    fn set_payer_to_cache(&self, key: &str, payer_pem: Vec<u8>);

    // =========================================================================
    // Administration
    // =========================================================================

    /// Validate a CRL bundle without installing it. Returns the CRL count.
    fn validate_crl(&self, crl_pem: &[u8]) -> AccessControlResult<usize>;

    /// Validate administrative material.
    fn verify_related_material(&self, kind: RelatedMaterialKind, material: &[u8]) -> AccessControlResult<()>;

    /// Policy registered for a resource in the stratum of `block_version`.
    fn get_policy(&self, resource_name: &str, block_version: u32) -> AccessControlResult<Policy>;

    /// Effective current policies, sorted by resource name.
    fn all_resource_policies(&self) -> Vec<(String, Policy)>;

    /// Organization owning a consensus node id.
    fn lookup_consensus_node(&self, node_id: &str) -> Option<String>;

    fn hash_type(&self) -> HashType;

    fn auth_type(&self) -> AuthType;

    /// Chain-wide organization count (admin count on public chains).
    fn org_count(&self) -> usize;
}

/// Consumer of committed chain events.
///
/// Handlers are idempotent and log, rather than return, failures so a bad
/// event never stops the subscriber.
pub trait ChainEventHandler: Send + Sync {
    fn handle_event(&self, event: &BlockchainEvent);
}
