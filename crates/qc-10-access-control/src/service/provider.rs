//! # Access Control Provider
//!
//! Generic provider over a [`MembershipMode`]. Implements the verification
//! API and the chain-event handler.
//!
//! ## Transaction Flow
//!
//! ```text
//! sender ──→ resolve ──→ verify signature (skipped for cross-contract calls)
//!                │
//!                ├──→ tx-type policy      (sender only)
//!                ├──→ sender policy       (sender only, current stratum)
//!                └──→ endorsement policy  (refined endorsers + sender)
//!                         │
//!                         └──→ payer signature, cached per contract-method
//! ```
//!
//! ## Refinement
//!
//! Endorsements are de-duplicated by signer, then resolved and verified in
//! parallel. Entries that fail either step are dropped, not reported: the
//! policy check decides whether what remains is enough.

use crate::config::AccessControlConfig;
use crate::domain::crypto;
use crate::domain::defaults::{
    self, contracts, PARAM_CONTRACT_NAME, PARAM_METHOD, PARAM_ORG_ID, SET_CONTRACT_METHOD_PAYER,
    UNSET_CONTRACT_METHOD_PAYER,
};
use crate::domain::entities::{MemberStatus, Principal, RelatedMaterialKind};
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::evaluator::{self, EvaluationContext};
use crate::domain::member::{member_cache_key, ResolvedMember};
use crate::domain::multi_sign;
use crate::domain::policy::Policy;
use crate::domain::policy_table::PolicyTable;
use crate::domain::version::PolicyStratum;
use crate::ports::inbound::{AccessControlProvider, ChainEventHandler};
use crate::ports::outbound::BlockchainStore;
use crate::service::mode::MembershipMode;
use crate::service::{AccessControlService, ChainSettings};
use rayon::prelude::*;
use shared_bus::BlockchainEvent;
use shared_types::{
    AuthType, Block, ChainConfig, EndorsementEntry, HashType, Member, MultiSignInfo,
    MultiSignStatus, Payload, Transaction, VoteStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Access-control provider for one auth type.
pub struct AccessControl<M> {
    service: AccessControlService,
    mode: M,
}

impl<M: MembershipMode> AccessControl<M> {
    /// Build a provider from the chain config in force at startup.
    ///
    /// State persisted by the management contracts (frozen certificates,
    /// CRLs) is restored from `store`.
    pub fn new(
        config: AccessControlConfig,
        chain_config: &ChainConfig,
        store: Arc<dyn BlockchainStore>,
        mode: M,
    ) -> AccessControlResult<Self> {
        config.validate()?;
        if chain_config.auth_type != mode.auth_type() {
            return Err(AccessControlError::ConfigurationError(format!(
                "chain auth type {:?} does not match provider {:?}",
                chain_config.auth_type,
                mode.auth_type()
            )));
        }

        let service = AccessControlService::new(
            config,
            ChainSettings::from_chain_config(chain_config),
            PolicyTable::new(),
            store,
        );
        mode.load_config(chain_config, &service)?;
        service.replace_policies(Self::policy_table(chain_config, &mode));
        mode.load_from_store(&service)?;

        info!(
            chain_id = %chain_config.chain_id,
            auth_type = ?chain_config.auth_type,
            org_id = %service.config().local_org_id,
            orgs = mode.org_count(),
            "Access control provider initialized"
        );
        Ok(Self { service, mode })
    }

    fn policy_table(chain_config: &ChainConfig, mode: &M) -> PolicyTable {
        let mut table = defaults::default_policy_table(
            chain_config.auth_type,
            chain_config.consensus.consensus_type,
        );
        let applied = table.install_overrides(&chain_config.resource_policies, &mode.known_orgs());
        debug!(
            applied,
            configured = chain_config.resource_policies.len(),
            "Resource policy overrides installed"
        );
        table
    }

    pub fn mode(&self) -> &M {
        &self.mode
    }

    pub fn service(&self) -> &AccessControlService {
        &self.service
    }

    // =========================================================================
    // CHAIN CONFIG
    // =========================================================================

    /// Rebuild trust state and policies from a committed chain config.
    pub fn apply_chain_config(&self, chain_config: &ChainConfig) -> AccessControlResult<()> {
        if chain_config.auth_type != self.mode.auth_type() {
            return Err(AccessControlError::ConfigurationError(format!(
                "auth type cannot change from {:?} to {:?}",
                self.mode.auth_type(),
                chain_config.auth_type
            )));
        }
        self.mode.load_config(chain_config, &self.service)?;
        self.service.replace_settings(ChainSettings::from_chain_config(chain_config));
        self.service
            .replace_policies(Self::policy_table(chain_config, &self.mode));
        self.service.clear_members();
        self.service.clear_addresses();
        info!(
            block_version = chain_config.block_version,
            orgs = self.mode.org_count(),
            "Chain config applied"
        );
        Ok(())
    }

    // =========================================================================
    // MEMBERS AND REFINEMENT
    // =========================================================================

    fn resolve(&self, member: &Member) -> AccessControlResult<Arc<ResolvedMember>> {
        let key = member_cache_key(member);
        if let Some(cached) = self.service.cached_member(&key) {
            self.mode.accepts_cached(&cached, member)?;
            return Ok(cached);
        }
        let resolved = Arc::new(self.mode.resolve_member(member, &self.service)?);
        self.service.cache_member(key, Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Drop duplicate, unresolvable and badly signed endorsements.
    fn refine(
        &self,
        endorsements: &[EndorsementEntry],
        message: &[u8],
    ) -> (Vec<EndorsementEntry>, Vec<Arc<ResolvedMember>>) {
        let mut seen = HashSet::new();
        let unique: Vec<(&EndorsementEntry, &Member)> = endorsements
            .iter()
            .filter_map(|entry| match &entry.signer {
                Some(signer) if seen.insert(signer.member_info.as_slice()) => Some((entry, signer)),
                Some(_) => None,
                None => {
                    debug!("Skipping endorsement without signer");
                    None
                }
            })
            .collect();

        unique
            .par_iter()
            .filter_map(|(entry, signer)| {
                let verified = self.resolve(signer).and_then(|member| {
                    member.verify(message, &entry.signature)?;
                    Ok(member)
                });
                match verified {
                    Ok(member) => Some(((*entry).clone(), member)),
                    Err(e) => {
                        debug!(org_id = %signer.org_id, error = %e, "Endorsement dropped");
                        None
                    }
                }
            })
            .collect::<Vec<_>>()
            .into_iter()
            .unzip()
    }

    fn context<'a>(
        &self,
        resource: &'a str,
        stratum: PolicyStratum,
        target_org: Option<&'a str>,
    ) -> EvaluationContext<'a> {
        EvaluationContext::new(resource, self.mode.org_count(), self.mode.counting_mode())
            .with_strict_majority(stratum.is_legacy())
            .with_target_org(target_org)
    }

    fn signing_bytes(payload: &Payload) -> AccessControlResult<Vec<u8>> {
        payload
            .signing_bytes()
            .map_err(|e| AccessControlError::MalformedCredential(format!("payload encoding: {e}")))
    }

    /// Resource policy for endorsement checks, `None` when unconstrained.
    ///
    /// Historical strata treat an unknown resource as unconstrained here.
    fn endorsement_policy(
        tables: &PolicyTable,
        resource: &str,
        stratum: PolicyStratum,
    ) -> AccessControlResult<Option<Policy>> {
        match tables.resource_policy(resource, stratum) {
            Err(AccessControlError::PolicyNotFound(_)) => Ok(None),
            other => other,
        }
    }

    /// Unknown resources are forbidden in every stratum.
    fn multi_sign_policy(&self, resource: &str, stratum: PolicyStratum) -> AccessControlResult<Policy> {
        let policy = match self.service.policies().resource_policy(resource, stratum) {
            Ok(Some(policy)) => policy,
            Ok(None) | Err(AccessControlError::PolicyNotFound(_)) => {
                return Err(AccessControlError::Forbidden(format!(
                    "{resource} has no resource policy"
                )))
            }
            Err(e) => return Err(e),
        };
        multi_sign::ensure_supported(resource, &policy)?;
        Ok(policy)
    }

    fn verify_payer(&self, tx: &Transaction, sender: &Member, message: &[u8]) -> AccessControlResult<()> {
        let Some(entry) = &tx.payer else {
            return Ok(());
        };
        let Some(payer) = &entry.signer else {
            return Err(AccessControlError::MalformedCredential(
                "payer endorsement has no signer".to_string(),
            ));
        };
        if payer == sender {
            return Ok(());
        }
        let resolved = self.resolve(payer)?;
        resolved.verify(message, &entry.signature)?;
        self.service
            .set_payer(&tx.payload.resource_name(), resolved.public_key_pem()?);
        Ok(())
    }

    // =========================================================================
    // BLOCK EVENTS
    // =========================================================================

    /// Track `ACCOUNT_MANAGER` payer bindings from committed blocks.
    fn apply_block(&self, block: &Block) {
        let Some(tx) = block.txs.first() else {
            return;
        };
        let payload = &tx.payload;
        if payload.contract_name != contracts::ACCOUNT_MANAGER || !tx.succeeded() {
            return;
        }
        let Some(key) = payer_key(payload) else {
            debug!(method = %payload.method, "Payer transaction without contract name");
            return;
        };

        match payload.method.as_str() {
            SET_CONTRACT_METHOD_PAYER => {
                let signer = tx
                    .endorsers
                    .first()
                    .or(tx.sender.as_ref())
                    .and_then(|entry| entry.signer.as_ref());
                let Some(signer) = signer else {
                    warn!(key = %key, "Payer binding without endorsement");
                    return;
                };
                match self.resolve(signer).and_then(|member| member.public_key_pem()) {
                    Ok(pem) => {
                        info!(key = %key, height = block.header.block_height, "Payer bound");
                        self.service.set_payer(&key, pem);
                    }
                    Err(e) => warn!(key = %key, error = %e, "Payer binding skipped"),
                }
            }
            UNSET_CONTRACT_METHOD_PAYER => {
                if self.service.forget_payer(&key) {
                    info!(key = %key, height = block.header.block_height, "Payer unbound");
                }
            }
            _ => {}
        }
    }

    fn forget_pubkey(&self, pem: &str) {
        let mut keys = vec![member_cache_key(&Member::public_key("", pem.as_bytes().to_vec()))];
        if let Ok(canonical) = crypto::parse_public_key(pem.as_bytes()).and_then(|key| crypto::public_key_pem(&key)) {
            keys.push(member_cache_key(&Member::public_key("", canonical)));
        }
        let removed = keys.iter().filter(|key| self.service.forget_member(key)).count();
        debug!(removed, "Deleted public key evicted");
    }
}

/// Payer cache key: `contract` or `contract-method`.
fn payer_key(payload: &Payload) -> Option<String> {
    let contract = payload.parameter_str(PARAM_CONTRACT_NAME)?;
    Some(match payload.parameter_str(PARAM_METHOD) {
        Some(method) if !method.is_empty() => defaults::resource_name(contract, method),
        _ => contract.to_string(),
    })
}

impl<M: MembershipMode> AccessControlProvider for AccessControl<M> {
    fn new_member(&self, member: &Member) -> AccessControlResult<Arc<ResolvedMember>> {
        self.resolve(member)
    }

    fn get_member_status(&self, member: &Member) -> MemberStatus {
        match self.resolve(member) {
            Ok(_) => MemberStatus::Normal,
            Err(e) => MemberStatus::from(&e),
        }
    }

    fn verify_tx_principal(&self, tx: &Transaction, resource_name: &str, block_version: u32) -> AccessControlResult<()> {
        let stratum = PolicyStratum::from_block_version(block_version);
        let payload = &tx.payload;
        let message = Self::signing_bytes(payload)?;

        let (sender_entry, sender_member) = tx
            .sender
            .as_ref()
            .and_then(|entry| entry.signer.as_ref().map(|signer| (entry, signer)))
            .ok_or_else(|| AccessControlError::MalformedCredential("transaction has no sender".to_string()))?;
        let sender = self.resolve(sender_member)?;
        let cross_contract = resource_name != payload.resource_name();
        if !cross_contract {
            sender.verify(&message, &sender_entry.signature)?;
        }

        let tables = self.service.policies();
        let sender_only = [Arc::clone(&sender)];

        let tx_type = payload.tx_type.as_str();
        let tx_policy = tables.tx_type_policy(tx_type, stratum)?;
        evaluator::evaluate(&tx_policy, &sender_only, &self.context(tx_type, stratum, None))?;

        if let Some(policy) = tables.sender_policy(resource_name, stratum) {
            evaluator::evaluate(&policy, &sender_only, &self.context(resource_name, stratum, None))?;
        }

        if let Some(policy) = Self::endorsement_policy(&tables, resource_name, stratum)? {
            let others: Vec<EndorsementEntry> = tx
                .endorsers
                .iter()
                .filter(|entry| entry.signer.as_ref() != Some(sender_member))
                .cloned()
                .collect();
            let (_, mut endorsers) = self.refine(&others, &message);
            let ctx = self.context(resource_name, stratum, payload.parameter_str(PARAM_ORG_ID));
            // The sender's role is governed by the tx-type and sender policies.
            evaluator::check_strict_roles(&policy, &endorsers, &ctx)?;
            endorsers.push(sender);
            evaluator::evaluate(&policy, &endorsers, &ctx.with_strict_majority(false))?;
        }

        self.verify_payer(tx, sender_member, &message)
    }

    fn verify_msg_principal(&self, principal: &Principal, block_version: u32) -> AccessControlResult<()> {
        let stratum = PolicyStratum::from_block_version(block_version);
        let resource = principal.resource_name();
        let result = self
            .service
            .policies()
            .msg_type_policy(resource, stratum)
            .and_then(|policy| {
                let (_, endorsers) = self.refine(principal.endorsements(), principal.message());
                let ctx = self.context(resource, stratum, principal.target_org_id());
                evaluator::evaluate(&policy, &endorsers, &ctx)
            });
        if let Err(e) = &result {
            warn!(resource = %resource, error = %e, "Message principal rejected");
        }
        result
    }

    fn verify_multi_sign_tx_principal(
        &self,
        info: &MultiSignInfo,
        block_version: u32,
    ) -> AccessControlResult<MultiSignStatus> {
        if info.status.is_terminal() {
            return Err(AccessControlError::MultiSignFinished(info.status));
        }
        let stratum = PolicyStratum::from_block_version(block_version);
        let resource = info.payload.resource_name();
        let policy = self.multi_sign_policy(&resource, stratum)?;
        let message = Self::signing_bytes(&info.payload)?;

        let (_, agreed) = self.refine(&info.endorsements(VoteStatus::Agree), &message);
        let (_, rejected) = self.refine(&info.endorsements(VoteStatus::Reject), &message);
        let ctx = self.context(&resource, stratum, info.payload.parameter_str(PARAM_ORG_ID));

        let status = multi_sign::progress(info.status, &policy, &agreed, &rejected, &ctx)?;
        debug!(
            resource = %resource,
            agreed = agreed.len(),
            rejected = rejected.len(),
            status = ?status,
            "Multi-sign progressed"
        );
        Ok(status)
    }

    fn is_rule_supported_by_multi_sign(&self, resource_name: &str, block_version: u32) -> AccessControlResult<()> {
        self.multi_sign_policy(resource_name, PolicyStratum::from_block_version(block_version))
            .map(|_| ())
    }

    fn get_valid_endorsements(
        &self,
        principal: &Principal,
        block_version: u32,
    ) -> AccessControlResult<Vec<EndorsementEntry>> {
        let (entries, members) = self.refine(principal.endorsements(), principal.message());
        let stratum = PolicyStratum::from_block_version(block_version);
        let Ok(policy) = self.service.policies().policy(principal.resource_name(), stratum) else {
            return Ok(entries);
        };
        Ok(entries
            .into_iter()
            .zip(members)
            .filter(|(_, member)| policy.covers_org(member.org_id()) && policy.covers_role(member.role()))
            .map(|(entry, _)| entry)
            .collect())
    }

    fn get_address_from_cache(&self, public_key: &[u8]) -> AccessControlResult<String> {
        self.service.address(public_key)
    }

    fn get_cert_from_cache(&self, cert_id: &str) -> AccessControlResult<Vec<u8>> {
        self.service.lookup_cert(cert_id)
    }

    fn get_payer_from_cache(&self, key: &str) -> Option<Vec<u8>> {
        self.service.payer(key)
    }

    fn set_payer_to_cache(&self, key: &str, payer_pem: Vec<u8>) {
        self.service.set_payer(key, payer_pem);
    }

    fn validate_crl(&self, crl_pem: &[u8]) -> AccessControlResult<usize> {
        self.mode.validate_crl(crl_pem)
    }

    fn verify_related_material(&self, kind: RelatedMaterialKind, material: &[u8]) -> AccessControlResult<()> {
        match kind {
            RelatedMaterialKind::Crl => self.mode.validate_crl(material).map(|_| ()),
        }
    }

    fn get_policy(&self, resource_name: &str, block_version: u32) -> AccessControlResult<Policy> {
        self.service
            .policies()
            .policy(resource_name, PolicyStratum::from_block_version(block_version))
    }

    fn all_resource_policies(&self) -> Vec<(String, Policy)> {
        self.service.policies().all_resource_policies()
    }

    fn lookup_consensus_node(&self, node_id: &str) -> Option<String> {
        self.mode.lookup_consensus_node(node_id)
    }

    fn hash_type(&self) -> HashType {
        self.service.hash_type()
    }

    fn auth_type(&self) -> AuthType {
        self.mode.auth_type()
    }

    fn org_count(&self) -> usize {
        self.mode.org_count()
    }
}

impl<M: MembershipMode> ChainEventHandler for AccessControl<M> {
    fn handle_event(&self, event: &BlockchainEvent) {
        match event {
            BlockchainEvent::ChainConfigUpdated(config) => {
                if let Err(e) = self.apply_chain_config(config) {
                    warn!(error = %e, "Chain config update rejected");
                }
            }
            BlockchainEvent::CertsFrozen { .. }
            | BlockchainEvent::CertsUnfrozen { .. }
            | BlockchainEvent::CertsRevoked { .. }
            | BlockchainEvent::MaxbftEpochConfigured { .. } => {
                match self.mode.handle_event(event, &self.service) {
                    Ok(true) => self.service.clear_members(),
                    Ok(false) => debug!(topic = ?event.topic(), "Event not used by this auth type"),
                    Err(e) => warn!(topic = ?event.topic(), error = %e, "Event handling failed"),
                }
            }
            BlockchainEvent::CertsDeleted { cert_hashes } => {
                for id in cert_hashes {
                    self.service.forget_cert(id);
                    self.service.forget_member(&format!("CERT_HASH/{id}"));
                }
                debug!(count = cert_hashes.len(), "Deleted certificates evicted");
            }
            BlockchainEvent::CertAliasesDeleted { aliases } => {
                for alias in aliases {
                    self.service.forget_cert(alias);
                    self.service
                        .forget_member(&member_cache_key(&Member::alias("", alias.clone())));
                }
                debug!(count = aliases.len(), "Deleted aliases evicted");
            }
            BlockchainEvent::CertAliasUpdated { alias } => {
                self.service.forget_cert(alias);
                self.service
                    .forget_member(&member_cache_key(&Member::alias("", alias.clone())));
                debug!(alias = %alias, "Updated alias evicted");
            }
            BlockchainEvent::PubkeyDeleted { pubkey } => self.forget_pubkey(pubkey),
            BlockchainEvent::BlockCommitted(block) => self.apply_block(block),
        }
    }
}
