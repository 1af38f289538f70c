//! # Certificate Mode
//!
//! Members carry X.509 certificates, certificate hashes or aliases. A member
//! is valid when its certificate chains to a root of the claimed
//! organization, is not frozen and is not listed in a current CRL. Pinned
//! trust members skip chain validation.

use crate::domain::crypto;
use crate::domain::defaults::contracts;
use crate::domain::entities::Role;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::member::{common_name, role_from_certificate, Credential, ResolvedMember};
use crate::domain::trust_store::{Organization, TrustRoots, TrustStore};
use crate::ports::outbound::{CERT_FREEZE_KEY, CERT_REVOKE_KEY};
use crate::service::mode::MembershipMode;
use crate::service::AccessControlService;
use openssl::x509::{X509Ref, X509};
use parking_lot::RwLock;
use shared_bus::BlockchainEvent;
use shared_types::{AuthType, ChainConfig, ConsensusType, Member, MemberType};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn cert_der(cert: &X509Ref) -> AccessControlResult<Vec<u8>> {
    cert.to_der()
        .map_err(|e| AccessControlError::Crypto(format!("certificate der: {e}")))
}

/// Membership backed by certificate authorities.
pub struct CertMode {
    trust: TrustStore,
    consensus_nodes: RwLock<Arc<HashMap<String, String>>>,
}

impl CertMode {
    pub fn new() -> AccessControlResult<Self> {
        Ok(Self {
            trust: TrustStore::new(TrustRoots::empty()?),
            consensus_nodes: RwLock::new(Arc::new(HashMap::new())),
        })
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    fn build_roots(config: &ChainConfig) -> AccessControlResult<TrustRoots> {
        let mut builder = TrustRoots::builder();
        for root in &config.trust_roots {
            match Organization::from_pems(&root.org_id, &root.root) {
                Ok(org) => {
                    if !builder.add_org(org)? {
                        debug!(org_id = %root.org_id, "Merged duplicate trust root entry");
                    }
                }
                Err(e) => warn!(org_id = %root.org_id, error = %e, "Skipping trust root"),
            }
        }
        for member in &config.trust_members {
            let added = member.role.parse::<Role>().and_then(|role| {
                builder.add_trust_member(&member.member_info, &member.org_id, role, &member.node_id)
            });
            if let Err(e) = added {
                warn!(org_id = %member.org_id, error = %e, "Skipping trust member");
            }
        }
        builder.build()
    }

    fn parse_all<'a>(pems: impl IntoIterator<Item = Cow<'a, [u8]>>) -> Vec<X509> {
        pems.into_iter()
            .filter_map(|pem| match crypto::parse_certificate(&pem) {
                Ok(cert) => Some(cert),
                Err(e) => {
                    warn!(error = %e, "Skipping unparsable certificate in event");
                    None
                }
            })
            .collect()
    }

    fn restore_frozen(&self, service: &AccessControlService) -> AccessControlResult<usize> {
        let ids: Vec<String> = service
            .read_json(contracts::CERT_MANAGE, CERT_FREEZE_KEY)?
            .unwrap_or_default();
        let mut restored = 0;
        for id in &ids {
            let der = service
                .lookup_cert(id)
                .and_then(|pem| crypto::parse_certificate(&pem))
                .and_then(|cert| cert_der(&cert));
            match der {
                Ok(der) => {
                    self.trust.freeze(der);
                    restored += 1;
                }
                Err(e) => warn!(cert_id = %id, error = %e, "Skipping frozen certificate"),
            }
        }
        Ok(restored)
    }

    fn restore_crls(&self, service: &AccessControlService) -> AccessControlResult<usize> {
        let akis: Vec<String> = service
            .read_json(contracts::CERT_MANAGE, CERT_REVOKE_KEY)?
            .unwrap_or_default();
        let mut restored = 0;
        for aki in &akis {
            let installed = service
                .read(contracts::CERT_MANAGE, aki.as_bytes())
                .and_then(|pem| pem.ok_or_else(|| AccessControlError::UnknownMember(aki.clone())))
                .and_then(|pem| self.trust.revoke(&pem));
            match installed {
                Ok(count) => restored += count,
                Err(e) => warn!(aki = %aki, error = %e, "Skipping stored CRL"),
            }
        }
        Ok(restored)
    }
}

impl MembershipMode for CertMode {
    fn auth_type(&self) -> AuthType {
        AuthType::PermissionedWithCert
    }

    fn load_config(&self, config: &ChainConfig, _service: &AccessControlService) -> AccessControlResult<()> {
        let roots = Self::build_roots(config)?;
        if roots.org_count() == 0 && !config.trust_roots.is_empty() {
            return Err(AccessControlError::ConfigurationError(
                "no usable trust root".to_string(),
            ));
        }

        let mut nodes: HashMap<String, String> = config
            .consensus
            .nodes
            .iter()
            .flat_map(|org| org.node_id.iter().map(move |id| (id.clone(), org.org_id.clone())))
            .collect();
        for pinned in roots.trust_members() {
            if pinned.role == Role::ConsensusNode && !pinned.node_id.is_empty() {
                nodes.entry(pinned.node_id.clone()).or_insert_with(|| pinned.org_id.clone());
            }
        }

        info!(
            orgs = roots.org_count(),
            consensus_nodes = nodes.len(),
            "Certificate trust roots loaded"
        );
        self.trust.replace_roots(roots);
        self.trust
            .set_defer_consensus(config.consensus.consensus_type == ConsensusType::Maxbft);
        *self.consensus_nodes.write() = Arc::new(nodes);
        Ok(())
    }

    fn load_from_store(&self, service: &AccessControlService) -> AccessControlResult<()> {
        let frozen = self.restore_frozen(service)?;
        let crls = self.restore_crls(service)?;
        if frozen > 0 || crls > 0 {
            info!(frozen, crls, "Restored certificate state from store");
        }
        Ok(())
    }

    fn resolve_member(&self, member: &Member, service: &AccessControlService) -> AccessControlResult<ResolvedMember> {
        let hash_type = service.hash_type();
        let pem = match member.member_type {
            MemberType::Cert => Cow::Borrowed(member.member_info.as_slice()),
            MemberType::CertHash => Cow::Owned(service.lookup_cert(&hex::encode(&member.member_info))?),
            MemberType::Alias => {
                let alias = std::str::from_utf8(&member.member_info).map_err(|_| {
                    AccessControlError::MalformedCredential("alias is not UTF-8".to_string())
                })?;
                Cow::Owned(service.lookup_cert(alias)?)
            }
            MemberType::PublicKey => {
                return Err(AccessControlError::MalformedCredential(
                    "public key members are not accepted on certificate chains".to_string(),
                ))
            }
        };

        let cert = crypto::parse_certificate(&pem)?;
        let der = cert_der(&cert)?;

        let roots = self.trust.roots();
        if let Some(pinned) = roots.trust_member(&der) {
            if pinned.org_id != member.org_id {
                return Err(AccessControlError::UntrustedIssuer {
                    org_id: member.org_id.clone(),
                    reason: format!("trust member is pinned to {}", pinned.org_id),
                });
            }
            if self.trust.is_frozen(&der) {
                return Err(AccessControlError::FrozenCredential(
                    common_name(&cert).unwrap_or_default(),
                ));
            }
            return ResolvedMember::from_certificate(
                member.clone(),
                pinned.org_id.clone(),
                pinned.role,
                cert,
                Vec::new(),
                hash_type,
            );
        }

        let chain = self.trust.verify_member_cert(&member.org_id, &cert)?;
        let role = role_from_certificate(&cert).ok_or_else(|| {
            AccessControlError::MalformedCredential("certificate carries no role OU".to_string())
        })?;
        ResolvedMember::from_certificate(member.clone(), member.org_id.clone(), role, cert, chain, hash_type)
    }

    /// A cached resolution may predate a freeze or revocation.
    fn accepts_cached(&self, resolved: &ResolvedMember, member: &Member) -> AccessControlResult<()> {
        if resolved.org_id() != member.org_id {
            return Err(AccessControlError::UntrustedIssuer {
                org_id: member.org_id.clone(),
                reason: format!("member belongs to {}", resolved.org_id()),
            });
        }
        match resolved.credential() {
            Credential::Certificate { cert, chain } => self.trust.recheck_member_cert(cert, chain),
            Credential::PublicKey => Ok(()),
        }
    }

    fn org_count(&self) -> usize {
        self.trust.roots().org_count()
    }

    fn known_orgs(&self) -> HashSet<String> {
        self.trust.roots().org_ids().into_iter().collect()
    }

    fn lookup_consensus_node(&self, node_id: &str) -> Option<String> {
        self.consensus_nodes.read().get(node_id).cloned()
    }

    fn handle_event(&self, event: &BlockchainEvent, service: &AccessControlService) -> AccessControlResult<bool> {
        match event {
            BlockchainEvent::CertsFrozen { certs } => {
                let parsed = Self::parse_all(certs.iter().map(|pem| Cow::Borrowed(pem.as_bytes())));
                let deferred = self.trust.freeze_certs(&parsed)?;
                info!(count = parsed.len(), deferred, "Certificates frozen");
                Ok(true)
            }
            BlockchainEvent::CertsUnfrozen { certs, cert_hashes } => {
                let by_hash = cert_hashes.iter().filter_map(|id| match service.lookup_cert(id) {
                    Ok(pem) => Some(Cow::Owned(pem)),
                    Err(e) => {
                        warn!(cert_id = %id, error = %e, "Skipping unknown certificate hash");
                        None
                    }
                });
                let parsed = Self::parse_all(
                    certs
                        .iter()
                        .map(|pem| Cow::Borrowed(pem.as_bytes()))
                        .chain(by_hash),
                );
                let deferred = self.trust.unfreeze_certs(&parsed)?;
                info!(count = parsed.len(), deferred, "Certificates unfrozen");
                Ok(true)
            }
            BlockchainEvent::CertsRevoked { crls } => {
                let mut installed = 0;
                for crl in crls {
                    match self.trust.revoke(crl.as_bytes()) {
                        Ok(count) => installed += count,
                        Err(e) => warn!(error = %e, "Rejected CRL"),
                    }
                }
                info!(installed, "CRLs applied");
                Ok(true)
            }
            BlockchainEvent::MaxbftEpochConfigured { epoch_id } => {
                let applied = self.trust.apply_pending();
                info!(epoch_id, applied, "Deferred certificate changes applied");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn validate_crl(&self, crl_pem: &[u8]) -> AccessControlResult<usize> {
        Ok(self.trust.validate_crl(crl_pem)?.len())
    }
}
