//! # Trust Store
//!
//! Per-organization trusted roots and intermediates, CRLs keyed by
//! authority key identifier, the frozen-certificate set and pinned trust
//! members.
//!
//! The root/intermediate/trust-member part is an immutable [`TrustRoots`]
//! snapshot swapped whole on chain-config updates, so readers observe either
//! the old or the new configuration and never a mix. CRLs and the frozen set
//! are mutated in place by revoke/freeze events.

use crate::domain::crl::{self, CrlMetadata};
use crate::domain::entities::Role;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::member::role_from_certificate;
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::{CrlStatus, X509Crl, X509Ref, X509StoreContext, X509VerifyResult, X509};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

fn crypto(context: &'static str) -> impl Fn(openssl::error::ErrorStack) -> AccessControlError {
    move |e| AccessControlError::Crypto(format!("{context}: {e}"))
}

fn der_of(cert: &X509Ref) -> AccessControlResult<Vec<u8>> {
    cert.to_der().map_err(crypto("certificate der"))
}

// =============================================================================
// ORGANIZATIONS AND TRUST MEMBERS
// =============================================================================

/// Trusted CA material of one organization.
#[derive(Clone)]
pub struct Organization {
    id: String,
    roots: Vec<X509>,
    intermediates: Vec<X509>,
}

impl Organization {
    /// Classify PEM blocks into self-signed roots and intermediates.
    ///
    /// An organization must end up with at least one root.
    pub fn from_pems(id: impl Into<String>, pems: &[String]) -> AccessControlResult<Self> {
        let id = id.into();
        let mut org = Self {
            id,
            roots: Vec::new(),
            intermediates: Vec::new(),
        };
        for pem in pems {
            for cert in crate::domain::crypto::parse_certificate_bundle(pem.as_bytes())? {
                org.add_cert(cert)?;
            }
        }
        if org.roots.is_empty() {
            return Err(AccessControlError::ConfigurationError(format!(
                "organization {} has no trusted root",
                org.id
            )));
        }
        Ok(org)
    }

    fn add_cert(&mut self, cert: X509) -> AccessControlResult<()> {
        let der = der_of(&cert)?;
        let known = self
            .roots
            .iter()
            .chain(&self.intermediates)
            .any(|existing| existing.to_der().map(|d| d == der).unwrap_or(false));
        if known {
            return Ok(());
        }
        if cert.issued(&cert) == X509VerifyResult::OK {
            self.roots.push(cert);
        } else {
            self.intermediates.push(cert);
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn roots(&self) -> &[X509] {
        &self.roots
    }

    pub fn intermediates(&self) -> &[X509] {
        &self.intermediates
    }
}

/// A pinned certificate that bypasses chain validation.
#[derive(Clone)]
pub struct TrustMember {
    pub org_id: String,
    pub role: Role,
    pub node_id: String,
    pub cert: X509,
}

// =============================================================================
// TRUST ROOTS SNAPSHOT
// =============================================================================

/// Immutable trust configuration.
pub struct TrustRoots {
    orgs: BTreeMap<String, Organization>,
    store: X509Store,
    intermediates: Vec<X509>,
    root_owner: HashMap<Vec<u8>, String>,
    trust_members: HashMap<Vec<u8>, TrustMember>,
}

impl TrustRoots {
    pub fn builder() -> TrustRootsBuilder {
        TrustRootsBuilder::default()
    }

    /// Snapshot without organizations.
    pub fn empty() -> AccessControlResult<Self> {
        Self::builder().build()
    }

    pub fn org_count(&self) -> usize {
        self.orgs.len()
    }

    pub fn contains_org(&self, org_id: &str) -> bool {
        self.orgs.contains_key(org_id)
    }

    pub fn org_ids(&self) -> Vec<String> {
        self.orgs.keys().cloned().collect()
    }

    pub fn organization(&self, org_id: &str) -> Option<&Organization> {
        self.orgs.get(org_id)
    }

    /// Pinned trust member with this certificate DER.
    pub fn trust_member(&self, der: &[u8]) -> Option<&TrustMember> {
        self.trust_members.get(der)
    }

    pub fn trust_members(&self) -> impl Iterator<Item = &TrustMember> {
        self.trust_members.values()
    }

    /// Every trusted CA certificate, roots first.
    pub fn certificate_authorities(&self) -> impl Iterator<Item = &X509> {
        self.orgs
            .values()
            .flat_map(|org| org.roots.iter())
            .chain(self.intermediates.iter())
    }
}

/// Accumulates organizations and trust members before freezing them into a
/// [`TrustRoots`] snapshot.
#[derive(Default)]
pub struct TrustRootsBuilder {
    orgs: BTreeMap<String, Organization>,
    trust_members: HashMap<Vec<u8>, TrustMember>,
}

impl TrustRootsBuilder {
    /// Insert or merge an organization. Returns `true` only on first insert.
    pub fn add_org(&mut self, org: Organization) -> AccessControlResult<bool> {
        match self.orgs.get_mut(&org.id) {
            Some(existing) => {
                for cert in org.roots.into_iter().chain(org.intermediates) {
                    existing.add_cert(cert)?;
                }
                Ok(false)
            }
            None => {
                self.orgs.insert(org.id.clone(), org);
                Ok(true)
            }
        }
    }

    /// Pin a certificate to an organization and role.
    pub fn add_trust_member(
        &mut self,
        pem: &str,
        org_id: &str,
        role: Role,
        node_id: &str,
    ) -> AccessControlResult<()> {
        let cert = crate::domain::crypto::parse_certificate(pem.as_bytes())?;
        let der = der_of(&cert)?;
        self.trust_members.insert(
            der,
            TrustMember {
                org_id: org_id.to_string(),
                role,
                node_id: node_id.to_string(),
                cert,
            },
        );
        Ok(())
    }

    pub fn build(self) -> AccessControlResult<TrustRoots> {
        let mut store = X509StoreBuilder::new().map_err(crypto("x509 store"))?;
        let mut intermediates = Vec::new();
        let mut root_owner = HashMap::new();

        for org in self.orgs.values() {
            for root in &org.roots {
                root_owner.insert(der_of(root)?, org.id.clone());
                store.add_cert(root.clone()).map_err(crypto("x509 store"))?;
            }
            intermediates.extend(org.intermediates.iter().cloned());
        }

        Ok(TrustRoots {
            orgs: self.orgs,
            store: store.build(),
            intermediates,
            root_owner,
            trust_members: self.trust_members,
        })
    }
}

// =============================================================================
// TRUST STORE
// =============================================================================

struct StoredCrl {
    crl: Arc<X509Crl>,
    version: u64,
}

/// A CRL that passed signature and version checks.
pub struct ValidatedCrl {
    /// Hex authority key identifier the CRL is filed under.
    pub authority_key_id: String,
    pub version: u64,
    pub crl: X509Crl,
}

enum PendingChange {
    Freeze(Vec<u8>),
    Unfreeze(Vec<u8>),
}

/// Live trust state of a certificate-mode provider.
pub struct TrustStore {
    roots: RwLock<Arc<TrustRoots>>,
    crls: DashMap<String, StoredCrl>,
    frozen: DashSet<Vec<u8>>,
    pending: Mutex<Vec<PendingChange>>,
    defer_consensus: AtomicBool,
}

impl TrustStore {
    pub fn new(roots: TrustRoots) -> Self {
        Self {
            roots: RwLock::new(Arc::new(roots)),
            crls: DashMap::new(),
            frozen: DashSet::new(),
            pending: Mutex::new(Vec::new()),
            defer_consensus: AtomicBool::new(false),
        }
    }

    /// Current snapshot.
    pub fn roots(&self) -> Arc<TrustRoots> {
        Arc::clone(&self.roots.read())
    }

    /// Swap in a new snapshot.
    pub fn replace_roots(&self, roots: TrustRoots) {
        *self.roots.write() = Arc::new(roots);
    }

    /// Under Maxbft, freeze changes of consensus certificates wait for the
    /// next epoch switch.
    pub fn set_defer_consensus(&self, defer: bool) {
        self.defer_consensus.store(defer, Ordering::Release);
    }

    // -------------------------------------------------------------------------
    // Chain validation
    // -------------------------------------------------------------------------

    /// Build and check the certification path of `cert`.
    ///
    /// Returns the organization owning the terminal root and the path from
    /// `cert` up to that root.
    pub fn verify_cert_chain(&self, cert: &X509Ref) -> AccessControlResult<(String, Vec<X509>)> {
        let roots = self.roots();

        let mut untrusted = Stack::new().map_err(crypto("x509 stack"))?;
        for ca in &roots.intermediates {
            untrusted.push(ca.clone()).map_err(crypto("x509 stack"))?;
        }

        let mut ctx = X509StoreContext::new().map_err(crypto("x509 store context"))?;
        let outcome = ctx
            .init(&roots.store, cert, &untrusted, |c| {
                if c.verify_cert()? {
                    let chain = c
                        .chain()
                        .map(|chain| chain.iter().map(|x| x.to_owned()).collect::<Vec<X509>>())
                        .unwrap_or_default();
                    Ok(Ok(chain))
                } else {
                    Ok(Err(c.error().error_string().to_string()))
                }
            })
            .map_err(crypto("x509 verify"))?;

        let chain = outcome.map_err(|reason| {
            AccessControlError::MalformedCredential(format!("certificate chain: {reason}"))
        })?;

        let root = chain.last().ok_or_else(|| {
            AccessControlError::MalformedCredential("certificate chain is empty".to_string())
        })?;
        let org_id = roots
            .root_owner
            .get(&der_of(root)?)
            .cloned()
            .ok_or_else(|| AccessControlError::UntrustedIssuer {
                org_id: String::new(),
                reason: "terminal root is not pinned by any organization".to_string(),
            })?;

        self.check_frozen_intermediates(&chain)?;
        self.check_revocation(&chain)?;
        Ok((org_id, chain))
    }

    /// Validate `cert` for a member claiming `org_id`: the path must end in
    /// one of that organization's roots and the certificate must not be frozen.
    pub fn verify_member_cert(&self, org_id: &str, cert: &X509Ref) -> AccessControlResult<Vec<X509>> {
        let (root_org, chain) = self.verify_cert_chain(cert)?;
        if root_org != org_id {
            return Err(AccessControlError::UntrustedIssuer {
                org_id: org_id.to_string(),
                reason: format!("certificate chains to a root of {root_org}"),
            });
        }
        if self.is_frozen(&der_of(cert)?) {
            return Err(AccessControlError::FrozenCredential(describe(cert)));
        }
        Ok(chain)
    }

    /// Re-check a path validated earlier against the current frozen set and
    /// CRLs. `chain` is empty for pinned trust members.
    pub fn recheck_member_cert(&self, cert: &X509Ref, chain: &[X509]) -> AccessControlResult<()> {
        if self.is_frozen(&der_of(cert)?) {
            return Err(AccessControlError::FrozenCredential(describe(cert)));
        }
        self.check_frozen_intermediates(chain)?;
        self.check_revocation(chain)
    }

    fn check_frozen_intermediates(&self, chain: &[X509]) -> AccessControlResult<()> {
        if self.frozen.is_empty() {
            return Ok(());
        }
        for intermediate in chain.iter().skip(1).take(chain.len().saturating_sub(2)) {
            if self.frozen.contains(&der_of(intermediate)?) {
                return Err(AccessControlError::FrozenCredential(describe(intermediate)));
            }
        }
        Ok(())
    }

    fn check_revocation(&self, chain: &[X509]) -> AccessControlResult<()> {
        if self.crls.is_empty() {
            return Ok(());
        }
        for pair in chain.windows(2) {
            let (cert, issuer) = (&pair[0], &pair[1]);
            let key = cert
                .authority_key_id()
                .or_else(|| issuer.subject_key_id())
                .map(|id| hex::encode(id.as_slice()));
            let Some(stored) = key.and_then(|key| self.crls.get(&key)) else {
                continue;
            };
            if let CrlStatus::Revoked(_) = stored.crl.get_by_serial(cert.serial_number()) {
                return Err(AccessControlError::RevokedCredential(describe(cert)));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // CRLs
    // -------------------------------------------------------------------------

    /// Check every CRL in a PEM bundle.
    ///
    /// Each CRL must be signed by a trusted root or intermediate, and must
    /// carry a strictly higher version than the CRL already filed under the
    /// same authority key identifier.
    pub fn validate_crl(&self, pem: &[u8]) -> AccessControlResult<Vec<ValidatedCrl>> {
        let roots = self.roots();

        crl::parse_crl_bundle(pem)?
            .into_iter()
            .map(|candidate| {
                let der = candidate.to_der().map_err(crypto("crl der"))?;
                let meta: CrlMetadata = crl::crl_metadata(&der)?;

                let issuer_name = candidate
                    .issuer_name()
                    .to_der()
                    .map_err(crypto("crl issuer"))?;
                let signer = roots
                    .certificate_authorities()
                    .find(|ca| {
                        ca.subject_name().to_der().ok().as_deref() == Some(issuer_name.as_slice())
                            && ca
                                .public_key()
                                .and_then(|key| candidate.verify(&key))
                                .unwrap_or(false)
                    })
                    .ok_or_else(|| AccessControlError::UntrustedIssuer {
                        org_id: String::new(),
                        reason: "CRL is not signed by a trusted CA".to_string(),
                    })?;

                let authority_key_id = meta
                    .authority_key_id
                    .clone()
                    .or_else(|| signer.subject_key_id().map(|ski| ski.as_slice().to_vec()))
                    .map(hex::encode)
                    .ok_or_else(|| {
                        AccessControlError::MalformedCredential(
                            "CRL has no authority key identifier".to_string(),
                        )
                    })?;

                let version = meta.version();
                if let Some(existing) = self.crls.get(&authority_key_id) {
                    if version <= existing.version {
                        return Err(AccessControlError::MalformedCredential(format!(
                            "CRL version {version} for {authority_key_id} is not newer than {}",
                            existing.version
                        )));
                    }
                }

                Ok(ValidatedCrl {
                    authority_key_id,
                    version,
                    crl: candidate,
                })
            })
            .collect()
    }

    /// File validated CRLs, replacing older ones of the same authority.
    pub fn install_crls(&self, validated: Vec<ValidatedCrl>) -> usize {
        let mut installed = 0;
        for entry in validated {
            let stored = StoredCrl {
                crl: Arc::new(entry.crl),
                version: entry.version,
            };
            let newer = match self.crls.entry(entry.authority_key_id.clone()) {
                Entry::Occupied(mut slot) if slot.get().version < stored.version => {
                    slot.insert(stored);
                    true
                }
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(stored);
                    true
                }
            };
            if newer {
                info!(aki = %entry.authority_key_id, version = entry.version, "CRL installed");
                installed += 1;
            }
        }
        installed
    }

    /// Validate and install in one step.
    pub fn revoke(&self, pem: &[u8]) -> AccessControlResult<usize> {
        let validated = self.validate_crl(pem)?;
        Ok(self.install_crls(validated))
    }

    pub fn crl_count(&self) -> usize {
        self.crls.len()
    }

    // -------------------------------------------------------------------------
    // Frozen set
    // -------------------------------------------------------------------------

    pub fn freeze(&self, der: Vec<u8>) {
        self.frozen.insert(der);
    }

    pub fn unfreeze(&self, der: &[u8]) {
        self.frozen.remove(der);
    }

    pub fn is_frozen(&self, der: &[u8]) -> bool {
        self.frozen.contains(der)
    }

    pub fn frozen_count(&self) -> usize {
        self.frozen.len()
    }

    /// Freeze certificates, deferring consensus certificates when required.
    /// Returns how many were deferred.
    pub fn freeze_certs(&self, certs: &[X509]) -> AccessControlResult<usize> {
        self.apply_or_defer(certs, PendingChange::Freeze)
    }

    /// Unfreeze certificates, deferring consensus certificates when required.
    /// Returns how many were deferred.
    pub fn unfreeze_certs(&self, certs: &[X509]) -> AccessControlResult<usize> {
        self.apply_or_defer(certs, PendingChange::Unfreeze)
    }

    fn apply_or_defer(
        &self,
        certs: &[X509],
        change: fn(Vec<u8>) -> PendingChange,
    ) -> AccessControlResult<usize> {
        let defer = self.defer_consensus.load(Ordering::Acquire);
        let mut deferred = 0;
        for cert in certs {
            let pending = change(der_of(cert)?);
            if defer && role_from_certificate(cert) == Some(Role::ConsensusNode) {
                debug!(cert = %describe(cert), "Consensus certificate change deferred to next epoch");
                self.pending.lock().push(pending);
                deferred += 1;
            } else {
                self.apply(pending);
            }
        }
        Ok(deferred)
    }

    fn apply(&self, change: PendingChange) {
        match change {
            PendingChange::Freeze(der) => self.freeze(der),
            PendingChange::Unfreeze(der) => self.unfreeze(&der),
        }
    }

    /// Apply every deferred change in arrival order. Returns how many applied.
    pub fn apply_pending(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let count = pending.len();
        for change in pending {
            self.apply(change);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

fn describe(cert: &X509Ref) -> String {
    crate::domain::member::common_name(cert).unwrap_or_else(|| {
        cert.serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str().map(|s| s.to_string()))
            .unwrap_or_default()
    })
}
