//! # Permissioned Public-Key Mode
//!
//! Members are raw public keys. Administrators are the keys listed as trust
//! roots of their organization, consensus nodes are matched by node id, and
//! every other key must be registered through `PUBKEY_MANAGE`.

use crate::domain::crypto;
use crate::domain::defaults::contracts;
use crate::domain::entities::Role;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::member::ResolvedMember;
use crate::ports::outbound::PubkeyInfo;
use crate::service::mode::MembershipMode;
use crate::service::AccessControlService;
use parking_lot::RwLock;
use shared_types::{AuthType, ChainConfig, Member, MemberType};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
struct KeyMembership {
    /// Admin key DER → organization.
    admins: HashMap<Vec<u8>, String>,
    /// Node id → organization.
    consensus: HashMap<String, String>,
    orgs: BTreeSet<String>,
}

/// Membership backed by per-organization admin keys.
pub struct PermissionedKeyMode {
    state: RwLock<Arc<KeyMembership>>,
}

impl PermissionedKeyMode {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(KeyMembership::default())),
        }
    }

    fn state(&self) -> Arc<KeyMembership> {
        Arc::clone(&self.state.read())
    }

    fn registered(&self, der: &[u8], service: &AccessControlService) -> AccessControlResult<PubkeyInfo> {
        let key = hex::encode(crypto::hash(service.hash_type(), der)?);
        service
            .read_json::<PubkeyInfo>(contracts::PUBKEY_MANAGE, &key)?
            .ok_or(AccessControlError::UnknownMember(key))
    }
}

impl Default for PermissionedKeyMode {
    fn default() -> Self {
        Self::new()
    }
}

fn claim_matches(member: &Member, org_id: &str) -> AccessControlResult<()> {
    if member.org_id == org_id {
        Ok(())
    } else {
        Err(AccessControlError::UntrustedIssuer {
            org_id: member.org_id.clone(),
            reason: format!("key belongs to {org_id}"),
        })
    }
}

impl MembershipMode for PermissionedKeyMode {
    fn auth_type(&self) -> AuthType {
        AuthType::PermissionedWithKey
    }

    fn load_config(&self, config: &ChainConfig, _service: &AccessControlService) -> AccessControlResult<()> {
        let mut state = KeyMembership::default();
        for root in &config.trust_roots {
            for pem in &root.root {
                let der = crypto::parse_public_key(pem.as_bytes())
                    .and_then(|key| crypto::public_key_der(&key));
                match der {
                    Ok(der) => {
                        state.admins.insert(der, root.org_id.clone());
                        state.orgs.insert(root.org_id.clone());
                    }
                    Err(e) => warn!(org_id = %root.org_id, error = %e, "Skipping admin key"),
                }
            }
        }
        if state.orgs.is_empty() && !config.trust_roots.is_empty() {
            return Err(AccessControlError::ConfigurationError(
                "no usable admin key".to_string(),
            ));
        }
        for org in &config.consensus.nodes {
            for node_id in &org.node_id {
                state.consensus.insert(node_id.clone(), org.org_id.clone());
            }
        }

        info!(
            orgs = state.orgs.len(),
            admins = state.admins.len(),
            consensus_nodes = state.consensus.len(),
            "Public-key membership loaded"
        );
        *self.state.write() = Arc::new(state);
        Ok(())
    }

    fn resolve_member(&self, member: &Member, service: &AccessControlService) -> AccessControlResult<ResolvedMember> {
        match member.member_type {
            MemberType::PublicKey => {}
            MemberType::Alias => {
                return Err(AccessControlError::Forbidden(
                    "certificate aliases are not used on public-key chains".to_string(),
                ))
            }
            MemberType::Cert | MemberType::CertHash => {
                return Err(AccessControlError::MalformedCredential(format!(
                    "{} members are not accepted on public-key chains",
                    member.member_type.as_str()
                )))
            }
        }

        let hash_type = service.hash_type();
        let key = crypto::parse_public_key(&member.member_info)?;
        let der = crypto::public_key_der(&key)?;
        let state = self.state();

        if let Some(org_id) = state.admins.get(&der) {
            claim_matches(member, org_id)?;
            return ResolvedMember::from_public_key(member.clone(), org_id.clone(), Role::Admin, key, hash_type);
        }
        if let Some(org_id) = state.consensus.get(&crypto::node_id(&key)?) {
            claim_matches(member, org_id)?;
            return ResolvedMember::from_public_key(
                member.clone(),
                org_id.clone(),
                Role::ConsensusNode,
                key,
                hash_type,
            );
        }

        let info = self.registered(&der, service)?;
        claim_matches(member, &info.org_id)?;
        let role = info.role.parse::<Role>().map_err(|_| {
            AccessControlError::MalformedCredential(format!("registered key has role '{}'", info.role))
        })?;
        ResolvedMember::from_public_key(member.clone(), info.org_id, role, key, hash_type)
    }

    fn org_count(&self) -> usize {
        self.state.read().orgs.len()
    }

    fn known_orgs(&self) -> HashSet<String> {
        self.state.read().orgs.iter().cloned().collect()
    }

    fn lookup_consensus_node(&self, node_id: &str) -> Option<String> {
        self.state.read().consensus.get(node_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::InMemoryStore;
    use crate::config::AccessControlConfig;
    use crate::domain::policy_table::PolicyTable;
    use crate::service::ChainSettings;
    use crate::test_helpers::{key_chain_config, TestKey, TestSigner};
    use shared_types::{HashType, OrgConfig};

    fn setup(config: &ChainConfig, store: Arc<InMemoryStore>) -> (PermissionedKeyMode, AccessControlService) {
        let service = AccessControlService::new(
            AccessControlConfig::default(),
            ChainSettings::from_chain_config(config),
            PolicyTable::new(),
            store,
        );
        let mode = PermissionedKeyMode::new();
        mode.load_config(config, &service).unwrap();
        (mode, service)
    }

    fn register(store: &InMemoryStore, key: &TestKey, role: &str) {
        let id = hex::encode(crypto::hash(HashType::Sha256, &key.der()).unwrap());
        let info = PubkeyInfo {
            pk_bytes: key.pem().into_bytes(),
            role: role.to_string(),
            org_id: key.org_id.clone(),
        };
        store.put(contracts::PUBKEY_MANAGE, id, serde_json::to_vec(&info).unwrap());
    }

    #[test]
    fn test_admin_key_resolves() {
        let admin1 = TestKey::generate("org1");
        let admin2 = TestKey::generate("org2");
        let (mode, service) = setup(&key_chain_config(&[&admin1, &admin2]), Arc::new(InMemoryStore::new()));

        let resolved = mode.resolve_member(&admin1.member(), &service).unwrap();
        assert_eq!(resolved.role(), Role::Admin);
        assert_eq!(resolved.org_id(), "org1");
        assert_eq!(mode.org_count(), 2);
    }

    #[test]
    fn test_consensus_node_by_node_id() {
        let admin = TestKey::generate("org1");
        let node = TestKey::generate("org1");
        let mut config = key_chain_config(&[&admin]);
        config.consensus.nodes.push(OrgConfig {
            org_id: "org1".into(),
            node_id: vec![node.node_id()],
        });
        let (mode, service) = setup(&config, Arc::new(InMemoryStore::new()));

        let resolved = mode.resolve_member(&node.member(), &service).unwrap();
        assert_eq!(resolved.role(), Role::ConsensusNode);
        assert_eq!(mode.lookup_consensus_node(&node.node_id()).as_deref(), Some("org1"));
    }

    #[test]
    fn test_registered_key_from_store() {
        let admin = TestKey::generate("org1");
        let client = TestKey::generate("org1");
        let store = Arc::new(InMemoryStore::new());
        register(&store, &client, "client");
        let (mode, service) = setup(&key_chain_config(&[&admin]), store);

        let resolved = mode.resolve_member(&client.member(), &service).unwrap();
        assert_eq!(resolved.role(), Role::Client);
    }

    #[test]
    fn test_unregistered_key_unknown() {
        let admin = TestKey::generate("org1");
        let (mode, service) = setup(&key_chain_config(&[&admin]), Arc::new(InMemoryStore::new()));
        let stranger = TestKey::generate("org1");
        assert!(matches!(
            mode.resolve_member(&stranger.member(), &service),
            Err(AccessControlError::UnknownMember(_))
        ));
    }

    #[test]
    fn test_alias_forbidden_and_cert_malformed() {
        let admin = TestKey::generate("org1");
        let (mode, service) = setup(&key_chain_config(&[&admin]), Arc::new(InMemoryStore::new()));
        assert!(matches!(
            mode.resolve_member(&Member::alias("org1", "a"), &service),
            Err(AccessControlError::Forbidden(_))
        ));
        assert!(matches!(
            mode.resolve_member(&Member::cert("org1", b"x".to_vec()), &service),
            Err(AccessControlError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_admin_claiming_other_org() {
        let admin = TestKey::generate("org1");
        let (mode, service) = setup(&key_chain_config(&[&admin]), Arc::new(InMemoryStore::new()));
        let mut member = admin.member();
        member.org_id = "org2".into();
        assert!(matches!(
            mode.resolve_member(&member, &service),
            Err(AccessControlError::UntrustedIssuer { .. })
        ));
    }
}
