//! # Public Mode
//!
//! Anyone with a key pair is a client. Administrators are pinned keys and
//! policies count individual admins rather than organizations.

use crate::domain::crypto;
use crate::domain::entities::Role;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::evaluator::CountingMode;
use crate::domain::member::ResolvedMember;
use crate::service::mode::MembershipMode;
use crate::service::AccessControlService;
use parking_lot::RwLock;
use shared_types::{AuthType, ChainConfig, Member, MemberType};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Organization id every member of a public chain belongs to.
pub const PUBLIC_ADMIN_ORG: &str = "public";

#[derive(Default)]
struct PublicMembership {
    /// Admin key DER.
    admins: HashSet<Vec<u8>>,
    consensus: HashSet<String>,
}

/// Membership of an open chain.
pub struct PublicMode {
    state: RwLock<Arc<PublicMembership>>,
}

impl PublicMode {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(PublicMembership::default())),
        }
    }
}

impl Default for PublicMode {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipMode for PublicMode {
    fn auth_type(&self) -> AuthType {
        AuthType::Public
    }

    fn load_config(&self, config: &ChainConfig, _service: &AccessControlService) -> AccessControlResult<()> {
        let mut state = PublicMembership::default();
        for pem in config.trust_roots.iter().flat_map(|root| root.root.iter()) {
            match crypto::parse_public_key(pem.as_bytes()).and_then(|key| crypto::public_key_der(&key)) {
                Ok(der) => {
                    state.admins.insert(der);
                }
                Err(e) => warn!(error = %e, "Skipping admin key"),
            }
        }
        if state.admins.is_empty() {
            return Err(AccessControlError::ConfigurationError(
                "public chain has no admin key".to_string(),
            ));
        }
        state.consensus = config
            .consensus
            .nodes
            .iter()
            .flat_map(|org| org.node_id.iter().cloned())
            .collect();

        info!(
            admins = state.admins.len(),
            consensus_nodes = state.consensus.len(),
            "Public membership loaded"
        );
        *self.state.write() = Arc::new(state);
        Ok(())
    }

    fn resolve_member(&self, member: &Member, service: &AccessControlService) -> AccessControlResult<ResolvedMember> {
        match member.member_type {
            MemberType::PublicKey => {}
            MemberType::Alias => {
                return Err(AccessControlError::Forbidden(
                    "certificate aliases are not used on public chains".to_string(),
                ))
            }
            MemberType::Cert | MemberType::CertHash => {
                return Err(AccessControlError::MalformedCredential(format!(
                    "{} members are not accepted on public chains",
                    member.member_type.as_str()
                )))
            }
        }

        let key = crypto::parse_public_key(&member.member_info)?;
        let state = Arc::clone(&self.state.read());
        let role = if state.admins.contains(&crypto::public_key_der(&key)?) {
            Role::Admin
        } else if state.consensus.contains(&crypto::node_id(&key)?) {
            Role::ConsensusNode
        } else {
            Role::Client
        };
        ResolvedMember::from_public_key(member.clone(), PUBLIC_ADMIN_ORG, role, key, service.hash_type())
    }

    /// The org claim carries no meaning on public chains.
    fn accepts_cached(&self, _resolved: &ResolvedMember, _member: &Member) -> AccessControlResult<()> {
        Ok(())
    }

    fn org_count(&self) -> usize {
        self.state.read().admins.len()
    }

    fn known_orgs(&self) -> HashSet<String> {
        HashSet::new()
    }

    fn counting_mode(&self) -> CountingMode {
        CountingMode::PerMember
    }

    fn lookup_consensus_node(&self, node_id: &str) -> Option<String> {
        self.state
            .read()
            .consensus
            .contains(node_id)
            .then(|| PUBLIC_ADMIN_ORG.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::InMemoryStore;
    use crate::config::AccessControlConfig;
    use crate::domain::policy_table::PolicyTable;
    use crate::service::ChainSettings;
    use crate::test_helpers::{public_chain_config, TestKey, TestSigner};
    use shared_types::OrgConfig;

    fn setup(config: &ChainConfig) -> (PublicMode, AccessControlService) {
        let service = AccessControlService::new(
            AccessControlConfig::default(),
            ChainSettings::from_chain_config(config),
            PolicyTable::new(),
            Arc::new(InMemoryStore::new()),
        );
        let mode = PublicMode::new();
        mode.load_config(config, &service).unwrap();
        (mode, service)
    }

    #[test]
    fn test_roles_by_key() {
        let admin = TestKey::generate("anything");
        let node = TestKey::generate("anything");
        let user = TestKey::generate("anything");
        let mut config = public_chain_config(&[&admin]);
        config.consensus.nodes.push(OrgConfig {
            org_id: PUBLIC_ADMIN_ORG.into(),
            node_id: vec![node.node_id()],
        });
        let (mode, service) = setup(&config);

        let role = |key: &TestKey| mode.resolve_member(&key.member(), &service).unwrap().role();
        assert_eq!(role(&admin), Role::Admin);
        assert_eq!(role(&node), Role::ConsensusNode);
        assert_eq!(role(&user), Role::Client);
        assert_eq!(
            mode.resolve_member(&user.member(), &service).unwrap().org_id(),
            PUBLIC_ADMIN_ORG
        );
    }

    #[test]
    fn test_org_count_is_admin_count() {
        let admins: Vec<TestKey> = (0..3).map(|_| TestKey::generate(PUBLIC_ADMIN_ORG)).collect();
        let refs: Vec<&TestKey> = admins.iter().collect();
        let (mode, _) = setup(&public_chain_config(&refs));
        assert_eq!(mode.org_count(), 3);
        assert_eq!(mode.counting_mode(), CountingMode::PerMember);
        assert!(mode.known_orgs().is_empty());
    }

    #[test]
    fn test_no_admin_rejected() {
        let config = public_chain_config(&[]);
        let service = AccessControlService::new(
            AccessControlConfig::default(),
            ChainSettings::from_chain_config(&config),
            PolicyTable::new(),
            Arc::new(InMemoryStore::new()),
        );
        assert!(matches!(
            PublicMode::new().load_config(&config, &service),
            Err(AccessControlError::ConfigurationError(_))
        ));
    }
}
