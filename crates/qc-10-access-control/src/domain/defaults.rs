//! # Default Policies
//!
//! Built-in resource names and the policy tables every provider preseeds,
//! tuned by credential mode and consensus type.

use crate::domain::entities::Role;
use crate::domain::policy::{Policy, Rule};
use crate::domain::policy_table::{PolicyMap, PolicyTable};
use shared_types::{AuthType, ConsensusType, TxType};

// =============================================================================
// RESOURCE NAMES
// =============================================================================

/// System contract names.
pub mod contracts {
    pub const CHAIN_CONFIG: &str = "CHAIN_CONFIG";
    pub const CERT_MANAGE: &str = "CERT_MANAGE";
    pub const PUBKEY_MANAGE: &str = "PUBKEY_MANAGE";
    pub const CONTRACT_MANAGE: &str = "CONTRACT_MANAGE";
    pub const ACCOUNT_MANAGER: &str = "ACCOUNT_MANAGER";
    pub const PRIVATE_COMPUTE: &str = "PRIVATE_COMPUTE";
    pub const ARCHIVE: &str = "ARCHIVE";
    pub const RELAY_CROSS: &str = "RELAY_CROSS";
}

/// Inter-node message classes.
pub const MSG_TYPE_P2P: &str = "P2P";
pub const MSG_TYPE_CONSENSUS: &str = "CONSENSUS";

/// `ACCOUNT_MANAGER` payer methods observed on committed blocks.
pub const SET_CONTRACT_METHOD_PAYER: &str = "SET_CONTRACT_METHOD_PAYER";
pub const UNSET_CONTRACT_METHOD_PAYER: &str = "UNSET_CONTRACT_METHOD_PAYER";

/// Parameter naming the organization a `SELF` rule targets.
pub const PARAM_ORG_ID: &str = "org_id";
/// Payer parameters.
pub const PARAM_CONTRACT_NAME: &str = "CONTRACT_NAME";
pub const PARAM_METHOD: &str = "METHOD";

/// `<contract>-<method>`.
#[must_use]
pub fn resource_name(contract: &str, method: &str) -> String {
    format!("{contract}-{method}")
}

const CHAIN_CONFIG_MAJORITY: &[&str] = &[
    "CORE_UPDATE",
    "BLOCK_UPDATE",
    "TRUST_ROOT_ADD",
    "TRUST_ROOT_DELETE",
    "TRUST_MEMBER_ADD",
    "TRUST_MEMBER_UPDATE",
    "TRUST_MEMBER_DELETE",
    "NODE_ORG_ADD",
    "NODE_ORG_UPDATE",
    "NODE_ORG_DELETE",
    "CONSENSUS_EXT_ADD",
    "CONSENSUS_EXT_UPDATE",
    "CONSENSUS_EXT_DELETE",
    "PERMISSION_ADD",
    "PERMISSION_UPDATE",
    "PERMISSION_DELETE",
    "UPDATE_VERSION",
];

/// Chain-config methods added after v220.
const CHAIN_CONFIG_MAJORITY_V2320: &[&str] = &["ALTER_ADDR_TYPE", "ENABLE_OR_DISABLE_GAS", "SET_INVOKE_BASE_GAS"];

const CHAIN_CONFIG_SELF: &[&str] = &["TRUST_ROOT_UPDATE", "NODE_ID_ADD", "NODE_ID_UPDATE", "NODE_ID_DELETE"];

const CHAIN_CONFIG_NODE_ID: &[&str] = &["NODE_ID_ADD", "NODE_ID_UPDATE", "NODE_ID_DELETE"];
const CHAIN_CONFIG_NODE_ORG: &[&str] = &["NODE_ORG_ADD", "NODE_ORG_UPDATE", "NODE_ORG_DELETE"];
const CHAIN_CONFIG_TRUST: &[&str] = &[
    "TRUST_ROOT_ADD",
    "TRUST_ROOT_DELETE",
    "TRUST_MEMBER_ADD",
    "TRUST_MEMBER_UPDATE",
    "TRUST_MEMBER_DELETE",
];

const CHAIN_CONFIG_PERMISSION: &[&str] = &["PERMISSION_ADD", "PERMISSION_UPDATE", "PERMISSION_DELETE"];

const CERT_MANAGE_ADMIN: &[&str] = &[
    "CERTS_FREEZE",
    "CERTS_UNFREEZE",
    "CERTS_DELETE",
    "CERTS_REVOKE",
    "CERTS_ALIAS_DELETE",
];

/// Every cert-manage method, forbidden outside certificate mode.
const CERT_MANAGE_ALL: &[&str] = &[
    "CERT_ADD",
    "CERTS_FREEZE",
    "CERTS_UNFREEZE",
    "CERTS_DELETE",
    "CERTS_REVOKE",
    "CERT_ALIAS_ADD",
    "CERT_ALIAS_UPDATE",
    "CERTS_ALIAS_DELETE",
];

const PUBKEY_MANAGE_ADMIN: &[&str] = &["PUBKEY_ADD", "PUBKEY_DELETE"];

const CONTRACT_MANAGE_MAJORITY: &[&str] = &[
    "INIT_CONTRACT",
    "UPGRADE_CONTRACT",
    "FREEZE_CONTRACT",
    "UNFREEZE_CONTRACT",
    "REVOKE_CONTRACT",
    "GRANT_CONTRACT_ACCESS",
    "REVOKE_CONTRACT_ACCESS",
];

const CONTRACT_MANAGE_SENDER: &[&str] = &["INIT_CONTRACT", "UPGRADE_CONTRACT"];

const ACCOUNT_MANAGER_MAJORITY: &[&str] = &["SET_ADMIN"];
const ACCOUNT_MANAGER_ADMIN: &[&str] = &["FREEZE_ACCOUNT", "UNFREEZE_ACCOUNT"];

const PRIVATE_COMPUTE_ADMIN: &[&str] = &["SAVE_CA_CERT", "SAVE_ENCLAVE_REPORT"];
const ARCHIVE_ADMIN: &[&str] = &["ARCHIVE_BLOCK", "RESTORE_BLOCK"];
const RELAY_CROSS_ADMIN: &[&str] = &["SAVE_GATEWAY", "UPDATE_GATEWAY"];

/// Whether chain config may never override the policy of `resource`.
#[must_use]
pub fn is_restrained(resource: &str) -> bool {
    if resource == MSG_TYPE_P2P || resource == MSG_TYPE_CONSENSUS {
        return true;
    }
    if TxType::ALL.iter().any(|tx_type| tx_type.as_str() == resource) {
        return true;
    }
    resource
        .strip_prefix(contracts::CHAIN_CONFIG)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|method| CHAIN_CONFIG_PERMISSION.contains(&method))
}

/// Whether `resource` is per-organization, so that `SELF` applies to it.
#[must_use]
pub fn is_self_resource(resource: &str) -> bool {
    resource
        .strip_prefix(contracts::CHAIN_CONFIG)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|method| CHAIN_CONFIG_SELF.contains(&method))
}

// =============================================================================
// DEFAULT TABLES
// =============================================================================

const TX_INVOKE_ROLES: &[Role] = &[Role::Client, Role::Admin, Role::ConsensusNode, Role::CommonNode];
const P2P_ROLES: &[Role] = &[Role::ConsensusNode, Role::CommonNode];

fn admin(rule: Rule) -> Policy {
    Policy::with_roles(rule, &[Role::Admin])
}

fn forbidden() -> Policy {
    Policy::with_roles(Rule::Forbidden, &[])
}

struct TableBuilder {
    table: PolicyTable,
}

impl TableBuilder {
    /// Insert into the current map and the listed historical maps.
    fn put(&mut self, maps: &[PolicyMap], contract: &str, methods: &[&str], policy: &Policy) {
        for method in methods {
            let name = resource_name(contract, method);
            for map in maps {
                self.table.insert(*map, name.clone(), policy.clone());
            }
        }
    }

    fn put_named(&mut self, maps: &[PolicyMap], name: &str, policy: Policy) {
        for map in maps {
            self.table.insert(*map, name, policy.clone());
        }
    }
}

/// Default policy table of a provider.
#[must_use]
pub fn default_policy_table(auth_type: AuthType, consensus: ConsensusType) -> PolicyTable {
    use PolicyMap::{
        Exceptional220, Exceptional2320, MsgType, Resource, Resource220, Resource2320, Sender, TxType as TxMap,
    };

    let all_strata = [Resource, Resource220, Resource2320];
    let since_2320 = [Resource, Resource2320];
    let mut b = TableBuilder { table: PolicyTable::new() };

    // Tx and message types.
    let tx_policies = [
        (TxType::QueryContract, Policy::with_roles(Rule::Any, &[])),
        (TxType::InvokeContract, Policy::with_roles(Rule::Any, TX_INVOKE_ROLES)),
        (TxType::Subscribe, Policy::with_roles(Rule::Any, &[])),
        (TxType::Archive, admin(Rule::Any)),
    ];
    for (tx_type, policy) in tx_policies {
        b.put_named(&[TxMap, Resource220, Resource2320], tx_type.as_str(), policy);
    }
    b.put_named(
        &[MsgType, Resource220, Resource2320],
        MSG_TYPE_P2P,
        Policy::with_roles(Rule::Any, P2P_ROLES),
    );
    b.put_named(
        &[MsgType, Resource220, Resource2320],
        MSG_TYPE_CONSENSUS,
        Policy::with_roles(Rule::Any, &[Role::ConsensusNode]),
    );

    // Chain configuration.
    let majority = admin(Rule::Majority);
    b.put(&all_strata, contracts::CHAIN_CONFIG, CHAIN_CONFIG_MAJORITY, &majority);
    b.put(&since_2320, contracts::CHAIN_CONFIG, CHAIN_CONFIG_MAJORITY_V2320, &majority);
    match auth_type {
        // Public chains have a single pseudo-organization.
        AuthType::Public => {
            b.put(&all_strata, contracts::CHAIN_CONFIG, &["TRUST_ROOT_UPDATE"], &majority);
        }
        _ => b.put(&all_strata, contracts::CHAIN_CONFIG, CHAIN_CONFIG_SELF, &admin(Rule::SelfOrg)),
    }

    // Certificates and keys.
    b.put(&all_strata, contracts::CERT_MANAGE, CERT_MANAGE_ADMIN, &admin(Rule::Any));
    b.put(&all_strata, contracts::PUBKEY_MANAGE, PUBKEY_MANAGE_ADMIN, &admin(Rule::Any));

    // Contract lifecycle.
    b.put(&all_strata, contracts::CONTRACT_MANAGE, CONTRACT_MANAGE_MAJORITY, &majority);
    b.put(
        &[Sender],
        contracts::CONTRACT_MANAGE,
        CONTRACT_MANAGE_SENDER,
        &Policy::with_roles(Rule::Any, &[Role::Admin, Role::Client]),
    );

    // Methods introduced after v220.
    b.put(&since_2320, contracts::ACCOUNT_MANAGER, ACCOUNT_MANAGER_MAJORITY, &majority);
    b.put(&since_2320, contracts::ACCOUNT_MANAGER, ACCOUNT_MANAGER_ADMIN, &admin(Rule::Any));
    b.put(&since_2320, contracts::PRIVATE_COMPUTE, PRIVATE_COMPUTE_ADMIN, &admin(Rule::Any));
    b.put(&since_2320, contracts::ARCHIVE, ARCHIVE_ADMIN, &admin(Rule::Any));
    b.put(&since_2320, contracts::RELAY_CROSS, RELAY_CROSS_ADMIN, &admin(Rule::Any));

    // Mode restrictions: historical strata carry them in the exceptional maps.
    let mut restricted: Vec<(&str, &[&str])> = Vec::new();
    match auth_type {
        AuthType::PermissionedWithCert => {}
        AuthType::PermissionedWithKey => {
            restricted.push((contracts::CERT_MANAGE, CERT_MANAGE_ALL));
        }
        AuthType::Public => {
            restricted.push((contracts::CERT_MANAGE, CERT_MANAGE_ALL));
            restricted.push((contracts::CHAIN_CONFIG, CHAIN_CONFIG_NODE_ID));
            restricted.push((contracts::CHAIN_CONFIG, CHAIN_CONFIG_NODE_ORG));
            restricted.push((contracts::CHAIN_CONFIG, CHAIN_CONFIG_TRUST));
        }
    }
    if consensus == ConsensusType::Dpos {
        restricted.push((contracts::CHAIN_CONFIG, CHAIN_CONFIG_NODE_ID));
        restricted.push((contracts::CHAIN_CONFIG, CHAIN_CONFIG_NODE_ORG));
    }
    for (contract, methods) in restricted {
        for method in methods {
            let name = resource_name(contract, method);
            b.table.insert(Resource, name.clone(), forbidden());
            b.table.remove(Resource220, &name);
            b.table.remove(Resource2320, &name);
            b.table.insert(Exceptional220, name.clone(), forbidden());
            b.table.insert(Exceptional2320, name, forbidden());
        }
    }

    b.table
}
