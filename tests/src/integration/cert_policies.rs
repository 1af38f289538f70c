//! # Certificate-Mode Endorsement Policies
//!
//! ANY, MAJORITY and SELF rules on a certificate chain, across the policy
//! strata a block version selects.

use super::fixtures::{Node, Orgs};
use qc_10_access_control::test_helpers::{payload, transaction, TestIdentity, TestSigner};
use qc_10_access_control::{AccessControlError, BLOCK_VERSION_220, BLOCK_VERSION_2320, BLOCK_VERSION_2330};
use shared_types::{Transaction, TxStatusCode};

// =============================================================================
// FIXTURES
// =============================================================================

fn alias_delete_tx(sender: &dyn TestSigner, endorsers: &[&dyn TestSigner]) -> Transaction {
    transaction(
        payload("CERT_MANAGE", "CERTS_ALIAS_DELETE", &[("aliases", "alias1")]),
        sender,
        endorsers,
    )
}

fn node_org_add_tx(sender: &dyn TestSigner, endorsers: &[&dyn TestSigner]) -> Transaction {
    transaction(
        payload("CHAIN_CONFIG", "NODE_ORG_ADD", &[("org_id", "org5")]),
        sender,
        endorsers,
    )
}

fn trust_root_update_tx(sender: &dyn TestSigner, target_org: &str) -> Transaction {
    transaction(
        payload("CHAIN_CONFIG", "TRUST_ROOT_UPDATE", &[("org_id", target_org)]),
        sender,
        &[],
    )
}

// =============================================================================
// ANY
// =============================================================================

#[test]
fn test_any_rule_needs_an_admin() {
    let orgs = Orgs::new(1);
    let node = Node::start(&orgs.chain_config());
    let provider = &node.handle.provider;
    let admin = orgs.admin(0);
    let client = orgs.client(0);
    let resource = "CERT_MANAGE-CERTS_ALIAS_DELETE";

    provider
        .verify_tx_principal(&alias_delete_tx(&admin, &[&admin]), resource, BLOCK_VERSION_2330)
        .unwrap();

    let err = provider
        .verify_tx_principal(&alias_delete_tx(&client, &[&client]), resource, BLOCK_VERSION_2330)
        .unwrap_err();
    assert!(matches!(err, AccessControlError::PolicyUnsatisfied { .. }));
    assert!(err.to_string().contains("ADMIN"), "{err}");
    assert_eq!(err.tx_status_code(), TxStatusCode::AuthFailed);
}

#[test]
fn test_any_rule_accepts_admin_of_any_org() {
    let orgs = Orgs::new(3);
    let node = Node::start(&orgs.chain_config());
    let client = orgs.client(0);
    let foreign_admin = orgs.admin(2);

    node.handle
        .provider
        .verify_tx_principal(
            &alias_delete_tx(&client, &[&foreign_admin]),
            "CERT_MANAGE-CERTS_ALIAS_DELETE",
            BLOCK_VERSION_2330,
        )
        .unwrap();
}

// =============================================================================
// MAJORITY ACROSS STRATA
// =============================================================================

#[test]
fn test_legacy_majority_rejects_foreign_roles() {
    let orgs = Orgs::new(4);
    let node = Node::start(&orgs.chain_config());
    let provider = &node.handle.provider;
    let admins: Vec<TestIdentity> = (0..4).map(|i| orgs.admin(i)).collect();
    let client = orgs.client(3);
    let resource = "CHAIN_CONFIG-NODE_ORG_ADD";

    let mixed = node_org_add_tx(&admins[0], &[&admins[1], &admins[2], &client]);
    for version in [BLOCK_VERSION_220, BLOCK_VERSION_2320] {
        assert!(matches!(
            provider.verify_tx_principal(&mixed, resource, version),
            Err(AccessControlError::PolicyUnsatisfied { .. })
        ));
    }

    let all_admins = node_org_add_tx(&admins[0], &[&admins[1], &admins[2], &admins[3]]);
    for version in [BLOCK_VERSION_220, BLOCK_VERSION_2320] {
        provider.verify_tx_principal(&all_admins, resource, version).unwrap();
    }
}

#[test]
fn test_legacy_majority_accepts_client_sender_with_admin_endorsers() {
    let orgs = Orgs::new(4);
    let node = Node::start(&orgs.chain_config());
    let provider = &node.handle.provider;
    let admins: Vec<TestIdentity> = (0..4).map(|i| orgs.admin(i)).collect();
    let client = orgs.client(0);
    let resource = "CHAIN_CONFIG-NODE_ORG_ADD";

    let tx = node_org_add_tx(&client, &[&admins[0], &admins[1], &admins[2], &admins[3]]);
    for version in [BLOCK_VERSION_220, BLOCK_VERSION_2320, BLOCK_VERSION_2330] {
        provider.verify_tx_principal(&tx, resource, version).unwrap();
    }

    // A client among the endorsers still fails the historical check, and
    // the error counts the admin orgs that did endorse.
    let other_client = orgs.client(3);
    let mixed = node_org_add_tx(&client, &[&admins[1], &admins[2], &other_client]);
    assert!(matches!(
        provider.verify_tx_principal(&mixed, resource, BLOCK_VERSION_220),
        Err(AccessControlError::PolicyUnsatisfied { required: 3, received: 2, .. })
    ));
}

#[test]
fn test_current_majority_ignores_foreign_roles() {
    let orgs = Orgs::new(4);
    let node = Node::start(&orgs.chain_config());
    let provider = &node.handle.provider;
    let admins: Vec<TestIdentity> = (0..3).map(|i| orgs.admin(i)).collect();
    let client = orgs.client(3);
    let resource = "CHAIN_CONFIG-NODE_ORG_ADD";

    let mixed = node_org_add_tx(&admins[0], &[&admins[1], &admins[2], &client]);
    provider.verify_tx_principal(&mixed, resource, BLOCK_VERSION_2330).unwrap();

    // Exactly half of the orgs is not a majority.
    let half = node_org_add_tx(&admins[0], &[&admins[1], &client]);
    assert!(matches!(
        provider.verify_tx_principal(&half, resource, BLOCK_VERSION_2330),
        Err(AccessControlError::PolicyUnsatisfied { required: 3, received: 2, .. })
    ));
}

#[test]
fn test_verdicts_stable_across_restarts() {
    let orgs = Orgs::new(4);
    let config = orgs.chain_config();
    let admins: Vec<TestIdentity> = (0..3).map(|i| orgs.admin(i)).collect();
    let client = orgs.client(3);
    let tx = node_org_add_tx(&admins[0], &[&admins[1], &admins[2], &client]);
    let resource = "CHAIN_CONFIG-NODE_ORG_ADD";

    let verdicts = |node: &Node| -> Vec<bool> {
        [BLOCK_VERSION_220, BLOCK_VERSION_2320, BLOCK_VERSION_2330]
            .iter()
            .map(|v| node.handle.provider.verify_tx_principal(&tx, resource, *v).is_ok())
            .collect()
    };

    let first = verdicts(&Node::start(&config));
    let second = verdicts(&Node::start(&config));
    assert_eq!(first, vec![false, false, true]);
    assert_eq!(first, second);
}

// =============================================================================
// SELF
// =============================================================================

#[test]
fn test_self_rule_targets_parameter_org() {
    let orgs = Orgs::new(2);
    let node = Node::start(&orgs.chain_config());
    let provider = &node.handle.provider;
    let admin1 = orgs.admin(0);
    let resource = "CHAIN_CONFIG-TRUST_ROOT_UPDATE";

    provider
        .verify_tx_principal(&trust_root_update_tx(&admin1, "org1"), resource, BLOCK_VERSION_2330)
        .unwrap();
    assert!(matches!(
        provider.verify_tx_principal(&trust_root_update_tx(&admin1, "org2"), resource, BLOCK_VERSION_2330),
        Err(AccessControlError::PolicyUnsatisfied { .. })
    ));
}

#[test]
fn test_self_rule_ignores_foreign_admin_endorsement() {
    let orgs = Orgs::new(2);
    let node = Node::start(&orgs.chain_config());
    let client1 = orgs.client(0);
    let admin2 = orgs.admin(1);
    let tx = transaction(
        payload("CHAIN_CONFIG", "TRUST_ROOT_UPDATE", &[("org_id", "org1")]),
        &client1,
        &[&admin2],
    );

    assert!(node
        .handle
        .provider
        .verify_tx_principal(&tx, "CHAIN_CONFIG-TRUST_ROOT_UPDATE", BLOCK_VERSION_2330)
        .is_err());
}
