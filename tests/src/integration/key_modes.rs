//! # Public-Key Chains
//!
//! Permissioned-with-key chains resolve raw keys through org admins and the
//! `PUBKEY_MANAGE` registry; public chains count pinned admin keys one by one
//! and forbid node and org management.

use super::fixtures::Node;
use qc_10_access_control::domain::crypto;
use qc_10_access_control::test_helpers::{
    key_chain_config, payload, public_chain_config, transaction, TestKey, TestSigner,
};
use qc_10_access_control::{AccessControlError, MemberStatus, PubkeyInfo, BLOCK_VERSION_2330};
use shared_bus::BlockchainEvent;
use shared_types::AuthType;

fn register(node: &Node, key: &TestKey, role: &str) -> String {
    let id = hex::encode(crypto::hash(node.handle.provider.hash_type(), &key.der()).unwrap());
    let info = PubkeyInfo {
        pk_bytes: key.pem().into_bytes(),
        role: role.to_string(),
        org_id: key.org_id.clone(),
    };
    node.store.put("PUBKEY_MANAGE", &id, serde_json::to_vec(&info).unwrap());
    id
}

// =============================================================================
// PUBLIC
// =============================================================================

#[test]
fn test_public_chain_forbids_node_management() {
    let admins: Vec<TestKey> = (0..3).map(|_| TestKey::generate("public")).collect();
    let refs: Vec<&TestKey> = admins.iter().collect();
    let node = Node::start(&public_chain_config(&refs));
    assert_eq!(node.handle.provider.auth_type(), AuthType::Public);

    let tx = transaction(
        payload("CHAIN_CONFIG", "NODE_ID_ADD", &[("node_ids", "QmNode")]),
        &admins[0],
        &[&admins[1], &admins[2]],
    );
    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&tx, "CHAIN_CONFIG-NODE_ID_ADD", BLOCK_VERSION_2330),
        Err(AccessControlError::Forbidden(_))
    ));
}

#[test]
fn test_public_chain_majority_counts_admin_keys() {
    let admins: Vec<TestKey> = (0..4).map(|_| TestKey::generate("public")).collect();
    let refs: Vec<&TestKey> = admins.iter().collect();
    let node = Node::start(&public_chain_config(&refs));
    let provider = &node.handle.provider;
    assert_eq!(provider.org_count(), 4);

    let resource = "CHAIN_CONFIG-TRUST_ROOT_UPDATE";
    let two = transaction(payload("CHAIN_CONFIG", "TRUST_ROOT_UPDATE", &[]), &admins[0], &[&admins[1]]);
    assert!(provider.verify_tx_principal(&two, resource, BLOCK_VERSION_2330).is_err());

    let three = transaction(
        payload("CHAIN_CONFIG", "TRUST_ROOT_UPDATE", &[]),
        &admins[0],
        &[&admins[1], &admins[2]],
    );
    provider.verify_tx_principal(&three, resource, BLOCK_VERSION_2330).unwrap();
}

#[test]
fn test_public_chain_anyone_may_invoke() {
    let admin = TestKey::generate("public");
    let node = Node::start(&public_chain_config(&[&admin]));
    let user = TestKey::generate("public");
    let tx = transaction(payload("fact", "save", &[]), &user, &[]);

    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();
    assert_eq!(node.handle.provider.get_member_status(&admin.member()), MemberStatus::Normal);
}

// =============================================================================
// PERMISSIONED WITH KEY
// =============================================================================

#[test]
fn test_unregistered_key_is_unknown() {
    let admin = TestKey::generate("org1");
    let node = Node::start(&key_chain_config(&[&admin]));
    let stranger = TestKey::generate("org1");
    let tx = transaction(payload("fact", "save", &[]), &stranger, &[]);

    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::UnknownMember(_))
    ));
}

#[tokio::test]
async fn test_registered_key_until_deleted() {
    let admin = TestKey::generate("org1");
    let mut node = Node::start(&key_chain_config(&[&admin]));
    let client = TestKey::generate("org1");
    let id = register(&node, &client, "client");
    let tx = transaction(payload("fact", "save", &[]), &client, &[]);

    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    node.store.delete("PUBKEY_MANAGE", &id);
    // Still served from the member cache until the deletion event lands.
    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    node.commit(BlockchainEvent::PubkeyDeleted { pubkey: client.pem() }).await;
    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::UnknownMember(_))
    ));
}

#[test]
fn test_key_chain_admin_endorsement() {
    let admin1 = TestKey::generate("org1");
    let admin2 = TestKey::generate("org2");
    let node = Node::start(&key_chain_config(&[&admin1, &admin2]));
    let client = TestKey::generate("org1");
    register(&node, &client, "client");

    let resource = "PUBKEY_MANAGE-PUBKEY_ADD";
    let unendorsed = transaction(payload("PUBKEY_MANAGE", "PUBKEY_ADD", &[]), &client, &[]);
    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&unendorsed, resource, BLOCK_VERSION_2330),
        Err(AccessControlError::PolicyUnsatisfied { .. })
    ));

    let endorsed = transaction(payload("PUBKEY_MANAGE", "PUBKEY_ADD", &[]), &client, &[&admin2]);
    node.handle
        .provider
        .verify_tx_principal(&endorsed, resource, BLOCK_VERSION_2330)
        .unwrap();
}

#[test]
fn test_key_chain_forbids_cert_management() {
    let admin = TestKey::generate("org1");
    let node = Node::start(&key_chain_config(&[&admin]));
    let tx = transaction(payload("CERT_MANAGE", "CERTS_FREEZE", &[]), &admin, &[&admin]);

    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&tx, "CERT_MANAGE-CERTS_FREEZE", BLOCK_VERSION_2330),
        Err(AccessControlError::Forbidden(_))
    ));
}
