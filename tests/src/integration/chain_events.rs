//! # Chain Events
//!
//! Committed management transactions reach the provider as bus events:
//! freezes, revocations, config updates, certificate deletions and payer
//! bindings all change later verdicts.

use super::fixtures::{Node, Orgs};
use qc_10_access_control::test_helpers::{cert_chain_config, payload, transaction, TestSigner};
use qc_10_access_control::{
    new_provider, AccessControlError, InMemoryStore, MemberStatus, RelatedMaterialKind, Role, BLOCK_VERSION_2330,
};
use shared_bus::{BlockchainEvent, EventPublisher, InMemoryEventBus};
use shared_types::{
    Block, BlockHeader, ConsensusType, EndorsementEntry, Member, PolicyConfig, ResourcePolicyConfig, Transaction,
    TxResult, TxStatusCode,
};
use std::sync::Arc;
use std::time::Duration;

fn save_tx(sender: &dyn TestSigner) -> Transaction {
    transaction(payload("fact", "save", &[]), sender, &[])
}

/// `fact-save` signed by `signer` but naming it through the `alice` alias.
fn alias_tx(signer: &dyn TestSigner) -> Transaction {
    let mut tx = save_tx(signer);
    let message = tx.payload.signing_bytes().unwrap();
    tx.sender = Some(EndorsementEntry::new(Member::alias("org1", "alice"), signer.sign(&message)));
    tx
}

fn pem_string(pem: Vec<u8>) -> String {
    String::from_utf8(pem).unwrap()
}

// =============================================================================
// FREEZE AND REVOKE
// =============================================================================

#[tokio::test]
async fn test_frozen_until_unfrozen() {
    let orgs = Orgs::new(1);
    let mut node = Node::start(&orgs.chain_config());
    let client = orgs.client(0);
    let tx = save_tx(&client);

    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    node.commit(BlockchainEvent::CertsFrozen {
        certs: vec![pem_string(client.cert_pem())],
    })
    .await;
    for _ in 0..2 {
        assert!(matches!(
            node.handle
                .provider
                .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330),
            Err(AccessControlError::FrozenCredential(_))
        ));
    }
    assert_eq!(node.handle.provider.get_member_status(&client.member()), MemberStatus::Frozen);

    node.commit(BlockchainEvent::CertsUnfrozen {
        certs: vec![pem_string(client.cert_pem())],
        cert_hashes: vec![],
    })
    .await;
    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();
}

#[tokio::test]
async fn test_frozen_intermediate_blocks_its_leaves() {
    let orgs = Orgs::new(1);
    let ica = orgs.cas[0].intermediate("ica.org1");
    let mut config = orgs.chain_config();
    config.trust_roots[0].root.push(ica.cert_pem());
    let mut node = Node::start(&config);
    let below = ica.issue(Role::Client, "client1.org1");
    let beside = orgs.client(0);
    let provider = &node.handle.provider;

    provider
        .verify_tx_principal(&save_tx(&below), "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    node.commit(BlockchainEvent::CertsFrozen {
        certs: vec![ica.cert_pem()],
    })
    .await;
    let provider = &node.handle.provider;
    assert!(matches!(
        provider.verify_tx_principal(&save_tx(&below), "fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::FrozenCredential(_))
    ));
    // Certificates issued straight from the root are unaffected.
    provider
        .verify_tx_principal(&save_tx(&beside), "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    node.commit(BlockchainEvent::CertsUnfrozen {
        certs: vec![ica.cert_pem()],
        cert_hashes: vec![],
    })
    .await;
    node.handle
        .provider
        .verify_tx_principal(&save_tx(&below), "fact-save", BLOCK_VERSION_2330)
        .unwrap();
}

#[tokio::test]
async fn test_maxbft_defers_consensus_freeze_to_epoch_switch() {
    let orgs = Orgs::new(1);
    let mut config = orgs.chain_config();
    config.consensus.consensus_type = ConsensusType::Maxbft;
    let mut node = Node::start(&config);
    let consensus = orgs.cas[0].issue(Role::ConsensusNode, "consensus1.org1");
    let client = orgs.client(0);

    node.commit(BlockchainEvent::CertsFrozen {
        certs: vec![pem_string(consensus.cert_pem()), pem_string(client.cert_pem())],
    })
    .await;
    let provider = &node.handle.provider;
    assert_eq!(provider.get_member_status(&client.member()), MemberStatus::Frozen);
    assert_eq!(provider.get_member_status(&consensus.member()), MemberStatus::Normal);

    node.commit(BlockchainEvent::MaxbftEpochConfigured { epoch_id: 1 }).await;
    assert_eq!(
        node.handle.provider.get_member_status(&consensus.member()),
        MemberStatus::Frozen
    );
}

#[tokio::test]
async fn test_revoked_by_crl() {
    let orgs = Orgs::new(1);
    let mut node = Node::start(&orgs.chain_config());
    let revoked = orgs.client(0);
    let other = orgs.client(0);
    let crl = orgs.cas[0].crl(&[&revoked.cert], 1);

    node.handle
        .provider
        .verify_related_material(RelatedMaterialKind::Crl, crl.as_bytes())
        .unwrap();
    assert_eq!(node.handle.provider.validate_crl(crl.as_bytes()).unwrap(), 1);

    node.commit(BlockchainEvent::CertsRevoked { crls: vec![crl] }).await;
    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&save_tx(&revoked), "fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::RevokedCredential(_))
    ));
    assert_eq!(node.handle.provider.get_member_status(&revoked.member()), MemberStatus::Revoked);
    node.handle
        .provider
        .verify_tx_principal(&save_tx(&other), "fact-save", BLOCK_VERSION_2330)
        .unwrap();
}

#[test]
fn test_crl_from_foreign_issuer_rejected() {
    let orgs = Orgs::new(1);
    let node = Node::start(&orgs.chain_config());
    let outsider = Orgs::new(1);
    let crl = outsider.cas[0].crl(&[], 1);

    assert!(node
        .handle
        .provider
        .verify_related_material(RelatedMaterialKind::Crl, crl.as_bytes())
        .is_err());
}

// =============================================================================
// CHAIN CONFIG
// =============================================================================

#[tokio::test]
async fn test_config_replay_is_idempotent() {
    let orgs = Orgs::new(4);
    let mut node = Node::start(&orgs.chain_config());
    let admins: Vec<_> = (0..3).map(|i| orgs.admin(i)).collect();
    let client = orgs.client(3);
    let resource = "CHAIN_CONFIG-CORE_UPDATE";
    let txs = [
        transaction(payload("CHAIN_CONFIG", "CORE_UPDATE", &[]), &admins[0], &[&admins[1]]),
        transaction(
            payload("CHAIN_CONFIG", "CORE_UPDATE", &[]),
            &admins[0],
            &[&admins[1], &admins[2]],
        ),
        save_tx(&client),
    ];
    let verdicts = |node: &Node| -> Vec<bool> {
        txs.iter()
            .map(|tx| {
                let resource = if tx.payload.contract_name == "fact" { "fact-save" } else { resource };
                node.handle
                    .provider
                    .verify_tx_principal(tx, resource, BLOCK_VERSION_2330)
                    .is_ok()
            })
            .collect()
    };

    let before = verdicts(&node);
    assert_eq!(before, vec![false, true, true]);
    for _ in 0..2 {
        node.commit(BlockchainEvent::ChainConfigUpdated(orgs.chain_config())).await;
        assert_eq!(verdicts(&node), before);
    }
}

#[tokio::test]
async fn test_config_override_applies_to_new_requests() {
    let orgs = Orgs::new(2);
    let mut config = orgs.chain_config();
    let mut node = Node::start(&config);
    let client = orgs.client(0);
    let admin = orgs.admin(1);
    let tx = save_tx(&client);

    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    config.resource_policies.push(ResourcePolicyConfig {
        resource_name: "fact-save".into(),
        policy: PolicyConfig {
            rule: "ANY".into(),
            org_list: vec![],
            role_list: vec!["admin".into()],
        },
    });
    node.commit(BlockchainEvent::ChainConfigUpdated(config)).await;

    assert!(node
        .handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .is_err());
    let endorsed = transaction(payload("fact", "save", &[]), &client, &[&admin]);
    node.handle
        .provider
        .verify_tx_principal(&endorsed, "fact-save", BLOCK_VERSION_2330)
        .unwrap();
    assert!(node
        .handle
        .provider
        .all_resource_policies()
        .iter()
        .any(|(name, _)| name == "fact-save"));
}

#[tokio::test]
async fn test_new_trust_root_admits_org() {
    let orgs = Orgs::new(2);
    let mut node = Node::start(&cert_chain_config(&[&orgs.cas[0]]));
    let client2 = orgs.client(1);
    let tx = save_tx(&client2);

    assert!(node
        .handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .is_err());

    node.commit(BlockchainEvent::ChainConfigUpdated(orgs.chain_config())).await;
    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();
    assert_eq!(node.handle.provider.org_count(), 2);
}

// =============================================================================
// CERTIFICATE REGISTRY
// =============================================================================

#[tokio::test]
async fn test_cert_hash_member_resolved_from_store() {
    let orgs = Orgs::new(1);
    let store = Arc::new(InMemoryStore::new());
    let mut node = Node::start_with_store(&orgs.chain_config(), store.clone());
    let client = orgs.client(0);
    let hash_type = node.handle.provider.hash_type();
    let cert_id = hex::encode(client.cert_hash(hash_type));
    store.put("CERT_MANAGE", &cert_id, client.cert_pem());

    let mut tx = save_tx(&client);
    let message = tx.payload.signing_bytes().unwrap();
    tx.sender = Some(EndorsementEntry::new(
        client.cert_hash_member(hash_type),
        client.sign(&message),
    ));

    node.handle
        .provider
        .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330)
        .unwrap();
    assert_eq!(node.handle.provider.get_cert_from_cache(&cert_id).unwrap(), client.cert_pem());

    store.delete("CERT_MANAGE", &cert_id);
    node.commit(BlockchainEvent::CertsDeleted {
        cert_hashes: vec![cert_id.clone()],
    })
    .await;
    assert!(matches!(
        node.handle.provider.get_cert_from_cache(&cert_id),
        Err(AccessControlError::UnknownMember(_))
    ));
    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&tx, "fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::UnknownMember(_))
    ));
}

#[tokio::test]
async fn test_alias_member_follows_alias_events() {
    let orgs = Orgs::new(1);
    let store = Arc::new(InMemoryStore::new());
    let mut node = Node::start_with_store(&orgs.chain_config(), store.clone());
    let first = orgs.client(0);
    let second = orgs.client(0);
    store.put("CERT_MANAGE", "alice", first.cert_pem());

    node.handle
        .provider
        .verify_tx_principal(&alias_tx(&first), "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    // Rebinding the alias evicts the cached certificate.
    store.put("CERT_MANAGE", "alice", second.cert_pem());
    node.commit(BlockchainEvent::CertAliasUpdated {
        alias: "alice".to_string(),
    })
    .await;
    let provider = &node.handle.provider;
    assert_eq!(provider.get_cert_from_cache("alice").unwrap(), second.cert_pem());
    assert!(matches!(
        provider.verify_tx_principal(&alias_tx(&first), "fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::InvalidSignature(_))
    ));
    provider
        .verify_tx_principal(&alias_tx(&second), "fact-save", BLOCK_VERSION_2330)
        .unwrap();

    store.delete("CERT_MANAGE", "alice");
    node.commit(BlockchainEvent::CertAliasesDeleted {
        aliases: vec!["alice".to_string()],
    })
    .await;
    assert!(matches!(
        node.handle
            .provider
            .verify_tx_principal(&alias_tx(&second), "fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::UnknownMember(_))
    ));
}

// =============================================================================
// PAYER
// =============================================================================

#[tokio::test]
async fn test_committed_payer_binding() {
    let orgs = Orgs::new(1);
    let mut node = Node::start(&orgs.chain_config());
    let payer = orgs.client(0);
    let mut tx = transaction(
        payload(
            "ACCOUNT_MANAGER",
            "SET_CONTRACT_METHOD_PAYER",
            &[("CONTRACT_NAME", "fact"), ("METHOD", "save")],
        ),
        &payer,
        &[&payer],
    );
    tx.result = Some(TxResult {
        code: TxStatusCode::Success,
        message: String::new(),
    });

    node.commit(BlockchainEvent::BlockCommitted(Block {
        header: BlockHeader::default(),
        txs: vec![tx.clone()],
    }))
    .await;
    let cached = node.handle.provider.get_payer_from_cache("fact-save").unwrap();
    assert!(pem_string(cached).contains("PUBLIC KEY"));

    tx.payload.method = "UNSET_CONTRACT_METHOD_PAYER".to_string();
    node.commit(BlockchainEvent::BlockCommitted(Block {
        header: BlockHeader::default(),
        txs: vec![tx],
    }))
    .await;
    assert!(node.handle.provider.get_payer_from_cache("fact-save").is_none());
}

#[tokio::test]
async fn test_failed_payer_tx_ignored() {
    let orgs = Orgs::new(1);
    let mut node = Node::start(&orgs.chain_config());
    let payer = orgs.client(0);
    let mut tx = transaction(
        payload("ACCOUNT_MANAGER", "SET_CONTRACT_METHOD_PAYER", &[("CONTRACT_NAME", "fact")]),
        &payer,
        &[&payer],
    );
    tx.result = Some(TxResult {
        code: TxStatusCode::ContractFail,
        message: "out of gas".to_string(),
    });

    node.commit(BlockchainEvent::BlockCommitted(Block {
        header: BlockHeader::default(),
        txs: vec![tx],
    }))
    .await;
    assert!(node.handle.provider.get_payer_from_cache("fact").is_none());
}

// =============================================================================
// HANDLER LOOP
// =============================================================================

#[tokio::test]
async fn test_spawned_handler_applies_events() {
    let orgs = Orgs::new(1);
    let bus = InMemoryEventBus::new();
    let handle = new_provider(&orgs.chain_config(), "org1", Arc::new(InMemoryStore::new()), &bus).unwrap();
    let provider = handle.provider.clone();
    let task = tokio::spawn(handle.events.run());

    let client = orgs.client(0);
    bus.publish(BlockchainEvent::CertsFrozen {
        certs: vec![pem_string(client.cert_pem())],
    })
    .await;

    let frozen = tokio::time::timeout(Duration::from_secs(5), async {
        while provider.get_member_status(&client.member()) != MemberStatus::Frozen {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(frozen.is_ok());

    drop(bus);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
