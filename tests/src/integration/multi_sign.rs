//! # Multi-Sign Progression
//!
//! Votes collected for a MAJORITY resource on a four-org chain.

use super::fixtures::{Node, Orgs};
use qc_10_access_control::test_helpers::{multi_sign_info, payload, TestIdentity, TestSigner};
use qc_10_access_control::{AccessControlError, BLOCK_VERSION_2330};
use shared_types::{MultiSignStatus, Payload, VoteStatus};

struct Proposal {
    node: Node,
    admins: Vec<TestIdentity>,
    payload: Payload,
}

impl Proposal {
    fn init_contract() -> Self {
        let orgs = Orgs::new(4);
        Self {
            node: Node::start(&orgs.chain_config()),
            admins: (0..4).map(|i| orgs.admin(i)).collect(),
            payload: payload("CONTRACT_MANAGE", "INIT_CONTRACT", &[("CONTRACT_NAME", "fact")]),
        }
    }

    fn status(&self, votes: &[(usize, VoteStatus)]) -> Result<MultiSignStatus, AccessControlError> {
        let votes: Vec<(&dyn TestSigner, VoteStatus)> = votes
            .iter()
            .map(|(i, vote)| (&self.admins[*i] as &dyn TestSigner, *vote))
            .collect();
        let info = multi_sign_info(self.payload.clone(), &votes);
        self.node
            .handle
            .provider
            .verify_multi_sign_tx_principal(&info, BLOCK_VERSION_2330)
    }
}

#[test]
fn test_agree_votes_pass_on_majority() {
    let proposal = Proposal::init_contract();
    use VoteStatus::Agree;

    assert_eq!(proposal.status(&[(0, Agree), (1, Agree)]).unwrap(), MultiSignStatus::Processing);
    assert_eq!(
        proposal.status(&[(0, Agree), (1, Agree), (2, Agree)]).unwrap(),
        MultiSignStatus::Passed
    );
}

#[test]
fn test_half_reject_votes_refuse() {
    let proposal = Proposal::init_contract();
    use VoteStatus::{Agree, Reject};

    assert_eq!(proposal.status(&[(0, Reject)]).unwrap(), MultiSignStatus::Processing);
    assert_eq!(proposal.status(&[(0, Reject), (1, Reject)]).unwrap(), MultiSignStatus::Refused);
    assert_eq!(
        proposal.status(&[(0, Agree), (1, Reject), (2, Reject)]).unwrap(),
        MultiSignStatus::Refused
    );
}

#[test]
fn test_duplicate_votes_count_once() {
    let proposal = Proposal::init_contract();
    use VoteStatus::Agree;

    assert_eq!(
        proposal.status(&[(0, Agree), (1, Agree), (1, Agree)]).unwrap(),
        MultiSignStatus::Processing
    );
}

#[test]
fn test_finished_proposal_rejected() {
    let proposal = Proposal::init_contract();
    let mut info = multi_sign_info(
        proposal.payload.clone(),
        &[(&proposal.admins[0], VoteStatus::Agree)],
    );
    info.status = MultiSignStatus::Passed;

    assert!(matches!(
        proposal
            .node
            .handle
            .provider
            .verify_multi_sign_tx_principal(&info, BLOCK_VERSION_2330),
        Err(AccessControlError::MultiSignFinished(MultiSignStatus::Passed))
    ));
}

#[test]
fn test_multi_sign_rule_support() {
    let proposal = Proposal::init_contract();
    let provider = &proposal.node.handle.provider;

    provider
        .is_rule_supported_by_multi_sign("CONTRACT_MANAGE-INIT_CONTRACT", BLOCK_VERSION_2330)
        .unwrap();
    assert!(matches!(
        provider.is_rule_supported_by_multi_sign("CHAIN_CONFIG-TRUST_ROOT_UPDATE", BLOCK_VERSION_2330),
        Err(AccessControlError::RuleNotSupportedByMultiSign { .. })
    ));
    assert!(matches!(
        provider.is_rule_supported_by_multi_sign("fact-save", BLOCK_VERSION_2330),
        Err(AccessControlError::Forbidden(_))
    ));
}
