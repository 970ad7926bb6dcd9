//! Event attestation: quorum, ordering, duplicate and conflicting votes,
//! failed credits and the unhalt proposal.

mod suite;

use cosmwasm_std::Addr;

use gravity::msg::{
    ConflictingVotesResponse, ExecuteMsg, GovProposal, GravityHookMsg, ParamsUpdate, QueryMsg,
};
use gravity::state::{EthereumClaim, FailedCredit};

use suite::{attr, deposit, token, Suite};

fn last_observed(suite: &Suite) -> u64 {
    suite.query(&QueryMsg::LastObservedEventNonce {})
}

fn submit(suite: &mut Suite, voter: usize, claim: EthereumClaim) -> anyhow::Result<cw_multi_test::AppResponse> {
    let orchestrator = suite.validators[voter].orchestrator.clone();
    suite.execute(&orchestrator, &ExecuteMsg::SubmitClaim { claim })
}

#[test]
fn test_quorum_requires_two_thirds() {
    let mut suite = Suite::new();
    let weth = suite.deploy_voucher(token(2));

    suite.attest(&[0, 1], 1, 20, deposit(token(2), 100, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 0);

    suite.attest(&[2], 1, 20, deposit(token(2), 100, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 1);
    assert_eq!(suite.cw20_balance(&weth, &Addr::unchecked("receiver")), 100);

    // a late vote for an observed nonce is refused
    let err = submit(
        &mut suite,
        3,
        EthereumClaim {
            event_nonce: 1,
            eth_block_height: 20,
            kind: deposit(token(2), 100, "receiver"),
        },
    )
    .unwrap_err();
    assert!(err.root_cause().to_string().contains("Invalid nonce"));
}

#[test]
fn test_weighted_power_decides_quorum() {
    // one validator alone holds more than two thirds
    let mut suite = Suite::with_powers(&[70, 10, 10, 10]);
    let weth = suite.deploy_voucher(token(2));

    suite.attest(&[1, 2, 3], 1, 20, deposit(token(2), 5, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 0);

    suite.attest(&[0], 1, 20, deposit(token(2), 5, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 1);
    assert_eq!(suite.cw20_balance(&weth, &Addr::unchecked("receiver")), 5);
}

#[test]
fn test_out_of_order_events_are_buffered() {
    let mut suite = Suite::new();
    let weth = suite.deploy_voucher(token(2));

    suite.attest(&[0, 1, 2], 2, 21, deposit(token(2), 20, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 0);
    assert_eq!(suite.cw20_balance(&weth, &Addr::unchecked("receiver")), 0);

    suite.attest(&[0, 1, 2], 1, 20, deposit(token(2), 10, "receiver"));
    let res = suite.end_block();
    assert_eq!(attr(&res, "observed_event_nonce"), Some("1"));
    assert_eq!(last_observed(&suite), 2);
    assert_eq!(suite.cw20_balance(&weth, &Addr::unchecked("receiver")), 30);
}

#[test]
fn test_duplicate_vote_rejected() {
    let mut suite = Suite::new();
    let claim = EthereumClaim {
        event_nonce: 1,
        eth_block_height: 20,
        kind: deposit(token(2), 100, "receiver"),
    };
    submit(&mut suite, 0, claim.clone()).unwrap();
    let err = submit(&mut suite, 0, claim).unwrap_err();
    assert!(err.root_cause().to_string().contains("Duplicate vote"));
}

#[test]
fn test_claim_checks() {
    let mut suite = Suite::new();

    let user = suite.user.clone();
    let err = suite
        .execute(
            &user,
            &ExecuteMsg::SubmitClaim {
                claim: EthereumClaim {
                    event_nonce: 1,
                    eth_block_height: 20,
                    kind: deposit(token(2), 100, "receiver"),
                },
            },
        )
        .unwrap_err();
    assert!(err
        .root_cause()
        .to_string()
        .contains("is not a registered orchestrator"));

    let err = submit(
        &mut suite,
        0,
        EthereumClaim {
            event_nonce: 0,
            eth_block_height: 20,
            kind: deposit(token(2), 100, "receiver"),
        },
    )
    .unwrap_err();
    assert!(err.root_cause().to_string().contains("Invalid claim"));

    let err = submit(
        &mut suite,
        0,
        EthereumClaim {
            event_nonce: 1,
            eth_block_height: 20,
            kind: deposit(token(2), 100, ""),
        },
    )
    .unwrap_err();
    assert!(err.root_cause().to_string().contains("empty receiver"));
}

#[test]
fn test_conflicting_vote_reported() {
    let mut suite = Suite::new();
    submit(
        &mut suite,
        0,
        EthereumClaim {
            event_nonce: 1,
            eth_block_height: 20,
            kind: deposit(token(2), 100, "receiver"),
        },
    )
    .unwrap();
    let res = submit(
        &mut suite,
        0,
        EthereumClaim {
            event_nonce: 1,
            eth_block_height: 20,
            kind: deposit(token(2), 999, "receiver"),
        },
    )
    .unwrap();
    assert_eq!(attr(&res, "conflicting"), Some("true"));

    let conflicts: ConflictingVotesResponse =
        suite.query(&QueryMsg::ConflictingVotes { event_nonce: 1 });
    assert_eq!(conflicts.votes.len(), 1);
    assert_eq!(conflicts.votes[0].validator, Addr::unchecked("val0"));
    assert_ne!(conflicts.votes[0].first_hash, conflicts.votes[0].conflicting_hash);

    // another different claim adds a record instead of replacing the first
    submit(
        &mut suite,
        0,
        EthereumClaim {
            event_nonce: 1,
            eth_block_height: 20,
            kind: deposit(token(2), 7, "receiver"),
        },
    )
    .unwrap();
    let conflicts: ConflictingVotesResponse =
        suite.query(&QueryMsg::ConflictingVotes { event_nonce: 1 });
    assert_eq!(conflicts.votes.len(), 2);
    assert_eq!(conflicts.votes[0].first_hash, conflicts.votes[1].first_hash);
    assert_ne!(
        conflicts.votes[0].conflicting_hash,
        conflicts.votes[1].conflicting_hash
    );

    let reported = suite
        .hook_calls()
        .into_iter()
        .filter(|call| {
            call == &GravityHookMsg::ConflictingClaim {
                validator: "val0".to_string(),
                event_nonce: 1,
            }
        })
        .count();
    assert_eq!(reported, 2);
}

#[test]
fn test_failing_hook_does_not_halt_end_block() {
    let mut suite = Suite::new();
    let hook = suite.hook.to_string();
    suite
        .proposal(GovProposal::UpdateParams(ParamsUpdate {
            hooks: Some(vec!["not_a_contract".to_string(), hook]),
            ..Default::default()
        }))
        .unwrap();
    let weth = suite.deploy_voucher(token(2));

    suite.attest(&[0, 1, 2], 1, 20, deposit(token(2), 100, "receiver"));
    let res = suite.end_block();
    assert_eq!(last_observed(&suite), 1);
    assert_eq!(suite.cw20_balance(&weth, &Addr::unchecked("receiver")), 100);
    assert_eq!(attr(&res, "valset_created"), Some("1"));
    assert_eq!(attr(&res, "hook"), Some("not_a_contract"));

    // the working hook after the broken one is still notified
    assert!(suite
        .hook_calls()
        .iter()
        .any(|c| matches!(c, GravityHookMsg::ValsetCreated { nonce: 1, .. })));
}

#[test]
fn test_failed_native_credit_is_recorded() {
    let mut suite = Suite::new();
    suite.register_native(1, token(1));

    // nothing locked yet, so the unlock cannot be paid
    suite.attest(&[0, 1, 2], 2, 20, deposit(token(1), 500, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 2);
    assert_eq!(suite.native_balance(&Addr::unchecked("receiver")), 0);

    let failed: Option<FailedCredit> = suite.query(&QueryMsg::FailedCredit { event_nonce: 2 });
    let failed = failed.unwrap();
    assert_eq!(failed.receiver, "receiver");
    assert_eq!(failed.token_contract, token(1));
}

#[test]
fn test_unregistered_token_credit_is_recorded() {
    let mut suite = Suite::new();
    suite.attest(&[0, 1, 2], 1, 20, deposit(token(9), 500, "receiver"));
    let res = suite.end_block();
    assert_eq!(attr(&res, "credit_failed"), Some("1"));

    let failed: Option<FailedCredit> = suite.query(&QueryMsg::FailedCredit { event_nonce: 1 });
    assert!(failed.unwrap().reason.contains("not registered"));
    assert_eq!(last_observed(&suite), 1);
}

#[test]
fn test_unhalt_allows_reattestation() {
    let mut suite = Suite::new();
    let weth = suite.deploy_voucher(token(2));

    suite.attest(&[0, 1, 2], 1, 20, deposit(token(2), 100, "receiver"));
    suite.attest(&[0, 1, 2], 2, 21, deposit(token(2), 100, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 2);

    let err = suite
        .proposal(GovProposal::UnhaltBridge { target_nonce: 5 })
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("unhalt target"));

    let res = suite
        .proposal(GovProposal::UnhaltBridge { target_nonce: 1 })
        .unwrap();
    assert_eq!(attr(&res, "unhalted_to"), Some("1"));
    assert_eq!(last_observed(&suite), 1);
    let nonce: u64 = suite.query(&QueryMsg::LastEventNonce {
        orchestrator: suite.validators[0].orchestrator.to_string(),
    });
    assert_eq!(nonce, 1);

    suite.attest(&[0, 1, 2], 2, 21, deposit(token(2), 100, "receiver"));
    suite.end_block();
    assert_eq!(last_observed(&suite), 2);
    assert_eq!(suite.cw20_balance(&weth, &Addr::unchecked("receiver")), 300);
}
