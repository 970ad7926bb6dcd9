//! Event Attestation Engine
//!
//! Orchestrators report Ethereum events as claims. A claim only changes chain
//! state once validators holding the power threshold voted for exactly the
//! same content, and events are applied strictly in event-nonce order: a
//! quorum on nonce N+2 waits until N+1 is observed.

use std::collections::BTreeMap;

use cosmwasm_std::{
    coins, to_json_binary, to_json_vec, Addr, BankMsg, Binary, CosmosMsg, DepsMut, Env, Order,
    Reply, Response, StdResult, Storage, SubMsg, SubMsgResult, Uint128, Uint256, WasmMsg,
};
use cw20::Cw20ExecuteMsg;

use common::codec::invalidation_id_bytes;
use common::{keccak256, EthAddress, Valset, POWER_THRESHOLD};

use crate::batch::batch_executed;
use crate::error::ContractError;
use crate::hooks::is_hook_reply;
use crate::logic_call::logic_call_executed;
use crate::state::{
    last_observed_eth_height, last_observed_event_nonce, Attestation, AttestationStatus,
    ClaimKind, ConflictingVote, EthereumClaim, FailedCredit, LastObservedEthHeight, LocalToken,
    Params, PendingCredit, ATTESTATIONS, CONFLICTING_VOTES, ERC20_TO_LOCAL, FAILED_CREDITS,
    LAST_EVENT_NONCE_BY_VALIDATOR, LAST_OBSERVED_ETH_HEIGHT, LAST_OBSERVED_EVENT_NONCE,
    LOCAL_TO_ERC20, PENDING_CREDITS, VALSETS, VOTES,
};
use crate::valset::{normalized_bonded_power, observe_valset_update};

// ============================================================================
// Claims
// ============================================================================

/// Identity of a claim's content. The submitting orchestrator is not part of
/// it, so honest validators reporting the same event produce the same hash.
pub fn claim_hash(claim: &EthereumClaim) -> StdResult<[u8; 32]> {
    Ok(keccak256(&to_json_vec(claim)?))
}

/// Shape checks that do not depend on chain state.
pub fn validate_claim(claim: &EthereumClaim) -> Result<(), ContractError> {
    let invalid = |reason: &str| ContractError::InvalidClaim {
        reason: reason.to_string(),
    };
    if claim.event_nonce == 0 {
        return Err(invalid("event nonce starts at 1"));
    }
    // deposit credits reply under their event nonce
    if is_hook_reply(claim.event_nonce) {
        return Err(invalid("event nonce out of range"));
    }
    match &claim.kind {
        ClaimKind::SendToCosmos {
            cosmos_receiver, ..
        } if cosmos_receiver.is_empty() => Err(invalid("empty receiver")),
        ClaimKind::Erc20Deployed { cosmos_denom, .. } if cosmos_denom.is_empty() => {
            Err(invalid("empty denom"))
        }
        ClaimKind::LogicCallExecuted {
            invalidation_id, ..
        } => {
            invalidation_id_bytes(invalidation_id.as_slice())?;
            Ok(())
        }
        ClaimKind::ValsetUpdated { members, .. } => {
            let valset = Valset {
                nonce: 0,
                members: members.clone(),
                height: 0,
                reward_amount: Uint256::zero(),
                reward_token: None,
            };
            valset.validate().map_err(|e| invalid(&e.to_string()))
        }
        _ => Ok(()),
    }
}

/// What happened to a submitted vote.
#[derive(Debug, PartialEq)]
pub enum VoteOutcome {
    /// Counted towards the attestation of `hash`
    Counted { hash: [u8; 32], votes: usize },
    /// The validator already voted for different content at this nonce
    Conflicting { first_hash: Binary },
}

/// Record `validator`'s vote for `claim`.
///
/// Nonces at or below the last observed one are rejected. Higher nonces are
/// accepted even with gaps and wait for the tally to reach them.
pub fn submit_vote(
    storage: &mut dyn Storage,
    height: u64,
    validator: &Addr,
    claim: EthereumClaim,
) -> Result<VoteOutcome, ContractError> {
    let last = last_observed_event_nonce(storage)?;
    let nonce = claim.event_nonce;
    if nonce <= last {
        return Err(ContractError::InvalidNonce {
            expected: last + 1,
            got: nonce,
        });
    }

    let hash = claim_hash(&claim)?;
    if let Some(first_hash) = VOTES.may_load(storage, (nonce, validator))? {
        let conflict_key = (nonce, validator, hash.as_slice());
        let repeated = first_hash.as_slice() == hash.as_slice()
            || CONFLICTING_VOTES.has(storage, conflict_key);
        if repeated {
            return Err(ContractError::DuplicateVote {
                validator: validator.to_string(),
                event_nonce: nonce,
            });
        }
        CONFLICTING_VOTES.save(
            storage,
            conflict_key,
            &ConflictingVote {
                validator: validator.clone(),
                event_nonce: nonce,
                first_hash: first_hash.clone(),
                conflicting_hash: Binary::from(hash.to_vec()),
                height,
            },
        )?;
        return Ok(VoteOutcome::Conflicting { first_hash });
    }

    VOTES.save(storage, (nonce, validator), &Binary::from(hash.to_vec()))?;
    let mut attestation = ATTESTATIONS
        .may_load(storage, (nonce, hash.as_slice()))?
        .unwrap_or(Attestation {
            claim,
            claim_hash: Binary::from(hash.to_vec()),
            votes: vec![],
            status: AttestationStatus::Pending,
            height,
        });
    attestation.votes.push(validator.clone());
    ATTESTATIONS.save(storage, (nonce, hash.as_slice()), &attestation)?;

    let previous = LAST_EVENT_NONCE_BY_VALIDATOR
        .may_load(storage, validator)?
        .unwrap_or_default();
    if nonce > previous {
        LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, validator, &nonce)?;
    }

    Ok(VoteOutcome::Counted {
        hash,
        votes: attestation.votes.len(),
    })
}

pub fn attestations_at(storage: &dyn Storage, nonce: u64) -> StdResult<Vec<Attestation>> {
    ATTESTATIONS
        .prefix(nonce)
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, a)| a))
        .collect()
}

fn voted_power(powers: &BTreeMap<Addr, u64>, votes: &[Addr]) -> u64 {
    votes
        .iter()
        .filter_map(|v| powers.get(v))
        .fold(0u64, |acc, p| acc.saturating_add(*p))
}

// ============================================================================
// Tally
// ============================================================================

/// End-block step: observe and apply consecutive event nonces for as long as
/// one of their attestations holds quorum under current bonded power.
pub fn tally_attestations(
    mut deps: DepsMut,
    env: &Env,
    params: &Params,
) -> Result<Response, ContractError> {
    let powers = normalized_bonded_power(deps.storage)?;
    let mut response = Response::new();

    loop {
        let nonce = last_observed_event_nonce(deps.storage)? + 1;
        let Some(mut attestation) = attestations_at(deps.storage, nonce)?
            .into_iter()
            .find(|a| voted_power(&powers, &a.votes) >= POWER_THRESHOLD)
        else {
            break;
        };
        let key_hash = attestation.claim_hash.clone();

        attestation.status = AttestationStatus::Observed;
        ATTESTATIONS.save(deps.storage, (nonce, key_hash.as_slice()), &attestation)?;
        LAST_OBSERVED_EVENT_NONCE.save(deps.storage, &nonce)?;
        let eth_height = last_observed_eth_height(deps.storage)?.eth_height;
        if attestation.claim.eth_block_height > eth_height {
            LAST_OBSERVED_ETH_HEIGHT.save(
                deps.storage,
                &LastObservedEthHeight {
                    eth_height: attestation.claim.eth_block_height,
                    host_height: env.block.height,
                },
            )?;
        }

        let applied = apply_claim(deps.branch(), env, params, &attestation.claim)?;
        attestation.status = AttestationStatus::Applied;
        ATTESTATIONS.save(deps.storage, (nonce, key_hash.as_slice()), &attestation)?;

        response = response
            .add_attribute("observed_event_nonce", nonce.to_string())
            .add_attribute("observed_claim", attestation.claim.kind.as_str())
            .add_submessages(applied.messages)
            .add_attributes(applied.attributes)
            .add_events(applied.events);
    }

    Ok(response)
}

fn apply_claim(
    deps: DepsMut,
    env: &Env,
    params: &Params,
    claim: &EthereumClaim,
) -> Result<Response, ContractError> {
    match &claim.kind {
        ClaimKind::SendToCosmos {
            token_contract,
            amount,
            cosmos_receiver,
            ..
        } => credit_deposit(
            deps,
            claim.event_nonce,
            *token_contract,
            *amount,
            cosmos_receiver,
        ),
        ClaimKind::BatchSendToEth {
            batch_nonce,
            token_contract,
        } => {
            let executed = batch_executed(deps.storage, params, *token_contract, *batch_nonce)?;
            let mut response = Response::new()
                .add_attribute("batch_executed", batch_nonce.to_string())
                .add_attribute("batch_found", executed.batch.is_some().to_string());
            for nonce in executed.cancelled {
                response = response.add_attribute("batch_cancelled", nonce.to_string());
            }
            Ok(response)
        }
        ClaimKind::Erc20Deployed {
            cosmos_denom,
            token_contract,
            ..
        } => register_native_token(deps.storage, cosmos_denom, *token_contract),
        ClaimKind::LogicCallExecuted {
            invalidation_id,
            invalidation_nonce,
        } => {
            let removed = logic_call_executed(
                deps.storage,
                params,
                invalidation_id.as_slice(),
                *invalidation_nonce,
            )?;
            Ok(Response::new()
                .add_attribute("logic_call_executed", invalidation_nonce.to_string())
                .add_attribute("logic_calls_removed", removed.len().to_string()))
        }
        ClaimKind::ValsetUpdated {
            valset_nonce,
            members,
            reward_amount,
            reward_token,
        } => {
            let height = VALSETS
                .may_load(deps.storage, *valset_nonce)?
                .map(|v| v.height)
                .unwrap_or(env.block.height);
            let mismatch = observe_valset_update(
                deps.storage,
                Valset {
                    nonce: *valset_nonce,
                    members: members.clone(),
                    height,
                    reward_amount: *reward_amount,
                    reward_token: *reward_token,
                },
            )?;
            Ok(Response::new()
                .add_attribute("valset_observed", valset_nonce.to_string())
                .add_attribute("valset_mismatch", mismatch.to_string()))
        }
    }
}

/// Map a host-native denom to the ERC-20 deployed for it on Ethereum, unless
/// either side is already taken.
fn register_native_token(
    storage: &mut dyn Storage,
    denom: &str,
    token_contract: EthAddress,
) -> Result<Response, ContractError> {
    if ERC20_TO_LOCAL.has(storage, token_contract.as_bytes())
        || LOCAL_TO_ERC20.has(storage, denom)
    {
        return Ok(Response::new()
            .add_attribute("erc20_rejected", token_contract.to_string())
            .add_attribute("denom", denom));
    }
    ERC20_TO_LOCAL.save(
        storage,
        token_contract.as_bytes(),
        &LocalToken::Native {
            denom: denom.to_string(),
        },
    )?;
    LOCAL_TO_ERC20.save(storage, denom, &token_contract)?;
    Ok(Response::new()
        .add_attribute("erc20_registered", token_contract.to_string())
        .add_attribute("denom", denom))
}

// ============================================================================
// Deposits
// ============================================================================

/// Credit a deposit made on Ethereum. The transfer runs as a sub-message whose
/// failure is recorded instead of reverting the tally.
fn credit_deposit(
    deps: DepsMut,
    event_nonce: u64,
    token_contract: EthAddress,
    amount: Uint256,
    receiver: &str,
) -> Result<Response, ContractError> {
    let fail = |storage: &mut dyn Storage, reason: String| -> Result<Response, ContractError> {
        FAILED_CREDITS.save(
            storage,
            event_nonce,
            &FailedCredit {
                event_nonce,
                token_contract,
                receiver: receiver.to_string(),
                amount,
                reason: reason.clone(),
            },
        )?;
        Ok(Response::new()
            .add_attribute("credit_failed", event_nonce.to_string())
            .add_attribute("reason", reason))
    };

    let Some(token) = ERC20_TO_LOCAL.may_load(deps.storage, token_contract.as_bytes())? else {
        return fail(
            deps.storage,
            format!("token {} not registered", token_contract),
        );
    };
    let recipient = match deps.api.addr_validate(receiver) {
        Ok(addr) => addr,
        Err(e) => return fail(deps.storage, format!("invalid receiver: {}", e)),
    };
    let amount_128 = match Uint128::try_from(amount) {
        Ok(a) => a,
        Err(_) => return fail(deps.storage, "amount exceeds 128 bits".to_string()),
    };
    if amount_128.is_zero() {
        return fail(deps.storage, "zero amount".to_string());
    }

    let msg: CosmosMsg = match &token {
        LocalToken::Native { denom } => BankMsg::Send {
            to_address: recipient.to_string(),
            amount: coins(amount_128.u128(), denom),
        }
        .into(),
        LocalToken::Voucher { cw20 } => WasmMsg::Execute {
            contract_addr: cw20.to_string(),
            msg: to_json_binary(&Cw20ExecuteMsg::Mint {
                recipient: recipient.to_string(),
                amount: amount_128,
            })?,
            funds: vec![],
        }
        .into(),
    };

    PENDING_CREDITS.save(
        deps.storage,
        event_nonce,
        &PendingCredit {
            event_nonce,
            receiver: recipient.to_string(),
            token,
            amount: amount_128,
        },
    )?;

    Ok(Response::new()
        .add_submessage(SubMsg::reply_always(msg, event_nonce))
        .add_attribute("credit", event_nonce.to_string())
        .add_attribute("receiver", recipient)
        .add_attribute("amount", amount_128))
}

/// Reply for a deposit credit sub-message.
pub fn credit_reply(deps: DepsMut, reply: Reply) -> Result<Response, ContractError> {
    let pending = PENDING_CREDITS
        .may_load(deps.storage, reply.id)?
        .ok_or(ContractError::UnknownReply { id: reply.id })?;
    PENDING_CREDITS.remove(deps.storage, reply.id);

    match reply.result {
        SubMsgResult::Ok(_) => Ok(Response::new()
            .add_attribute("action", "credit_reply")
            .add_attribute("credited", pending.event_nonce.to_string())),
        SubMsgResult::Err(reason) => {
            let token_contract = LOCAL_TO_ERC20
                .may_load(deps.storage, pending.token.id())?
                .unwrap_or(EthAddress::ZERO);
            FAILED_CREDITS.save(
                deps.storage,
                pending.event_nonce,
                &FailedCredit {
                    event_nonce: pending.event_nonce,
                    token_contract,
                    receiver: pending.receiver,
                    amount: Uint256::from(pending.amount),
                    reason: reason.clone(),
                },
            )?;
            Ok(Response::new()
                .add_attribute("action", "credit_reply")
                .add_attribute("credit_failed", pending.event_nonce.to_string())
                .add_attribute("reason", reason))
        }
    }
}

// ============================================================================
// Maintenance
// ============================================================================

/// End-block step: forget attestations and votes below the last observed
/// nonce. Conflicting votes are kept as a record of misbehaviour.
pub fn prune_attestations(storage: &mut dyn Storage) -> StdResult<u64> {
    let last = last_observed_event_nonce(storage)?;
    let stale: Vec<(u64, Vec<u8>)> = ATTESTATIONS
        .keys(storage, None, None, Order::Ascending)
        .take_while(|k| k.as_ref().map(|(n, _)| *n < last).unwrap_or(true))
        .collect::<StdResult<_>>()?;
    for (nonce, hash) in &stale {
        ATTESTATIONS.remove(storage, (*nonce, hash.as_slice()));
    }
    let votes: Vec<(u64, Addr)> = VOTES
        .keys(storage, None, None, Order::Ascending)
        .take_while(|k| k.as_ref().map(|(n, _)| *n < last).unwrap_or(true))
        .collect::<StdResult<_>>()?;
    for (nonce, validator) in &votes {
        VOTES.remove(storage, (*nonce, validator));
    }
    Ok(stale.len() as u64)
}

/// Rewind the observed event nonce to `target` so events after it can be
/// attested again. Votes above `target` are discarded.
pub fn unhalt_bridge(storage: &mut dyn Storage, target: u64) -> Result<Response, ContractError> {
    let last = last_observed_event_nonce(storage)?;
    if target > last {
        return Err(ContractError::InvalidParams {
            reason: format!(
                "unhalt target {} is above the last observed nonce {}",
                target, last
            ),
        });
    }

    let above: Vec<(u64, Vec<u8>)> = ATTESTATIONS
        .keys(storage, None, None, Order::Ascending)
        .filter(|k| k.as_ref().map(|(n, _)| *n > target).unwrap_or(true))
        .collect::<StdResult<_>>()?;
    for (nonce, hash) in &above {
        ATTESTATIONS.remove(storage, (*nonce, hash.as_slice()));
    }
    let votes: Vec<(u64, Addr)> = VOTES
        .keys(storage, None, None, Order::Ascending)
        .filter(|k| k.as_ref().map(|(n, _)| *n > target).unwrap_or(true))
        .collect::<StdResult<_>>()?;
    for (nonce, validator) in &votes {
        VOTES.remove(storage, (*nonce, validator));
    }

    let clamped: Vec<Addr> = LAST_EVENT_NONCE_BY_VALIDATOR
        .range(storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok((validator, nonce)) if nonce > target => Some(Ok(validator)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect::<StdResult<_>>()?;
    for validator in &clamped {
        LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, validator, &target)?;
    }

    LAST_OBSERVED_EVENT_NONCE.save(storage, &target)?;
    Ok(Response::new()
        .add_attribute("unhalted_to", target.to_string())
        .add_attribute("attestations_removed", above.len().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::ValidatorPower;
    use crate::testing::{params, token};
    use crate::valset::update_bonded_validators;
    use cosmwasm_std::testing::{mock_dependencies, mock_env, MockApi, MockQuerier, MockStorage};
    use cosmwasm_std::{OwnedDeps, ReplyOn, SubMsgResponse};

    fn deposit(nonce: u64, amount: u64, receiver: &str) -> EthereumClaim {
        EthereumClaim {
            event_nonce: nonce,
            eth_block_height: 100 + nonce,
            kind: ClaimKind::SendToCosmos {
                token_contract: token(1),
                amount: Uint256::from(amount),
                ethereum_sender: token(2),
                cosmos_receiver: receiver.to_string(),
            },
        }
    }

    fn bonded_deps() -> OwnedDeps<MockStorage, MockApi, MockQuerier> {
        let mut deps = mock_dependencies();
        update_bonded_validators(
            &mut deps.storage,
            &deps.api,
            1,
            ["val1", "val2", "val3"]
                .iter()
                .map(|v| ValidatorPower {
                    operator: v.to_string(),
                    power: 10,
                })
                .collect(),
        )
        .unwrap();
        ERC20_TO_LOCAL
            .save(
                &mut deps.storage,
                token(1).as_bytes(),
                &LocalToken::Native {
                    denom: "ugrav".to_string(),
                },
            )
            .unwrap();
        LOCAL_TO_ERC20
            .save(&mut deps.storage, "ugrav", &token(1))
            .unwrap();
        deps
    }

    fn vote(storage: &mut dyn Storage, validator: &str, claim: EthereumClaim) -> VoteOutcome {
        submit_vote(storage, 1, &Addr::unchecked(validator), claim).unwrap()
    }

    #[test]
    fn test_claim_hash_ignores_submitter() {
        assert_eq!(
            claim_hash(&deposit(1, 5, "alice")).unwrap(),
            claim_hash(&deposit(1, 5, "alice")).unwrap()
        );
        assert_ne!(
            claim_hash(&deposit(1, 5, "alice")).unwrap(),
            claim_hash(&deposit(1, 6, "alice")).unwrap()
        );
    }

    #[test]
    fn test_duplicate_and_conflicting_votes() {
        let mut deps = mock_dependencies();
        vote(deps.as_mut().storage, "val1", deposit(1, 5, "alice"));

        let err = submit_vote(
            deps.as_mut().storage,
            1,
            &Addr::unchecked("val1"),
            deposit(1, 5, "alice"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::DuplicateVote {
                validator: "val1".to_string(),
                event_nonce: 1
            }
        );

        let outcome = vote(deps.as_mut().storage, "val1", deposit(1, 6, "alice"));
        assert!(matches!(outcome, VoteOutcome::Conflicting { .. }));
        let val1 = Addr::unchecked("val1");
        let second = claim_hash(&deposit(1, 6, "alice")).unwrap();
        assert!(CONFLICTING_VOTES.has(deps.as_ref().storage, (1, &val1, second.as_slice())));

        // a third claim is kept next to the second
        let outcome = vote(deps.as_mut().storage, "val1", deposit(1, 7, "alice"));
        assert!(matches!(outcome, VoteOutcome::Conflicting { .. }));
        let third = claim_hash(&deposit(1, 7, "alice")).unwrap();
        assert!(CONFLICTING_VOTES.has(deps.as_ref().storage, (1, &val1, second.as_slice())));
        assert!(CONFLICTING_VOTES.has(deps.as_ref().storage, (1, &val1, third.as_slice())));

        // repeating a recorded conflict is a duplicate
        let err =
            submit_vote(deps.as_mut().storage, 1, &val1, deposit(1, 7, "alice")).unwrap_err();
        assert!(matches!(err, ContractError::DuplicateVote { .. }));

        // the conflicting claim is not counted anywhere
        let atts = attestations_at(deps.as_ref().storage, 1).unwrap();
        assert_eq!(atts.len(), 1);
        assert_eq!(atts[0].votes, vec![Addr::unchecked("val1")]);
    }

    #[test]
    fn test_quorum_observes_and_credits() {
        let mut deps = bonded_deps();
        let env = mock_env();
        let params = params();

        vote(deps.as_mut().storage, "val1", deposit(1, 5, "alice"));
        let res = tally_attestations(deps.as_mut(), &env, &params).unwrap();
        assert!(res.messages.is_empty());
        assert_eq!(last_observed_event_nonce(deps.as_ref().storage).unwrap(), 0);

        // two of three equal validators reach exactly the threshold
        vote(deps.as_mut().storage, "val2", deposit(1, 5, "alice"));
        let res = tally_attestations(deps.as_mut(), &env, &params).unwrap();
        assert_eq!(last_observed_event_nonce(deps.as_ref().storage).unwrap(), 1);
        assert_eq!(res.messages.len(), 1);
        assert_eq!(res.messages[0].id, 1);
        assert_eq!(
            res.messages[0].msg,
            CosmosMsg::Bank(BankMsg::Send {
                to_address: "alice".to_string(),
                amount: coins(5, "ugrav"),
            })
        );
        let observed = last_observed_eth_height(deps.as_ref().storage).unwrap();
        assert_eq!(observed.eth_height, 101);
        assert_eq!(observed.host_height, env.block.height);

        let atts = attestations_at(deps.as_ref().storage, 1).unwrap();
        assert_eq!(atts[0].status, AttestationStatus::Applied);

        // late vote for an applied nonce is refused
        let err = submit_vote(
            deps.as_mut().storage,
            1,
            &Addr::unchecked("val3"),
            deposit(1, 5, "alice"),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::InvalidNonce { expected: 2, got: 1 });
    }

    #[test]
    fn test_out_of_order_nonce_is_buffered() {
        let mut deps = bonded_deps();
        let env = mock_env();
        let params = params();

        for v in ["val1", "val2"] {
            vote(deps.as_mut().storage, v, deposit(2, 7, "bob"));
        }
        tally_attestations(deps.as_mut(), &env, &params).unwrap();
        assert_eq!(last_observed_event_nonce(deps.as_ref().storage).unwrap(), 0);

        for v in ["val1", "val3"] {
            vote(deps.as_mut().storage, v, deposit(1, 5, "alice"));
        }
        let res = tally_attestations(deps.as_mut(), &env, &params).unwrap();
        assert_eq!(last_observed_event_nonce(deps.as_ref().storage).unwrap(), 2);
        let ids: Vec<u64> = res.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_unregistered_token_recorded_as_failed() {
        let mut deps = bonded_deps();
        let env = mock_env();
        let mut claim = deposit(1, 5, "alice");
        if let ClaimKind::SendToCosmos { token_contract, .. } = &mut claim.kind {
            *token_contract = token(9);
        }
        for v in ["val1", "val2"] {
            vote(deps.as_mut().storage, v, claim.clone());
        }
        let res = tally_attestations(deps.as_mut(), &env, &params()).unwrap();
        assert!(res.messages.is_empty());
        assert_eq!(last_observed_event_nonce(deps.as_ref().storage).unwrap(), 1);
        let failed = FAILED_CREDITS.load(deps.as_ref().storage, 1).unwrap();
        assert_eq!(failed.token_contract, token(9));
    }

    #[test]
    fn test_credit_reply_records_failure() {
        let mut deps = bonded_deps();
        let env = mock_env();
        for v in ["val1", "val2"] {
            vote(deps.as_mut().storage, v, deposit(1, 5, "alice"));
        }
        tally_attestations(deps.as_mut(), &env, &params()).unwrap();
        assert!(PENDING_CREDITS.has(deps.as_ref().storage, 1));

        credit_reply(
            deps.as_mut(),
            Reply {
                id: 1,
                result: SubMsgResult::Err("insufficient funds".to_string()),
            },
        )
        .unwrap();
        assert!(!PENDING_CREDITS.has(deps.as_ref().storage, 1));
        let failed = FAILED_CREDITS.load(deps.as_ref().storage, 1).unwrap();
        assert_eq!(failed.reason, "insufficient funds");
        assert_eq!(failed.token_contract, token(1));

        let err = credit_reply(
            deps.as_mut(),
            Reply {
                id: 1,
                result: SubMsgResult::Ok(SubMsgResponse {
                    events: vec![],
                    data: None,
                }),
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::UnknownReply { id: 1 });
    }

    #[test]
    fn test_credit_reply_success_clears_pending() {
        let mut deps = bonded_deps();
        let env = mock_env();
        for v in ["val1", "val2"] {
            vote(deps.as_mut().storage, v, deposit(1, 5, "alice"));
        }
        let res = tally_attestations(deps.as_mut(), &env, &params()).unwrap();
        // the success reply is what clears the pending record
        assert_eq!(res.messages[0].reply_on, ReplyOn::Always);

        let res = credit_reply(
            deps.as_mut(),
            Reply {
                id: 1,
                result: SubMsgResult::Ok(SubMsgResponse {
                    events: vec![],
                    data: None,
                }),
            },
        )
        .unwrap();
        assert_eq!(res.attributes[1].value, "1");
        assert!(!PENDING_CREDITS.has(deps.as_ref().storage, 1));
        assert!(!FAILED_CREDITS.has(deps.as_ref().storage, 1));
    }

    #[test]
    fn test_erc20_deployed_registers_once() {
        let mut deps = mock_dependencies();
        register_native_token(deps.as_mut().storage, "ustake", token(5)).unwrap();
        assert_eq!(
            LOCAL_TO_ERC20.load(deps.as_ref().storage, "ustake").unwrap(),
            token(5)
        );
        let res = register_native_token(deps.as_mut().storage, "ustake", token(6)).unwrap();
        assert_eq!(res.attributes[0].key, "erc20_rejected");
        assert!(!ERC20_TO_LOCAL.has(deps.as_ref().storage, token(6).as_bytes()));
    }

    #[test]
    fn test_unhalt_rewinds() {
        let mut deps = bonded_deps();
        let env = mock_env();
        for nonce in 1..=3 {
            for v in ["val1", "val2"] {
                vote(deps.as_mut().storage, v, deposit(nonce, 5, "alice"));
            }
        }
        tally_attestations(deps.as_mut(), &env, &params()).unwrap();
        assert_eq!(last_observed_event_nonce(deps.as_ref().storage).unwrap(), 3);

        let err = unhalt_bridge(deps.as_mut().storage, 4).unwrap_err();
        assert!(matches!(err, ContractError::InvalidParams { .. }));

        unhalt_bridge(deps.as_mut().storage, 1).unwrap();
        assert_eq!(last_observed_event_nonce(deps.as_ref().storage).unwrap(), 1);
        assert!(attestations_at(deps.as_ref().storage, 2).unwrap().is_empty());
        assert_eq!(
            LAST_EVENT_NONCE_BY_VALIDATOR
                .load(deps.as_ref().storage, &Addr::unchecked("val1"))
                .unwrap(),
            1
        );
        // nonce 2 can be voted on again
        vote(deps.as_mut().storage, "val1", deposit(2, 5, "alice"));
    }

    #[test]
    fn test_prune_keeps_last_observed() {
        let mut deps = bonded_deps();
        let env = mock_env();
        for nonce in 1..=3 {
            for v in ["val1", "val2"] {
                vote(deps.as_mut().storage, v, deposit(nonce, 5, "alice"));
            }
        }
        tally_attestations(deps.as_mut(), &env, &params()).unwrap();
        let pruned = prune_attestations(deps.as_mut().storage).unwrap();
        assert_eq!(pruned, 2);
        assert_eq!(attestations_at(deps.as_ref().storage, 3).unwrap().len(), 1);
        assert!(!VOTES.has(deps.as_ref().storage, (1, &Addr::unchecked("val1"))));
    }

    #[test]
    fn test_validate_claim() {
        assert!(validate_claim(&deposit(1, 5, "alice")).is_ok());
        assert!(matches!(
            validate_claim(&deposit(0, 5, "alice")),
            Err(ContractError::InvalidClaim { .. })
        ));
        assert!(matches!(
            validate_claim(&deposit(crate::hooks::HOOK_REPLY_ID_BASE, 5, "alice")),
            Err(ContractError::InvalidClaim { .. })
        ));
        let bad_id = EthereumClaim {
            event_nonce: 1,
            eth_block_height: 1,
            kind: ClaimKind::LogicCallExecuted {
                invalidation_id: Binary::from(vec![1; 5]),
                invalidation_nonce: 1,
            },
        };
        assert!(matches!(
            validate_claim(&bad_id),
            Err(ContractError::Codec(_))
        ));
    }
}
