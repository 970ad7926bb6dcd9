//! Query handlers for the Gravity bridge contract.
//!
//! Orchestrators poll the `Pending*Requests` queries for artifacts they still
//! have to sign; relayers read `SignatureBundle` to assemble submissions.

use std::collections::BTreeMap;

use cosmwasm_std::{Addr, Binary, Deps, Env, Order, StdError, StdResult, Uint256};
use cw_storage_plus::Bound;

use common::codec::invalidation_id_bytes;
use common::{
    batch_checkpoint, valset_checkpoint, EthAddress, OutgoingLogicCall, OutgoingTxBatch, Valset,
};

use crate::attestation::attestations_at;
use crate::batch::all_batches;
use crate::confirm::{confirmations_for, has_confirmed, signature_bundle};
use crate::logic_call::{all_logic_calls, call_checkpoint};
use crate::msg::{
    AttestationsResponse, BatchFee, BatchFeesResponse, BatchesResponse, ConfirmationsResponse,
    ConflictingVotesResponse, LogicCallsResponse, PendingSendToEthResponse,
    SignatureBundleResponse, ValsetResponse, ValsetsResponse,
};
use crate::state::{
    last_observed_event_nonce, validator_for_orchestrator, DelegateKeys, FailedCredit, LocalToken,
    Params, BATCHES, CONFLICTING_VOTES, DELEGATE_KEYS, ERC20_TO_LOCAL, FAILED_CREDITS,
    LAST_EVENT_NONCE_BY_VALIDATOR, LAST_OBSERVED_VALSET, LOCAL_TO_ERC20, LOGIC_CALLS, PARAMS,
    PAST_CHECKPOINTS, UNBATCHED_TXS, VALSETS,
};
use crate::valset::current_valset;

/// Default page size for list queries
const DEFAULT_LIMIT: u32 = 10;
/// Maximum page size for list queries
const MAX_LIMIT: u32 = 30;

fn page_size(limit: Option<u32>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize
}

fn bytes32(bytes: &Binary) -> StdResult<[u8; 32]> {
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| StdError::generic_err(format!("expected 32 bytes, got {}", bytes.len())))
}

fn checkpoint_of_valset(params: &Params, valset: &Valset) -> StdResult<Binary> {
    Ok(Binary::from(
        valset_checkpoint(&params.gravity_id_bytes()?, valset).to_vec(),
    ))
}

fn orchestrator_validator(deps: Deps, orchestrator: &str) -> StdResult<Addr> {
    let orchestrator = deps.api.addr_validate(orchestrator)?;
    validator_for_orchestrator(deps.storage, &orchestrator)?
        .map(|keys| keys.validator)
        .ok_or_else(|| StdError::not_found(format!("orchestrator {}", orchestrator)))
}

// ============================================================================
// Valsets
// ============================================================================

pub fn query_params(deps: Deps) -> StdResult<Params> {
    PARAMS.load(deps.storage)
}

/// The valset this chain would store if one were created now.
pub fn query_current_valset(deps: Deps, env: Env) -> StdResult<ValsetResponse> {
    let params = PARAMS.load(deps.storage)?;
    let valset = current_valset(deps.storage, &params, env.block.height)?;
    Ok(ValsetResponse {
        checkpoint: Some(checkpoint_of_valset(&params, &valset)?),
        valset: Some(valset),
    })
}

pub fn query_valset(deps: Deps, nonce: u64) -> StdResult<ValsetResponse> {
    let params = PARAMS.load(deps.storage)?;
    match VALSETS.may_load(deps.storage, nonce)? {
        Some(valset) => Ok(ValsetResponse {
            checkpoint: Some(checkpoint_of_valset(&params, &valset)?),
            valset: Some(valset),
        }),
        None => Ok(ValsetResponse {
            valset: None,
            checkpoint: None,
        }),
    }
}

/// Newest valsets first.
pub fn query_latest_valsets(deps: Deps, limit: Option<u32>) -> StdResult<ValsetsResponse> {
    let valsets = VALSETS
        .range(deps.storage, None, None, Order::Descending)
        .take(page_size(limit))
        .map(|item| item.map(|(_, v)| v))
        .collect::<StdResult<_>>()?;
    Ok(ValsetsResponse { valsets })
}

pub fn query_last_observed_valset(deps: Deps) -> StdResult<Option<Valset>> {
    LAST_OBSERVED_VALSET.may_load(deps.storage)
}

pub fn query_valset_confirms(deps: Deps, nonce: u64) -> StdResult<ConfirmationsResponse> {
    let params = PARAMS.load(deps.storage)?;
    let confirmations = match VALSETS.may_load(deps.storage, nonce)? {
        Some(valset) => {
            let checkpoint = valset_checkpoint(&params.gravity_id_bytes()?, &valset);
            confirmations_for(deps.storage, &checkpoint)?
        }
        None => vec![],
    };
    Ok(ConfirmationsResponse { confirmations })
}

/// Stored valsets the orchestrator's validator has not signed, oldest first.
pub fn query_pending_valset_requests(
    deps: Deps,
    orchestrator: String,
) -> StdResult<ValsetsResponse> {
    let validator = orchestrator_validator(deps, &orchestrator)?;
    let gravity_id = PARAMS.load(deps.storage)?.gravity_id_bytes()?;

    let mut valsets = vec![];
    for item in VALSETS.range(deps.storage, None, None, Order::Ascending) {
        let (_, valset) = item?;
        let checkpoint = valset_checkpoint(&gravity_id, &valset);
        if !has_confirmed(deps.storage, &checkpoint, &validator) {
            valsets.push(valset);
        }
    }
    Ok(ValsetsResponse { valsets })
}

// ============================================================================
// Batches
// ============================================================================

pub fn query_outgoing_tx_batches(
    deps: Deps,
    start_after: Option<(EthAddress, u64)>,
    limit: Option<u32>,
) -> StdResult<BatchesResponse> {
    let start_key = start_after.map(|(token, nonce)| (*token.as_bytes(), nonce));
    let start = start_key
        .as_ref()
        .map(|(token, nonce)| Bound::exclusive((token.as_slice(), *nonce)));

    let batches = BATCHES
        .range(deps.storage, start, None, Order::Ascending)
        .take(page_size(limit))
        .map(|item| item.map(|(_, b)| b))
        .collect::<StdResult<_>>()?;
    Ok(BatchesResponse { batches })
}

pub fn query_batch(
    deps: Deps,
    token_contract: EthAddress,
    nonce: u64,
) -> StdResult<Option<OutgoingTxBatch>> {
    BATCHES.may_load(deps.storage, (token_contract.as_bytes().as_slice(), nonce))
}

pub fn query_batch_confirms(
    deps: Deps,
    token_contract: EthAddress,
    nonce: u64,
) -> StdResult<ConfirmationsResponse> {
    let params = PARAMS.load(deps.storage)?;
    let confirmations = match query_batch(deps, token_contract, nonce)? {
        Some(batch) => {
            let checkpoint = batch_checkpoint(&params.gravity_id_bytes()?, &batch);
            confirmations_for(deps.storage, &checkpoint)?
        }
        None => vec![],
    };
    Ok(ConfirmationsResponse { confirmations })
}

pub fn query_pending_batch_requests(
    deps: Deps,
    orchestrator: String,
) -> StdResult<BatchesResponse> {
    let validator = orchestrator_validator(deps, &orchestrator)?;
    let gravity_id = PARAMS.load(deps.storage)?.gravity_id_bytes()?;

    let batches = all_batches(deps.storage)?
        .into_iter()
        .filter(|batch| {
            let checkpoint = batch_checkpoint(&gravity_id, batch);
            !has_confirmed(deps.storage, &checkpoint, &validator)
        })
        .collect();
    Ok(BatchesResponse { batches })
}

/// The sender's transfers, both waiting in the pool and already batched.
pub fn query_pending_send_to_eth(
    deps: Deps,
    sender: String,
) -> StdResult<PendingSendToEthResponse> {
    let sender = deps.api.addr_validate(&sender)?;

    let unbatched = UNBATCHED_TXS
        .range(deps.storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok((_, tx)) if tx.sender == sender.as_str() => Some(Ok(tx)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect::<StdResult<_>>()?;
    let batched = all_batches(deps.storage)?
        .into_iter()
        .flat_map(|batch| batch.transactions)
        .filter(|tx| tx.sender == sender.as_str())
        .collect();

    Ok(PendingSendToEthResponse {
        unbatched,
        batched,
    })
}

/// Fees a relayer would collect by batching the whole pool, per token.
pub fn query_batch_fees(deps: Deps) -> StdResult<BatchFeesResponse> {
    let mut totals: BTreeMap<EthAddress, (Uint256, u64)> = BTreeMap::new();
    for item in UNBATCHED_TXS.range(deps.storage, None, None, Order::Ascending) {
        let (_, tx) = item?;
        let entry = totals
            .entry(tx.erc20_token.contract)
            .or_insert((Uint256::zero(), 0));
        entry.0 += tx.erc20_fee.amount;
        entry.1 += 1;
    }

    let fees = totals
        .into_iter()
        .map(|(token_contract, (total_fees, tx_count))| BatchFee {
            token_contract,
            total_fees,
            tx_count,
        })
        .collect();
    Ok(BatchFeesResponse { fees })
}

// ============================================================================
// Logic Calls
// ============================================================================

pub fn query_outgoing_logic_calls(
    deps: Deps,
    start_after: Option<(Binary, u64)>,
    limit: Option<u32>,
) -> StdResult<LogicCallsResponse> {
    let start = start_after
        .as_ref()
        .map(|(id, nonce)| Bound::exclusive((id.as_slice(), *nonce)));

    let calls = LOGIC_CALLS
        .range(deps.storage, start, None, Order::Ascending)
        .take(page_size(limit))
        .map(|item| item.map(|(_, c)| c))
        .collect::<StdResult<_>>()?;
    Ok(LogicCallsResponse { calls })
}

pub fn query_logic_call(
    deps: Deps,
    invalidation_id: Binary,
    invalidation_nonce: u64,
) -> StdResult<Option<OutgoingLogicCall>> {
    let id = invalidation_id_bytes(invalidation_id.as_slice())
        .map_err(|e| StdError::generic_err(e.to_string()))?;
    LOGIC_CALLS.may_load(deps.storage, (id.as_slice(), invalidation_nonce))
}

pub fn query_logic_confirms(
    deps: Deps,
    invalidation_id: Binary,
    invalidation_nonce: u64,
) -> StdResult<ConfirmationsResponse> {
    let params = PARAMS.load(deps.storage)?;
    let confirmations = match query_logic_call(deps, invalidation_id, invalidation_nonce)? {
        Some(call) => {
            let checkpoint = call_checkpoint(&params.gravity_id_bytes()?, &call)?;
            confirmations_for(deps.storage, &checkpoint)?
        }
        None => vec![],
    };
    Ok(ConfirmationsResponse { confirmations })
}

pub fn query_pending_logic_call_requests(
    deps: Deps,
    orchestrator: String,
) -> StdResult<LogicCallsResponse> {
    let validator = orchestrator_validator(deps, &orchestrator)?;
    let gravity_id = PARAMS.load(deps.storage)?.gravity_id_bytes()?;

    let mut calls = vec![];
    for call in all_logic_calls(deps.storage)? {
        let checkpoint = call_checkpoint(&gravity_id, &call)?;
        if !has_confirmed(deps.storage, &checkpoint, &validator) {
            calls.push(call);
        }
    }
    Ok(LogicCallsResponse { calls })
}

// ============================================================================
// Attestations
// ============================================================================

/// Highest event nonce the orchestrator's validator voted on. A validator
/// that never voted starts from the last observed nonce.
pub fn query_last_event_nonce(deps: Deps, orchestrator: String) -> StdResult<u64> {
    let validator = orchestrator_validator(deps, &orchestrator)?;
    match LAST_EVENT_NONCE_BY_VALIDATOR.may_load(deps.storage, &validator)? {
        Some(nonce) => Ok(nonce),
        None => last_observed_event_nonce(deps.storage),
    }
}

pub fn query_last_observed_event_nonce(deps: Deps) -> StdResult<u64> {
    last_observed_event_nonce(deps.storage)
}

pub fn query_attestations(deps: Deps, event_nonce: u64) -> StdResult<AttestationsResponse> {
    Ok(AttestationsResponse {
        attestations: attestations_at(deps.storage, event_nonce)?,
    })
}

pub fn query_conflicting_votes(
    deps: Deps,
    event_nonce: u64,
) -> StdResult<ConflictingVotesResponse> {
    let votes = CONFLICTING_VOTES
        .sub_prefix(event_nonce)
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, v)| v))
        .collect::<StdResult<_>>()?;
    Ok(ConflictingVotesResponse { votes })
}

pub fn query_failed_credit(deps: Deps, event_nonce: u64) -> StdResult<Option<FailedCredit>> {
    FAILED_CREDITS.may_load(deps.storage, event_nonce)
}

// ============================================================================
// Keys & Tokens
// ============================================================================

pub fn query_delegate_keys(deps: Deps, validator: String) -> StdResult<Option<DelegateKeys>> {
    let validator = deps.api.addr_validate(&validator)?;
    DELEGATE_KEYS.may_load(deps.storage, &validator)
}

pub fn query_erc20_to_denom(deps: Deps, erc20: EthAddress) -> StdResult<Option<LocalToken>> {
    ERC20_TO_LOCAL.may_load(deps.storage, erc20.as_bytes())
}

pub fn query_denom_to_erc20(deps: Deps, denom: String) -> StdResult<Option<EthAddress>> {
    LOCAL_TO_ERC20.may_load(deps.storage, &denom)
}

// ============================================================================
// Relaying
// ============================================================================

pub fn query_signature_bundle(
    deps: Deps,
    checkpoint: Binary,
) -> StdResult<SignatureBundleResponse> {
    let params = PARAMS.load(deps.storage)?;
    signature_bundle(deps.storage, deps.api, &params, &bytes32(&checkpoint)?)
}

pub fn query_checkpoint_seen(deps: Deps, checkpoint: Binary) -> StdResult<bool> {
    Ok(PAST_CHECKPOINTS.has(deps.storage, checkpoint.as_slice()))
}
