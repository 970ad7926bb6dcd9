//! Liveness/Slashing Hook
//!
//! Misbehaviour is detected here and reported to the hook contracts; this
//! contract never moves stake itself. Two kinds are reported: a bonded
//! validator that let a signing window close without confirming, and a
//! validator key that signed a checkpoint this chain never produced.

use cosmwasm_std::{Addr, Api, Binary, Env, Order, StdResult, Storage};

use common::{
    batch_checkpoint, bytes32_to_hex, eth_signed_message_hash, keccak256, valset_checkpoint,
    ApiRecovery, EthSignature, SignerRecovery, Valset,
};
use cw_storage_plus::Bound;

use crate::batch::all_batches;
use crate::confirm::has_confirmed;
use crate::error::ContractError;
use crate::hooks::HookOutbox;
use crate::logic_call::{all_logic_calls, call_checkpoint};
use crate::msg::{ArtifactKind, EvidenceSubject, GravityHookMsg};
use crate::state::{
    Params, DELEGATE_KEYS, ETH_ADDRESS_TO_VALIDATOR, LAST_SLASHED_BATCH_BLOCK,
    LAST_SLASHED_LOGIC_CALL_BLOCK, LAST_SLASHED_VALSET_NONCE, PAST_CHECKPOINTS,
    SUBMITTED_EVIDENCE, VALSETS,
};
use crate::valset::{bonded_validators, is_bonded};

// ============================================================================
// Missed Confirmations
// ============================================================================

/// End-block step: report every bonded validator that did not confirm an
/// artifact whose signing window has closed. Each artifact is checked once.
pub fn report_missed_confirmations(
    storage: &mut dyn Storage,
    env: &Env,
    params: &Params,
    outbox: &mut HookOutbox,
) -> StdResult<u64> {
    let height = env.block.height;
    let gravity_id = params.gravity_id_bytes()?;
    let mut reported = 0;

    reported += report_valsets(storage, height, params, &gravity_id, outbox)?;

    // batches
    let last_block = LAST_SLASHED_BATCH_BLOCK
        .may_load(storage)?
        .unwrap_or_default();
    let mut batches: Vec<_> = all_batches(storage)?
        .into_iter()
        .filter(|b| b.block > last_block && b.block + params.signed_batches_window < height)
        .collect();
    batches.sort_by_key(|b| b.block);
    for batch in &batches {
        let checkpoint = batch_checkpoint(&gravity_id, batch);
        reported += report_key_holders(storage, params, &checkpoint, ArtifactKind::Batch, outbox)?;
    }
    if let Some(newest) = batches.last() {
        LAST_SLASHED_BATCH_BLOCK.save(storage, &newest.block)?;
    }

    // logic calls
    let last_block = LAST_SLASHED_LOGIC_CALL_BLOCK
        .may_load(storage)?
        .unwrap_or_default();
    let mut calls: Vec<_> = all_logic_calls(storage)?
        .into_iter()
        .filter(|c| c.block > last_block && c.block + params.signed_logic_calls_window < height)
        .collect();
    calls.sort_by_key(|c| c.block);
    for call in &calls {
        let checkpoint = call_checkpoint(&gravity_id, call)?;
        reported += report_key_holders(
            storage,
            params,
            &checkpoint,
            ArtifactKind::LogicCall,
            outbox,
        )?;
    }
    if let Some(newest) = calls.last() {
        LAST_SLASHED_LOGIC_CALL_BLOCK.save(storage, &newest.block)?;
    }

    Ok(reported)
}

/// Valsets are judged against their own members: a validator is only expected
/// to sign a set it belongs to.
fn report_valsets(
    storage: &mut dyn Storage,
    height: u64,
    params: &Params,
    gravity_id: &[u8; 32],
    outbox: &mut HookOutbox,
) -> StdResult<u64> {
    let last_nonce = LAST_SLASHED_VALSET_NONCE
        .may_load(storage)?
        .unwrap_or_default();
    let valsets: Vec<Valset> = VALSETS
        .range(
            storage,
            Some(Bound::exclusive(last_nonce)),
            None,
            Order::Ascending,
        )
        .map(|item| item.map(|(_, v)| v))
        .collect::<StdResult<_>>()?;

    let mut reported = 0;
    for valset in valsets {
        if valset.height + params.signed_valsets_window >= height {
            break;
        }
        let checkpoint = valset_checkpoint(gravity_id, &valset);
        for member in &valset.members {
            let Some(validator) =
                ETH_ADDRESS_TO_VALIDATOR.may_load(storage, member.eth_address.as_bytes())?
            else {
                continue;
            };
            if is_bonded(storage, &validator)? && !has_confirmed(storage, &checkpoint, &validator)
            {
                report(params, outbox, &validator, &checkpoint, ArtifactKind::Valset)?;
                reported += 1;
            }
        }
        LAST_SLASHED_VALSET_NONCE.save(storage, &valset.nonce)?;
    }
    Ok(reported)
}

/// Batches and logic calls are expected from every bonded validator with keys.
fn report_key_holders(
    storage: &dyn Storage,
    params: &Params,
    checkpoint: &[u8; 32],
    kind: ArtifactKind,
    outbox: &mut HookOutbox,
) -> StdResult<u64> {
    let mut reported = 0;
    for validator in bonded_validators(storage)? {
        if !DELEGATE_KEYS.has(storage, &validator.operator) {
            continue;
        }
        if !has_confirmed(storage, checkpoint, &validator.operator) {
            report(params, outbox, &validator.operator, checkpoint, kind.clone())?;
            reported += 1;
        }
    }
    Ok(reported)
}

fn report(
    params: &Params,
    outbox: &mut HookOutbox,
    validator: &Addr,
    checkpoint: &[u8; 32],
    kind: ArtifactKind,
) -> StdResult<()> {
    outbox.push(
        params,
        GravityHookMsg::MissedConfirmation {
            validator: validator.to_string(),
            checkpoint: Binary::from(checkpoint.to_vec()),
            kind,
        },
    )
}

// ============================================================================
// Bad Signature Evidence
// ============================================================================

pub fn evidence_checkpoint(
    gravity_id: &[u8; 32],
    subject: &EvidenceSubject,
) -> Result<[u8; 32], ContractError> {
    Ok(match subject {
        EvidenceSubject::Valset(valset) => valset_checkpoint(gravity_id, valset),
        EvidenceSubject::Batch(batch) => batch_checkpoint(gravity_id, batch),
        EvidenceSubject::LogicCall(call) => common::logic_call_checkpoint(gravity_id, call)?,
    })
}

/// Check a signature over `subject` that this chain never asked for and
/// report the validator whose key produced it.
pub fn submit_bad_signature_evidence(
    storage: &mut dyn Storage,
    api: &dyn Api,
    params: &Params,
    height: u64,
    subject: &EvidenceSubject,
    signature: &EthSignature,
    outbox: &mut HookOutbox,
) -> Result<Addr, ContractError> {
    let checkpoint = evidence_checkpoint(&params.gravity_id_bytes()?, subject)?;
    if PAST_CHECKPOINTS.has(storage, &checkpoint) {
        return Err(ContractError::CheckpointIsLegitimate {
            checkpoint: bytes32_to_hex(&checkpoint),
        });
    }

    let mut evidence = checkpoint.to_vec();
    evidence.extend_from_slice(&signature.to_bytes());
    let evidence_key = keccak256(&evidence);
    if SUBMITTED_EVIDENCE.has(storage, &evidence_key) {
        return Err(ContractError::DuplicateEvidence);
    }

    let digest = eth_signed_message_hash(&checkpoint);
    let signer = ApiRecovery(api)
        .recover_signer(&digest, signature)
        .ok_or(ContractError::UnknownSigner)?;
    let validator = ETH_ADDRESS_TO_VALIDATOR
        .may_load(storage, signer.as_bytes())?
        .ok_or(ContractError::UnknownSigner)?;

    SUBMITTED_EVIDENCE.save(storage, &evidence_key, &height)?;
    outbox.push(
        params,
        GravityHookMsg::BadSignatureEvidence {
            validator: validator.to_string(),
            checkpoint: Binary::from(checkpoint.to_vec()),
        },
    )?;
    Ok(validator)
}
