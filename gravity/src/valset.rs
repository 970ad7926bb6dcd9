//! Validator Set Manager
//!
//! Turns the host's bonded-validator snapshot into nonce-stamped valsets that
//! Ethereum can verify signatures against, decides when a new one is needed,
//! and prunes the ones nobody can use anymore.

use std::collections::BTreeMap;

use cosmwasm_std::{Addr, Api, Binary, Env, Order, StdResult, Storage, Uint256};

use common::{normalize_powers, power_diff_bps, valset_checkpoint, EthAddress, Valset};

use crate::error::ContractError;
use crate::hooks::HookOutbox;
use crate::msg::{GravityHookMsg, ValidatorPower};
use crate::state::{
    BondedValidator, CheckpointSubject, Params, BONDED_VALIDATORS, CONFIRMATIONS, DELEGATE_KEYS,
    LAST_OBSERVED_VALSET, LAST_SLASHED_VALSET_NONCE, LAST_UNBONDING_HEIGHT, LATEST_VALSET_NONCE,
    PAST_CHECKPOINTS, VALSETS,
};

// ============================================================================
// Bonded Snapshot
// ============================================================================

/// Replace the bonded-validator snapshot. Validators with zero power are
/// dropped. Returns true when a previously bonded validator is gone, in which
/// case `LAST_UNBONDING_HEIGHT` is set to the current height.
pub fn update_bonded_validators(
    storage: &mut dyn Storage,
    api: &dyn Api,
    height: u64,
    validators: Vec<ValidatorPower>,
) -> Result<bool, ContractError> {
    let mut next = Vec::with_capacity(validators.len());
    for v in validators {
        if v.power == 0 {
            continue;
        }
        next.push(BondedValidator {
            operator: api.addr_validate(&v.operator)?,
            power: v.power,
        });
    }

    let previous = BONDED_VALIDATORS.may_load(storage)?.unwrap_or_default();
    let someone_left = previous
        .iter()
        .any(|old| !next.iter().any(|new| new.operator == old.operator));
    if someone_left {
        LAST_UNBONDING_HEIGHT.save(storage, &height)?;
    }

    BONDED_VALIDATORS.save(storage, &next)?;
    Ok(someone_left)
}

pub fn bonded_validators(storage: &dyn Storage) -> StdResult<Vec<BondedValidator>> {
    Ok(BONDED_VALIDATORS.may_load(storage)?.unwrap_or_default())
}

pub fn is_bonded(storage: &dyn Storage, validator: &Addr) -> StdResult<bool> {
    Ok(bonded_validators(storage)?
        .iter()
        .any(|v| &v.operator == validator))
}

/// Normalized power of every bonded validator, keys registered or not.
/// Attestation votes are weighed with these.
pub fn normalized_bonded_power(storage: &dyn Storage) -> StdResult<BTreeMap<Addr, u64>> {
    let bonded = bonded_validators(storage)?;
    let total: u128 = bonded.iter().map(|v| v.power as u128).sum();
    Ok(bonded
        .into_iter()
        .map(|v| {
            let power = if total == 0 {
                0
            } else {
                (v.power as u128 * common::TOTAL_NORMALIZED_POWER as u128 / total) as u64
            };
            (v.operator, power)
        })
        .collect())
}

// ============================================================================
// Valsets
// ============================================================================

/// The valset this chain would produce now, stamped with the next nonce.
/// Bonded validators without a registered Ethereum key are left out.
pub fn current_valset(storage: &dyn Storage, params: &Params, height: u64) -> StdResult<Valset> {
    let mut raw: Vec<(EthAddress, u64)> = vec![];
    for v in bonded_validators(storage)? {
        if let Some(keys) = DELEGATE_KEYS.may_load(storage, &v.operator)? {
            raw.push((keys.eth_address, v.power));
        }
    }
    let (reward_amount, reward_token) = match &params.valset_reward {
        Some(reward) => (reward.amount, Some(reward.contract)),
        None => (Uint256::zero(), None),
    };
    Ok(Valset {
        nonce: latest_valset_nonce(storage)? + 1,
        members: normalize_powers(&raw),
        height,
        reward_amount,
        reward_token,
    })
}

pub fn latest_valset_nonce(storage: &dyn Storage) -> StdResult<u64> {
    Ok(LATEST_VALSET_NONCE.may_load(storage)?.unwrap_or_default())
}

pub fn latest_valset(storage: &dyn Storage) -> StdResult<Option<Valset>> {
    match LATEST_VALSET_NONCE.may_load(storage)? {
        Some(nonce) => VALSETS.may_load(storage, nonce),
        None => Ok(None),
    }
}

/// The set Ethereum currently verifies signatures against: the last observed
/// valset, or the latest stored one before any update has been observed.
pub fn signing_valset(storage: &dyn Storage) -> StdResult<Option<Valset>> {
    match LAST_OBSERVED_VALSET.may_load(storage)? {
        Some(valset) => Ok(Some(valset)),
        None => latest_valset(storage),
    }
}

/// Persist a new valset and index its checkpoint.
pub fn store_valset(
    storage: &mut dyn Storage,
    params: &Params,
    valset: &Valset,
) -> StdResult<[u8; 32]> {
    let checkpoint = valset_checkpoint(&params.gravity_id_bytes()?, valset);
    VALSETS.save(storage, valset.nonce, valset)?;
    LATEST_VALSET_NONCE.save(storage, &valset.nonce)?;
    PAST_CHECKPOINTS.save(
        storage,
        &checkpoint,
        &(CheckpointSubject::Valset { nonce: valset.nonce }, valset.height),
    )?;
    Ok(checkpoint)
}

/// End-block step: store a new valset when none exists yet, a validator left
/// the bonded set this block, or power moved by more than
/// `valset_change_threshold_bps`.
pub fn create_valsets(
    storage: &mut dyn Storage,
    env: &Env,
    params: &Params,
    outbox: &mut HookOutbox,
) -> StdResult<Option<Valset>> {
    let height = env.block.height;
    let candidate = current_valset(storage, params, height)?;
    if candidate.members.is_empty() {
        return Ok(None);
    }

    let needed = match latest_valset(storage)? {
        None => true,
        Some(latest) => {
            let unbonded_now = LAST_UNBONDING_HEIGHT.may_load(storage)? == Some(height);
            unbonded_now
                || power_diff_bps(&latest.members, &candidate.members)
                    > params.valset_change_threshold_bps
        }
    };
    if !needed {
        return Ok(None);
    }

    let checkpoint = store_valset(storage, params, &candidate)?;
    outbox.push(
        params,
        GravityHookMsg::ValsetCreated {
            nonce: candidate.nonce,
            checkpoint: Binary::from(checkpoint.to_vec()),
        },
    )?;
    Ok(Some(candidate))
}

/// End-block step: delete valsets that are older than the last observed one,
/// past their signing window and already checked for missing signatures.
/// The latest and last observed valsets are always kept.
pub fn prune_valsets(storage: &mut dyn Storage, params: &Params, height: u64) -> StdResult<u64> {
    let Some(observed) = LAST_OBSERVED_VALSET.may_load(storage)? else {
        return Ok(0);
    };
    let latest_nonce = latest_valset_nonce(storage)?;
    let last_slashed = LAST_SLASHED_VALSET_NONCE
        .may_load(storage)?
        .unwrap_or_default();
    let gravity_id = params.gravity_id_bytes()?;

    let prunable: Vec<Valset> = VALSETS
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, v)| v))
        .collect::<StdResult<Vec<_>>>()?
        .into_iter()
        .filter(|v| {
            v.nonce < observed.nonce
                && v.nonce != latest_nonce
                && v.nonce <= last_slashed
                && v.height + params.signed_valsets_window < height
        })
        .collect();

    for valset in &prunable {
        VALSETS.remove(storage, valset.nonce);
        let checkpoint = valset_checkpoint(&gravity_id, valset);
        remove_confirmations(storage, &checkpoint)?;
    }
    Ok(prunable.len() as u64)
}

/// Delete every confirmation stored for a checkpoint.
pub fn remove_confirmations(storage: &mut dyn Storage, checkpoint: &[u8; 32]) -> StdResult<()> {
    let validators: Vec<Addr> = CONFIRMATIONS
        .prefix(checkpoint.as_slice())
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<_>>>()?;
    for validator in validators {
        CONFIRMATIONS.remove(storage, (checkpoint.as_slice(), &validator));
    }
    Ok(())
}

/// Record the valset Ethereum reported installing. Returns whether it differs
/// from the valset this chain stored under the same nonce.
pub fn observe_valset_update(storage: &mut dyn Storage, observed: Valset) -> StdResult<bool> {
    let mismatch = match VALSETS.may_load(storage, observed.nonce)? {
        Some(stored) => {
            stored.members != observed.members
                || stored.reward_amount != observed.reward_amount
                || stored.reward_token != observed.reward_token
        }
        None => false,
    };
    LAST_OBSERVED_VALSET.save(storage, &observed)?;
    Ok(mismatch)
}
