//! Confirmation Store
//!
//! Validators' signatures over artifact checkpoints, kept so a relayer can
//! assemble a complete, correctly ordered signature list without polling
//! every validator. Entries are pruned together with their artifact.

use cosmwasm_std::{Addr, Api, Binary, Order, StdResult, Storage};

use common::verify::signature_matches;
use common::{
    valset_checkpoint, verify_signed_artifact, ApiRecovery, EthSignature, SignatureCheckError,
    Valset, POWER_THRESHOLD,
};

use crate::error::ContractError;
use crate::msg::SignatureBundleResponse;
use crate::state::{
    validator_for_orchestrator, Confirmation, Params, CONFIRMATIONS, ETH_ADDRESS_TO_VALIDATOR,
};
use crate::valset::signing_valset;

/// Verify and store `orchestrator`'s signature over `checkpoint`.
///
/// The signature must recover to the Ethereum key registered for the
/// orchestrator's validator, and each validator confirms an artifact once.
pub fn record_confirmation(
    storage: &mut dyn Storage,
    api: &dyn Api,
    checkpoint: &[u8; 32],
    orchestrator: &Addr,
    signature: EthSignature,
) -> Result<Confirmation, ContractError> {
    let keys = validator_for_orchestrator(storage, orchestrator)?.ok_or_else(|| {
        ContractError::UnknownOrchestrator {
            orchestrator: orchestrator.to_string(),
        }
    })?;

    if CONFIRMATIONS.has(storage, (checkpoint.as_slice(), &keys.validator)) {
        return Err(ContractError::DuplicateConfirmation {
            validator: keys.validator.to_string(),
        });
    }

    if !signature_matches(&ApiRecovery(api), checkpoint, &signature, &keys.eth_address) {
        return Err(ContractError::InvalidSignature {
            expected: keys.eth_address.to_string(),
        });
    }

    let confirmation = Confirmation {
        checkpoint: Binary::from(checkpoint.to_vec()),
        validator: keys.validator.clone(),
        orchestrator: keys.orchestrator,
        eth_signer: keys.eth_address,
        signature,
    };
    CONFIRMATIONS.save(
        storage,
        (checkpoint.as_slice(), &keys.validator),
        &confirmation,
    )?;
    Ok(confirmation)
}

pub fn confirmations_for(storage: &dyn Storage, checkpoint: &[u8]) -> StdResult<Vec<Confirmation>> {
    CONFIRMATIONS
        .prefix(checkpoint)
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, c)| c))
        .collect()
}

pub fn has_confirmed(storage: &dyn Storage, checkpoint: &[u8], validator: &Addr) -> bool {
    CONFIRMATIONS.has(storage, (checkpoint, validator))
}

/// Signatures stored for `checkpoint`, one per member of `valset` in member
/// order. Members without a confirmation get the absent sentinel.
pub fn aligned_signatures(
    storage: &dyn Storage,
    checkpoint: &[u8; 32],
    valset: &Valset,
) -> StdResult<Vec<EthSignature>> {
    valset
        .members
        .iter()
        .map(|member| {
            let Some(validator) =
                ETH_ADDRESS_TO_VALIDATOR.may_load(storage, member.eth_address.as_bytes())?
            else {
                return Ok(EthSignature::absent());
            };
            Ok(CONFIRMATIONS
                .may_load(storage, (checkpoint.as_slice(), &validator))?
                .filter(|c| c.eth_signer == member.eth_address)
                .map(|c| c.signature)
                .unwrap_or_else(EthSignature::absent))
        })
        .collect()
}

/// Normalized power of `valset` members that have confirmed `checkpoint`.
/// Stored confirmations were verified on entry, so no signature is recovered here.
pub fn confirmed_power(
    storage: &dyn Storage,
    checkpoint: &[u8; 32],
    valset: &Valset,
) -> StdResult<u64> {
    let signatures = aligned_signatures(storage, checkpoint, valset)?;
    Ok(valset
        .members
        .iter()
        .zip(signatures)
        .filter(|(_, sig)| !sig.is_absent())
        .map(|(m, _)| m.power)
        .sum())
}

/// Whether `checkpoint` has gathered quorum confirmations from the valset
/// Ethereum currently verifies against.
pub fn has_quorum(storage: &dyn Storage, checkpoint: &[u8; 32]) -> StdResult<bool> {
    match signing_valset(storage)? {
        Some(valset) => Ok(confirmed_power(storage, checkpoint, &valset)? >= POWER_THRESHOLD),
        None => Ok(false),
    }
}

/// Everything a relayer needs to submit `checkpoint`'s artifact, re-verified
/// the way Ethereum will verify it.
pub fn signature_bundle(
    storage: &dyn Storage,
    api: &dyn Api,
    params: &Params,
    checkpoint: &[u8; 32],
) -> StdResult<SignatureBundleResponse> {
    let Some(valset) = signing_valset(storage)? else {
        return Ok(SignatureBundleResponse {
            valset: None,
            signatures: vec![],
            signed_power: 0,
            power_threshold: POWER_THRESHOLD,
            ready: false,
            error: Some("no valset to sign with".to_string()),
        });
    };

    let gravity_id = params.gravity_id_bytes()?;
    let signatures = aligned_signatures(storage, checkpoint, &valset)?;
    let on_file = valset_checkpoint(&gravity_id, &valset);
    let result = verify_signed_artifact(
        &ApiRecovery(api),
        &gravity_id,
        &valset,
        &signatures,
        &on_file,
        checkpoint,
    );

    let (signed_power, ready, error) = match result {
        Ok(power) => (power, true, None),
        Err(e @ SignatureCheckError::InsufficientPower { cumulative_power, .. }) => {
            (cumulative_power, false, Some(e.to_string()))
        }
        Err(e) => (0, false, Some(e.to_string())),
    };

    Ok(SignatureBundleResponse {
        valset: Some(valset),
        signatures,
        signed_power,
        power_threshold: POWER_THRESHOLD,
        ready,
        error,
    })
}
