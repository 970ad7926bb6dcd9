//! Confirmation handlers: orchestrators signing valsets, batches and logic calls.

use cosmwasm_std::{Binary, DepsMut, MessageInfo, Response};

use common::codec::invalidation_id_bytes;
use common::{batch_checkpoint, bytes32_to_hex, valset_checkpoint, EthAddress, EthSignature};

use crate::confirm::record_confirmation;
use crate::error::ContractError;
use crate::logic_call::call_checkpoint;
use crate::state::{Confirmation, BATCHES, LOGIC_CALLS, PARAMS, VALSETS};

fn confirmed(method: &str, confirmation: &Confirmation) -> Response {
    Response::new()
        .add_attribute("method", method)
        .add_attribute("validator", confirmation.validator.as_str())
        .add_attribute("eth_signer", confirmation.eth_signer.to_string())
        .add_attribute(
            "checkpoint",
            format!("0x{}", hex::encode(confirmation.checkpoint.as_slice())),
        )
}

pub fn execute_valset_confirm(
    deps: DepsMut,
    info: MessageInfo,
    nonce: u64,
    signature: EthSignature,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let valset = VALSETS
        .may_load(deps.storage, nonce)?
        .ok_or_else(|| ContractError::ArtifactNotFound {
            artifact: format!("valset {}", nonce),
        })?;
    let checkpoint = valset_checkpoint(&params.gravity_id_bytes()?, &valset);

    let confirmation =
        record_confirmation(deps.storage, deps.api, &checkpoint, &info.sender, signature)?;
    Ok(confirmed("valset_confirm", &confirmation).add_attribute("nonce", nonce.to_string()))
}

pub fn execute_confirm_batch(
    deps: DepsMut,
    info: MessageInfo,
    token_contract: EthAddress,
    nonce: u64,
    signature: EthSignature,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let batch = BATCHES
        .may_load(deps.storage, (token_contract.as_bytes().as_slice(), nonce))?
        .ok_or_else(|| ContractError::ArtifactNotFound {
            artifact: format!("batch {} of {}", nonce, token_contract),
        })?;
    let checkpoint = batch_checkpoint(&params.gravity_id_bytes()?, &batch);

    let confirmation =
        record_confirmation(deps.storage, deps.api, &checkpoint, &info.sender, signature)?;
    Ok(confirmed("confirm_batch", &confirmation)
        .add_attribute("token_contract", token_contract.to_string())
        .add_attribute("nonce", nonce.to_string()))
}

pub fn execute_confirm_logic_call(
    deps: DepsMut,
    info: MessageInfo,
    invalidation_id: Binary,
    invalidation_nonce: u64,
    signature: EthSignature,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let id = invalidation_id_bytes(invalidation_id.as_slice())?;
    let call = LOGIC_CALLS
        .may_load(deps.storage, (id.as_slice(), invalidation_nonce))?
        .ok_or_else(|| ContractError::ArtifactNotFound {
            artifact: format!(
                "logic call {}:{}",
                bytes32_to_hex(&id),
                invalidation_nonce
            ),
        })?;
    let checkpoint = call_checkpoint(&params.gravity_id_bytes()?, &call)?;

    let confirmation =
        record_confirmation(deps.storage, deps.api, &checkpoint, &info.sender, signature)?;
    Ok(confirmed("confirm_logic_call", &confirmation)
        .add_attribute("invalidation_id", bytes32_to_hex(&id))
        .add_attribute("invalidation_nonce", invalidation_nonce.to_string()))
}
