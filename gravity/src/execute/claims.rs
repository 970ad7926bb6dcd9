//! Claim submission by orchestrators.

use cosmwasm_std::{DepsMut, Env, MessageInfo, Response};

use common::bytes32_to_hex;

use crate::attestation::{submit_vote, validate_claim, VoteOutcome};
use crate::error::ContractError;
use crate::hooks::HookOutbox;
use crate::msg::GravityHookMsg;
use crate::state::{validator_for_orchestrator, EthereumClaim, PARAMS};
use crate::valset::is_bonded;

/// Vote for `claim` on behalf of the sender's validator.
///
/// A validator that already voted for different content at the same nonce is
/// not rejected: the conflict is stored and reported to the hooks.
pub fn execute_submit_claim(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    claim: EthereumClaim,
) -> Result<Response, ContractError> {
    validate_claim(&claim)?;

    let keys = validator_for_orchestrator(deps.storage, &info.sender)?.ok_or_else(|| {
        ContractError::UnknownOrchestrator {
            orchestrator: info.sender.to_string(),
        }
    })?;
    if !is_bonded(deps.storage, &keys.validator)? {
        return Err(ContractError::ValidatorNotBonded {
            validator: keys.validator.to_string(),
        });
    }

    let event_nonce = claim.event_nonce;
    let kind = claim.kind.as_str();
    let response = Response::new()
        .add_attribute("method", "submit_claim")
        .add_attribute("claim_type", kind)
        .add_attribute("event_nonce", event_nonce.to_string())
        .add_attribute("validator", keys.validator.as_str());

    match submit_vote(deps.storage, env.block.height, &keys.validator, claim)? {
        VoteOutcome::Counted { hash, votes } => Ok(response
            .add_attribute("claim_hash", bytes32_to_hex(&hash))
            .add_attribute("votes", votes.to_string())),
        VoteOutcome::Conflicting { first_hash } => {
            let params = PARAMS.load(deps.storage)?;
            let mut outbox = HookOutbox::default();
            outbox.push(
                &params,
                GravityHookMsg::ConflictingClaim {
                    validator: keys.validator.to_string(),
                    event_nonce,
                },
            )?;
            Ok(response
                .add_submessages(outbox.messages)
                .add_events(outbox.events)
                .add_attribute("conflicting", "true")
                .add_attribute(
                    "first_claim_hash",
                    format!("0x{}", hex::encode(first_hash.as_slice())),
                ))
        }
    }
}
