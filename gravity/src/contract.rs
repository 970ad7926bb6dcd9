//! Gravity Bridge Contract - Entry Points
//!
//! The implementation is modularized into:
//! - `execute/` - Execute and governance handlers
//! - `query` - Query handlers
//! - `end_block` - Host-driven block processing

use cosmwasm_std::{
    entry_point, to_json_binary, Binary, Deps, DepsMut, Env, MessageInfo, Reply, Response,
    StdResult,
};
use cw2::set_contract_version;

use crate::attestation::credit_reply;
use crate::end_block::{end_blocker, END_BLOCK_STEPS};
use crate::error::ContractError;
use crate::execute::{
    apply_params_update, execute_cancel_send_to_eth, execute_confirm_batch,
    execute_confirm_logic_call, execute_receive, execute_request_batch,
    execute_schedule_logic_call, execute_send_to_eth, execute_set_orchestrator_address,
    execute_submit_bad_signature_evidence, execute_submit_claim, execute_valset_confirm,
    sudo_register_voucher, sudo_set_bridge_active, sudo_unhalt_bridge, sudo_update_params,
};
use crate::hooks::{hook_reply, is_hook_reply};
use crate::msg::{ExecuteMsg, GovProposal, InstantiateMsg, MigrateMsg, QueryMsg, SudoMsg};
use crate::query::{
    query_attestations, query_batch, query_batch_confirms, query_batch_fees,
    query_checkpoint_seen, query_conflicting_votes, query_current_valset, query_delegate_keys,
    query_denom_to_erc20, query_erc20_to_denom, query_failed_credit, query_last_event_nonce,
    query_last_observed_event_nonce, query_last_observed_valset, query_latest_valsets,
    query_logic_call, query_logic_confirms, query_outgoing_logic_calls,
    query_outgoing_tx_batches, query_params, query_pending_batch_requests,
    query_pending_logic_call_requests, query_pending_send_to_eth, query_pending_valset_requests,
    query_signature_bundle, query_valset, query_valset_confirms,
};
use crate::state::{
    Params, CONTRACT_NAME, CONTRACT_VERSION, DEFAULT_AVERAGE_BLOCK_TIME,
    DEFAULT_AVERAGE_ETHEREUM_BLOCK_TIME, DEFAULT_BATCH_SIZE_LIMIT, DEFAULT_SIGNED_BATCHES_WINDOW,
    DEFAULT_SIGNED_LOGIC_CALLS_WINDOW, DEFAULT_SIGNED_VALSETS_WINDOW, DEFAULT_TARGET_BATCH_TIMEOUT,
    DEFAULT_VALSET_CHANGE_THRESHOLD_BPS, PARAMS,
};
use crate::valset::update_bonded_validators;

// ============================================================================
// Instantiate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    let fee_collector = deps.api.addr_validate(&msg.fee_collector)?;
    let hooks = msg
        .hooks
        .iter()
        .map(|h| deps.api.addr_validate(h))
        .collect::<StdResult<Vec<_>>>()?;
    let logic_call_schedulers = msg
        .logic_call_schedulers
        .iter()
        .map(|s| deps.api.addr_validate(s))
        .collect::<StdResult<Vec<_>>>()?;

    let mut params = Params {
        gravity_id: msg.gravity_id,
        bridge_ethereum_address: msg.bridge_ethereum_address,
        bridge_chain_id: msg.bridge_chain_id,
        signed_valsets_window: DEFAULT_SIGNED_VALSETS_WINDOW,
        signed_batches_window: DEFAULT_SIGNED_BATCHES_WINDOW,
        signed_logic_calls_window: DEFAULT_SIGNED_LOGIC_CALLS_WINDOW,
        target_batch_timeout: DEFAULT_TARGET_BATCH_TIMEOUT,
        average_block_time: DEFAULT_AVERAGE_BLOCK_TIME,
        average_ethereum_block_time: DEFAULT_AVERAGE_ETHEREUM_BLOCK_TIME,
        batch_size_limit: DEFAULT_BATCH_SIZE_LIMIT,
        valset_change_threshold_bps: DEFAULT_VALSET_CHANGE_THRESHOLD_BPS,
        valset_reward: None,
        bridge_active: true,
        ethereum_blacklist: vec![],
        min_chain_fee_basis_points: 0,
        fee_collector,
        logic_call_schedulers,
        hooks,
    };
    if let Some(update) = msg.params {
        apply_params_update(deps.api, &mut params, update)?;
    }
    params.validate()?;
    PARAMS.save(deps.storage, &params)?;

    let validator_count = msg.validators.len();
    update_bonded_validators(deps.storage, deps.api, env.block.height, msg.validators)?;

    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("gravity_id", params.gravity_id)
        .add_attribute("bridge_ethereum_address", params.bridge_ethereum_address.to_string())
        .add_attribute("bridge_chain_id", params.bridge_chain_id.to_string())
        .add_attribute("validator_count", validator_count.to_string()))
}

// ============================================================================
// Execute
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        // Validators
        ExecuteMsg::SetOrchestratorAddress {
            orchestrator,
            eth_address,
        } => execute_set_orchestrator_address(deps, info, orchestrator, eth_address),
        ExecuteMsg::SubmitClaim { claim } => execute_submit_claim(deps, env, info, claim),
        ExecuteMsg::ValsetConfirm { nonce, signature } => {
            execute_valset_confirm(deps, info, nonce, signature)
        }
        ExecuteMsg::ConfirmBatch {
            token_contract,
            nonce,
            signature,
        } => execute_confirm_batch(deps, info, token_contract, nonce, signature),
        ExecuteMsg::ConfirmLogicCall {
            invalidation_id,
            invalidation_nonce,
            signature,
        } => execute_confirm_logic_call(deps, info, invalidation_id, invalidation_nonce, signature),

        // Users & relayers
        ExecuteMsg::SendToEth {
            eth_dest,
            amount,
            bridge_fee,
            chain_fee,
        } => execute_send_to_eth(deps, info, eth_dest, amount, bridge_fee, chain_fee),
        ExecuteMsg::Receive(cw20_msg) => execute_receive(deps, info, cw20_msg),
        ExecuteMsg::CancelSendToEth { transaction_id } => {
            execute_cancel_send_to_eth(deps, info, transaction_id)
        }
        ExecuteMsg::RequestBatch { token_contract } => {
            execute_request_batch(deps, env, token_contract)
        }
        ExecuteMsg::ScheduleLogicCall {
            transfers,
            fees,
            logic_contract_address,
            payload,
            timeout,
            invalidation_id,
        } => execute_schedule_logic_call(
            deps,
            env,
            info,
            transfers,
            fees,
            logic_contract_address,
            payload,
            timeout,
            invalidation_id,
        ),
        ExecuteMsg::SubmitBadSignatureEvidence { subject, signature } => {
            execute_submit_bad_signature_evidence(deps, env, subject, signature)
        }
    }
}

// ============================================================================
// Sudo
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn sudo(deps: DepsMut, env: Env, msg: SudoMsg) -> Result<Response, ContractError> {
    match msg {
        SudoMsg::EndBlock { validators } => end_blocker(deps, &env, validators, &END_BLOCK_STEPS),
        SudoMsg::Proposal(proposal) => match proposal {
            GovProposal::UpdateParams(update) => sudo_update_params(deps, update),
            GovProposal::SetBridgeActive { active } => sudo_set_bridge_active(deps, active),
            GovProposal::UnhaltBridge { target_nonce } => sudo_unhalt_bridge(deps, target_nonce),
            GovProposal::RegisterVoucher { erc20, cw20 } => {
                sudo_register_voucher(deps, erc20, cw20)
            }
        },
    }
}

// ============================================================================
// Reply
// ============================================================================

/// Sub-messages are either hook calls, with ids from
/// [`crate::hooks::HOOK_REPLY_ID_BASE`] up, or deposit credits keyed by
/// their event nonce.
#[cfg_attr(not(feature = "library"), entry_point)]
pub fn reply(deps: DepsMut, _env: Env, msg: Reply) -> Result<Response, ContractError> {
    if is_hook_reply(msg.id) {
        hook_reply(deps, msg)
    } else {
        credit_reply(deps, msg)
    }
}

// ============================================================================
// Query
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Params {} => to_json_binary(&query_params(deps)?),

        // Valsets
        QueryMsg::CurrentValset {} => to_json_binary(&query_current_valset(deps, env)?),
        QueryMsg::Valset { nonce } => to_json_binary(&query_valset(deps, nonce)?),
        QueryMsg::LatestValsets { limit } => to_json_binary(&query_latest_valsets(deps, limit)?),
        QueryMsg::LastObservedValset {} => to_json_binary(&query_last_observed_valset(deps)?),
        QueryMsg::ValsetConfirms { nonce } => to_json_binary(&query_valset_confirms(deps, nonce)?),
        QueryMsg::PendingValsetRequests { orchestrator } => {
            to_json_binary(&query_pending_valset_requests(deps, orchestrator)?)
        }

        // Batches
        QueryMsg::OutgoingTxBatches { start_after, limit } => {
            to_json_binary(&query_outgoing_tx_batches(deps, start_after, limit)?)
        }
        QueryMsg::Batch {
            token_contract,
            nonce,
        } => to_json_binary(&query_batch(deps, token_contract, nonce)?),
        QueryMsg::BatchConfirms {
            token_contract,
            nonce,
        } => to_json_binary(&query_batch_confirms(deps, token_contract, nonce)?),
        QueryMsg::PendingBatchRequests { orchestrator } => {
            to_json_binary(&query_pending_batch_requests(deps, orchestrator)?)
        }
        QueryMsg::PendingSendToEth { sender } => {
            to_json_binary(&query_pending_send_to_eth(deps, sender)?)
        }
        QueryMsg::BatchFees {} => to_json_binary(&query_batch_fees(deps)?),

        // Logic calls
        QueryMsg::OutgoingLogicCalls { start_after, limit } => {
            to_json_binary(&query_outgoing_logic_calls(deps, start_after, limit)?)
        }
        QueryMsg::LogicCall {
            invalidation_id,
            invalidation_nonce,
        } => to_json_binary(&query_logic_call(deps, invalidation_id, invalidation_nonce)?),
        QueryMsg::LogicConfirms {
            invalidation_id,
            invalidation_nonce,
        } => to_json_binary(&query_logic_confirms(
            deps,
            invalidation_id,
            invalidation_nonce,
        )?),
        QueryMsg::PendingLogicCallRequests { orchestrator } => {
            to_json_binary(&query_pending_logic_call_requests(deps, orchestrator)?)
        }

        // Attestations
        QueryMsg::LastEventNonce { orchestrator } => {
            to_json_binary(&query_last_event_nonce(deps, orchestrator)?)
        }
        QueryMsg::LastObservedEventNonce {} => {
            to_json_binary(&query_last_observed_event_nonce(deps)?)
        }
        QueryMsg::Attestations { event_nonce } => {
            to_json_binary(&query_attestations(deps, event_nonce)?)
        }
        QueryMsg::ConflictingVotes { event_nonce } => {
            to_json_binary(&query_conflicting_votes(deps, event_nonce)?)
        }
        QueryMsg::FailedCredit { event_nonce } => {
            to_json_binary(&query_failed_credit(deps, event_nonce)?)
        }

        // Keys & tokens
        QueryMsg::DelegateKeys { validator } => {
            to_json_binary(&query_delegate_keys(deps, validator)?)
        }
        QueryMsg::Erc20ToDenom { erc20 } => to_json_binary(&query_erc20_to_denom(deps, erc20)?),
        QueryMsg::DenomToErc20 { denom } => to_json_binary(&query_denom_to_erc20(deps, denom)?),

        // Relaying
        QueryMsg::SignatureBundle { checkpoint } => {
            to_json_binary(&query_signature_bundle(deps, checkpoint)?)
        }
        QueryMsg::CheckpointSeen { checkpoint } => {
            to_json_binary(&query_checkpoint_seen(deps, checkpoint)?)
        }
    }
}

// ============================================================================
// Migrate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn migrate(deps: DepsMut, _env: Env, _msg: MigrateMsg) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    Ok(Response::new()
        .add_attribute("action", "migrate")
        .add_attribute("version", CONTRACT_VERSION))
}
