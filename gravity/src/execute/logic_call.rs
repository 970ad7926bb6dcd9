use cosmwasm_std::{Binary, DepsMut, Env, MessageInfo, Response};

use common::{bytes32_to_hex, Erc20Token, EthAddress};

use crate::error::ContractError;
use crate::logic_call::{schedule_logic_call, LogicCallRequest};
use crate::state::PARAMS;

/// Queue a logic call. Only `params.logic_call_schedulers` may do this.
#[allow(clippy::too_many_arguments)]
pub fn execute_schedule_logic_call(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    transfers: Vec<Erc20Token>,
    fees: Vec<Erc20Token>,
    logic_contract_address: EthAddress,
    payload: Binary,
    timeout: Option<u64>,
    invalidation_id: Binary,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    if !params.logic_call_schedulers.contains(&info.sender) {
        return Err(ContractError::Unauthorized {
            reason: "sender may not schedule logic calls".to_string(),
        });
    }

    let scheduled = schedule_logic_call(
        deps.storage,
        &params,
        env.block.height,
        LogicCallRequest {
            transfers,
            fees,
            logic_contract_address,
            payload,
            timeout,
            invalidation_id,
        },
    )?;

    let call = &scheduled.call;
    let superseded = scheduled
        .superseded
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",");
    Ok(Response::new()
        .add_attribute("method", "schedule_logic_call")
        .add_attribute(
            "invalidation_id",
            format!("0x{}", hex::encode(call.invalidation_id.as_slice())),
        )
        .add_attribute("invalidation_nonce", call.invalidation_nonce.to_string())
        .add_attribute("timeout", call.timeout.to_string())
        .add_attribute("checkpoint", bytes32_to_hex(&scheduled.checkpoint))
        .add_attribute("superseded", superseded))
}
