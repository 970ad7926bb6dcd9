//! Outgoing transfer handlers (SendToEth, Receive, Cancel, RequestBatch).
//!
//! Host-native coins are locked in this contract while they live on Ethereum;
//! cw20 vouchers of Ethereum-originated tokens are burned on the way out and
//! minted again on refund.

use cosmwasm_std::{
    coins, from_json, to_json_binary, Addr, BankMsg, CosmosMsg, DepsMut, Env, MessageInfo,
    Response, Uint128, WasmMsg,
};
use cw20::{Cw20ExecuteMsg, Cw20ReceiveMsg};

use common::{bytes32_to_hex, EthAddress};

use crate::batch::{add_to_outgoing_pool, build_batch, remove_from_outgoing_pool};
use crate::error::ContractError;
use crate::fee::check_send_amounts;
use crate::msg::ReceiveMsg;
use crate::state::{LocalToken, Params, ERC20_TO_LOCAL, LOCAL_TO_ERC20, PARAMS};

fn check_destination(params: &Params, eth_dest: &EthAddress) -> Result<(), ContractError> {
    if !params.bridge_active {
        return Err(ContractError::BridgeInactive);
    }
    if params.is_blacklisted(eth_dest) {
        return Err(ContractError::BlacklistedDestination {
            dest: eth_dest.to_string(),
        });
    }
    Ok(())
}

/// Queue a transfer of a host-native denom sent along with the message.
pub fn execute_send_to_eth(
    deps: DepsMut,
    info: MessageInfo,
    eth_dest: EthAddress,
    amount: Uint128,
    bridge_fee: Uint128,
    chain_fee: Uint128,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    check_destination(&params, &eth_dest)?;

    if info.funds.len() != 1 {
        return Err(ContractError::InvalidAmount {
            reason: "Exactly one denom must be sent".to_string(),
        });
    }
    let coin = &info.funds[0];
    let total = check_send_amounts(&params, amount, bridge_fee, chain_fee)?;
    if coin.amount != total {
        return Err(ContractError::InvalidAmount {
            reason: format!(
                "sent {}{}, expected amount + bridge_fee + chain_fee = {}",
                coin.amount, coin.denom, total
            ),
        });
    }

    let token_contract = LOCAL_TO_ERC20
        .may_load(deps.storage, &coin.denom)?
        .filter(|erc20| {
            matches!(
                ERC20_TO_LOCAL.may_load(deps.storage, erc20.as_bytes()),
                Ok(Some(LocalToken::Native { .. }))
            )
        })
        .ok_or_else(|| ContractError::TokenNotRegistered {
            token: coin.denom.clone(),
        })?;

    let tx = add_to_outgoing_pool(
        deps.storage,
        &info.sender,
        eth_dest,
        token_contract,
        amount,
        bridge_fee,
    )?;

    let mut response = Response::new();
    if !chain_fee.is_zero() {
        response = response.add_message(BankMsg::Send {
            to_address: params.fee_collector.to_string(),
            amount: coins(chain_fee.u128(), &coin.denom),
        });
    }

    Ok(response
        .add_attribute("method", "send_to_eth")
        .add_attribute("transfer_id", tx.id.to_string())
        .add_attribute("sender", info.sender)
        .add_attribute("eth_dest", eth_dest.to_string())
        .add_attribute("token_contract", token_contract.to_string())
        .add_attribute("amount", amount)
        .add_attribute("bridge_fee", bridge_fee)
        .add_attribute("chain_fee", chain_fee))
}

/// cw20 voucher entry point: the voucher contract is `info.sender`.
pub fn execute_receive(
    deps: DepsMut,
    info: MessageInfo,
    cw20_msg: Cw20ReceiveMsg,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let voucher = info.sender;
    let sender = deps.api.addr_validate(&cw20_msg.sender)?;

    let ReceiveMsg::SendToEth {
        eth_dest,
        amount,
        bridge_fee,
        chain_fee,
    } = from_json(&cw20_msg.msg)?;
    check_destination(&params, &eth_dest)?;

    let total = check_send_amounts(&params, amount, bridge_fee, chain_fee)?;
    if cw20_msg.amount != total {
        return Err(ContractError::InvalidAmount {
            reason: format!(
                "received {}, expected amount + bridge_fee + chain_fee = {}",
                cw20_msg.amount, total
            ),
        });
    }

    let token_contract = LOCAL_TO_ERC20
        .may_load(deps.storage, voucher.as_str())?
        .filter(|erc20| {
            matches!(
                ERC20_TO_LOCAL.may_load(deps.storage, erc20.as_bytes()),
                Ok(Some(LocalToken::Voucher { .. }))
            )
        })
        .ok_or_else(|| ContractError::TokenNotRegistered {
            token: voucher.to_string(),
        })?;

    let tx = add_to_outgoing_pool(
        deps.storage,
        &sender,
        eth_dest,
        token_contract,
        amount,
        bridge_fee,
    )?;

    let mut messages: Vec<CosmosMsg> = vec![WasmMsg::Execute {
        contract_addr: voucher.to_string(),
        msg: to_json_binary(&Cw20ExecuteMsg::Burn {
            amount: amount + bridge_fee,
        })?,
        funds: vec![],
    }
    .into()];
    if !chain_fee.is_zero() {
        messages.push(
            WasmMsg::Execute {
                contract_addr: voucher.to_string(),
                msg: to_json_binary(&Cw20ExecuteMsg::Transfer {
                    recipient: params.fee_collector.to_string(),
                    amount: chain_fee,
                })?,
                funds: vec![],
            }
            .into(),
        );
    }

    Ok(Response::new()
        .add_messages(messages)
        .add_attribute("method", "send_to_eth")
        .add_attribute("transfer_id", tx.id.to_string())
        .add_attribute("sender", sender)
        .add_attribute("eth_dest", eth_dest.to_string())
        .add_attribute("token_contract", token_contract.to_string())
        .add_attribute("amount", amount)
        .add_attribute("bridge_fee", bridge_fee)
        .add_attribute("chain_fee", chain_fee))
}

/// Withdraw an unbatched transfer and refund `amount + bridge_fee`.
/// The chain fee is not refunded.
pub fn execute_cancel_send_to_eth(
    deps: DepsMut,
    info: MessageInfo,
    transaction_id: u64,
) -> Result<Response, ContractError> {
    let tx = remove_from_outgoing_pool(deps.storage, &info.sender, transaction_id)?;
    let refund = Uint128::try_from(tx.erc20_token.amount + tx.erc20_fee.amount).map_err(|_| {
        ContractError::InvalidAmount {
            reason: "refund exceeds 128 bits".to_string(),
        }
    })?;
    let token = ERC20_TO_LOCAL
        .may_load(deps.storage, tx.erc20_token.contract.as_bytes())?
        .ok_or_else(|| ContractError::TokenNotRegistered {
            token: tx.erc20_token.contract.to_string(),
        })?;

    let msg: CosmosMsg = refund_msg(&token, &info.sender, refund)?;
    Ok(Response::new()
        .add_message(msg)
        .add_attribute("method", "cancel_send_to_eth")
        .add_attribute("transfer_id", transaction_id.to_string())
        .add_attribute("refund", refund))
}

fn refund_msg(
    token: &LocalToken,
    recipient: &Addr,
    amount: Uint128,
) -> Result<CosmosMsg, ContractError> {
    Ok(match token {
        LocalToken::Native { denom } => BankMsg::Send {
            to_address: recipient.to_string(),
            amount: coins(amount.u128(), denom),
        }
        .into(),
        LocalToken::Voucher { cw20 } => WasmMsg::Execute {
            contract_addr: cw20.to_string(),
            msg: to_json_binary(&Cw20ExecuteMsg::Mint {
                recipient: recipient.to_string(),
                amount,
            })?,
            funds: vec![],
        }
        .into(),
    })
}

/// Build a batch for `token_contract`. Anyone may ask; relayers do when the
/// pool pays enough.
pub fn execute_request_batch(
    deps: DepsMut,
    env: Env,
    token_contract: EthAddress,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let built = build_batch(deps.storage, &params, env.block.height, token_contract)?;

    let superseded = built
        .superseded
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",");
    Ok(Response::new()
        .add_attribute("method", "request_batch")
        .add_attribute("token_contract", token_contract.to_string())
        .add_attribute("batch_nonce", built.batch.batch_nonce.to_string())
        .add_attribute("tx_count", built.batch.transactions.len().to_string())
        .add_attribute("total_fee", built.batch.total_fee().to_string())
        .add_attribute("batch_timeout", built.batch.batch_timeout.to_string())
        .add_attribute("checkpoint", bytes32_to_hex(&built.checkpoint))
        .add_attribute("superseded", superseded))
}
