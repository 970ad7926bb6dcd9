//! Governance over bridge parameters and the token registry.
//!
//! Both arrive as `SudoMsg::Proposal` once a proposal passed on the host, so
//! there is no sender check here.

use cosmwasm_std::{Addr, Api, DepsMut, Response};

use common::EthAddress;

use crate::error::ContractError;
use crate::msg::ParamsUpdate;
use crate::state::{LocalToken, Params, ERC20_TO_LOCAL, LOCAL_TO_ERC20, PARAMS};

fn validate_addrs(api: &dyn Api, addrs: Vec<String>) -> Result<Vec<Addr>, ContractError> {
    addrs
        .iter()
        .map(|a| api.addr_validate(a).map_err(ContractError::from))
        .collect()
}

/// Overwrite every field `update` sets. The result is not validated here.
pub fn apply_params_update(
    api: &dyn Api,
    params: &mut Params,
    update: ParamsUpdate,
) -> Result<(), ContractError> {
    if let Some(v) = update.bridge_ethereum_address {
        params.bridge_ethereum_address = v;
    }
    if let Some(v) = update.bridge_chain_id {
        params.bridge_chain_id = v;
    }
    if let Some(v) = update.signed_valsets_window {
        params.signed_valsets_window = v;
    }
    if let Some(v) = update.signed_batches_window {
        params.signed_batches_window = v;
    }
    if let Some(v) = update.signed_logic_calls_window {
        params.signed_logic_calls_window = v;
    }
    if let Some(v) = update.target_batch_timeout {
        params.target_batch_timeout = v;
    }
    if let Some(v) = update.average_block_time {
        params.average_block_time = v;
    }
    if let Some(v) = update.average_ethereum_block_time {
        params.average_ethereum_block_time = v;
    }
    if let Some(v) = update.batch_size_limit {
        params.batch_size_limit = v;
    }
    if let Some(v) = update.valset_change_threshold_bps {
        params.valset_change_threshold_bps = v;
    }
    if let Some(v) = update.valset_reward {
        params.valset_reward = v;
    }
    if let Some(v) = update.ethereum_blacklist {
        params.ethereum_blacklist = v;
    }
    if let Some(v) = update.min_chain_fee_basis_points {
        params.min_chain_fee_basis_points = v;
    }
    if let Some(v) = update.fee_collector {
        params.fee_collector = api.addr_validate(&v)?;
    }
    if let Some(v) = update.logic_call_schedulers {
        params.logic_call_schedulers = validate_addrs(api, v)?;
    }
    if let Some(v) = update.hooks {
        params.hooks = validate_addrs(api, v)?;
    }
    Ok(())
}

pub fn sudo_update_params(deps: DepsMut, update: ParamsUpdate) -> Result<Response, ContractError> {
    let mut params = PARAMS.load(deps.storage)?;
    apply_params_update(deps.api, &mut params, update)?;
    params.validate()?;
    PARAMS.save(deps.storage, &params)?;

    Ok(Response::new().add_attribute("method", "update_params"))
}

/// Map an Ethereum-originated ERC-20 to its cw20 voucher. This contract must
/// be the voucher's minter for deposits to be credited.
pub fn sudo_register_voucher(
    deps: DepsMut,
    erc20: EthAddress,
    cw20: String,
) -> Result<Response, ContractError> {
    let cw20 = deps.api.addr_validate(&cw20)?;
    if ERC20_TO_LOCAL.has(deps.storage, erc20.as_bytes()) {
        return Err(ContractError::TokenAlreadyRegistered {
            token: erc20.to_string(),
        });
    }
    if LOCAL_TO_ERC20.has(deps.storage, cw20.as_str()) {
        return Err(ContractError::TokenAlreadyRegistered {
            token: cw20.to_string(),
        });
    }

    ERC20_TO_LOCAL.save(
        deps.storage,
        erc20.as_bytes(),
        &LocalToken::Voucher { cw20: cw20.clone() },
    )?;
    LOCAL_TO_ERC20.save(deps.storage, cw20.as_str(), &erc20)?;

    Ok(Response::new()
        .add_attribute("method", "register_voucher")
        .add_attribute("erc20", erc20.to_string())
        .add_attribute("cw20", cw20))
}
