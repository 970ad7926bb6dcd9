//! Delegate key registration.

use cosmwasm_std::{DepsMut, MessageInfo, Response};

use common::EthAddress;

use crate::error::ContractError;
use crate::state::{
    DelegateKeys, DELEGATE_KEYS, ETH_ADDRESS_TO_VALIDATOR, ORCHESTRATOR_TO_VALIDATOR,
};
use crate::valset::is_bonded;

/// Register the orchestrator account and Ethereum key acting for the sending
/// validator. Keys are set once; both must be unused by any other validator.
pub fn execute_set_orchestrator_address(
    deps: DepsMut,
    info: MessageInfo,
    orchestrator: String,
    eth_address: EthAddress,
) -> Result<Response, ContractError> {
    let validator = info.sender;
    if !is_bonded(deps.storage, &validator)? {
        return Err(ContractError::ValidatorNotBonded {
            validator: validator.to_string(),
        });
    }
    if eth_address.is_zero() {
        return Err(ContractError::ZeroEthAddress);
    }
    if DELEGATE_KEYS.has(deps.storage, &validator) {
        return Err(ContractError::KeysAlreadySet {
            validator: validator.to_string(),
        });
    }

    let orchestrator = deps.api.addr_validate(&orchestrator)?;
    if ORCHESTRATOR_TO_VALIDATOR.has(deps.storage, &orchestrator) {
        return Err(ContractError::DelegateKeyInUse {
            key: orchestrator.to_string(),
        });
    }
    if ETH_ADDRESS_TO_VALIDATOR.has(deps.storage, eth_address.as_bytes()) {
        return Err(ContractError::DelegateKeyInUse {
            key: eth_address.to_string(),
        });
    }

    let keys = DelegateKeys {
        validator: validator.clone(),
        orchestrator: orchestrator.clone(),
        eth_address,
    };
    DELEGATE_KEYS.save(deps.storage, &validator, &keys)?;
    ORCHESTRATOR_TO_VALIDATOR.save(deps.storage, &orchestrator, &validator)?;
    ETH_ADDRESS_TO_VALIDATOR.save(deps.storage, eth_address.as_bytes(), &validator)?;

    Ok(Response::new()
        .add_attribute("method", "set_orchestrator_address")
        .add_attribute("validator", validator)
        .add_attribute("orchestrator", orchestrator)
        .add_attribute("eth_address", eth_address.to_string()))
}
