//! Emergency governance: pausing the bridge and unsticking attestation.

use cosmwasm_std::{DepsMut, Response};

use crate::attestation::unhalt_bridge;
use crate::error::ContractError;
use crate::state::PARAMS;

/// Stop (or resume) SendToEth and batch creation. Claims, confirmations and
/// end-block processing keep running so in-flight transfers can settle.
pub fn sudo_set_bridge_active(deps: DepsMut, active: bool) -> Result<Response, ContractError> {
    let mut params = PARAMS.load(deps.storage)?;
    params.bridge_active = active;
    PARAMS.save(deps.storage, &params)?;

    Ok(Response::new()
        .add_attribute("method", "set_bridge_active")
        .add_attribute("active", active.to_string()))
}

/// Rewind attestation to `target_nonce`.
pub fn sudo_unhalt_bridge(deps: DepsMut, target_nonce: u64) -> Result<Response, ContractError> {
    let response = unhalt_bridge(deps.storage, target_nonce)?;
    Ok(response.add_attribute("method", "unhalt_bridge"))
}
