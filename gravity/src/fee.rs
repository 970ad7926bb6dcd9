//! Chain Fee
//!
//! Transfers to Ethereum carry two fees: the bridge fee, which rides in the
//! batch and pays the relayer on Ethereum, and the chain fee, which is paid
//! here to `params.fee_collector`. The chain fee has a floor expressed in
//! basis points of the transferred amount.
//!
//! | Fee        | Paid on  | Paid to            | Minimum                               |
//! |------------|----------|--------------------|---------------------------------------|
//! | bridge_fee | Ethereum | batch relayer      | none (higher fees are batched first)  |
//! | chain_fee  | host     | fee collector      | `amount * min_chain_fee_bps / 10000`  |

use cosmwasm_std::Uint128;

use crate::error::ContractError;
use crate::state::Params;

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10000;

/// Calculate fee amount from amount and bps
pub fn calculate_fee_from_bps(amount: Uint128, fee_bps: u64) -> Uint128 {
    amount.multiply_ratio(fee_bps as u128, BPS_DENOMINATOR)
}

pub fn min_chain_fee(params: &Params, amount: Uint128) -> Uint128 {
    calculate_fee_from_bps(amount, params.min_chain_fee_basis_points)
}

/// Checks shared by every SendToEth entry point. Returns the total the
/// sender has to put up.
pub fn check_send_amounts(
    params: &Params,
    amount: Uint128,
    bridge_fee: Uint128,
    chain_fee: Uint128,
) -> Result<Uint128, ContractError> {
    if amount.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: "amount must be positive".to_string(),
        });
    }
    let min = min_chain_fee(params, amount);
    if chain_fee < min {
        return Err(ContractError::ChainFeeTooLow {
            min,
            got: chain_fee,
        });
    }
    amount
        .checked_add(bridge_fee)
        .and_then(|sum| sum.checked_add(chain_fee))
        .map_err(|_| ContractError::InvalidAmount {
            reason: "amount plus fees overflows".to_string(),
        })
}
