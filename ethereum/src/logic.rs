//! Contracts a logic call can target.
//!
//! The Gravity contract pushes the call's transfers to the target, then hands
//! it the payload. Targets see only the token ledger, never the bridge state.

use alloy::primitives::Address;
use alloy::sol;
use alloy::sol_types::SolCall;
use tracing::debug;

use crate::error::GravityError;
use crate::ledger::TokenLedger;

pub struct LogicContext<'a> {
    pub ledger: &'a mut TokenLedger,
    /// Address of the contract being called
    pub this: Address,
    /// The Gravity contract
    pub caller: Address,
}

pub trait LogicContract {
    fn call(&mut self, ctx: LogicContext<'_>, payload: &[u8]) -> Result<(), GravityError>;
}

sol! {
    /// Send each of `amounts` of `token` from the called contract to `recipient`.
    function forward(address token, address recipient, uint256[] amounts);
}

/// Intermediary that forwards part of what it receives to a recipient.
#[derive(Debug, Default)]
pub struct Forwarder;

impl LogicContract for Forwarder {
    fn call(&mut self, ctx: LogicContext<'_>, payload: &[u8]) -> Result<(), GravityError> {
        let call = forwardCall::abi_decode(payload, true).map_err(|e| {
            GravityError::LogicCallReverted {
                reason: e.to_string(),
            }
        })?;
        debug!(
            token = %call.token,
            recipient = %call.recipient,
            transfers = call.amounts.len(),
            "Forwarding logic call funds"
        );
        for amount in call.amounts {
            ctx.ledger
                .transfer(call.token, ctx.this, call.recipient, amount)?;
        }
        Ok(())
    }
}
