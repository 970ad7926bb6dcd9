//! Logic Call Builder
//!
//! Arbitrary calls for the Ethereum contract to execute, replay-protected by an
//! application-chosen 32-byte invalidation id and a nonce that only grows
//! within it. Only the newest call of an id is kept; ids are independent.

use cosmwasm_std::{Binary, Order, StdError, StdResult, Storage};

use common::codec::invalidation_id_bytes;
use common::{logic_call_checkpoint, Erc20Token, EthAddress, OutgoingLogicCall};

use crate::batch::projected_batch_timeout;
use crate::error::ContractError;
use crate::state::{
    last_observed_eth_height, CheckpointSubject, Params, LAST_INVALIDATION_NONCE, LOGIC_CALLS,
    PAST_CHECKPOINTS,
};
use crate::valset::remove_confirmations;

/// Everything needed to build one call; the nonce and block are assigned here.
pub struct LogicCallRequest {
    pub transfers: Vec<Erc20Token>,
    pub fees: Vec<Erc20Token>,
    pub logic_contract_address: EthAddress,
    pub payload: Binary,
    pub timeout: Option<u64>,
    pub invalidation_id: Binary,
}

#[derive(Debug)]
pub struct ScheduledCall {
    pub call: OutgoingLogicCall,
    pub checkpoint: [u8; 32],
    /// Nonces of outstanding calls under the same id that were dropped
    pub superseded: Vec<u64>,
}

pub fn call_checkpoint(gravity_id: &[u8; 32], call: &OutgoingLogicCall) -> StdResult<[u8; 32]> {
    logic_call_checkpoint(gravity_id, call).map_err(|e| StdError::generic_err(e.to_string()))
}

pub fn calls_for_id(storage: &dyn Storage, id: &[u8]) -> StdResult<Vec<OutgoingLogicCall>> {
    LOGIC_CALLS
        .prefix(id)
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, c)| c))
        .collect()
}

pub fn all_logic_calls(storage: &dyn Storage) -> StdResult<Vec<OutgoingLogicCall>> {
    LOGIC_CALLS
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, c)| c))
        .collect()
}

fn remove_logic_call(
    storage: &mut dyn Storage,
    gravity_id: &[u8; 32],
    call: &OutgoingLogicCall,
) -> StdResult<()> {
    LOGIC_CALLS.remove(
        storage,
        (call.invalidation_id.as_slice(), call.invalidation_nonce),
    );
    remove_confirmations(storage, &call_checkpoint(gravity_id, call)?)
}

/// Stamp a call with the next nonce of its invalidation id and store it,
/// dropping whatever was still outstanding under that id.
pub fn schedule_logic_call(
    storage: &mut dyn Storage,
    params: &Params,
    height: u64,
    request: LogicCallRequest,
) -> Result<ScheduledCall, ContractError> {
    let id = invalidation_id_bytes(request.invalidation_id.as_slice())?;
    let gravity_id = params.gravity_id_bytes()?;
    let timeout = match request.timeout {
        Some(timeout) => timeout,
        None => projected_batch_timeout(storage, params, height)?,
    };

    let mut superseded = vec![];
    for outstanding in calls_for_id(storage, &id)? {
        remove_logic_call(storage, &gravity_id, &outstanding)?;
        superseded.push(outstanding.invalidation_nonce);
    }

    let nonce = LAST_INVALIDATION_NONCE
        .may_load(storage, &id)?
        .unwrap_or_default()
        + 1;
    LAST_INVALIDATION_NONCE.save(storage, &id, &nonce)?;

    let call = OutgoingLogicCall {
        transfers: request.transfers,
        fees: request.fees,
        logic_contract_address: request.logic_contract_address,
        payload: request.payload,
        timeout,
        invalidation_id: Binary::from(id.to_vec()),
        invalidation_nonce: nonce,
        block: height,
    };
    let checkpoint = logic_call_checkpoint(&gravity_id, &call)?;

    LOGIC_CALLS.save(storage, (id.as_slice(), nonce), &call)?;
    PAST_CHECKPOINTS.save(
        storage,
        &checkpoint,
        &(
            CheckpointSubject::LogicCall {
                invalidation_id: call.invalidation_id.clone(),
                invalidation_nonce: nonce,
            },
            height,
        ),
    )?;

    Ok(ScheduledCall {
        call,
        checkpoint,
        superseded,
    })
}

/// Ethereum consumed `nonce` under `id`: every call at or below it is dead.
pub fn logic_call_executed(
    storage: &mut dyn Storage,
    params: &Params,
    id: &[u8],
    nonce: u64,
) -> StdResult<Vec<u64>> {
    let gravity_id = params.gravity_id_bytes()?;
    let mut removed = vec![];
    for call in calls_for_id(storage, id)? {
        if call.invalidation_nonce <= nonce {
            remove_logic_call(storage, &gravity_id, &call)?;
            removed.push(call.invalidation_nonce);
        }
    }
    Ok(removed)
}

/// End-block step: drop calls whose timeout Ethereum has already passed.
pub fn cancel_timed_out_logic_calls(
    storage: &mut dyn Storage,
    params: &Params,
) -> StdResult<Vec<(Binary, u64)>> {
    let eth_height = last_observed_eth_height(storage)?.eth_height;
    if eth_height == 0 {
        return Ok(vec![]);
    }
    let gravity_id = params.gravity_id_bytes()?;
    let mut cancelled = vec![];
    for call in all_logic_calls(storage)? {
        if call.timeout < eth_height {
            remove_logic_call(storage, &gravity_id, &call)?;
            cancelled.push((call.invalidation_id, call.invalidation_nonce));
        }
    }
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LastObservedEthHeight, LAST_OBSERVED_ETH_HEIGHT};
    use crate::testing::{observe_eth_height, params, token};
    use common::CodecError;
    use cosmwasm_std::testing::mock_dependencies;
    use cosmwasm_std::Uint256;

    fn request(id: u8, timeout: Option<u64>) -> LogicCallRequest {
        LogicCallRequest {
            transfers: vec![Erc20Token {
                contract: token(1),
                amount: Uint256::from(50u64),
            }],
            fees: vec![Erc20Token {
                contract: token(1),
                amount: Uint256::from(1u64),
            }],
            logic_contract_address: token(9),
            payload: Binary::from(b"payload".to_vec()),
            timeout,
            invalidation_id: Binary::from(vec![id; 32]),
        }
    }

    #[test]
    fn test_nonce_per_invalidation_id() {
        let mut deps = mock_dependencies();
        let params = params();

        let a1 = schedule_logic_call(deps.as_mut().storage, &params, 5, request(1, Some(100)))
            .unwrap();
        let b1 = schedule_logic_call(deps.as_mut().storage, &params, 5, request(2, Some(100)))
            .unwrap();
        assert_eq!(a1.call.invalidation_nonce, 1);
        assert_eq!(b1.call.invalidation_nonce, 1);
        assert!(PAST_CHECKPOINTS.has(deps.as_ref().storage, &a1.checkpoint));

        let a2 = schedule_logic_call(deps.as_mut().storage, &params, 6, request(1, Some(100)))
            .unwrap();
        assert_eq!(a2.call.invalidation_nonce, 2);
        assert_eq!(a2.superseded, vec![1]);

        // the other id is untouched
        assert_eq!(calls_for_id(deps.as_ref().storage, &[2; 32]).unwrap().len(), 1);
        let left = calls_for_id(deps.as_ref().storage, &[1; 32]).unwrap();
        assert_eq!(left, vec![a2.call]);
    }

    #[test]
    fn test_invalidation_id_must_be_32_bytes() {
        let mut deps = mock_dependencies();
        let mut req = request(1, Some(100));
        req.invalidation_id = Binary::from(vec![1; 20]);
        let err = schedule_logic_call(deps.as_mut().storage, &params(), 5, req).unwrap_err();
        assert_eq!(
            err,
            ContractError::Codec(CodecError::InvalidInvalidationId { len: 20 })
        );
    }

    #[test]
    fn test_default_timeout_uses_projection() {
        let mut deps = mock_dependencies();
        let err = schedule_logic_call(deps.as_mut().storage, &params(), 5, request(1, None))
            .unwrap_err();
        assert_eq!(err, ContractError::NoEthHeightObserved);
        assert!(!LAST_INVALIDATION_NONCE.has(deps.as_ref().storage, &[1u8; 32][..]));

        // 15 host blocks * 5s = 75s = 5 Ethereum blocks, plus the 4 block horizon
        observe_eth_height(deps.as_mut().storage, 200, 5);
        let scheduled =
            schedule_logic_call(deps.as_mut().storage, &params(), 20, request(1, None)).unwrap();
        assert_eq!(scheduled.call.timeout, 209);
        assert_eq!(scheduled.call.invalidation_nonce, 1);
    }

    #[test]
    fn test_executed_removes_up_to_nonce() {
        let mut deps = mock_dependencies();
        let params = params();
        schedule_logic_call(deps.as_mut().storage, &params, 5, request(1, Some(100))).unwrap();
        // keep an older call around next to the newer one
        let old = calls_for_id(deps.as_ref().storage, &[1; 32]).unwrap().remove(0);
        schedule_logic_call(deps.as_mut().storage, &params, 6, request(1, Some(100))).unwrap();
        LOGIC_CALLS
            .save(deps.as_mut().storage, (&[1u8; 32][..], 1), &old)
            .unwrap();

        let removed = logic_call_executed(deps.as_mut().storage, &params, &[1; 32], 1).unwrap();
        assert_eq!(removed, vec![1]);
        let left = calls_for_id(deps.as_ref().storage, &[1; 32]).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].invalidation_nonce, 2);
    }

    #[test]
    fn test_timed_out_calls_cancelled() {
        let mut deps = mock_dependencies();
        let params = params();
        schedule_logic_call(deps.as_mut().storage, &params, 5, request(1, Some(10))).unwrap();
        schedule_logic_call(deps.as_mut().storage, &params, 5, request(2, Some(500))).unwrap();

        // nothing observed yet: nothing can be judged timed out
        assert!(cancel_timed_out_logic_calls(deps.as_mut().storage, &params)
            .unwrap()
            .is_empty());

        LAST_OBSERVED_ETH_HEIGHT
            .save(
                deps.as_mut().storage,
                &LastObservedEthHeight {
                    eth_height: 11,
                    host_height: 5,
                },
            )
            .unwrap();
        let cancelled = cancel_timed_out_logic_calls(deps.as_mut().storage, &params).unwrap();
        assert_eq!(cancelled, vec![(Binary::from(vec![1; 32]), 1)]);
        assert_eq!(all_logic_calls(deps.as_ref().storage).unwrap().len(), 1);
    }
}
