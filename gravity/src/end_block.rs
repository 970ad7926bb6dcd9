//! Block-level processing driven by the host through `SudoMsg::EndBlock`.
//!
//! Steps run in the fixed order of [`END_BLOCK_STEPS`]; each returns a
//! response fragment that is merged into the end-block response.

use cosmwasm_std::{DepsMut, Env, Response};

use crate::attestation::{prune_attestations, tally_attestations};
use crate::batch::cancel_timed_out_batches;
use crate::error::ContractError;
use crate::hooks::HookOutbox;
use crate::logic_call::cancel_timed_out_logic_calls;
use crate::msg::ValidatorPower;
use crate::slashing::report_missed_confirmations;
use crate::state::{Params, PARAMS};
use crate::valset::{create_valsets, prune_valsets, update_bonded_validators};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBlockStep {
    /// Report validators that let a signing window close
    ReportMissedConfirmations,
    /// Observe and apply attested Ethereum events
    TallyAttestations,
    /// Return timed-out batches to the pool and drop timed-out logic calls
    CancelTimedOutOutgoing,
    CreateValsets,
    PruneValsets,
    PruneAttestations,
}

impl EndBlockStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndBlockStep::ReportMissedConfirmations => "report_missed_confirmations",
            EndBlockStep::TallyAttestations => "tally_attestations",
            EndBlockStep::CancelTimedOutOutgoing => "cancel_timed_out_outgoing",
            EndBlockStep::CreateValsets => "create_valsets",
            EndBlockStep::PruneValsets => "prune_valsets",
            EndBlockStep::PruneAttestations => "prune_attestations",
        }
    }
}

/// Missed confirmations are reported before anything is pruned, and events
/// are tallied before timeouts are judged against the freshly observed height.
pub const END_BLOCK_STEPS: [EndBlockStep; 6] = [
    EndBlockStep::ReportMissedConfirmations,
    EndBlockStep::TallyAttestations,
    EndBlockStep::CancelTimedOutOutgoing,
    EndBlockStep::CreateValsets,
    EndBlockStep::PruneValsets,
    EndBlockStep::PruneAttestations,
];

/// Record the host's bonded set, then run `steps` in order.
pub fn end_blocker(
    mut deps: DepsMut,
    env: &Env,
    validators: Vec<ValidatorPower>,
    steps: &[EndBlockStep],
) -> Result<Response, ContractError> {
    let unbonded =
        update_bonded_validators(deps.storage, deps.api, env.block.height, validators)?;
    let params = PARAMS.load(deps.storage)?;

    let mut response = Response::new()
        .add_attribute("method", "end_block")
        .add_attribute("height", env.block.height.to_string());
    if unbonded {
        response = response.add_attribute("validator_unbonded", "true");
    }

    for step in steps {
        let fragment = run_step(deps.branch(), env, &params, *step)?;
        response = merge(response, fragment);
    }
    Ok(response)
}

fn run_step(
    deps: DepsMut,
    env: &Env,
    params: &Params,
    step: EndBlockStep,
) -> Result<Response, ContractError> {
    match step {
        EndBlockStep::ReportMissedConfirmations => {
            let mut outbox = HookOutbox::default();
            let reported = report_missed_confirmations(deps.storage, env, params, &mut outbox)?;
            Ok(outbox
                .into_response()
                .add_attribute("missed_confirmations", reported.to_string()))
        }
        EndBlockStep::TallyAttestations => tally_attestations(deps, env, params),
        EndBlockStep::CancelTimedOutOutgoing => {
            let batches = cancel_timed_out_batches(deps.storage, params)?;
            let calls = cancel_timed_out_logic_calls(deps.storage, params)?;
            let mut response = Response::new();
            for (token, nonce) in batches {
                response = response.add_attribute("batch_timed_out", format!("{}:{}", token, nonce));
            }
            for (id, nonce) in calls {
                response = response.add_attribute(
                    "logic_call_timed_out",
                    format!("0x{}:{}", hex::encode(id.as_slice()), nonce),
                );
            }
            Ok(response)
        }
        EndBlockStep::CreateValsets => {
            let mut outbox = HookOutbox::default();
            let created = create_valsets(deps.storage, env, params, &mut outbox)?;
            let mut response = outbox.into_response();
            if let Some(valset) = created {
                response = response.add_attribute("valset_created", valset.nonce.to_string());
            }
            Ok(response)
        }
        EndBlockStep::PruneValsets => {
            let pruned = prune_valsets(deps.storage, params, env.block.height)?;
            Ok(Response::new().add_attribute("valsets_pruned", pruned.to_string()))
        }
        EndBlockStep::PruneAttestations => {
            let pruned = prune_attestations(deps.storage)?;
            Ok(Response::new().add_attribute("attestations_pruned", pruned.to_string()))
        }
    }
}

/// Append `from`'s messages, attributes and events to `into`.
pub fn merge(into: Response, from: Response) -> Response {
    into.add_submessages(from.messages)
        .add_attributes(from.attributes)
        .add_events(from.events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LATEST_VALSET_NONCE;
    use crate::testing::{params, register_keys, token};
    use cosmwasm_std::testing::{mock_dependencies, mock_env};

    #[test]
    fn test_step_order_is_fixed() {
        assert_eq!(END_BLOCK_STEPS[0], EndBlockStep::ReportMissedConfirmations);
        assert_eq!(END_BLOCK_STEPS[1], EndBlockStep::TallyAttestations);
        assert_eq!(END_BLOCK_STEPS[3], EndBlockStep::CreateValsets);
    }

    #[test]
    fn test_end_blocker_creates_first_valset() {
        let mut deps = mock_dependencies();
        let env = mock_env();
        PARAMS.save(deps.as_mut().storage, &params()).unwrap();
        register_keys(deps.as_mut().storage, "val1", token(1));

        let res = end_blocker(
            deps.as_mut(),
            &env,
            vec![ValidatorPower {
                operator: "val1".to_string(),
                power: 5,
            }],
            &END_BLOCK_STEPS,
        )
        .unwrap();
        assert_eq!(LATEST_VALSET_NONCE.load(deps.as_ref().storage).unwrap(), 1);
        // one hook call for the new valset
        assert_eq!(res.messages.len(), 1);
        assert!(res
            .events
            .iter()
            .any(|e| e.ty == "gravity_valset_created"));
    }

    #[test]
    fn test_steps_can_be_selected() {
        let mut deps = mock_dependencies();
        let env = mock_env();
        PARAMS.save(deps.as_mut().storage, &params()).unwrap();
        register_keys(deps.as_mut().storage, "val1", token(1));

        end_blocker(
            deps.as_mut(),
            &env,
            vec![ValidatorPower {
                operator: "val1".to_string(),
                power: 5,
            }],
            &[EndBlockStep::TallyAttestations],
        )
        .unwrap();
        assert!(LATEST_VALSET_NONCE
            .may_load(deps.as_ref().storage)
            .unwrap()
            .is_none());
    }
}
