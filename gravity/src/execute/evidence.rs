use cosmwasm_std::{DepsMut, Env, Response};

use common::EthSignature;

use crate::error::ContractError;
use crate::hooks::HookOutbox;
use crate::msg::EvidenceSubject;
use crate::slashing::submit_bad_signature_evidence;
use crate::state::PARAMS;

/// Anyone may submit evidence; the hooks decide what to do with the offender.
pub fn execute_submit_bad_signature_evidence(
    deps: DepsMut,
    env: Env,
    subject: EvidenceSubject,
    signature: EthSignature,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let mut outbox = HookOutbox::default();
    let validator = submit_bad_signature_evidence(
        deps.storage,
        deps.api,
        &params,
        env.block.height,
        &subject,
        &signature,
        &mut outbox,
    )?;

    let kind = match subject {
        EvidenceSubject::Valset(_) => "valset",
        EvidenceSubject::Batch(_) => "batch",
        EvidenceSubject::LogicCall(_) => "logic_call",
    };
    Ok(outbox
        .into_response()
        .add_attribute("method", "submit_bad_signature_evidence")
        .add_attribute("subject", kind)
        .add_attribute("validator", validator))
}
