//! Delivery of [`GravityHookMsg`] notifications to `params.hooks`.
//!
//! Hooks are how slashing, reward and accounting logic outside this contract
//! learns about valset creation and validator misbehaviour. Each event becomes
//! one `WasmMsg::Execute` per hook, in list order, plus an event attribute.
//!
//! Hook calls are sub-messages replying on error only. A hook that fails has
//! its own changes reverted and is reported through an event; the block or
//! message that raised the notification still commits.

use cosmwasm_std::{
    to_json_binary, Binary, DepsMut, Event, Reply, Response, StdResult, SubMsg, SubMsgResult,
    WasmMsg,
};

use crate::error::ContractError;
use crate::msg::{GravityHookMsg, HookExecuteMsg};
use crate::state::{Params, PARAMS};

/// Reply ids at or above this belong to hook calls; the offset is the hook's
/// position in `params.hooks`. Ids below it are deposit credits keyed by
/// event nonce.
pub const HOOK_REPLY_ID_BASE: u64 = 1 << 63;

pub fn is_hook_reply(id: u64) -> bool {
    id >= HOOK_REPLY_ID_BASE
}

/// Fan a hook event out to every registered hook contract.
pub fn hook_messages(params: &Params, event: &GravityHookMsg) -> StdResult<Vec<SubMsg>> {
    let msg = to_json_binary(&HookExecuteMsg::GravityHook(event.clone()))?;
    Ok(params
        .hooks
        .iter()
        .enumerate()
        .map(|(index, hook)| {
            SubMsg::reply_on_error(
                WasmMsg::Execute {
                    contract_addr: hook.to_string(),
                    msg: msg.clone(),
                    funds: vec![],
                },
                HOOK_REPLY_ID_BASE + index as u64,
            )
        })
        .collect())
}

/// Reply for a failed hook call. Never errors on the failure itself, so the
/// caller's state survives.
pub fn hook_reply(deps: DepsMut, reply: Reply) -> Result<Response, ContractError> {
    let index = reply
        .id
        .checked_sub(HOOK_REPLY_ID_BASE)
        .ok_or(ContractError::UnknownReply { id: reply.id })?;
    let SubMsgResult::Err(reason) = reply.result else {
        return Ok(Response::new());
    };
    let hook = PARAMS
        .load(deps.storage)?
        .hooks
        .get(index as usize)
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| format!("#{}", index));
    Ok(Response::new()
        .add_attribute("action", "hook_reply")
        .add_event(
            Event::new("gravity_hook_failed")
                .add_attribute("hook", hook)
                .add_attribute("reason", reason),
        ))
}

/// Typed event mirroring a hook notification, emitted even when no hook is set.
pub fn hook_event(event: &GravityHookMsg) -> Event {
    match event {
        GravityHookMsg::ValsetCreated { nonce, checkpoint } => Event::new("gravity_valset_created")
            .add_attribute("nonce", nonce.to_string())
            .add_attribute("checkpoint", hex_binary(checkpoint)),
        GravityHookMsg::MissedConfirmation {
            validator,
            checkpoint,
            kind,
        } => Event::new("gravity_missed_confirmation")
            .add_attribute("validator", validator)
            .add_attribute("checkpoint", hex_binary(checkpoint))
            .add_attribute("kind", kind.as_str()),
        GravityHookMsg::ConflictingClaim {
            validator,
            event_nonce,
        } => Event::new("gravity_conflicting_claim")
            .add_attribute("validator", validator)
            .add_attribute("event_nonce", event_nonce.to_string()),
        GravityHookMsg::BadSignatureEvidence {
            validator,
            checkpoint,
        } => Event::new("gravity_bad_signature_evidence")
            .add_attribute("validator", validator)
            .add_attribute("checkpoint", hex_binary(checkpoint)),
    }
}

fn hex_binary(bytes: &Binary) -> String {
    format!("0x{}", hex::encode(bytes.as_slice()))
}

/// Collects hook notifications raised while handling one message.
#[derive(Default)]
pub struct HookOutbox {
    pub messages: Vec<SubMsg>,
    pub events: Vec<Event>,
}

impl HookOutbox {
    pub fn push(&mut self, params: &Params, event: GravityHookMsg) -> StdResult<()> {
        self.messages.extend(hook_messages(params, &event)?);
        self.events.push(hook_event(&event));
        Ok(())
    }

    pub fn into_response(self) -> Response {
        Response::new()
            .add_submessages(self.messages)
            .add_events(self.events)
    }
}
