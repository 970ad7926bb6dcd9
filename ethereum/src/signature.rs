//! `ecrecover` for validator signatures.

use alloy::primitives::{eip191_hash_message, keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use tracing::debug;

use crate::abi::Signature;
use crate::error::GravityError;

/// Address that produced `sig` over the prehashed `digest`, if any.
pub fn recover(digest: &B256, sig: &Signature) -> Option<Address> {
    let recid = RecoveryId::from_byte(sig.v.checked_sub(27)?)?;
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(sig.r.as_slice());
    rs[32..].copy_from_slice(sig.s.as_slice());
    let signature = EcdsaSignature::from_slice(&rs).ok()?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recid).ok()?;
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Some(Address::from_slice(&hash[12..]))
}

/// Whether `signer` signed `hash` under the Ethereum signed-message prefix.
pub fn verify_sig(signer: Address, hash: &B256, sig: &Signature) -> bool {
    let digest = eip191_hash_message(hash);
    recover(&digest, sig) == Some(signer)
}

/// Sum the power behind every present signature over `hash` and require at
/// least `power_threshold`. Slots with `v == 0` are skipped; a present
/// signature from anyone but its slot's validator rejects the call.
///
/// Lengths must already match; see `Gravity::validate_current_valset`.
pub fn check_validator_signatures(
    validators: &[Address],
    powers: &[U256],
    sigs: &[Signature],
    hash: &B256,
    power_threshold: U256,
) -> Result<U256, GravityError> {
    let mut cumulative_power = U256::ZERO;
    for (index, ((validator, power), sig)) in validators.iter().zip(powers).zip(sigs).enumerate() {
        if sig.is_absent() {
            continue;
        }
        if !verify_sig(*validator, hash, sig) {
            debug!(index, validator = %validator, "Signature does not match validator");
            return Err(GravityError::InvalidSignature { index });
        }
        cumulative_power = cumulative_power.saturating_add(*power);
    }

    if cumulative_power < power_threshold {
        return Err(GravityError::InsufficientPower {
            cumulative_power,
            power_threshold,
        });
    }
    Ok(cumulative_power)
}
