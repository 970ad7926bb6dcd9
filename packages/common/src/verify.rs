//! Threshold verification of validator signatures over a checkpoint.
//!
//! A checkpoint is accepted when the current validator set is the one on file
//! and the members whose signatures recover correctly hold at least the
//! threshold of normalized power. Signer slots carrying the absent sentinel
//! are skipped; any present signature that fails to recover to its slot's
//! address rejects the whole submission.

use cosmwasm_std::Api;
use thiserror::Error;

use crate::codec::{bytes32_to_hex, eth_signed_message_hash, keccak256, valset_checkpoint};
use crate::types::{EthAddress, EthSignature};
use crate::valset::{Valset, POWER_THRESHOLD};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureCheckError {
    #[error(
        "malformed validator set: {addresses} addresses, {powers} powers, {signatures} signatures"
    )]
    MalformedValidatorSet {
        addresses: usize,
        powers: usize,
        signatures: usize,
    },

    #[error("incorrect checkpoint: supplied set hashes to {supplied}, expected {expected}")]
    IncorrectCheckpoint { supplied: String, expected: String },

    #[error("invalid signature at position {index}: does not recover to {expected}")]
    InvalidSignature { index: usize, expected: EthAddress },

    #[error("insufficient power: {cumulative_power} signed, {power_threshold} required")]
    InsufficientPower {
        cumulative_power: u64,
        power_threshold: u64,
    },
}

/// Recovers the Ethereum address that produced `signature` over `digest`.
pub trait SignerRecovery {
    fn recover_signer(&self, digest: &[u8; 32], signature: &EthSignature) -> Option<EthAddress>;
}

impl<F> SignerRecovery for F
where
    F: Fn(&[u8; 32], &EthSignature) -> Option<EthAddress>,
{
    fn recover_signer(&self, digest: &[u8; 32], signature: &EthSignature) -> Option<EthAddress> {
        self(digest, signature)
    }
}

/// Recovery through the host chain's secp256k1 precompile.
pub struct ApiRecovery<'a>(pub &'a dyn Api);

impl SignerRecovery for ApiRecovery<'_> {
    fn recover_signer(&self, digest: &[u8; 32], signature: &EthSignature) -> Option<EthAddress> {
        let recovery_param = signature.recovery_id()?;
        let pubkey = self
            .0
            .secp256k1_recover_pubkey(digest, &signature.rs(), recovery_param)
            .ok()?;
        pubkey_to_address(&pubkey)
    }
}

/// Ethereum address of a 65-byte uncompressed secp256k1 public key.
pub fn pubkey_to_address(pubkey: &[u8]) -> Option<EthAddress> {
    if pubkey.len() != 65 || pubkey[0] != 0x04 {
        return None;
    }
    let hash = keccak256(&pubkey[1..]);
    EthAddress::from_slice(&hash[12..]).ok()
}

/// Whether `signature` is a valid signature by `signer` over `checkpoint`
/// (wrapped in the Ethereum signed-message prefix).
pub fn signature_matches<R: SignerRecovery + ?Sized>(
    recovery: &R,
    checkpoint: &[u8; 32],
    signature: &EthSignature,
    signer: &EthAddress,
) -> bool {
    if signature.is_absent() {
        return false;
    }
    let digest = eth_signed_message_hash(checkpoint);
    recovery.recover_signer(&digest, signature).as_ref() == Some(signer)
}

/// Sum the power of every present, valid signature and compare it to
/// `threshold`. Returns the signed power on success.
pub fn check_validator_signatures<R: SignerRecovery + ?Sized>(
    recovery: &R,
    addresses: &[EthAddress],
    powers: &[u64],
    signatures: &[EthSignature],
    checkpoint: &[u8; 32],
    threshold: u64,
) -> Result<u64, SignatureCheckError> {
    if addresses.len() != powers.len() || addresses.len() != signatures.len() {
        return Err(SignatureCheckError::MalformedValidatorSet {
            addresses: addresses.len(),
            powers: powers.len(),
            signatures: signatures.len(),
        });
    }

    let mut cumulative_power: u64 = 0;
    for (index, ((addr, power), sig)) in addresses.iter().zip(powers).zip(signatures).enumerate() {
        if sig.is_absent() {
            continue;
        }
        if !signature_matches(recovery, checkpoint, sig, addr) {
            return Err(SignatureCheckError::InvalidSignature {
                index,
                expected: *addr,
            });
        }
        cumulative_power = cumulative_power.saturating_add(*power);
    }

    if cumulative_power < threshold {
        return Err(SignatureCheckError::InsufficientPower {
            cumulative_power,
            power_threshold: threshold,
        });
    }
    Ok(cumulative_power)
}

/// Full acceptance check for a signed artifact: `current` must hash to
/// `checkpoint_on_file`, then its members must sign `artifact_checkpoint`
/// with at least [`POWER_THRESHOLD`].
pub fn verify_signed_artifact<R: SignerRecovery + ?Sized>(
    recovery: &R,
    gravity_id: &[u8; 32],
    current: &Valset,
    signatures: &[EthSignature],
    checkpoint_on_file: &[u8; 32],
    artifact_checkpoint: &[u8; 32],
) -> Result<u64, SignatureCheckError> {
    let supplied = valset_checkpoint(gravity_id, current);
    if &supplied != checkpoint_on_file {
        return Err(SignatureCheckError::IncorrectCheckpoint {
            supplied: bytes32_to_hex(&supplied),
            expected: bytes32_to_hex(checkpoint_on_file),
        });
    }
    check_validator_signatures(
        recovery,
        &current.addresses(),
        &current.powers(),
        signatures,
        artifact_checkpoint,
        POWER_THRESHOLD,
    )
}
