//! Checkpoints as the Ethereum contract computes them
//!
//! `abi.encode` of the domain tag, a method name and the artifact fields,
//! hashed with keccak256. Encoded through alloy's `SolValue`, independently
//! of the hand-written codec the host uses; both must agree byte for byte.

use alloy::primitives::{keccak256, Address, FixedBytes, B256, U256};
use alloy::sol_types::SolValue;

use crate::abi::{BatchArgs, LogicCallArgs, ValsetArgs};

/// `bytes32` with `s` left-aligned, as Solidity converts short string literals.
/// Longer input is truncated to 32 bytes.
pub fn bytes32_tag(s: &str) -> B256 {
    let mut out = [0u8; 32];
    let len = s.len().min(32);
    out[..len].copy_from_slice(&s.as_bytes()[..len]);
    FixedBytes::from(out)
}

pub fn encode_valset(gravity_id: B256, valset: &ValsetArgs) -> Vec<u8> {
    (
        gravity_id,
        bytes32_tag("checkpoint"),
        valset.valsetNonce,
        valset.validators.clone(),
        valset.powers.clone(),
        valset.rewardAmount,
        valset.rewardToken,
    )
        .abi_encode_params()
}

pub fn make_checkpoint(gravity_id: B256, valset: &ValsetArgs) -> B256 {
    keccak256(encode_valset(gravity_id, valset))
}

pub fn encode_batch(gravity_id: B256, batch: &BatchArgs) -> Vec<u8> {
    (
        gravity_id,
        bytes32_tag("transactionBatch"),
        batch.amounts.clone(),
        batch.destinations.clone(),
        batch.fees.clone(),
        batch.batchNonce,
        batch.tokenContract,
        batch.batchTimeout,
    )
        .abi_encode_params()
}

pub fn batch_checkpoint(gravity_id: B256, batch: &BatchArgs) -> B256 {
    keccak256(encode_batch(gravity_id, batch))
}

pub fn encode_logic_call(gravity_id: B256, call: &LogicCallArgs) -> Vec<u8> {
    (
        gravity_id,
        bytes32_tag("logicCall"),
        call.transferAmounts.clone(),
        call.transferTokenContracts.clone(),
        call.feeAmounts.clone(),
        call.feeTokenContracts.clone(),
        call.logicContractAddress,
        call.payload.clone(),
        call.timeOut,
        call.invalidationId,
        call.invalidationNonce,
    )
        .abi_encode_params()
}

pub fn logic_call_checkpoint(gravity_id: B256, call: &LogicCallArgs) -> B256 {
    keccak256(encode_logic_call(gravity_id, call))
}

/// Address of the `index`-th token deployed by the contract at `deployer`.
pub fn deployed_token_address(deployer: Address, index: u64) -> Address {
    let hash = keccak256((deployer, U256::from(index)).abi_encode_params());
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes32_tag() {
        let tag = bytes32_tag("transactionBatch");
        assert_eq!(&tag[..16], b"transactionBatch");
        assert_eq!(&tag[16..], &[0u8; 16]);
        assert_eq!(bytes32_tag(&"x".repeat(40)), FixedBytes::from([b'x'; 32]));
    }

    #[test]
    fn test_valset_layout() {
        let valset = ValsetArgs {
            validators: vec![Address::repeat_byte(1)],
            powers: vec![U256::from(3333u64)],
            valsetNonce: U256::ZERO,
            rewardAmount: U256::ZERO,
            rewardToken: Address::ZERO,
        };
        let encoded = encode_valset(bytes32_tag("foo"), &valset);
        // 7 head words, then two arrays of one element each
        assert_eq!(encoded.len(), 11 * 32);
        // offset of the validators array
        assert_eq!(encoded[3 * 32 + 31], 7 * 32);
    }

    #[test]
    fn test_deployed_addresses_differ() {
        let deployer = Address::repeat_byte(0xee);
        assert_ne!(
            deployed_token_address(deployer, 0),
            deployed_token_address(deployer, 1)
        );
    }
}
