//! Common - Shared Types and Checkpoint Logic for the Gravity Bridge
//!
//! Everything both sides of the bridge must agree on lives here: the
//! Ethereum-facing value types, the ABI checkpoint codec, validator set
//! normalization, and the signature threshold check.

pub mod codec;
pub mod types;
pub mod valset;
pub mod verify;

pub use codec::{
    batch_checkpoint, bytes32_to_hex, eth_signed_message_hash, keccak256, logic_call_checkpoint,
    string_to_bytes32, valset_checkpoint, CodecError,
};
pub use types::{
    Erc20Token, EthAddress, EthSignature, OutgoingLogicCall, OutgoingTransferTx, OutgoingTxBatch,
    TypeError,
};
pub use valset::{
    normalize_powers, power_diff_bps, sort_members, Valset, ValsetError, ValsetMember,
    POWER_THRESHOLD, TOTAL_NORMALIZED_POWER,
};
pub use verify::{
    check_validator_signatures, verify_signed_artifact, ApiRecovery, SignatureCheckError,
    SignerRecovery,
};
