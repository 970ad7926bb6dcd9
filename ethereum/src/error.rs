use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Reverts of the Gravity contract, with the operands that decided them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GravityError {
    #[error("InvalidSignature: signature {index} does not recover to its validator")]
    InvalidSignature { index: usize },

    #[error("InvalidValsetNonce: new nonce {new_nonce}, current nonce {current_nonce}")]
    InvalidValsetNonce {
        new_nonce: U256,
        current_nonce: U256,
    },

    #[error("InvalidBatchNonce: new nonce {new_nonce}, current nonce {current_nonce}")]
    InvalidBatchNonce {
        new_nonce: U256,
        current_nonce: U256,
    },

    #[error("InvalidLogicCallNonce: new nonce {new_nonce}, current nonce {current_nonce}")]
    InvalidLogicCallNonce {
        new_nonce: U256,
        current_nonce: U256,
    },

    #[error("InvalidLogicCallTransfers: amounts and token contracts differ in length")]
    InvalidLogicCallTransfers,

    #[error("InvalidLogicCallFees: amounts and token contracts differ in length")]
    InvalidLogicCallFees,

    #[error("InvalidSendToCosmos")]
    InvalidSendToCosmos,

    #[error("IncorrectCheckpoint: supplied validator set is not the one on file")]
    IncorrectCheckpoint,

    #[error("MalformedNewValidatorSet")]
    MalformedNewValidatorSet,

    #[error(
        "MalformedCurrentValidatorSet: {validators} validators, {powers} powers, {signatures} signatures"
    )]
    MalformedCurrentValidatorSet {
        validators: usize,
        powers: usize,
        signatures: usize,
    },

    #[error("MalformedBatch")]
    MalformedBatch,

    #[error("InsufficientPower: {cumulative_power} signed, {power_threshold} required")]
    InsufficientPower {
        cumulative_power: U256,
        power_threshold: U256,
    },

    #[error("BatchTimedOut")]
    BatchTimedOut,

    #[error("LogicCallTimedOut")]
    LogicCallTimedOut,

    #[error("insufficient balance of {token} for {holder}: have {have}, need {need}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        have: U256,
        need: U256,
    },

    #[error("invalidation id must be 32 bytes, got {len}")]
    InvalidInvalidationId { len: usize },

    #[error("logic call reverted: {reason}")]
    LogicCallReverted { reason: String },
}

/// Failure classes shared with the host-side verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedValidatorSet,
    IncorrectCheckpoint,
    InvalidSignature,
    InsufficientPower,
    InvalidNonce,
    TimedOut,
    InvalidArguments,
    ExecutionFailed,
}

impl GravityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GravityError::MalformedNewValidatorSet
            | GravityError::MalformedCurrentValidatorSet { .. } => ErrorKind::MalformedValidatorSet,
            GravityError::IncorrectCheckpoint => ErrorKind::IncorrectCheckpoint,
            GravityError::InvalidSignature { .. } => ErrorKind::InvalidSignature,
            GravityError::InsufficientPower { .. } => ErrorKind::InsufficientPower,
            GravityError::InvalidValsetNonce { .. }
            | GravityError::InvalidBatchNonce { .. }
            | GravityError::InvalidLogicCallNonce { .. } => ErrorKind::InvalidNonce,
            GravityError::BatchTimedOut | GravityError::LogicCallTimedOut => ErrorKind::TimedOut,
            GravityError::InvalidLogicCallTransfers
            | GravityError::InvalidLogicCallFees
            | GravityError::InvalidSendToCosmos
            | GravityError::MalformedBatch
            | GravityError::InvalidInvalidationId { .. } => ErrorKind::InvalidArguments,
            GravityError::InsufficientBalance { .. } | GravityError::LogicCallReverted { .. } => {
                ErrorKind::ExecutionFailed
            }
        }
    }
}
