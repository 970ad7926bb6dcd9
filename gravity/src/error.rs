//! Error types for the Gravity bridge contract

use cosmwasm_std::{StdError, Uint128};
use thiserror::Error;

use common::{CodecError, SignatureCheckError};

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Verify(#[from] SignatureCheckError),

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Validator {validator} is not bonded")]
    ValidatorNotBonded { validator: String },

    #[error("{orchestrator} is not a registered orchestrator")]
    UnknownOrchestrator { orchestrator: String },

    #[error("Delegate key already in use: {key}")]
    DelegateKeyInUse { key: String },

    #[error("Validator {validator} already registered its delegate keys")]
    KeysAlreadySet { validator: String },

    #[error("Ethereum address must not be zero")]
    ZeroEthAddress,

    // ========================================================================
    // Parameter Errors
    // ========================================================================

    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("Bridge is not active")]
    BridgeInactive,

    // ========================================================================
    // Attestation Errors
    // ========================================================================

    #[error("Invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("Duplicate vote by {validator} for event nonce {event_nonce}")]
    DuplicateVote { validator: String, event_nonce: u64 },

    #[error("Invalid claim: {reason}")]
    InvalidClaim { reason: String },

    // ========================================================================
    // Outgoing Errors
    // ========================================================================

    #[error("Token not registered for bridging: {token}")]
    TokenNotRegistered { token: String },

    #[error("Token already registered: {token}")]
    TokenAlreadyRegistered { token: String },

    #[error("Destination {dest} is blacklisted")]
    BlacklistedDestination { dest: String },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Chain fee too low: minimum {min}, got {got}")]
    ChainFeeTooLow { min: Uint128, got: Uint128 },

    #[error("Outgoing transfer {id} not found in the unbatched pool")]
    TransferNotFound { id: u64 },

    #[error("No unbatched transfers for token {token}")]
    NoUnbatchedTransfers { token: String },

    #[error("No Ethereum height observed yet; timeouts cannot be projected")]
    NoEthHeightObserved,

    #[error("New batch would not pay more fees than batch {nonce} already in flight")]
    BatchNotMoreProfitable { nonce: u64 },

    // ========================================================================
    // Confirmation Errors
    // ========================================================================

    #[error("{artifact} not found")]
    ArtifactNotFound { artifact: String },

    #[error("Invalid signature: does not recover to {expected}")]
    InvalidSignature { expected: String },

    #[error("Confirmation by {validator} already recorded")]
    DuplicateConfirmation { validator: String },

    // ========================================================================
    // Evidence Errors
    // ========================================================================

    #[error("Checkpoint {checkpoint} was produced by this chain; signing it is not misbehaviour")]
    CheckpointIsLegitimate { checkpoint: String },

    #[error("Signature does not recover to any registered validator key")]
    UnknownSigner,

    #[error("Evidence already submitted")]
    DuplicateEvidence,

    // ========================================================================
    // Validation Errors
    // ========================================================================

    #[error("Invalid hash length: expected 32 bytes, got {got}")]
    InvalidHashLength { got: usize },

    #[error("Unknown reply id {id}")]
    UnknownReply { id: u64 },
}
