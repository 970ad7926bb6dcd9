//! Message types for the Gravity bridge contract
//!
//! Instantiation, execution, host-driven sudo calls, queries and the
//! messages this contract sends to registered hook contracts.

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Binary, Uint128, Uint256};

use common::{
    Erc20Token, EthAddress, EthSignature, OutgoingLogicCall, OutgoingTransferTx, OutgoingTxBatch,
    Valset,
};

use crate::state::{
    Attestation, Confirmation, ConflictingVote, DelegateKeys, EthereumClaim, FailedCredit,
    LocalToken, Params,
};

// ============================================================================
// Instantiate & Migrate
// ============================================================================

/// Migrate message
#[cw_serde]
pub struct MigrateMsg {}

#[cw_serde]
pub struct InstantiateMsg {
    pub gravity_id: String,
    pub bridge_ethereum_address: EthAddress,
    pub bridge_chain_id: u64,
    pub fee_collector: String,
    /// Hook contracts, notified in this order
    pub hooks: Vec<String>,
    pub logic_call_schedulers: Vec<String>,
    /// Bonded set at genesis; later snapshots arrive with every end-block
    pub validators: Vec<ValidatorPower>,
    /// Overrides for the default windows, timings and limits
    pub params: Option<ParamsUpdate>,
}

/// Raw stake of one bonded validator, as reported by the host.
#[cw_serde]
pub struct ValidatorPower {
    pub operator: String,
    pub power: u64,
}

/// Every field is optional; `None` leaves the current value untouched.
#[cw_serde]
#[derive(Default)]
pub struct ParamsUpdate {
    pub bridge_ethereum_address: Option<EthAddress>,
    pub bridge_chain_id: Option<u64>,
    pub signed_valsets_window: Option<u64>,
    pub signed_batches_window: Option<u64>,
    pub signed_logic_calls_window: Option<u64>,
    pub target_batch_timeout: Option<u64>,
    pub average_block_time: Option<u64>,
    pub average_ethereum_block_time: Option<u64>,
    pub batch_size_limit: Option<u32>,
    pub valset_change_threshold_bps: Option<u64>,
    pub valset_reward: Option<Option<Erc20Token>>,
    pub ethereum_blacklist: Option<Vec<EthAddress>>,
    pub min_chain_fee_basis_points: Option<u64>,
    pub fee_collector: Option<String>,
    pub logic_call_schedulers: Option<Vec<String>>,
    pub hooks: Option<Vec<String>>,
}

// ============================================================================
// Execute Messages
// ============================================================================

#[cw_serde]
pub enum ExecuteMsg {
    // ========================================================================
    // Validators
    // ========================================================================
    /// Register the orchestrator account and Ethereum key acting for a validator
    ///
    /// Authorization: bonded validator operator
    SetOrchestratorAddress {
        orchestrator: String,
        eth_address: EthAddress,
    },

    /// Submit an observed Ethereum event for attestation
    ///
    /// Authorization: registered orchestrator of a bonded validator
    SubmitClaim { claim: EthereumClaim },

    /// Sign a stored valset
    ValsetConfirm {
        nonce: u64,
        signature: EthSignature,
    },

    /// Sign an in-flight batch
    ConfirmBatch {
        token_contract: EthAddress,
        nonce: u64,
        signature: EthSignature,
    },

    /// Sign an outstanding logic call
    ConfirmLogicCall {
        invalidation_id: Binary,
        invalidation_nonce: u64,
        signature: EthSignature,
    },

    // ========================================================================
    // Users & Relayers
    // ========================================================================
    /// Queue a transfer to Ethereum, paying in the native denom sent along
    ///
    /// Funds must equal `amount + bridge_fee + chain_fee` of a single denom.
    SendToEth {
        eth_dest: EthAddress,
        amount: Uint128,
        bridge_fee: Uint128,
        chain_fee: Uint128,
    },

    /// cw20 voucher entry point (see [`ReceiveMsg`])
    Receive(cw20::Cw20ReceiveMsg),

    /// Withdraw a transfer that has not been batched yet
    ///
    /// Authorization: original sender
    CancelSendToEth { transaction_id: u64 },

    /// Build a batch for a token from the unbatched pool
    RequestBatch { token_contract: EthAddress },

    /// Queue an arbitrary call for the Ethereum contract to execute
    ///
    /// Authorization: `params.logic_call_schedulers`
    ScheduleLogicCall {
        transfers: Vec<Erc20Token>,
        fees: Vec<Erc20Token>,
        logic_contract_address: EthAddress,
        payload: Binary,
        /// Ethereum height; defaults to the projected batch timeout
        timeout: Option<u64>,
        invalidation_id: Binary,
    },

    /// Prove a validator signed something this chain never produced
    SubmitBadSignatureEvidence {
        subject: EvidenceSubject,
        signature: EthSignature,
    },
}

/// Messages accepted through `Cw20ReceiveMsg::msg`
#[cw_serde]
pub enum ReceiveMsg {
    /// Funds must equal `amount + bridge_fee + chain_fee`
    SendToEth {
        eth_dest: EthAddress,
        amount: Uint128,
        bridge_fee: Uint128,
        chain_fee: Uint128,
    },
}

/// The artifact a misbehaving signature was produced over.
#[cw_serde]
pub enum EvidenceSubject {
    Valset(Valset),
    Batch(OutgoingTxBatch),
    LogicCall(OutgoingLogicCall),
}

// ============================================================================
// Sudo Messages
// ============================================================================

/// Calls only the host chain can make
#[cw_serde]
pub enum SudoMsg {
    /// Runs every end-block step in order against the current bonded set
    EndBlock { validators: Vec<ValidatorPower> },
    /// A governance proposal that passed
    Proposal(GovProposal),
}

#[cw_serde]
pub enum GovProposal {
    UpdateParams(ParamsUpdate),
    SetBridgeActive { active: bool },
    /// Rewind attestation to `target_nonce` so stuck events can be re-attested
    UnhaltBridge { target_nonce: u64 },
    /// Map an Ethereum-originated ERC-20 to the cw20 that vouches for it here
    RegisterVoucher { erc20: EthAddress, cw20: String },
}

// ============================================================================
// Hook Messages
// ============================================================================

#[cw_serde]
pub enum ArtifactKind {
    Valset,
    Batch,
    LogicCall,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Valset => "valset",
            ArtifactKind::Batch => "batch",
            ArtifactKind::LogicCall => "logic_call",
        }
    }
}

/// Notifications delivered to every contract in `params.hooks`.
#[cw_serde]
pub enum GravityHookMsg {
    ValsetCreated {
        nonce: u64,
        checkpoint: Binary,
    },
    MissedConfirmation {
        validator: String,
        checkpoint: Binary,
        kind: ArtifactKind,
    },
    ConflictingClaim {
        validator: String,
        event_nonce: u64,
    },
    BadSignatureEvidence {
        validator: String,
        checkpoint: Binary,
    },
}

/// Execute message envelope hook contracts must accept
#[cw_serde]
pub enum HookExecuteMsg {
    GravityHook(GravityHookMsg),
}

// ============================================================================
// Query Messages
// ============================================================================

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Params)]
    Params {},

    // Valsets
    /// The valset this chain would produce right now
    #[returns(ValsetResponse)]
    CurrentValset {},
    #[returns(ValsetResponse)]
    Valset { nonce: u64 },
    #[returns(ValsetsResponse)]
    LatestValsets { limit: Option<u32> },
    #[returns(Option<Valset>)]
    LastObservedValset {},
    #[returns(ConfirmationsResponse)]
    ValsetConfirms { nonce: u64 },
    /// Valsets the orchestrator's validator has not signed yet
    #[returns(ValsetsResponse)]
    PendingValsetRequests { orchestrator: String },

    // Batches
    #[returns(BatchesResponse)]
    OutgoingTxBatches {
        start_after: Option<(EthAddress, u64)>,
        limit: Option<u32>,
    },
    #[returns(Option<OutgoingTxBatch>)]
    Batch {
        token_contract: EthAddress,
        nonce: u64,
    },
    #[returns(ConfirmationsResponse)]
    BatchConfirms {
        token_contract: EthAddress,
        nonce: u64,
    },
    #[returns(BatchesResponse)]
    PendingBatchRequests { orchestrator: String },
    #[returns(PendingSendToEthResponse)]
    PendingSendToEth { sender: String },
    /// Total fees waiting in the unbatched pool, per token
    #[returns(BatchFeesResponse)]
    BatchFees {},

    // Logic calls
    #[returns(LogicCallsResponse)]
    OutgoingLogicCalls {
        start_after: Option<(Binary, u64)>,
        limit: Option<u32>,
    },
    #[returns(Option<OutgoingLogicCall>)]
    LogicCall {
        invalidation_id: Binary,
        invalidation_nonce: u64,
    },
    #[returns(ConfirmationsResponse)]
    LogicConfirms {
        invalidation_id: Binary,
        invalidation_nonce: u64,
    },
    #[returns(LogicCallsResponse)]
    PendingLogicCallRequests { orchestrator: String },

    // Attestations
    #[returns(u64)]
    LastEventNonce { orchestrator: String },
    #[returns(u64)]
    LastObservedEventNonce {},
    #[returns(AttestationsResponse)]
    Attestations { event_nonce: u64 },
    #[returns(ConflictingVotesResponse)]
    ConflictingVotes { event_nonce: u64 },
    #[returns(Option<FailedCredit>)]
    FailedCredit { event_nonce: u64 },

    // Keys & tokens
    #[returns(Option<DelegateKeys>)]
    DelegateKeys { validator: String },
    #[returns(Option<LocalToken>)]
    Erc20ToDenom { erc20: EthAddress },
    #[returns(Option<EthAddress>)]
    DenomToErc20 { denom: String },

    // Relaying
    /// Signatures gathered for a checkpoint, aligned with the latest valset
    #[returns(SignatureBundleResponse)]
    SignatureBundle { checkpoint: Binary },
    /// Whether this chain ever produced the checkpoint
    #[returns(bool)]
    CheckpointSeen { checkpoint: Binary },
}

// ============================================================================
// Query Responses
// ============================================================================

#[cw_serde]
pub struct ValsetResponse {
    pub valset: Option<Valset>,
    pub checkpoint: Option<Binary>,
}

#[cw_serde]
pub struct ValsetsResponse {
    pub valsets: Vec<Valset>,
}

#[cw_serde]
pub struct ConfirmationsResponse {
    pub confirmations: Vec<Confirmation>,
}

#[cw_serde]
pub struct BatchesResponse {
    pub batches: Vec<OutgoingTxBatch>,
}

#[cw_serde]
pub struct LogicCallsResponse {
    pub calls: Vec<OutgoingLogicCall>,
}

#[cw_serde]
pub struct PendingSendToEthResponse {
    pub unbatched: Vec<OutgoingTransferTx>,
    /// Transfers of this sender already inside a batch
    pub batched: Vec<OutgoingTransferTx>,
}

#[cw_serde]
pub struct BatchFee {
    pub token_contract: EthAddress,
    pub total_fees: Uint256,
    pub tx_count: u64,
}

#[cw_serde]
pub struct BatchFeesResponse {
    pub fees: Vec<BatchFee>,
}

#[cw_serde]
pub struct AttestationsResponse {
    pub attestations: Vec<Attestation>,
}

#[cw_serde]
pub struct ConflictingVotesResponse {
    pub votes: Vec<ConflictingVote>,
}

#[cw_serde]
pub struct SignatureBundleResponse {
    pub valset: Option<Valset>,
    /// One entry per valset member; absent where no confirmation exists
    pub signatures: Vec<EthSignature>,
    pub signed_power: u64,
    pub power_threshold: u64,
    /// Whether the bundle would pass verification on Ethereum
    pub ready: bool,
    pub error: Option<String>,
}
