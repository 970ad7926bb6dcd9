//! State definitions for the Gravity bridge contract
//!
//! Everything the host side of the bridge owns lives here: parameters, the
//! bonded-validator snapshot, delegate keys, valsets, attestations, the
//! outgoing pool, batches, logic calls and confirmations.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, StdError, StdResult, Storage, Uint128};
use cw_storage_plus::{Item, Map};

use common::codec::string_to_bytes32;
use common::{
    Erc20Token, EthAddress, EthSignature, OutgoingLogicCall, OutgoingTransferTx, OutgoingTxBatch,
    Valset, ValsetMember,
};

use crate::error::ContractError;

// ============================================================================
// Constants
// ============================================================================

/// Contract name for cw2 migration info
pub const CONTRACT_NAME: &str = "crates.io:gravity";

/// Contract version for cw2 migration info
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_SIGNED_VALSETS_WINDOW: u64 = 10_000;
pub const DEFAULT_SIGNED_BATCHES_WINDOW: u64 = 10_000;
pub const DEFAULT_SIGNED_LOGIC_CALLS_WINDOW: u64 = 10_000;

/// 12 hours in milliseconds
pub const DEFAULT_TARGET_BATCH_TIMEOUT: u64 = 43_200_000;

/// Host block time in milliseconds
pub const DEFAULT_AVERAGE_BLOCK_TIME: u64 = 5_000;

/// Ethereum block time in milliseconds
pub const DEFAULT_AVERAGE_ETHEREUM_BLOCK_TIME: u64 = 15_000;

pub const DEFAULT_BATCH_SIZE_LIMIT: u32 = 100;

/// 5% of total normalized power
pub const DEFAULT_VALSET_CHANGE_THRESHOLD_BPS: u64 = 500;

/// Upper bound for `min_chain_fee_basis_points` (100%)
pub const MAX_BASIS_POINTS: u64 = 10_000;

// ============================================================================
// Parameters
// ============================================================================

/// Bridge parameters, set at instantiate and changed only by governance.
#[cw_serde]
pub struct Params {
    /// Domain separator mixed into every checkpoint (at most 32 bytes)
    pub gravity_id: String,
    /// Address of the Gravity contract on Ethereum
    pub bridge_ethereum_address: EthAddress,
    pub bridge_chain_id: u64,
    /// Blocks a validator has to confirm a valset before it is reported
    pub signed_valsets_window: u64,
    pub signed_batches_window: u64,
    pub signed_logic_calls_window: u64,
    /// Target lifetime of a batch on Ethereum, in milliseconds
    pub target_batch_timeout: u64,
    /// Host chain block time, in milliseconds
    pub average_block_time: u64,
    /// Ethereum block time, in milliseconds
    pub average_ethereum_block_time: u64,
    /// Max transfers per batch
    pub batch_size_limit: u32,
    /// Power change (bps of total) that triggers a new valset
    pub valset_change_threshold_bps: u64,
    /// Reward paid on Ethereum to the relayer of a valset update
    pub valset_reward: Option<Erc20Token>,
    /// When false, SendToEth and batch creation are refused
    pub bridge_active: bool,
    /// Ethereum addresses that may not receive transfers
    pub ethereum_blacklist: Vec<EthAddress>,
    /// Minimum chain fee, in bps of the transfer amount
    pub min_chain_fee_basis_points: u64,
    /// Receives chain fees
    pub fee_collector: Addr,
    /// Accounts allowed to schedule logic calls
    pub logic_call_schedulers: Vec<Addr>,
    /// Contracts notified of valset creation and misbehaviour, in order
    pub hooks: Vec<Addr>,
}

impl Params {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.gravity_id.is_empty() {
            return Err(ContractError::InvalidParams {
                reason: "gravity_id must not be empty".to_string(),
            });
        }
        string_to_bytes32(&self.gravity_id).map_err(|e| ContractError::InvalidParams {
            reason: e.to_string(),
        })?;
        for (name, value) in [
            ("signed_valsets_window", self.signed_valsets_window),
            ("signed_batches_window", self.signed_batches_window),
            ("signed_logic_calls_window", self.signed_logic_calls_window),
            ("average_block_time", self.average_block_time),
            ("average_ethereum_block_time", self.average_ethereum_block_time),
            ("target_batch_timeout", self.target_batch_timeout),
        ] {
            if value == 0 {
                return Err(ContractError::InvalidParams {
                    reason: format!("{} must be positive", name),
                });
            }
        }
        if self.batch_size_limit == 0 {
            return Err(ContractError::InvalidParams {
                reason: "batch_size_limit must be positive".to_string(),
            });
        }
        if self.valset_change_threshold_bps > MAX_BASIS_POINTS {
            return Err(ContractError::InvalidParams {
                reason: "valset_change_threshold_bps exceeds 10000".to_string(),
            });
        }
        if self.min_chain_fee_basis_points > MAX_BASIS_POINTS {
            return Err(ContractError::InvalidParams {
                reason: "min_chain_fee_basis_points exceeds 10000".to_string(),
            });
        }
        Ok(())
    }

    /// `gravity_id` as the bytes32 mixed into checkpoints.
    pub fn gravity_id_bytes(&self) -> StdResult<[u8; 32]> {
        string_to_bytes32(&self.gravity_id).map_err(|e| StdError::generic_err(e.to_string()))
    }

    pub fn is_blacklisted(&self, addr: &EthAddress) -> bool {
        self.ethereum_blacklist.contains(addr)
    }
}

/// Primary params storage
pub const PARAMS: Item<Params> = Item::new("params");

// ============================================================================
// Validators & Delegate Keys
// ============================================================================

/// A bonded validator and its raw (un-normalized) stake.
#[cw_serde]
pub struct BondedValidator {
    pub operator: Addr,
    pub power: u64,
}

/// Keys a validator operator delegates to its orchestrator.
#[cw_serde]
pub struct DelegateKeys {
    pub validator: Addr,
    pub orchestrator: Addr,
    pub eth_address: EthAddress,
}

/// Bonded set as of the latest end-block, ordered as the host passed it
pub const BONDED_VALIDATORS: Item<Vec<BondedValidator>> = Item::new("bonded_validators");

/// Host height at which a bonded validator last dropped out of the set
pub const LAST_UNBONDING_HEIGHT: Item<u64> = Item::new("last_unbonding_height");

/// Key: validator operator, Value: DelegateKeys
pub const DELEGATE_KEYS: Map<&Addr, DelegateKeys> = Map::new("delegate_keys");

/// Key: orchestrator, Value: validator operator
pub const ORCHESTRATOR_TO_VALIDATOR: Map<&Addr, Addr> = Map::new("orchestrator_to_validator");

/// Key: 20-byte Ethereum address, Value: validator operator
pub const ETH_ADDRESS_TO_VALIDATOR: Map<&[u8], Addr> = Map::new("eth_address_to_validator");

// ============================================================================
// Valsets
// ============================================================================

/// Key: valset nonce, Value: Valset
pub const VALSETS: Map<u64, Valset> = Map::new("valsets");

pub const LATEST_VALSET_NONCE: Item<u64> = Item::new("latest_valset_nonce");

/// Valset most recently attested as installed on Ethereum
pub const LAST_OBSERVED_VALSET: Item<Valset> = Item::new("last_observed_valset");

/// Highest valset nonce already checked for missing confirmations
pub const LAST_SLASHED_VALSET_NONCE: Item<u64> = Item::new("last_slashed_valset_nonce");

// ============================================================================
// Attestations
// ============================================================================

/// An event observed on Ethereum, as reported by orchestrators.
#[cw_serde]
pub struct EthereumClaim {
    /// Strictly increasing per event, assigned by the Ethereum contract
    pub event_nonce: u64,
    pub eth_block_height: u64,
    pub kind: ClaimKind,
}

#[cw_serde]
pub enum ClaimKind {
    SendToCosmos {
        token_contract: EthAddress,
        amount: cosmwasm_std::Uint256,
        ethereum_sender: EthAddress,
        cosmos_receiver: String,
    },
    BatchSendToEth {
        batch_nonce: u64,
        token_contract: EthAddress,
    },
    Erc20Deployed {
        cosmos_denom: String,
        token_contract: EthAddress,
        name: String,
        symbol: String,
        decimals: u8,
    },
    LogicCallExecuted {
        invalidation_id: Binary,
        invalidation_nonce: u64,
    },
    ValsetUpdated {
        valset_nonce: u64,
        members: Vec<ValsetMember>,
        reward_amount: cosmwasm_std::Uint256,
        reward_token: Option<EthAddress>,
    },
}

impl ClaimKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimKind::SendToCosmos { .. } => "send_to_cosmos",
            ClaimKind::BatchSendToEth { .. } => "batch_send_to_eth",
            ClaimKind::Erc20Deployed { .. } => "erc20_deployed",
            ClaimKind::LogicCallExecuted { .. } => "logic_call_executed",
            ClaimKind::ValsetUpdated { .. } => "valset_updated",
        }
    }
}

#[cw_serde]
pub enum AttestationStatus {
    Pending,
    Observed,
    Applied,
}

#[cw_serde]
pub struct Attestation {
    pub claim: EthereumClaim,
    pub claim_hash: Binary,
    /// Validators that voted for exactly this claim, in vote order
    pub votes: Vec<Addr>,
    pub status: AttestationStatus,
    /// Host height of the first vote
    pub height: u64,
}

/// A second, different claim a validator submitted for a nonce it already voted on.
#[cw_serde]
pub struct ConflictingVote {
    pub validator: Addr,
    pub event_nonce: u64,
    pub first_hash: Binary,
    pub conflicting_hash: Binary,
    pub height: u64,
}

#[cw_serde]
pub struct LastObservedEthHeight {
    pub eth_height: u64,
    /// Host height at which `eth_height` was observed
    pub host_height: u64,
}

/// Key: (event_nonce, 32-byte claim hash), Value: Attestation
pub const ATTESTATIONS: Map<(u64, &[u8]), Attestation> = Map::new("attestations");

/// Key: (event_nonce, validator), Value: claim hash the validator voted for
pub const VOTES: Map<(u64, &Addr), Binary> = Map::new("votes");

/// Key: (event_nonce, validator, conflicting claim hash), Value: ConflictingVote
pub const CONFLICTING_VOTES: Map<(u64, &Addr, &[u8]), ConflictingVote> =
    Map::new("conflicting_votes");

pub const LAST_OBSERVED_EVENT_NONCE: Item<u64> = Item::new("last_observed_event_nonce");

pub const LAST_OBSERVED_ETH_HEIGHT: Item<LastObservedEthHeight> =
    Item::new("last_observed_eth_height");

/// Key: validator operator, Value: highest event nonce it voted on
pub const LAST_EVENT_NONCE_BY_VALIDATOR: Map<&Addr, u64> = Map::new("last_event_nonce");

// ============================================================================
// Token Registry
// ============================================================================

/// How an ERC-20 is represented on this chain.
#[cw_serde]
pub enum LocalToken {
    /// Host-native denom, locked here while it lives on Ethereum
    Native { denom: String },
    /// cw20 voucher for an Ethereum-originated token, minted and burned here
    Voucher { cw20: Addr },
}

impl LocalToken {
    /// Key under which the reverse mapping is stored.
    pub fn id(&self) -> &str {
        match self {
            LocalToken::Native { denom } => denom,
            LocalToken::Voucher { cw20 } => cw20.as_str(),
        }
    }
}

/// Key: 20-byte ERC-20 address, Value: LocalToken
pub const ERC20_TO_LOCAL: Map<&[u8], LocalToken> = Map::new("erc20_to_local");

/// Key: denom or cw20 address, Value: ERC-20 address
pub const LOCAL_TO_ERC20: Map<&str, EthAddress> = Map::new("local_to_erc20");

// ============================================================================
// Outgoing Pool & Batches
// ============================================================================

/// Last assigned outgoing transfer id
pub const LAST_TX_POOL_ID: Item<u64> = Item::new("last_tx_pool_id");

/// Key: (20-byte token, transfer id), Value: OutgoingTransferTx
pub const UNBATCHED_TXS: Map<(&[u8], u64), OutgoingTransferTx> = Map::new("unbatched_txs");

/// Token of every transfer still in the unbatched pool.
/// Key: transfer id, Value: ERC-20 address
pub const POOL_INDEX: Map<u64, EthAddress> = Map::new("pool_index");

/// Key: (20-byte token, batch nonce), Value: OutgoingTxBatch
pub const BATCHES: Map<(&[u8], u64), OutgoingTxBatch> = Map::new("batches");

/// Key: 20-byte token, Value: last batch nonce issued for it
pub const LAST_BATCH_NONCE: Map<&[u8], u64> = Map::new("last_batch_nonce");

/// Host height of the newest batch already checked for missing confirmations
pub const LAST_SLASHED_BATCH_BLOCK: Item<u64> = Item::new("last_slashed_batch_block");

// ============================================================================
// Logic Calls
// ============================================================================

/// Key: (32-byte invalidation id, invalidation nonce), Value: OutgoingLogicCall
pub const LOGIC_CALLS: Map<(&[u8], u64), OutgoingLogicCall> = Map::new("logic_calls");

/// Key: 32-byte invalidation id, Value: last invalidation nonce issued
pub const LAST_INVALIDATION_NONCE: Map<&[u8], u64> = Map::new("last_invalidation_nonce");

pub const LAST_SLASHED_LOGIC_CALL_BLOCK: Item<u64> = Item::new("last_slashed_logic_call_block");

// ============================================================================
// Confirmations
// ============================================================================

/// A validator's signature over an artifact checkpoint.
#[cw_serde]
pub struct Confirmation {
    pub checkpoint: Binary,
    pub validator: Addr,
    pub orchestrator: Addr,
    pub eth_signer: EthAddress,
    pub signature: EthSignature,
}

/// Key: (32-byte checkpoint, validator), Value: Confirmation
pub const CONFIRMATIONS: Map<(&[u8], &Addr), Confirmation> = Map::new("confirmations");

/// What a checkpoint committed to when it was produced.
#[cw_serde]
pub enum CheckpointSubject {
    Valset { nonce: u64 },
    Batch { token_contract: EthAddress, nonce: u64 },
    LogicCall { invalidation_id: Binary, invalidation_nonce: u64 },
}

/// Every checkpoint this chain ever asked validators to sign.
/// Key: 32-byte checkpoint, Value: subject and host height
pub const PAST_CHECKPOINTS: Map<&[u8], (CheckpointSubject, u64)> = Map::new("past_checkpoints");

/// Bad-signature evidence already acted on.
/// Key: keccak256(checkpoint ‖ signature), Value: host height
pub const SUBMITTED_EVIDENCE: Map<&[u8], u64> = Map::new("submitted_evidence");

// ============================================================================
// Deposits Credited From Ethereum
// ============================================================================

#[cw_serde]
pub struct PendingCredit {
    pub event_nonce: u64,
    pub receiver: String,
    pub token: LocalToken,
    pub amount: Uint128,
}

#[cw_serde]
pub struct FailedCredit {
    pub event_nonce: u64,
    pub token_contract: EthAddress,
    pub receiver: String,
    pub amount: cosmwasm_std::Uint256,
    pub reason: String,
}

/// Credits dispatched as sub-messages and awaiting their reply.
/// Key: event nonce (also the reply id)
pub const PENDING_CREDITS: Map<u64, PendingCredit> = Map::new("pending_credits");

/// Deposits that could not be credited.
/// Key: event nonce
pub const FAILED_CREDITS: Map<u64, FailedCredit> = Map::new("failed_credits");

// ============================================================================
// Helpers
// ============================================================================

pub fn last_observed_event_nonce(storage: &dyn Storage) -> StdResult<u64> {
    Ok(LAST_OBSERVED_EVENT_NONCE
        .may_load(storage)?
        .unwrap_or_default())
}

pub fn last_observed_eth_height(storage: &dyn Storage) -> StdResult<LastObservedEthHeight> {
    Ok(LAST_OBSERVED_ETH_HEIGHT
        .may_load(storage)?
        .unwrap_or(LastObservedEthHeight {
            eth_height: 0,
            host_height: 0,
        }))
}

/// Validator operator for an orchestrator, if the orchestrator is registered.
pub fn validator_for_orchestrator(
    storage: &dyn Storage,
    orchestrator: &Addr,
) -> StdResult<Option<DelegateKeys>> {
    match ORCHESTRATOR_TO_VALIDATOR.may_load(storage, orchestrator)? {
        Some(validator) => DELEGATE_KEYS.may_load(storage, &validator),
        None => Ok(None),
    }
}
