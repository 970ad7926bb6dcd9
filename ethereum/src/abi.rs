//! Gravity contract ABI types
//!
//! Argument structs as the Ethereum contract declares them, generated with
//! alloy's `sol!` macro, plus conversions from the host-side types in
//! `common` so artifacts produced by the host can be submitted as-is.

#![allow(clippy::too_many_arguments)]

use alloy::primitives::{Address, Bytes, FixedBytes, U256};
use alloy::sol;

use common::{EthAddress, EthSignature, OutgoingLogicCall, OutgoingTxBatch, Valset};

use crate::error::GravityError;

sol! {
    /// A validator set as submitted alongside every signed artifact
    #[sol(all_derives)]
    struct ValsetArgs {
        address[] validators;
        uint256[] powers;
        uint256 valsetNonce;
        uint256 rewardAmount;
        address rewardToken;
    }

    /// One validator signature; `v == 0` marks a validator that did not sign
    #[sol(all_derives)]
    struct Signature {
        uint8 v;
        bytes32 r;
        bytes32 s;
    }

    #[sol(all_derives)]
    struct BatchArgs {
        uint256[] amounts;
        address[] destinations;
        uint256[] fees;
        uint256 batchNonce;
        address tokenContract;
        uint256 batchTimeout;
    }

    #[sol(all_derives)]
    struct LogicCallArgs {
        uint256[] transferAmounts;
        address[] transferTokenContracts;
        uint256[] feeAmounts;
        address[] feeTokenContracts;
        address logicContractAddress;
        bytes payload;
        uint256 timeOut;
        bytes32 invalidationId;
        uint256 invalidationNonce;
    }
}

impl Signature {
    pub fn absent() -> Self {
        Signature {
            v: 0,
            r: FixedBytes::ZERO,
            s: FixedBytes::ZERO,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.v == 0
    }
}

// ============================================================================
// Conversions from host-side types
// ============================================================================

pub fn address(addr: &EthAddress) -> Address {
    Address::from(*addr.as_bytes())
}

/// Converts any 256-bit big-endian amount (`Uint256::to_be_bytes`).
pub fn amount(be_bytes: [u8; 32]) -> U256 {
    U256::from_be_bytes(be_bytes)
}

impl From<&EthSignature> for Signature {
    fn from(sig: &EthSignature) -> Self {
        Signature {
            v: sig.v,
            r: FixedBytes::from(sig.r),
            s: FixedBytes::from(sig.s),
        }
    }
}

impl From<&Valset> for ValsetArgs {
    fn from(valset: &Valset) -> Self {
        ValsetArgs {
            validators: valset.members.iter().map(|m| address(&m.eth_address)).collect(),
            powers: valset.members.iter().map(|m| U256::from(m.power)).collect(),
            valsetNonce: U256::from(valset.nonce),
            rewardAmount: amount(valset.reward_amount.to_be_bytes()),
            rewardToken: valset
                .reward_token
                .as_ref()
                .map(address)
                .unwrap_or(Address::ZERO),
        }
    }
}

impl From<&OutgoingTxBatch> for BatchArgs {
    fn from(batch: &OutgoingTxBatch) -> Self {
        let txs = &batch.transactions;
        BatchArgs {
            amounts: txs
                .iter()
                .map(|tx| amount(tx.erc20_token.amount.to_be_bytes()))
                .collect(),
            destinations: txs.iter().map(|tx| address(&tx.dest_address)).collect(),
            fees: txs
                .iter()
                .map(|tx| amount(tx.erc20_fee.amount.to_be_bytes()))
                .collect(),
            batchNonce: U256::from(batch.batch_nonce),
            tokenContract: address(&batch.token_contract),
            batchTimeout: U256::from(batch.batch_timeout),
        }
    }
}

impl TryFrom<&OutgoingLogicCall> for LogicCallArgs {
    type Error = GravityError;

    fn try_from(call: &OutgoingLogicCall) -> Result<Self, Self::Error> {
        let id: [u8; 32] = call
            .invalidation_id
            .as_slice()
            .try_into()
            .map_err(|_| GravityError::InvalidInvalidationId {
                len: call.invalidation_id.len(),
            })?;
        Ok(LogicCallArgs {
            transferAmounts: call
                .transfers
                .iter()
                .map(|t| amount(t.amount.to_be_bytes()))
                .collect(),
            transferTokenContracts: call.transfers.iter().map(|t| address(&t.contract)).collect(),
            feeAmounts: call
                .fees
                .iter()
                .map(|t| amount(t.amount.to_be_bytes()))
                .collect(),
            feeTokenContracts: call.fees.iter().map(|t| address(&t.contract)).collect(),
            logicContractAddress: address(&call.logic_contract_address),
            payload: Bytes::copy_from_slice(call.payload.as_slice()),
            timeOut: U256::from(call.timeout),
            invalidationId: FixedBytes::from(id),
            invalidationNonce: U256::from(call.invalidation_nonce),
        })
    }
}
