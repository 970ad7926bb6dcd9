//! Outgoing Batch Builder
//!
//! User transfers wait in a per-token pool until a relayer asks for a batch.
//! At most one unconfirmed batch per token is kept: a new request supersedes
//! in-flight batches that have not gathered quorum and returns their transfers
//! to the pool.

use cosmwasm_std::{Addr, Binary, Order, StdResult, Storage, Uint128, Uint256};

use common::{batch_checkpoint, Erc20Token, EthAddress, OutgoingTransferTx, OutgoingTxBatch};

use crate::confirm::has_quorum;
use crate::error::ContractError;
use crate::state::{
    last_observed_eth_height, CheckpointSubject, Params, BATCHES, LAST_BATCH_NONCE,
    LAST_TX_POOL_ID, PAST_CHECKPOINTS, POOL_INDEX, UNBATCHED_TXS,
};
use crate::valset::remove_confirmations;

// ============================================================================
// Unbatched Pool
// ============================================================================

/// Queue a transfer and return it with its freshly assigned id.
pub fn add_to_outgoing_pool(
    storage: &mut dyn Storage,
    sender: &Addr,
    dest_address: EthAddress,
    token_contract: EthAddress,
    amount: Uint128,
    fee: Uint128,
) -> StdResult<OutgoingTransferTx> {
    let id = LAST_TX_POOL_ID.may_load(storage)?.unwrap_or_default() + 1;
    LAST_TX_POOL_ID.save(storage, &id)?;

    let tx = OutgoingTransferTx {
        id,
        sender: sender.to_string(),
        dest_address,
        erc20_token: Erc20Token {
            contract: token_contract,
            amount: Uint256::from(amount),
        },
        erc20_fee: Erc20Token {
            contract: token_contract,
            amount: Uint256::from(fee),
        },
    };
    insert_into_pool(storage, &tx)?;
    Ok(tx)
}

/// Take a transfer out of the pool on behalf of its sender.
pub fn remove_from_outgoing_pool(
    storage: &mut dyn Storage,
    sender: &Addr,
    id: u64,
) -> Result<OutgoingTransferTx, ContractError> {
    let token = POOL_INDEX
        .may_load(storage, id)?
        .ok_or(ContractError::TransferNotFound { id })?;
    let tx = UNBATCHED_TXS.load(storage, (token.as_bytes().as_slice(), id))?;
    if tx.sender != sender.as_str() {
        return Err(ContractError::Unauthorized {
            reason: "only the sender can cancel a transfer".to_string(),
        });
    }
    UNBATCHED_TXS.remove(storage, (token.as_bytes().as_slice(), id));
    POOL_INDEX.remove(storage, id);
    Ok(tx)
}

fn insert_into_pool(storage: &mut dyn Storage, tx: &OutgoingTransferTx) -> StdResult<()> {
    let token = tx.erc20_token.contract;
    UNBATCHED_TXS.save(storage, (token.as_bytes().as_slice(), tx.id), tx)?;
    POOL_INDEX.save(storage, tx.id, &token)
}

pub fn unbatched_for_token(
    storage: &dyn Storage,
    token: &EthAddress,
) -> StdResult<Vec<OutgoingTransferTx>> {
    UNBATCHED_TXS
        .prefix(token.as_bytes().as_slice())
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, tx)| tx))
        .collect()
}

/// Highest fee first, earlier submission first on ties, at most `limit`.
pub fn select_transactions(
    mut txs: Vec<OutgoingTransferTx>,
    limit: u32,
) -> Vec<OutgoingTransferTx> {
    txs.sort_by(|a, b| {
        b.erc20_fee
            .amount
            .cmp(&a.erc20_fee.amount)
            .then(a.id.cmp(&b.id))
    });
    txs.truncate(limit as usize);
    txs
}

// ============================================================================
// Timeouts
// ============================================================================

/// Estimate of Ethereum's current height from the last observed one and the
/// host blocks produced since. Fails until some Ethereum height was observed.
pub fn projected_eth_height(
    storage: &dyn Storage,
    params: &Params,
    height: u64,
) -> Result<u64, ContractError> {
    let last = last_observed_eth_height(storage)?;
    if last.eth_height == 0 {
        return Err(ContractError::NoEthHeightObserved);
    }
    let elapsed_ms = height.saturating_sub(last.host_height) * params.average_block_time;
    Ok(last.eth_height + elapsed_ms / params.average_ethereum_block_time)
}

pub fn projected_batch_timeout(
    storage: &dyn Storage,
    params: &Params,
    height: u64,
) -> Result<u64, ContractError> {
    Ok(projected_eth_height(storage, params, height)?
        + params.target_batch_timeout / params.average_ethereum_block_time)
}

// ============================================================================
// Batches
// ============================================================================

pub fn batches_for_token(
    storage: &dyn Storage,
    token: &EthAddress,
) -> StdResult<Vec<OutgoingTxBatch>> {
    BATCHES
        .prefix(token.as_bytes().as_slice())
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, b)| b))
        .collect()
}

pub fn all_batches(storage: &dyn Storage) -> StdResult<Vec<OutgoingTxBatch>> {
    BATCHES
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, b)| b))
        .collect()
}

/// A batch created by [`build_batch`] together with what it replaced.
#[derive(Debug)]
pub struct BuiltBatch {
    pub batch: OutgoingTxBatch,
    pub checkpoint: [u8; 32],
    /// Nonces of in-flight batches returned to the pool
    pub superseded: Vec<u64>,
}

/// Build the next batch for `token`.
///
/// In-flight batches without quorum confirmations compete with the pool: their
/// transfers are candidates again, and the new batch must pay strictly more
/// fees than any of them or nothing changes.
pub fn build_batch(
    storage: &mut dyn Storage,
    params: &Params,
    height: u64,
    token: EthAddress,
) -> Result<BuiltBatch, ContractError> {
    if !params.bridge_active {
        return Err(ContractError::BridgeInactive);
    }
    let gravity_id = params.gravity_id_bytes()?;
    let batch_timeout = projected_batch_timeout(storage, params, height)?;

    let mut superseded = vec![];
    for batch in batches_for_token(storage, &token)? {
        let checkpoint = batch_checkpoint(&gravity_id, &batch);
        if !has_quorum(storage, &checkpoint)? {
            superseded.push(batch);
        }
    }

    let mut candidates = unbatched_for_token(storage, &token)?;
    candidates.extend(
        superseded
            .iter()
            .flat_map(|b| b.transactions.iter().cloned()),
    );
    if candidates.is_empty() {
        return Err(ContractError::NoUnbatchedTransfers {
            token: token.to_string(),
        });
    }

    let selected = select_transactions(candidates, params.batch_size_limit);
    let offered = selected
        .iter()
        .fold(Uint256::zero(), |acc, tx| acc + tx.erc20_fee.amount);
    if let Some(best) = superseded.iter().max_by_key(|b| b.total_fee()) {
        if offered <= best.total_fee() {
            return Err(ContractError::BatchNotMoreProfitable {
                nonce: best.batch_nonce,
            });
        }
    }

    for batch in &superseded {
        cancel_batch(storage, &gravity_id, batch)?;
    }
    for tx in &selected {
        UNBATCHED_TXS.remove(storage, (token.as_bytes().as_slice(), tx.id));
        POOL_INDEX.remove(storage, tx.id);
    }

    let nonce = LAST_BATCH_NONCE
        .may_load(storage, token.as_bytes())?
        .unwrap_or_default()
        + 1;
    LAST_BATCH_NONCE.save(storage, token.as_bytes(), &nonce)?;

    let batch = OutgoingTxBatch {
        batch_nonce: nonce,
        batch_timeout,
        transactions: selected,
        token_contract: token,
        block: height,
    };
    let checkpoint = batch_checkpoint(&gravity_id, &batch);
    BATCHES.save(storage, (token.as_bytes().as_slice(), nonce), &batch)?;
    PAST_CHECKPOINTS.save(
        storage,
        &checkpoint,
        &(
            CheckpointSubject::Batch {
                token_contract: token,
                nonce,
            },
            height,
        ),
    )?;

    Ok(BuiltBatch {
        batch,
        checkpoint,
        superseded: superseded.iter().map(|b| b.batch_nonce).collect(),
    })
}

/// Delete a batch and its confirmations, returning its transfers to the pool.
pub fn cancel_batch(
    storage: &mut dyn Storage,
    gravity_id: &[u8; 32],
    batch: &OutgoingTxBatch,
) -> StdResult<()> {
    for tx in &batch.transactions {
        insert_into_pool(storage, tx)?;
    }
    BATCHES.remove(
        storage,
        (batch.token_contract.as_bytes().as_slice(), batch.batch_nonce),
    );
    remove_confirmations(storage, &batch_checkpoint(gravity_id, batch))
}

/// Outcome of an attested batch execution.
#[derive(Debug)]
pub struct ExecutedBatch {
    /// None when the batch was already gone (cancelled or timed out here)
    pub batch: Option<OutgoingTxBatch>,
    /// Lower-nonce batches for the token, returned to the pool
    pub cancelled: Vec<u64>,
}

/// Ethereum executed batch `nonce`: drop it, and cancel every lower-nonce batch
/// for the token since Ethereum will now reject them.
pub fn batch_executed(
    storage: &mut dyn Storage,
    params: &Params,
    token: EthAddress,
    nonce: u64,
) -> StdResult<ExecutedBatch> {
    let gravity_id = params.gravity_id_bytes()?;
    let key = (token.as_bytes().as_slice(), nonce);

    let batch = BATCHES.may_load(storage, key)?;
    if let Some(executed) = &batch {
        BATCHES.remove(storage, key);
        remove_confirmations(storage, &batch_checkpoint(&gravity_id, executed))?;
    }

    let mut cancelled = vec![];
    for older in batches_for_token(storage, &token)? {
        if older.batch_nonce < nonce {
            cancel_batch(storage, &gravity_id, &older)?;
            cancelled.push(older.batch_nonce);
        }
    }
    Ok(ExecutedBatch { batch, cancelled })
}

/// End-block step: batches whose timeout Ethereum has passed can never
/// execute, so their transfers go back to the pool.
pub fn cancel_timed_out_batches(
    storage: &mut dyn Storage,
    params: &Params,
) -> StdResult<Vec<(EthAddress, u64)>> {
    let eth_height = last_observed_eth_height(storage)?.eth_height;
    if eth_height == 0 {
        return Ok(vec![]);
    }
    let gravity_id = params.gravity_id_bytes()?;
    let mut cancelled = vec![];
    for batch in all_batches(storage)? {
        if batch.batch_timeout < eth_height {
            cancel_batch(storage, &gravity_id, &batch)?;
            cancelled.push((batch.token_contract, batch.batch_nonce));
        }
    }
    Ok(cancelled)
}

pub fn checkpoint_binary(checkpoint: &[u8; 32]) -> Binary {
    Binary::from(checkpoint.to_vec())
}
