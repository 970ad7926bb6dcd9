//! The Gravity contract
//!
//! Holds the checkpoint of the current validator set and one replay guard
//! per artifact kind: the valset nonce, a batch nonce per token, and an
//! invalidation nonce per logic-call invalidation id. Every submission
//! names the current set explicitly and carries one signature slot per
//! member; it is accepted only when that set hashes to the checkpoint on
//! file and members holding at least [`POWER_THRESHOLD`] signed the new
//! artifact's checkpoint.
//!
//! Calls that fail leave state untouched, with one exception: a logic call
//! whose payload fails keeps its invalidation nonce, so the same call can
//! never be replayed.

use std::collections::BTreeMap;

use alloy::primitives::{Address, Bytes, B256, U256};
use tracing::{debug, info, warn};

use crate::abi::{BatchArgs, LogicCallArgs, Signature, ValsetArgs};
use crate::checkpoint::{
    batch_checkpoint, deployed_token_address, logic_call_checkpoint, make_checkpoint,
};
use crate::error::GravityError;
use crate::ledger::TokenLedger;
use crate::logic::{LogicContext, LogicContract};
use crate::signature::check_validator_signatures;

/// Signed power needed to accept anything, out of `u32::MAX`.
pub const POWER_THRESHOLD: U256 = U256::from_limbs([common::POWER_THRESHOLD, 0, 0, 0]);

/// Largest forward jump accepted for a valset or batch nonce.
pub const MAX_NONCE_JUMP: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GravityConfig {
    /// Domain separator shared with the host chain
    pub gravity_id: B256,
    /// Address the contract is deployed at; holds locked funds
    pub address: Address,
}

/// Events the orchestrators watch, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GravityEvent {
    ValsetUpdated {
        new_valset_nonce: U256,
        event_nonce: U256,
        reward_amount: U256,
        reward_token: Address,
        validators: Vec<Address>,
        powers: Vec<U256>,
    },
    TransactionBatchExecuted {
        batch_nonce: U256,
        token: Address,
        event_nonce: U256,
    },
    SendToCosmos {
        token: Address,
        sender: Address,
        destination: String,
        amount: U256,
        event_nonce: U256,
    },
    Erc20Deployed {
        cosmos_denom: String,
        token: Address,
        name: String,
        symbol: String,
        decimals: u8,
        event_nonce: U256,
    },
    LogicCallExecuted {
        invalidation_id: B256,
        invalidation_nonce: U256,
        return_data: Bytes,
        event_nonce: U256,
    },
}

impl GravityEvent {
    pub fn event_nonce(&self) -> U256 {
        match self {
            GravityEvent::ValsetUpdated { event_nonce, .. }
            | GravityEvent::TransactionBatchExecuted { event_nonce, .. }
            | GravityEvent::SendToCosmos { event_nonce, .. }
            | GravityEvent::Erc20Deployed { event_nonce, .. }
            | GravityEvent::LogicCallExecuted { event_nonce, .. } => *event_nonce,
        }
    }
}

pub struct Gravity {
    config: GravityConfig,
    ledger: TokenLedger,
    last_valset_checkpoint: B256,
    last_valset_nonce: U256,
    last_batch_nonces: BTreeMap<Address, U256>,
    invalidation_nonces: BTreeMap<B256, U256>,
    last_event_nonce: U256,
    block_number: u64,
    deployed_tokens: u64,
    logic_contracts: BTreeMap<Address, Box<dyn LogicContract>>,
    events: Vec<GravityEvent>,
}

impl Gravity {
    /// Deploy with `valset` as the initial validator set. Its nonce and
    /// reward fields are ignored; the set on file starts at nonce 0.
    pub fn new(config: GravityConfig, valset: &ValsetArgs) -> Result<Self, GravityError> {
        if valset.validators.len() != valset.powers.len() {
            return Err(GravityError::MalformedCurrentValidatorSet {
                validators: valset.validators.len(),
                powers: valset.powers.len(),
                signatures: valset.validators.len(),
            });
        }
        let cumulative_power = total_power(&valset.powers);
        if cumulative_power < POWER_THRESHOLD {
            return Err(GravityError::InsufficientPower {
                cumulative_power,
                power_threshold: POWER_THRESHOLD,
            });
        }

        let initial = ValsetArgs {
            validators: valset.validators.clone(),
            powers: valset.powers.clone(),
            valsetNonce: U256::ZERO,
            rewardAmount: U256::ZERO,
            rewardToken: Address::ZERO,
        };
        let checkpoint = make_checkpoint(config.gravity_id, &initial);
        info!(
            gravity_id = %config.gravity_id,
            address = %config.address,
            validators = initial.validators.len(),
            checkpoint = %checkpoint,
            "Gravity deployed"
        );

        let mut gravity = Gravity {
            config,
            ledger: TokenLedger::default(),
            last_valset_checkpoint: checkpoint,
            last_valset_nonce: U256::ZERO,
            last_batch_nonces: BTreeMap::new(),
            invalidation_nonces: BTreeMap::new(),
            last_event_nonce: U256::from(1u64),
            block_number: 0,
            deployed_tokens: 0,
            logic_contracts: BTreeMap::new(),
            events: Vec::new(),
        };
        gravity.events.push(GravityEvent::ValsetUpdated {
            new_valset_nonce: U256::ZERO,
            event_nonce: gravity.last_event_nonce,
            reward_amount: U256::ZERO,
            reward_token: Address::ZERO,
            validators: initial.validators,
            powers: initial.powers,
        });
        Ok(gravity)
    }

    // ------------------------------------------------------------------
    // Environment
    // ------------------------------------------------------------------

    pub fn set_block_number(&mut self, block_number: u64) {
        self.block_number = block_number;
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn register_logic_contract(&mut self, address: Address, contract: Box<dyn LogicContract>) {
        self.logic_contracts.insert(address, contract);
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TokenLedger {
        &mut self.ledger
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn gravity_id(&self) -> B256 {
        self.config.gravity_id
    }

    pub fn last_valset_checkpoint(&self) -> B256 {
        self.last_valset_checkpoint
    }

    pub fn last_valset_nonce(&self) -> U256 {
        self.last_valset_nonce
    }

    pub fn last_batch_nonce(&self, token: Address) -> U256 {
        self.last_batch_nonces
            .get(&token)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn last_logic_call_nonce(&self, invalidation_id: B256) -> U256 {
        self.invalidation_nonces
            .get(&invalidation_id)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn last_event_nonce(&self) -> U256 {
        self.last_event_nonce
    }

    pub fn events(&self) -> &[GravityEvent] {
        &self.events
    }

    // ------------------------------------------------------------------
    // Submissions
    // ------------------------------------------------------------------

    /// Replace the validator set on file with `new_valset`, signed by
    /// `current_valset`. Pays the new set's reward to `relayer`.
    pub fn update_valset(
        &mut self,
        relayer: Address,
        new_valset: &ValsetArgs,
        current_valset: &ValsetArgs,
        sigs: &[Signature],
    ) -> Result<(), GravityError> {
        check_nonce_advance(new_valset.valsetNonce, self.last_valset_nonce)
            .map_err(|(new_nonce, current_nonce)| GravityError::InvalidValsetNonce {
                new_nonce,
                current_nonce,
            })?;

        if new_valset.validators.len() != new_valset.powers.len()
            || new_valset.validators.is_empty()
        {
            return Err(GravityError::MalformedNewValidatorSet);
        }

        self.validate_current_valset(current_valset, sigs)?;

        let cumulative_power = total_power(&new_valset.powers);
        if cumulative_power < POWER_THRESHOLD {
            return Err(GravityError::InsufficientPower {
                cumulative_power,
                power_threshold: POWER_THRESHOLD,
            });
        }

        let new_checkpoint = make_checkpoint(self.config.gravity_id, new_valset);
        check_validator_signatures(
            &current_valset.validators,
            &current_valset.powers,
            sigs,
            &new_checkpoint,
            POWER_THRESHOLD,
        )?;

        if new_valset.rewardToken != Address::ZERO && !new_valset.rewardAmount.is_zero() {
            self.ledger.transfer(
                new_valset.rewardToken,
                self.config.address,
                relayer,
                new_valset.rewardAmount,
            )?;
        }

        self.last_valset_checkpoint = new_checkpoint;
        self.last_valset_nonce = new_valset.valsetNonce;
        let event_nonce = self.next_event_nonce();
        info!(
            valset_nonce = %new_valset.valsetNonce,
            event_nonce = %event_nonce,
            checkpoint = %new_checkpoint,
            "Validator set updated"
        );
        self.events.push(GravityEvent::ValsetUpdated {
            new_valset_nonce: new_valset.valsetNonce,
            event_nonce,
            reward_amount: new_valset.rewardAmount,
            reward_token: new_valset.rewardToken,
            validators: new_valset.validators.clone(),
            powers: new_valset.powers.clone(),
        });
        Ok(())
    }

    /// Release a batch of transfers of one token. Fees go to `relayer`.
    pub fn submit_batch(
        &mut self,
        relayer: Address,
        current_valset: &ValsetArgs,
        sigs: &[Signature],
        batch: &BatchArgs,
    ) -> Result<(), GravityError> {
        let token = batch.tokenContract;
        check_nonce_advance(batch.batchNonce, self.last_batch_nonce(token))
            .map_err(|(new_nonce, current_nonce)| GravityError::InvalidBatchNonce {
                new_nonce,
                current_nonce,
            })?;

        if U256::from(self.block_number) >= batch.batchTimeout {
            return Err(GravityError::BatchTimedOut);
        }

        self.validate_current_valset(current_valset, sigs)?;

        if batch.amounts.len() != batch.destinations.len()
            || batch.amounts.len() != batch.fees.len()
        {
            return Err(GravityError::MalformedBatch);
        }

        let checkpoint = batch_checkpoint(self.config.gravity_id, batch);
        check_validator_signatures(
            &current_valset.validators,
            &current_valset.powers,
            sigs,
            &checkpoint,
            POWER_THRESHOLD,
        )?;

        let gravity = self.config.address;
        let mut ledger = self.ledger.clone();
        let mut total_fee = U256::ZERO;
        for ((amount, destination), fee) in batch
            .amounts
            .iter()
            .zip(&batch.destinations)
            .zip(&batch.fees)
        {
            ledger.transfer(token, gravity, *destination, *amount)?;
            total_fee = total_fee.saturating_add(*fee);
        }
        ledger.transfer(token, gravity, relayer, total_fee)?;
        self.ledger = ledger;

        self.last_batch_nonces.insert(token, batch.batchNonce);
        let event_nonce = self.next_event_nonce();
        info!(
            batch_nonce = %batch.batchNonce,
            token = %token,
            txs = batch.amounts.len(),
            total_fee = %total_fee,
            event_nonce = %event_nonce,
            "Batch executed"
        );
        self.events.push(GravityEvent::TransactionBatchExecuted {
            batch_nonce: batch.batchNonce,
            token,
            event_nonce,
        });
        Ok(())
    }

    /// Fund and invoke a logic contract. Fees go to `relayer`.
    ///
    /// The invalidation nonce is recorded before the payload runs. If the
    /// payload fails, its transfers and fees are rolled back but the nonce
    /// stays recorded and the call returns [`GravityError::LogicCallReverted`]
    /// or the ledger error that stopped it.
    pub fn submit_logic_call(
        &mut self,
        relayer: Address,
        current_valset: &ValsetArgs,
        sigs: &[Signature],
        args: &LogicCallArgs,
    ) -> Result<(), GravityError> {
        if U256::from(self.block_number) >= args.timeOut {
            return Err(GravityError::LogicCallTimedOut);
        }

        let current_nonce = self.last_logic_call_nonce(args.invalidationId);
        if current_nonce >= args.invalidationNonce {
            return Err(GravityError::InvalidLogicCallNonce {
                new_nonce: args.invalidationNonce,
                current_nonce,
            });
        }

        if args.transferAmounts.len() != args.transferTokenContracts.len() {
            return Err(GravityError::InvalidLogicCallTransfers);
        }
        if args.feeAmounts.len() != args.feeTokenContracts.len() {
            return Err(GravityError::InvalidLogicCallFees);
        }

        self.validate_current_valset(current_valset, sigs)?;

        let checkpoint = logic_call_checkpoint(self.config.gravity_id, args);
        check_validator_signatures(
            &current_valset.validators,
            &current_valset.powers,
            sigs,
            &checkpoint,
            POWER_THRESHOLD,
        )?;

        self.invalidation_nonces
            .insert(args.invalidationId, args.invalidationNonce);

        let snapshot = self.ledger.clone();
        if let Err(err) = self.execute_logic_call(relayer, args) {
            warn!(
                invalidation_id = %args.invalidationId,
                invalidation_nonce = %args.invalidationNonce,
                error = %err,
                "Logic call failed, nonce stays consumed"
            );
            self.ledger = snapshot;
            return Err(err);
        }

        let event_nonce = self.next_event_nonce();
        info!(
            invalidation_id = %args.invalidationId,
            invalidation_nonce = %args.invalidationNonce,
            logic_contract = %args.logicContractAddress,
            event_nonce = %event_nonce,
            "Logic call executed"
        );
        self.events.push(GravityEvent::LogicCallExecuted {
            invalidation_id: args.invalidationId,
            invalidation_nonce: args.invalidationNonce,
            return_data: Bytes::new(),
            event_nonce,
        });
        Ok(())
    }

    /// Lock `amount` of `token` from `sender` for `destination` on the host chain.
    pub fn send_to_cosmos(
        &mut self,
        token: Address,
        sender: Address,
        destination: &str,
        amount: U256,
    ) -> Result<(), GravityError> {
        if amount.is_zero() {
            return Err(GravityError::InvalidSendToCosmos);
        }
        self.ledger
            .transfer(token, sender, self.config.address, amount)?;

        let event_nonce = self.next_event_nonce();
        debug!(
            token = %token,
            sender = %sender,
            destination,
            amount = %amount,
            event_nonce = %event_nonce,
            "SendToCosmos"
        );
        self.events.push(GravityEvent::SendToCosmos {
            token,
            sender,
            destination: destination.to_string(),
            amount,
            event_nonce,
        });
        Ok(())
    }

    /// Deploy an ERC-20 representing a host-chain denom. The whole supply is
    /// minted to the contract and released only by batches.
    pub fn deploy_erc20(
        &mut self,
        cosmos_denom: &str,
        name: &str,
        symbol: &str,
        decimals: u8,
    ) -> Address {
        let token = deployed_token_address(self.config.address, self.deployed_tokens);
        self.deployed_tokens += 1;
        self.ledger.mint(token, self.config.address, U256::MAX);

        let event_nonce = self.next_event_nonce();
        info!(
            cosmos_denom,
            token = %token,
            event_nonce = %event_nonce,
            "ERC20 deployed"
        );
        self.events.push(GravityEvent::Erc20Deployed {
            cosmos_denom: cosmos_denom.to_string(),
            token,
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            event_nonce,
        });
        token
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn next_event_nonce(&mut self) -> U256 {
        self.last_event_nonce += U256::from(1u64);
        self.last_event_nonce
    }

    /// Shape of the supplied set, then its checkpoint against the one on file.
    fn validate_current_valset(
        &self,
        current: &ValsetArgs,
        sigs: &[Signature],
    ) -> Result<(), GravityError> {
        if current.validators.len() != current.powers.len()
            || current.validators.len() != sigs.len()
        {
            return Err(GravityError::MalformedCurrentValidatorSet {
                validators: current.validators.len(),
                powers: current.powers.len(),
                signatures: sigs.len(),
            });
        }
        if make_checkpoint(self.config.gravity_id, current) != self.last_valset_checkpoint {
            debug!(
                supplied_nonce = %current.valsetNonce,
                last_nonce = %self.last_valset_nonce,
                "Supplied validator set does not match checkpoint"
            );
            return Err(GravityError::IncorrectCheckpoint);
        }
        Ok(())
    }

    fn execute_logic_call(
        &mut self,
        relayer: Address,
        args: &LogicCallArgs,
    ) -> Result<(), GravityError> {
        let gravity = self.config.address;
        let target = args.logicContractAddress;
        for (amount, token) in args
            .transferAmounts
            .iter()
            .zip(&args.transferTokenContracts)
        {
            self.ledger.transfer(*token, gravity, target, *amount)?;
        }

        match self.logic_contracts.get_mut(&target) {
            Some(contract) => contract.call(
                LogicContext {
                    ledger: &mut self.ledger,
                    this: target,
                    caller: gravity,
                },
                &args.payload,
            )?,
            None => debug!(target = %target, "No code at logic contract address"),
        }

        for (amount, token) in args.feeAmounts.iter().zip(&args.feeTokenContracts) {
            self.ledger.transfer(*token, gravity, relayer, *amount)?;
        }
        Ok(())
    }
}

/// New nonces must move forward, by at most [`MAX_NONCE_JUMP`].
fn check_nonce_advance(new_nonce: U256, current_nonce: U256) -> Result<(), (U256, U256)> {
    if new_nonce <= current_nonce
        || new_nonce > current_nonce.saturating_add(U256::from(MAX_NONCE_JUMP))
    {
        return Err((new_nonce, current_nonce));
    }
    Ok(())
}

fn total_power(powers: &[U256]) -> U256 {
    powers
        .iter()
        .fold(U256::ZERO, |acc, p| acc.saturating_add(*p))
}
