//! Gravity Bridge Contract - the Cosmos side of the Gravity bridge
//!
//! Validators of the host chain operate the bridge. Each runs an orchestrator
//! that watches Ethereum and signs what this contract produces.
//!
//! # Ethereum to Cosmos
//! 1. A user deposits on the Gravity contract on Ethereum
//! 2. Orchestrators submit the event as a claim
//! 3. Once 2/3 of bonded power agrees on identical content, the claim is
//!    observed and applied in event-nonce order (mint or unlock)
//!
//! # Cosmos to Ethereum
//! 1. A user queues a transfer with `SendToEth` (chain fee and bridge fee)
//! 2. A relayer requests a batch; validators sign its checkpoint
//! 3. The relayer submits batch and signatures to Ethereum
//! 4. The executed batch comes back as a claim and clears older batches
//!
//! # Validator Sets
//! Valsets are produced from the bonded set at end-block and signed like any
//! other artifact. Missed signatures and bad signatures are reported to the
//! registered hook contracts.

pub mod attestation;
pub mod batch;
pub mod confirm;
pub mod contract;
pub mod end_block;
pub mod error;
mod execute;
pub mod fee;
pub mod hooks;
pub mod logic_call;
pub mod msg;
mod query;
pub mod slashing;
pub mod state;
pub mod valset;

#[cfg(test)]
mod testing;

pub use crate::error::ContractError;
pub use crate::state::Params;
