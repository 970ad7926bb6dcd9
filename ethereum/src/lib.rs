//! Gravity Ethereum - Executable Model of the Gravity Contract
//!
//! Mirrors the contract the host chain's validators sign for: validator set
//! updates, transaction batches and arbitrary logic calls, each accepted only
//! with a quorum of signatures from the validator set on file. Checkpoints
//! are encoded with alloy's ABI implementation so they can be compared
//! against the host-side codec in `common`.
//!
//! Token balances live in an in-memory [`TokenLedger`]; logic call targets
//! implement [`LogicContract`].

pub mod abi;
pub mod checkpoint;
pub mod error;
pub mod gravity;
pub mod ledger;
pub mod logic;
pub mod signature;

pub use abi::{BatchArgs, LogicCallArgs, Signature, ValsetArgs};
pub use error::{ErrorKind, GravityError};
pub use gravity::{Gravity, GravityConfig, GravityEvent, POWER_THRESHOLD};
pub use ledger::TokenLedger;
pub use logic::{forwardCall, Forwarder, LogicContext, LogicContract};
