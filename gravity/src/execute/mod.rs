//! Execute and governance handlers for the Gravity bridge contract.
//!
//! Handlers are grouped by who calls them:
//! - `delegate`, `claims`, `confirm` - validators and their orchestrators
//! - `outgoing`, `logic_call` - users, relayers and logic call schedulers
//! - `evidence` - anyone holding a bad signature
//! - `config`, `admin` - passed governance proposals, delivered through sudo

mod admin;
mod claims;
mod config;
mod confirm;
mod delegate;
mod evidence;
mod logic_call;
mod outgoing;

pub use admin::*;
pub use claims::*;
pub use config::*;
pub use confirm::*;
pub use delegate::*;
pub use evidence::*;
pub use logic_call::*;
pub use outgoing::*;
