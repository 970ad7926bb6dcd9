//! Ethereum-side value types shared by the host contract and the Ethereum model.
//!
//! Addresses and signatures travel through JSON messages as `0x`-prefixed hex
//! strings, so both types carry hand-written serde and schema impls instead of
//! the derived array encodings.

use std::fmt;
use std::str::FromStr;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Binary, Uint256};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid signature recovery byte: {0}")]
    InvalidRecoveryByte(u8),
}

fn decode_hex(s: &str) -> Result<Vec<u8>, TypeError> {
    let stripped = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(stripped).map_err(|e| TypeError::InvalidHex(e.to_string()))
}

// ============================================================================
// EthAddress
// ============================================================================

/// A 20-byte Ethereum account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EthAddress([u8; 20]);

impl EthAddress {
    pub const ZERO: EthAddress = EthAddress([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        EthAddress(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: 20,
            got: bytes.len(),
        })?;
        Ok(EthAddress(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Left-padded to a 32-byte word, as `abi.encode(address)` lays it out.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl FromStr for EthAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EthAddress::from_slice(&decode_hex(s)?)
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({})", self)
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct EthAddressVisitor;

impl<'de> Visitor<'de> for EthAddressVisitor {
    type Value = EthAddress;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a 0x-prefixed 20-byte hex address")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(EthAddressVisitor)
    }
}

impl JsonSchema for EthAddress {
    fn schema_name() -> String {
        "EthAddress".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

// ============================================================================
// EthSignature
// ============================================================================

/// Recoverable secp256k1 signature in Ethereum `(v, r, s)` form.
///
/// `v == 0` is the absent sentinel: a signer slot that did not sign. Present
/// signatures carry `v` of 27 or 28.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthSignature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EthSignature {
    pub const fn absent() -> Self {
        EthSignature {
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
        }
    }

    pub fn is_absent(&self) -> bool {
        self.v == 0
    }

    /// Parse the 65-byte `r ‖ s ‖ v` encoding. A `v` of 0 or 1 is shifted to
    /// 27/28 unless the whole signature is zero.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != 65 {
            return Err(TypeError::InvalidLength {
                expected: 65,
                got: bytes.len(),
            });
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        let v = match bytes[64] {
            0 if r == [0u8; 32] && s == [0u8; 32] => 0,
            v @ (0 | 1) => v + 27,
            v @ (27 | 28) => v,
            other => return Err(TypeError::InvalidRecoveryByte(other)),
        };
        Ok(EthSignature { v, r, s })
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// The 64-byte `r ‖ s` body.
    pub fn rs(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[0..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out
    }

    /// Secp256k1 recovery id (0 or 1), or `None` for the absent sentinel and
    /// out-of-range `v` values.
    pub fn recovery_id(&self) -> Option<u8> {
        match self.v {
            27 | 28 => Some(self.v - 27),
            _ => None,
        }
    }
}

impl Default for EthSignature {
    fn default() -> Self {
        EthSignature::absent()
    }
}

impl FromStr for EthSignature {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EthSignature::from_bytes(&decode_hex(s)?)
    }
}

impl fmt::Display for EthSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for EthSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absent() {
            f.write_str("EthSignature(absent)")
        } else {
            write!(f, "EthSignature({})", self)
        }
    }
}

impl Serialize for EthSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct EthSignatureVisitor;

impl<'de> Visitor<'de> for EthSignatureVisitor {
    type Value = EthSignature;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a 0x-prefixed 65-byte hex signature")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for EthSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(EthSignatureVisitor)
    }
}

impl JsonSchema for EthSignature {
    fn schema_name() -> String {
        "EthSignature".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

// ============================================================================
// Outgoing artifacts
// ============================================================================

/// An ERC-20 amount on Ethereum.
#[cw_serde]
pub struct Erc20Token {
    pub contract: EthAddress,
    pub amount: Uint256,
}

/// One user transfer waiting in the pool or carried inside a batch.
#[cw_serde]
pub struct OutgoingTransferTx {
    pub id: u64,
    /// Host-chain account that funded the transfer and receives refunds.
    pub sender: String,
    pub dest_address: EthAddress,
    pub erc20_token: Erc20Token,
    /// Paid to whoever relays the batch on Ethereum.
    pub erc20_fee: Erc20Token,
}

#[cw_serde]
pub struct OutgoingTxBatch {
    pub batch_nonce: u64,
    /// Ethereum block height after which the batch can no longer execute.
    pub batch_timeout: u64,
    pub transactions: Vec<OutgoingTransferTx>,
    pub token_contract: EthAddress,
    /// Host block height at creation.
    pub block: u64,
}

impl OutgoingTxBatch {
    pub fn total_fee(&self) -> Uint256 {
        self.transactions
            .iter()
            .fold(Uint256::zero(), |acc, tx| acc + tx.erc20_fee.amount)
    }
}

#[cw_serde]
pub struct OutgoingLogicCall {
    pub transfers: Vec<Erc20Token>,
    pub fees: Vec<Erc20Token>,
    pub logic_contract_address: EthAddress,
    pub payload: Binary,
    /// Ethereum block height after which the call can no longer execute.
    pub timeout: u64,
    /// Exactly 32 bytes; scopes `invalidation_nonce`.
    pub invalidation_id: Binary,
    pub invalidation_nonce: u64,
    /// Host block height at creation.
    pub block: u64,
}
