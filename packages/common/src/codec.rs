//! Checkpoint codec
//!
//! Produces the 32-byte digests that Ethereum signers sign and that the
//! Gravity contract on Ethereum recomputes on-chain. Every layout here must
//! match Solidity's `abi.encode` byte for byte:
//!
//! ```solidity
//! keccak256(abi.encode(gravityId, bytes32("checkpoint"), valsetNonce,
//!     validators, powers, rewardAmount, rewardToken));
//!
//! keccak256(abi.encode(gravityId, bytes32("transactionBatch"), amounts,
//!     destinations, fees, batchNonce, tokenContract, batchTimeout));
//!
//! keccak256(abi.encode(gravityId, bytes32("logicCall"), transferAmounts,
//!     transferTokenContracts, feeAmounts, feeTokenContracts, logicContract,
//!     payload, timeOut, invalidationId, invalidationNonce));
//! ```
//!
//! # Encoding rules
//! - Static values (`bytes32`, `uint256`, `address`) occupy one 32-byte head word.
//!   Integers and addresses are left-padded, `bytes32` strings right-padded.
//! - Dynamic values (`T[]`, `bytes`) put an offset in the head word; the tail
//!   holds a length word followed by the elements (bytes are right-padded to a
//!   word boundary).

use cosmwasm_std::Uint256;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use crate::types::{EthAddress, OutgoingLogicCall, OutgoingTxBatch};
use crate::valset::Valset;

/// Method tag mixed into valset checkpoints.
pub const VALSET_METHOD: &str = "checkpoint";
/// Method tag mixed into batch checkpoints.
pub const BATCH_METHOD: &str = "transactionBatch";
/// Method tag mixed into logic call checkpoints.
pub const LOGIC_CALL_METHOD: &str = "logicCall";

const WORD: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("value does not fit in bytes32: {len} bytes")]
    Bytes32Overflow { len: usize },

    #[error("invalidation id must be exactly 32 bytes, got {len}")]
    InvalidInvalidationId { len: usize },
}

/// Compute keccak256 hash of arbitrary data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// `keccak256("\x19Ethereum Signed Message:\n32" ‖ hash)`, the digest that
/// Ethereum signers actually sign over a checkpoint.
pub fn eth_signed_message_hash(hash: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 28 + 32];
    data[..28].copy_from_slice(b"\x19Ethereum Signed Message:\n32");
    data[28..].copy_from_slice(hash);
    keccak256(&data)
}

/// Right-pad an ASCII string into a `bytes32`, the way Solidity converts a
/// short string literal.
pub fn string_to_bytes32(s: &str) -> Result<[u8; 32], CodecError> {
    let bytes = s.as_bytes();
    if bytes.len() > WORD {
        return Err(CodecError::Bytes32Overflow { len: bytes.len() });
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

pub fn invalidation_id_bytes(id: &[u8]) -> Result<[u8; 32], CodecError> {
    id.try_into()
        .map_err(|_| CodecError::InvalidInvalidationId { len: id.len() })
}

/// Convert bytes32 to hex string for display
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn u64_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn u256_word(value: Uint256) -> [u8; 32] {
    value.to_be_bytes()
}

// ============================================================================
// ABI head/tail encoder
// ============================================================================

enum AbiValue<'a> {
    Word([u8; 32]),
    Words(Vec<[u8; 32]>),
    Bytes(&'a [u8]),
}

fn abi_encode(values: &[AbiValue]) -> Vec<u8> {
    let head_len = values.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        match value {
            AbiValue::Word(word) => head.extend_from_slice(word),
            AbiValue::Words(words) => {
                head.extend_from_slice(&u64_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&u64_word(words.len() as u64));
                for word in words {
                    tail.extend_from_slice(word);
                }
            }
            AbiValue::Bytes(bytes) => {
                head.extend_from_slice(&u64_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&u64_word(bytes.len() as u64));
                tail.extend_from_slice(bytes);
                let padding = (WORD - bytes.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

fn method_word(method: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..method.len()].copy_from_slice(method.as_bytes());
    out
}

fn address_words<'a>(addrs: impl Iterator<Item = &'a EthAddress>) -> Vec<[u8; 32]> {
    addrs.map(EthAddress::to_word).collect()
}

// ============================================================================
// Checkpoints
// ============================================================================

/// ABI encoding hashed by [`valset_checkpoint`].
pub fn encode_valset(gravity_id: &[u8; 32], valset: &Valset) -> Vec<u8> {
    let reward_token = valset.reward_token.unwrap_or(EthAddress::ZERO);
    abi_encode(&[
        AbiValue::Word(*gravity_id),
        AbiValue::Word(method_word(VALSET_METHOD)),
        AbiValue::Word(u64_word(valset.nonce)),
        AbiValue::Words(address_words(valset.members.iter().map(|m| &m.eth_address))),
        AbiValue::Words(valset.members.iter().map(|m| u64_word(m.power)).collect()),
        AbiValue::Word(u256_word(valset.reward_amount)),
        AbiValue::Word(reward_token.to_word()),
    ])
}

pub fn valset_checkpoint(gravity_id: &[u8; 32], valset: &Valset) -> [u8; 32] {
    keccak256(&encode_valset(gravity_id, valset))
}

/// ABI encoding hashed by [`batch_checkpoint`].
pub fn encode_batch(gravity_id: &[u8; 32], batch: &OutgoingTxBatch) -> Vec<u8> {
    let txs = &batch.transactions;
    abi_encode(&[
        AbiValue::Word(*gravity_id),
        AbiValue::Word(method_word(BATCH_METHOD)),
        AbiValue::Words(txs.iter().map(|tx| u256_word(tx.erc20_token.amount)).collect()),
        AbiValue::Words(address_words(txs.iter().map(|tx| &tx.dest_address))),
        AbiValue::Words(txs.iter().map(|tx| u256_word(tx.erc20_fee.amount)).collect()),
        AbiValue::Word(u64_word(batch.batch_nonce)),
        AbiValue::Word(batch.token_contract.to_word()),
        AbiValue::Word(u64_word(batch.batch_timeout)),
    ])
}

pub fn batch_checkpoint(gravity_id: &[u8; 32], batch: &OutgoingTxBatch) -> [u8; 32] {
    keccak256(&encode_batch(gravity_id, batch))
}

/// ABI encoding hashed by [`logic_call_checkpoint`].
pub fn encode_logic_call(
    gravity_id: &[u8; 32],
    call: &OutgoingLogicCall,
) -> Result<Vec<u8>, CodecError> {
    let invalidation_id = invalidation_id_bytes(call.invalidation_id.as_slice())?;
    Ok(abi_encode(&[
        AbiValue::Word(*gravity_id),
        AbiValue::Word(method_word(LOGIC_CALL_METHOD)),
        AbiValue::Words(call.transfers.iter().map(|t| u256_word(t.amount)).collect()),
        AbiValue::Words(address_words(call.transfers.iter().map(|t| &t.contract))),
        AbiValue::Words(call.fees.iter().map(|t| u256_word(t.amount)).collect()),
        AbiValue::Words(address_words(call.fees.iter().map(|t| &t.contract))),
        AbiValue::Word(call.logic_contract_address.to_word()),
        AbiValue::Bytes(call.payload.as_slice()),
        AbiValue::Word(u64_word(call.timeout)),
        AbiValue::Word(invalidation_id),
        AbiValue::Word(u64_word(call.invalidation_nonce)),
    ]))
}

pub fn logic_call_checkpoint(
    gravity_id: &[u8; 32],
    call: &OutgoingLogicCall,
) -> Result<[u8; 32], CodecError> {
    Ok(keccak256(&encode_logic_call(gravity_id, call)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Erc20Token, OutgoingTransferTx};
    use crate::valset::ValsetMember;
    use cosmwasm_std::Binary;

    fn addr(s: &str) -> EthAddress {
        s.parse().unwrap()
    }

    fn gid(s: &str) -> [u8; 32] {
        string_to_bytes32(s).unwrap()
    }

    const TOKEN: &str = "0x835973768750b3ed2d5c3ef5adcd5edb44d12ad4";

    #[test]
    fn test_keccak256_known_vectors() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            hex::encode(keccak256(b"hello")),
            "1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_single_member_valset_checkpoint() {
        let valset = Valset {
            nonce: 0,
            members: vec![ValsetMember {
                eth_address: addr("0xc783df8a850f42e7f7e57013759c285caa701eb6"),
                power: 3333,
            }],
            height: 0,
            reward_amount: Uint256::zero(),
            reward_token: None,
        };
        let encoded = encode_valset(&gid("foo"), &valset);
        // 7 head words + 2 array tails of (length + 1 element)
        assert_eq!(encoded.len(), 352);
        assert_eq!(
            bytes32_to_hex(&valset_checkpoint(&gid("foo"), &valset)),
            "0xdb78edbf63b0b089737b142c6ec2242810effb544a21c27068946cc77b6ded43"
        );
    }

    #[test]
    fn test_rewarded_valset_checkpoint() {
        let members = [
            "0xc783df8a850f42e7f7e57013759c285caa701eb6",
            "0xead9c93b79ae7c1591b1fb5323bd777e86e150d4",
            "0xe5904695748fe4a84b40b3fc79de2277660bd1d3",
        ]
        .iter()
        .map(|a| ValsetMember {
            eth_address: addr(a),
            power: 1_431_655_765,
        })
        .collect();
        let valset = Valset {
            nonce: 7,
            members,
            height: 99,
            reward_amount: Uint256::from(500u64),
            reward_token: Some(addr(TOKEN)),
        };
        assert_eq!(
            bytes32_to_hex(&valset_checkpoint(&gid("bar"), &valset)),
            "0xdf45fecd36e189b968de246735e43fe0aeec7a9da3ed6bc3afbec324f1a9f6c1"
        );
    }

    #[test]
    fn test_empty_valset_checkpoint() {
        let valset = Valset {
            nonce: 1,
            members: vec![],
            height: 0,
            reward_amount: Uint256::zero(),
            reward_token: None,
        };
        assert_eq!(
            bytes32_to_hex(&valset_checkpoint(&gid("foo"), &valset)),
            "0x58b36117f6503c5dbc815184e0ee5edcf995642f8251ab0531754dff545bfb13"
        );
    }

    #[test]
    fn test_batch_checkpoint() {
        let token = addr(TOKEN);
        let batch = OutgoingTxBatch {
            batch_nonce: 1,
            batch_timeout: 2111,
            transactions: vec![OutgoingTransferTx {
                id: 1,
                sender: "cosmos1sender".to_string(),
                dest_address: addr("0x9fc9c2dfba3b6cf204c37a5f690619772b926e39"),
                erc20_token: Erc20Token {
                    contract: token,
                    amount: Uint256::from(1u64),
                },
                erc20_fee: Erc20Token {
                    contract: token,
                    amount: Uint256::from(1u64),
                },
            }],
            token_contract: token,
            block: 1234,
        };
        assert_eq!(
            bytes32_to_hex(&batch_checkpoint(&gid("foo"), &batch)),
            "0xa3a7ee0a363b8ad2514e7ee8f110d7449c0d88f3b0913c28c1751e6e0079a9b2"
        );
    }

    #[test]
    fn test_logic_call_checkpoint() {
        let token = Erc20Token {
            contract: addr(TOKEN),
            amount: Uint256::from(1u64),
        };
        let call = OutgoingLogicCall {
            transfers: vec![token.clone()],
            fees: vec![token],
            logic_contract_address: addr("0x17c1736ccf692f653c433d7aa2ab45148c016f68"),
            payload: Binary::from(b"testingPayload".to_vec()),
            timeout: 4_766_922_941_000,
            invalidation_id: Binary::from(gid("invalidationId").to_vec()),
            invalidation_nonce: 1,
            block: 0,
        };
        assert_eq!(
            bytes32_to_hex(&logic_call_checkpoint(&gid("foo"), &call).unwrap()),
            "0x5058ada5231b104b724f1fe632edfa5206ad4c01ed6d0507ec5d7a536cbe9e17"
        );

        let mut short_id = call;
        short_id.invalidation_id = Binary::from(vec![1u8; 31]);
        assert_eq!(
            logic_call_checkpoint(&gid("foo"), &short_id),
            Err(CodecError::InvalidInvalidationId { len: 31 })
        );
    }

    #[test]
    fn test_eth_signed_message_hash() {
        let checkpoint: [u8; 32] =
            hex::decode("db78edbf63b0b089737b142c6ec2242810effb544a21c27068946cc77b6ded43")
                .unwrap()
                .try_into()
                .unwrap();
        assert_eq!(
            bytes32_to_hex(&eth_signed_message_hash(&checkpoint)),
            "0x7a86a1eceb1d72b88217a985f222ebd66573d37175a3f0c9c3a4dc2db8263d83"
        );
    }

    #[test]
    fn test_method_tags_separate_artifact_domains() {
        let empty_batch = OutgoingTxBatch {
            batch_nonce: 1,
            batch_timeout: 0,
            transactions: vec![],
            token_contract: EthAddress::ZERO,
            block: 0,
        };
        let encoded = encode_batch(&gid("foo"), &empty_batch);
        assert_eq!(&encoded[32..48], b"transactionBatch");
        assert_eq!(&encoded[48..64], &[0u8; 16]);
    }

    #[test]
    fn test_string_to_bytes32_overflow() {
        let long = "x".repeat(33);
        assert_eq!(
            string_to_bytes32(&long),
            Err(CodecError::Bytes32Overflow { len: 33 })
        );
        assert_eq!(&string_to_bytes32("foo").unwrap()[..4], b"foo\0");
    }
}
