//! Keys, validator sets and a deployed contract for the integration tests.

#![allow(dead_code)]

use alloy::primitives::{eip191_hash_message, keccak256, Address, FixedBytes, B256, U256};
use k256::ecdsa::SigningKey;
use tracing_subscriber::EnvFilter;

use common::{normalize_powers, EthAddress};
use gravity_ethereum::checkpoint::bytes32_tag;
use gravity_ethereum::{Gravity, GravityConfig, Signature, ValsetArgs};

pub const TOKEN: Address = Address::new([0x83; 20]);
pub const GRAVITY: Address = Address::new([0xee; 20]);
pub const RELAYER: Address = Address::new([0x7e; 20]);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

pub fn gravity_id() -> B256 {
    bytes32_tag("foo")
}

pub fn key(seed: u64) -> SigningKey {
    SigningKey::from_slice(keccak256(seed.to_be_bytes()).as_slice()).unwrap()
}

pub fn eth_address(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    Address::from_slice(&keccak256(&point.as_bytes()[1..])[12..])
}

pub fn sign(key: &SigningKey, hash: &B256) -> Signature {
    let digest = eip191_hash_message(hash);
    let (sig, recid) = key.sign_prehash_recoverable(digest.as_slice()).unwrap();
    let bytes = sig.to_bytes();
    Signature {
        v: 27 + recid.to_byte(),
        r: FixedBytes::from_slice(&bytes[..32]),
        s: FixedBytes::from_slice(&bytes[32..]),
    }
}

/// Signing keys and the validator set they make up, in set order.
pub struct Validators {
    pub keys: Vec<SigningKey>,
    pub valset: ValsetArgs,
}

impl Validators {
    /// Normalize `raw` stake over fresh keys seeded from `seed_base`.
    pub fn with_stake(seed_base: u64, raw: &[u64]) -> Self {
        let keys: Vec<SigningKey> = (0..raw.len() as u64).map(|i| key(seed_base + i)).collect();
        let stake: Vec<(EthAddress, u64)> = keys
            .iter()
            .zip(raw)
            .map(|(k, p)| (EthAddress::from_slice(eth_address(k).as_slice()).unwrap(), *p))
            .collect();
        let members = normalize_powers(&stake);

        // members come back sorted; line the keys up with them
        let keys: Vec<SigningKey> = members
            .iter()
            .map(|m| {
                keys.iter()
                    .find(|k| eth_address(k).as_slice() == m.eth_address.as_bytes())
                    .unwrap()
                    .clone()
            })
            .collect();
        let valset = ValsetArgs {
            validators: members
                .iter()
                .map(|m| Address::from(*m.eth_address.as_bytes()))
                .collect(),
            powers: members.iter().map(|m| U256::from(m.power)).collect(),
            valsetNonce: U256::ZERO,
            rewardAmount: U256::ZERO,
            rewardToken: Address::ZERO,
        };
        Validators { keys, valset }
    }

    pub fn equal(seed_base: u64, count: usize) -> Self {
        Self::with_stake(seed_base, &vec![100; count])
    }

    pub fn sign_all(&self, hash: &B256) -> Vec<Signature> {
        self.keys.iter().map(|k| sign(k, hash)).collect()
    }

    pub fn with_nonce(&self, nonce: u64) -> ValsetArgs {
        ValsetArgs {
            valsetNonce: U256::from(nonce),
            ..self.valset.clone()
        }
    }
}

pub fn deploy(validators: &Validators) -> Gravity {
    init_tracing();
    Gravity::new(
        GravityConfig {
            gravity_id: gravity_id(),
            address: GRAVITY,
        },
        &validators.valset,
    )
    .unwrap()
}

/// Lock `amount` of [`TOKEN`] in the contract through a user deposit.
pub fn fund(gravity: &mut Gravity, amount: u64) {
    let user = Address::repeat_byte(0x55);
    gravity
        .ledger_mut()
        .mint(TOKEN, user, U256::from(amount));
    gravity
        .send_to_cosmos(TOKEN, user, "cosmos1user", U256::from(amount))
        .unwrap();
}

pub fn balance(gravity: &Gravity, holder: Address) -> U256 {
    gravity.ledger().balance_of(TOKEN, holder)
}
