//! Validator sets as Ethereum sees them.
//!
//! Host-chain stake is rescaled so a full set sums to (at most) `u32::MAX`.
//! Ethereum compares cumulative signer power against [`POWER_THRESHOLD`], so
//! the same normalized numbers must appear in checkpoints, confirmations and
//! the attestation tally.

use std::collections::BTreeMap;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::Uint256;
use thiserror::Error;

use crate::types::EthAddress;

/// Sum of normalized power for a complete validator set.
pub const TOTAL_NORMALIZED_POWER: u64 = u32::MAX as u64;

/// Two thirds of [`TOTAL_NORMALIZED_POWER`], rounded down.
pub const POWER_THRESHOLD: u64 = TOTAL_NORMALIZED_POWER * 2 / 3;

/// Basis point denominator used for power-change thresholds.
pub const BASIS_POINTS: u64 = 10_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValsetError {
    #[error("duplicate member {0}")]
    DuplicateMember(EthAddress),

    #[error("total power {total} exceeds {}", TOTAL_NORMALIZED_POWER)]
    PowerOverflow { total: u64 },

    #[error("members are not sorted by descending power")]
    Unsorted,
}

#[cw_serde]
pub struct ValsetMember {
    pub eth_address: EthAddress,
    pub power: u64,
}

/// A nonce-stamped validator set with its optional relayer reward.
#[cw_serde]
pub struct Valset {
    pub nonce: u64,
    pub members: Vec<ValsetMember>,
    /// Host block height at creation.
    pub height: u64,
    pub reward_amount: Uint256,
    /// `None` encodes as the zero address.
    pub reward_token: Option<EthAddress>,
}

impl Valset {
    pub fn addresses(&self) -> Vec<EthAddress> {
        self.members.iter().map(|m| m.eth_address).collect()
    }

    pub fn powers(&self) -> Vec<u64> {
        self.members.iter().map(|m| m.power).collect()
    }

    /// Members must be unique, ordered by [`sort_members`], and sum to no
    /// more than [`TOTAL_NORMALIZED_POWER`].
    pub fn validate(&self) -> Result<(), ValsetError> {
        let mut seen = std::collections::BTreeSet::new();
        for member in &self.members {
            if !seen.insert(member.eth_address) {
                return Err(ValsetError::DuplicateMember(member.eth_address));
            }
        }
        let total = self
            .members
            .iter()
            .try_fold(0u64, |acc, m| acc.checked_add(m.power))
            .unwrap_or(u64::MAX);
        if total > TOTAL_NORMALIZED_POWER {
            return Err(ValsetError::PowerOverflow { total });
        }
        if self
            .members
            .windows(2)
            .any(|w| member_order(&w[0], &w[1]) == std::cmp::Ordering::Greater)
        {
            return Err(ValsetError::Unsorted);
        }
        Ok(())
    }
}

fn member_order(a: &ValsetMember, b: &ValsetMember) -> std::cmp::Ordering {
    b.power
        .cmp(&a.power)
        .then_with(|| a.eth_address.cmp(&b.eth_address))
}

/// Descending power, ties broken by ascending address bytes.
pub fn sort_members(members: &mut [ValsetMember]) {
    members.sort_by(member_order);
}

/// Rescale raw stake so the set sums to at most [`TOTAL_NORMALIZED_POWER`].
///
/// Each member gets `floor(raw * u32::MAX / total_raw)`; members whose share
/// rounds to zero are kept. The result is sorted with [`sort_members`].
pub fn normalize_powers(raw: &[(EthAddress, u64)]) -> Vec<ValsetMember> {
    let total: u128 = raw.iter().map(|(_, p)| *p as u128).sum();
    let mut members: Vec<ValsetMember> = raw
        .iter()
        .map(|(eth_address, power)| ValsetMember {
            eth_address: *eth_address,
            power: if total == 0 {
                0
            } else {
                (*power as u128 * TOTAL_NORMALIZED_POWER as u128 / total) as u64
            },
        })
        .collect();
    sort_members(&mut members);
    members
}

/// Sum of absolute per-address power changes between two normalized sets,
/// in basis points of [`TOTAL_NORMALIZED_POWER`]. Addresses present on only
/// one side count their full power.
pub fn power_diff_bps(old: &[ValsetMember], new: &[ValsetMember]) -> u64 {
    let mut deltas: BTreeMap<EthAddress, i128> = BTreeMap::new();
    for m in old {
        *deltas.entry(m.eth_address).or_default() += m.power as i128;
    }
    for m in new {
        *deltas.entry(m.eth_address).or_default() -= m.power as i128;
    }
    let moved: u128 = deltas.values().map(|d| d.unsigned_abs()).sum();
    (moved * BASIS_POINTS as u128 / TOTAL_NORMALIZED_POWER as u128) as u64
}
