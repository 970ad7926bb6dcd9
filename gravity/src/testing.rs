//! Fixtures shared by the unit tests.

use cosmwasm_std::{Addr, Storage};

use common::EthAddress;

use crate::state::{
    DelegateKeys, LastObservedEthHeight, Params, DELEGATE_KEYS, ETH_ADDRESS_TO_VALIDATOR,
    LAST_OBSERVED_ETH_HEIGHT, ORCHESTRATOR_TO_VALIDATOR,
};

pub fn params() -> Params {
    Params {
        gravity_id: "foo".to_string(),
        bridge_ethereum_address: EthAddress::ZERO,
        bridge_chain_id: 1,
        signed_valsets_window: 10,
        signed_batches_window: 10,
        signed_logic_calls_window: 10,
        target_batch_timeout: 60_000,
        average_block_time: 5_000,
        average_ethereum_block_time: 15_000,
        batch_size_limit: 10,
        valset_change_threshold_bps: 500,
        valset_reward: None,
        bridge_active: true,
        ethereum_blacklist: vec![],
        min_chain_fee_basis_points: 0,
        fee_collector: Addr::unchecked("collector"),
        logic_call_schedulers: vec![Addr::unchecked("scheduler")],
        hooks: vec![Addr::unchecked("hook")],
    }
}

pub fn token(byte: u8) -> EthAddress {
    EthAddress::new([byte; 20])
}

/// Register `validator` with orchestrator `<validator>_orch` and the given key.
pub fn register_keys(storage: &mut dyn Storage, validator: &str, eth_address: EthAddress) {
    let validator = Addr::unchecked(validator);
    let orchestrator = Addr::unchecked(format!("{}_orch", validator));
    DELEGATE_KEYS
        .save(
            storage,
            &validator,
            &DelegateKeys {
                validator: validator.clone(),
                orchestrator: orchestrator.clone(),
                eth_address,
            },
        )
        .unwrap();
    ORCHESTRATOR_TO_VALIDATOR
        .save(storage, &orchestrator, &validator)
        .unwrap();
    ETH_ADDRESS_TO_VALIDATOR
        .save(storage, eth_address.as_bytes(), &validator)
        .unwrap();
}

/// Pretend an attested event reported `eth_height` at host block `host_height`.
pub fn observe_eth_height(storage: &mut dyn Storage, eth_height: u64, host_height: u64) {
    LAST_OBSERVED_ETH_HEIGHT
        .save(
            storage,
            &LastObservedEthHeight {
                eth_height,
                host_height,
            },
        )
        .unwrap();
}
