//! Shared setup for the integration tests: a multi-test App with the Gravity
//! contract, a recording hook contract and four bonded validators whose
//! orchestrators sign with real secp256k1 keys.

#![allow(dead_code)]

use cosmwasm_std::{
    coins, to_json_binary, Addr, Binary, Deps, DepsMut, Empty, Env, MessageInfo, Response,
    StdResult, Uint128, Uint256,
};
use cw20::{BalanceResponse, Cw20QueryMsg, MinterResponse};
use cw_multi_test::{App, AppResponse, ContractWrapper, Executor};
use cw_storage_plus::Item;
use k256::ecdsa::SigningKey;

use common::verify::pubkey_to_address;
use common::{
    batch_checkpoint, eth_signed_message_hash, string_to_bytes32, EthAddress, EthSignature,
    OutgoingTxBatch,
};
use gravity::msg::{
    ExecuteMsg, GovProposal, GravityHookMsg, HookExecuteMsg, InstantiateMsg, ParamsUpdate,
    QueryMsg, SudoMsg, ValidatorPower, ValsetResponse,
};
use gravity::state::{ClaimKind, EthereumClaim};

pub const DENOM: &str = "ugrav";
pub const GRAVITY_ID: &str = "foo";

// ============================================================================
// Contracts
// ============================================================================

fn contract_gravity() -> Box<dyn cw_multi_test::Contract<Empty>> {
    let contract = ContractWrapper::new(
        gravity::contract::execute,
        gravity::contract::instantiate,
        gravity::contract::query,
    )
    .with_sudo(gravity::contract::sudo)
    .with_reply(gravity::contract::reply);
    Box::new(contract)
}

fn contract_cw20() -> Box<dyn cw_multi_test::Contract<Empty>> {
    let contract = ContractWrapper::new(
        cw20_base::contract::execute,
        cw20_base::contract::instantiate,
        cw20_base::contract::query,
    );
    Box::new(contract)
}

/// Every notification the hook contract received, in delivery order.
const HOOK_CALLS: Item<Vec<GravityHookMsg>> = Item::new("hook_calls");

fn hook_instantiate(deps: DepsMut, _: Env, _: MessageInfo, _: Empty) -> StdResult<Response> {
    HOOK_CALLS.save(deps.storage, &vec![])?;
    Ok(Response::new())
}

fn hook_execute(
    deps: DepsMut,
    _: Env,
    _: MessageInfo,
    msg: HookExecuteMsg,
) -> StdResult<Response> {
    let HookExecuteMsg::GravityHook(event) = msg;
    HOOK_CALLS.update(deps.storage, |mut calls| -> StdResult<_> {
        calls.push(event);
        Ok(calls)
    })?;
    Ok(Response::new())
}

fn hook_query(deps: Deps, _: Env, _: Empty) -> StdResult<Binary> {
    to_json_binary(&HOOK_CALLS.load(deps.storage)?)
}

fn contract_hook() -> Box<dyn cw_multi_test::Contract<Empty>> {
    Box::new(ContractWrapper::new(hook_execute, hook_instantiate, hook_query))
}

// ============================================================================
// Validators
// ============================================================================

pub struct Validator {
    pub operator: Addr,
    pub orchestrator: Addr,
    pub key: SigningKey,
    pub eth_address: EthAddress,
    pub power: u64,
}

impl Validator {
    fn new(index: u8, power: u64) -> Self {
        let key = SigningKey::from_slice(&[index + 1; 32]).unwrap();
        let eth_address =
            pubkey_to_address(key.verifying_key().to_encoded_point(false).as_bytes()).unwrap();
        Validator {
            operator: Addr::unchecked(format!("val{}", index)),
            orchestrator: Addr::unchecked(format!("orch{}", index)),
            key,
            eth_address,
            power,
        }
    }

    /// Ethereum-style signature over `checkpoint`.
    pub fn sign(&self, checkpoint: &[u8; 32]) -> EthSignature {
        sign_with(&self.key, checkpoint)
    }
}

pub fn sign_with(key: &SigningKey, checkpoint: &[u8; 32]) -> EthSignature {
    let digest = eth_signed_message_hash(checkpoint);
    let (sig, recid) = key.sign_prehash_recoverable(&digest).unwrap();
    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&sig.to_bytes());
    bytes[64] = 27 + recid.to_byte();
    EthSignature::from_bytes(&bytes).unwrap()
}

pub fn token(byte: u8) -> EthAddress {
    EthAddress::new([byte; 20])
}

// ============================================================================
// Suite
// ============================================================================

pub struct Suite {
    pub app: App,
    pub gravity: Addr,
    pub hook: Addr,
    pub validators: Vec<Validator>,
    pub user: Addr,
    pub collector: Addr,
    pub scheduler: Addr,
}

impl Suite {
    /// Four validators with 25 power each, so three of them hold quorum.
    pub fn new() -> Self {
        Self::with_powers(&[25, 25, 25, 25])
    }

    pub fn with_powers(powers: &[u64]) -> Self {
        let mut app = App::default();
        let user = Addr::unchecked("user");
        let collector = Addr::unchecked("collector");
        let scheduler = Addr::unchecked("scheduler");
        let admin = Addr::unchecked("admin");

        app.init_modules(|router, _, storage| {
            router
                .bank
                .init_balance(storage, &user, coins(10_000_000, DENOM))
                .unwrap();
        });

        let hook_code = app.store_code(contract_hook());
        let hook = app
            .instantiate_contract(hook_code, admin.clone(), &Empty {}, &[], "hook", None)
            .unwrap();

        let validators: Vec<Validator> = powers
            .iter()
            .enumerate()
            .map(|(i, p)| Validator::new(i as u8, *p))
            .collect();

        let gravity_code = app.store_code(contract_gravity());
        let gravity = app
            .instantiate_contract(
                gravity_code,
                admin.clone(),
                &InstantiateMsg {
                    gravity_id: GRAVITY_ID.to_string(),
                    bridge_ethereum_address: token(0xee),
                    bridge_chain_id: 1,
                    fee_collector: collector.to_string(),
                    hooks: vec![hook.to_string()],
                    logic_call_schedulers: vec![scheduler.to_string()],
                    validators: bonded(&validators),
                    params: Some(ParamsUpdate {
                        signed_valsets_window: Some(10),
                        signed_batches_window: Some(10),
                        signed_logic_calls_window: Some(10),
                        // 60s at 15s per Ethereum block: batches live 4 blocks
                        target_batch_timeout: Some(60_000),
                        average_block_time: Some(5_000),
                        average_ethereum_block_time: Some(15_000),
                        batch_size_limit: Some(10),
                        ..ParamsUpdate::default()
                    }),
                },
                &[],
                "gravity",
                Some(admin.to_string()),
            )
            .unwrap();

        let mut suite = Suite {
            app,
            gravity,
            hook,
            validators,
            user,
            collector,
            scheduler,
        };
        for i in 0..suite.validators.len() {
            let v = &suite.validators[i];
            let msg = ExecuteMsg::SetOrchestratorAddress {
                orchestrator: v.orchestrator.to_string(),
                eth_address: v.eth_address,
            };
            let operator = v.operator.clone();
            suite.execute(&operator, &msg).unwrap();
        }
        suite
    }

    pub fn execute(&mut self, sender: &Addr, msg: &ExecuteMsg) -> anyhow::Result<AppResponse> {
        self.app
            .execute_contract(sender.clone(), self.gravity.clone(), msg, &[])
    }

    pub fn sudo(&mut self, msg: &SudoMsg) -> anyhow::Result<AppResponse> {
        self.app.wasm_sudo(self.gravity.clone(), msg)
    }

    pub fn proposal(&mut self, proposal: GovProposal) -> anyhow::Result<AppResponse> {
        self.sudo(&SudoMsg::Proposal(proposal))
    }

    /// Run end-block processing at the current height, then advance one block.
    pub fn end_block(&mut self) -> AppResponse {
        let msg = SudoMsg::EndBlock {
            validators: bonded(&self.validators),
        };
        let res = self.sudo(&msg).unwrap();
        self.app.update_block(|b| {
            b.height += 1;
            b.time = b.time.plus_seconds(5);
        });
        res
    }

    pub fn query<T: serde::de::DeserializeOwned>(&self, msg: &QueryMsg) -> T {
        self.app
            .wrap()
            .query_wasm_smart(self.gravity.clone(), msg)
            .unwrap()
    }

    pub fn hook_calls(&self) -> Vec<GravityHookMsg> {
        self.app
            .wrap()
            .query_wasm_smart(self.hook.clone(), &Empty {})
            .unwrap()
    }

    pub fn gravity_id(&self) -> [u8; 32] {
        string_to_bytes32(GRAVITY_ID).unwrap()
    }

    // ------------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------------

    /// Submit `kind` at `event_nonce` from the orchestrators of `voters`.
    pub fn attest(
        &mut self,
        voters: &[usize],
        event_nonce: u64,
        eth_block_height: u64,
        kind: ClaimKind,
    ) {
        for &i in voters {
            let orchestrator = self.validators[i].orchestrator.clone();
            self.execute(
                &orchestrator,
                &ExecuteMsg::SubmitClaim {
                    claim: EthereumClaim {
                        event_nonce,
                        eth_block_height,
                        kind: kind.clone(),
                    },
                },
            )
            .unwrap();
        }
    }

    /// Map the native denom to `erc20` through an attested deployment event.
    pub fn register_native(&mut self, event_nonce: u64, erc20: EthAddress) {
        self.attest(
            &[0, 1, 2],
            event_nonce,
            10,
            ClaimKind::Erc20Deployed {
                cosmos_denom: DENOM.to_string(),
                token_contract: erc20,
                name: "Graviton".to_string(),
                symbol: "GRAV".to_string(),
                decimals: 6,
            },
        );
        self.end_block();
    }

    pub fn send_to_eth(
        &mut self,
        dest: EthAddress,
        amount: u128,
        bridge_fee: u128,
    ) -> anyhow::Result<AppResponse> {
        let user = self.user.clone();
        self.app.execute_contract(
            user,
            self.gravity.clone(),
            &ExecuteMsg::SendToEth {
                eth_dest: dest,
                amount: Uint128::new(amount),
                bridge_fee: Uint128::new(bridge_fee),
                chain_fee: Uint128::zero(),
            },
            &coins(amount + bridge_fee, DENOM),
        )
    }

    pub fn request_batch(&mut self, token_contract: EthAddress) -> anyhow::Result<AppResponse> {
        let user = self.user.clone();
        self.execute(&user, &ExecuteMsg::RequestBatch { token_contract })
    }

    pub fn batch(&self, token_contract: EthAddress, nonce: u64) -> Option<OutgoingTxBatch> {
        self.query(&QueryMsg::Batch {
            token_contract,
            nonce,
        })
    }

    /// Confirm a stored batch from the orchestrators of `signers`.
    pub fn confirm_batch(&mut self, signers: &[usize], token_contract: EthAddress, nonce: u64) {
        let batch = self.batch(token_contract, nonce).unwrap();
        let checkpoint = batch_checkpoint(&self.gravity_id(), &batch);
        for &i in signers {
            let signature = self.validators[i].sign(&checkpoint);
            let orchestrator = self.validators[i].orchestrator.clone();
            self.execute(
                &orchestrator,
                &ExecuteMsg::ConfirmBatch {
                    token_contract,
                    nonce,
                    signature,
                },
            )
            .unwrap();
        }
    }

    /// Confirm a stored valset from the orchestrators of `signers`.
    pub fn confirm_valset(&mut self, signers: &[usize], nonce: u64) {
        let res: ValsetResponse = self.query(&QueryMsg::Valset { nonce });
        let checkpoint: [u8; 32] = res.checkpoint.unwrap().as_slice().try_into().unwrap();
        for &i in signers {
            let signature = self.validators[i].sign(&checkpoint);
            let orchestrator = self.validators[i].orchestrator.clone();
            self.execute(&orchestrator, &ExecuteMsg::ValsetConfirm { nonce, signature })
                .unwrap();
        }
    }

    // ------------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------------

    pub fn native_balance(&self, addr: &Addr) -> u128 {
        self.app
            .wrap()
            .query_balance(addr, DENOM)
            .unwrap()
            .amount
            .u128()
    }

    pub fn cw20_balance(&self, cw20: &Addr, addr: &Addr) -> u128 {
        let res: BalanceResponse = self
            .app
            .wrap()
            .query_wasm_smart(
                cw20,
                &Cw20QueryMsg::Balance {
                    address: addr.to_string(),
                },
            )
            .unwrap();
        res.balance.u128()
    }

    /// Deploy a cw20 voucher minted by the Gravity contract and register it
    /// for `erc20`.
    pub fn deploy_voucher(&mut self, erc20: EthAddress) -> Addr {
        let code = self.app.store_code(contract_cw20());
        let cw20 = self
            .app
            .instantiate_contract(
                code,
                Addr::unchecked("admin"),
                &cw20_base::msg::InstantiateMsg {
                    name: "Wrapped Ether".to_string(),
                    symbol: "WETH".to_string(),
                    decimals: 18,
                    initial_balances: vec![],
                    mint: Some(MinterResponse {
                        minter: self.gravity.to_string(),
                        cap: None,
                    }),
                    marketing: None,
                },
                &[],
                "voucher",
                None,
            )
            .unwrap();
        self.proposal(GovProposal::RegisterVoucher {
            erc20,
            cw20: cw20.to_string(),
        })
        .unwrap();
        cw20
    }
}

pub fn bonded(validators: &[Validator]) -> Vec<ValidatorPower> {
    validators
        .iter()
        .map(|v| ValidatorPower {
            operator: v.operator.to_string(),
            power: v.power,
        })
        .collect()
}

pub fn deposit(token_contract: EthAddress, amount: u128, receiver: &str) -> ClaimKind {
    ClaimKind::SendToCosmos {
        token_contract,
        amount: Uint256::from(amount),
        ethereum_sender: token(0xab),
        cosmos_receiver: receiver.to_string(),
    }
}

pub fn attr<'a>(res: &'a AppResponse, key: &str) -> Option<&'a str> {
    res.events
        .iter()
        .flat_map(|e| e.attributes.iter())
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
}
