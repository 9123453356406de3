//! # Test Fixtures
//!
//! Signing accounts, transaction builders and a `TestChain` that drives a
//! fully composed `App` block by block.

use ed25519_dalek::{Signer, SigningKey};
use serde_json::json;

use app_runtime::{App, AppConfig, EndBlockResponse, GenesisDoc, InitChainRequest, TxResult};
use lc_03_module_manager::{BeginBlockRequest, EndBlockRequest};
use lc_05_modules::bank::MSG_SEND;
use shared_types::{
    Address, AuthInfo, BaseAccount, BlockHeader, Coins, Fee, HexBytes, Msg, PubKey, SignerInfo, Tx,
    TxBody, VoteInfo,
};

pub const CHAIN: &str = "scenario-chain";
pub const DENOM: &str = "stake";
pub const FEE: u128 = 10;
pub const GAS_LIMIT: u64 = 200_000;
/// Seconds between test blocks.
pub const BLOCK_SECS: u64 = 5;

pub struct TestAccount {
    key: SigningKey,
    /// Assigned by the genesis built in `TestChain::start`.
    pub account_number: u64,
}

impl TestAccount {
    pub fn new(seed: u8, account_number: u64) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
            account_number,
        }
    }

    pub fn pub_key(&self) -> PubKey {
        PubKey(self.key.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        self.pub_key().address()
    }

    /// Sign `msgs` into raw transaction bytes.
    pub fn sign(&self, sequence: u64, msgs: Vec<Msg>, fee: Fee) -> Vec<u8> {
        let mut tx = Tx {
            body: TxBody {
                messages: msgs,
                ..Default::default()
            },
            auth_info: AuthInfo {
                signer_infos: vec![SignerInfo {
                    public_key: Some(self.pub_key()),
                    sequence,
                }],
                fee,
            },
            signatures: vec![],
        };
        let bytes = tx
            .sign_bytes(CHAIN, self.account_number, sequence)
            .unwrap();
        tx.signatures = vec![HexBytes(self.key.sign(&bytes).to_bytes().to_vec())];
        tx.encode().unwrap()
    }

    /// A signed transfer paying the standard fee.
    pub fn send(&self, sequence: u64, to: &Address, amount: u128) -> Vec<u8> {
        self.sign(sequence, vec![msg_send(&self.address(), to, amount)], fee(FEE))
    }
}

pub fn fee(amount: u128) -> Fee {
    Fee {
        amount: Coins::single(DENOM, amount),
        gas_limit: GAS_LIMIT,
        ..Default::default()
    }
}

pub fn msg_send(from: &Address, to: &Address, amount: u128) -> Msg {
    Msg::new(
        MSG_SEND,
        vec![*from],
        &json!({
            "from_address": from,
            "to_address": to,
            "amount": Coins::single(DENOM, amount),
        }),
    )
    .unwrap()
}

/// Default genesis with `accounts` funded. Account numbers follow the slice
/// order.
pub fn funded_genesis(app: &App, accounts: &[(&TestAccount, u128)]) -> GenesisDoc {
    let mut doc = app.default_genesis();
    doc.chain_id = CHAIN.into();
    let auth_accounts: Vec<BaseAccount> = accounts
        .iter()
        .map(|(acc, _)| BaseAccount::new(acc.address(), acc.account_number))
        .collect();
    let balances: Vec<serde_json::Value> = accounts
        .iter()
        .map(|(acc, amount)| json!({"address": acc.address(), "coins": Coins::single(DENOM, *amount)}))
        .collect();
    doc.app_state.insert("auth".into(), json!({ "accounts": auth_accounts }));
    doc.app_state.insert("bank".into(), json!({ "balances": balances }));
    doc
}

pub fn config() -> AppConfig {
    AppConfig {
        chain_id: CHAIN.into(),
        ..Default::default()
    }
}

/// An initialized application and the votes for its next block.
pub struct TestChain {
    pub app: App,
    pub votes: Vec<VoteInfo>,
}

impl TestChain {
    pub fn start(config: AppConfig, accounts: &[(&TestAccount, u128)]) -> Self {
        let app = App::build(config).unwrap();
        let genesis = funded_genesis(&app, accounts);
        Self::from_genesis(app, &genesis)
    }

    /// Initialize `app` from an already built genesis document.
    pub fn from_genesis(mut app: App, genesis: &GenesisDoc) -> Self {
        app.init_chain(InitChainRequest {
            chain_id: genesis.chain_id.clone(),
            genesis_time: 0,
            app_state_bytes: genesis.app_state_bytes().unwrap(),
        })
        .unwrap();
        Self {
            app,
            votes: Vec::new(),
        }
    }

    pub fn begin(&mut self) -> u64 {
        let height = self.app.last_height() + 1;
        self.app
            .begin_block(BeginBlockRequest {
                header: BlockHeader {
                    chain_id: CHAIN.into(),
                    height,
                    time: height * BLOCK_SECS,
                    ..Default::default()
                },
                last_commit_info: self.votes.clone(),
            })
            .unwrap();
        height
    }

    pub fn deliver(&mut self, raw: &[u8]) -> TxResult {
        self.app.deliver_tx(raw).unwrap()
    }

    pub fn end_and_commit(&mut self) -> EndBlockResponse {
        let height = self.app.last_height() + 1;
        let end = self.app.end_block(EndBlockRequest { height }).unwrap();
        self.app.commit().unwrap();
        end
    }

    /// A full block delivering `txs` in order.
    pub fn block(&mut self, txs: &[Vec<u8>]) -> (Vec<TxResult>, EndBlockResponse) {
        self.begin();
        let results = txs.iter().map(|raw| self.deliver(raw)).collect();
        (results, self.end_and_commit())
    }

    pub fn balance(&self, addr: &Address) -> u128 {
        let raw = self
            .app
            .query("bank/balance", &serde_json::to_vec(&json!({ "address": addr })).unwrap())
            .unwrap();
        serde_json::from_slice::<Coins>(&raw).unwrap().amount_of(DENOM)
    }

    pub fn account(&self, addr: &Address) -> Option<BaseAccount> {
        let raw = self
            .app
            .query("auth/account", &serde_json::to_vec(&json!({ "address": addr })).unwrap())
            .unwrap();
        serde_json::from_slice(&raw).unwrap()
    }
}
