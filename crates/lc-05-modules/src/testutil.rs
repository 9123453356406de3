//! Fully wired keeper set over an empty store.

use std::collections::BTreeSet;
use std::sync::Arc;

use lc_01_state_store::{CommitMultiStore, Context, ExecMode, ParamsKeeper, Snapshot, StoreKeyRegistry};
use lc_02_module_accounts::{parse_permissions, PermissionTable};
use shared_types::{Address, BlockHeader, Coins, PubKey, VoteInfo};

use crate::distribution::DistrHooks;
use crate::slashing::SlashingHooks;
use crate::{
    auth, bank, crisis, distribution, feegrant, mint, params, slashing, staking, AuthKeeper,
    BankKeeper, CrisisKeeper, DistrKeeper, FeegrantKeeper, MintKeeper, MultiStakingHooks,
    SlashingKeeper, StakingHooks, StakingKeeper, BONDED_POOL, FEE_COLLECTOR, NOT_BONDED_POOL,
};

pub const TEST_CHAIN: &str = "test-chain";
/// Seconds between harness blocks.
pub const BLOCK_TIME: u64 = 5;
pub const INV_CHECK_PERIOD: u64 = 5;
pub const POWER: u128 = staking::POWER_REDUCTION;

pub fn stake(amount: u128) -> Coins {
    Coins::single("stake", amount)
}

pub struct Harness {
    snapshot: Arc<Snapshot>,
    pub table: Arc<PermissionTable>,
    pub params: Arc<ParamsKeeper>,
    pub auth: Arc<AuthKeeper>,
    pub bank: Arc<BankKeeper>,
    pub staking: Arc<StakingKeeper>,
    pub mint: Arc<MintKeeper>,
    pub distr: Arc<DistrKeeper>,
    pub slashing: Arc<SlashingKeeper>,
    pub crisis: Arc<CrisisKeeper>,
    pub feegrant: Arc<FeegrantKeeper>,
}

impl Harness {
    pub fn new() -> Self {
        let mut reg = StoreKeyRegistry::new();
        let kv = reg
            .allocate_kv(&[
                auth::STORE_KEY,
                bank::STORE_KEY,
                staking::STORE_KEY,
                mint::STORE_KEY,
                distribution::STORE_KEY,
                slashing::STORE_KEY,
                params::STORE_KEY,
                feegrant::STORE_KEY,
            ])
            .unwrap();
        let tkeys = reg.allocate_transient(&[params::TRANSIENT_KEY]).unwrap();
        let mkeys = reg.allocate_memory(&[crisis::MEMORY_KEY]).unwrap();
        let mut cms = CommitMultiStore::new();
        cms.mount_all(&reg.all_keys()).unwrap();

        let raw = parse_permissions([
            (FEE_COLLECTOR, vec![]),
            (distribution::MODULE_NAME, vec![]),
            (mint::MODULE_NAME, vec!["minter"]),
            (BONDED_POOL, vec!["burner", "staking"]),
            (NOT_BONDED_POOL, vec!["burner", "staking"]),
        ])
        .unwrap();
        let table = Arc::new(PermissionTable::derive(raw, &BTreeSet::new()).unwrap());

        let mut pk = ParamsKeeper::new(
            kv[params::STORE_KEY].clone(),
            tkeys[params::TRANSIENT_KEY].clone(),
        );
        let auth = Arc::new(AuthKeeper::new(
            kv[auth::STORE_KEY].clone(),
            pk.subspace(auth::MODULE_NAME).unwrap(),
            Arc::clone(&table),
        ));
        let bank = Arc::new(BankKeeper::new(
            kv[bank::STORE_KEY].clone(),
            Arc::clone(&auth),
            pk.subspace(bank::MODULE_NAME).unwrap(),
        ));
        let staking = Arc::new(StakingKeeper::new(
            kv[staking::STORE_KEY].clone(),
            Arc::clone(&bank),
            pk.subspace(staking::MODULE_NAME).unwrap(),
        ));
        let mint = Arc::new(MintKeeper::new(
            kv[mint::STORE_KEY].clone(),
            Arc::clone(&staking),
            Arc::clone(&bank),
            pk.subspace(mint::MODULE_NAME).unwrap(),
        ));
        let distr = Arc::new(DistrKeeper::new(
            kv[distribution::STORE_KEY].clone(),
            Arc::clone(&bank),
            Arc::clone(&staking),
            pk.subspace(distribution::MODULE_NAME).unwrap(),
        ));
        let slashing = Arc::new(SlashingKeeper::new(
            kv[slashing::STORE_KEY].clone(),
            Arc::clone(&staking),
            pk.subspace(slashing::MODULE_NAME).unwrap(),
        ));
        let crisis = Arc::new(CrisisKeeper::new(
            mkeys[crisis::MEMORY_KEY].clone(),
            Arc::clone(&bank),
            pk.subspace(crisis::MODULE_NAME).unwrap(),
            INV_CHECK_PERIOD,
        ));
        let feegrant = Arc::new(FeegrantKeeper::new(
            kv[feegrant::STORE_KEY].clone(),
            Arc::clone(&auth),
        ));
        staking
            .set_hooks(Arc::new(MultiStakingHooks::new(vec![
                Arc::new(DistrHooks(Arc::clone(&distr))) as Arc<dyn StakingHooks>,
                Arc::new(SlashingHooks(Arc::clone(&slashing))),
            ])))
            .unwrap();

        Self {
            snapshot: cms.snapshot(),
            table,
            params: Arc::new(pk),
            auth,
            bank,
            staking,
            mint,
            distr,
            slashing,
            crisis,
            feegrant,
        }
    }

    fn header(height: u64) -> BlockHeader {
        BlockHeader {
            chain_id: TEST_CHAIN.into(),
            height,
            time: height * BLOCK_TIME,
            ..Default::default()
        }
    }

    /// A fresh branch of the empty store at `height`.
    pub fn ctx(&self, height: u64) -> Context {
        Context::new(
            lc_01_state_store::CacheMultiStore::new(Arc::clone(&self.snapshot)),
            Self::header(height),
            ExecMode::DeliverTx,
        )
    }

    /// Carry the state of `ctx` over to a block at `height`.
    pub fn next_block(&self, ctx: Context, height: u64) -> Context {
        Context::new(ctx.into_store(), Self::header(height), ExecMode::DeliverTx)
    }

    /// Mint `amount` stake and hand it to `addr`.
    pub fn fund(&self, ctx: &mut Context, addr: &Address, amount: u128) {
        self.bank.mint_coins(ctx, mint::MODULE_NAME, &stake(amount)).unwrap();
        self.bank
            .send_coins_from_module_to_account(ctx, mint::MODULE_NAME, addr, &stake(amount))
            .unwrap();
    }

    /// Fund an operator and create its validator with a self-delegation of
    /// `amount`. Returns the operator address.
    pub fn create_validator(&self, ctx: &mut Context, seed: u8, amount: u128) -> Address {
        let operator = Address::hash_of(&[b'o', seed]);
        self.fund(ctx, &operator, amount);
        self.staking
            .create_validator(ctx, &operator, &PubKey([seed; 32]), amount)
            .unwrap();
        operator
    }

    pub fn cons_addr(&self, ctx: &mut Context, operator: &Address) -> Address {
        self.staking
            .get_validator(ctx, operator)
            .unwrap()
            .unwrap()
            .consensus_address()
    }

    pub fn vote(&self, ctx: &mut Context, operator: &Address, signed: bool) -> VoteInfo {
        let validator = self.staking.get_validator(ctx, operator).unwrap().unwrap();
        VoteInfo {
            validator: validator.consensus_address(),
            power: validator.potential_power(),
            signed_last_block: signed,
        }
    }
}
