//! Store-backed keeper doubles and signed-transaction builders.

use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use lc_01_state_store::{
    CommitMultiStore, Context, ExecMode, Snapshot, StoreKey, StoreKeyRegistry,
};
use shared_types::{
    Address, AuthParams, BaseAccount, BlockHeader, Coins, Fee, HexBytes, Msg, PubKey, SignerInfo,
    Tx, TxBody, TxError, TxErrorKind,
};

use crate::handler::HandlerOptions;
use crate::ports::{AccountKeeper, BankKeeper, FeegrantKeeper};

pub const TEST_CHAIN: &str = "test-chain";
pub const TEST_FEE: u128 = 10;
pub const TEST_HEIGHT: u64 = 5;

pub struct TestAccount {
    key: SigningKey,
}

impl TestAccount {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn pub_key(&self) -> PubKey {
        PubKey(self.key.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        self.pub_key().address()
    }
}

/// A signed single-message transfer from `from` paying `TEST_FEE`.
pub fn send_tx(from: &TestAccount, to: &TestAccount, amount: u128, sequence: u64) -> Tx {
    let msg = Msg::new(
        "/bank.MsgSend",
        vec![from.address()],
        &serde_json::json!({
            "from_address": from.address(),
            "to_address": to.address(),
            "amount": Coins::single("stake", amount),
        }),
    )
    .unwrap();
    let mut tx = Tx {
        body: TxBody {
            messages: vec![msg],
            ..Default::default()
        },
        auth_info: shared_types::AuthInfo {
            signer_infos: vec![SignerInfo {
                public_key: Some(from.pub_key()),
                sequence,
            }],
            fee: Fee {
                amount: Coins::single("stake", TEST_FEE),
                gas_limit: 200_000,
                ..Default::default()
            },
        },
        signatures: vec![],
    };
    // every test account is created with account number 0
    let bytes = tx.sign_bytes(TEST_CHAIN, 0, sequence).unwrap();
    tx.signatures = vec![HexBytes(from.key.sign(&bytes).to_bytes().to_vec())];
    tx
}

#[derive(Clone)]
pub struct TestEnv {
    snapshot: Arc<Snapshot>,
    pub acc_key: StoreKey,
    pub bank_key: StoreKey,
    pub grant_key: StoreKey,
}

impl TestEnv {
    pub fn new() -> Self {
        let keys = StoreKeyRegistry::new()
            .allocate_kv(&["acc", "bank", "feegrant"])
            .unwrap();
        let mut cms = CommitMultiStore::new();
        cms.mount_all(keys.values()).unwrap();
        Self {
            snapshot: cms.snapshot(),
            acc_key: keys["acc"].clone(),
            bank_key: keys["bank"].clone(),
            grant_key: keys["feegrant"].clone(),
        }
    }

    pub fn ctx(&self, mode: ExecMode) -> Context {
        let header = BlockHeader {
            chain_id: TEST_CHAIN.into(),
            height: TEST_HEIGHT,
            ..Default::default()
        };
        Context::new(
            lc_01_state_store::CacheMultiStore::new(Arc::clone(&self.snapshot)),
            header,
            mode,
        )
    }

    pub fn accounts(&self) -> Arc<dyn AccountKeeper> {
        Arc::new(MemAccounts {
            key: self.acc_key.clone(),
        })
    }

    pub fn bank(&self) -> Arc<dyn BankKeeper> {
        Arc::new(MemBank {
            key: self.bank_key.clone(),
        })
    }

    pub fn feegrant(&self) -> Arc<dyn FeegrantKeeper> {
        Arc::new(MemFeegrant {
            key: self.grant_key.clone(),
        })
    }

    pub fn options(&self) -> HandlerOptions {
        HandlerOptions {
            account_keeper: Some(self.accounts()),
            bank_keeper: Some(self.bank()),
            feegrant_keeper: Some(self.feegrant()),
            fee_collector: None,
        }
    }

    pub fn create_account(&self, ctx: &mut Context, acc: &TestAccount, balance: u128) {
        self.accounts()
            .set_account(ctx, &BaseAccount::new(acc.address(), 0))
            .unwrap();
        ctx.kv(&self.bank_key)
            .set_value(acc.address().as_bytes(), &Coins::single("stake", balance))
            .unwrap();
    }

    pub fn account(&self, ctx: &mut Context, addr: &Address) -> Option<BaseAccount> {
        self.accounts().get_account(ctx, addr).unwrap()
    }

    pub fn balance(&self, ctx: &mut Context, addr: &Address) -> u128 {
        ctx.kv(&self.bank_key)
            .get_value::<Coins>(addr.as_bytes())
            .unwrap()
            .unwrap_or_default()
            .amount_of("stake")
    }

    pub fn grant(&self, ctx: &mut Context, granter: &Address, grantee: &Address, limit: u128) {
        ctx.kv(&self.grant_key)
            .set_value(&grant_key(granter, grantee), &Coins::single("stake", limit))
            .unwrap();
    }
}

fn grant_key(granter: &Address, grantee: &Address) -> Vec<u8> {
    [granter.as_bytes().as_slice(), grantee.as_bytes().as_slice()].concat()
}

struct MemAccounts {
    key: StoreKey,
}

impl AccountKeeper for MemAccounts {
    fn params(&self, _ctx: &mut Context) -> Result<AuthParams, TxError> {
        Ok(AuthParams::default())
    }

    fn get_account(&self, ctx: &mut Context, addr: &Address) -> Result<Option<BaseAccount>, TxError> {
        Ok(ctx.kv(&self.key).get_value(addr.as_bytes())?)
    }

    fn set_account(&self, ctx: &mut Context, account: &BaseAccount) -> Result<(), TxError> {
        Ok(ctx.kv(&self.key).set_value(account.address.as_bytes(), account)?)
    }

    fn module_address(&self, name: &str) -> Option<Address> {
        (name == "fee_collector").then(|| Address::hash_of(name.as_bytes()))
    }
}

struct MemBank {
    key: StoreKey,
}

impl MemBank {
    fn balance(&self, ctx: &mut Context, addr: &Address) -> Result<Coins, TxError> {
        Ok(ctx
            .kv(&self.key)
            .get_value::<Coins>(addr.as_bytes())?
            .unwrap_or_default())
    }
}

impl BankKeeper for MemBank {
    fn send_coins_from_account_to_module(
        &self,
        ctx: &mut Context,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<(), TxError> {
        let to = Address::hash_of(module.as_bytes());
        let from_balance = self
            .balance(ctx, from)?
            .checked_sub(amount)
            .ok_or_else(|| TxError::new(TxErrorKind::InsufficientFunds, "insufficient funds"))?;
        ctx.kv(&self.key).set_value(from.as_bytes(), &from_balance)?;
        let to_balance = self
            .balance(ctx, &to)?
            .checked_add(amount)
            .ok_or_else(|| TxError::new(TxErrorKind::InvalidCoins, "overflow"))?;
        ctx.kv(&self.key).set_value(to.as_bytes(), &to_balance)?;
        Ok(())
    }
}

struct MemFeegrant {
    key: StoreKey,
}

impl FeegrantKeeper for MemFeegrant {
    fn use_granted_fees(
        &self,
        ctx: &mut Context,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
        _msgs: &[Msg],
    ) -> Result<(), TxError> {
        let key = grant_key(granter, grantee);
        let allowance: Coins = ctx
            .kv(&self.key)
            .get_value(&key)?
            .ok_or_else(|| TxError::new(TxErrorKind::FeeGrant, "fee-grant not found"))?;
        let left = allowance
            .checked_sub(fee)
            .ok_or_else(|| TxError::new(TxErrorKind::FeeGrant, "fee limit exceeded"))?;
        ctx.kv(&self.key).set_value(&key, &left)?;
        Ok(())
    }
}
