//! Composition failures, module interplay across blocks, export and the
//! local driver.

use serde_json::json;

use app_runtime::{App, AppConfig, AppError, ErrorCategory, InitChainRequest, LocalDriver};
use lc_02_module_accounts::module_address;
use lc_05_modules::crisis::{MsgVerifyInvariant, MSG_VERIFY_INVARIANT};
use lc_05_modules::staking::{MsgCreateValidator, MSG_CREATE_VALIDATOR, POWER_REDUCTION};
use lc_05_modules::{distribution, FEE_COLLECTOR};
use shared_types::{Coin, Coins, ConfigError, LifecyclePhase, Msg, PubKey, TxErrorKind};

use crate::fixtures::{config, fee, funded_genesis, TestAccount, TestChain, DENOM, FEE};

fn build_err(config: AppConfig) -> ConfigError {
    match App::build(config) {
        Err(AppError::Configuration(err)) => err,
        Err(other) => panic!("expected a configuration error, got {other}"),
        Ok(_) => panic!("composition unexpectedly succeeded"),
    }
}

#[test]
fn test_unknown_module_in_order_fails_build() {
    let mut config = config();
    config.orders.begin_block.push("gov".into());
    assert_eq!(
        build_err(config),
        ConfigError::OrderUnknownModule {
            phase: LifecyclePhase::BeginBlock,
            module: "gov".into(),
        }
    );
}

#[test]
fn test_order_naming_module_without_capability_fails_build() {
    let mut config = config();
    config.orders.end_block.insert(0, "mint".into());
    assert_eq!(
        build_err(config),
        ConfigError::OrderCapabilityMismatch {
            phase: LifecyclePhase::EndBlock,
            module: "mint".into(),
        }
    );
}

#[test]
fn test_bad_module_accounts_fail_build() {
    let mut config = config();
    config
        .module_account_permissions
        .push(("gov".into(), vec!["voter".into()]));
    assert_eq!(build_err(config), ConfigError::UnknownPermission("voter".into()));

    let mut config = crate::fixtures::config();
    config.allowed_receiving_accounts.insert("treasury".into());
    assert_eq!(
        build_err(config),
        ConfigError::UnknownAllowListedAccount("treasury".into())
    );
}

#[test]
fn test_configuration_errors_map_to_exit_code() {
    let mut config = config();
    config.chain_id.clear();
    let err = App::build(config).err().unwrap();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(err.category().exit_code(), 2);
}

#[test]
fn test_module_accounts_blocked_unless_allow_listed() {
    let alice = TestAccount::new(1, 0);
    let mut chain = TestChain::start(config(), &[(&alice, 1_000)]);

    let to_fees = module_address(FEE_COLLECTOR);
    let (results, _) = chain.block(&[alice.send(0, &to_fees, 1)]);
    assert_eq!(results[0].code, TxErrorKind::BlockedAddress.code());
    assert_eq!(chain.balance(&alice.address()), 1_000 - FEE);

    let mut open = config();
    open.allowed_receiving_accounts.insert(distribution::MODULE_NAME.into());
    let mut chain = TestChain::start(open, &[(&alice, 1_000)]);
    let to_distr = module_address(distribution::MODULE_NAME);
    let (results, _) = chain.block(&[alice.send(0, &to_distr, 1)]);
    assert!(results[0].is_ok(), "{}", results[0].log);
    assert!(chain.app.permissions().is_blocked(&to_fees));
    assert!(!chain.app.permissions().is_blocked(&to_distr));
}

#[test]
fn test_periodic_invariant_checks_pass_with_traffic() {
    let alice = TestAccount::new(1, 0);
    let bob = TestAccount::new(2, 1);
    let config = AppConfig {
        inv_check_period: 1,
        ..config()
    };
    let mut chain = TestChain::start(config, &[(&alice, 10_000), (&bob, 0)]);

    for seq in 0..3 {
        let (results, _) = chain.block(&[alice.send(seq, &bob.address(), 100)]);
        assert!(results[0].is_ok(), "{}", results[0].log);
    }

    let verify = Msg::new(
        MSG_VERIFY_INVARIANT,
        vec![alice.address()],
        &MsgVerifyInvariant {
            sender: alice.address(),
            invariant_module_name: "bank".into(),
            invariant_route: "total-supply".into(),
        },
    )
    .unwrap();
    let (results, _) = chain.block(&[alice.sign(3, vec![verify], fee(FEE))]);
    assert!(results[0].is_ok(), "{}", results[0].log);
    assert!(results[0].events.iter().any(|e| e.kind == "invariant"));
    assert_eq!(chain.app.last_height(), 4);
}

#[test]
fn test_export_reimports_into_fresh_app() {
    let alice = TestAccount::new(1, 0);
    let bob = TestAccount::new(2, 1);
    let mut chain = TestChain::start(config(), &[(&alice, 5_000), (&bob, 0)]);
    chain.block(&[alice.send(0, &bob.address(), 1_234)]);
    chain.block(&[]);

    let exported = chain.app.export_genesis().unwrap();
    assert_eq!(exported.chain_id, crate::fixtures::CHAIN);

    let mut fresh = TestChain {
        app: App::build(config()).unwrap(),
        votes: Vec::new(),
    };
    fresh
        .app
        .init_chain(InitChainRequest {
            chain_id: exported.chain_id.clone(),
            genesis_time: exported.genesis_time,
            app_state_bytes: exported.app_state_bytes().unwrap(),
        })
        .unwrap();
    fresh.block(&[]);

    for addr in [alice.address(), bob.address()] {
        assert_eq!(fresh.balance(&addr), chain.balance(&addr));
    }
    assert_eq!(chain.balance(&bob.address()), 1_234);
    assert_eq!(
        fresh.account(&alice.address()).unwrap().sequence,
        chain.account(&alice.address()).unwrap().sequence
    );
}

fn create_validator(operator: &TestAccount, cons_key: PubKey, tokens: u128) -> Vec<u8> {
    let msg = Msg::new(
        MSG_CREATE_VALIDATOR,
        vec![operator.address()],
        &MsgCreateValidator {
            operator: operator.address(),
            pub_key: cons_key,
            amount: Coin::new(DENOM, tokens),
        },
    )
    .unwrap();
    operator.sign(0, vec![msg], fee(FEE))
}

#[test]
fn test_driver_tracks_validator_set_and_rewards() {
    let alice = TestAccount::new(1, 0);
    let bob = TestAccount::new(2, 1);
    let app = App::build(config()).unwrap();
    let genesis = funded_genesis(&app, &[(&alice, 10 * POWER_REDUCTION), (&bob, 1_000)]);
    let mut driver = LocalDriver::with_genesis(app, &genesis).unwrap();
    assert!(driver.validators().is_empty());

    let cons_key = PubKey([9; 32]);
    driver
        .produce_block(&[create_validator(&alice, cons_key, 5 * POWER_REDUCTION)])
        .unwrap();
    assert_eq!(driver.validators().get(&cons_key), Some(&5));

    // block 2 carries the validator's vote and the fee of block 1
    let commit = driver
        .produce_block(&[bob.send(0, &alice.address(), 1)])
        .unwrap();
    assert_eq!(commit.height, 2);

    let raw = driver
        .app()
        .query(
            "distribution/rewards",
            &serde_json::to_vec(&json!({ "address": alice.address() })).unwrap(),
        )
        .unwrap();
    let rewards: Coins = serde_json::from_slice(&raw).unwrap();
    assert!(rewards.amount_of(DENOM) > 0);
}

#[test]
fn test_driver_rejects_foreign_genesis() {
    let app = App::build(config()).unwrap();
    let mut genesis = app.default_genesis();
    genesis.chain_id = "other-chain".into();
    let err = LocalDriver::with_genesis(app, &genesis).err().unwrap();
    assert_eq!(err.category(), ErrorCategory::Genesis);
}

#[test]
fn test_driver_starts_from_genesis_file() {
    let alice = TestAccount::new(1, 0);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genesis.json");
    let app = App::build(config()).unwrap();
    funded_genesis(&app, &[(&alice, 777)]).save(&path).unwrap();

    let mut driver = LocalDriver::start(AppConfig {
        genesis_file: Some(path),
        ..config()
    })
    .unwrap();
    driver.produce_block(&[]).unwrap();

    let raw = driver
        .app()
        .query(
            "bank/balance",
            &serde_json::to_vec(&json!({ "address": alice.address() })).unwrap(),
        )
        .unwrap();
    let balance: Coins = serde_json::from_slice(&raw).unwrap();
    assert_eq!(balance.amount_of(DENOM), 777);
}
