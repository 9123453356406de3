//! Lifecycle ordering and genesis atomicity, first over recording modules,
//! then over the composed application.

use lc_03_module_manager::{
    BeginBlockRequest, EndBlockRequest, ManagerState, ModuleDescriptor, ModuleManager,
};
use shared_types::{BlockHeader, GenesisError, LifecycleError, LifecyclePhase, PubKey};

use app_runtime::{App, AppError, InitChainRequest};

use super::recorder::RecorderSet;
use crate::fixtures::{config, funded_genesis, TestAccount, CHAIN};

fn manager(descriptors: Vec<ModuleDescriptor>, orders: [&[&str]; 3]) -> ModuleManager {
    let mut mm = ModuleManager::new(descriptors).unwrap();
    mm.set_order(LifecyclePhase::Genesis, orders[0]).unwrap();
    mm.set_order(LifecyclePhase::BeginBlock, orders[1]).unwrap();
    mm.set_order(LifecyclePhase::EndBlock, orders[2]).unwrap();
    mm.assert_orders_complete().unwrap();
    mm
}

fn begin_req(height: u64) -> BeginBlockRequest {
    BeginBlockRequest {
        header: BlockHeader {
            chain_id: "recorder".into(),
            height,
            ..Default::default()
        },
        last_commit_info: Vec::new(),
    }
}

#[test]
fn test_begin_block_follows_order_not_registration() {
    let set = RecorderSet::new(&["A", "B", "C"]);
    let mut mm = manager(
        vec![set.full("C"), set.full("A"), set.full("B")],
        [&["A", "B", "C"], &["A", "B", "C"], &["B", "C", "A"]],
    );
    let mut ctx = set.ctx(0);
    let state = mm.default_genesis();
    mm.run_genesis(&mut ctx, &state).unwrap();
    set.take_log();

    for height in 1..=3 {
        let events = mm.run_begin_block(&mut ctx, &begin_req(height)).unwrap();
        let modules: Vec<&str> = events.iter().map(|e| e.module.as_str()).collect();
        assert_eq!(modules, vec!["A", "B", "C"]);
        assert_eq!(set.take_log(), vec!["begin:A", "begin:B", "begin:C"]);

        let outcome = mm.run_end_block(&mut ctx, &EndBlockRequest { height }).unwrap();
        assert_eq!(set.take_log(), vec!["end:B", "end:C", "end:A"]);
        let keys: Vec<PubKey> = outcome.validator_updates.iter().map(|u| u.pub_key).collect();
        assert_eq!(keys, vec![PubKey([b'B'; 32]), PubKey([b'C'; 32]), PubKey([b'A'; 32])]);
    }
}

#[test]
fn test_modules_without_a_capability_are_skipped() {
    let set = RecorderSet::new(&["A", "B", "C"]);
    let mut mm = manager(
        vec![set.full("A"), set.begin_only("B"), set.full("C")],
        [&["C", "A"], &["B", "C", "A"], &["A", "C"]],
    );
    let mut ctx = set.ctx(0);
    let state = mm.default_genesis();
    let updates = mm.run_genesis(&mut ctx, &state).unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(set.take_log(), vec!["genesis:C", "genesis:A"]);

    mm.run_begin_block(&mut ctx, &begin_req(1)).unwrap();
    mm.run_end_block(&mut ctx, &EndBlockRequest { height: 1 }).unwrap();
    assert_eq!(
        set.take_log(),
        vec!["begin:B", "begin:C", "begin:A", "end:A", "end:C"]
    );
}

#[test]
fn test_missing_genesis_payload_fails_before_any_callback() {
    let set = RecorderSet::new(&["A", "B", "C"]);
    let mut mm = manager(
        vec![set.full("A"), set.full("B"), set.full("C")],
        [&["A", "B", "C"], &["A", "B", "C"], &["A", "B", "C"]],
    );
    let mut state = mm.default_genesis();
    state.remove("B");

    let mut ctx = set.ctx(0);
    let err = mm.run_genesis(&mut ctx, &state).unwrap_err();
    assert_eq!(err, GenesisError::MissingModuleState("B".into()));
    assert!(set.take_log().is_empty());
    assert!(ctx.store().is_clean());
    assert_eq!(mm.state(), ManagerState::Constructed);
}

#[test]
fn test_failing_genesis_callback_discards_earlier_writes() {
    let set = RecorderSet::new(&["A", "B", "C"]);
    let mut mm = manager(
        vec![set.full("A"), set.failing_genesis("B"), set.full("C")],
        [&["A", "B", "C"], &["A", "B", "C"], &["A", "B", "C"]],
    );
    let mut ctx = set.ctx(0);
    let state = mm.default_genesis();
    let err = mm.run_genesis(&mut ctx, &state).unwrap_err();

    assert!(matches!(err, GenesisError::ModuleFailed { ref module, .. } if module == "B"));
    assert_eq!(set.take_log(), vec!["genesis:A", "genesis:B"]);
    let key_a = set.keys["A"].clone();
    assert_eq!(ctx.kv(&key_a).get(b"marker").unwrap(), None);
    assert_eq!(mm.state(), ManagerState::Constructed);
}

#[test]
fn test_block_calls_before_genesis_are_phase_violations() {
    let set = RecorderSet::new(&["A"]);
    let mut mm = manager(vec![set.full("A")], [&["A"], &["A"], &["A"]]);
    let mut ctx = set.ctx(1);

    let err = mm.run_begin_block(&mut ctx, &begin_req(1)).unwrap_err();
    assert!(matches!(err, LifecycleError::PhaseViolation { call: "run_begin_block", .. }));
    let err = mm.run_end_block(&mut ctx, &EndBlockRequest { height: 1 }).unwrap_err();
    assert!(matches!(err, LifecycleError::PhaseViolation { call: "run_end_block", .. }));
    assert!(set.take_log().is_empty());
}

fn init_request(app: &App, drop: Option<&str>) -> InitChainRequest {
    let mut doc = app.default_genesis();
    doc.chain_id = CHAIN.into();
    if let Some(module) = drop {
        doc.app_state.remove(module);
    }
    InitChainRequest {
        chain_id: CHAIN.into(),
        genesis_time: 0,
        app_state_bytes: doc.app_state_bytes().unwrap(),
    }
}

#[test]
fn test_app_genesis_missing_module_then_retry() {
    let mut app = App::build(config()).unwrap();
    let err = app.init_chain(init_request(&app, Some("bank"))).unwrap_err();
    assert!(matches!(
        err,
        AppError::Genesis(GenesisError::MissingModuleState(ref m)) if m == "bank"
    ));
    assert!(app.version_map().is_empty());
    assert_eq!(app.manager().state(), ManagerState::Constructed);

    app.init_chain(init_request(&app, None)).unwrap();
    assert_eq!(app.manager().state(), ManagerState::GenesisRun);
    assert_eq!(app.version_map().len(), 9);
}

#[test]
fn test_app_rejects_state_for_unknown_module() {
    let mut app = App::build(config()).unwrap();
    let mut doc = app.default_genesis();
    doc.app_state.insert("gov".into(), serde_json::json!({}));
    let err = app
        .init_chain(InitChainRequest {
            chain_id: CHAIN.into(),
            genesis_time: 0,
            app_state_bytes: doc.app_state_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Genesis(GenesisError::UnexpectedModuleState(ref m)) if m == "gov"
    ));
}

#[test]
fn test_last_account_number_is_a_genesis_error() {
    let alice = TestAccount::new(1, u64::MAX);
    let mut app = App::build(config()).unwrap();
    let genesis = funded_genesis(&app, &[(&alice, 100)]);
    let err = app
        .init_chain(InitChainRequest {
            chain_id: CHAIN.into(),
            genesis_time: 0,
            app_state_bytes: genesis.app_state_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Genesis(GenesisError::InvalidModuleState { ref module, .. }) if module == "auth"
    ));
    assert_eq!(err.category().exit_code(), 3);
    assert_eq!(app.manager().state(), ManagerState::Constructed);
}

#[test]
fn test_app_genesis_runs_once() {
    let mut app = App::build(config()).unwrap();
    app.init_chain(init_request(&app, None)).unwrap();
    let err = app.init_chain(init_request(&app, None)).unwrap_err();
    assert!(matches!(err, AppError::Genesis(GenesisError::Lifecycle(_))));
}
