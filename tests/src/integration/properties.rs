//! Composition properties checked over many inputs.

use std::collections::BTreeSet;

use lc_01_state_store::{CommitMultiStore, Context, ExecMode, StoreKeyRegistry, StoreKind};
use lc_02_module_accounts::{module_address, parse_permissions, PermissionTable};
use lc_03_module_manager::ModuleManager;
use shared_types::{Address, BlockHeader, ConfigError, LifecyclePhase, StoreError};

use super::recorder::RecorderSet;
use crate::fixtures::{config, TestAccount, TestChain};

fn permutations(items: &[&'static str]) -> Vec<Vec<&'static str>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for (i, first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, *first);
            out.push(tail);
        }
    }
    out
}

#[test]
fn test_only_the_allocated_key_opens_a_partition() {
    let mut registry = StoreKeyRegistry::new();
    let keys = registry.allocate_kv(&["bank", "acc"]).unwrap();
    let mut cms = CommitMultiStore::new();
    cms.mount_all(keys.values()).unwrap();

    let mut ctx = Context::new(cms.branch(), BlockHeader::default(), ExecMode::DeliverTx);
    ctx.kv(&keys["bank"]).set(b"k", vec![1]).unwrap();

    for name in ["bank", "acc"] {
        let foreign = StoreKeyRegistry::new().allocate_kv(&[name]).unwrap();
        assert_eq!(
            ctx.kv(&foreign[name]).get(b"k"),
            Err(StoreError::UnknownStoreKey { name: name.into() })
        );
    }
    let transient = registry.allocate_transient(&["bank"]).unwrap();
    assert!(ctx.kv(&transient["bank"]).get(b"k").is_err());
    assert_eq!(ctx.kv(&keys["bank"]).get(b"k").unwrap(), Some(vec![1]));
}

#[test]
fn test_failed_allocation_allocates_nothing() {
    let cases: [&[&str]; 3] = [&["a", "b", "a"], &["c", "taken"], &["d", ""]];
    let mut registry = StoreKeyRegistry::new();
    registry.allocate_kv(&["taken"]).unwrap();

    for names in cases {
        assert!(registry.allocate_kv(names).is_err());
        for name in names.iter().filter(|n| **n != "taken") {
            assert!(registry.get(StoreKind::Persistent, name).is_none());
        }
    }
    assert_eq!(registry.all_keys().len(), 1);
    registry.allocate_kv(&["a", "b", "c", "d"]).unwrap();
}

#[test]
fn test_blocked_is_reserved_minus_allow_list() {
    let names = ["fee_collector", "distribution", "mint", "bonded_tokens_pool"];
    let raw = parse_permissions(names.iter().map(|n| (*n, Vec::<&str>::new()))).unwrap();

    // every subset of the module accounts as allow-list
    for mask in 0u32..(1 << names.len()) {
        let allow: BTreeSet<String> = names
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, n)| n.to_string())
            .collect();
        let table = PermissionTable::derive(raw.clone(), &allow).unwrap();

        let allowed: BTreeSet<Address> = allow.iter().map(|n| module_address(n)).collect();
        let expected: BTreeSet<Address> = table.reserved().difference(&allowed).copied().collect();
        assert_eq!(table.blocked(), &expected);
        assert_eq!(table.reserved().len(), names.len());
    }
}

#[test]
fn test_every_permutation_is_a_valid_order() {
    let names = ["A", "B", "C", "D"];
    let set = RecorderSet::new(&names);

    for order in permutations(&names) {
        let mut mm = ModuleManager::new(names.iter().map(|n| set.full(n)).collect()).unwrap();
        mm.set_order(LifecyclePhase::BeginBlock, &order).unwrap();
        assert_eq!(
            mm.order(LifecyclePhase::BeginBlock).unwrap(),
            order.iter().map(|n| n.to_string()).collect::<Vec<_>>().as_slice()
        );

        let mut missing = order.clone();
        let dropped = missing.pop().unwrap();
        assert_eq!(
            mm.set_order(LifecyclePhase::BeginBlock, &missing),
            Err(ConfigError::OrderMissingModule {
                phase: LifecyclePhase::BeginBlock,
                module: dropped.into(),
            })
        );

        let mut doubled = order.clone();
        doubled.push(order[0]);
        assert_eq!(
            mm.set_order(LifecyclePhase::BeginBlock, &doubled),
            Err(ConfigError::OrderDuplicate {
                phase: LifecyclePhase::BeginBlock,
                module: order[0].into(),
            })
        );
    }
}

#[test]
fn test_identical_histories_commit_identical_hashes() {
    let alice = TestAccount::new(1, 0);
    let bob = TestAccount::new(2, 1);
    let genesis = [(&alice, 10_000u128), (&bob, 0u128)];
    let mut first = TestChain::start(config(), &genesis);
    let mut second = TestChain::start(config(), &genesis);

    for seq in 0..3 {
        let txs = [alice.send(seq, &bob.address(), 10 + u128::from(seq))];
        first.block(&txs);
        second.block(&txs);
        assert_eq!(first.app.last_commit(), second.app.last_commit());
    }

    first.block(&[alice.send(3, &bob.address(), 1)]);
    second.block(&[alice.send(3, &bob.address(), 2)]);
    assert_ne!(first.app.last_commit().root, second.app.last_commit().root);
}
