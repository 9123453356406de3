//! Transaction admission through the composed application.

use serde_json::json;

use app_runtime::{App, AppConfig};
use lc_05_modules::feegrant::{BasicAllowance, Grant, MSG_GRANT_ALLOWANCE};
use shared_types::{BaseAccount, Coins, Msg, Tx, TxErrorKind};

use crate::fixtures::{config, fee, funded_genesis, msg_send, TestAccount, TestChain, DENOM, FEE};

fn accounts() -> (TestAccount, TestAccount, TestAccount) {
    (
        TestAccount::new(1, 0),
        TestAccount::new(2, 1),
        TestAccount::new(3, 2),
    )
}

#[test]
fn test_unpayable_fee_rejects_only_that_transaction() {
    let (alice, bob, carol) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, FEE - 5), (&bob, 1_000), (&carol, 0)]);

    let (results, _) = chain.block(&[
        alice.send(0, &carol.address(), 1),
        bob.send(0, &carol.address(), 100),
    ]);

    assert_eq!(results[0].code, TxErrorKind::InsufficientFunds.code());
    assert!(results[0].events.is_empty());
    let alice_acc = chain.account(&alice.address()).unwrap();
    assert_eq!(alice_acc.sequence, 0);
    assert_eq!(alice_acc.pub_key, None);
    assert_eq!(chain.balance(&alice.address()), FEE - 5);

    assert!(results[1].is_ok(), "{}", results[1].log);
    assert!(results[1].gas_used > 0);
    assert!(results[1].events.iter().any(|e| e.kind == "transfer"));
    assert_eq!(chain.balance(&bob.address()), 1_000 - 100 - FEE);
    assert_eq!(chain.balance(&carol.address()), 100);
    assert_eq!(chain.account(&bob.address()).unwrap().sequence, 1);
}

#[test]
fn test_failed_message_keeps_fee_and_sequence() {
    let (alice, bob, _) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, 50), (&bob, 0)]);

    let (results, _) = chain.block(&[alice.send(0, &bob.address(), 500)]);

    assert_eq!(results[0].code, TxErrorKind::InsufficientFunds.code());
    assert!(results[0].events.iter().any(|e| e.kind == "tx"));
    assert_eq!(chain.balance(&alice.address()), 50 - FEE);
    assert_eq!(chain.balance(&bob.address()), 0);
    assert_eq!(chain.account(&alice.address()).unwrap().sequence, 1);
}

#[test]
fn test_unknown_message_route_rejected_before_fees() {
    let (alice, _, _) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, 100)]);
    let vote = Msg::new(
        "/gov.MsgVote",
        vec![alice.address()],
        &json!({ "proposal_id": 1 }),
    )
    .unwrap();

    let (results, _) = chain.block(&[alice.sign(0, vec![vote], fee(FEE))]);

    assert_eq!(results[0].code, TxErrorKind::UnknownRequest.code());
    assert_eq!(results[0].gas_used, 0);
    assert_eq!(chain.balance(&alice.address()), 100);
    assert_eq!(chain.account(&alice.address()).unwrap().sequence, 0);
}

#[test]
fn test_replayed_transaction_rejected() {
    let (alice, bob, _) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, 100)]);
    let raw = alice.send(0, &bob.address(), 10);

    let (results, _) = chain.block(&[raw.clone(), raw]);

    assert!(results[0].is_ok());
    assert_eq!(results[1].code, TxErrorKind::WrongSequence.code());
    assert_eq!(chain.balance(&bob.address()), 10);
}

#[test]
fn test_check_tx_enforces_min_gas_prices() {
    let (alice, bob, _) = accounts();
    let config = AppConfig {
        min_gas_prices: Coins::parse("1stake").unwrap(),
        ..config()
    };
    let generous = 1_000_000;
    let mut chain = TestChain::start(config, &[(&alice, 2 * generous)]);

    let cheap = chain.app.check_tx(&alice.send(0, &bob.address(), 1)).unwrap();
    assert_eq!(cheap.code, TxErrorKind::InsufficientFee.code());

    let paid = alice.sign(0, vec![msg_send(&alice.address(), &bob.address(), 1)], fee(generous));
    let admitted = chain.app.check_tx(&paid).unwrap();
    assert!(admitted.is_ok(), "{}", admitted.log);

    // the check state already saw sequence 0
    let again = chain.app.check_tx(&paid).unwrap();
    assert_eq!(again.code, TxErrorKind::WrongSequence.code());

    // messages never run and delivered state is untouched
    assert_eq!(chain.balance(&bob.address()), 0);
    assert_eq!(chain.balance(&alice.address()), 2 * generous);

    // delivery ignores the mempool minimum
    let (results, _) = chain.block(&[alice.send(0, &bob.address(), 1)]);
    assert!(results[0].is_ok(), "{}", results[0].log);
}

#[test]
fn test_check_state_resets_at_commit() {
    let (alice, bob, _) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, 100)]);
    let raw = alice.send(0, &bob.address(), 1);

    assert!(chain.app.check_tx(&raw).unwrap().is_ok());
    chain.block(&[]);
    assert!(chain.app.check_tx(&raw).unwrap().is_ok());
}

#[test]
fn test_fee_paid_by_granter() {
    let (alice, bob, carol) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, 100), (&bob, 5), (&carol, 0)]);

    let grant = Msg::new(
        MSG_GRANT_ALLOWANCE,
        vec![alice.address()],
        &Grant {
            granter: alice.address(),
            grantee: bob.address(),
            allowance: BasicAllowance {
                spend_limit: Coins::single(DENOM, 3 * FEE),
                expiration: None,
            },
        },
    )
    .unwrap();
    let (results, _) = chain.block(&[alice.sign(0, vec![grant], fee(FEE))]);
    assert!(results[0].is_ok(), "{}", results[0].log);

    let mut granted_fee = fee(FEE);
    granted_fee.granter = Some(alice.address());
    let send = bob.sign(
        0,
        vec![msg_send(&bob.address(), &carol.address(), 5)],
        granted_fee,
    );
    let (results, _) = chain.block(&[send]);

    assert!(results[0].is_ok(), "{}", results[0].log);
    assert!(results[0].events.iter().any(|e| e.kind == "use_feegrant"));
    assert_eq!(chain.balance(&alice.address()), 100 - 2 * FEE);
    assert_eq!(chain.balance(&bob.address()), 0);
    assert_eq!(chain.balance(&carol.address()), 5);
}

#[test]
fn test_fee_granter_without_allowance_rejected() {
    let (alice, bob, carol) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, 100), (&bob, 50)]);

    let mut granted_fee = fee(FEE);
    granted_fee.granter = Some(alice.address());
    let send = bob.sign(
        0,
        vec![msg_send(&bob.address(), &carol.address(), 5)],
        granted_fee,
    );
    let (results, _) = chain.block(&[send]);

    assert_eq!(results[0].code, TxErrorKind::FeeGrant.code());
    assert_eq!(chain.balance(&alice.address()), 100);
    assert_eq!(chain.balance(&bob.address()), 50);
}

#[test]
fn test_exhausted_sequence_rejected_without_fee() {
    let (alice, bob, _) = accounts();
    let app = App::build(config()).unwrap();
    let mut genesis = funded_genesis(&app, &[(&alice, 100), (&bob, 0)]);
    let mut exhausted = BaseAccount::new(alice.address(), alice.account_number);
    exhausted.sequence = u64::MAX;
    let auth = json!({
        "accounts": [exhausted, BaseAccount::new(bob.address(), bob.account_number)]
    });
    genesis.app_state.insert("auth".into(), auth);
    let mut chain = TestChain::from_genesis(app, &genesis);

    let (results, _) = chain.block(&[alice.send(u64::MAX, &bob.address(), 1)]);

    assert_eq!(results[0].code, TxErrorKind::WrongSequence.code());
    assert_eq!(chain.balance(&alice.address()), 100);
    assert_eq!(chain.balance(&bob.address()), 0);
    assert_eq!(chain.account(&alice.address()).unwrap().sequence, u64::MAX);

    // the sequence never wraps back to zero
    let (results, _) = chain.block(&[alice.send(0, &bob.address(), 1)]);
    assert_eq!(results[0].code, TxErrorKind::WrongSequence.code());
}

#[test]
fn test_simulation_estimates_gas_without_writing() {
    let (alice, bob, _) = accounts();
    let mut chain = TestChain::start(config(), &[(&alice, 1_000), (&bob, 0)]);
    let raw = alice.send(0, &bob.address(), 100);

    let estimate = chain.app.simulate(&raw).unwrap();
    assert!(estimate.is_ok(), "{}", estimate.log);
    assert!(estimate.gas_used > 0);
    assert!(estimate.events.iter().any(|e| e.kind == "transfer"));
    assert_eq!(chain.balance(&bob.address()), 0);
    assert_eq!(chain.account(&alice.address()).unwrap().sequence, 0);

    // nothing leaked into the check state either
    assert!(chain.app.check_tx(&raw).unwrap().is_ok());

    let (results, _) = chain.block(&[raw]);
    assert!(results[0].is_ok(), "{}", results[0].log);
    assert_eq!(results[0].gas_used, estimate.gas_used);
    assert_eq!(chain.balance(&bob.address()), 100);
}

#[test]
fn test_simulation_skips_signatures_and_gas_limit() {
    let (alice, bob, _) = accounts();
    let config = AppConfig {
        min_gas_prices: Coins::parse("1stake").unwrap(),
        ..config()
    };
    let mut chain = TestChain::start(config, &[(&alice, 1_000), (&bob, 0)]);

    let mut starved = fee(FEE);
    starved.gas_limit = 1;
    let signed = alice.sign(0, vec![msg_send(&alice.address(), &bob.address(), 5)], starved);
    let mut tx = Tx::decode(&signed).unwrap();
    tx.signatures.clear();
    let unsigned = tx.encode().unwrap();

    let estimate = chain.app.simulate(&unsigned).unwrap();
    assert!(estimate.is_ok(), "{}", estimate.log);
    assert!(estimate.gas_used > 1);

    let (results, _) = chain.block(&[unsigned]);
    assert_eq!(results[0].code, TxErrorKind::NoSignatures.code());
    assert_eq!(chain.balance(&alice.address()), 1_000);
}

#[test]
fn test_simulation_before_genesis_is_a_phase_violation() {
    let app = App::build(config()).unwrap();
    let alice = TestAccount::new(1, 0);
    let err = app.simulate(&alice.send(0, &alice.address(), 1)).unwrap_err();
    assert_eq!(err.category().exit_code(), 4);
}
