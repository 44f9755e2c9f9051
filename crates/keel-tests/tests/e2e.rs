//! End-to-end tests for the Keel ledger.
//!
//! Each test builds a chain from genesis, commits blocks through the chain
//! manager and checks tip, unspent set and balances together.

use std::sync::atomic::Ordering;
use std::thread;

use keel_core::error::ChainError;
use keel_core::genesis;
use keel_core::types::*;
use keel_node_lib::{Blockchain, RocksStore};
use keel_tests::helpers::*;
use keel_wallet::Payee;

const SUPPLY: u64 = 1_000_000;
const MINER: Hash256 = Hash256([0xEE; 32]);

// ------------------------------------------------------------------
// Lifecycle
// ------------------------------------------------------------------

#[test]
fn genesis_then_single_transfer() {
    let alice = keypair(1);
    let bob = pkh(2);
    let chain = memory_chain(alice.pubkey_hash(), SUPPLY);
    assert_eq!(chain.balance_of(&alice.pubkey_hash()), SUPPLY);

    let tx = transfer(&chain, &alice, bob, 100).unwrap();
    commit(&chain, vec![tx], MINER).unwrap();

    assert_eq!(chain.tip_height(), 1);
    assert_eq!(chain.balance_of(&alice.pubkey_hash()), 999_900);
    assert_eq!(chain.balance_of(&bob), 100);
    assert_eq!(chain.balance_of(&MINER), REWARD);
}

#[test]
fn beneficiary_sender_keeps_reward() {
    let alice = keypair(1);
    let chain = memory_chain(alice.pubkey_hash(), SUPPLY);
    let tx = transfer(&chain, &alice, pkh(2), 100).unwrap();
    commit(&chain, vec![tx], alice.pubkey_hash()).unwrap();
    assert_eq!(chain.balance_of(&alice.pubkey_hash()), 999_900 + REWARD);
}

#[test]
fn chain_links_every_height() {
    let alice = keypair(1);
    let chain = memory_chain(alice.pubkey_hash(), SUPPLY);
    for i in 0..10u64 {
        let tx = transfer(&chain, &alice, pkh(10 + i as u8), 1 + i).unwrap();
        commit(&chain, vec![tx], MINER).unwrap();
    }

    assert_eq!(chain.tip_height(), 10);
    for h in 1..=10 {
        let block = chain.get_block_by_height(h).unwrap();
        let parent = chain.get_block_by_height(h - 1).unwrap();
        assert_eq!(block.header.height, h);
        assert_eq!(block.header.prev_hash, parent.hash());
        assert_eq!(chain.get_block_by_hash(&block.hash()).unwrap(), block);
    }
    assert_eq!(chain.verify_chain().unwrap(), 11);
}

#[test]
fn funds_pass_through_a_chain_of_owners() {
    let a = keypair(1);
    let b = keypair(2);
    let c = keypair(3);
    let chain = memory_chain(a.pubkey_hash(), SUPPLY);

    let tx = transfer(&chain, &a, b.pubkey_hash(), 500).unwrap();
    commit(&chain, vec![tx], MINER).unwrap();
    let tx = transfer(&chain, &b, c.pubkey_hash(), 200).unwrap();
    commit(&chain, vec![tx], MINER).unwrap();

    assert_eq!(chain.balance_of(&a.pubkey_hash()), SUPPLY - 500);
    assert_eq!(chain.balance_of(&b.pubkey_hash()), 300);
    assert_eq!(chain.balance_of(&c.pubkey_hash()), 200);
    assert!(transfer(&chain, &c, pkh(9), 201).is_none());
}

#[test]
fn spend_of_output_created_in_same_block() {
    let a = keypair(1);
    let b = keypair(2);
    let chain = memory_chain(a.pubkey_hash(), SUPPLY);

    let first = transfer(&chain, &a, b.pubkey_hash(), 300).unwrap();
    let created = OutPoint { txid: first.txid().unwrap(), index: 0 };
    let second = signed_spend(
        &b,
        &[(created.clone(), first.outputs[0].clone())],
        vec![(300, pkh(7))],
    );
    commit(&chain, vec![first, second], MINER).unwrap();

    assert_eq!(chain.balance_of(&b.pubkey_hash()), 0);
    assert_eq!(chain.balance_of(&pkh(7)), 300);
    assert!(!chain.utxo_snapshot().contains_key(&created));
}

#[test]
fn multi_payee_transfer_with_change() {
    let a = keypair(1);
    let chain = memory_chain(a.pubkey_hash(), SUPPLY);
    let payees = [Payee::new(pkh(2), 10), Payee::new(pkh(3), 20), Payee::new(pkh(4), 30)];
    let tx = chain.create_transaction(&a, 60, &payees).unwrap().unwrap();
    assert_eq!(tx.outputs.len(), 4);
    commit(&chain, vec![tx], MINER).unwrap();

    assert_eq!(chain.balance_of(&pkh(2)), 10);
    assert_eq!(chain.balance_of(&pkh(3)), 20);
    assert_eq!(chain.balance_of(&pkh(4)), 30);
    assert_eq!(chain.balance_of(&a.pubkey_hash()), SUPPLY - 60);
}

// ------------------------------------------------------------------
// Rejections leave no trace
// ------------------------------------------------------------------

#[test]
fn wrong_prev_hash_rejected() {
    let a = keypair(1);
    let chain = memory_chain(a.pubkey_hash(), SUPPLY);
    let tx = transfer(&chain, &a, pkh(2), 100).unwrap();
    let mut block = chain.mint(vec![tx], MINER, REWARD, b"").unwrap();
    block.header.prev_hash = pkh(0x55);

    let (tip, pool) = (chain.tip(), chain.utxo_snapshot());
    let err = chain.commit_validated(&block).unwrap_err();
    assert!(matches!(err, ChainError::BrokenChain { .. }));
    assert_eq!(chain.tip(), tip);
    assert_eq!(chain.utxo_snapshot(), pool);
}

#[test]
fn same_outpoint_twice_in_one_block() {
    let a = keypair(1);
    let chain = memory_chain(a.pubkey_hash(), SUPPLY);
    let (op, out) = chain.utxo_snapshot().into_iter().next().unwrap();
    let t1 = signed_spend(&a, &[(op.clone(), out.clone())], vec![(SUPPLY, pkh(2))]);
    let t2 = signed_spend(&a, &[(op, out)], vec![(SUPPLY, pkh(3))]);

    let block = chain.mint(vec![t1, t2], MINER, REWARD, b"").unwrap();
    assert!(matches!(
        chain.commit_validated(&block),
        Err(ChainError::DoubleSpendInBlock(_))
    ));
    assert_eq!(chain.tip_height(), 0);
    assert_eq!(chain.balance_of(&a.pubkey_hash()), SUPPLY);
}

#[test]
fn second_genesis_never_accepted() {
    let chain = memory_chain(pkh(1), SUPPLY);
    let other = genesis::genesis_block(CHAIN_ID, pkh(2), SUPPLY).unwrap();
    assert!(chain.commit_validated(&other).is_err());
    assert_eq!(chain.balance_of(&pkh(2)), 0);
    assert_eq!(chain.tip_height(), 0);
}

#[test]
fn failed_store_write_keeps_state() {
    let a = keypair(1);
    let (store, fail) = FlakyStore::new();
    let chain = Blockchain::create_or_open(store, CHAIN_ID, a.pubkey_hash(), SUPPLY).unwrap();
    let tx = transfer(&chain, &a, pkh(2), 100).unwrap();
    let block = chain.mint(vec![tx], MINER, REWARD, b"").unwrap();

    fail.store(true, Ordering::SeqCst);
    let err = chain.commit_validated(&block).unwrap_err();
    assert!(matches!(err, ChainError::Storage(_)));
    assert_eq!(chain.tip_height(), 0);
    assert_eq!(chain.balance_of(&a.pubkey_hash()), SUPPLY);
    assert_eq!(chain.balance_of(&pkh(2)), 0);

    fail.store(false, Ordering::SeqCst);
    chain.commit_validated(&block).unwrap();
    assert_eq!(chain.balance_of(&pkh(2)), 100);
}

#[test]
fn raw_transaction_leaves_pool_alone() {
    let a = keypair(1);
    let chain = memory_chain(a.pubkey_hash(), SUPPLY);
    let before = chain.utxo_snapshot();
    let tx = chain
        .create_raw_transaction(&a.pubkey_hash(), 10, &[Payee::new(pkh(2), 10)])
        .unwrap()
        .unwrap();
    assert!(tx.inputs.iter().all(|i| i.signature.is_empty()));
    assert_eq!(chain.utxo_snapshot(), before);
}

// ------------------------------------------------------------------
// Concurrency
// ------------------------------------------------------------------

#[test]
fn readers_never_see_half_applied_blocks() {
    let a = keypair(1);
    let chain = memory_chain(a.pubkey_hash(), SUPPLY);

    thread::scope(|s| {
        for _ in 0..4 {
            let chain = &chain;
            s.spawn(move || {
                for _ in 0..200 {
                    let total = total_value(chain);
                    assert!(total >= SUPPLY);
                    assert_eq!((total - SUPPLY) % REWARD, 0, "total {total}");
                }
            });
        }
        for i in 0..20u8 {
            let tx = transfer(&chain, &a, pkh(100 + i), 7).unwrap();
            commit(&chain, vec![tx], MINER).unwrap();
        }
    });

    assert_eq!(chain.tip_height(), 20);
    assert_eq!(total_value(&chain), SUPPLY + 20 * REWARD);
}

// ------------------------------------------------------------------
// Persistence and archive
// ------------------------------------------------------------------

#[test]
fn rocksdb_chain_archive_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("chaindata");
    let archive = dir.path().join("blocks.dat");
    let a = keypair(1);

    let hashes: Vec<Hash256> = {
        let chain =
            Blockchain::create_or_open(RocksStore::open(&db).unwrap(), CHAIN_ID, a.pubkey_hash(), SUPPLY)
                .unwrap();
        for i in 0..5u8 {
            let tx = transfer(&chain, &a, pkh(20 + i), 10).unwrap();
            commit(&chain, vec![tx], MINER).unwrap();
        }
        chain.store_blocks(&archive, 0, 5).unwrap();
        let hashes = (0..=5).map(|h| chain.get_hash_by_height(h).unwrap()).collect();
        chain.close().unwrap();
        hashes
    };

    let chain = Blockchain::open(RocksStore::open(&db).unwrap(), CHAIN_ID).unwrap();
    assert_eq!(chain.tip_height(), 5);
    assert_eq!(chain.balance_of(&a.pubkey_hash()), SUPPLY - 50);
    for (h, hash) in hashes.iter().enumerate() {
        let block = chain.read_archived_block(&archive, h as u32).unwrap();
        assert_eq!(block.hash(), *hash);
        assert_eq!(chain.get_height_by_hash(hash).unwrap(), h as u32);
    }
}
