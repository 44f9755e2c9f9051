//! Property-based tests for ledger invariants.
//!
//! Properties:
//! - Value conservation: the unspent set always holds genesis supply plus rewards
//! - No committed input's outpoint stays spendable
//! - Replay from storage reproduces the incrementally built set
//! - Coin selection is deterministic and covers the amount exactly as reported
//! - Hostile blocks (bad linkage, forged unlocks, inflation, rewritten bodies) never change state

use proptest::prelude::*;

use keel_core::block_store::MemoryBlockStore;
use keel_core::types::*;
use keel_core::utxo::UtxoTracker;
use keel_node_lib::Blockchain;
use keel_tests::helpers::*;

const SUPPLY: u64 = 1_000_000;
const MINER: Hash256 = Hash256([0xEE; 32]);

/// Commit one signed transfer per amount; unaffordable ones are skipped.
fn run_transfers(amounts: &[(u8, u64)]) -> Blockchain<MemoryBlockStore> {
    let owner = keypair(1);
    let chain = memory_chain(owner.pubkey_hash(), SUPPLY);
    for (to, amount) in amounts {
        if let Some(tx) = transfer(&chain, &owner, pkh(*to), *amount) {
            commit(&chain, vec![tx], MINER).unwrap();
        }
    }
    chain
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn value_is_conserved(amounts in prop::collection::vec((2u8..50, 1u64..200_000), 1..12)) {
        let chain = run_transfers(&amounts);
        let height = chain.tip_height() as u64;
        prop_assert_eq!(total_value(&chain), SUPPLY + height * REWARD);

        let paid: u64 = (2u8..50).map(|seed| chain.balance_of(&pkh(seed))).sum();
        prop_assert_eq!(chain.balance_of(&keypair(1).pubkey_hash()) + paid, SUPPLY);
    }

    #[test]
    fn committed_inputs_are_gone(amounts in prop::collection::vec((2u8..50, 1u64..100_000), 1..10)) {
        let chain = run_transfers(&amounts);
        let pool = chain.utxo_snapshot();
        for h in 0..=chain.tip_height() {
            let block = chain.get_block_by_height(h).unwrap();
            for tx in block.transactions.iter().filter(|tx| !tx.is_coinbase()) {
                for input in &tx.inputs {
                    prop_assert!(!pool.contains_key(&input.previous_output));
                }
            }
        }
    }

    #[test]
    fn replay_matches_incremental(amounts in prop::collection::vec((2u8..50, 1u64..100_000), 0..10)) {
        let chain = run_transfers(&amounts);
        let (tip, incremental) = (chain.tip(), chain.utxo_snapshot());

        chain.reset();
        chain.replay().unwrap();
        prop_assert_eq!(&chain.utxo_snapshot(), &incremental);

        let reopened = Blockchain::open(chain.into_store(), CHAIN_ID).unwrap();
        prop_assert_eq!(reopened.tip(), tip);
        prop_assert_eq!(&reopened.utxo_snapshot(), &incremental);
    }

    #[test]
    fn selection_is_deterministic(
        values in prop::collection::vec(1u64..1_000, 1..40),
        want in 0u64..20_000,
    ) {
        let owner = pkh(1);
        let mut cb = Transaction::coinbase(owner, 0, b"", 0);
        cb.outputs = values.iter().map(|v| TxOutput { value: *v, pubkey_hash: owner }).collect();
        let block = Block::new(CHAIN_ID, 0, Hash256::ZERO, 0, vec![cb]).unwrap();
        let mut tracker = UtxoTracker::new();
        tracker.apply_block(&block).unwrap();

        let total: u64 = values.iter().sum();
        match tracker.select_entries(&owner, want) {
            None => prop_assert!(total < want),
            Some(sel) => {
                prop_assert!(sel.total >= want);
                prop_assert_eq!(sel.change, sel.total - want);
                prop_assert_eq!(sel.entries.iter().map(|(_, o)| o.value).sum::<u64>(), sel.total);
                prop_assert!(sel.entries.windows(2).all(|w| w[0].0 < w[1].0));
                let again = tracker.select_entries(&owner, want).unwrap();
                prop_assert_eq!(again.entries, sel.entries);
            }
        }
    }

    #[test]
    fn relinked_blocks_never_commit(fake in any::<[u8; 32]>(), amount in 1u64..1_000) {
        let owner = keypair(1);
        let chain = memory_chain(owner.pubkey_hash(), SUPPLY);
        let tx = transfer(&chain, &owner, pkh(2), amount).unwrap();
        let mut block = chain.mint(vec![tx], MINER, REWARD, b"").unwrap();
        prop_assume!(Hash256(fake) != chain.tip_hash());
        block.header.prev_hash = Hash256(fake);

        let before = chain.utxo_snapshot();
        prop_assert!(chain.commit_validated(&block).is_err());
        prop_assert_eq!(chain.utxo_snapshot(), before);
        prop_assert_eq!(chain.tip_height(), 0);
    }

    #[test]
    fn forged_signatures_never_commit(sig in prop::collection::vec(any::<u8>(), 64), amount in 1u64..1_000) {
        let owner = keypair(1);
        let chain = memory_chain(owner.pubkey_hash(), SUPPLY);
        let mut tx = transfer(&chain, &owner, pkh(2), amount).unwrap();
        prop_assume!(tx.inputs[0].signature != sig);
        tx.inputs[0].signature = sig;

        let block = chain.mint(vec![tx], MINER, REWARD, b"").unwrap();
        prop_assert!(chain.commit_validated(&block).is_err());
        prop_assert_eq!(chain.balance_of(&owner.pubkey_hash()), SUPPLY);
    }

    #[test]
    fn inflating_spends_never_commit(extra in 1u64..1_000_000) {
        let owner = keypair(1);
        let chain = memory_chain(owner.pubkey_hash(), SUPPLY);
        let (op, out) = chain.utxo_snapshot().into_iter().next().unwrap();
        let tx = signed_spend(&owner, &[(op, out)], vec![(SUPPLY, pkh(2)), (extra, pkh(3))]);

        let before = chain.utxo_snapshot();
        prop_assert!(commit(&chain, vec![tx], MINER).is_err());
        prop_assert_eq!(chain.utxo_snapshot(), before);
        prop_assert_eq!(total_value(&chain), SUPPLY);
    }

    #[test]
    fn rewritten_bodies_never_commit(value in any::<u64>(), amount in 1u64..1_000) {
        let owner = keypair(1);
        let chain = memory_chain(owner.pubkey_hash(), SUPPLY);
        let tx = transfer(&chain, &owner, pkh(2), amount).unwrap();
        let mut block = chain.mint(vec![tx], MINER, REWARD, b"").unwrap();
        prop_assume!(value != REWARD);
        block.transactions[0].outputs[0].value = value;

        prop_assert!(chain.commit_validated(&block).is_err());
        prop_assert_eq!(chain.tip_height(), 0);
        prop_assert_eq!(total_value(&chain), SUPPLY);
    }
}
