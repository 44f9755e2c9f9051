//! In-memory unspent-output set.
//!
//! [`UtxoTracker`] maps each transaction id to the outputs of that
//! transaction that are still unspent, keyed by output index. Spending an
//! output removes it; a transaction whose last output is spent disappears
//! from the map. Both levels are ordered maps, so every scan (balance, coin
//! selection, snapshot) walks outpoints in ascending `(txid, index)` order.
//!
//! The set is never persisted. It is derived from the block log by applying
//! blocks in height order, and can be rebuilt at any time with
//! [`UtxoTracker::reset`] followed by a replay.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::error::ChainError;
use crate::traits::{UnlockVerifier, UtxoSource};
use crate::types::{Block, Hash256, OutPoint, TxOutput};

/// Owned copy of the unspent set, ordered by outpoint.
pub type UtxoSnapshot = BTreeMap<OutPoint, TxOutput>;

/// Outcome of a successful coin selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Selected outputs in ascending outpoint order.
    pub entries: Vec<(OutPoint, TxOutput)>,
    /// Sum of the selected values.
    pub total: u64,
    /// `total - amount`.
    pub change: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoTracker {
    pool: BTreeMap<Hash256, BTreeMap<u32, TxOutput>>,
}

impl UtxoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unspent outputs.
    pub fn len(&self) -> usize {
        self.pool.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.pool.get(&outpoint.txid)?.get(&outpoint.index)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.get(outpoint).is_some()
    }

    /// All unspent outputs in ascending outpoint order.
    pub fn iter(&self) -> impl Iterator<Item = (OutPoint, &TxOutput)> + '_ {
        self.pool.iter().flat_map(|(txid, outputs)| {
            outputs.iter().map(move |(index, output)| {
                (OutPoint { txid: *txid, index: *index }, output)
            })
        })
    }

    fn owned_by<'a>(&'a self, owner: &'a Hash256) -> impl Iterator<Item = (OutPoint, &'a TxOutput)> + 'a {
        self.iter().filter(move |(_, output)| output.pubkey_hash == *owner)
    }

    /// Check every non-coinbase input of `block` against the current set.
    ///
    /// Transactions are walked in block order, so an input may spend an
    /// output created by an earlier transaction of the same block. The set
    /// itself is left untouched.
    ///
    /// # Errors
    ///
    /// - [`ChainError::DoubleSpendInBlock`] if two inputs reference one outpoint
    /// - [`ChainError::UnknownInput`] if an outpoint is neither unspent nor created earlier in the block
    /// - [`ChainError::InvalidUnlock`] if the unlock proof does not verify against the output's owner
    /// - [`ChainError::OutputsExceedInputs`] if a transaction creates more value than it spends
    pub fn validate_against_pool(
        &self,
        block: &Block,
        verifier: &dyn UnlockVerifier,
    ) -> Result<(), ChainError> {
        let mut created: HashMap<OutPoint, &TxOutput> = HashMap::new();
        let mut consumed: HashSet<&OutPoint> = HashSet::new();

        for tx in &block.transactions {
            let txid = tx.txid()?;
            if !tx.is_coinbase() {
                let mut spent_total = 0u64;
                for (input_index, input) in tx.inputs.iter().enumerate() {
                    let outpoint = &input.previous_output;
                    if !consumed.insert(outpoint) {
                        return Err(ChainError::DoubleSpendInBlock(outpoint.clone()));
                    }
                    let spent = self
                        .get(outpoint)
                        .or_else(|| created.get(outpoint).copied())
                        .ok_or_else(|| ChainError::UnknownInput(outpoint.clone()))?;
                    verifier
                        .verify_input(tx, input_index, spent)
                        .map_err(|source| ChainError::InvalidUnlock {
                            outpoint: outpoint.clone(),
                            source,
                        })?;
                    spent_total = spent_total.saturating_add(spent.value);
                }
                let created_total = tx.total_output_value().ok_or_else(|| {
                    ChainError::MalformedBlock(format!("transaction {txid} output total overflows"))
                })?;
                if created_total > spent_total {
                    return Err(ChainError::OutputsExceedInputs {
                        txid,
                        spent: spent_total,
                        created: created_total,
                    });
                }
            }

            for (index, output) in tx.outputs.iter().enumerate() {
                created.insert(OutPoint { txid, index: index as u32 }, output);
            }
        }
        Ok(())
    }

    /// Apply a block's spends and outputs.
    ///
    /// Fails only if a transaction id cannot be computed, in which case the
    /// set is unchanged.
    pub fn apply_block(&mut self, block: &Block) -> Result<(), ChainError> {
        let txids = block.txids()?;
        self.apply_with_txids(block, &txids);
        Ok(())
    }

    /// Apply a block whose transaction ids were computed up front.
    ///
    /// `txids[i]` must be the id of `block.transactions[i]`. Per transaction,
    /// inputs are spent before outputs are added.
    pub fn apply_with_txids(&mut self, block: &Block, txids: &[Hash256]) {
        let mut spent = 0usize;
        let mut created = 0usize;
        for (tx, txid) in block.transactions.iter().zip(txids) {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    if self.remove(&input.previous_output).is_some() {
                        spent += 1;
                    }
                }
            }
            if tx.outputs.is_empty() {
                continue;
            }
            let outputs = self.pool.entry(*txid).or_default();
            for (index, output) in tx.outputs.iter().enumerate() {
                outputs.insert(index as u32, output.clone());
                created += 1;
            }
        }
        debug!(height = block.header.height, spent, created, "applied block to utxo set");
    }

    fn remove(&mut self, outpoint: &OutPoint) -> Option<TxOutput> {
        let outputs = self.pool.get_mut(&outpoint.txid)?;
        let removed = outputs.remove(&outpoint.index);
        if outputs.is_empty() {
            self.pool.remove(&outpoint.txid);
        }
        removed
    }

    /// Accumulate `owner`'s outputs in ascending outpoint order until they cover `amount`.
    ///
    /// Returns `None` if the owner's whole balance is below `amount`. A zero
    /// amount is covered by an empty selection.
    pub fn select_entries(&self, owner: &Hash256, amount: u64) -> Option<Selection> {
        let mut entries = Vec::new();
        let mut total = 0u64;
        for (outpoint, output) in self.owned_by(owner) {
            if total >= amount {
                break;
            }
            total = total.saturating_add(output.value);
            entries.push((outpoint, output.clone()));
        }
        if total < amount {
            return None;
        }
        Some(Selection {
            entries,
            total,
            change: total - amount,
        })
    }

    /// Sum of every output owned by `owner`, saturating at `u64::MAX`.
    pub fn balance_of(&self, owner: &Hash256) -> u64 {
        self.owned_by(owner)
            .fold(0u64, |acc, (_, output)| acc.saturating_add(output.value))
    }

    /// Drop every entry. Callers replay the chain afterwards.
    pub fn reset(&mut self) {
        self.pool.clear();
    }

    pub fn snapshot(&self) -> UtxoSnapshot {
        self.iter()
            .map(|(outpoint, output)| (outpoint, output.clone()))
            .collect()
    }
}

impl UtxoSource for UtxoTracker {
    fn select_entries(&self, owner: &Hash256, amount: u64) -> Option<Selection> {
        UtxoTracker::select_entries(self, owner, amount)
    }

    fn balance_of(&self, owner: &Hash256) -> u64 {
        UtxoTracker::balance_of(self, owner)
    }
}
