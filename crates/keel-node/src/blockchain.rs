//! Chain state manager.
//!
//! [`Blockchain`] owns the chain tip, the unspent-output set and the block
//! store behind one lock. Every commit runs encode → hash → store → advance
//! tip → apply under the write lock, and any failure before the store write
//! returns leaves tip and set untouched.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use keel_core::archive::{self, ArchiveIndex};
use keel_core::block_store::BlockStore;
use keel_core::block_validation::validate_block_structure;
use keel_core::crypto::{Ed25519Verifier, KeyPair};
use keel_core::error::ChainError;
use keel_core::genesis;
use keel_core::traits::UnlockVerifier;
use keel_core::types::{Block, Hash256, Transaction};
use keel_core::utxo::{UtxoSnapshot, UtxoTracker};
use keel_wallet::{build_transaction, Payee, Unlock, WalletError};

/// Height and hash of the last committed block.
///
/// An empty chain has hash [`Hash256::ZERO`] and height 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub height: u32,
    pub hash: Hash256,
}

impl ChainTip {
    const EMPTY: ChainTip = ChainTip { height: 0, hash: Hash256::ZERO };

    pub fn is_empty(&self) -> bool {
        self.hash.is_zero()
    }

    /// Height the next block must carry, `None` once heights are exhausted.
    pub fn next_height(&self) -> Option<u32> {
        if self.is_empty() { Some(0) } else { self.height.checked_add(1) }
    }

    fn require_next_height(&self) -> Result<u32, ChainError> {
        self.next_height().ok_or(ChainError::HeightExhausted(self.height))
    }
}

struct ChainInner<S> {
    store: S,
    tip: ChainTip,
    utxo: UtxoTracker,
}

/// The ledger: validated, append-only blocks plus the derived unspent set.
pub struct Blockchain<S: BlockStore> {
    chain_id: u32,
    inner: RwLock<ChainInner<S>>,
    verifier: Arc<dyn UnlockVerifier>,
}

impl<S: BlockStore> Blockchain<S> {
    /// Open a chain over `store`, replaying every stored block.
    ///
    /// Inputs are unlocked with Ed25519 signatures.
    pub fn open(store: S, chain_id: u32) -> Result<Self, ChainError> {
        Self::with_verifier(store, chain_id, Arc::new(Ed25519Verifier))
    }

    /// Open a chain with a custom unlock verifier.
    pub fn with_verifier(
        store: S,
        chain_id: u32,
        verifier: Arc<dyn UnlockVerifier>,
    ) -> Result<Self, ChainError> {
        let chain = Self {
            chain_id,
            inner: RwLock::new(ChainInner {
                store,
                tip: ChainTip::EMPTY,
                utxo: UtxoTracker::new(),
            }),
            verifier,
        };
        chain.init()?;
        Ok(chain)
    }

    /// Open an existing chain, or commit a genesis block paying
    /// `total_supply` to `genesis_owner` if the store is empty.
    pub fn create_or_open(
        store: S,
        chain_id: u32,
        genesis_owner: Hash256,
        total_supply: u64,
    ) -> Result<Self, ChainError> {
        let chain = Self::open(store, chain_id)?;
        if chain.is_empty() {
            let block = genesis::genesis_block(chain_id, genesis_owner, total_supply)?;
            let hash = chain.commit_validated(&block)?;
            info!(chain_id, %hash, %genesis_owner, total_supply, "created genesis block");
        } else {
            let stored = chain.get_block_by_height(0)?.header.chain_id;
            if stored != chain_id {
                warn!(stored, configured = chain_id, "stored genesis belongs to another chain id");
            }
        }
        Ok(chain)
    }

    /// Load the persisted tip and rebuild the unspent set from it.
    pub fn init(&self) -> Result<(), ChainError> {
        let mut inner = self.inner.write();
        inner.tip = match inner.store.init()? {
            Some((height, hash)) => ChainTip { height, hash },
            None => ChainTip::EMPTY,
        };
        Self::replay_locked(&mut inner)
    }

    /// Rebuild the unspent set by applying blocks `0..=tip` in order.
    ///
    /// On error the set is left empty.
    pub fn replay(&self) -> Result<(), ChainError> {
        let mut inner = self.inner.write();
        Self::replay_locked(&mut inner)
    }

    fn replay_locked(inner: &mut ChainInner<S>) -> Result<(), ChainError> {
        inner.utxo.reset();
        if inner.tip.is_empty() {
            info!("replay skipped: chain is empty");
            return Ok(());
        }
        for height in 0..=inner.tip.height {
            let block = match Self::load_by_height(&inner.store, height) {
                Ok(block) => block,
                Err(e) => {
                    inner.utxo.reset();
                    return Err(e);
                }
            };
            if let Err(e) = inner.utxo.apply_block(&block) {
                inner.utxo.reset();
                return Err(e);
            }
        }
        info!(
            height = inner.tip.height,
            tip = %inner.tip.hash,
            utxos = inner.utxo.len(),
            "replayed chain"
        );
        Ok(())
    }

    fn load_by_height(store: &S, height: u32) -> Result<Block, ChainError> {
        let hash = store
            .hash_for_height(height)?
            .ok_or_else(|| ChainError::NotFound(format!("block at height {height}")))?;
        Self::load_by_hash(store, &hash)
    }

    fn load_by_hash(store: &S, hash: &Hash256) -> Result<Block, ChainError> {
        let bytes = store
            .get_by_hash(hash)?
            .ok_or_else(|| ChainError::NotFound(format!("block {hash}")))?;
        let block = Block::decode(&bytes)?;
        if block.hash() != *hash {
            return Err(ChainError::CorruptData(format!(
                "block stored under {hash} hashes to {}",
                block.hash()
            )));
        }
        Ok(block)
    }

    // ------------------------------------------------------------------
    // Validation and commit
    // ------------------------------------------------------------------

    /// Check that `block` extends the tip, is well formed and spends only
    /// live outputs.
    pub fn validate(&self, block: Option<&Block>) -> Result<(), ChainError> {
        let inner = self.inner.read();
        self.validate_locked(&inner, block)
    }

    fn validate_locked(&self, inner: &ChainInner<S>, block: Option<&Block>) -> Result<(), ChainError> {
        let block = block.ok_or(ChainError::NilBlock)?;
        let header = &block.header;
        if header.prev_hash != inner.tip.hash {
            return Err(ChainError::BrokenChain {
                expected: inner.tip.hash,
                got: header.prev_hash,
            });
        }
        let expected = inner.tip.require_next_height()?;
        if header.height != expected {
            return Err(ChainError::HeightMismatch { expected, got: header.height });
        }
        validate_block_structure(block)?;
        inner.utxo.validate_against_pool(block, self.verifier.as_ref())
    }

    /// Validate `block` against the tip and commit it. Returns its hash.
    pub fn commit_validated(&self, block: &Block) -> Result<Hash256, ChainError> {
        let mut inner = self.inner.write();
        self.validate_locked(&inner, Some(block))?;
        Self::commit_locked(&mut inner, block)
    }

    /// Commit a block received from a peer without linkage or spend checks.
    ///
    /// Still all-or-nothing: encoding and storage failures leave the chain
    /// unchanged.
    pub fn commit_synced(&self, block: &Block) -> Result<Hash256, ChainError> {
        let mut inner = self.inner.write();
        Self::commit_locked(&mut inner, block)
    }

    fn commit_locked(inner: &mut ChainInner<S>, block: &Block) -> Result<Hash256, ChainError> {
        let bytes = block.encode()?;
        let hash = block.hash();
        let txids = block.txids()?;
        inner.store.put(&bytes, &hash, block.height())?;

        inner.tip = ChainTip { height: block.height(), hash };
        inner.utxo.apply_with_txids(block, &txids);
        info!(
            height = block.height(),
            %hash,
            txs = block.transactions.len(),
            bytes = bytes.len(),
            "committed block"
        );
        Ok(hash)
    }

    /// Assemble the next block: a coinbase paying `block_reward` to
    /// `beneficiary`, then `transactions` in the given order.
    ///
    /// The block is neither validated nor committed.
    pub fn mint(
        &self,
        transactions: Vec<Transaction>,
        beneficiary: Hash256,
        block_reward: u64,
        memo: &[u8],
    ) -> Result<Block, ChainError> {
        let tip = self.inner.read().tip;
        let height = tip.require_next_height()?;
        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;

        let mut txs = Vec::with_capacity(transactions.len() + 1);
        txs.push(Transaction::coinbase(beneficiary, block_reward, memo, height as u64));
        txs.extend(transactions);
        let block = Block::new(self.chain_id, height, tip.hash, timestamp, txs)?;
        debug!(height, txs = block.transactions.len(), "minted block");
        Ok(block)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn chain_id(&self) -> u32 {
        self.chain_id
    }

    pub fn tip(&self) -> ChainTip {
        self.inner.read().tip
    }

    pub fn tip_hash(&self) -> Hash256 {
        self.inner.read().tip.hash
    }

    pub fn tip_height(&self) -> u32 {
        self.inner.read().tip.height
    }

    /// True until the genesis block is committed.
    pub fn is_empty(&self) -> bool {
        self.inner.read().tip.is_empty()
    }

    pub fn get_block_by_height(&self, height: u32) -> Result<Block, ChainError> {
        let inner = self.inner.read();
        Self::load_by_height(&inner.store, height)
    }

    pub fn get_block_by_hash(&self, hash: &Hash256) -> Result<Block, ChainError> {
        let inner = self.inner.read();
        Self::load_by_hash(&inner.store, hash)
    }

    pub fn get_hash_by_height(&self, height: u32) -> Result<Hash256, ChainError> {
        self.inner
            .read()
            .store
            .hash_for_height(height)?
            .ok_or_else(|| ChainError::NotFound(format!("block at height {height}")))
    }

    pub fn get_height_by_hash(&self, hash: &Hash256) -> Result<u32, ChainError> {
        self.inner
            .read()
            .store
            .height_for_hash(hash)?
            .ok_or_else(|| ChainError::NotFound(format!("block {hash}")))
    }

    pub fn balance_of(&self, owner: &Hash256) -> u64 {
        self.inner.read().utxo.balance_of(owner)
    }

    /// Owned copy of the unspent set.
    pub fn utxo_snapshot(&self) -> UtxoSnapshot {
        self.inner.read().utxo.snapshot()
    }

    pub fn utxo_count(&self) -> usize {
        self.inner.read().utxo.len()
    }

    /// Drop the unspent set. Call [`replay`](Self::replay) to rebuild it.
    pub fn reset(&self) {
        self.inner.write().utxo.reset();
        debug!("reset utxo set");
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Build a transaction from the key's address, signing every input.
    ///
    /// Returns `Ok(None)` on insufficient funds. Nothing is committed.
    pub fn create_transaction(
        &self,
        keypair: &KeyPair,
        amount: u64,
        payees: &[Payee],
    ) -> Result<Option<Transaction>, WalletError> {
        let inner = self.inner.read();
        build_transaction(&inner.utxo, &keypair.pubkey_hash(), amount, payees, Unlock::Signed(keypair))
    }

    /// Build a transaction from `from` with empty unlock proofs.
    pub fn create_raw_transaction(
        &self,
        from: &Hash256,
        amount: u64,
        payees: &[Payee],
    ) -> Result<Option<Transaction>, WalletError> {
        let inner = self.inner.read();
        build_transaction(&inner.utxo, from, amount, payees, Unlock::Raw)
    }

    // ------------------------------------------------------------------
    // Archive and maintenance
    // ------------------------------------------------------------------

    /// Write blocks `start..=end` to an archive file at `path`.
    pub fn store_blocks(&self, path: &Path, start: u32, end: u32) -> Result<ArchiveIndex, ChainError> {
        let inner = self.inner.read();
        archive::write_archive(&inner.store, path, start, end)
    }

    pub fn read_archived_block(&self, path: &Path, height: u32) -> Result<Block, ChainError> {
        archive::read_archived(path, height)
    }

    /// Walk the stored chain checking heights and hash linkage.
    ///
    /// Returns the number of blocks checked.
    pub fn verify_chain(&self) -> Result<u32, ChainError> {
        let inner = self.inner.read();
        if inner.tip.is_empty() {
            return Ok(0);
        }
        let mut prev = Hash256::ZERO;
        for height in 0..=inner.tip.height {
            let block = Self::load_by_height(&inner.store, height)?;
            if block.header.height != height {
                return Err(ChainError::HeightMismatch { expected: height, got: block.header.height });
            }
            if block.header.prev_hash != prev {
                return Err(ChainError::BrokenChain { expected: prev, got: block.header.prev_hash });
            }
            prev = block.hash();
        }
        if prev != inner.tip.hash {
            return Err(ChainError::CorruptData(format!(
                "tip {} does not match block at height {}",
                inner.tip.hash, inner.tip.height
            )));
        }
        info!(blocks = inner.tip.height + 1, "verified chain");
        Ok(inner.tip.height + 1)
    }

    /// Close the underlying store.
    pub fn close(&self) -> Result<(), ChainError> {
        self.inner.write().store.close()
    }

    /// Give back the store, dropping in-memory state.
    pub fn into_store(self) -> S {
        self.inner.into_inner().store
    }
}
