//! Shared test helpers for integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_core::block_store::{BlockStore, MemoryBlockStore};
use keel_core::crypto::{sign_transaction_input, KeyPair};
use keel_core::error::ChainError;
use keel_core::types::*;
use keel_node_lib::Blockchain;
use keel_wallet::Payee;

pub const CHAIN_ID: u32 = 1;
pub const REWARD: u64 = 5;

/// Simple pubkey hash from a seed byte.
pub fn pkh(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// Deterministic key pair from a seed byte.
pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes([seed; 32])
}

/// In-memory chain whose genesis pays `supply` to `owner`.
pub fn memory_chain(owner: Hash256, supply: u64) -> Blockchain<MemoryBlockStore> {
    Blockchain::create_or_open(MemoryBlockStore::new(), CHAIN_ID, owner, supply).unwrap()
}

/// Signed transfer of `amount` from `from`'s key to `to`, or `None` if unaffordable.
pub fn transfer<S: BlockStore>(
    chain: &Blockchain<S>,
    from: &KeyPair,
    to: Hash256,
    amount: u64,
) -> Option<Transaction> {
    chain
        .create_transaction(from, amount, &[Payee::new(to, amount)])
        .unwrap()
}

/// Mint and commit a block carrying `txs`, rewarding `beneficiary`.
pub fn commit<S: BlockStore>(
    chain: &Blockchain<S>,
    txs: Vec<Transaction>,
    beneficiary: Hash256,
) -> Result<Hash256, ChainError> {
    let block = chain.mint(txs, beneficiary, REWARD, b"")?;
    chain.commit_validated(&block)
}

/// Transaction spending `inputs` (all owned by `kp`) into `outputs`, signed.
pub fn signed_spend(
    kp: &KeyPair,
    inputs: &[(OutPoint, TxOutput)],
    outputs: Vec<(u64, Hash256)>,
) -> Transaction {
    let mut tx = Transaction {
        version: 1,
        inputs: inputs
            .iter()
            .map(|(op, _)| TxInput::unsigned(op.clone()))
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|(value, pubkey_hash)| TxOutput { value, pubkey_hash })
            .collect(),
        lock_time: 0,
    };
    for (i, (_, spent)) in inputs.iter().enumerate() {
        sign_transaction_input(&mut tx, i, spent, kp).unwrap();
    }
    tx
}

/// Sum of every unspent output.
pub fn total_value<S: BlockStore>(chain: &Blockchain<S>) -> u64 {
    chain.utxo_snapshot().values().map(|o| o.value).sum()
}

/// Memory store whose writes fail while the shared switch is on.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryBlockStore,
    fail: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let fail = Arc::new(AtomicBool::new(false));
        (Self { inner: MemoryBlockStore::new(), fail: fail.clone() }, fail)
    }
}

impl BlockStore for FlakyStore {
    fn init(&mut self) -> Result<Option<(u32, Hash256)>, ChainError> {
        self.inner.init()
    }

    fn put(&mut self, bytes: &[u8], hash: &Hash256, height: u32) -> Result<(), ChainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChainError::Storage("injected write failure".into()));
        }
        self.inner.put(bytes, hash, height)
    }

    fn get_by_hash(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, ChainError> {
        self.inner.get_by_hash(hash)
    }

    fn hash_for_height(&self, height: u32) -> Result<Option<Hash256>, ChainError> {
        self.inner.hash_for_height(height)
    }

    fn height_for_hash(&self, hash: &Hash256) -> Result<Option<u32>, ChainError> {
        self.inner.height_for_hash(hash)
    }

    fn close(&mut self) -> Result<(), ChainError> {
        self.inner.close()
    }
}
