//! Block persistence interface and in-memory implementation.
//!
//! A [`BlockStore`] keeps the encoded bytes of every committed block keyed by
//! hash, plus the height→hash and hash→height indices, and remembers the last
//! block written as the tip. It knows nothing about validation: the chain
//! manager decides what gets written and in which order.
//!
//! [`MemoryBlockStore`] is used by tests and tooling; the node uses RocksDB
//! (keel-node).

use std::collections::HashMap;

use crate::error::ChainError;
use crate::types::Hash256;

/// Durable block log with hash and height indices.
///
/// After a successful [`init`](BlockStore::init) returning tip `(h, _)`,
/// every height in `0..=h` resolves to a hash and every such hash resolves
/// to bytes.
pub trait BlockStore: Send + Sync {
    /// Open the store and report the persisted tip as `(height, hash)`.
    ///
    /// Returns `None` for a store with no blocks.
    fn init(&mut self) -> Result<Option<(u32, Hash256)>, ChainError>;

    /// Atomically write `bytes` under `hash` at `height` and make it the tip.
    ///
    /// Either all indices are updated or none are.
    fn put(&mut self, bytes: &[u8], hash: &Hash256, height: u32) -> Result<(), ChainError>;

    fn get_by_hash(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, ChainError>;

    fn hash_for_height(&self, height: u32) -> Result<Option<Hash256>, ChainError>;

    fn height_for_hash(&self, hash: &Hash256) -> Result<Option<u32>, ChainError>;

    /// Flush and release resources. Further calls may fail.
    fn close(&mut self) -> Result<(), ChainError>;
}

/// In-memory block store.
///
/// No persistence and no size bound.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: HashMap<Hash256, Vec<u8>>,
    height_to_hash: HashMap<u32, Hash256>,
    hash_to_height: HashMap<Hash256, u32>,
    tip: Option<(u32, Hash256)>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks stored.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl BlockStore for MemoryBlockStore {
    fn init(&mut self) -> Result<Option<(u32, Hash256)>, ChainError> {
        Ok(self.tip)
    }

    fn put(&mut self, bytes: &[u8], hash: &Hash256, height: u32) -> Result<(), ChainError> {
        // A height may be rewritten during sync; drop the stale reverse mapping.
        if let Some(old) = self.height_to_hash.insert(height, *hash) {
            if old != *hash {
                self.hash_to_height.remove(&old);
            }
        }
        self.hash_to_height.insert(*hash, height);
        self.blocks.insert(*hash, bytes.to_vec());
        self.tip = Some((height, *hash));
        Ok(())
    }

    fn get_by_hash(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.blocks.get(hash).cloned())
    }

    fn hash_for_height(&self, height: u32) -> Result<Option<Hash256>, ChainError> {
        Ok(self.height_to_hash.get(&height).copied())
    }

    fn height_for_hash(&self, hash: &Hash256) -> Result<Option<u32>, ChainError> {
        Ok(self.hash_to_height.get(hash).copied())
    }

    fn close(&mut self) -> Result<(), ChainError> {
        Ok(())
    }
}
