//! Genesis block construction.
//!
//! The genesis block sits at height 0 with a zero predecessor and a single
//! coinbase paying the whole initial supply to one owner. Its timestamp is
//! fixed at 0 so every node configured with the same chain id, owner and
//! supply derives the same genesis hash.

use crate::error::ChainError;
use crate::types::{Block, Hash256, Transaction};

/// Genesis timestamp (Unix epoch).
pub const GENESIS_TIMESTAMP: u64 = 0;

/// Memo embedded in the genesis coinbase.
pub const GENESIS_MESSAGE: &[u8] = b"Keel genesis: every output is spent at most once";

/// Owner of the initial supply when none is configured: `BLAKE3(b"keel genesis owner")`.
pub fn default_genesis_owner() -> Hash256 {
    Hash256(blake3::hash(b"keel genesis owner").into())
}

/// Build the genesis block for a chain.
pub fn genesis_block(chain_id: u32, owner: Hash256, total_supply: u64) -> Result<Block, ChainError> {
    let coinbase = Transaction::coinbase(owner, total_supply, GENESIS_MESSAGE, 0);
    Block::new(chain_id, 0, Hash256::ZERO, GENESIS_TIMESTAMP, vec![coinbase])
}

/// A block shaped like a genesis block: height 0 on the zero hash.
pub fn is_genesis(block: &Block) -> bool {
    block.header.height == 0 && block.header.prev_hash.is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_height_zero_on_zero_hash() {
        let block = genesis_block(1, default_genesis_owner(), 1_000).unwrap();
        assert_eq!(block.header.height, 0);
        assert!(block.header.prev_hash.is_zero());
        assert_eq!(block.header.timestamp, GENESIS_TIMESTAMP);
        assert!(is_genesis(&block));
    }

    #[test]
    fn genesis_pays_total_supply_to_owner() {
        let owner = Hash256([0x42; 32]);
        let block = genesis_block(1, owner, 1_000_000).unwrap();
        assert_eq!(block.transactions.len(), 1);
        let cb = block.coinbase().unwrap();
        assert!(cb.is_coinbase());
        assert_eq!(cb.outputs[0].value, 1_000_000);
        assert_eq!(cb.outputs[0].pubkey_hash, owner);
        assert_eq!(cb.coinbase_memo(), Some(GENESIS_MESSAGE));
    }

    #[test]
    fn genesis_is_deterministic_per_parameters() {
        let owner = default_genesis_owner();
        let a = genesis_block(1, owner, 500).unwrap();
        let b = genesis_block(1, owner, 500).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), genesis_block(2, owner, 500).unwrap().hash());
        assert_ne!(a.hash(), genesis_block(1, owner, 501).unwrap().hash());
    }
}
