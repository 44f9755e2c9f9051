//! BLAKE3 transaction root.
//!
//! Leaves are hashed as `BLAKE3(0x00 || txid)` and interior nodes as
//! `BLAKE3(0x01 || left || right)`, so a leaf can never be mistaken for a
//! node. An odd layer pairs its last hash with itself. No transactions
//! gives [`Hash256::ZERO`].

use crate::types::Hash256;

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;

fn tagged(tag: u8, parts: &[&Hash256]) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[tag]);
    for part in parts {
        hasher.update(part.as_bytes());
    }
    Hash256(hasher.finalize().into())
}

pub fn leaf_hash(txid: &Hash256) -> Hash256 {
    tagged(LEAF_TAG, &[txid])
}

pub fn node_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    tagged(NODE_TAG, &[left, right])
}

/// Root over `txids` in the given order.
pub fn merkle_root(txids: &[Hash256]) -> Hash256 {
    let mut layer: Vec<Hash256> = txids.iter().map(leaf_hash).collect();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| node_hash(&pair[0], pair.get(1).unwrap_or(&pair[0])))
            .collect();
    }
    layer.first().copied().unwrap_or(Hash256::ZERO)
}
