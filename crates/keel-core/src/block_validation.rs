//! Context-free block structure checks.
//!
//! Run before any pool lookup. Checks:
//! - at least one transaction, and the first one is the coinbase
//! - no other transaction is a coinbase
//! - every transaction has outputs, and their values do not overflow
//! - every regular transaction has inputs
//! - no two transactions share a txid
//! - `header.tx_root` is the merkle root of the transaction ids

use std::collections::HashSet;

use crate::error::ChainError;
use crate::merkle;
use crate::types::Block;

/// Check the shape of `block` and that its header commits to its body.
pub fn validate_block_structure(block: &Block) -> Result<(), ChainError> {
    let Some(first) = block.transactions.first() else {
        return Err(ChainError::MalformedBlock("no transactions".into()));
    };
    if !first.is_coinbase() {
        return Err(ChainError::MalformedBlock("first transaction is not a coinbase".into()));
    }

    for (i, tx) in block.transactions.iter().enumerate() {
        if i > 0 && tx.is_coinbase() {
            return Err(ChainError::MalformedBlock(format!("transaction {i} is a second coinbase")));
        }
        if tx.inputs.is_empty() {
            return Err(ChainError::MalformedBlock(format!("transaction {i} has no inputs")));
        }
        if tx.outputs.is_empty() {
            return Err(ChainError::MalformedBlock(format!("transaction {i} has no outputs")));
        }
        if tx.total_output_value().is_none() {
            return Err(ChainError::MalformedBlock(format!("transaction {i} output total overflows")));
        }
    }

    let txids = block.txids()?;
    let mut seen = HashSet::with_capacity(txids.len());
    for txid in &txids {
        if !seen.insert(txid) {
            return Err(ChainError::MalformedBlock(format!("duplicate transaction {txid}")));
        }
    }

    let computed = merkle::merkle_root(&txids);
    if block.header.tx_root != computed {
        return Err(ChainError::MalformedBlock(format!(
            "tx_root {} does not match transactions ({computed})",
            block.header.tx_root
        )));
    }
    Ok(())
}
