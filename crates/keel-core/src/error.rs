//! Error types for the Keel ledger.
use thiserror::Error;

use crate::types::{Hash256, OutPoint};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

/// Every failure the ledger core can report.
///
/// Validation variants (`NilBlock` through `InvalidUnlock`) never leave a
/// trace in chain state. `Storage` and `Serialization` abort a commit before
/// the tip moves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("no block supplied")] NilBlock,
    #[error("broken chain: expected prev hash {expected}, got {got}")] BrokenChain { expected: Hash256, got: Hash256 },
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u32, got: u32 },
    #[error("no height follows {0}")] HeightExhausted(u32),
    #[error("unknown input: {0}")] UnknownInput(OutPoint),
    #[error("double spend in block: {0}")] DoubleSpendInBlock(OutPoint),
    #[error("malformed block: {0}")] MalformedBlock(String),
    #[error("transaction {txid} spends {spent} but creates {created}")] OutputsExceedInputs { txid: Hash256, spent: u64, created: u64 },
    #[error("invalid unlock proof for {outpoint}: {source}")] InvalidUnlock { outpoint: OutPoint, source: CryptoError },
    #[error("invalid archive range: {start}..={end}")] InvalidRange { start: u32, end: u32 },
    #[error("serialization: {0}")] Serialization(String),
    #[error("storage: {0}")] Storage(String),
    #[error("not found: {0}")] NotFound(String),
    #[error("corrupt data: {0}")] CorruptData(String),
}

impl From<std::io::Error> for ChainError {
    fn from(e: std::io::Error) -> Self {
        ChainError::Storage(e.to_string())
    }
}
