//! # keel-core
//! Ledger types, unspent-output tracking, block persistence interface and
//! the flat-file block archive.

pub mod archive;
pub mod block_store;
pub mod block_validation;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod genesis;
pub mod merkle;
pub mod traits;
pub mod types;
pub mod utxo;
