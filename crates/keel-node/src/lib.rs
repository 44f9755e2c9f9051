//! # keel-node
//! Persistent ledger: RocksDB block store, chain manager and configuration.
//!
//! - [`storage::RocksStore`]: block store backed by RocksDB
//! - [`blockchain::Blockchain`]: validated commits over the store and the unspent set
//! - [`config::NodeConfig`]: node configuration

pub mod blockchain;
pub mod config;
pub mod storage;

pub use blockchain::{Blockchain, ChainTip};
pub use config::NodeConfig;
pub use storage::RocksStore;
