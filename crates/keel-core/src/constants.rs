//! Ledger constants and defaults. Amounts are in base units.

/// Version written into every transaction this crate builds.
pub const TX_VERSION: u32 = 1;

/// Version written into every block header this crate builds.
pub const BLOCK_VERSION: u32 = 1;

/// Chain identifier used when none is configured.
pub const DEFAULT_CHAIN_ID: u32 = 1;

/// Units paid to the genesis owner when the chain is created.
pub const DEFAULT_TOTAL_SUPPLY: u64 = 10_000_000_000;

/// Units paid by the coinbase of every minted block after genesis.
pub const DEFAULT_BLOCK_REWARD: u64 = 5;

/// Size of the little-endian length prefix at the head of an archive file.
pub const ARCHIVE_LEN_PREFIX: usize = 4;
