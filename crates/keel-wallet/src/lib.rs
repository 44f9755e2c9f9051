//! # keel-wallet
//! Transaction building.
//!
//! Turns a read-only coin selection into a spend transaction, either raw
//! (empty unlock placeholders) or signed with the sender's Ed25519 key.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`builder`]: payees, unlock modes, and the transaction builder

pub mod builder;
pub mod error;

pub use builder::{build_transaction, Payee, TransactionBuilder, Unlock};
pub use error::WalletError;
