//! Trait interfaces between the ledger core and its collaborators.
//!
//! - [`UnlockVerifier`]: checks an input's unlock proof ([`crate::crypto::Ed25519Verifier`] implements)
//! - [`UtxoSource`]: read-only coin selection ([`crate::utxo::UtxoTracker`] implements)
//!
//! Block persistence lives in [`crate::block_store::BlockStore`].

use crate::error::CryptoError;
use crate::types::{Hash256, Transaction, TxOutput};
use crate::utxo::Selection;

/// Verifies that an input is allowed to spend the output it references.
pub trait UnlockVerifier: Send + Sync {
    /// `spent` is the live output referenced by `tx.inputs[input_index]`.
    fn verify_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        spent: &TxOutput,
    ) -> Result<(), CryptoError>;
}

/// Read-only access to spendable outputs, as needed to build transactions.
pub trait UtxoSource {
    /// Pick outputs owned by `owner` worth at least `amount`.
    ///
    /// Returns `None` when the owner cannot cover `amount`.
    fn select_entries(&self, owner: &Hash256, amount: u64) -> Option<Selection>;

    /// Total value owned by `owner`.
    fn balance_of(&self, owner: &Hash256) -> u64;
}
