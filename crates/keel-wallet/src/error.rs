//! Wallet error types.

use keel_core::error::{ChainError, CryptoError};
use keel_core::types::Hash256;
use thiserror::Error;

/// Errors that can occur while building a transaction.
///
/// Insufficient funds is not an error: builders return `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Payee amounts are inconsistent with the requested amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The signing key does not own the sending address.
    #[error("signing key owns {key_owner}, not sender {from}")]
    KeyMismatch {
        /// Address the transaction spends from.
        from: Hash256,
        /// Address derived from the signing key.
        key_owner: Hash256,
    },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_amount() {
        let e = WalletError::InvalidAmount("payees exceed amount".into());
        assert_eq!(e.to_string(), "invalid amount: payees exceed amount");
    }

    #[test]
    fn from_crypto_error() {
        let wallet: WalletError = CryptoError::InvalidPublicKey.into();
        assert_eq!(wallet, WalletError::Crypto(CryptoError::InvalidPublicKey));
    }

    #[test]
    fn from_chain_error_is_transparent() {
        let wallet: WalletError = ChainError::Serialization("boom".into()).into();
        assert_eq!(wallet.to_string(), "serialization: boom");
    }
}
