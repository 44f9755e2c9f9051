//! Ed25519 unlock proofs.
//!
//! An input's unlock proof is a 64-byte Ed25519 signature plus the 32-byte
//! public key that made it. The proof is valid when the key hashes to the
//! spent output's owner and the signature covers the input's sighash.
//!
//! # Sighash
//!
//! BLAKE3 over, little-endian:
//! - transaction version and lock_time
//! - every input outpoint (txid + index)
//! - every output (value + pubkey_hash)
//! - the index of the input being signed
//! - the value and owner of the output that input spends
//!
//! Signatures and public keys are left out so inputs can be signed in any order.

use ed25519_dalek::{Signer, Verifier};
use std::fmt;

use crate::error::CryptoError;
use crate::traits::UnlockVerifier;
use crate::types::{Hash256, Transaction, TxOutput};

/// Ed25519 keypair for signing transaction inputs.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Address of this keypair (BLAKE3 of the public key).
    pub fn pubkey_hash(&self) -> Hash256 {
        self.public_key().pubkey_hash()
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.secret_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    pub fn pubkey_hash(&self) -> Hash256 {
        pubkey_hash(&self.to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

/// BLAKE3 hash of raw public key bytes; the address stored in [`TxOutput::pubkey_hash`].
pub fn pubkey_hash(pubkey_bytes: &[u8; 32]) -> Hash256 {
    Hash256(blake3::hash(pubkey_bytes).into())
}

fn check_index(tx: &Transaction, input_index: usize) -> Result<(), CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }
    Ok(())
}

/// Compute the sighash for input `input_index` spending `spent`.
pub fn signing_hash(
    tx: &Transaction,
    input_index: usize,
    spent: &TxOutput,
) -> Result<Hash256, CryptoError> {
    check_index(tx, input_index)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&tx.version.to_le_bytes());
    hasher.update(&tx.lock_time.to_le_bytes());

    hasher.update(&(tx.inputs.len() as u64).to_le_bytes());
    for input in &tx.inputs {
        hasher.update(input.previous_output.txid.as_bytes());
        hasher.update(&input.previous_output.index.to_le_bytes());
    }

    hasher.update(&(tx.outputs.len() as u64).to_le_bytes());
    for output in &tx.outputs {
        hasher.update(&output.value.to_le_bytes());
        hasher.update(output.pubkey_hash.as_bytes());
    }

    hasher.update(&(input_index as u64).to_le_bytes());
    hasher.update(&spent.value.to_le_bytes());
    hasher.update(spent.pubkey_hash.as_bytes());

    Ok(Hash256(hasher.finalize().into()))
}

/// Sign input `input_index` in place, writing the signature and public key.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    spent: &TxOutput,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let sighash = signing_hash(tx, input_index, spent)?;
    let signature = keypair.sign(sighash.as_bytes());

    let input = &mut tx.inputs[input_index];
    input.signature = signature.to_vec();
    input.public_key = keypair.public_key().to_bytes().to_vec();
    Ok(())
}

/// Check the unlock proof of input `input_index` against the output it spends.
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    spent: &TxOutput,
) -> Result<(), CryptoError> {
    check_index(tx, input_index)?;
    let input = &tx.inputs[input_index];

    let pk_bytes: [u8; 32] = input
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let pk = PublicKey::from_bytes(&pk_bytes)?;
    if pk.pubkey_hash() != spent.pubkey_hash {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let sig_bytes: [u8; 64] = input
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;

    let sighash = signing_hash(tx, input_index, spent)?;
    pk.verify(sighash.as_bytes(), &sig_bytes)
}

/// [`UnlockVerifier`] backed by [`verify_transaction_input`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl UnlockVerifier for Ed25519Verifier {
    fn verify_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        spent: &TxOutput,
    ) -> Result<(), CryptoError> {
        verify_transaction_input(tx, input_index, spent)
    }
}
