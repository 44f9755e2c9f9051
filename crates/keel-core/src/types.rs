//! Core ledger types: transactions, blocks, outpoints.
//!
//! Blocks and transactions are plain values. Nothing in the crate mutates
//! them after construction; a new block always references the previous tip
//! by hash instead.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::codec;
use crate::error::ChainError;
use crate::merkle;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3), block header hashes (double SHA-256),
/// transaction roots (BLAKE3) and addresses (BLAKE3 of a public key).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Predecessor of the genesis block and txid of coinbase inputs.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
///
/// Ordering is by txid, then index. Coin selection relies on it.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u32,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u32::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
///
/// `signature` and `public_key` form the unlock proof. Both are empty for
/// raw (unsigned) transactions. A coinbase input carries its memo in
/// `signature`.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// An input with empty unlock placeholders.
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            signature: Vec::new(),
            public_key: Vec::new(),
        }
    }
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Amount in base units.
    pub value: u64,
    /// BLAKE3 hash of the owner's Ed25519 public key.
    pub pubkey_hash: Hash256,
}

/// A transaction transferring value between addresses.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u64,
}

impl Transaction {
    /// Build a coinbase paying `value` to `beneficiary`.
    ///
    /// `lock_time` should be the block height so coinbases with identical
    /// payouts in different blocks still get distinct txids.
    pub fn coinbase(beneficiary: Hash256, value: u64, memo: &[u8], lock_time: u64) -> Self {
        Self {
            version: crate::constants::TX_VERSION,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature: memo.to_vec(),
                public_key: Vec::new(),
            }],
            outputs: vec![TxOutput {
                value,
                pubkey_hash: beneficiary,
            }],
            lock_time,
        }
    }

    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, ChainError> {
        let encoded = codec::encode(self)?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Memo bytes of a coinbase, `None` for regular transactions.
    pub fn coinbase_memo(&self) -> Option<&[u8]> {
        self.is_coinbase().then(|| self.inputs[0].signature.as_slice())
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// Block header.
///
/// Hash is computed as double SHA-256 over a fixed little-endian byte layout.
/// The header commits to the body through `tx_root`.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    pub version: u32,
    /// Chain the block belongs to.
    pub chain_id: u32,
    /// Height 0 is genesis.
    pub height: u32,
    /// Hash of the previous block header, [`Hash256::ZERO`] for genesis.
    pub prev_hash: Hash256,
    /// BLAKE3 merkle root of the block's transaction ids.
    pub tx_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing (3 u32 + 1 u64 + 2 * 32-byte hashes).
    const HASH_SIZE: usize = 3 * 4 + 8 + 2 * 32;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Layout: version || chain_id || height || prev_hash || tx_root || timestamp,
    /// integers little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&self.chain_id.to_le_bytes());
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.tx_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header plus transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    pub header: BlockHeader,
    /// Ordered transactions. The first one is the coinbase.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block, computing the transaction root.
    pub fn new(
        chain_id: u32,
        height: u32,
        prev_hash: Hash256,
        timestamp: u64,
        transactions: Vec<Transaction>,
    ) -> Result<Self, ChainError> {
        let txids = transactions
            .iter()
            .map(Transaction::txid)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            header: BlockHeader {
                version: crate::constants::BLOCK_VERSION,
                chain_id,
                height,
                prev_hash,
                tx_root: merkle::merkle_root(&txids),
                timestamp,
            },
            transactions,
        })
    }

    /// Header hash; the block's identity.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Get the coinbase transaction, if the block is non-empty.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// Transaction ids in block order.
    pub fn txids(&self) -> Result<Vec<Hash256>, ChainError> {
        self.transactions.iter().map(Transaction::txid).collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChainError> {
        codec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        codec::decode(bytes)
    }
}
