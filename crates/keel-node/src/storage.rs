//! RocksDB-backed block store.
//!
//! Implements [`BlockStore`] using column families for encoded blocks, the
//! height → hash index, the hash → height index and tip metadata. A block
//! and the tip move together in one [`WriteBatch`], so a crash never leaves
//! a tip pointing at a missing block.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info};

use keel_core::block_store::BlockStore;
use keel_core::error::ChainError;
use keel_core::types::Hash256;

// --- Column family names ---

const CF_BLOCKS: &str = "blocks";
const CF_HEIGHT_INDEX: &str = "height_index";
const CF_HASH_INDEX: &str = "hash_index";
const CF_METADATA: &str = "metadata";

const ALL_CFS: &[&str] = &[CF_BLOCKS, CF_HEIGHT_INDEX, CF_HASH_INDEX, CF_METADATA];

// --- Metadata keys ---

const META_TIP_HEIGHT: &[u8] = b"tip_height";
const META_TIP_HASH: &[u8] = b"tip_hash";

fn storage_err(e: rocksdb::Error) -> ChainError {
    ChainError::Storage(e.to_string())
}

/// Persistent block store.
///
/// Opening an existing directory resumes from the stored tip; nothing is
/// written until the first [`BlockStore::put`].
pub struct RocksStore {
    db: Option<DB>,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(storage_err)?;
        info!(path = %path.as_ref().display(), "opened block store");
        Ok(Self { db: Some(db) })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), ChainError> {
        self.db()?.flush().map_err(storage_err)
    }

    /// Trigger manual compaction across all column families.
    pub fn compact(&self) -> Result<(), ChainError> {
        let db = self.db()?;
        for cf_name in ALL_CFS {
            let cf = Self::cf_handle(db, cf_name)?;
            db.compact_range_cf(cf, None::<&[u8]>, None::<&[u8]>);
        }
        Ok(())
    }

    /// Number of stored blocks.
    pub fn block_count(&self) -> Result<usize, ChainError> {
        let db = self.db()?;
        let cf = Self::cf_handle(db, CF_BLOCKS)?;
        let mut count = 0;
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            item.map_err(storage_err)?;
            count += 1;
        }
        Ok(count)
    }

    fn db(&self) -> Result<&DB, ChainError> {
        self.db
            .as_ref()
            .ok_or_else(|| ChainError::Storage("block store is closed".into()))
    }

    fn cf_handle<'a>(db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily, ChainError> {
        db.cf_handle(name)
            .ok_or_else(|| ChainError::Storage(format!("missing column family: {name}")))
    }

    /// Encode a height as big-endian bytes for ordered iteration.
    fn height_key(height: u32) -> [u8; 4] {
        height.to_be_bytes()
    }

    fn decode_hash(bytes: &[u8], what: &str) -> Result<Hash256, ChainError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ChainError::CorruptData(format!("{what}: expected 32 bytes, got {}", bytes.len())))?;
        Ok(Hash256(arr))
    }

    fn decode_height(bytes: &[u8], what: &str) -> Result<u32, ChainError> {
        let arr: [u8; 4] = bytes
            .try_into()
            .map_err(|_| ChainError::CorruptData(format!("{what}: expected 4 bytes, got {}", bytes.len())))?;
        Ok(u32::from_be_bytes(arr))
    }
}

impl BlockStore for RocksStore {
    fn init(&mut self) -> Result<Option<(u32, Hash256)>, ChainError> {
        let db = self.db()?;
        let cf = Self::cf_handle(db, CF_METADATA)?;
        let hash = match db.get_cf(cf, META_TIP_HASH).map_err(storage_err)? {
            Some(bytes) => Self::decode_hash(&bytes, "tip hash")?,
            None => return Ok(None),
        };
        let height = match db.get_cf(cf, META_TIP_HEIGHT).map_err(storage_err)? {
            Some(bytes) => Self::decode_height(&bytes, "tip height")?,
            None => return Err(ChainError::CorruptData("tip hash stored without tip height".into())),
        };
        debug!(height, %hash, "loaded stored tip");
        Ok(Some((height, hash)))
    }

    fn put(&mut self, bytes: &[u8], hash: &Hash256, height: u32) -> Result<(), ChainError> {
        let db = self.db()?;
        let cf_blocks = Self::cf_handle(db, CF_BLOCKS)?;
        let cf_height = Self::cf_handle(db, CF_HEIGHT_INDEX)?;
        let cf_hash = Self::cf_handle(db, CF_HASH_INDEX)?;
        let cf_meta = Self::cf_handle(db, CF_METADATA)?;

        let mut batch = WriteBatch::default();
        // A replaced block at this height leaves no reverse mapping behind.
        if let Some(old) = db.get_cf(cf_height, Self::height_key(height)).map_err(storage_err)? {
            if old.as_slice() != hash.as_bytes() {
                batch.delete_cf(cf_hash, &old);
            }
        }
        batch.put_cf(cf_blocks, hash.as_bytes(), bytes);
        batch.put_cf(cf_height, Self::height_key(height), hash.as_bytes());
        batch.put_cf(cf_hash, hash.as_bytes(), Self::height_key(height));
        batch.put_cf(cf_meta, META_TIP_HEIGHT, Self::height_key(height));
        batch.put_cf(cf_meta, META_TIP_HASH, hash.as_bytes());
        db.write(batch).map_err(storage_err)?;

        debug!(height, %hash, len = bytes.len(), "stored block");
        Ok(())
    }

    fn get_by_hash(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, ChainError> {
        let db = self.db()?;
        let cf = Self::cf_handle(db, CF_BLOCKS)?;
        db.get_cf(cf, hash.as_bytes()).map_err(storage_err)
    }

    fn hash_for_height(&self, height: u32) -> Result<Option<Hash256>, ChainError> {
        let db = self.db()?;
        let cf = Self::cf_handle(db, CF_HEIGHT_INDEX)?;
        db.get_cf(cf, Self::height_key(height))
            .map_err(storage_err)?
            .map(|bytes| Self::decode_hash(&bytes, "height index entry"))
            .transpose()
    }

    fn height_for_hash(&self, hash: &Hash256) -> Result<Option<u32>, ChainError> {
        let db = self.db()?;
        let cf = Self::cf_handle(db, CF_HASH_INDEX)?;
        db.get_cf(cf, hash.as_bytes())
            .map_err(storage_err)?
            .map(|bytes| Self::decode_height(&bytes, "hash index entry"))
            .transpose()
    }

    fn close(&mut self) -> Result<(), ChainError> {
        if let Some(db) = self.db.take() {
            db.flush().map_err(storage_err)?;
            info!("closed block store");
        }
        Ok(())
    }
}
