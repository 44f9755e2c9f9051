//! Flat-file archive of a contiguous height range.
//!
//! Layout:
//!
//! ```text
//! [u32 LE: index length N][N bytes: bincode ArchiveIndex][block bytes ...]
//! ```
//!
//! `ArchiveIndex::offsets` has one entry per archived height plus a final
//! entry equal to the body length, so block `h` occupies
//! `offsets[h - start]..offsets[h - start + 1]` of the body. Reading one
//! block costs the prefix, the index and that block's span.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::block_store::BlockStore;
use crate::codec;
use crate::constants::ARCHIVE_LEN_PREFIX;
use crate::error::ChainError;
use crate::types::Block;

/// Offset table at the head of an archive file.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct ArchiveIndex {
    pub start: u32,
    pub end: u32,
    /// Body offsets, `end - start + 2` entries, non-decreasing.
    pub offsets: Vec<u64>,
}

impl ArchiveIndex {
    pub fn contains(&self, height: u32) -> bool {
        (self.start..=self.end).contains(&height)
    }

    /// Body byte range of the block at `height`.
    pub fn span(&self, height: u32) -> Option<(u64, u64)> {
        if !self.contains(height) {
            return None;
        }
        let i = (height - self.start) as usize;
        Some((*self.offsets.get(i)?, *self.offsets.get(i + 1)?))
    }

    fn check(&self) -> Result<(), ChainError> {
        if self.end < self.start {
            return Err(ChainError::CorruptData(format!(
                "archive index range {}..={} is empty",
                self.start, self.end
            )));
        }
        let expected = (self.end - self.start) as usize + 2;
        if self.offsets.len() != expected {
            return Err(ChainError::CorruptData(format!(
                "archive index has {} offsets, expected {expected}",
                self.offsets.len()
            )));
        }
        if self.offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(ChainError::CorruptData("archive offsets not ascending".into()));
        }
        Ok(())
    }
}

/// Write blocks `start..=end` from `store` into a new archive at `path`.
///
/// The file is written beside `path` and renamed into place, so readers
/// never see a half-written archive.
pub fn write_archive(
    store: &dyn BlockStore,
    path: &Path,
    start: u32,
    end: u32,
) -> Result<ArchiveIndex, ChainError> {
    if end < start {
        return Err(ChainError::InvalidRange { start, end });
    }
    if store.hash_for_height(end)?.is_none() {
        return Err(ChainError::NotFound(format!("block at height {end}")));
    }

    let mut offsets = Vec::new();
    let mut bodies = Vec::new();
    let mut cursor = 0u64;
    for height in start..=end {
        let hash = store
            .hash_for_height(height)?
            .ok_or_else(|| ChainError::NotFound(format!("block at height {height}")))?;
        let bytes = store
            .get_by_hash(&hash)?
            .ok_or_else(|| ChainError::NotFound(format!("block {hash}")))?;
        offsets.push(cursor);
        cursor += bytes.len() as u64;
        bodies.push(bytes);
    }
    offsets.push(cursor);

    let index = ArchiveIndex { start, end, offsets };
    let encoded = codec::encode(&index)?;
    let index_len = u32::try_from(encoded.len())
        .map_err(|_| ChainError::Serialization("archive index exceeds 4 GiB".into()))?;

    let tmp = path.with_extension("partial");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        out.write_all(&index_len.to_le_bytes())?;
        out.write_all(&encoded)?;
        for body in &bodies {
            out.write_all(body)?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;

    info!(start, end, body_bytes = cursor, path = %path.display(), "archived block range");
    Ok(index)
}

fn read_exact(file: &mut File, buf: &mut [u8], what: &str) -> Result<(), ChainError> {
    file.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => ChainError::CorruptData(format!("archive truncated in {what}")),
        _ => ChainError::from(e),
    })
}

fn open(path: &Path) -> Result<File, ChainError> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ChainError::NotFound(format!("archive {}", path.display())),
        _ => ChainError::from(e),
    })
}

/// Read and check the index. Returns it with the file offset where block
/// bytes begin.
fn read_index_from(file: &mut File) -> Result<(ArchiveIndex, u64), ChainError> {
    let file_len = file.metadata()?.len();

    let mut prefix = [0u8; ARCHIVE_LEN_PREFIX];
    read_exact(file, &mut prefix, "length prefix")?;
    let index_len = u32::from_le_bytes(prefix) as u64;
    let body_start = ARCHIVE_LEN_PREFIX as u64 + index_len;
    if body_start > file_len {
        return Err(ChainError::CorruptData(format!(
            "archive index length {index_len} exceeds file size {file_len}"
        )));
    }

    let mut encoded = vec![0u8; index_len as usize];
    read_exact(file, &mut encoded, "index")?;
    let index: ArchiveIndex = codec::decode(&encoded)?;
    index.check()?;
    Ok((index, body_start))
}

/// Read the block at `height` from the archive at `path`.
///
/// # Errors
///
/// - [`ChainError::NotFound`] if the file is missing or `height` is outside its range
/// - [`ChainError::CorruptData`] if the file is truncated or does not decode
/// - [`ChainError::Storage`] on other I/O failures
pub fn read_archived(path: &Path, height: u32) -> Result<Block, ChainError> {
    let mut file = open(path)?;
    let (index, body_start) = read_index_from(&mut file)?;
    let (from, to) = index.span(height).ok_or_else(|| {
        ChainError::NotFound(format!(
            "height {height} outside archive range {}..={}",
            index.start, index.end
        ))
    })?;
    let body_len = file.metadata()?.len().saturating_sub(body_start);
    if to > body_len {
        return Err(ChainError::CorruptData(format!(
            "block at height {height} ends at {to}, past body length {body_len}"
        )));
    }

    file.seek(SeekFrom::Start(body_start + from))?;
    let mut bytes = vec![0u8; (to - from) as usize];
    read_exact(&mut file, &mut bytes, "block body")?;
    debug!(height, len = bytes.len(), "read archived block");
    Block::decode(&bytes)
}
