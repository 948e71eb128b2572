//! Fixed-record, file-backed persistent arrays (C1).
//!
//! Every intermediate representation in this crate — tokens, AST nodes,
//! symbol-table entries, TAC instructions — is kept in one of these stores.
//! A store owns exactly one backing file and never holds more than a
//! bounded amount of in-memory state: callers that need caching (AST,
//! symbols) layer [`crate::hbuf::HashedLruBuffer`] on top.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use log::debug;

/// A 1-based stable index into a record store. `0` is the "none" sentinel.
///
/// Indices are the only cross-pass identifiers in this system; no pointer
/// is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Index(pub u32);

impl Index {
    pub const NONE: Index = Index(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn new(raw: u32) -> Self {
        Index(raw)
    }

    /// Zero-based offset into the backing file's record array, or `None`
    /// for the sentinel index.
    fn zero_based(self) -> Option<u64> {
        (self.0 != 0).then(|| u64::from(self.0 - 1))
    }
}

impl From<u32> for Index {
    fn from(value: u32) -> Self {
        Index(value)
    }
}

/// A record that can be packed to and unpacked from a fixed-size byte
/// buffer. Implementors must encode/decode into exactly `SIZE` bytes —
/// the store relies on this to compute file offsets and never asks serde
/// to guess a layout.
pub trait Record: Sized {
    const SIZE: usize;

    fn to_bytes(&self) -> Result<Vec<u8>>;
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Shared contract for the five on-disk stores (string pool excluded,
/// which is append-only bytes rather than fixed records — see
/// [`crate::strings::StringPool`]).
pub trait RecordStore<R: Record> {
    fn init(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized;
    fn open(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized;
    fn append(&mut self, record: &R) -> Result<Index>;
    fn get(&mut self, index: Index) -> Result<R>;
    fn update(&mut self, index: Index, record: &R) -> Result<()>;
    fn count(&self) -> u32;
    fn close(self) -> Result<()>;
}

/// A generic fixed-record file store. Write-through: every `append`/
/// `update` flushes before returning, so the file is always the single
/// source of truth (§4.1 contract).
pub struct FileStore<R: Record> {
    path: PathBuf,
    file: File,
    count: u32,
    _marker: PhantomData<R>,
}

impl<R: Record> FileStore<R> {
    fn record_offset(index: Index) -> Result<u64> {
        let zero_based = index.zero_based().context("invalid-index: zero index")?;
        Ok(zero_based * R::SIZE as u64)
    }
}

impl<R: Record> RecordStore<R> for FileStore<R> {
    fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("io-failure: create {}", path.display()))?;
        debug!("store init: {}", path.display());
        Ok(Self {
            path,
            file,
            count: 0,
            _marker: PhantomData,
        })
    }

    fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("io-failure: open {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("io-failure: stat {}", path.display()))?
            .len();
        ensure!(
            len % R::SIZE as u64 == 0,
            "io-failure: {} size {} is not a multiple of record size {}",
            path.display(),
            len,
            R::SIZE
        );
        let count = u32::try_from(len / R::SIZE as u64).context("io-failure: store too large")?;
        debug!("store open: {} ({} records)", path.display(), count);
        Ok(Self {
            path,
            file,
            count,
            _marker: PhantomData,
        })
    }

    fn append(&mut self, record: &R) -> Result<Index> {
        let bytes = record.to_bytes()?;
        ensure!(
            bytes.len() == R::SIZE,
            "internal: record encoded to {} bytes, expected {}",
            bytes.len(),
            R::SIZE
        );
        let offset = u64::from(self.count) * R::SIZE as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .context("io-failure: seek for append")?;
        {
            let mut writer = BufWriter::new(&mut self.file);
            writer.write_all(&bytes).context("io-failure: append")?;
            writer.flush().context("io-failure: flush append")?;
        }
        self.file.sync_data().context("io-failure: sync append")?;
        self.count += 1;
        Ok(Index(self.count))
    }

    fn get(&mut self, index: Index) -> Result<R> {
        ensure!(!index.is_none(), "invalid-index: sentinel index 0");
        let offset = Self::record_offset(index)?;
        ensure!(
            index.0 <= self.count,
            "invalid-index: {} exceeds store count {}",
            index.0,
            self.count
        );
        self.file
            .seek(SeekFrom::Start(offset))
            .context("io-failure: seek for get")?;
        let mut buf = vec![0u8; R::SIZE];
        let mut reader = BufReader::new(&mut self.file);
        reader.read_exact(&mut buf).context("io-failure: read")?;
        R::from_bytes(&buf)
    }

    fn update(&mut self, index: Index, record: &R) -> Result<()> {
        ensure!(!index.is_none(), "invalid-index: sentinel index 0");
        ensure!(
            index.0 <= self.count,
            "invalid-index: {} exceeds store count {}",
            index.0,
            self.count
        );
        let offset = Self::record_offset(index)?;
        let bytes = record.to_bytes()?;
        ensure!(
            bytes.len() == R::SIZE,
            "internal: record encoded to {} bytes, expected {}",
            bytes.len(),
            R::SIZE
        );
        self.file
            .seek(SeekFrom::Start(offset))
            .context("io-failure: seek for update")?;
        self.file.write_all(&bytes).context("io-failure: update")?;
        self.file.sync_data().context("io-failure: sync update")?;
        Ok(())
    }

    fn count(&self) -> u32 {
        self.count
    }

    fn close(self) -> Result<()> {
        debug!("store close: {}", self.path.display());
        drop(self.file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Fixed4(u32);

    impl Record for Fixed4 {
        const SIZE: usize = 4;

        fn to_bytes(&self) -> Result<Vec<u8>> {
            Ok(self.0.to_le_bytes().to_vec())
        }

        fn from_bytes(bytes: &[u8]) -> Result<Self> {
            let arr: [u8; 4] = bytes.try_into().context("bad length")?;
            Ok(Fixed4(u32::from_le_bytes(arr)))
        }
    }

    #[test]
    fn append_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let mut store: FileStore<Fixed4> = FileStore::init(&path).unwrap();
        let i1 = store.append(&Fixed4(10)).unwrap();
        let i2 = store.append(&Fixed4(20)).unwrap();
        assert_eq!(i1, Index(1));
        assert_eq!(i2, Index(2));
        assert_eq!(store.get(i1).unwrap(), Fixed4(10));
        assert_eq!(store.get(i2).unwrap(), Fixed4(20));
        store.close().unwrap();

        let mut reopened: FileStore<Fixed4> = FileStore::open(&path).unwrap();
        assert_eq!(reopened.count(), 2);
        assert_eq!(reopened.get(i1).unwrap(), Fixed4(10));
        assert_eq!(reopened.get(i2).unwrap(), Fixed4(20));
    }

    #[test]
    fn update_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let mut store: FileStore<Fixed4> = FileStore::init(&path).unwrap();
        let idx = store.append(&Fixed4(1)).unwrap();
        store.update(idx, &Fixed4(99)).unwrap();
        assert_eq!(store.get(idx).unwrap(), Fixed4(99));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn invalid_index_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let mut store: FileStore<Fixed4> = FileStore::init(&path).unwrap();
        store.append(&Fixed4(1)).unwrap();
        assert!(store.get(Index(0)).is_err());
        assert!(store.get(Index(5)).is_err());
    }
}
