//! Append-only string pool with hash-based dedup (C3).
//!
//! Decision D1 (see DESIGN.md): strings are stored length-prefixed
//! (`u32` little-endian length followed by raw bytes), not NUL-terminated
//! — this lets interned byte strings contain embedded NULs (the parser
//! never needs that today, but nothing in the contract forbids it, and a
//! length prefix is a single `read_exact` away from the bytes compared to
//! a NUL scan).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use log::trace;

/// Byte offset into the string pool file. `0` is never a valid offset
/// (every entry has at least a 4-byte length prefix), so it doubles as
/// the "none" sentinel for optional string references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StringOffset(pub u32);

impl StringOffset {
    pub const NONE: StringOffset = StringOffset(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

pub struct StringPool {
    path: PathBuf,
    file: File,
    len: u64,
    by_content: HashMap<Vec<u8>, StringOffset>,
}

impl StringPool {
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("io-failure: create {}", path.display()))?;
        Ok(Self {
            path,
            file,
            len: 0,
            by_content: HashMap::new(),
        })
    }

    /// Reopen an existing pool, rebuilding the in-memory dedup index by
    /// scanning the whole file once.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("io-failure: open {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("io-failure: stat {}", path.display()))?
            .len();

        let mut by_content = HashMap::new();
        let mut reader = BufReader::new(&mut file);
        let mut pos: u64 = 0;
        while pos < len {
            let mut len_buf = [0u8; 4];
            reader
                .read_exact(&mut len_buf)
                .context("io-failure: reading string pool length prefix")?;
            let entry_len = u32::from_le_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; entry_len];
            reader
                .read_exact(&mut bytes)
                .context("io-failure: reading string pool entry")?;
            by_content.insert(bytes, StringOffset(u32::try_from(pos).context("io-failure: pool too large")?));
            pos += 4 + entry_len as u64;
        }

        Ok(Self {
            path,
            file,
            len,
            by_content,
        })
    }

    /// `intern(x) == intern(y)` iff `x` and `y` are byte-equal.
    pub fn intern(&mut self, bytes: &[u8]) -> Result<StringOffset> {
        if let Some(offset) = self.by_content.get(bytes) {
            trace!("string pool dedup hit at offset {}", offset.0);
            return Ok(*offset);
        }
        trace!("string pool dedup miss, appending {} bytes", bytes.len());
        let offset = self.len;
        let offset = StringOffset(u32::try_from(offset).context("io-failure: pool too large")?);

        self.file
            .seek(SeekFrom::Start(self.len))
            .context("io-failure: seek for intern")?;
        let len_bytes = u32::try_from(bytes.len())
            .context("invalid-param: string too long to intern")?
            .to_le_bytes();
        self.file
            .write_all(&len_bytes)
            .context("io-failure: write length prefix")?;
        self.file
            .write_all(bytes)
            .context("io-failure: write string bytes")?;
        self.file.sync_data().context("io-failure: sync intern")?;

        self.len += 4 + bytes.len() as u64;
        self.by_content.insert(bytes.to_vec(), offset);
        Ok(offset)
    }

    pub fn intern_str(&mut self, s: &str) -> Result<StringOffset> {
        self.intern(s.as_bytes())
    }

    pub fn get(&mut self, offset: StringOffset) -> Result<Vec<u8>> {
        ensure!(!offset.is_none(), "invalid-index: sentinel string offset");
        ensure!(
            u64::from(offset.0) < self.len,
            "invalid-index: string offset {} beyond pool length {}",
            offset.0,
            self.len
        );
        self.file
            .seek(SeekFrom::Start(offset.0.into()))
            .context("io-failure: seek for get")?;
        let mut len_buf = [0u8; 4];
        self.file
            .read_exact(&mut len_buf)
            .context("io-failure: reading length prefix")?;
        let entry_len = u32::from_le_bytes(len_buf) as usize;
        let mut bytes = vec![0u8; entry_len];
        self.file
            .read_exact(&mut bytes)
            .context("io-failure: reading string bytes")?;
        Ok(bytes)
    }

    pub fn get_string(&mut self, offset: StringOffset) -> Result<String> {
        let bytes = self.get(offset)?;
        String::from_utf8(bytes).context("invalid: interned bytes are not valid UTF-8")
    }

    pub fn close(self) -> Result<()> {
        drop(self.file);
        let _ = &self.path;
        Ok(())
    }
}
