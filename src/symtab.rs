//! Scoped symbol table (C5), persisted through HBUF.
//!
//! Entries form a tree rooted at a file-scope pseudo-entry (index 1,
//! created by [`SymbolTable::init`]). The table only stores links; scope
//! semantics (when to open/close a scope) are the parser's
//! responsibility, per spec §4.4.

use anyhow::{ensure, Context, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::store::{Index, Record};
use crate::strings::StringOffset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SymbolKind {
    Free = 0,
    Variable = 1,
    Function = 2,
    Typedef = 3,
    Label = 4,
    Enumerator = 5,
    Struct = 6,
    Union = 7,
    Enum = 8,
    Constant = 9,
    Unknown = 10,
}

/// A symbol-table entry. `parent`/`child`/`sibling` form the scope tree;
/// `next`/`prev` form a flat doubly-linked list over all entries
/// (insertion order), used by [`SymbolTable::iter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: StringOffset,
    pub kind: SymbolKind,
    pub scope_depth: u16,
    pub parent: Index,
    pub child: Index,
    pub sibling: Index,
    pub next: Index,
    pub prev: Index,
    pub value: StringOffset,
    pub line: u32,
}

impl SymbolEntry {
    pub fn free() -> Self {
        SymbolEntry {
            name: StringOffset::NONE,
            kind: SymbolKind::Free,
            scope_depth: 0,
            parent: Index::NONE,
            child: Index::NONE,
            sibling: Index::NONE,
            next: Index::NONE,
            prev: Index::NONE,
            value: StringOffset::NONE,
            line: 0,
        }
    }
}

impl Record for SymbolEntry {
    // name:4 kind:1 scope_depth:2 parent:4 child:4 sibling:4 next:4 prev:4 value:4 line:4 = 35
    const SIZE: usize = 35;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.name.0.to_le_bytes());
        buf.push(self.kind.into());
        buf.extend_from_slice(&self.scope_depth.to_le_bytes());
        buf.extend_from_slice(&self.parent.0.to_le_bytes());
        buf.extend_from_slice(&self.child.0.to_le_bytes());
        buf.extend_from_slice(&self.sibling.0.to_le_bytes());
        buf.extend_from_slice(&self.next.0.to_le_bytes());
        buf.extend_from_slice(&self.prev.0.to_le_bytes());
        buf.extend_from_slice(&self.value.0.to_le_bytes());
        buf.extend_from_slice(&self.line.to_le_bytes());
        Ok(buf)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() == Self::SIZE,
            "invalid-param: bad symbol record length"
        );
        let name = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let kind = bytes[4];
        let scope_depth = u16::from_le_bytes(bytes[5..7].try_into().unwrap());
        let parent = u32::from_le_bytes(bytes[7..11].try_into().unwrap());
        let child = u32::from_le_bytes(bytes[11..15].try_into().unwrap());
        let sibling = u32::from_le_bytes(bytes[15..19].try_into().unwrap());
        let next = u32::from_le_bytes(bytes[19..23].try_into().unwrap());
        let prev = u32::from_le_bytes(bytes[23..27].try_into().unwrap());
        let value = u32::from_le_bytes(bytes[27..31].try_into().unwrap());
        let line = u32::from_le_bytes(bytes[31..35].try_into().unwrap());
        Ok(SymbolEntry {
            name: StringOffset(name),
            kind: SymbolKind::try_from_primitive(kind).context("invalid: unknown symbol kind")?,
            scope_depth,
            parent: Index(parent),
            child: Index(child),
            sibling: Index(sibling),
            next: Index(next),
            prev: Index(prev),
            value: StringOffset(value),
            line,
        })
    }
}

pub type SymbolStore = crate::store::FileStore<SymbolEntry>;

/// The scoped symbol table (C5): `add`/`lookup_by_name_in_scope`/`iter`
/// over entries held in [`crate::hbuf::HashedLruBuffer`]. Index 1 is
/// always the file-scope pseudo-entry, created by [`SymbolTable::init`].
pub struct SymbolTable {
    root: Index,
    tail: Index,
}

impl SymbolTable {
    /// Creates the file-scope pseudo-entry and returns a table rooted at
    /// it. Must be called exactly once per fresh symbol store.
    pub fn init(hbuf: &mut crate::hbuf::HashedLruBuffer) -> Result<Self> {
        let root = hbuf.new_symbol()?;
        let mut entry = SymbolEntry::free();
        entry.kind = SymbolKind::Unknown;
        entry.scope_depth = 0;
        hbuf.write_symbol(root, entry)?;
        Ok(SymbolTable { root, tail: root })
    }

    /// Reopens a table whose root is already known (e.g. the driver
    /// persisted it alongside the store path).
    pub fn reopen(root: Index, tail: Index) -> Self {
        SymbolTable { root, tail }
    }

    pub fn root(&self) -> Index {
        self.root
    }

    /// Adds `entry` as a child of `parent` and appends it to the flat
    /// insertion-order list.
    pub fn add(&mut self, hbuf: &mut crate::hbuf::HashedLruBuffer, parent: Index, mut entry: SymbolEntry) -> Result<Index> {
        ensure!(!parent.is_none(), "invalid-param: symbol parent must not be 0");
        let mut parent_entry = hbuf.read_symbol(parent)?;
        entry.parent = parent;
        entry.sibling = parent_entry.child;
        entry.prev = self.tail;

        let index = hbuf.new_symbol()?;
        hbuf.write_symbol(index, entry)?;

        parent_entry.child = index;
        hbuf.write_symbol(parent, parent_entry)?;

        if !self.tail.is_none() {
            let mut tail_entry = hbuf.read_symbol(self.tail)?;
            tail_entry.next = index;
            hbuf.write_symbol(self.tail, tail_entry)?;
        }
        self.tail = index;
        Ok(index)
    }

    /// Looks up `name` among the direct children of `scope` (no parent
    /// walk — the parser is responsible for scope-chain semantics).
    pub fn lookup_by_name_in_scope(
        &self,
        hbuf: &mut crate::hbuf::HashedLruBuffer,
        name: StringOffset,
        scope: Index,
    ) -> Result<Index> {
        if scope.is_none() {
            return Ok(Index::NONE);
        }
        let scope_entry = hbuf.read_symbol(scope)?;
        let mut cur = scope_entry.child;
        let mut steps = 0u32;
        while !cur.is_none() {
            steps += 1;
            ensure!(steps <= 1000, "internal: symbol sibling chain exceeds 1000 entries");
            let entry = hbuf.read_symbol(cur)?;
            if entry.name == name {
                return Ok(cur);
            }
            ensure!(entry.sibling != cur, "internal: self-referential symbol sibling chain at {cur:?}");
            cur = entry.sibling;
        }
        Ok(Index::NONE)
    }

    /// Iterates every entry in insertion order (flat `next` list, skipping
    /// the root pseudo-entry).
    pub fn iter(&self, hbuf: &mut crate::hbuf::HashedLruBuffer) -> Result<Vec<Index>> {
        let mut out = Vec::new();
        let root_entry = hbuf.read_symbol(self.root)?;
        let mut cur = root_entry.next;
        let mut steps = 0u32;
        while !cur.is_none() {
            steps += 1;
            ensure!(steps <= 1000, "internal: symbol list exceeds 1000 entries");
            out.push(cur);
            let entry = hbuf.read_symbol(cur)?;
            ensure!(entry.next != cur, "internal: self-referential symbol next-link at {cur:?}");
            cur = entry.next;
        }
        Ok(out)
    }

    pub fn count(&self, hbuf: &crate::hbuf::HashedLruBuffer) -> u32 {
        // one store record is the root pseudo-entry
        hbuf.symbol_count().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_entry_round_trips() {
        let e = SymbolEntry {
            name: StringOffset(12),
            kind: SymbolKind::Variable,
            scope_depth: 2,
            parent: Index(1),
            child: Index::NONE,
            sibling: Index(4),
            next: Index(5),
            prev: Index(3),
            value: StringOffset::NONE,
            line: 42,
        };
        let bytes = e.to_bytes().unwrap();
        assert_eq!(bytes.len(), SymbolEntry::SIZE);
        assert_eq!(SymbolEntry::from_bytes(&bytes).unwrap(), e);
    }

    fn new_hbuf() -> crate::hbuf::HashedLruBuffer {
        let dir = tempfile::tempdir().unwrap();
        let ast: crate::ast::AstStore = crate::store::FileStore::init(dir.path().join("ast.bin")).unwrap();
        let sym: SymbolStore = SymbolStore::init(dir.path().join("sym.bin")).unwrap();
        std::mem::forget(dir);
        crate::hbuf::HashedLruBuffer::new(ast, sym)
    }

    #[test]
    fn add_and_lookup_in_scope() {
        let mut hbuf = new_hbuf();
        let mut table = SymbolTable::init(&mut hbuf).unwrap();
        let root = table.root();

        let name = StringOffset(10);
        let entry = SymbolEntry {
            name,
            kind: SymbolKind::Variable,
            scope_depth: 1,
            ..SymbolEntry::free()
        };
        let idx = table.add(&mut hbuf, root, entry).unwrap();

        let found = table.lookup_by_name_in_scope(&mut hbuf, name, root).unwrap();
        assert_eq!(found, idx);

        let missing = table
            .lookup_by_name_in_scope(&mut hbuf, StringOffset(999), root)
            .unwrap();
        assert_eq!(missing, Index::NONE);
    }

    #[test]
    fn iter_returns_insertion_order() {
        let mut hbuf = new_hbuf();
        let mut table = SymbolTable::init(&mut hbuf).unwrap();
        let root = table.root();

        let a = table
            .add(&mut hbuf, root, SymbolEntry { name: StringOffset(1), kind: SymbolKind::Variable, ..SymbolEntry::free() })
            .unwrap();
        let b = table
            .add(&mut hbuf, root, SymbolEntry { name: StringOffset(2), kind: SymbolKind::Variable, ..SymbolEntry::free() })
            .unwrap();

        assert_eq!(table.iter(&mut hbuf).unwrap(), vec![a, b]);
        assert_eq!(table.count(&hbuf), 2);
    }
}
