//! Symbol resolution cache (spec §4.7.7): turns a `Var`/`Global` operand's
//! 16-bit id (the symbol table index, see [`crate::translate::Translator`])
//! back into a name for disassembly and tracing, without re-reading the
//! string pool on every lookup.
//!
//! The cache is a fixed 256-entry table indexed by `id % 256` rather than
//! an unbounded map: a long-running trace session touches a bounded
//! working set of names, and a slot simply gets overwritten on collision
//! instead of growing forever.

use anyhow::Result;

use crate::store::{Index, RecordStore};
use crate::strings::StringPool;
use crate::symtab::{SymbolKind, SymbolStore};

const CACHE_SLOTS: usize = 256;

pub struct SymbolResolver {
    symbol_store: SymbolStore,
    strings: StringPool,
    cache: Vec<Option<(u16, String)>>,
}

impl SymbolResolver {
    pub fn open(symtab_path: impl AsRef<std::path::Path>, sstore_path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(SymbolResolver {
            symbol_store: SymbolStore::open(symtab_path)?,
            strings: StringPool::open(sstore_path)?,
            cache: vec![None; CACHE_SLOTS],
        })
    }

    fn slot(id: u16) -> usize {
        id as usize % CACHE_SLOTS
    }

    /// Resolves a variable/global id to its declared name, caching the
    /// result. Returns `None` if the id has no name (e.g. a synthesized
    /// symbol) rather than erroring — callers fall back to `v{id}`.
    pub fn resolve(&mut self, id: u16) -> Result<Option<&str>> {
        let slot = Self::slot(id);
        let hit = matches!(&self.cache[slot], Some((cached_id, _)) if *cached_id == id);
        if !hit {
            let entry = self.symbol_store.get(Index(u32::from(id)))?;
            self.cache[slot] = if entry.name.is_none() {
                None
            } else {
                Some((id, self.strings.get_string(entry.name)?))
            };
        }
        Ok(self.cache[slot].as_ref().filter(|(cached_id, _)| *cached_id == id).map(|(_, name)| name.as_str()))
    }

    /// Looks up a function's translator-assigned label id by name. The
    /// label id isn't persisted anywhere — but
    /// [`crate::translate::Translator::prescan_functions`] assigns label
    /// ids to `SYM_FUNCTION` entries in the symbol table's flat insertion
    /// order (0, 1, 2, ...), so re-walking that same `next` chain and
    /// counting function entries reconstructs the same id deterministically.
    /// Used by [`super::Engine::set_entry_function`]; not cached, since
    /// entry-point resolution happens once per run, not per trace line.
    pub fn resolve_function_label(&mut self, name: &str) -> Result<Option<u16>> {
        let root = Index(1); // symbol store convention: index 1 is the file-scope root
        let root_entry = self.symbol_store.get(root)?;
        let mut cur = root_entry.next;
        let mut rank: u16 = 0;
        let mut steps = 0u32;
        while !cur.is_none() {
            steps += 1;
            anyhow::ensure!(steps <= 1000, "internal: symbol list exceeds 1000 entries");
            let entry = self.symbol_store.get(cur)?;
            if entry.kind == SymbolKind::Function {
                if self.strings.get_string(entry.name)? == name {
                    return Ok(Some(rank));
                }
                rank += 1;
            }
            anyhow::ensure!(entry.next != cur, "internal: self-referential symbol next-link at {cur:?}");
            cur = entry.next;
        }
        Ok(None)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_wraps_modulo_256() {
        assert_eq!(SymbolResolver::slot(0), SymbolResolver::slot(256));
        assert_eq!(SymbolResolver::slot(1), SymbolResolver::slot(257));
        assert_ne!(SymbolResolver::slot(1), SymbolResolver::slot(2));
    }
}
