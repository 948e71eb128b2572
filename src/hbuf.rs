//! Hashed LRU buffer (C2): one in-memory cache of N slots, shared by AST
//! and symbol-table entries, backed by their respective file stores.
//!
//! The design note in spec §9 calls for "an owned cache object... a
//! cache handle threaded through the pipeline" rather than a process-wide
//! singleton — `HashedLruBuffer` owns both backing stores and is passed
//! by `&mut` to the builder, symbol table, and translator.

use anyhow::{ensure, Result};
use log::debug;

use crate::ast::{AstNode, AstStore};
use crate::store::{Index, RecordStore};
use crate::symtab::{SymbolEntry, SymbolStore};

const DEFAULT_CAPACITY: usize = 100;
const HASH_BUCKETS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Ast,
    Symbol,
}

#[derive(Debug, Clone, Copy)]
enum CachePayload {
    Ast(AstNode),
    Symbol(SymbolEntry),
}

struct Occupied {
    kind: CacheKind,
    stable_index: Index,
    dirty: bool,
    payload: CachePayload,
    hash_next: Option<usize>,
    lru_prev: Option<usize>,
    lru_next: Option<usize>,
}

enum Slot {
    Free,
    Occupied(Occupied),
}

pub struct HashedLruBuffer {
    capacity: usize,
    buckets: Vec<Option<usize>>,
    slots: Vec<Slot>,
    free_slots: Vec<usize>,
    lru_head: Option<usize>,
    lru_tail: Option<usize>,
    ast_store: AstStore,
    symbol_store: SymbolStore,
}

impl HashedLruBuffer {
    pub fn new(ast_store: AstStore, symbol_store: SymbolStore) -> Self {
        Self::with_capacity(ast_store, symbol_store, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ast_store: AstStore, symbol_store: SymbolStore, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Slot::Free);
        }
        Self {
            capacity,
            buckets: vec![None; HASH_BUCKETS],
            slots,
            free_slots: (0..capacity).rev().collect(),
            lru_head: None,
            lru_tail: None,
            ast_store,
            symbol_store,
        }
    }

    fn bucket_of(stable_index: Index) -> usize {
        stable_index.0 as usize % HASH_BUCKETS
    }

    fn hash_lookup(&self, kind: CacheKind, stable_index: Index) -> Option<usize> {
        let mut cur = self.buckets[Self::bucket_of(stable_index)];
        while let Some(slot_id) = cur {
            match &self.slots[slot_id] {
                Slot::Occupied(o) if o.kind == kind && o.stable_index == stable_index => {
                    return Some(slot_id)
                }
                Slot::Occupied(o) => cur = o.hash_next,
                Slot::Free => unreachable!("hash chain points at a free slot"),
            }
        }
        None
    }

    fn bucket_insert(&mut self, slot_id: usize, stable_index: Index) {
        let bucket = Self::bucket_of(stable_index);
        let head = self.buckets[bucket];
        if let Slot::Occupied(o) = &mut self.slots[slot_id] {
            o.hash_next = head;
        }
        self.buckets[bucket] = Some(slot_id);
    }

    fn bucket_remove(&mut self, slot_id: usize, stable_index: Index) {
        let bucket = Self::bucket_of(stable_index);
        let mut cur = self.buckets[bucket];
        let mut prev: Option<usize> = None;
        while let Some(id) = cur {
            let next = match &self.slots[id] {
                Slot::Occupied(o) => o.hash_next,
                Slot::Free => None,
            };
            if id == slot_id {
                match prev {
                    Some(p) => {
                        if let Slot::Occupied(o) = &mut self.slots[p] {
                            o.hash_next = next;
                        }
                    }
                    None => self.buckets[bucket] = next,
                }
                return;
            }
            prev = Some(id);
            cur = next;
        }
    }

    fn lru_unlink(&mut self, slot_id: usize) {
        let (prev, next) = match &self.slots[slot_id] {
            Slot::Occupied(o) => (o.lru_prev, o.lru_next),
            Slot::Free => return,
        };
        match prev {
            Some(p) => {
                if let Slot::Occupied(o) = &mut self.slots[p] {
                    o.lru_next = next;
                }
            }
            None => self.lru_head = next,
        }
        match next {
            Some(n) => {
                if let Slot::Occupied(o) = &mut self.slots[n] {
                    o.lru_prev = prev;
                }
            }
            None => self.lru_tail = prev,
        }
    }

    fn lru_push_head(&mut self, slot_id: usize) {
        let old_head = self.lru_head;
        if let Slot::Occupied(o) = &mut self.slots[slot_id] {
            o.lru_prev = None;
            o.lru_next = old_head;
        }
        if let Some(h) = old_head {
            if let Slot::Occupied(o) = &mut self.slots[h] {
                o.lru_prev = Some(slot_id);
            }
        }
        self.lru_head = Some(slot_id);
        if self.lru_tail.is_none() {
            self.lru_tail = Some(slot_id);
        }
    }

    fn touch(&mut self, slot_id: usize) {
        self.lru_unlink(slot_id);
        self.lru_push_head(slot_id);
    }

    /// Writes the slot back to its store if dirty, clearing the bit.
    fn writeback(&mut self, slot_id: usize) -> Result<()> {
        let Slot::Occupied(o) = &self.slots[slot_id] else {
            return Ok(());
        };
        if !o.dirty {
            return Ok(());
        }
        match (o.kind, o.payload) {
            (CacheKind::Ast, CachePayload::Ast(node)) => {
                self.ast_store.update(o.stable_index, &node)?;
            }
            (CacheKind::Symbol, CachePayload::Symbol(entry)) => {
                self.symbol_store.update(o.stable_index, &entry)?;
            }
            _ => unreachable!("slot kind/payload mismatch"),
        }
        if let Slot::Occupied(o) = &mut self.slots[slot_id] {
            o.dirty = false;
        }
        Ok(())
    }

    /// Evicts a slot (the LRU tail, writing it back if dirty) or takes a
    /// free one, and returns its id ready to be (re)occupied.
    fn allocate_slot(&mut self) -> Result<usize> {
        if let Some(id) = self.free_slots.pop() {
            return Ok(id);
        }
        let victim = self
            .lru_tail
            .expect("capacity > 0 implies a tail once all slots are occupied");
        self.writeback(victim)?;
        let stable_index = match &self.slots[victim] {
            Slot::Occupied(o) => o.stable_index,
            Slot::Free => unreachable!(),
        };
        self.bucket_remove(victim, stable_index);
        self.lru_unlink(victim);
        debug!("hbuf evicting slot {victim} (stable_index={})", stable_index.0);
        Ok(victim)
    }

    fn occupy(&mut self, slot_id: usize, kind: CacheKind, stable_index: Index, payload: CachePayload) {
        self.slots[slot_id] = Slot::Occupied(Occupied {
            kind,
            stable_index,
            dirty: false,
            payload,
            hash_next: None,
            lru_prev: None,
            lru_next: None,
        });
        self.bucket_insert(slot_id, stable_index);
        self.lru_push_head(slot_id);
    }

    fn load_into_slot(&mut self, kind: CacheKind, stable_index: Index) -> Result<usize> {
        let slot_id = self.allocate_slot()?;
        let payload = match kind {
            CacheKind::Ast => CachePayload::Ast(self.ast_store.get(stable_index)?),
            CacheKind::Symbol => CachePayload::Symbol(self.symbol_store.get(stable_index)?),
        };
        self.occupy(slot_id, kind, stable_index, payload);
        Ok(slot_id)
    }

    fn get_or_load(&mut self, kind: CacheKind, stable_index: Index) -> Result<usize> {
        if let Some(slot_id) = self.hash_lookup(kind, stable_index) {
            self.touch(slot_id);
            return Ok(slot_id);
        }
        let slot_id = self.load_into_slot(kind, stable_index)?;
        Ok(slot_id)
    }

    // ---- AST-facing API ----

    pub fn new_ast(&mut self) -> Result<Index> {
        let index = self.ast_store.append(&AstNode::free())?;
        let slot_id = self.allocate_slot()?;
        self.occupy(slot_id, CacheKind::Ast, index, CachePayload::Ast(AstNode::free()));
        if let Slot::Occupied(o) = &mut self.slots[slot_id] {
            o.dirty = true;
        }
        Ok(index)
    }

    pub fn read_ast(&mut self, index: Index) -> Result<AstNode> {
        let slot_id = self.get_or_load(CacheKind::Ast, index)?;
        match &self.slots[slot_id] {
            Slot::Occupied(Occupied { payload: CachePayload::Ast(node), .. }) => Ok(*node),
            _ => unreachable!(),
        }
    }

    pub fn write_ast(&mut self, index: Index, node: AstNode) -> Result<()> {
        let slot_id = self.get_or_load(CacheKind::Ast, index)?;
        if let Slot::Occupied(o) = &mut self.slots[slot_id] {
            o.payload = CachePayload::Ast(node);
            o.dirty = true;
        }
        self.touch(slot_id);
        Ok(())
    }

    // ---- Symbol-facing API ----

    pub fn new_symbol(&mut self) -> Result<Index> {
        let index = self.symbol_store.append(&SymbolEntry::free())?;
        let slot_id = self.allocate_slot()?;
        self.occupy(
            slot_id,
            CacheKind::Symbol,
            index,
            CachePayload::Symbol(SymbolEntry::free()),
        );
        if let Slot::Occupied(o) = &mut self.slots[slot_id] {
            o.dirty = true;
        }
        Ok(index)
    }

    pub fn read_symbol(&mut self, index: Index) -> Result<SymbolEntry> {
        let slot_id = self.get_or_load(CacheKind::Symbol, index)?;
        match &self.slots[slot_id] {
            Slot::Occupied(Occupied { payload: CachePayload::Symbol(entry), .. }) => Ok(*entry),
            _ => unreachable!(),
        }
    }

    pub fn write_symbol(&mut self, index: Index, entry: SymbolEntry) -> Result<()> {
        let slot_id = self.get_or_load(CacheKind::Symbol, index)?;
        if let Slot::Occupied(o) = &mut self.slots[slot_id] {
            o.payload = CachePayload::Symbol(entry);
            o.dirty = true;
        }
        self.touch(slot_id);
        Ok(())
    }

    pub fn ast_count(&self) -> u32 {
        self.ast_store.count()
    }

    pub fn symbol_count(&self) -> u32 {
        self.symbol_store.count()
    }

    /// Persists every dirty slot. Invoked at close and between passes.
    pub fn flush(&mut self) -> Result<()> {
        let occupied: Vec<usize> = (0..self.capacity)
            .filter(|&i| matches!(self.slots[i], Slot::Occupied(_)))
            .collect();
        for slot_id in occupied {
            self.writeback(slot_id)?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.ast_store.close()?;
        self.symbol_store.close()?;
        Ok(())
    }

    /// Test/debug helper: the stable index currently occupying the LRU
    /// tail, i.e. the next eviction victim.
    #[cfg(test)]
    fn lru_tail_index(&self) -> Option<Index> {
        self.lru_tail.map(|id| match &self.slots[id] {
            Slot::Occupied(o) => o.stable_index,
            Slot::Free => unreachable!(),
        })
    }
}
