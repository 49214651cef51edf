//! `VRegAllocator` — the fixed-pool + unbounded-storage flat allocator
//! (spec.md §4.5, C7).
//!
//! Grounded in `cranelift-bitset::CompoundBitSet` (already a workspace
//! dependency per `Cargo.toml`) for the fixed register bitmap, and in
//! `examples/original_source/source/codegen/opt-common/virtual_register_allocator.c`
//! for the "storage pool never runs out, it doubles instead" growth
//! discipline spec.md §4.5 and SPEC_FULL.md §1 describe.

use cranelift_bitset::CompoundBitSet;

use crate::error::{Error, Result};

/// `0..R-1` name physical registers; `R..` name spill/storage slots
/// (spec.md §4.5).
pub type VRegAllocatorId = u32;

/// A caller-supplied predicate restricting which register indices
/// `allocate_register` may return (spec.md §4.5 `try_allocate`/
/// `allocate_register(filter)`).
pub type RegisterFilter<'a> = &'a dyn Fn(u32) -> bool;

/// A fixed register pool of size `R` backed by a bitmap, plus an unbounded
/// storage pool grown by doubling (spec.md §4.5).
pub struct VRegAllocator {
    num_registers: u32,
    allocated: CompoundBitSet,
    storage_capacity: u32,
}

impl VRegAllocator {
    pub fn new(num_registers: u32) -> Self {
        Self {
            num_registers,
            allocated: CompoundBitSet::new(),
            storage_capacity: num_registers.max(1),
        }
    }

    pub fn num_registers(&self) -> u32 {
        self.num_registers
    }

    fn is_register(&self, id: VRegAllocatorId) -> bool {
        id < self.num_registers
    }

    pub fn is_available(&self, id: VRegAllocatorId) -> bool {
        !self.allocated.contains(id as usize)
    }

    /// Atomic test-and-set (spec.md §4.5): allocates `id` iff it was free.
    pub fn try_allocate(&mut self, id: VRegAllocatorId) -> bool {
        if self.allocated.contains(id as usize) {
            return false;
        }
        self.ensure_storage_capacity(id);
        self.allocated.insert(id as usize);
        true
    }

    fn ensure_storage_capacity(&mut self, id: VRegAllocatorId) {
        if id >= self.num_registers && id >= self.storage_capacity {
            let mut capacity = self.storage_capacity.max(1);
            while capacity <= id {
                capacity = capacity.saturating_mul(2);
            }
            self.storage_capacity = capacity;
        }
    }

    /// Linear search for a free register whose index passes `filter`
    /// (spec.md §4.5); `out-of-space` if none exists.
    pub fn allocate_register(&mut self, filter: RegisterFilter<'_>) -> Result<VRegAllocatorId> {
        for id in 0..self.num_registers {
            if self.is_available(id) && filter(id) {
                self.allocated.insert(id as usize);
                return Ok(id);
            }
        }
        Err(Error::OutOfSpace("no free physical register matches the filter".into()))
    }

    /// Allocates out of the unbounded storage pool, which never runs out —
    /// it doubles its capacity instead of failing (spec.md §4.5,
    /// SPEC_FULL.md §1).
    pub fn allocate_storage(&mut self) -> VRegAllocatorId {
        let mut id = self.num_registers;
        loop {
            self.ensure_storage_capacity(id);
            if self.is_available(id) {
                self.allocated.insert(id as usize);
                return id;
            }
            id += 1;
        }
    }

    /// Register first, then storage (spec.md §4.5).
    pub fn allocate_any(&mut self, filter: RegisterFilter<'_>) -> VRegAllocatorId {
        match self.allocate_register(filter) {
            Ok(id) => id,
            Err(_) => self.allocate_storage(),
        }
    }

    pub fn deallocate(&mut self, id: VRegAllocatorId) {
        self.allocated.remove(id as usize);
    }

    pub fn is_register_id(&self, id: VRegAllocatorId) -> bool {
        self.is_register(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_filter(_: u32) -> bool {
        true
    }

    #[test]
    fn allocate_deallocate_reallocate_same_id() {
        let mut alloc = VRegAllocator::new(4);
        let id = alloc.allocate_register(&no_filter).unwrap();
        alloc.deallocate(id);
        let id2 = alloc.allocate_register(&no_filter).unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn try_allocate_on_taken_id_is_noop() {
        let mut alloc = VRegAllocator::new(2);
        assert!(alloc.try_allocate(0));
        assert!(!alloc.try_allocate(0));
        assert!(alloc.try_allocate(1));
    }

    #[test]
    fn out_of_space_falls_back_to_storage() {
        let mut alloc = VRegAllocator::new(1);
        let r0 = alloc.allocate_register(&no_filter).unwrap();
        assert_eq!(r0, 0);
        assert!(alloc.allocate_register(&no_filter).is_err());
        let storage = alloc.allocate_any(&no_filter);
        assert_eq!(storage, 1);
    }

    #[test]
    fn storage_pool_never_exhausts() {
        let mut alloc = VRegAllocator::new(1);
        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(alloc.allocate_storage());
        }
        let unique: std::collections::HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn filter_restricts_candidates() {
        let mut alloc = VRegAllocator::new(4);
        let even_only = |id: u32| id % 2 == 0;
        let id = alloc.allocate_register(&even_only).unwrap();
        assert_eq!(id % 2, 0);
    }
}
