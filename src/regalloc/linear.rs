//! `LinearRegAllocator` — the constraint-driven linear allocator that
//! consumes scheduler output and propagates register/alias hints across
//! conflict edges (spec.md §4.5, C7).
//!
//! Grounded in
//! `examples/original_source/source/codegen/opt-common/linear_register_allocator.c`
//! for the exact two-pass structure (SPEC_FULL.md §1): a reverse-linear
//! hint-propagation pass, then a forward allocation pass that eagerly
//! deallocates expired ranges before considering the current instruction,
//! building its conflict-hint set only from instructions still overlapping
//! it (not the whole function) to stay `O(n · R)`.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ir::entities::InstrId;
use crate::schedule::Schedule;

use super::flat::{VRegAllocator, VRegAllocatorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Skip,
    GeneralPurpose,
    FloatingPoint,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Constraint {
    pub kind: Option<ConstraintKind>,
    pub register_hint: Option<u32>,
    pub alias_hint: Option<InstrId>,
}

impl Constraint {
    pub fn skip() -> Self {
        Constraint { kind: Some(ConstraintKind::Skip), register_hint: None, alias_hint: None }
    }

    pub fn general_purpose() -> Self {
        Constraint { kind: Some(ConstraintKind::GeneralPurpose), register_hint: None, alias_hint: None }
    }

    pub fn floating_point() -> Self {
        Constraint { kind: Some(ConstraintKind::FloatingPoint), register_hint: None, alias_hint: None }
    }

    pub fn with_register_hint(mut self, hint: u32) -> Self {
        self.register_hint = Some(hint);
        self
    }

    pub fn with_alias_hint(mut self, alias: InstrId) -> Self {
        self.alias_hint = Some(alias);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Allocation {
    pub kind: ConstraintKind,
    pub id: VRegAllocatorId,
}

struct InstrState {
    done: bool,
    allocation: Option<Allocation>,
    constraint: Constraint,
}

/// Operates on a scheduled IR, per spec.md §4.5. Owns one flat
/// [`VRegAllocator`] per register-kind pool (general-purpose,
/// floating-point), since each has its own fixed register count.
pub struct LinearRegAllocator {
    gp_pool: VRegAllocator,
    fp_pool: VRegAllocator,
    states: HashMap<InstrId, InstrState>,
}

impl LinearRegAllocator {
    pub fn new(num_gp_registers: u32, num_fp_registers: u32) -> Self {
        Self {
            gp_pool: VRegAllocator::new(num_gp_registers),
            fp_pool: VRegAllocator::new(num_fp_registers),
            states: HashMap::new(),
        }
    }

    pub fn set_constraint(&mut self, instr: InstrId, constraint: Constraint) {
        self.states.insert(
            instr,
            InstrState { done: false, allocation: None, constraint },
        );
    }

    fn pool_for(&mut self, kind: ConstraintKind) -> &mut VRegAllocator {
        match kind {
            ConstraintKind::GeneralPurpose | ConstraintKind::Skip => &mut self.gp_pool,
            ConstraintKind::FloatingPoint => &mut self.fp_pool,
        }
    }

    /// Runs both passes over `schedule`'s linear instruction order.
    pub fn run(&mut self, schedule: &Schedule) -> Result<()> {
        self.propagate_hints(schedule);
        self.allocate(schedule)
    }

    /// Pass 1 (spec.md §4.5): walk instructions in reverse linear order;
    /// whenever an instruction has both a register hint and an alias hint
    /// pointing to an earlier instruction with no register hint, the alias
    /// inherits the register hint.
    fn propagate_hints(&mut self, schedule: &Schedule) {
        let order = schedule.iter_linear();
        for &instr in order.iter().rev() {
            let Some(state) = self.states.get(&instr) else { continue };
            let (register_hint, alias_hint) = (state.constraint.register_hint, state.constraint.alias_hint);
            let (Some(hint), Some(alias)) = (register_hint, alias_hint) else { continue };
            if let Some(alias_state) = self.states.get_mut(&alias) {
                if alias_state.constraint.register_hint.is_none() {
                    alias_state.constraint.register_hint = Some(hint);
                }
            }
        }
    }

    /// Pass 2 (spec.md §4.5): walk in linear order, eagerly deallocating
    /// expired ranges, then attempting in order (a) direct hint, (b) alias's
    /// resolved allocation, (c) `allocate_register` filtered against the
    /// conflict-hint set, falling back to `allocate_any` on `out-of-space`.
    fn allocate(&mut self, schedule: &Schedule) -> Result<()> {
        let order = schedule.iter_linear();

        for &instr in &order {
            if !self.states.contains_key(&instr) {
                continue;
            }
            let Some(this_range) = schedule.liveness_range(instr) else { continue };
            let this_index = this_range.begin;

            // Deallocate every alive instruction whose liveness range has
            // ended at the current linear index.
            let expired: Vec<InstrId> = self
                .states
                .iter()
                .filter(|(id, s)| {
                    s.allocation.is_some()
                        && schedule
                            .liveness_range(**id)
                            .map(|r| r.end == this_index)
                            .unwrap_or(false)
                })
                .map(|(id, _)| *id)
                .collect();
            for expired_instr in expired {
                if let Some(alloc) = self.states.get(&expired_instr).and_then(|s| s.allocation) {
                    self.pool_for(alloc.kind).deallocate(alloc.id);
                }
            }

            let kind = match self.states[&instr].constraint.kind {
                Some(ConstraintKind::Skip) | None => {
                    self.states.get_mut(&instr).unwrap().done = true;
                    continue;
                }
                Some(k) => k,
            };

            let conflict_hints = self.conflict_hint_set(schedule, instr, this_range, kind);

            let register_hint = self.states[&instr].constraint.register_hint;
            let alias_hint = self.states[&instr].constraint.alias_hint;

            let mut chosen: Option<VRegAllocatorId> = None;

            // (a) direct register hint, if still free and not conflicted.
            if let Some(hint) = register_hint {
                if !conflict_hints.contains(&hint) && self.pool_for(kind).try_allocate(hint) {
                    chosen = Some(hint);
                }
            }

            // (b) the resolved allocation of its alias hint.
            if chosen.is_none() {
                if let Some(alias) = alias_hint {
                    if let Some(alias_alloc) = self.states.get(&alias).and_then(|s| s.allocation) {
                        if alias_alloc.kind == kind
                            && !conflict_hints.contains(&alias_alloc.id)
                            && self.pool_for(kind).try_allocate(alias_alloc.id)
                        {
                            chosen = Some(alias_alloc.id);
                        }
                    }
                }
            }

            // (c) allocate_register(filter = ¬conflict-hint), falling back
            // to allocate_any on out-of-space.
            if chosen.is_none() {
                let filter = |id: u32| !conflict_hints.contains(&id);
                let pool = self.pool_for(kind);
                chosen = Some(match pool.allocate_register(&filter) {
                    Ok(id) => id,
                    Err(Error::OutOfSpace(_)) => pool.allocate_any(&filter),
                    Err(e) => return Err(e),
                });
            }

            let state = self.states.get_mut(&instr).unwrap();
            state.allocation = Some(Allocation { kind, id: chosen.unwrap() });
            state.done = true;
        }

        Ok(())
    }

    /// The set of hint registers held by later conflicting instructions of
    /// the same constraint kind (plus resolved allocations of aliases),
    /// built only from instructions whose range still overlaps `this_range`
    /// (spec.md §4.5; SPEC_FULL.md §1 on keeping this sub-quadratic).
    fn conflict_hint_set(
        &self,
        schedule: &Schedule,
        instr: InstrId,
        this_range: crate::schedule::LivenessRange,
        kind: ConstraintKind,
    ) -> std::collections::HashSet<u32> {
        let mut hints = std::collections::HashSet::new();
        for (&other, state) in &self.states {
            if other == instr {
                continue;
            }
            if state.constraint.kind != Some(kind) {
                continue;
            }
            let Some(other_range) = schedule.liveness_range(other) else { continue };
            if !this_range.overlaps(&other_range) {
                continue;
            }
            if let Some(alloc) = state.allocation {
                hints.insert(alloc.id);
            }
            if let Some(hint) = state.constraint.register_hint {
                hints.insert(hint);
            }
        }
        hints
    }

    pub fn allocation_of(&self, instr: InstrId) -> Option<Allocation> {
        self.states.get(&instr).and_then(|s| s.allocation)
    }

    pub fn is_done(&self, instr: InstrId) -> bool {
        self.states.get(&instr).map(|s| s.done).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::structure::CodeStructure;
    use crate::ir::code::CodeContainer;
    use crate::ir::operand::{Immediate, Operand};
    use crate::ir::opcode::Opcode;

    /// S3 — hint propagation + allocation (spec.md §8): five general-purpose
    /// instructions; I5 has register_hint=R7, alias_hint=I3; after pass 1
    /// I3 inherits the hint; with R={R0..R7} both end up in R7 since their
    /// ranges don't overlap.
    #[test]
    fn hint_propagation_and_non_overlapping_share_register() {
        let mut code = CodeContainer::new();
        let entry = code.new_block();
        let mut instrs = Vec::new();
        for i in 0..5 {
            instrs.push(
                code.append_instr(entry, Opcode::IntConst, Operand::Immediate(Immediate::Int(i)))
                    .unwrap(),
            );
        }
        code.append_instr(entry, Opcode::Return, Operand::Refs(smallvec::smallvec![instrs[4]]))
            .unwrap();

        let structure = CodeStructure::build(&code, entry).unwrap();
        let schedule = Schedule::build(&code, &structure).unwrap();

        let mut allocator = LinearRegAllocator::new(8, 8);
        for (i, &instr) in instrs.iter().enumerate() {
            let mut c = Constraint::general_purpose();
            if i == 4 {
                c = c.with_register_hint(7).with_alias_hint(instrs[2]);
            }
            allocator.set_constraint(instr, c);
        }

        allocator.run(&schedule).unwrap();

        let i3_alloc = allocator.allocation_of(instrs[2]).unwrap();
        let i5_alloc = allocator.allocation_of(instrs[4]).unwrap();
        assert_eq!(i3_alloc.id, 7);
        assert_eq!(i5_alloc.id, 7);
    }

    #[test]
    fn overlapping_ranges_never_share_a_register() {
        let mut code = CodeContainer::new();
        let entry = code.new_block();
        let a = code.append_instr(entry, Opcode::IntConst, Operand::Immediate(Immediate::Int(1))).unwrap();
        let b = code.append_instr(entry, Opcode::IntConst, Operand::Immediate(Immediate::Int(2))).unwrap();
        code.append_instr(entry, Opcode::Return, Operand::Refs(smallvec::smallvec![a, b])).unwrap();

        let structure = CodeStructure::build(&code, entry).unwrap();
        let schedule = Schedule::build(&code, &structure).unwrap();

        let mut allocator = LinearRegAllocator::new(1, 1);
        allocator.set_constraint(a, Constraint::general_purpose());
        allocator.set_constraint(b, Constraint::general_purpose());
        allocator.run(&schedule).unwrap();

        let alloc_a = allocator.allocation_of(a).unwrap();
        let alloc_b = allocator.allocation_of(b).unwrap();
        // Only one physical register exists; overlapping ranges must land
        // in different allocator "slots" even if one spills to storage.
        assert_ne!(alloc_a.id, alloc_b.id);
    }
}
