//! The instruction scheduler (spec.md §4.4, C6): linearizes a function's
//! reachable instructions into a per-block order, assigning each a monotonic
//! `linear_index` and accumulating `liveness_range`s as it goes.
//!
//! Grounded in `cranelift-codegen/src/dominator_tree/simple.rs`'s
//! reverse-postorder block numbering for the default block order, and in
//! `examples/original_source/source/optimizer/schedule.c`'s stack-based
//! resumable scheduling loop (a `dependencies_pending` flag per stack
//! entry, matching the "push inputs before the current entry, then revisit"
//! discipline spec.md §4.4 describes).

use std::collections::HashMap;

use crate::analysis::structure::CodeStructure;
use crate::error::{Error, Result};
use crate::ir::code::CodeContainer;
use crate::ir::entities::{BlockId, InstrId};
use crate::ir::opcode::Opcode;

/// A monotonic non-negative integer assigned by the scheduler to each
/// reachable instruction; the time axis for liveness ranges (spec.md §3).
pub type LinearIndex = u64;

/// A half-open `[begin, end)` linear-index range during which an
/// instruction's value may be consumed (spec.md §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessRange {
    pub begin: LinearIndex,
    pub end: LinearIndex,
}

impl LivenessRange {
    fn at(index: LinearIndex) -> Self {
        LivenessRange { begin: index, end: index + 1 }
    }

    fn extend(&mut self, index: LinearIndex) {
        self.begin = self.begin.min(index);
        self.end = self.end.max(index + 1);
    }

    pub fn overlaps(&self, other: &LivenessRange) -> bool {
        self.begin < other.end && other.begin < self.end
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstrSchedule {
    pub linear_index: LinearIndex,
    pub liveness_range: LivenessRange,
}

#[derive(Debug, Clone, Default)]
pub struct BlockSchedule {
    pub linear_index: u32,
    pub instructions: Vec<InstrId>,
}

/// Chooses the order in which blocks are scheduled. Default: reverse
/// postorder from `entry_point`, then all `indirect_jump_target_blocks` in
/// id order (spec.md §4.4 step 1).
pub trait BlockScheduler {
    fn order(&self, structure: &CodeStructure) -> Vec<BlockId>;
}

#[derive(Default)]
pub struct DefaultBlockScheduler;

impl BlockScheduler for DefaultBlockScheduler {
    fn order(&self, structure: &CodeStructure) -> Vec<BlockId> {
        let mut order: Vec<BlockId> = structure.cfg_postorder().iter().rev().copied().collect();
        let mut seen: std::collections::HashSet<BlockId> = order.iter().copied().collect();
        let mut indirect: Vec<BlockId> = structure.indirect_jump_target_blocks().iter().copied().collect();
        indirect.sort_by_key(|b| b.index());
        for block in indirect {
            if seen.insert(block) {
                order.push(block);
            }
        }
        order
    }
}

/// Chooses how an instruction's unscheduled inputs are pushed onto the
/// scheduling stack. Default: push each input, in the container's
/// extraction order, as a new pending entry before the current one (spec.md
/// §4.4 step 3).
pub trait InstructionScheduler {
    fn inputs_of(&self, code: &CodeContainer, instr: InstrId) -> Result<Vec<InstrId>>;
}

#[derive(Default)]
pub struct DefaultInstructionScheduler;

impl InstructionScheduler for DefaultInstructionScheduler {
    fn inputs_of(&self, code: &CodeContainer, instr: InstrId) -> Result<Vec<InstrId>> {
        Ok(code.instruction_inputs(instr)?.into_iter().collect())
    }
}

/// Schedule owns the scheduler's output (spec.md §4.4): per-instruction
/// linear index + liveness range, per-block linear index + ordered
/// instruction list, and the reverse `linear_index -> block_id` map.
#[derive(Default)]
pub struct Schedule {
    instructions: HashMap<InstrId, InstrSchedule>,
    blocks: HashMap<BlockId, BlockSchedule>,
    blocks_by_index: Vec<BlockId>,
}

struct StackEntry {
    instr: InstrId,
    dependencies_pending: bool,
}

impl Schedule {
    pub fn build(code: &CodeContainer, structure: &CodeStructure) -> Result<Self> {
        Self::build_with(code, structure, &DefaultBlockScheduler, &DefaultInstructionScheduler)
    }

    /// Runs the scheduler with pluggable block- and instruction-ordering
    /// strategies (spec.md §4.4).
    pub fn build_with(
        code: &CodeContainer,
        structure: &CodeStructure,
        block_scheduler: &dyn BlockScheduler,
        instr_scheduler: &dyn InstructionScheduler,
    ) -> Result<Self> {
        let mut schedule = Schedule::default();
        let block_order = block_scheduler.order(structure);

        let mut linear_index: LinearIndex = 0;
        let mut scheduled: std::collections::HashSet<InstrId> = std::collections::HashSet::new();

        for (block_pos, &block_id) in block_order.iter().enumerate() {
            log::trace!("scheduling block {block_id:?} at position {block_pos}");
            schedule.blocks.insert(
                block_id,
                BlockSchedule {
                    linear_index: block_pos as u32,
                    instructions: Vec::new(),
                },
            );
            schedule.blocks_by_index.push(block_id);

            let roots = Self::roots_for(code, structure, block_id)?;
            let mut stack: Vec<StackEntry> = roots
                .into_iter()
                .rev()
                .map(|instr| StackEntry { instr, dependencies_pending: true })
                .collect();
            // `get_argument` instructions in the entry block are rooted
            // before any other instruction in that block (spec.md §4.4).
            stack.sort_by_key(|e| !Self::is_get_argument(code, e.instr));

            let mut guard = 0usize;
            let budget = code.instructions().count() * 4 + 16;

            while let Some(entry) = stack.pop() {
                guard += 1;
                if guard > budget {
                    return Err(Error::CyclicDependency(format!(
                        "scheduler made no progress scheduling block {block_id:?}"
                    )));
                }
                let instr_id = entry.instr;
                if scheduled.contains(&instr_id) {
                    continue;
                }
                let instr = code.instr(instr_id)?;
                if instr.block_id != block_id {
                    // Instructions from another block are ignored here; they
                    // are scheduled when their owning block runs (spec.md
                    // §4.4 step 4).
                    continue;
                }

                if entry.dependencies_pending {
                    let inputs = instr_scheduler.inputs_of(code, instr_id)?;
                    let pending: Vec<InstrId> = inputs
                        .into_iter()
                        .filter(|i| !i.is_none() && !scheduled.contains(i))
                        .filter(|i| code.instr(*i).map(|d| d.block_id == block_id).unwrap_or(false))
                        .collect();
                    if pending.is_empty() {
                        stack.push(StackEntry { instr: instr_id, dependencies_pending: false });
                    } else {
                        stack.push(StackEntry { instr: instr_id, dependencies_pending: false });
                        for input in pending {
                            stack.push(StackEntry { instr: input, dependencies_pending: true });
                        }
                    }
                    continue;
                }

                // Assign the next linear index; never reused (spec.md §3).
                let this_index = linear_index;
                linear_index += 1;
                scheduled.insert(instr_id);

                let inputs = instr_scheduler.inputs_of(code, instr_id)?;
                for input in &inputs {
                    if input.is_none() {
                        continue;
                    }
                    schedule
                        .instructions
                        .entry(*input)
                        .or_insert_with(|| InstrSchedule {
                            linear_index: this_index,
                            liveness_range: LivenessRange::at(this_index),
                        })
                        .liveness_range
                        .extend(this_index);
                }

                schedule.instructions.insert(
                    instr_id,
                    InstrSchedule {
                        linear_index: this_index,
                        liveness_range: LivenessRange::at(this_index),
                    },
                );
                schedule.blocks.get_mut(&block_id).unwrap().instructions.push(instr_id);
            }
        }

        // Every phi output live at a successor must have a link from the
        // current block, or the scheduler declares `missing-phi-link`
        // (spec.md §4.4).
        for &block_id in &block_order {
            for succ in structure.successors(block_id) {
                for &phi_id in &code.block(succ)?.phis {
                    let phi = code.phi(phi_id)?;
                    if schedule.instructions.contains_key(&phi.output_ref) && !phi.links.contains_key(&block_id) {
                        return Err(Error::MissingPhiLink(format!(
                            "phi {phi_id:?} at {succ:?} has no link for predecessor {block_id:?}"
                        )));
                    }
                }
            }
        }

        Ok(schedule)
    }

    fn is_get_argument(code: &CodeContainer, instr: InstrId) -> bool {
        code.instr(instr).map(|i| i.opcode == Opcode::GetArgument).unwrap_or(false)
    }

    /// Collects the scheduling roots for `block_id` (spec.md §4.4 step 2):
    /// every control-flow instruction head-to-tail, every phi-link source
    /// for each successor's live-at-entry phi, and (implicitly, via
    /// dependency-driven scheduling) every instruction live across the
    /// block boundary.
    fn roots_for(code: &CodeContainer, structure: &CodeStructure, block_id: BlockId) -> Result<Vec<InstrId>> {
        let mut roots = code.block_control_instructions(block_id)?;
        for succ in structure.successors(block_id) {
            for &phi_id in &code.block(succ)?.phis {
                let phi = code.phi(phi_id)?;
                if let Some(&incoming) = phi.links.get(&block_id) {
                    if !incoming.is_none() {
                        roots.push(incoming);
                    }
                }
            }
        }
        Ok(roots)
    }

    pub fn schedule_of(&self, instr: InstrId) -> Option<InstrSchedule> {
        self.instructions.get(&instr).copied()
    }

    pub fn schedule_of_block(&self, block: BlockId) -> Option<&BlockSchedule> {
        self.blocks.get(&block)
    }

    pub fn num_of_blocks(&self) -> usize {
        self.blocks_by_index.len()
    }

    pub fn block_by_index(&self, index: usize) -> Option<BlockId> {
        self.blocks_by_index.get(index).copied()
    }

    pub fn linear_index(&self, instr: InstrId) -> Option<LinearIndex> {
        self.instructions.get(&instr).map(|s| s.linear_index)
    }

    pub fn liveness_range(&self, instr: InstrId) -> Option<LivenessRange> {
        self.instructions.get(&instr).map(|s| s.liveness_range)
    }

    /// Every scheduled instruction in ascending linear-index order.
    pub fn iter_linear(&self) -> Vec<InstrId> {
        let mut v: Vec<(LinearIndex, InstrId)> = self.instructions.iter().map(|(&id, s)| (s.linear_index, id)).collect();
        v.sort_by_key(|(idx, _)| *idx);
        v.into_iter().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operand::{Branch, ConditionVariant, Immediate, Operand};
    use crate::ir::opcode::Opcode;

    /// S1 — DCE of unreachable block, scheduling side: only the reachable
    /// block is counted.
    #[test]
    fn unreachable_block_not_scheduled() {
        let mut code = CodeContainer::new();
        let entry = code.new_block();
        code.append_instr(entry, Opcode::Return, Operand::None).unwrap();
        let _unreachable = code.new_block();
        let structure = CodeStructure::build(&code, entry).unwrap();
        let schedule = Schedule::build(&code, &structure).unwrap();
        assert_eq!(schedule.num_of_blocks(), 1);
    }

    /// S2 — phi across a diamond: v1's liveness range ends one past the
    /// phi's linear index (spec.md §8).
    #[test]
    fn phi_liveness_matches_spec_example() {
        let mut code = CodeContainer::new();
        let entry = code.new_block();
        let left = code.new_block();
        let right = code.new_block();
        let join = code.new_block();

        code.append_instr(
            entry,
            Opcode::Branch,
            Operand::Branch(Branch {
                target_block: left,
                alt_block: Some(right),
                condition_ref: None,
                condition_variant: ConditionVariant::Direct,
                comparison: None,
            }),
        )
        .unwrap();
        let v1 = code.append_instr(left, Opcode::IntConst, Operand::Immediate(Immediate::Int(10))).unwrap();
        code.append_instr(
            left,
            Opcode::Jump,
            Operand::Branch(Branch {
                target_block: join,
                alt_block: None,
                condition_ref: None,
                condition_variant: ConditionVariant::Direct,
                comparison: None,
            }),
        )
        .unwrap();
        let v2 = code.append_instr(right, Opcode::IntConst, Operand::Immediate(Immediate::Int(20))).unwrap();
        code.append_instr(
            right,
            Opcode::Jump,
            Operand::Branch(Branch {
                target_block: join,
                alt_block: None,
                condition_ref: None,
                condition_variant: ConditionVariant::Direct,
                comparison: None,
            }),
        )
        .unwrap();
        let phi_id = code.new_phi(join).unwrap();
        let phi_out = code.append_instr(join, Opcode::Phi, Operand::Phi(phi_id)).unwrap();
        code.phi_set_output(phi_id, phi_out).unwrap();
        code.phi_attach(phi_id, left, v1).unwrap();
        code.phi_attach(phi_id, right, v2).unwrap();
        code.append_instr(join, Opcode::Return, Operand::Refs(smallvec::smallvec![phi_out])).unwrap();

        let structure = CodeStructure::build(&code, entry).unwrap();
        let schedule = Schedule::build(&code, &structure).unwrap();

        let phi_index = schedule.linear_index(phi_out).unwrap();
        assert_eq!(schedule.liveness_range(v1).unwrap().end, phi_index + 1);
        assert_eq!(schedule.liveness_range(v2).unwrap().end, phi_index + 1);
    }

    #[test]
    fn get_argument_scheduled_first_in_entry() {
        let mut code = CodeContainer::new();
        let entry = code.new_block();
        let a0 = code.append_instr(entry, Opcode::GetArgument, Operand::Immediate(Immediate::UInt(0))).unwrap();
        let a1 = code.append_instr(entry, Opcode::GetArgument, Operand::Immediate(Immediate::UInt(1))).unwrap();
        code.append_instr(entry, Opcode::Return, Operand::Refs(smallvec::smallvec![a0, a1])).unwrap();
        let structure = CodeStructure::build(&code, entry).unwrap();
        let schedule = Schedule::build(&code, &structure).unwrap();
        assert!(schedule.linear_index(a0).unwrap() < schedule.linear_index(a1).unwrap());
    }
}
