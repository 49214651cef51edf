//! `CodeContainer` — the optimizer IR container (spec.md §4.1, C3).

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::containers::DenseTable;
use crate::error::{Error, Result};

use super::block::Block;
use super::call::Call;
use super::entities::{BlockId, CallId, FunctionDeclarationId, InlineAsmId, InstrId, PhiId};
use super::inline_asm::InlineAsm;
use super::instr::Instruction;
use super::opcode::Opcode;
use super::operand::Operand;
use super::phi::Phi;

/// The externally-supplied liveness/reachability predicate `drop_dead`
/// consumes (spec.md §4.1: "consumes an index object providing
/// `is_block_alive`, `is_instruction_alive`, `is_block_predecessor`").
pub trait LivenessIndex {
    fn is_block_alive(&self, block: BlockId) -> bool;
    fn is_instruction_alive(&self, instr: InstrId) -> bool;
    fn is_block_predecessor(&self, block: BlockId, maybe_pred: BlockId) -> bool;
}

#[derive(Default)]
pub struct CodeContainer {
    blocks: DenseTable<BlockId, Block>,
    instructions: DenseTable<InstrId, Instruction>,
    phis: DenseTable<PhiId, Phi>,
    calls: DenseTable<CallId, Call>,
    inline_asm: DenseTable<InlineAsmId, InlineAsm>,

    /// Reverse-reference counts, keyed by the instruction being used. Lets
    /// `drop_instr` enforce "instruction-in-use" (spec.md §4.1) in O(1)
    /// without a full use-def scan.
    use_counts: HashMap<InstrId, u32>,
}

impl CodeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- accessors ---------------------------------------------------

    pub fn block(&self, id: BlockId) -> Result<&Block> {
        self.blocks.get(id).ok_or_else(|| Error::NotFound(format!("block {id:?}")))
    }

    pub fn instr(&self, id: InstrId) -> Result<&Instruction> {
        self.instructions
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("instruction {id:?}")))
    }

    pub fn phi(&self, id: PhiId) -> Result<&Phi> {
        self.phis.get(id).ok_or_else(|| Error::NotFound(format!("phi {id:?}")))
    }

    pub fn call(&self, id: CallId) -> Result<&Call> {
        self.calls.get(id).ok_or_else(|| Error::NotFound(format!("call {id:?}")))
    }

    pub fn inline_asm(&self, id: InlineAsmId) -> Result<&InlineAsm> {
        self.inline_asm
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("inline-asm {id:?}")))
    }

    pub fn is_instruction_alive_in_table(&self, id: InstrId) -> bool {
        self.instructions.is_alive(id)
    }

    pub fn is_block_alive_in_table(&self, id: BlockId) -> bool {
        self.blocks.is_alive(id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter()
    }

    pub fn instructions(&self) -> impl Iterator<Item = (InstrId, &Instruction)> {
        self.instructions.iter()
    }

    pub fn phis(&self) -> impl Iterator<Item = (PhiId, &Phi)> {
        self.phis.iter()
    }

    /// Every instruction in `block`, in textual sibling order.
    pub fn block_instructions(&self, block_id: BlockId) -> Result<Vec<InstrId>> {
        let block = self.block(block_id)?;
        let mut out = Vec::new();
        let mut cur = block.instr_head();
        while !cur.is_none() {
            out.push(cur);
            cur = self.instr(cur)?.next;
        }
        Ok(out)
    }

    /// Every control-flow instruction in `block`, in textual sibling order.
    pub fn block_control_instructions(&self, block_id: BlockId) -> Result<Vec<InstrId>> {
        let block = self.block(block_id)?;
        let mut out = Vec::new();
        let mut cur = block.control_head();
        while !cur.is_none() {
            out.push(cur);
            cur = self.instr(cur)?.control_flow_next;
        }
        Ok(out)
    }

    /// The block's terminator: the last control-flow instruction, which
    /// spec.md §3 requires to be a terminator opcode (or an inline-asm node
    /// with jump targets).
    pub fn block_terminator(&self, block_id: BlockId) -> Result<Option<InstrId>> {
        let block = self.block(block_id)?;
        if block.control_tail().is_none() {
            return Ok(None);
        }
        Ok(Some(block.control_tail()))
    }

    // ---- construction --------------------------------------------------

    /// Allocates a fresh block with no instructions and no predecessors
    /// other than via phi links elsewhere (spec.md §4.1).
    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push_with(Block::new)
    }

    fn bump_use(&mut self, id: InstrId, delta: i32) {
        let counter = self.use_counts.entry(id).or_insert(0);
        if delta > 0 {
            *counter += delta as u32;
        } else {
            *counter = counter.saturating_sub((-delta) as u32);
        }
    }

    /// Every instruction_ref an instruction's operand cites directly,
    /// including call arguments (which live on the `Call` node, not the
    /// operand payload itself).
    pub fn instruction_inputs(&self, instr_id: InstrId) -> Result<SmallVec<[InstrId; 4]>> {
        let instr = self.instr(instr_id)?;
        let mut inputs: SmallVec<[InstrId; 4]> = SmallVec::new();
        instr.operands.for_each_input(|r| inputs.push(r));
        if let Operand::FunctionCall(fc) = &instr.operands {
            let call = self.call(fc.call_ref)?;
            inputs.extend(call.arguments.iter().copied().filter(|r| !r.is_none()));
        }
        Ok(inputs)
    }

    fn record_uses(&mut self, instr_id: InstrId, delta: i32) -> Result<()> {
        let inputs = self.instruction_inputs(instr_id)?;
        for input in inputs {
            self.bump_use(input, delta);
        }
        Ok(())
    }

    fn link_into_textual(&mut self, block_id: BlockId, instr_id: InstrId) -> Result<()> {
        let tail = self.block(block_id)?.instr_tail();
        if tail.is_none() {
            let block = self.blocks.get_mut(block_id).unwrap();
            block.instr_head = instr_id;
            block.instr_tail = instr_id;
        } else {
            self.instructions.get_mut(tail).unwrap().next = instr_id;
            self.instructions.get_mut(instr_id).unwrap().prev = tail;
            self.blocks.get_mut(block_id).unwrap().instr_tail = instr_id;
        }
        Ok(())
    }

    fn link_into_control(&mut self, block_id: BlockId, instr_id: InstrId) -> Result<()> {
        let tail = self.block(block_id)?.control_tail();
        if tail.is_none() {
            let block = self.blocks.get_mut(block_id).unwrap();
            block.control_head = instr_id;
            block.control_tail = instr_id;
        } else {
            self.instructions.get_mut(tail).unwrap().control_flow_next = instr_id;
            self.instructions.get_mut(instr_id).unwrap().control_flow_prev = tail;
            self.blocks.get_mut(block_id).unwrap().control_tail = instr_id;
        }
        Ok(())
    }

    fn unlink_from_textual(&mut self, instr_id: InstrId) -> Result<()> {
        let (prev, next, block_id) = {
            let instr = self.instr(instr_id)?;
            (instr.prev, instr.next, instr.block_id)
        };
        if prev.is_none() {
            self.blocks.get_mut(block_id).unwrap().instr_head = next;
        } else {
            self.instructions.get_mut(prev).unwrap().next = next;
        }
        if next.is_none() {
            self.blocks.get_mut(block_id).unwrap().instr_tail = prev;
        } else {
            self.instructions.get_mut(next).unwrap().prev = prev;
        }
        Ok(())
    }

    fn unlink_from_control(&mut self, instr_id: InstrId) -> Result<()> {
        let (prev, next, block_id, was_control) = {
            let instr = self.instr(instr_id)?;
            (
                instr.control_flow_prev,
                instr.control_flow_next,
                instr.block_id,
                instr.is_control_flow(),
            )
        };
        if !was_control {
            return Ok(());
        }
        if prev.is_none() {
            self.blocks.get_mut(block_id).unwrap().control_head = next;
        } else {
            self.instructions.get_mut(prev).unwrap().control_flow_next = next;
        }
        if next.is_none() {
            self.blocks.get_mut(block_id).unwrap().control_tail = prev;
        } else {
            self.instructions.get_mut(next).unwrap().control_flow_prev = prev;
        }
        Ok(())
    }

    /// Appends an instruction to `block_id`'s sibling list; if the opcode is
    /// classified as control flow it also joins the control list (spec.md
    /// §4.1).
    pub fn append_instr(&mut self, block_id: BlockId, opcode: Opcode, operands: Operand) -> Result<InstrId> {
        self.block(block_id)?;
        let is_control = opcode.is_control_flow();
        let instr_id = self.instructions.push_with(|id| Instruction::new(id, block_id, opcode, operands));
        self.link_into_textual(block_id, instr_id)?;
        if is_control {
            self.link_into_control(block_id, instr_id)?;
        }
        self.record_uses(instr_id, 1)?;
        Ok(instr_id)
    }

    /// Appends an inline-asm instruction, whose control-flow membership
    /// depends on whether the node has side effects or jump targets rather
    /// than purely on the opcode (spec.md §3, §4.1).
    pub fn append_inline_asm_instr(&mut self, block_id: BlockId, asm_id: InlineAsmId) -> Result<InstrId> {
        self.block(block_id)?;
        let is_control = {
            let asm = self.inline_asm(asm_id)?;
            asm.has_side_effects || asm.has_jump_targets()
        };
        let instr_id = self
            .instructions
            .push_with(|id| Instruction::new(id, block_id, Opcode::InlineAsm, Operand::InlineAsm(asm_id)));
        if is_control {
            self.instructions.get_mut(instr_id).unwrap().control_side_effect_free = false;
        }
        self.link_into_textual(block_id, instr_id)?;
        if is_control {
            self.link_into_control(block_id, instr_id)?;
        }
        Ok(instr_id)
    }

    /// Replaces `instr_id`'s operation in place, preserving sibling links.
    pub fn replace_instr(&mut self, instr_id: InstrId, opcode: Opcode, operands: Operand) -> Result<()> {
        self.record_uses(instr_id, -1)?;
        let was_control = self.instr(instr_id)?.is_control_flow();
        let now_control = opcode.is_control_flow();
        let (block_id,) = {
            let instr = self.instr(instr_id)?;
            (instr.block_id,)
        };
        if was_control && !now_control {
            self.unlink_from_control(instr_id)?;
        }
        {
            let instr = self.instructions.get_mut(instr_id).unwrap();
            instr.opcode = opcode;
            instr.operands = operands;
            instr.control_side_effect_free = opcode.is_side_effect_free();
        }
        if !was_control && now_control {
            self.link_into_control(block_id, instr_id)?;
        }
        self.record_uses(instr_id, 1)?;
        Ok(())
    }

    /// Drops `instr_id`, preserving sibling links of its neighbors. Dropping
    /// a control-flow instruction also unlinks it from the control list,
    /// and if it was a terminator, leaves the block transiently without one
    /// — the caller must restore a terminator before analysis re-runs
    /// (spec.md §4.1).
    pub fn drop_instr(&mut self, instr_id: InstrId) -> Result<()> {
        self.drop_instr_impl(instr_id, false)
    }

    fn drop_instr_impl(&mut self, instr_id: InstrId, force: bool) -> Result<()> {
        if !force {
            let uses = self.use_counts.get(&instr_id).copied().unwrap_or(0);
            if uses > 0 {
                return Err(Error::InstructionInUse(format!(
                    "instruction {instr_id:?} has {uses} remaining use(s)"
                )));
            }
        }
        self.unlink_from_control(instr_id)?;
        self.unlink_from_textual(instr_id)?;
        self.record_uses(instr_id, -1)?;
        self.use_counts.remove(&instr_id);
        self.instructions.remove(instr_id);
        Ok(())
    }

    /// Creates an unattached phi owning its link map.
    pub fn new_phi(&mut self, block_id: BlockId) -> Result<PhiId> {
        self.block(block_id)?;
        let phi_id = self.phis.push_with(|id| Phi::new(id, block_id, InstrId::NONE));
        Ok(phi_id)
    }

    /// Binds the phi's output to the instruction that carries it (typically
    /// an instruction with `Operand::Phi(phi_id)` appended right after).
    pub fn phi_set_output(&mut self, phi_id: PhiId, output_ref: InstrId) -> Result<()> {
        let phi = self.phis.get_mut(phi_id).ok_or_else(|| Error::NotFound(format!("phi {phi_id:?}")))?;
        phi.output_ref = output_ref;
        Ok(())
    }

    /// Adds/overwrites a link. Fails with `inconsistent-phi` if
    /// `predecessor_block` is not a predecessor of the phi's block at the
    /// moment the scheduler runs (spec.md §4.1) — callers validate that
    /// with a `LivenessIndex`/`CodeStructure`; here we only enforce that the
    /// referenced instruction exists.
    pub fn phi_attach(&mut self, phi_id: PhiId, predecessor_block: BlockId, instr_ref: InstrId) -> Result<()> {
        self.instr(instr_ref)?;
        let old = {
            let phi = self.phis.get_mut(phi_id).ok_or_else(|| Error::NotFound(format!("phi {phi_id:?}")))?;
            phi.links.insert(predecessor_block, instr_ref)
        };
        if let Some(old) = old {
            self.bump_use(old, -1);
        }
        self.bump_use(instr_ref, 1);
        Ok(())
    }

    pub fn phi_validate_links(&self, phi_id: PhiId, is_predecessor: impl Fn(BlockId) -> bool) -> Result<()> {
        let phi = self.phi(phi_id)?;
        for &pred in phi.links.keys() {
            if !is_predecessor(pred) {
                return Err(Error::InconsistentPhi(format!(
                    "block {pred:?} is not a predecessor of phi {phi_id:?}'s block"
                )));
            }
        }
        Ok(())
    }

    /// Allocates a call node with an `argc`-length argument vector.
    pub fn new_call(&mut self, block_id: BlockId, function_declaration_id: FunctionDeclarationId, argc: usize) -> Result<CallId> {
        self.block(block_id)?;
        Ok(self
            .calls
            .push_with(|id| Call::new(id, block_id, function_declaration_id, argc)))
    }

    pub fn call_set_argument(&mut self, call_id: CallId, index: usize, instr_ref: InstrId) -> Result<()> {
        self.instr(instr_ref)?;
        let old = {
            let call = self
                .calls
                .get_mut(call_id)
                .ok_or_else(|| Error::NotFound(format!("call {call_id:?}")))?;
            if index >= call.arguments.len() {
                return Err(Error::OutOfBounds(format!("argument index {index} out of bounds for call {call_id:?}")));
            }
            let old = call.arguments[index];
            call.arguments[index] = instr_ref;
            old
        };
        if !old.is_none() {
            self.bump_use(old, -1);
        }
        self.bump_use(instr_ref, 1);
        Ok(())
    }

    pub fn new_inline_asm(&mut self, block_id: BlockId, template: impl Into<String>) -> Result<InlineAsmId> {
        self.block(block_id)?;
        Ok(self
            .inline_asm
            .push_with(|id| InlineAsm::new(id, block_id, template.into())))
    }

    pub fn inline_asm_mut(&mut self, id: InlineAsmId) -> Result<&mut InlineAsm> {
        self.inline_asm
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("inline-asm {id:?}")))
    }

    pub fn block_add_public_label(&mut self, block_id: BlockId, label: impl Into<String>) -> Result<()> {
        self.blocks
            .get_mut(block_id)
            .ok_or_else(|| Error::NotFound(format!("block {block_id:?}")))?
            .public_labels
            .insert(label.into());
        Ok(())
    }

    // ---- traversal ------------------------------------------------------

    /// Canonical pre-order traversal used by the use-def verifier (spec.md
    /// §4.1): for every reachable instruction (walked in block order, then
    /// textual order within a block), extracts every input `instruction_ref`
    /// of every instruction.
    pub fn trace(&self, block_order: &[BlockId], mut visitor: impl FnMut(InstrId, InstrId)) -> Result<()> {
        for &block_id in block_order {
            for instr_id in self.block_instructions(block_id)? {
                for input in self.instruction_inputs(instr_id)? {
                    visitor(instr_id, input);
                }
            }
            for &phi_id in &self.block(block_id)?.phis {
                let phi = self.phi(phi_id)?;
                for &incoming in phi.links.values() {
                    visitor(phi.output_ref, incoming);
                }
            }
        }
        Ok(())
    }

    // ---- dead code elimination -------------------------------------------

    /// Consumes an index reporting liveness/reachability; performs a single
    /// pass that (i) drops instructions flagged dead, (ii) drops blocks
    /// flagged dead, (iii) rewrites phi link maps to keep only links whose
    /// source block is reported by `is_block_predecessor` (spec.md §4.1).
    pub fn drop_dead(&mut self, index: &impl LivenessIndex) -> Result<()> {
        let dead_instrs: Vec<InstrId> = self
            .instructions
            .iter()
            .filter(|&(id, _)| !index.is_instruction_alive(id))
            .map(|(id, _)| id)
            .collect();
        for instr_id in dead_instrs {
            self.drop_instr_impl(instr_id, true)?;
        }

        let dead_blocks: Vec<BlockId> = self
            .blocks
            .iter()
            .filter(|&(id, _)| !index.is_block_alive(id))
            .map(|(id, _)| id)
            .collect();
        for block_id in dead_blocks {
            self.remove_block(block_id)?;
        }

        let phi_ids: Vec<PhiId> = self.phis.keys().collect();
        for phi_id in phi_ids {
            let (block_id, stale): (BlockId, Vec<BlockId>) = {
                let phi = self.phi(phi_id)?;
                let stale = phi
                    .links
                    .keys()
                    .copied()
                    .filter(|&pred| !index.is_block_predecessor(phi.block_id, pred))
                    .collect();
                (phi.block_id, stale)
            };
            if !self.blocks.is_alive(block_id) {
                continue;
            }
            let phi = self.phis.get_mut(phi_id).unwrap();
            for pred in stale {
                if let Some(removed) = phi.links.remove(&pred) {
                    self.bump_use(removed, -1);
                }
            }
            // A phi with zero links after DCE is itself dropped (spec.md §8
            // boundary case).
            if self.phi(phi_id)?.links.is_empty() {
                self.phis.remove(phi_id);
                if let Some(block) = self.blocks.get_mut(block_id) {
                    block.phis.retain(|&p| p != phi_id);
                }
            }
        }
        Ok(())
    }

    fn remove_block(&mut self, block_id: BlockId) -> Result<()> {
        let instr_ids = self.block_instructions(block_id)?;
        for instr_id in instr_ids {
            self.drop_instr_impl(instr_id, true)?;
        }
        let phi_ids = self.block(block_id)?.phis.clone();
        for phi_id in phi_ids {
            if let Some(phi) = self.phis.remove(phi_id) {
                for v in phi.links.values() {
                    self.bump_use(*v, -1);
                }
            }
        }
        self.calls_for_block(block_id)?.into_iter().for_each(|c| {
            self.calls.remove(c);
        });
        self.inline_asm_for_block(block_id)?.into_iter().for_each(|a| {
            self.inline_asm.remove(a);
        });
        self.blocks.remove(block_id);
        Ok(())
    }

    fn calls_for_block(&self, block_id: BlockId) -> Result<Vec<CallId>> {
        Ok(self.block(block_id)?.calls.clone())
    }

    fn inline_asm_for_block(&self, block_id: BlockId) -> Result<Vec<InlineAsmId>> {
        Ok(self.block(block_id)?.inline_asm.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operand::Immediate;

    #[test]
    fn append_and_read_back() {
        let mut c = CodeContainer::new();
        let b = c.new_block();
        let i1 = c
            .append_instr(b, Opcode::IntConst, Operand::Immediate(Immediate::Int(42)))
            .unwrap();
        assert_eq!(c.block_instructions(b).unwrap(), vec![i1]);
        assert!(c.instr(i1).unwrap().control_side_effect_free);
    }

    #[test]
    fn drop_instr_in_use_fails() {
        let mut c = CodeContainer::new();
        let b = c.new_block();
        let i1 = c
            .append_instr(b, Opcode::IntConst, Operand::Immediate(Immediate::Int(1)))
            .unwrap();
        let mut refs = smallvec::SmallVec::new();
        refs.push(i1);
        let _i2 = c.append_instr(b, Opcode::Neg, Operand::Refs(refs)).unwrap();
        assert!(matches!(c.drop_instr(i1), Err(Error::InstructionInUse(_))));
    }

    #[test]
    fn control_flow_instructions_join_control_list() {
        let mut c = CodeContainer::new();
        let b0 = c.new_block();
        let target = c.new_block();
        c.append_instr(
            b0,
            Opcode::Jump,
            Operand::Branch(super::super::operand::Branch {
                target_block: target,
                alt_block: None,
                condition_ref: None,
                condition_variant: super::super::operand::ConditionVariant::Direct,
                comparison: None,
            }),
        )
        .unwrap();
        assert_eq!(c.block_control_instructions(b0).unwrap().len(), 1);
    }

    #[test]
    fn empty_block_has_no_head() {
        let mut c = CodeContainer::new();
        let b = c.new_block();
        assert!(c.block(b).unwrap().instr_head().is_none());
        assert!(c.block_instructions(b).unwrap().is_empty());
    }
}
