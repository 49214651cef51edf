//! `AsmcmpContext` — the asmcmp linear instruction stream, its label,
//! virtual-register, stash and inline-asm tables, and its own string pool
//! and source map (spec.md §4.6, C8).

use crate::containers::{DenseTable, Id};
use crate::debuginfo::SourceMap;
use crate::error::{Error, Result};
use crate::string_pool::{StringId, StringPool};

use super::entities::{AsmInlineAsmId, AsmInstrId, LabelId, StashId, VRegId};
use super::inline_asm::{AsmInlineAsm, AsmInlineAsmFragment};
use super::instr::{AsmInstruction, AsmOpcode, InstrNode};
use super::label::Label;
use super::operand::{Operand, PhysReg};
use super::stash::Stash;
use super::vreg::{VReg, VRegKind};

/// The asmcmp context: owns every table described in spec.md §4.6. Single
/// instruction stream, shared by every table that indexes into it (labels,
/// stashes' `liveness_instr_index`, the source map).
#[derive(Default)]
pub struct AsmcmpContext {
    instructions: DenseTable<AsmInstrId, InstrNode>,
    head: AsmInstrId,
    tail: AsmInstrId,

    labels: DenseTable<LabelId, Label>,
    tail_labels: Vec<LabelId>,

    vregs: DenseTable<VRegId, VReg>,
    stashes: DenseTable<StashId, Stash>,
    inline_asm: DenseTable<AsmInlineAsmId, AsmInlineAsm>,

    strings: StringPool,
    source_map: SourceMap,
}

impl AsmcmpContext {
    pub fn new() -> Self {
        Self {
            head: AsmInstrId::NONE,
            tail: AsmInstrId::NONE,
            ..Default::default()
        }
    }

    fn node(&self, id: AsmInstrId) -> Result<&InstrNode> {
        self.instructions.get(id).ok_or_else(|| Error::NotFound(format!("asmcmp instruction {id:?}")))
    }

    fn node_mut(&mut self, id: AsmInstrId) -> Result<&mut InstrNode> {
        self.instructions
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("asmcmp instruction {id:?}")))
    }

    // ---- instructions --------------------------------------------------

    pub fn instr(&self, id: AsmInstrId) -> Result<&AsmInstruction> {
        Ok(&self.node(id)?.instr)
    }

    pub fn instr_head(&self) -> AsmInstrId {
        self.head
    }

    pub fn instr_tail(&self) -> AsmInstrId {
        self.tail
    }

    pub fn instr_next(&self, id: AsmInstrId) -> Result<AsmInstrId> {
        Ok(self.node(id)?.next)
    }

    pub fn instr_prev(&self, id: AsmInstrId) -> Result<AsmInstrId> {
        Ok(self.node(id)?.prev)
    }

    /// Inserts `instr` immediately after `after`, or at the head of the
    /// stream if `after` is `NONE` (spec.md §4.6 `instr_insert_after`).
    pub fn instr_insert_after(&mut self, after: AsmInstrId, instr: AsmInstruction) -> Result<AsmInstrId> {
        if after.is_none() {
            let old_head = self.head;
            let new_id = self.instructions.push(InstrNode { instr, prev: AsmInstrId::NONE, next: old_head, labels: Vec::new() });
            if old_head.is_none() {
                self.tail = new_id;
            } else {
                self.node_mut(old_head)?.prev = new_id;
            }
            self.head = new_id;
            return Ok(new_id);
        }

        let next = self.node(after)?.next;
        let new_id = self.instructions.push(InstrNode { instr, prev: after, next, labels: Vec::new() });
        self.node_mut(after)?.next = new_id;
        if next.is_none() {
            self.tail = new_id;
        } else {
            self.node_mut(next)?.prev = new_id;
        }
        Ok(new_id)
    }

    /// Unlinks `index` from the sibling chain and from any labels bound to
    /// it; a label whose sole attached instruction is dropped becomes
    /// unbound but keeps its id (spec.md §4.6 `instr_drop`).
    pub fn instr_drop(&mut self, index: AsmInstrId) -> Result<()> {
        let node = self.node(index)?;
        let (prev, next) = (node.prev, node.next);
        let attached_labels = node.labels.clone();

        if prev.is_none() {
            self.head = next;
        } else {
            self.node_mut(prev)?.next = next;
        }
        if next.is_none() {
            self.tail = prev;
        } else {
            self.node_mut(next)?.prev = prev;
        }

        for label in attached_labels {
            if let Some(lab) = self.labels.get_mut(label) {
                lab.bound = false;
                lab.after_tail = false;
                lab.position = AsmInstrId::NONE;
            }
        }

        self.instructions.remove(index);
        self.rebuild_label_links();
        Ok(())
    }

    /// Replaces the instruction payload at `index`, keeping its position in
    /// the sibling chain and its bound labels (spec.md §4.6 `instr_replace`).
    pub fn instr_replace(&mut self, index: AsmInstrId, instr: AsmInstruction) -> Result<()> {
        self.node_mut(index)?.instr = instr;
        Ok(())
    }

    pub fn iter_instructions(&self) -> impl Iterator<Item = AsmInstrId> + '_ {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            if cur.is_none() {
                return None;
            }
            let id = cur;
            cur = self.node(cur).map(|n| n.next).unwrap_or(AsmInstrId::NONE);
            Some(id)
        })
    }

    // ---- labels ----------------------------------------------------------

    /// `new_label(attach_to_instr) -> label_id` (spec.md §4.6).
    pub fn new_label(&mut self, attach_to_instr: Option<AsmInstrId>) -> Result<LabelId> {
        let id = self.labels.push(Label::unbound());
        if let Some(instr) = attach_to_instr {
            self.bind_label(id, instr)?;
        }
        Ok(id)
    }

    /// `label_at(label_id) -> instr_index`; errors if the label is unbound
    /// or bound past the tail, since neither names a concrete instruction
    /// index (spec.md §4.6).
    pub fn label_at(&self, label: LabelId) -> Result<AsmInstrId> {
        let lab = self.labels.get(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        if !lab.bound || lab.after_tail {
            return Err(Error::InvalidState(format!("label {label:?} has no concrete instruction index")));
        }
        Ok(lab.position)
    }

    pub fn label_is_bound(&self, label: LabelId) -> Result<bool> {
        Ok(self.labels.get(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?.bound)
    }

    pub fn label_is_after_tail(&self, label: LabelId) -> Result<bool> {
        Ok(self.labels.get(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?.after_tail)
    }

    fn detach_label(&mut self, label: LabelId) -> Result<()> {
        let (bound, after_tail, position) = {
            let lab = self.labels.get(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
            (lab.bound, lab.after_tail, lab.position)
        };
        if bound && after_tail {
            self.tail_labels.retain(|&l| l != label);
        } else if bound {
            self.node_mut(position)?.labels.retain(|&l| l != label);
        }
        Ok(())
    }

    /// Binds `label` to precede `instr`, detaching it from wherever it was
    /// bound before (spec.md §4.6 `bind_label`).
    pub fn bind_label(&mut self, label: LabelId, instr: AsmInstrId) -> Result<()> {
        self.node(instr)?;
        self.detach_label(label)?;
        self.node_mut(instr)?.labels.push(label);
        let lab = self.labels.get_mut(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        lab.bound = true;
        lab.after_tail = false;
        lab.position = instr;
        self.rebuild_label_links();
        Ok(())
    }

    /// Clears `bound` without discarding the label's id (spec.md §4.6
    /// `unbind_label`).
    pub fn unbind_label(&mut self, label: LabelId) -> Result<()> {
        self.detach_label(label)?;
        let lab = self.labels.get_mut(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        lab.bound = false;
        lab.after_tail = false;
        lab.position = AsmInstrId::NONE;
        self.rebuild_label_links();
        Ok(())
    }

    /// Attaches `label` past the last instruction, for end-of-function
    /// labels (spec.md §4.6 `bind_after_tail`).
    pub fn bind_after_tail(&mut self, label: LabelId) -> Result<()> {
        self.detach_label(label)?;
        self.tail_labels.push(label);
        let lab = self.labels.get_mut(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        lab.bound = true;
        lab.after_tail = true;
        lab.position = AsmInstrId::NONE;
        self.rebuild_label_links();
        Ok(())
    }

    /// Rebinds every label attached to `from` onto `to` (spec.md §4.6
    /// `move_labels`).
    pub fn move_labels(&mut self, from: AsmInstrId, to: AsmInstrId) -> Result<()> {
        self.node(to)?;
        let moved = std::mem::take(&mut self.node_mut(from)?.labels);
        for &label in &moved {
            if let Some(lab) = self.labels.get_mut(label) {
                lab.position = to;
            }
        }
        self.node_mut(to)?.labels.extend(moved);
        self.rebuild_label_links();
        Ok(())
    }

    pub fn label_add_public_name(&mut self, label: LabelId, name: &str) -> Result<()> {
        let interned = self.strings.intern(name);
        let lab = self.labels.get_mut(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        lab.public_labels.insert(interned);
        Ok(())
    }

    pub fn label_mark_external_dependencies(&mut self, label: LabelId) -> Result<()> {
        let lab = self.labels.get_mut(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        lab.has_external_dependencies = true;
        Ok(())
    }

    pub fn label_head(&self) -> Option<LabelId> {
        self.labels.iter().find(|(_, l)| l.bound && l.prev_label.is_none()).map(|(id, _)| id)
    }

    pub fn label_next(&self, label: LabelId) -> Result<Option<LabelId>> {
        let lab = self.labels.get(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        Ok(if lab.next_label.is_none() { None } else { Some(lab.next_label) })
    }

    pub fn label_prev(&self, label: LabelId) -> Result<Option<LabelId>> {
        let lab = self.labels.get(label).ok_or_else(|| Error::NotFound(format!("label {label:?}")))?;
        Ok(if lab.prev_label.is_none() { None } else { Some(lab.prev_label) })
    }

    /// Recomputes every bound label's `prev_label`/`next_label` from the
    /// current document order: instruction-attached labels in stream order
    /// (ties broken by attach order within an instruction), followed by
    /// `bind_after_tail` labels in attach order. Called after every
    /// structural mutation; see the note on [`Label`].
    fn rebuild_label_links(&mut self) {
        let mut ordered: Vec<LabelId> = Vec::new();
        let mut cur = self.head;
        while !cur.is_none() {
            let node = match self.instructions.get(cur) {
                Some(n) => n,
                None => break,
            };
            ordered.extend_from_slice(&node.labels);
            cur = node.next;
        }
        ordered.extend_from_slice(&self.tail_labels);

        for (i, &label) in ordered.iter().enumerate() {
            let prev = if i == 0 { LabelId::NONE } else { ordered[i - 1] };
            let next = if i + 1 == ordered.len() { LabelId::NONE } else { ordered[i + 1] };
            if let Some(lab) = self.labels.get_mut(label) {
                lab.prev_label = prev;
                lab.next_label = next;
            }
        }
    }

    /// Rewrites every operand citing `from` to cite `to` instead, across
    /// every instruction and inline-asm value fragment; returns how many
    /// operands changed (spec.md §4.6 `replace_labels`).
    pub fn replace_labels(&mut self, from: LabelId, to: LabelId) -> usize {
        let mut count = 0;
        for (_, node) in self.instructions.iter_mut() {
            for arg in node.instr.args.iter_mut() {
                if arg.replace_label(from, to) {
                    count += 1;
                }
            }
        }
        for (_, asm) in self.inline_asm.iter_mut() {
            for frag in asm.fragments.iter_mut() {
                if let AsmInlineAsmFragment::Value(value) = frag {
                    if value.replace_label(from, to) {
                        count += 1;
                    }
                }
            }
        }
        count
    }

    // ---- virtual registers -----------------------------------------------

    pub fn vreg_new(&mut self, kind: VRegKind) -> VRegId {
        self.vregs.push(VReg::new(kind))
    }

    pub fn vreg_new_spill(&mut self, size: u32, align: u32, indirect: bool) -> VRegId {
        let kind = if indirect {
            VRegKind::IndirectSpillSlot { size, align }
        } else {
            VRegKind::DirectSpillSlot { size, align }
        };
        self.vreg_new(kind)
    }

    pub fn vreg_new_stack_frame_pointer(&mut self, base: PhysReg, offset: i64) -> VRegId {
        self.vreg_new(VRegKind::StackFramePointer { base, offset })
    }

    pub fn vreg_new_immediate(&mut self, value: i64) -> VRegId {
        self.vreg_new(VRegKind::Immediate(value))
    }

    pub fn vreg_new_memory_pointer(&mut self, base: PhysReg, offset: i64) -> VRegId {
        self.vreg_new(VRegKind::ExternalMemory { base, offset })
    }

    /// The dependent's concrete register class is determined by the
    /// dependee once it is resolved (spec.md §4.6).
    pub fn vreg_specify_type_dependent(&mut self, dependent: VRegId, dependee: VRegId) -> Result<()> {
        self.vregs.get(dependee).ok_or_else(|| Error::NotFound(format!("vreg {dependee:?}")))?;
        let v = self.vregs.get_mut(dependent).ok_or_else(|| Error::NotFound(format!("vreg {dependent:?}")))?;
        v.type_dependent_on = Some(dependee);
        Ok(())
    }

    pub fn vreg_set_spill_space_size(&mut self, vreg: VRegId, size: u32, align: u32) -> Result<()> {
        let v = self.vregs.get_mut(vreg).ok_or_else(|| Error::NotFound(format!("vreg {vreg:?}")))?;
        match &mut v.kind {
            VRegKind::DirectSpillSlot { size: s, align: a } | VRegKind::IndirectSpillSlot { size: s, align: a } => {
                *s = size;
                *a = align;
                Ok(())
            }
            _ => Err(Error::InvalidParameter(format!("vreg {vreg:?} is not a spill slot"))),
        }
    }

    pub fn vreg_kind(&self, vreg: VRegId) -> Result<VRegKind> {
        Ok(self.vregs.get(vreg).ok_or_else(|| Error::NotFound(format!("vreg {vreg:?}")))?.kind)
    }

    // ---- stashes -----------------------------------------------------------

    pub fn stash_new(&mut self, backing_vreg: VRegId) -> Result<StashId> {
        self.vregs.get(backing_vreg).ok_or_else(|| Error::NotFound(format!("vreg {backing_vreg:?}")))?;
        Ok(self.stashes.push(Stash::new(backing_vreg)))
    }

    fn stash_mut(&mut self, stash: StashId) -> Result<&mut Stash> {
        self.stashes.get_mut(stash).ok_or_else(|| Error::NotFound(format!("stash {stash:?}")))
    }

    fn stash_ref(&self, stash: StashId) -> Result<&Stash> {
        self.stashes.get(stash).ok_or_else(|| Error::NotFound(format!("stash {stash:?}")))
    }

    pub fn stash_add(&mut self, stash: StashId, phys_reg: PhysReg) -> Result<()> {
        self.stash_mut(stash)?.stashed_phys_regs.insert(phys_reg);
        Ok(())
    }

    pub fn stash_exclude(&mut self, stash: StashId, vreg: VRegId) -> Result<()> {
        self.stash_mut(stash)?.excluded_vregs.insert(vreg);
        Ok(())
    }

    pub fn stash_set_liveness_index(&mut self, stash: StashId, instr: AsmInstrId) -> Result<()> {
        self.node(instr)?;
        self.stash_mut(stash)?.liveness_instr_index = Some(instr);
        Ok(())
    }

    pub fn stash_has(&self, stash: StashId, phys_reg: PhysReg) -> Result<bool> {
        Ok(self.stash_ref(stash)?.stashed_phys_regs.contains(&phys_reg))
    }

    /// Whether `vreg` still needs preserving by this stash, i.e. it has not
    /// been proven dead and excluded via [`Self::stash_exclude`].
    pub fn stash_has_virtual(&self, stash: StashId, vreg: VRegId) -> Result<bool> {
        Ok(!self.stash_ref(stash)?.excluded_vregs.contains(&vreg))
    }

    pub fn stash_vreg(&self, stash: StashId) -> Result<VRegId> {
        Ok(self.stash_ref(stash)?.backing_vreg)
    }

    pub fn stash_liveness_index(&self, stash: StashId) -> Result<Option<AsmInstrId>> {
        Ok(self.stash_ref(stash)?.liveness_instr_index)
    }

    // ---- inline assembly -----------------------------------------------

    pub fn inline_asm_new(&mut self, template: &str) -> AsmInlineAsmId {
        let interned = self.strings.intern(template);
        self.inline_asm.push(AsmInlineAsm::new(interned))
    }

    pub fn inline_asm_add_text(&mut self, id: AsmInlineAsmId, args: std::fmt::Arguments<'_>) -> Result<()> {
        let interned = self.strings.intern_fmt(args);
        self.inline_asm
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("inline-asm {id:?}")))?
            .fragments
            .push(AsmInlineAsmFragment::Text(interned));
        Ok(())
    }

    pub fn inline_asm_add_value(&mut self, id: AsmInlineAsmId, value: Operand) -> Result<()> {
        self.inline_asm
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("inline-asm {id:?}")))?
            .fragments
            .push(AsmInlineAsmFragment::Value(value));
        Ok(())
    }

    pub fn inline_asm_fragments(&self, id: AsmInlineAsmId) -> Result<&[AsmInlineAsmFragment]> {
        Ok(&self.inline_asm.get(id).ok_or_else(|| Error::NotFound(format!("inline-asm {id:?}")))?.fragments)
    }

    // ---- utility -----------------------------------------------------------

    pub fn intern(&mut self, s: &str) -> StringId {
        self.strings.intern(s)
    }

    pub fn resolve(&self, id: StringId) -> &str {
        self.strings.resolve(id)
    }

    pub fn format(&mut self, args: std::fmt::Arguments<'_>) -> StringId {
        self.strings.intern_fmt(args)
    }

    pub fn new_opcode(&mut self, mnemonic: &str) -> AsmOpcode {
        AsmOpcode(self.strings.intern(mnemonic))
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn source_map_mut(&mut self) -> &mut SourceMap {
        &mut self.source_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(ctx: &mut AsmcmpContext) -> AsmInstruction {
        let op = ctx.new_opcode("nop");
        AsmInstruction::new(op, [])
    }

    /// S5 — label rebinding (spec.md §8): create I_a, bind L to I_a, create
    /// I_b, `move_labels(I_a, I_b)`; `label_at(L) == I_b` and I_a's attached
    /// labels are empty.
    #[test]
    fn move_labels_rebinds_and_clears_source() {
        let mut ctx = AsmcmpContext::new();
        let instr_a = ctx.instr_insert_after(AsmInstrId::NONE, noop(&mut ctx)).unwrap();
        let label = ctx.new_label(Some(instr_a)).unwrap();
        let instr_b = ctx.instr_insert_after(instr_a, noop(&mut ctx)).unwrap();

        ctx.move_labels(instr_a, instr_b).unwrap();

        assert_eq!(ctx.label_at(label).unwrap(), instr_b);
        assert!(ctx.node(instr_a).unwrap().labels.is_empty());
    }

    #[test]
    fn instr_drop_unbinds_attached_labels() {
        let mut ctx = AsmcmpContext::new();
        let instr = ctx.instr_insert_after(AsmInstrId::NONE, noop(&mut ctx)).unwrap();
        let label = ctx.new_label(Some(instr)).unwrap();

        ctx.instr_drop(instr).unwrap();

        assert!(!ctx.label_is_bound(label).unwrap());
        assert!(ctx.label_at(label).is_err());
    }

    #[test]
    fn label_chain_follows_document_order() {
        let mut ctx = AsmcmpContext::new();
        let a = ctx.instr_insert_after(AsmInstrId::NONE, noop(&mut ctx)).unwrap();
        let b = ctx.instr_insert_after(a, noop(&mut ctx)).unwrap();
        let label_b = ctx.new_label(Some(b)).unwrap();
        let label_a = ctx.new_label(Some(a)).unwrap();

        assert_eq!(ctx.label_head(), Some(label_a));
        assert_eq!(ctx.label_next(label_a).unwrap(), Some(label_b));
        assert_eq!(ctx.label_prev(label_b).unwrap(), Some(label_a));
        assert_eq!(ctx.label_next(label_b).unwrap(), None);
    }

    #[test]
    fn bind_after_tail_orders_past_every_instruction_label() {
        let mut ctx = AsmcmpContext::new();
        let a = ctx.instr_insert_after(AsmInstrId::NONE, noop(&mut ctx)).unwrap();
        let label_a = ctx.new_label(Some(a)).unwrap();
        let tail_label = ctx.new_label(None).unwrap();
        ctx.bind_after_tail(tail_label).unwrap();

        assert_eq!(ctx.label_next(label_a).unwrap(), Some(tail_label));
        assert!(ctx.label_is_after_tail(tail_label).unwrap());
        assert!(ctx.label_at(tail_label).is_err());
    }

    #[test]
    fn vreg_spill_slot_roundtrip() {
        let mut ctx = AsmcmpContext::new();
        let vreg = ctx.vreg_new_spill(8, 8, false);
        ctx.vreg_set_spill_space_size(vreg, 16, 16).unwrap();
        match ctx.vreg_kind(vreg).unwrap() {
            VRegKind::DirectSpillSlot { size, align } => {
                assert_eq!(size, 16);
                assert_eq!(align, 16);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn vreg_set_spill_space_size_rejects_non_spill_kind() {
        let mut ctx = AsmcmpContext::new();
        let vreg = ctx.vreg_new(VRegKind::GeneralPurpose);
        assert!(ctx.vreg_set_spill_space_size(vreg, 8, 8).is_err());
    }

    #[test]
    fn stash_tracks_excluded_virtuals() {
        let mut ctx = AsmcmpContext::new();
        let backing = ctx.vreg_new_spill(64, 8, true);
        let stash = ctx.stash_new(backing).unwrap();
        let live_vreg = ctx.vreg_new(VRegKind::GeneralPurpose);
        let dead_vreg = ctx.vreg_new(VRegKind::GeneralPurpose);
        ctx.stash_add(stash, PhysReg(0)).unwrap();
        ctx.stash_exclude(stash, dead_vreg).unwrap();

        assert!(ctx.stash_has(stash, PhysReg(0)).unwrap());
        assert!(ctx.stash_has_virtual(stash, live_vreg).unwrap());
        assert!(!ctx.stash_has_virtual(stash, dead_vreg).unwrap());
    }

    #[test]
    fn replace_labels_rewrites_every_operand() {
        let mut ctx = AsmcmpContext::new();
        let target = ctx.new_label(None).unwrap();
        let replacement = ctx.new_label(None).unwrap();
        let op = ctx.new_opcode("jmp");
        let instr = ctx
            .instr_insert_after(AsmInstrId::NONE, AsmInstruction::new(op, [Operand::InternalLabel(target)]))
            .unwrap();

        let count = ctx.replace_labels(target, replacement);

        assert_eq!(count, 1);
        assert_eq!(ctx.instr(instr).unwrap().args[0], Operand::InternalLabel(replacement));
    }

    #[test]
    fn inline_asm_fragments_preserve_insertion_order() {
        let mut ctx = AsmcmpContext::new();
        let id = ctx.inline_asm_new("movl $0, %eax");
        ctx.inline_asm_add_text(id, format_args!("movl ")).unwrap();
        ctx.inline_asm_add_value(id, Operand::ImmediateInt(0)).unwrap();
        let fragments = ctx.inline_asm_fragments(id).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(matches!(fragments[0], AsmInlineAsmFragment::Text(_)));
        assert!(matches!(fragments[1], AsmInlineAsmFragment::Value(Operand::ImmediateInt(0))));
    }
}
