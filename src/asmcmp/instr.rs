//! An asmcmp instruction node: `{opcode, args[N]}` plus its sibling links in
//! the linear instruction stream (spec.md §4.6, C8).

use smallvec::SmallVec;

use super::entities::AsmInstrId;
use super::operand::Operand;

/// An opaque asmcmp opcode, interned in the context's string pool; resolving
/// it to assembly mnemonic text is an external `register_mnemonic`/
/// `opcode_mnemonic` v-table concern (spec.md §6, §9), out of scope for the
/// IR container itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AsmOpcode(pub crate::string_pool::StringId);

/// `{opcode, args[N]}`, `N` up to 3 (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct AsmInstruction {
    pub opcode: AsmOpcode,
    pub args: SmallVec<[Operand; 3]>,
}

impl AsmInstruction {
    pub fn new(opcode: AsmOpcode, args: impl IntoIterator<Item = Operand>) -> Self {
        Self { opcode, args: args.into_iter().collect() }
    }
}

/// A node in the context's doubly-linked instruction stream: `{index,
/// prev_index, next_index, instruction}`, plus the labels currently bound
/// to this index in attach order.
pub(super) struct InstrNode {
    pub instr: AsmInstruction,
    pub prev: AsmInstrId,
    pub next: AsmInstrId,
    pub labels: Vec<super::entities::LabelId>,
}
