//! `Instruction` — spec.md §3.

use super::entities::{BlockId, InstrId};
use super::opcode::Opcode;
use super::operand::Operand;

#[derive(Debug, Clone)]
pub struct Instruction {
    pub id: InstrId,
    pub block_id: BlockId,
    pub opcode: Opcode,
    pub operands: Operand,

    /// Textual-order sibling links within the owning block's instruction
    /// list (spec.md §3 "Block": "a sibling-linked list of instructions in
    /// textual order").
    pub(super) prev: InstrId,
    pub(super) next: InstrId,

    /// Links within the block's separate control-flow sibling list (the
    /// side-effecting subset).
    pub control_flow_prev: InstrId,
    pub control_flow_next: InstrId,

    pub control_side_effect_free: bool,
}

impl Instruction {
    pub(super) fn new(id: InstrId, block_id: BlockId, opcode: Opcode, operands: Operand) -> Self {
        Self {
            id,
            block_id,
            opcode,
            operands,
            prev: InstrId::NONE,
            next: InstrId::NONE,
            control_flow_prev: InstrId::NONE,
            control_flow_next: InstrId::NONE,
            control_side_effect_free: opcode.is_side_effect_free(),
        }
    }

    pub fn is_control_flow(&self) -> bool {
        !self.control_side_effect_free
    }
}
