//! `Phi` — spec.md §3.

use std::collections::HashMap;

use super::entities::{BlockId, InstrId, PhiId};

#[derive(Debug, Clone)]
pub struct Phi {
    pub id: PhiId,
    pub block_id: BlockId,
    pub output_ref: InstrId,
    /// predecessor_block -> incoming_instruction_ref. Invariant (spec.md
    /// §3): the set of keys equals the block's predecessors at the moment
    /// the scheduler consumes the function.
    pub links: HashMap<BlockId, InstrId>,
}

impl Phi {
    pub(super) fn new(id: PhiId, block_id: BlockId, output_ref: InstrId) -> Self {
        Self {
            id,
            block_id,
            output_ref,
            links: HashMap::new(),
        }
    }
}
