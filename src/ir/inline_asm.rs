//! `Inline-assembly node` — spec.md §3.

use std::collections::HashMap;

use super::entities::{BlockId, InlineAsmId, InstrId};

#[derive(Debug, Clone, Default)]
pub struct InlineAsmParameter {
    pub load_store_ref: Option<InstrId>,
    pub read_ref: Option<InstrId>,
}

#[derive(Debug, Clone)]
pub struct InlineAsm {
    pub id: InlineAsmId,
    pub block_id: BlockId,
    pub template: String,
    pub parameters: Vec<InlineAsmParameter>,
    pub default_jump_target: Option<BlockId>,
    /// external_id -> target_block.
    pub jump_targets: HashMap<u32, BlockId>,
    /// Whether this inline-asm node has an observable side effect and must
    /// therefore join the block's control-flow sibling list (spec.md §4.1).
    pub has_side_effects: bool,
}

impl InlineAsm {
    pub(super) fn new(id: InlineAsmId, block_id: BlockId, template: String) -> Self {
        Self {
            id,
            block_id,
            template,
            parameters: Vec::new(),
            default_jump_target: None,
            jump_targets: HashMap::new(),
            has_side_effects: true,
        }
    }

    pub fn has_jump_targets(&self) -> bool {
        self.default_jump_target.is_some() || !self.jump_targets.is_empty()
    }
}
