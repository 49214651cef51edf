//! The dead-code elimination pass (spec.md §4.9): "builds the analysis,
//! then calls `drop_dead` with predicates that consult reachability and
//! liveness, and frees the analysis."
//!
//! Grounded in `examples/original_source/source/optimizer/pipeline/dead_code_elimination.c`'s
//! three-phase drop order (spec.md §4.1: instructions, then blocks, then
//! phi-link pruning), which [`CodeContainer::drop_dead`] already implements
//! — this pass only has to supply the liveness/reachability predicate.

use std::collections::HashSet;

use crate::analysis::{CodeLiveness, CodeStructure};
use crate::error::Result;
use crate::ir::code::LivenessIndex;
use crate::ir::entities::{BlockId, InstrId};
use crate::ir::{FunctionId, Module};

use super::pass::{Pass, PassConfig};

/// A snapshot liveness/reachability index built from one analysis run,
/// consumed exactly once by [`crate::ir::code::CodeContainer::drop_dead`].
/// Precomputed as plain sets rather than holding the analysis borrows live,
/// since `drop_dead` takes `&mut CodeContainer` while the analysis borrows
/// `&CodeContainer` (spec.md §3 "Ownership": "The optimizer analysis holds
/// a borrow of its container and is freed before the container").
struct DceIndex {
    alive_blocks: HashSet<BlockId>,
    alive_instrs: HashSet<InstrId>,
    predecessors: std::collections::HashMap<BlockId, HashSet<BlockId>>,
}

impl LivenessIndex for DceIndex {
    fn is_block_alive(&self, block: BlockId) -> bool {
        self.alive_blocks.contains(&block)
    }

    fn is_instruction_alive(&self, instr: InstrId) -> bool {
        self.alive_instrs.contains(&instr)
    }

    fn is_block_predecessor(&self, block: BlockId, maybe_pred: BlockId) -> bool {
        self.predecessors.get(&block).map(|s| s.contains(&maybe_pred)).unwrap_or(false)
    }
}

/// Dead code elimination (spec.md §4.9, C11).
pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dead-code-elimination"
    }

    fn apply(&self, module: &mut Module, function: FunctionId, _config: &PassConfig) -> Result<()> {
        let func = module.function_mut(function)?;
        let entry = func.checked_entry_point()?;

        let structure = CodeStructure::build(&func.code, entry)?;
        let liveness = CodeLiveness::build(&func.code, &structure)?;

        let mut alive_blocks = HashSet::new();
        let mut alive_instrs = HashSet::new();
        let mut predecessors = std::collections::HashMap::new();

        for (block_id, _) in func.code.blocks() {
            if structure.is_reachable_from_entry(block_id) {
                alive_blocks.insert(block_id);
                predecessors.insert(block_id, structure.predecessors(block_id).into_iter().collect());
            }
        }
        for (instr_id, instr) in func.code.instructions() {
            // An instruction in an unreachable block is never alive, even if
            // its own block's liveness sets were never populated (spec.md
            // §8 S1: the whole block is gone, not just trimmed).
            if !alive_blocks.contains(&instr.block_id) {
                continue;
            }
            if liveness.instruction_is_alive(&func.code, &structure, instr_id)? {
                alive_instrs.insert(instr_id);
            }
        }

        // The analysis borrows are dropped here, before `drop_dead` takes
        // `&mut func.code` (spec.md §3 ownership note above).
        drop(liveness);
        drop(structure);

        let index = DceIndex { alive_blocks, alive_instrs, predecessors };
        func.code.drop_dead(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operand::{Immediate, Operand};
    use crate::ir::opcode::Opcode;
    use crate::ir::{SymbolKind, SymbolScope, SymbolVisibility};
    use crate::pipeline::pass::PassConfig;

    fn build_module() -> (Module, FunctionId) {
        let mut module = Module::new();
        let sym = module
            .declare_symbol("f", SymbolKind::Function, SymbolScope::Export, SymbolVisibility::Default)
            .unwrap();
        let decl = module.declare_function(sym, vec![], None, false).unwrap();
        let func_id = module.new_function(decl).unwrap();
        (module, func_id)
    }

    /// S1 — DCE of an unreachable block (spec.md §8): "Module with one
    /// function, two blocks B0 (entry, `return 0`) and B1 (`int_const 42;
    /// return`). After DCE: B1 and its instructions are dropped."
    #[test]
    fn drops_unreachable_block() {
        let (mut module, func_id) = build_module();
        let b1 = {
            let func = module.function_mut(func_id).unwrap();
            let entry = func.entry_point;
            func.code
                .append_instr(entry, Opcode::Return, Operand::Immediate(Immediate::Int(0)))
                .unwrap();
            let b1 = func.code.new_block();
            func.code
                .append_instr(b1, Opcode::IntConst, Operand::Immediate(Immediate::Int(42)))
                .unwrap();
            func.code.append_instr(b1, Opcode::Return, Operand::None).unwrap();
            b1
        };

        DeadCodeElimination.apply(&mut module, func_id, &PassConfig::default()).unwrap();

        let func = module.function(func_id).unwrap();
        assert!(!func.code.is_block_alive_in_table(b1));
    }

    /// Dead-value elimination: an unused pure computation is dropped, its
    /// side-effecting sibling is kept.
    #[test]
    fn drops_dead_pure_value() {
        let (mut module, func_id) = build_module();
        let dead = {
            let func = module.function_mut(func_id).unwrap();
            let entry = func.entry_point;
            let dead = func
                .code
                .append_instr(entry, Opcode::IntConst, Operand::Immediate(Immediate::Int(7)))
                .unwrap();
            func.code.append_instr(entry, Opcode::Return, Operand::None).unwrap();
            dead
        };

        DeadCodeElimination.apply(&mut module, func_id, &PassConfig::default()).unwrap();

        let func = module.function(func_id).unwrap();
        assert!(!func.code.is_instruction_alive_in_table(dead));
    }

    /// Running DCE twice in a row is idempotent (spec.md §8 round-trip
    /// property).
    #[test]
    fn dce_is_idempotent() {
        let (mut module, func_id) = build_module();
        {
            let func = module.function_mut(func_id).unwrap();
            let entry = func.entry_point;
            func.code
                .append_instr(entry, Opcode::IntConst, Operand::Immediate(Immediate::Int(1)))
                .unwrap();
            func.code.append_instr(entry, Opcode::Return, Operand::None).unwrap();
        }
        DeadCodeElimination.apply(&mut module, func_id, &PassConfig::default()).unwrap();
        let after_first = {
            let func = module.function(func_id).unwrap();
            func.code.instructions().count()
        };
        DeadCodeElimination.apply(&mut module, func_id, &PassConfig::default()).unwrap();
        let after_second = {
            let func = module.function(func_id).unwrap();
            func.code.instructions().count()
        };
        assert_eq!(after_first, after_second);
    }
}
