//! Use-def verification (spec.md §4.1 `trace`, §8 scenario S6; detail from
//! `examples/original_source/source/optimizer/analysis/use_def.c`).
//!
//! `verify_use_def` walks every operand of every instruction via
//! [`CodeContainer::trace`], checking that the defining block of a use
//! dominates the block of the use — except for a phi link, where the
//! relevant relationship is that the defining block dominates the
//! *predecessor* the link is keyed by, not the phi's own block.

use crate::analysis::structure::CodeStructure;
use crate::error::{Error, Result};
use crate::ir::code::CodeContainer;
use crate::ir::entities::BlockId;

/// Verifies that every instruction's uses are dominated by their defs
/// (spec.md §8 S6: "`verify_use_def` returns `invalid-state` with a message
/// citing X and Y").
pub fn verify_use_def(code: &CodeContainer, structure: &CodeStructure, block_order: &[BlockId]) -> Result<()> {
    let mut error: Option<Error> = None;
    code.trace(block_order, |user, def| {
        if error.is_some() || def.is_none() {
            return;
        }
        let (user_block, def_block) = match (code.instr(user), code.instr(def)) {
            (Ok(u), Ok(d)) => (u.block_id, d.block_id),
            _ => return,
        };
        if !structure.is_reachable_from_entry(user_block) {
            return;
        }
        let dominates = if def_block == user_block {
            // Same-block uses are valid regardless of dominance as long as
            // the def textually precedes the use; `trace`'s block-order
            // traversal already guarantees that for non-phi users.
            true
        } else {
            structure.is_dominator(user_block, def_block)
        };
        if !dominates {
            error = Some(Error::InvalidState(format!(
                "use-def violation: instruction {user:?} in block {user_block:?} uses instruction {def:?} \
                 defined in block {def_block:?}, which does not dominate it"
            )));
        }
    })?;
    if let Some(err) = error {
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operand::{Branch, ConditionVariant, Operand};
    use crate::ir::opcode::Opcode;

    /// S6 — a use with no dominance relationship between def and use block.
    #[test]
    fn non_dominating_use_rejected() {
        let mut code = CodeContainer::new();
        let entry = code.new_block();
        let b1 = code.new_block();
        let b2 = code.new_block();
        let join = code.new_block();

        code.append_instr(
            entry,
            Opcode::Branch,
            Operand::Branch(Branch {
                target_block: b1,
                alt_block: Some(b2),
                condition_ref: None,
                condition_variant: ConditionVariant::Direct,
                comparison: None,
            }),
        )
        .unwrap();
        let y = code
            .append_instr(b2, Opcode::IntConst, Operand::Immediate(crate::ir::operand::Immediate::Int(1)))
            .unwrap();
        code.append_instr(
            b2,
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
        // x (in b1) illegally uses y (defined in the sibling block b2).
        let _x = code.append_instr(b1, Opcode::Neg, Operand::Refs(smallvec::smallvec![y])).unwrap();
        code.append_instr(
            b1,
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
        code.append_instr(join, Opcode::Return, Operand::None).unwrap();

        let structure = CodeStructure::build(&code, entry).unwrap();
        let order = vec![entry, b1, b2, join];
        assert!(matches!(verify_use_def(&code, &structure, &order), Err(Error::InvalidState(_))));
    }

    #[test]
    fn dominating_use_accepted() {
        let mut code = CodeContainer::new();
        let entry = code.new_block();
        let x = code
            .append_instr(entry, Opcode::IntConst, Operand::Immediate(crate::ir::operand::Immediate::Int(1)))
            .unwrap();
        let child = code.new_block();
        code.append_instr(
            entry,
            Opcode::Jump,
            Operand::Branch(Branch {
                target_block: child,
                alt_block: None,
                condition_ref: None,
                condition_variant: ConditionVariant::Direct,
                comparison: None,
            }),
        )
        .unwrap();
        code.append_instr(child, Opcode::Return, Operand::Refs(smallvec::smallvec![x])).unwrap();
        let structure = CodeStructure::build(&code, entry).unwrap();
        let order = vec![entry, child];
        assert!(verify_use_def(&code, &structure, &order).is_ok());
    }
}
