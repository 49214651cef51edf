//! `Function` — the optimizer-IR body of one function (spec.md §3, §4.1).

use crate::debuginfo::{DebugSourceRun, SourceMap};
use crate::error::{Error, Result, SourceLocation};

use super::code::CodeContainer;
use super::entities::{BlockId, FunctionDeclarationId, FunctionId, InstrId};

/// Per-function debug info: "subprogram id, source-location range,
/// per-instruction source map stored as an interval tree keyed by
/// instruction index" (spec.md §3), plus the singly-linked run list from
/// §4.7.
#[derive(Default)]
pub struct FunctionDebugInfo {
    pub subprogram: crate::debuginfo::DebugEntryId,
    pub source_range: Option<(SourceLocation, SourceLocation)>,
    pub source_map: SourceMap,
    pub source_runs: Option<Box<DebugSourceRun>>,
}

impl FunctionDebugInfo {
    pub fn new() -> Self {
        Self {
            subprogram: crate::debuginfo::DebugEntryId::NONE,
            source_range: None,
            source_map: SourceMap::new(),
            source_runs: None,
        }
    }

    pub fn record_location(&mut self, instr_index: u64, location: SourceLocation) -> Result<()> {
        self.source_map.attach(instr_index, instr_index + 1, location)
    }

    /// Appends a contiguous run starting at `first_instr`, used once the
    /// scheduler has fixed a linear order (spec.md §4.7).
    pub fn push_run(&mut self, location: SourceLocation, first_instr: InstrId) {
        let head = self.source_runs.take();
        self.source_runs = Some(DebugSourceRun::push_tail(head, location, first_instr));
    }
}

pub struct Function {
    pub id: FunctionId,
    pub declaration: FunctionDeclarationId,
    pub code: CodeContainer,
    pub entry_point: BlockId,
    pub debug_info: FunctionDebugInfo,
}

impl Function {
    pub(super) fn new(id: FunctionId, declaration: FunctionDeclarationId) -> Self {
        let mut code = CodeContainer::new();
        let entry_point = code.new_block();
        Self {
            id,
            declaration,
            code,
            entry_point,
            debug_info: FunctionDebugInfo::new(),
        }
    }

    /// Fails with `invalid-state` if the entry block has been dropped out
    /// from under the function (spec.md §7: a caller contract violation, not
    /// a structural bug, since only the caller can orphan the entry point).
    pub fn checked_entry_point(&self) -> Result<BlockId> {
        if self.code.is_block_alive_in_table(self.entry_point) {
            Ok(self.entry_point)
        } else {
            Err(Error::InvalidState("function entry point has been removed".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_function_has_live_entry_block() {
        let f = Function::new(FunctionId::from_index(0), FunctionDeclarationId::from_index(0));
        assert!(f.code.is_block_alive_in_table(f.entry_point));
        assert_eq!(f.checked_entry_point().unwrap(), f.entry_point);
    }
}
