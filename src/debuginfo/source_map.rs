//! `SourceMap` — an index-keyed interval tree of source locations, and the
//! per-function singly-linked list of contiguous source-location runs
//! (spec.md §4.7).

use crate::containers::IntervalTree;
use crate::error::{Result, SourceLocation};
use crate::ir::entities::InstrId;

/// Maps an index interval (instruction index for the optimizer IR, linear
/// instruction index for asmcmp) to the source location it was raised from.
#[derive(Default)]
pub struct SourceMap {
    tree: IntervalTree<SourceLocation>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { tree: IntervalTree::new() }
    }

    pub fn attach(&mut self, begin: u64, end: u64, location: SourceLocation) -> Result<()> {
        self.tree.insert(begin, end, location)
    }

    pub fn lookup(&self, point: u64) -> Option<&SourceLocation> {
        self.tree.lookup(point)
    }

    pub fn remove_range(&mut self, begin: u64, end: u64) {
        self.tree.remove_all_in(begin, end);
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64, &SourceLocation)> {
        self.tree.iter()
    }
}

/// One contiguous run of instructions sharing a single source location,
/// starting at `first_instr` (in textual/schedule order) and extending until
/// the next run's `first_instr` (or the end of the function). Emitters that
/// need contiguous line-table runs walk this list rather than querying the
/// interval tree instruction-by-instruction (spec.md §4.7).
pub struct DebugSourceRun {
    pub location: SourceLocation,
    pub first_instr: InstrId,
    pub next: Option<Box<DebugSourceRun>>,
}

impl DebugSourceRun {
    pub fn new(location: SourceLocation, first_instr: InstrId) -> Self {
        Self { location, first_instr, next: None }
    }

    /// Appends a new run to the tail of the list headed by `head` (or starts
    /// one), returning the (possibly new) head.
    pub fn push_tail(head: Option<Box<DebugSourceRun>>, location: SourceLocation, first_instr: InstrId) -> Box<DebugSourceRun> {
        match head {
            None => Box::new(DebugSourceRun::new(location, first_instr)),
            Some(mut head) => {
                let mut cur = &mut head;
                while cur.next.is_some() {
                    cur = cur.next.as_mut().unwrap();
                }
                cur.next = Some(Box::new(DebugSourceRun::new(location, first_instr)));
                head
            }
        }
    }

    pub fn iter(head: &Option<Box<DebugSourceRun>>) -> impl Iterator<Item = &DebugSourceRun> {
        let mut cur = head.as_deref();
        std::iter::from_fn(move || {
            let node = cur?;
            cur = node.next.as_deref();
            Some(node)
        })
    }
}
