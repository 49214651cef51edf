//! Asmcmp labels: first-class table entries attached to an instruction
//! index, or unbound (spec.md §4.6, C8).

use std::collections::BTreeSet;

use super::entities::{AsmInstrId, LabelId};
use crate::string_pool::StringId;

/// `{id, bound, position, prev_label, next_label, public_labels,
/// has_external_dependencies}` (spec.md §4.6). `position` equals the index
/// of the instruction the label precedes; `after_tail` marks a label bound
/// past the last instruction via `bind_after_tail` (end-of-function labels),
/// distinct from `position` being meaningful.
///
/// `prev_label`/`next_label` are maintained by
/// [`super::context::AsmcmpContext::rebuild_label_links`] rather than
/// updated incrementally at every bind/unbind/move — a plain O(n) rebuild
/// on structural mutation is simpler to get right than an amortized
/// sequence-number scheme, and label-table mutation is not hot enough here
/// to need one.
#[derive(Debug, Clone)]
pub struct Label {
    pub bound: bool,
    pub after_tail: bool,
    pub position: AsmInstrId,
    pub prev_label: LabelId,
    pub next_label: LabelId,
    pub public_labels: BTreeSet<StringId>,
    pub has_external_dependencies: bool,
}

impl Label {
    pub fn unbound() -> Self {
        Self {
            bound: false,
            after_tail: false,
            position: AsmInstrId::NONE,
            prev_label: LabelId::NONE,
            next_label: LabelId::NONE,
            public_labels: BTreeSet::new(),
            has_external_dependencies: false,
        }
    }
}
