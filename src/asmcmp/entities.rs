//! Dense identifiers for the asmcmp context (spec.md §4.6, C8).

use crate::define_id;

define_id! {
    /// An instruction position in the asmcmp linear instruction stream.
    pub struct AsmInstrId;
}

define_id! {
    /// A label, bound or unbound, in an asmcmp context's label table.
    pub struct LabelId;
}

define_id! {
    /// A virtual register in an asmcmp context (any of the kinds in
    /// spec.md §3's "dense virtual-register table").
    pub struct VRegId;
}

define_id! {
    /// A stash describing physical registers to preserve around a call.
    pub struct StashId;
}

define_id! {
    /// An inline-assembly fragment list owned by the asmcmp context.
    pub struct AsmInlineAsmId;
}
