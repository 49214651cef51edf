//! Dense identifiers for the optimizer IR container (spec.md §3, C3).
//!
//! Mirrors the shape of `cranelift-codegen/src/ir/entities.rs`'s `Block` /
//! `Value` / `Inst` newtypes, but exposes a literal `NONE` sentinel (see
//! [`crate::containers::Id`]) instead of leaning on `PackedOption`, because
//! the spec's linked-list siblings (`control_flow_prev`/`next`, phi links,
//! block predecessor discovery) are specified directly in terms of it.

use crate::define_id;

define_id! {
    /// A basic block in a function's `CodeContainer`.
    pub struct BlockId;
}

define_id! {
    /// An instruction in a function's `CodeContainer`. Operands that refer
    /// to another instruction's result use this as `instruction_ref`.
    pub struct InstrId;
}

define_id! {
    /// A phi node, owning its predecessor -> incoming-instruction link map.
    pub struct PhiId;
}

define_id! {
    /// A call node, owning an ordered argument vector.
    pub struct CallId;
}

define_id! {
    /// An inline-assembly node.
    pub struct InlineAsmId;
}

define_id! {
    /// A named identifier in a `Module` (function, global-data or
    /// thread-local-data).
    pub struct SymbolId;
}

define_id! {
    /// A type in a `Module`'s type set.
    pub struct TypeId;
}

define_id! {
    /// A named data object in a `Module`.
    pub struct DataId;
}

define_id! {
    /// A string literal in a `Module`'s string-literal set.
    pub struct StringLiteralId;
}

define_id! {
    /// A function declaration (signature + linkage) in a `Module`.
    pub struct FunctionDeclarationId;
}

define_id! {
    /// A function body (`Function`, owning a `CodeContainer`) in a `Module`.
    pub struct FunctionId;
}
