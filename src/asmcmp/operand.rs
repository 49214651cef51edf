//! The asmcmp operand value union (spec.md §3 "Operand value (asmcmp)").
//!
//! Concrete x86-64 register enumeration is a target-metadata concern
//! (spec.md §1 Non-goals: "target-platform metadata tables" are an external
//! collaborator); `PhysReg` is therefore an opaque index the external
//! `RegisterMnemonic` v-table (spec.md §6, §9) resolves to assembly syntax.

use crate::string_pool::StringId;

use super::entities::{AsmInlineAsmId, LabelId, StashId, VRegId};

/// An opaque physical-register index, resolved to assembly syntax by the
/// codegen's external `register_mnemonic` callback (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysReg(pub u16);

/// An x87 register index (`st(0)`..`st(7)`), kept distinct from the general
/// `PhysReg` space per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X87Index(pub u8);

/// Virtual-register width variant (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VRegWidth {
    Default,
    Bits8,
    Bits16,
    Bits32,
    Bits64,
    Bits80,
    Bits128,
    SingleFp,
    DoubleFp,
}

/// Relocation kind on an external-symbol reference (spec.md §3, §6: "PLT ->
/// `@PLT`, GOTPCREL -> `@GOTPCREL`, TPOFF -> `@TPOFF`, GOTTPOFF ->
/// `@GOTTPOFF`, TLSGD -> `@TLSGD`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    Absolute,
    Plt,
    GotPcRel,
    TpOff,
    GotTpOff,
    TlsGd,
}

impl RelocationKind {
    /// The GAS/Intel syntactic suffix for this relocation kind (spec.md
    /// §6). `Absolute` has none.
    pub fn syntax_suffix(self) -> &'static str {
        match self {
            RelocationKind::Absolute => "",
            RelocationKind::Plt => "@PLT",
            RelocationKind::GotPcRel => "@GOTPCREL",
            RelocationKind::TpOff => "@TPOFF",
            RelocationKind::GotTpOff => "@GOTTPOFF",
            RelocationKind::TlsGd => "@TLSGD",
        }
    }
}

/// An optional segment-register prefix (`%fs:`, `%gs:`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRegister {
    Fs,
    Gs,
}

/// The `basis` of an indirect addressing mode (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectBasis {
    Phys(PhysReg),
    Virt(VRegId),
    InternalLabel(LabelId),
    ExternalLabel { symbol: crate::ir::entities::SymbolId, relocation: RelocationKind },
    LocalVar(i64),
    SpillArea(u32),
    TemporaryArea(u32),
    VarargSaveArea(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indirect {
    pub basis: IndirectBasis,
    pub offset: i64,
    pub width: VRegWidth,
    pub segment: Option<SegmentRegister>,
    /// "widen 32->64 bits when writing to a spill slot" (spec.md §3).
    pub widen_32_to_64: bool,
}

/// RIP-relative indirect addressing (spec.md §3): either an internal label
/// or an external symbol with a relocation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RipRelative {
    InternalLabel(LabelId),
    ExternalSymbol { symbol: crate::ir::entities::SymbolId, relocation: RelocationKind },
}

/// The operand-value tagged union (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    ImmediateInt(i64),
    ImmediateUInt(u64),
    Physical(PhysReg),
    Virtual { vreg: VRegId, width: VRegWidth },
    Indirect(Indirect),
    RipRelative(RipRelative),
    ExternalLabel { symbol: crate::ir::entities::SymbolId, offset: i64, relocation: RelocationKind },
    InternalLabel(LabelId),
    X87(X87Index),
    Stash(StashId),
    InlineAsm(AsmInlineAsmId),
}

impl Operand {
    /// Every `LabelId` this operand cites, used by
    /// [`super::context::AsmcmpContext::replace_labels`].
    pub fn referenced_label(&self) -> Option<LabelId> {
        match self {
            Operand::Indirect(Indirect { basis: IndirectBasis::InternalLabel(l), .. }) => Some(*l),
            Operand::RipRelative(RipRelative::InternalLabel(l)) => Some(*l),
            Operand::InternalLabel(l) => Some(*l),
            _ => None,
        }
    }

    /// Rewrites an operand that cites `from` to cite `to` instead,
    /// returning whether it changed (spec.md §4.6 `replace_labels`).
    pub fn replace_label(&mut self, from: LabelId, to: LabelId) -> bool {
        match self {
            Operand::Indirect(Indirect { basis: IndirectBasis::InternalLabel(l), .. }) if *l == from => {
                *l = to;
                true
            }
            Operand::RipRelative(RipRelative::InternalLabel(l)) if *l == from => {
                *l = to;
                true
            }
            Operand::InternalLabel(l) if *l == from => {
                *l = to;
                true
            }
            _ => false,
        }
    }
}
