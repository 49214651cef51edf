//! The instruction operand union (spec.md §3 "Instruction").
//!
//! Cranelift represents this family of shapes with `InstructionData`'s
//! per-opcode-format enum (`ir/instructions.rs`); we follow the same
//! "one variant per operand shape, exhaustively matched" discipline.

use smallvec::SmallVec;

use super::entities::{BlockId, CallId, InlineAsmId, InstrId, PhiId, StringLiteralId, SymbolId, TypeId};

/// Up to three direct instruction-result references, the common case for
/// arithmetic/comparison/cast opcodes.
pub type RefList = SmallVec<[InstrId; 3]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionVariant {
    /// The condition operand itself is the boolean value tested.
    Direct,
    /// The condition operand is compared using `comparison`.
    Compare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThanUnsigned,
    LessOrEqualUnsigned,
    GreaterThanUnsigned,
    GreaterOrEqualUnsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrder {
    Relaxed,
    Acquire,
    Release,
    AcquireRelease,
    SequentiallyConsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringElementType {
    Multibyte,
    Utf8,
    Utf16,
    Utf32,
    Wide,
}

/// `imm{int|uint|f32|f64|long_double|string_ref|block_ref}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    /// Represented bit-for-bit; x86-64 long double is 80-bit extended
    /// precision, which has no native Rust type.
    LongDouble([u8; 10]),
    StringRef(StringLiteralId),
    /// The address of a block, used for `goto`-into-asm / computed jumps.
    BlockRef(BlockId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub location_ref: InstrId,
    pub value_ref: Option<InstrId>,
    pub volatile: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitfield {
    pub base_ref: InstrId,
    pub value_ref: InstrId,
    pub offset: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    pub target_block: BlockId,
    pub alt_block: Option<BlockId>,
    pub condition_ref: Option<InstrId>,
    pub condition_variant: ConditionVariant,
    pub comparison: Option<Comparison>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackAllocation {
    pub size_ref: InstrId,
    pub align_ref: InstrId,
    pub within_scope: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCall {
    pub call_ref: CallId,
    pub indirect_ref: Option<InstrId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicOp {
    pub refs: [InstrId; 3],
    pub memory_order: MemoryOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub global_ref: SymbolId,
    pub offset: i64,
}

/// The operand payload, tagged by opcode family (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Refs(RefList),
    Type(TypeId, u32),
    MemoryAccess(MemoryAccess),
    Bitfield(Bitfield),
    Branch(Branch),
    StackAllocation(StackAllocation),
    FunctionCall(FunctionCall),
    AtomicOp(AtomicOp),
    Variable(Variable),
    Phi(PhiId),
    InlineAsm(InlineAsmId),
    Immediate(Immediate),
    /// Zero-operand instructions (e.g. `unreachable`, a bare fence).
    None,
}

impl Operand {
    /// Every `instruction_ref` this operand cites directly, in canonical
    /// order — used by [`super::code::CodeContainer::trace`] and the use-def
    /// verifier (spec.md §4.1).
    pub fn for_each_input(&self, mut visit: impl FnMut(InstrId)) {
        match self {
            Operand::Refs(refs) => refs.iter().for_each(|&r| visit(r)),
            Operand::MemoryAccess(m) => {
                visit(m.location_ref);
                if let Some(v) = m.value_ref {
                    visit(v);
                }
            }
            Operand::Bitfield(b) => {
                visit(b.base_ref);
                visit(b.value_ref);
            }
            Operand::Branch(b) => {
                if let Some(c) = b.condition_ref {
                    visit(c);
                }
            }
            Operand::StackAllocation(s) => {
                visit(s.size_ref);
                visit(s.align_ref);
            }
            Operand::FunctionCall(c) => {
                if let Some(i) = c.indirect_ref {
                    visit(i);
                }
            }
            Operand::AtomicOp(a) => a.refs.iter().for_each(|&r| visit(r)),
            Operand::Variable(_) | Operand::Type(..) | Operand::Phi(_) | Operand::InlineAsm(_) | Operand::Immediate(_) | Operand::None => {}
        }
    }

    pub fn branch_targets(&self) -> SmallVec<[BlockId; 2]> {
        let mut out = SmallVec::new();
        if let Operand::Branch(b) = self {
            out.push(b.target_block);
            if let Some(alt) = b.alt_block {
                out.push(alt);
            }
        }
        out
    }
}
