//! Opcodes and their control-flow / side-effect classification (spec.md
//! §4.1: `append_instr` "classif[ies instructions] as control flow
//! (terminators, memory side-effecting ops, calls, `get_argument`, volatile
//! loads, fences, inline-asm with side effects)").

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Arithmetic / bitwise / comparison — pure.
    IntConst,
    F32Const,
    F64Const,
    Add,
    Sub,
    Mul,
    Div,
    Cmp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Neg,
    Not,
    Cast,
    Bitcast,
    ExtractBitfield,
    InsertBitfield,

    // Memory.
    Load,
    VolatileLoad,
    Store,
    Fence,
    StackAlloc,
    AtomicLoad,
    AtomicStore,
    AtomicRmw,
    AtomicCmpxchg,

    // Function-local control-flow-adjacent.
    GetArgument,
    GetGlobal,
    Phi,

    // Calls.
    Call,
    IndirectCall,
    TailCall,

    // Terminators.
    Jump,
    Branch,
    Return,
    Unreachable,
    Ijump,

    InlineAsm,
}

impl Opcode {
    /// Whether this opcode is classified as control flow: "terminators,
    /// memory side-effecting ops, calls, `get_argument`, volatile loads,
    /// fences, inline-asm with side effects" (spec.md §4.1). Inline-asm's
    /// side-effect status depends on the node, not the opcode alone, and is
    /// handled by the caller.
    pub fn is_control_flow(self) -> bool {
        matches!(
            self,
            Opcode::VolatileLoad
                | Opcode::Store
                | Opcode::Fence
                | Opcode::AtomicLoad
                | Opcode::AtomicStore
                | Opcode::AtomicRmw
                | Opcode::AtomicCmpxchg
                | Opcode::GetArgument
                | Opcode::Call
                | Opcode::IndirectCall
                | Opcode::TailCall
                | Opcode::Jump
                | Opcode::Branch
                | Opcode::Return
                | Opcode::Unreachable
                | Opcode::Ijump
        )
    }

    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jump
                | Opcode::Branch
                | Opcode::Return
                | Opcode::Unreachable
                | Opcode::TailCall
                | Opcode::Ijump
        )
    }

    /// An instruction is side-effect free when it is pure data computation:
    /// no memory write, no control transfer, no call. Used to set
    /// `control_side_effect_free` and by DCE / liveness.
    pub fn is_side_effect_free(self) -> bool {
        !self.is_control_flow()
    }

    pub fn is_pure_load(self) -> bool {
        matches!(self, Opcode::Load)
    }
}
