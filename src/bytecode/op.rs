use num_enum::{IntoPrimitive, TryFromPrimitive};

// =============================================================================
// OPCODE - one byte, followed by 0, 1 or 2 operand bytes
// =============================================================================

/// Reserved code address of the `read` I/O routine.
pub const READ_OFFSET: u16 = 32766;

/// Reserved code address of the `write` I/O routine.
pub const WRITE_OFFSET: u16 = 32767;

/// Lowest reserved code address. A CALL at or above this is an I/O trap.
pub const IO_BASE: u16 = READ_OFFSET;

/// Width of an instruction's operand, fixed per opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// Signed byte: argument/result word counts.
    Byte,
    /// Signed big-endian 16-bit word: addresses and literals.
    Word,
}

impl Operand {
    pub fn len(self) -> usize {
        match self {
            Operand::None => 0,
            Operand::Byte => 1,
            Operand::Word => 2,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Opcode {
    // storage
    /// `( -- w )` push the word at global address d.
    LoadG = 0,
    /// `( w -- )` store into global address d.
    StoreG = 1,
    /// `( -- w )` push the word at fp+d.
    LoadL = 2,
    /// `( w -- )` store into fp+d.
    StoreL = 3,
    /// `( -- w )` push a literal.
    LoadC = 4,

    // arithmetic
    Add = 6,
    Sub = 7,
    Mul = 8,
    Div = 9,

    // comparison, pushes 1 or 0
    CmpEq = 10,
    CmpLt = 12,
    CmpGt = 13,

    /// `( w -- w==0 )`
    Inv = 14,
    /// `( w -- w+1 )`
    Inc = 15,

    Halt = 16,

    // control
    Jump = 17,
    JumpF = 18,
    JumpT = 19,
    Call = 20,
    Return = 21,
    CopyArg = 22,
}

impl Opcode {
    pub fn operand(self) -> Operand {
        use Opcode::*;
        match self {
            LoadG | StoreG | LoadL | StoreL | LoadC => Operand::Word,
            Jump | JumpF | JumpT | Call => Operand::Word,
            Return | CopyArg => Operand::Byte,
            Add | Sub | Mul | Div | CmpEq | CmpLt | CmpGt | Inv | Inc | Halt => Operand::None,
        }
    }

    /// Total instruction width in bytes, opcode included.
    pub fn width(self) -> usize {
        1 + self.operand().len()
    }

    /// True for the opcodes whose word operand is a code address.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::JumpF | Opcode::JumpT | Opcode::Call
        )
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            LoadG => "LOADG",
            StoreG => "STOREG",
            LoadL => "LOADL",
            StoreL => "STOREL",
            LoadC => "LOADC",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            CmpEq => "CMPEQ",
            CmpLt => "CMPLT",
            CmpGt => "CMPGT",
            Inv => "INV",
            Inc => "INC",
            Halt => "HALT",
            Jump => "JUMP",
            JumpF => "JUMPF",
            JumpT => "JUMPT",
            Call => "CALL",
            Return => "RETURN",
            CopyArg => "COPYARG",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.mnemonic())
    }
}
