//! Bytecode Opcode Definitions
//!
//! The fixed instruction table. An opcode byte is the index into this table;
//! opcode values are an eternal contract. Bytes past the end of the table
//! are not errors: the dispatcher executes them as `Halt`.

/// Bytecode opcodes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Nop = 0,

    // Integers
    Push   = 1,
    Pop    = 2,
    Read   = 3,
    Add    = 4,
    Sub    = 5,
    Mul    = 6,
    Div    = 7,
    Mod    = 8,
    IToStr = 9,

    // Control flow and comparison
    Jmp = 10,
    Lt  = 11,
    Gt  = 12,
    Eq  = 13,
    Jnz = 14,
    Jz  = 15,

    // In-place integer ops
    Inc = 16,
    Dec = 17,
    Shl = 18,
    Shr = 19,

    // Stack shuffling
    Cpy  = 20,
    Swap = 21,

    // Strings
    PushS  = 22,
    PopS   = 23,
    ReadS  = 24,
    StrCat = 25,
    StrLen = 26,
    StrToI = 27,
    StrCmp = 28,
    InStr  = 29,

    // Sandboxed files
    WriteFile = 30,
    ReadFile  = 31,

    Halt = 32,
}

/// Operand bytes that follow an opcode in the program stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    /// 8-byte little-endian immediate
    Imm64,
    /// 2-byte little-endian absolute target
    Target16,
    /// 1-byte length followed by that many literal bytes
    Literal,
}

impl OpCode {
    /// Number of defined opcodes
    pub const COUNT: usize = 33;

    pub const ALL: [OpCode; Self::COUNT] = [
        OpCode::Nop,
        OpCode::Push,
        OpCode::Pop,
        OpCode::Read,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::IToStr,
        OpCode::Jmp,
        OpCode::Lt,
        OpCode::Gt,
        OpCode::Eq,
        OpCode::Jnz,
        OpCode::Jz,
        OpCode::Inc,
        OpCode::Dec,
        OpCode::Shl,
        OpCode::Shr,
        OpCode::Cpy,
        OpCode::Swap,
        OpCode::PushS,
        OpCode::PopS,
        OpCode::ReadS,
        OpCode::StrCat,
        OpCode::StrLen,
        OpCode::StrToI,
        OpCode::StrCmp,
        OpCode::InStr,
        OpCode::WriteFile,
        OpCode::ReadFile,
        OpCode::Halt,
    ];

    /// Convert raw byte to opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Push => "push",
            OpCode::Pop => "pop",
            OpCode::Read => "read",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Mod => "mod",
            OpCode::IToStr => "itostr",
            OpCode::Jmp => "jmp",
            OpCode::Lt => "lt",
            OpCode::Gt => "gt",
            OpCode::Eq => "eq",
            OpCode::Jnz => "jnz",
            OpCode::Jz => "jz",
            OpCode::Inc => "inc",
            OpCode::Dec => "dec",
            OpCode::Shl => "shl",
            OpCode::Shr => "shr",
            OpCode::Cpy => "cpy",
            OpCode::Swap => "swap",
            OpCode::PushS => "pushs",
            OpCode::PopS => "pops",
            OpCode::ReadS => "reads",
            OpCode::StrCat => "strcat",
            OpCode::StrLen => "strlen",
            OpCode::StrToI => "strtoi",
            OpCode::StrCmp => "strcmp",
            OpCode::InStr => "instr",
            OpCode::WriteFile => "writefile",
            OpCode::ReadFile => "readfile",
            OpCode::Halt => "halt",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }

    pub fn operand(self) -> OperandKind {
        match self {
            OpCode::Push => OperandKind::Imm64,
            OpCode::Jmp | OpCode::Jnz | OpCode::Jz => OperandKind::Target16,
            OpCode::PushS => OperandKind::Literal,
            _ => OperandKind::None,
        }
    }
}
