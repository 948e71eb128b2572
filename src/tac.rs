//! Three-address code model (C7): exactly 16-byte instructions, a
//! dedicated file-backed store, and a text disassembler.
//!
//! Decision D3 (DESIGN.md): each operand is 4 bytes, `kind:1 | payload:3`
//! for every kind except `Immediate`, which needs the full 32 bits. The
//! instruction's 2-byte `flags` field (already present per spec §3.6)
//! carries two bits — "operand1 is immediate" / "operand2 is
//! immediate" — so when a bit is set, that operand's 4 bytes are read as
//! a raw little-endian `i32` with no kind byte consumed, and the normal
//! `kind:1|payload:3` layout is skipped entirely for that slot.

use anyhow::{bail, ensure, Result};

use crate::store::{Index, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    // Arithmetic
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Mod = 4,
    Neg = 5,
    // Bitwise
    And = 6,
    Or = 7,
    Xor = 8,
    Shl = 9,
    Shr = 10,
    BitwiseNot = 11,
    // Logical
    Not = 12,
    LogicalAnd = 13,
    LogicalOr = 14,
    // Comparison
    Eq = 15,
    Ne = 16,
    Lt = 17,
    Le = 18,
    Gt = 19,
    Ge = 20,
    // Data movement
    Assign = 21,
    Load = 22,
    Store = 23,
    Addr = 24,
    Index = 25,
    Member = 26,
    MemberPtr = 27,
    // Control flow
    Label = 28,
    Goto = 29,
    IfFalse = 30,
    IfTrue = 31,
    // Calls
    Call = 32,
    Param = 33,
    Return = 34,
    ReturnVoid = 35,
    // Misc
    Cast = 36,
    Sizeof = 37,
    Phi = 38,
    Nop = 39,
}

impl Opcode {
    pub fn from_u16(raw: u16) -> Result<Self> {
        use Opcode::*;
        Ok(match raw {
            0 => Add,
            1 => Sub,
            2 => Mul,
            3 => Div,
            4 => Mod,
            5 => Neg,
            6 => And,
            7 => Or,
            8 => Xor,
            9 => Shl,
            10 => Shr,
            11 => BitwiseNot,
            12 => Not,
            13 => LogicalAnd,
            14 => LogicalOr,
            15 => Eq,
            16 => Ne,
            17 => Lt,
            18 => Le,
            19 => Gt,
            20 => Ge,
            21 => Assign,
            22 => Load,
            23 => Store,
            24 => Addr,
            25 => Index,
            26 => Member,
            27 => MemberPtr,
            28 => Label,
            29 => Goto,
            30 => IfFalse,
            31 => IfTrue,
            32 => Call,
            33 => Param,
            34 => Return,
            35 => ReturnVoid,
            36 => Cast,
            37 => Sizeof,
            38 => Phi,
            39 => Nop,
            other => bail!("invalid: unknown opcode {other}"),
        })
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod | Opcode::Neg)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge
        )
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Shl => "SHL",
            Shr => "SHR",
            BitwiseNot => "BNOT",
            Not => "NOT",
            LogicalAnd => "LAND",
            LogicalOr => "LOR",
            Eq => "EQ",
            Ne => "NE",
            Lt => "LT",
            Le => "LE",
            Gt => "GT",
            Ge => "GE",
            Assign => "ASSIGN",
            Load => "LOAD",
            Store => "STORE",
            Addr => "ADDR",
            Index => "INDEX",
            Member => "MEMBER",
            MemberPtr => "MEMBER_PTR",
            Label => "LABEL",
            Goto => "GOTO",
            IfFalse => "IF_FALSE",
            IfTrue => "IF_TRUE",
            Call => "CALL",
            Param => "PARAM",
            Return => "RETURN",
            ReturnVoid => "RETURN_VOID",
            Cast => "CAST",
            Sizeof => "SIZEOF",
            Phi => "PHI",
            Nop => "NOP",
        }
    }
}

/// A TAC operand. `Immediate` is handled specially at encode/decode time
/// (see module docs); every other variant packs into `kind:1|payload:3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    Temp { id: u16, scope: u8 },
    Var { id: u16, scope: u8 },
    Immediate(i32),
    Label(u16),
    Function(u16),
    Global(u16),
    Param(u16),
    ReturnVal,
}

impl Operand {
    fn kind_byte(self) -> u8 {
        match self {
            Operand::None => 0,
            Operand::Temp { .. } => 1,
            Operand::Var { .. } => 2,
            Operand::Immediate(_) => 3,
            Operand::Label(_) => 4,
            Operand::Function(_) => 5,
            Operand::Global(_) => 6,
            Operand::Param(_) => 7,
            Operand::ReturnVal => 8,
        }
    }

    /// Encodes this operand into its 4-byte slot, returning whether the
    /// instruction's "is immediate" flag bit for this slot should be set.
    fn encode(self) -> ([u8; 4], bool) {
        let mut buf = [0u8; 4];
        if let Operand::Immediate(value) = self {
            buf.copy_from_slice(&value.to_le_bytes());
            return (buf, true);
        }
        buf[0] = self.kind_byte();
        match self {
            Operand::None | Operand::ReturnVal | Operand::Immediate(_) => {}
            Operand::Temp { id, scope } | Operand::Var { id, scope } => {
                buf[1..3].copy_from_slice(&id.to_le_bytes());
                buf[3] = scope;
            }
            Operand::Label(id) | Operand::Function(id) | Operand::Global(id) | Operand::Param(id) => {
                buf[1..3].copy_from_slice(&id.to_le_bytes());
            }
        }
        (buf, false)
    }

    fn decode(buf: [u8; 4], is_immediate: bool) -> Result<Self> {
        if is_immediate {
            return Ok(Operand::Immediate(i32::from_le_bytes(buf)));
        }
        let id16 = || u16::from_le_bytes([buf[1], buf[2]]);
        Ok(match buf[0] {
            0 => Operand::None,
            1 => Operand::Temp { id: id16(), scope: buf[3] },
            2 => Operand::Var { id: id16(), scope: buf[3] },
            3 => bail!("invalid: immediate-kind byte without the immediate flag set"),
            4 => Operand::Label(id16()),
            5 => Operand::Function(id16()),
            6 => Operand::Global(id16()),
            7 => Operand::Param(id16()),
            8 => Operand::ReturnVal,
            other => bail!("invalid: unknown operand kind {other}"),
        })
    }

    pub fn is_temp_or_var(self) -> bool {
        matches!(self, Operand::Temp { .. } | Operand::Var { .. })
    }
}

const FLAG_OPERAND1_IMMEDIATE: u16 = 1 << 0;
const FLAG_OPERAND2_IMMEDIATE: u16 = 1 << 1;

/// One 16-byte TAC instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TacInstruction {
    pub opcode: Opcode,
    pub result: Operand,
    pub operand1: Operand,
    pub operand2: Operand,
}

impl TacInstruction {
    pub fn new(opcode: Opcode, result: Operand, operand1: Operand, operand2: Operand) -> Self {
        TacInstruction { opcode, result, operand1, operand2 }
    }

    pub fn label(label_id: u16) -> Self {
        Self::new(Opcode::Label, Operand::None, Operand::Label(label_id), Operand::None)
    }

    pub fn goto_label(label_id: u16) -> Self {
        Self::new(Opcode::Goto, Operand::None, Operand::Label(label_id), Operand::None)
    }

    pub fn if_false(cond: Operand, label_id: u16) -> Self {
        Self::new(Opcode::IfFalse, Operand::None, cond, Operand::Label(label_id))
    }

    pub fn if_true(cond: Operand, label_id: u16) -> Self {
        Self::new(Opcode::IfTrue, Operand::None, cond, Operand::Label(label_id))
    }

    pub fn assign(dst: Operand, src: Operand) -> Self {
        Self::new(Opcode::Assign, dst, src, Operand::None)
    }

    pub fn binary(opcode: Opcode, result: Operand, left: Operand, right: Operand) -> Self {
        Self::new(opcode, result, left, right)
    }

    pub fn unary(opcode: Opcode, result: Operand, operand: Operand) -> Self {
        Self::new(opcode, result, operand, Operand::None)
    }

    pub fn param(value: Operand) -> Self {
        Self::new(Opcode::Param, Operand::None, value, Operand::None)
    }

    pub fn call(result: Operand, label_id: u16) -> Self {
        Self::new(Opcode::Call, result, Operand::Label(label_id), Operand::None)
    }

    pub fn ret(value: Operand) -> Self {
        Self::new(Opcode::Return, Operand::None, value, Operand::None)
    }

    pub fn ret_void() -> Self {
        Self::new(Opcode::ReturnVoid, Operand::None, Operand::None, Operand::None)
    }

    pub fn nop() -> Self {
        Self::new(Opcode::Nop, Operand::None, Operand::None, Operand::None)
    }

    pub fn load(dst: Operand, address: Operand) -> Self {
        Self::new(Opcode::Load, dst, address, Operand::None)
    }

    pub fn store(address: Operand, value: Operand) -> Self {
        Self::new(Opcode::Store, Operand::None, address, value)
    }

    pub fn addr(dst: Operand, base: Operand, offset: Operand) -> Self {
        Self::new(Opcode::Addr, dst, base, offset)
    }

    pub fn index(dst: Operand, base: Operand, element_index: Operand) -> Self {
        Self::new(Opcode::Index, dst, base, element_index)
    }
}

impl Record for TacInstruction {
    const SIZE: usize = 16;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&(self.opcode as u16).to_le_bytes());

        let (result_bytes, result_imm) = self.result.encode();
        ensure!(!result_imm, "invalid: result operand may not be an immediate (spec §4.7.5)");
        let (op1_bytes, op1_imm) = self.operand1.encode();
        let (op2_bytes, op2_imm) = self.operand2.encode();

        let mut flags = 0u16;
        if op1_imm {
            flags |= FLAG_OPERAND1_IMMEDIATE;
        }
        if op2_imm {
            flags |= FLAG_OPERAND2_IMMEDIATE;
        }
        buf.extend_from_slice(&flags.to_le_bytes());
        buf.extend_from_slice(&result_bytes);
        buf.extend_from_slice(&op1_bytes);
        buf.extend_from_slice(&op2_bytes);
        Ok(buf)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() == 16, "invalid-param: bad TAC record length");
        let opcode = Opcode::from_u16(u16::from_le_bytes(bytes[0..2].try_into().unwrap()))?;
        let flags = u16::from_le_bytes(bytes[2..4].try_into().unwrap());
        let result = Operand::decode(bytes[4..8].try_into().unwrap(), false)?;
        let operand1 = Operand::decode(
            bytes[8..12].try_into().unwrap(),
            flags & FLAG_OPERAND1_IMMEDIATE != 0,
        )?;
        let operand2 = Operand::decode(
            bytes[12..16].try_into().unwrap(),
            flags & FLAG_OPERAND2_IMMEDIATE != 0,
        )?;
        Ok(TacInstruction { opcode, result, operand1, operand2 })
    }
}

pub type TacStore = crate::store::FileStore<TacInstruction>;

/// `Index` into the TAC store, as opposed to an AST/symbol `Index` — kept
/// as a type alias for readability at call sites in the translator/engine.
pub type TacAddress = Index;

fn fmt_operand(op: Operand) -> String {
    match op {
        Operand::None => "-".to_string(),
        Operand::Temp { id, scope } => format!("t{id}@{scope}"),
        Operand::Var { id, scope } => format!("v{id}@{scope}"),
        Operand::Immediate(v) => format!("#{v}"),
        Operand::Label(id) => format!("L{id}"),
        Operand::Function(id) => format!("fn{id}"),
        Operand::Global(id) => format!("g{id}"),
        Operand::Param(id) => format!("p{id}"),
        Operand::ReturnVal => "retval".to_string(),
    }
}

/// Renders one instruction as `disassembly` text, used by `cc2`'s
/// `tac.txt` output and by `cc1t`-style inspection tools.
pub fn disassemble_one(address: u32, instr: &TacInstruction) -> String {
    let mnemonic = instr.opcode.mnemonic();
    match instr.opcode {
        Opcode::Label => format!("{address:04}: {mnemonic} {}", fmt_operand(instr.operand1)),
        Opcode::Goto => format!("{address:04}: {mnemonic} {}", fmt_operand(instr.operand1)),
        Opcode::IfFalse | Opcode::IfTrue => format!(
            "{address:04}: {mnemonic} {}, {}",
            fmt_operand(instr.operand1),
            fmt_operand(instr.operand2)
        ),
        Opcode::Param => format!("{address:04}: {mnemonic} {}", fmt_operand(instr.operand1)),
        Opcode::Return => format!("{address:04}: {mnemonic} {}", fmt_operand(instr.operand1)),
        Opcode::ReturnVoid | Opcode::Nop => format!("{address:04}: {mnemonic}"),
        Opcode::Call => format!(
            "{address:04}: {} = {mnemonic} {}",
            fmt_operand(instr.result),
            fmt_operand(instr.operand1)
        ),
        _ if instr.result == Operand::None => format!(
            "{address:04}: {mnemonic} {}, {}",
            fmt_operand(instr.operand1),
            fmt_operand(instr.operand2)
        ),
        _ => format!(
            "{address:04}: {} = {mnemonic} {}, {}",
            fmt_operand(instr.result),
            fmt_operand(instr.operand1),
            fmt_operand(instr.operand2)
        ),
    }
}
