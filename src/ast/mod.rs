//! AST node model (C6): exactly 24-byte tagged-variant records.
//!
//! See DESIGN.md decision D2 for how the 14-byte payload fits the seven
//! variants named in spec §3.4.2 and the sibling-chaining convention of
//! §3.4.3.

pub mod builder;

use anyhow::{bail, ensure, Context, Result};

use crate::store::{Index, Record};
use crate::strings::StringOffset;
use crate::token::TokenKind;

/// Node kind. Numeric ranges define the category (spec §3.4.1); category
/// membership is derived from the range, never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NodeKind {
    Free = 0,
    Program = 1,
    TranslationUnit = 2,
    Eof = 3,
    Error = 4,

    FunctionDecl = 10,
    FunctionDef = 11,
    VarDecl = 12,
    ParamDecl = 13,
    FieldDecl = 14,
    TypedefDecl = 15,
    StructDecl = 16,
    UnionDecl = 17,
    EnumDecl = 18,
    EnumConstant = 19,

    TypeBasic = 30,
    TypePointer = 31,
    TypeArray = 32,
    TypeFunction = 33,
    TypeStruct = 34,
    TypeUnion = 35,
    TypeEnum = 36,
    TypeTypedef = 37,
    TypeQualifier = 38,
    TypeStorageClass = 39,

    Compound = 50,
    ExprStmt = 51,
    If = 52,
    While = 53,
    For = 54,
    DoWhile = 55,
    Switch = 56,
    Case = 57,
    Default = 58,
    Break = 59,
    Continue = 60,
    Return = 61,
    Goto = 62,
    Label = 63,
    Empty = 64,

    Literal = 80,
    Identifier = 81,
    BinaryOp = 82,
    UnaryOp = 83,
    Assign = 84,
    Call = 85,
    Member = 86,
    MemberPtr = 87,
    IndexExpr = 88,
    Cast = 89,
    Sizeof = 90,
    Conditional = 91,
    Comma = 92,
    InitList = 93,
    CompoundLiteral = 94,

    LiteralInt = 130,
    LiteralFloat = 131,
    LiteralChar = 132,
    LiteralString = 133,
}

impl NodeKind {
    pub fn from_u16(raw: u16) -> Result<Self> {
        use NodeKind::*;
        Ok(match raw {
            0 => Free,
            1 => Program,
            2 => TranslationUnit,
            3 => Eof,
            4 => Error,
            10 => FunctionDecl,
            11 => FunctionDef,
            12 => VarDecl,
            13 => ParamDecl,
            14 => FieldDecl,
            15 => TypedefDecl,
            16 => StructDecl,
            17 => UnionDecl,
            18 => EnumDecl,
            19 => EnumConstant,
            30 => TypeBasic,
            31 => TypePointer,
            32 => TypeArray,
            33 => TypeFunction,
            34 => TypeStruct,
            35 => TypeUnion,
            36 => TypeEnum,
            37 => TypeTypedef,
            38 => TypeQualifier,
            39 => TypeStorageClass,
            50 => Compound,
            51 => ExprStmt,
            52 => If,
            53 => While,
            54 => For,
            55 => DoWhile,
            56 => Switch,
            57 => Case,
            58 => Default,
            59 => Break,
            60 => Continue,
            61 => Return,
            62 => Goto,
            63 => Label,
            64 => Empty,
            80 => Literal,
            81 => Identifier,
            82 => BinaryOp,
            83 => UnaryOp,
            84 => Assign,
            85 => Call,
            86 => Member,
            87 => MemberPtr,
            88 => IndexExpr,
            89 => Cast,
            90 => Sizeof,
            91 => Conditional,
            92 => Comma,
            93 => InitList,
            94 => CompoundLiteral,
            130 => LiteralInt,
            131 => LiteralFloat,
            132 => LiteralChar,
            133 => LiteralString,
            other => bail!("invalid: unknown AST node kind {other}"),
        })
    }

    pub fn is_declaration(self) -> bool {
        (10..30).contains(&(self as u16))
    }

    pub fn is_type(self) -> bool {
        (30..50).contains(&(self as u16))
    }

    pub fn is_statement(self) -> bool {
        (50..80).contains(&(self as u16))
    }

    pub fn is_expression(self) -> bool {
        (80..130).contains(&(self as u16))
    }

    pub fn is_literal_subkind(self) -> bool {
        (130..140).contains(&(self as u16))
    }
}

/// Per-node status bitset (spec §3.4). Hand-rolled rather than pulling in
/// the `bitflags` crate for a single seven-bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(pub u16);

impl NodeFlags {
    pub const PARSED: NodeFlags = NodeFlags(1 << 0);
    pub const ANALYZED: NodeFlags = NodeFlags(1 << 1);
    pub const TYPED: NodeFlags = NodeFlags(1 << 2);
    pub const OPTIMIZED: NodeFlags = NodeFlags(1 << 3);
    pub const CODEGEN: NodeFlags = NodeFlags(1 << 4);
    pub const ERROR: NodeFlags = NodeFlags(1 << 5);
    pub const MODIFIED: NodeFlags = NodeFlags(1 << 6);

    pub const fn empty() -> Self {
        NodeFlags(0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        NodeFlags(self.0 | rhs.0)
    }
}

/// One of the mutually exclusive payload variants (spec §3.4.2). Encoded
/// into the AST node's 14-byte payload; unused trailing bytes are always
/// zeroed so that testable property #5 holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Generic up-to-four child slots. Also carries the sibling-chaining
    /// convention of §3.4.3: for ordinary statement-shaped kinds `c2` is
    /// "next sibling"; for `If`/`While`, `c1`=then, `c2`=condition,
    /// `c3`=else, `c4`=next sibling (decision D2).
    Children { c1: Index, c2: Index, c3: Index, c4: Index },
    /// `left`/`right` children plus an 8-byte value that discriminates on
    /// the parent node kind as one of `{symbol_idx, string_pool_offset,
    /// i64, f64}` (raw bit pattern, reinterpreted by the reader).
    Binary { left: Index, right: Index, value: i64 },
    Unary { operand: Index, operator: TokenKind, literal: i32 },
    Compound { declarations: Index, statements: Index, scope_idx: Index },
    Conditional { condition: Index, then_stmt: Index, else_stmt: Index },
    Call { function: Index, arguments: Index, return_type: Index, arg_count: u16 },
    Declaration {
        symbol_idx: Index,
        type_idx: Index,
        initializer: Index,
        storage_class: u8,
        specifier_flags: u8,
    },
}

impl Payload {
    fn tag(&self) -> u8 {
        match self {
            Payload::Children { .. } => 0,
            Payload::Binary { .. } => 1,
            Payload::Unary { .. } => 2,
            Payload::Compound { .. } => 3,
            Payload::Conditional { .. } => 4,
            Payload::Call { .. } => 5,
            Payload::Declaration { .. } => 6,
        }
    }

    fn encode(&self) -> Result<[u8; 14]> {
        fn idx16(i: Index) -> Result<[u8; 2]> {
            Ok(u16::try_from(i.0)
                .context("invalid: AST node index exceeds 16 bits")?
                .to_le_bytes())
        }

        let mut buf = [0u8; 14];
        buf[0] = self.tag();
        let body = &mut buf[1..];
        match *self {
            Payload::Children { c1, c2, c3, c4 } => {
                body[0..2].copy_from_slice(&idx16(c1)?);
                body[2..4].copy_from_slice(&idx16(c2)?);
                body[4..6].copy_from_slice(&idx16(c3)?);
                body[6..8].copy_from_slice(&idx16(c4)?);
            }
            Payload::Binary { left, right, value } => {
                body[0..2].copy_from_slice(&idx16(left)?);
                body[2..4].copy_from_slice(&idx16(right)?);
                body[4..12].copy_from_slice(&value.to_le_bytes());
            }
            Payload::Unary { operand, operator, literal } => {
                body[0..2].copy_from_slice(&idx16(operand)?);
                let op: u16 = operator.into();
                body[2..4].copy_from_slice(&op.to_le_bytes());
                body[4..8].copy_from_slice(&literal.to_le_bytes());
            }
            Payload::Compound { declarations, statements, scope_idx } => {
                body[0..2].copy_from_slice(&idx16(declarations)?);
                body[2..4].copy_from_slice(&idx16(statements)?);
                body[4..6].copy_from_slice(&idx16(scope_idx)?);
            }
            Payload::Conditional { condition, then_stmt, else_stmt } => {
                body[0..2].copy_from_slice(&idx16(condition)?);
                body[2..4].copy_from_slice(&idx16(then_stmt)?);
                body[4..6].copy_from_slice(&idx16(else_stmt)?);
            }
            Payload::Call { function, arguments, return_type, arg_count } => {
                body[0..2].copy_from_slice(&idx16(function)?);
                body[2..4].copy_from_slice(&idx16(arguments)?);
                body[4..6].copy_from_slice(&idx16(return_type)?);
                body[6..8].copy_from_slice(&arg_count.to_le_bytes());
            }
            Payload::Declaration { symbol_idx, type_idx, initializer, storage_class, specifier_flags } => {
                body[0..2].copy_from_slice(&idx16(symbol_idx)?);
                body[2..4].copy_from_slice(&idx16(type_idx)?);
                body[4..6].copy_from_slice(&idx16(initializer)?);
                body[6] = storage_class;
                body[7] = specifier_flags;
            }
        }
        Ok(buf)
    }

    fn decode(buf: [u8; 14]) -> Result<Self> {
        let tag = buf[0];
        let body = &buf[1..];
        let idx16 = |s: &[u8]| Index(u16::from_le_bytes(s.try_into().unwrap()).into());
        Ok(match tag {
            0 => Payload::Children {
                c1: idx16(&body[0..2]),
                c2: idx16(&body[2..4]),
                c3: idx16(&body[4..6]),
                c4: idx16(&body[6..8]),
            },
            1 => Payload::Binary {
                left: idx16(&body[0..2]),
                right: idx16(&body[2..4]),
                value: i64::from_le_bytes(body[4..12].try_into().unwrap()),
            },
            2 => Payload::Unary {
                operand: idx16(&body[0..2]),
                operator: TokenKind::try_from_primitive_u16(u16::from_le_bytes(
                    body[2..4].try_into().unwrap(),
                ))?,
                literal: i32::from_le_bytes(body[4..8].try_into().unwrap()),
            },
            3 => Payload::Compound {
                declarations: idx16(&body[0..2]),
                statements: idx16(&body[2..4]),
                scope_idx: idx16(&body[4..6]),
            },
            4 => Payload::Conditional {
                condition: idx16(&body[0..2]),
                then_stmt: idx16(&body[2..4]),
                else_stmt: idx16(&body[4..6]),
            },
            5 => Payload::Call {
                function: idx16(&body[0..2]),
                arguments: idx16(&body[2..4]),
                return_type: idx16(&body[4..6]),
                arg_count: u16::from_le_bytes(body[6..8].try_into().unwrap()),
            },
            6 => Payload::Declaration {
                symbol_idx: idx16(&body[0..2]),
                type_idx: idx16(&body[2..4]),
                initializer: idx16(&body[4..6]),
                storage_class: body[6],
                specifier_flags: body[7],
            },
            other => bail!("invalid: unknown AST payload tag {other}"),
        })
    }
}

trait TokenKindExt: Sized {
    fn try_from_primitive_u16(raw: u16) -> Result<Self>;
}

impl TokenKindExt for TokenKind {
    fn try_from_primitive_u16(raw: u16) -> Result<Self> {
        use num_enum::TryFromPrimitive;
        TokenKind::try_from_primitive(raw).context("invalid: unknown token kind in unary payload")
    }
}

/// A single 24-byte AST node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstNode {
    pub kind: NodeKind,
    pub flags: NodeFlags,
    pub token_idx: u32,
    pub type_idx: Index,
    pub payload: Payload,
}

impl AstNode {
    pub fn free() -> Self {
        AstNode {
            kind: NodeKind::Free,
            flags: NodeFlags::empty(),
            token_idx: 0,
            type_idx: Index::NONE,
            payload: Payload::Children {
                c1: Index::NONE,
                c2: Index::NONE,
                c3: Index::NONE,
                c4: Index::NONE,
            },
        }
    }
}

impl Record for AstNode {
    const SIZE: usize = 24;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(24);
        buf.extend_from_slice(&(self.kind as u16).to_le_bytes());
        buf.extend_from_slice(&self.flags.0.to_le_bytes());
        buf.extend_from_slice(&self.token_idx.to_le_bytes());
        let type_idx = u16::try_from(self.type_idx.0).context("invalid: type_idx exceeds 16 bits")?;
        buf.extend_from_slice(&type_idx.to_le_bytes());
        buf.extend_from_slice(&self.payload.encode()?);
        Ok(buf)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() == 24, "invalid-param: bad AST record length");
        let kind = u16::from_le_bytes(bytes[0..2].try_into().unwrap());
        let flags = u16::from_le_bytes(bytes[2..4].try_into().unwrap());
        let token_idx = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let type_idx = u16::from_le_bytes(bytes[8..10].try_into().unwrap());
        let mut payload_bytes = [0u8; 14];
        payload_bytes.copy_from_slice(&bytes[10..24]);
        Ok(AstNode {
            kind: NodeKind::from_u16(kind)?,
            flags: NodeFlags(flags),
            token_idx,
            type_idx: Index(type_idx.into()),
            payload: Payload::decode(payload_bytes)?,
        })
    }
}

pub type AstStore = crate::store::FileStore<AstNode>;
