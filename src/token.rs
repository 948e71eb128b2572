//! Fixed-width token records (C4), produced by the (out-of-scope) lexical
//! scanner and consumed by the parser.

use anyhow::{ensure, Context, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::store::Record;
use crate::strings::StringOffset;

/// Lexical category. The full scanner recognizes ~90 categories (spec
/// §3.3); this crate models the subset needed to compile the
/// integer-arithmetic / control-flow / function-call subset in §1, plus
/// the bookkeeping kinds (`Eof`, `Error`) every store needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum TokenKind {
    Eof = 0,
    Error = 1,

    Identifier = 2,
    IntLiteral = 3,
    FloatLiteral = 4,
    CharLiteral = 5,
    StringLiteral = 6,

    // Keywords
    KwInt = 10,
    KwChar = 11,
    KwVoid = 12,
    KwIf = 13,
    KwElse = 14,
    KwWhile = 15,
    KwFor = 16,
    KwDo = 17,
    KwReturn = 18,
    KwBreak = 19,
    KwContinue = 20,
    KwStruct = 21,
    KwUnion = 22,
    KwEnum = 23,
    KwTypedef = 24,
    KwSizeof = 25,
    KwSwitch = 26,
    KwCase = 27,
    KwDefault = 28,
    KwGoto = 29,

    // Punctuators
    LParen = 40,
    RParen = 41,
    LBrace = 42,
    RBrace = 43,
    LBracket = 44,
    RBracket = 45,
    Semicolon = 46,
    Comma = 47,
    Dot = 48,
    Arrow = 49,
    Colon = 50,
    Question = 51,

    Plus = 60,
    Minus = 61,
    Star = 62,
    Slash = 63,
    Percent = 64,
    Assign = 65,
    Eq = 66,
    Ne = 67,
    Lt = 68,
    Le = 69,
    Gt = 70,
    Ge = 71,
    AmpAmp = 72,
    PipePipe = 73,
    Bang = 74,
    Amp = 75,
    Pipe = 76,
    Caret = 77,
    Tilde = 78,
    Shl = 79,
    Shr = 80,
}

impl TokenKind {
    pub fn is_binary_operator(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Plus | Minus
                | Star
                | Slash
                | Percent
                | Eq
                | Ne
                | Lt
                | Le
                | Gt
                | Ge
                | AmpAmp
                | PipePipe
                | Amp
                | Pipe
                | Caret
                | Shl
                | Shr
        )
    }
}

/// A fixed-width token record (spec §3.3): kind, lexeme text offset,
/// source filename offset, and 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: StringOffset,
    pub file: StringOffset,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, pos: StringOffset, file: StringOffset, line: u32) -> Self {
        Self {
            kind,
            pos,
            file,
            line,
        }
    }
}

impl Record for Token {
    const SIZE: usize = 14; // kind:2 + pos:4 + file:4 + line:4

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        let kind: u16 = self.kind.into();
        buf.extend_from_slice(&kind.to_le_bytes());
        buf.extend_from_slice(&self.pos.0.to_le_bytes());
        buf.extend_from_slice(&self.file.0.to_le_bytes());
        buf.extend_from_slice(&self.line.to_le_bytes());
        Ok(buf)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() == Self::SIZE, "invalid-param: bad token record length");
        let kind = u16::from_le_bytes(bytes[0..2].try_into().unwrap());
        let pos = u32::from_le_bytes(bytes[2..6].try_into().unwrap());
        let file = u32::from_le_bytes(bytes[6..10].try_into().unwrap());
        let line = u32::from_le_bytes(bytes[10..14].try_into().unwrap());
        let kind = TokenKind::try_from_primitive(kind).context("invalid: unknown token kind")?;
        Ok(Token {
            kind,
            pos: StringOffset(pos),
            file: StringOffset(file),
            line,
        })
    }
}

pub type TokenStore = crate::store::FileStore<Token>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_through_bytes() {
        let t = Token::new(TokenKind::Identifier, StringOffset(4), StringOffset(0), 7);
        let bytes = t.to_bytes().unwrap();
        assert_eq!(bytes.len(), Token::SIZE);
        assert_eq!(Token::from_bytes(&bytes).unwrap(), t);
    }
}
