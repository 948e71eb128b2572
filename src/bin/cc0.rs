//! `cc0 <source> <sstore.out> <tokens.out>` — the lexer-facing stub.
//!
//! Real C tokenization is out of scope; this binary reads a pre-tokenized
//! textual form (one token per line: `KIND TEXT LINE`, e.g. `KwReturn
//! return 3` or `IntLiteral 42 3`) and exercises the actual store-writing
//! contract a real scanner would drive: interning each lexeme into a
//! `StringPool` and appending a `Token` record per line.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use stcc1::store::RecordStore;
use stcc1::strings::StringPool;
use stcc1::token::{Token, TokenKind, TokenStore};

#[derive(Parser)]
#[command(name = "cc0", about = "Write a token store from pre-tokenized input")]
struct Cli {
    source: PathBuf,
    sstore_out: PathBuf,
    tokens_out: PathBuf,
}

fn kind_from_name(name: &str) -> Result<TokenKind> {
    use TokenKind::*;
    Ok(match name {
        "Eof" => Eof,
        "Error" => Error,
        "Identifier" => Identifier,
        "IntLiteral" => IntLiteral,
        "FloatLiteral" => FloatLiteral,
        "CharLiteral" => CharLiteral,
        "StringLiteral" => StringLiteral,
        "KwInt" => KwInt,
        "KwChar" => KwChar,
        "KwVoid" => KwVoid,
        "KwIf" => KwIf,
        "KwElse" => KwElse,
        "KwWhile" => KwWhile,
        "KwFor" => KwFor,
        "KwDo" => KwDo,
        "KwReturn" => KwReturn,
        "KwBreak" => KwBreak,
        "KwContinue" => KwContinue,
        "KwStruct" => KwStruct,
        "KwUnion" => KwUnion,
        "KwEnum" => KwEnum,
        "KwTypedef" => KwTypedef,
        "KwSizeof" => KwSizeof,
        "KwSwitch" => KwSwitch,
        "KwCase" => KwCase,
        "KwDefault" => KwDefault,
        "KwGoto" => KwGoto,
        "LParen" => LParen,
        "RParen" => RParen,
        "LBrace" => LBrace,
        "RBrace" => RBrace,
        "LBracket" => LBracket,
        "RBracket" => RBracket,
        "Semicolon" => Semicolon,
        "Comma" => Comma,
        "Dot" => Dot,
        "Arrow" => Arrow,
        "Colon" => Colon,
        "Question" => Question,
        "Plus" => Plus,
        "Minus" => Minus,
        "Star" => Star,
        "Slash" => Slash,
        "Percent" => Percent,
        "Assign" => Assign,
        "Eq" => Eq,
        "Ne" => Ne,
        "Lt" => Lt,
        "Le" => Le,
        "Gt" => Gt,
        "Ge" => Ge,
        "AmpAmp" => AmpAmp,
        "PipePipe" => PipePipe,
        "Bang" => Bang,
        "Amp" => Amp,
        "Pipe" => Pipe,
        "Caret" => Caret,
        "Tilde" => Tilde,
        "Shl" => Shl,
        "Shr" => Shr,
        other => bail!("unknown token kind {other:?} in pre-tokenized input"),
    })
}

fn main() -> Result<()> {
    stcc1::logging::init();
    let cli = Cli::parse();

    let text = fs::read_to_string(&cli.source).with_context(|| format!("reading {}", cli.source.display()))?;
    let mut strings = StringPool::init(&cli.sstore_out)?;
    let file_name = strings.intern_str(&cli.source.to_string_lossy())?;
    let mut tokens: TokenStore = TokenStore::init(&cli.tokens_out)?;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(3, char::is_whitespace);
        let kind_name = parts.next().context("missing token kind")?;
        let rest = parts.next().unwrap_or("-").trim();
        let line_field = parts.next().map(str::trim);

        let kind = kind_from_name(kind_name)?;
        let (text_field, line_no) = match line_field {
            Some(l) => (rest, l.parse::<u32>().unwrap_or(lineno as u32 + 1)),
            None => (rest, lineno as u32 + 1),
        };
        let pos = if text_field == "-" {
            stcc1::strings::StringOffset::NONE
        } else {
            strings.intern_str(text_field)?
        };
        tokens.append(&Token::new(kind, pos, file_name, line_no))?;
    }
    tokens.append(&Token::new(TokenKind::Eof, stcc1::strings::StringOffset::NONE, file_name, 0))?;

    strings.close()?;
    tokens.close()?;
    Ok(())
}
