//! `cc0t <sstore.out> <tokens.out>` — dumps a token store in human-readable
//! form, one line per token, resolving each lexeme through the string pool.
//! Analogous to the teacher's `dump_id0`/`dump_til` text-dump tools: reads,
//! `println!`s, and does nothing else.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use stcc1::store::{Index, RecordStore};
use stcc1::strings::StringPool;
use stcc1::token::{Token, TokenStore};

#[derive(Parser)]
#[command(name = "cc0t", about = "Dump a token store")]
struct Cli {
    sstore_out: PathBuf,
    tokens_out: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut strings = StringPool::open(&cli.sstore_out)?;
    let mut tokens: TokenStore = TokenStore::open(&cli.tokens_out)?;

    for i in 1..=tokens.count() {
        let tok: Token = tokens.get(Index::new(i))?;
        let text = if tok.pos.is_none() {
            "-".to_string()
        } else {
            strings.get_string(tok.pos).unwrap_or_else(|_| "<bad-string>".to_string())
        };
        println!("{i:>5}  line {:<5} {:?} {:?}", tok.line, tok.kind, text);
    }
    Ok(())
}
