//! `cc1 <sstore.out> <tokens.out> <ast.out> <sym.out>` — drives the
//! recursive-descent parser over a pre-built token store, writing the AST
//! and symbol-table stores.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser as ClapParser;

use stcc1::ast::AstStore;
use stcc1::config::PipelineConfig;
use stcc1::hbuf::HashedLruBuffer;
use stcc1::parser::Parser;
use stcc1::store::RecordStore;
use stcc1::strings::StringPool;
use stcc1::symtab::{SymbolStore, SymbolTable};
use stcc1::token::{Token, TokenStore};

#[derive(ClapParser)]
#[command(name = "cc1", about = "Parse a token store into an AST + symbol store")]
struct Cli {
    sstore_out: PathBuf,
    tokens_out: PathBuf,
    ast_out: PathBuf,
    sym_out: PathBuf,
}

fn main() -> Result<()> {
    stcc1::logging::init();
    let cli = Cli::parse();
    let config = PipelineConfig::default();

    let mut strings = StringPool::open(&cli.sstore_out)?;

    let mut token_store: TokenStore = TokenStore::open(&cli.tokens_out)?;
    let count = token_store.count();
    let mut tokens = Vec::with_capacity(count as usize);
    for i in 1..=count {
        let tok: Token = token_store.get(stcc1::store::Index::new(i))?;
        tokens.push(tok);
    }
    token_store.close()?;

    let ast_store: AstStore = AstStore::init(&cli.ast_out)?;
    let sym_store: SymbolStore = SymbolStore::init(&cli.sym_out)?;
    let mut hbuf = HashedLruBuffer::with_capacity(ast_store, sym_store, config.hbuf_capacity);
    let mut symtab = SymbolTable::init(&mut hbuf)?;

    let mut parser = Parser::new(tokens, &mut hbuf, &mut strings, &mut symtab, config.max_errors, config.max_warnings);
    let outcome = parser.parse_program()?;

    let errors = parser.reporter().error_count();
    hbuf.close()?;
    strings.close()?;

    if errors > 0 {
        anyhow::bail!("{errors} parse error(s); see log output");
    }
    log::info!("parsed program node {:?}, main={:?}", outcome.program, outcome.main_symbol);
    Ok(())
}
