//! `cc2 <sstore.out> <tokens.out> <ast.out> <sym.out> <tac.bin> <tac.txt>` —
//! runs the AST→TAC translator over a parsed program, writing both the
//! binary TAC store and a human-readable disassembly.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use stcc1::ast::AstStore;
use stcc1::config::PipelineConfig;
use stcc1::error::Reporter;
use stcc1::hbuf::HashedLruBuffer;
use stcc1::store::{Index, RecordStore};
use stcc1::strings::StringPool;
use stcc1::symtab::{SymbolKind, SymbolStore, SymbolTable};
use stcc1::tac::{disassemble_one, TacStore};
use stcc1::translate::Translator;

#[derive(Parser)]
#[command(name = "cc2", about = "Translate a parsed program to TAC")]
struct Cli {
    sstore_out: PathBuf,
    tokens_out: PathBuf,
    ast_out: PathBuf,
    sym_out: PathBuf,
    tac_bin: PathBuf,
    tac_txt: PathBuf,
}

/// The parser names `main`'s symbol by interned string equality; since that
/// link isn't persisted in the AST/symbol stores themselves, cc2
/// rediscovers it the same way: scan the direct children of the symbol
/// root for a `Function` entry whose name resolves to `"main"`.
fn find_main(hbuf: &mut HashedLruBuffer, strings: &mut StringPool, symtab: &SymbolTable) -> Result<Option<Index>> {
    let root_entry = hbuf.read_symbol(symtab.root())?;
    let mut cur = root_entry.child;
    let mut steps = 0u32;
    while !cur.is_none() {
        steps += 1;
        anyhow::ensure!(steps <= 1000, "internal: symbol sibling chain exceeds 1000 entries");
        let entry = hbuf.read_symbol(cur)?;
        if entry.kind == SymbolKind::Function && strings.get_string(entry.name)? == "main" {
            return Ok(Some(cur));
        }
        cur = entry.sibling;
    }
    Ok(None)
}

fn main() -> Result<()> {
    stcc1::logging::init();
    let cli = Cli::parse();
    let config = PipelineConfig::default();
    let _ = &cli.tokens_out; // only the AST/symbol stores are actually translated

    let mut strings = StringPool::open(&cli.sstore_out)?;
    let ast_store: AstStore = AstStore::open(&cli.ast_out)?;
    let sym_store: SymbolStore = SymbolStore::open(&cli.sym_out)?;
    let mut hbuf = HashedLruBuffer::with_capacity(ast_store, sym_store, config.hbuf_capacity);
    let symtab = SymbolTable::reopen(Index::new(1), Index::new(1));

    let main_symbol = find_main(&mut hbuf, &mut strings, &symtab)?;

    // The parser builds every declaration (and its subtree) before wrapping
    // them in the top-level list and finally emitting the `Program` node
    // itself, so `Program` is always the very last AST record appended.
    let program = Index::new(hbuf.ast_count());

    let mut tac: TacStore = TacStore::init(&cli.tac_bin)?;
    let mut reporter = Reporter::new(config.max_errors, config.max_warnings);
    let mut translator = Translator::new(config.max_temps);
    translator.translate_program(&mut hbuf, &mut tac, &mut reporter, &symtab, program, main_symbol)?;

    // `main`'s entry label doesn't survive in the TAC store itself (a LABEL
    // instruction only carries its own id), so cc-run needs it recorded
    // somewhere outside in-memory `Translator::functions` — a header
    // comment in the disassembly it already reads is the natural place.
    let entry_label = main_symbol.and_then(|sym| translator.functions.get(&sym)).map(|f| f.label_id);
    let mut txt = File::create(&cli.tac_txt)?;
    match entry_label {
        Some(id) => writeln!(txt, "; entry_label={id}")?,
        None => writeln!(txt, "; entry_label=none")?,
    }
    for i in 1..=tac.count() {
        let instr = tac.get(Index::new(i))?;
        writeln!(txt, "{}", disassemble_one(i - 1, &instr))?;
    }

    hbuf.close()?;
    strings.close()?;
    tac.close()?;

    if reporter.error_count() > 0 {
        anyhow::bail!("{} translation error(s); see log output", reporter.error_count());
    }
    Ok(())
}
