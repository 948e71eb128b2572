//! `cc1t <sstore.out> <ast.out> <sym.out>` — dumps the AST and symbol
//! stores in human-readable form, one record per line.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use stcc1::ast::{AstNode, AstStore};
use stcc1::store::{Index, RecordStore};
use stcc1::strings::StringPool;
use stcc1::symtab::{SymbolEntry, SymbolStore};

#[derive(Parser)]
#[command(name = "cc1t", about = "Dump an AST + symbol store")]
struct Cli {
    sstore_out: PathBuf,
    ast_out: PathBuf,
    sym_out: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut strings = StringPool::open(&cli.sstore_out)?;

    let mut ast: AstStore = AstStore::open(&cli.ast_out)?;
    println!("-- ast ({} nodes) --", ast.count());
    for i in 1..=ast.count() {
        let node: AstNode = ast.get(Index::new(i))?;
        println!("{i:>5}  {:?} flags={:?} token_idx={} type_idx={:?}  {:?}", node.kind, node.flags, node.token_idx, node.type_idx, node.payload);
    }

    let mut symtab: SymbolStore = SymbolStore::open(&cli.sym_out)?;
    println!("-- symbols ({} entries, incl. root) --", symtab.count());
    for i in 1..=symtab.count() {
        let entry: SymbolEntry = symtab.get(Index::new(i))?;
        let name = if entry.name.is_none() {
            "-".to_string()
        } else {
            strings.get_string(entry.name).unwrap_or_else(|_| "<bad-string>".to_string())
        };
        println!(
            "{i:>5}  {name:<16} kind={:?} depth={} parent={:?} child={:?} sibling={:?}",
            entry.kind, entry.scope_depth, entry.parent, entry.child, entry.sibling
        );
    }
    Ok(())
}
