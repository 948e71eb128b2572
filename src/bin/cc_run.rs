//! `cc-run <tac.bin> <tac.txt> [engine flags...]` — loads a TAC store into
//! the VM, runs it from its recorded entry label (the `; entry_label=N`
//! header line `cc2` writes at the top of `tac.txt`), and reports the
//! program's return value. This is how the seed scenarios in the
//! integration test suite are exercised end-to-end.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use stcc1::config::EngineConfig;
use stcc1::engine::{Engine, EngineState};
use stcc1::store::RecordStore;
use stcc1::tac::TacStore;

#[derive(Parser)]
#[command(name = "cc-run", about = "Run a compiled TAC program and report its return value")]
struct Cli {
    tac_bin: PathBuf,
    tac_txt: PathBuf,

    #[command(flatten)]
    engine: EngineConfig,
}

/// Reads the `; entry_label=N` (or `none`) header `cc2` writes as the first
/// line of its disassembly output.
fn read_entry_label(tac_txt: &PathBuf) -> Result<Option<u16>> {
    let file = File::open(tac_txt).with_context(|| format!("opening {}", tac_txt.display()))?;
    let mut first_line = String::new();
    BufReader::new(file).read_line(&mut first_line)?;
    let rest = first_line.trim().strip_prefix("; entry_label=").context("tac.txt missing entry_label header")?;
    if rest == "none" {
        Ok(None)
    } else {
        Ok(Some(rest.parse().context("bad entry_label value")?))
    }
}

fn main() -> Result<()> {
    stcc1::logging::init();
    let cli = Cli::parse();

    let entry_label = read_entry_label(&cli.tac_txt)?.context("program has no main function to run")?;

    let mut tac: TacStore = TacStore::open(&cli.tac_bin)?;
    let mut engine = Engine::create(cli.engine).map_err(|e| anyhow::anyhow!("engine create failed: {e}"))?;
    engine.load_code(&mut tac).map_err(|e| anyhow::anyhow!("load_code failed: {e}"))?;
    engine.set_entry_label(entry_label).map_err(|e| anyhow::anyhow!("unknown entry label {entry_label}: {e}"))?;
    engine.start().map_err(|e| anyhow::anyhow!("start failed: {e}"))?;

    match engine.run() {
        Ok(()) => {}
        Err(e) => anyhow::bail!("program aborted: {e}"),
    }

    anyhow::ensure!(engine.get_state() == EngineState::Finished, "engine did not finish cleanly");
    println!("{}", engine.last_return_value());
    tac.close()?;
    Ok(())
}
