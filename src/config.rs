//! Typed configuration (ambient stack, SPEC_FULL.md §11).

use clap::Args;

/// Sizes the HBUF, hash table, and per-pass allocator caps shared by the
/// store-backed passes (lex/parse/translate). Not exposed as a config
/// file — constructing this in-process or via CLI flags fully covers the
/// table in spec §4.7.2 without introducing a format this crate has no
/// other use for.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// HBUF slot count (spec §4.2, target N=100).
    pub hbuf_capacity: usize,
    /// Temp-allocator cap (spec §4.6).
    pub max_temps: u16,
    /// `max_errors`/`max_warnings` (spec §7).
    pub max_errors: u32,
    pub max_warnings: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            hbuf_capacity: 100,
            max_temps: 1000,
            max_errors: 0,
            max_warnings: 0,
        }
    }
}

/// TAC execution engine configuration (spec §4.7.2), `clap::Args` so the
/// `cc-run` binary can expose each field as a flag the way the teacher's
/// `tools.rs` builds its top-level `Args`.
#[derive(Debug, Clone, Copy, Args)]
pub struct EngineConfig {
    #[arg(long, default_value_t = 1024)]
    pub max_temporaries: u32,
    #[arg(long, default_value_t = 1024)]
    pub max_variables: u32,
    #[arg(long, default_value_t = 65_536)]
    pub max_memory_size: u32,
    #[arg(long, default_value_t = 256)]
    pub max_call_depth: u32,
    #[arg(long, default_value_t = 1_000_000)]
    pub max_steps: u64,
    #[arg(long, default_value_t = false)]
    pub enable_tracing: bool,
    #[arg(long, default_value_t = 1024)]
    pub max_trace_entries: usize,
    #[arg(long, default_value_t = true)]
    pub enable_bounds_check: bool,
    #[arg(long, default_value_t = true)]
    pub enable_type_check: bool,
    #[arg(long)]
    pub symtab_file: Option<std::path::PathBuf>,
    #[arg(long)]
    pub sstore_file: Option<std::path::PathBuf>,
    #[arg(long, default_value_t = false)]
    pub enable_symbol_resolution: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_temporaries: 1024,
            max_variables: 1024,
            max_memory_size: 65_536,
            max_call_depth: 256,
            max_steps: 1_000_000,
            enable_tracing: false,
            max_trace_entries: 1024,
            enable_bounds_check: true,
            enable_type_check: true,
            symtab_file: None,
            sstore_file: None,
            enable_symbol_resolution: false,
        }
    }
}
