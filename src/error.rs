//! Crate-wide error handling (spec §7). Compile-time diagnostics and
//! run-time VM errors are deliberately different shapes: passes "fail and
//! explain why" (`anyhow::Result`, used everywhere else in this crate),
//! while the VM's public API returns a closed, matchable code embedders
//! can branch on — so it gets its own `thiserror::Error` enum.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Lexical,
    Syntax,
    Semantic,
    Memory,
    Io,
    Internal,
}

/// One diagnostic, with enough context to point a user back at source.
#[derive(Debug, Clone)]
pub struct Report {
    pub severity: Severity,
    pub category: Category,
    pub token_idx: u32,
    pub file: String,
    pub line: u32,
    pub code: u32,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Explicit collector passed by `&mut` through builder/translator calls
/// (spec §9 design note: "pass an explicit reporter object; avoid a
/// process-wide error list"). Reports accumulate in report order and the
/// pass completes even after a recoverable error, so diagnostics keep
/// flowing — only a cap on error/warning counts aborts early.
pub struct Reporter {
    reports: Vec<Report>,
    max_errors: u32,
    max_warnings: u32,
    error_count: u32,
    warning_count: u32,
    capped: bool,
}

impl Reporter {
    pub fn new(max_errors: u32, max_warnings: u32) -> Self {
        Self {
            reports: Vec::new(),
            max_errors,
            max_warnings,
            error_count: 0,
            warning_count: 0,
            capped: false,
        }
    }

    /// Returns `false` once the cap has been hit, telling the caller to
    /// abort the pass gracefully.
    pub fn report(&mut self, report: Report) -> bool {
        match report.severity {
            Severity::Error | Severity::Fatal => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => {}
        }
        log::warn!("{:?}[{}]: {}", report.severity, report.code, report.message);
        self.reports.push(report);

        if self.max_errors > 0 && self.error_count >= self.max_errors {
            self.capped = true;
        }
        if self.max_warnings > 0 && self.warning_count >= self.max_warnings {
            self.capped = true;
        }
        !self.capped
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn is_capped(&self) -> bool {
        self.capped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    pub fn count_by_category(&self, category: Category) -> usize {
        self.reports.iter().filter(|r| r.category == category).count()
    }
}

/// Run-time return codes for the TAC execution engine (spec §4.7.3).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid parameter")]
    InvalidParam,
    #[error("invalid engine state for this operation")]
    InvalidState,
    #[error("null pointer")]
    NullPointer,
    #[error("invalid operand")]
    InvalidOperand,
    #[error("invalid address")]
    InvalidAddress,
    #[error("division by zero")]
    DivisionByZero,
    #[error("call stack overflow")]
    StackOverflow,
    #[error("maximum step count exceeded")]
    MaxSteps,
    #[error("breakpoint hit")]
    BreakpointHit,
    #[error("not found")]
    NotFound,
    #[error("out of memory")]
    OutOfMemory,
}

pub type EngineResult<T> = Result<T, EngineError>;
