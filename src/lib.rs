//! A small C-subset compiler whose intermediate representations all live
//! in fixed-record, file-backed stores (module [`store`]) accessed through
//! a single shared in-memory LRU cache (module [`hbuf`]), mirroring the
//! pipeline-of-on-disk-sections architecture the teacher crate used for
//! IDB databases.
//!
//! The pipeline runs front to back through four stages, each reading the
//! previous stage's store and writing its own:
//!
//! - lexing produces a [`token::TokenStore`]
//! - parsing produces an [`ast::AstStore`] and a [`symtab::SymbolStore`]
//! - translation ([`translate`]) lowers the AST to a [`tac::TacStore`]
//! - the [`engine`] interprets the TAC store directly

#![forbid(unsafe_code)]

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod hbuf;
pub mod logging;
pub mod parser;
pub mod store;
pub mod strings;
pub mod symtab;
pub mod tac;
pub mod token;
pub mod translate;
