//! Thin construction API atop HBUF (spec §4.5). Each `AstBuilder` call
//! allocates a fresh slot, stamps `token_idx`/default flags, fills the
//! payload, and returns the stable index — callers never touch `HBUF`
//! node allocation directly.

use anyhow::{ensure, Result};

use crate::error::{Category, Report, Reporter, Severity};
use crate::hbuf::HashedLruBuffer;
use crate::store::{Index, Record};

use super::{AstNode, NodeFlags, NodeKind, Payload};

/// Builds AST nodes for one compiler phase, tracking a phase name and
/// running error/warning counts via an owned [`Reporter`].
pub struct AstBuilder {
    phase: String,
    reporter: Reporter,
}

impl AstBuilder {
    pub fn new(phase: impl Into<String>, max_errors: u32, max_warnings: u32) -> Self {
        AstBuilder { phase: phase.into(), reporter: Reporter::new(max_errors, max_warnings) }
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut Reporter {
        &mut self.reporter
    }

    fn report_error(&mut self, message: impl Into<String>) {
        self.reporter.report(Report {
            severity: Severity::Error,
            category: Category::Internal,
            token_idx: 0,
            file: self.phase.clone(),
            line: 0,
            code: 0,
            message: message.into(),
            suggestion: None,
        });
    }

    fn build(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        kind: NodeKind,
        token_idx: u32,
        payload: Payload,
    ) -> Result<Index> {
        let node = AstNode { kind, flags: NodeFlags::PARSED, token_idx, type_idx: Index::NONE, payload };
        let index = hbuf.new_ast()?;
        hbuf.write_ast(index, node)?;
        Ok(index)
    }

    /// Marks `index` as `TYPED` and records its resolved type node.
    pub fn set_type(&mut self, hbuf: &mut HashedLruBuffer, index: Index, type_idx: Index) -> Result<()> {
        let mut node = hbuf.read_ast(index)?;
        node.type_idx = type_idx;
        node.flags.insert(NodeFlags::TYPED);
        hbuf.write_ast(index, node)
    }

    pub fn set_flag(&mut self, hbuf: &mut HashedLruBuffer, index: Index, flag: NodeFlags) -> Result<()> {
        let mut node = hbuf.read_ast(index)?;
        node.flags.insert(flag);
        hbuf.write_ast(index, node)
    }

    pub fn mark_error(&mut self, hbuf: &mut HashedLruBuffer, index: Index, message: impl Into<String>) -> Result<()> {
        self.report_error(message);
        self.set_flag(hbuf, index, NodeFlags::ERROR)
    }

    /// Links `sibling_of` to `new_node` via the ordinary statement-chaining
    /// convention (`c2` = next sibling, decision D2). Used for every
    /// statement-shaped kind except `If`/`While`.
    pub fn chain_sibling(&mut self, hbuf: &mut HashedLruBuffer, prior: Index, next: Index) -> Result<()> {
        let mut node = hbuf.read_ast(prior)?;
        match &mut node.payload {
            Payload::Children { c2, .. } => *c2 = next,
            other => ensure!(false, "internal: chain_sibling called on non-Children payload {other:?}"),
        }
        hbuf.write_ast(prior, node)
    }

    /// Links `prior`'s next-sibling slot to `next`, picking whichever field
    /// `prior`'s kind actually uses for "next" (decision D2): ordinary
    /// statement-shaped kinds through `c2` (see [`Self::chain_sibling`]);
    /// `If`/`While` through `c4`, since their `c2` already holds the
    /// condition. Lets a caller walking a parse-order statement list chain
    /// any statement kind without knowing its payload shape up front.
    pub fn chain_next(&mut self, hbuf: &mut HashedLruBuffer, prior: Index, next: Index) -> Result<()> {
        let mut node = hbuf.read_ast(prior)?;
        match (node.kind, &mut node.payload) {
            (NodeKind::If | NodeKind::While, Payload::Children { c4, .. }) => *c4 = next,
            (_, Payload::Children { c2, .. }) => *c2 = next,
            (kind, payload) => ensure!(false, "internal: chain_next called on non-Children payload for {kind:?}: {payload:?}"),
        }
        hbuf.write_ast(prior, node)
    }

    pub fn literal_int(&mut self, hbuf: &mut HashedLruBuffer, token_idx: u32, value: i64) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::LiteralInt,
            token_idx,
            Payload::Binary { left: Index::NONE, right: Index::NONE, value },
        )
    }

    pub fn identifier(&mut self, hbuf: &mut HashedLruBuffer, token_idx: u32, symbol_idx: Index) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::Identifier,
            token_idx,
            Payload::Declaration {
                symbol_idx,
                type_idx: Index::NONE,
                initializer: Index::NONE,
                storage_class: 0,
                specifier_flags: 0,
            },
        )
    }

    pub fn binary_op(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        left: Index,
        right: Index,
        operator_token: i64,
    ) -> Result<Index> {
        self.build(hbuf, NodeKind::BinaryOp, token_idx, Payload::Binary { left, right, value: operator_token })
    }

    pub fn unary_op(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        operand: Index,
        operator: crate::token::TokenKind,
    ) -> Result<Index> {
        self.build(hbuf, NodeKind::UnaryOp, token_idx, Payload::Unary { operand, operator, literal: 0 })
    }

    pub fn assign(&mut self, hbuf: &mut HashedLruBuffer, token_idx: u32, target: Index, value: Index) -> Result<Index> {
        self.build(hbuf, NodeKind::Assign, token_idx, Payload::Binary { left: target, right: value, value: 0 })
    }

    pub fn var_decl(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        symbol_idx: Index,
        type_idx: Index,
        initializer: Index,
    ) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::VarDecl,
            token_idx,
            Payload::Declaration { symbol_idx, type_idx, initializer, storage_class: 0, specifier_flags: 0 },
        )
    }

    /// A function parameter declaration: a `VarDecl` with `storage_class`
    /// set to 1, the marker `Translator::bind_parameters` scans for in a
    /// function's declaration list-cell chain. Never has an initializer —
    /// its value comes from the caller's `PARAM`s instead.
    pub fn fn_param(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        symbol_idx: Index,
        type_idx: Index,
    ) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::VarDecl,
            token_idx,
            Payload::Declaration { symbol_idx, type_idx, initializer: Index::NONE, storage_class: 1, specifier_flags: 0 },
        )
    }

    pub fn expr_stmt(&mut self, hbuf: &mut HashedLruBuffer, token_idx: u32, expr: Index) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::ExprStmt,
            token_idx,
            Payload::Children { c1: expr, c2: Index::NONE, c3: Index::NONE, c4: Index::NONE },
        )
    }

    pub fn return_stmt(&mut self, hbuf: &mut HashedLruBuffer, token_idx: u32, value: Index) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::Return,
            token_idx,
            Payload::Children { c1: value, c2: Index::NONE, c3: Index::NONE, c4: Index::NONE },
        )
    }

    /// `c1`=then, `c2`=condition, `c3`=else, `c4`=next sibling (decision D2).
    pub fn if_stmt(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        condition: Index,
        then_stmt: Index,
        else_stmt: Index,
    ) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::If,
            token_idx,
            Payload::Children { c1: then_stmt, c2: condition, c3: else_stmt, c4: Index::NONE },
        )
    }

    /// `c1`=body, `c2`=condition, `c4`=next sibling; `c3` unused (decision D2).
    pub fn while_stmt(&mut self, hbuf: &mut HashedLruBuffer, token_idx: u32, condition: Index, body: Index) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::While,
            token_idx,
            Payload::Children { c1: body, c2: condition, c3: Index::NONE, c4: Index::NONE },
        )
    }

    pub fn compound(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        declarations: Index,
        statements: Index,
        scope_idx: Index,
    ) -> Result<Index> {
        self.build(hbuf, NodeKind::Compound, token_idx, Payload::Compound { declarations, statements, scope_idx })
    }

    pub fn call(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        function: Index,
        arguments: Index,
        arg_count: u16,
    ) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::Call,
            token_idx,
            Payload::Call { function, arguments, return_type: Index::NONE, arg_count },
        )
    }

    pub fn function_def(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        token_idx: u32,
        symbol_idx: Index,
        type_idx: Index,
        body: Index,
    ) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::FunctionDef,
            token_idx,
            Payload::Declaration { symbol_idx, type_idx, initializer: body, storage_class: 0, specifier_flags: 0 },
        )
    }

    /// Wraps `item` in a generic list cell (`c1`=item, `c2`=next), used to
    /// chain nodes whose own payload has no spare sibling slot: top-level
    /// declarations, a compound's local declarations, and call arguments.
    pub fn list_cell(&mut self, hbuf: &mut HashedLruBuffer, item: Index, next: Index) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::TranslationUnit,
            0,
            Payload::Children { c1: item, c2: next, c3: Index::NONE, c4: Index::NONE },
        )
    }

    pub fn program(&mut self, hbuf: &mut HashedLruBuffer, first_decl: Index) -> Result<Index> {
        self.build(
            hbuf,
            NodeKind::Program,
            0,
            Payload::Children { c1: first_decl, c2: Index::NONE, c3: Index::NONE, c4: Index::NONE },
        )
    }

    /// Validates a node's payload tag matches what its `kind` expects.
    /// Conservative: only checks the handful of kinds this builder
    /// constructs directly.
    pub fn validate(&self, hbuf: &mut HashedLruBuffer, index: Index) -> Result<bool> {
        let node = hbuf.read_ast(index)?;
        let ok = match node.kind {
            NodeKind::If | NodeKind::While | NodeKind::Program | NodeKind::ExprStmt | NodeKind::Return => {
                matches!(node.payload, Payload::Children { .. })
            }
            NodeKind::BinaryOp | NodeKind::Assign | NodeKind::LiteralInt => matches!(node.payload, Payload::Binary { .. }),
            NodeKind::UnaryOp => matches!(node.payload, Payload::Unary { .. }),
            NodeKind::Compound => matches!(node.payload, Payload::Compound { .. }),
            NodeKind::Call => matches!(node.payload, Payload::Call { .. }),
            NodeKind::VarDecl | NodeKind::FunctionDef | NodeKind::Identifier => matches!(node.payload, Payload::Declaration { .. }),
            _ => true,
        };
        Ok(ok)
    }
}
