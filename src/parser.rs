//! Minimal recursive-descent parser (C-subset front end) driving the AST
//! builder and symbol table over an already-tokenized [`crate::token::Token`]
//! stream. Covers the integer-arithmetic / control-flow / function-call
//! subset: function definitions with typed parameters, local and global
//! variable declarations (with optional comma declarators and
//! initializers), `if`/`else`, `while`, `return`, expression statements,
//! full binary-operator precedence climbing, unary `- ! ~`, and calls.
//!
//! The full C99 type system is out of scope: every type
//! specifier is parsed and discarded, so every declaration's `type_idx` is
//! `Index::NONE`. Block scoping is simplified to one flat scope per
//! function — every declaration inside a function body, including ones
//! nested in `if`/`while` bodies, is a direct child of that function's own
//! symbol-table entry. This is enough for the integer-subset programs this
//! crate targets; true nested shadowing is not implemented.

use anyhow::{ensure, Context, Result};

use crate::ast::builder::AstBuilder;
use crate::error::{Category, Report, Reporter, Severity};
use crate::hbuf::HashedLruBuffer;
use crate::store::Index;
use crate::strings::StringPool;
use crate::symtab::{SymbolEntry, SymbolKind, SymbolTable};
use crate::token::{Token, TokenKind};

/// What a successful parse produced: the `Program` node and, if a function
/// named `main` was defined, its symbol-table index.
pub struct ParseOutcome {
    pub program: Index,
    pub main_symbol: Option<Index>,
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    hbuf: &'a mut HashedLruBuffer,
    strings: &'a mut StringPool,
    symtab: &'a mut SymbolTable,
    builder: AstBuilder,
    current_scope: Index,
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: Vec<Token>,
        hbuf: &'a mut HashedLruBuffer,
        strings: &'a mut StringPool,
        symtab: &'a mut SymbolTable,
        max_errors: u32,
        max_warnings: u32,
    ) -> Self {
        let root = symtab.root();
        Parser {
            tokens,
            pos: 0,
            hbuf,
            strings,
            symtab,
            builder: AstBuilder::new("parse", max_errors, max_warnings),
            current_scope: root,
        }
    }

    pub fn reporter(&self) -> &Reporter {
        self.builder.reporter()
    }

    // ---- token cursor ----

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().unwrap_or(Token::new(TokenKind::Eof, crate::strings::StringOffset::NONE, crate::strings::StringOffset::NONE, 0));
        self.pos += 1;
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        let tok = self.peek().context("syntax error: unexpected end of token stream")?;
        ensure!(tok.kind == kind, "syntax error at line {}: expected {kind:?}, found {:?}", tok.line, tok.kind);
        Ok(self.advance())
    }

    /// 1-based index into the token stream, for `token_idx` diagnostics.
    fn cur_token_idx(&self) -> u32 {
        u32::try_from(self.pos + 1).unwrap_or(u32::MAX)
    }

    fn is_type_specifier_ahead(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::KwInt | TokenKind::KwChar | TokenKind::KwVoid))
    }

    fn parse_type_specifier(&mut self) -> Result<()> {
        let tok = self.peek().context("syntax error: unexpected end of token stream while expecting a type")?;
        ensure!(
            matches!(tok.kind, TokenKind::KwInt | TokenKind::KwChar | TokenKind::KwVoid),
            "syntax error at line {}: expected a type specifier, found {:?}",
            tok.line,
            tok.kind
        );
        self.advance();
        Ok(())
    }

    fn build_list_cells(&mut self, items: &[Index]) -> Result<Index> {
        let mut tail = Index::NONE;
        for &item in items.iter().rev() {
            tail = self.builder.list_cell(self.hbuf, item, tail)?;
        }
        Ok(tail)
    }

    fn link_stmt_chain(&mut self, stmts: &[Index]) -> Result<Index> {
        for w in stmts.windows(2) {
            self.builder.chain_next(self.hbuf, w[0], w[1])?;
        }
        Ok(stmts.first().copied().unwrap_or(Index::NONE))
    }

    fn semantic_error(&mut self, line: u32, code: u32, message: impl Into<String>) {
        self.builder.reporter_mut().report(Report {
            severity: Severity::Error,
            category: Category::Semantic,
            token_idx: 0,
            file: "parse".to_string(),
            line,
            code,
            message: message.into(),
            suggestion: None,
        });
    }

    fn declare_symbol(&mut self, name: crate::strings::StringOffset, scope: Index, scope_depth: u16, kind: SymbolKind, line: u32) -> Result<Index> {
        let existing = self.symtab.lookup_by_name_in_scope(self.hbuf, name, scope)?;
        if !existing.is_none() {
            self.semantic_error(line, 2, "duplicate declaration in this scope");
            return Ok(existing);
        }
        self.symtab.add(self.hbuf, scope, SymbolEntry { name, kind, scope_depth, ..SymbolEntry::free() })
    }

    fn resolve_identifier(&mut self, name: crate::strings::StringOffset, line: u32) -> Result<Index> {
        let mut sym = self.symtab.lookup_by_name_in_scope(self.hbuf, name, self.current_scope)?;
        if sym.is_none() && self.current_scope != self.symtab.root() {
            sym = self.symtab.lookup_by_name_in_scope(self.hbuf, name, self.symtab.root())?;
        }
        if sym.is_none() {
            self.semantic_error(line, 3, "use of undeclared identifier");
        }
        Ok(sym)
    }

    // ---- declarations ----

    /// `ident [= expr] (',' ident [= expr])*`, pushing one `VarDecl` node
    /// per declarator into `out`. The leading type keyword has already been
    /// consumed; `first_name` is the first declarator's identifier token.
    fn parse_declarator_list(
        &mut self,
        first_name: Token,
        scope: Index,
        scope_depth: u16,
        out: &mut Vec<Index>,
    ) -> Result<()> {
        let mut name_tok = first_name;
        loop {
            let sym = self.declare_symbol(name_tok.pos, scope, scope_depth, SymbolKind::Variable, name_tok.line)?;
            let init = if self.at(TokenKind::Assign) {
                self.advance();
                self.parse_assignment()?
            } else {
                Index::NONE
            };
            let decl = self.builder.var_decl(self.hbuf, self.cur_token_idx(), sym, Index::NONE, init)?;
            out.push(decl);
            if self.at(TokenKind::Comma) {
                self.advance();
                name_tok = self.expect(TokenKind::Identifier)?;
                continue;
            }
            break;
        }
        Ok(())
    }

    fn parse_block_contents(&mut self, scope: Index, local_decls: &mut Vec<Index>, stmts: &mut Vec<Index>) -> Result<()> {
        while self.is_type_specifier_ahead() {
            self.parse_type_specifier()?;
            let name_tok = self.expect(TokenKind::Identifier)?;
            self.parse_declarator_list(name_tok, scope, 1, local_decls)?;
            self.expect(TokenKind::Semicolon)?;
        }
        while !self.at(TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(())
    }

    fn parse_compound_stmt(&mut self) -> Result<Index> {
        self.expect(TokenKind::LBrace)?;
        let mut local_decls = Vec::new();
        let mut stmts = Vec::new();
        self.parse_block_contents(self.current_scope, &mut local_decls, &mut stmts)?;
        self.expect(TokenKind::RBrace)?;
        let decl_chain = self.build_list_cells(&local_decls)?;
        let stmt_chain = self.link_stmt_chain(&stmts)?;
        self.builder.compound(self.hbuf, 0, decl_chain, stmt_chain, Index::NONE)
    }

    fn parse_function_def(&mut self, name_tok: Token) -> Result<(Index, Index, bool)> {
        let is_main = self.strings.get_string(name_tok.pos)? == "main";
        let sym = self.declare_symbol(name_tok.pos, self.symtab.root(), 0, SymbolKind::Function, name_tok.line)?;

        let previous_scope = self.current_scope;
        self.current_scope = sym;

        self.expect(TokenKind::LParen)?;
        let mut param_decls = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                self.parse_type_specifier()?;
                let p_tok = self.expect(TokenKind::Identifier)?;
                let p_sym = self.declare_symbol(p_tok.pos, sym, 1, SymbolKind::Variable, p_tok.line)?;
                let p_decl = self.builder.fn_param(self.hbuf, self.cur_token_idx(), p_sym, Index::NONE)?;
                param_decls.push(p_decl);
                if self.at(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::LBrace)?;
        let mut local_decls = Vec::new();
        let mut stmts = Vec::new();
        self.parse_block_contents(sym, &mut local_decls, &mut stmts)?;
        self.expect(TokenKind::RBrace)?;

        let mut all_decls = param_decls;
        all_decls.extend(local_decls);
        let decl_chain = self.build_list_cells(&all_decls)?;
        let stmt_chain = self.link_stmt_chain(&stmts)?;
        let body = self.builder.compound(self.hbuf, 0, decl_chain, stmt_chain, Index::NONE)?;

        self.current_scope = previous_scope;

        let func = self.builder.function_def(self.hbuf, self.cur_token_idx(), sym, Index::NONE, body)?;
        Ok((func, sym, is_main))
    }

    // ---- statements ----

    fn parse_stmt(&mut self) -> Result<Index> {
        match self.peek_kind() {
            Some(TokenKind::LBrace) => self.parse_compound_stmt(),
            Some(TokenKind::KwIf) => self.parse_if_stmt(),
            Some(TokenKind::KwWhile) => self.parse_while_stmt(),
            Some(TokenKind::KwReturn) => self.parse_return_stmt(),
            Some(TokenKind::Semicolon) => {
                let idx = self.cur_token_idx();
                self.advance();
                self.builder.expr_stmt(self.hbuf, idx, Index::NONE)
            }
            _ => {
                let e = self.parse_expr()?;
                let idx = self.cur_token_idx();
                self.expect(TokenKind::Semicolon)?;
                self.builder.expr_stmt(self.hbuf, idx, e)
            }
        }
    }

    fn parse_if_stmt(&mut self) -> Result<Index> {
        let idx = self.cur_token_idx();
        self.expect(TokenKind::KwIf)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.parse_stmt()?;
        let else_branch = if self.at(TokenKind::KwElse) {
            self.advance();
            self.parse_stmt()?
        } else {
            Index::NONE
        };
        self.builder.if_stmt(self.hbuf, idx, cond, then_branch, else_branch)
    }

    fn parse_while_stmt(&mut self) -> Result<Index> {
        let idx = self.cur_token_idx();
        self.expect(TokenKind::KwWhile)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmt()?;
        self.builder.while_stmt(self.hbuf, idx, cond, body)
    }

    fn parse_return_stmt(&mut self) -> Result<Index> {
        let idx = self.cur_token_idx();
        self.expect(TokenKind::KwReturn)?;
        let value = if self.at(TokenKind::Semicolon) { Index::NONE } else { self.parse_expr()? };
        self.expect(TokenKind::Semicolon)?;
        self.builder.return_stmt(self.hbuf, idx, value)
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Index> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Index> {
        let lhs = self.parse_binary(0)?;
        if self.at(TokenKind::Assign) {
            let idx = self.cur_token_idx();
            self.advance();
            let rhs = self.parse_assignment()?;
            return self.builder.assign(self.hbuf, idx, lhs, rhs);
        }
        Ok(lhs)
    }

    fn binding_power(op: TokenKind) -> Option<u8> {
        use TokenKind::*;
        Some(match op {
            PipePipe => 1,
            AmpAmp => 2,
            Pipe => 3,
            Caret => 4,
            Amp => 5,
            Eq | Ne => 6,
            Lt | Le | Gt | Ge => 7,
            Shl | Shr => 8,
            Plus | Minus => 9,
            Star | Slash | Percent => 10,
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<Index> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some(op) = self.peek_kind() else { break };
            let Some(bp) = Self::binding_power(op) else { break };
            if bp < min_bp {
                break;
            }
            let idx = self.cur_token_idx();
            self.advance();
            let rhs = self.parse_binary(bp + 1)?;
            let op_code: u16 = op.into();
            lhs = self.builder.binary_op(self.hbuf, idx, lhs, rhs, i64::from(op_code))?;
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Index> {
        match self.peek_kind() {
            Some(op @ (TokenKind::Minus | TokenKind::Bang | TokenKind::Tilde)) => {
                let idx = self.cur_token_idx();
                self.advance();
                let operand = self.parse_unary()?;
                self.builder.unary_op(self.hbuf, idx, operand, op)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Index>> {
        let mut args = Vec::new();
        if self.at(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment()?);
            if self.at(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Index> {
        match self.peek_kind() {
            Some(TokenKind::IntLiteral) => {
                let idx = self.cur_token_idx();
                let tok = self.advance();
                let bytes = self.strings.get(tok.pos)?;
                let text = std::str::from_utf8(&bytes).context("invalid: int literal lexeme is not valid UTF-8")?;
                let value: i64 = text.parse().with_context(|| format!("syntax error at line {}: bad integer literal {text:?}", tok.line))?;
                self.builder.literal_int(self.hbuf, idx, value)
            }
            Some(TokenKind::Identifier) => {
                let idx = self.cur_token_idx();
                let tok = self.advance();
                let sym = self.resolve_identifier(tok.pos, tok.line)?;
                if self.at(TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_arg_list()?;
                    self.expect(TokenKind::RParen)?;
                    let arg_count = u16::try_from(args.len()).context("invalid: too many call arguments")?;
                    let arg_chain = self.build_list_cells(&args)?;
                    self.builder.call(self.hbuf, idx, sym, arg_chain, arg_count)
                } else {
                    self.builder.identifier(self.hbuf, idx, sym)
                }
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            other => anyhow::bail!("syntax error: unexpected token {other:?} in expression"),
        }
    }

    // ---- top level ----

    pub fn parse_program(&mut self) -> Result<ParseOutcome> {
        let mut decls = Vec::new();
        let mut main_symbol = None;
        while !matches!(self.peek_kind(), None | Some(TokenKind::Eof)) {
            self.parse_type_specifier()?;
            let name_tok = self.expect(TokenKind::Identifier)?;
            if self.at(TokenKind::LParen) {
                let (func_idx, sym, is_main) = self.parse_function_def(name_tok)?;
                decls.push(func_idx);
                if is_main {
                    main_symbol = Some(sym);
                }
            } else {
                let scope = self.symtab.root();
                self.parse_declarator_list(name_tok, scope, 0, &mut decls)?;
                self.expect(TokenKind::Semicolon)?;
            }
        }
        let chain = self.build_list_cells(&decls)?;
        let program = self.builder.program(self.hbuf, chain)?;
        Ok(ParseOutcome { program, main_symbol })
    }
}
