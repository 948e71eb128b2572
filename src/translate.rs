//! AST to TAC translator (C8, spec §4.6): a structured recursive-descent
//! walk over the AST that emits instructions into a [`crate::tac::TacStore`]
//! and builds the function table (`symbol_idx -> (label_id, entry address,
//! is_main)`).
//!
//! `Call` arguments, a compound's local `VarDecl`s, and top-level
//! declarations all lack a spare sibling slot in their own payload (they
//! use `Binary`/`Declaration`, not `Children`), so each is threaded
//! through generic list cells instead: `Children{c1=item, c2=next}` built
//! by [`crate::ast::builder::AstBuilder::list_cell`], `Index::NONE`
//! terminating the list. Statement-shaped kinds (`ExprStmt`, `Return`,
//! `If`, `While`, `Compound`) carry their own next-sibling field directly
//! and need no wrapper.

use std::collections::HashMap;

use anyhow::{ensure, Result};

use crate::ast::{NodeKind, Payload};
use crate::error::{Category, Report, Reporter, Severity};
use crate::hbuf::HashedLruBuffer;
use crate::store::{Index, RecordStore};
use crate::symtab::{SymbolEntry, SymbolKind, SymbolTable};
use crate::tac::{Opcode, Operand, TacAddress, TacInstruction, TacStore};
use crate::token::TokenKind;

const SIBLING_CHAIN_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct FunctionInfo {
    pub label_id: u16,
    pub address: Option<TacAddress>,
    pub is_main: bool,
}

/// Owns the temp/label/var allocators and the function table for one
/// translation pass. Constructed fresh per compilation unit.
pub struct Translator {
    next_temp: u16,
    max_temps: u16,
    next_label: u16,
    var_slots: HashMap<Index, (bool, u16, u8)>,
    pub functions: HashMap<Index, FunctionInfo>,
}

impl Translator {
    pub fn new(max_temps: u16) -> Self {
        Translator {
            next_temp: 0,
            max_temps,
            next_label: 0,
            var_slots: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    fn alloc_temp(&mut self, reporter: &mut Reporter) -> Operand {
        if self.next_temp >= self.max_temps {
            reporter.report(Report {
                severity: Severity::Fatal,
                category: Category::Internal,
                token_idx: 0,
                file: "translate".to_string(),
                line: 0,
                code: 1,
                message: "temp allocator exhausted".to_string(),
                suggestion: None,
            });
            return Operand::Temp { id: self.max_temps.saturating_sub(1), scope: 0 };
        }
        let id = self.next_temp;
        self.next_temp += 1;
        Operand::Temp { id, scope: 0 }
    }

    fn alloc_label(&mut self) -> u16 {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    /// Builds the function table from every `SYM_FUNCTION` entry in the
    /// symbol table before any `Call`/`FunctionDef` node is translated
    /// (spec §4.6), so a call can never observe a function that hasn't
    /// already been assigned a label. Each function gets its label id now;
    /// `translate_function` fills in the entry address once it emits the
    /// function's `LABEL` instruction.
    fn prescan_functions(&mut self, hbuf: &mut HashedLruBuffer, symtab: &SymbolTable) -> Result<()> {
        for idx in symtab.iter(hbuf)? {
            let entry = hbuf.read_symbol(idx)?;
            if entry.kind == SymbolKind::Function && !self.functions.contains_key(&idx) {
                let label_id = self.alloc_label();
                self.functions.insert(idx, FunctionInfo { label_id, address: None, is_main: false });
            }
        }
        Ok(())
    }

    /// Variable operands carry the symbol table index itself as their 16-bit
    /// `id` (consistent with the rest of the system's 16-bit index
    /// convention, decision D2) — this is what lets
    /// [`crate::engine::resolver::SymbolResolver`] turn a `Var`/`Global`
    /// operand straight back into a symbol store lookup without a side
    /// table.
    fn operand_for_symbol(&mut self, hbuf: &mut HashedLruBuffer, symbol_idx: Index) -> Result<Operand> {
        if let Some((is_global, id, scope)) = self.var_slots.get(&symbol_idx) {
            return Ok(if *is_global { Operand::Global(*id) } else { Operand::Var { id: *id, scope: *scope } });
        }
        let entry: SymbolEntry = hbuf.read_symbol(symbol_idx)?;
        let id = u16::try_from(symbol_idx.0).map_err(|_| anyhow::anyhow!("invalid: symbol index exceeds 16 bits"))?;
        let is_global = entry.scope_depth == 0;
        self.var_slots.insert(symbol_idx, (is_global, id, entry.scope_depth as u8));
        Ok(if is_global { Operand::Global(id) } else { Operand::Var { id, scope: entry.scope_depth as u8 } })
    }

    fn emit(&self, tac: &mut TacStore, instr: TacInstruction) -> Result<TacAddress> {
        tac.append(&instr)
    }

    fn binary_opcode(op: TokenKind) -> Result<Opcode> {
        use TokenKind::*;
        Ok(match op {
            Plus => Opcode::Add,
            Minus => Opcode::Sub,
            Star => Opcode::Mul,
            Slash => Opcode::Div,
            Percent => Opcode::Mod,
            Eq => Opcode::Eq,
            Ne => Opcode::Ne,
            Lt => Opcode::Lt,
            Le => Opcode::Le,
            Gt => Opcode::Gt,
            Ge => Opcode::Ge,
            AmpAmp => Opcode::LogicalAnd,
            PipePipe => Opcode::LogicalOr,
            Amp => Opcode::And,
            Pipe => Opcode::Or,
            Caret => Opcode::Xor,
            Shl => Opcode::Shl,
            Shr => Opcode::Shr,
            other => anyhow::bail!("invalid: {other:?} is not a binary operator"),
        })
    }

    fn unary_opcode(op: TokenKind) -> Result<Opcode> {
        Ok(match op {
            TokenKind::Minus => Opcode::Neg,
            TokenKind::Bang => Opcode::Not,
            TokenKind::Tilde => Opcode::BitwiseNot,
            other => anyhow::bail!("invalid: {other:?} is not a unary operator"),
        })
    }

    /// Translates an expression node, returning the operand holding its
    /// value. Literals that overflow `i32` spill to a temp per spec §4.6.
    pub fn translate_expr(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        node_idx: Index,
    ) -> Result<Operand> {
        let node = hbuf.read_ast(node_idx)?;
        match node.kind {
            NodeKind::LiteralInt => {
                let Payload::Binary { value, .. } = node.payload else {
                    anyhow::bail!("internal: LiteralInt without Binary payload");
                };
                if let Ok(v) = i32::try_from(value) {
                    Ok(Operand::Immediate(v))
                } else {
                    let dst = self.alloc_temp(reporter);
                    let low = value as i32;
                    self.emit(tac, TacInstruction::assign(dst, Operand::Immediate(low)))?;
                    Ok(dst)
                }
            }
            NodeKind::Identifier => {
                let Payload::Declaration { symbol_idx, .. } = node.payload else {
                    anyhow::bail!("internal: Identifier without Declaration payload");
                };
                self.operand_for_symbol(hbuf, symbol_idx)
            }
            NodeKind::BinaryOp => {
                let Payload::Binary { left, right, value } = node.payload else {
                    anyhow::bail!("internal: BinaryOp without Binary payload");
                };
                let op = TokenKind::try_from(u16::try_from(value).unwrap_or(u16::MAX))
                    .map_err(|_| anyhow::anyhow!("invalid: binary operator token out of range"))?;
                let opcode = Self::binary_opcode(op)?;
                let l = self.translate_expr(hbuf, tac, reporter, left)?;
                let r = self.translate_expr(hbuf, tac, reporter, right)?;
                let dst = self.alloc_temp(reporter);
                self.emit(tac, TacInstruction::binary(opcode, dst, l, r))?;
                Ok(dst)
            }
            NodeKind::UnaryOp => {
                let Payload::Unary { operand, operator, .. } = node.payload else {
                    anyhow::bail!("internal: UnaryOp without Unary payload");
                };
                let opcode = Self::unary_opcode(operator)?;
                let val = self.translate_expr(hbuf, tac, reporter, operand)?;
                let dst = self.alloc_temp(reporter);
                self.emit(tac, TacInstruction::unary(opcode, dst, val))?;
                Ok(dst)
            }
            NodeKind::Assign => {
                let Payload::Binary { left, right, .. } = node.payload else {
                    anyhow::bail!("internal: Assign without Binary payload");
                };
                let dst = self.translate_expr(hbuf, tac, reporter, left)?;
                ensure!(dst.is_temp_or_var() || matches!(dst, Operand::Global(_)), "invalid: assignment target is not an lvalue");
                let src = self.translate_expr(hbuf, tac, reporter, right)?;
                self.emit(tac, TacInstruction::assign(dst, src))?;
                Ok(dst)
            }
            NodeKind::Call => self.translate_call(hbuf, tac, reporter, node_idx),
            other => anyhow::bail!("invalid: {other:?} is not translatable as an expression"),
        }
    }

    fn translate_call(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        node_idx: Index,
    ) -> Result<Operand> {
        let node = hbuf.read_ast(node_idx)?;
        let Payload::Call { function, arguments, .. } = node.payload else {
            anyhow::bail!("internal: Call without Call payload");
        };

        let mut cur = arguments;
        let mut args = Vec::new();
        let mut steps = 0u32;
        while !cur.is_none() {
            steps += 1;
            ensure!(steps <= SIBLING_CHAIN_LIMIT, "internal: call argument chain exceeds {SIBLING_CHAIN_LIMIT} entries");
            let wrapper = hbuf.read_ast(cur)?;
            let Payload::Children { c1, c2, .. } = wrapper.payload else {
                anyhow::bail!("internal: call argument wrapper without Children payload");
            };
            args.push(c1);
            ensure!(c2 != cur, "internal: self-referential call argument chain at {cur:?}");
            cur = c2;
        }

        let mut arg_operands = Vec::with_capacity(args.len());
        for arg in args {
            arg_operands.push(self.translate_expr(hbuf, tac, reporter, arg)?);
        }
        for operand in arg_operands {
            self.emit(tac, TacInstruction::param(operand))?;
        }

        let label_id = match self.functions.get(&function) {
            Some(info) => info.label_id,
            None => {
                reporter.report(Report {
                    severity: Severity::Fatal,
                    category: Category::Semantic,
                    token_idx: node.token_idx,
                    file: "translate".to_string(),
                    line: 0,
                    code: 2,
                    message: format!("call to undeclared function (symbol {})", function.0),
                    suggestion: None,
                });
                anyhow::bail!("invalid: call to undeclared function (symbol {})", function.0);
            }
        };
        let dst = self.alloc_temp(reporter);
        self.emit(tac, TacInstruction::call(dst, label_id))?;
        Ok(dst)
    }

    /// Translates a statement-shaped node and returns the index of its
    /// next sibling (`Index::NONE` at the end of the chain), per the
    /// statement-chaining convention.
    pub fn translate_stmt(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        node_idx: Index,
    ) -> Result<Index> {
        let node = hbuf.read_ast(node_idx)?;
        match node.kind {
            NodeKind::ExprStmt => {
                let Payload::Children { c1, c2, .. } = node.payload else {
                    anyhow::bail!("internal: ExprStmt without Children payload");
                };
                if !c1.is_none() {
                    self.translate_expr(hbuf, tac, reporter, c1)?;
                }
                Ok(c2)
            }
            NodeKind::Return => {
                let Payload::Children { c1, c2, .. } = node.payload else {
                    anyhow::bail!("internal: Return without Children payload");
                };
                if c1.is_none() {
                    self.emit(tac, TacInstruction::ret_void())?;
                } else {
                    let value = self.translate_expr(hbuf, tac, reporter, c1)?;
                    self.emit(tac, TacInstruction::ret(value))?;
                }
                Ok(c2)
            }
            NodeKind::If => {
                let Payload::Children { c1: then_stmt, c2: condition, c3: else_stmt, c4: next } = node.payload else {
                    anyhow::bail!("internal: If without Children payload");
                };
                let cond = self.translate_expr(hbuf, tac, reporter, condition)?;
                let else_label = self.alloc_label();
                self.emit(tac, TacInstruction::if_false(cond, else_label))?;
                self.translate_stmt_chain(hbuf, tac, reporter, then_stmt)?;
                if else_stmt.is_none() {
                    self.emit(tac, TacInstruction::label(else_label))?;
                } else {
                    let end_label = self.alloc_label();
                    self.emit(tac, TacInstruction::goto_label(end_label))?;
                    self.emit(tac, TacInstruction::label(else_label))?;
                    self.translate_stmt_chain(hbuf, tac, reporter, else_stmt)?;
                    self.emit(tac, TacInstruction::label(end_label))?;
                }
                Ok(next)
            }
            NodeKind::While => {
                let Payload::Children { c1: body, c2: condition, c4: next, .. } = node.payload else {
                    anyhow::bail!("internal: While without Children payload");
                };
                let start_label = self.alloc_label();
                let end_label = self.alloc_label();
                self.emit(tac, TacInstruction::label(start_label))?;
                let cond = self.translate_expr(hbuf, tac, reporter, condition)?;
                self.emit(tac, TacInstruction::if_false(cond, end_label))?;
                self.translate_stmt_chain(hbuf, tac, reporter, body)?;
                self.emit(tac, TacInstruction::goto_label(start_label))?;
                self.emit(tac, TacInstruction::label(end_label))?;
                Ok(next)
            }
            NodeKind::Compound => self.translate_compound(hbuf, tac, reporter, node_idx),
            other => anyhow::bail!("invalid: {other:?} is not translatable as a statement"),
        }
    }

    /// Walks an ordinary statement sibling chain (`c2` = next), translating
    /// each node in order.
    fn translate_stmt_chain(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        first: Index,
    ) -> Result<()> {
        let mut cur = first;
        let mut steps = 0u32;
        while !cur.is_none() {
            steps += 1;
            ensure!(steps <= SIBLING_CHAIN_LIMIT, "internal: statement chain exceeds {SIBLING_CHAIN_LIMIT} entries");
            let next = self.translate_stmt(hbuf, tac, reporter, cur)?;
            ensure!(next != cur, "internal: self-referential statement sibling chain at {cur:?}");
            cur = next;
        }
        Ok(())
    }

    fn translate_compound(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        node_idx: Index,
    ) -> Result<Index> {
        let node = hbuf.read_ast(node_idx)?;
        let Payload::Compound { declarations, statements, .. } = node.payload else {
            anyhow::bail!("internal: Compound without Compound payload");
        };
        self.translate_var_decl_list(hbuf, tac, reporter, declarations)?;
        self.translate_stmt_chain(hbuf, tac, reporter, statements)?;
        Ok(Index::NONE)
    }

    /// Walks a list-cell chain (see [`crate::ast::builder::AstBuilder::list_cell`])
    /// of local `VarDecl` nodes, translating each in order.
    fn translate_var_decl_list(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        first: Index,
    ) -> Result<()> {
        let mut cur = first;
        let mut steps = 0u32;
        while !cur.is_none() {
            steps += 1;
            ensure!(steps <= SIBLING_CHAIN_LIMIT, "internal: declaration chain exceeds {SIBLING_CHAIN_LIMIT} entries");
            let wrapper = hbuf.read_ast(cur)?;
            let Payload::Children { c1, c2, .. } = wrapper.payload else {
                anyhow::bail!("internal: declaration list cell without Children payload");
            };
            if !c1.is_none() {
                self.translate_var_decl(hbuf, tac, reporter, c1)?;
            }
            ensure!(c2 != cur, "internal: self-referential declaration chain at {cur:?}");
            cur = c2;
        }
        Ok(())
    }

    fn translate_var_decl(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        node_idx: Index,
    ) -> Result<()> {
        let node = hbuf.read_ast(node_idx)?;
        let Payload::Declaration { symbol_idx, initializer, .. } = node.payload else {
            anyhow::bail!("internal: VarDecl without Declaration payload");
        };
        let dst = self.operand_for_symbol(hbuf, symbol_idx)?;
        if !initializer.is_none() {
            let value = self.translate_expr(hbuf, tac, reporter, initializer)?;
            self.emit(tac, TacInstruction::assign(dst, value))?;
        }
        Ok(())
    }

    /// Binds a function's incoming arguments to its parameter variables.
    /// Parameters are ordinary `VarDecl`s in the function body's `Compound`
    /// declaration list-cell chain, distinguished by `storage_class == 1`
    /// (set by [`crate::ast::builder::AstBuilder::fn_param`]); each is
    /// assigned from the matching `Operand::Param(i)` in declaration order,
    /// before the rest of the declaration list (ordinary locals) runs.
    fn bind_parameters(&mut self, hbuf: &mut HashedLruBuffer, tac: &mut TacStore, declarations: Index) -> Result<()> {
        let mut cur = declarations;
        let mut steps = 0u32;
        let mut param_index: u16 = 0;
        while !cur.is_none() {
            steps += 1;
            ensure!(steps <= SIBLING_CHAIN_LIMIT, "internal: declaration chain exceeds {SIBLING_CHAIN_LIMIT} entries");
            let wrapper = hbuf.read_ast(cur)?;
            let Payload::Children { c1, c2, .. } = wrapper.payload else {
                anyhow::bail!("internal: declaration list cell without Children payload");
            };
            if !c1.is_none() {
                let decl = hbuf.read_ast(c1)?;
                if let Payload::Declaration { symbol_idx, storage_class: 1, .. } = decl.payload {
                    let dst = self.operand_for_symbol(hbuf, symbol_idx)?;
                    self.emit(tac, TacInstruction::assign(dst, Operand::Param(param_index)))?;
                    param_index += 1;
                }
            }
            ensure!(c2 != cur, "internal: self-referential declaration chain at {cur:?}");
            cur = c2;
        }
        Ok(())
    }

    /// Translates one `FunctionDef` node: emits its entry label, binds any
    /// parameters, translates the body, and emits a trailing `RETURN_VOID`
    /// guard if control can fall off the end.
    pub fn translate_function(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        node_idx: Index,
        is_main: bool,
    ) -> Result<()> {
        let node = hbuf.read_ast(node_idx)?;
        let Payload::Declaration { symbol_idx, initializer: body, .. } = node.payload else {
            anyhow::bail!("internal: FunctionDef without Declaration payload");
        };

        let label_id = self.functions.get(&symbol_idx).map(|f| f.label_id).unwrap_or_else(|| self.alloc_label());
        let address = self.emit(tac, TacInstruction::label(label_id))?;
        self.functions.insert(symbol_idx, FunctionInfo { label_id, address: Some(address), is_main });

        if !body.is_none() {
            let body_node = hbuf.read_ast(body)?;
            if let Payload::Compound { declarations, .. } = body_node.payload {
                self.bind_parameters(hbuf, tac, declarations)?;
            }
            self.translate_stmt(hbuf, tac, reporter, body)?;
        }
        self.emit(tac, TacInstruction::ret_void())?;
        Ok(())
    }

    /// Walks the top-level list-cell chain once, returning each declaration
    /// node's index in source order.
    fn top_level_decls(&self, hbuf: &mut HashedLruBuffer, first: Index) -> Result<Vec<Index>> {
        let mut out = Vec::new();
        let mut cur = first;
        let mut steps = 0u32;
        while !cur.is_none() {
            steps += 1;
            ensure!(steps <= SIBLING_CHAIN_LIMIT, "internal: top-level declaration chain exceeds {SIBLING_CHAIN_LIMIT} entries");
            let wrapper = hbuf.read_ast(cur)?;
            let Payload::Children { c1: item, c2: next, .. } = wrapper.payload else {
                anyhow::bail!("internal: top-level list cell without Children payload");
            };
            if !item.is_none() {
                out.push(item);
            }
            ensure!(next != cur, "internal: self-referential top-level chain at {cur:?}");
            cur = next;
        }
        Ok(out)
    }

    /// Translates a `Program` node in the two ordered passes required so
    /// that globals are always defined before any function body that
    /// references them: first every top-level `VarDecl`, then every
    /// `FunctionDef`, both in source order. `main_symbol` marks which
    /// function (if any) is the entry point.
    pub fn translate_program(
        &mut self,
        hbuf: &mut HashedLruBuffer,
        tac: &mut TacStore,
        reporter: &mut Reporter,
        symtab: &SymbolTable,
        program_idx: Index,
        main_symbol: Option<Index>,
    ) -> Result<()> {
        let node = hbuf.read_ast(program_idx)?;
        let Payload::Children { c1: first, .. } = node.payload else {
            anyhow::bail!("internal: Program without Children payload");
        };
        let decls = self.top_level_decls(hbuf, first)?;
        self.prescan_functions(hbuf, symtab)?;

        for &item in &decls {
            let decl = hbuf.read_ast(item)?;
            if decl.kind == NodeKind::VarDecl {
                self.translate_var_decl(hbuf, tac, reporter, item)?;
            }
        }
        for &item in &decls {
            let decl = hbuf.read_ast(item)?;
            match decl.kind {
                NodeKind::FunctionDef => {
                    let Payload::Declaration { symbol_idx, .. } = decl.payload else {
                        anyhow::bail!("internal: FunctionDef without Declaration payload");
                    };
                    let is_main = main_symbol == Some(symbol_idx);
                    self.translate_function(hbuf, tac, reporter, item, is_main)?;
                }
                NodeKind::VarDecl => {}
                other => anyhow::bail!("invalid: {other:?} is not a valid top-level declaration"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::AstBuilder;
    use crate::ast::AstStore;
    use crate::store::FileStore;
    use crate::symtab::{SymbolKind, SymbolTable};

    fn new_hbuf() -> HashedLruBuffer {
        let dir = tempfile::tempdir().unwrap();
        let ast: AstStore = FileStore::init(dir.path().join("ast.bin")).unwrap();
        let sym: crate::symtab::SymbolStore = FileStore::init(dir.path().join("sym.bin")).unwrap();
        std::mem::forget(dir);
        HashedLruBuffer::new(ast, sym)
    }

    fn new_tac() -> TacStore {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::init(dir.path().join("tac.bin")).unwrap();
        std::mem::forget(dir);
        store
    }

    /// `int main() { return 1 + 2 * 3; }` — mirrors seed scenario S3.
    #[test]
    fn translates_arithmetic_return_with_precedence_already_resolved() {
        let mut hbuf = new_hbuf();
        let mut symtab = SymbolTable::init(&mut hbuf).unwrap();
        let mut tac = new_tac();
        let mut reporter = Reporter::new(0, 0);
        let mut b = AstBuilder::new("translate", 0, 0);

        let main_sym = symtab
            .add(&mut hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() })
            .unwrap();

        let one = b.literal_int(&mut hbuf, 0, 1).unwrap();
        let two = b.literal_int(&mut hbuf, 0, 2).unwrap();
        let three = b.literal_int(&mut hbuf, 0, 3).unwrap();
        let mul_token: i64 = u16::from(TokenKind::Star).into();
        let mul = b.binary_op(&mut hbuf, 0, two, three, mul_token).unwrap();
        let add_token: i64 = u16::from(TokenKind::Plus).into();
        let sum = b.binary_op(&mut hbuf, 0, one, mul, add_token).unwrap();
        let ret = b.return_stmt(&mut hbuf, 0, sum).unwrap();
        let body = b.compound(&mut hbuf, 0, Index::NONE, ret, Index::NONE).unwrap();
        let func = b.function_def(&mut hbuf, 0, main_sym, Index::NONE, body).unwrap();
        let cell = b.list_cell(&mut hbuf, func, Index::NONE).unwrap();
        let program = b.program(&mut hbuf, cell).unwrap();

        let mut translator = Translator::new(1000);
        translator
            .translate_program(&mut hbuf, &mut tac, &mut reporter, &symtab, program, Some(main_sym))
            .unwrap();

        assert_eq!(reporter.error_count(), 0);
        assert_eq!(tac.count(), 5); // LABEL, MUL, ADD, RETURN, RETURN_VOID
        let last = tac.get(Index(5)).unwrap();
        assert_eq!(last.opcode, Opcode::ReturnVoid);
        let ret_instr = tac.get(Index(4)).unwrap();
        assert_eq!(ret_instr.opcode, Opcode::Return);
    }

    #[test]
    fn call_arguments_chain_through_list_cells() {
        let mut hbuf = new_hbuf();
        let mut tac = new_tac();
        let mut reporter = Reporter::new(0, 0);
        let mut b = AstBuilder::new("translate", 0, 0);

        let a = b.literal_int(&mut hbuf, 0, 5).unwrap();
        let c = b.literal_int(&mut hbuf, 0, 1).unwrap();
        let cell_b = b.list_cell(&mut hbuf, c, Index::NONE).unwrap();
        let cell_a = b.list_cell(&mut hbuf, a, cell_b).unwrap();
        let callee = Index(99);
        let call = b.call(&mut hbuf, 0, callee, cell_a, 2).unwrap();

        let mut translator = Translator::new(1000);
        // Stand in for the function-table prescan `translate_program` would
        // normally run: a bare `translate_expr` call has no symbol table to
        // scan, so register the callee the same way the scan would.
        translator.functions.insert(callee, FunctionInfo { label_id: 0, address: None, is_main: false });
        let result = translator.translate_expr(&mut hbuf, &mut tac, &mut reporter, call).unwrap();
        assert!(matches!(result, Operand::Temp { .. }));
        // two PARAMs followed by one CALL
        assert_eq!(tac.count(), 3);
        assert_eq!(tac.get(Index(1)).unwrap().opcode, Opcode::Param);
        assert_eq!(tac.get(Index(2)).unwrap().opcode, Opcode::Param);
        assert_eq!(tac.get(Index(3)).unwrap().opcode, Opcode::Call);
    }

    #[test]
    fn call_to_undeclared_function_is_a_hard_error() {
        let mut hbuf = new_hbuf();
        let mut tac = new_tac();
        let mut reporter = Reporter::new(10, 10);
        let mut b = AstBuilder::new("translate", 0, 0);

        let call = b.call(&mut hbuf, 0, Index(42), Index::NONE, 0).unwrap();

        let mut translator = Translator::new(1000);
        let result = translator.translate_expr(&mut hbuf, &mut tac, &mut reporter, call);
        assert!(result.is_err());
        assert_eq!(reporter.error_count(), 1);
    }

    /// `int add(int a,int b){return a+b;} int main(){return add(5,10);}`
    /// (seed scenario S6) — parameters bind from `Operand::Param(i)`.
    #[test]
    fn function_parameters_bind_from_param_operands() {
        let mut hbuf = new_hbuf();
        let mut symtab = SymbolTable::init(&mut hbuf).unwrap();
        let mut tac = new_tac();
        let mut reporter = Reporter::new(0, 0);
        let mut b = AstBuilder::new("translate", 0, 0);

        let add_sym = symtab
            .add(&mut hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() })
            .unwrap();
        let a_sym = symtab
            .add(&mut hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Variable, scope_depth: 1, ..SymbolEntry::free() })
            .unwrap();
        let b_sym = symtab
            .add(&mut hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Variable, scope_depth: 1, ..SymbolEntry::free() })
            .unwrap();
        let main_sym = symtab
            .add(&mut hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() })
            .unwrap();

        // add(a, b) { return a + b; }
        let a_param = b.fn_param(&mut hbuf, 0, a_sym, Index::NONE).unwrap();
        let b_param = b.fn_param(&mut hbuf, 0, b_sym, Index::NONE).unwrap();
        let params_tail = b.list_cell(&mut hbuf, b_param, Index::NONE).unwrap();
        let params = b.list_cell(&mut hbuf, a_param, params_tail).unwrap();
        let a_ref = b.identifier(&mut hbuf, 0, a_sym).unwrap();
        let b_ref = b.identifier(&mut hbuf, 0, b_sym).unwrap();
        let plus_token: i64 = u16::from(TokenKind::Plus).into();
        let sum = b.binary_op(&mut hbuf, 0, a_ref, b_ref, plus_token).unwrap();
        let ret = b.return_stmt(&mut hbuf, 0, sum).unwrap();
        let add_body = b.compound(&mut hbuf, 0, params, ret, Index::NONE).unwrap();
        let add_def = b.function_def(&mut hbuf, 0, add_sym, Index::NONE, add_body).unwrap();

        // main() { return add(5, 10); }
        let five = b.literal_int(&mut hbuf, 0, 5).unwrap();
        let ten = b.literal_int(&mut hbuf, 0, 10).unwrap();
        let arg_cell_b = b.list_cell(&mut hbuf, ten, Index::NONE).unwrap();
        let arg_cell_a = b.list_cell(&mut hbuf, five, arg_cell_b).unwrap();
        let call = b.call(&mut hbuf, 0, add_sym, arg_cell_a, 2).unwrap();
        let main_ret = b.return_stmt(&mut hbuf, 0, call).unwrap();
        let main_body = b.compound(&mut hbuf, 0, Index::NONE, main_ret, Index::NONE).unwrap();
        let main_def = b.function_def(&mut hbuf, 0, main_sym, Index::NONE, main_body).unwrap();

        let add_cell = b.list_cell(&mut hbuf, add_def, Index::NONE).unwrap();
        let main_cell = b.list_cell(&mut hbuf, main_def, add_cell).unwrap();
        let program = b.program(&mut hbuf, main_cell).unwrap();

        let mut translator = Translator::new(1000);
        translator
            .translate_program(&mut hbuf, &mut tac, &mut reporter, &symtab, program, Some(main_sym))
            .unwrap();
        assert_eq!(reporter.error_count(), 0);

        // add's entry: the LABEL itself, then two PARAM-bind ASSIGNs, then ADD, RETURN.
        // `FunctionInfo::address` is the LABEL instruction's own 1-based TAC index.
        let add_info = translator.functions[&add_sym];
        let entry = add_info.address.unwrap().0;
        assert_eq!(tac.get(Index(entry)).unwrap().opcode, Opcode::Label);
        assert_eq!(tac.get(Index(entry + 1)).unwrap().opcode, Opcode::Assign);
        assert_eq!(tac.get(Index(entry + 1)).unwrap().operand1, Operand::Param(0));
        assert_eq!(tac.get(Index(entry + 2)).unwrap().opcode, Opcode::Assign);
        assert_eq!(tac.get(Index(entry + 2)).unwrap().operand1, Operand::Param(1));
        assert_eq!(tac.get(Index(entry + 3)).unwrap().opcode, Opcode::Add);
        assert_eq!(tac.get(Index(entry + 4)).unwrap().opcode, Opcode::Return);
    }
}
