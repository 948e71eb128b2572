//! End-to-end pipeline tests: hand-build an AST through [`AstBuilder`] (the
//! same construction API `cc1`'s parser drives), translate it to TAC, and
//! run it to completion through the VM. Each builder mirrors one of the seed
//! scenarios, built directly against the builder/translator/engine APIs
//! rather than through the text parser, so a failure points straight at
//! the store/AST/TAC layer under test instead of at grammar plumbing.

use insta::assert_snapshot;
use rstest::rstest;

use stcc1::ast::builder::AstBuilder;
use stcc1::ast::AstStore;
use stcc1::config::EngineConfig;
use stcc1::engine::{Engine, EngineState};
use stcc1::error::Reporter;
use stcc1::hbuf::HashedLruBuffer;
use stcc1::store::{FileStore, Index, RecordStore};
use stcc1::symtab::{SymbolEntry, SymbolKind, SymbolStore, SymbolTable};
use stcc1::tac::{Opcode, Operand, TacInstruction, TacStore};
use stcc1::token::TokenKind;
use stcc1::translate::Translator;

fn new_hbuf() -> HashedLruBuffer {
    let dir = tempfile::tempdir().unwrap();
    let ast: AstStore = FileStore::init(dir.path().join("ast.bin")).unwrap();
    let sym: SymbolStore = FileStore::init(dir.path().join("sym.bin")).unwrap();
    std::mem::forget(dir);
    HashedLruBuffer::new(ast, sym)
}

fn new_tac() -> TacStore {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::init(dir.path().join("tac.bin")).unwrap();
    std::mem::forget(dir);
    store
}

fn new_engine() -> Engine {
    Engine::create(EngineConfig { max_steps: 10_000, ..EngineConfig::default() }).unwrap()
}

fn op_token(kind: TokenKind) -> i64 {
    let code: u16 = kind.into();
    i64::from(code)
}

fn local_var(symtab: &mut SymbolTable, hbuf: &mut HashedLruBuffer) -> Index {
    symtab
        .add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Variable, scope_depth: 1, ..SymbolEntry::free() })
        .unwrap()
}

/// Translates `program` (rooted at `main_sym`) and runs it to completion,
/// returning the VM's final return value.
fn run_program(hbuf: &mut HashedLruBuffer, symtab: &SymbolTable, program: Index, main_sym: Index) -> i64 {
    let mut tac = new_tac();
    let mut reporter = Reporter::new(0, 0);
    let mut translator = Translator::new(1000);
    translator.translate_program(hbuf, &mut tac, &mut reporter, symtab, program, Some(main_sym)).unwrap();
    assert_eq!(reporter.error_count(), 0);

    let entry_label = translator.functions[&main_sym].label_id;
    let mut engine = new_engine();
    engine.load_code(&mut tac).unwrap();
    engine.set_entry_label(entry_label).unwrap();
    engine.start().unwrap();
    engine.run().unwrap();
    assert_eq!(engine.get_state(), EngineState::Finished);
    engine.last_return_value()
}

/// S1: `int main(){ return 0; }` -> 0
fn build_s1(hbuf: &mut HashedLruBuffer, symtab: &mut SymbolTable, b: &mut AstBuilder) -> (Index, Index) {
    let main_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();
    let zero = b.literal_int(hbuf, 0, 0).unwrap();
    let ret = b.return_stmt(hbuf, 0, zero).unwrap();
    let body = b.compound(hbuf, 0, Index::NONE, ret, Index::NONE).unwrap();
    let main_def = b.function_def(hbuf, 0, main_sym, Index::NONE, body).unwrap();
    let cell = b.list_cell(hbuf, main_def, Index::NONE).unwrap();
    let program = b.program(hbuf, cell).unwrap();
    (program, main_sym)
}

/// S2: `int main(){ int x=10; int y=20; int z=x+y; return z; }` -> 30
fn build_s2(hbuf: &mut HashedLruBuffer, symtab: &mut SymbolTable, b: &mut AstBuilder) -> (Index, Index) {
    let main_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();
    let x_sym = local_var(symtab, hbuf);
    let y_sym = local_var(symtab, hbuf);
    let z_sym = local_var(symtab, hbuf);

    let ten = b.literal_int(hbuf, 0, 10).unwrap();
    let twenty = b.literal_int(hbuf, 0, 20).unwrap();
    let x_decl = b.var_decl(hbuf, 0, x_sym, Index::NONE, ten).unwrap();
    let y_decl = b.var_decl(hbuf, 0, y_sym, Index::NONE, twenty).unwrap();

    let x_ref = b.identifier(hbuf, 0, x_sym).unwrap();
    let y_ref = b.identifier(hbuf, 0, y_sym).unwrap();
    let sum = b.binary_op(hbuf, 0, x_ref, y_ref, op_token(TokenKind::Plus)).unwrap();
    let z_decl = b.var_decl(hbuf, 0, z_sym, Index::NONE, sum).unwrap();

    let decls_tail = b.list_cell(hbuf, z_decl, Index::NONE).unwrap();
    let decls_mid = b.list_cell(hbuf, y_decl, decls_tail).unwrap();
    let decls = b.list_cell(hbuf, x_decl, decls_mid).unwrap();

    let z_ref = b.identifier(hbuf, 0, z_sym).unwrap();
    let ret = b.return_stmt(hbuf, 0, z_ref).unwrap();
    let body = b.compound(hbuf, 0, decls, ret, Index::NONE).unwrap();
    let main_def = b.function_def(hbuf, 0, main_sym, Index::NONE, body).unwrap();
    let cell = b.list_cell(hbuf, main_def, Index::NONE).unwrap();
    let program = b.program(hbuf, cell).unwrap();
    (program, main_sym)
}

/// S3: `int main(){ int x=1+2*3-4/2; return x; }` -> 5
fn build_s3(hbuf: &mut HashedLruBuffer, symtab: &mut SymbolTable, b: &mut AstBuilder) -> (Index, Index) {
    let main_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();
    let x_sym = local_var(symtab, hbuf);

    let one = b.literal_int(hbuf, 0, 1).unwrap();
    let two = b.literal_int(hbuf, 0, 2).unwrap();
    let three = b.literal_int(hbuf, 0, 3).unwrap();
    let four = b.literal_int(hbuf, 0, 4).unwrap();
    let two_again = b.literal_int(hbuf, 0, 2).unwrap();

    let mul = b.binary_op(hbuf, 0, two, three, op_token(TokenKind::Star)).unwrap();
    let div = b.binary_op(hbuf, 0, four, two_again, op_token(TokenKind::Slash)).unwrap();
    let add = b.binary_op(hbuf, 0, one, mul, op_token(TokenKind::Plus)).unwrap();
    let sub = b.binary_op(hbuf, 0, add, div, op_token(TokenKind::Minus)).unwrap();
    let x_decl = b.var_decl(hbuf, 0, x_sym, Index::NONE, sub).unwrap();
    let decls = b.list_cell(hbuf, x_decl, Index::NONE).unwrap();

    let x_ref = b.identifier(hbuf, 0, x_sym).unwrap();
    let ret = b.return_stmt(hbuf, 0, x_ref).unwrap();
    let body = b.compound(hbuf, 0, decls, ret, Index::NONE).unwrap();
    let main_def = b.function_def(hbuf, 0, main_sym, Index::NONE, body).unwrap();
    let cell = b.list_cell(hbuf, main_def, Index::NONE).unwrap();
    let program = b.program(hbuf, cell).unwrap();
    (program, main_sym)
}

/// S4: `int main(){ int x=10; if(x>5)x=x+1; else x=x-1; return x; }` -> 11
fn build_s4(hbuf: &mut HashedLruBuffer, symtab: &mut SymbolTable, b: &mut AstBuilder) -> (Index, Index) {
    let main_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();
    let x_sym = local_var(symtab, hbuf);

    let ten = b.literal_int(hbuf, 0, 10).unwrap();
    let x_decl = b.var_decl(hbuf, 0, x_sym, Index::NONE, ten).unwrap();
    let decls = b.list_cell(hbuf, x_decl, Index::NONE).unwrap();

    let x_cond_ref = b.identifier(hbuf, 0, x_sym).unwrap();
    let five = b.literal_int(hbuf, 0, 5).unwrap();
    let cond = b.binary_op(hbuf, 0, x_cond_ref, five, op_token(TokenKind::Gt)).unwrap();

    let x_then_target = b.identifier(hbuf, 0, x_sym).unwrap();
    let x_then_rhs = b.identifier(hbuf, 0, x_sym).unwrap();
    let one = b.literal_int(hbuf, 0, 1).unwrap();
    let then_sum = b.binary_op(hbuf, 0, x_then_rhs, one, op_token(TokenKind::Plus)).unwrap();
    let then_assign = b.assign(hbuf, 0, x_then_target, then_sum).unwrap();
    let then_stmt = b.expr_stmt(hbuf, 0, then_assign).unwrap();

    let x_else_target = b.identifier(hbuf, 0, x_sym).unwrap();
    let x_else_rhs = b.identifier(hbuf, 0, x_sym).unwrap();
    let else_diff = b.binary_op(hbuf, 0, x_else_rhs, one, op_token(TokenKind::Minus)).unwrap();
    let else_assign = b.assign(hbuf, 0, x_else_target, else_diff).unwrap();
    let else_stmt = b.expr_stmt(hbuf, 0, else_assign).unwrap();

    let if_node = b.if_stmt(hbuf, 0, cond, then_stmt, else_stmt).unwrap();
    let x_ret_ref = b.identifier(hbuf, 0, x_sym).unwrap();
    let ret = b.return_stmt(hbuf, 0, x_ret_ref).unwrap();
    b.chain_next(hbuf, if_node, ret).unwrap();

    let body = b.compound(hbuf, 0, decls, if_node, Index::NONE).unwrap();
    let main_def = b.function_def(hbuf, 0, main_sym, Index::NONE, body).unwrap();
    let cell = b.list_cell(hbuf, main_def, Index::NONE).unwrap();
    let program = b.program(hbuf, cell).unwrap();
    (program, main_sym)
}

/// S5: `int main(){ int i=0,s=0; while(i<10){s=s+i;i=i+1;} return s; }` -> 45
fn build_s5(hbuf: &mut HashedLruBuffer, symtab: &mut SymbolTable, b: &mut AstBuilder) -> (Index, Index) {
    let main_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();
    let i_sym = local_var(symtab, hbuf);
    let s_sym = local_var(symtab, hbuf);

    let zero_i = b.literal_int(hbuf, 0, 0).unwrap();
    let zero_s = b.literal_int(hbuf, 0, 0).unwrap();
    let i_decl = b.var_decl(hbuf, 0, i_sym, Index::NONE, zero_i).unwrap();
    let s_decl = b.var_decl(hbuf, 0, s_sym, Index::NONE, zero_s).unwrap();
    let decls_tail = b.list_cell(hbuf, s_decl, Index::NONE).unwrap();
    let decls = b.list_cell(hbuf, i_decl, decls_tail).unwrap();

    let i_cond_ref = b.identifier(hbuf, 0, i_sym).unwrap();
    let ten = b.literal_int(hbuf, 0, 10).unwrap();
    let cond = b.binary_op(hbuf, 0, i_cond_ref, ten, op_token(TokenKind::Lt)).unwrap();

    let s_target = b.identifier(hbuf, 0, s_sym).unwrap();
    let s_rhs = b.identifier(hbuf, 0, s_sym).unwrap();
    let i_rhs = b.identifier(hbuf, 0, i_sym).unwrap();
    let s_sum = b.binary_op(hbuf, 0, s_rhs, i_rhs, op_token(TokenKind::Plus)).unwrap();
    let s_assign = b.assign(hbuf, 0, s_target, s_sum).unwrap();
    let s_stmt = b.expr_stmt(hbuf, 0, s_assign).unwrap();

    let i_target = b.identifier(hbuf, 0, i_sym).unwrap();
    let i_rhs2 = b.identifier(hbuf, 0, i_sym).unwrap();
    let one = b.literal_int(hbuf, 0, 1).unwrap();
    let i_sum = b.binary_op(hbuf, 0, i_rhs2, one, op_token(TokenKind::Plus)).unwrap();
    let i_assign = b.assign(hbuf, 0, i_target, i_sum).unwrap();
    let i_stmt = b.expr_stmt(hbuf, 0, i_assign).unwrap();

    b.chain_sibling(hbuf, s_stmt, i_stmt).unwrap();
    let while_node = b.while_stmt(hbuf, 0, cond, s_stmt).unwrap();

    let s_ret_ref = b.identifier(hbuf, 0, s_sym).unwrap();
    let ret = b.return_stmt(hbuf, 0, s_ret_ref).unwrap();
    b.chain_next(hbuf, while_node, ret).unwrap();

    let body = b.compound(hbuf, 0, decls, while_node, Index::NONE).unwrap();
    let main_def = b.function_def(hbuf, 0, main_sym, Index::NONE, body).unwrap();
    let cell = b.list_cell(hbuf, main_def, Index::NONE).unwrap();
    let program = b.program(hbuf, cell).unwrap();
    (program, main_sym)
}

/// S6: `int add(int a,int b){return a+b;} int main(){return add(5,10);}` -> 15
fn build_s6(hbuf: &mut HashedLruBuffer, symtab: &mut SymbolTable, b: &mut AstBuilder) -> (Index, Index) {
    let add_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();
    let a_sym = local_var(symtab, hbuf);
    let b_sym = local_var(symtab, hbuf);
    let main_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();

    let a_param = b.fn_param(hbuf, 0, a_sym, Index::NONE).unwrap();
    let b_param = b.fn_param(hbuf, 0, b_sym, Index::NONE).unwrap();
    let params_tail = b.list_cell(hbuf, b_param, Index::NONE).unwrap();
    let params = b.list_cell(hbuf, a_param, params_tail).unwrap();

    let a_ref = b.identifier(hbuf, 0, a_sym).unwrap();
    let b_ref = b.identifier(hbuf, 0, b_sym).unwrap();
    let sum = b.binary_op(hbuf, 0, a_ref, b_ref, op_token(TokenKind::Plus)).unwrap();
    let add_ret = b.return_stmt(hbuf, 0, sum).unwrap();
    let add_body = b.compound(hbuf, 0, params, add_ret, Index::NONE).unwrap();
    let add_def = b.function_def(hbuf, 0, add_sym, Index::NONE, add_body).unwrap();

    let five = b.literal_int(hbuf, 0, 5).unwrap();
    let ten = b.literal_int(hbuf, 0, 10).unwrap();
    let arg_tail = b.list_cell(hbuf, ten, Index::NONE).unwrap();
    let args = b.list_cell(hbuf, five, arg_tail).unwrap();
    let call = b.call(hbuf, 0, add_sym, args, 2).unwrap();
    let main_ret = b.return_stmt(hbuf, 0, call).unwrap();
    let main_body = b.compound(hbuf, 0, Index::NONE, main_ret, Index::NONE).unwrap();
    let main_def = b.function_def(hbuf, 0, main_sym, Index::NONE, main_body).unwrap();

    let add_cell = b.list_cell(hbuf, add_def, Index::NONE).unwrap();
    let main_cell = b.list_cell(hbuf, main_def, add_cell).unwrap();
    let program = b.program(hbuf, main_cell).unwrap();
    (program, main_sym)
}

/// S7: `int factorial(int n){int r=1,i=1; while(i<=n){r=r*i;i=i+1;} return r;}
/// int main(){return factorial(5);}` -> 120
fn build_s7(hbuf: &mut HashedLruBuffer, symtab: &mut SymbolTable, b: &mut AstBuilder) -> (Index, Index) {
    let fact_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();
    let n_sym = local_var(symtab, hbuf);
    let r_sym = local_var(symtab, hbuf);
    let i_sym = local_var(symtab, hbuf);
    let main_sym = symtab.add(hbuf, symtab.root(), SymbolEntry { kind: SymbolKind::Function, ..SymbolEntry::free() }).unwrap();

    let n_param = b.fn_param(hbuf, 0, n_sym, Index::NONE).unwrap();
    let one_r = b.literal_int(hbuf, 0, 1).unwrap();
    let one_i = b.literal_int(hbuf, 0, 1).unwrap();
    let r_decl = b.var_decl(hbuf, 0, r_sym, Index::NONE, one_r).unwrap();
    let i_decl = b.var_decl(hbuf, 0, i_sym, Index::NONE, one_i).unwrap();
    let decls_tail = b.list_cell(hbuf, i_decl, Index::NONE).unwrap();
    let decls_mid = b.list_cell(hbuf, r_decl, decls_tail).unwrap();
    let decls = b.list_cell(hbuf, n_param, decls_mid).unwrap();

    let i_cond_ref = b.identifier(hbuf, 0, i_sym).unwrap();
    let n_cond_ref = b.identifier(hbuf, 0, n_sym).unwrap();
    let cond = b.binary_op(hbuf, 0, i_cond_ref, n_cond_ref, op_token(TokenKind::Le)).unwrap();

    let r_target = b.identifier(hbuf, 0, r_sym).unwrap();
    let r_rhs = b.identifier(hbuf, 0, r_sym).unwrap();
    let i_rhs = b.identifier(hbuf, 0, i_sym).unwrap();
    let r_mul = b.binary_op(hbuf, 0, r_rhs, i_rhs, op_token(TokenKind::Star)).unwrap();
    let r_assign = b.assign(hbuf, 0, r_target, r_mul).unwrap();
    let r_stmt = b.expr_stmt(hbuf, 0, r_assign).unwrap();

    let i_target = b.identifier(hbuf, 0, i_sym).unwrap();
    let i_rhs2 = b.identifier(hbuf, 0, i_sym).unwrap();
    let one = b.literal_int(hbuf, 0, 1).unwrap();
    let i_sum = b.binary_op(hbuf, 0, i_rhs2, one, op_token(TokenKind::Plus)).unwrap();
    let i_assign = b.assign(hbuf, 0, i_target, i_sum).unwrap();
    let i_stmt = b.expr_stmt(hbuf, 0, i_assign).unwrap();

    b.chain_sibling(hbuf, r_stmt, i_stmt).unwrap();
    let while_node = b.while_stmt(hbuf, 0, cond, r_stmt).unwrap();

    let r_ret_ref = b.identifier(hbuf, 0, r_sym).unwrap();
    let fact_ret = b.return_stmt(hbuf, 0, r_ret_ref).unwrap();
    b.chain_next(hbuf, while_node, fact_ret).unwrap();

    let fact_body = b.compound(hbuf, 0, decls, while_node, Index::NONE).unwrap();
    let fact_def = b.function_def(hbuf, 0, fact_sym, Index::NONE, fact_body).unwrap();

    let five = b.literal_int(hbuf, 0, 5).unwrap();
    let args = b.list_cell(hbuf, five, Index::NONE).unwrap();
    let call = b.call(hbuf, 0, fact_sym, args, 1).unwrap();
    let main_ret = b.return_stmt(hbuf, 0, call).unwrap();
    let main_body = b.compound(hbuf, 0, Index::NONE, main_ret, Index::NONE).unwrap();
    let main_def = b.function_def(hbuf, 0, main_sym, Index::NONE, main_body).unwrap();

    let fact_cell = b.list_cell(hbuf, fact_def, Index::NONE).unwrap();
    let main_cell = b.list_cell(hbuf, main_def, fact_cell).unwrap();
    let program = b.program(hbuf, main_cell).unwrap();
    (program, main_sym)
}

type Builder = fn(&mut HashedLruBuffer, &mut SymbolTable, &mut AstBuilder) -> (Index, Index);

/// The S1-S7 seed scenarios as a single table: builder function paired with
/// the return value a correct translation + execution must produce.
#[rstest]
#[case::s1_return_zero(build_s1 as Builder, 0)]
#[case::s2_sum_of_two_locals(build_s2 as Builder, 30)]
#[case::s3_precedence(build_s3 as Builder, 5)]
#[case::s4_if_else_then_branch(build_s4 as Builder, 11)]
#[case::s5_while_loop_accumulates(build_s5 as Builder, 45)]
#[case::s6_call_with_two_arguments(build_s6 as Builder, 15)]
#[case::s7_iterative_factorial(build_s7 as Builder, 120)]
fn seed_scenarios_produce_expected_return_value(#[case] build: Builder, #[case] expected: i64) {
    let mut hbuf = new_hbuf();
    let mut symtab = SymbolTable::init(&mut hbuf).unwrap();
    let mut b = AstBuilder::new("parse", 0, 0);
    let (program, main_sym) = build(&mut hbuf, &mut symtab, &mut b);
    assert_eq!(run_program(&mut hbuf, &symtab, program, main_sym), expected);
}

/// S3's shape: precedence is realized at AST-build time, so TAC holds
/// exactly one each of MUL/DIV/ADD/SUB rather than a re-derived tree.
#[test]
fn s3_precedence_produces_one_mul_div_add_sub() {
    let mut hbuf = new_hbuf();
    let mut symtab = SymbolTable::init(&mut hbuf).unwrap();
    let mut b = AstBuilder::new("parse", 0, 0);
    let (program, main_sym) = build_s3(&mut hbuf, &mut symtab, &mut b);

    let mut tac = new_tac();
    let mut reporter = Reporter::new(0, 0);
    let mut translator = Translator::new(1000);
    translator.translate_program(&mut hbuf, &mut tac, &mut reporter, &symtab, program, Some(main_sym)).unwrap();
    assert_eq!(reporter.error_count(), 0);

    let mut counts = [0u32; 4];
    for i in 1..=tac.count() {
        match tac.get(Index(i)).unwrap().opcode {
            Opcode::Mul => counts[0] += 1,
            Opcode::Div => counts[1] += 1,
            Opcode::Add => counts[2] += 1,
            Opcode::Sub => counts[3] += 1,
            _ => {}
        }
    }
    assert_eq!(counts, [1, 1, 1, 1]);
}

/// S4's shape: an if/else compiles to exactly two LABELs and one IF_FALSE.
#[test]
fn s4_if_else_shape_has_two_labels_and_one_if_false() {
    let mut hbuf = new_hbuf();
    let mut symtab = SymbolTable::init(&mut hbuf).unwrap();
    let mut b = AstBuilder::new("parse", 0, 0);
    let (program, main_sym) = build_s4(&mut hbuf, &mut symtab, &mut b);

    let mut tac = new_tac();
    let mut reporter = Reporter::new(0, 0);
    let mut translator = Translator::new(1000);
    translator.translate_program(&mut hbuf, &mut tac, &mut reporter, &symtab, program, Some(main_sym)).unwrap();
    assert_eq!(reporter.error_count(), 0);

    let (mut labels, mut if_falses) = (0u32, 0u32);
    for i in 1..=tac.count() {
        match tac.get(Index(i)).unwrap().opcode {
            Opcode::Label => labels += 1,
            Opcode::IfFalse => if_falses += 1,
            _ => {}
        }
    }
    assert_eq!(labels, 2);
    assert_eq!(if_falses, 1);
}

/// S5's shape: a while loop compiles to a start label, an end label, and
/// exactly one backward GOTO.
#[test]
fn s5_while_loop_shape_has_one_backward_goto() {
    let mut hbuf = new_hbuf();
    let mut symtab = SymbolTable::init(&mut hbuf).unwrap();
    let mut b = AstBuilder::new("parse", 0, 0);
    let (program, main_sym) = build_s5(&mut hbuf, &mut symtab, &mut b);

    let mut tac = new_tac();
    let mut reporter = Reporter::new(0, 0);
    let mut translator = Translator::new(1000);
    translator.translate_program(&mut hbuf, &mut tac, &mut reporter, &symtab, program, Some(main_sym)).unwrap();
    assert_eq!(reporter.error_count(), 0);

    let (mut labels, mut gotos) = (0u32, 0u32);
    for i in 1..=tac.count() {
        match tac.get(Index(i)).unwrap().opcode {
            Opcode::Label => labels += 1,
            Opcode::Goto => gotos += 1,
            _ => {}
        }
    }
    assert_eq!(labels, 2);
    assert_eq!(gotos, 1);
}

/// S6's shape: two arguments compile to exactly two PARAMs feeding one CALL.
#[test]
fn s6_call_shape_has_two_params_and_one_call() {
    let mut hbuf = new_hbuf();
    let mut symtab = SymbolTable::init(&mut hbuf).unwrap();
    let mut b = AstBuilder::new("parse", 0, 0);
    let (program, main_sym) = build_s6(&mut hbuf, &mut symtab, &mut b);

    let mut tac = new_tac();
    let mut reporter = Reporter::new(0, 0);
    let mut translator = Translator::new(1000);
    translator.translate_program(&mut hbuf, &mut tac, &mut reporter, &symtab, program, Some(main_sym)).unwrap();
    assert_eq!(reporter.error_count(), 0);

    let (mut params_seen, mut calls_seen) = (0u32, 0u32);
    for i in 1..=tac.count() {
        match tac.get(Index(i)).unwrap().opcode {
            Opcode::Param => params_seen += 1,
            Opcode::Call => calls_seen += 1,
            _ => {}
        }
    }
    assert_eq!(params_seen, 2);
    assert_eq!(calls_seen, 1);
}

/// Snapshots TAC disassembly text for a small hand-built program computing
/// `1 + 2*3`, the same expression shape S3 exercises.
#[test]
fn disassembly_of_arithmetic_program_is_stable() {
    let mut tac = new_tac();
    let t_mul = Operand::Temp { id: 0, scope: 0 };
    let t_sum = Operand::Temp { id: 1, scope: 0 };
    tac.append(&TacInstruction::binary(Opcode::Mul, t_mul, Operand::Immediate(2), Operand::Immediate(3))).unwrap();
    tac.append(&TacInstruction::binary(Opcode::Add, t_sum, Operand::Immediate(1), t_mul)).unwrap();
    tac.append(&TacInstruction::ret(t_sum)).unwrap();

    let mut engine = new_engine();
    engine.load_code(&mut tac).unwrap();

    let mut dump = String::new();
    for address in 0..3u32 {
        dump.push_str(&engine.disassemble(address).unwrap());
        dump.push('\n');
    }

    assert_snapshot!(dump, @r###"
    0000: t0@0 = MUL #2, #3
    0001: t1@0 = ADD #1, t0@0
    0002: RETURN t1@0
    "###);
}

/// Snapshots the VM trace-buffer dump after running the same program,
/// confirming trace entries replay as the same disassembly text in
/// execution order.
#[test]
fn trace_buffer_dump_of_arithmetic_program_is_stable() {
    let mut tac = new_tac();
    let t_mul = Operand::Temp { id: 0, scope: 0 };
    let t_sum = Operand::Temp { id: 1, scope: 0 };
    tac.append(&TacInstruction::binary(Opcode::Mul, t_mul, Operand::Immediate(2), Operand::Immediate(3))).unwrap();
    tac.append(&TacInstruction::binary(Opcode::Add, t_sum, Operand::Immediate(1), t_mul)).unwrap();
    tac.append(&TacInstruction::ret(t_sum)).unwrap();

    let mut engine = new_engine();
    engine.enable_tracing(true);
    engine.load_code(&mut tac).unwrap();
    engine.start().unwrap();
    engine.run().unwrap();
    assert_eq!(engine.get_state(), EngineState::Finished);

    let mut dump = String::new();
    for i in 0..engine.get_trace_count() {
        dump.push_str(&engine.format_trace_entry(i).unwrap());
        dump.push('\n');
    }

    assert_snapshot!(dump, @r###"
    0000: t0@0 = MUL #2, #3
    0001: t1@0 = ADD #1, t0@0
    0002: RETURN t1@0
    "###);
}
