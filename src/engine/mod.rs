//! TAC execution engine (C9, spec §4.7): a small interpreting VM with a
//! fetch-decode-execute loop, breakpoints, hooks, a trace ring buffer, and
//! an optional symbol resolver for disassembly.
//!
//! Grounded on the teacher's closed, matchable return-code style (its
//! `sdk_comp` SDK-compatibility layer returns fixed numeric codes rather
//! than free-form strings) — [`crate::error::EngineError`] plays the same
//! role here.

pub mod hooks;
pub mod resolver;
pub mod trace;

use log::info;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::{Index, RecordStore};
use crate::tac::{disassemble_one, Opcode, Operand, TacAddress, TacInstruction, TacStore};

use hooks::{HookId, HookRegistry, HookTrigger};
use resolver::SymbolResolver;
use trace::{Trace, TraceEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Paused,
    Finished,
    Error,
}

/// Width of one linear-memory cell touched by LOAD/STORE/ADDR/INDEX/MEMBER
/// (spec §4.7.5) — every VM value is an `i64`, so a cell is 8 bytes.
const WORD_SIZE: usize = 8;

struct CallFrame {
    return_address: TacAddress,
    saved_result: Operand,
    saved_args: Vec<i64>,
}

/// One VM instance. Built via [`Engine::create`], loaded with
/// [`Engine::load_code`], then driven with `start`/`step`/`run`.
pub struct Engine {
    config: EngineConfig,
    code: Vec<TacInstruction>,
    labels: std::collections::HashMap<u16, TacAddress>,
    pc: u32,
    step_count: u64,
    state: EngineState,
    last_error: Option<EngineError>,

    temps: Vec<i64>,
    vars: Vec<i64>,
    memory: Vec<u8>,
    call_stack: Vec<CallFrame>,
    pending_params: Vec<i64>,
    current_args: Vec<i64>,
    last_return_value: i64,

    breakpoints: std::collections::HashSet<TacAddress>,
    hooks: HookRegistry,
    trace: Trace,
    tracing_enabled: bool,

    resolver: Option<SymbolResolver>,
}

impl Engine {
    /// Creates a VM instance. Analogous to the teacher's `*_info::new`
    /// constructors: allocates fixed-size backing arrays up front rather
    /// than growing them, per `max_temporaries`/`max_variables`.
    pub fn create(config: EngineConfig) -> EngineResult<Self> {
        let resolver = if config.enable_symbol_resolution {
            match (&config.symtab_file, &config.sstore_file) {
                (Some(symtab), Some(sstore)) => {
                    Some(SymbolResolver::open(symtab, sstore).map_err(|_| EngineError::InvalidParam)?)
                }
                _ => return Err(EngineError::InvalidParam),
            }
        } else {
            None
        };
        Ok(Engine {
            temps: vec![0; config.max_temporaries as usize],
            vars: vec![0; config.max_variables as usize],
            memory: vec![0; config.max_memory_size as usize],
            call_stack: Vec::new(),
            pending_params: Vec::new(),
            current_args: Vec::new(),
            last_return_value: 0,
            breakpoints: std::collections::HashSet::new(),
            hooks: HookRegistry::new(),
            trace: Trace::new(config.max_trace_entries),
            tracing_enabled: config.enable_tracing,
            resolver,
            code: Vec::new(),
            labels: std::collections::HashMap::new(),
            pc: 0,
            step_count: 0,
            state: EngineState::Stopped,
            last_error: None,
            config,
        })
    }

    /// Drops the VM instance. A plain `drop`, kept as an explicit method
    /// to mirror the C-shaped `create`/`destroy` pair the public API names
    /// in spec §4.7.3.
    pub fn destroy(self) {}

    /// Loads a whole program and pre-indexes `LABEL` instructions to
    /// addresses (spec §4.7.6), so `GOTO`/`IF_FALSE`/`IF_TRUE`/`CALL`
    /// resolve in O(1) instead of scanning at branch time.
    pub fn load_code(&mut self, tac: &mut TacStore) -> EngineResult<()> {
        let count = tac.count();
        let mut code = Vec::with_capacity(count as usize);
        let mut labels = std::collections::HashMap::new();
        for i in 1..=count {
            let instr = tac.get(Index(i)).map_err(|_| EngineError::InvalidAddress)?;
            if instr.opcode == Opcode::Label {
                if let Operand::Label(id) = instr.operand1 {
                    labels.insert(id, TacAddress(i - 1));
                }
            }
            code.push(instr);
        }
        self.code = code;
        self.labels = labels;
        self.pc = 0;
        self.step_count = 0;
        self.state = EngineState::Stopped;
        Ok(())
    }

    pub fn set_entry_point(&mut self, address: u32) -> EngineResult<()> {
        if address as usize >= self.code.len() {
            return Err(EngineError::InvalidAddress);
        }
        self.pc = address;
        Ok(())
    }

    pub fn set_entry_label(&mut self, label_id: u16) -> EngineResult<()> {
        let address = *self.labels.get(&label_id).ok_or(EngineError::NotFound)?;
        self.pc = address.0;
        Ok(())
    }

    /// Resolves `name` to its label id through the symbol/function table
    /// and jumps there (spec §4.7.6: "requires symbol resolution to be
    /// enabled and the named function to be registered").
    pub fn set_entry_function(&mut self, name: &str) -> EngineResult<()> {
        if !self.config.enable_symbol_resolution {
            return Err(EngineError::InvalidState);
        }
        let resolver = self.resolver.as_mut().ok_or(EngineError::InvalidState)?;
        let label_id = resolver
            .resolve_function_label(name)
            .map_err(|_| EngineError::NotFound)?
            .ok_or(EngineError::NotFound)?;
        self.set_entry_label(label_id)
    }

    pub fn start(&mut self) -> EngineResult<()> {
        if self.code.is_empty() {
            return Err(EngineError::InvalidState);
        }
        if !self.hooks.fire(HookTrigger::CodeStart, TacAddress(self.pc), self.step_count) {
            return Err(EngineError::InvalidState);
        }
        self.state = EngineState::Running;
        self.last_error = None;
        Ok(())
    }

    /// Fires `CODE_END` and, unless a hook suppresses it, transitions to
    /// `FINISHED`. Returns whether the transition went through.
    fn transition_finished(&mut self) -> bool {
        let allowed = self.hooks.fire(HookTrigger::CodeEnd, TacAddress(self.pc), self.step_count);
        if allowed {
            self.state = EngineState::Finished;
        }
        allowed
    }

    pub fn stop(&mut self) {
        self.state = EngineState::Stopped;
    }

    pub fn reset(&mut self) {
        self.pc = 0;
        self.step_count = 0;
        self.state = EngineState::Stopped;
        self.last_error = None;
        self.call_stack.clear();
        self.pending_params.clear();
        self.current_args.clear();
        self.temps.iter_mut().for_each(|t| *t = 0);
        self.vars.iter_mut().for_each(|v| *v = 0);
        self.trace.clear();
    }

    pub fn get_state(&self) -> EngineState {
        self.state
    }

    pub fn get_pc(&self) -> u32 {
        self.pc
    }

    pub fn get_step_count(&self) -> u64 {
        self.step_count
    }

    pub fn get_last_error(&self) -> Option<EngineError> {
        self.last_error
    }

    pub fn error_string(error: EngineError) -> String {
        error.to_string()
    }

    // ---- temp/var/memory access ----

    pub fn get_temp(&self, id: u16) -> EngineResult<i64> {
        self.temps.get(id as usize).copied().ok_or(EngineError::InvalidOperand)
    }

    pub fn set_temp(&mut self, id: u16, value: i64) -> EngineResult<()> {
        *self.temps.get_mut(id as usize).ok_or(EngineError::InvalidOperand)? = value;
        Ok(())
    }

    pub fn get_variable(&self, id: u16) -> EngineResult<i64> {
        self.vars.get(id as usize).copied().ok_or(EngineError::InvalidOperand)
    }

    pub fn set_variable(&mut self, id: u16, value: i64) -> EngineResult<()> {
        *self.vars.get_mut(id as usize).ok_or(EngineError::InvalidOperand)? = value;
        Ok(())
    }

    // ---- breakpoints ----

    pub fn add_breakpoint(&mut self, address: TacAddress) {
        self.breakpoints.insert(address);
    }

    pub fn remove_breakpoint(&mut self, address: TacAddress) {
        self.breakpoints.remove(&address);
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    // ---- hooks ----

    pub fn add_hook<F>(&mut self, trigger: HookTrigger, callback: F) -> HookId
    where
        F: FnMut(hooks::HookEvent) -> bool + 'static,
    {
        self.hooks.add(trigger, callback)
    }

    pub fn remove_hook(&mut self, id: HookId) -> EngineResult<()> {
        if self.hooks.remove(id) {
            Ok(())
        } else {
            Err(EngineError::NotFound)
        }
    }

    // ---- tracing ----

    pub fn enable_tracing(&mut self, enabled: bool) {
        self.tracing_enabled = enabled;
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    pub fn get_trace_count(&self) -> usize {
        self.trace.count()
    }

    pub fn get_trace_entry(&self, index: usize) -> Option<&TraceEntry> {
        self.trace.get(index)
    }

    /// Disassembles one instruction, enriching any `Var`/`Global` operand
    /// with its resolved name when symbol resolution is enabled (spec
    /// §4.7.7 — "enrich trace lines and error messages").
    pub fn disassemble(&mut self, address: u32) -> Option<String> {
        let instr = *self.code.get(address as usize)?;
        let mut text = disassemble_one(address, &instr);
        if self.resolver.is_some() {
            let names: Vec<String> = [instr.result, instr.operand1, instr.operand2]
                .into_iter()
                .filter_map(|op| match op {
                    Operand::Var { id, .. } | Operand::Global(id) => self.resolve_symbol(id),
                    _ => None,
                })
                .collect();
            if !names.is_empty() {
                text.push_str("  ; ");
                text.push_str(&names.join(", "));
            }
        }
        Some(text)
    }

    /// Formats a recorded trace entry as disassembly text, resolving
    /// symbol names the same way [`Engine::disassemble`] does.
    pub fn format_trace_entry(&mut self, index: usize) -> Option<String> {
        let address = self.trace.get(index)?.address.0;
        self.disassemble(address)
    }

    /// Describes the engine's current error state, enriching the message
    /// with the resolved name of any `Var`/`Global` operand in the faulting
    /// instruction (spec §4.7.7). Falls back to the plain error text when
    /// symbol resolution is off or the instruction has no such operand.
    pub fn error_context(&mut self) -> String {
        let Some(err) = self.last_error else {
            return String::new();
        };
        let address = self.pc;
        match self.disassemble(address) {
            Some(text) => format!("{err} at {address:04}: {text}"),
            None => format!("{err} at {address:04}"),
        }
    }

    // ---- fetch/decode/execute ----

    fn read_operand(&self, operand: Operand) -> EngineResult<i64> {
        match operand {
            Operand::None => Ok(0),
            Operand::Immediate(v) => Ok(i64::from(v)),
            Operand::Temp { id, .. } => self.get_temp(id),
            Operand::Var { id, .. } | Operand::Global(id) => self.get_variable(id),
            Operand::ReturnVal => Ok(self.last_return_value),
            Operand::Param(n) => self.current_args.get(n as usize).copied().ok_or(EngineError::InvalidOperand),
            Operand::Label(_) | Operand::Function(_) => Err(EngineError::InvalidOperand),
        }
    }

    fn write_result(&mut self, operand: Operand, value: i64) -> EngineResult<()> {
        match operand {
            Operand::Temp { id, .. } => self.set_temp(id, value),
            Operand::Var { id, .. } | Operand::Global(id) => self.set_variable(id, value),
            Operand::None => Ok(()),
            _ => Err(EngineError::InvalidOperand),
        }
    }

    fn resolve_label_operand(&self, operand: Operand) -> EngineResult<TacAddress> {
        let Operand::Label(id) = operand else {
            return Err(EngineError::InvalidOperand);
        };
        self.labels.get(&id).copied().ok_or(EngineError::NotFound)
    }

    /// Turns a raw, possibly-negative offset into a memory index. A
    /// negative address is never a valid pointer; with `enable_type_check`
    /// on that's a hard `INVALID_OPERAND`, otherwise it wraps into range so
    /// a disabled-checks run never panics on array indexing.
    fn resolve_address(&self, raw: i64) -> EngineResult<usize> {
        if raw < 0 {
            if self.config.enable_type_check {
                return Err(EngineError::InvalidOperand);
            }
            let len = self.memory.len().max(1) as i64;
            return Ok(raw.rem_euclid(len) as usize);
        }
        Ok(raw as usize)
    }

    /// Validates a computed address (ADDR/INDEX/MEMBER) against the
    /// configured memory size, without reading or writing any bytes.
    fn validate_address(&self, raw: i64) -> EngineResult<usize> {
        let addr = self.resolve_address(raw)?;
        if self.config.enable_bounds_check && addr > self.memory.len() {
            return Err(EngineError::OutOfMemory);
        }
        Ok(addr)
    }

    /// The `WORD_SIZE`-byte window a LOAD/STORE touches. Bounds-checked
    /// against `self.memory.len()` when `enable_bounds_check` is set;
    /// otherwise clamped to the buffer's last word rather than indexing
    /// out of range.
    fn mem_window(&self, raw: i64) -> EngineResult<std::ops::Range<usize>> {
        let addr = self.resolve_address(raw)?;
        let end = addr.checked_add(WORD_SIZE).ok_or(EngineError::OutOfMemory)?;
        if end <= self.memory.len() {
            return Ok(addr..end);
        }
        if self.config.enable_bounds_check {
            return Err(EngineError::OutOfMemory);
        }
        let len = self.memory.len();
        if len < WORD_SIZE {
            return Err(EngineError::OutOfMemory);
        }
        let start = len - WORD_SIZE;
        Ok(start..len)
    }

    /// Executes exactly one instruction and advances `pc`, honoring
    /// breakpoints and hooks (spec §4.7.4). Returns `Ok(true)` while still
    /// runnable, `Ok(false)` once `Finished`.
    pub fn step(&mut self) -> EngineResult<bool> {
        if self.state != EngineState::Running {
            return Err(EngineError::InvalidState);
        }
        if self.pc as usize >= self.code.len() {
            return Ok(!self.transition_finished());
        }
        if self.breakpoints.contains(&TacAddress(self.pc)) {
            let should_pause = self.hooks.fire(HookTrigger::Breakpoint, TacAddress(self.pc), self.step_count);
            if should_pause {
                self.state = EngineState::Paused;
                self.last_error = Some(EngineError::BreakpointHit);
                info!("engine paused: breakpoint hit at pc={}", self.pc);
                return Err(EngineError::BreakpointHit);
            }
            // A hook returned `false`: suppress the pause and fall through
            // to execute the instruction normally this step.
        }

        if !self.hooks.fire(HookTrigger::Instruction, TacAddress(self.pc), self.step_count) {
            // Suppressed: execution of this instruction is skipped and `pc`
            // stays put, still RUNNING.
            return Ok(true);
        }

        let instr = self.code[self.pc as usize];
        let address = self.pc;
        let mut next_pc = self.pc + 1;

        let result = self.execute(instr, &mut next_pc);
        match result {
            Ok(()) => {
                if self.tracing_enabled {
                    self.trace.push(TraceEntry {
                        step: self.step_count,
                        address: TacAddress(address),
                        opcode: instr.opcode,
                        result: instr.result,
                    });
                }
                self.step_count += 1;
                self.pc = next_pc;
                if self.config.max_steps > 0 && self.step_count >= self.config.max_steps {
                    self.state = EngineState::Error;
                    self.last_error = Some(EngineError::MaxSteps);
                    info!("engine halted: max_steps ({}) reached", self.config.max_steps);
                    return Err(EngineError::MaxSteps);
                }
                if self.state == EngineState::Finished {
                    return Ok(false);
                }
                Ok(true)
            }
            Err(e) => {
                self.state = EngineState::Error;
                self.last_error = Some(e);
                info!("engine entered ERROR state at pc={address}: {e}");
                Err(e)
            }
        }
    }

    /// Runs until `Finished`, `Error`, or a breakpoint/step cap halts
    /// execution.
    pub fn run(&mut self) -> EngineResult<()> {
        loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    fn execute(&mut self, instr: TacInstruction, next_pc: &mut u32) -> EngineResult<()> {
        use Opcode::*;
        match instr.opcode {
            Nop | Label => Ok(()),
            Add | Sub | Mul | Div | Mod | And | Or | Xor | Shl | Shr | Eq | Ne | Lt | Le | Gt | Ge | LogicalAnd
            | LogicalOr => {
                let a = self.read_operand(instr.operand1)?;
                let b = self.read_operand(instr.operand2)?;
                let value = self.binary(instr.opcode, a, b)?;
                self.write_result(instr.result, value)
            }
            Neg | Not | BitwiseNot => {
                let a = self.read_operand(instr.operand1)?;
                let value = match instr.opcode {
                    Neg => a.checked_neg().ok_or(EngineError::InvalidOperand)?,
                    Not => i64::from(a == 0),
                    BitwiseNot => !a,
                    _ => unreachable!(),
                };
                self.write_result(instr.result, value)
            }
            Assign => {
                let value = self.read_operand(instr.operand1)?;
                self.write_result(instr.result, value)
            }
            Load => {
                let addr = self.read_operand(instr.operand1)?;
                if !self.hooks.fire(HookTrigger::MemoryRead, TacAddress(addr as u32), self.step_count) {
                    return self.write_result(instr.result, 0);
                }
                let window = self.mem_window(addr)?;
                let mut bytes = [0u8; WORD_SIZE];
                bytes.copy_from_slice(&self.memory[window]);
                self.write_result(instr.result, i64::from_le_bytes(bytes))
            }
            Store => {
                let addr = self.read_operand(instr.operand1)?;
                let value = self.read_operand(instr.operand2)?;
                if !self.hooks.fire(HookTrigger::MemoryWrite, TacAddress(addr as u32), self.step_count) {
                    return Ok(());
                }
                let window = self.mem_window(addr)?;
                self.memory[window].copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            Addr | Opcode::Index | Member | MemberPtr => {
                let base = self.read_operand(instr.operand1)?;
                let offset = self.read_operand(instr.operand2)?;
                let scaled = if instr.opcode == Opcode::Index {
                    offset.checked_mul(WORD_SIZE as i64).ok_or(EngineError::InvalidOperand)?
                } else {
                    offset
                };
                let addr = base.checked_add(scaled).ok_or(EngineError::InvalidOperand)?;
                let addr = self.validate_address(addr)?;
                self.write_result(instr.result, addr as i64)
            }
            Goto => {
                *next_pc = self.resolve_label_operand(instr.operand1)?.0;
                Ok(())
            }
            IfFalse => {
                let cond = self.read_operand(instr.operand1)?;
                if cond == 0 {
                    *next_pc = self.resolve_label_operand(instr.operand2)?.0;
                }
                Ok(())
            }
            IfTrue => {
                let cond = self.read_operand(instr.operand1)?;
                if cond != 0 {
                    *next_pc = self.resolve_label_operand(instr.operand2)?.0;
                }
                Ok(())
            }
            Param => {
                let value = self.read_operand(instr.operand1)?;
                self.pending_params.push(value);
                Ok(())
            }
            Call => {
                if self.call_stack.len() >= self.config.max_call_depth as usize {
                    return Err(EngineError::StackOverflow);
                }
                let target = self.resolve_label_operand(instr.operand1)?;
                let args = std::mem::take(&mut self.pending_params);
                let saved_args = std::mem::replace(&mut self.current_args, args);
                self.call_stack.push(CallFrame { return_address: TacAddress(*next_pc), saved_result: instr.result, saved_args });
                *next_pc = target.0;
                Ok(())
            }
            Return | ReturnVoid => {
                if instr.opcode == Return {
                    self.last_return_value = self.read_operand(instr.operand1)?;
                } else {
                    self.last_return_value = 0;
                }
                match self.call_stack.pop() {
                    Some(frame) => {
                        self.current_args = frame.saved_args;
                        self.write_result(frame.saved_result, self.last_return_value)?;
                        *next_pc = frame.return_address.0;
                        Ok(())
                    }
                    None => {
                        self.transition_finished();
                        Ok(())
                    }
                }
            }
            Cast | Sizeof | Phi => {
                // Optimization/typing placeholders (spec §4.7.5): decoded
                // but never silently accepted.
                Err(EngineError::InvalidOperand)
            }
        }
    }

    fn binary(&self, opcode: Opcode, a: i64, b: i64) -> EngineResult<i64> {
        use Opcode::*;
        Ok(match opcode {
            Add => a.checked_add(b).ok_or(EngineError::InvalidOperand)?,
            Sub => a.checked_sub(b).ok_or(EngineError::InvalidOperand)?,
            Mul => a.checked_mul(b).ok_or(EngineError::InvalidOperand)?,
            Div => {
                if b == 0 {
                    return Err(EngineError::DivisionByZero);
                }
                a.checked_div(b).ok_or(EngineError::InvalidOperand)?
            }
            Mod => {
                if b == 0 {
                    return Err(EngineError::DivisionByZero);
                }
                a.checked_rem(b).ok_or(EngineError::InvalidOperand)?
            }
            And => a & b,
            Or => a | b,
            Xor => a ^ b,
            Shl => a.checked_shl(u32::try_from(b).unwrap_or(0)).unwrap_or(0),
            Shr => a.checked_shr(u32::try_from(b).unwrap_or(0)).unwrap_or(0),
            Eq => i64::from(a == b),
            Ne => i64::from(a != b),
            Lt => i64::from(a < b),
            Le => i64::from(a <= b),
            Gt => i64::from(a > b),
            Ge => i64::from(a >= b),
            LogicalAnd => i64::from(a != 0 && b != 0),
            LogicalOr => i64::from(a != 0 || b != 0),
            _ => unreachable!("binary() called with a non-binary opcode"),
        })
    }

    pub fn resolve_symbol(&mut self, id: u16) -> Option<String> {
        self.resolver.as_mut().and_then(|r| r.resolve(id).ok().flatten().map(str::to_string))
    }

    /// The value of the last `RETURN`/`RETURN_VOID` executed (0 if none
    /// has run yet), e.g. a `main` function's exit value once `Finished`.
    pub fn last_return_value(&self) -> i64 {
        self.last_return_value
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}
