//! Code generation: lower the analysed AST into AT&T x86-64 assembly.
//!
//! Expressions run on a conceptual value stack. The top three live values sit
//! in `%r8`, `%r9` and `%r10`, picked by `(depth - 1) % 3`; a fourth live value
//! first spills the oldest register onto the machine stack, and folding two
//! values back into one pops it again. `depth` is the number of live values
//! and is zero between statements.
//!
//! Locals live below `%rbp`; parameters are pushed by the caller right to left
//! and sit above the saved frame pointer and return address.

use log::{debug, trace};

use crate::ast::{
  BinaryOp, Block, Call, Chain, Decl, Expr, Factor, Function, Item, Node, Program, Stmt, VarRef,
};
use crate::ty::Type;

/// Counters and feature flags shared by the parser and the emitter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenState {
  /// Next free `.L<n>` label.
  pub labels: usize,
  /// Live operand values at the current emission point.
  pub depth: usize,
  pub uses_write: bool,
  pub uses_read: bool,
}

impl GenState {
  pub fn new_label(&mut self) -> usize {
    let label = self.labels;
    self.labels += 1;
    trace!("allocated label .L{label}");
    label
  }
}

pub const WRITE_ROUTINE: &str = "print_long";
pub const READ_ROUTINE: &str = "read_long";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reg {
  Rax,
  R8,
  R9,
  R10,
}

impl Reg {
  fn q(self) -> &'static str {
    match self {
      Reg::Rax => "%rax",
      Reg::R8 => "%r8",
      Reg::R9 => "%r9",
      Reg::R10 => "%r10",
    }
  }

  fn d(self) -> &'static str {
    match self {
      Reg::Rax => "%eax",
      Reg::R8 => "%r8d",
      Reg::R9 => "%r9d",
      Reg::R10 => "%r10d",
    }
  }

  fn b(self) -> &'static str {
    match self {
      Reg::Rax => "%al",
      Reg::R8 => "%r8b",
      Reg::R9 => "%r9b",
      Reg::R10 => "%r10b",
    }
  }
}

const SLOTS: [Reg; 3] = [Reg::R8, Reg::R9, Reg::R10];

/// Register holding the value at `depth` (1-based).
fn slot(depth: usize) -> Reg {
  SLOTS[(depth - 1) % SLOTS.len()]
}

fn frame_operand(var: &VarRef) -> String {
  format!("{}(%rbp)", -var.offset)
}

/// Stack reservation for a frame, kept 16-byte aligned.
fn aligned_frame(frame_size: i64) -> i64 {
  (frame_size + 15) / 16 * 16
}

/// Emit the complete assembly file for a program.
pub fn generate(program: &Program, state: &mut GenState) -> String {
  let mut asm = String::new();
  asm.push_str("    .globl _start\n");
  if state.uses_write {
    asm.push_str(&format!("    .extern {WRITE_ROUTINE}\n"));
  }
  if state.uses_read {
    asm.push_str(&format!("    .extern {READ_ROUTINE}\n"));
  }
  asm.push_str("    .text\n");
  asm.push_str("_start:\n");
  if program.defines("main") {
    asm.push_str("    call fn_main\n");
  } else {
    asm.push_str("    xor %eax, %eax\n");
  }
  asm.push_str("    mov %rax, %rdi\n");
  asm.push_str("    mov $60, %rax\n");
  asm.push_str("    syscall\n");

  for func in program.definitions() {
    let mut emitter = Emitter::new(state, &func.name);
    emitter.function(func);
    asm.push_str(&emitter.out);
  }

  debug!(
    "generated {} bytes of assembly ({} labels, final depth {})",
    asm.len(),
    state.labels,
    state.depth
  );
  debug_assert_eq!(state.depth, 0, "operand stack left unbalanced");
  asm
}

struct Emitter<'a> {
  out: String,
  state: &'a mut GenState,
  ret_label: String,
}

impl<'a> Emitter<'a> {
  fn new(state: &'a mut GenState, function: &str) -> Self {
    Self {
      out: String::new(),
      state,
      ret_label: format!(".Lret_{function}"),
    }
  }

  fn ins(&mut self, text: &str) {
    self.out.push_str("    ");
    self.out.push_str(text);
    self.out.push('\n');
  }

  fn label(&mut self, label: &str) {
    self.out.push_str(label);
    self.out.push_str(":\n");
  }

  fn top(&self) -> Reg {
    slot(self.state.depth)
  }

  /// Claim the next operand slot, spilling the value it still holds.
  fn push_value(&mut self) -> Reg {
    self.state.depth += 1;
    let reg = slot(self.state.depth);
    if self.state.depth > SLOTS.len() {
      self.ins(&format!("push {}", reg.q()));
    }
    reg
  }

  /// Drop the top value; its register goes back to the spilled value below.
  fn release(&mut self) {
    let depth = self.state.depth;
    self.state.depth -= 1;
    if depth > SLOTS.len() {
      self.ins(&format!("pop {}", slot(depth).q()));
    }
  }

  /// Fold the top two values with `op`, leaving the result one slot down.
  fn combine(&mut self, op: BinaryOp) {
    let depth = self.state.depth;
    let rhs = slot(depth).q();
    let lhs_reg = slot(depth - 1);
    let lhs = lhs_reg.q();
    trace!("combine {op:?} at depth {depth}");
    match op {
      BinaryOp::Or => self.ins(&format!("or {rhs}, {lhs}")),
      BinaryOp::And => self.ins(&format!("and {rhs}, {lhs}")),
      BinaryOp::Add => self.ins(&format!("add {rhs}, {lhs}")),
      BinaryOp::Sub => self.ins(&format!("sub {rhs}, {lhs}")),
      BinaryOp::Mul => self.ins(&format!("imul {rhs}, {lhs}")),
      BinaryOp::Div | BinaryOp::Mod => {
        self.ins(&format!("mov {lhs}, %rax"));
        self.ins("cqo");
        self.ins(&format!("idiv {rhs}"));
        let result = if op == BinaryOp::Div { "%rax" } else { "%rdx" };
        self.ins(&format!("mov {result}, {lhs}"));
      }
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
        let set = match op {
          BinaryOp::Eq => "sete",
          BinaryOp::Ne => "setne",
          BinaryOp::Lt => "setl",
          BinaryOp::Le => "setle",
          BinaryOp::Gt => "setg",
          _ => "setge",
        };
        self.ins(&format!("cmp {rhs}, {lhs}"));
        self.ins(&format!("{set} {}", lhs_reg.b()));
        self.ins(&format!("movzbq {}, {lhs}", lhs_reg.b()));
      }
    }
    self.release();
  }

  fn load(&mut self, var: &VarRef, reg: Reg) {
    let addr = frame_operand(var);
    let text = match var.ty {
      Type::Bool => format!("movzbq {addr}, {}", reg.q()),
      Type::Char => format!("movsbq {addr}, {}", reg.q()),
      Type::Int => format!("movslq {addr}, {}", reg.q()),
      _ => format!("movq {addr}, {}", reg.q()),
    };
    self.ins(&text);
  }

  fn store(&mut self, var: &VarRef, reg: Reg) {
    let addr = frame_operand(var);
    let text = match var.ty {
      Type::Bool | Type::Char => format!("movb {}, {addr}", reg.b()),
      Type::Int => format!("movl {}, {addr}", reg.d()),
      _ => format!("movq {}, {addr}", reg.q()),
    };
    self.ins(&text);
  }

  /// Re-extend `reg` after a narrowing store so it holds what memory holds.
  fn narrow(&mut self, var: &VarRef, reg: Reg) {
    let text = match var.ty {
      Type::Bool => format!("movzbq {}, {}", reg.b(), reg.q()),
      Type::Char => format!("movsbq {}, {}", reg.b(), reg.q()),
      Type::Int => format!("movslq {}, {}", reg.d(), reg.q()),
      _ => return,
    };
    self.ins(&text);
  }

  fn function(&mut self, func: &Function) {
    self.label(&format!("fn_{}", func.name));
    self.ins("push %rbp");
    self.ins("mov %rsp, %rbp");
    let reserve = aligned_frame(func.frame_size);
    if reserve > 0 {
      self.ins(&format!("sub ${reserve}, %rsp"));
    }

    if let Some(body) = &func.body {
      self.block(body);
    }

    let ret_label = self.ret_label.clone();
    self.label(&ret_label);
    self.ins("mov %rbp, %rsp");
    self.ins("pop %rbp");
    self.ins("ret");
  }

  fn block(&mut self, block: &Block) {
    for item in &block.items {
      match item {
        Item::Decl(decl) => self.decl(decl),
        Item::Stmt(stmt) => self.stmt(stmt),
      }
      debug_assert_eq!(self.state.depth, 0);
    }
  }

  fn decl(&mut self, decl: &Decl) {
    if let Some(init) = &decl.init {
      init.emit(self);
      let reg = self.top();
      self.store(&decl.target, reg);
      self.release();
    }
  }

  /// Evaluate a condition and jump to `target` when it is false.
  fn branch_if_false(&mut self, cond: &Expr, target: usize) {
    cond.emit(self);
    let reg = self.top();
    self.ins(&format!("cmp $0, {}", reg.q()));
    self.release();
    self.ins(&format!("je .L{target}"));
  }

  /// Evaluate an expression for its side effects only.
  fn discard(&mut self, expr: &Expr) {
    expr.emit(self);
    self.release();
  }

  fn stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::Expr(expr) => self.discard(expr),
      Stmt::Call(call) => self.call(call, false),
      Stmt::If { cond, then, els } => {
        let else_label = self.state.new_label();
        self.branch_if_false(cond, else_label);
        self.stmt(then);
        match els {
          Some(els) => {
            let end_label = self.state.new_label();
            self.ins(&format!("jmp .L{end_label}"));
            self.label(&format!(".L{else_label}"));
            self.stmt(els);
            self.label(&format!(".L{end_label}"));
          }
          None => self.label(&format!(".L{else_label}")),
        }
      }
      Stmt::While { cond, body } => {
        let top = self.state.new_label();
        let exit = self.state.new_label();
        self.label(&format!(".L{top}"));
        self.branch_if_false(cond, exit);
        self.stmt(body);
        self.ins(&format!("jmp .L{top}"));
        self.label(&format!(".L{exit}"));
      }
      Stmt::For {
        init,
        cond,
        step,
        body,
      } => {
        if let Some(init) = init {
          self.discard(init);
        }
        let top = self.state.new_label();
        let exit = self.state.new_label();
        self.label(&format!(".L{top}"));
        if let Some(cond) = cond {
          self.branch_if_false(cond, exit);
        }
        self.stmt(body);
        if let Some(step) = step {
          self.discard(step);
        }
        self.ins(&format!("jmp .L{top}"));
        self.label(&format!(".L{exit}"));
      }
      Stmt::Write(value) => {
        value.emit(self);
        let reg = self.top();
        self.ins(&format!("mov {}, %rdi", reg.q()));
        self.release();
        self.call_external(WRITE_ROUTINE);
      }
      Stmt::Read(target) => {
        self.call_external(READ_ROUTINE);
        self.store(target, Reg::Rax);
      }
      Stmt::Return(value) => {
        if let Some(value) = value {
          value.emit(self);
          let reg = self.top();
          self.ins(&format!("mov {}, %rax", reg.q()));
          self.release();
        }
        let ret_label = self.ret_label.clone();
        self.ins(&format!("jmp {ret_label}"));
      }
      Stmt::Block(block) => self.block(block),
      Stmt::Empty => {}
    }
  }

  /// Call a runtime routine with the stack realigned to 16 bytes, as the
  /// platform ABI requires; `%rbx` holds the old stack pointer meanwhile.
  fn call_external(&mut self, routine: &str) {
    self.ins("mov %rsp, %rbx");
    self.ins("and $-16, %rsp");
    self.ins(&format!("call {routine}"));
    self.ins("mov %rbx, %rsp");
  }

  /// Emit a call. Live operand registers are saved around it since the callee
  /// uses the same ones.
  fn call(&mut self, call: &Call, keep_result: bool) {
    let depth = self.state.depth;
    let live: Vec<Reg> = (depth.saturating_sub(2).max(1)..=depth).map(slot).collect();
    for reg in &live {
      self.ins(&format!("push {}", reg.q()));
    }

    self.state.depth = 0;
    for arg in call.args.iter().rev() {
      arg.emit(self);
      let reg = self.top();
      self.ins(&format!("push {}", reg.q()));
      self.release();
    }
    self.ins(&format!("call fn_{}", call.name));
    if !call.args.is_empty() {
      self.ins(&format!("add ${}, %rsp", 8 * call.args.len()));
    }

    for reg in live.iter().rev() {
      self.ins(&format!("pop {}", reg.q()));
    }
    self.state.depth = depth;

    if keep_result {
      let reg = self.push_value();
      self.ins(&format!("mov %rax, {}", reg.q()));
    }
  }
}

/// Lowering of a value-producing node: leaves exactly one new live value.
trait Emit {
  fn emit(&self, emitter: &mut Emitter<'_>);
}

impl<T: Emit + Node> Emit for Chain<T> {
  fn emit(&self, emitter: &mut Emitter<'_>) {
    for (op, operand) in self.operands() {
      operand.emit(emitter);
      if let Some(op) = op {
        emitter.combine(op);
      }
    }
  }
}

impl Emit for Factor {
  fn emit(&self, emitter: &mut Emitter<'_>) {
    match self {
      Factor::Var(var) => {
        let reg = emitter.push_value();
        emitter.load(var, reg);
      }
      Factor::Num { value, .. } => {
        let reg = emitter.push_value();
        let mnemonic = if i32::try_from(*value).is_ok() {
          "movq"
        } else {
          "movabsq"
        };
        emitter.ins(&format!("{mnemonic} ${value}, {}", reg.q()));
      }
      Factor::Bool(value) => {
        let reg = emitter.push_value();
        emitter.ins(&format!("movq ${}, {}", u8::from(*value), reg.q()));
      }
      Factor::Paren(inner) => inner.emit(emitter),
      Factor::Not { operand, .. } => {
        operand.emit(emitter);
        let reg = emitter.top();
        emitter.ins(&format!("xor $1, {}", reg.q()));
      }
      Factor::Call(call) => emitter.call(call, true),
      Factor::Missing => {
        let reg = emitter.push_value();
        emitter.ins(&format!("movq $0, {}", reg.q()));
      }
    }
  }
}

impl Emit for Expr {
  fn emit(&self, emitter: &mut Emitter<'_>) {
    match self {
      Expr::Assign { target, value } => {
        value.emit(emitter);
        let reg = emitter.top();
        emitter.store(target, reg);
        emitter.narrow(target, reg);
      }
      Expr::Or(chain) => chain.emit(emitter),
    }
  }
}
