use rminic::parser::parse;
use rminic::tokenizer::{Tag, tokenize};
use rminic::ty::Type;
use rminic::{CompileError, Diagnostic, Generator, Session, generate_assembly};
use rstest::rstest;

fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Compile and hand back the session so diagnostics can be inspected.
fn compile(source: &str) -> (Result<String, CompileError>, Session) {
  init_logger();
  let mut session = Session::new();
  let result = Generator::new(&mut session).run(source);
  (result, session)
}

fn diagnostics(session: &Session) -> Vec<Diagnostic> {
  session.diagnostics.iter().cloned().collect()
}

fn lines(asm: &str) -> Vec<&str> {
  asm.lines().map(str::trim).collect()
}

#[test]
fn function_with_parameter_compiles() {
  let (result, session) = compile("int f(int a){ return a + 1; }");
  let asm = result.expect("clean program");
  assert!(session.diagnostics.is_empty());

  let f = session.symbols.lookup_fn("f").expect("f registered");
  assert_eq!(f.params, vec![Type::Int]);
  assert!(!f.declared_only);
  assert_eq!(f.frame_size, 0);

  let body = lines(&asm);
  let start = body.iter().position(|l| *l == "fn_f:").expect("function label");
  assert_eq!(
    &body[start..],
    &[
      "fn_f:",
      "push %rbp",
      "mov %rsp, %rbp",
      "movslq 16(%rbp), %r8",
      "movq $1, %r9",
      "add %r9, %r8",
      "mov %r8, %rax",
      "jmp .Lret_f",
      ".Lret_f:",
      "mov %rbp, %rsp",
      "pop %rbp",
      "ret",
    ]
  );
}

#[test]
fn parameter_offsets_are_positive_displacements() {
  let asm = generate_assembly("long g(int a, long b) { return b - a; }").unwrap();
  assert!(asm.contains("movq 24(%rbp), %r8"));
  assert!(asm.contains("movslq 16(%rbp), %r9"));
}

#[test]
fn assigning_int_to_bool_suppresses_output() {
  let (result, session) = compile("void main() {\n  bool b;\n  b = 1;\n}");
  assert!(matches!(result, Err(CompileError::Rejected { count: 1 })));
  assert_eq!(
    diagnostics(&session),
    vec![Diagnostic::TypeMismatch {
      line: 3,
      expected: Type::Bool,
      found: Type::Int
    }]
  );
}

#[test]
fn while_loop_uses_two_consistent_labels() {
  let asm = generate_assembly("void main() { while (true) write 1; }").unwrap();
  let body = lines(&asm);
  let start = body.iter().position(|l| *l == "fn_main:").unwrap();
  assert_eq!(
    &body[start + 3..start + 14],
    &[
      ".L0:",
      "movq $1, %r8",
      "cmp $0, %r8",
      "je .L1",
      "movq $1, %r8",
      "mov %r8, %rdi",
      "mov %rsp, %rbx",
      "and $-16, %rsp",
      "call print_long",
      "mov %rbx, %rsp",
      "jmp .L0",
    ]
  );
  assert_eq!(body[start + 14], ".L1:");
}

#[test]
fn write_and_read_control_imports() {
  let asm = generate_assembly("int main() { return 0; }").unwrap();
  assert!(!asm.contains(".extern"));

  let asm = generate_assembly("void main() { write 5; }").unwrap();
  assert!(asm.contains(".extern print_long"));
  assert!(!asm.contains(".extern read_long"));

  let asm = generate_assembly("void main() { long x; read x; write x; }").unwrap();
  assert!(asm.contains(".extern print_long"));
  assert!(asm.contains(".extern read_long"));
  assert!(asm.contains("call read_long\n    mov %rbx, %rsp\n    movq %rax, -8(%rbp)"));
}

#[test]
fn startup_stub_calls_main_then_exits() {
  let asm = generate_assembly("int main() { return 3; }").unwrap();
  let body = lines(&asm);
  assert_eq!(
    &body[..7],
    &[
      ".globl _start",
      ".text",
      "_start:",
      "call fn_main",
      "mov %rax, %rdi",
      "mov $60, %rax",
      "syscall",
    ]
  );

  let asm = generate_assembly("int f(void) { return 3; }").unwrap();
  assert!(!asm.contains("call fn_main"));
  assert!(asm.contains("xor %eax, %eax"));
}

#[rstest]
#[case("int f(int); int f(int);")]
#[case("int f(int); int f(int x) { return x; }")]
#[case("int f(int x) { return x; } int f(int);")]
#[case("int f(int a); int f(int b);")]
fn compatible_function_headers(#[case] source: &str) {
  let (result, session) = compile(source);
  assert!(result.is_ok(), "{:?}", diagnostics(&session));
}

#[rstest]
#[case("int f(int); long f(int);")]
#[case("int f(int); int f(char);")]
#[case("int f(int); int f(int, int);")]
#[case("int f(int x) { return x; } int f(int y) { return y; }")]
fn conflicting_function_headers(#[case] source: &str) {
  let (result, session) = compile(source);
  assert!(matches!(result, Err(CompileError::Rejected { count: 1 })));
  assert_eq!(
    diagnostics(&session),
    vec![Diagnostic::ConflictingDeclaration {
      line: 1,
      name: "f".into()
    }]
  );
}

#[test]
fn prototype_becomes_definition() {
  let (result, session) = compile("int f(int);\nint f(int x) { int y = x; return y; }");
  assert!(result.is_ok());
  let f = session.symbols.lookup_fn("f").unwrap();
  assert!(!f.declared_only);
  assert_eq!(f.frame_size, 4);
}

#[test]
fn same_scope_redeclaration_reports_once() {
  let (result, session) = compile("void main() {\n  int x;\n  long x;\n  x = 1;\n}");
  assert!(result.is_err());
  assert_eq!(
    diagnostics(&session),
    vec![Diagnostic::ConflictingDeclaration {
      line: 3,
      name: "x".into()
    }]
  );
}

#[test]
fn shadowing_resolves_lexically() {
  let source = "void main() {
    int x = 1;
    { bool x = true; write x; }
    x = x + 1;
  }";
  let asm = generate_assembly(source).unwrap();
  assert!(asm.contains("movb %r8b, -5(%rbp)"));
  assert!(asm.contains("movzbq -5(%rbp), %r8"));
  assert!(asm.contains("movslq -4(%rbp), %r8"));
  assert!(asm.contains("movl %r8d, -4(%rbp)"));
}

#[test]
fn out_of_scope_name_is_undeclared() {
  let (result, session) = compile("void main() { { int inner; } inner = 2; }");
  assert!(result.is_err());
  let diags = diagnostics(&session);
  assert_eq!(diags.len(), 1);
  assert!(matches!(&diags[0], Diagnostic::Contract { message, .. } if message.contains("inner")));
}

#[rstest]
#[case("char c; int i; write c + i;", None)]
#[case("bool a; bool b; write a && b;", None)]
#[case("int i; bool b; write i + b;", Some((Type::Int, Type::Bool)))]
fn binary_typing_through_pipeline(
  #[case] body: &str,
  #[case] mismatch: Option<(Type, Type)>,
) {
  let source = format!("void main() {{ {body} }}");
  let (result, session) = compile(&source);
  match mismatch {
    None => assert!(result.is_ok(), "{:?}", diagnostics(&session)),
    Some((expected, found)) => {
      assert!(result.is_err());
      assert_eq!(
        diagnostics(&session),
        vec![Diagnostic::TypeMismatch {
          line: 1,
          expected,
          found
        }]
      );
    }
  }
}

#[test]
fn calls_pass_arguments_on_the_stack() {
  let source = "int add(int a, int b) { return a + b; }
    int main() { return add(1, 2) * 3; }";
  let asm = generate_assembly(source).unwrap();
  assert!(asm.contains(
    "movq $2, %r8\n    push %r8\n    movq $1, %r8\n    push %r8\n    call fn_add\n    add $16, %rsp\n    mov %rax, %r8\n"
  ));
  assert!(asm.contains("imul %r9, %r8"));
}

#[test]
fn live_values_survive_a_call() {
  let source = "int id(int a) { return a; }
    int main() { return 40 + id(2); }";
  let asm = generate_assembly(source).unwrap();
  assert!(asm.contains(
    "movq $40, %r8\n    push %r8\n    movq $2, %r8\n    push %r8\n    call fn_id\n    add $8, %rsp\n    pop %r8\n    mov %rax, %r9\n    add %r9, %r8\n"
  ));
}

#[test]
fn call_under_spilled_values_restores_every_slot() {
  let source = "int id(int a) { return a; }
    void main() { write 1 + (2 + (3 + (4 + (5 + id(6))))); }";
  let asm = generate_assembly(source).unwrap();
  let body = lines(&asm);
  let start = body.iter().position(|l| *l == "fn_main:").unwrap() + 3;
  assert_eq!(
    &body[start..start + 28],
    &[
      "movq $1, %r8",
      "movq $2, %r9",
      "movq $3, %r10",
      "push %r8",
      "movq $4, %r8",
      "push %r9",
      "movq $5, %r9",
      "push %r10",
      "push %r8",
      "push %r9",
      "movq $6, %r8",
      "push %r8",
      "call fn_id",
      "add $8, %rsp",
      "pop %r9",
      "pop %r8",
      "pop %r10",
      "push %r10",
      "mov %rax, %r10",
      "add %r10, %r9",
      "pop %r10",
      "add %r9, %r8",
      "pop %r9",
      "add %r8, %r10",
      "pop %r8",
      "add %r10, %r9",
      "add %r9, %r8",
      "mov %r8, %rdi",
    ]
  );
  let pushes = body.iter().filter(|l| l.starts_with("push %r")).count();
  let pops = body.iter().filter(|l| l.starts_with("pop %r")).count();
  assert_eq!(pushes, pops);
}

#[test]
fn assignment_value_is_the_stored_value() {
  let source = "void main() { char c; int y; y = (c = 300); write y; write c; }";
  let asm = generate_assembly(source).unwrap();
  assert!(asm.contains(
    "movq $300, %r8\n    movb %r8b, -1(%rbp)\n    movsbq %r8b, %r8\n    movl %r8d, -5(%rbp)\n    movslq %r8d, %r8\n"
  ));
}

#[test]
fn void_call_statement_leaves_nothing_live() {
  let source = "void tick() { write 1; } void main() { tick(); tick(); }";
  let asm = generate_assembly(source).unwrap();
  let body = lines(&asm);
  let start = body.iter().position(|l| *l == "fn_main:").unwrap();
  assert_eq!(&body[start + 3..start + 5], &["call fn_tick", "call fn_tick"]);
}

#[test]
fn if_else_shares_an_end_label() {
  let source = "int main() { int x = 3; if (x > 2) x = 1; else x = 0; if (x == 1) write x; return x; }";
  let asm = generate_assembly(source).unwrap();
  let body = lines(&asm);
  for expected in ["je .L0", "jmp .L1", ".L0:", ".L1:", "je .L2", ".L2:"] {
    assert!(body.contains(&expected), "missing {expected}");
  }
  assert!(body.contains(&"setg %r8b"));
  assert!(!body.contains(&".L3:"));
}

#[test]
fn for_loop_layout() {
  let source = "void main() { int i; for (i = 0; i < 3; i = i + 1) write i; }";
  let asm = generate_assembly(source).unwrap();
  let body = lines(&asm);
  let top = body.iter().position(|l| *l == ".L0:").unwrap();
  let exit = body.iter().position(|l| *l == ".L1:").unwrap();
  assert!(top < exit);
  assert_eq!(body[exit - 1], "jmp .L0");
  assert!(body[top..exit].contains(&"je .L1"));
  // init runs once, before the loop label
  assert!(body[..top].contains(&"movl %r8d, -4(%rbp)"));
}

#[test]
fn locals_reserve_aligned_frame() {
  let asm = generate_assembly("void main() { long a; long b; char c; }").unwrap();
  assert!(asm.contains("sub $32, %rsp"));
}

#[test]
fn errors_on_multiple_lines_are_all_reported() {
  let source = "void main() {\n  int x = true;\n  @\n  y = 2;\n  return 1;\n}";
  let (result, session) = compile(source);
  assert!(matches!(result, Err(CompileError::Rejected { count: 4 })));
  let lines: Vec<usize> = session.diagnostics.iter().map(Diagnostic::line).collect();
  assert_eq!(lines, vec![3, 2, 4, 5]);
}

#[test]
fn missing_tokens_are_reported_and_recovered() {
  let (result, session) = compile("int main( { return 1 }");
  assert!(result.is_err());
  assert_eq!(
    diagnostics(&session),
    vec![
      Diagnostic::MissingExpectedToken {
        line: 1,
        expected: Tag::RParen
      },
      Diagnostic::MissingExpectedToken {
        line: 1,
        expected: Tag::Semi
      },
    ]
  );
}

#[test]
fn comments_are_invisible_to_the_parser() {
  let source = "/* header */ int main() { /* inline */ return /* mid */ 7; }";
  let mut session = Session::new();
  let program = parse(tokenize(source), &mut session);
  assert!(session.diagnostics.is_empty());
  assert_eq!(program.functions.len(), 1);
}

#[test]
fn unterminated_comment_is_a_lexical_error() {
  let (result, session) = compile("int main() { return 0; } /* trailing");
  assert!(result.is_err());
  assert_eq!(
    diagnostics(&session),
    vec![Diagnostic::Lexical {
      line: 1,
      text: "/*".into()
    }]
  );
}

#[test]
fn const_bindings_cannot_be_assigned() {
  let (result, session) = compile("void main() { const int k = 1; k = 2; }");
  assert!(result.is_err());
  assert_eq!(
    diagnostics(&session),
    vec![Diagnostic::InvalidLeftValue { line: 1 }]
  );
}

#[test]
fn compilation_is_idempotent() {
  let source = "int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); }
    int main() { int i; for (i = 0; i < 5; i = i + 1) write fact(i); return 0; }";
  let first = generate_assembly(source).unwrap();
  let second = generate_assembly(source).unwrap();
  assert_eq!(first, second);

  let mut session = Session::new();
  let mut generator = Generator::new(&mut session);
  let reused_a = generator.run(source).unwrap();
  let reused_b = generator.run(source).unwrap();
  assert_eq!(reused_a, first);
  assert_eq!(reused_b, first);
}

#[test]
fn session_is_clean_after_a_failed_run() {
  let mut session = Session::new();
  let mut generator = Generator::new(&mut session);
  assert!(generator.run("void main() { bool b = 1; }").is_err());
  assert!(generator.run("void main() { bool b = true; }").is_ok());
}

#[test]
fn sessions_compile_in_parallel() {
  let source = "int sq(int x) { return x * x; } int main() { return sq(3) + sq(4); }";
  let expected = generate_assembly(source).unwrap();
  std::thread::scope(|scope| {
    let handles: Vec<_> = (0..4)
      .map(|_| scope.spawn(|| generate_assembly(source).unwrap()))
      .collect();
    for handle in handles {
      assert_eq!(handle.join().unwrap(), expected);
    }
  });
}
