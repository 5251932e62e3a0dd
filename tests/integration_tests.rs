//! End-to-end tests for the Spy compiler and runtime: full pipeline runs
//! over realistic programs, checked against expected output and expected
//! diagnostics.

use spicy::compile::Compilation;
use spicy::frontend::diagnostics::{Code, Severity};
use spicy::runtime;

/// Compile a source string through the full front end.
fn compile(source: &str) -> Compilation {
    Compilation::compile("test.spc", source)
}

/// Compile and execute, returning captured stdout.
fn run(source: &str) -> String {
    let compilation = compile(source);
    assert!(
        !compilation.has_errors(),
        "unexpected diagnostics: {:?}",
        compilation.diagnostics
    );
    let mut out = Vec::new();
    runtime::run(&compilation.program, &compilation.graph, &mut out)
        .unwrap_or_else(|e| panic!("runtime error: {:?}", e));
    String::from_utf8(out).expect("output is UTF-8")
}

fn error_codes(compilation: &Compilation) -> Vec<Code> {
    compilation.diagnostics.iter().map(|d| d.code).collect()
}

// ============================================================================
// Modifier semantics end to end
// ============================================================================

#[test]
fn scenario_abstract_override_runs() {
    let source = "\
        abstract class A { abstract def m() -> int; } \
        class B extends A { def m() -> int { return 1; } } \
        B().m();";
    let compilation = compile(source);
    assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);

    let printed = run("\
        abstract class A { abstract def m() -> int; } \
        class B extends A { def m() -> int { return 1; } } \
        print(B().m());");
    assert_eq!(printed, "1\n");
}

#[test]
fn scenario_concrete_class_with_missing_member() {
    let compilation = compile(
        "abstract class A { abstract def m() -> int; } class B extends A {} B();",
    );
    assert_eq!(error_codes(&compilation), vec![Code::ConcreteClassHasAbstractMembers]);
}

#[test]
fn scenario_extends_final_class() {
    let compilation = compile("final class F {} class G extends F {}");
    assert_eq!(error_codes(&compilation), vec![Code::ExtendsFinalClass]);
}

#[test]
fn scenario_override_of_final_method() {
    let compilation = compile(
        "class P { final def m() -> int { return 1; } } \
         class C extends P { def m() -> int { return 2; } }",
    );
    assert_eq!(error_codes(&compilation), vec![Code::OverrideOfFinalMethod]);
}

#[test]
fn scenario_interface_signature_mismatch() {
    let compilation = compile(
        "interface I { def f() -> int; } \
         class K implements I { def f() -> str { return \"x\"; } }",
    );
    assert_eq!(error_codes(&compilation), vec![Code::OverrideSignatureMismatch]);
}

#[test]
fn scenario_shapes_program() {
    let source = r#"
interface Drawable {
    def draw() -> str;
    def area() -> float;
}

abstract class Shape implements Drawable {
    static count = 0;

    def __init__(self, name: str) {
        self.name = name;
        Shape.count = Shape.count + 1;
    }

    abstract def area() -> float;
    abstract def draw() -> str;

    final def describe(self) -> str {
        return f"{self.name}: area {self.area():.2f}";
    }
}

class Circle extends Shape {
    def __init__(self, radius: float) {
        super("circle");
        self.radius = radius;
    }

    def area(self) -> float {
        return 3.141592653589793 * self.radius ** 2;
    }

    def draw(self) -> str {
        return "o";
    }
}

class Rect extends Shape {
    def __init__(self, width: float, height: float) {
        super("rect");
        self.width = width;
        self.height = height;
    }

    def area(self) -> float {
        return self.width * self.height;
    }

    def draw(self) -> str {
        return "[]";
    }
}

shapes = [Circle(5.0), Rect(2.0, 3.5)];
total = 0.0;
for s in shapes {
    print(s.describe());
    total += s.area();
}
print(f"Total area: {total:.2f}");
print(f"Shapes created: {Shape.count}");
print(isinstance(shapes[0], Drawable));
"#;

    let output = run(source);
    assert_eq!(
        output,
        "circle: area 78.54\n\
         rect: area 7.00\n\
         Total area: 85.54\n\
         Shapes created: 2\n\
         True\n"
    );
}

// ============================================================================
// Boundary behaviors
// ============================================================================

#[test]
fn test_empty_bodies_are_valid() {
    let compilation = compile("class Empty {} interface Nothing {}");
    assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);
}

#[test]
fn test_utf8_identifiers() {
    assert_eq!(run("área = 2; print(área * 2);"), "4\n");
}

#[test]
fn test_nested_fstring_expressions() {
    let output = run(r#"d = {"k": [1, 2, 3]}; print(f"value: {d["k"][1] + len(d["k"])}");"#);
    assert_eq!(output, "value: 5\n");
}

#[test]
fn test_unclosed_block_is_rejected() {
    // The conservative choice: a missing brace is an error, never an
    // implicit close at the end of the enclosing block.
    let compilation = compile("def f() { for x in [1] { print(x); }");
    assert!(compilation.has_errors());
    assert!(error_codes(&compilation).contains(&Code::ExpectedToken));
}

#[test]
fn test_warning_only_program_is_not_an_error() {
    // Missing super chain to a zero-argument parent constructor warns.
    let compilation = compile(
        "class P { def __init__(self) { self.x = 0; } } \
         class C extends P { def __init__(self) { self.y = 1; } }",
    );
    assert!(!compilation.has_errors());
    assert_eq!(compilation.diagnostics.len(), 1);
    assert_eq!(compilation.diagnostics[0].severity, Severity::Warning);
}

// ============================================================================
// Larger programs
// ============================================================================

#[test]
fn test_audit_log_style_program() {
    let source = r#"
interface Reportable {
    def summary() -> str;
}

class AuditLog implements Reportable {
    def __init__(self) {
        self.entries = [];
    }

    def record(self, user: str, action: str) {
        self.entries.append(f"{user.lower()}:{action}");
    }

    def summary(self) -> str {
        return f"{len(self.entries)} entries";
    }
}

log = AuditLog();
log.record("Alice", "login");
log.record("BOB", "logout");
for entry in log.entries {
    print(entry);
}
print(log.summary());
rate = 2 / 8;
print(f"error rate: {rate:.2%}");
"#;

    let output = run(source);
    assert_eq!(
        output,
        "alice:login\nbob:logout\n2 entries\nerror rate: 25.00%\n"
    );
}

#[test]
fn test_final_binding_runs_until_checked() {
    let compilation = compile("final limit = 3; limit = 4;");
    assert_eq!(error_codes(&compilation), vec![Code::FinalReassignment]);
}

#[test]
fn test_static_counter_across_instances() {
    let source = "\
        class Session { \
            static opened = 0; \
            def __init__(self) { Session.opened += 1; } \
        } \
        a = Session(); b = Session(); c = Session(); \
        print(Session.opened);";
    assert_eq!(run(source), "3\n");
}

#[test]
fn test_polymorphic_dispatch_through_interface() {
    let source = r#"
interface Speaker {
    def speak() -> str;
}

class Dog implements Speaker {
    def speak(self) -> str { return "woof"; }
}

class Cat implements Speaker {
    def speak(self) -> str { return "meow"; }
}

animals = [Dog(), Cat(), Dog()];
for a in animals {
    if isinstance(a, Speaker) {
        print(a.speak());
    }
}
"#;
    assert_eq!(run(source), "woof\nmeow\nwoof\n");
}

#[test]
fn test_diagnostic_rendering_format() {
    let compilation = compile("final class F {}\nclass G extends F {}");
    assert!(compilation.has_errors());
    let diag = &compilation.diagnostics[0];
    let rendered =
        spicy::frontend::diagnostics::render(&compilation.file_name, &compilation.source, diag, false);
    assert!(
        rendered.starts_with("test.spc:2:"),
        "unexpected rendering: {}",
        rendered
    );
    assert!(rendered.contains("error[ExtendsFinalClass]"));
}
