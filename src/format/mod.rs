//! Canonical source printing for Spy programs
//!
//! Re-emits a parseable program from the AST. The output is the printable
//! lowering artifact (`spicy -o <file>` writes it), and printing then
//! re-parsing produces a structurally equal AST.

mod printer;
mod writer;

pub use printer::Printer;

use crate::frontend::ast::Program;

/// Render a program in canonical form.
pub fn print_canonical(program: &Program) -> String {
    Printer::new().print_program(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;

    fn roundtrip(source: &str) {
        let first = parse_source(source).unwrap_or_else(|e| panic!("parse failed: {:?}", e));
        let printed = print_canonical(&first);
        let second = parse_source(&printed)
            .unwrap_or_else(|e| panic!("reparse failed: {:?}\noutput:\n{}", e, printed));
        assert_eq!(first, second, "round-trip changed structure:\n{}", printed);
    }

    #[test]
    fn test_roundtrip_declarations() {
        roundtrip(
            "interface Drawable { def draw() -> None; def area() -> float; } \
             abstract class Shape implements Drawable { \
                 abstract def area() -> float; \
                 def describe(self) -> str { return \"shape\"; } \
             } \
             final class Circle extends Shape { \
                 def __init__(self, radius: float) { self.radius = radius; } \
                 def area() -> float { return 3.14159 * self.radius ** 2; } \
                 def draw() -> None { pass; } \
             }",
        );
    }

    #[test]
    fn test_roundtrip_statements() {
        roundtrip(
            "def main() -> None { \
                 total = 0; \
                 for i in range(10) { \
                     if i % 2 == 0 { total += i; } elif i == 3 { pass; } else { total -= 1; } \
                 } \
                 while total > 0 { total = total - 3; } \
                 print(total); \
             }",
        );
    }

    #[test]
    fn test_roundtrip_expressions() {
        roundtrip(
            "x = (1 + 2) * 3; \
             y = -x ** 2; \
             z = not (x > 1 and y < 2) or x in [1, 2, 3]; \
             d = {\"a\": 1, \"b\": 2}; \
             t = (1, \"two\", 3.0); \
             s = d[\"a\"]; \
             part = [1, 2, 3, 4][1:-1];",
        );
    }

    #[test]
    fn test_roundtrip_fstrings() {
        roundtrip(r#"msg = f"Area: {width * height:.2f} and {rate:.1%} done {plain}";"#);
        roundtrip(r#"msg = f"brace {{literal}} and {d['key']}";"#);
    }

    #[test]
    fn test_roundtrip_final_binding_and_static() {
        roundtrip(
            "final limit = 10; \
             class Counter { \
                 static count = 0; \
                 static def bump() -> int { Counter.count += 1; return Counter.count; } \
             }",
        );
    }

    #[test]
    fn test_roundtrip_super_and_raise() {
        roundtrip(
            "class Base { def __init__(self, x: int) { self.x = x; } } \
             class Derived extends Base { \
                 def __init__(self) { super(1); } \
                 def check(self) -> None { \
                     if self.x < 0 { raise ValueError(\"negative\"); } \
                     return super().check(); \
                 } \
             }",
        );
    }

    #[test]
    fn test_roundtrip_is_idempotent() {
        let source = "def f(a: int, b: int = 2) -> int { return a + b; } x = f(1); print(x);";
        let program = parse_source(source).unwrap();
        let once = print_canonical(&program);
        let twice = print_canonical(&parse_source(&once).unwrap());
        assert_eq!(once, twice);
    }
}
