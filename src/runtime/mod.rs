//! Tree-walking runtime for checked Spy programs
//!
//! The runtime consumes a program that already passed the modifier checker
//! together with its type graph. Class descriptors carry the precomputed
//! MRO and implements closure, so dispatch is a chain walk and `isinstance`
//! against an interface is a set lookup.
//!
//! ## Modules
//!
//! - `value` - runtime values and the object model
//! - `interp` - the evaluator
//! - `builtins` - built-in functions, native methods, operators
//! - `fmt` - f-string format specs

mod builtins;
mod fmt;
mod interp;
pub mod value;

pub use interp::{run, Interpreter, SpyError};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compilation;

    /// Compile and run a program, returning captured stdout.
    fn run_program(source: &str) -> Result<String, SpyError> {
        let compilation = Compilation::compile("test.spc", source);
        assert!(
            !compilation.has_errors(),
            "unexpected diagnostics: {:?}",
            compilation.diagnostics
        );
        let mut out = Vec::new();
        run(&compilation.program, &compilation.graph, &mut out)?;
        Ok(String::from_utf8(out).expect("runtime output is UTF-8"))
    }

    fn run_ok(source: &str) -> String {
        run_program(source).unwrap_or_else(|e| panic!("runtime error: {:?}", e))
    }

    #[test]
    fn test_arithmetic_and_print() {
        assert_eq!(run_ok("print(1 + 2 * 3);"), "7\n");
        assert_eq!(run_ok("print(7 / 2);"), "3.5\n");
        assert_eq!(run_ok("print(7 % 3);"), "1\n");
        assert_eq!(run_ok("print(2 ** 10);"), "1024\n");
    }

    #[test]
    fn test_variables_and_loops() {
        let source = "total = 0; for i in range(5) { total += i; } print(total);";
        assert_eq!(run_ok(source), "10\n");
    }

    #[test]
    fn test_while_and_if() {
        let source = "\
            n = 10; steps = 0; \
            while n != 1 { \
                if n % 2 == 0 { n = n / 2; n = int(n); } else { n = 3 * n + 1; } \
                steps += 1; \
            } \
            print(steps);";
        assert_eq!(run_ok(source), "6\n");
    }

    #[test]
    fn test_functions_and_defaults() {
        let source = "\
            def scale(x: int, factor: int = 2) -> int { return x * factor; } \
            print(scale(5)); print(scale(5, 3));";
        assert_eq!(run_ok(source), "10\n15\n");
    }

    #[test]
    fn test_class_construction_and_dispatch() {
        let source = "\
            class Animal { \
                def __init__(self, name: str) { self.name = name; } \
                def speak(self) -> str { return \"...\"; } \
                def describe(self) -> str { return f\"{self.name} says {self.speak()}\"; } \
            } \
            class Dog extends Animal { \
                def speak(self) -> str { return \"woof\"; } \
            } \
            d = Dog(\"Rex\"); \
            print(d.describe());";
        assert_eq!(run_ok(source), "Rex says woof\n");
    }

    #[test]
    fn test_super_constructor_chain() {
        let source = "\
            class Base { def __init__(self, x: int) { self.x = x; } } \
            class Mid extends Base { def __init__(self, x: int) { super(x + 1); } } \
            class Leaf extends Mid { def __init__(self) { super(10); } } \
            print(Leaf().x);";
        assert_eq!(run_ok(source), "11\n");
    }

    #[test]
    fn test_super_method_dispatch() {
        let source = "\
            class Base { def greet(self) -> str { return \"base\"; } } \
            class Child extends Base { \
                def greet(self) -> str { return super().greet() + \"+child\"; } \
            } \
            print(Child().greet());";
        assert_eq!(run_ok(source), "base+child\n");
    }

    #[test]
    fn test_static_members_and_counter() {
        let source = "\
            class Counter { \
                static count = 0; \
                static def bump() -> int { Counter.count += 1; return Counter.count; } \
            } \
            Counter.bump(); Counter.bump(); \
            print(Counter.count);";
        assert_eq!(run_ok(source), "2\n");
    }

    #[test]
    fn test_static_shadowing_through_subclass_name() {
        let source = "\
            class P { static def tag() -> str { return \"p\"; } } \
            class C extends P { static def tag() -> str { return \"c\"; } } \
            print(P.tag()); print(C.tag());";
        assert_eq!(run_ok(source), "p\nc\n");
    }

    #[test]
    fn test_isinstance_with_interface() {
        let source = "\
            interface Drawable { def draw() -> str; } \
            class Circle implements Drawable { def draw(self) -> str { return \"o\"; } } \
            class Blob {} \
            c = Circle(); b = Blob(); \
            print(isinstance(c, Drawable)); \
            print(isinstance(b, Drawable)); \
            print(isinstance(c, Circle));";
        assert_eq!(run_ok(source), "True\nFalse\nTrue\n");
    }

    #[test]
    fn test_hasattr() {
        let source = "\
            class Shape { static _count = 0; def __init__(self) { self.kind = \"shape\"; } } \
            s = Shape(); \
            print(hasattr(Shape, \"_count\")); \
            print(hasattr(s, \"kind\")); \
            print(hasattr(s, \"missing\"));";
        assert_eq!(run_ok(source), "True\nTrue\nFalse\n");
    }

    #[test]
    fn test_fstring_formats() {
        let source = "\
            area = 78.53981633974483; \
            rate = 0.257; \
            print(f\"Area: {area:.2f}\"); \
            print(f\"Rate: {rate:.1%}\"); \
            print(f\"Plain: {1 + 2}\");";
        assert_eq!(run_ok(source), "Area: 78.54\nRate: 25.7%\nPlain: 3\n");
    }

    #[test]
    fn test_list_methods_and_slicing() {
        let source = "\
            xs = [1, 2, 3]; \
            xs.append(4); \
            ys = xs.copy(); \
            ys.remove(1); \
            print(xs); print(ys); \
            print(xs[1:-1]); print(xs[-1]); print(xs[:2]);";
        assert_eq!(
            run_ok(source),
            "[1, 2, 3, 4]\n[2, 3, 4]\n[2, 3]\n4\n[1, 2]\n"
        );
    }

    #[test]
    fn test_string_methods() {
        let source = "\
            s = \"Hello World\"; \
            print(s.lower()); \
            print(s.split());";
        assert_eq!(run_ok(source), "hello world\n['hello', 'world']\n");
    }

    #[test]
    fn test_dict_and_membership() {
        let source = "\
            d = {\"a\": 1, \"b\": 2}; \
            d[\"c\"] = 3; \
            print(d[\"c\"]); \
            print(\"a\" in d); \
            print(\"z\" in d); \
            print(len(d));";
        assert_eq!(run_ok(source), "3\nTrue\nFalse\n3\n");
    }

    #[test]
    fn test_sum_over_list() {
        assert_eq!(run_ok("print(sum([1, 2, 3, 4]));"), "10\n");
        assert_eq!(run_ok("print(sum([1.5, 2.5]));"), "4.0\n");
    }

    #[test]
    fn test_field_defaults() {
        let source = "\
            class Config { \
                retries = 3; \
                def __init__(self) { pass; } \
            } \
            print(Config().retries);";
        assert_eq!(run_ok(source), "3\n");
    }

    #[test]
    fn test_uncaught_value_error() {
        let source = "raise ValueError(\"bad input\");";
        let err = run_program(source).unwrap_err();
        assert_eq!(err.code, crate::frontend::diagnostics::Code::ValueError);
        assert_eq!(err.message, "bad input");
    }

    #[test]
    fn test_zero_division() {
        let err = run_program("print(1 / 0);").unwrap_err();
        assert_eq!(err.code, crate::frontend::diagnostics::Code::ZeroDivision);
    }

    #[test]
    fn test_index_error() {
        let err = run_program("xs = [1]; print(xs[5]);").unwrap_err();
        assert_eq!(err.code, crate::frontend::diagnostics::Code::IndexError);
    }

    #[test]
    fn test_attribute_error() {
        let err = run_program("class C {} C().missing();").unwrap_err();
        assert_eq!(err.code, crate::frontend::diagnostics::Code::AttributeError);
    }

    #[test]
    fn test_raise_inside_method_unwinds() {
        let source = "\
            class Validator { \
                def check(self, n: int) -> int { \
                    if n < 0 { raise ValueError(f\"negative: {n}\"); } \
                    return n; \
                } \
            } \
            v = Validator(); \
            print(v.check(3)); \
            v.check(-1);";
        let err = run_program(source).unwrap_err();
        assert_eq!(err.code, crate::frontend::diagnostics::Code::ValueError);
        assert_eq!(err.message, "negative: -1");
    }

    #[test]
    fn test_short_circuit_evaluation() {
        // The right side would divide by zero if evaluated.
        let source = "x = 0; ok = x == 0 or 1 / x > 1; print(ok);";
        assert_eq!(run_ok(source), "True\n");
    }

    #[test]
    fn test_is_and_identity() {
        let source = "\
            a = [1]; b = [1]; c = a; \
            print(a is b); print(a is c); print(None is None);";
        assert_eq!(run_ok(source), "False\nTrue\nTrue\n");
    }
}
