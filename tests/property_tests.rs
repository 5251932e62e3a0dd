//! Property-based tests for the Spy compiler
//!
//! These use proptest to verify structural invariants across many generated
//! inputs: parse/print round-tripping, checker idempotence, and diagnostic
//! monotonicity.

use proptest::prelude::*;

use spicy::format::print_canonical;
use spicy::frontend::checker;
use spicy::frontend::parser::parse_source;

// =============================================================================
// Generation strategies
// =============================================================================

/// Valid Spy identifiers that are not keywords.
fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("not a keyword", |s| {
        !matches!(
            s.as_str(),
            "interface"
                | "class"
                | "abstract"
                | "final"
                | "static"
                | "extends"
                | "implements"
                | "def"
                | "return"
                | "if"
                | "elif"
                | "else"
                | "for"
                | "in"
                | "while"
                | "not"
                | "and"
                | "or"
                | "is"
                | "self"
                | "super"
                | "pass"
                | "raise"
                | "import"
                | "from"
        )
    })
}

/// A small free function returning an int expression of its parameter.
fn function_strategy() -> impl Strategy<Value = String> {
    (ident_strategy(), ident_strategy(), 0i64..100).prop_map(|(name, param, k)| {
        format!(
            "def {}({}: int) -> int {{ return {} + {}; }}",
            name, param, param, k
        )
    })
}

/// A tiny class hierarchy: an interface, a base class, and a subclass that
/// may or may not implement the required method.
fn hierarchy_strategy() -> impl Strategy<Value = (String, bool)> {
    (ident_strategy(), ident_strategy(), any::<bool>()).prop_map(|(a, b, implements)| {
        let iface = format!("i_{}", a);
        let base = format!("c_{}", a);
        let child = format!("d_{}", b);
        let body = if implements {
            "def m() -> int { return 1; }"
        } else {
            ""
        };
        let source = format!(
            "interface {iface} {{ def m() -> int; }} \
             abstract class {base} implements {iface} {{ abstract def m() -> int; }} \
             class {child} extends {base} {{ {body} }}",
        );
        (source, implements)
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Parsing, canonical printing, and re-parsing yields an equal tree.
    #[test]
    fn roundtrip_generated_functions(source in function_strategy()) {
        let first = parse_source(&source).expect("generated function parses");
        let printed = print_canonical(&first);
        let second = parse_source(&printed).expect("printed output parses");
        prop_assert_eq!(first, second);
    }

    /// Checking the same AST twice produces identical diagnostic bags.
    #[test]
    fn checking_is_idempotent((source, _) in hierarchy_strategy()) {
        let program = parse_source(&source).expect("generated hierarchy parses");
        let first = checker::check(&program);
        let second = checker::check(&program);
        prop_assert_eq!(first.diagnostics, second.diagnostics);
    }

    /// A subclass that fails to implement its inherited requirement is
    /// diagnosed; one that implements it is clean.
    #[test]
    fn completeness_matches_implementation((source, implements) in hierarchy_strategy()) {
        let program = parse_source(&source).expect("generated hierarchy parses");
        let result = checker::check(&program);
        prop_assert_eq!(result.has_errors(), !implements);
    }

    /// Appending an unrelated valid declaration never removes diagnostics.
    #[test]
    fn diagnostics_are_monotonic(
        (source, _) in hierarchy_strategy(),
        extra in ident_strategy(),
    ) {
        let program = parse_source(&source).expect("generated hierarchy parses");
        let base = checker::check(&program);

        let grown = format!("{} class zz_{} {{}}", source, extra);
        let grown_program = parse_source(&grown).expect("grown program parses");
        let grown_result = checker::check(&grown_program);

        for diag in &base.diagnostics {
            prop_assert!(
                grown_result.diagnostics.contains(diag),
                "diagnostic lost after adding unrelated code: {:?}",
                diag
            );
        }
    }

    /// Printing is a fixed point: print(parse(print(x))) == print(x).
    #[test]
    fn printing_is_idempotent(source in function_strategy()) {
        let program = parse_source(&source).expect("generated function parses");
        let once = print_canonical(&program);
        let reparsed = parse_source(&once).expect("printed output parses");
        let twice = print_canonical(&reparsed);
        prop_assert_eq!(once, twice);
    }
}
