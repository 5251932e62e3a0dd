//! Checker tests: modifier discipline, inheritance rules, and the
//! stability invariants (idempotent and monotonic diagnostics).

use crate::frontend::checker::{self, CheckResult};
use crate::frontend::diagnostics::{Code, Severity};
use crate::frontend::parser::parse_source;

fn check_source(source: &str) -> CheckResult {
    let program = parse_source(source).unwrap_or_else(|errs| panic!("parse failed: {:?}", errs));
    checker::check(&program)
}

fn codes(result: &CheckResult) -> Vec<Code> {
    result.diagnostics.iter().map(|d| d.code).collect()
}

// ============================================================================
// Abstract discipline
// ============================================================================

#[test]
fn test_abstract_override_is_clean() {
    let result = check_source(
        "abstract class A { abstract def m() -> int; } \
         class B extends A { def m() -> int { return 1; } } \
         B().m();",
    );
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
}

#[test]
fn test_concrete_class_missing_abstract_member() {
    let result = check_source(
        "abstract class A { abstract def m() -> int; } \
         class B extends A {} \
         B();",
    );
    assert_eq!(codes(&result), vec![Code::ConcreteClassHasAbstractMembers]);
    assert!(result.diagnostics[0].message.contains('m'));
    // No AbstractInstantiation: B is concrete, just invalid.
    assert!(!codes(&result).contains(&Code::AbstractInstantiation));
}

#[test]
fn test_abstract_instantiation() {
    let result = check_source("abstract class A { abstract def m() -> int; } A();");
    assert_eq!(codes(&result), vec![Code::AbstractInstantiation]);
}

#[test]
fn test_abstract_method_with_body() {
    let result = check_source("abstract class A { abstract def m() -> int { return 1; } }");
    assert!(codes(&result).contains(&Code::MalformedDeclaration));
}

#[test]
fn test_interface_requirements_inherited_through_extends() {
    // A class satisfying the child interface satisfies all of its ancestors.
    let result = check_source(
        "interface A { def f() -> int; } \
         interface B extends A { def g() -> int; } \
         class C implements B { \
             def f() -> int { return 1; } \
             def g() -> int { return 2; } \
         }",
    );
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
    let c = &result.graph.classes["C"];
    assert!(c.implements_closure.contains("A"));
    assert!(c.implements_closure.contains("B"));
}

#[test]
fn test_missing_interface_method_via_extends() {
    let result = check_source(
        "interface A { def f() -> int; } \
         interface B extends A { def g() -> int; } \
         class C implements B { def g() -> int { return 2; } }",
    );
    assert_eq!(codes(&result), vec![Code::ConcreteClassHasAbstractMembers]);
    assert!(result.diagnostics[0].message.contains('f'));
}

#[test]
fn test_inherited_implementation_satisfies_interface() {
    let result = check_source(
        "interface I { def f() -> int; } \
         class Base { def f() -> int { return 1; } } \
         class Child extends Base implements I {}",
    );
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
}

// ============================================================================
// Final discipline
// ============================================================================

#[test]
fn test_extends_final_class() {
    let result = check_source("final class F {} class G extends F {}");
    assert_eq!(codes(&result), vec![Code::ExtendsFinalClass]);
}

#[test]
fn test_override_of_final_method() {
    let result = check_source(
        "class P { final def m() -> int { return 1; } } \
         class C extends P { def m() -> int { return 2; } }",
    );
    assert_eq!(codes(&result), vec![Code::OverrideOfFinalMethod]);
}

#[test]
fn test_final_method_override_through_grandparent() {
    let result = check_source(
        "class A { final def m() -> int { return 1; } } \
         class B extends A {} \
         class C extends B { def m() -> int { return 2; } }",
    );
    assert_eq!(codes(&result), vec![Code::OverrideOfFinalMethod]);
}

#[test]
fn test_abstract_and_final() {
    let result = check_source("abstract class A { abstract final def m() -> int; }");
    assert!(codes(&result).contains(&Code::AbstractAndFinal));
}

#[test]
fn test_final_binding_reassignment() {
    let result = check_source("final x = 5; x = 6;");
    assert_eq!(codes(&result), vec![Code::FinalReassignment]);
}

#[test]
fn test_final_binding_compound_reassignment() {
    let result = check_source("final x = 5; x += 1;");
    assert_eq!(codes(&result), vec![Code::FinalReassignment]);
}

// ============================================================================
// Static discipline
// ============================================================================

#[test]
fn test_static_cannot_be_abstract() {
    let result = check_source("abstract class A { abstract static def m() -> int; }");
    assert!(codes(&result).contains(&Code::StaticCannotBeAbstract));
}

#[test]
fn test_static_uses_self() {
    let result = check_source(
        "class C { static def m() -> int { return self.x; } }",
    );
    assert_eq!(codes(&result), vec![Code::StaticUsesSelf]);
}

#[test]
fn test_static_uses_super() {
    let result = check_source(
        "class P { def f(self) -> int { return 1; } } \
         class C extends P { static def m() -> int { return super().f(); } }",
    );
    assert_eq!(codes(&result), vec![Code::StaticUsesSelf]);
}

#[test]
fn test_static_with_self_parameter() {
    let result = check_source("class C { static def m(self) -> int { return 1; } }");
    assert_eq!(codes(&result), vec![Code::StaticUsesSelf]);
}

#[test]
fn test_static_shadowing_is_allowed() {
    let result = check_source(
        "class P { static def make() -> int { return 1; } } \
         class C extends P { static def make() -> int { return 2; } }",
    );
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
}

// ============================================================================
// Signature compatibility
// ============================================================================

#[test]
fn test_interface_signature_mismatch() {
    let result = check_source(
        "interface I { def f() -> int; } \
         class K implements I { def f() -> str { return \"x\"; } }",
    );
    assert_eq!(codes(&result), vec![Code::OverrideSignatureMismatch]);
}

#[test]
fn test_override_signature_mismatch_on_params() {
    let result = check_source(
        "class P { def m(self, x: int) -> int { return x; } } \
         class C extends P { def m(self, x: str) -> int { return 1; } }",
    );
    assert_eq!(codes(&result), vec![Code::OverrideSignatureMismatch]);
}

#[test]
fn test_matching_override_is_clean() {
    let result = check_source(
        "class P { def m(self, x: int) -> int { return x; } } \
         class C extends P { def m(self, x: int) -> int { return x + 1; } }",
    );
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
}

// ============================================================================
// Interface purity
// ============================================================================

#[test]
fn test_interface_with_body() {
    let result = check_source("interface I { def f() -> int { return 1; } }");
    assert_eq!(codes(&result), vec![Code::InterfaceHasBody]);
}

#[test]
fn test_interface_with_field() {
    let result = check_source("interface I { x = 1; }");
    assert_eq!(codes(&result), vec![Code::InterfaceHasField]);
}

// ============================================================================
// Inheritance structure
// ============================================================================

#[test]
fn test_inheritance_cycle_detected_and_broken() {
    let result = check_source("class A extends B {} class B extends A {}");
    assert!(codes(&result).contains(&Code::InheritanceCycle));
    // Downstream tables exist and terminate.
    assert!(result.graph.classes["A"].mro.len() <= 2);
}

#[test]
fn test_interface_cycle() {
    let result = check_source("interface A extends B {} interface B extends A {}");
    assert!(codes(&result).contains(&Code::InheritanceCycle));
}

#[test]
fn test_unresolved_base() {
    let result = check_source("class C extends Ghost {}");
    assert_eq!(codes(&result), vec![Code::UnresolvedBase]);
}

#[test]
fn test_extends_non_class() {
    let result = check_source("interface I {} class C extends I {}");
    assert_eq!(codes(&result), vec![Code::ExtendsNonClass]);
}

#[test]
fn test_implements_non_interface() {
    let result = check_source("class A {} class C implements A {}");
    assert_eq!(codes(&result), vec![Code::ImplementsNonInterface]);
}

#[test]
fn test_duplicate_declaration() {
    let result = check_source("class C {} class C {}");
    assert_eq!(codes(&result), vec![Code::DuplicateDeclaration]);
}

#[test]
fn test_mro_is_parent_chain() {
    let result = check_source("class A {} class B extends A {} class C extends B {}");
    assert_eq!(result.graph.classes["C"].mro, vec!["C", "B", "A"]);
}

// ============================================================================
// Constructor discipline
// ============================================================================

#[test]
fn test_missing_super_init_is_error_with_args() {
    let result = check_source(
        "class P { def __init__(self, x: int) { self.x = x; } } \
         class C extends P { def __init__(self) { self.y = 1; } }",
    );
    assert_eq!(codes(&result), vec![Code::MissingSuperInit]);
    assert_eq!(result.diagnostics[0].severity, Severity::Error);
}

#[test]
fn test_missing_super_init_is_warning_without_args() {
    let result = check_source(
        "class P { def __init__(self) { self.x = 0; } } \
         class C extends P { def __init__(self) { self.y = 1; } }",
    );
    assert_eq!(codes(&result), vec![Code::MissingSuperInit]);
    assert_eq!(result.diagnostics[0].severity, Severity::Warning);
    assert!(!result.has_errors());
}

#[test]
fn test_super_init_first_is_clean() {
    let result = check_source(
        "class P { def __init__(self, x: int) { self.x = x; } } \
         class C extends P { def __init__(self) { super(1); self.y = 2; } }",
    );
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
}

#[test]
fn test_constructor_may_not_carry_modifiers() {
    let result = check_source("class C { static def __init__(self) { pass; } }");
    assert!(codes(&result).contains(&Code::MalformedDeclaration));
}

// ============================================================================
// Name resolution
// ============================================================================

#[test]
fn test_undefined_name() {
    let result = check_source("def f() -> int { return missing; }");
    assert_eq!(codes(&result), vec![Code::UndefinedName]);
}

#[test]
fn test_builtins_are_defined() {
    let result = check_source("print(len(range(3)));");
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
}

#[test]
fn test_self_outside_method() {
    let result = check_source("def f() -> int { return self.x; }");
    assert_eq!(codes(&result), vec![Code::UndefinedName]);
}

#[test]
fn test_internal_names_are_recorded_not_enforced() {
    let result = check_source("class C { _count = 0; def _bump(self) { pass; } }");
    assert!(result.diagnostics.is_empty(), "got {:?}", result.diagnostics);
    let c = &result.graph.classes["C"];
    assert!(c.internal_names.contains(&"_count".to_string()));
    assert!(c.internal_names.contains(&"_bump".to_string()));
}

// ============================================================================
// Stability invariants
// ============================================================================

#[test]
fn test_checking_is_idempotent() {
    let source = "final class F {} class G extends F {} abstract class A { abstract def m() -> int; } A();";
    let program = parse_source(source).unwrap();
    let first = checker::check(&program);
    let second = checker::check(&program);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn test_diagnostics_are_monotonic_under_additions() {
    let base = "final class F {} class G extends F {}";
    let extended = format!("{} class H extends F {{}}", base);

    let base_result = check_source(base);
    let extended_result = check_source(&extended);

    for diag in &base_result.diagnostics {
        assert!(
            extended_result.diagnostics.contains(diag),
            "diagnostic lost after adding unrelated code: {:?}",
            diag
        );
    }
    assert!(extended_result.diagnostics.len() > base_result.diagnostics.len());
}

#[test]
fn test_diagnostics_sorted_by_span() {
    let result = check_source(
        "final class F {} class G extends F {} class H extends F {} A();",
    );
    let starts: Vec<usize> = result.diagnostics.iter().map(|d| d.span.start).collect();
    let mut sorted = starts.clone();
    sorted.sort_unstable();
    assert_eq!(starts, sorted);
}

#[test]
fn test_independent_classes_all_checked() {
    // Modifier errors on one class never suppress checks on another.
    let result = check_source(
        "final class F {} \
         class G extends F {} \
         abstract class A { abstract def m() -> int; } \
         class B extends A {}",
    );
    let found = codes(&result);
    assert!(found.contains(&Code::ExtendsFinalClass));
    assert!(found.contains(&Code::ConcreteClassHasAbstractMembers));
}
