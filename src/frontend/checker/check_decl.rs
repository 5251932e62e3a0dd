//! Declaration-level modifier rules.
//!
//! Walks interfaces and classes in source order and enforces abstract, final,
//! and static discipline, interface purity, and inheritance restrictions
//! against the linked type graph.

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Code, Diagnostic};

use super::{ClassInfo, TypeGraph};

pub(super) fn check_declarations(program: &Program, graph: &TypeGraph, diagnostics: &mut Vec<Diagnostic>) {
    for item in &program.items {
        match &item.node {
            Item::Interface(iface) => check_interface(iface, diagnostics),
            Item::Class(class) => check_class(class, graph, diagnostics),
            _ => {}
        }
    }
}

// ============================================================================
// Interface purity
// ============================================================================

/// An interface body contains only method signatures: no fields, no bodies,
/// no static members.
fn check_interface(iface: &InterfaceDecl, diagnostics: &mut Vec<Diagnostic>) {
    for member in &iface.members {
        match &member.node {
            Member::Field(field) => {
                diagnostics.push(Diagnostic::error(
                    Code::InterfaceHasField,
                    format!(
                        "interface '{}' may not declare field '{}'",
                        iface.name.node, field.name.node
                    ),
                    field.name.span,
                ));
            }
            Member::Method(method) => {
                if method.body.is_some() {
                    diagnostics.push(
                        Diagnostic::error(
                            Code::InterfaceHasBody,
                            format!(
                                "interface method '{}.{}' may not have a body",
                                iface.name.node, method.name.node
                            ),
                            method.name.span,
                        )
                        .with_note("interfaces declare signatures only; implement the method in a class"),
                    );
                }
                if let Some(span) = method.modifiers.static_span {
                    diagnostics.push(
                        Diagnostic::error(
                            Code::StaticCannotBeAbstract,
                            format!(
                                "interface method '{}.{}' may not be static",
                                iface.name.node, method.name.node
                            ),
                            span,
                        )
                        .with_note("interfaces declare instance methods only"),
                    );
                }
                if let Some(span) = method.modifiers.final_span {
                    diagnostics.push(Diagnostic::error(
                        Code::MalformedDeclaration,
                        format!(
                            "interface method '{}.{}' may not be final",
                            iface.name.node, method.name.node
                        ),
                        span,
                    ));
                }
            }
        }
    }
}

// ============================================================================
// Class discipline
// ============================================================================

fn check_class(class: &ClassDecl, graph: &TypeGraph, diagnostics: &mut Vec<Diagnostic>) {
    let Some(info) = graph.classes.get(&class.name.node) else {
        return;
    };
    // A duplicated name keeps only its surviving declaration in the graph;
    // the shadowed one already carries a DuplicateDeclaration diagnostic.
    if info.span != class.name.span {
        return;
    }

    // Rule: a final class may not be extended.
    if let Some(base) = &class.extends {
        if graph.classes.get(&base.node).is_some_and(|p| p.is_final()) {
            diagnostics.push(Diagnostic::error(
                Code::ExtendsFinalClass,
                format!(
                    "class '{}' extends final class '{}'",
                    class.name.node, base.node
                ),
                base.span,
            ));
        }
    }

    for member in &class.members {
        match &member.node {
            Member::Method(method) => check_method(class, method, info, graph, diagnostics),
            Member::Field(field) => check_field(field, diagnostics),
        }
    }

    // Rule: a concrete class has an empty still-abstract set.
    if !info.is_abstract() && !info.still_abstract.is_empty() {
        let missing: Vec<&str> = info.still_abstract.keys().map(String::as_str).collect();
        let mut diag = Diagnostic::error(
            Code::ConcreteClassHasAbstractMembers,
            format!(
                "class '{}' is not abstract but is missing implementations for: {}",
                class.name.node,
                missing.join(", ")
            ),
            class.name.span,
        );
        for sig in info.still_abstract.values() {
            diag = diag.with_note(format!("missing: {}", sig.render()));
        }
        diagnostics.push(diag);
    }
}

fn check_method(
    class: &ClassDecl,
    method: &MethodDecl,
    info: &ClassInfo,
    graph: &TypeGraph,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mods = &method.modifiers;
    let qualified = format!("{}.{}", class.name.node, method.name.node);

    // A constructor is plain: never static, abstract, or final.
    if method.is_constructor() && mods.any() {
        diagnostics.push(Diagnostic::error(
            Code::MalformedDeclaration,
            format!(
                "constructor '{}' may not be static, abstract, or final",
                qualified
            ),
            method.name.span,
        ));
        return;
    }

    if mods.is_abstract() && mods.is_final() {
        diagnostics.push(Diagnostic::error(
            Code::AbstractAndFinal,
            format!("method '{}' may not be both abstract and final", qualified),
            method.name.span,
        ));
    }

    if mods.is_abstract() && mods.is_static() {
        diagnostics.push(Diagnostic::error(
            Code::StaticCannotBeAbstract,
            format!("static member '{}' may not be abstract", qualified),
            method.name.span,
        ));
    }

    if mods.is_abstract() && method.body.is_some() {
        diagnostics.push(Diagnostic::error(
            Code::MalformedDeclaration,
            format!("abstract method '{}' may not have a body", qualified),
            method.name.span,
        ));
    }

    if !mods.is_abstract() && method.body.is_none() {
        let message = if mods.is_final() {
            format!("final method '{}' must have a body", qualified)
        } else {
            format!(
                "method '{}' has no body; mark it abstract or implement it",
                qualified
            )
        };
        diagnostics.push(Diagnostic::error(
            Code::MalformedDeclaration,
            message,
            method.name.span,
        ));
    }

    // A static member has no receiver at all.
    if mods.is_static() {
        if let Some(param) = method.params.iter().find(|p| p.node.is_receiver()) {
            diagnostics.push(
                Diagnostic::error(
                    Code::StaticUsesSelf,
                    format!("static member '{}' takes no 'self' parameter", qualified),
                    param.span,
                )
                .with_note("static members are called through the class name and have no receiver"),
            );
        }
        // Statics shadow by name through the class they are declared on;
        // redefining an ancestor's static is allowed.
        return;
    }

    if method.is_constructor() {
        return;
    }

    // Overriding rules run against the nearest ancestor declaration.
    let ancestor_decl = info
        .mro
        .iter()
        .skip(1)
        .filter_map(|name| graph.classes.get(name))
        .find_map(|ancestor| {
            ancestor
                .methods
                .get(&method.name.node)
                .map(|m| (ancestor.name.clone(), m))
        });

    if let Some((ancestor_name, ancestor_method)) = ancestor_decl {
        if ancestor_method.modifiers.is_final {
            diagnostics.push(
                Diagnostic::error(
                    Code::OverrideOfFinalMethod,
                    format!(
                        "'{}' overrides final method '{}.{}'",
                        qualified, ancestor_name, method.name.node
                    ),
                    method.name.span,
                )
                .with_note(format!(
                    "'{}.{}' is declared final and may not be redefined",
                    ancestor_name, method.name.node
                )),
            );
        }

        let own = info
            .methods
            .get(&method.name.node)
            .map(|m| &m.sig);
        if let Some(own_sig) = own {
            if !own_sig.compatible_with(&ancestor_method.sig) {
                diagnostics.push(
                    Diagnostic::error(
                        Code::OverrideSignatureMismatch,
                        format!(
                            "'{}' does not match the signature declared on '{}'",
                            qualified, ancestor_name
                        ),
                        method.name.span,
                    )
                    .with_note(format!("found:    {}", own_sig.render()))
                    .with_note(format!("expected: {}", ancestor_method.sig.render())),
                );
            }
        }
    }

    // Interface conformance is checked at the implementing declaration.
    if let (Some(own), Some(required)) = (
        info.methods.get(&method.name.node),
        info.required.get(&method.name.node),
    ) {
        if own.has_body && !own.sig.compatible_with(required) {
            diagnostics.push(
                Diagnostic::error(
                    Code::OverrideSignatureMismatch,
                    format!(
                        "'{}' does not match the interface requirement",
                        qualified
                    ),
                    method.name.span,
                )
                .with_note(format!("found:    {}", own.sig.render()))
                .with_note(format!("required: {}", required.render())),
            );
        }
    }
}

fn check_field(field: &FieldDecl, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(span) = field.modifiers.abstract_span {
        diagnostics.push(Diagnostic::error(
            Code::MalformedDeclaration,
            format!("field '{}' may not be abstract", field.name.node),
            span,
        ));
    }
}
