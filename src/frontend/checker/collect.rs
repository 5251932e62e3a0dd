//! First-pass collection: register every top-level declaration by name.
//!
//! Bodies are not resolved here; this pass only builds the name-level view
//! so that mutually referring declarations link up regardless of source
//! order. Duplicate declarations are diagnosed at the redefinition site.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Code, Diagnostic};

use super::{ClassInfo, FieldInfo, InterfaceInfo, MemberModifiers, MethodInfo, SigInfo, TypeGraph};

pub(super) fn collect(program: &Program, diagnostics: &mut Vec<Diagnostic>) -> TypeGraph {
    let mut graph = TypeGraph::default();
    // Spans of already-registered top-level names, for duplicate reporting.
    let mut seen: HashMap<String, Span> = HashMap::new();

    for item in &program.items {
        match &item.node {
            Item::Interface(iface) => {
                if register(&mut seen, &iface.name, "interface", diagnostics).is_some() {
                    continue;
                }
                let info = collect_interface(iface, diagnostics);
                graph.decl_order.push(iface.name.node.clone());
                graph.interfaces.insert(iface.name.node.clone(), info);
            }
            Item::Class(class) => {
                if register(&mut seen, &class.name, "class", diagnostics).is_some() {
                    continue;
                }
                let info = collect_class(class, diagnostics);
                graph.decl_order.push(class.name.node.clone());
                graph.classes.insert(class.name.node.clone(), info);
            }
            Item::Function(func) => {
                if register(&mut seen, &func.name, "function", diagnostics).is_some() {
                    continue;
                }
                graph
                    .functions
                    .insert(func.name.node.clone(), signature(&func.name, &func.params, &func.return_type, false));
            }
            Item::Stmt(_) => {}
        }
    }

    graph
}

/// Record a top-level name; on redefinition, diagnose and return the span of
/// the original declaration.
fn register(
    seen: &mut HashMap<String, Span>,
    name: &Spanned<String>,
    what: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Span> {
    if let Some(&original) = seen.get(&name.node) {
        diagnostics.push(
            Diagnostic::error(
                Code::DuplicateDeclaration,
                format!("duplicate declaration of {} '{}'", what, name.node),
                name.span,
            )
            .with_note(format!("'{}' was first declared earlier in this file", name.node)),
        );
        return Some(original);
    }
    seen.insert(name.node.clone(), name.span);
    None
}

fn collect_interface(iface: &InterfaceDecl, diagnostics: &mut Vec<Diagnostic>) -> InterfaceInfo {
    let mut methods = BTreeMap::new();
    let mut seen: HashMap<String, Span> = HashMap::new();

    for member in &iface.members {
        // Only method names enter the signature view; interface-purity
        // violations (fields, bodies) are the decl checker's job.
        if let Member::Method(method) = &member.node {
            if register(&mut seen, &method.name, "interface method", diagnostics).is_some() {
                continue;
            }
            methods.insert(
                method.name.node.clone(),
                signature(&method.name, &method.params, &method.return_type, false),
            );
        }
    }

    InterfaceInfo {
        name: iface.name.node.clone(),
        span: iface.name.span,
        extends: Vec::new(),
        methods,
        required: BTreeMap::new(),
    }
}

fn collect_class(class: &ClassDecl, diagnostics: &mut Vec<Diagnostic>) -> ClassInfo {
    let mut info = ClassInfo {
        name: class.name.node.clone(),
        span: class.name.span,
        modifier: class.modifier,
        extends_span: class.extends.as_ref().map(|e| e.span),
        parent: None,
        interfaces: Vec::new(),
        methods: BTreeMap::new(),
        constructor: None,
        statics: BTreeMap::new(),
        fields: BTreeMap::new(),
        internal_names: Vec::new(),
        mro: Vec::new(),
        override_table: BTreeMap::new(),
        required: BTreeMap::new(),
        still_abstract: BTreeMap::new(),
        implements_closure: Default::default(),
    };

    let mut seen: HashMap<String, Span> = HashMap::new();

    for member in &class.members {
        match &member.node {
            Member::Method(method) => {
                if register(&mut seen, &method.name, "member", diagnostics).is_some() {
                    continue;
                }
                if method.name.node.starts_with('_') && !method.is_constructor() {
                    info.internal_names.push(method.name.node.clone());
                }

                let is_static = method.modifiers.is_static();
                let method_info = MethodInfo {
                    sig: signature(&method.name, &method.params, &method.return_type, is_static),
                    modifiers: MemberModifiers::from(&method.modifiers),
                    has_body: method.body.is_some(),
                };

                if method.is_constructor() {
                    info.constructor = Some(method_info);
                } else if is_static {
                    info.statics.insert(method.name.node.clone(), method_info);
                } else {
                    info.methods.insert(method.name.node.clone(), method_info);
                }
            }
            Member::Field(field) => {
                if register(&mut seen, &field.name, "member", diagnostics).is_some() {
                    continue;
                }
                if field.name.node.starts_with('_') {
                    info.internal_names.push(field.name.node.clone());
                }
                info.fields.insert(
                    field.name.node.clone(),
                    FieldInfo {
                        name: field.name.node.clone(),
                        is_static: field.modifiers.is_static(),
                        is_final: field.modifiers.is_final(),
                        span: field.name.span,
                    },
                );
            }
        }
    }

    info
}

/// Build the nominal signature for a method or function.
///
/// The leading `self` receiver is excluded for instance members; static
/// members and free functions keep every parameter.
fn signature(
    name: &Spanned<String>,
    params: &[Spanned<Param>],
    return_type: &Option<Spanned<TypeExpr>>,
    is_static: bool,
) -> SigInfo {
    let skip_receiver = !is_static && params.first().is_some_and(|p| p.node.is_receiver());
    let params = params
        .iter()
        .skip(if skip_receiver { 1 } else { 0 })
        .map(|p| p.node.ty.as_ref().map(|t| t.node.to_string()))
        .collect();

    SigInfo {
        name: name.node.clone(),
        params,
        return_type: return_type.as_ref().map(|t| t.node.to_string()),
        span: name.span,
    }
}
