//! Inheritance linking: resolve `extends`/`implements` references, reject
//! kind mismatches and cycles, and precompute the per-class resolution
//! tables (MRO, override table, interface requirements, still-abstract set).
//!
//! Unresolvable bases are diagnosed and dropped, leaving holes that later
//! passes skip safely. Cycles are broken at the closing edge after being
//! reported so every downstream traversal terminates.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Code, Diagnostic};

use super::{OverrideEntry, SigInfo, TypeGraph};

pub(super) fn link(program: &Program, graph: &mut TypeGraph, diagnostics: &mut Vec<Diagnostic>) {
    resolve_bases(program, graph, diagnostics);
    break_cycles(graph, diagnostics);
    compute_interface_requirements(graph);
    compute_class_tables(graph);
}

// ============================================================================
// Base resolution
// ============================================================================

fn resolve_bases(program: &Program, graph: &mut TypeGraph, diagnostics: &mut Vec<Diagnostic>) {
    for item in &program.items {
        match &item.node {
            Item::Interface(iface) => {
                // Only the surviving declaration of a duplicated name gets
                // its clauses linked.
                if graph
                    .interfaces
                    .get(&iface.name.node)
                    .is_none_or(|info| info.span != iface.name.span)
                {
                    continue;
                }
                let mut resolved = Vec::new();
                for base in &iface.extends {
                    if graph.is_interface(&base.node) {
                        resolved.push(base.node.clone());
                    } else if graph.is_class(&base.node) {
                        diagnostics.push(Diagnostic::error(
                            Code::ImplementsNonInterface,
                            format!(
                                "interface '{}' may only extend interfaces, but '{}' is a class",
                                iface.name.node, base.node
                            ),
                            base.span,
                        ));
                    } else {
                        diagnostics.push(unresolved(&base.node, base.span));
                    }
                }
                if let Some(info) = graph.interfaces.get_mut(&iface.name.node) {
                    info.extends = resolved;
                }
            }
            Item::Class(class) => {
                if graph
                    .classes
                    .get(&class.name.node)
                    .is_none_or(|info| info.span != class.name.span)
                {
                    continue;
                }
                let mut parent = None;
                if let Some(base) = &class.extends {
                    if graph.is_class(&base.node) {
                        // Extending the final class is still linked; the
                        // modifier checker reports it so the rest of the
                        // hierarchy checks out normally.
                        parent = Some(base.node.clone());
                    } else if graph.is_interface(&base.node) {
                        diagnostics.push(Diagnostic::error(
                            Code::ExtendsNonClass,
                            format!(
                                "class '{}' may only extend a class, but '{}' is an interface",
                                class.name.node, base.node
                            ),
                            base.span,
                        ));
                    } else {
                        diagnostics.push(unresolved(&base.node, base.span));
                    }
                }

                let mut interfaces = Vec::new();
                for base in &class.implements {
                    if graph.is_interface(&base.node) {
                        interfaces.push(base.node.clone());
                    } else if graph.is_class(&base.node) {
                        diagnostics.push(Diagnostic::error(
                            Code::ImplementsNonInterface,
                            format!("'{}' is a class, not an interface", base.node),
                            base.span,
                        ));
                    } else {
                        diagnostics.push(unresolved(&base.node, base.span));
                    }
                }

                if let Some(info) = graph.classes.get_mut(&class.name.node) {
                    info.parent = parent;
                    info.interfaces = interfaces;
                }
            }
            _ => {}
        }
    }
}

fn unresolved(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        Code::UnresolvedBase,
        format!("unknown base '{}'", name),
        span,
    )
}

// ============================================================================
// Cycle detection
// ============================================================================

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Depth-first search over the combined relation (class `extends`, interface
/// `extends`, class `implements`). Every back edge is reported as an
/// inheritance cycle and then removed from the graph.
fn break_cycles(graph: &mut TypeGraph, diagnostics: &mut Vec<Diagnostic>) {
    let nodes: Vec<String> = graph.decl_order.clone();
    let mut colors: HashMap<String, Color> = nodes.iter().map(|n| (n.clone(), Color::White)).collect();
    let mut back_edges: Vec<(String, String)> = Vec::new();

    for node in &nodes {
        if colors.get(node) == Some(&Color::White) {
            visit(node, graph, &mut colors, &mut back_edges);
        }
    }

    for (from, to) in back_edges {
        let span = graph
            .classes
            .get(&from)
            .map(|c| c.span)
            .or_else(|| graph.interfaces.get(&from).map(|i| i.span))
            .unwrap_or_default();
        diagnostics.push(
            Diagnostic::error(
                Code::InheritanceCycle,
                format!("inheritance cycle involving '{}' and '{}'", from, to),
                span,
            )
            .with_note("the offending edge is ignored for the remaining checks"),
        );

        // Break the cycle so every later traversal terminates.
        if let Some(class) = graph.classes.get_mut(&from) {
            if class.parent.as_deref() == Some(to.as_str()) {
                class.parent = None;
            }
            class.interfaces.retain(|i| i != &to);
        }
        if let Some(iface) = graph.interfaces.get_mut(&from) {
            iface.extends.retain(|i| i != &to);
        }
    }
}

fn edges(graph: &TypeGraph, node: &str) -> Vec<String> {
    if let Some(class) = graph.classes.get(node) {
        let mut out: Vec<String> = class.parent.iter().cloned().collect();
        out.extend(class.interfaces.iter().cloned());
        out
    } else if let Some(iface) = graph.interfaces.get(node) {
        iface.extends.clone()
    } else {
        Vec::new()
    }
}

fn visit(
    node: &str,
    graph: &TypeGraph,
    colors: &mut HashMap<String, Color>,
    back_edges: &mut Vec<(String, String)>,
) {
    colors.insert(node.to_string(), Color::Gray);

    for next in edges(graph, node) {
        match colors.get(&next) {
            Some(Color::Gray) => back_edges.push((node.to_string(), next)),
            Some(Color::White) => visit(&next, graph, colors, back_edges),
            _ => {}
        }
    }

    colors.insert(node.to_string(), Color::Black);
}

// ============================================================================
// Interface requirement closures
// ============================================================================

/// Required methods compose by set union across interface `extends`; a
/// child's own declaration wins over an ancestor's on a name collision.
fn compute_interface_requirements(graph: &mut TypeGraph) {
    let names: Vec<String> = graph.interfaces.keys().cloned().collect();
    let mut computed: HashMap<String, BTreeMap<String, SigInfo>> = HashMap::new();

    for name in &names {
        let mut required = BTreeMap::new();
        let mut visited = HashSet::new();
        gather_interface(graph, name, &mut required, &mut visited);
        computed.insert(name.clone(), required);
    }

    for (name, required) in computed {
        if let Some(info) = graph.interfaces.get_mut(&name) {
            info.required = required;
        }
    }
}

fn gather_interface(
    graph: &TypeGraph,
    name: &str,
    required: &mut BTreeMap<String, SigInfo>,
    visited: &mut HashSet<String>,
) {
    if !visited.insert(name.to_string()) {
        return;
    }
    let Some(iface) = graph.interfaces.get(name) else {
        return;
    };

    for (method_name, sig) in &iface.methods {
        required
            .entry(method_name.clone())
            .or_insert_with(|| sig.clone());
    }
    for base in &iface.extends {
        gather_interface(graph, base, required, visited);
    }
}

// ============================================================================
// Per-class resolution tables
// ============================================================================

struct ClassTables {
    mro: Vec<String>,
    override_table: BTreeMap<String, OverrideEntry>,
    required: BTreeMap<String, SigInfo>,
    still_abstract: BTreeMap<String, SigInfo>,
    implements_closure: BTreeSet<String>,
}

fn compute_class_tables(graph: &mut TypeGraph) {
    let names: Vec<String> = graph.classes.keys().cloned().collect();
    let mut computed: HashMap<String, ClassTables> = HashMap::new();

    for name in &names {
        computed.insert(name.clone(), class_tables(graph, name));
    }

    for (name, tables) in computed {
        if let Some(info) = graph.classes.get_mut(&name) {
            info.mro = tables.mro;
            info.override_table = tables.override_table;
            info.required = tables.required;
            info.still_abstract = tables.still_abstract;
            info.implements_closure = tables.implements_closure;
        }
    }
}

fn class_tables(graph: &TypeGraph, name: &str) -> ClassTables {
    // Single-parent linearization: this class first, then the parent chain.
    // Cycles were broken above, so the walk terminates.
    let mro: Vec<String> = graph.ancestry(name).map(|c| c.name.clone()).collect();

    let mut override_table: BTreeMap<String, OverrideEntry> = BTreeMap::new();
    let mut abstract_decls: BTreeMap<String, SigInfo> = BTreeMap::new();
    let mut required: BTreeMap<String, SigInfo> = BTreeMap::new();
    let mut implements_closure: BTreeSet<String> = BTreeSet::new();

    for ancestor_name in &mro {
        let Some(ancestor) = graph.classes.get(ancestor_name) else {
            continue;
        };

        for (method_name, method) in &ancestor.methods {
            // Most-derived concrete declaration wins.
            if method.has_body && !override_table.contains_key(method_name) {
                override_table.insert(
                    method_name.clone(),
                    OverrideEntry {
                        owner: ancestor_name.clone(),
                        sig: method.sig.clone(),
                    },
                );
            }
            if method.modifiers.is_abstract {
                abstract_decls
                    .entry(method_name.clone())
                    .or_insert_with(|| method.sig.clone());
            }
        }

        for iface_name in &ancestor.interfaces {
            let mut visited = HashSet::new();
            gather_interface_names(graph, iface_name, &mut implements_closure, &mut visited);
            if let Some(iface) = graph.interfaces.get(iface_name) {
                for (method_name, sig) in &iface.required {
                    required
                        .entry(method_name.clone())
                        .or_insert_with(|| sig.clone());
                }
            }
        }
    }

    // Still abstract: declared-abstract methods without a concrete override,
    // plus interface requirements nothing on the chain implements.
    let mut still_abstract = BTreeMap::new();
    for (method_name, sig) in &abstract_decls {
        if !override_table.contains_key(method_name) {
            still_abstract.insert(method_name.clone(), sig.clone());
        }
    }
    for (method_name, sig) in &required {
        if !override_table.contains_key(method_name) {
            still_abstract
                .entry(method_name.clone())
                .or_insert_with(|| sig.clone());
        }
    }

    ClassTables {
        mro,
        override_table,
        required,
        still_abstract,
        implements_closure,
    }
}

/// Collect an interface and everything it extends into `out`.
fn gather_interface_names(
    graph: &TypeGraph,
    name: &str,
    out: &mut BTreeSet<String>,
    visited: &mut HashSet<String>,
) {
    if !visited.insert(name.to_string()) {
        return;
    }
    let Some(iface) = graph.interfaces.get(name) else {
        return;
    };
    out.insert(name.to_string());
    for base in &iface.extends {
        gather_interface_names(graph, base, out, visited);
    }
}
