//! Modifier checking for Spy programs.
//!
//! Validates the class-modifier semantics of a parsed program: abstract,
//! final, and static discipline, interface conformance, inheritance
//! well-formedness, and constructor chaining. The checker runs in three
//! passes over the AST and produces an immutable [`TypeGraph`] that the
//! runtime consumes for dispatch.
//!
//! ## Notes
//!
//! - **Three-pass model**: `collect` registers every top-level declaration by
//!   name (so mutually referring declarations resolve regardless of source
//!   order), `link` resolves `extends`/`implements` into the Type Graph and
//!   precomputes MRO, override tables, and still-abstract sets, and the check
//!   passes walk declarations and bodies against the graph.
//! - **Error accumulation**: diagnostics are collected (not fatal) so a
//!   single run reports every independent violation; diagnostics on one
//!   class never suppress checks on another.
//! - **Stable output**: the final bag is sorted by span start, and checking
//!   the same AST twice yields the same bag.

mod check_body;
mod check_decl;
mod collect;
mod link;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Diagnostic, MAX_DIAGNOSTICS};

// ============================================================================
// Type graph
// ============================================================================

/// A method signature in nominal form: parameter type names by lexical
/// identity, receiver excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigInfo {
    pub name: String,
    pub params: Vec<Option<String>>,
    pub return_type: Option<String>,
    pub span: Span,
}

impl SigInfo {
    /// Nominal compatibility: same arity, same parameter type names, same
    /// return type.
    pub fn compatible_with(&self, other: &SigInfo) -> bool {
        self.params == other.params && self.return_type == other.return_type
    }

    /// Render as `def name(int, float) -> str` for diagnostics.
    pub fn render(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| p.clone().unwrap_or_else(|| "_".to_string()))
            .collect();
        match &self.return_type {
            Some(ret) => format!("def {}({}) -> {}", self.name, params.join(", "), ret),
            None => format!("def {}({})", self.name, params.join(", ")),
        }
    }
}

/// Per-member modifier view used by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberModifiers {
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_static: bool,
}

impl From<&Modifiers> for MemberModifiers {
    fn from(m: &Modifiers) -> Self {
        Self {
            is_abstract: m.is_abstract(),
            is_final: m.is_final(),
            is_static: m.is_static(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub sig: SigInfo,
    pub modifiers: MemberModifiers,
    pub has_body: bool,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub is_static: bool,
    pub is_final: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub span: Span,
    /// Resolved base interfaces (unresolved names are dropped after being
    /// diagnosed, leaving a hole later passes skip safely)
    pub extends: Vec<String>,
    /// Methods declared directly on this interface
    pub methods: BTreeMap<String, SigInfo>,
    /// Closure of required methods over interface `extends` (computed by the
    /// linker; union across ancestors)
    pub required: BTreeMap<String, SigInfo>,
}

/// The most-derived concrete implementation of a method name.
#[derive(Debug, Clone)]
pub struct OverrideEntry {
    pub owner: String,
    pub sig: SigInfo,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub span: Span,
    pub modifier: ClassModifier,
    /// Span of the `extends` base name, for inheritance diagnostics
    pub extends_span: Option<Span>,
    /// Resolved parent class (holes from bad bases stay `None`)
    pub parent: Option<String>,
    /// Resolved implemented interfaces
    pub interfaces: Vec<String>,
    /// Instance methods declared directly on this class (constructor excluded)
    pub methods: BTreeMap<String, MethodInfo>,
    pub constructor: Option<MethodInfo>,
    /// Static members, resolvable through `ClassName.member` only
    pub statics: BTreeMap<String, MethodInfo>,
    pub fields: BTreeMap<String, FieldInfo>,
    /// Member names beginning with `_`, recorded but never enforced
    pub internal_names: Vec<String>,

    // ---- computed by the linker ----
    /// Linearized ancestry, this class first
    pub mro: Vec<String>,
    /// Method name -> most-derived concrete declaration
    pub override_table: BTreeMap<String, OverrideEntry>,
    /// Interface requirements, unioned over this class's and its ancestors'
    /// `implements` lists (reflexively across interface `extends`)
    pub required: BTreeMap<String, SigInfo>,
    /// Method names with no concrete implementation: inherited `abstract`
    /// methods plus unimplemented interface requirements
    pub still_abstract: BTreeMap<String, SigInfo>,
    /// Every interface this class satisfies, for O(1) `isinstance`
    pub implements_closure: BTreeSet<String>,
}

impl ClassInfo {
    pub fn is_abstract(&self) -> bool {
        self.modifier == ClassModifier::Abstract
    }

    pub fn is_final(&self) -> bool {
        self.modifier == ClassModifier::Final
    }
}

/// The immutable type graph for one compilation: classes, interfaces, free
/// functions, and the precomputed resolution tables.
#[derive(Debug, Default)]
pub struct TypeGraph {
    pub interfaces: HashMap<String, InterfaceInfo>,
    pub classes: HashMap<String, ClassInfo>,
    pub functions: HashMap<String, SigInfo>,
    /// Declaration order of type names, for deterministic iteration
    pub decl_order: Vec<String>,
}

impl TypeGraph {
    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Walk the parent chain starting at (and including) `name`.
    pub fn ancestry<'g>(&'g self, name: &str) -> impl Iterator<Item = &'g ClassInfo> {
        let mut current = self.classes.get(name);
        std::iter::from_fn(move || {
            let class = current?;
            current = class.parent.as_deref().and_then(|p| self.classes.get(p));
            Some(class)
        })
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Result of running the checker: the type graph plus every diagnostic.
#[derive(Debug)]
pub struct CheckResult {
    pub graph: TypeGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Run declaration collection, inheritance linking, and the modifier rule
/// set over a parsed program.
///
/// The checker never mutates the AST and never stops at the first problem;
/// modifier errors on one class do not prevent checks on independent
/// classes. The returned bag is sorted by span start and capped at
/// [`MAX_DIAGNOSTICS`].
#[tracing::instrument(skip_all, fields(item_count = program.items.len()))]
pub fn check(program: &Program) -> CheckResult {
    let mut diagnostics = Vec::new();

    let mut graph = collect::collect(program, &mut diagnostics);
    link::link(program, &mut graph, &mut diagnostics);
    check_decl::check_declarations(program, &graph, &mut diagnostics);
    check_body::check_bodies(program, &graph, &mut diagnostics);

    // Stable source order keeps output deterministic across runs.
    diagnostics.sort_by_key(|d| (d.span.start, d.span.end));
    diagnostics.truncate(MAX_DIAGNOSTICS);

    CheckResult { graph, diagnostics }
}
