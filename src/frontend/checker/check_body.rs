//! Body-level checks: scoped name resolution and the modifier rules that
//! depend on executable code.
//!
//! One walk covers undefined names, abstract-class instantiation sites,
//! `self`/`super` inside static members, `super(...)`-first constructor
//! discipline, and reassignment of `final` bindings.

use std::collections::HashSet;

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Code, Diagnostic, Severity};
use crate::frontend::symbols::{ScopeKind, SymbolId, SymbolKind, SymbolTable};

use super::TypeGraph;

/// Where the walk currently is; decides what `self` and `super` mean.
#[derive(Clone, Copy)]
enum Ctx<'a> {
    /// Module-level statements and free function bodies
    Plain,
    /// Static member bodies and field initializers: no receiver exists
    Static { class: &'a str },
    /// Instance method bodies
    Method,
}

pub(super) fn check_bodies(program: &Program, graph: &TypeGraph, diagnostics: &mut Vec<Diagnostic>) {
    let mut checker = BodyChecker {
        graph,
        symbols: SymbolTable::new(),
        final_ids: HashSet::new(),
        diagnostics,
    };

    // Module scope sees every top-level declaration up front, so use sites
    // before the declaration in source order still resolve.
    for item in &program.items {
        match &item.node {
            Item::Interface(iface) => checker.define(&iface.name.node, SymbolKind::Interface, iface.name.span),
            Item::Class(class) => checker.define(&class.name.node, SymbolKind::Class, class.name.span),
            Item::Function(func) => checker.define(&func.name.node, SymbolKind::Function, func.name.span),
            Item::Stmt(_) => {}
        }
    }

    for item in &program.items {
        match &item.node {
            Item::Stmt(stmt) => checker.check_stmt(stmt, Ctx::Plain),
            Item::Function(func) => checker.check_function(func),
            Item::Class(class) => checker.check_class(class),
            Item::Interface(_) => {}
        }
    }
}

struct BodyChecker<'a> {
    graph: &'a TypeGraph,
    symbols: SymbolTable,
    /// Symbols bound with `final`
    final_ids: HashSet<SymbolId>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> BodyChecker<'a> {
    fn define(&mut self, name: &str, kind: SymbolKind, span: Span) {
        // Top-level duplicates were reported by the collection pass.
        let _ = self.symbols.define(name, kind, span);
    }

    /// Parameters must be unique within their declaring scope.
    fn define_param(&mut self, name: &str, span: Span) {
        if self.symbols.define(name, SymbolKind::Param, span).is_err() {
            self.error(
                Code::DuplicateDeclaration,
                format!("duplicate parameter '{}'", name),
                span,
            );
        }
    }

    fn error(&mut self, code: Code, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, message, span));
    }

    // ========================================================================
    // Declarations with bodies
    // ========================================================================

    fn check_function(&mut self, func: &FunctionDecl) {
        self.symbols.enter_scope(ScopeKind::Function);
        for param in &func.params {
            self.define_param(&param.node.name, param.span);
            if let Some(default) = &param.node.default {
                self.check_expr(default, Ctx::Plain);
            }
        }
        self.check_stmts(&func.body, Ctx::Plain);
        self.symbols.exit_scope();
    }

    fn check_class(&mut self, class: &ClassDecl) {
        let class_name = class.name.node.as_str();

        for member in &class.members {
            match &member.node {
                Member::Field(field) => {
                    // Field initializers run at class-descriptor construction
                    // time; there is no receiver to refer to.
                    self.check_expr(&field.value, Ctx::Static { class: class_name });
                }
                Member::Method(method) => {
                    let Some(body) = &method.body else { continue };

                    let ctx = if method.modifiers.is_static() {
                        Ctx::Static { class: class_name }
                    } else {
                        Ctx::Method
                    };

                    if method.is_constructor() {
                        self.check_super_init(class, method, body);
                    }

                    self.symbols.enter_scope(ScopeKind::Function);
                    for param in &method.params {
                        self.define_param(&param.node.name, param.span);
                        if let Some(default) = &param.node.default {
                            self.check_expr(default, ctx);
                        }
                    }
                    self.check_stmts(body, ctx);
                    self.symbols.exit_scope();
                }
            }
        }
    }

    /// A constructor under a parent that also has a constructor must chain to
    /// it first: `super(...)` as the first executable statement.
    fn check_super_init(&mut self, class: &ClassDecl, method: &MethodDecl, body: &[Spanned<Stmt>]) {
        let Some(info) = self.graph.classes.get(&class.name.node) else {
            return;
        };
        let Some(parent) = info.parent.as_deref() else {
            return;
        };

        let ancestor_ctor = self
            .graph
            .ancestry(parent)
            .find_map(|c| c.constructor.as_ref().map(|ctor| (c.name.clone(), ctor)));
        let Some((ancestor_name, ancestor_ctor)) = ancestor_ctor else {
            return;
        };

        let chains = matches!(
            body.first().map(|s| &s.node),
            Some(Stmt::Expr(expr)) if matches!(expr.node, Expr::Super(_))
        );
        if chains {
            return;
        }

        // A zero-argument parent constructor still runs implicitly, so the
        // missing chain is only a warning there.
        let severity = if ancestor_ctor.sig.params.is_empty() {
            Severity::Warning
        } else {
            Severity::Error
        };
        let message = format!(
            "constructor of '{}' does not call 'super(...)' before other statements",
            class.name.node
        );
        let diag = match severity {
            Severity::Warning => Diagnostic::warning(Code::MissingSuperInit, message, method.name.span),
            Severity::Error => Diagnostic::error(Code::MissingSuperInit, message, method.name.span),
        }
        .with_note(format!(
            "the parent constructor is declared on '{}'",
            ancestor_name
        ));
        self.diagnostics.push(diag);
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn check_stmts(&mut self, stmts: &[Spanned<Stmt>], ctx: Ctx<'_>) {
        for stmt in stmts {
            self.check_stmt(&stmt.node, ctx);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt, ctx: Ctx<'_>) {
        match stmt {
            Stmt::Expr(expr) => self.check_expr(expr, ctx),
            Stmt::Assign(assign) => {
                self.check_expr(&assign.value, ctx);
                match &assign.target {
                    AssignTarget::Name(name) => self.bind_name(name, assign.final_span.is_some()),
                    AssignTarget::Field { object, .. } => self.check_expr(object, ctx),
                    AssignTarget::Index { object, index } => {
                        self.check_expr(object, ctx);
                        self.check_expr(index, ctx);
                    }
                }
            }
            Stmt::Compound(compound) => {
                self.check_expr(&compound.value, ctx);
                match &compound.target {
                    AssignTarget::Name(name) => {
                        match self.symbols.lookup(&name.node) {
                            Some(id) if self.final_ids.contains(&id) => {
                                self.error(
                                    Code::FinalReassignment,
                                    format!("cannot reassign final binding '{}'", name.node),
                                    name.span,
                                );
                            }
                            Some(_) => {}
                            None => self.undefined(&name.node, name.span),
                        }
                    }
                    AssignTarget::Field { object, .. } => self.check_expr(object, ctx),
                    AssignTarget::Index { object, index } => {
                        self.check_expr(object, ctx);
                        self.check_expr(index, ctx);
                    }
                }
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.check_expr(value, ctx);
                }
            }
            Stmt::Raise(value) => self.check_expr(value, ctx),
            Stmt::If(if_stmt) => {
                self.check_expr(&if_stmt.cond, ctx);
                self.check_stmts(&if_stmt.then_body, ctx);
                for (cond, body) in &if_stmt.elif_branches {
                    self.check_expr(cond, ctx);
                    self.check_stmts(body, ctx);
                }
                if let Some(body) = &if_stmt.else_body {
                    self.check_stmts(body, ctx);
                }
            }
            Stmt::While(while_stmt) => {
                self.check_expr(&while_stmt.cond, ctx);
                self.check_stmts(&while_stmt.body, ctx);
            }
            Stmt::For(for_stmt) => {
                self.check_expr(&for_stmt.iter, ctx);
                self.define(&for_stmt.var.node, SymbolKind::Local, for_stmt.var.span);
                self.check_stmts(&for_stmt.body, ctx);
            }
            Stmt::Import(import) => {
                // Single-file compilation: record the bound names so later
                // references resolve, nothing more.
                if import.items.is_empty() {
                    if let Some(head) = import.module.first() {
                        self.define(&head.node, SymbolKind::Local, head.span);
                    }
                } else {
                    for item in &import.items {
                        self.define(&item.node, SymbolKind::Local, item.span);
                    }
                }
            }
            Stmt::Pass => {}
        }
    }

    /// Bind an assignment target name: the first assignment declares, later
    /// assignments update the existing binding and must not touch a `final`
    /// one, wherever it lives on the scope chain.
    fn bind_name(&mut self, name: &Spanned<Ident>, is_final: bool) {
        if let Some(id) = self.symbols.lookup(&name.node) {
            if self.final_ids.contains(&id) {
                self.error(
                    Code::FinalReassignment,
                    format!("cannot reassign final binding '{}'", name.node),
                    name.span,
                );
            }
            return;
        }

        if let Ok(id) = self.symbols.define(&name.node, SymbolKind::Local, name.span) {
            if is_final {
                self.final_ids.insert(id);
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn check_expr(&mut self, expr: &Spanned<Expr>, ctx: Ctx<'_>) {
        match &expr.node {
            Expr::Ident(name) => {
                if self.symbols.lookup(name).is_none() {
                    self.undefined(name, expr.span);
                }
            }
            Expr::SelfExpr => match ctx {
                Ctx::Method => {}
                Ctx::Static { class } => self.error(
                    Code::StaticUsesSelf,
                    format!("static member of '{}' may not reference 'self'", class),
                    expr.span,
                ),
                Ctx::Plain => self.error(
                    Code::UndefinedName,
                    "'self' used outside of a method".to_string(),
                    expr.span,
                ),
            },
            Expr::Super(args) => {
                match ctx {
                    Ctx::Method => {}
                    Ctx::Static { class } => self.error(
                        Code::StaticUsesSelf,
                        format!("static member of '{}' may not reference 'super'", class),
                        expr.span,
                    ),
                    Ctx::Plain => self.error(
                        Code::UndefinedName,
                        "'super' used outside of a method".to_string(),
                        expr.span,
                    ),
                }
                for arg in args {
                    self.check_expr(arg, ctx);
                }
            }
            Expr::Call(callee, args) => {
                // Constructor calls on abstract classes are rejected here;
                // whether the class is otherwise valid does not matter.
                if let Expr::Ident(name) = &callee.node {
                    if self.graph.classes.get(name).is_some_and(|c| c.is_abstract()) {
                        self.diagnostics.push(
                            Diagnostic::error(
                                Code::AbstractInstantiation,
                                format!("cannot instantiate abstract class '{}'", name),
                                callee.span,
                            )
                            .with_note("derive a concrete class and instantiate that instead"),
                        );
                    }
                }
                self.check_expr(callee, ctx);
                for arg in args {
                    self.check_expr(arg, ctx);
                }
            }
            Expr::Attr(object, _) => {
                // Attribute names resolve dynamically against the object's
                // attribute bag or the class's static table at runtime.
                self.check_expr(object, ctx);
            }
            Expr::Index(object, index) => {
                self.check_expr(object, ctx);
                self.check_expr(index, ctx);
            }
            Expr::Slice(object, slice) => {
                self.check_expr(object, ctx);
                if let Some(start) = &slice.start {
                    self.check_expr(start, ctx);
                }
                if let Some(end) = &slice.end {
                    self.check_expr(end, ctx);
                }
            }
            Expr::Binary(left, _, right) => {
                self.check_expr(left, ctx);
                self.check_expr(right, ctx);
            }
            Expr::Unary(_, operand) => self.check_expr(operand, ctx),
            Expr::Paren(inner) => self.check_expr(inner, ctx),
            Expr::List(elems) | Expr::Tuple(elems) => {
                for elem in elems {
                    self.check_expr(elem, ctx);
                }
            }
            Expr::Dict(entries) => {
                for (key, value) in entries {
                    self.check_expr(key, ctx);
                    self.check_expr(value, ctx);
                }
            }
            Expr::FString(parts) => {
                // Interior expressions evaluate in the enclosing scope.
                for part in parts {
                    if let FStringPart::Expr { expr, .. } = part {
                        self.check_expr(expr, ctx);
                    }
                }
            }
            Expr::Literal(_) => {}
        }
    }

    fn undefined(&mut self, name: &str, span: Span) {
        self.error(
            Code::UndefinedName,
            format!("name '{}' is not defined", name),
            span,
        );
    }
}
