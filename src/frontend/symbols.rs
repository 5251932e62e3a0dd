//! Symbol table and scope management for Spy
//!
//! Tracks named entities (interfaces, classes, functions, params, locals)
//! across lexical scopes. The top-level scope holds type declarations and
//! free functions; each class introduces a member scope and each method a
//! parameter/local scope. References resolve by walking scopes outward.

use std::collections::HashMap;

use crate::frontend::ast::Span;

/// Unique identifier for symbols
pub type SymbolId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Interface,
    Class,
    Function,
    Method,
    Field,
    StaticMember,
    Param,
    Local,
    /// Predefined name (builtin function or exception type)
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
}

#[derive(Debug)]
struct Scope {
    parent: Option<usize>,
    kind: ScopeKind,
    names: HashMap<String, SymbolId>,
}

impl Scope {
    fn new(parent: Option<usize>, kind: ScopeKind) -> Self {
        Self {
            parent,
            kind,
            names: HashMap::new(),
        }
    }
}

/// Names every Spy program can reference without declaring.
pub const BUILTINS: &[&str] = &[
    "print",
    "len",
    "range",
    "hasattr",
    "isinstance",
    "sum",
    "str",
    "int",
    "float",
    "bool",
    "ValueError",
    "TypeError",
    "NotImplementedError",
];

/// Symbol table managing all named entities
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    current_scope: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            symbols: Vec::new(),
            scopes: vec![Scope::new(None, ScopeKind::Module)],
            current_scope: 0,
        };

        for name in BUILTINS {
            // Builtins never collide with a fresh table.
            let _ = table.define(name, SymbolKind::Builtin, Span::default());
        }
        table
    }

    /// Define a name in the current scope.
    ///
    /// Returns `Err` with the previously defined symbol when the name is
    /// already taken in this scope (duplicate declaration).
    pub fn define(&mut self, name: &str, kind: SymbolKind, span: Span) -> Result<SymbolId, SymbolId> {
        if let Some(&existing) = self.scopes[self.current_scope].names.get(name) {
            return Err(existing);
        }

        let id = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            span,
        });
        self.scopes[self.current_scope].names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Resolve a name by walking scopes outward from the current one.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut scope = Some(self.current_scope);
        while let Some(idx) = scope {
            if let Some(&id) = self.scopes[idx].names.get(name) {
                return Some(id);
            }
            scope = self.scopes[idx].parent;
        }
        None
    }

    /// Resolve a name in the current scope only.
    pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.scopes[self.current_scope].names.get(name).copied()
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) {
        let scope = Scope::new(Some(self.current_scope), kind);
        self.scopes.push(scope);
        self.current_scope = self.scopes.len() - 1;
    }

    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current_scope].parent {
            self.current_scope = parent;
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup() {
        let mut table = SymbolTable::new();
        let id = table.define("Shape", SymbolKind::Class, Span::default()).unwrap();
        assert_eq!(table.lookup("Shape"), Some(id));
        assert_eq!(table.get(id).unwrap().kind, SymbolKind::Class);
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut table = SymbolTable::new();
        let first = table.define("f", SymbolKind::Function, Span::default()).unwrap();
        let err = table.define("f", SymbolKind::Function, Span::default()).unwrap_err();
        assert_eq!(err, first);
    }

    #[test]
    fn test_shadowing_in_inner_scope() {
        let mut table = SymbolTable::new();
        let outer = table.define("x", SymbolKind::Local, Span::default()).unwrap();
        table.enter_scope(ScopeKind::Function);
        let inner = table.define("x", SymbolKind::Param, Span::default()).unwrap();
        assert_eq!(table.lookup("x"), Some(inner));
        table.exit_scope();
        assert_eq!(table.lookup("x"), Some(outer));
    }

    #[test]
    fn test_builtins_resolve() {
        let table = SymbolTable::new();
        assert!(table.lookup("print").is_some());
        assert!(table.lookup("isinstance").is_some());
        assert!(table.lookup("ValueError").is_some());
    }
}
