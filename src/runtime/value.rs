//! Runtime values for the Spy evaluator.
//!
//! Values are cheap to clone: collections and objects sit behind `Rc`, and
//! mutation goes through `RefCell`. Callables reference AST nodes borrowed
//! from the compilation, so every value carries the program lifetime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::frontend::ast::{FunctionDecl, MethodDecl};

/// Index into the interpreter's class registry.
pub type ClassId = usize;
/// Index into the interpreter's interface registry.
pub type InterfaceId = usize;

/// Built-in functions callable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Range,
    Hasattr,
    Isinstance,
    Sum,
    Str,
    Int,
    Float,
    Bool,
    ValueError,
    TypeError,
    NotImplementedError,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Range => "range",
            Builtin::Hasattr => "hasattr",
            Builtin::Isinstance => "isinstance",
            Builtin::Sum => "sum",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::ValueError => "ValueError",
            Builtin::TypeError => "TypeError",
            Builtin::NotImplementedError => "NotImplementedError",
        }
    }

    pub fn all() -> &'static [Builtin] {
        &[
            Builtin::Print,
            Builtin::Len,
            Builtin::Range,
            Builtin::Hasattr,
            Builtin::Isinstance,
            Builtin::Sum,
            Builtin::Str,
            Builtin::Int,
            Builtin::Float,
            Builtin::Bool,
            Builtin::ValueError,
            Builtin::TypeError,
            Builtin::NotImplementedError,
        ]
    }
}

/// An instance: attribute bag plus a back-pointer to its class descriptor.
#[derive(Debug)]
pub struct ObjectData<'p> {
    pub class: ClassId,
    pub attrs: RefCell<HashMap<String, Value<'p>>>,
}

/// An exception value produced by `ValueError(...)` and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionData {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum Value<'p> {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value<'p>>>>),
    Tuple(Rc<Vec<Value<'p>>>),
    Dict(Rc<RefCell<Vec<(Value<'p>, Value<'p>)>>>),
    Range {
        start: i64,
        end: i64,
        step: i64,
    },
    Object(Rc<ObjectData<'p>>),
    /// A class used as a value (constructor calls, static access, isinstance)
    Class(ClassId),
    /// An interface used as a value (isinstance)
    Interface(InterfaceId),
    Function(&'p FunctionDecl),
    BoundMethod {
        recv: Rc<ObjectData<'p>>,
        class: ClassId,
        method: &'p MethodDecl,
    },
    StaticMethod {
        class: ClassId,
        method: &'p MethodDecl,
    },
    Builtin(Builtin),
    Exception(Rc<ExceptionData>),
}

impl<'p> Value<'p> {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value<'p>>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Python-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Range { start, end, step } => {
                if *step >= 0 {
                    start < end
                } else {
                    start > end
                }
            }
            _ => true,
        }
    }

    /// The type name shown in runtime error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range { .. } => "range",
            Value::Object(_) => "object",
            Value::Class(_) => "class",
            Value::Interface(_) => "interface",
            Value::Function(_) => "function",
            Value::BoundMethod { .. } => "method",
            Value::StaticMethod { .. } => "method",
            Value::Builtin(_) => "builtin",
            Value::Exception(_) => "exception",
        }
    }

    /// Structural equality for `==`; reference identity for objects.
    pub fn eq_value(&self, other: &Value<'p>) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_value(y))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_value(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.eq_value(k2) && v.eq_value(v2))
                    })
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Interface(a), Value::Interface(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            _ => false,
        }
    }

    /// Identity for `is`: references compare by pointer, scalars by value.
    pub fn is_identical(&self, other: &Value<'p>) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => self.eq_value(other),
        }
    }
}

impl fmt::Display for Value<'_> {
    /// `str()`-style rendering: plain for scalars and strings, `repr`-style
    /// for collection elements.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Repr(item))?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Repr(item))?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", Repr(k), Repr(v))?;
                }
                write!(f, "}}")
            }
            Value::Range { start, end, step } => {
                if *step == 1 {
                    write!(f, "range({}, {})", start, end)
                } else {
                    write!(f, "range({}, {}, {})", start, end, step)
                }
            }
            Value::Object(obj) => write!(f, "<object #{}>", obj.class),
            Value::Class(_) => write!(f, "<class>"),
            Value::Interface(_) => write!(f, "<interface>"),
            Value::Function(func) => write!(f, "<function {}>", func.name.node),
            Value::BoundMethod { method, .. } => write!(f, "<method {}>", method.name.node),
            Value::StaticMethod { method, .. } => write!(f, "<static method {}>", method.name.node),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name()),
            Value::Exception(exc) => write!(f, "{}: {}", exc.kind, exc.message),
        }
    }
}

/// `repr`-style view: strings quoted, everything else as `Display`.
struct Repr<'a, 'p>(&'a Value<'p>);

impl fmt::Display for Repr<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Str(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Render a float the way Python's `str()` does for the common cases:
/// integral values keep one fractional digit.
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::list(vec![Value::Int(1)]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_kinds() {
        assert!(Value::Int(2).eq_value(&Value::Float(2.0)));
        assert!(!Value::Int(2).eq_value(&Value::Float(2.5)));
    }

    #[test]
    fn test_display_collections() {
        let list = Value::list(vec![Value::Int(1), Value::str("a"), Value::Float(2.0)]);
        assert_eq!(list.to_string(), "[1, 'a', 2.0]");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(78.5398), "78.5398");
    }

    #[test]
    fn test_object_identity() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        assert!(a.eq_value(&b));
        assert!(!a.is_identical(&b));
        let c = a.clone();
        assert!(a.is_identical(&c));
    }
}
