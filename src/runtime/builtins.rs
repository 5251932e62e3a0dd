//! Built-in functions, native methods on primitive values, and the binary
//! operator table.

use std::io::Write;
use std::rc::Rc;

use crate::frontend::ast::{BinaryOp, Span};
use crate::frontend::diagnostics::Code;

use super::interp::{Exec, Flow, Interpreter, SpyError};
use super::value::{Builtin, ExceptionData, Value};

fn raise<'p, T>(code: Code, message: impl Into<String>, span: Span) -> Exec<'p, T> {
    Err(Flow::Raise(SpyError {
        code,
        message: message.into(),
        span,
    }))
}

fn arity<'p>(name: &str, expected: &str, got: usize, span: Span) -> Flow<'p> {
    Flow::Raise(SpyError {
        code: Code::TypeError,
        message: format!("{}() takes {} argument(s) but {} were given", name, expected, got),
        span,
    })
}

impl<'p, 'out> Interpreter<'p, 'out> {
    pub(super) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value<'p>>,
        span: Span,
    ) -> Exec<'p, Value<'p>> {
        match builtin {
            Builtin::Print => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                let _ = writeln!(self.out, "{}", rendered.join(" "));
                Ok(Value::None)
            }
            Builtin::Len => {
                let [value] = one("len", args, span)?;
                let len = match &value {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Dict(entries) => entries.borrow().len(),
                    Value::Range { start, end, step } => range_len(*start, *end, *step),
                    other => {
                        return raise(
                            Code::TypeError,
                            format!("object of type '{}' has no len()", other.type_name()),
                            span,
                        )
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Builtin::Range => {
                let ints: Vec<i64> = args
                    .iter()
                    .map(|a| match a {
                        Value::Int(v) => Ok(*v),
                        other => Err(arity_type("range", other, span)),
                    })
                    .collect::<Result<_, _>>()?;
                let (start, end, step) = match ints.as_slice() {
                    [end] => (0, *end, 1),
                    [start, end] => (*start, *end, 1),
                    [start, end, step] => (*start, *end, *step),
                    _ => return Err(arity("range", "1 to 3", args.len(), span)),
                };
                if step == 0 {
                    return raise(Code::ValueError, "range() step must not be zero", span);
                }
                Ok(Value::Range { start, end, step })
            }
            Builtin::Hasattr => {
                let [value, name] = two("hasattr", args, span)?;
                let Value::Str(name) = name else {
                    return raise(Code::TypeError, "hasattr() attribute name must be a string", span);
                };
                Ok(Value::Bool(self.has_attr(&value, &name)))
            }
            Builtin::Isinstance => {
                let [value, ty] = two("isinstance", args, span)?;
                self.isinstance(&value, &ty, span).map(Value::Bool)
            }
            Builtin::Sum => {
                let [value] = one("sum", args, span)?;
                let items = self.iterate(value, span)?;
                let mut int_total: i64 = 0;
                let mut float_total: f64 = 0.0;
                let mut saw_float = false;
                for item in items {
                    match item {
                        Value::Int(v) => {
                            int_total += v;
                            float_total += v as f64;
                        }
                        Value::Float(v) => {
                            saw_float = true;
                            float_total += v;
                        }
                        other => {
                            return raise(
                                Code::TypeError,
                                format!("sum() cannot add '{}'", other.type_name()),
                                span,
                            )
                        }
                    }
                }
                Ok(if saw_float {
                    Value::Float(float_total)
                } else {
                    Value::Int(int_total)
                })
            }
            Builtin::Str => {
                let [value] = one("str", args, span)?;
                Ok(Value::str(value.to_string()))
            }
            Builtin::Int => {
                let [value] = one("int", args, span)?;
                match value {
                    Value::Int(v) => Ok(Value::Int(v)),
                    Value::Float(v) => Ok(Value::Int(v.trunc() as i64)),
                    Value::Bool(v) => Ok(Value::Int(v as i64)),
                    Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).or_else(|_| {
                        raise(
                            Code::ValueError,
                            format!("invalid literal for int(): '{}'", s),
                            span,
                        )
                    }),
                    other => raise(
                        Code::TypeError,
                        format!("int() argument must be a number or string, not '{}'", other.type_name()),
                        span,
                    ),
                }
            }
            Builtin::Float => {
                let [value] = one("float", args, span)?;
                match value {
                    Value::Int(v) => Ok(Value::Float(v as f64)),
                    Value::Float(v) => Ok(Value::Float(v)),
                    Value::Bool(v) => Ok(Value::Float(v as i64 as f64)),
                    Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).or_else(|_| {
                        raise(
                            Code::ValueError,
                            format!("could not convert string to float: '{}'", s),
                            span,
                        )
                    }),
                    other => raise(
                        Code::TypeError,
                        format!("float() argument must be a number or string, not '{}'", other.type_name()),
                        span,
                    ),
                }
            }
            Builtin::Bool => {
                let [value] = one("bool", args, span)?;
                Ok(Value::Bool(value.is_truthy()))
            }
            Builtin::ValueError | Builtin::TypeError | Builtin::NotImplementedError => {
                let message = match args.as_slice() {
                    [] => String::new(),
                    [value] => value.to_string(),
                    _ => return Err(arity(builtin.name(), "at most 1", args.len(), span)),
                };
                Ok(Value::Exception(Rc::new(ExceptionData {
                    kind: builtin.name(),
                    message,
                })))
            }
        }
    }

    /// Non-raising attribute probe backing `hasattr`.
    fn has_attr(&self, value: &Value<'p>, name: &str) -> bool {
        match value {
            Value::Object(obj) => {
                obj.attrs.borrow().contains_key(name)
                    || self.classes[obj.class]
                        .mro
                        .iter()
                        .any(|&id| {
                            self.classes[id].methods.contains_key(name)
                                || self.classes[id].statics.contains_key(name)
                                || self.classes[id].static_fields.borrow().contains_key(name)
                        })
            }
            Value::Class(class_id) => self.classes[*class_id].mro.iter().any(|&id| {
                self.classes[id].statics.contains_key(name)
                    || self.classes[id].static_fields.borrow().contains_key(name)
            }),
            Value::Exception(_) => name == "message",
            _ => false,
        }
    }

    /// `isinstance` against a class, an interface, or a builtin type
    /// constructor. Interface conformance was proven statically, so this is
    /// a set lookup on the class descriptor.
    fn isinstance(&self, value: &Value<'p>, ty: &Value<'p>, span: Span) -> Exec<'p, bool> {
        match ty {
            Value::Class(class_id) => Ok(match value {
                Value::Object(obj) => self.classes[obj.class].mro.contains(class_id),
                _ => false,
            }),
            Value::Interface(iface_id) => {
                let iface_name = &self.interfaces[*iface_id];
                Ok(match value {
                    Value::Object(obj) => self.classes[obj.class].implements.contains(iface_name),
                    _ => false,
                })
            }
            Value::Builtin(Builtin::Str) => Ok(matches!(value, Value::Str(_))),
            Value::Builtin(Builtin::Int) => Ok(matches!(value, Value::Int(_))),
            Value::Builtin(Builtin::Float) => Ok(matches!(value, Value::Float(_))),
            Value::Builtin(Builtin::Bool) => Ok(matches!(value, Value::Bool(_))),
            other => raise(
                Code::TypeError,
                format!(
                    "isinstance() second argument must be a type, not '{}'",
                    other.type_name()
                ),
                span,
            ),
        }
    }

    // ========================================================================
    // Native methods on primitives
    // ========================================================================

    pub(super) fn call_native_method(
        &mut self,
        object: Value<'p>,
        name: &str,
        args: Vec<Value<'p>>,
        span: Span,
    ) -> Exec<'p, Value<'p>> {
        match &object {
            Value::Str(s) => match (name, args.as_slice()) {
                ("lower", []) => Ok(Value::str(s.to_lowercase())),
                ("upper", []) => Ok(Value::str(s.to_uppercase())),
                ("strip", []) => Ok(Value::str(s.trim())),
                ("split", []) => Ok(Value::list(
                    s.split_whitespace().map(Value::str).collect(),
                )),
                ("split", [Value::Str(sep)]) => Ok(Value::list(
                    s.split(sep.as_ref()).map(Value::str).collect(),
                )),
                _ => no_such_method("str", name, span),
            },
            Value::List(items) => match (name, args.as_slice()) {
                ("append", [value]) => {
                    items.borrow_mut().push(value.clone());
                    Ok(Value::None)
                }
                ("remove", [value]) => {
                    let mut items = items.borrow_mut();
                    match items.iter().position(|item| item.eq_value(value)) {
                        Some(pos) => {
                            items.remove(pos);
                            Ok(Value::None)
                        }
                        None => raise(Code::ValueError, "list.remove(x): x not in list", span),
                    }
                }
                ("copy", []) => Ok(Value::list(items.borrow().clone())),
                _ => no_such_method("list", name, span),
            },
            Value::Dict(entries) => match (name, args.as_slice()) {
                ("copy", []) => Ok(Value::Dict(Rc::new(std::cell::RefCell::new(
                    entries.borrow().clone(),
                )))),
                _ => no_such_method("dict", name, span),
            },
            other => no_such_method(other.type_name(), name, span),
        }
    }

    // ========================================================================
    // Binary operators
    // ========================================================================

    pub(super) fn binary_op(
        &mut self,
        op: BinaryOp,
        lhs: Value<'p>,
        rhs: Value<'p>,
        span: Span,
    ) -> Exec<'p, Value<'p>> {
        match op {
            BinaryOp::Add => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
                (Value::List(a), Value::List(b)) => {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Ok(Value::list(items))
                }
                _ => self.numeric_op(op, lhs, rhs, span, |a, b| a + b),
            },
            BinaryOp::Sub => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
                _ => self.numeric_op(op, lhs, rhs, span, |a, b| a - b),
            },
            BinaryOp::Mul => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
                _ => self.numeric_op(op, lhs, rhs, span, |a, b| a * b),
            },
            BinaryOp::Div => match (&lhs, &rhs) {
                (_, Value::Int(0)) => raise(Code::ZeroDivision, "division by zero", span),
                (_, Value::Float(b)) if *b == 0.0 => {
                    raise(Code::ZeroDivision, "float division by zero", span)
                }
                // `/` always yields a float, like Python 3.
                _ => self.numeric_op(op, lhs, rhs, span, |a, b| a / b),
            },
            BinaryOp::Mod => match (&lhs, &rhs) {
                (_, Value::Int(0)) => raise(Code::ZeroDivision, "modulo by zero", span),
                (_, Value::Float(b)) if *b == 0.0 => raise(Code::ZeroDivision, "modulo by zero", span),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.rem_euclid(*b))),
                _ => self.numeric_op(op, lhs, rhs, span, |a, b| a - b * (a / b).floor()),
            },
            BinaryOp::Pow => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) if *b >= 0 => {
                    match u32::try_from(*b).ok().and_then(|exp| a.checked_pow(exp)) {
                        Some(v) => Ok(Value::Int(v)),
                        None => Ok(Value::Float((*a as f64).powf(*b as f64))),
                    }
                }
                _ => self.numeric_op(op, lhs, rhs, span, |a, b| a.powf(b)),
            },
            BinaryOp::Eq => Ok(Value::Bool(lhs.eq_value(&rhs))),
            BinaryOp::NotEq => Ok(Value::Bool(!lhs.eq_value(&rhs))),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                self.compare(op, lhs, rhs, span)
            }
            BinaryOp::In => self.contains(&rhs, &lhs, span).map(Value::Bool),
            BinaryOp::NotIn => self.contains(&rhs, &lhs, span).map(|b| Value::Bool(!b)),
            BinaryOp::Is => Ok(Value::Bool(lhs.is_identical(&rhs))),
            BinaryOp::IsNot => Ok(Value::Bool(!lhs.is_identical(&rhs))),
            // Short-circuit forms are handled before operand evaluation.
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops evaluated eagerly"),
        }
    }

    /// Numeric fallback: promote to float when either side is a float.
    fn numeric_op(
        &mut self,
        op: BinaryOp,
        lhs: Value<'p>,
        rhs: Value<'p>,
        span: Span,
        apply: impl Fn(f64, f64) -> f64,
    ) -> Exec<'p, Value<'p>> {
        match (as_float(&lhs), as_float(&rhs)) {
            (Some(a), Some(b)) => Ok(Value::Float(apply(a, b))),
            _ => raise(
                Code::TypeError,
                format!(
                    "unsupported operand types for {}: '{}' and '{}'",
                    op,
                    lhs.type_name(),
                    rhs.type_name()
                ),
                span,
            ),
        }
    }

    fn compare(&mut self, op: BinaryOp, lhs: Value<'p>, rhs: Value<'p>, span: Span) -> Exec<'p, Value<'p>> {
        let ordering = match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => match (as_float(&lhs), as_float(&rhs)) {
                (Some(a), Some(b)) => match a.partial_cmp(&b) {
                    Some(ord) => ord,
                    None => return Ok(Value::Bool(false)),
                },
                _ => {
                    return raise(
                        Code::TypeError,
                        format!(
                            "'{}' not supported between '{}' and '{}'",
                            op,
                            lhs.type_name(),
                            rhs.type_name()
                        ),
                        span,
                    )
                }
            },
        };

        let result = match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::LtEq => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            _ => ordering.is_ge(),
        };
        Ok(Value::Bool(result))
    }

    /// Membership for `in`: collections by element equality, strings by
    /// substring, dicts by key.
    fn contains(&mut self, haystack: &Value<'p>, needle: &Value<'p>, span: Span) -> Exec<'p, bool> {
        match haystack {
            Value::List(items) => Ok(items.borrow().iter().any(|item| item.eq_value(needle))),
            Value::Tuple(items) => Ok(items.iter().any(|item| item.eq_value(needle))),
            Value::Dict(entries) => Ok(entries.borrow().iter().any(|(k, _)| k.eq_value(needle))),
            Value::Str(s) => match needle {
                Value::Str(sub) => Ok(s.contains(sub.as_ref())),
                other => raise(
                    Code::TypeError,
                    format!("'in <str>' requires a string, not '{}'", other.type_name()),
                    span,
                ),
            },
            Value::Range { start, end, step } => Ok(match needle {
                Value::Int(v) => {
                    if *step > 0 {
                        v >= start && v < end && (v - start) % step == 0
                    } else {
                        v <= start && v > end && (start - v) % -step == 0
                    }
                }
                _ => false,
            }),
            other => raise(
                Code::TypeError,
                format!("'{}' is not a container", other.type_name()),
                span,
            ),
        }
    }
}

fn as_float(value: &Value<'_>) -> Option<f64> {
    match value {
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        _ => None,
    }
}

fn range_len(start: i64, end: i64, step: i64) -> usize {
    if step > 0 && end > start {
        ((end - start + step - 1) / step) as usize
    } else if step < 0 && end < start {
        ((start - end - step - 1) / -step) as usize
    } else {
        0
    }
}

fn no_such_method<'p, T>(type_name: &str, method: &str, span: Span) -> Exec<'p, T> {
    raise(
        Code::AttributeError,
        format!("'{}' object has no method '{}'", type_name, method),
        span,
    )
}

fn arity_type<'p>(name: &str, value: &Value<'p>, span: Span) -> Flow<'p> {
    Flow::Raise(SpyError {
        code: Code::TypeError,
        message: format!("{}() arguments must be integers, not '{}'", name, value.type_name()),
        span,
    })
}

fn one<'p>(name: &str, args: Vec<Value<'p>>, span: Span) -> Exec<'p, [Value<'p>; 1]> {
    <[Value<'p>; 1]>::try_from(args).map_err(|args| arity(name, "1", args.len(), span))
}

fn two<'p>(name: &str, args: Vec<Value<'p>>, span: Span) -> Exec<'p, [Value<'p>; 2]> {
    <[Value<'p>; 2]>::try_from(args).map_err(|args| arity(name, "2", args.len(), span))
}
