//! Tree-walking evaluator for checked Spy programs.
//!
//! The interpreter consumes the AST together with the checker's type graph:
//! class descriptors are built once from the graph (MRO, implements closure,
//! static tables), and dynamic dispatch walks the precomputed chain. The
//! modifier checker has already proven conformance, so there are no per-call
//! interface probes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::rc::Rc;

use crate::frontend::ast::*;
use crate::frontend::checker::TypeGraph;
use crate::frontend::diagnostics::Code;

use super::value::{Builtin, ClassId, InterfaceId, ObjectData, Value};

/// Maximum evaluator call depth; recursion past this raises instead of
/// overflowing the native stack.
const MAX_CALL_DEPTH: usize = 500;

/// A runtime failure: carries a stable code, a message, and the span of the
/// originating expression so uncaught exceptions print like diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SpyError {
    pub code: Code,
    pub message: String,
    pub span: Span,
}

/// Non-local control flow during execution.
pub enum Flow<'p> {
    Return(Value<'p>),
    Raise(SpyError),
}

pub type Exec<'p, T> = Result<T, Flow<'p>>;

fn raise<'p, T>(code: Code, message: impl Into<String>, span: Span) -> Exec<'p, T> {
    Err(Flow::Raise(SpyError {
        code,
        message: message.into(),
        span,
    }))
}

/// Runtime class descriptor, built from the type graph and the AST.
pub(super) struct ClassRt<'p> {
    pub name: String,
    pub is_abstract: bool,
    pub parent: Option<ClassId>,
    pub constructor: Option<&'p MethodDecl>,
    /// Instance methods declared directly on this class
    pub methods: HashMap<&'p str, &'p MethodDecl>,
    /// Static methods, resolved through the class name
    pub statics: HashMap<&'p str, &'p MethodDecl>,
    /// Static fields live on the descriptor and are initialized at
    /// descriptor-construction time
    pub static_fields: RefCell<HashMap<String, Value<'p>>>,
    /// Static field initializers, in declaration order
    pub static_field_inits: Vec<(&'p str, &'p Spanned<Expr>)>,
    /// Instance field initializers, evaluated per instantiation
    pub instance_fields: Vec<(&'p str, &'p Spanned<Expr>)>,
    /// Linearized ancestry, this class first
    pub mro: Vec<ClassId>,
    /// Transitive implemented-interface names, for O(1) isinstance
    pub implements: HashSet<String>,
}

/// One call frame: locals plus the method context (receiver and defining
/// class) when executing inside a method.
pub(super) struct Frame<'p> {
    locals: HashMap<String, Value<'p>>,
    ctx: Option<MethodCtx<'p>>,
    /// The module frame writes through to globals
    is_module: bool,
}

#[derive(Clone)]
pub(super) struct MethodCtx<'p> {
    recv: Rc<ObjectData<'p>>,
    /// The class that *defines* the currently executing method; `super`
    /// starts its search above this class, not above the receiver's.
    class: ClassId,
}

impl<'p> Frame<'p> {
    fn module() -> Self {
        Frame {
            locals: HashMap::new(),
            ctx: None,
            is_module: true,
        }
    }

    fn call(locals: HashMap<String, Value<'p>>, ctx: Option<MethodCtx<'p>>) -> Self {
        Frame {
            locals,
            ctx,
            is_module: false,
        }
    }
}

pub struct Interpreter<'p, 'out> {
    pub(super) classes: Vec<ClassRt<'p>>,
    pub(super) class_ids: HashMap<String, ClassId>,
    pub(super) interfaces: Vec<String>,
    pub(super) interface_ids: HashMap<String, InterfaceId>,
    pub(super) globals: HashMap<String, Value<'p>>,
    pub(super) out: &'out mut dyn Write,
    depth: usize,
}

/// Execute a checked program, writing `print` output to `out`.
#[tracing::instrument(skip_all, fields(item_count = program.items.len()))]
pub fn run<'p>(
    program: &'p Program,
    graph: &'p TypeGraph,
    out: &mut dyn Write,
) -> Result<(), SpyError> {
    let mut interp = Interpreter::new(program, graph, out)?;
    interp.exec_program(program)
}

impl<'p, 'out> Interpreter<'p, 'out> {
    pub fn new(
        program: &'p Program,
        graph: &'p TypeGraph,
        out: &'out mut dyn Write,
    ) -> Result<Self, SpyError> {
        let mut interp = Interpreter {
            classes: Vec::new(),
            class_ids: HashMap::new(),
            interfaces: Vec::new(),
            interface_ids: HashMap::new(),
            globals: HashMap::new(),
            out,
            depth: 0,
        };
        interp.build_registry(program, graph);

        // Static fields initialize at descriptor-construction time.
        let mut frame = Frame::module();
        for class_id in 0..interp.classes.len() {
            let inits = interp.classes[class_id].static_field_inits.clone();
            for (name, init) in inits {
                let value = match interp.eval(init, &mut frame) {
                    Ok(v) => v,
                    Err(Flow::Raise(e)) => return Err(e),
                    Err(Flow::Return(_)) => unreachable!("return outside function"),
                };
                interp.classes[class_id]
                    .static_fields
                    .borrow_mut()
                    .insert(name.to_string(), value);
            }
        }

        Ok(interp)
    }

    fn build_registry(&mut self, program: &'p Program, graph: &'p TypeGraph) {
        // Interfaces first: plain identity records.
        for item in &program.items {
            if let Item::Interface(iface) = &item.node {
                if graph.is_interface(&iface.name.node)
                    && !self.interface_ids.contains_key(&iface.name.node)
                {
                    let id = self.interfaces.len();
                    self.interfaces.push(iface.name.node.clone());
                    self.interface_ids.insert(iface.name.node.clone(), id);
                    self.globals.insert(iface.name.node.clone(), Value::Interface(id));
                }
            }
        }

        // Classes: descriptor per declaration, linked up afterwards.
        for item in &program.items {
            let Item::Class(class) = &item.node else { continue };
            let Some(info) = graph.classes.get(&class.name.node) else {
                continue;
            };
            if self.class_ids.contains_key(&class.name.node) {
                continue;
            }

            let mut rt = ClassRt {
                name: class.name.node.clone(),
                is_abstract: info.is_abstract(),
                parent: None,
                constructor: None,
                methods: HashMap::new(),
                statics: HashMap::new(),
                static_fields: RefCell::new(HashMap::new()),
                static_field_inits: Vec::new(),
                instance_fields: Vec::new(),
                mro: Vec::new(),
                implements: info.implements_closure.iter().cloned().collect(),
            };

            for member in &class.members {
                match &member.node {
                    Member::Method(method) => {
                        if method.is_constructor() {
                            rt.constructor = Some(method);
                        } else if method.modifiers.is_static() {
                            rt.statics.insert(method.name.node.as_str(), method);
                        } else {
                            rt.methods.insert(method.name.node.as_str(), method);
                        }
                    }
                    Member::Field(field) => {
                        if field.modifiers.is_static() {
                            rt.static_field_inits
                                .push((field.name.node.as_str(), &field.value));
                        } else {
                            rt.instance_fields
                                .push((field.name.node.as_str(), &field.value));
                        }
                    }
                }
            }

            let id = self.classes.len();
            self.classes.push(rt);
            self.class_ids.insert(class.name.node.clone(), id);
            self.globals.insert(class.name.node.clone(), Value::Class(id));
        }

        // Resolve parent links and MROs now that every id exists.
        for (name, &id) in &self.class_ids {
            let info = &graph.classes[name];
            self.classes[id].parent = info.parent.as_ref().and_then(|p| self.class_ids.get(p)).copied();
            self.classes[id].mro = info
                .mro
                .iter()
                .filter_map(|n| self.class_ids.get(n))
                .copied()
                .collect();
        }

        // Free functions and builtins complete the module scope.
        for item in &program.items {
            if let Item::Function(func) = &item.node {
                self.globals
                    .entry(func.name.node.clone())
                    .or_insert(Value::Function(func));
            }
        }
        for builtin in Builtin::all() {
            self.globals
                .entry(builtin.name().to_string())
                .or_insert(Value::Builtin(*builtin));
        }
    }

    fn exec_program(&mut self, program: &'p Program) -> Result<(), SpyError> {
        let mut frame = Frame::module();
        for item in &program.items {
            if let Item::Stmt(stmt) = &item.node {
                match self.exec_stmt(stmt, &mut frame) {
                    Ok(()) => {}
                    Err(Flow::Raise(e)) => return Err(e),
                    Err(Flow::Return(_)) => {
                        return Err(SpyError {
                            code: Code::TypeError,
                            message: "'return' outside of a function".to_string(),
                            span: Span::default(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_block(&mut self, stmts: &'p [Spanned<Stmt>], frame: &mut Frame<'p>) -> Exec<'p, ()> {
        for stmt in stmts {
            self.exec_stmt(&stmt.node, frame)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &'p Stmt, frame: &mut Frame<'p>) -> Exec<'p, ()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
                Ok(())
            }
            Stmt::Assign(assign) => {
                let value = self.eval(&assign.value, frame)?;
                self.assign(&assign.target, value, frame)
            }
            Stmt::Compound(compound) => {
                let current = self.read_target(&compound.target, frame)?;
                let rhs = self.eval(&compound.value, frame)?;
                let span = compound.value.span;
                let updated = self.binary_op(compound.op, current, rhs, span)?;
                self.assign(&compound.target, updated, frame)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::None,
                };
                Err(Flow::Return(value))
            }
            Stmt::Raise(expr) => {
                let value = self.eval(expr, frame)?;
                match value {
                    Value::Exception(exc) => raise(
                        exception_code(exc.kind),
                        exc.message.clone(),
                        expr.span,
                    ),
                    Value::Builtin(b)
                        if matches!(
                            b,
                            Builtin::ValueError | Builtin::TypeError | Builtin::NotImplementedError
                        ) =>
                    {
                        raise(exception_code(b.name()), b.name().to_string(), expr.span)
                    }
                    other => raise(
                        Code::TypeError,
                        format!("cannot raise a value of type '{}'", other.type_name()),
                        expr.span,
                    ),
                }
            }
            Stmt::Pass | Stmt::Import(_) => Ok(()),
            Stmt::If(if_stmt) => {
                if self.eval(&if_stmt.cond, frame)?.is_truthy() {
                    return self.exec_block(&if_stmt.then_body, frame);
                }
                for (cond, body) in &if_stmt.elif_branches {
                    if self.eval(cond, frame)?.is_truthy() {
                        return self.exec_block(body, frame);
                    }
                }
                if let Some(body) = &if_stmt.else_body {
                    return self.exec_block(body, frame);
                }
                Ok(())
            }
            Stmt::While(while_stmt) => {
                while self.eval(&while_stmt.cond, frame)?.is_truthy() {
                    self.exec_block(&while_stmt.body, frame)?;
                }
                Ok(())
            }
            Stmt::For(for_stmt) => {
                let iterable = self.eval(&for_stmt.iter, frame)?;
                let items = self.iterate(iterable, for_stmt.iter.span)?;
                for item in items {
                    self.write_name(&for_stmt.var.node, item, frame);
                    self.exec_block(&for_stmt.body, frame)?;
                }
                Ok(())
            }
        }
    }

    fn assign(
        &mut self,
        target: &'p AssignTarget,
        value: Value<'p>,
        frame: &mut Frame<'p>,
    ) -> Exec<'p, ()> {
        match target {
            AssignTarget::Name(name) => {
                self.write_name(&name.node, value, frame);
                Ok(())
            }
            AssignTarget::Field { object, field } => {
                let object_value = self.eval(object, frame)?;
                self.set_attr(object_value, &field.node, value, field.span)
            }
            AssignTarget::Index { object, index } => {
                let object_value = self.eval(object, frame)?;
                let index_value = self.eval(index, frame)?;
                self.set_index(object_value, index_value, value, index.span)
            }
        }
    }

    fn read_target(&mut self, target: &'p AssignTarget, frame: &mut Frame<'p>) -> Exec<'p, Value<'p>> {
        match target {
            AssignTarget::Name(name) => self.read_name(&name.node, name.span, frame),
            AssignTarget::Field { object, field } => {
                let object_value = self.eval(object, frame)?;
                self.get_attr(object_value, &field.node, field.span)
            }
            AssignTarget::Index { object, index } => {
                let object_value = self.eval(object, frame)?;
                let index_value = self.eval(index, frame)?;
                self.get_index(object_value, index_value, index.span)
            }
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn read_name(&mut self, name: &str, span: Span, frame: &Frame<'p>) -> Exec<'p, Value<'p>> {
        if let Some(value) = frame.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        raise(
            Code::TypeError,
            format!("name '{}' is not defined", name),
            span,
        )
    }

    /// First write declares; later writes update the binding wherever it
    /// lives (locals, then globals).
    fn write_name(&mut self, name: &str, value: Value<'p>, frame: &mut Frame<'p>) {
        if frame.is_module {
            self.globals.insert(name.to_string(), value);
        } else if frame.locals.contains_key(name) {
            frame.locals.insert(name.to_string(), value);
        } else if self.globals.contains_key(name) {
            self.globals.insert(name.to_string(), value);
        } else {
            frame.locals.insert(name.to_string(), value);
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(super) fn eval(&mut self, expr: &'p Spanned<Expr>, frame: &mut Frame<'p>) -> Exec<'p, Value<'p>> {
        match &expr.node {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Int(v) => Value::Int(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::Bool(v) => Value::Bool(*v),
                Literal::Str(s) => Value::str(s.as_str()),
                Literal::None => Value::None,
            }),
            Expr::Ident(name) => self.read_name(name, expr.span, frame),
            Expr::SelfExpr => match &frame.ctx {
                Some(ctx) => Ok(Value::Object(ctx.recv.clone())),
                None => raise(Code::TypeError, "'self' outside of a method", expr.span),
            },
            Expr::Paren(inner) => self.eval(inner, frame),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, frame)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(v) => Ok(Value::Int(-v)),
                        Value::Float(v) => Ok(Value::Float(-v)),
                        other => raise(
                            Code::TypeError,
                            format!("bad operand type for unary -: '{}'", other.type_name()),
                            expr.span,
                        ),
                    },
                }
            }
            Expr::Binary(left, op, right) => {
                // `and`/`or` short-circuit and yield the deciding operand.
                match op {
                    BinaryOp::And => {
                        let lhs = self.eval(left, frame)?;
                        if !lhs.is_truthy() {
                            return Ok(lhs);
                        }
                        return self.eval(right, frame);
                    }
                    BinaryOp::Or => {
                        let lhs = self.eval(left, frame)?;
                        if lhs.is_truthy() {
                            return Ok(lhs);
                        }
                        return self.eval(right, frame);
                    }
                    _ => {}
                }
                let lhs = self.eval(left, frame)?;
                let rhs = self.eval(right, frame)?;
                self.binary_op(*op, lhs, rhs, expr.span)
            }
            Expr::List(elems) => {
                let mut items = Vec::with_capacity(elems.len());
                for elem in elems {
                    items.push(self.eval(elem, frame)?);
                }
                Ok(Value::list(items))
            }
            Expr::Tuple(elems) => {
                let mut items = Vec::with_capacity(elems.len());
                for elem in elems {
                    items.push(self.eval(elem, frame)?);
                }
                Ok(Value::Tuple(Rc::new(items)))
            }
            Expr::Dict(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key, frame)?;
                    let value = self.eval(value, frame)?;
                    out.push((key, value));
                }
                Ok(Value::Dict(Rc::new(RefCell::new(out))))
            }
            Expr::FString(parts) => self.render_fstring(parts, frame),
            Expr::Attr(object, name) => {
                let object_value = self.eval(object, frame)?;
                self.get_attr(object_value, &name.node, name.span)
            }
            Expr::Index(object, index) => {
                let object_value = self.eval(object, frame)?;
                let index_value = self.eval(index, frame)?;
                self.get_index(object_value, index_value, index.span)
            }
            Expr::Slice(object, slice) => {
                let object_value = self.eval(object, frame)?;
                let start = match &slice.start {
                    Some(e) => Some(self.expect_int(e, frame)?),
                    None => None,
                };
                let end = match &slice.end {
                    Some(e) => Some(self.expect_int(e, frame)?),
                    None => None,
                };
                self.get_slice(object_value, start, end, expr.span)
            }
            Expr::Super(args) => self.call_super_constructor(args, expr.span, frame),
            Expr::Call(callee, args) => self.eval_call(callee, args, expr.span, frame),
        }
    }

    fn expect_int(&mut self, expr: &'p Spanned<Expr>, frame: &mut Frame<'p>) -> Exec<'p, i64> {
        match self.eval(expr, frame)? {
            Value::Int(v) => Ok(v),
            other => raise(
                Code::TypeError,
                format!("slice indices must be integers, not '{}'", other.type_name()),
                expr.span,
            ),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn eval_call(
        &mut self,
        callee: &'p Spanned<Expr>,
        args: &'p [Spanned<Expr>],
        span: Span,
        frame: &mut Frame<'p>,
    ) -> Exec<'p, Value<'p>> {
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval(arg, frame)?);
        }

        if let Expr::Attr(object, name) = &callee.node {
            // `super().m(...)`: dispatch starts above the defining class.
            if let Expr::Super(inner) = &object.node {
                if !inner.is_empty() {
                    return raise(
                        Code::TypeError,
                        "'super' takes no arguments when used for method access",
                        object.span,
                    );
                }
                return self.call_super_method(&name.node, arg_values, span, frame);
            }

            let object_value = self.eval(object, frame)?;
            return self.call_method(object_value, &name.node, arg_values, span);
        }

        let callee_value = self.eval(callee, frame)?;
        self.call_value(callee_value, arg_values, span)
    }

    pub(super) fn call_value(
        &mut self,
        callee: Value<'p>,
        args: Vec<Value<'p>>,
        span: Span,
    ) -> Exec<'p, Value<'p>> {
        match callee {
            Value::Function(func) => {
                let locals = self.bind_params(&func.params, false, args, &func.name.node, span)?;
                self.run_body(&func.body, Frame::call(locals, None))
            }
            Value::BoundMethod { recv, class, method } => {
                let Some(body) = method.body.as_ref() else {
                    return raise(
                        Code::NotImplementedError,
                        format!("method '{}' has no body", method.name.node),
                        span,
                    );
                };
                let mut locals =
                    self.bind_params(&method.params, true, args, &method.name.node, span)?;
                if let Some(first) = method.params.first() {
                    if first.node.is_receiver() {
                        locals.insert("self".to_string(), Value::Object(recv.clone()));
                    }
                }
                self.run_body(body, Frame::call(locals, Some(MethodCtx { recv, class })))
            }
            Value::StaticMethod { method, .. } => {
                let Some(body) = method.body.as_ref() else {
                    return raise(
                        Code::NotImplementedError,
                        format!("static method '{}' has no body", method.name.node),
                        span,
                    );
                };
                let locals =
                    self.bind_params(&method.params, false, args, &method.name.node, span)?;
                self.run_body(body, Frame::call(locals, None))
            }
            Value::Class(class_id) => self.instantiate(class_id, args, span),
            Value::Builtin(builtin) => self.call_builtin(builtin, args, span),
            other => raise(
                Code::TypeError,
                format!("'{}' is not callable", other.type_name()),
                span,
            ),
        }
    }

    /// Bind positional arguments against declared parameters, filling
    /// trailing defaults.
    fn bind_params(
        &mut self,
        params: &'p [Spanned<Param>],
        skip_receiver: bool,
        args: Vec<Value<'p>>,
        name: &str,
        span: Span,
    ) -> Exec<'p, HashMap<String, Value<'p>>> {
        let declared: Vec<&'p Spanned<Param>> = params
            .iter()
            .skip(if skip_receiver && params.first().is_some_and(|p| p.node.is_receiver()) {
                1
            } else {
                0
            })
            .collect();

        let required = declared.iter().filter(|p| p.node.default.is_none()).count();
        if args.len() < required || args.len() > declared.len() {
            return raise(
                Code::TypeError,
                format!(
                    "{}() takes {} argument(s) but {} were given",
                    name,
                    declared.len(),
                    args.len()
                ),
                span,
            );
        }

        let mut locals = HashMap::new();
        let mut args = args.into_iter();
        for param in declared {
            let value = match args.next() {
                Some(v) => v,
                None => {
                    let default = param.node.default.as_ref().expect("missing default checked above");
                    let mut frame = Frame::module();
                    self.eval(default, &mut frame)?
                }
            };
            locals.insert(param.node.name.clone(), value);
        }
        Ok(locals)
    }

    fn run_body(&mut self, body: &'p [Spanned<Stmt>], mut frame: Frame<'p>) -> Exec<'p, Value<'p>> {
        if self.depth >= MAX_CALL_DEPTH {
            return raise(
                Code::TypeError,
                "maximum call depth exceeded",
                Span::default(),
            );
        }
        self.depth += 1;
        let result = self.exec_block(body, &mut frame);
        self.depth -= 1;

        match result {
            Ok(()) => Ok(Value::None),
            Err(Flow::Return(value)) => Ok(value),
            Err(flow) => Err(flow),
        }
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn instantiate(&mut self, class_id: ClassId, args: Vec<Value<'p>>, span: Span) -> Exec<'p, Value<'p>> {
        // The checker rejects abstract instantiation statically; this guard
        // keeps the invariant if the runtime is driven directly.
        if self.classes[class_id].is_abstract {
            return raise(
                Code::TypeError,
                format!("cannot instantiate abstract class '{}'", self.classes[class_id].name),
                span,
            );
        }

        let obj = Rc::new(ObjectData {
            class: class_id,
            attrs: RefCell::new(HashMap::new()),
        });

        // Field defaults apply base-first so derived declarations win.
        let mro = self.classes[class_id].mro.clone();
        for &ancestor in mro.iter().rev() {
            let fields = self.classes[ancestor].instance_fields.clone();
            for (name, init) in fields {
                let mut frame = Frame::module();
                let value = self.eval(init, &mut frame)?;
                obj.attrs.borrow_mut().insert(name.to_string(), value);
            }
        }

        // Nearest constructor on the chain runs; absent one, no arguments
        // are accepted.
        let ctor = mro
            .iter()
            .find_map(|&id| self.classes[id].constructor.map(|ctor| (id, ctor)));
        match ctor {
            Some((owner, ctor)) => {
                self.call_value(
                    Value::BoundMethod {
                        recv: obj.clone(),
                        class: owner,
                        method: ctor,
                    },
                    args,
                    span,
                )?;
            }
            None => {
                if !args.is_empty() {
                    return raise(
                        Code::TypeError,
                        format!(
                            "{}() takes no arguments but {} were given",
                            self.classes[class_id].name,
                            args.len()
                        ),
                        span,
                    );
                }
            }
        }

        Ok(Value::Object(obj))
    }

    /// Find an instance method by walking the MRO from `start`.
    fn find_method(&self, start: ClassId, name: &str) -> Option<(ClassId, &'p MethodDecl)> {
        let class = &self.classes[start];
        for &ancestor in &class.mro {
            if let Some(&method) = self.classes[ancestor].methods.get(name) {
                if method.body.is_some() {
                    return Some((ancestor, method));
                }
            }
        }
        None
    }

    /// Find a static member by walking the MRO from `start`; lookup through
    /// a subclass name sees that subclass's shadowing declaration first.
    fn find_static(&self, start: ClassId, name: &str) -> Option<(ClassId, &'p MethodDecl)> {
        for &ancestor in &self.classes[start].mro {
            if let Some(&method) = self.classes[ancestor].statics.get(name) {
                return Some((ancestor, method));
            }
        }
        None
    }

    fn find_static_field(&self, start: ClassId, name: &str) -> Option<Value<'p>> {
        for &ancestor in &self.classes[start].mro {
            if let Some(value) = self.classes[ancestor].static_fields.borrow().get(name) {
                return Some(value.clone());
            }
        }
        None
    }

    pub(super) fn get_attr(&mut self, value: Value<'p>, name: &str, span: Span) -> Exec<'p, Value<'p>> {
        match &value {
            Value::Object(obj) => {
                if let Some(attr) = obj.attrs.borrow().get(name) {
                    return Ok(attr.clone());
                }
                if let Some((owner, method)) = self.find_method(obj.class, name) {
                    return Ok(Value::BoundMethod {
                        recv: obj.clone(),
                        class: owner,
                        method,
                    });
                }
                if let Some((owner, method)) = self.find_static(obj.class, name) {
                    return Ok(Value::StaticMethod { class: owner, method });
                }
                if let Some(field) = self.find_static_field(obj.class, name) {
                    return Ok(field);
                }
                raise(
                    Code::AttributeError,
                    format!(
                        "'{}' object has no attribute '{}'",
                        self.classes[obj.class].name, name
                    ),
                    span,
                )
            }
            Value::Class(class_id) => {
                if let Some((owner, method)) = self.find_static(*class_id, name) {
                    return Ok(Value::StaticMethod { class: owner, method });
                }
                if let Some(field) = self.find_static_field(*class_id, name) {
                    return Ok(field);
                }
                raise(
                    Code::AttributeError,
                    format!("class '{}' has no attribute '{}'", self.classes[*class_id].name, name),
                    span,
                )
            }
            Value::Exception(exc) => match name {
                "message" => Ok(Value::str(exc.message.as_str())),
                _ => raise(
                    Code::AttributeError,
                    format!("'{}' has no attribute '{}'", exc.kind, name),
                    span,
                ),
            },
            other => raise(
                Code::AttributeError,
                format!("'{}' value has no attribute '{}'", other.type_name(), name),
                span,
            ),
        }
    }

    fn set_attr(&mut self, target: Value<'p>, name: &str, value: Value<'p>, span: Span) -> Exec<'p, ()> {
        match target {
            Value::Object(obj) => {
                obj.attrs.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class_id) => {
                // Writes through a class name land on the declaring ancestor
                // so every reader observes the update.
                let owner = self.classes[class_id]
                    .mro
                    .iter()
                    .copied()
                    .find(|&id| self.classes[id].static_fields.borrow().contains_key(name))
                    .unwrap_or(class_id);
                self.classes[owner]
                    .static_fields
                    .borrow_mut()
                    .insert(name.to_string(), value);
                Ok(())
            }
            other => raise(
                Code::AttributeError,
                format!("cannot set attribute on '{}' value", other.type_name()),
                span,
            ),
        }
    }

    fn call_method(
        &mut self,
        object: Value<'p>,
        name: &str,
        args: Vec<Value<'p>>,
        span: Span,
    ) -> Exec<'p, Value<'p>> {
        match &object {
            Value::Str(_) | Value::List(_) | Value::Dict(_) => {
                self.call_native_method(object, name, args, span)
            }
            _ => {
                let callee = self.get_attr(object, name, span)?;
                self.call_value(callee, args, span)
            }
        }
    }

    // ========================================================================
    // super
    // ========================================================================

    fn method_ctx(&self, frame: &Frame<'p>, span: Span) -> Exec<'p, MethodCtx<'p>> {
        match &frame.ctx {
            Some(ctx) => Ok(ctx.clone()),
            None => raise(Code::TypeError, "'super' outside of a method", span),
        }
    }

    /// Bare `super(...)`: invoke the nearest ancestor constructor above the
    /// defining class.
    fn call_super_constructor(
        &mut self,
        args: &'p [Spanned<Expr>],
        span: Span,
        frame: &mut Frame<'p>,
    ) -> Exec<'p, Value<'p>> {
        let ctx = self.method_ctx(frame, span)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval(arg, frame)?);
        }

        let ctor = self.ancestors_above(ctx.class).find_map(|id| {
            self.classes[id].constructor.map(|ctor| (id, ctor))
        });
        match ctor {
            Some((owner, ctor)) => self.call_value(
                Value::BoundMethod {
                    recv: ctx.recv,
                    class: owner,
                    method: ctor,
                },
                arg_values,
                span,
            ),
            None if arg_values.is_empty() => Ok(Value::None),
            None => raise(
                Code::TypeError,
                "no ancestor constructor accepts arguments",
                span,
            ),
        }
    }

    /// `super().m(...)`: ancestor-indexed dispatch starting above the
    /// defining class in the MRO.
    fn call_super_method(
        &mut self,
        name: &str,
        args: Vec<Value<'p>>,
        span: Span,
        frame: &mut Frame<'p>,
    ) -> Exec<'p, Value<'p>> {
        let ctx = self.method_ctx(frame, span)?;

        let found = self.ancestors_above(ctx.class).find_map(|id| {
            self.classes[id]
                .methods
                .get(name)
                .filter(|m| m.body.is_some())
                .map(|&m| (id, m))
        });
        match found {
            Some((owner, method)) => self.call_value(
                Value::BoundMethod {
                    recv: ctx.recv,
                    class: owner,
                    method,
                },
                args,
                span,
            ),
            None => raise(
                Code::AttributeError,
                format!("no ancestor defines method '{}'", name),
                span,
            ),
        }
    }

    fn ancestors_above(&self, class: ClassId) -> impl Iterator<Item = ClassId> + use<'_, 'p, 'out> {
        let mut current = self.classes[class].parent;
        std::iter::from_fn(move || {
            let id = current?;
            current = self.classes[id].parent;
            Some(id)
        })
    }

    // ========================================================================
    // f-strings
    // ========================================================================

    fn render_fstring(&mut self, parts: &'p [FStringPart], frame: &mut Frame<'p>) -> Exec<'p, Value<'p>> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(s) => out.push_str(s),
                FStringPart::Expr { expr, spec } => {
                    let value = self.eval(expr, frame)?;
                    let rendered = super::fmt::format_with_spec(&value, *spec, expr.span)
                        .map_err(Flow::Raise)?;
                    out.push_str(&rendered);
                }
            }
        }
        Ok(Value::str(out))
    }

    // ========================================================================
    // Iteration, indexing, slicing
    // ========================================================================

    pub(super) fn iterate(&mut self, value: Value<'p>, span: Span) -> Exec<'p, Vec<Value<'p>>> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            Value::Dict(entries) => Ok(entries.borrow().iter().map(|(k, _)| k.clone()).collect()),
            Value::Range { start, end, step } => {
                let mut items = Vec::new();
                let mut current = start;
                if step > 0 {
                    while current < end {
                        items.push(Value::Int(current));
                        current += step;
                    }
                } else if step < 0 {
                    while current > end {
                        items.push(Value::Int(current));
                        current += step;
                    }
                }
                Ok(items)
            }
            other => raise(
                Code::TypeError,
                format!("'{}' is not iterable", other.type_name()),
                span,
            ),
        }
    }

    fn get_index(&mut self, object: Value<'p>, index: Value<'p>, span: Span) -> Exec<'p, Value<'p>> {
        match (&object, &index) {
            (Value::List(items), Value::Int(i)) => {
                let items = items.borrow();
                let idx = normalize_index(*i, items.len())
                    .ok_or_else(|| index_error(*i, span))?;
                Ok(items[idx].clone())
            }
            (Value::Tuple(items), Value::Int(i)) => {
                let idx = normalize_index(*i, items.len())
                    .ok_or_else(|| index_error(*i, span))?;
                Ok(items[idx].clone())
            }
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = normalize_index(*i, chars.len())
                    .ok_or_else(|| index_error(*i, span))?;
                Ok(Value::str(chars[idx].to_string()))
            }
            (Value::Dict(entries), key) => {
                let entries = entries.borrow();
                for (k, v) in entries.iter() {
                    if k.eq_value(key) {
                        return Ok(v.clone());
                    }
                }
                raise(Code::IndexError, format!("key not found: {}", key), span)
            }
            (other, _) => raise(
                Code::TypeError,
                format!("'{}' is not indexable", other.type_name()),
                span,
            ),
        }
    }

    fn set_index(
        &mut self,
        object: Value<'p>,
        index: Value<'p>,
        value: Value<'p>,
        span: Span,
    ) -> Exec<'p, ()> {
        match (&object, &index) {
            (Value::List(items), Value::Int(i)) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                let idx = normalize_index(*i, len).ok_or_else(|| index_error(*i, span))?;
                items[idx] = value;
                Ok(())
            }
            (Value::Dict(entries), key) => {
                let mut entries = entries.borrow_mut();
                for (k, v) in entries.iter_mut() {
                    if k.eq_value(key) {
                        *v = value;
                        return Ok(());
                    }
                }
                entries.push((index, value));
                Ok(())
            }
            (other, _) => raise(
                Code::TypeError,
                format!("'{}' does not support item assignment", other.type_name()),
                span,
            ),
        }
    }

    fn get_slice(
        &mut self,
        object: Value<'p>,
        start: Option<i64>,
        end: Option<i64>,
        span: Span,
    ) -> Exec<'p, Value<'p>> {
        match &object {
            Value::List(items) => {
                let items = items.borrow();
                let (lo, hi) = slice_bounds(start, end, items.len());
                Ok(Value::list(items[lo..hi].to_vec()))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (lo, hi) = slice_bounds(start, end, chars.len());
                Ok(Value::str(chars[lo..hi].iter().collect::<String>()))
            }
            other => raise(
                Code::TypeError,
                format!("'{}' cannot be sliced", other.type_name()),
                span,
            ),
        }
    }
}

fn index_error<'p>(index: i64, span: Span) -> Flow<'p> {
    Flow::Raise(SpyError {
        code: Code::IndexError,
        message: format!("index {} out of range", index),
        span,
    })
}

/// Python index semantics: negatives count from the end; out of range is an
/// error.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    if (0..len).contains(&idx) {
        Some(idx as usize)
    } else {
        None
    }
}

/// Python slice semantics: negatives count from the end, bounds clamp.
fn slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let clamp = |v: i64| -> i64 {
        let v = if v < 0 { v + len } else { v };
        v.clamp(0, len)
    };
    let lo = clamp(start.unwrap_or(0));
    let hi = clamp(end.unwrap_or(len));
    (lo as usize, hi.max(lo) as usize)
}

/// Map a raised exception's name to its stable diagnostic code.
fn exception_code(kind: &str) -> Code {
    match kind {
        "ValueError" => Code::ValueError,
        "NotImplementedError" => Code::NotImplementedError,
        _ => Code::TypeError,
    }
}
