//! Canonical printer: walks the AST and re-emits parseable source.
//!
//! The printer never inserts parentheses of its own; grouping that was
//! explicit in the source survives as `Paren` nodes, so printing an AST and
//! re-parsing the output yields a structurally equal tree.

use crate::frontend::ast::*;

use super::writer::SourceWriter;

pub struct Printer {
    w: SourceWriter,
    /// Inside an f-string hole double quotes would close the string early,
    /// so nested string literals switch to single quotes.
    in_fstring: bool,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            w: SourceWriter::new(),
            in_fstring: false,
        }
    }

    pub fn print_program(mut self, program: &Program) -> String {
        for item in &program.items {
            self.item(&item.node);
        }
        self.w.finish()
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn item(&mut self, item: &Item) {
        match item {
            Item::Interface(iface) => self.interface_decl(iface),
            Item::Class(class) => self.class_decl(class),
            Item::Function(func) => self.function_decl(func),
            Item::Stmt(stmt) => self.stmt(stmt),
        }
    }

    fn interface_decl(&mut self, iface: &InterfaceDecl) {
        self.w.write("interface ");
        self.w.write(&iface.name.node);
        if !iface.extends.is_empty() {
            self.w.write(" extends ");
            let names: Vec<&str> = iface.extends.iter().map(|e| e.node.as_str()).collect();
            self.w.write(&names.join(", "));
        }
        self.members(&iface.members);
    }

    fn class_decl(&mut self, class: &ClassDecl) {
        match class.modifier {
            ClassModifier::Concrete => {}
            ClassModifier::Abstract => self.w.write("abstract "),
            ClassModifier::Final => self.w.write("final "),
        }
        self.w.write("class ");
        self.w.write(&class.name.node);
        if let Some(base) = &class.extends {
            self.w.write(" extends ");
            self.w.write(&base.node);
        }
        if !class.implements.is_empty() {
            self.w.write(" implements ");
            let names: Vec<&str> = class.implements.iter().map(|i| i.node.as_str()).collect();
            self.w.write(&names.join(", "));
        }
        self.members(&class.members);
    }

    fn members(&mut self, members: &[Spanned<Member>]) {
        if members.is_empty() {
            self.w.writeln(" {}");
            return;
        }

        self.w.writeln(" {");
        self.w.indent();
        for member in members {
            match &member.node {
                Member::Method(method) => self.method_decl(method),
                Member::Field(field) => self.field_decl(field),
            }
        }
        self.w.dedent();
        self.w.writeln("}");
    }

    fn modifiers(&mut self, modifiers: &Modifiers) {
        if modifiers.is_abstract() {
            self.w.write("abstract ");
        }
        if modifiers.is_final() {
            self.w.write("final ");
        }
        if modifiers.is_static() {
            self.w.write("static ");
        }
    }

    fn method_decl(&mut self, method: &MethodDecl) {
        self.modifiers(&method.modifiers);
        self.w.write("def ");
        self.w.write(&method.name.node);
        self.w.write("(");
        self.params(&method.params);
        self.w.write(")");
        if let Some(ret) = &method.return_type {
            self.w.write(" -> ");
            self.w.write(&ret.node.to_string());
        }
        match &method.body {
            None => self.w.writeln(";"),
            Some(body) => self.block(body),
        }
    }

    fn field_decl(&mut self, field: &FieldDecl) {
        self.modifiers(&field.modifiers);
        self.w.write(&field.name.node);
        if let Some(ty) = &field.ty {
            self.w.write(": ");
            self.w.write(&ty.node.to_string());
        }
        self.w.write(" = ");
        self.expr(&field.value.node);
        self.w.writeln(";");
    }

    fn function_decl(&mut self, func: &FunctionDecl) {
        self.w.write("def ");
        self.w.write(&func.name.node);
        self.w.write("(");
        self.params(&func.params);
        self.w.write(")");
        if let Some(ret) = &func.return_type {
            self.w.write(" -> ");
            self.w.write(&ret.node.to_string());
        }
        self.block(&func.body);
    }

    fn params(&mut self, params: &[Spanned<Param>]) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.w.write(", ");
            }
            self.w.write(&param.node.name);
            if let Some(ty) = &param.node.ty {
                self.w.write(": ");
                self.w.write(&ty.node.to_string());
            }
            if let Some(default) = &param.node.default {
                self.w.write(" = ");
                self.expr(&default.node);
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn block(&mut self, body: &[Spanned<Stmt>]) {
        if body.is_empty() {
            self.w.writeln(" {}");
            return;
        }
        self.w.writeln(" {");
        self.w.indent();
        for stmt in body {
            self.stmt(&stmt.node);
        }
        self.w.dedent();
        self.w.writeln("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                self.expr(&expr.node);
                self.w.writeln(";");
            }
            Stmt::Assign(assign) => {
                if assign.final_span.is_some() {
                    self.w.write("final ");
                }
                self.assign_target(&assign.target);
                if let Some(ty) = &assign.ty {
                    self.w.write(": ");
                    self.w.write(&ty.node.to_string());
                }
                self.w.write(" = ");
                self.expr(&assign.value.node);
                self.w.writeln(";");
            }
            Stmt::Compound(compound) => {
                self.assign_target(&compound.target);
                let op = match compound.op {
                    BinaryOp::Add => " += ",
                    BinaryOp::Sub => " -= ",
                    BinaryOp::Mul => " *= ",
                    _ => " /= ",
                };
                self.w.write(op);
                self.expr(&compound.value.node);
                self.w.writeln(";");
            }
            Stmt::Return(value) => {
                self.w.write("return");
                if let Some(value) = value {
                    self.w.write(" ");
                    self.expr(&value.node);
                }
                self.w.writeln(";");
            }
            Stmt::Raise(value) => {
                self.w.write("raise ");
                self.expr(&value.node);
                self.w.writeln(";");
            }
            Stmt::Pass => self.w.writeln("pass;"),
            Stmt::If(if_stmt) => {
                self.w.write("if ");
                self.expr(&if_stmt.cond.node);
                self.block(&if_stmt.then_body);
                for (cond, body) in &if_stmt.elif_branches {
                    self.w.write("elif ");
                    self.expr(&cond.node);
                    self.block(body);
                }
                if let Some(body) = &if_stmt.else_body {
                    self.w.write("else");
                    self.block(body);
                }
            }
            Stmt::While(while_stmt) => {
                self.w.write("while ");
                self.expr(&while_stmt.cond.node);
                self.block(&while_stmt.body);
            }
            Stmt::For(for_stmt) => {
                self.w.write("for ");
                self.w.write(&for_stmt.var.node);
                self.w.write(" in ");
                self.expr(&for_stmt.iter.node);
                self.block(&for_stmt.body);
            }
            Stmt::Import(import) => {
                let module: Vec<&str> = import.module.iter().map(|m| m.node.as_str()).collect();
                if import.items.is_empty() {
                    self.w.write("import ");
                    self.w.write(&module.join("."));
                } else {
                    self.w.write("from ");
                    self.w.write(&module.join("."));
                    self.w.write(" import ");
                    let items: Vec<&str> = import.items.iter().map(|i| i.node.as_str()).collect();
                    self.w.write(&items.join(", "));
                }
                self.w.writeln(";");
            }
        }
    }

    fn assign_target(&mut self, target: &AssignTarget) {
        match target {
            AssignTarget::Name(name) => self.w.write(&name.node),
            AssignTarget::Field { object, field } => {
                self.expr(&object.node);
                self.w.write(".");
                self.w.write(&field.node);
            }
            AssignTarget::Index { object, index } => {
                self.expr(&object.node);
                self.w.write("[");
                self.expr(&index.node);
                self.w.write("]");
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) => self.w.write(name),
            Expr::SelfExpr => self.w.write("self"),
            Expr::Literal(lit) => self.literal(lit),
            Expr::Paren(inner) => {
                self.w.write("(");
                self.expr(&inner.node);
                self.w.write(")");
            }
            Expr::Binary(left, op, right) => {
                self.expr(&left.node);
                self.w.write(&format!(" {} ", op));
                self.expr(&right.node);
            }
            Expr::Unary(op, operand) => {
                match op {
                    UnaryOp::Neg => self.w.write("-"),
                    UnaryOp::Not => self.w.write("not "),
                }
                self.expr(&operand.node);
            }
            Expr::Call(callee, args) => {
                self.expr(&callee.node);
                self.w.write("(");
                self.expr_list(args);
                self.w.write(")");
            }
            Expr::Super(args) => {
                self.w.write("super(");
                self.expr_list(args);
                self.w.write(")");
            }
            Expr::Attr(object, name) => {
                self.expr(&object.node);
                self.w.write(".");
                self.w.write(&name.node);
            }
            Expr::Index(object, index) => {
                self.expr(&object.node);
                self.w.write("[");
                self.expr(&index.node);
                self.w.write("]");
            }
            Expr::Slice(object, slice) => {
                self.expr(&object.node);
                self.w.write("[");
                if let Some(start) = &slice.start {
                    self.expr(&start.node);
                }
                self.w.write(":");
                if let Some(end) = &slice.end {
                    self.expr(&end.node);
                }
                self.w.write("]");
            }
            Expr::List(elems) => {
                self.w.write("[");
                self.expr_list(elems);
                self.w.write("]");
            }
            Expr::Tuple(elems) => {
                self.w.write("(");
                self.expr_list(elems);
                self.w.write(")");
            }
            Expr::Dict(entries) => {
                self.w.write("{");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.w.write(", ");
                    }
                    self.expr(&key.node);
                    self.w.write(": ");
                    self.expr(&value.node);
                }
                self.w.write("}");
            }
            Expr::FString(parts) => self.fstring(parts),
        }
    }

    fn expr_list(&mut self, exprs: &[Spanned<Expr>]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.w.write(", ");
            }
            self.expr(&expr.node);
        }
    }

    fn literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Int(v) => self.w.write(&v.to_string()),
            Literal::Float(v) => {
                let mut text = v.to_string();
                // Keep floats re-lexable as floats.
                if !text.contains('.') && !text.contains('e') {
                    text.push_str(".0");
                }
                self.w.write(&text);
            }
            Literal::Bool(true) => self.w.write("True"),
            Literal::Bool(false) => self.w.write("False"),
            Literal::None => self.w.write("None"),
            Literal::Str(s) => {
                let quote = if self.in_fstring { '\'' } else { '"' };
                self.w.write(&quote.to_string());
                self.w.write(&escape_str(s, quote));
                self.w.write(&quote.to_string());
            }
        }
    }

    fn fstring(&mut self, parts: &[FStringPart]) {
        self.w.write("f\"");
        let was = self.in_fstring;
        self.in_fstring = true;
        for part in parts {
            match part {
                FStringPart::Literal(s) => {
                    let escaped = escape_str(s, '"').replace('{', "{{").replace('}', "}}");
                    self.w.write(&escaped);
                }
                FStringPart::Expr { expr, spec } => {
                    self.w.write("{");
                    self.expr(&expr.node);
                    if let Some(spec) = spec {
                        self.w.write(&format!(":{}", spec));
                    }
                    self.w.write("}");
                }
            }
        }
        self.in_fstring = was;
        self.w.write("\"");
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_str(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
