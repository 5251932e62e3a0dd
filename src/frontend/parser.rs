//! Parser for the Spy programming language
//!
//! Converts a token stream into an AST. Error recovery is panic-mode to the
//! next `;` or `}`: the parser never aborts on the first error, it records a
//! diagnostic, resynchronizes, and keeps going so downstream passes see every
//! declaration that parsed cleanly.

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Code, Diagnostic, MAX_DIAGNOSTICS};
use crate::frontend::lexer::{self, RawFStringPart, Token, TokenKind};

/// Maximum expression/statement nesting depth, to bound stack use.
const MAX_DEPTH: usize = 512;

/// Result of parsing index brackets - either a single index or a slice
enum IndexOrSlice {
    Index(Spanned<Expr>),
    Slice(SliceExpr),
}

/// Parser state
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    errors: Vec<Diagnostic>,
}

type ParseResult<T> = Result<T, Diagnostic>;

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            errors: Vec::new(),
        }
    }

    /// Parse the entire token stream.
    ///
    /// Always returns a program containing every item that parsed cleanly,
    /// together with the accumulated diagnostics.
    pub fn parse(mut self) -> (Program, Vec<Diagnostic>) {
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.errors.len() >= MAX_DIAGNOSTICS {
                break;
            }
            match self.item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        (Program { items }, self.errors)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ParseResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(Diagnostic::error(
                Code::ExpectedToken,
                format!("expected {}, found {}", what, self.peek().kind.describe()),
                self.peek().span,
            ))
        }
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.previous().span.end)
    }

    fn enter(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Diagnostic::error(
                Code::MalformedDeclaration,
                format!("nesting exceeds the maximum depth of {}", MAX_DEPTH),
                self.current_span(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Panic-mode recovery: skip to just past the next `;`, or stop before
    /// the next `}` / declaration keyword.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => {
                    self.advance();
                    return;
                }
                TokenKind::Interface | TokenKind::Class | TokenKind::Def => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn identifier(&mut self, what: &str) -> ParseResult<Spanned<Ident>> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let span = self.peek().span;
                self.advance();
                Ok(Spanned::new(name, span))
            }
            _ => Err(Diagnostic::error(
                Code::ExpectedToken,
                format!("expected {}, found {}", what, self.peek().kind.describe()),
                self.peek().span,
            )),
        }
    }

    fn ident_list(&mut self, what: &str) -> ParseResult<Vec<Spanned<Ident>>> {
        let mut names = vec![self.identifier(what)?];
        while self.match_token(&TokenKind::Comma) {
            names.push(self.identifier(what)?);
        }
        Ok(names)
    }

    // ========================================================================
    // Top-level items
    // ========================================================================

    fn item(&mut self) -> ParseResult<Spanned<Item>> {
        let start = self.current_span().start;

        // `abstract`/`final` start a class declaration only when `class`
        // follows; a bare `final x = ...` is a final binding statement.
        let is_class_modifier = matches!(self.peek().kind, TokenKind::Abstract | TokenKind::Final)
            && matches!(self.peek_next().kind, TokenKind::Class);

        let item = if self.check(&TokenKind::Interface) {
            Item::Interface(self.interface_decl()?)
        } else if is_class_modifier || self.check(&TokenKind::Class) {
            Item::Class(self.class_decl()?)
        } else if self.check(&TokenKind::Def) {
            Item::Function(self.function_decl()?)
        } else {
            Item::Stmt(self.statement()?.node)
        };

        Ok(Spanned::new(item, self.span_from(start)))
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn interface_decl(&mut self) -> ParseResult<InterfaceDecl> {
        self.expect(&TokenKind::Interface, "'interface'")?;
        let name = self.identifier("interface name")?;

        let extends = if self.match_token(&TokenKind::Extends) {
            self.ident_list("base interface name")?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::LBrace, "'{' after interface header")?;
        let members = self.member_list()?;

        Ok(InterfaceDecl { name, extends, members })
    }

    fn class_decl(&mut self) -> ParseResult<ClassDecl> {
        let modifier = if self.match_token(&TokenKind::Abstract) {
            ClassModifier::Abstract
        } else if self.match_token(&TokenKind::Final) {
            ClassModifier::Final
        } else {
            ClassModifier::Concrete
        };

        self.expect(&TokenKind::Class, "'class'")?;
        let name = self.identifier("class name")?;

        let extends = if self.match_token(&TokenKind::Extends) {
            Some(self.identifier("base class name")?)
        } else {
            None
        };

        let implements = if self.match_token(&TokenKind::Implements) {
            self.ident_list("interface name")?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::LBrace, "'{' after class header")?;
        let members = self.member_list()?;

        Ok(ClassDecl {
            modifier,
            name,
            extends,
            implements,
            members,
        })
    }

    /// Parse members up to and including the closing `}`.
    ///
    /// Member errors recover locally so one bad member does not take the
    /// whole declaration down with it.
    fn member_list(&mut self) -> ParseResult<Vec<Spanned<Member>>> {
        let mut members = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.member() {
                Ok(member) => members.push(member),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                    // Recovery may have consumed the closing brace.
                    if matches!(self.previous().kind, TokenKind::RBrace) {
                        return Ok(members);
                    }
                }
            }
        }

        self.expect(&TokenKind::RBrace, "'}' after body")?;
        Ok(members)
    }

    fn member(&mut self) -> ParseResult<Spanned<Member>> {
        let start = self.current_span().start;
        let modifiers = self.member_modifiers()?;

        if self.check(&TokenKind::Def) {
            let method = self.method_decl(modifiers)?;
            Ok(Spanned::new(Member::Method(method), self.span_from(start)))
        } else if matches!(self.peek().kind, TokenKind::Ident(_)) {
            let field = self.field_decl(modifiers)?;
            Ok(Spanned::new(Member::Field(field), self.span_from(start)))
        } else {
            Err(Diagnostic::error(
                Code::MalformedDeclaration,
                format!(
                    "expected member declaration, found {}",
                    self.peek().kind.describe()
                ),
                self.current_span(),
            ))
        }
    }

    fn member_modifiers(&mut self) -> ParseResult<Modifiers> {
        let mut modifiers = Modifiers::default();

        loop {
            let span = self.current_span();
            match self.peek().kind {
                TokenKind::Abstract => {
                    self.advance();
                    if modifiers.abstract_span.replace(span).is_some() {
                        return Err(duplicate_modifier("abstract", span));
                    }
                }
                TokenKind::Final => {
                    self.advance();
                    if modifiers.final_span.replace(span).is_some() {
                        return Err(duplicate_modifier("final", span));
                    }
                }
                TokenKind::Static => {
                    self.advance();
                    if modifiers.static_span.replace(span).is_some() {
                        return Err(duplicate_modifier("static", span));
                    }
                }
                _ => break,
            }
        }

        Ok(modifiers)
    }

    fn method_decl(&mut self, modifiers: Modifiers) -> ParseResult<MethodDecl> {
        self.expect(&TokenKind::Def, "'def'")?;
        let name = self.method_name()?;

        self.expect(&TokenKind::LParen, "'(' after method name")?;
        let params = self.params()?;
        self.expect(&TokenKind::RParen, "')' after parameters")?;

        let return_type = if self.match_token(&TokenKind::Arrow) {
            Some(self.type_expr()?)
        } else {
            None
        };

        let body = if self.match_token(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.block()?)
        };

        Ok(MethodDecl {
            modifiers,
            name,
            params,
            return_type,
            body,
        })
    }

    /// Method names are identifiers; `__init__` is just an identifier too.
    fn method_name(&mut self) -> ParseResult<Spanned<Ident>> {
        self.identifier("method name")
    }

    fn field_decl(&mut self, modifiers: Modifiers) -> ParseResult<FieldDecl> {
        let name = self.identifier("field name")?;

        let ty = if self.match_token(&TokenKind::Colon) {
            Some(self.type_expr()?)
        } else {
            None
        };

        self.expect(&TokenKind::Assign, "'=' in field declaration")?;
        let value = self.expression()?;
        self.expect(&TokenKind::Semicolon, "';' after field declaration")?;

        Ok(FieldDecl {
            modifiers,
            name,
            ty,
            value,
        })
    }

    fn function_decl(&mut self) -> ParseResult<FunctionDecl> {
        self.expect(&TokenKind::Def, "'def'")?;
        let name = self.identifier("function name")?;

        self.expect(&TokenKind::LParen, "'(' after function name")?;
        let params = self.params()?;
        self.expect(&TokenKind::RParen, "')' after parameters")?;

        let return_type = if self.match_token(&TokenKind::Arrow) {
            Some(self.type_expr()?)
        } else {
            None
        };

        let body = self.block()?;

        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    fn params(&mut self) -> ParseResult<Vec<Spanned<Param>>> {
        let mut params = Vec::new();

        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.param()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(params)
    }

    fn param(&mut self) -> ParseResult<Spanned<Param>> {
        let start = self.current_span().start;

        // `self` is a keyword but a perfectly good parameter name.
        let name = if self.check(&TokenKind::SelfKw) {
            let span = self.current_span();
            self.advance();
            Spanned::new("self".to_string(), span)
        } else {
            self.identifier("parameter name")?
        };

        let ty = if self.match_token(&TokenKind::Colon) {
            Some(self.type_expr()?)
        } else {
            None
        };

        let default = if self.match_token(&TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };

        Ok(Spanned::new(
            Param {
                name: name.node,
                ty,
                default,
            },
            self.span_from(start),
        ))
    }

    fn type_expr(&mut self) -> ParseResult<Spanned<TypeExpr>> {
        let start = self.current_span().start;

        let name = match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                name
            }
            TokenKind::None => {
                self.advance();
                "None".to_string()
            }
            _ => {
                return Err(Diagnostic::error(
                    Code::ExpectedToken,
                    format!("expected type name, found {}", self.peek().kind.describe()),
                    self.current_span(),
                ))
            }
        };

        let mut args = Vec::new();
        if self.match_token(&TokenKind::LBracket) {
            loop {
                args.push(self.type_expr()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBracket, "']' after type arguments")?;
        }

        Ok(Spanned::new(TypeExpr { name, args }, self.span_from(start)))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn block(&mut self) -> ParseResult<Vec<Spanned<Stmt>>> {
        self.enter()?;
        let result = self.block_inner();
        self.leave();
        result
    }

    fn block_inner(&mut self) -> ParseResult<Vec<Spanned<Stmt>>> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                    if matches!(self.previous().kind, TokenKind::RBrace) {
                        return Ok(stmts);
                    }
                }
            }
        }

        self.expect(&TokenKind::RBrace, "'}' after block")?;
        Ok(stmts)
    }

    fn statement(&mut self) -> ParseResult<Spanned<Stmt>> {
        let start = self.current_span().start;

        let stmt = match self.peek().kind {
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(&TokenKind::Semicolon, "';' after return statement")?;
                Stmt::Return(value)
            }
            TokenKind::Pass => {
                self.advance();
                self.expect(&TokenKind::Semicolon, "';' after 'pass'")?;
                Stmt::Pass
            }
            TokenKind::Raise => {
                self.advance();
                let value = self.expression()?;
                self.expect(&TokenKind::Semicolon, "';' after raise statement")?;
                Stmt::Raise(value)
            }
            TokenKind::If => Stmt::If(self.if_stmt()?),
            TokenKind::While => {
                self.advance();
                let cond = self.expression()?;
                let body = self.block()?;
                Stmt::While(WhileStmt { cond, body })
            }
            TokenKind::For => {
                self.advance();
                let var = self.identifier("loop variable")?;
                self.expect(&TokenKind::In, "'in' after loop variable")?;
                let iter = self.expression()?;
                let body = self.block()?;
                Stmt::For(ForStmt { var, iter, body })
            }
            TokenKind::Import | TokenKind::From => Stmt::Import(self.import_stmt()?),
            TokenKind::Final => {
                let final_span = self.current_span();
                self.advance();
                let name = self.identifier("name after 'final'")?;
                let ty = if self.match_token(&TokenKind::Colon) {
                    Some(self.type_expr()?)
                } else {
                    None
                };
                self.expect(&TokenKind::Assign, "'=' in final binding")?;
                let value = self.expression()?;
                self.expect(&TokenKind::Semicolon, "';' after final binding")?;
                Stmt::Assign(AssignStmt {
                    final_span: Some(final_span),
                    target: AssignTarget::Name(name),
                    ty,
                    value,
                })
            }
            _ => self.expr_or_assign_stmt()?,
        };

        Ok(Spanned::new(stmt, self.span_from(start)))
    }

    fn if_stmt(&mut self) -> ParseResult<IfStmt> {
        self.expect(&TokenKind::If, "'if'")?;
        let cond = self.expression()?;
        let then_body = self.block()?;

        let mut elif_branches = Vec::new();
        let mut else_body = None;

        loop {
            if self.match_token(&TokenKind::Elif) {
                let elif_cond = self.expression()?;
                let elif_body = self.block()?;
                elif_branches.push((elif_cond, elif_body));
            } else if self.match_token(&TokenKind::Else) {
                else_body = Some(self.block()?);
                break;
            } else {
                break;
            }
        }

        Ok(IfStmt {
            cond,
            then_body,
            elif_branches,
            else_body,
        })
    }

    fn import_stmt(&mut self) -> ParseResult<ImportStmt> {
        if self.match_token(&TokenKind::From) {
            let module = self.dotted_path()?;
            self.expect(&TokenKind::Import, "'import' after module path")?;
            let items = self.ident_list("imported name")?;
            self.expect(&TokenKind::Semicolon, "';' after import")?;
            Ok(ImportStmt { module, items })
        } else {
            self.expect(&TokenKind::Import, "'import'")?;
            let module = self.dotted_path()?;
            self.expect(&TokenKind::Semicolon, "';' after import")?;
            Ok(ImportStmt {
                module,
                items: Vec::new(),
            })
        }
    }

    fn dotted_path(&mut self) -> ParseResult<Vec<Spanned<Ident>>> {
        let mut parts = vec![self.identifier("module name")?];
        while self.match_token(&TokenKind::Dot) {
            parts.push(self.identifier("module name")?);
        }
        Ok(parts)
    }

    /// Parse an expression statement, plain assignment, annotated assignment,
    /// or compound assignment. Assignment targets are re-read from the parsed
    /// expression: a name, attribute access, or index expression.
    fn expr_or_assign_stmt(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;

        // Annotated assignment: `x: int = value;`
        if self.check(&TokenKind::Colon) {
            if let Expr::Ident(name) = &expr.node {
                let name = Spanned::new(name.clone(), expr.span);
                self.advance();
                let ty = Some(self.type_expr()?);
                self.expect(&TokenKind::Assign, "'=' after type annotation")?;
                let value = self.expression()?;
                self.expect(&TokenKind::Semicolon, "';' after assignment")?;
                return Ok(Stmt::Assign(AssignStmt {
                    final_span: None,
                    target: AssignTarget::Name(name),
                    ty,
                    value,
                }));
            }
        }

        if self.match_token(&TokenKind::Assign) {
            let target = self.assign_target(expr)?;
            let value = self.expression()?;
            self.expect(&TokenKind::Semicolon, "';' after assignment")?;
            return Ok(Stmt::Assign(AssignStmt {
                final_span: None,
                target,
                ty: None,
                value,
            }));
        }

        let compound_op = match self.peek().kind {
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            _ => None,
        };
        if let Some(op) = compound_op {
            self.advance();
            let target = self.assign_target(expr)?;
            let value = self.expression()?;
            self.expect(&TokenKind::Semicolon, "';' after assignment")?;
            return Ok(Stmt::Compound(CompoundStmt { target, op, value }));
        }

        self.expect(&TokenKind::Semicolon, "';' after expression")?;
        Ok(Stmt::Expr(expr))
    }

    fn assign_target(&mut self, expr: Spanned<Expr>) -> ParseResult<AssignTarget> {
        match expr.node {
            Expr::Ident(name) => Ok(AssignTarget::Name(Spanned::new(name, expr.span))),
            Expr::Attr(object, field) => Ok(AssignTarget::Field {
                object: *object,
                field,
            }),
            Expr::Index(object, index) => Ok(AssignTarget::Index {
                object: *object,
                index: *index,
            }),
            _ => Err(Diagnostic::error(
                Code::UnexpectedToken,
                "invalid assignment target".to_string(),
                expr.span,
            )),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================
    //
    // Precedence (low to high): or, and, not, comparisons, + -, * / %,
    // ** (right-associative), unary -, call/index/attr, primary.

    pub(crate) fn expression(&mut self) -> ParseResult<Spanned<Expr>> {
        self.enter()?;
        let result = self.or_expr();
        self.leave();
        result
    }

    fn or_expr(&mut self) -> ParseResult<Spanned<Expr>> {
        let mut left = self.and_expr()?;
        while self.match_token(&TokenKind::Or) {
            let right = self.and_expr()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right)),
                span,
            );
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ParseResult<Spanned<Expr>> {
        let mut left = self.not_expr()?;
        while self.match_token(&TokenKind::And) {
            let right = self.not_expr()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right)),
                span,
            );
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> ParseResult<Spanned<Expr>> {
        if self.check(&TokenKind::Not) {
            let start = self.current_span().start;
            self.advance();
            let operand = self.not_expr()?;
            let span = Span::new(start, operand.span.end);
            return Ok(Spanned::new(Expr::Unary(UnaryOp::Not, Box::new(operand)), span));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Spanned<Expr>> {
        let mut left = self.additive()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => Some(BinaryOp::Eq),
                TokenKind::NotEq => Some(BinaryOp::NotEq),
                TokenKind::Lt => Some(BinaryOp::Lt),
                TokenKind::LtEq => Some(BinaryOp::LtEq),
                TokenKind::Gt => Some(BinaryOp::Gt),
                TokenKind::GtEq => Some(BinaryOp::GtEq),
                TokenKind::In => Some(BinaryOp::In),
                // `is` and `is not`
                TokenKind::Is => {
                    self.advance();
                    if self.match_token(&TokenKind::Not) {
                        Some(BinaryOp::IsNot)
                    } else {
                        Some(BinaryOp::Is)
                    }
                }
                // `not in`
                TokenKind::Not if matches!(self.peek_next().kind, TokenKind::In) => {
                    self.advance();
                    self.advance();
                    Some(BinaryOp::NotIn)
                }
                _ => None,
            };

            let Some(op) = op else { break };
            // `is`/`not in` consumed their tokens above; single-token
            // operators still need the advance.
            if matches!(
                op,
                BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq
                    | BinaryOp::In
            ) {
                self.advance();
            }

            let right = self.additive()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }

        Ok(left)
    }

    fn additive(&mut self) -> ParseResult<Spanned<Expr>> {
        let mut left = self.term()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }

        Ok(left)
    }

    fn term(&mut self) -> ParseResult<Spanned<Expr>> {
        let mut left = self.power()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.power()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }

        Ok(left)
    }

    /// `**` is right-associative and its operands are unary expressions,
    /// so `-2 ** 2` is `(-2) ** 2`.
    fn power(&mut self) -> ParseResult<Spanned<Expr>> {
        let base = self.unary()?;

        if self.match_token(&TokenKind::StarStar) {
            let exponent = self.power()?;
            let span = base.span.merge(exponent.span);
            return Ok(Spanned::new(
                Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)),
                span,
            ));
        }

        Ok(base)
    }

    fn unary(&mut self) -> ParseResult<Spanned<Expr>> {
        if self.check(&TokenKind::Minus) {
            let start = self.current_span().start;
            self.advance();
            let operand = self.unary()?;
            let span = Span::new(start, operand.span.end);
            return Ok(Spanned::new(Expr::Unary(UnaryOp::Neg, Box::new(operand)), span));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ParseResult<Spanned<Expr>> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&TokenKind::LParen) {
                let args = self.call_args()?;
                self.expect(&TokenKind::RParen, "')' after arguments")?;
                let span = Span::new(expr.span.start, self.previous().span.end);
                expr = Spanned::new(Expr::Call(Box::new(expr), args), span);
            } else if self.match_token(&TokenKind::LBracket) {
                match self.index_or_slice()? {
                    IndexOrSlice::Index(index) => {
                        self.expect(&TokenKind::RBracket, "']' after index")?;
                        let span = Span::new(expr.span.start, self.previous().span.end);
                        expr = Spanned::new(Expr::Index(Box::new(expr), Box::new(index)), span);
                    }
                    IndexOrSlice::Slice(slice) => {
                        self.expect(&TokenKind::RBracket, "']' after slice")?;
                        let span = Span::new(expr.span.start, self.previous().span.end);
                        expr = Spanned::new(Expr::Slice(Box::new(expr), slice), span);
                    }
                }
            } else if self.match_token(&TokenKind::Dot) {
                let name = self.identifier("attribute name")?;
                let span = Span::new(expr.span.start, name.span.end);
                expr = Spanned::new(Expr::Attr(Box::new(expr), name), span);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn call_args(&mut self) -> ParseResult<Vec<Spanned<Expr>>> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(args)
    }

    fn index_or_slice(&mut self) -> ParseResult<IndexOrSlice> {
        // `[:...]`: slice with open start
        if self.match_token(&TokenKind::Colon) {
            let end = if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            return Ok(IndexOrSlice::Slice(SliceExpr { start: None, end }));
        }

        let first = self.expression()?;

        if self.match_token(&TokenKind::Colon) {
            let end = if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            return Ok(IndexOrSlice::Slice(SliceExpr {
                start: Some(Box::new(first)),
                end,
            }));
        }

        Ok(IndexOrSlice::Index(first))
    }

    fn primary(&mut self) -> ParseResult<Spanned<Expr>> {
        let span = self.current_span();

        let expr = match &self.peek().kind {
            TokenKind::Int(v) => {
                let v = *v;
                self.advance();
                Expr::Literal(Literal::Int(v))
            }
            TokenKind::Float(v) => {
                let v = *v;
                self.advance();
                Expr::Literal(Literal::Float(v))
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Expr::Literal(Literal::Str(s))
            }
            TokenKind::FString(parts) => {
                let parts = parts.clone();
                self.advance();
                Expr::FString(self.fstring_parts(parts)?)
            }
            TokenKind::True => {
                self.advance();
                Expr::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Expr::Literal(Literal::Bool(false))
            }
            TokenKind::None => {
                self.advance();
                Expr::Literal(Literal::None)
            }
            TokenKind::SelfKw => {
                self.advance();
                Expr::SelfExpr
            }
            TokenKind::Super => {
                self.advance();
                self.expect(&TokenKind::LParen, "'(' after 'super'")?;
                let args = self.call_args()?;
                self.expect(&TokenKind::RParen, "')' after super arguments")?;
                return Ok(Spanned::new(
                    Expr::Super(args),
                    Span::new(span.start, self.previous().span.end),
                ));
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Expr::Ident(name)
            }
            TokenKind::LParen => {
                self.advance();
                let first = self.expression()?;
                if self.match_token(&TokenKind::Comma) {
                    // Tuple literal
                    let mut elems = vec![first];
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            elems.push(self.expression()?);
                            if !self.match_token(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "')' after tuple")?;
                    return Ok(Spanned::new(
                        Expr::Tuple(elems),
                        Span::new(span.start, self.previous().span.end),
                    ));
                }
                self.expect(&TokenKind::RParen, "')' after expression")?;
                return Ok(Spanned::new(
                    Expr::Paren(Box::new(first)),
                    Span::new(span.start, self.previous().span.end),
                ));
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elems = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elems.push(self.expression()?);
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "']' after list")?;
                return Ok(Spanned::new(
                    Expr::List(elems),
                    Span::new(span.start, self.previous().span.end),
                ));
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let key = self.expression()?;
                        self.expect(&TokenKind::Colon, "':' after dict key")?;
                        let value = self.expression()?;
                        entries.push((key, value));
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBrace, "'}' after dict")?;
                return Ok(Spanned::new(
                    Expr::Dict(entries),
                    Span::new(span.start, self.previous().span.end),
                ));
            }
            other => {
                return Err(Diagnostic::error(
                    Code::UnexpectedToken,
                    format!("unexpected token: {}", other.describe()),
                    span,
                ))
            }
        };

        Ok(Spanned::new(expr, Span::new(span.start, self.previous().span.end)))
    }

    // ========================================================================
    // f-strings
    // ========================================================================

    /// Convert raw lexer parts into parsed parts: each interior expression is
    /// re-lexed and parsed with the full expression grammar, spans shifted to
    /// the expression's position in the file.
    fn fstring_parts(&mut self, raw: Vec<RawFStringPart>) -> ParseResult<Vec<FStringPart>> {
        let mut parts = Vec::with_capacity(raw.len());

        for part in raw {
            match part {
                RawFStringPart::Literal(s) => parts.push(FStringPart::Literal(s)),
                RawFStringPart::Expr { source, offset, spec } => {
                    let expr = parse_embedded_expr(&source, offset)?;
                    let spec = match spec {
                        Some(raw_spec) => Some(parse_format_spec(&raw_spec, expr.span)?),
                        None => None,
                    };
                    parts.push(FStringPart::Expr { expr, spec });
                }
            }
        }

        Ok(parts)
    }
}

fn duplicate_modifier(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        Code::MalformedDeclaration,
        format!("duplicate '{}' modifier", name),
        span,
    )
}

/// Re-lex and parse one f-string interior expression.
///
/// The expression text is padded with leading whitespace up to its byte
/// offset in the file, so every span produced here is already file-absolute.
fn parse_embedded_expr(source: &str, offset: usize) -> ParseResult<Spanned<Expr>> {
    let whole_span = Span::new(offset, offset + source.len());

    let padded = format!("{}{}", " ".repeat(offset), source);
    let tokens = lexer::lex(&padded).map_err(|mut errs| errs.remove(0))?;

    let mut parser = Parser::new(&tokens);
    let expr = parser.expression()?;

    if !parser.is_at_end() {
        return Err(Diagnostic::error(
            Code::UnexpectedToken,
            "trailing input after f-string expression".to_string(),
            whole_span,
        ));
    }

    Ok(expr)
}

/// Parse a raw format spec: `.Nf` (fixed-point) or `.N%` (percent).
fn parse_format_spec(raw: &str, span: Span) -> ParseResult<FormatSpec> {
    let rest = raw.strip_prefix('.').ok_or_else(|| unsupported_spec(raw, span))?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let precision: usize = digits.parse().map_err(|_| unsupported_spec(raw, span))?;

    match &rest[digits.len()..] {
        "f" => Ok(FormatSpec::Fixed(precision)),
        "%" => Ok(FormatSpec::Percent(precision)),
        _ => Err(unsupported_spec(raw, span)),
    }
}

fn unsupported_spec(raw: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        Code::UnexpectedToken,
        format!("unsupported format spec '{}'", raw),
        span,
    )
}

/// Convenience function to parse a token stream.
#[tracing::instrument(skip_all, fields(token_count = tokens.len()))]
pub fn parse(tokens: &[Token]) -> (Program, Vec<Diagnostic>) {
    Parser::new(tokens).parse()
}

/// Parse source text, returning the program only when it is error-free.
/// Test and tool helper; the pipeline proper goes through [`parse`].
pub fn parse_source(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let tokens = lexer::lex(source)?;
    let (program, errors) = parse(&tokens);
    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse_source(source).unwrap_or_else(|errs| panic!("parse failed: {:?}", errs))
    }

    fn parse_errors(source: &str) -> Vec<Diagnostic> {
        match parse_source(source) {
            Ok(_) => panic!("expected parse errors"),
            Err(errs) => errs,
        }
    }

    #[test]
    fn test_interface_decl() {
        let program = parse_ok("interface Drawable { def draw() -> None; def area() -> float; }");
        assert_eq!(program.items.len(), 1);
        match &program.items[0].node {
            Item::Interface(iface) => {
                assert_eq!(iface.name.node, "Drawable");
                assert_eq!(iface.members.len(), 2);
            }
            other => panic!("expected interface, got {:?}", other),
        }
    }

    #[test]
    fn test_interface_extends_list() {
        let program = parse_ok("interface C extends A, B {}");
        match &program.items[0].node {
            Item::Interface(iface) => {
                let bases: Vec<_> = iface.extends.iter().map(|b| b.node.as_str()).collect();
                assert_eq!(bases, vec!["A", "B"]);
            }
            other => panic!("expected interface, got {:?}", other),
        }
    }

    #[test]
    fn test_class_modifiers_and_clauses() {
        let program = parse_ok(
            "abstract class Shape implements Drawable { abstract def area() -> float; }\n\
             final class Circle extends Shape { def area() -> float { return 3.14; } }",
        );
        match (&program.items[0].node, &program.items[1].node) {
            (Item::Class(shape), Item::Class(circle)) => {
                assert_eq!(shape.modifier, ClassModifier::Abstract);
                assert_eq!(shape.implements[0].node, "Drawable");
                assert_eq!(circle.modifier, ClassModifier::Final);
                assert_eq!(circle.extends.as_ref().unwrap().node, "Shape");
            }
            other => panic!("expected two classes, got {:?}", other),
        }
    }

    #[test]
    fn test_abstract_method_has_no_body() {
        let program = parse_ok("abstract class A { abstract def m() -> int; }");
        match &program.items[0].node {
            Item::Class(class) => match &class.members[0].node {
                Member::Method(m) => {
                    assert!(m.modifiers.is_abstract());
                    assert!(m.body.is_none());
                }
                other => panic!("expected method, got {:?}", other),
            },
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_static_field_member() {
        let program = parse_ok("class Counter { static count = 0; }");
        match &program.items[0].node {
            Item::Class(class) => match &class.members[0].node {
                Member::Field(f) => {
                    assert!(f.modifiers.is_static());
                    assert_eq!(f.name.node, "count");
                }
                other => panic!("expected field, got {:?}", other),
            },
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_free_function_and_call() {
        let program = parse_ok("def add(a: int, b: int) -> int { return a + b; } add(1, 2);");
        assert_eq!(program.items.len(), 2);
        assert!(matches!(program.items[1].node, Item::Stmt(Stmt::Expr(_))));
    }

    #[test]
    fn test_precedence_and_power_right_assoc() {
        let program = parse_ok("x = 2 ** 3 ** 2;");
        let Item::Stmt(Stmt::Assign(assign)) = &program.items[0].node else {
            panic!("expected assignment");
        };
        // 2 ** (3 ** 2)
        let Expr::Binary(_, BinaryOp::Pow, rhs) = &assign.value.node else {
            panic!("expected power, got {:?}", assign.value.node);
        };
        assert!(matches!(rhs.node, Expr::Binary(_, BinaryOp::Pow, _)));
    }

    #[test]
    fn test_not_in_and_is_not() {
        let program = parse_ok("a = x not in xs; b = y is not None;");
        let Item::Stmt(Stmt::Assign(a)) = &program.items[0].node else {
            panic!("expected assignment");
        };
        assert!(matches!(a.value.node, Expr::Binary(_, BinaryOp::NotIn, _)));
        let Item::Stmt(Stmt::Assign(b)) = &program.items[1].node else {
            panic!("expected assignment");
        };
        assert!(matches!(b.value.node, Expr::Binary(_, BinaryOp::IsNot, _)));
    }

    #[test]
    fn test_if_elif_else() {
        let program = parse_ok("if x > 0 { y = 1; } elif x < 0 { y = 2; } else { y = 3; }");
        let Item::Stmt(Stmt::If(if_stmt)) = &program.items[0].node else {
            panic!("expected if");
        };
        assert_eq!(if_stmt.elif_branches.len(), 1);
        assert!(if_stmt.else_body.is_some());
    }

    #[test]
    fn test_for_while_raise() {
        parse_ok(
            "for x in range(10) { total += x; }\n\
             while total > 0 { total -= 1; }\n\
             raise ValueError(\"bad\");",
        );
    }

    #[test]
    fn test_slice_with_negative_indices() {
        let program = parse_ok("y = xs[1:-1]; z = xs[:-2]; w = xs[2:];");
        let Item::Stmt(Stmt::Assign(assign)) = &program.items[0].node else {
            panic!("expected assignment");
        };
        assert!(matches!(assign.value.node, Expr::Slice(_, _)));
    }

    #[test]
    fn test_super_call_forms() {
        parse_ok(
            "class B extends A { def __init__(self) { super(); } \
             def m(self) -> int { return super().m(); } }",
        );
    }

    #[test]
    fn test_final_binding_vs_final_class() {
        let program = parse_ok("final x = 5; final class F {}");
        assert!(matches!(
            &program.items[0].node,
            Item::Stmt(Stmt::Assign(a)) if a.final_span.is_some()
        ));
        assert!(matches!(
            &program.items[1].node,
            Item::Class(c) if c.modifier == ClassModifier::Final
        ));
    }

    #[test]
    fn test_fstring_expr_with_spec() {
        let program = parse_ok(r#"msg = f"Area: {w * h:.2f}";"#);
        let Item::Stmt(Stmt::Assign(assign)) = &program.items[0].node else {
            panic!("expected assignment");
        };
        let Expr::FString(parts) = &assign.value.node else {
            panic!("expected f-string");
        };
        assert!(matches!(
            &parts[1],
            FStringPart::Expr { spec: Some(FormatSpec::Fixed(2)), .. }
        ));
    }

    #[test]
    fn test_fstring_percent_spec() {
        let program = parse_ok(r#"msg = f"{rate:.1%}";"#);
        let Item::Stmt(Stmt::Assign(assign)) = &program.items[0].node else {
            panic!("expected assignment");
        };
        let Expr::FString(parts) = &assign.value.node else {
            panic!("expected f-string");
        };
        assert!(matches!(
            &parts[0],
            FStringPart::Expr { spec: Some(FormatSpec::Percent(1)), .. }
        ));
    }

    #[test]
    fn test_unsupported_format_spec() {
        let errors = parse_errors(r#"msg = f"{x:>10}";"#);
        assert!(errors.iter().any(|e| e.code == Code::UnexpectedToken));
    }

    #[test]
    fn test_missing_brace_rejected() {
        // An unclosed block is an error, never implicitly closed.
        let errors = parse_errors("def f() { for x in xs { y = x; ");
        assert!(errors.iter().any(|e| e.code == Code::ExpectedToken));
    }

    #[test]
    fn test_recovery_collects_multiple_errors() {
        let errors = parse_errors("x = ; y = 2; z = ;");
        assert!(errors.len() >= 2, "expected two diagnostics, got {:?}", errors);
    }

    #[test]
    fn test_recovery_keeps_valid_items() {
        let tokens = lexer::lex("x = ; class Ok {}").unwrap();
        let (program, errors) = parse(&tokens);
        assert!(!errors.is_empty());
        assert!(program
            .items
            .iter()
            .any(|item| matches!(&item.node, Item::Class(c) if c.name.node == "Ok")));
    }

    #[test]
    fn test_annotated_assignment() {
        let program = parse_ok("count: int = 0;");
        let Item::Stmt(Stmt::Assign(assign)) = &program.items[0].node else {
            panic!("expected assignment");
        };
        assert_eq!(assign.ty.as_ref().unwrap().node.name, "int");
    }

    #[test]
    fn test_empty_class_and_interface_bodies() {
        parse_ok("class Empty {} interface Nothing {}");
    }

    #[test]
    fn test_import_statements() {
        parse_ok("import math.utils; from datetime import date, time;");
    }

    #[test]
    fn test_dict_and_tuple_literals() {
        parse_ok("d = {\"a\": 1, \"b\": 2}; t = (1, 2, 3); single = (1);");
    }

    #[test]
    fn test_depth_cap() {
        let source = format!("x = {}1{};", "(".repeat(600), ")".repeat(600));
        let errors = parse_errors(&source);
        assert!(errors.iter().any(|e| e.code == Code::MalformedDeclaration));
    }
}
