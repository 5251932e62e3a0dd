//! Abstract syntax tree definitions for Spy
//!
//! Blocks are brace-delimited and statements end with `;`, so there are no
//! layout artifacts in the tree; every node carries a byte-offset span.

use std::fmt;

/// Source location span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A node with source location
#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Equality is structural: spans are bookkeeping, not meaning. Parsing a
/// program, printing it canonically, and re-parsing the output yields an
/// equal tree even though every span moved.
impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<T: Eq> Eq for Spanned<T> {}

pub type Ident = String;

/// A program is a sequence of top-level items
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Spanned<Item>>,
}

impl Program {
    /// True when the program contains at least one declaration or statement.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }
}

/// Top-level items
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Interface(InterfaceDecl),
    Class(ClassDecl),
    Function(FunctionDecl),
    Stmt(Stmt),
}

// ============================================================================
// Interfaces
// ============================================================================

/// `interface I extends A, B { def f() -> int; }`
///
/// Members are parsed generously (bodies and fields are syntactically
/// admitted) so the checker can report interface-purity violations with
/// precise spans instead of the parser bailing out.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: Spanned<Ident>,
    pub extends: Vec<Spanned<Ident>>,
    pub members: Vec<Spanned<Member>>,
}

// ============================================================================
// Classes
// ============================================================================

/// Class-level modifier: at most one of `abstract` / `final`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassModifier {
    #[default]
    Concrete,
    Abstract,
    Final,
}

impl fmt::Display for ClassModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassModifier::Concrete => Ok(()),
            ClassModifier::Abstract => write!(f, "abstract"),
            ClassModifier::Final => write!(f, "final"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub modifier: ClassModifier,
    pub name: Spanned<Ident>,
    pub extends: Option<Spanned<Ident>>,
    pub implements: Vec<Spanned<Ident>>,
    pub members: Vec<Spanned<Member>>,
}

/// Per-member modifier set with the spans of the modifier keywords
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub abstract_span: Option<Span>,
    pub final_span: Option<Span>,
    pub static_span: Option<Span>,
}

impl PartialEq for Modifiers {
    fn eq(&self, other: &Self) -> bool {
        self.is_abstract() == other.is_abstract()
            && self.is_final() == other.is_final()
            && self.is_static() == other.is_static()
    }
}

impl Eq for Modifiers {}

impl Modifiers {
    pub fn is_abstract(&self) -> bool {
        self.abstract_span.is_some()
    }

    pub fn is_final(&self) -> bool {
        self.final_span.is_some()
    }

    pub fn is_static(&self) -> bool {
        self.static_span.is_some()
    }

    pub fn any(&self) -> bool {
        self.is_abstract() || self.is_final() || self.is_static()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Method(MethodDecl),
    Field(FieldDecl),
}

/// `[abstract|final|static]* def name(params) -> type (; | { ... })`
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub modifiers: Modifiers,
    pub name: Spanned<Ident>,
    pub params: Vec<Spanned<Param>>,
    pub return_type: Option<Spanned<TypeExpr>>,
    /// `None` for abstract methods (signature terminated with `;`)
    pub body: Option<Vec<Spanned<Stmt>>>,
}

impl MethodDecl {
    /// `__init__` is the constructor marker.
    pub fn is_constructor(&self) -> bool {
        self.name.node == "__init__"
    }
}

/// Class-level field: `[static|final]? name (: type)? = expr;`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub name: Spanned<Ident>,
    pub ty: Option<Spanned<TypeExpr>>,
    pub value: Spanned<Expr>,
}

// ============================================================================
// Functions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Spanned<Ident>,
    pub params: Vec<Spanned<Param>>,
    pub return_type: Option<Spanned<TypeExpr>>,
    pub body: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<Spanned<TypeExpr>>,
    pub default: Option<Spanned<Expr>>,
}

impl Param {
    pub fn is_receiver(&self) -> bool {
        self.name == "self"
    }
}

// ============================================================================
// Types
// ============================================================================

/// Nominal type reference: `int`, `str`, `list[int]`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub name: Ident,
    pub args: Vec<Spanned<TypeExpr>>,
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg.node)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression statement: `expr;`
    Expr(Spanned<Expr>),
    /// `target = value;`, `final x = value;`, `x: int = value;`
    Assign(AssignStmt),
    /// Compound assignment: `target += value;` etc.
    Compound(CompoundStmt),
    /// `return expr?;`
    Return(Option<Spanned<Expr>>),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    /// `pass;`
    Pass,
    /// `raise expr;`
    Raise(Spanned<Expr>),
    /// `import a.b;` / `from a import b, c;`: recorded, inert at runtime
    Import(ImportStmt),
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    /// Span of the `final` keyword when the binding is final
    pub final_span: Option<Span>,
    pub target: AssignTarget,
    pub ty: Option<Spanned<TypeExpr>>,
    pub value: Spanned<Expr>,
}

impl PartialEq for AssignStmt {
    fn eq(&self, other: &Self) -> bool {
        self.final_span.is_some() == other.final_span.is_some()
            && self.target == other.target
            && self.ty == other.ty
            && self.value == other.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundStmt {
    pub target: AssignTarget,
    pub op: BinaryOp,
    pub value: Spanned<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(Spanned<Ident>),
    /// `obj.field = ...` (including `self.field = ...`)
    Field {
        object: Spanned<Expr>,
        field: Spanned<Ident>,
    },
    /// `obj[index] = ...`
    Index {
        object: Spanned<Expr>,
        index: Spanned<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Spanned<Expr>,
    pub then_body: Vec<Spanned<Stmt>>,
    pub elif_branches: Vec<(Spanned<Expr>, Vec<Spanned<Stmt>>)>,
    pub else_body: Option<Vec<Spanned<Stmt>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub cond: Spanned<Expr>,
    pub body: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub var: Spanned<Ident>,
    pub iter: Spanned<Expr>,
    pub body: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    /// Dotted module path
    pub module: Vec<Spanned<Ident>>,
    /// Items for `from module import a, b`; empty for plain `import module`
    pub items: Vec<Spanned<Ident>>,
}

// ============================================================================
// Expressions
// ============================================================================

/// Slice bounds: `start:end` with either side optional
#[derive(Debug, Clone, PartialEq)]
pub struct SliceExpr {
    pub start: Option<Box<Spanned<Expr>>>,
    pub end: Option<Box<Spanned<Expr>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    Literal(Literal),
    SelfExpr,
    /// `super(args)`: parent constructor when called bare, ancestor
    /// dispatch base when followed by `.method(...)`
    Super(Vec<Spanned<Expr>>),
    Binary(Box<Spanned<Expr>>, BinaryOp, Box<Spanned<Expr>>),
    Unary(UnaryOp, Box<Spanned<Expr>>),
    /// Function, constructor, or method call: callee may be an `Attr`
    Call(Box<Spanned<Expr>>, Vec<Spanned<Expr>>),
    Index(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    Slice(Box<Spanned<Expr>>, SliceExpr),
    /// Attribute access: `x.field`, `ClassName.member`
    Attr(Box<Spanned<Expr>>, Spanned<Ident>),
    FString(Vec<FStringPart>),
    List(Vec<Spanned<Expr>>),
    Tuple(Vec<Spanned<Expr>>),
    Dict(Vec<(Spanned<Expr>, Spanned<Expr>)>),
    Paren(Box<Spanned<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    Expr {
        expr: Spanned<Expr>,
        spec: Option<FormatSpec>,
    },
}

/// Format spec after `:` inside an f-string brace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    /// `.Nf`: fixed-point with N fractional digits
    Fixed(usize),
    /// `.N%`: percentage with N fractional digits
    Percent(usize),
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSpec::Fixed(n) => write!(f, ".{}f", n),
            FormatSpec::Percent(n) => write!(f, ".{}%", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    In,
    NotIn,
    Is,
    IsNot,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Is => "is",
            BinaryOp::IsNot => "is not",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "not"),
        }
    }
}
