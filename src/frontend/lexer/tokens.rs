//! Token types for the Spy lexer

use crate::frontend::ast::Span;
use phf::phf_map;

// ============================================================================
// TOKEN TYPES
// ============================================================================

/// Token types for Spy
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ========== Keywords ==========
    Interface,  // interface declaration
    Class,      // class declaration
    Abstract,   // abstract modifier
    Final,      // final modifier
    Static,     // static modifier
    Extends,    // base class / base interface clause
    Implements, // interface list clause
    Def,        // function/method definition
    Return,     // return statement
    If,         // if statement
    Elif,       // elif branch
    Else,       // else branch
    For,        // for loop
    In,         // in operator / loop clause
    While,      // while loop
    Not,        // logical not
    And,        // logical and
    Or,         // logical or
    Is,         // identity comparison
    None,       // None literal
    True,       // True literal
    False,      // False literal
    SelfKw,     // self receiver
    Super,      // parent-class access
    Pass,       // pass statement
    Raise,      // raise statement
    Import,     // import statement
    From,       // from-import statement

    // ========== Identifiers and Literals ==========
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    FString(Vec<RawFStringPart>),

    // ========== Operators ==========
    Plus,      // +
    Minus,     // -
    Star,      // *
    StarStar,  // ** (power)
    Slash,     // /
    Percent,   // % (modulo)
    Assign,    // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    EqEq,      // ==
    NotEq,     // !=
    Lt,        // <
    LtEq,      // <=
    Gt,        // >
    GtEq,      // >=
    Arrow,     // ->

    // ========== Delimiters ==========
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    LBrace,    // {
    RBrace,    // }
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Dot,       // .

    // ========== Special ==========
    Eof, // end of file
}

impl TokenKind {
    /// Short human-readable form for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(v) => format!("integer literal {}", v),
            TokenKind::Float(v) => format!("float literal {}", v),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::FString(_) => "f-string literal".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("'{}'", other.lexeme()),
        }
    }

    /// Canonical lexeme for fixed tokens; empty for literals.
    pub fn lexeme(&self) -> &'static str {
        match self {
            TokenKind::Interface => "interface",
            TokenKind::Class => "class",
            TokenKind::Abstract => "abstract",
            TokenKind::Final => "final",
            TokenKind::Static => "static",
            TokenKind::Extends => "extends",
            TokenKind::Implements => "implements",
            TokenKind::Def => "def",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::While => "while",
            TokenKind::Not => "not",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Is => "is",
            TokenKind::None => "None",
            TokenKind::True => "True",
            TokenKind::False => "False",
            TokenKind::SelfKw => "self",
            TokenKind::Super => "super",
            TokenKind::Pass => "pass",
            TokenKind::Raise => "raise",
            TokenKind::Import => "import",
            TokenKind::From => "from",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Assign => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Arrow => "->",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            _ => "",
        }
    }
}

/// Raw f-string part as produced by the lexer.
///
/// Interior expressions are stored as raw source text with the offset of the
/// opening brace; the parser re-lexes them so the full expression grammar is
/// available inside braces.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFStringPart {
    Literal(String),
    Expr {
        source: String,
        /// Byte offset of the expression text within the file
        offset: usize,
        /// Raw format spec after `:` (e.g. `.2f`), if any
        spec: Option<String>,
    },
}

/// Keyword lookup table using a perfect hash map for O(1) lookup.
///
/// Maps source text to `TokenKind` variants; the lexer consults it after
/// scanning an identifier.
pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "interface" => TokenKind::Interface,
    "class" => TokenKind::Class,
    "abstract" => TokenKind::Abstract,
    "final" => TokenKind::Final,
    "static" => TokenKind::Static,
    "extends" => TokenKind::Extends,
    "implements" => TokenKind::Implements,
    "def" => TokenKind::Def,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "while" => TokenKind::While,
    "not" => TokenKind::Not,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "is" => TokenKind::Is,
    "None" => TokenKind::None,
    "True" => TokenKind::True,
    "False" => TokenKind::False,
    "self" => TokenKind::SelfKw,
    "super" => TokenKind::Super,
    "pass" => TokenKind::Pass,
    "raise" => TokenKind::Raise,
    "import" => TokenKind::Import,
    "from" => TokenKind::From,
};

/// A token with its kind and span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
