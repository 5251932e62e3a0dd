//! Lexer for the Spy programming language
//!
//! Handles tokenization including:
//! - Keywords (interface, class, abstract, final, static, extends, ...)
//! - Identifiers and literals (int, float, string, f-string)
//! - Operators and punctuation
//!
//! Blocks are braced and statements end with `;`, so newlines are plain
//! whitespace: there is no indentation tracking and no newline token.
//!
//! ## Module Structure
//!
//! - `tokens` - Token types (TokenKind, Token, RawFStringPart)
//! - `strings` - String and f-string scanning
//! - `numbers` - Numeric literal scanning

mod numbers;
mod strings;
pub mod tokens;

pub use tokens::{RawFStringPart, Token, TokenKind};

use crate::frontend::ast::Span;
use crate::frontend::diagnostics::{Code, Diagnostic};
use tokens::KEYWORDS;

/// Lexer for Spy source code.
///
/// Converts source text into a stream of tokens. Lexical failures are
/// accumulated (not fatal) so the scanner can report every bad byte in a
/// single pass; the token stream always ends with an `Eof` token.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    tokens: Vec<Token>,
    errors: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source code.
    ///
    /// Scanning continues past bad bytes, so the token stream and the
    /// diagnostics are both complete; the stream always ends with `Eof`.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while !self.is_at_end() {
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            Span::new(self.current_pos, self.current_pos),
        ));

        (self.tokens, self.errors)
    }

    // ========================================================================
    // Core character handling
    // ========================================================================

    fn is_at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    pub(super) fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    pub(super) fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.current_pos..].chars();
        iter.next(); // skip current
        iter.next()
    }

    pub(super) fn advance(&mut self) -> Option<char> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }

    pub(super) fn position(&self) -> usize {
        self.current_pos
    }

    pub(super) fn push_error(&mut self, code: Code, message: String, span: Span) {
        self.errors.push(Diagnostic::error(code, message, span));
    }

    // ========================================================================
    // Main scanning dispatch
    // ========================================================================

    fn scan_token(&mut self) {
        // Whitespace, including newlines, is insignificant between tokens.
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }

        let start = self.current_pos;

        let Some(c) = self.advance() else {
            return;
        };

        match c {
            // Comments: `#` to end of line, discarded
            '#' => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            }

            // Operators and punctuation
            '+' => self.operator(start, TokenKind::Plus, &[('=', TokenKind::PlusEq)]),
            '-' => self.operator(
                start,
                TokenKind::Minus,
                &[('>', TokenKind::Arrow), ('=', TokenKind::MinusEq)],
            ),
            '*' => self.operator(
                start,
                TokenKind::Star,
                &[('*', TokenKind::StarStar), ('=', TokenKind::StarEq)],
            ),
            '/' => self.operator(start, TokenKind::Slash, &[('=', TokenKind::SlashEq)]),
            '%' => self.add_token(TokenKind::Percent, start),
            '=' => self.operator(start, TokenKind::Assign, &[('=', TokenKind::EqEq)]),
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::NotEq, start);
                } else {
                    self.push_error(
                        Code::StrayCharacter,
                        "unexpected character '!'".to_string(),
                        Span::new(start, self.current_pos),
                    );
                }
            }
            '<' => self.operator(start, TokenKind::Lt, &[('=', TokenKind::LtEq)]),
            '>' => self.operator(start, TokenKind::Gt, &[('=', TokenKind::GtEq)]),
            '(' => self.add_token(TokenKind::LParen, start),
            ')' => self.add_token(TokenKind::RParen, start),
            '[' => self.add_token(TokenKind::LBracket, start),
            ']' => self.add_token(TokenKind::RBracket, start),
            '{' => self.add_token(TokenKind::LBrace, start),
            '}' => self.add_token(TokenKind::RBrace, start),
            ',' => self.add_token(TokenKind::Comma, start),
            ':' => self.add_token(TokenKind::Colon, start),
            ';' => self.add_token(TokenKind::Semicolon, start),
            '.' => self.add_token(TokenKind::Dot, start),

            // Strings
            '"' => self.scan_string(start, '"'),
            '\'' => self.scan_string(start, '\''),

            // f-strings
            'f' if self.peek() == Some('"') || self.peek() == Some('\'') => {
                // Safe: peek just confirmed a quote follows
                let quote = self.advance().expect("f-string quote after peek check");
                self.scan_fstring(start, quote);
            }

            // Numbers
            '0'..='9' => self.scan_number(start, c),

            // Identifiers and keywords
            _ if is_ident_start(c) => self.scan_identifier(start, c),

            _ => {
                self.push_error(
                    Code::StrayCharacter,
                    format!("unexpected character '{}'", c),
                    Span::new(start, self.current_pos),
                );
            }
        }
    }

    // ========================================================================
    // Operator helpers
    // ========================================================================

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn add_token(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token::new(kind, Span::new(start, self.current_pos)));
    }

    /// Try to match a compound operator, falling back to the simple one.
    fn operator(&mut self, start: usize, simple: TokenKind, compounds: &[(char, TokenKind)]) {
        for (c, kind) in compounds {
            if self.match_char(*c) {
                self.add_token(kind.clone(), start);
                return;
            }
        }
        self.add_token(simple, start);
    }

    // ========================================================================
    // Identifier scanning
    // ========================================================================

    fn scan_identifier(&mut self, start: usize, first: char) {
        let mut name = String::from(first);

        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = KEYWORDS.get(name.as_str()).cloned().unwrap_or(TokenKind::Ident(name));

        self.add_token(kind, start);
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Check if a character can start an identifier (Unicode letter or underscore).
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Check if a character can continue an identifier.
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenize a source string, returning tokens and diagnostics together.
///
/// This is the pipeline entry point: even with lexical errors the partial
/// token stream is usable downstream.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn scan(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).tokenize()
}

/// Convenience function to lex a source string, failing on any error.
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let (tokens, errors) = scan(source);
    if errors.is_empty() {
        Ok(tokens)
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

    #[test]
    fn test_keywords() {
        let tokens = lex("interface class abstract final static extends implements def").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Interface));
        assert!(matches!(tokens[1].kind, TokenKind::Class));
        assert!(matches!(tokens[2].kind, TokenKind::Abstract));
        assert!(matches!(tokens[3].kind, TokenKind::Final));
        assert!(matches!(tokens[4].kind, TokenKind::Static));
        assert!(matches!(tokens[5].kind, TokenKind::Extends));
        assert!(matches!(tokens[6].kind, TokenKind::Implements));
        assert!(matches!(tokens[7].kind, TokenKind::Def));
    }

    #[test]
    fn test_operators() {
        let tokens = lex("+ - * / % ** -> == != <= >= += ;").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Plus));
        assert!(matches!(tokens[1].kind, TokenKind::Minus));
        assert!(matches!(tokens[2].kind, TokenKind::Star));
        assert!(matches!(tokens[3].kind, TokenKind::Slash));
        assert!(matches!(tokens[4].kind, TokenKind::Percent));
        assert!(matches!(tokens[5].kind, TokenKind::StarStar));
        assert!(matches!(tokens[6].kind, TokenKind::Arrow));
        assert!(matches!(tokens[7].kind, TokenKind::EqEq));
        assert!(matches!(tokens[8].kind, TokenKind::NotEq));
        assert!(matches!(tokens[9].kind, TokenKind::LtEq));
        assert!(matches!(tokens[10].kind, TokenKind::GtEq));
        assert!(matches!(tokens[11].kind, TokenKind::PlusEq));
        assert!(matches!(tokens[12].kind, TokenKind::Semicolon));
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("42 3.5 0").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Int(42)));
        assert!(matches!(tokens[1].kind, TokenKind::Float(f) if (f - 3.5).abs() < 1e-9));
        assert!(matches!(tokens[2].kind, TokenKind::Int(0)));
    }

    #[test]
    fn test_strings() {
        let tokens = lex(r#""hello" 'world'"#).unwrap();
        assert!(matches!(&tokens[0].kind, TokenKind::Str(s) if s == "hello"));
        assert!(matches!(&tokens[1].kind, TokenKind::Str(s) if s == "world"));
    }

    #[test]
    fn test_newlines_are_whitespace() {
        let tokens = lex("a\n=\n1\n;").unwrap();
        assert_eq!(tokens.len(), 5); // a = 1 ; EOF
        assert!(matches!(&tokens[0].kind, TokenKind::Ident(s) if s == "a"));
        assert!(matches!(tokens[3].kind, TokenKind::Semicolon));
    }

    #[test]
    fn test_comment_discarded() {
        let tokens = lex("x = 1; # trailing comment\ny = 2;").unwrap();
        let idents: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Ident(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec!["x", "y"]);
    }

    #[test]
    fn test_fstring_parts() {
        let tokens = lex(r#"f"Area: {area:.2f}!""#).unwrap();
        match &tokens[0].kind {
            TokenKind::FString(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[0], RawFStringPart::Literal(s) if s == "Area: "));
                assert!(matches!(
                    &parts[1],
                    RawFStringPart::Expr { source, spec: Some(spec), .. }
                        if source == "area" && spec == ".2f"
                ));
                assert!(matches!(&parts[2], RawFStringPart::Literal(s) if s == "!"));
            }
            other => panic!("Expected FString token, got {:?}", other),
        }
    }

    #[test]
    fn test_fstring_nested_braces() {
        // Braces inside the expression are balanced by counting.
        let tokens = lex(r#"f"{d['k']} and {{literal}}""#).unwrap();
        match &tokens[0].kind {
            TokenKind::FString(parts) => {
                assert!(matches!(
                    &parts[0],
                    RawFStringPart::Expr { source, .. } if source == "d['k']"
                ));
                assert!(matches!(&parts[1], RawFStringPart::Literal(s) if s == " and {literal}"));
            }
            other => panic!("Expected FString token, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string() {
        let errors = lex(r#""oops"#).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, Code::UnterminatedString);
    }

    #[test]
    fn test_stray_character() {
        let errors = lex("x = 1 @ 2;").unwrap_err();
        assert_eq!(errors[0].code, Code::StrayCharacter);
    }

    #[test]
    fn test_invalid_number() {
        let errors = lex("x = 12abc;").unwrap_err();
        assert_eq!(errors[0].code, Code::InvalidNumber);
    }

    #[test]
    fn test_attribute_on_int_is_not_a_float() {
        let tokens = lex("xs.copy();").unwrap();
        assert!(matches!(&tokens[0].kind, TokenKind::Ident(s) if s == "xs"));
        assert!(matches!(tokens[1].kind, TokenKind::Dot));
    }

    #[test]
    fn test_unicode_identifier_accepted() {
        let tokens = lex("área = 1;").unwrap();
        assert!(matches!(&tokens[0].kind, TokenKind::Ident(s) if s == "área"));
    }

    #[test]
    fn test_lexing_continues_past_bad_byte() {
        let errors = lex("x = @; y = $;").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.code == Code::StrayCharacter));
    }
}
