//! String and f-string scanning for the Spy lexer

use super::tokens::{RawFStringPart, TokenKind};
use super::Lexer;
use crate::frontend::ast::Span;
use crate::frontend::diagnostics::Code;

/// Result of processing an escape sequence
enum EscapeResult {
    /// Successfully parsed escape character
    Char(char),
    /// Unknown escape - preserve as-is (backslash + char)
    Unknown(char),
    /// End of input during escape
    Eof,
}

impl<'a> Lexer<'a> {
    /// Process a text escape sequence. Called after consuming the backslash.
    fn scan_text_escape(&mut self, quote: char) -> EscapeResult {
        match self.advance() {
            Some('n') => EscapeResult::Char('\n'),
            Some('t') => EscapeResult::Char('\t'),
            Some('r') => EscapeResult::Char('\r'),
            Some('\\') => EscapeResult::Char('\\'),
            Some(q) if q == quote => EscapeResult::Char(q),
            Some(c) => EscapeResult::Unknown(c),
            None => EscapeResult::Eof,
        }
    }

    pub(super) fn scan_string(&mut self, start: usize, quote: char) {
        let mut value = String::new();

        loop {
            match self.peek() {
                None => {
                    self.push_error(
                        Code::UnterminatedString,
                        "unterminated string".to_string(),
                        Span::new(start, self.position()),
                    );
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    self.push_error(
                        Code::UnterminatedString,
                        "unterminated string (newline before closing quote)".to_string(),
                        Span::new(start, self.position()),
                    );
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.scan_text_escape(quote) {
                        EscapeResult::Char(c) => value.push(c),
                        EscapeResult::Unknown(c) => {
                            value.push('\\');
                            value.push(c);
                        }
                        EscapeResult::Eof => {
                            self.push_error(
                                Code::UnterminatedString,
                                "unterminated escape sequence".to_string(),
                                Span::new(start, self.position()),
                            );
                            break;
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        self.add_token(TokenKind::Str(value), start);
    }

    pub(super) fn scan_fstring(&mut self, start: usize, quote: char) {
        let mut parts = Vec::new();
        let mut literal = String::new();

        loop {
            match self.peek() {
                None => {
                    self.push_error(
                        Code::UnterminatedString,
                        "unterminated f-string".to_string(),
                        Span::new(start, self.position()),
                    );
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('{') => {
                    self.advance();
                    if self.peek() == Some('{') {
                        // Escaped brace
                        self.advance();
                        literal.push('{');
                    } else {
                        if !literal.is_empty() {
                            parts.push(RawFStringPart::Literal(std::mem::take(&mut literal)));
                        }
                        parts.push(self.scan_fstring_expr());
                    }
                }
                Some('}') => {
                    self.advance();
                    if self.peek() == Some('}') {
                        self.advance();
                        literal.push('}');
                    } else {
                        self.push_error(
                            Code::UnterminatedString,
                            "unmatched '}' in f-string".to_string(),
                            Span::new(start, self.position()),
                        );
                    }
                }
                Some('\\') => {
                    self.advance();
                    match self.scan_text_escape(quote) {
                        EscapeResult::Char(c) => literal.push(c),
                        EscapeResult::Unknown(c) => {
                            literal.push('\\');
                            literal.push(c);
                        }
                        EscapeResult::Eof => {
                            self.push_error(
                                Code::UnterminatedString,
                                "unterminated escape in f-string".to_string(),
                                Span::new(start, self.position()),
                            );
                            break;
                        }
                    }
                }
                Some('\n') => {
                    self.push_error(
                        Code::UnterminatedString,
                        "unterminated f-string".to_string(),
                        Span::new(start, self.position()),
                    );
                    break;
                }
                Some(c) => {
                    literal.push(c);
                    self.advance();
                }
            }
        }

        if !literal.is_empty() {
            parts.push(RawFStringPart::Literal(literal));
        }

        self.add_token(TokenKind::FString(parts), start);
    }

    /// Scan one brace-delimited f-string expression, already past the `{`.
    ///
    /// Nested braces are balanced by counting. A `:` at depth one (and
    /// outside `[`/`(` groups) starts the format spec.
    fn scan_fstring_expr(&mut self) -> RawFStringPart {
        let offset = self.position();
        let mut source = String::new();
        let mut spec: Option<String> = None;
        let mut brace_depth = 1usize;
        let mut group_depth = 0usize;
        let mut in_spec = false;

        loop {
            match self.peek() {
                None => break,
                Some('{') => {
                    self.advance();
                    brace_depth += 1;
                    if in_spec {
                        spec.get_or_insert_with(String::new).push('{');
                    } else {
                        source.push('{');
                    }
                }
                Some('}') => {
                    self.advance();
                    brace_depth -= 1;
                    if brace_depth == 0 {
                        break;
                    }
                    if in_spec {
                        spec.get_or_insert_with(String::new).push('}');
                    } else {
                        source.push('}');
                    }
                }
                Some(c) => {
                    self.advance();
                    if c == ':' && brace_depth == 1 && group_depth == 0 && !in_spec {
                        in_spec = true;
                        spec = Some(String::new());
                        continue;
                    }
                    if matches!(c, '[' | '(') {
                        group_depth += 1;
                    } else if matches!(c, ']' | ')') {
                        group_depth = group_depth.saturating_sub(1);
                    }
                    if in_spec {
                        spec.get_or_insert_with(String::new).push(c);
                    } else {
                        source.push(c);
                    }
                }
            }
        }

        RawFStringPart::Expr { source, offset, spec }
    }
}
