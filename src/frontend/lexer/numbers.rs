//! Number scanning for the Spy lexer

use super::tokens::TokenKind;
use super::Lexer;
use crate::frontend::ast::Span;
use crate::frontend::diagnostics::Code;

impl<'a> Lexer<'a> {
    pub(super) fn scan_number(&mut self, start: usize, first: char) {
        let mut value = String::from(first);
        let mut is_float = false;

        // Integer part
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // Decimal part: only when a digit follows the dot, so `xs.copy` and
        // attribute access on integers keep their meaning.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            value.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    value.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        // A digit run immediately followed by an identifier character is a
        // malformed literal, e.g. `12abc`.
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            while let Some(c) = self.peek() {
                if c.is_alphanumeric() || c == '_' {
                    value.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            self.push_error(
                Code::InvalidNumber,
                format!("invalid numeric literal '{}'", value),
                Span::new(start, self.position()),
            );
            return;
        }

        if is_float {
            match value.parse::<f64>() {
                Ok(f) => self.add_token(TokenKind::Float(f), start),
                Err(_) => self.push_error(
                    Code::InvalidNumber,
                    format!("invalid float literal '{}'", value),
                    Span::new(start, self.position()),
                ),
            }
        } else {
            match value.parse::<i64>() {
                Ok(i) => self.add_token(TokenKind::Int(i), start),
                Err(_) => self.push_error(
                    Code::InvalidNumber,
                    format!("invalid integer literal '{}'", value),
                    Span::new(start, self.position()),
                ),
            }
        }
    }
}
