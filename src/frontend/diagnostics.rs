//! Diagnostics and error reporting for the Spy compiler
//!
//! Every diagnostic carries a stable code, a severity, and a span into the
//! source file. Rendering follows `file:line:col: severity[CODE]: message`
//! with a caret snippet of the offending line.

use std::fmt;

use crate::frontend::ast::Span;

/// Stable diagnostic codes. The names are part of the tool's output contract
/// and must not change between versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Code {
    // Lexical
    UnterminatedString,
    InvalidNumber,
    StrayCharacter,
    // Syntactic
    ExpectedToken,
    UnexpectedToken,
    MalformedDeclaration,
    // Resolution
    UnresolvedBase,
    DuplicateDeclaration,
    UndefinedName,
    // Inheritance
    InheritanceCycle,
    ExtendsFinalClass,
    ExtendsNonClass,
    ImplementsNonInterface,
    // Modifier
    AbstractInstantiation,
    ConcreteClassHasAbstractMembers,
    OverrideOfFinalMethod,
    AbstractAndFinal,
    StaticCannotBeAbstract,
    StaticUsesSelf,
    MissingSuperInit,
    OverrideSignatureMismatch,
    InterfaceHasBody,
    InterfaceHasField,
    FinalReassignment,
    // Runtime
    AttributeError,
    TypeError,
    ValueError,
    NotImplementedError,
    ZeroDivision,
    IndexError,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic with location information
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    pub span: Span,
    pub message: String,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(code: Code, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            span,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn warning(code: Code, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            span,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Hard cap on accumulated diagnostics to avoid runaway error floods.
pub const MAX_DIAGNOSTICS: usize = 1000;

/// Render a diagnostic to a string: header, location, source line, caret,
/// and (when `verbose`) note frames.
pub fn render(file_name: &str, source: &str, diag: &Diagnostic, verbose: bool) -> String {
    let (line_num, col_num, line_text) = line_info(source, diag.span.start);

    let mut out = format!(
        "{file}:{line}:{col}: {severity}[{code}]: {message}\n",
        file = file_name,
        line = line_num,
        col = col_num,
        severity = diag.severity,
        code = diag.code,
        message = diag.message,
    );

    // Caret snippet of the offending line
    let line_num_width = line_num.to_string().len();
    out.push_str(&format!(
        "  {:>width$} | {}\n",
        line_num,
        line_text,
        width = line_num_width
    ));

    let caret_len = if diag.span.end > diag.span.start {
        (diag.span.end - diag.span.start).min(line_text.len().saturating_sub(col_num - 1)).max(1)
    } else {
        1
    };
    out.push_str(&format!(
        "  {:>width$} | {}{}\n",
        "",
        " ".repeat(col_num - 1),
        "^".repeat(caret_len),
        width = line_num_width
    ));

    if verbose {
        for note in &diag.notes {
            out.push_str(&format!("  = note: {}\n", note));
        }
    }

    out
}

/// Print a diagnostic to standard error.
pub fn print_diagnostic(file_name: &str, source: &str, diag: &Diagnostic, verbose: bool) {
    eprint!("{}", render(file_name, source, diag, verbose));
}

/// Get 1-based line number, 1-based column number, and line text for a byte offset.
pub fn line_info(source: &str, offset: usize) -> (usize, usize, &str) {
    let offset = offset.min(source.len());
    let mut line_num = 1;
    let mut line_start = 0;

    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }

    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());

    (line_num, offset - line_start + 1, &source[line_start..line_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_info() {
        let source = "line 1\nline 2\nline 3";

        let (line, col, text) = line_info(source, 0);
        assert_eq!((line, col, text), (1, 1, "line 1"));

        let (line, col, text) = line_info(source, 7);
        assert_eq!((line, col, text), (2, 1, "line 2"));

        let (line, col, text) = line_info(source, 10);
        assert_eq!((line, col, text), (2, 4, "line 2"));
    }

    #[test]
    fn test_render_format() {
        let source = "final class F {}\nclass G extends F {}";
        let diag = Diagnostic::error(
            Code::ExtendsFinalClass,
            "class 'G' extends final class 'F'",
            Span::new(17, 18),
        );
        let rendered = render("demo.spc", source, &diag, false);
        assert!(rendered.starts_with("demo.spc:2:1: error[ExtendsFinalClass]:"));
        assert!(rendered.contains("class G extends F {}"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn test_notes_only_in_verbose() {
        let source = "x";
        let diag = Diagnostic::error(Code::UndefinedName, "name 'x' is not defined", Span::new(0, 1))
            .with_note("names must be declared before use");
        assert!(!render("t.spc", source, &diag, false).contains("note:"));
        assert!(render("t.spc", source, &diag, true).contains("= note: names must be declared"));
    }
}
