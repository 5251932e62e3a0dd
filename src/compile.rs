//! The compilation pipeline for a single `.spc` file.
//!
//! A [`Compilation`] owns everything produced for one source file: the text,
//! the AST, the type graph, and the diagnostic bag. Components run in a
//! straight line (lexer, parser, checker), each appending diagnostics and
//! handing partial results forward; the pipeline stops early only when
//! parsing yields zero usable top-level items.

use crate::frontend::ast::Program;
use crate::frontend::checker::{self, TypeGraph};
use crate::frontend::diagnostics::{self, Diagnostic, MAX_DIAGNOSTICS};
use crate::frontend::{lexer, parser};

/// Everything the pipeline produced for one source file.
#[derive(Debug)]
pub struct Compilation {
    pub file_name: String,
    pub source: String,
    pub program: Program,
    pub graph: TypeGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    /// Run the front end over `source`.
    ///
    /// A leading byte-order mark is tolerated and skipped.
    #[tracing::instrument(skip_all, fields(file = %file_name))]
    pub fn compile(file_name: &str, source: &str) -> Compilation {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source).to_string();

        let (tokens, mut diagnostics) = lexer::scan(&source);
        tracing::debug!(token_count = tokens.len(), "lexing complete");

        let (program, parse_diagnostics) = parser::parse(&tokens);
        diagnostics.extend(parse_diagnostics);
        tracing::debug!(item_count = program.items.len(), "parsing complete");

        let graph = if program.has_items() {
            let result = checker::check(&program);
            diagnostics.extend(result.diagnostics);
            result.graph
        } else {
            // Nothing parsed; there is no graph worth building.
            TypeGraph::default()
        };

        diagnostics.truncate(MAX_DIAGNOSTICS);

        Compilation {
            file_name: file_name.to_string(),
            source,
            program,
            graph,
            diagnostics,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    /// Print every diagnostic to standard error, in pipeline order.
    pub fn print_diagnostics(&self, verbose: bool) {
        for diag in &self.diagnostics {
            diagnostics::print_diagnostic(&self.file_name, &self.source, diag, verbose);
        }
    }
}
