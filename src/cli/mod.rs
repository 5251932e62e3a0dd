//! CLI for the Spy compiler
//!
//! ```text
//! spicy <input.spc> [-v|--verbose] [-o <output>] [--check-only] [--emit=run|check]
//! ```
//!
//! Exit codes: 0 success, 1 parse or checker errors (or an uncaught runtime
//! exception), 2 I/O error, 3 internal error. Command functions return a
//! [`CliResult`] instead of calling `process::exit`; only the top-level
//! [`run`] exits.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

use crate::compile::Compilation;
use crate::format;
use crate::frontend::diagnostics::{self, Diagnostic};
use crate::runtime;

// ============================================================================
// CLI error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// Diagnostics with error severity were emitted.
    pub const DIAGNOSTICS: ExitCode = ExitCode(1);
    pub const IO: ExitCode = ExitCode(2);
    pub const INTERNAL: ExitCode = ExitCode(3);
}

/// Error type for CLI operations: a user-facing message plus an exit code.
#[derive(Debug)]
pub struct CliError {
    pub message: String,
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::IO)
    }

    /// Failure whose detail was already printed (e.g. diagnostics).
    pub fn silent(exit_code: ExitCode) -> Self {
        Self::new("", exit_code)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap definition
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitMode {
    /// Check, then execute the program
    Run,
    /// Stop after the modifier checker
    Check,
}

/// The Spy language compiler and runtime
#[derive(Parser, Debug)]
#[command(name = "spicy")]
#[command(version)]
#[command(about = "Compile and run Spy (.spc) programs", long_about = None)]
pub struct Cli {
    /// Source file to compile
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Add note frames to printed diagnostics
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Write the canonical form of the program to this file
    #[arg(short = 'o', long = "output", value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Stop after checking (same as --emit=check)
    #[arg(long = "check-only")]
    pub check_only: bool,

    /// Pipeline stage to stop at
    #[arg(long = "emit", value_enum, default_value = "run")]
    pub emit: EmitMode,
}

/// Parse arguments, execute, and exit with the appropriate code.
pub fn run() {
    let cli = Cli::parse();

    let outcome = std::panic::catch_unwind(move || execute(&cli));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            if !err.message.is_empty() {
                eprintln!("spicy: {}", err.message);
            }
            process::exit(err.exit_code.0);
        }
        Err(_) => {
            eprintln!("spicy: internal error");
            process::exit(ExitCode::INTERNAL.0);
        }
    }
}

fn execute(cli: &Cli) -> CliResult<()> {
    let file_name = cli.input.display().to_string();
    let source = fs::read_to_string(&cli.input)
        .map_err(|e| CliError::io(format!("cannot read '{}': {}", file_name, e)))?;

    let compilation = Compilation::compile(&file_name, &source);
    compilation.print_diagnostics(cli.verbose);

    if compilation.has_errors() {
        return Err(CliError::silent(ExitCode::DIAGNOSTICS));
    }

    if let Some(output) = &cli.output {
        let canonical = format::print_canonical(&compilation.program);
        fs::write(output, canonical)
            .map_err(|e| CliError::io(format!("cannot write '{}': {}", output.display(), e)))?;
    }

    if cli.check_only || cli.emit == EmitMode::Check {
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = runtime::run(&compilation.program, &compilation.graph, &mut out) {
        // An uncaught exception terminates the program with a diagnostic.
        let diag = uncaught_diagnostic(&err);
        diagnostics::print_diagnostic(&compilation.file_name, &compilation.source, &diag, cli.verbose);
        return Err(CliError::silent(ExitCode::DIAGNOSTICS));
    }

    Ok(())
}

fn uncaught_diagnostic(err: &runtime::SpyError) -> Diagnostic {
    Diagnostic::error(err.code, format!("uncaught exception: {}", err.message), err.span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_emit_flag_parses() {
        let cli = Cli::parse_from(["spicy", "prog.spc", "--emit=check"]);
        assert_eq!(cli.emit, EmitMode::Check);
        assert!(!cli.check_only);

        let cli = Cli::parse_from(["spicy", "prog.spc", "--check-only", "-v"]);
        assert!(cli.check_only);
        assert!(cli.verbose);
    }
}
