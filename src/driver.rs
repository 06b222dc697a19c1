//! Pipeline orchestration: source string in, one artifact out.
//!
//! Each stage consumes its predecessor's immutable output; nothing survives
//! a run. Diagnostics go to the diagnostics sink in a single consistent
//! form, the requested artifact to the output sink, and the exit code is
//! non-zero as soon as any diagnostic was produced.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::backend::c;
use crate::diagnostics::Diagnostic;
use crate::error::InternalError;
use crate::lexer;
use crate::parser;
use crate::printer;
use crate::semantics;

/// What the driver writes to the output sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Token dump: one `<line> <kind> [<lexeme>]` per token.
    Tokens,
    /// Indented parse-tree dump.
    ParseTree,
    /// Translated C source.
    CCode,
}

/// Immutable per-run configuration, threaded explicitly; there is no
/// process-wide state.
pub struct Settings<'a> {
    pub mode: Mode,
    pub colorize: bool,
    pub out: &'a mut dyn Write,
    pub diag: &'a mut dyn Write,
}

/// Runs the pipeline over a source string. Returns the process exit code:
/// 0 on success, 1 when any diagnostic was emitted.
pub fn run_source(source: &str, settings: &mut Settings) -> i32 {
    let tokens = match lexer::scan(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            for error in &errors {
                let _ = writeln!(settings.diag, "{}", Diagnostic::from(error).render());
            }
            return 1;
        }
    };

    if settings.mode == Mode::Tokens {
        for token in &tokens {
            if token.value.is_empty() {
                let _ = writeln!(settings.out, "{} {}", token.line, token.kind.name());
            } else {
                let _ = writeln!(
                    settings.out,
                    "{} {} {}",
                    token.line,
                    token.kind.name(),
                    token.value
                );
            }
        }
        return 0;
    }

    let program = match parser::parse(&tokens) {
        Ok(program) => program,
        Err(error) => {
            let _ = writeln!(settings.diag, "{}", Diagnostic::from(&error).render());
            return 1;
        }
    };

    if settings.mode == Mode::ParseTree {
        let _ = write!(settings.out, "{}", printer::print(&program, settings.colorize));
        return 0;
    }

    let analysis = semantics::analyze(&program);
    if !analysis.errors.is_empty() {
        for error in &analysis.errors {
            let _ = writeln!(settings.diag, "{}", Diagnostic::from(error).render());
        }
        return 1;
    }

    let _ = write!(settings.out, "{}", c::emit(&program, &analysis.annotations));
    0
}

/// Reads a source file from disk and runs the pipeline over it.
pub fn compile_file(path: &Path, settings: &mut Settings) -> Result<i32, InternalError> {
    let source = fs::read_to_string(path)?;
    Ok(run_source(&source, settings))
}
