use std::fmt;

use crate::lexer::LexError;
use crate::parser::ParserError;
use crate::semantics::SemanticDiagnostic;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
    Semantic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lexer => "lexer",
            Stage::Parser => "parser",
            Stage::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

/// One user-facing diagnostic: the stage it came from, a message, and a
/// 1-based source line.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub message: String,
    pub line: usize,
}

impl Diagnostic {
    pub fn render(&self) -> String {
        format!("{} error: at line {}: {}", self.stage, self.line, self.message)
    }
}

impl From<&LexError> for Diagnostic {
    fn from(e: &LexError) -> Self {
        Self { stage: Stage::Lexer, message: e.to_string(), line: e.line }
    }
}

impl From<&ParserError> for Diagnostic {
    fn from(e: &ParserError) -> Self {
        Self { stage: Stage::Parser, message: e.message.clone(), line: e.line }
    }
}

impl From<&SemanticDiagnostic> for Diagnostic {
    fn from(e: &SemanticDiagnostic) -> Self {
        Self {
            stage: Stage::Semantic,
            message: format!("{}: {}", e.kind, e.message),
            line: e.line,
        }
    }
}
