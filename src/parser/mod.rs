mod parser;

pub use parser::{Parser, ParserError};

use crate::ast::Program;
use crate::lexer::Token;

/// Parses a token stream into a program tree, failing on the first syntax
/// error.
pub fn parse(tokens: &[Token]) -> Result<Program, ParserError> {
    Parser::new(tokens).parse()
}
