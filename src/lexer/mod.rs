mod lexer;
mod token;

pub use lexer::{LexError, LexErrorKind, Lexer};
pub use token::{Token, TokenKind};

/// Scans a whole source string. Lexical errors do not stop the scan; when any
/// were found the full batch is returned instead of the token stream.
pub fn scan(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let (tokens, errors) = Lexer::new(source).run();
    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}
