use thiserror::Error;

use crate::lexer::{Token, TokenKind};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LexErrorKind {
    #[error("Unknown char '{0}'.")]
    UnknownChar(char),

    #[error("Unclosed char literal {0}.")]
    UnclosedCharLiteral(String),

    #[error("There should be a char between a pair of \"'\".")]
    EmptyCharLiteral,

    #[error("Unclosed string {0}.")]
    UnclosedString(String),

    #[error("Identifier '{0}...' is too long.")]
    IdentifierTooLong(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
}

const MAX_IDENTIFIER_LEN: usize = 256;

/// Scanner over the whole source. Identifier/keyword matching is
/// case-insensitive, so the source is lowercased up front; the raw spelling
/// is kept alongside because char literals preserve their original case.
pub struct Lexer {
    src: Vec<char>,
    raw: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    start: usize,
    current: usize,
    line: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            src: source.chars().map(|c| c.to_ascii_lowercase()).collect(),
            raw: source.chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scans the entire source, accumulating per-lexeme errors. The token
    /// stream always ends with a single end-of-stream token on the last
    /// known line, even when errors were found.
    pub fn run(mut self) -> (Vec<Token>, Vec<LexError>) {
        while !self.is_end() {
            self.start = self.current;
            if let Err(e) = self.scan_token() {
                self.errors.push(e);
            }
        }
        self.tokens.push(Token::new(TokenKind::Eof, self.line));
        (self.tokens, self.errors)
    }

    fn is_end(&self) -> bool {
        self.current >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.src.get(self.current + 1).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.src[self.current];
        self.current += 1;
        c
    }

    fn lexeme(&self) -> String {
        self.src[self.start..self.current].iter().collect()
    }

    fn raw_lexeme(&self) -> String {
        self.raw[self.start..self.current].iter().collect()
    }

    fn add(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.line));
    }

    fn add_value(&mut self, kind: TokenKind, value: String) {
        self.tokens.push(Token::with_value(kind, value, self.line));
    }

    fn err(&self, kind: LexErrorKind) -> LexError {
        LexError { kind, line: self.line }
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let c = self.advance();
        match c {
            ' ' | '\t' | '\r' => {}
            '\n' => self.line += 1,
            '(' => self.add(TokenKind::LParen),
            ')' => self.add(TokenKind::RParen),
            ',' => self.add(TokenKind::Comma),
            ';' => self.add(TokenKind::SemiColon),
            '[' => self.add(TokenKind::LBracket),
            ']' => self.add(TokenKind::RBracket),
            '+' => self.add(TokenKind::Plus),
            '-' => self.add(TokenKind::Minus),
            '*' => self.add(TokenKind::Times),
            '=' => self.add(TokenKind::Equal),
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    self.add(TokenKind::DotDot);
                } else {
                    self.add(TokenKind::Dot);
                }
            }
            ':' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.add(TokenKind::Assign);
                } else {
                    self.add(TokenKind::Colon);
                }
            }
            '/' => {
                if self.peek() == Some('/') {
                    // Line comment runs to end of line.
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                } else {
                    self.add(TokenKind::RDiv);
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.advance();
                    self.add(TokenKind::LessThanOrEqual);
                }
                Some('>') => {
                    self.advance();
                    self.add(TokenKind::NotEqual);
                }
                _ => self.add(TokenKind::LessThan),
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.add(TokenKind::GreaterThanOrEqual);
                } else {
                    self.add(TokenKind::GreaterThan);
                }
            }
            '{' => {
                // Block comment spans lines; an unclosed one silently eats
                // the rest of the file, matching the reference scanner.
                while !self.is_end() {
                    let c = self.advance();
                    if c == '}' {
                        break;
                    }
                    if c == '\n' {
                        self.line += 1;
                    }
                }
            }
            '\'' => self.scan_char_or_string()?,
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_ascii_alphabetic() => self.scan_word()?,
            other => return Err(self.err(LexErrorKind::UnknownChar(other))),
        }
        Ok(())
    }

    /// `'x'` is a char literal, `'xy...'` a string literal; the distinction
    /// is made here, by length. The char token keeps the raw source spelling
    /// including both quotes, the string token is stored without quotes.
    fn scan_char_or_string(&mut self) -> Result<(), LexError> {
        if self.is_end() {
            return Err(self.err(LexErrorKind::UnclosedCharLiteral(self.lexeme())));
        }
        let first = self.advance();
        if first == '\n' {
            let slice: String = self.src[self.start..self.current - 1].iter().collect();
            let e = self.err(LexErrorKind::UnclosedCharLiteral(slice));
            self.line += 1;
            return Err(e);
        }
        if first == '\'' {
            return Err(self.err(LexErrorKind::EmptyCharLiteral));
        }
        if self.is_end() {
            return Err(self.err(LexErrorKind::UnclosedCharLiteral(self.lexeme())));
        }
        let second = self.advance();
        if second == '\'' {
            let value = self.raw_lexeme();
            self.add_value(TokenKind::CharLiteral, value);
            return Ok(());
        }
        if second == '\n' {
            let slice: String = self.src[self.start..self.current - 1].iter().collect();
            let e = self.err(LexErrorKind::UnclosedCharLiteral(slice));
            self.line += 1;
            return Err(e);
        }
        // Two content characters and counting: this is a string literal.
        self.scan_string()
    }

    fn scan_string(&mut self) -> Result<(), LexError> {
        loop {
            if self.is_end() {
                return Err(self.err(LexErrorKind::UnclosedString(self.lexeme())));
            }
            let c = self.advance();
            if c == '\'' {
                break;
            }
            if c == '\n' {
                let slice: String = self.src[self.start..self.current - 1].iter().collect();
                let e = self.err(LexErrorKind::UnclosedString(slice));
                self.line += 1;
                return Err(e);
            }
        }
        let value: String = self.src[self.start + 1..self.current - 1].iter().collect();
        self.add_value(TokenKind::StringLiteral, value);
        Ok(())
    }

    /// Numeric literal: digits, optional fraction (a dot must be followed by
    /// a digit, otherwise the dot is left for the `.`/`..` tokens), optional
    /// `e[+-]?digits` exponent. The lexeme is carried as text; nothing is
    /// parsed to a numeric value here.
    fn scan_number(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        self.scan_exponent();
        let value = self.lexeme();
        self.add_value(TokenKind::Number, value);
    }

    fn scan_exponent(&mut self) {
        if self.peek() != Some('e') {
            return;
        }
        let digits_at = if matches!(self.peek_next(), Some('+') | Some('-')) {
            self.current + 2
        } else {
            self.current + 1
        };
        if !matches!(self.src.get(digits_at), Some(c) if c.is_ascii_digit()) {
            // No digit after `e` / `e+` / `e-`: not an exponent at all.
            return;
        }
        self.current = digits_at;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn scan_word(&mut self) -> Result<(), LexError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let word = self.lexeme();
        if word.len() > MAX_IDENTIFIER_LEN {
            let head: String = word.chars().take(10).collect();
            return Err(self.err(LexErrorKind::IdentifierTooLong(head)));
        }
        let kind = match word.as_str() {
            "div" => TokenKind::Div,
            "mod" => TokenKind::Mod,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "program" => TokenKind::Program,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "procedure" => TokenKind::Procedure,
            "function" => TokenKind::Function,
            "begin" => TokenKind::Begin,
            "end" => TokenKind::End,
            "array" => TokenKind::Array,
            "of" => TokenKind::Of,
            "integer" => TokenKind::Integer,
            "real" => TokenKind::Real,
            "boolean" => TokenKind::Boolean,
            "char" => TokenKind::Char,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "to" => TokenKind::To,
            "do" => TokenKind::Do,
            "while" => TokenKind::While,
            "read" => TokenKind::Read,
            "write" => TokenKind::Write,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "break" => TokenKind::Break,
            _ => {
                self.add_value(TokenKind::Identifier, word);
                return Ok(());
            }
        };
        self.add(kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_tokens(src: &str) -> Vec<Token> {
        let (tokens, errors) = Lexer::new(src).run();
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        collect_tokens(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_identifiers_are_lowercased() {
        let tokens = collect_tokens("Foo BAR_9");
        assert_eq!(tokens[0].value, "foo");
        assert_eq!(tokens[1].value, "bar_9");
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn lex_keywords_case_insensitive() {
        assert_eq!(
            kinds("PROGRAM Begin eND"),
            vec![TokenKind::Program, TokenKind::Begin, TokenKind::End, TokenKind::Eof]
        );
    }

    #[test]
    fn lex_alpha_operators() {
        assert_eq!(
            kinds("div MOD and or not"),
            vec![
                TokenKind::Div,
                TokenKind::Mod,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_two_char_operators_over_prefixes() {
        assert_eq!(
            kinds(":= <= >= <> .."),
            vec![
                TokenKind::Assign,
                TokenKind::LessThanOrEqual,
                TokenKind::GreaterThanOrEqual,
                TokenKind::NotEqual,
                TokenKind::DotDot,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_integer_and_real() {
        let tokens = collect_tokens("42 3.14");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].value, "42");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].value, "3.14");
    }

    #[test]
    fn lex_scientific_notation() {
        let tokens = collect_tokens("1.5e3 2e-2 7E+10");
        assert_eq!(tokens[0].value, "1.5e3");
        assert_eq!(tokens[1].value, "2e-2");
        assert_eq!(tokens[2].value, "7e+10");
    }

    #[test]
    fn lex_trailing_dot_reverts_to_integer() {
        let tokens = collect_tokens("123.");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].value, "123");
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn lex_range_keeps_both_bounds() {
        assert_eq!(
            kinds("3..5"),
            vec![TokenKind::Number, TokenKind::DotDot, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn lex_char_literal_keeps_raw_spelling() {
        let tokens = collect_tokens("'X'");
        assert_eq!(tokens[0].kind, TokenKind::CharLiteral);
        assert_eq!(tokens[0].value, "'X'");
    }

    #[test]
    fn lex_string_literal_strips_quotes() {
        let tokens = collect_tokens("'hello'");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].value, "hello");
    }

    #[test]
    fn lex_comments_are_skipped() {
        let tokens = collect_tokens("a { comment\nspanning lines } b // rest\nc");
        assert_eq!(tokens[0].value, "a");
        assert_eq!(tokens[1].value, "b");
        assert_eq!(tokens[2].value, "c");
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn lex_line_numbers() {
        let tokens = collect_tokens("a\nb\n\nc");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 4);
        assert_eq!(tokens[3].line, 4); // Eof on last known line
    }

    #[test]
    fn lex_unknown_char_accumulates_and_continues() {
        let (tokens, errors) = Lexer::new("a ^ b @ c").run();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, LexErrorKind::UnknownChar('^'));
        assert_eq!(errors[1].kind, LexErrorKind::UnknownChar('@'));
        // All three identifiers survive, plus Eof.
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn lex_unclosed_char_literal_at_eof() {
        let (tokens, errors) = Lexer::new("'a").run();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnclosedCharLiteral("'a".to_string()));
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].to_string(), "Unclosed char literal 'a.");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn lex_empty_char_literal_is_an_error() {
        let (_, errors) = Lexer::new("''").run();
        assert_eq!(errors[0].kind, LexErrorKind::EmptyCharLiteral);
    }

    #[test]
    fn lex_string_across_newline_is_an_error() {
        let (_, errors) = Lexer::new("'ab\ncd'").run();
        assert!(matches!(errors[0].kind, LexErrorKind::UnclosedString(_)));
    }

    #[test]
    fn lex_identifier_too_long() {
        let long = "a".repeat(257);
        let (_, errors) = Lexer::new(&long).run();
        assert_eq!(
            errors[0].kind,
            LexErrorKind::IdentifierTooLong("aaaaaaaaaa".to_string())
        );
        assert_eq!(errors[0].to_string(), "Identifier 'aaaaaaaaaa...' is too long.");
    }
}
