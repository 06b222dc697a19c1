use thiserror::Error;

use crate::ast::{
    AddOp, Assign, BasicType, CompoundStatement, ConstDecl, Expression, Factor, FactorKind, For,
    If, MulOp, NodeId, Parameter, ProcedureCall, Program, Read, RelOp, SimpleExpression,
    Statement, Subprogram, Term, TypeNode, VarDecl, Variable, While, Write,
};
use crate::lexer::{Token, TokenKind};

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct ParserError {
    pub message: String,
    pub line: usize,
}

/// Single-pass recursive descent with one-token lookahead. The first syntax
/// error is terminal; there is no recovery.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    next_id: u32,
}

impl<'a> Parser<'a> {
    /// The token slice must end with an end-of-stream token, which the lexer
    /// guarantees.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, next_id: 0 }
    }

    pub fn parse(mut self) -> Result<Program, ParserError> {
        self.program()
    }

    // -------------------------
    // Cursor helpers
    // -------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn is_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_end() && self.peek().kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, msg: &str) -> Result<Token, ParserError> {
        if self.check(kind) {
            let tok = self.tokens[self.pos].clone();
            self.pos += 1;
            Ok(tok)
        } else {
            Err(self.error(msg))
        }
    }

    fn error(&self, msg: &str) -> ParserError {
        ParserError { message: msg.to_string(), line: self.peek().line }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // -------------------------
    // Declarations
    // -------------------------

    fn program(&mut self) -> Result<Program, ParserError> {
        self.consume(
            TokenKind::Program,
            "Expected 'program' keyword at the beginning of the program declaration.",
        )?;
        let id = self
            .consume(TokenKind::Identifier, "Expected program identifier after 'program' keyword.")?
            .value;

        let mut parameters = Vec::new();
        if self.matches(TokenKind::LParen) {
            parameters.push(
                self.consume(TokenKind::Identifier, "Expected identifier for program parameter.")?
                    .value,
            );
            while self.matches(TokenKind::Comma) {
                parameters.push(
                    self.consume(
                        TokenKind::Identifier,
                        "Expected identifier for program parameter.",
                    )?
                    .value,
                );
            }
            self.consume(TokenKind::RParen, "Expected ')' to close program parameter list.")?;
        }
        self.consume(TokenKind::SemiColon, "Expected ';' after program header.")?;

        let mut const_decls = Vec::new();
        if self.matches(TokenKind::Const) {
            while self.check(TokenKind::Identifier) {
                const_decls.push(self.const_declaration()?);
                self.consume(TokenKind::SemiColon, "Expected ';' after constant declaration.")?;
            }
        }

        let mut var_decls = Vec::new();
        if self.matches(TokenKind::Var) {
            while self.check(TokenKind::Identifier) {
                var_decls.push(self.var_declaration()?);
                self.consume(TokenKind::SemiColon, "Expected ';' after variable declaration.")?;
            }
        }

        let mut subprograms = Vec::new();
        while self.check(TokenKind::Procedure) || self.check(TokenKind::Function) {
            subprograms.push(self.subprogram()?);
            self.consume(TokenKind::SemiColon, "Expected ';' after subprogram declaration.")?;
        }

        let body = self.compound_statement()?;
        self.consume(TokenKind::Dot, "Expected '.' at the end of the program.")?;

        Ok(Program { id, parameters, const_decls, var_decls, subprograms, body })
    }

    fn subprogram(&mut self) -> Result<Subprogram, ParserError> {
        if self.matches(TokenKind::Procedure) {
            let id_tok = self.consume(
                TokenKind::Identifier,
                "Expected procedure identifier after 'procedure' keyword.",
            )?;
            let parameters =
                self.parameter_list("Expected ')' to close procedure parameter list.")?;
            self.consume(TokenKind::SemiColon, "Expected ';' after procedure header.")?;
            let (const_decls, var_decls) = self.subprogram_declarations()?;
            let body = self.compound_statement()?;
            Ok(Subprogram {
                id: id_tok.value,
                is_function: false,
                parameters,
                return_type: None,
                const_decls,
                var_decls,
                body,
                line: id_tok.line,
            })
        } else if self.matches(TokenKind::Function) {
            let id_tok = self.consume(
                TokenKind::Identifier,
                "Expected function identifier after 'function' keyword.",
            )?;
            let parameters = self.parameter_list("Expected ')' to close function parameter list.")?;
            self.consume(
                TokenKind::Colon,
                "Expected ':' after function parameter list for return type specification.",
            )?;
            let return_type = self.basic_type().ok_or_else(|| self.error("Expected return type"))?;
            self.consume(TokenKind::SemiColon, "Expected ';' after function header.")?;
            let (const_decls, var_decls) = self.subprogram_declarations()?;
            let body = self.compound_statement()?;
            Ok(Subprogram {
                id: id_tok.value,
                is_function: true,
                parameters,
                return_type: Some(return_type),
                const_decls,
                var_decls,
                body,
                line: id_tok.line,
            })
        } else {
            Err(self.error("Expected 'procedure' or 'function'"))
        }
    }

    fn parameter_list(&mut self, close_msg: &str) -> Result<Vec<Parameter>, ParserError> {
        let mut parameters = Vec::new();
        if self.matches(TokenKind::LParen) {
            if !self.matches(TokenKind::RParen) {
                parameters.push(self.parameter()?);
                while self.matches(TokenKind::SemiColon) {
                    parameters.push(self.parameter()?);
                }
                self.consume(TokenKind::RParen, close_msg)?;
            }
        }
        Ok(parameters)
    }

    fn subprogram_declarations(&mut self) -> Result<(Vec<ConstDecl>, Vec<VarDecl>), ParserError> {
        let mut const_decls = Vec::new();
        if self.matches(TokenKind::Const) {
            while self.check(TokenKind::Identifier) {
                const_decls.push(self.const_declaration()?);
                self.consume(
                    TokenKind::SemiColon,
                    "Expected ';' after constant declaration in subprogram.",
                )?;
            }
        }
        let mut var_decls = Vec::new();
        if self.matches(TokenKind::Var) {
            while self.check(TokenKind::Identifier) {
                var_decls.push(self.var_declaration()?);
                self.consume(
                    TokenKind::SemiColon,
                    "Expected ';' after variable declaration in subprogram.",
                )?;
            }
        }
        Ok((const_decls, var_decls))
    }

    fn parameter(&mut self) -> Result<Parameter, ParserError> {
        let by_ref = self.matches(TokenKind::Var);
        let first = self.consume(TokenKind::Identifier, "Expected identifier for parameter name.")?;
        let line = first.line;
        let mut ids = vec![first.value];
        while self.matches(TokenKind::Comma) {
            ids.push(
                self.consume(TokenKind::Identifier, "Expected identifier for parameter name.")?
                    .value,
            );
        }
        self.consume(
            TokenKind::Colon,
            "Expected ':' after parameter identifier list to specify type.",
        )?;
        let basic_type = self.basic_type().ok_or_else(|| self.error("Expected basic type"))?;
        Ok(Parameter { by_ref, ids, basic_type, line })
    }

    fn const_declaration(&mut self) -> Result<ConstDecl, ParserError> {
        let id_tok = self.consume(TokenKind::Identifier, "Expected identifier for constant name.")?;
        self.consume(
            TokenKind::Equal,
            "Expected '=' after constant identifier in constant declaration.",
        )?;
        let value = if self.matches(TokenKind::Plus) {
            let n = self.consume(
                TokenKind::Number,
                "Expected numeric value after '+' in constant declaration.",
            )?;
            format!("+{}", n.value)
        } else if self.matches(TokenKind::Minus) {
            let n = self.consume(
                TokenKind::Number,
                "Expected numeric value after '-' in constant declaration.",
            )?;
            format!("-{}", n.value)
        } else if self.check(TokenKind::Number) {
            self.consume(TokenKind::Number, "Expected numeric value for constant.")?.value
        } else if self.check(TokenKind::CharLiteral) {
            self.consume(TokenKind::CharLiteral, "Expected character literal for constant.")?.value
        } else {
            let s =
                self.consume(TokenKind::StringLiteral, "Expected string literal for constant.")?;
            format!("\"{}\"", s.value)
        };
        Ok(ConstDecl { id: id_tok.value, value, line: id_tok.line })
    }

    fn var_declaration(&mut self) -> Result<VarDecl, ParserError> {
        let first = self.consume(TokenKind::Identifier, "Expected identifier for variable name.")?;
        let line = first.line;
        let mut ids = vec![first.value];
        while self.matches(TokenKind::Comma) {
            ids.push(
                self.consume(TokenKind::Identifier, "Expected identifier for variable name.")?
                    .value,
            );
        }
        self.consume(TokenKind::Colon, "Expected ':' after variable identifier list.")?;
        let ty = self.type_node()?;
        Ok(VarDecl { ids, ty, line })
    }

    fn basic_type(&mut self) -> Option<BasicType> {
        let ty = match self.peek().kind {
            TokenKind::Integer => BasicType::Integer,
            TokenKind::Real => BasicType::Real,
            TokenKind::Boolean => BasicType::Boolean,
            TokenKind::Char => BasicType::Char,
            _ => return None,
        };
        self.pos += 1;
        Some(ty)
    }

    fn type_node(&mut self) -> Result<TypeNode, ParserError> {
        if self.matches(TokenKind::Array) {
            self.consume(TokenKind::LBracket, "Expected '[' after 'array' keyword.")?;
            let mut periods = vec![self.period()?];
            while self.matches(TokenKind::Comma) {
                periods.push(self.period()?);
            }
            self.consume(TokenKind::RBracket, "Expected ']' to close array bounds.")?;
            self.consume(TokenKind::Of, "Expected 'of' keyword before array element type.")?;
            let basic = self
                .basic_type()
                .ok_or_else(|| self.error("Expected basic type after 'of' in array declaration"))?;
            Ok(TypeNode { basic, periods })
        } else {
            let basic = self.basic_type().ok_or_else(|| self.error("Expected basic type"))?;
            Ok(TypeNode { basic, periods: Vec::new() })
        }
    }

    fn period(&mut self) -> Result<(String, String), ParserError> {
        let is_integral = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        let lower =
            self.consume(TokenKind::Number, "Expected numeric value for array lower bound.")?.value;
        if !is_integral(&lower) {
            return Err(self.error("Expected a integral value for array lower bound"));
        }
        self.consume(TokenKind::DotDot, "Expected '..' between array bounds.")?;
        let upper =
            self.consume(TokenKind::Number, "Expected numeric value for array upper bound.")?.value;
        if !is_integral(&upper) {
            return Err(self.error("Expected a integral value for array upper bound"));
        }
        Ok((lower, upper))
    }

    // -------------------------
    // Statements
    // -------------------------

    fn variable(&mut self) -> Result<Variable, ParserError> {
        let id_tok = self.consume(TokenKind::Identifier, "Expected variable identifier.")?;
        let mut indices = Vec::new();
        if self.matches(TokenKind::LBracket) {
            indices.push(self.expression()?);
            while self.matches(TokenKind::Comma) {
                indices.push(self.expression()?);
            }
            self.consume(TokenKind::RBracket, "Expected ']' to close array index.")?;
        }
        Ok(Variable { id: id_tok.value, indices, line: id_tok.line })
    }

    fn statement(&mut self) -> Result<Statement, ParserError> {
        match self.peek().kind {
            TokenKind::Begin => Ok(Statement::Compound(self.compound_statement()?)),
            TokenKind::If => self.if_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Read => self.read_statement(),
            TokenKind::Write => self.write_statement(),
            TokenKind::Identifier => {
                // Assignment when followed by `:=` or an index; any other
                // bare identifier is a (possibly parameterless) call.
                match self.peek_kind_at(1) {
                    Some(TokenKind::Assign) | Some(TokenKind::LBracket) => self.assign_statement(),
                    _ => Ok(Statement::Call(self.procedure_call()?)),
                }
            }
            TokenKind::Break => {
                self.consume(TokenKind::Break, "Expected 'break' keyword.")?;
                Ok(Statement::Break)
            }
            _ => Err(self.error("Expected statement")),
        }
    }

    /// True when the lookahead token can begin a statement; used by branch
    /// bodies, which fall back to an empty statement otherwise.
    fn at_statement_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier
                | TokenKind::Begin
                | TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Read
                | TokenKind::Write
                | TokenKind::Break
        )
    }

    fn branch_body(&mut self) -> Result<Statement, ParserError> {
        if self.at_statement_start() {
            self.statement()
        } else {
            Ok(Statement::Empty)
        }
    }

    fn assign_statement(&mut self) -> Result<Statement, ParserError> {
        let left = self.variable()?;
        let line = self.peek().line;
        self.consume(TokenKind::Assign, "Expected ':=' for assignment.")?;
        let right = self.expression()?;
        Ok(Statement::Assign(Assign { id: self.fresh_id(), left, right, line }))
    }

    fn procedure_call(&mut self) -> Result<ProcedureCall, ParserError> {
        let id_tok = self
            .consume(TokenKind::Identifier, "Expected procedure or function identifier for call.")?;
        let mut args = Vec::new();
        if self.matches(TokenKind::LParen) {
            if self.matches(TokenKind::RParen) {
                return Ok(ProcedureCall { id: id_tok.value, args, line: id_tok.line });
            }
            args.push(self.expression()?);
            while self.matches(TokenKind::Comma) {
                args.push(self.expression()?);
            }
            self.consume(
                TokenKind::RParen,
                "Expected ')' to close argument list in procedure/function call.",
            )?;
        }
        Ok(ProcedureCall { id: id_tok.value, args, line: id_tok.line })
    }

    /// `begin ... end` with Pascal semicolon tolerance: an empty block, a
    /// leading `;`, consecutive `;` and a `;` right before `end` each insert
    /// an empty statement, so the block always holds at least one statement.
    fn compound_statement(&mut self) -> Result<CompoundStatement, ParserError> {
        self.consume(TokenKind::Begin, "Expected 'begin' keyword to start compound statement.")?;
        let mut statements = Vec::new();
        if self.matches(TokenKind::End) {
            statements.push(Statement::Empty);
            return Ok(CompoundStatement { statements });
        }
        if self.check(TokenKind::SemiColon) {
            statements.push(Statement::Empty);
        } else {
            statements.push(self.statement()?);
        }
        while !self.matches(TokenKind::End) {
            self.consume(
                TokenKind::SemiColon,
                "Expected ';' to separate statements in compound statement.",
            )?;
            if self.check(TokenKind::SemiColon) || self.check(TokenKind::End) {
                statements.push(Statement::Empty);
            } else {
                statements.push(self.statement()?);
            }
        }
        Ok(CompoundStatement { statements })
    }

    fn if_statement(&mut self) -> Result<Statement, ParserError> {
        let if_tok = self.consume(TokenKind::If, "Expected 'if' keyword to start if statement.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::Then, "Expected 'then' keyword after if condition.")?;
        let then_branch = Box::new(self.branch_body()?);
        let else_branch = if self.matches(TokenKind::Else) {
            Some(Box::new(self.branch_body()?))
        } else {
            None
        };
        Ok(Statement::If(If { condition, then_branch, else_branch, line: if_tok.line }))
    }

    fn for_statement(&mut self) -> Result<Statement, ParserError> {
        let for_tok = self.consume(TokenKind::For, "Expected 'for' keyword to start for loop.")?;
        let id = self
            .consume(
                TokenKind::Identifier,
                "Expected loop control variable identifier after 'for' keyword.",
            )?
            .value;
        self.consume(TokenKind::Assign, "Expected ':=' for loop control variable initialization.")?;
        let from = self.expression()?;
        self.consume(TokenKind::To, "Expected 'to' keyword for for loop range.")?;
        let to = self.expression()?;
        self.consume(TokenKind::Do, "Expected 'do' keyword before for loop body.")?;
        let body = Box::new(self.branch_body()?);
        Ok(Statement::For(For { id, from, to, body, line: for_tok.line }))
    }

    fn while_statement(&mut self) -> Result<Statement, ParserError> {
        let while_tok =
            self.consume(TokenKind::While, "Expected 'while' keyword to start while loop.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::Do, "Expected 'do' keyword before while loop body.")?;
        let body = Box::new(self.branch_body()?);
        Ok(Statement::While(While { condition, body, line: while_tok.line }))
    }

    fn read_statement(&mut self) -> Result<Statement, ParserError> {
        let read_tok =
            self.consume(TokenKind::Read, "Expected 'read' keyword to start read statement.")?;
        self.consume(TokenKind::LParen, "Expected '(' after 'read' keyword.")?;
        let mut targets = vec![self.variable()?];
        while self.matches(TokenKind::Comma) {
            targets.push(self.variable()?);
        }
        self.consume(TokenKind::RParen, "Expected ')' to close variable list in read statement.")?;
        Ok(Statement::Read(Read { id: self.fresh_id(), targets, line: read_tok.line }))
    }

    fn write_statement(&mut self) -> Result<Statement, ParserError> {
        let write_tok =
            self.consume(TokenKind::Write, "Expected 'write' keyword to start write statement.")?;
        self.consume(TokenKind::LParen, "Expected '(' after 'write' keyword.")?;
        let mut values = vec![self.expression()?];
        while self.matches(TokenKind::Comma) {
            values.push(self.expression()?);
        }
        self.consume(
            TokenKind::RParen,
            "Expected ')' to close expression list in write statement.",
        )?;
        Ok(Statement::Write(Write { id: self.fresh_id(), values, line: write_tok.line }))
    }

    // -------------------------
    // Expressions
    // -------------------------

    fn factor(&mut self) -> Result<Factor, ParserError> {
        let line = self.peek().line;
        let kind = match self.peek().kind {
            TokenKind::Identifier => match self.peek_kind_at(1) {
                Some(TokenKind::LParen) => FactorKind::Call(self.procedure_call()?),
                Some(TokenKind::LBracket) => FactorKind::Variable(self.variable()?),
                _ => {
                    let id = self
                        .consume(TokenKind::Identifier, "Expected identifier as a factor.")?
                        .value;
                    FactorKind::UnknownIdent(id)
                }
            },
            TokenKind::Number => {
                let value = self
                    .consume(TokenKind::Number, "Expected numeric literal as a factor.")?
                    .value;
                FactorKind::Number(value)
            }
            TokenKind::LParen => {
                self.pos += 1;
                let expr = self.expression()?;
                self.consume(TokenKind::RParen, "Expected ')' to close parenthesized expression.")?;
                FactorKind::Parenthesized(Box::new(expr))
            }
            TokenKind::Not => {
                self.pos += 1;
                FactorKind::Not(Box::new(self.factor()?))
            }
            TokenKind::Minus => {
                self.pos += 1;
                FactorKind::UnaryMinus(Box::new(self.factor()?))
            }
            TokenKind::Plus => {
                self.pos += 1;
                FactorKind::UnaryPlus(Box::new(self.factor()?))
            }
            TokenKind::True => {
                self.pos += 1;
                FactorKind::Boolean("true".to_string())
            }
            TokenKind::False => {
                self.pos += 1;
                FactorKind::Boolean("false".to_string())
            }
            _ => return Err(self.error("Expected factor")),
        };
        Ok(Factor { id: self.fresh_id(), kind, line })
    }

    fn term(&mut self) -> Result<Term, ParserError> {
        let first = self.factor()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::Times => MulOp::Times,
                TokenKind::RDiv => MulOp::RDiv,
                TokenKind::Div => MulOp::Div,
                TokenKind::Mod => MulOp::Mod,
                TokenKind::And => MulOp::And,
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.factor()?));
        }
        Ok(Term { first, rest })
    }

    fn simple_expression(&mut self) -> Result<SimpleExpression, ParserError> {
        let first = self.term()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => AddOp::Plus,
                TokenKind::Minus => AddOp::Minus,
                TokenKind::Or => AddOp::Or,
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.term()?));
        }
        Ok(SimpleExpression { first, rest })
    }

    fn expression(&mut self) -> Result<Expression, ParserError> {
        let left = self.simple_expression()?;
        let op = match self.peek().kind {
            TokenKind::GreaterThan => Some(RelOp::Gt),
            TokenKind::Equal => Some(RelOp::Eq),
            TokenKind::LessThan => Some(RelOp::Lt),
            TokenKind::GreaterThanOrEqual => Some(RelOp::Ge),
            TokenKind::LessThanOrEqual => Some(RelOp::Le),
            TokenKind::NotEqual => Some(RelOp::NotEq),
            _ => None,
        };
        let right = match op {
            Some(op) => {
                self.pos += 1;
                Some((op, self.simple_expression()?))
            }
            None => None,
        };
        Ok(Expression { left, right })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_src(src: &str) -> Result<Program, ParserError> {
        let tokens = lexer::scan(src).expect("lex failure in parser test");
        Parser::new(&tokens).parse()
    }

    #[test]
    fn parse_bare_program() {
        let program = parse_src("program hello; begin end.").unwrap();
        assert_eq!(program.id, "hello");
        assert!(program.parameters.is_empty());
        assert!(program.const_decls.is_empty());
        assert!(program.var_decls.is_empty());
        assert!(program.subprograms.is_empty());
        assert_eq!(program.body.statements, vec![Statement::Empty]);
    }

    #[test]
    fn parse_program_parameters() {
        let program = parse_src("program io(input, output); begin end.").unwrap();
        assert_eq!(program.parameters, vec!["input", "output"]);
    }

    #[test]
    fn parse_const_declarations_preserve_literal_text() {
        let program =
            parse_src("program p; const pi = 3.14; neg = -5; c = 'X'; s = 'abc'; begin end.")
                .unwrap();
        let values: Vec<&str> =
            program.const_decls.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["3.14", "-5", "'X'", "\"abc\""]);
    }

    #[test]
    fn parse_array_var_declaration() {
        let program = parse_src("program p; var a: array[1..10, 0..4] of real; begin end.").unwrap();
        let decl = &program.var_decls[0];
        assert_eq!(decl.ty.basic, BasicType::Real);
        assert_eq!(
            decl.ty.periods,
            vec![("1".to_string(), "10".to_string()), ("0".to_string(), "4".to_string())]
        );
    }

    #[test]
    fn parse_procedure_and_function_headers() {
        let program = parse_src(
            "program p; \
             procedure q(var x, y: integer; z: char); begin end; \
             function f(a: real): boolean; begin f := true end; \
             begin end.",
        )
        .unwrap();
        let q = &program.subprograms[0];
        assert!(!q.is_function);
        assert_eq!(q.parameters.len(), 2);
        assert!(q.parameters[0].by_ref);
        assert_eq!(q.parameters[0].ids, vec!["x", "y"]);
        assert!(!q.parameters[1].by_ref);
        let f = &program.subprograms[1];
        assert!(f.is_function);
        assert_eq!(f.return_type, Some(BasicType::Boolean));
    }

    #[test]
    fn parse_semicolon_tolerance_inserts_empty_statements() {
        let program = parse_src("program p; begin ;; end.").unwrap();
        assert_eq!(
            program.body.statements,
            vec![Statement::Empty, Statement::Empty, Statement::Empty]
        );
    }

    #[test]
    fn parse_bare_identifier_statement_is_a_call() {
        let program = parse_src("program p; begin go end.").unwrap();
        match &program.body.statements[0] {
            Statement::Call(call) => {
                assert_eq!(call.id, "go");
                assert!(call.args.is_empty());
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parse_bare_identifier_factor_is_unknown() {
        let program = parse_src("program p; begin x := y end.").unwrap();
        match &program.body.statements[0] {
            Statement::Assign(assign) => {
                assert_eq!(
                    assign.right.left.first.first.kind,
                    FactorKind::UnknownIdent("y".to_string())
                );
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn parse_dangling_else_binds_to_nearest_if() {
        let program =
            parse_src("program p; begin if true then if false then x := 1 else x := 2 end.")
                .unwrap();
        match &program.body.statements[0] {
            Statement::If(outer) => {
                assert!(outer.else_branch.is_none());
                match outer.then_branch.as_ref() {
                    Statement::If(inner) => assert!(inner.else_branch.is_some()),
                    other => panic!("expected nested if, got {other:?}"),
                }
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parse_operator_tiers() {
        // a + b * c parses as a + (b * c): the product lives in one term.
        let program = parse_src("program p; begin x := a + b * c end.").unwrap();
        match &program.body.statements[0] {
            Statement::Assign(assign) => {
                let simple = &assign.right.left;
                assert_eq!(simple.rest.len(), 1);
                assert_eq!(simple.rest[0].0, AddOp::Plus);
                assert_eq!(simple.rest[0].1.rest.len(), 1);
                assert_eq!(simple.rest[0].1.rest[0].0, MulOp::Times);
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn parse_relational_expression() {
        let program = parse_src("program p; begin while i <= 10 do i := i + 1 end.").unwrap();
        match &program.body.statements[0] {
            Statement::While(w) => {
                assert_eq!(w.condition.right.as_ref().unwrap().0, RelOp::Le);
            }
            other => panic!("expected while, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_final_dot() {
        let err = parse_src("program p; begin end").unwrap_err();
        assert_eq!(err.message, "Expected '.' at the end of the program.");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn parse_for_requires_assign() {
        let err = parse_src("program p; var i: integer; begin for i = 1 to 10 do ; end.")
            .unwrap_err();
        assert_eq!(err.message, "Expected ':=' for loop control variable initialization.");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn parse_first_error_is_terminal() {
        let err = parse_src("program ; begin end.").unwrap_err();
        assert_eq!(err.message, "Expected program identifier after 'program' keyword.");
    }

    #[test]
    fn parse_call_factor_and_array_factor() {
        let program = parse_src("program p; begin x := f(1) + a[2] end.").unwrap();
        match &program.body.statements[0] {
            Statement::Assign(assign) => {
                let simple = &assign.right.left;
                assert!(matches!(simple.first.first.kind, FactorKind::Call(_)));
                assert!(matches!(simple.rest[0].1.first.kind, FactorKind::Variable(_)));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }
}
