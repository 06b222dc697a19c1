//! Indented parse-tree dump, optionally ANSI-colorized.

use crate::ast::{
    Assign, BasicType, CompoundStatement, ConstDecl, Expression, Factor, FactorKind, For, If,
    Parameter, ProcedureCall, Program, Read, SimpleExpression, Statement, Subprogram, Term,
    TypeNode, VarDecl, Variable, While, Write,
};
use crate::backend::c::{add_op_name, mul_op_name, rel_op_name};

const COLOR_NODE: &str = "\x1b[1;34m";
const COLOR_ATTR: &str = "\x1b[0;32m";
const COLOR_VAL: &str = "\x1b[0;33m";
const COLOR_RESET: &str = "\x1b[0m";

/// Renders the tree as text, one node per line with box-drawing rails.
pub fn print(program: &Program, colorize: bool) -> String {
    let mut printer = Printer { out: String::new(), level: 0, colorize };
    printer.program(program);
    printer.out
}

struct Printer {
    out: String,
    level: usize,
    colorize: bool,
}

fn basic_name(basic: BasicType) -> &'static str {
    match basic {
        BasicType::Integer => "int",
        BasicType::Real => "float",
        BasicType::Boolean => "bool",
        BasicType::Char => "char",
    }
}

fn factor_kind_name(kind: &FactorKind) -> &'static str {
    match kind {
        FactorKind::Number(_) => "Number",
        FactorKind::Boolean(_) => "Boolean",
        FactorKind::Variable(_) => "Variable",
        FactorKind::Call(_) => "Function",
        FactorKind::Parenthesized(_) => "Expression",
        FactorKind::UnaryPlus(_) => "With Plus",
        FactorKind::UnaryMinus(_) => "With Uminus",
        FactorKind::Not(_) => "With Not",
        FactorKind::UnknownIdent(_) => "Unknown",
    }
}

impl Printer {
    fn rails(&mut self) {
        for i in 0..self.level {
            self.out.push_str(if i == self.level - 1 { "├─ " } else { "│  " });
        }
    }

    fn node_line(&mut self, text: &str) {
        self.rails();
        if self.colorize {
            self.out.push_str(COLOR_NODE);
            self.out.push_str(text);
            self.out.push_str(COLOR_RESET);
        } else {
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn value_line(&mut self, name: &str, value: &str) {
        self.rails();
        if self.colorize {
            self.out.push_str(COLOR_ATTR);
            self.out.push_str(name);
            self.out.push_str(COLOR_RESET);
            self.out.push_str(": ");
            self.out.push_str(COLOR_VAL);
            self.out.push_str(value);
            self.out.push_str(COLOR_RESET);
        } else {
            self.out.push_str(name);
            self.out.push_str(": ");
            self.out.push_str(value);
        }
        self.out.push('\n');
    }

    fn program(&mut self, program: &Program) {
        self.node_line(&format!("Program: {}", program.id));
        self.level += 1;

        if !program.parameters.is_empty() {
            self.value_line("Parameters", &program.parameters.join(", "));
        }
        if !program.const_decls.is_empty() {
            self.node_line("Const Declarations");
            self.level += 1;
            for decl in &program.const_decls {
                self.const_decl(decl);
            }
            self.level -= 1;
        }
        if !program.var_decls.is_empty() {
            self.node_line("Var Declarations");
            self.level += 1;
            for decl in &program.var_decls {
                self.var_decl(decl);
            }
            self.level -= 1;
        }
        if !program.subprograms.is_empty() {
            self.node_line("Subprograms");
            self.level += 1;
            for subprogram in &program.subprograms {
                self.subprogram(subprogram);
            }
            self.level -= 1;
        }

        self.node_line("Body");
        self.compound(&program.body);
        self.level -= 1;
    }

    fn subprogram(&mut self, subprogram: &Subprogram) {
        self.node_line(&format!("Subprogram: {}", subprogram.id));
        self.level += 1;

        if !subprogram.parameters.is_empty() {
            self.node_line("Parameters");
            self.level += 1;
            for parameter in &subprogram.parameters {
                self.parameter(parameter);
            }
            self.level -= 1;
        }

        let return_type = match subprogram.return_type {
            Some(ret) => basic_name(ret),
            None => "None (procedure)",
        };
        self.value_line("Return Type", return_type);

        if !subprogram.const_decls.is_empty() {
            self.node_line("Const Declarations");
            self.level += 1;
            for decl in &subprogram.const_decls {
                self.const_decl(decl);
            }
            self.level -= 1;
        }
        if !subprogram.var_decls.is_empty() {
            self.node_line("Var Declarations");
            self.level += 1;
            for decl in &subprogram.var_decls {
                self.var_decl(decl);
            }
            self.level -= 1;
        }

        self.node_line("Body");
        self.compound(&subprogram.body);
        self.level -= 1;
    }

    fn parameter(&mut self, parameter: &Parameter) {
        let prefix = if parameter.by_ref { "var " } else { "" };
        self.node_line(&format!(
            "{prefix}{}: {}",
            parameter.ids.join(", "),
            basic_name(parameter.basic_type)
        ));
    }

    fn const_decl(&mut self, decl: &ConstDecl) {
        self.node_line(&format!("{} = {}", decl.id, decl.value));
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        self.node_line(&decl.ids.join(", "));
        self.level += 1;
        self.type_node(&decl.ty);
        self.level -= 1;
    }

    fn type_node(&mut self, ty: &TypeNode) {
        if ty.periods.is_empty() {
            self.value_line("Type", basic_name(ty.basic));
        } else {
            self.node_line(&format!("{} Array", basic_name(ty.basic)));
            self.level += 1;
            for (lower, upper) in &ty.periods {
                self.node_line(&format!("Range: {lower}..{upper}"));
            }
            self.level -= 1;
        }
    }

    fn variable(&mut self, variable: &Variable) {
        if variable.indices.is_empty() {
            self.node_line(&format!("Variable: {}", variable.id));
            return;
        }
        self.node_line(&format!("Variable: {} [array]", variable.id));
        self.level += 1;
        self.node_line("Indices");
        self.level += 1;
        for index in &variable.indices {
            self.expression(index);
        }
        self.level -= 2;
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Empty => self.node_line("NullStatement"),
            Statement::Break => self.node_line("Break"),
            Statement::Assign(assign) => self.assign(assign),
            Statement::Call(call) => self.call(call),
            Statement::Compound(compound) => self.compound(compound),
            Statement::If(if_statement) => self.if_statement(if_statement),
            Statement::For(for_statement) => self.for_statement(for_statement),
            Statement::While(while_statement) => self.while_statement(while_statement),
            Statement::Read(read) => self.read(read),
            Statement::Write(write) => self.write(write),
        }
    }

    fn compound(&mut self, compound: &CompoundStatement) {
        self.node_line("Compound {");
        self.level += 1;
        for statement in &compound.statements {
            self.statement(statement);
        }
        self.level -= 1;
        self.node_line("}");
    }

    fn assign(&mut self, assign: &Assign) {
        self.node_line("Assignment");
        self.level += 1;
        self.node_line("Left");
        self.level += 1;
        self.variable(&assign.left);
        self.level -= 1;
        self.node_line("Right");
        self.level += 1;
        self.expression(&assign.right);
        self.level -= 2;
    }

    fn call(&mut self, call: &ProcedureCall) {
        if call.args.is_empty() {
            self.node_line(&format!("Call: {} (no params)", call.id));
            return;
        }
        self.node_line(&format!("Call: {}", call.id));
        self.level += 1;
        self.node_line("Parameters");
        self.level += 1;
        for arg in &call.args {
            self.expression(arg);
        }
        self.level -= 2;
    }

    fn if_statement(&mut self, if_statement: &If) {
        self.node_line("If");
        self.level += 1;
        self.node_line("Condition");
        self.level += 1;
        self.expression(&if_statement.condition);
        self.level -= 1;
        self.node_line("Then");
        self.level += 1;
        self.statement(&if_statement.then_branch);
        self.level -= 1;
        if let Some(else_branch) = &if_statement.else_branch {
            self.node_line("Else");
            self.level += 1;
            self.statement(else_branch);
            self.level -= 1;
        }
        self.level -= 1;
    }

    fn for_statement(&mut self, for_statement: &For) {
        self.node_line(&format!("For: {}", for_statement.id));
        self.level += 1;
        self.node_line("From");
        self.level += 1;
        self.expression(&for_statement.from);
        self.level -= 1;
        self.node_line("To");
        self.level += 1;
        self.expression(&for_statement.to);
        self.level -= 1;
        self.node_line("Do");
        self.level += 1;
        self.statement(&for_statement.body);
        self.level -= 2;
    }

    fn while_statement(&mut self, while_statement: &While) {
        self.node_line("While");
        self.level += 1;
        self.node_line("Condition");
        self.level += 1;
        self.expression(&while_statement.condition);
        self.level -= 1;
        self.node_line("Do");
        self.level += 1;
        self.statement(&while_statement.body);
        self.level -= 2;
    }

    fn read(&mut self, read: &Read) {
        self.node_line("Read");
        self.level += 1;
        for target in &read.targets {
            self.variable(target);
        }
        self.level -= 1;
    }

    fn write(&mut self, write: &Write) {
        self.node_line("Write");
        self.level += 1;
        for value in &write.values {
            self.expression(value);
        }
        self.level -= 1;
    }

    fn factor(&mut self, factor: &Factor) {
        let name = factor_kind_name(&factor.kind);
        match &factor.kind {
            FactorKind::Number(text) => {
                self.node_line(&format!("Factor: {name} ({text})"));
                self.level += 1;
                self.value_line("Value", text);
                self.level -= 1;
            }
            FactorKind::Boolean(text) | FactorKind::UnknownIdent(text) => {
                self.node_line(&format!("Factor: {name}"));
                self.level += 1;
                self.value_line("Value", text);
                self.level -= 1;
            }
            FactorKind::Variable(variable) => {
                self.node_line(&format!("Factor: {name}"));
                self.level += 1;
                self.node_line("Value");
                self.level += 1;
                self.variable(variable);
                self.level -= 2;
            }
            FactorKind::Call(call) => {
                self.node_line(&format!("Factor: {name}"));
                self.level += 1;
                self.node_line("Value");
                self.level += 1;
                self.call(call);
                self.level -= 2;
            }
            FactorKind::Parenthesized(expr) => {
                self.node_line(&format!("Factor: {name}"));
                self.level += 1;
                self.node_line("Value");
                self.level += 1;
                self.expression(expr);
                self.level -= 2;
            }
            FactorKind::UnaryPlus(operand)
            | FactorKind::UnaryMinus(operand)
            | FactorKind::Not(operand) => {
                self.node_line(&format!("Factor: {name}"));
                self.level += 1;
                self.node_line("Value");
                self.level += 1;
                self.factor(operand);
                self.level -= 2;
            }
        }
    }

    fn term(&mut self, term: &Term) {
        self.node_line("Term");
        self.level += 1;
        self.factor(&term.first);
        for (op, factor) in &term.rest {
            self.node_line(&format!("Op: {}", mul_op_name(*op)));
            self.level += 1;
            self.factor(factor);
            self.level -= 1;
        }
        self.level -= 1;
    }

    fn simple_expression(&mut self, simple: &SimpleExpression) {
        self.node_line("SimpleExpression");
        self.level += 1;
        self.term(&simple.first);
        for (op, term) in &simple.rest {
            self.node_line(&format!("Op: {}", add_op_name(*op)));
            self.level += 1;
            self.term(term);
            self.level -= 1;
        }
        self.level -= 1;
    }

    fn expression(&mut self, expr: &Expression) {
        match &expr.right {
            Some((op, _)) => self.node_line(&format!("Expression [{}]", rel_op_name(*op))),
            None => self.node_line("Expression"),
        }
        self.level += 1;
        self.node_line("Left");
        self.level += 1;
        self.simple_expression(&expr.left);
        self.level -= 1;
        if let Some((_, right)) = &expr.right {
            self.node_line("Right");
            self.level += 1;
            self.simple_expression(right);
            self.level -= 1;
        }
        self.level -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn dump(src: &str) -> String {
        let tokens = lexer::scan(src).expect("lex failure in printer test");
        let program = parser::parse(&tokens).expect("parse failure in printer test");
        print(&program, false)
    }

    #[test]
    fn dump_bare_program() {
        let tree = dump("program hello; begin end.");
        assert!(tree.contains("Program: hello"));
        assert!(tree.contains("Compound {"));
        assert!(tree.contains("NullStatement"));
    }

    #[test]
    fn dump_has_no_ansi_codes_without_colorize() {
        let tree = dump("program p; var i: integer; begin i := 1 end.");
        assert!(!tree.contains('\x1b'));
    }

    #[test]
    fn dump_colorized_wraps_node_labels() {
        let tokens = lexer::scan("program p; begin end.").unwrap();
        let program = parser::parse(&tokens).unwrap();
        let tree = print(&program, true);
        assert!(tree.contains("\x1b[1;34mProgram: p\x1b[0m"));
    }

    #[test]
    fn dump_subprogram_and_types() {
        let tree = dump(
            "program p; var a: array[1..3] of integer; \
             function f(x: real): integer; begin f := 1 end; begin end.",
        );
        assert!(tree.contains("Subprogram: f"));
        assert!(tree.contains("Return Type: int"));
        assert!(tree.contains("x: float"));
        assert!(tree.contains("int Array"));
        assert!(tree.contains("Range: 1..3"));
    }

    #[test]
    fn dump_expression_shape() {
        let tree = dump("program p; var i: integer; begin if i > 0 then i := i + 1 end.");
        assert!(tree.contains("Expression [>]"));
        assert!(tree.contains("Op: +"));
        assert!(tree.contains("Factor: Unknown"));
    }
}
