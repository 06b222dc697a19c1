//! C source emission.
//!
//! Walks the annotated tree and renders compilable C. Only runs when the
//! semantic pass reported zero errors; a missing annotation here is a
//! programmer error, not a user error.

use std::collections::HashMap;

use crate::ast::{
    AddOp, Assign, BasicType, CompoundStatement, ConstDecl, Expression, Factor, FactorKind, For,
    If, MulOp, Parameter, ProcedureCall, Program, Read, RelOp, SimpleExpression, Statement,
    Subprogram, Term, VarDecl, Variable, While, Write,
};
use crate::semantics::Annotations;

/// Renders the whole program as C text.
pub fn emit(program: &Program, annotations: &Annotations) -> String {
    let mut generator = Generator::new(annotations);
    generator.program(program);
    generator.out
}

struct Generator<'a> {
    ann: &'a Annotations,
    out: String,
    level: usize,
    /// Per-array lower bounds, keyed by C identifier; used to shift index
    /// expressions to zero origin.
    array_bias: HashMap<String, Vec<i64>>,
    /// Enclosing subprogram id, or "main" for the program body.
    current: String,
}

fn basic_c_name(basic: BasicType) -> &'static str {
    match basic {
        BasicType::Integer => "int",
        BasicType::Real => "float",
        BasicType::Boolean => "bool",
        BasicType::Char => "char",
    }
}

/// C spelling of an additive operator; also used by the tree printer.
pub fn add_op_name(op: AddOp) -> &'static str {
    match op {
        AddOp::Plus => "+",
        AddOp::Minus => "-",
        AddOp::Or => "||",
    }
}

/// C spelling of a multiplicative operator; `div` and `/` both become `/`.
pub fn mul_op_name(op: MulOp) -> &'static str {
    match op {
        MulOp::Times => "*",
        MulOp::RDiv | MulOp::Div => "/",
        MulOp::Mod => "%",
        MulOp::And => "&&",
    }
}

/// C spelling of a relational operator.
pub fn rel_op_name(op: RelOp) -> &'static str {
    match op {
        RelOp::Gt => ">",
        RelOp::Eq => "==",
        RelOp::Le => "<=",
        RelOp::Ge => ">=",
        RelOp::Lt => "<",
        RelOp::NotEq => "!=",
    }
}

impl<'a> Generator<'a> {
    fn new(ann: &'a Annotations) -> Self {
        Self {
            ann,
            out: String::new(),
            level: 0,
            array_bias: HashMap::new(),
            current: "main".to_string(),
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.level {
            self.out.push_str("  ");
        }
    }

    fn program(&mut self, program: &Program) {
        self.out.push_str("#include <stdio.h>\n#include <stdlib.h>\n#include <stdbool.h>\n");

        for decl in &program.const_decls {
            self.const_decl(decl);
        }
        for decl in &program.var_decls {
            self.var_decl(decl);
        }
        for subprogram in &program.subprograms {
            self.subprogram(subprogram);
        }

        self.out.push_str("int main()\n");
        self.current = "main".to_string();
        self.compound(&program.body, true);
    }

    fn subprogram(&mut self, subprogram: &Subprogram) {
        self.current = subprogram.id.clone();
        self.indent();
        match subprogram.return_type {
            Some(ret) => {
                self.out.push_str(basic_c_name(ret));
                self.out.push(' ');
            }
            None => self.out.push_str("void "),
        }
        self.out.push_str(&subprogram.id);
        self.out.push('(');
        let last = subprogram.parameters.len().saturating_sub(1);
        for (i, parameter) in subprogram.parameters.iter().enumerate() {
            self.parameter(parameter);
            if i != last {
                self.out.push_str(", ");
            }
        }
        self.out.push_str(") {\n");
        self.level += 1;
        for decl in &subprogram.const_decls {
            self.const_decl(decl);
        }
        for decl in &subprogram.var_decls {
            self.var_decl(decl);
        }
        if let Some(ret) = subprogram.return_type {
            // The hidden local that receives every `f := expr`.
            self.indent();
            self.out.push_str(basic_c_name(ret));
            self.out.push(' ');
            self.out.push_str(&subprogram.id);
            self.out.push_str("_return;\n");
        }
        self.compound(&subprogram.body, false);
        if subprogram.return_type.is_some() {
            self.indent();
            self.out.push_str("return ");
            self.out.push_str(&subprogram.id);
            self.out.push_str("_return;\n");
        }
        self.level -= 1;
        self.indent();
        self.out.push_str("}\n");
    }

    fn parameter(&mut self, parameter: &Parameter) {
        let c_type = basic_c_name(parameter.basic_type);
        let ptr = if parameter.by_ref { "*" } else { "" };
        let last = parameter.ids.len().saturating_sub(1);
        for (i, id) in parameter.ids.iter().enumerate() {
            self.out.push_str(c_type);
            self.out.push_str(ptr);
            self.out.push(' ');
            self.out.push_str(id);
            if i != last {
                self.out.push_str(", ");
            }
        }
    }

    /// A constant's C type is inferred from its literal text alone.
    fn const_decl(&mut self, decl: &ConstDecl) {
        self.indent();
        let value = decl.value.as_str();
        let c_type = if value.starts_with('\'') {
            "const char "
        } else if value.contains('.') {
            "const float "
        } else if value.starts_with('t') || value.starts_with('f') {
            "const bool "
        } else if value.starts_with('"') {
            "const char* "
        } else {
            "const int "
        };
        self.out.push_str(c_type);
        self.out.push_str(&decl.id);
        self.out.push_str(" = ");
        self.out.push_str(value);
        self.out.push_str(";\n");
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        self.indent();
        self.out.push_str(basic_c_name(decl.ty.basic));
        self.out.push(' ');
        let last = decl.ids.len().saturating_sub(1);
        if decl.ty.periods.is_empty() {
            for (i, id) in decl.ids.iter().enumerate() {
                self.out.push_str(id);
                if i != last {
                    self.out.push_str(", ");
                }
            }
        } else {
            // Pascal range (l, u) becomes a C dimension of u - l + 1; the
            // lower bounds are remembered so index accesses can be shifted.
            let bounds: Vec<(i64, i64)> = decl
                .ty
                .periods
                .iter()
                .map(|(l, u)| (l.parse().unwrap(), u.parse().unwrap()))
                .collect();
            for (i, id) in decl.ids.iter().enumerate() {
                self.out.push_str(id);
                for (lower, upper) in &bounds {
                    self.out.push('[');
                    self.out.push_str(&(upper - lower + 1).to_string());
                    self.out.push(']');
                }
                self.array_bias.insert(id.clone(), bounds.iter().map(|(l, _)| *l).collect());
                if i != last {
                    self.out.push_str(", ");
                }
            }
        }
        self.out.push_str(";\n");
    }

    // -------------------------
    // Statements
    // -------------------------

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Empty => {
                self.indent();
                self.out.push_str(";\n");
            }
            Statement::Assign(assign) => self.assign(assign),
            Statement::Call(call) => {
                self.indent();
                self.call(call);
                self.out.push_str(";\n");
            }
            Statement::Compound(compound) => self.compound(compound, false),
            Statement::If(if_statement) => self.if_statement(if_statement),
            Statement::For(for_statement) => self.for_statement(for_statement),
            Statement::While(while_statement) => self.while_statement(while_statement),
            Statement::Read(read) => self.read(read),
            Statement::Write(write) => self.write(write),
            Statement::Break => {
                self.indent();
                self.out.push_str("break;\n");
            }
        }
    }

    /// Empty statements exist only for Pascal's semicolon tolerance and are
    /// dropped from blocks. The main body gets `return 0;` before its brace.
    fn compound(&mut self, compound: &CompoundStatement, is_main_body: bool) {
        self.indent();
        self.out.push_str("{\n");
        self.level += 1;
        for statement in &compound.statements {
            if matches!(statement, Statement::Empty) {
                continue;
            }
            self.statement(statement);
        }
        if is_main_body {
            self.indent();
            self.out.push_str("return 0;\n");
        }
        self.level -= 1;
        self.indent();
        self.out.push_str("}\n");
    }

    /// Non-compound branch bodies get one extra indent level and no braces.
    fn branch(&mut self, body: &Statement) {
        if matches!(body, Statement::Compound(_)) {
            self.statement(body);
        } else {
            self.level += 1;
            self.statement(body);
            self.level -= 1;
        }
    }

    fn assign(&mut self, assign: &Assign) {
        self.indent();
        self.variable(&assign.left);
        if self.ann.is_function_return.get(&assign.id).copied().unwrap_or(false) {
            self.out.push_str("_return = ");
        } else {
            self.out.push_str(" = ");
        }
        self.expression(&assign.right);
        self.out.push_str(";\n");
    }

    fn if_statement(&mut self, if_statement: &If) {
        self.indent();
        self.out.push_str("if (");
        self.expression(&if_statement.condition);
        self.out.push_str(")\n");
        self.branch(&if_statement.then_branch);
        if let Some(else_branch) = &if_statement.else_branch {
            self.indent();
            self.out.push_str("else\n");
            self.branch(else_branch);
        }
    }

    fn for_statement(&mut self, for_statement: &For) {
        // Pascal's `to` is inclusive.
        self.indent();
        self.out.push_str("for (");
        self.out.push_str(&for_statement.id);
        self.out.push_str(" = ");
        self.expression(&for_statement.from);
        self.out.push_str("; ");
        self.out.push_str(&for_statement.id);
        self.out.push_str(" <= ");
        self.expression(&for_statement.to);
        self.out.push_str("; ");
        self.out.push_str(&for_statement.id);
        self.out.push_str("++)\n");
        self.branch(&for_statement.body);
    }

    fn while_statement(&mut self, while_statement: &While) {
        self.indent();
        self.out.push_str("while (");
        self.expression(&while_statement.condition);
        self.out.push_str(")\n");
        self.branch(&while_statement.body);
    }

    fn read(&mut self, read: &Read) {
        self.indent();
        self.out.push_str("scanf(\"");
        if let Some(fmt) = self.ann.read_format.get(&read.id) {
            self.out.push_str(fmt);
        }
        self.out.push_str("\", ");
        let last = read.targets.len().saturating_sub(1);
        for (i, target) in read.targets.iter().enumerate() {
            self.out.push('&');
            self.variable(target);
            if target.indices.is_empty() && target.id == self.current {
                self.out.push_str("_return");
            }
            if i != last {
                self.out.push_str(", ");
            }
        }
        self.out.push_str(");\n");
    }

    fn write(&mut self, write: &Write) {
        self.indent();
        self.out.push_str("printf(\"");
        if let Some(fmt) = self.ann.write_format.get(&write.id) {
            self.out.push_str(fmt);
        }
        self.out.push_str("\", ");
        let last = write.values.len().saturating_sub(1);
        for (i, expr) in write.values.iter().enumerate() {
            self.expression(expr);
            if i != last {
                self.out.push_str(", ");
            }
        }
        self.out.push_str(");\n");
    }

    // -------------------------
    // Expressions
    // -------------------------

    /// True when `name` is a VAR parameter of the enclosing subprogram, in
    /// which case every scalar use is a pointer dereference.
    fn is_deref(&self, name: &str) -> bool {
        if self.current == "main" {
            return false;
        }
        let Some(names) = self.ann.param_names.get(&self.current) else {
            return false;
        };
        match names.iter().position(|n| n == name) {
            Some(index) => self
                .ann
                .var_params
                .get(&self.current)
                .and_then(|flags| flags.get(index))
                .copied()
                .unwrap_or(false),
            None => false,
        }
    }

    fn variable(&mut self, variable: &Variable) {
        if variable.indices.is_empty() && self.is_deref(&variable.id) {
            self.out.push('*');
        }
        self.out.push_str(&variable.id);
        let bias = self.array_bias.get(&variable.id).cloned();
        for (i, index) in variable.indices.iter().enumerate() {
            self.out.push('[');
            self.expression(index);
            if let Some(lower) = bias.as_ref().and_then(|b| b.get(i)) {
                if *lower != 0 {
                    self.out.push_str(" - ");
                    self.out.push_str(&lower.to_string());
                }
            }
            self.out.push(']');
        }
    }

    fn call(&mut self, call: &ProcedureCall) {
        self.out.push_str(&call.id);
        self.out.push('(');
        let by_ref = self.ann.var_params.get(&call.id).cloned().unwrap_or_default();
        let last = call.args.len().saturating_sub(1);
        for (i, arg) in call.args.iter().enumerate() {
            if by_ref.get(i).copied().unwrap_or(false) {
                self.out.push('&');
            }
            self.expression(arg);
            if i != last {
                self.out.push_str(", ");
            }
        }
        self.out.push(')');
    }

    fn factor(&mut self, factor: &Factor) {
        match &factor.kind {
            FactorKind::Number(text) => self.out.push_str(text),
            FactorKind::Boolean(text) => self.out.push_str(text),
            FactorKind::Variable(variable) => self.variable(variable),
            FactorKind::Call(call) => self.call(call),
            FactorKind::Parenthesized(expr) => {
                self.out.push_str(" ( ");
                self.expression(expr);
                self.out.push_str(" ) ");
            }
            FactorKind::UnaryPlus(operand) => {
                self.out.push('+');
                self.factor(operand);
            }
            FactorKind::UnaryMinus(operand) => {
                self.out.push_str("- ");
                self.factor(operand);
            }
            FactorKind::Not(operand) => {
                if self.ann.not_is_bitwise.get(&factor.id).copied().unwrap_or(false) {
                    self.out.push('~');
                } else {
                    self.out.push('!');
                }
                self.factor(operand);
            }
            FactorKind::UnknownIdent(name) => {
                if self.ann.factor_is_call.get(&factor.id).copied().unwrap_or(false) {
                    self.out.push_str(name);
                    self.out.push_str("()");
                } else {
                    if self.is_deref(name) {
                        self.out.push('*');
                    }
                    self.out.push_str(name);
                }
            }
        }
    }

    fn term(&mut self, term: &Term) {
        self.factor(&term.first);
        for (op, factor) in &term.rest {
            self.out.push(' ');
            self.out.push_str(mul_op_name(*op));
            self.out.push(' ');
            self.factor(factor);
        }
    }

    fn simple_expression(&mut self, simple: &SimpleExpression) {
        self.term(&simple.first);
        for (op, term) in &simple.rest {
            self.out.push(' ');
            self.out.push_str(add_op_name(*op));
            self.out.push(' ');
            self.term(term);
        }
    }

    fn expression(&mut self, expr: &Expression) {
        self.simple_expression(&expr.left);
        if let Some((op, right)) = &expr.right {
            self.out.push(' ');
            self.out.push_str(rel_op_name(*op));
            self.out.push(' ');
            self.simple_expression(right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;
    use crate::semantics;

    fn emit_src(src: &str) -> String {
        let tokens = lexer::scan(src).expect("lex failure in backend test");
        let program = parser::parse(&tokens).expect("parse failure in backend test");
        let analysis = semantics::analyze(&program);
        assert!(analysis.errors.is_empty(), "semantic errors: {:?}", analysis.errors);
        emit(&program, &analysis.annotations)
    }

    #[test]
    fn emit_bare_program() {
        let c = emit_src("program hello; begin end.");
        assert!(c.starts_with("#include <stdio.h>\n#include <stdlib.h>\n#include <stdbool.h>\n"));
        assert!(c.contains("int main()\n{\n  return 0;\n}\n"), "got:\n{c}");
    }

    #[test]
    fn emit_constants_preserve_literal_text() {
        let c = emit_src(
            "program p; const pi = 3.14; n = 42; neg = -5; c = 'x'; s = 'ab'; begin end.",
        );
        assert!(c.contains("const float pi = 3.14;\n"));
        assert!(c.contains("const int n = 42;\n"));
        assert!(c.contains("const int neg = -5;\n"));
        assert!(c.contains("const char c = 'x';\n"));
        assert!(c.contains("const char* s = \"ab\";\n"));
    }

    #[test]
    fn emit_var_parameter_takes_pointer() {
        let c = emit_src(
            "program p; var a: integer; \
             procedure inc(var x: integer); begin x := x + 1 end; \
             begin a := 0; inc(a) end.",
        );
        assert!(c.contains("void inc(int* x)"), "got:\n{c}");
        assert!(c.contains("*x = *x + 1;"), "got:\n{c}");
        assert!(c.contains("inc(&a);"), "got:\n{c}");
    }

    #[test]
    fn emit_function_return_variable() {
        let c = emit_src("program p; function f: integer; begin f := 7 end; begin end.");
        assert!(c.contains("int f_return;"), "got:\n{c}");
        assert!(c.contains("f_return = 7;"), "got:\n{c}");
        assert!(c.contains("return f_return;"), "got:\n{c}");
    }

    #[test]
    fn emit_array_with_nonzero_origin() {
        let c = emit_src("program p; var a: array[3..5] of integer; begin a[3] := 0 end.");
        assert!(c.contains("int a[3];"), "got:\n{c}");
        assert!(c.contains("a[3 - 3] = 0;"), "got:\n{c}");
    }

    #[test]
    fn emit_zero_origin_array_skips_bias() {
        let c = emit_src("program p; var a: array[0..4] of integer; begin a[2] := 1 end.");
        assert!(c.contains("int a[5];"), "got:\n{c}");
        assert!(c.contains("a[2] = 1;"), "got:\n{c}");
    }

    #[test]
    fn emit_multidimensional_array() {
        let c = emit_src(
            "program p; var m: array[1..2, 3..6] of real; begin m[1, 3] := 0.5 end.",
        );
        assert!(c.contains("float m[2][4];"), "got:\n{c}");
        assert!(c.contains("m[1 - 1][3 - 3] = 0.5;"), "got:\n{c}");
    }

    #[test]
    fn emit_write_format_inference() {
        let c = emit_src("program p; var i: integer; r: real; c: char; begin write(i, r, c) end.");
        assert!(c.contains("printf(\"%d%f%c\", i, r, c);"), "got:\n{c}");
    }

    #[test]
    fn emit_read_takes_addresses() {
        let c = emit_src("program p; var i: integer; r: real; begin read(i, r) end.");
        assert!(c.contains("scanf(\"%d %f\", &i, &r);"), "got:\n{c}");
    }

    #[test]
    fn emit_read_into_function_result() {
        let c = emit_src(
            "program p; function f: integer; begin read(f); f := f end; begin end.",
        );
        assert!(c.contains("scanf(\"%d\", &f_return);"), "got:\n{c}");
    }

    #[test]
    fn emit_operator_translation() {
        let c = emit_src(
            "program p; var i, j: integer; b: boolean; \
             begin i := i div j; i := i mod j; b := (i = j) or (i <> j); \
             b := b and true; i := not i end.",
        );
        assert!(c.contains("i = i / j;"), "got:\n{c}");
        assert!(c.contains("i = i % j;"), "got:\n{c}");
        assert!(c.contains("i == j"), "got:\n{c}");
        assert!(c.contains("i != j"), "got:\n{c}");
        assert!(c.contains("||"), "got:\n{c}");
        assert!(c.contains("b && true"), "got:\n{c}");
        assert!(c.contains("i = ~i;"), "got:\n{c}");
    }

    #[test]
    fn emit_logical_not_over_boolean() {
        let c = emit_src("program p; var b: boolean; begin b := not b end.");
        assert!(c.contains("b = !b;"), "got:\n{c}");
    }

    #[test]
    fn emit_for_loop_is_inclusive() {
        let c = emit_src(
            "program p; var i, s: integer; begin for i := 1 to 10 do s := s + i end.",
        );
        assert!(c.contains("for (i = 1; i <= 10; i++)\n"), "got:\n{c}");
        assert!(c.contains("    s = s + i;"), "got:\n{c}");
    }

    #[test]
    fn emit_if_without_braces_indents_branch() {
        let c = emit_src(
            "program p; var i: integer; begin if i > 0 then i := 1 else i := 2 end.",
        );
        assert!(c.contains("if (i > 0)\n    i = 1;\n  else\n    i = 2;\n"), "got:\n{c}");
    }

    #[test]
    fn emit_if_with_compound_branch_keeps_braces() {
        let c = emit_src(
            "program p; var i: integer; begin if i > 0 then begin i := 1 end end.",
        );
        assert!(c.contains("if (i > 0)\n  {\n    i = 1;\n  }\n"), "got:\n{c}");
    }

    #[test]
    fn emit_while_and_break() {
        let c = emit_src(
            "program p; var i: integer; begin while true do begin i := i + 1; break end end.",
        );
        assert!(c.contains("while (true)\n"), "got:\n{c}");
        assert!(c.contains("break;\n"), "got:\n{c}");
    }

    #[test]
    fn emit_parameterless_function_call_gets_parens() {
        let c = emit_src(
            "program p; var i: integer; \
             function f: integer; begin f := 1 end; \
             begin i := f end.",
        );
        assert!(c.contains("i = f();"), "got:\n{c}");
    }

    #[test]
    fn emit_string_constant_write() {
        let c = emit_src("program p; const msg = 'hi there'; begin write(msg) end.");
        assert!(c.contains("const char* msg = \"hi there\";"), "got:\n{c}");
        assert!(c.contains("printf(\"%s\", msg);"), "got:\n{c}");
    }

    #[test]
    fn emit_empty_branch_body_is_a_lone_semicolon() {
        let c = emit_src("program p; var i: integer; begin if i > 0 then ; end.");
        assert!(c.contains("if (i > 0)\n    ;\n"), "got:\n{c}");
    }

    #[test]
    fn emit_multiple_subprograms_in_source_order() {
        let c = emit_src(
            "program p; procedure a; begin end; procedure b; begin end; begin end.",
        );
        let pos_a = c.find("void a()").unwrap();
        let pos_b = c.find("void b()").unwrap();
        let pos_main = c.find("int main()").unwrap();
        assert!(pos_a < pos_b && pos_b < pos_main);
    }
}
