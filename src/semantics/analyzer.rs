use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{
    AddOp, Assign, BasicType, CompoundStatement, ConstDecl, Expression, Factor, FactorKind, For,
    If, MulOp, NodeId, Parameter, ProcedureCall, Program, Read, RelOp, SimpleExpression,
    Statement, Subprogram, Term, TypeNode, VarDecl, Variable, While, Write,
};
use crate::semantics::symbols::{
    EntryRef, ScopeRef, ScopeStack, SemanticDiagnostic, SemanticErrorKind, SymbolEntry,
    SymbolType, TypeRef,
};

/// Side tables produced by the semantic pass and consumed by the C backend.
/// Keyed by parser-minted node ids; never mutated after analysis completes.
#[derive(Debug, Default)]
pub struct Annotations {
    /// True for an assignment whose left-hand side names the enclosing
    /// function (Pascal's implicit function-result assignment).
    pub is_function_return: HashMap<NodeId, bool>,
    /// scanf format string per read statement, one specifier per target.
    pub read_format: HashMap<NodeId, String>,
    /// printf format string per write statement, one specifier per value.
    pub write_format: HashMap<NodeId, String>,
    /// True for an unknown-identifier factor that resolves to a callable.
    pub factor_is_call: HashMap<NodeId, bool>,
    /// True for a `not` factor whose operand is integer (bitwise `~` in C).
    pub not_is_bitwise: HashMap<NodeId, bool>,
    /// Per-parameter by-reference flags per subprogram, declaration order.
    pub var_params: HashMap<String, Vec<bool>>,
    /// Parameter names per subprogram, declaration order.
    pub param_names: HashMap<String, Vec<String>>,
}

/// Result of the semantic pass. The global scope keeps every nested scope
/// alive through the callable entries that own them.
#[derive(Debug)]
pub struct Analysis {
    pub global_scope: ScopeRef,
    pub annotations: Annotations,
    pub errors: Vec<SemanticDiagnostic>,
}

/// Walks the tree, builds the scope structure, type-checks and fills the
/// annotation maps. Violations accumulate; the pass never stops early.
pub fn analyze(program: &Program) -> Analysis {
    let mut analyzer = SemanticAnalyzer::new();
    analyzer.run(program);
    Analysis {
        global_scope: analyzer.global,
        annotations: analyzer.annotations,
        errors: analyzer.errors,
    }
}

struct SemanticAnalyzer {
    scopes: ScopeStack,
    global: ScopeRef,
    annotations: Annotations,
    errors: Vec<SemanticDiagnostic>,
}

impl SemanticAnalyzer {
    fn new() -> Self {
        let mut scopes = ScopeStack::default();
        let global = scopes.push();
        Self { scopes, global, annotations: Annotations::default(), errors: Vec::new() }
    }

    fn scope(&self) -> ScopeRef {
        self.scopes.current().unwrap_or_else(|| Rc::clone(&self.global))
    }

    fn report(&mut self, kind: SemanticErrorKind, message: String, line: usize) {
        self.errors.push(SemanticDiagnostic { kind, message, line });
    }

    fn define(&mut self, entry: SymbolEntry) {
        let line = entry.line;
        let name = entry.name.clone();
        if self.scope().borrow_mut().insert(Rc::new(entry)).is_err() {
            self.report(
                SemanticErrorKind::DuplicateDefinition,
                format!("identifier '{name}' is already defined in the current scope"),
                line,
            );
        }
    }

    fn lookup(&self, name: &str) -> Option<EntryRef> {
        self.scope().borrow().recursive_lookup(name)
    }

    fn level(&self) -> i32 {
        self.scope().borrow().level()
    }

    // -------------------------
    // Declarations
    // -------------------------

    fn run(&mut self, program: &Program) {
        // The program body is emitted as C's main; the backend treats it as
        // a parameterless procedure named main.
        self.annotations.var_params.insert("main".to_string(), Vec::new());
        self.annotations.param_names.insert("main".to_string(), Vec::new());

        for decl in &program.const_decls {
            self.const_decl(decl);
        }
        for decl in &program.var_decls {
            self.var_decl(decl);
        }
        for subprogram in &program.subprograms {
            self.subprogram(subprogram);
        }
        self.compound(&program.body);
    }

    /// Constant types are inferred from the literal's textual shape; a
    /// quoted string is carried as a char entry whose constant value keeps
    /// the quotes, which is what the `%s` inference in `write` looks for.
    fn const_decl(&mut self, decl: &ConstDecl) {
        let value = decl.value.as_str();
        let is_integral = !value.is_empty()
            && value.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-');
        let is_char = value.len() == 3 && value.starts_with('\'') && value.ends_with('\'');
        let is_string = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');

        let ty = if is_integral {
            BasicType::Integer
        } else if is_char {
            BasicType::Char
        } else if value.contains('.') {
            BasicType::Real
        } else if is_string {
            BasicType::Char
        } else {
            self.report(
                SemanticErrorKind::TypeMismatch,
                format!("Unknown constant type for '{}'", decl.id),
                decl.line,
            );
            return;
        };

        let mut entry =
            SymbolEntry::new(&decl.id, Rc::new(SymbolType::Basic(ty)), self.level(), decl.line);
        entry.is_constant = true;
        entry.const_value = Some(decl.value.clone());
        self.define(entry);
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        let Some(ty) = self.resolve_type(&decl.ty, decl.line) else {
            return;
        };
        for id in &decl.ids {
            self.define(SymbolEntry::new(id, Rc::clone(&ty), self.level(), decl.line));
        }
    }

    fn resolve_type(&mut self, ty: &TypeNode, line: usize) -> Option<TypeRef> {
        if ty.periods.is_empty() {
            return Some(Rc::new(SymbolType::Basic(ty.basic)));
        }
        let mut dimensions = Vec::with_capacity(ty.periods.len());
        for (lower, upper) in &ty.periods {
            let (Ok(lo), Ok(hi)) = (lower.parse::<i64>(), upper.parse::<i64>()) else {
                self.report(
                    SemanticErrorKind::Other,
                    format!("Illegal array boundary: {lower}..{upper}"),
                    line,
                );
                return None;
            };
            if lo > hi {
                self.report(
                    SemanticErrorKind::Other,
                    format!("Invalid array bounds: {lower}..{upper}"),
                    line,
                );
            }
            dimensions.push((lo, hi));
        }
        Some(Rc::new(SymbolType::Array { dimensions, element: ty.basic }))
    }

    fn parameter(&mut self, param: &Parameter) {
        let ty = Rc::new(SymbolType::Basic(param.basic_type));
        for id in &param.ids {
            let mut entry = SymbolEntry::new(id, Rc::clone(&ty), self.level(), param.line);
            entry.is_reference = param.by_ref;
            self.define(entry);
        }
    }

    fn subprogram(&mut self, subprogram: &Subprogram) {
        // Build the local scope with the parameters, synthesize the callable
        // type around it, then hook the entry into the enclosing scope so
        // the body (and recursive calls) can resolve it.
        let local_scope = self.scopes.push();
        let mut parameters = Vec::new();
        for param in &subprogram.parameters {
            self.parameter(param);
            for id in &param.ids {
                if let Some(entry) = local_scope.borrow().lookup(id) {
                    parameters.push(entry);
                }
            }
        }
        let callable = SymbolType::Callable {
            is_function: subprogram.is_function,
            return_type: subprogram.return_type,
            parameters,
            local_scope: Rc::clone(&local_scope),
        };
        self.scopes.pop();
        self.define(SymbolEntry::new(
            &subprogram.id,
            Rc::new(callable),
            self.level(),
            subprogram.line,
        ));
        self.scopes.push_existing(local_scope);

        let mut by_ref = Vec::new();
        let mut names = Vec::new();
        for param in &subprogram.parameters {
            for id in &param.ids {
                by_ref.push(param.by_ref);
                names.push(id.clone());
            }
        }
        self.annotations.var_params.insert(subprogram.id.clone(), by_ref);
        self.annotations.param_names.insert(subprogram.id.clone(), names);

        for decl in &subprogram.const_decls {
            self.const_decl(decl);
        }
        for decl in &subprogram.var_decls {
            self.var_decl(decl);
        }
        self.compound(&subprogram.body);
        self.scopes.pop();
    }

    // -------------------------
    // Statements
    // -------------------------

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Empty | Statement::Break => {}
            Statement::Assign(assign) => self.assign(assign),
            Statement::Call(call) => self.procedure_call(call),
            Statement::Compound(compound) => self.compound(compound),
            Statement::If(if_statement) => self.if_statement(if_statement),
            Statement::For(for_statement) => self.for_statement(for_statement),
            Statement::While(while_statement) => self.while_statement(while_statement),
            Statement::Read(read) => self.read(read),
            Statement::Write(write) => self.write(write),
        }
    }

    fn compound(&mut self, compound: &CompoundStatement) {
        for statement in &compound.statements {
            self.statement(statement);
        }
    }

    fn variable(&mut self, variable: &Variable) {
        let Some(entry) = self.lookup(&variable.id) else {
            self.report(
                SemanticErrorKind::UndefinedSymbol,
                format!("Use undeclared variables '{}'", variable.id),
                variable.line,
            );
            return;
        };
        if !self.scopes.is_accessible(&entry) {
            self.report(
                SemanticErrorKind::ScopeViolation,
                format!("variable '{}' Out of its scope", variable.id),
                variable.line,
            );
            return;
        }
        if variable.indices.is_empty() {
            return;
        }

        let SymbolType::Array { dimensions, .. } = entry.ty.as_ref() else {
            self.report(
                SemanticErrorKind::TypeMismatch,
                format!("Variable '{}' is not an array type but used with indices", variable.id),
                variable.line,
            );
            return;
        };
        let dimensions = dimensions.clone();
        if variable.indices.len() != dimensions.len() {
            self.report(
                SemanticErrorKind::Other,
                format!(
                    "Array '{}' has {} dimensions, but accessed with {} indices",
                    variable.id,
                    dimensions.len(),
                    variable.indices.len()
                ),
                variable.line,
            );
            return;
        }
        for (i, index) in variable.indices.iter().enumerate() {
            self.expression(index);
            if let Some(index_type) = self.expression_type(index) {
                if !index_type.is_integer() {
                    self.report(
                        SemanticErrorKind::TypeMismatch,
                        format!(
                            "Array index {} of '{}' must be of integer type, but got '{}'",
                            i + 1,
                            variable.id,
                            index_type.name()
                        ),
                        variable.line,
                    );
                }
            }
            // Literal indices are checked against the declared range here,
            // at compile time.
            if let Some(value) = try_get_constant(index) {
                let (lower, upper) = dimensions[i];
                if value < lower || value > upper {
                    self.report(
                        SemanticErrorKind::ArrayIndexOutOfBounds,
                        format!(
                            "Array index {value} is out of range [{lower}..{upper}] for array '{}' at dimension {}",
                            variable.id,
                            i + 1
                        ),
                        variable.line,
                    );
                }
            }
        }
    }

    fn assign(&mut self, assign: &Assign) {
        self.variable(&assign.left);
        self.expression(&assign.right);

        let Some(left_entry) = self.lookup(&assign.left.id) else {
            // Undefined left side: already reported through the variable.
            self.annotations.is_function_return.insert(assign.id, false);
            return;
        };
        if left_entry.is_constant {
            self.report(
                SemanticErrorKind::ConstantAssignment,
                format!("cannot to constants '{}' assign values", assign.left.id),
                assign.line,
            );
            self.annotations.is_function_return.insert(assign.id, false);
            return;
        }
        let Some(right_type) = self.expression_type(&assign.right) else {
            self.annotations.is_function_return.insert(assign.id, false);
            return;
        };

        // An indexed array access assigns to the element type.
        let left_type: TypeRef = match left_entry.ty.as_ref() {
            SymbolType::Array { element, .. } if !assign.left.indices.is_empty() => {
                Rc::new(SymbolType::Basic(*element))
            }
            _ => Rc::clone(&left_entry.ty),
        };

        match left_type.as_ref() {
            SymbolType::Basic(left_basic) => {
                let compatible = match right_type.basic() {
                    Some(right_basic) => {
                        right_basic == *left_basic
                            || (*left_basic == BasicType::Real && right_basic == BasicType::Integer)
                    }
                    None => false,
                };
                self.annotations.is_function_return.insert(assign.id, false);
                if !compatible {
                    self.assign_mismatch(&assign.left.id, &right_type, &left_type, assign.line);
                }
            }
            SymbolType::Callable { is_function: true, return_type, .. } => {
                // Pascal's function-result assignment: `f := expr` inside f.
                let compatible = match (return_type, right_type.basic()) {
                    (Some(ret), Some(right_basic)) => {
                        *ret == right_basic
                            || (*ret == BasicType::Real && right_basic == BasicType::Integer)
                    }
                    _ => false,
                };
                if compatible {
                    self.annotations.is_function_return.insert(assign.id, true);
                } else {
                    self.annotations.is_function_return.insert(assign.id, false);
                    self.assign_mismatch(&assign.left.id, &right_type, &left_type, assign.line);
                }
            }
            _ => {
                self.annotations.is_function_return.insert(assign.id, false);
                self.assign_mismatch(&assign.left.id, &right_type, &left_type, assign.line);
            }
        }
    }

    fn assign_mismatch(&mut self, name: &str, right: &SymbolType, left: &SymbolType, line: usize) {
        self.report(
            SemanticErrorKind::TypeMismatch,
            format!(
                "Cannot assign value of type '{}' to variable '{name}' of type '{}'",
                right.name(),
                left.name()
            ),
            line,
        );
    }

    fn procedure_call(&mut self, call: &ProcedureCall) {
        let Some(entry) = self.lookup(&call.id) else {
            self.report(
                SemanticErrorKind::UndefinedSymbol,
                format!("Invoke an undeclared procedure '{}'", call.id),
                call.line,
            );
            return;
        };
        let SymbolType::Callable { parameters, .. } = entry.ty.as_ref() else {
            self.report(
                SemanticErrorKind::TypeMismatch,
                format!("'{}' Not a procedure or a function", call.id),
                call.line,
            );
            return;
        };
        let formals: Vec<EntryRef> = parameters.clone();

        if formals.len() != call.args.len() {
            self.report(
                SemanticErrorKind::Other,
                format!(
                    "Procedure/function '{}' requires {} parameters, but {} were given",
                    call.id,
                    formals.len(),
                    call.args.len()
                ),
                call.line,
            );
            return;
        }

        for (i, (arg, formal)) in call.args.iter().zip(&formals).enumerate() {
            self.expression(arg);
            let Some(arg_type) = self.expression_type(arg) else {
                continue;
            };
            if !are_types_compatible(&formal.ty, &arg_type) {
                self.report(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "Parameter {} of call to '{}' has incompatible type: expected '{}', got '{}'",
                        i + 1,
                        call.id,
                        formal.ty.name(),
                        arg_type.name()
                    ),
                    call.line,
                );
            }
            if formal.is_reference && !self.is_modifiable_lvalue(arg) {
                self.report(
                    SemanticErrorKind::VarParamError,
                    format!(
                        "Parameter {} of '{}' requires a variable reference (VAR parameter)",
                        i + 1,
                        call.id
                    ),
                    call.line,
                );
            }
        }
    }

    /// A VAR actual must be a bare variable name or an indexed array access
    /// resolving to a non-constant variable; calls and composite
    /// expressions do not qualify.
    fn is_modifiable_lvalue(&mut self, expr: &Expression) -> bool {
        let Some(factor) = single_factor(expr) else {
            return false;
        };
        match &factor.kind {
            FactorKind::Variable(variable) => match self.lookup(&variable.id) {
                Some(entry) => !entry.is_constant,
                None => false,
            },
            FactorKind::UnknownIdent(name) => match self.lookup(name) {
                Some(entry) => {
                    !entry.is_constant && !matches!(entry.ty.as_ref(), SymbolType::Callable { .. })
                }
                None => {
                    self.report(
                        SemanticErrorKind::UndefinedSymbol,
                        format!("Use undeclared variables '{name}'"),
                        factor.line,
                    );
                    false
                }
            },
            _ => false,
        }
    }

    fn if_statement(&mut self, if_statement: &If) {
        self.expression(&if_statement.condition);
        self.statement(&if_statement.then_branch);
        if let Some(else_branch) = &if_statement.else_branch {
            self.statement(else_branch);
        }
        if let Some(condition_type) = self.expression_type(&if_statement.condition) {
            if !condition_type.is_boolean() {
                self.report(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "If condition must be of boolean type, but got '{}'",
                        condition_type.name()
                    ),
                    if_statement.line,
                );
            }
        }
    }

    fn while_statement(&mut self, while_statement: &While) {
        self.expression(&while_statement.condition);
        self.statement(&while_statement.body);
        if let Some(condition_type) = self.expression_type(&while_statement.condition) {
            if !condition_type.is_boolean() {
                self.report(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "While condition must be of boolean type, but got '{}'",
                        condition_type.name()
                    ),
                    while_statement.line,
                );
            }
        }
    }

    fn for_statement(&mut self, for_statement: &For) {
        let loop_var = self.lookup(&for_statement.id);
        if loop_var.is_none() {
            self.report(
                SemanticErrorKind::UndefinedSymbol,
                format!("Use undeclared loop variables '{}'", for_statement.id),
                for_statement.line,
            );
            return;
        }

        self.expression(&for_statement.from);
        self.expression(&for_statement.to);
        self.statement(&for_statement.body);

        if let Some(entry) = loop_var {
            if !entry.ty.is_integer() {
                self.report(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "For loop variable '{}' must be of integer type, but got '{}'",
                        for_statement.id,
                        entry.ty.name()
                    ),
                    for_statement.line,
                );
            }
        }
        if let Some(lower_type) = self.expression_type(&for_statement.from) {
            if !lower_type.is_integer() {
                self.report(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "For loop lower bound must be of integer type, but got '{}'",
                        lower_type.name()
                    ),
                    for_statement.line,
                );
            }
        }
        if let Some(upper_type) = self.expression_type(&for_statement.to) {
            if !upper_type.is_integer() {
                self.report(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "For loop upper bound must be of integer type, but got '{}'",
                        upper_type.name()
                    ),
                    for_statement.line,
                );
            }
        }
    }

    fn read(&mut self, read: &Read) {
        let mut fmt = String::new();
        let last = read.targets.len().saturating_sub(1);
        for (i, target) in read.targets.iter().enumerate() {
            self.variable(target);

            let Some(entry) = self.lookup(&target.id) else {
                continue;
            };
            if entry.is_constant {
                self.report(
                    SemanticErrorKind::ConstantAssignment,
                    format!("Cannot read into constant '{}'", target.id),
                    read.line,
                );
                continue;
            }
            let is_array = matches!(entry.ty.as_ref(), SymbolType::Array { .. });
            if is_array && target.indices.is_empty() {
                self.report(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "Cannot read into an entire array '{}', must specify array element",
                        target.id
                    ),
                    read.line,
                );
            }

            match entry.ty.as_ref() {
                SymbolType::Basic(basic) => fmt.push_str(format_specifier(*basic)),
                SymbolType::Array { element, .. } => fmt.push_str(format_specifier(*element)),
                SymbolType::Callable { is_function: true, return_type: Some(ret), .. } => {
                    // read(f) inside function f targets the result variable.
                    fmt.push_str(format_specifier(*ret));
                }
                other => {
                    self.report(
                        SemanticErrorKind::TypeMismatch,
                        format!(
                            "Cannot read into variable '{}' of type '{}'",
                            target.id,
                            other.name()
                        ),
                        read.line,
                    );
                }
            }
            if i != last {
                fmt.push(' ');
            }
        }
        self.annotations.read_format.insert(read.id, fmt);
    }

    fn write(&mut self, write: &Write) {
        let mut fmt = String::new();
        for expr in &write.values {
            // A direct identifier naming a quoted-string constant is the one
            // and only source of %s.
            if let Some(name) = direct_ident(expr) {
                if let Some(entry) = self.lookup(name) {
                    if entry.is_constant {
                        if let Some(value) = &entry.const_value {
                            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                                fmt.push_str("%s");
                                continue;
                            }
                        }
                    }
                }
            }
            self.expression(expr);
            let Some(expr_type) = self.expression_type(expr) else {
                continue;
            };
            match expr_type.basic() {
                Some(basic) => fmt.push_str(format_specifier(basic)),
                None => {
                    self.report(
                        SemanticErrorKind::TypeMismatch,
                        format!("Cannot write variable of type '{}'", expr_type.name()),
                        write.line,
                    );
                }
            }
        }
        self.annotations.write_format.insert(write.id, fmt);
    }

    // -------------------------
    // Expressions
    // -------------------------

    fn factor(&mut self, factor: &Factor) {
        match &factor.kind {
            FactorKind::Number(_) | FactorKind::Boolean(_) => {}
            FactorKind::Variable(variable) => self.variable(variable),
            FactorKind::Call(call) => self.procedure_call(call),
            FactorKind::Parenthesized(expr) => self.expression(expr),
            FactorKind::UnaryPlus(operand) | FactorKind::UnaryMinus(operand) => {
                if let Some(operand_type) = self.factor_type(operand) {
                    if !operand_type.is_numeric() {
                        self.report(
                            SemanticErrorKind::TypeMismatch,
                            "Unary minus operator requires numeric operand".to_string(),
                            factor.line,
                        );
                    }
                }
                self.factor(operand);
            }
            FactorKind::Not(operand) => {
                match self.factor_type(operand) {
                    Some(operand_type) if operand_type.is_integer() => {
                        self.annotations.not_is_bitwise.insert(factor.id, true);
                    }
                    Some(operand_type)
                        if operand_type.is_boolean()
                            || matches!(
                                operand_type.basic(),
                                Some(BasicType::Real)
                            ) =>
                    {
                        self.annotations.not_is_bitwise.insert(factor.id, false);
                    }
                    Some(_) => {
                        self.report(
                            SemanticErrorKind::TypeMismatch,
                            "NOT operator requires boolean operand".to_string(),
                            factor.line,
                        );
                    }
                    None => {}
                }
                self.factor(operand);
            }
            FactorKind::UnknownIdent(name) => match self.lookup(name) {
                Some(entry) => {
                    let is_call = matches!(entry.ty.as_ref(), SymbolType::Callable { .. });
                    self.annotations.factor_is_call.insert(factor.id, is_call);
                }
                None => {
                    self.report(
                        SemanticErrorKind::UndefinedSymbol,
                        format!("Use undeclared variable or function '{name}'"),
                        factor.line,
                    );
                }
            },
        }
    }

    fn term(&mut self, term: &Term) {
        self.factor(&term.first);
        let mut left_type = self.factor_type(&term.first);
        for (op, factor) in &term.rest {
            self.factor(factor);
            let right_type = self.factor_type(factor);
            let (Some(left), Some(right)) = (&left_type, &right_type) else {
                left_type = None;
                continue;
            };
            left_type = match op {
                MulOp::Times | MulOp::RDiv => {
                    if !left.is_numeric() || !right.is_numeric() {
                        let op_str = if *op == MulOp::Times { "*" } else { "/" };
                        self.report(
                            SemanticErrorKind::TypeMismatch,
                            format!(
                                "Operator '{op_str}' requires numeric operands, but got '{}' and '{}'",
                                left.name(),
                                right.name()
                            ),
                            factor.line,
                        );
                    }
                    numeric_result(left, right)
                }
                MulOp::Div | MulOp::Mod => {
                    if !left.is_integer() || !right.is_integer() {
                        let op_str = if *op == MulOp::Div { "DIV" } else { "MOD" };
                        self.report(
                            SemanticErrorKind::TypeMismatch,
                            format!(
                                "Operator '{op_str}' requires integer operands, but got '{}' and '{}'",
                                left.name(),
                                right.name()
                            ),
                            factor.line,
                        );
                    }
                    Some(Rc::new(SymbolType::Basic(BasicType::Integer)))
                }
                MulOp::And => {
                    let both_boolean = left.is_boolean() && right.is_boolean();
                    let both_integer = left.is_integer() && right.is_integer();
                    if !both_boolean && !both_integer {
                        self.report(
                            SemanticErrorKind::TypeMismatch,
                            format!(
                                "Operator 'AND' requires boolean operands, but got '{}' and '{}'",
                                left.name(),
                                right.name()
                            ),
                            factor.line,
                        );
                    }
                    // Integer operands fall through as a bit-use; otherwise
                    // the result is boolean.
                    if both_integer {
                        Some(Rc::new(SymbolType::Basic(BasicType::Integer)))
                    } else {
                        Some(Rc::new(SymbolType::Basic(BasicType::Boolean)))
                    }
                }
            };
        }
    }

    fn simple_expression(&mut self, simple: &SimpleExpression) {
        self.term(&simple.first);
        let mut left_type = self.term_type(&simple.first);
        for (op, term) in &simple.rest {
            self.term(term);
            let right_type = self.term_type(term);
            let (Some(left), Some(right)) = (&left_type, &right_type) else {
                left_type = None;
                continue;
            };
            left_type = match op {
                AddOp::Plus | AddOp::Minus => {
                    if !left.is_numeric() || !right.is_numeric() {
                        let op_str = if *op == AddOp::Plus { "+" } else { "-" };
                        self.report(
                            SemanticErrorKind::TypeMismatch,
                            format!(
                                "Operator '{op_str}' requires numeric operands, but got '{}' and '{}'",
                                left.name(),
                                right.name()
                            ),
                            term.first.line,
                        );
                    }
                    numeric_result(left, right)
                }
                AddOp::Or => {
                    let both_boolean = left.is_boolean() && right.is_boolean();
                    let both_integer = left.is_integer() && right.is_integer();
                    if !both_boolean && !both_integer {
                        self.report(
                            SemanticErrorKind::TypeMismatch,
                            format!(
                                "Operator 'OR' requires boolean operands, but got '{}' and '{}'",
                                left.name(),
                                right.name()
                            ),
                            term.first.line,
                        );
                    }
                    if both_integer {
                        Some(Rc::new(SymbolType::Basic(BasicType::Integer)))
                    } else {
                        Some(Rc::new(SymbolType::Basic(BasicType::Boolean)))
                    }
                }
            };
        }
    }

    fn expression(&mut self, expr: &Expression) {
        self.simple_expression(&expr.left);
        let Some((op, right)) = &expr.right else {
            return;
        };
        self.simple_expression(right);

        let (Some(left_type), Some(right_type)) =
            (self.simple_type(&expr.left), self.simple_type(right))
        else {
            return;
        };
        let are_numeric = left_type.is_numeric() && right_type.is_numeric();
        let are_same = are_types_compatible(&left_type, &right_type)
            || are_types_compatible(&right_type, &left_type);
        let compatible = match op {
            RelOp::Gt | RelOp::Lt | RelOp::Ge | RelOp::Le => are_numeric || are_same,
            RelOp::Eq | RelOp::NotEq => {
                are_numeric || are_same || (left_type.is_boolean() && right_type.is_boolean())
            }
        };
        if !compatible {
            self.report(
                SemanticErrorKind::TypeMismatch,
                format!(
                    "Operator '{}' requires compatible operands, but got '{}' and '{}'",
                    rel_op_source(*op),
                    left_type.name(),
                    right_type.name()
                ),
                right.first.first.line,
            );
        }
    }

    // -------------------------
    // Type queries (pure; all error reporting lives in the visits above)
    // -------------------------

    fn expression_type(&self, expr: &Expression) -> Option<TypeRef> {
        if expr.right.is_some() {
            return Some(Rc::new(SymbolType::Basic(BasicType::Boolean)));
        }
        self.simple_type(&expr.left)
    }

    fn simple_type(&self, simple: &SimpleExpression) -> Option<TypeRef> {
        let mut ty = self.term_type(&simple.first)?;
        for (op, term) in &simple.rest {
            let right = self.term_type(term)?;
            ty = match op {
                AddOp::Plus | AddOp::Minus => numeric_result(&ty, &right)?,
                AddOp::Or => {
                    if ty.is_boolean() && right.is_boolean() {
                        Rc::new(SymbolType::Basic(BasicType::Boolean))
                    } else if ty.is_integer() && right.is_integer() {
                        Rc::new(SymbolType::Basic(BasicType::Integer))
                    } else {
                        return None;
                    }
                }
            };
        }
        Some(ty)
    }

    fn term_type(&self, term: &Term) -> Option<TypeRef> {
        let mut ty = self.factor_type(&term.first)?;
        for (op, factor) in &term.rest {
            let right = self.factor_type(factor)?;
            ty = match op {
                MulOp::Times | MulOp::RDiv => numeric_result(&ty, &right)?,
                MulOp::Div | MulOp::Mod => Rc::new(SymbolType::Basic(BasicType::Integer)),
                MulOp::And => {
                    if ty.is_boolean() && right.is_boolean() {
                        Rc::new(SymbolType::Basic(BasicType::Boolean))
                    } else if ty.is_integer() && right.is_integer() {
                        Rc::new(SymbolType::Basic(BasicType::Integer))
                    } else {
                        return None;
                    }
                }
            };
        }
        Some(ty)
    }

    fn factor_type(&self, factor: &Factor) -> Option<TypeRef> {
        match &factor.kind {
            FactorKind::Number(text) => {
                let basic =
                    if text.contains('.') { BasicType::Real } else { BasicType::Integer };
                Some(Rc::new(SymbolType::Basic(basic)))
            }
            FactorKind::Boolean(_) => Some(Rc::new(SymbolType::Basic(BasicType::Boolean))),
            FactorKind::Variable(variable) => {
                let entry = self.lookup(&variable.id)?;
                match entry.ty.as_ref() {
                    SymbolType::Array { element, .. } if !variable.indices.is_empty() => {
                        Some(Rc::new(SymbolType::Basic(*element)))
                    }
                    _ => Some(Rc::clone(&entry.ty)),
                }
            }
            FactorKind::Call(call) => {
                let entry = self.lookup(&call.id)?;
                match entry.ty.as_ref() {
                    SymbolType::Callable { is_function: true, return_type: Some(ret), .. } => {
                        Some(Rc::new(SymbolType::Basic(*ret)))
                    }
                    _ => None,
                }
            }
            FactorKind::Parenthesized(expr) => self.expression_type(expr),
            FactorKind::UnaryPlus(operand) | FactorKind::UnaryMinus(operand) => {
                let ty = self.factor_type(operand)?;
                if ty.is_numeric() {
                    Some(ty)
                } else {
                    None
                }
            }
            FactorKind::Not(operand) => {
                let ty = self.factor_type(operand)?;
                if ty.is_integer() {
                    Some(Rc::new(SymbolType::Basic(BasicType::Integer)))
                } else if ty.is_boolean() {
                    Some(Rc::new(SymbolType::Basic(BasicType::Boolean)))
                } else {
                    None
                }
            }
            FactorKind::UnknownIdent(name) => {
                let entry = self.lookup(name)?;
                match entry.ty.as_ref() {
                    SymbolType::Callable { is_function: true, return_type: Some(ret), .. } => {
                        Some(Rc::new(SymbolType::Basic(*ret)))
                    }
                    SymbolType::Callable { .. } => None,
                    _ => Some(Rc::clone(&entry.ty)),
                }
            }
        }
    }
}

fn format_specifier(basic: BasicType) -> &'static str {
    match basic {
        BasicType::Integer | BasicType::Boolean => "%d",
        BasicType::Real => "%f",
        BasicType::Char => "%c",
    }
}

fn numeric_result(left: &SymbolType, right: &SymbolType) -> Option<TypeRef> {
    if !left.is_numeric() || !right.is_numeric() {
        return None;
    }
    let basic = match (left.basic(), right.basic()) {
        (Some(BasicType::Real), _) | (_, Some(BasicType::Real)) => BasicType::Real,
        _ => BasicType::Integer,
    };
    Some(Rc::new(SymbolType::Basic(basic)))
}

/// Assignment-style compatibility: identical basic types, integer widening
/// into real, and arrays of compatible element type. Callables never match.
fn are_types_compatible(target: &SymbolType, source: &SymbolType) -> bool {
    match (target, source) {
        (SymbolType::Basic(t), SymbolType::Basic(s)) => {
            t == s || (*t == BasicType::Real && *s == BasicType::Integer)
        }
        (SymbolType::Array { element: t, .. }, SymbolType::Array { element: s, .. }) => {
            t == s || (*t == BasicType::Real && *s == BasicType::Integer)
        }
        _ => false,
    }
}

fn rel_op_source(op: RelOp) -> &'static str {
    match op {
        RelOp::Gt => ">",
        RelOp::Eq => "=",
        RelOp::Lt => "<",
        RelOp::Ge => ">=",
        RelOp::Le => "<=",
        RelOp::NotEq => "<>",
    }
}

/// The sole factor of an expression with no relational part and no chained
/// terms, when the expression has that shape.
fn single_factor(expr: &Expression) -> Option<&Factor> {
    if expr.right.is_some() || !expr.left.rest.is_empty() || !expr.left.first.rest.is_empty() {
        return None;
    }
    Some(&expr.left.first.first)
}

fn direct_ident(expr: &Expression) -> Option<&str> {
    match &single_factor(expr)?.kind {
        FactorKind::UnknownIdent(name) => Some(name.as_str()),
        _ => None,
    }
}

/// Extracts a compile-time integer from the simplest expression shape: a
/// lone integer literal factor.
fn try_get_constant(expr: &Expression) -> Option<i64> {
    match &single_factor(expr)?.kind {
        FactorKind::Number(text) => text.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn analyze_src(src: &str) -> (Program, Analysis) {
        let tokens = lexer::scan(src).expect("lex failure in semantic test");
        let program = parser::parse(&tokens).expect("parse failure in semantic test");
        let analysis = analyze(&program);
        (program, analysis)
    }

    fn kinds(analysis: &Analysis) -> Vec<SemanticErrorKind> {
        analysis.errors.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn clean_program_has_no_errors() {
        let (_, analysis) = analyze_src(
            "program p; var i: integer; r: real; begin i := 1; r := i + 0.5 end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    }

    #[test]
    fn duplicate_constant_is_reported() {
        let (_, analysis) = analyze_src("program p; const a = 1; a = 2; begin end.");
        assert_eq!(kinds(&analysis), vec![SemanticErrorKind::DuplicateDefinition]);
    }

    #[test]
    fn undefined_variable_is_reported() {
        let (_, analysis) = analyze_src("program p; begin x := 1 end.");
        assert!(kinds(&analysis).contains(&SemanticErrorKind::UndefinedSymbol));
    }

    #[test]
    fn assignment_to_constant_is_reported() {
        let (_, analysis) = analyze_src("program p; const c = 1; begin c := 2 end.");
        assert!(kinds(&analysis).contains(&SemanticErrorKind::ConstantAssignment));
    }

    #[test]
    fn integer_widens_to_real_but_not_back() {
        let (_, analysis) =
            analyze_src("program p; var i: integer; r: real; begin r := i end.");
        assert!(analysis.errors.is_empty());
        let (_, analysis) =
            analyze_src("program p; var i: integer; r: real; begin i := r end.");
        assert!(kinds(&analysis).contains(&SemanticErrorKind::TypeMismatch));
    }

    #[test]
    fn if_condition_must_be_boolean() {
        let (_, analysis) = analyze_src("program p; var i: integer; begin if i then ; end.");
        assert!(kinds(&analysis).contains(&SemanticErrorKind::TypeMismatch));
    }

    #[test]
    fn for_loop_variable_must_be_integer() {
        let (_, analysis) =
            analyze_src("program p; var r: real; begin for r := 1 to 3 do ; end.");
        assert!(kinds(&analysis).contains(&SemanticErrorKind::TypeMismatch));
    }

    #[test]
    fn div_requires_integers() {
        let (_, analysis) =
            analyze_src("program p; var i: integer; begin i := 1.5 div 2 end.");
        assert!(kinds(&analysis).contains(&SemanticErrorKind::TypeMismatch));
    }

    #[test]
    fn constant_array_index_is_bounds_checked() {
        let (_, analysis) = analyze_src(
            "program p; var a: array[3..5] of integer; begin a[6] := 0 end.",
        );
        assert!(kinds(&analysis).contains(&SemanticErrorKind::ArrayIndexOutOfBounds));
    }

    #[test]
    fn index_count_must_match_dimensions() {
        let (_, analysis) = analyze_src(
            "program p; var a: array[1..2, 1..2] of integer; begin a[1] := 0 end.",
        );
        assert!(kinds(&analysis).contains(&SemanticErrorKind::Other));
    }

    #[test]
    fn var_parameter_rejects_composite_argument() {
        let (_, analysis) = analyze_src(
            "program p; var a: integer; \
             procedure q(var x: integer); begin end; \
             begin q(a + 1) end.",
        );
        assert!(kinds(&analysis).contains(&SemanticErrorKind::VarParamError));
    }

    #[test]
    fn var_parameter_accepts_bare_variable() {
        let (_, analysis) = analyze_src(
            "program p; var a: integer; \
             procedure q(var x: integer); begin end; \
             begin q(a) end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    }

    #[test]
    fn call_arity_is_checked() {
        let (_, analysis) = analyze_src(
            "program p; procedure q(x: integer); begin end; begin q(1, 2) end.",
        );
        assert!(kinds(&analysis).contains(&SemanticErrorKind::Other));
    }

    #[test]
    fn function_return_assignment_is_flagged() {
        let (program, analysis) = analyze_src(
            "program p; function f: integer; begin f := 7 end; begin end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        let Statement::Assign(assign) = &program.subprograms[0].body.statements[0] else {
            panic!("expected assignment");
        };
        assert_eq!(analysis.annotations.is_function_return.get(&assign.id), Some(&true));
    }

    #[test]
    fn plain_assignment_is_not_function_return() {
        let (program, analysis) =
            analyze_src("program p; var i: integer; begin i := 7 end.");
        let Statement::Assign(assign) = &program.body.statements[0] else {
            panic!("expected assignment");
        };
        assert_eq!(analysis.annotations.is_function_return.get(&assign.id), Some(&false));
    }

    #[test]
    fn write_format_inference() {
        let (program, analysis) = analyze_src(
            "program p; var i: integer; r: real; c: char; b: boolean; \
             begin write(i, r, c, b) end.",
        );
        let Statement::Write(write) = &program.body.statements[0] else {
            panic!("expected write");
        };
        assert_eq!(
            analysis.annotations.write_format.get(&write.id).map(String::as_str),
            Some("%d%f%c%d")
        );
    }

    #[test]
    fn write_string_constant_selects_s_specifier() {
        let (program, analysis) = analyze_src(
            "program p; const msg = 'hello'; var i: integer; begin write(msg, i) end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        let Statement::Write(write) = &program.body.statements[0] else {
            panic!("expected write");
        };
        assert_eq!(
            analysis.annotations.write_format.get(&write.id).map(String::as_str),
            Some("%s%d")
        );
    }

    #[test]
    fn char_constant_does_not_select_s_specifier() {
        let (program, analysis) =
            analyze_src("program p; const c = 'x'; begin write(c) end.");
        let Statement::Write(write) = &program.body.statements[0] else {
            panic!("expected write");
        };
        assert_eq!(
            analysis.annotations.write_format.get(&write.id).map(String::as_str),
            Some("%c")
        );
    }

    #[test]
    fn read_format_is_space_separated() {
        let (program, analysis) = analyze_src(
            "program p; var i: integer; r: real; begin read(i, r) end.",
        );
        let Statement::Read(read) = &program.body.statements[0] else {
            panic!("expected read");
        };
        assert_eq!(
            analysis.annotations.read_format.get(&read.id).map(String::as_str),
            Some("%d %f")
        );
    }

    #[test]
    fn read_into_whole_array_is_rejected() {
        let (_, analysis) = analyze_src(
            "program p; var a: array[1..3] of integer; begin read(a) end.",
        );
        assert!(kinds(&analysis).contains(&SemanticErrorKind::TypeMismatch));
    }

    #[test]
    fn not_over_integer_is_bitwise() {
        let (program, analysis) = analyze_src(
            "program p; var i: integer; b: boolean; \
             begin i := not 3; b := not true end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        let Statement::Assign(first) = &program.body.statements[0] else {
            panic!("expected assignment");
        };
        let Statement::Assign(second) = &program.body.statements[1] else {
            panic!("expected assignment");
        };
        let first_factor = &first.right.left.first.first;
        let second_factor = &second.right.left.first.first;
        assert_eq!(analysis.annotations.not_is_bitwise.get(&first_factor.id), Some(&true));
        assert_eq!(analysis.annotations.not_is_bitwise.get(&second_factor.id), Some(&false));
    }

    #[test]
    fn unknown_ident_factor_resolving_to_function_is_marked() {
        let (program, analysis) = analyze_src(
            "program p; var i: integer; \
             function f: integer; begin f := 1 end; \
             begin i := f end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        let Statement::Assign(assign) = &program.body.statements[0] else {
            panic!("expected assignment");
        };
        let factor = &assign.right.left.first.first;
        assert_eq!(analysis.annotations.factor_is_call.get(&factor.id), Some(&true));
    }

    #[test]
    fn var_param_order_is_recorded() {
        let (_, analysis) = analyze_src(
            "program p; procedure q(var x, y: integer; z: char); begin end; begin end.",
        );
        assert_eq!(
            analysis.annotations.var_params.get("q"),
            Some(&vec![true, true, false])
        );
        assert_eq!(
            analysis.annotations.param_names.get("q"),
            Some(&vec!["x".to_string(), "y".to_string(), "z".to_string()])
        );
    }

    #[test]
    fn scope_structure_keeps_subprogram_locals_out_of_global() {
        let (_, analysis) = analyze_src(
            "program p; procedure q; var local: integer; begin local := 1 end; \
             begin local := 2 end.",
        );
        assert!(kinds(&analysis).contains(&SemanticErrorKind::UndefinedSymbol));
    }

    #[test]
    fn recursive_call_resolves() {
        let (_, analysis) = analyze_src(
            "program p; function f(n: integer): integer; \
             begin if n > 0 then f := f(n - 1) else f := 0 end; begin end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    }

    #[test]
    fn mixed_integer_logic_stays_integer() {
        let (_, analysis) = analyze_src(
            "program p; var i, j, k: integer; begin k := i and j; k := i or j end.",
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
    }

    #[test]
    fn invalid_array_bounds_are_reported() {
        let (_, analysis) = analyze_src(
            "program p; var a: array[5..3] of integer; begin end.",
        );
        assert!(kinds(&analysis).contains(&SemanticErrorKind::Other));
    }
}
