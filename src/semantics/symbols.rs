use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::ast::BasicType;

pub type TypeRef = Rc<SymbolType>;
pub type EntryRef = Rc<SymbolEntry>;
pub type ScopeRef = Rc<RefCell<SymbolTable>>;

/// The type attached to a symbol entry. Callables own their local scope;
/// the global scope therefore transitively owns every nested scope through
/// its callable entries.
#[derive(Clone, Debug)]
pub enum SymbolType {
    Basic(BasicType),
    Array { dimensions: Vec<(i64, i64)>, element: BasicType },
    Callable {
        is_function: bool,
        /// `None` for procedures.
        return_type: Option<BasicType>,
        /// Parameter entries in declaration order.
        parameters: Vec<EntryRef>,
        local_scope: ScopeRef,
    },
}

impl SymbolType {
    pub fn basic(&self) -> Option<BasicType> {
        match self {
            SymbolType::Basic(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SymbolType::Basic(BasicType::Integer | BasicType::Real))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, SymbolType::Basic(BasicType::Integer))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, SymbolType::Basic(BasicType::Boolean))
    }

    /// Human-readable name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            SymbolType::Basic(BasicType::Integer) => "integer",
            SymbolType::Basic(BasicType::Real) => "real",
            SymbolType::Basic(BasicType::Boolean) => "boolean",
            SymbolType::Basic(BasicType::Char) => "char",
            SymbolType::Array { .. } => "array",
            SymbolType::Callable { is_function: true, .. } => "function",
            SymbolType::Callable { is_function: false, .. } => "procedure",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SymbolEntry {
    pub name: String,
    pub ty: TypeRef,
    /// 0 = global.
    pub scope_level: i32,
    pub is_constant: bool,
    /// Literal text for constants, `None` otherwise.
    pub const_value: Option<String>,
    /// True for VAR parameters.
    pub is_reference: bool,
    pub line: usize,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, ty: TypeRef, scope_level: i32, line: usize) -> Self {
        Self {
            name: name.into(),
            ty,
            scope_level,
            is_constant: false,
            const_value: None,
            is_reference: false,
            line,
        }
    }
}

/// One scope's name-to-entry mapping. Child scopes hold their parent weakly;
/// lookup walks upward.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, EntryRef>,
    level: i32,
    parent: Weak<RefCell<SymbolTable>>,
}

impl SymbolTable {
    pub fn new(level: i32, parent: Weak<RefCell<SymbolTable>>) -> Self {
        Self { entries: HashMap::new(), level, parent }
    }

    /// Inserts an entry, refusing a name already bound in this scope.
    pub fn insert(&mut self, entry: EntryRef) -> Result<(), EntryRef> {
        if let Some(existing) = self.entries.get(&entry.name) {
            return Err(Rc::clone(existing));
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<EntryRef> {
        self.entries.get(name).cloned()
    }

    pub fn recursive_lookup(&self, name: &str) -> Option<EntryRef> {
        if let Some(entry) = self.lookup(name) {
            return Some(entry);
        }
        self.parent.upgrade().and_then(|p| p.borrow().recursive_lookup(name))
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

/// The scopes currently open during analysis. Level equals depth: 0 is the
/// global scope, each subprogram body adds one.
#[derive(Debug, Default)]
pub struct ScopeStack {
    stack: Vec<ScopeRef>,
}

impl ScopeStack {
    /// Opens a fresh scope nested in the current one.
    pub fn push(&mut self) -> ScopeRef {
        let parent = self.stack.last().map(Rc::downgrade).unwrap_or_default();
        let scope = Rc::new(RefCell::new(SymbolTable::new(self.stack.len() as i32, parent)));
        self.stack.push(Rc::clone(&scope));
        scope
    }

    /// Re-opens an existing scope, e.g. a callable's local scope after its
    /// entry has been inserted into the enclosing scope.
    pub fn push_existing(&mut self, scope: ScopeRef) {
        self.stack.push(scope);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn current(&self) -> Option<ScopeRef> {
        self.stack.last().cloned()
    }

    /// A symbol is visible when its declaring scope is at or outside the
    /// current nesting level.
    pub fn is_accessible(&self, entry: &SymbolEntry) -> bool {
        match self.stack.last() {
            Some(scope) => entry.scope_level <= scope.borrow().level(),
            None => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemanticErrorKind {
    DuplicateDefinition,
    UndefinedSymbol,
    ScopeViolation,
    VarParamError,
    TypeMismatch,
    ArrayIndexOutOfBounds,
    ConstantAssignment,
    Other,
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticErrorKind::DuplicateDefinition => "Redefinition",
            SemanticErrorKind::UndefinedSymbol => "Undefined symbol",
            SemanticErrorKind::ScopeViolation => "Scope violation",
            SemanticErrorKind::VarParamError => "Var Parameter error",
            SemanticErrorKind::TypeMismatch => "Type mismatch",
            SemanticErrorKind::ArrayIndexOutOfBounds => "Array out of bounds",
            SemanticErrorKind::ConstantAssignment => "Constant assignment error",
            SemanticErrorKind::Other => "Other error",
        };
        f.write_str(name)
    }
}

/// One semantic diagnostic: a kind, a message, and the nearest known source
/// line (0 only when no line is available at the reporting site).
#[derive(Clone, Debug, PartialEq)]
pub struct SemanticDiagnostic {
    pub kind: SemanticErrorKind,
    pub message: String,
    pub line: usize,
}
