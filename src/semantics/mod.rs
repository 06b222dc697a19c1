mod analyzer;
mod symbols;

pub use analyzer::{analyze, Analysis, Annotations};
pub use symbols::{
    EntryRef, ScopeRef, ScopeStack, SemanticDiagnostic, SemanticErrorKind, SymbolEntry,
    SymbolTable, SymbolType, TypeRef,
};
