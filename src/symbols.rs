//! Per-class and per-subroutine symbol tables.
//!
//! A table holds two scopes: the class scope (`static` and `field` symbols)
//! and the subroutine scope (`argument` and `local` symbols). Each kind keeps
//! its own running index counter, assigned at definition time. Shadowing a
//! class-scope name from a subroutine scope is not permitted; `define`
//! rejects any name already visible.
//!
//! Finished subroutine scopes are snapshotted into a history so that code
//! generation can re-enter a subroutine by name without re-running analysis.

use crate::types::Type;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Static,
    Field,
    Arg,
    Local,
}

impl SymbolKind {
    /// The VM segment this kind of symbol lives in.
    pub fn segment(self) -> &'static str {
        match self {
            SymbolKind::Static => "static",
            SymbolKind::Field => "this",
            SymbolKind::Arg => "argument",
            SymbolKind::Local => "local",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Static => "static",
            SymbolKind::Field => "field",
            SymbolKind::Arg => "argument",
            SymbolKind::Local => "local",
        }
    }

    fn counter_slot(self) -> usize {
        match self {
            SymbolKind::Static => 0,
            SymbolKind::Field => 1,
            SymbolKind::Arg => 2,
            SymbolKind::Local => 3,
        }
    }

    fn is_class_scope(self) -> bool {
        matches!(self, SymbolKind::Static | SymbolKind::Field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub ty: Arc<Type>,
    pub kind: SymbolKind,
    pub index: u16,
    pub line: usize,
    pub column: usize,
}

/// A finished subroutine scope, keyed by subroutine name.
#[derive(Debug, Clone, PartialEq)]
pub struct SubroutineSnapshot {
    pub name: String,
    pub symbols: HashMap<String, Symbol>,
    pub counters: [u16; 4],
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: HashMap<String, Symbol>,
    sub_scope: HashMap<String, Symbol>,
    counters: [u16; 4],
    current: Option<String>,
    history: Vec<SubroutineSnapshot>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Define a symbol in the scope implied by its kind, assigning the next
    /// index of that kind. Fails if the name is already visible in either
    /// scope.
    pub fn define(
        &mut self,
        name: &str,
        ty: Arc<Type>,
        kind: SymbolKind,
        line: usize,
        column: usize,
    ) -> Result<u16, String> {
        if let Some(existing) = self.lookup(name) {
            return Err(format!(
                "'{}' is already defined as a {} (index {})",
                name,
                existing.kind.as_str(),
                existing.index
            ));
        }
        let slot = kind.counter_slot();
        let index = self.counters[slot];
        self.counters[slot] += 1;
        let symbol = Symbol {
            ty,
            kind,
            index,
            line,
            column,
        };
        if kind.is_class_scope() {
            self.class_scope.insert(name.to_string(), symbol);
        } else {
            self.sub_scope.insert(name.to_string(), symbol);
        }
        Ok(index)
    }

    /// Look a name up in the subroutine scope, then the class scope.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.sub_scope.get(name).or_else(|| self.class_scope.get(name))
    }

    /// Number of symbols of `kind` defined so far in the active scope.
    pub fn var_count(&self, kind: SymbolKind) -> u16 {
        self.counters[kind.counter_slot()]
    }

    /// Open a fresh subroutine scope: the previous one (if any) is
    /// snapshotted, the scope is cleared, and the `Arg`/`Local` counters
    /// reset to zero.
    pub fn start_subroutine(&mut self, name: &str) {
        self.snapshot_current();
        self.sub_scope.clear();
        self.counters[SymbolKind::Arg.counter_slot()] = 0;
        self.counters[SymbolKind::Local.counter_slot()] = 0;
        self.current = Some(name.to_string());
    }

    /// Snapshot the last open subroutine scope. Called when the class walk
    /// finishes.
    pub fn finish(&mut self) {
        self.snapshot_current();
    }

    fn snapshot_current(&mut self) {
        if let Some(name) = self.current.take() {
            self.history.push(SubroutineSnapshot {
                name,
                symbols: std::mem::take(&mut self.sub_scope),
                counters: self.counters,
            });
        }
    }

    /// Re-enter a previously analyzed subroutine scope by name. Used by code
    /// generation; returns false if no snapshot exists under that name.
    pub fn resume_subroutine(&mut self, name: &str) -> bool {
        let Some(snapshot) = self.history.iter().find(|s| s.name == name) else {
            return false;
        };
        self.sub_scope = snapshot.symbols.clone();
        self.counters = snapshot.counters;
        self.current = None;
        true
    }

    pub fn class_scope(&self) -> &HashMap<String, Symbol> {
        &self.class_scope
    }

    pub fn history(&self) -> &[SubroutineSnapshot] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Arc<Type> {
        Arc::new(Type::new("int"))
    }

    #[test]
    fn test_indices_are_monotonic_per_kind() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("a", int(), SymbolKind::Field, 1, 1), Ok(0));
        assert_eq!(table.define("b", int(), SymbolKind::Field, 1, 5), Ok(1));
        assert_eq!(table.define("c", int(), SymbolKind::Static, 2, 1), Ok(0));
        assert_eq!(table.define("d", int(), SymbolKind::Field, 2, 5), Ok(2));
        assert_eq!(table.var_count(SymbolKind::Field), 3);
        assert_eq!(table.var_count(SymbolKind::Static), 1);
    }

    #[test]
    fn test_shadowing_is_rejected() {
        let mut table = SymbolTable::new();
        table.define("x", int(), SymbolKind::Field, 1, 1).unwrap();
        table.start_subroutine("getX");
        let err = table
            .define("x", int(), SymbolKind::Local, 2, 1)
            .unwrap_err();
        assert!(err.contains("already defined"));
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut table = SymbolTable::new();
        table.start_subroutine("run");
        table.define("i", int(), SymbolKind::Local, 1, 1).unwrap();
        assert!(table.define("i", int(), SymbolKind::Local, 1, 8).is_err());
    }

    #[test]
    fn test_start_subroutine_resets_sub_counters() {
        let mut table = SymbolTable::new();
        table.define("f", int(), SymbolKind::Field, 1, 1).unwrap();
        table.start_subroutine("first");
        table.define("a", int(), SymbolKind::Arg, 2, 1).unwrap();
        table.define("l", int(), SymbolKind::Local, 3, 1).unwrap();
        table.start_subroutine("second");
        assert_eq!(table.var_count(SymbolKind::Arg), 0);
        assert_eq!(table.var_count(SymbolKind::Local), 0);
        // Class scope persists across subroutines
        assert_eq!(table.var_count(SymbolKind::Field), 1);
        assert!(table.lookup("f").is_some());
        assert!(table.lookup("a").is_none());
    }

    #[test]
    fn test_lookup_prefers_sub_scope() {
        // Shadowing is rejected at definition time, so the two scopes are
        // disjoint; lookups still search the subroutine scope first.
        let mut table = SymbolTable::new();
        table.define("f", int(), SymbolKind::Field, 1, 1).unwrap();
        table.start_subroutine("m");
        table.define("a", int(), SymbolKind::Arg, 2, 1).unwrap();
        assert_eq!(table.lookup("a").unwrap().kind, SymbolKind::Arg);
        assert_eq!(table.lookup("f").unwrap().kind, SymbolKind::Field);
    }

    #[test]
    fn test_resume_restores_snapshot() {
        let mut table = SymbolTable::new();
        table.start_subroutine("first");
        table.define("a", int(), SymbolKind::Arg, 1, 1).unwrap();
        table.define("b", int(), SymbolKind::Local, 2, 1).unwrap();
        table.start_subroutine("second");
        table.define("z", int(), SymbolKind::Local, 3, 1).unwrap();
        table.finish();

        assert!(table.resume_subroutine("first"));
        assert_eq!(table.lookup("a").unwrap().index, 0);
        assert_eq!(table.var_count(SymbolKind::Local), 1);
        assert!(table.lookup("z").is_none());

        assert!(table.resume_subroutine("second"));
        assert!(table.lookup("z").is_some());
        assert!(!table.resume_subroutine("missing"));
    }

    #[test]
    fn test_segments() {
        assert_eq!(SymbolKind::Static.segment(), "static");
        assert_eq!(SymbolKind::Field.segment(), "this");
        assert_eq!(SymbolKind::Arg.segment(), "argument");
        assert_eq!(SymbolKind::Local.segment(), "local");
    }
}
