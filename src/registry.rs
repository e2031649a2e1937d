//! Global class and subroutine registry.
//!
//! Shared across all compilation units so cross-class references resolve
//! statically. The parse phase writes as classes are recognized; the analyze
//! and generate phases only read. One mutex guards the whole table; writes
//! are O(classes + subroutines) and reads O(call sites), so contention stays
//! low.

use crate::ast::{Class, SubroutineKind};
use crate::error::Diagnostic;
use crate::types::{PRIMITIVES, Type};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Signature of a subroutine as visible to other classes.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub return_type: Type,
    pub params: Vec<Type>,
    pub kind: SubroutineKind,
    /// Declaration site, for diagnostics
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    classes: HashSet<String>,
    subroutines: HashMap<String, HashMap<String, MethodSignature>>,
}

#[derive(Debug, Default)]
pub struct GlobalRegistry {
    inner: Mutex<RegistryInner>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        GlobalRegistry::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a class name. Returns false if the name is already taken.
    pub fn register_class(&self, name: &str) -> bool {
        self.lock().classes.insert(name.to_string())
    }

    /// Register a subroutine under a class. Returns false on a duplicate
    /// within that class.
    pub fn register_subroutine(
        &self,
        class: &str,
        name: &str,
        signature: MethodSignature,
    ) -> bool {
        let mut inner = self.lock();
        let subs = inner.subroutines.entry(class.to_string()).or_default();
        if subs.contains_key(name) {
            return false;
        }
        subs.insert(name.to_string(), signature);
        true
    }

    /// True for every registered class and for the primitive type names.
    pub fn class_exists(&self, name: &str) -> bool {
        PRIMITIVES.contains(&name) || self.lock().classes.contains(name)
    }

    pub fn subroutine_exists(&self, class: &str, name: &str) -> bool {
        self.lock()
            .subroutines
            .get(class)
            .is_some_and(|subs| subs.contains_key(name))
    }

    /// Look up a signature. Absence is the caller's error to report.
    pub fn signature(&self, class: &str, name: &str) -> Option<MethodSignature> {
        self.lock()
            .subroutines
            .get(class)
            .and_then(|subs| subs.get(name))
            .cloned()
    }
}

/// Register a parsed class and all of its subroutines, turning duplicate
/// registrations into diagnostics at the declaration site.
pub fn register_class_decl(
    registry: &GlobalRegistry,
    class: &Class,
) -> Result<(), Diagnostic> {
    if !registry.register_class(&class.name) {
        return Err(Diagnostic::new(
            class.span.line,
            class.span.column,
            format!("duplicate class '{}'", class.name),
        ));
    }
    for sub in &class.subs {
        let signature = MethodSignature {
            return_type: sub.return_type.clone(),
            params: sub.params.iter().map(|p| p.ty.clone()).collect(),
            kind: sub.kind,
            line: sub.span.line,
            column: sub.span.column,
        };
        if !registry.register_subroutine(&class.name, &sub.name, signature) {
            return Err(Diagnostic::new(
                sub.span.line,
                sub.span.column,
                format!(
                    "duplicate subroutine '{}' in class '{}'",
                    sub.name, class.name
                ),
            ));
        }
    }
    Ok(())
}
