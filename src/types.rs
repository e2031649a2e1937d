//! Jack type model and interning pool.
//!
//! A `Type` is a structural record of a base name (`int`, `char`, `boolean`,
//! `void`, or a class name) plus generic arguments. Generics exist only for
//! the `Array<T>` display form; type checking is nominal on the base name.
//!
//! Types are interned through a `TypeRegistry`. Interned values are canonical:
//! two structurally equal types intern to the same allocation, so identity
//! (`Arc::ptr_eq`) implies structural equality.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const PRIMITIVES: [&str; 4] = ["int", "char", "boolean", "void"];

/// Base name the analyzer assigns to the `null` literal. It unifies with any
/// class type.
pub const NULL_BASE: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub base: String,
    pub generics: Vec<Type>,
}

impl Type {
    pub fn new(base: impl Into<String>) -> Self {
        Type {
            base: base.into(),
            generics: Vec::new(),
        }
    }

    pub fn with_generics(base: impl Into<String>, generics: Vec<Type>) -> Self {
        Type {
            base: base.into(),
            generics,
        }
    }

    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.base.as_str())
    }

    /// Class types are everything that is not a primitive (including the
    /// built-in `String` and `Array` classes).
    pub fn is_class(&self) -> bool {
        !self.is_primitive() && self.base != NULL_BASE
    }

    pub fn is_int(&self) -> bool {
        self.base == "int"
    }

    pub fn is_char(&self) -> bool {
        self.base == "char"
    }

    pub fn is_boolean(&self) -> bool {
        self.base == "boolean"
    }

    pub fn is_void(&self) -> bool {
        self.base == "void"
    }

    pub fn is_array(&self) -> bool {
        self.base == "Array"
    }

    pub fn is_null(&self) -> bool {
        self.base == NULL_BASE
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if !self.generics.is_empty() {
            write!(f, "<")?;
            for (i, g) in self.generics.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", g)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// Process-local interning pool for `Type` values.
///
/// Each analyze task owns its own registry; sharing one across threads would
/// need a lock, and canonical identity only matters within one compilation
/// unit's tables.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    pool: HashMap<Type, Arc<Type>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Return the canonical instance for `ty`, creating it on first use.
    pub fn intern(&mut self, ty: Type) -> Arc<Type> {
        if let Some(existing) = self.pool.get(&ty) {
            return Arc::clone(existing);
        }
        let canonical = Arc::new(ty.clone());
        self.pool.insert(ty, Arc::clone(&canonical));
        canonical
    }

    /// Intern a plain (generic-free) type by base name.
    pub fn named(&mut self, base: &str) -> Arc<Type> {
        self.intern(Type::new(base))
    }

    pub fn int(&mut self) -> Arc<Type> {
        self.named("int")
    }

    pub fn char_type(&mut self) -> Arc<Type> {
        self.named("char")
    }

    pub fn boolean(&mut self) -> Arc<Type> {
        self.named("boolean")
    }

    pub fn void(&mut self) -> Arc<Type> {
        self.named("void")
    }

    pub fn string(&mut self) -> Arc<Type> {
        self.named("String")
    }

    pub fn array(&mut self) -> Arc<Type> {
        self.named("Array")
    }

    /// The unification-friendly type of the `null` literal.
    pub fn null(&mut self) -> Arc<Type> {
        self.named(NULL_BASE)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
