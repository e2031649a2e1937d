//! Jack Compiler Library
//!
//! Compiles Jack source (the object-based language of the nand2tetris
//! curriculum) to textual Hack VM code. All translation units of a program
//! are compiled together so cross-class references resolve statically.
//!
//! The pipeline has three barrier-separated phases, each parallel across
//! files:
//!
//! 1. **Parse**: a streaming lexer feeds a Pratt parser; class and
//!    subroutine signatures land in the shared [`GlobalRegistry`].
//! 2. **Analyze**: per-class scope and type checking populates each class's
//!    [`SymbolTable`] and the resolved-type slots in the AST.
//! 3. **Generate**: each class lowers to one stream of VM instructions.
//!
//! # Embedding
//!
//! ```rust
//! let vm = jackc::compile_to_vm(
//!     "class Main { function void main() { do Output.printInt(42); return; } }",
//! ).unwrap();
//! assert!(vm.contains("call Output.printInt 1"));
//! ```

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod symbols;
pub mod typechecker;
pub mod types;
pub mod viz;

pub use codegen::{CodeGen, CodeGenError};
pub use driver::{BuildOptions, compile_files};
pub use error::{CompileError, Diagnostic};
pub use lexer::{Keyword, Lexer, Token, TokenKind};
pub use parser::Parser;
pub use registry::{GlobalRegistry, MethodSignature};
pub use symbols::{Symbol, SymbolKind, SymbolTable};
pub use typechecker::TypeChecker;
pub use types::{Type, TypeRegistry};

use crate::registry::register_class_decl;

/// Compile a set of named source units to VM text, in order.
///
/// The in-memory twin of [`compile_files`], for tests and embedders. The
/// unit names only label diagnostics; the program must still declare
/// `Main.main`.
pub fn compile_sources(
    sources: &[(&str, &str)],
) -> Result<Vec<(String, String)>, CompileError> {
    let registry = GlobalRegistry::new();
    builtins::register_os_classes(&registry);

    let mut units = Vec::new();
    for (name, source) in sources {
        let mut parser =
            Parser::new(source).map_err(|d| CompileError::Lex(d.with_file(name)))?;
        let classes = parser.parse().map_err(|diags| {
            CompileError::Parse(diags.into_iter().map(|d| d.with_file(name)).collect())
        })?;
        for class in &classes {
            register_class_decl(&registry, class)
                .map_err(|d| CompileError::Semantic(d.with_file(name)))?;
        }
        units.push((name.to_string(), classes));
    }

    typechecker::check_main_entry(&registry).map_err(CompileError::Semantic)?;

    let mut outputs = Vec::new();
    for (name, classes) in &units {
        let mut vm = String::new();
        for class in classes {
            let mut table = SymbolTable::new();
            TypeChecker::new(&registry, &mut table)
                .check_class(class)
                .map_err(|d| CompileError::Semantic(d.with_file(name)))?;
            let text = CodeGen::new(&registry, &mut table)
                .generate_class(class)
                .map_err(|e| CompileError::Codegen(format!("{}: {}", name, e)))?;
            vm.push_str(&text);
        }
        outputs.push((name.clone(), vm));
    }
    Ok(outputs)
}

/// Compile a single source unit (which may hold several classes) to VM text.
pub fn compile_to_vm(source: &str) -> Result<String, CompileError> {
    let mut outputs = compile_sources(&[("source", source)])?;
    Ok(outputs.remove(0).1)
}
