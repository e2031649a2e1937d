//! Three-phase build orchestration.
//!
//! ```text
//!   per-file parallel          barrier         per-file parallel   barrier   per-file parallel
//! files ----> Lexer+Parser --> entry check --> Semantic Analyzer ----------> Code Generator --> .vm
//! ```
//!
//! Each phase fans out one scoped worker thread per source file and joins
//! them all before the next phase starts, so parse results (and the global
//! registry) are complete before analysis, and analysis results before
//! generation. The registry mutex is the only cross-task synchronization;
//! every other structure is owned by exactly one unit.

use crate::ast::Class;
use crate::builtins::register_os_classes;
use crate::codegen::CodeGen;
use crate::error::{CompileError, Diagnostic};
use crate::parser::Parser;
use crate::registry::{GlobalRegistry, register_class_decl};
use crate::symbols::SymbolTable;
use crate::typechecker::{TypeChecker, check_main_entry};
use crate::viz;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Write a JSON rendering of each class AST next to the input
    pub viz_ast: bool,
    /// Write a JSON rendering of each symbol table next to the input
    pub viz_checker: bool,
}

/// One source file moving through the phases. A unit may hold several
/// classes; each gets its own symbol table.
struct Unit {
    path: PathBuf,
    classes: Vec<Class>,
    tables: Vec<SymbolTable>,
}

/// Compile `.jack` files to `.vm` files written alongside the inputs.
///
/// On success returns the `(input, output)` path pairs. On failure returns
/// every error the failing phase produced; outputs already written by
/// successful generate tasks are left in place (no rollback).
pub fn compile_files(
    paths: &[PathBuf],
    options: &BuildOptions,
) -> Result<Vec<(PathBuf, PathBuf)>, Vec<CompileError>> {
    let registry = GlobalRegistry::new();
    register_os_classes(&registry);

    // Phase 1: parse (and register) every file in parallel
    let results: Vec<Result<Unit, CompileError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                let registry = &registry;
                scope.spawn(move || parse_unit(path, registry))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("parse worker panicked"))
            .collect()
    });

    let mut units = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(unit) => units.push(unit),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    info!(files = units.len(), "parse phase complete");

    // Phase 2: entry-point check, single-threaded
    check_main_entry(&registry).map_err(|d| vec![CompileError::Semantic(d)])?;

    // Phase 3: analyze each unit in parallel; tasks read the registry and
    // write only their own tables and resolved-type slots
    let errors: Vec<CompileError> = std::thread::scope(|scope| {
        let handles: Vec<_> = units
            .iter_mut()
            .map(|unit| {
                let registry = &registry;
                scope.spawn(move || analyze_unit(unit, registry, options))
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().expect("analyze worker panicked").err())
            .collect()
    });
    if !errors.is_empty() {
        return Err(errors);
    }
    info!(files = units.len(), "analyze phase complete");

    // Phase 4: generate one .vm per unit in parallel
    let results: Vec<Result<(PathBuf, PathBuf), CompileError>> =
        std::thread::scope(|scope| {
            let handles: Vec<_> = units
                .iter_mut()
                .map(|unit| {
                    let registry = &registry;
                    scope.spawn(move || generate_unit(unit, registry))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("generate worker panicked"))
                .collect()
        });

    let mut outputs = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(pair) => outputs.push(pair),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    info!(files = outputs.len(), "generate phase complete");
    Ok(outputs)
}

fn attach_file(d: Diagnostic, path: &Path) -> Diagnostic {
    d.with_file(path)
}

fn parse_unit(path: &Path, registry: &GlobalRegistry) -> Result<Unit, CompileError> {
    let source = fs::read_to_string(path).map_err(|e| CompileError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut parser =
        Parser::new(&source).map_err(|d| CompileError::Lex(attach_file(d, path)))?;
    let classes = match parser.parse() {
        Ok(classes) => classes,
        Err(diags) => {
            return Err(CompileError::Parse(
                diags.into_iter().map(|d| attach_file(d, path)).collect(),
            ));
        }
    };
    for class in &classes {
        register_class_decl(registry, class)
            .map_err(|d| CompileError::Semantic(attach_file(d, path)))?;
    }
    debug!(file = %path.display(), classes = classes.len(), "parsed");

    let tables = classes.iter().map(|_| SymbolTable::new()).collect();
    Ok(Unit {
        path: path.to_path_buf(),
        classes,
        tables,
    })
}

fn analyze_unit(
    unit: &mut Unit,
    registry: &GlobalRegistry,
    options: &BuildOptions,
) -> Result<(), CompileError> {
    for (class, table) in unit.classes.iter().zip(unit.tables.iter_mut()) {
        TypeChecker::new(registry, table)
            .check_class(class)
            .map_err(|d| CompileError::Semantic(attach_file(d, &unit.path)))?;
    }
    debug!(file = %unit.path.display(), "analyzed");

    // Dumps are best-effort; they never fail the build
    if options.viz_ast
        && let Err(e) = viz::write_ast_dump(&unit.path, &unit.classes)
    {
        warn!(file = %unit.path.display(), error = %e, "could not write AST dump");
    }
    if options.viz_checker
        && let Err(e) = viz::write_checker_dump(&unit.path, &unit.classes, &unit.tables)
    {
        warn!(file = %unit.path.display(), error = %e, "could not write checker dump");
    }
    Ok(())
}

fn generate_unit(
    unit: &mut Unit,
    registry: &GlobalRegistry,
) -> Result<(PathBuf, PathBuf), CompileError> {
    let mut vm = String::new();
    for (class, table) in unit.classes.iter().zip(unit.tables.iter_mut()) {
        let text = CodeGen::new(registry, table)
            .generate_class(class)
            .map_err(|e| CompileError::Codegen(format!("{}: {}", unit.path.display(), e)))?;
        vm.push_str(&text);
    }
    let output = unit.path.with_extension("vm");
    fs::write(&output, vm).map_err(|e| CompileError::Io {
        path: output.clone(),
        source: e,
    })?;
    debug!(file = %output.display(), "wrote VM output");
    Ok((unit.path.clone(), output))
}
