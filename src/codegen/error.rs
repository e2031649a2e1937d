//! Code generation failures.
//!
//! Lowering runs only after analysis succeeded, so every logical variant
//! here means the class AST and its analysis results disagree: a subroutine
//! scope that was never snapshotted, a name with no symbol, a call the
//! registry cannot place, or a receiver the analyzer left untyped. The last
//! variant wraps failures from writing VM text into the output buffer, so
//! `?` works across both worlds.

use std::fmt;

#[derive(Debug)]
pub enum CodeGenError {
    /// The symbol table has no snapshot for this subroutine
    ScopeNotAnalyzed { class: String, subroutine: String },
    /// A name with no entry in either scope of the class's table
    UnknownSymbol { class: String, name: String },
    /// A call that matches no registered subroutine
    UnresolvedCall { class: String, subroutine: String },
    /// A receiver expression whose resolved-type slot is empty
    UntypedReceiver { line: usize, column: usize },
    /// Writing VM text failed
    Emit(fmt::Error),
}

impl fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeGenError::ScopeNotAnalyzed { class, subroutine } => {
                write!(f, "no analyzed scope for subroutine '{}.{}'", class, subroutine)
            }
            CodeGenError::UnknownSymbol { class, name } => {
                write!(f, "symbol '{}' missing from the table of '{}'", name, class)
            }
            CodeGenError::UnresolvedCall { class, subroutine } => {
                write!(
                    f,
                    "call to '{}.{}' matches no registered subroutine",
                    class, subroutine
                )
            }
            CodeGenError::UntypedReceiver { line, column } => {
                write!(f, "receiver at {}:{} has no resolved type", line, column)
            }
            CodeGenError::Emit(e) => write!(f, "could not write VM text: {}", e),
        }
    }
}

impl std::error::Error for CodeGenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodeGenError::Emit(e) => Some(e),
            _ => None,
        }
    }
}

impl From<fmt::Error> for CodeGenError {
    fn from(e: fmt::Error) -> Self {
        CodeGenError::Emit(e)
    }
}
