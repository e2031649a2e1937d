//! Diagnostics and build-level error types.

use std::fmt;
use std::path::PathBuf;

/// A located compiler diagnostic.
///
/// Line and column are 1-based. The file path is attached by the driver once
/// the owning compilation unit is known; unit tests that feed source strings
/// directly leave it empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            file: None,
            line,
            column,
            message: message.into(),
        }
    }

    /// Attach the source file path (builder style, used by the driver).
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(path) => write!(
                f,
                "{}:{}:{}: {}",
                path.display(),
                self.line,
                self.column,
                self.message
            ),
            None => write!(f, "{}:{}: {}", self.line, self.column, self.message),
        }
    }
}

/// Error type for a whole compilation.
///
/// The parse phase accumulates diagnostics (panic-mode recovery produces
/// several per file); the later phases abort on the first failure, so they
/// carry a single diagnostic each.
#[derive(Debug)]
pub enum CompileError {
    /// Fatal tokenization error (the lexer does not recover)
    Lex(Diagnostic),
    /// One or more syntax errors collected during parsing
    Parse(Vec<Diagnostic>),
    /// Scope or type error; fatal on first occurrence
    Semantic(Diagnostic),
    /// Failure while lowering to VM code
    Codegen(String),
    /// Source file unreadable or output file unwritable
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(d) => write!(f, "lex error: {}", d),
            CompileError::Parse(diags) => {
                write!(f, "parse error")?;
                for d in diags {
                    write!(f, "\n  {}", d)?;
                }
                Ok(())
            }
            CompileError::Semantic(d) => write!(f, "semantic error: {}", d),
            CompileError::Codegen(msg) => write!(f, "code generation error: {}", msg),
            CompileError::Io { path, source } => {
                write!(f, "io error: {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display_without_file() {
        let d = Diagnostic::new(3, 14, "unexpected token ';'");
        assert_eq!(d.to_string(), "3:14: unexpected token ';'");
    }

    #[test]
    fn test_diagnostic_display_with_file() {
        let d = Diagnostic::new(1, 1, "boom").with_file("Main.jack");
        assert_eq!(d.to_string(), "Main.jack:1:1: boom");
    }

    #[test]
    fn test_parse_error_lists_all_diagnostics() {
        let err = CompileError::Parse(vec![
            Diagnostic::new(1, 2, "first"),
            Diagnostic::new(3, 4, "second"),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("1:2: first"));
        assert!(rendered.contains("3:4: second"));
    }
}
