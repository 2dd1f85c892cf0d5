use std::fmt;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// The batch of problems produced by one checker pass.
///
/// Checking always walks the whole program before failing, so a
/// single error value can carry any number of diagnostics.
#[derive(Debug)]
pub struct InvalidSource {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for InvalidSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.diagnostics.len();
        let noun = if count == 1 { "problem" } else { "problems" };
        write!(f, "{count} {noun} found")?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n  {diagnostic}")?;
        }
        Ok(())
    }
}

/// Errors produced by the pipeline.
///
/// `Internal` marks a violated grammar invariant: a builder was asked
/// to recognize something that is not there. That is a bug in the
/// parser, never a mistake in the input program, and callers should
/// surface it differently from the user-facing variants.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("lex error on line {line}: {message}")]
    LexError { line: usize, message: String },
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("semantic error: {0}")]
    SemanticError(String),
    #[error("unable to transpile invalid source: {0}")]
    InvalidSource(InvalidSource),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }

    /// True when the error is an internal invariant violation rather
    /// than a diagnostic about the input program.
    pub fn is_internal(&self) -> bool {
        matches!(self, CoreError::Internal(_))
    }
}
