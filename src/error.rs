//! Error codes surfaced at the core's boundary (spec.md §6-§7).

use std::fmt;

/// A source location attached to front-end-raised diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Every error kind the core can surface. Text is illustrative; names are normative.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("out of space: {0}")]
    OutOfSpace(String),

    #[error("iterator end")]
    IteratorEnd,

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("memory allocation failure")]
    MemallocFailure,

    #[error("syntax error at {location}: {message}")]
    SyntaxError {
        location: SourceLocation,
        message: String,
    },

    #[error("lexer error at {location}: {message}")]
    LexerError {
        location: SourceLocation,
        message: String,
    },

    #[error("inconsistent phi: {0}")]
    InconsistentPhi(String),

    #[error("missing phi link: {0}")]
    MissingPhiLink(String),

    #[error("instruction in use: {0}")]
    InstructionInUse(String),

    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("ui error: {0}")]
    UiError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Contract violations by the caller: never recovered, surfaced to the driver.
    pub fn is_caller_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter(_) | Error::InvalidState(_) | Error::InvalidRequest(_) | Error::OutOfBounds(_)
        )
    }

    /// Structural invariants: compiler bugs, reported with a precise location and aborted.
    pub fn is_structural_bug(&self) -> bool {
        matches!(
            self,
            Error::InconsistentPhi(_)
                | Error::MissingPhiLink(_)
                | Error::InstructionInUse(_)
                | Error::CyclicDependency(_)
                | Error::InternalError(_)
        )
    }
}
