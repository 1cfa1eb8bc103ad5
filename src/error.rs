//! Error types surfaced by the debugger.
//!
//! Every variant here is printed to the user in red and never aborts the REPL loop; the
//! one exception is I/O failure on the top-level prompt, which is handled by the REPL
//! itself as an end-of-session condition rather than an error value.

use thiserror::Error;

/// Errors the REPL can report without ending the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DebuggerError {
    /// The first whitespace-delimited token did not match any canonical command prefix.
    #[error("Undefined command: {0:?}. Try \"help\".")]
    UnknownCommand(String),

    /// A command that requires a prior test evaluation (`where`, `test`, `print`) was
    /// issued before the first `step`/`next`/`run`.
    #[error("The first test has not yet been run.\nUse `step`, `next`, or `run` to start testing.")]
    NeedsFirstTest,

    /// `Breakpoint::parse` returned `None` for the given text.
    #[error("Invalid breakpoint pattern: {0:?}")]
    BadBreakpoint(String),

    /// `delete` was given a non-integer, or out-of-range, breakpoint index.
    #[error("Invalid breakpoint index: {0:?}")]
    BadIndex(String),

    /// The underlying DSL parser rejected ad-hoc `test` input.
    #[error("Error parsing test: {0}")]
    BadDsl(String),

    /// Offset resolution failed because required context (e.g. a parent match) was
    /// absent, or an indirect read fell outside the buffer.
    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    /// `set`/`show` referenced a name not present in the variable table.
    #[error("Unknown variable {0:?}")]
    UnknownVariable(String),

    /// `set` was given a value its variable's parser rejected.
    #[error("{0}")]
    BadVariableValue(String),

    /// History could not be written at disable time. Logged as a warning; never fatal.
    #[error("Unable to save history to {path}: {source}")]
    HistoryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for fallible debugger operations that surface a [`DebuggerError`].
pub type DebuggerResult<T> = Result<T, DebuggerError>;
