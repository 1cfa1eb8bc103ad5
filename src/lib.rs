//! Interactive debugger engine for a libmagic-style declarative file-identification
//! system: instrumentation, breakpoints, a step/next/continue state machine, context
//! snapshots, and the REPL that ties them together.
//!
//! The DSL matcher itself, its format parsers, and the terminal line editor are external
//! collaborators (see `host` and `submatch`); this crate owns the debugger engine that
//! sits between them.

pub mod ansi;
pub mod breakpoint;
pub mod byte_escape;
pub mod debugger;
pub mod error;
pub mod history;
pub mod host;
pub mod mock_host;
pub mod offset;
pub mod repl;
pub mod snapshot;
pub mod step;
pub mod submatch;
pub mod test_tree;
pub mod variables;
pub mod where_render;
pub mod wildcard;

pub use breakpoint::{BreakContext, Breakpoint};
pub use debugger::{Debugger, DebuggerHandle, DebuggerSession};
pub use error::{DebuggerError, DebuggerResult};
pub use host::{HostEngine, ParserInterceptor, TestClassId, TestInterceptor};
pub use mock_host::MockHost;
pub use offset::Offset;
pub use step::StepMode;
pub use test_tree::{TestArena, TestId, TestResult};
