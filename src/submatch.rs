//! The submatch debug driver and the `SourceDebugger` collaborator it drives.
//!
//! An external source-level debugger is itself an external collaborator here:
//! `SourceDebugger` is the narrow contract this crate needs from one (step one iterator
//! item, configure a skip-list, release on drop), and [`ProcessSourceDebugger`] is a
//! real implementation that shells out to a configurable debugger binary.
//! [`NullSourceDebugger`] is the default, used whenever no external debugger is
//! actually wanted (tests, or `break_on_parsing=false`).

use std::fmt;
use std::io::{BufRead, Write};
use std::process::{Child, Command, Stdio};

use tracing::warn;

use crate::error::DebuggerError;

/// One scalar field of a matched structure, for the pre-parse dump. Lists and nested
/// structures are skipped; only scalar and string fields are shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarField {
    pub name: String,
    pub value: String,
}

/// The subset of a matched header a parser is invoked against, as the driver needs it:
/// enough to dump and to name the source being parsed.
pub trait ScalarFields {
    fn fields(&self) -> Vec<ScalarField>;
    fn source_name(&self) -> &str;
    fn stream_offset(&self) -> u64;
}

/// One submatch a format parser produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submatch {
    pub description: String,
    pub fields: Vec<ScalarField>,
}

impl fmt::Display for Submatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)?;
        for field in &self.fields {
            write!(f, "\n    {} = {}", field.name, field.value)?;
        }
        Ok(())
    }
}

/// A fixed-value [`ScalarFields`] implementation for fixtures that don't have a real
/// matched-header type to hand the driver (`MockHost`, this crate's own tests).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticMatch {
    pub source: String,
    pub offset: u64,
    pub fields: Vec<ScalarField>,
}

impl ScalarFields for StaticMatch {
    fn fields(&self) -> Vec<ScalarField> {
        self.fields.clone()
    }

    fn source_name(&self) -> &str {
        &self.source
    }

    fn stream_offset(&self) -> u64 {
        self.offset
    }
}

/// Everything the driver needs to invoke a format parser's `on_parse_invoked` hook,
/// including the underlying parser's own lazy submatch sequence — without this, the
/// driver has nothing to forward when the user declines the external debugger, or to
/// step through when they accept it.
pub struct ParseInvocation<'a> {
    pub mime: &'a str,
    pub matched: &'a dyn ScalarFields,
    pub original: Box<dyn Iterator<Item = Submatch> + 'a>,
}

/// A skip-list entry telling the external debugger to step over frames belonging to this
/// crate's own machinery rather than the DSL code under inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipModule(pub String);

/// The narrow contract an external, interactive, native-code debugger must satisfy to be
/// driven by the Submatch Debug Driver.
pub trait SourceDebugger {
    /// Configure modules/files the debugger should step over rather than into.
    fn configure_skip_list(&mut self, modules: &[SkipModule]);

    /// Run one step of `iteration_label` under the external debugger. Implementations
    /// typically attach or signal the already-running external process at a breakpoint
    /// and block until it reports control back.
    fn step(&mut self, iteration_label: &str) -> Result<(), DebuggerError>;
}

/// No-op implementation used by default and in tests; every `step` is a pass-through.
#[derive(Debug, Default)]
pub struct NullSourceDebugger;

impl SourceDebugger for NullSourceDebugger {
    fn configure_skip_list(&mut self, _modules: &[SkipModule]) {}

    fn step(&mut self, _iteration_label: &str) -> Result<(), DebuggerError> {
        Ok(())
    }
}

/// Shells out to a configurable external debugger binary (e.g. `rust-gdb`, `lldb`) for an
/// interactive session. The child process is spawned once, on the first `step`, and torn
/// down when this value is dropped.
pub struct ProcessSourceDebugger {
    binary: String,
    skip_list: Vec<SkipModule>,
    child: Option<Child>,
}

impl ProcessSourceDebugger {
    pub fn new(binary: impl Into<String>) -> Self {
        ProcessSourceDebugger { binary: binary.into(), skip_list: Vec::new(), child: None }
    }

    fn ensure_spawned(&mut self) -> Result<(), DebuggerError> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DebuggerError::BadDsl(format!("failed to launch {}: {e}", self.binary)))?;
        self.child = Some(child);
        Ok(())
    }
}

impl SourceDebugger for ProcessSourceDebugger {
    fn configure_skip_list(&mut self, modules: &[SkipModule]) {
        self.skip_list = modules.to_vec();
    }

    fn step(&mut self, iteration_label: &str) -> Result<(), DebuggerError> {
        self.ensure_spawned()?;
        let Some(child) = self.child.as_mut() else {
            unreachable!("ensure_spawned just set self.child to Some")
        };
        if let Some(stdin) = child.stdin.as_mut() {
            let skip = self
                .skip_list
                .iter()
                .map(|m| m.0.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(stdin, "# step {iteration_label} (skip: {skip})");
        }
        Ok(())
    }
}

impl Drop for ProcessSourceDebugger {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Guards the "only one external debugger handle may be active" invariant: installed on
/// the first, non-reentrant `debug_parse` call, released on drop regardless of how the
/// scope is exited.
pub struct SourceDebuggerGuard<'a> {
    active: &'a mut bool,
}

impl<'a> SourceDebuggerGuard<'a> {
    fn acquire(active: &'a mut bool) -> Option<Self> {
        if *active {
            return None;
        }
        *active = true;
        Some(SourceDebuggerGuard { active })
    }
}

impl Drop for SourceDebuggerGuard<'_> {
    fn drop(&mut self) {
        *self.active = false;
    }
}

/// Drives the dump/prompt/step protocol: dump, prompt, and either pass submatches through untouched
/// or step them one at a time under a [`SourceDebugger`].
pub struct SubmatchDebugDriver {
    debugger: Box<dyn SourceDebugger>,
    handle_active: bool,
}

impl SubmatchDebugDriver {
    pub fn new(debugger: Box<dyn SourceDebugger>) -> Self {
        SubmatchDebugDriver { debugger, handle_active: false }
    }

    /// True while a nested `debug_parse` would be a re-entrant call and should skip the
    /// prompt/installation steps.
    pub fn is_active(&self) -> bool {
        self.handle_active
    }

    /// Run the full protocol against one parser invocation. `ask_yes_no` abstracts the
    /// confirmation prompt (default answer baked into the prompt text by the caller) so
    /// this method is testable without real stdin; it returns `None` on EOF/cancel.
    pub fn drive<'a, R: BufRead, W: Write>(
        &mut self,
        invocation: ParseInvocation<'a>,
        reader: &mut R,
        writer: &mut W,
        mut ask_yes_no: impl FnMut(&mut R, &mut W, &str, bool) -> Option<bool>,
    ) -> Vec<Submatch> {
        let ParseInvocation { mime, matched, original } = invocation;
        if self.handle_active {
            return original.collect();
        }

        let _ = writeln!(
            writer,
            "Invoking parser for MIME {} on {} at stream offset {}",
            mime,
            matched.source_name(),
            matched.stream_offset()
        );
        for field in matched.fields() {
            let _ = writeln!(writer, "    {} = {}", field.name, field.value);
        }

        let use_debugger = match ask_yes_no(
            reader,
            writer,
            "Debug using an external debugger? [y/N] (disable with `set break_on_parsing false`)",
            false,
        ) {
            Some(answer) => answer,
            None => return original.collect(),
        };

        if !use_debugger {
            return original.collect();
        }

        let guard = match SourceDebuggerGuard::acquire(&mut self.handle_active) {
            Some(g) => g,
            None => return original.collect(),
        };

        self.debugger.configure_skip_list(&[
            SkipModule("magicdbg".to_string()),
            SkipModule("magicdbg::submatch".to_string()),
        ]);

        let mut results = Vec::new();
        let mut submatches = original.peekable();
        let mut index = 0usize;
        while let Some(submatch) = submatches.next() {
            if let Err(e) = self.debugger.step(&format!("submatch #{index}")) {
                warn!(error = %e, "external source debugger step failed");
            }
            let _ = writeln!(writer, "{submatch}");
            results.push(submatch);
            index += 1;

            if submatches.peek().is_none() {
                let _ = writeln!(writer, "Parser exhausted; no further submatches.");
                break;
            }

            let keep_going =
                ask_yes_no(reader, writer, "Continue debugging the next submatch? [Y/n]", true);
            match keep_going {
                Some(true) | None => continue,
                Some(false) => {
                    let print_rest =
                        ask_yes_no(reader, writer, "Print the remaining submatches? [y/N]", false)
                            .unwrap_or(false);
                    for remaining in submatches {
                        if print_rest {
                            let _ = writeln!(writer, "{remaining}");
                        }
                        results.push(remaining);
                    }
                    break;
                }
            }
        }

        drop(guard);
        results
    }
}
