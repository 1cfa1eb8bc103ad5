//! The top-level `Debugger`: owns instrumentation, step state, breakpoints, variables,
//! history, and the submatch driver, and implements the host's interceptor contracts.
//!
//! Rust has no way to let a freshly constructed value hand a reference to itself to a
//! collaborator before construction finishes, and the host's interceptor table needs
//! exactly that (the Debugger installs *itself* as the interceptor for every
//! instrumented class). [`Debugger::new_handle`] threads a [`std::rc::Weak`] back into
//! the value after it is wrapped in `Rc<RefCell<_>>`, the standard shape for this kind of
//! self-registering callback graph.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ansi::AnsiWriter;
use crate::breakpoint::{BreakContext, Breakpoint};
use crate::error::{DebuggerError, DebuggerResult};
use crate::history::History;
use crate::host::{HostEngine, ParserInterceptor, TestClassId, TestInterceptor};
use crate::offset::Offset;
use crate::repl;
use crate::snapshot::{ReplTestTag, Snapshot, SnapshotCell};
use crate::step::StepController;
use crate::submatch::{ParseInvocation, SourceDebugger, Submatch, SubmatchDebugDriver};
use crate::test_tree::{SourceInfo, TestArena, TestId, TestResult, TestSpec};
use crate::variables::{break_on_parsing_variable, AnyVariable, Variable, VariableEffect};
use crate::where_render::WhereRenderer;

pub type DebuggerHandle = Rc<RefCell<Debugger>>;
pub type HostHandle = Rc<RefCell<dyn HostEngine>>;

/// Every instrumentable test class is assumed eligible; a real engine might also expose
/// classes with no overridable `test` (the original's "inherits one: skipped" case),
/// which `HostEngine::test_classes()` is expected to simply not list.
pub struct Debugger {
    arena: Rc<RefCell<TestArena>>,
    host: HostHandle,
    self_handle: Weak<RefCell<Debugger>>,
    snapshot: SnapshotCell,
    step: StepController,
    breakpoints: Vec<Breakpoint>,
    break_on_parsing: Variable<bool>,
    history: History,
    submatch_driver: SubmatchDebugDriver,
    entry_count: u32,
    enabled: bool,
    use_ansi: bool,
    last_command: Option<String>,
    reader: Option<Box<dyn BufRead>>,
    writer: Option<Box<dyn Write>>,
}

impl Debugger {
    /// Construct a `Debugger` and wrap it in the `Rc<RefCell<_>>` shape the host
    /// interceptor table requires.
    #[allow(clippy::too_many_arguments)]
    pub fn new_handle(
        arena: Rc<RefCell<TestArena>>,
        host: HostHandle,
        source_debugger: Box<dyn SourceDebugger>,
        use_ansi: bool,
        home: &Path,
        reader: Box<dyn BufRead>,
        writer: Box<dyn Write>,
    ) -> DebuggerHandle {
        let debugger = Debugger {
            arena,
            host,
            self_handle: Weak::new(),
            snapshot: SnapshotCell::new(Snapshot::default()),
            step: StepController::new(),
            breakpoints: Vec::new(),
            break_on_parsing: break_on_parsing_variable(true),
            history: History::load(home),
            submatch_driver: SubmatchDebugDriver::new(source_debugger),
            entry_count: 0,
            enabled: false,
            use_ansi,
            last_command: None,
            reader: Some(reader),
            writer: Some(writer),
        };
        let handle = Rc::new(RefCell::new(debugger));
        handle.borrow_mut().self_handle = Rc::downgrade(&handle);
        handle
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn use_ansi(&self) -> bool {
        self.use_ansi
    }

    pub fn arena(&self) -> &Rc<RefCell<TestArena>> {
        &self.arena
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.get()
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut Vec<Breakpoint> {
        &mut self.breakpoints
    }

    pub fn step_controller_mut(&mut self) -> &mut StepController {
        &mut self.step
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn last_command(&self) -> Option<&String> {
        self.last_command.as_ref()
    }

    pub fn set_last_command(&mut self, command: String) {
        self.last_command = Some(command);
    }

    pub fn clear_last_command(&mut self) {
        self.last_command = None;
    }

    pub fn all_variables(&self) -> Vec<(&'static str, String, String)> {
        vec![("break_on_parsing", self.break_on_parsing.description().to_string(), self.break_on_parsing.value_display())]
    }

    pub fn variable(&self, name: &str) -> Option<(&'static str, String, String)> {
        if name == "break_on_parsing" {
            Some(("break_on_parsing", self.break_on_parsing.description().to_string(), self.break_on_parsing.value_display()))
        } else {
            None
        }
    }

    pub fn set_variable(&mut self, name: &str, value: &str) -> DebuggerResult<()> {
        if name != "break_on_parsing" {
            return Err(DebuggerError::UnknownVariable(name.to_string()));
        }
        let effect = self.break_on_parsing.set_from_str(value)?;
        if effect == VariableEffect::ReinstrumentParsers && self.enabled {
            self.reinstrument_parsers();
        }
        Ok(())
    }

    fn reinstrument_parsers(&mut self) {
        let mut host = self.host.borrow_mut();
        for mime in host.parser_mimes() {
            host.clear_parser_interceptor(&mime);
        }
        if *self.break_on_parsing.value() {
            let interceptor: Rc<RefCell<dyn ParserInterceptor>> = self.self_rc();
            for mime in host.parser_mimes() {
                host.set_parser_interceptor(&mime, Rc::clone(&interceptor));
            }
        }
        info!(enabled = *self.break_on_parsing.value(), "re-instrumented submatch parsers");
    }

    fn self_rc(&self) -> Rc<RefCell<Debugger>> {
        self.self_handle.upgrade().unwrap_or_else(|| {
            unreachable!("Debugger::self_handle is populated immediately after construction in new_handle")
        })
    }

    /// Install this debugger as the interceptor for every eligible test class, and (if
    /// `break_on_parsing` is set) every parser mime.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        let mut host = self.host.borrow_mut();
        let test_interceptor: Rc<RefCell<dyn TestInterceptor>> = self.self_rc();
        for class in host.test_classes() {
            host.set_test_interceptor(&class, Rc::clone(&test_interceptor));
        }
        if *self.break_on_parsing.value() {
            let parser_interceptor: Rc<RefCell<dyn ParserInterceptor>> = self.self_rc();
            for mime in host.parser_mimes() {
                host.set_parser_interceptor(&mime, Rc::clone(&parser_interceptor));
            }
        }
        drop(host);
        self.enabled = true;
        info!("debugger enabled");
    }

    /// Remove every interceptor this debugger installed and flush history. Idempotent.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        let mut host = self.host.borrow_mut();
        for class in host.test_classes() {
            host.clear_test_interceptor(&class);
        }
        for mime in host.parser_mimes() {
            host.clear_parser_interceptor(&mime);
        }
        drop(host);
        if let Err(e) = self.history.flush() {
            warn!(error = %e, "failed to persist history on disable");
        }
        self.enabled = false;
        info!("debugger disabled");
    }

    /// Parse and evaluate `text` as a child of the currently-focused test, render it,
    /// then retract the synthetic node so the live snapshot is left untouched.
    pub fn run_ad_hoc_test<W: Write>(&mut self, text: &str, writer: &mut W) -> DebuggerResult<()> {
        let snap = self.snapshot.get();
        let parent = snap.last_test.ok_or(DebuggerError::NeedsFirstTest)?;
        let (offset, needle, message) = parse_ad_hoc_test(text)?;
        let parent_match_len = snap.last_result.as_ref().and_then(TestResult::length);
        let absolute_offset = offset
            .to_absolute(&snap.data, parent_match_len)
            .map_err(|e| DebuggerError::InvalidOffset(e.to_string()))?;

        let guard = self.snapshot.save_context();

        let parent_level = self.arena.borrow().get(parent).level;
        let synthetic_id = self.arena.borrow_mut().add(
            Some(parent),
            TestSpec {
                level: parent_level + 1,
                offset: offset.clone(),
                message: message.clone(),
                mime: None,
                extensions: BTreeSet::new(),
                comments: Vec::new(),
                source_info: Some(SourceInfo { path: PathBuf::from("STDIN"), line: 1, original_line: None }),
                evaluator: string_test_evaluator(needle),
            },
        );

        self.snapshot.with_mut(|s| {
            s.repl_test = ReplTestTag::Ephemeral(synthetic_id);
            s.last_test = Some(synthetic_id);
            s.last_absolute_offset = Some(absolute_offset);
            s.last_result = None;
        });

        let result = self.arena.borrow().evaluate(synthetic_id, &snap.data, absolute_offset, snap.last_result.as_ref());
        self.snapshot.with_mut(|s| s.last_result = result);

        {
            let arena = self.arena.borrow();
            let renderer = WhereRenderer::new(&arena, &self.breakpoints);
            let mut ansi = AnsiWriter::new(self.use_ansi);
            renderer.render(&mut ansi, &self.snapshot.get());
            let _ = ansi.flush_to(writer);
        }

        self.arena.borrow_mut().remove(synthetic_id);
        drop(guard);
        Ok(())
    }

    /// Resolve and print a DSL offset expression against the live snapshot.
    pub fn print_offset<W: Write>(&mut self, text: &str, writer: &mut W) -> DebuggerResult<()> {
        let snap = self.snapshot.get();
        if !snap.has_run_a_test() {
            return Err(DebuggerError::NeedsFirstTest);
        }
        let offset = Offset::parse(text).map_err(|e| DebuggerError::InvalidOffset(e.to_string()))?;
        let parent_len = snap.last_result.as_ref().and_then(TestResult::length);
        let resolved = offset
            .to_absolute(&snap.data, parent_len)
            .map_err(|e| DebuggerError::InvalidOffset(e.to_string()))?;

        let mut ansi = AnsiWriter::new(self.use_ansi);
        ansi.plain(&format_args!("{offset} = {resolved}\n"));
        crate::where_render::write_byte_window(&mut ansi, &snap.data, resolved as usize, 1);
        let _ = ansi.flush_to(writer);
        Ok(())
    }

    /// Enter the nested command loop using this debugger's own stdin/stdout, returning
    /// once the user resumes execution.
    fn enter_repl(&mut self) {
        let (Some(mut reader), Some(mut writer)) = (self.reader.take(), self.writer.take()) else {
            unreachable!("reader/writer are only taken for the duration of enter_repl itself")
        };
        repl::run_until_resume(self, &mut reader, &mut writer);
        self.reader = Some(reader);
        self.writer = Some(writer);
    }

    fn should_break(&self, arena: &TestArena, id: TestId, result: Option<&TestResult>) -> bool {
        if self.step.should_break_on_step(result) {
            return true;
        }
        let ctx = BreakContext { arena, test: id, result };
        self.breakpoints.iter().any(|b| b.should_break(&ctx))
    }
}

impl TestInterceptor for Debugger {
    fn on_test_invoked(
        &mut self,
        arena: &Rc<RefCell<TestArena>>,
        id: TestId,
        data: &[u8],
        absolute_offset: u64,
        parent_match: Option<&TestResult>,
    ) -> Option<TestResult> {
        let result = arena.borrow().evaluate(id, data, absolute_offset, parent_match);

        if matches!(self.snapshot.get().repl_test, ReplTestTag::Ephemeral(ephemeral) if ephemeral == id) {
            return result;
        }

        self.snapshot.with_mut(|s| {
            s.data = data.to_vec();
            s.last_test = Some(id);
            s.last_absolute_offset = Some(absolute_offset);
            s.last_parent_match = parent_match.cloned();
            s.last_result = result.clone();
        });

        // Scoped so the borrow releases before `enter_repl`, which may re-enter and take
        // its own `borrow_mut()` on this same arena (the `test` REPL command does).
        let stop = self.should_break(&arena.borrow(), id, result.as_ref());
        if stop {
            debug!(?id, "stopping for debugger interaction");
            self.enter_repl();
        }
        result
    }
}

impl ParserInterceptor for Debugger {
    /// Re-entrant invocations (an external debugger handle already active) are handled
    /// by `SubmatchDebugDriver::drive` itself, which forwards `invocation.original`
    /// untouched rather than prompting again — so this just always calls through.
    fn on_parse_invoked<'a>(&mut self, invocation: ParseInvocation<'a>) -> Box<dyn Iterator<Item = Submatch> + 'a> {
        let (Some(mut reader), Some(mut writer)) = (self.reader.take(), self.writer.take()) else {
            unreachable!("reader/writer are only taken for the duration of on_parse_invoked itself")
        };
        let results = self.submatch_driver.drive(invocation, &mut reader, &mut writer, |r, w, prompt, default| {
            ask_yes_no(r, w, prompt, default)
        });
        self.reader = Some(reader);
        self.writer = Some(writer);
        Box::new(results.into_iter())
    }
}

fn ask_yes_no<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, prompt: &str, default: bool) -> Option<bool> {
    let _ = write!(writer, "{prompt} ");
    let _ = writer.flush();
    let mut line = String::new();
    if reader.read_line(&mut line).unwrap_or(0) == 0 {
        return None;
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Some(default);
    }
    Some(trimmed.eq_ignore_ascii_case("y") || trimmed.eq_ignore_ascii_case("yes"))
}

/// An RAII session guard around enable/disable: a re-entry counter increments on every
/// `enter` and decrements on every drop, so the debugger stays installed as long as any
/// session handle is alive and comes out cleanly once the last one is dropped.
pub struct DebuggerSession {
    debugger: DebuggerHandle,
}

impl DebuggerSession {
    pub fn enter(debugger: DebuggerHandle) -> Self {
        {
            let mut d = debugger.borrow_mut();
            d.entry_count += 1;
            if d.entry_count == 1 {
                d.enable();
            }
        }
        DebuggerSession { debugger }
    }
}

impl Drop for DebuggerSession {
    fn drop(&mut self) {
        let mut d = self.debugger.borrow_mut();
        d.entry_count = d.entry_count.saturating_sub(1);
        if d.entry_count == 0 {
            d.disable();
        }
    }
}

/// Minimal stand-in DSL parser for the REPL's `test` command: `OFFSET string LITERAL
/// [MESSAGE...]`. The real DSL's type tests, numeric comparisons, and regex matching are
/// external-collaborator territory; this is just enough to exercise ad-hoc evaluation
/// end to end.
fn parse_ad_hoc_test(text: &str) -> DebuggerResult<(Offset, Vec<u8>, String)> {
    let mut parts = text.splitn(3, char::is_whitespace);
    let offset_text = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| DebuggerError::BadDsl("missing offset".to_string()))?;
    let type_text = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| DebuggerError::BadDsl("missing test type".to_string()))?;
    if !type_text.eq_ignore_ascii_case("string") {
        return Err(DebuggerError::BadDsl(format!("unsupported test type {type_text:?}; only `string` is supported")));
    }
    let rest = parts.next().unwrap_or("");
    let (literal_text, message) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if literal_text.is_empty() {
        return Err(DebuggerError::BadDsl("missing string literal".to_string()));
    }
    let offset = Offset::parse(offset_text).map_err(|e| DebuggerError::BadDsl(e.to_string()))?;
    let needle = unescape(literal_text)?;
    Ok((offset, needle, message.trim().to_string()))
}

fn unescape(text: &str) -> DebuggerResult<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('r') => out.push(b'\r'),
            Some('0') => out.push(0),
            Some('\\') => out.push(b'\\'),
            Some('x') => {
                let hi = chars.next().ok_or_else(|| DebuggerError::BadDsl("truncated \\x escape".to_string()))?;
                let lo = chars.next().ok_or_else(|| DebuggerError::BadDsl("truncated \\x escape".to_string()))?;
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|_| DebuggerError::BadDsl(format!("invalid \\x escape \\x{hi}{lo}")))?;
                out.push(byte);
            }
            Some(other) => return Err(DebuggerError::BadDsl(format!("unknown escape \\{other}"))),
            None => return Err(DebuggerError::BadDsl("trailing backslash".to_string())),
        }
    }
    Ok(out)
}

fn string_test_evaluator(needle: Vec<u8>) -> Arc<dyn Fn(&[u8], u64, Option<&TestResult>) -> Option<TestResult> + Send + Sync> {
    Arc::new(move |data: &[u8], absolute_offset: u64, _parent_match: Option<&TestResult>| {
        let start = absolute_offset as usize;
        if start > data.len() {
            return Some(TestResult::Failure { message: "offset beyond end of buffer".to_string() });
        }
        if data[start..].starts_with(needle.as_slice()) {
            Some(TestResult::Success { length: Some(needle.len()) })
        } else {
            Some(TestResult::Failure { message: format!("{:?} not found at offset {start}", String::from_utf8_lossy(&needle)) })
        }
    })
}
