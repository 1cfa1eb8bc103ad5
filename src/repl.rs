//! Command grammar and dispatch loop for the interactive console.
//!
//! The loop itself is generic over `BufRead`/`Write` so it can be driven by real
//! stdin/stdout or, in tests, by an in-memory script.

use std::io::{self, BufRead, Write};

use crate::ansi::{AnsiColor, AnsiWriter, Style};
use crate::breakpoint::{BreakContext, Breakpoint};
use crate::debugger::Debugger;
use crate::error::DebuggerError;
use crate::where_render::WhereRenderer;

const PROMPT: &str = "(polyfile) ";

const CANONICAL_COMMANDS: &[&str] = &[
    "help", "continue", "run", "step", "next", "breakpoint", "where", "backtrace", "delete", "test",
    "print", "set", "show", "quit",
];

/// Split a raw REPL line into its command token and trimmed argument remainder.
pub fn split_command(line: &str) -> (&str, &str) {
    let trimmed = line.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    }
}

/// A `token` resolves to `canonical` iff it is a non-empty prefix of it.
pub fn matches_command(token: &str, canonical: &str) -> bool {
    !token.is_empty() && canonical.starts_with(&token.to_lowercase())
}

/// Resolve `token` against the canonical command table, returning the canonical name.
/// `info stack` is folded into the `where`/`backtrace` family by the caller, since it is
/// a two-word alias rather than a prefix.
fn resolve(token: &str) -> Option<&'static str> {
    CANONICAL_COMMANDS.iter().find(|c| matches_command(token, c)).copied()
}

/// What the REPL's dispatch of one line decided to do.
enum Outcome {
    /// Stay in the loop and print the next prompt.
    Continue,
    /// Exit the loop because the user asked to resume execution.
    Resume,
}

/// Drive the command loop until the user resumes execution (`continue`/`step`/`next`) or
/// the input stream reaches EOF (treated the same as `continue`, matching the original's
/// "EOF from the top-level prompt exits" behavior applied at the scope of one stop).
pub fn run_until_resume<R: BufRead, W: Write>(debugger: &mut Debugger, reader: &mut R, writer: &mut W) {
    let mut ansi = AnsiWriter::for_readline_prompt(debugger.use_ansi());
    loop {
        ansi.write(&PROMPT, Style::bold());
        let _ = ansi.flush_to(writer);

        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).unwrap_or(0);
        if bytes_read == 0 {
            return; // EOF: treat as resuming execution.
        }
        let line = line.trim_end_matches(['\n', '\r']);

        let (token, arg) = split_command(line);
        let (command, arg) = if token.is_empty() {
            match debugger.last_command().cloned() {
                Some(previous) => (previous, String::new()),
                None => continue,
            }
        } else {
            (token.to_string(), arg.to_string())
        };

        debugger.history_mut().record(line);

        match dispatch(debugger, &command, &arg, writer) {
            Ok(Outcome::Resume) => return,
            Ok(Outcome::Continue) => continue,
            Err(e) => {
                let mut out = AnsiWriter::new(debugger.use_ansi());
                out.write(&format_args!("{e}\n"), Style::color(AnsiColor::Red));
                let _ = out.flush_to(writer);
                debugger.clear_last_command();
            }
        }
    }
}

fn dispatch<W: Write>(
    debugger: &mut Debugger,
    command_token: &str,
    arg: &str,
    writer: &mut W,
) -> Result<Outcome, DebuggerError> {
    let canonical = if command_token.eq_ignore_ascii_case("info")
        && arg.trim_start().to_lowercase().starts_with("stack")
    {
        "where"
    } else {
        match resolve(command_token) {
            Some(c) => c,
            None => return Err(DebuggerError::UnknownCommand(command_token.to_string())),
        }
    };
    debugger.set_last_command(canonical.to_string());

    match canonical {
        "help" => {
            print_help(debugger, writer);
            Ok(Outcome::Continue)
        }
        "continue" | "run" => {
            debugger.step_controller_mut().set_running();
            Ok(Outcome::Resume)
        }
        "step" => {
            debugger.step_controller_mut().set_single_stepping();
            Ok(Outcome::Resume)
        }
        "next" => {
            debugger.step_controller_mut().set_next();
            Ok(Outcome::Resume)
        }
        "where" | "backtrace" => {
            render_where(debugger, writer)?;
            Ok(Outcome::Continue)
        }
        "breakpoint" => {
            handle_breakpoint(debugger, arg, writer)?;
            Ok(Outcome::Continue)
        }
        "delete" => {
            handle_delete(debugger, arg, writer)?;
            Ok(Outcome::Continue)
        }
        "test" => {
            debugger.run_ad_hoc_test(arg, writer)?;
            Ok(Outcome::Continue)
        }
        "print" => {
            debugger.print_offset(arg, writer)?;
            Ok(Outcome::Continue)
        }
        "set" => {
            handle_set(debugger, arg, writer)?;
            Ok(Outcome::Continue)
        }
        "show" => {
            handle_show(debugger, arg, writer)?;
            Ok(Outcome::Continue)
        }
        "quit" => std::process::exit(0),
        other => unreachable!("canonical command {other:?} is not dispatched"),
    }
}

fn render_where<W: Write>(debugger: &mut Debugger, writer: &mut W) -> Result<(), DebuggerError> {
    if !debugger.snapshot().has_run_a_test() {
        return Err(DebuggerError::NeedsFirstTest);
    }
    let arena = debugger.arena();
    let arena = arena.borrow();
    let renderer = WhereRenderer::new(&arena, debugger.breakpoints());
    let mut ansi = AnsiWriter::new(debugger.use_ansi());
    renderer.render(&mut ansi, &debugger.snapshot());
    let _ = ansi.flush_to(writer);
    Ok(())
}

fn handle_breakpoint<W: Write>(debugger: &mut Debugger, arg: &str, writer: &mut W) -> Result<(), DebuggerError> {
    let mut ansi = AnsiWriter::new(debugger.use_ansi());
    if arg.is_empty() {
        if debugger.breakpoints().is_empty() {
            ansi.plain(&"No breakpoints set. Usage: breakpoint mime:<pattern> | ext:<ext> | <file>:<line>\n");
        } else {
            for (i, bp) in debugger.breakpoints().iter().enumerate() {
                ansi.plain(&format_args!("{i}: {bp}\n"));
            }
        }
        let _ = ansi.flush_to(writer);
        return Ok(());
    }
    let parsed = Breakpoint::parse(arg).ok_or_else(|| DebuggerError::BadBreakpoint(arg.to_string()))?;
    ansi.write(&format_args!("Breakpoint {}: {parsed}\n", debugger.breakpoints().len()), Style::color(AnsiColor::Green));
    debugger.breakpoints_mut().push(parsed);
    let _ = ansi.flush_to(writer);
    Ok(())
}

fn handle_delete<W: Write>(debugger: &mut Debugger, arg: &str, writer: &mut W) -> Result<(), DebuggerError> {
    let index: usize = arg.parse().map_err(|_| DebuggerError::BadIndex(arg.to_string()))?;
    if index >= debugger.breakpoints().len() {
        return Err(DebuggerError::BadIndex(arg.to_string()));
    }
    let removed = debugger.breakpoints_mut().remove(index);
    let mut ansi = AnsiWriter::new(debugger.use_ansi());
    ansi.plain(&format_args!("Deleted breakpoint {index}: {removed}\n"));
    let _ = ansi.flush_to(writer);
    Ok(())
}

fn handle_set<W: Write>(debugger: &mut Debugger, arg: &str, writer: &mut W) -> Result<(), DebuggerError> {
    let (name, value) = split_set_argument(arg);
    debugger.set_variable(name, value)?;
    let mut ansi = AnsiWriter::new(debugger.use_ansi());
    ansi.plain(&format_args!("{name} = {value}\n"));
    let _ = ansi.flush_to(writer);
    Ok(())
}

fn split_set_argument(arg: &str) -> (&str, &str) {
    if let Some((name, value)) = arg.split_once('=') {
        (name.trim(), value.trim())
    } else {
        split_command(arg)
    }
}

fn handle_show<W: Write>(debugger: &mut Debugger, arg: &str, writer: &mut W) -> Result<(), DebuggerError> {
    let mut ansi = AnsiWriter::new(debugger.use_ansi());
    if arg.is_empty() {
        for (name, description, value) in debugger.all_variables() {
            ansi.plain(&format_args!("{name} = {value}  ({description})\n"));
        }
        let _ = ansi.flush_to(writer);
        return Ok(());
    }
    let (_, description, value) =
        debugger.variable(arg).ok_or_else(|| DebuggerError::UnknownVariable(arg.to_string()))?;
    ansi.plain(&format_args!("{arg} = {value}  ({description})\n"));
    let _ = ansi.flush_to(writer);
    Ok(())
}

fn print_help<W: Write>(debugger: &Debugger, writer: &mut W) {
    let mut ansi = AnsiWriter::new(debugger.use_ansi());
    let lines = [
        ("help", "show this message"),
        ("continue / run", "resume execution"),
        ("step", "stop at the very next test"),
        ("next", "stop at the next test that matches"),
        ("where / backtrace", "show source context for the current test"),
        ("breakpoint [SPEC]", "list or add a breakpoint"),
        ("delete N", "remove breakpoint N"),
        ("test DSL", "evaluate an ad-hoc test at the current cursor"),
        ("print OFFSET", "resolve and display a DSL offset expression"),
        ("set VAR VALUE", "change a debugger variable"),
        ("show [VAR]", "show one or all debugger variables"),
        ("quit", "exit magicdbg"),
    ];
    for (name, description) in lines {
        ansi.plain(&format_args!("{name:<20}{description}\n"));
    }
    let _ = ansi.flush_to(writer);
}
