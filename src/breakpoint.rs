//! The breakpoint predicate model.
//!
//! `Breakpoint` is a closed sum type; `parse` is a plain function that tries each
//! variant's grammar in a fixed order rather than dispatching through a registry of
//! independently-registered predicate types.

use std::fmt;

use crate::test_tree::{TestArena, TestId, TestResult};
use crate::wildcard::Wildcard;

/// A predicate over `(test, data, absolute_offset, parent_match, result)` that decides
/// whether the REPL should stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Breakpoint {
    /// Stops when `pattern` is contained in the test's advertised MIME types.
    Mime { pattern: Wildcard, raw: String },
    /// Stops when `ext` is one of the test's advertised extensions.
    Extension(String),
    /// Stops when the test's source location matches `filename:line`.
    File { filename: String, line: u32 },
    /// Stops only when the wrapped breakpoint matches and the result is absent or failed.
    Failed(Box<Breakpoint>),
    /// Stops only when the wrapped breakpoint matches and the result is present and
    /// succeeded.
    Matched(Box<Breakpoint>),
}

/// Inputs `should_break` is evaluated against — one snapshot's worth of state.
pub struct BreakContext<'a> {
    pub arena: &'a TestArena,
    pub test: TestId,
    pub result: Option<&'a TestResult>,
}

impl Breakpoint {
    /// Parse breakpoint text, trying `!`/`=` prefixes first and then each base variant.
    pub fn parse(text: &str) -> Option<Breakpoint> {
        if let Some(rest) = text.strip_prefix('!') {
            if rest.is_empty() {
                return None;
            }
            return Breakpoint::parse(rest).map(|b| Breakpoint::Failed(Box::new(b)));
        }
        if let Some(rest) = text.strip_prefix('=') {
            if rest.is_empty() {
                return None;
            }
            return Breakpoint::parse(rest).map(|b| Breakpoint::Matched(Box::new(b)));
        }
        Self::parse_mime(text)
            .or_else(|| Self::parse_extension(text))
            .or_else(|| Self::parse_file(text))
    }

    fn parse_mime(text: &str) -> Option<Breakpoint> {
        let rest = strip_prefix_case_insensitive(text, "mime:")?;
        Some(Breakpoint::Mime { pattern: Wildcard::parse(rest), raw: rest.to_string() })
    }

    fn parse_extension(text: &str) -> Option<Breakpoint> {
        let rest = strip_prefix_case_insensitive(text, "ext:")?;
        Some(Breakpoint::Extension(rest.to_string()))
    }

    fn parse_file(text: &str) -> Option<Breakpoint> {
        let mut parts = text.split(':');
        let filename = parts.next()?;
        let remainder: Vec<&str> = parts.collect();
        // Reject `a:1:2` rather than concatenating digits into a single line number.
        if remainder.len() != 1 {
            return None;
        }
        let line: u32 = remainder[0].parse().ok()?;
        if line == 0 {
            return None;
        }
        Some(Breakpoint::File { filename: filename.to_string(), line })
    }

    /// Decide whether this breakpoint's predicate holds for `ctx`.
    pub fn should_break(&self, ctx: &BreakContext<'_>) -> bool {
        match self {
            Breakpoint::Mime { pattern, .. } => {
                let mimes = ctx.arena.mimetypes(ctx.test);
                !mimes.is_empty() && mimes.iter().any(|m| pattern.is_match(m))
            }
            Breakpoint::Extension(ext) => ctx.arena.all_extensions(ctx.test).contains(ext),
            Breakpoint::File { filename, line } => {
                let node = ctx.arena.get(ctx.test);
                match &node.source_info {
                    Some(info) if info.line == *line => {
                        if filename.contains('/') {
                            info.path.to_string_lossy() == *filename
                        } else {
                            info.path.file_name().map(|n| n.to_string_lossy() == *filename).unwrap_or(false)
                        }
                    }
                    _ => false,
                }
            }
            Breakpoint::Failed(inner) => {
                let outcome_ok = !matches!(ctx.result, Some(r) if r.is_match());
                outcome_ok && inner.should_break(ctx)
            }
            Breakpoint::Matched(inner) => {
                let outcome_ok = matches!(ctx.result, Some(r) if r.is_match());
                outcome_ok && inner.should_break(ctx)
            }
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breakpoint::Mime { raw, .. } => write!(f, "Breakpoint: Matching for MIME {raw}"),
            Breakpoint::Extension(ext) => write!(f, "Breakpoint: Matching for extension {ext}"),
            Breakpoint::File { filename, line } => write!(f, "Breakpoint: {filename} line {line}"),
            Breakpoint::Failed(inner) => write!(f, "[FAILED] {inner}"),
            Breakpoint::Matched(inner) => write!(f, "[MATCHED] {inner}"),
        }
    }
}

fn strip_prefix_case_insensitive<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() < prefix.len() {
        return None;
    }
    let (candidate, rest) = text.split_at(prefix.len());
    if candidate.eq_ignore_ascii_case(prefix) {
        Some(rest)
    } else {
        None
    }
}
