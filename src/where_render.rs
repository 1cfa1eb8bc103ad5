//! The Where Renderer: renders a focus test's breakpoint headline, ancestor and
//! descendant chain, resolved offset, byte window, and verdict.

use crate::ansi::{AnsiColor, AnsiWriter, Style};
use crate::breakpoint::{BreakContext, Breakpoint};
use crate::byte_escape::escape_bytes;
use crate::snapshot::Snapshot;
use crate::test_tree::{TestArena, TestId};

const WINDOW_RADIUS: usize = 32;

/// Render a `data` window of up to `WINDOW_RADIUS` bytes either side of `center`, with
/// the `width`-byte span starting at `center` highlighted and underlined. Shared by the
/// Where Renderer's byte window and the `print` command's offset display.
pub fn write_byte_window(writer: &mut AnsiWriter, data: &[u8], center: usize, width: usize) {
    if center > data.len() {
        return;
    }
    let start = center.saturating_sub(WINDOW_RADIUS);
    let highlight_end = (center + width).min(data.len());
    let end = (highlight_end + WINDOW_RADIUS).min(data.len());

    let before = escape_bytes(&data[start..center]);
    let highlighted = escape_bytes(&data[center..highlight_end]);
    let after = escape_bytes(&data[highlight_end..end]);

    writer.write(&before, Style::plain());
    writer.write(&highlighted, Style::bold_color(AnsiColor::Cyan));
    writer.write(&after, Style::plain());
    writer.write(&"\n", Style::plain());

    let caret_indent = " ".repeat(before.chars().count());
    let caret = "^".repeat(highlighted.chars().count().max(1));
    writer.write(&format_args!("{caret_indent}{caret}\n"), Style::color(AnsiColor::Cyan));
}

pub struct WhereRenderer<'a> {
    pub arena: &'a TestArena,
    pub breakpoints: &'a [Breakpoint],
}

impl<'a> WhereRenderer<'a> {
    pub fn new(arena: &'a TestArena, breakpoints: &'a [Breakpoint]) -> Self {
        WhereRenderer { arena, breakpoints }
    }

    /// Render the current snapshot into `writer`. Assumes `snapshot.last_test` is
    /// `Some`; callers are expected to have already turned an absent snapshot into
    /// `DebuggerError::NeedsFirstTest` before reaching here.
    pub fn render(&self, writer: &mut AnsiWriter, snapshot: &Snapshot) {
        let Some(focus) = snapshot.last_test else {
            return;
        };

        self.render_headline(writer, focus, snapshot);
        self.render_ancestors(writer, focus);
        self.render_descendants(writer, focus);
        self.render_offset(writer, focus, snapshot);
        self.render_byte_window(writer, snapshot);
        self.render_verdict(writer, snapshot);
    }

    fn render_headline(&self, writer: &mut AnsiWriter, focus: TestId, snapshot: &Snapshot) {
        let ctx = BreakContext { arena: self.arena, test: focus, result: snapshot.last_result.as_ref() };
        let matching: Vec<&Breakpoint> = self.breakpoints.iter().filter(|b| b.should_break(&ctx)).collect();
        if matching.is_empty() {
            return;
        }
        writer.write(&"Stopped at breakpoint(s):\n", Style::bold());
        for bp in matching {
            writer.write(&format_args!("  {bp}\n"), Style::color(AnsiColor::Magenta));
        }
    }

    fn render_ancestors(&self, writer: &mut AnsiWriter, focus: TestId) {
        let mut chain = self.arena.ancestors(focus);
        chain.reverse();
        for id in chain {
            let node = self.arena.get(id);
            let marker = if id == focus { "-> " } else { "   " };
            let style = if id == focus { Style::bold_color(AnsiColor::Green) } else { Style::plain() };
            writer.write(&format_args!("{marker}[{}] {}\n", node.level, node.message), style);
        }
    }

    fn render_descendants(&self, writer: &mut AnsiWriter, focus: TestId) {
        for id in self.arena.matchable_descendants(focus) {
            let node = self.arena.get(id);
            writer.write(&format_args!("   [{}] {}\n", node.level, node.message), Style::dim());
        }
    }

    fn render_offset(&self, writer: &mut AnsiWriter, focus: TestId, snapshot: &Snapshot) {
        let node = self.arena.get(focus);
        if node.offset.is_absolute() {
            return;
        }
        let parent_len = snapshot.last_parent_match.as_ref().and_then(|r| r.length());
        match node.offset.to_absolute(&snapshot.data, parent_len) {
            Ok(resolved) => {
                writer.write(&format_args!("offset {} = {resolved}\n", node.offset), Style::plain());
            }
            Err(e) => {
                writer.write(&format_args!("offset {}: {e}\n", node.offset), Style::color(AnsiColor::Red));
            }
        }
    }

    fn render_byte_window(&self, writer: &mut AnsiWriter, snapshot: &Snapshot) {
        let Some(center) = snapshot.last_absolute_offset else {
            return;
        };
        if center as usize > snapshot.data.len() {
            return;
        }
        let width = snapshot.last_result.as_ref().and_then(|r| r.length()).unwrap_or(1).max(1);
        write_byte_window(writer, &snapshot.data, center as usize, width);
    }

    fn render_verdict(&self, writer: &mut AnsiWriter, snapshot: &Snapshot) {
        match &snapshot.last_result {
            Some(r) if r.is_match() => {
                writer.write(&"succeeded\n", Style::bold_color(AnsiColor::Green));
            }
            Some(r) => {
                let message = r.failure_message().unwrap_or("");
                writer.write(&format_args!("failed: {message}\n"), Style::bold_color(AnsiColor::Red));
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::offset::Offset;
    use crate::test_tree::{TestResult, TestSpec};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn one_node_arena() -> (TestArena, TestId) {
        let mut arena = TestArena::new();
        let id = arena.add(
            None,
            TestSpec {
                level: 0,
                offset: Offset::Absolute(0),
                message: "root test".to_string(),
                mime: Some("application/pdf".to_string()),
                extensions: BTreeSet::new(),
                comments: Vec::new(),
                source_info: None,
                evaluator: Arc::new(|_, _, _| None),
            },
        );
        (arena, id)
    }

    #[test]
    fn renders_headline_only_when_a_breakpoint_matches() {
        let (arena, id) = one_node_arena();
        let bp = Breakpoint::parse("MIME:*pdf").unwrap();
        let renderer = WhereRenderer::new(&arena, std::slice::from_ref(&bp));
        let mut writer = AnsiWriter::new(false);
        let snapshot = Snapshot { last_test: Some(id), ..Snapshot::default() };
        renderer.render(&mut writer, &snapshot);
        assert!(writer.as_str().contains("Stopped at breakpoint"));
    }

    #[test]
    fn renders_verdict_for_success_and_failure() {
        let (arena, id) = one_node_arena();
        let renderer = WhereRenderer::new(&arena, &[]);

        let mut writer = AnsiWriter::new(false);
        let snapshot = Snapshot {
            last_test: Some(id),
            last_result: Some(TestResult::Success { length: Some(4) }),
            ..Snapshot::default()
        };
        renderer.render(&mut writer, &snapshot);
        assert!(writer.as_str().contains("succeeded"));

        let mut writer = AnsiWriter::new(false);
        let snapshot = Snapshot {
            last_test: Some(id),
            last_result: Some(TestResult::Failure { message: "nope".to_string() }),
            ..Snapshot::default()
        };
        renderer.render(&mut writer, &snapshot);
        assert!(writer.as_str().contains("failed: nope"));
    }

    #[test]
    fn byte_window_highlights_result_length_around_offset() {
        let (arena, id) = one_node_arena();
        let renderer = WhereRenderer::new(&arena, &[]);
        let mut writer = AnsiWriter::new(false);
        let snapshot = Snapshot {
            last_test: Some(id),
            data: b"PK\x03\x04restofzip".to_vec(),
            last_absolute_offset: Some(0),
            last_result: Some(TestResult::Success { length: Some(4) }),
            ..Snapshot::default()
        };
        renderer.render(&mut writer, &snapshot);
        assert!(writer.as_str().contains("PK"));
        assert!(writer.as_str().contains('^'));
    }
}
