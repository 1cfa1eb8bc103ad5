//! Buffered styled-text emitter.
//!
//! Mirrors a plain terminal writer: callers build up text with [`AnsiWriter::write`] and
//! flush it in one shot. Escape sequences are only emitted when the writer was
//! constructed with `use_ansi = true`, which callers typically derive from
//! [`std::io::IsTerminal`] on the underlying stream.

use std::fmt;
use std::io::Write;

/// The eight standard terminal foreground colors used by the debugger's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiColor {
    Red,
    Green,
    Blue,
    Magenta,
    Cyan,
}

impl AnsiColor {
    fn code(self) -> &'static str {
        match self {
            AnsiColor::Red => "\u{1b}[31m",
            AnsiColor::Green => "\u{1b}[32m",
            AnsiColor::Blue => "\u{1b}[34m",
            AnsiColor::Magenta => "\u{1b}[35m",
            AnsiColor::Cyan => "\u{1b}[36m",
        }
    }
}

/// Style attributes applied to a single [`AnsiWriter::write`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Style {
    pub bold: bool,
    pub dim: bool,
    pub color: Option<AnsiColor>,
}

impl Style {
    pub const fn plain() -> Self {
        Style { bold: false, dim: false, color: None }
    }

    pub const fn bold() -> Self {
        Style { bold: true, dim: false, color: None }
    }

    pub const fn dim() -> Self {
        Style { bold: false, dim: true, color: None }
    }

    pub const fn color(color: AnsiColor) -> Self {
        Style { bold: false, dim: false, color: Some(color) }
    }

    pub const fn bold_color(color: AnsiColor) -> Self {
        Style { bold: true, dim: false, color: Some(color) }
    }
}

/// A text buffer that optionally wraps writes in ANSI escape codes.
///
/// `escape_for_readline` wraps each escape run in `\001`/`\002` markers so a line editor
/// that counts visible width (not byte width) does not misjudge the prompt's length. It
/// has no effect when `use_ansi` is false.
pub struct AnsiWriter {
    use_ansi: bool,
    escape_for_readline: bool,
    buffer: String,
}

impl AnsiWriter {
    pub fn new(use_ansi: bool) -> Self {
        AnsiWriter { use_ansi, escape_for_readline: false, buffer: String::new() }
    }

    pub fn for_readline_prompt(use_ansi: bool) -> Self {
        AnsiWriter { use_ansi, escape_for_readline: true, buffer: String::new() }
    }

    pub fn format(message: &dyn fmt::Display, style: Style, escape_for_readline: bool) -> String {
        let mut prefix = String::new();
        if style.bold && !style.dim {
            prefix.push_str("\u{1b}[1m");
        } else if style.dim && !style.bold {
            prefix.push_str("\u{1b}[2m");
        }
        if let Some(color) = style.color {
            prefix.push_str(color.code());
        }
        if prefix.is_empty() {
            return message.to_string();
        }
        if escape_for_readline {
            format!("\u{1}{prefix}\u{2}{message}\u{1}\u{1b}[0m\u{2}")
        } else {
            format!("{prefix}{message}\u{1b}[0m")
        }
    }

    pub fn write(&mut self, message: &dyn fmt::Display, style: Style) {
        if self.use_ansi {
            self.buffer.push_str(&Self::format(message, style, self.escape_for_readline));
        } else {
            self.buffer.push_str(&message.to_string());
        }
    }

    pub fn plain(&mut self, message: &dyn fmt::Display) {
        self.write(message, Style::plain());
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Flush the accumulated buffer to `out` and clear it.
    pub fn flush_to(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(self.buffer.as_bytes())?;
        self.buffer.clear();
        Ok(())
    }
}

impl fmt::Display for AnsiWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn plain_mode_emits_no_escapes() {
        let mut w = AnsiWriter::new(false);
        w.write(&"hello", Style::bold_color(AnsiColor::Red));
        assert_eq!(w.as_str(), "hello");
    }

    #[test]
    fn ansi_mode_wraps_in_escapes() {
        let mut w = AnsiWriter::new(true);
        w.write(&"hi", Style::bold());
        assert_eq!(w.as_str(), "\u{1b}[1mhi\u{1b}[0m");
    }

    #[test]
    fn readline_mode_wraps_escapes_in_invisible_markers() {
        let mut w = AnsiWriter::for_readline_prompt(true);
        w.write(&"x", Style::bold());
        assert_eq!(w.as_str(), "\u{1}\u{1b}[1m\u{2}x\u{1}\u{1b}[0m\u{2}");
    }
}
