//! Typed, enumerated debugger settings.
//!
//! Giving each [`Variable`] an `on_change` closure that reaches back into the owning
//! `Debugger` to mutate its instrumentation would need `Rc<RefCell<_>>` ceremony just to
//! satisfy Rust's ownership rules. Instead a variable's setter returns a
//! [`VariableEffect`] describing what the *caller* (the `Debugger`) should do in
//! response; this keeps `Variable<T>` fully self-contained while still letting changing
//! `break_on_parsing` carry a side effect.

use crate::error::DebuggerError;

/// A side effect the `Debugger` must apply after a variable's value actually changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableEffect {
    /// Nothing further to do.
    None,
    /// Re-run uninstall-then-install for submatch parsers (the `break_on_parsing` case).
    ReinstrumentParsers,
}

/// Object-safe view of a [`Variable`], so the debugger can keep a name-indexed table of
/// heterogeneously typed settings.
pub trait AnyVariable {
    fn description(&self) -> &str;
    fn possibilities_display(&self) -> Vec<String>;
    fn value_display(&self) -> String;
    fn set_from_str(&mut self, text: &str) -> Result<VariableEffect, DebuggerError>;
}

/// A named setting drawn from a fixed set of possibilities.
pub struct Variable<T> {
    possibilities: Vec<T>,
    value: T,
    description: String,
    effect: VariableEffect,
    parser: fn(&str) -> Option<T>,
}

impl<T: Clone + PartialEq + ToString> Variable<T> {
    pub fn new(
        possibilities: Vec<T>,
        value: T,
        description: impl Into<String>,
        effect: VariableEffect,
        parser: fn(&str) -> Option<T>,
    ) -> Self {
        Variable { possibilities, value, description: description.into(), effect, parser }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + PartialEq + ToString> AnyVariable for Variable<T> {
    fn description(&self) -> &str {
        &self.description
    }

    fn possibilities_display(&self) -> Vec<String> {
        self.possibilities.iter().map(ToString::to_string).collect()
    }

    fn value_display(&self) -> String {
        self.value.to_string()
    }

    fn set_from_str(&mut self, text: &str) -> Result<VariableEffect, DebuggerError> {
        let parsed = (self.parser)(text).ok_or_else(|| {
            DebuggerError::BadVariableValue(format!(
                "Invalid value {text:?}; must be one of {}",
                self.possibilities_display().join(", ")
            ))
        })?;
        if !self.possibilities.contains(&parsed) {
            return Err(DebuggerError::BadVariableValue(format!(
                "Invalid value {text:?}; must be one of {}",
                self.possibilities_display().join(", ")
            )));
        }
        let changed = parsed != self.value;
        self.value = parsed;
        Ok(if changed { self.effect } else { VariableEffect::None })
    }
}

/// The explicit false-token set for boolean variables, spelled out rather than left to
/// an exact-match parse that would silently treat any unrecognized spelling of "false"
/// as truthy.
const FALSE_TOKENS: &[&str] = &["0", "f", "false", "n", "no", "off"];

fn parse_bool(text: &str) -> Option<bool> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    Some(!FALSE_TOKENS.contains(&lowered.as_str()))
}

/// Construct the `break_on_parsing` boolean variable.
pub fn break_on_parsing_variable(initial: bool) -> Variable<bool> {
    Variable::new(
        vec![true, false],
        initial,
        "Break when a parser is about to be invoked on a submatch and offer to debug it \
         using an external source-level debugger (default=true)",
        VariableEffect::ReinstrumentParsers,
        parse_bool,
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn boolean_parser_recognizes_explicit_false_tokens() {
        for token in FALSE_TOKENS {
            assert_eq!(parse_bool(token), Some(false), "token {token:?} should parse false");
        }
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("anything-else"), Some(true));
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn setting_break_on_parsing_reports_reinstrument_only_on_change() {
        let mut var = break_on_parsing_variable(true);
        assert_eq!(var.set_from_str("true").unwrap(), VariableEffect::None);
        assert_eq!(var.set_from_str("false").unwrap(), VariableEffect::ReinstrumentParsers);
        assert_eq!(var.set_from_str("0").unwrap(), VariableEffect::None);
    }

    #[test]
    fn rejects_values_outside_the_parser_possibilities() {
        let mut var: Variable<u8> =
            Variable::new(vec![1, 2, 3], 1, "small number", VariableEffect::None, |s| s.parse().ok());
        assert!(var.set_from_str("9").is_err());
        assert!(var.set_from_str("2").is_ok());
    }
}
