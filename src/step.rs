//! The Step Controller: a three-state mode machine deciding when a test's result alone
//! (independent of breakpoints) should stop the REPL.

use crate::test_tree::TestResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Running,
    SingleStepping,
    Next,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepController {
    mode: StepMode,
}

impl Default for StepMode {
    fn default() -> Self {
        StepMode::Running
    }
}

impl StepController {
    pub fn new() -> Self {
        StepController { mode: StepMode::Running }
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    pub fn set_running(&mut self) {
        self.mode = StepMode::Running;
    }

    pub fn set_single_stepping(&mut self) {
        self.mode = StepMode::SingleStepping;
    }

    pub fn set_next(&mut self) {
        self.mode = StepMode::Next;
    }

    /// Whether the step mode alone (ignoring breakpoints) demands a stop for this result.
    pub fn should_break_on_step(&self, result: Option<&TestResult>) -> bool {
        match self.mode {
            StepMode::SingleStepping => true,
            StepMode::Next => matches!(result, Some(r) if r.is_match()),
            StepMode::Running => false,
        }
    }
}
