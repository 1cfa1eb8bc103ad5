//! The context snapshot and its `save_context` scoped-restore guard.
//!
//! `save_context` returns a `Drop` guard that captures every named field on
//! construction and restores them when dropped, on every exit path including
//! unwinding, with no explicit "restore on every return" bookkeeping needed at the call
//! site. The snapshot itself lives behind `Rc<RefCell<_>>` so the guard can hold a cheap
//! handle to it rather than an exclusive borrow, leaving the rest of the `Debugger` free
//! to be used while a `test` command's ad-hoc mutation is in scope.

use std::cell::RefCell;
use std::rc::Rc;

use crate::offset::Offset;
use crate::test_tree::{TestId, TestResult};

/// A tag distinguishing a real, recorded test invocation from an ad-hoc one run by the
/// REPL's `test` command, which must be evaluated without contaminating the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplTestTag {
    None,
    Ephemeral(TestId),
}

impl Default for ReplTestTag {
    fn default() -> Self {
        ReplTestTag::None
    }
}

/// Everything `where`, `test`, and `print` need to know about the most recent test
/// invocation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub data: Vec<u8>,
    pub last_test: Option<TestId>,
    pub last_offset: Option<Offset>,
    pub last_absolute_offset: Option<u64>,
    pub last_parent_match: Option<TestResult>,
    pub last_result: Option<TestResult>,
    pub last_command: Option<String>,
    pub repl_test: ReplTestTag,
}

impl Snapshot {
    pub fn has_run_a_test(&self) -> bool {
        self.last_test.is_some()
    }
}

/// Shared handle to the Debugger's live snapshot.
#[derive(Clone, Default)]
pub struct SnapshotCell(Rc<RefCell<Snapshot>>);

impl SnapshotCell {
    pub fn new(snapshot: Snapshot) -> Self {
        SnapshotCell(Rc::new(RefCell::new(snapshot)))
    }

    pub fn get(&self) -> Snapshot {
        self.0.borrow().clone()
    }

    pub fn set(&self, snapshot: Snapshot) {
        *self.0.borrow_mut() = snapshot;
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Capture the current snapshot; releasing the returned guard restores it verbatim.
    pub fn save_context(&self) -> SnapshotGuard {
        SnapshotGuard { cell: self.clone(), saved: Some(self.get()) }
    }
}

/// RAII guard restoring the snapshot captured at construction, on drop.
pub struct SnapshotGuard {
    cell: SnapshotCell,
    saved: Option<Snapshot>,
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.cell.set(saved);
        }
    }
}
