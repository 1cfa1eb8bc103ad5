//! The dispatch-table contract a real file-identification engine exposes to the
//! debugger: an explicit `set_interceptor`/`clear_interceptor` table rather than
//! patching a test class's evaluation method in place at runtime.
//!
//! Monkey-patching a class's own method slot isn't available here: instead, the host
//! exposes a registry of instrumentable "test classes" (groups of test nodes that
//! would, in the real engine, share one `test()` implementation) and a single
//! interceptor slot per class. The debugger installs *itself* — one object,
//! `Rc<RefCell<dyn TestInterceptor>>` — into every eligible class's slot.

use std::cell::RefCell;
use std::rc::Rc;

use crate::submatch::{ParseInvocation, Submatch};
use crate::test_tree::{TestArena, TestId, TestResult};

/// Identifies a group of test nodes that share one instrumentable evaluation path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestClassId(pub String);

/// Installed in place of a test class's own evaluation, exactly once per class while the
/// debugger is enabled.
pub trait TestInterceptor {
    /// Called in place of the host's normal dispatch for any node belonging to an
    /// instrumented class. `arena` gives the interceptor everything it needs to call the
    /// node's real evaluator (`arena.borrow().evaluate(id, ..)`) itself: the call into
    /// the real evaluator happens inside the interceptor, not before it, since only the
    /// interceptor can decide whether this is an ad-hoc evaluation that must bypass
    /// snapshot recording.
    ///
    /// The host hands over the shared handle rather than a borrowed `&TestArena`: an
    /// interceptor that opens a nested command loop (as the debugger's `test` command
    /// does) needs its own `borrow_mut()` on the same arena later in the call, and a host
    /// holding a `Ref` open across the whole dispatch would make that panic.
    fn on_test_invoked(
        &mut self,
        arena: &Rc<RefCell<TestArena>>,
        id: TestId,
        data: &[u8],
        absolute_offset: u64,
        parent_match: Option<&TestResult>,
    ) -> Option<TestResult>;
}

/// Installed in place of a format parser's `parse()`, once per MIME while
/// `break_on_parsing` is enabled.
pub trait ParserInterceptor {
    fn on_parse_invoked<'a>(&mut self, invocation: ParseInvocation<'a>) -> Box<dyn Iterator<Item = Submatch> + 'a>;
}

/// The registry a host engine exposes. A production engine would implement this over
/// its real test-class table and parser table; [`crate::mock_host::MockHost`]
/// implements it over the arena-backed fixtures used in this crate's own tests and demo
/// binary.
pub trait HostEngine {
    /// Every test class the engine knows how to instrument.
    fn test_classes(&self) -> Vec<TestClassId>;

    /// Install `interceptor` for `class`, replacing the normal dispatch path.
    fn set_test_interceptor(&mut self, class: &TestClassId, interceptor: Rc<RefCell<dyn TestInterceptor>>);

    /// Remove whatever interceptor is installed for `class`, restoring normal dispatch.
    fn clear_test_interceptor(&mut self, class: &TestClassId);

    /// True if `class` currently has an interceptor installed.
    fn has_test_interceptor(&self, class: &TestClassId) -> bool;

    /// Every MIME type the engine has a registered submatch parser for.
    fn parser_mimes(&self) -> Vec<String>;

    fn set_parser_interceptor(&mut self, mime: &str, interceptor: Rc<RefCell<dyn ParserInterceptor>>);

    fn clear_parser_interceptor(&mut self, mime: &str);

    fn has_parser_interceptor(&self, mime: &str) -> bool;
}
