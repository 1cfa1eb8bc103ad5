//! An in-memory [`HostEngine`] backed by a [`TestArena`], used by this crate's own tests
//! and by the demo binary. Not part of the contract a real engine must satisfy — only
//! `HostEngine` is.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::host::{HostEngine, ParserInterceptor, TestClassId, TestInterceptor};
use crate::submatch::{ParseInvocation, StaticMatch, Submatch};
use crate::test_tree::{TestArena, TestId, TestResult};

/// Fixture-time registration: which class a node belongs to, and which MIME (if any) a
/// parser is registered for.
pub struct MockHost {
    arena: Rc<RefCell<TestArena>>,
    classes: HashMap<TestClassId, Vec<TestId>>,
    class_of: HashMap<TestId, TestClassId>,
    test_interceptors: HashMap<TestClassId, Rc<RefCell<dyn TestInterceptor>>>,
    parser_mimes: Vec<String>,
    parser_interceptors: HashMap<String, Rc<RefCell<dyn ParserInterceptor>>>,
    parsers: HashMap<String, (StaticMatch, Vec<Submatch>)>,
}

impl MockHost {
    pub fn new(arena: Rc<RefCell<TestArena>>) -> Self {
        MockHost {
            arena,
            classes: HashMap::new(),
            class_of: HashMap::new(),
            test_interceptors: HashMap::new(),
            parser_mimes: Vec::new(),
            parser_interceptors: HashMap::new(),
            parsers: HashMap::new(),
        }
    }

    /// Share this host's arena handle, e.g. with a [`crate::debugger::Debugger`] that
    /// needs to mutate the same tree for ad-hoc `test` evaluation.
    pub fn arena_handle(&self) -> Rc<RefCell<TestArena>> {
        Rc::clone(&self.arena)
    }

    /// Register `id` as belonging to `class`, so an interceptor installed on that class
    /// fires for this node. One node belongs to exactly one class.
    pub fn register_class(&mut self, class: TestClassId, id: TestId) {
        self.classes.entry(class.clone()).or_default().push(id);
        self.class_of.insert(id, class);
    }

    pub fn register_parser_mime(&mut self, mime: impl Into<String>) {
        self.parser_mimes.push(mime.into());
    }

    /// Register the lazy submatch sequence a format parser produces for `mime`, so
    /// [`MockHost::invoke_parse`] has something real to hand an installed
    /// `ParserInterceptor`. Also registers `mime` as instrumentable, the way
    /// `register_parser_mime` alone does.
    pub fn register_parser(&mut self, mime: impl Into<String>, matched: StaticMatch, submatches: Vec<Submatch>) {
        let mime = mime.into();
        self.register_parser_mime(mime.clone());
        self.parsers.insert(mime, (matched, submatches));
    }

    /// Simulate the host engine invoking the format parser registered for `mime`,
    /// dispatching through whatever interceptor (if any) is installed for it. Returns
    /// the submatches actually produced — a real engine would consume these lazily, one
    /// at a time, but a `Vec` is enough to exercise the driver end to end here.
    pub fn invoke_parse(&self, mime: &str) -> Vec<Submatch> {
        let Some((matched, submatches)) = self.parsers.get(mime) else {
            return Vec::new();
        };
        match self.parser_interceptors.get(mime) {
            Some(interceptor) => {
                let invocation =
                    ParseInvocation { mime, matched, original: Box::new(submatches.clone().into_iter()) };
                interceptor.borrow_mut().on_parse_invoked(invocation).collect()
            }
            None => submatches.clone(),
        }
    }

    /// Simulate the host engine invoking the test at `id`, dispatching through whatever
    /// interceptor (if any) is installed for its class. This is a fixture helper, not
    /// part of `HostEngine` — a real engine drives its own traversal and offset/recursion
    /// policy, which is out of scope here.
    pub fn invoke_test(
        &self,
        id: TestId,
        data: &[u8],
        absolute_offset: u64,
        parent_match: Option<&TestResult>,
    ) -> Option<TestResult> {
        match self.class_of.get(&id).and_then(|class| self.test_interceptors.get(class)) {
            Some(interceptor) => {
                interceptor.borrow_mut().on_test_invoked(&self.arena, id, data, absolute_offset, parent_match)
            }
            None => self.arena.borrow().evaluate(id, data, absolute_offset, parent_match),
        }
    }
}

impl HostEngine for MockHost {
    fn test_classes(&self) -> Vec<TestClassId> {
        self.classes.keys().cloned().collect()
    }

    fn set_test_interceptor(&mut self, class: &TestClassId, interceptor: Rc<RefCell<dyn TestInterceptor>>) {
        self.test_interceptors.insert(class.clone(), interceptor);
    }

    fn clear_test_interceptor(&mut self, class: &TestClassId) {
        self.test_interceptors.remove(class);
    }

    fn has_test_interceptor(&self, class: &TestClassId) -> bool {
        self.test_interceptors.contains_key(class)
    }

    fn parser_mimes(&self) -> Vec<String> {
        self.parser_mimes.clone()
    }

    fn set_parser_interceptor(&mut self, mime: &str, interceptor: Rc<RefCell<dyn ParserInterceptor>>) {
        self.parser_interceptors.insert(mime.to_string(), interceptor);
    }

    fn clear_parser_interceptor(&mut self, mime: &str) {
        self.parser_interceptors.remove(mime);
    }

    fn has_parser_interceptor(&self, mime: &str) -> bool {
        self.parser_interceptors.contains_key(mime)
    }
}
