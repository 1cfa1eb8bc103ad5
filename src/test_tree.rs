//! A minimal, arena-backed stand-in for the external DSL test tree.
//!
//! The real file-identification engine owns a much richer tree of compiled `.mgc`-style
//! rules; parsing those rules, wildcard MIME matching, and offset arithmetic within a
//! test are all out of scope here. What the debugger actually
//! needs is a tree it can walk (ancestors, descendants), annotate with source locations,
//! and mutate transiently for the `test` REPL command — this module provides exactly
//! that, with evaluation delegated to a boxed closure supplied by whoever builds the
//! tree (production code: the real engine; tests: a fixture).

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::offset::Offset;

/// Index of a [`TestNode`] within a [`TestArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestId(pub(crate) usize);

/// Where a test came from in the DSL rule database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub line: u32,
    pub original_line: Option<String>,
}

/// An annotated source comment attached to a test, carried through for display in
/// `write_test` the same way the test's own source line is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub source_info: Option<SourceInfo>,
}

/// The outcome of evaluating a test against a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    /// The test matched. `length` is the number of bytes the match consumed, when known.
    Success { length: Option<usize> },
    /// The test did not match.
    Failure { message: String },
}

impl TestResult {
    pub fn is_match(&self) -> bool {
        matches!(self, TestResult::Success { .. })
    }

    pub fn length(&self) -> Option<usize> {
        match self {
            TestResult::Success { length } => *length,
            TestResult::Failure { .. } => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            TestResult::Failure { message } => Some(message.as_str()),
            TestResult::Success { .. } => None,
        }
    }
}

/// A test node's `test(data, absolute_offset, parent_match)` evaluation, represented as
/// a boxed closure so fixtures can synthesize arbitrary match/fail behavior without a
/// real DSL matcher.
pub type TestFn =
    Arc<dyn Fn(&[u8], u64, Option<&TestResult>) -> Option<TestResult> + Send + Sync>;

/// One node in the DSL test tree.
pub struct TestNode {
    pub level: u32,
    pub offset: Offset,
    pub message: String,
    pub mime: Option<String>,
    pub extensions: BTreeSet<String>,
    pub comments: Vec<Comment>,
    pub source_info: Option<SourceInfo>,
    pub parent: Option<TestId>,
    pub children: Vec<TestId>,
    evaluator: TestFn,
}

impl fmt::Debug for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestNode")
            .field("level", &self.level)
            .field("offset", &self.offset)
            .field("message", &self.message)
            .field("mime", &self.mime)
            .field("extensions", &self.extensions)
            .field("source_info", &self.source_info)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Builder-friendly description of a node, for [`TestArena::add`].
pub struct TestSpec {
    pub level: u32,
    pub offset: Offset,
    pub message: String,
    pub mime: Option<String>,
    pub extensions: BTreeSet<String>,
    pub comments: Vec<Comment>,
    pub source_info: Option<SourceInfo>,
    pub evaluator: TestFn,
}

/// An arena of [`TestNode`]s forming one or more trees.
///
/// Indices are never reused, so a [`TestId`] obtained from a live arena is valid for the
/// arena's lifetime even after other nodes are removed (removal only happens via
/// [`TestArena::remove`], which detaches a node from its parent's `children` list without
/// compacting the vector).
#[derive(Default)]
pub struct TestArena {
    nodes: Vec<Option<TestNode>>,
}

impl TestArena {
    pub fn new() -> Self {
        TestArena { nodes: Vec::new() }
    }

    /// Add a node as a child of `parent` (or as a root, if `None`).
    pub fn add(&mut self, parent: Option<TestId>, spec: TestSpec) -> TestId {
        let id = TestId(self.nodes.len());
        self.nodes.push(Some(TestNode {
            level: spec.level,
            offset: spec.offset,
            message: spec.message,
            mime: spec.mime,
            extensions: spec.extensions,
            comments: spec.comments,
            source_info: spec.source_info,
            parent,
            children: Vec::new(),
            evaluator: spec.evaluator,
        }));
        if let Some(parent_id) = parent {
            self.get_mut(parent_id).children.push(id);
        }
        id
    }

    /// Detach `id` from its parent's `children` list. The node itself remains
    /// addressable (so any already-captured snapshot referencing it by id stays valid),
    /// but it is no longer reachable via tree traversal from its former parent.
    pub fn remove(&mut self, id: TestId) {
        let parent = self.get(id).parent;
        if let Some(parent_id) = parent {
            self.get_mut(parent_id).children.retain(|&c| c != id);
        }
    }

    pub fn get(&self, id: TestId) -> &TestNode {
        let Some(node) = self.nodes[id.0].as_ref() else {
            unreachable!("TestId {id:?} referenced a slot that was never occupied")
        };
        node
    }

    pub fn get_mut(&mut self, id: TestId) -> &mut TestNode {
        let Some(node) = self.nodes[id.0].as_mut() else {
            unreachable!("TestId {id:?} referenced a slot that was never occupied")
        };
        node
    }

    /// Evaluate the test at `id` against `data` at `absolute_offset`, given the parent
    /// match's result (if any).
    pub fn evaluate(
        &self,
        id: TestId,
        data: &[u8],
        absolute_offset: u64,
        parent_match: Option<&TestResult>,
    ) -> Option<TestResult> {
        (self.get(id).evaluator)(data, absolute_offset, parent_match)
    }

    /// MIME strings this test could advertise. Only the test's own `mime` field is
    /// consulted; a multi-MIME test is modeled by a comma-free single string per node.
    pub fn mimetypes(&self, id: TestId) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        if let Some(mime) = &self.get(id).mime {
            set.insert(mime.clone());
        }
        set
    }

    pub fn all_extensions(&self, id: TestId) -> BTreeSet<String> {
        self.get(id).extensions.clone()
    }

    /// Whether this test could ever contribute to the displayed MIME/extension summary
    /// (i.e. whether the Where Renderer should show it among a focus test's
    /// descendants). A test "can match mime" if it advertises a MIME or extension, or if
    /// any descendant can.
    pub fn can_match_mime(&self, id: TestId) -> bool {
        let node = self.get(id);
        if node.mime.is_some() || !node.extensions.is_empty() {
            return true;
        }
        node.children.iter().any(|&child| self.can_match_mime(child))
    }

    /// The chain from `id` up to (and including) the root, nearest-first.
    pub fn ancestors(&self, id: TestId) -> Vec<TestId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.get(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Descendants of `id` in depth-first pre-order, restricted to those for which
    /// [`TestArena::can_match_mime`] holds.
    pub fn matchable_descendants(&self, id: TestId) -> Vec<TestId> {
        let mut out = Vec::new();
        let mut stack: Vec<TestId> = self.get(id).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.can_match_mime(next) {
                out.push(next);
                for &child in self.get(next).children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }
}
