//! End-to-end scenarios driven through `Debugger::new_handle` and `MockHost` with
//! scripted stdin/stdout, so a stop, a command, and a resume can be exercised without a
//! real terminal attached.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use magicdbg::debugger::{Debugger, DebuggerSession};
use magicdbg::host::{HostEngine, TestClassId};
use magicdbg::mock_host::MockHost;
use magicdbg::offset::Offset;
use magicdbg::submatch::{NullSourceDebugger, StaticMatch, Submatch};
use magicdbg::test_tree::{Comment, SourceInfo, TestArena, TestId, TestResult, TestSpec};

/// A two-node tree: a root PDF test and a ZIP-extension child that fails against
/// PDF-shaped input, wired up the way a real engine would register test classes.
fn build_fixture() -> (Rc<RefCell<TestArena>>, TestId, TestId) {
    let mut arena = TestArena::new();
    let pdf_root = arena.add(
        None,
        TestSpec {
            level: 0,
            offset: Offset::Absolute(0),
            message: "PDF document".to_string(),
            mime: Some("application/pdf".to_string()),
            extensions: ["pdf"].into_iter().map(str::to_string).collect::<BTreeSet<_>>(),
            comments: vec![Comment { text: "PDF signature".to_string(), source_info: None }],
            source_info: Some(SourceInfo { path: PathBuf::from("/etc/archive"), line: 525, original_line: None }),
            evaluator: Arc::new(|data, offset, _parent| {
                let start = offset as usize;
                if data.get(start..start + 4) == Some(b"%PDF".as_slice()) {
                    Some(TestResult::Success { length: Some(4) })
                } else {
                    Some(TestResult::Failure { message: "PDF signature not found".to_string() })
                }
            }),
        },
    );
    let zip_child = arena.add(
        Some(pdf_root),
        TestSpec {
            level: 1,
            offset: Offset::Absolute(0),
            message: "ZIP extension probe".to_string(),
            mime: None,
            extensions: ["zip"].into_iter().map(str::to_string).collect::<BTreeSet<_>>(),
            comments: Vec::new(),
            source_info: Some(SourceInfo { path: PathBuf::from("/etc/archive"), line: 530, original_line: None }),
            evaluator: Arc::new(|data, offset, _parent| {
                let start = offset as usize;
                if data.get(start..start + 3) == Some(b"PK\x03".as_slice()) {
                    Some(TestResult::Success { length: Some(3) })
                } else {
                    Some(TestResult::Failure { message: "ZIP signature not found".to_string() })
                }
            }),
        },
    );
    (Rc::new(RefCell::new(arena)), pdf_root, zip_child)
}

/// Takes the shared handle rather than a borrowed `&MockHost`, for the same reason the
/// production fixture walker in `main.rs` does: a command typed in a REPL opened
/// mid-traversal may take its own `borrow_mut()` on this same host, which a `Ref` held
/// open across the whole recursion would turn into a panic.
fn run_tree(mock: &Rc<RefCell<MockHost>>, id: TestId, data: &[u8], parent_match: Option<TestResult>) -> TestResult {
    let result = mock.borrow().invoke_test(id, data, 0, parent_match.as_ref());
    let children = mock.borrow().arena_handle().borrow().get(id).children.clone();
    for child in children {
        run_tree(mock, child, data, result.clone());
    }
    result.unwrap_or(TestResult::Failure { message: "no result".to_string() })
}

/// Scenario 1: MIME breakpoint round-trip.
#[test]
fn mime_breakpoint_stops_on_first_matching_test_and_where_lists_it() {
    // `zip_child` is left unregistered so it evaluates directly through the arena after
    // the stop below and never overwrites the snapshot the assertions check.
    let (arena, pdf_root, _zip_child) = build_fixture();
    let mut mock = MockHost::new(Rc::clone(&arena));
    mock.register_class(TestClassId("pdf".to_string()), pdf_root);
    let mock = Rc::new(RefCell::new(mock));

    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();
    let home = std::env::temp_dir().join(format!("magicdbg-e2e-mime-{}", std::process::id()));
    // `b MIME:application/pdf` has already been typed in an earlier stop in the real
    // console; here it is installed up front so the tree run below is the one that hits
    // it, and the script only covers the commands issued once stopped there.
    let script = b"where\ncontinue\n" as &[u8];
    let reader: Box<dyn std::io::BufRead> = Box::new(Cursor::new(script));
    let writer: Box<dyn std::io::Write> = Box::new(Vec::new());
    let debugger = Debugger::new_handle(arena, host, Box::new(NullSourceDebugger), false, &home, reader, writer);
    debugger.borrow_mut().breakpoints_mut().push(magicdbg::Breakpoint::parse("MIME:application/pdf").expect("valid"));

    let _session = DebuggerSession::enter(Rc::clone(&debugger));
    run_tree(&mock, pdf_root, b"%PDF-1.4", None);

    let snap = debugger.borrow().snapshot();
    assert_eq!(snap.last_test, Some(pdf_root));
    assert!(snap.last_result.as_ref().is_some_and(TestResult::is_match));
    assert_eq!(debugger.borrow().breakpoints().len(), 1);
}

/// Scenario 1 (REPL abbreviation): typing the single-letter `b` at a stop must resolve
/// to `breakpoint`, not `backtrace` — a token this short is also a prefix of
/// `backtrace`, and the canonical-name table must list `breakpoint` first so the
/// argument after `b` is parsed as a breakpoint spec rather than silently dropped as a
/// `where` invocation with no effect.
#[test]
fn repl_b_abbreviation_adds_a_breakpoint_rather_than_invoking_backtrace() {
    let (arena, pdf_root, _zip_child) = build_fixture();
    let mut mock = MockHost::new(Rc::clone(&arena));
    mock.register_class(TestClassId("pdf".to_string()), pdf_root);
    let mock = Rc::new(RefCell::new(mock));

    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();
    let home = std::env::temp_dir().join(format!("magicdbg-e2e-b-abbrev-{}", std::process::id()));
    let script = b"b MIME:application/pdf\ncontinue\n" as &[u8];
    let reader: Box<dyn std::io::BufRead> = Box::new(Cursor::new(script));
    let writer: Box<dyn std::io::Write> = Box::new(Vec::new());
    let debugger = Debugger::new_handle(arena, host, Box::new(NullSourceDebugger), false, &home, reader, writer);
    debugger.borrow_mut().step_controller_mut().set_single_stepping();

    let _session = DebuggerSession::enter(Rc::clone(&debugger));
    run_tree(&mock, pdf_root, b"%PDF-1.4", None);

    let breakpoints = debugger.borrow().breakpoints().to_vec();
    assert_eq!(breakpoints.len(), 1);
    assert_eq!(breakpoints[0], magicdbg::Breakpoint::parse("MIME:application/pdf").expect("valid"));
}

/// Scenario 2: a `!ext:zip` breakpoint opens on the first failed ZIP-extension test,
/// and never on a matched one.
#[test]
fn failed_only_breakpoint_does_not_open_on_a_successful_match() {
    let (arena, pdf_root, zip_child) = build_fixture();
    let mut mock = MockHost::new(Rc::clone(&arena));
    let class = TestClassId("pdf".to_string());
    mock.register_class(class.clone(), pdf_root);
    mock.register_class(class, zip_child);
    let mock = Rc::new(RefCell::new(mock));

    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();
    let home = std::env::temp_dir().join(format!("magicdbg-e2e-failzip-{}", std::process::id()));
    // Nothing is typed at the stop; EOF resumes immediately, so this only checks
    // whether the REPL opened at all by inspecting last_test afterward.
    let reader: Box<dyn std::io::BufRead> = Box::new(Cursor::new(b"" as &[u8]));
    let writer: Box<dyn std::io::Write> = Box::new(Vec::new());
    let debugger = Debugger::new_handle(arena, host, Box::new(NullSourceDebugger), false, &home, reader, writer);
    debugger.borrow_mut().breakpoints_mut().push(magicdbg::Breakpoint::parse("!ext:zip").expect("valid"));

    let _session = DebuggerSession::enter(Rc::clone(&debugger));
    // A ZIP signature that is not present: the PDF root fails, the ZIP child also fails.
    run_tree(&mock, pdf_root, b"not a zip at all!", None);

    // The failed ZIP-extension test is the one that stops, not the (also failing) root,
    // since the root carries no `ext` annotation at all.
    assert_eq!(debugger.borrow().snapshot().last_test, Some(zip_child));
    assert!(!debugger.borrow().snapshot().last_result.as_ref().is_some_and(TestResult::is_match));
}

/// Scenario 3: file breakpoint by basename and by full path.
#[test]
fn file_breakpoint_matches_by_basename_and_full_path() {
    let (arena, pdf_root, _zip_child) = build_fixture();
    let node = arena.borrow();
    let bp_basename = magicdbg::Breakpoint::parse("archive:525").expect("valid");
    let bp_full = magicdbg::Breakpoint::parse("/etc/archive:525").expect("valid");
    let bp_wrong_line = magicdbg::Breakpoint::parse("/etc/archive:524").expect("valid");
    let ctx = magicdbg::BreakContext { arena: &node, test: pdf_root, result: None };
    assert!(bp_basename.should_break(&ctx));
    assert!(bp_full.should_break(&ctx));
    assert!(!bp_wrong_line.should_break(&ctx));
}

/// Scenario 4: an ad-hoc `test` command leaves the live snapshot untouched.
#[test]
fn ad_hoc_test_does_not_contaminate_the_live_snapshot() {
    // Only `pdf_root` is registered to an instrumented class, so the (also present)
    // `zip_child` evaluates directly through the arena and never touches the snapshot —
    // isolating the assertion below to what the `test` command did at the one real stop.
    let (arena, pdf_root, _zip_child) = build_fixture();
    let mut mock = MockHost::new(Rc::clone(&arena));
    mock.register_class(TestClassId("pdf".to_string()), pdf_root);
    let mock = Rc::new(RefCell::new(mock));

    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();
    let home = std::env::temp_dir().join(format!("magicdbg-e2e-adhoc-{}", std::process::id()));
    let script = b"test 0 string PK\\x03\\x04 ZIP header\ncontinue\n" as &[u8];
    let reader: Box<dyn std::io::BufRead> = Box::new(Cursor::new(script));
    let writer: Box<dyn std::io::Write> = Box::new(Vec::new());
    let debugger = Debugger::new_handle(arena, host, Box::new(NullSourceDebugger), false, &home, reader, writer);
    debugger.borrow_mut().step_controller_mut().set_single_stepping();

    let _session = DebuggerSession::enter(Rc::clone(&debugger));
    run_tree(&mock, pdf_root, b"%PDF-1.4", None);

    let snap = debugger.borrow().snapshot();
    assert_eq!(snap.last_test, Some(pdf_root));
    assert_eq!(snap.last_result, Some(TestResult::Success { length: Some(4) }));
}

/// Scenario 5: `print` resolves an indirect offset and reports an error for an
/// unresolvable one, without mutating the snapshot either way.
#[test]
fn print_resolves_offset_and_reports_invalid_offset_as_an_error() {
    let (arena, pdf_root, _zip_child) = build_fixture();
    let mut mock = MockHost::new(Rc::clone(&arena));
    mock.register_class(TestClassId("pdf".to_string()), pdf_root);
    let mock = Rc::new(RefCell::new(mock));

    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();
    let home = std::env::temp_dir().join(format!("magicdbg-e2e-print-{}", std::process::id()));
    let reader: Box<dyn std::io::BufRead> = Box::new(Cursor::new(b"" as &[u8]));
    let writer: Box<dyn std::io::Write> = Box::new(Vec::new());
    let debugger = Debugger::new_handle(arena, host, Box::new(NullSourceDebugger), false, &home, reader, writer);

    let _session = DebuggerSession::enter(Rc::clone(&debugger));
    run_tree(&mock, pdf_root, b"%PDF-1.4 plus trailing bytes here", None);

    let mut out = Vec::new();
    debugger.borrow_mut().print_offset("10", &mut out).expect("resolves a literal offset");
    assert!(String::from_utf8_lossy(&out).contains("10 = 10"));

    let before = debugger.borrow().snapshot();
    let err = debugger.borrow_mut().print_offset("&999999.q", &mut Vec::new());
    assert!(matches!(err, Err(magicdbg::DebuggerError::InvalidOffset(_))));
    let after = debugger.borrow().snapshot();
    assert_eq!(before.last_test, after.last_test);
    assert_eq!(before.last_result, after.last_result);
}

/// Scenario 6: toggling `break_on_parsing` removes and reinstalls parser hooks while
/// test hooks and `enabled()` are untouched.
#[test]
fn toggling_break_on_parsing_reinstruments_parsers_only() {
    let (arena, pdf_root, zip_child) = build_fixture();
    let mut mock = MockHost::new(Rc::clone(&arena));
    let class = TestClassId("pdf".to_string());
    mock.register_class(class.clone(), pdf_root);
    mock.register_class(class.clone(), zip_child);
    mock.register_parser_mime("application/pdf");
    let mock = Rc::new(RefCell::new(mock));

    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();
    let home = std::env::temp_dir().join(format!("magicdbg-e2e-toggle-{}", std::process::id()));
    let reader: Box<dyn std::io::BufRead> = Box::new(Cursor::new(b"" as &[u8]));
    let writer: Box<dyn std::io::Write> = Box::new(Vec::new());
    let debugger = Debugger::new_handle(arena, host, Box::new(NullSourceDebugger), false, &home, reader, writer);

    let _session = DebuggerSession::enter(Rc::clone(&debugger));
    assert!(debugger.borrow().enabled());
    assert!(mock.borrow().has_parser_interceptor("application/pdf"));
    assert!(mock.borrow().has_test_interceptor(&class));

    debugger.borrow_mut().set_variable("break_on_parsing", "false").expect("valid toggle");
    assert!(debugger.borrow().enabled());
    assert!(!mock.borrow().has_parser_interceptor("application/pdf"));
    assert!(mock.borrow().has_test_interceptor(&class));

    debugger.borrow_mut().set_variable("break_on_parsing", "true").expect("valid toggle");
    assert!(debugger.borrow().enabled());
    assert!(mock.borrow().has_parser_interceptor("application/pdf"));
}

/// Scenario 6 (submatch driver, declining the external debugger): invoking a registered
/// parser through the installed `ParserInterceptor` must yield the real submatches the
/// parser produced, not an empty sequence — `ParseInvocation` carries the parser's own
/// lazy iterator end to end, and declining the external debugger prompt passes it
/// through untouched.
#[test]
fn parser_hook_forwards_the_real_submatches_when_debugger_is_declined() {
    let (arena, pdf_root, _zip_child) = build_fixture();
    let mut mock = MockHost::new(Rc::clone(&arena));
    mock.register_class(TestClassId("pdf".to_string()), pdf_root);
    let produced = vec![
        Submatch { description: "object 1".to_string(), fields: Vec::new() },
        Submatch { description: "object 2".to_string(), fields: Vec::new() },
    ];
    mock.register_parser(
        "application/pdf",
        StaticMatch { source: "input.pdf".to_string(), offset: 0, fields: Vec::new() },
        produced.clone(),
    );
    let mock = Rc::new(RefCell::new(mock));

    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();
    let home = std::env::temp_dir().join(format!("magicdbg-e2e-submatch-{}", std::process::id()));
    // Declines the "Debug using an external debugger?" prompt (default is already No).
    let reader: Box<dyn std::io::BufRead> = Box::new(Cursor::new(b"\n" as &[u8]));
    let writer: Box<dyn std::io::Write> = Box::new(Vec::new());
    let debugger = Debugger::new_handle(arena, host, Box::new(NullSourceDebugger), false, &home, reader, writer);

    let _session = DebuggerSession::enter(Rc::clone(&debugger));
    let yielded = mock.borrow().invoke_parse("application/pdf");

    assert_eq!(yielded, produced);
}
