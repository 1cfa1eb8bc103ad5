//! Demo binary: wires a tiny fixture test tree behind [`MockHost`], enables the
//! debugger, and runs it over an input file (or a built-in ZIP-header sample).

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use magicdbg::debugger::{Debugger, DebuggerSession};
use magicdbg::host::{HostEngine, TestClassId};
use magicdbg::mock_host::MockHost;
use magicdbg::offset::Offset;
use magicdbg::submatch::NullSourceDebugger;
use magicdbg::test_tree::{SourceInfo, TestArena, TestId, TestResult, TestSpec};

#[derive(Parser, Debug)]
#[command(name = "magicdbg", about = "Interactive debugger for a libmagic-style file-identification engine")]
struct Args {
    /// File to run the fixture test tree against; defaults to a built-in ZIP sample.
    input: Option<PathBuf>,

    /// Disable break_on_parsing by default (equivalent to declining every
    /// submatch-parser handoff up front).
    #[arg(long)]
    no_debug_parsing: bool,

    /// tracing log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let data = match &args.input {
        Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => b"PK\x03\x04\x14\x00\x00\x00\x08\x00".to_vec(),
    };

    let (tree, root) = build_fixture_tree();
    let arena = Rc::new(RefCell::new(tree));

    let mut mock = MockHost::new(Rc::clone(&arena));
    register_fixture_classes(&mut mock, &arena, root);
    let mock = Rc::new(RefCell::new(mock));
    let host: Rc<RefCell<dyn HostEngine>> = mock.clone();

    let home = home_dir();
    let stdin = Box::new(io::BufReader::new(io::stdin()));
    let stdout = Box::new(io::stdout());
    let use_ansi = io::stdout().is_terminal();

    let debugger = Debugger::new_handle(
        Rc::clone(&arena),
        host,
        Box::new(NullSourceDebugger),
        use_ansi,
        &home,
        stdin,
        stdout,
    );
    if args.no_debug_parsing {
        debugger.borrow_mut().set_variable("break_on_parsing", "false").ok();
    }

    let session = DebuggerSession::enter(Rc::clone(&debugger));
    info!(bytes = data.len(), "running fixture test tree");

    run_node(&mock, root, &data, 0, None);

    drop(session);
    Ok(())
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(std::env::temp_dir)
}

/// Walks the fixture tree depth-first, invoking each node through the host (so
/// installed interceptors fire) and recursing into children regardless of the parent's
/// own result — a simplification of the real engine's recursion policy, which is out of
/// scope here.
///
/// Takes the shared handle rather than a borrowed `&MockHost`: an interceptor invoked
/// mid-traversal may open a nested REPL loop, and a command typed there (`set
/// break_on_parsing false`) takes its own `borrow_mut()` on this same host. Re-borrowing
/// fresh at each level, instead of holding one `Ref` open across the whole recursion,
/// keeps that call from panicking.
fn run_node(mock: &Rc<RefCell<MockHost>>, id: TestId, data: &[u8], absolute_offset: u64, parent_match: Option<TestResult>) {
    let result = mock.borrow().invoke_test(id, data, absolute_offset, parent_match.as_ref());
    let children = mock.borrow().arena_handle().borrow().get(id).children.clone();
    for child in children {
        run_node(mock, child, data, absolute_offset, result.clone());
    }
}

fn build_fixture_tree() -> (TestArena, TestId) {
    let mut arena = TestArena::new();
    let root = arena.add(
        None,
        TestSpec {
            level: 0,
            offset: Offset::Absolute(0),
            message: "ZIP local file header".to_string(),
            mime: Some("application/zip".to_string()),
            extensions: ["zip"].into_iter().map(str::to_string).collect::<BTreeSet<_>>(),
            comments: Vec::new(),
            source_info: Some(SourceInfo { path: "fixtures/zip.magic".into(), line: 1, original_line: None }),
            evaluator: Arc::new(|data, offset, _parent| {
                let start = offset as usize;
                if data.get(start..start + 4) == Some(b"PK\x03\x04".as_slice()) {
                    Some(TestResult::Success { length: Some(4) })
                } else {
                    Some(TestResult::Failure { message: "ZIP signature not found".to_string() })
                }
            }),
        },
    );
    arena.add(
        Some(root),
        TestSpec {
            level: 1,
            offset: Offset::parse("&>.b").unwrap_or(Offset::Absolute(4)),
            message: "ZIP general purpose flag".to_string(),
            mime: Some("application/zip".to_string()),
            extensions: BTreeSet::new(),
            comments: Vec::new(),
            source_info: Some(SourceInfo { path: "fixtures/zip.magic".into(), line: 2, original_line: None }),
            evaluator: Arc::new(|_data, _offset, _parent| Some(TestResult::Success { length: Some(1) })),
        },
    );
    (arena, root)
}

fn register_fixture_classes(host: &mut MockHost, arena: &Rc<RefCell<TestArena>>, root: TestId) {
    let class = TestClassId("zip".to_string());
    host.register_class(class.clone(), root);
    for child in arena.borrow().get(root).children.clone() {
        host.register_class(class.clone(), child);
    }
    host.register_parser_mime("application/zip");
}
