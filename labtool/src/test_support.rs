//! Test-only helpers: a scripted [`ScriptRunner`] and shell-script fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::interpreter::InterpreterSpec;
use crate::io::invoker::{InvocationRequest, InvocationResult, Invoker, ScriptRunner};

/// Returns queued results in order and records every request it sees.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    results: RefCell<VecDeque<InvocationResult>>,
    requests: RefCell<Vec<InvocationRequest>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<InvocationResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Successful run printing `stdout`.
    pub fn ok(stdout: &str) -> InvocationResult {
        InvocationResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Failed run with the given code and streams.
    pub fn fail(exit_code: i32, stdout: &str, stderr: &str) -> InvocationResult {
        InvocationResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.requests.borrow().clone()
    }

    /// Argument lists of every request, oldest first.
    pub fn args(&self) -> Vec<Vec<String>> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.args.clone())
            .collect()
    }
}

impl ScriptRunner for ScriptedRunner {
    fn run(&self, request: &InvocationRequest) -> InvocationResult {
        self.requests.borrow_mut().push(request.clone());
        self.results
            .borrow_mut()
            .pop_front()
            .expect("scripted runner has no result left for this request")
    }
}

/// Write a script file and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create script dir");
    }
    fs::write(&path, body).expect("write script");
    path
}

/// Runs scripts as `sh <script> <args>...`.
pub fn sh_spec() -> InterpreterSpec {
    InterpreterSpec {
        candidates: vec!["sh".to_string()],
        preamble: Vec::new(),
    }
}

/// Invoker using `sh` from `PATH`.
pub fn sh_invoker() -> Invoker {
    Invoker::new(sh_spec())
}
