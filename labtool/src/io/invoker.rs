//! External script invocation.
//!
//! [`Invoker::invoke`] is the single boundary between LabTool and the scripts
//! it drives. It never fails: every problem (missing interpreter, staging
//! error, spawn failure, timeout) comes back as an [`InvocationResult`] with
//! exit code [`WRAPPER_FAILURE`] and the reason in `stderr`. Callers decide
//! whether a nonzero code is an error.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::io::config::LabtoolConfig;
use crate::io::interpreter::{InterpreterSpec, Lookup, PathLookup, resolve_interpreter};
use crate::io::process::run_with_timeout;
use crate::io::staging::{ScriptSource, stage_script};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Exit code reported when the wrapper itself failed before or around the child.
pub const WRAPPER_FAILURE: i32 = 1;

/// Why an invocation did not produce a child exit code.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no script interpreter found on PATH (tried {})", .candidates.join(", "))]
    InterpreterNotFound { candidates: Vec<String> },

    #[error("Timeout: script exceeded {}s", format_secs(.timeout))]
    Timeout { timeout: Duration },

    #[error("stage script {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:#}")]
    Process(anyhow::Error),
}

fn format_secs(d: &Duration) -> String {
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.3}", d.as_secs_f64())
    }
}

/// One script run: what to execute and under which conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub script: ScriptSource,
    /// Passed to the script verbatim, one token each.
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,
    /// Applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Falls back to the invoker's default when `None`.
    pub timeout: Option<Duration>,
}

impl InvocationRequest {
    pub fn new(script: impl Into<ScriptSource>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Normalized outcome of an invocation. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl InvocationResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best human-readable explanation: stderr, then stdout, then the code.
    pub fn failure_message(&self) -> String {
        if !self.stderr.is_empty() {
            self.stderr.clone()
        } else if !self.stdout.is_empty() {
            self.stdout.clone()
        } else {
            format!("exit code {}", self.exit_code)
        }
    }

    pub fn into_parts(self) -> (String, String, i32) {
        (self.stdout, self.stderr, self.exit_code)
    }
}

impl From<InvokeError> for InvocationResult {
    fn from(err: InvokeError) -> Self {
        Self {
            stdout: String::new(),
            stderr: err.to_string(),
            exit_code: WRAPPER_FAILURE,
        }
    }
}

/// Anything that can run a script request. Actions depend on this, not on
/// [`Invoker`], so they can be exercised without spawning processes.
pub trait ScriptRunner {
    fn run(&self, request: &InvocationRequest) -> InvocationResult;
}

/// Runs scripts through the first available interpreter.
pub struct Invoker {
    interpreter: InterpreterSpec,
    lookup: Box<dyn Lookup + Send + Sync>,
    bundle_dir: Option<PathBuf>,
    default_timeout: Duration,
    output_limit_bytes: usize,
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("interpreter", &self.interpreter)
            .field("bundle_dir", &self.bundle_dir)
            .field("default_timeout", &self.default_timeout)
            .field("output_limit_bytes", &self.output_limit_bytes)
            .finish_non_exhaustive()
    }
}

impl Invoker {
    /// Invoker searching the process `PATH` with library defaults.
    pub fn new(interpreter: InterpreterSpec) -> Self {
        Self {
            interpreter,
            lookup: Box::new(PathLookup::from_env()),
            bundle_dir: None,
            default_timeout: DEFAULT_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn from_config(config: &LabtoolConfig) -> Self {
        Self::new(config.interpreter.to_spec())
            .with_bundle_dir(config.bundle_dir.clone())
            .with_default_timeout(Duration::from_secs(config.timeout_secs))
            .with_output_limit(config.output_limit_bytes)
    }

    pub fn with_lookup(mut self, lookup: impl Lookup + Send + Sync + 'static) -> Self {
        self.lookup = Box::new(lookup);
        self
    }

    pub fn with_bundle_dir(mut self, bundle_dir: Option<PathBuf>) -> Self {
        self.bundle_dir = bundle_dir;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    /// The interpreter the next invocation would use.
    pub fn resolve(&self) -> Result<PathBuf, InvokeError> {
        resolve_interpreter(&self.interpreter.candidates, self.lookup.as_ref())
    }

    /// Run `request` and normalize whatever happens into a result.
    #[instrument(skip_all, fields(script = %request.script.label()))]
    pub fn invoke(&self, request: &InvocationRequest) -> InvocationResult {
        match self.try_invoke(request) {
            Ok(result) => result,
            Err(err) => {
                match &err {
                    InvokeError::Timeout { .. } => error!(err = %err, "script timed out"),
                    _ => error!(err = %err, "script invocation failed"),
                }
                err.into()
            }
        }
    }

    fn try_invoke(&self, request: &InvocationRequest) -> Result<InvocationResult, InvokeError> {
        let interpreter = self.resolve()?;
        // Held until the child is gone; dropping it removes any staged copy.
        let staged = stage_script(&request.script, self.bundle_dir.as_deref())?;
        let argv = self.command_line(&interpreter, staged.path(), &request.args);
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).envs(&request.env);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }

        debug!(command = ?argv, cwd = ?request.cwd, "running script");
        let start = Instant::now();
        let output =
            run_with_timeout(cmd, timeout, self.output_limit_bytes).map_err(InvokeError::Process)?;
        let elapsed = start.elapsed();

        if output.timed_out {
            debug!(elapsed_secs = elapsed.as_secs_f64(), "script killed after timeout");
            return Err(InvokeError::Timeout { timeout });
        }

        let stdout = output.stdout_text();
        let mut stderr = output.stderr_text();
        let exit_code = match output.status.code() {
            Some(code) => code,
            None => {
                if stderr.is_empty() {
                    stderr = format!("script terminated without an exit code ({})", output.status);
                }
                WRAPPER_FAILURE
            }
        };

        debug!(
            elapsed_secs = elapsed.as_secs_f64(),
            exit_code,
            "script finished"
        );
        Ok(InvocationResult {
            stdout,
            stderr,
            exit_code,
        })
    }

    /// Full argv: interpreter, preamble, script, then the script arguments.
    pub fn command_line(&self, interpreter: &Path, script: &Path, args: &[String]) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(2 + self.interpreter.preamble.len() + args.len());
        argv.push(interpreter.as_os_str().to_os_string());
        argv.extend(self.interpreter.preamble.iter().map(OsString::from));
        argv.push(script.as_os_str().to_os_string());
        argv.extend(args.iter().map(OsString::from));
        argv
    }
}

impl ScriptRunner for Invoker {
    fn run(&self, request: &InvocationRequest) -> InvocationResult {
        self.invoke(request)
    }
}
