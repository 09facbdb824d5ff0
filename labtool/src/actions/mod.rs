//! Operator actions.
//!
//! Each action gathers its inputs up front, runs zero or more scripts through
//! a [`ScriptRunner`], and returns a short success message. A nonzero script
//! exit code becomes an `Err`, which the dispatcher reports once.

pub mod folders;
pub mod shortcuts;
pub mod users;
pub mod wallpaper;

use anyhow::{Result, anyhow};
use tracing::{debug, error};

use crate::io::invoker::{InvocationRequest, InvocationResult, ScriptRunner};

/// Run `request` and turn a nonzero exit code into an error.
pub fn run_checked<R: ScriptRunner + ?Sized>(
    runner: &R,
    request: &InvocationRequest,
) -> Result<InvocationResult> {
    debug!(script = %request.script.label(), args = ?request.args, "launching script");
    let result = runner.run(request);
    if !result.success() {
        error!(
            script = %request.script.label(),
            exit_code = result.exit_code,
            stderr = %result.stderr,
            "script failed"
        );
        return Err(anyhow!(result.failure_message()));
    }
    Ok(result)
}

/// Collapse per-item failures into one error listing every item.
pub(crate) fn aggregate_errors(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!(errors.join("\n")))
}
