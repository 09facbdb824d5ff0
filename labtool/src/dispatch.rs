//! Top-level action dispatcher.
//!
//! The only place action errors are caught: each action runs once, failures
//! are logged with their full context chain and shown to the operator, and
//! the outcome maps to a process exit code.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::exit_codes;

/// Where operator-facing messages go.
pub trait Reporter {
    fn info(&self, title: &str, message: &str);
    fn error(&self, title: &str, message: &str);
}

/// Prints success to stdout and failures to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, title: &str, message: &str) {
        println!("{title}: {message}");
    }

    fn error(&self, title: &str, message: &str) {
        eprintln!("{title}: {message}");
    }
}

/// Result of one dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { message: String },
    Failed { error: String },
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => exit_codes::OK,
            Self::Failed { .. } => exit_codes::FAILED,
        }
    }
}

/// Run `action`, report how it went, and never propagate its error.
pub fn launch<F>(name: &str, reporter: &dyn Reporter, action: F) -> Outcome
where
    F: FnOnce() -> Result<String>,
{
    debug!(action = name, "launching action");
    match action() {
        Ok(message) => {
            info!(action = name, "action completed without errors");
            let message = if message.is_empty() {
                format!("{name} finished.")
            } else {
                message
            };
            reporter.info("Done", &message);
            Outcome::Completed { message }
        }
        Err(err) => {
            let error = format!("{err:#}");
            error!(action = name, err = %error, "action failed");
            reporter.error(&format!("Error - {name}"), &error);
            Outcome::Failed { error }
        }
    }
}
