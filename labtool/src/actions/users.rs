//! Local account actions: create, delete, replace, list.

use anyhow::{Context, Result, bail};
use tracing::{error, info};

use crate::actions::{aggregate_errors, run_checked};
use crate::io::config::LabtoolConfig;
use crate::io::invoker::{InvocationRequest, ScriptRunner};
use crate::io::staging::ScriptSource;

/// Built-in accounts never offered for deletion.
pub const SYSTEM_ACCOUNTS: &[&str] = &[
    "Administrator",
    "DefaultAccount",
    "Guest",
    "WDAGUtilityAccount",
];

/// Lists enabled local accounts, one per line. Ships inside the binary.
pub const LIST_USERS_SCRIPT: ScriptSource = ScriptSource::Embedded {
    file_name: "list_local_users.ps1",
    body: include_str!("../../scripts/list_local_users.ps1"),
};

/// Inputs for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub no_password: bool,
    pub never_expire: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            no_password: true,
            never_expire: false,
        }
    }

    fn script_args(&self) -> Vec<String> {
        let mut args = vec!["-Username".to_string(), self.username.clone()];
        if self.no_password {
            args.push("-NoPassword".to_string());
        }
        if self.never_expire {
            args.push("-NeverExpire".to_string());
        }
        args
    }
}

fn require_username(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        bail!("username must not be empty");
    }
    Ok(name)
}

pub fn create_user<R: ScriptRunner + ?Sized>(
    runner: &R,
    config: &LabtoolConfig,
    user: &NewUser,
) -> Result<String> {
    let username = require_username(&user.username)?;
    let user = NewUser {
        username: username.to_string(),
        ..user.clone()
    };
    let request = InvocationRequest::new(config.script_path(&config.scripts.create_user))
        .args(user.script_args());
    run_checked(runner, &request)?;
    info!(username, "user created");
    Ok(format!("User '{username}' created."))
}

/// Delete every listed account, attempting all of them before reporting.
pub fn delete_users<R: ScriptRunner + ?Sized>(
    runner: &R,
    config: &LabtoolConfig,
    usernames: &[String],
) -> Result<String> {
    if usernames.is_empty() {
        bail!("no users selected");
    }
    let names = usernames
        .iter()
        .map(|name| require_username(name))
        .collect::<Result<Vec<_>>>()?;

    let script = config.script_path(&config.scripts.delete_user);
    let mut errors = Vec::new();
    for &name in &names {
        let request = InvocationRequest::new(script.clone()).args(["-Username", name, "-Force"]);
        match run_checked(runner, &request) {
            Ok(_) => info!(username = %name, "user deleted"),
            Err(err) => {
                error!(username = %name, err = %err, "user deletion failed");
                errors.push(format!("{name}: {err}"));
            }
        }
    }
    aggregate_errors(errors)?;
    Ok(format!("{} user(s) deleted.", names.len()))
}

/// Delete `old`, then create `new` with no password that never expires.
pub fn replace_user<R: ScriptRunner + ?Sized>(
    runner: &R,
    config: &LabtoolConfig,
    old: &str,
    new: &str,
) -> Result<String> {
    let old = require_username(old)?;
    let new = require_username(new)?;

    let delete = InvocationRequest::new(config.script_path(&config.scripts.delete_user))
        .args(["-Username", old]);
    run_checked(runner, &delete).with_context(|| format!("could not delete '{old}'"))?;
    info!(username = old, "old user deleted");

    let replacement = NewUser {
        username: new.to_string(),
        no_password: true,
        never_expire: true,
    };
    let create = InvocationRequest::new(config.script_path(&config.scripts.create_user))
        .args(replacement.script_args());
    run_checked(runner, &create).with_context(|| format!("could not create '{new}'"))?;
    info!(old, new, "user replaced");
    Ok(format!("User '{old}' replaced by '{new}'."))
}

/// Enabled local accounts, system accounts removed, sorted.
pub fn list_users<R: ScriptRunner + ?Sized>(runner: &R) -> Result<Vec<String>> {
    let result = run_checked(runner, &InvocationRequest::new(LIST_USERS_SCRIPT))
        .context("list local users")?;
    Ok(parse_user_list(&result.stdout))
}

fn parse_user_list(stdout: &str) -> Vec<String> {
    let mut users: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            !SYSTEM_ACCOUNTS
                .iter()
                .any(|system| system.eq_ignore_ascii_case(line))
        })
        .map(str::to_string)
        .collect();
    users.sort();
    users.dedup();
    users
}
