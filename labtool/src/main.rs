//! LabTool command-line front end.
//!
//! Every subcommand maps to one operator action. Configuration comes from
//! `labtool.toml` (or `--config`); the log file named there is recreated on
//! each start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use labtool::actions::folders::{delete_folders, list_subfolders};
use labtool::actions::shortcuts::{copy_shortcuts, default_roots, scan_shortcuts};
use labtool::actions::users::{NewUser, create_user, delete_users, list_users, replace_user};
use labtool::actions::wallpaper::{
    WallpaperChoice, apply_wallpaper, block_wallpaper, unblock_wallpaper,
};
use labtool::dispatch::{ConsoleReporter, launch};
use labtool::exit_codes;
use labtool::io::config::{DEFAULT_CONFIG_FILE, LabtoolConfig, load_config, write_config};
use labtool::io::invoker::{InvocationRequest, Invoker};
use labtool::logging::{self, LogOptions};

#[derive(Parser)]
#[command(
    name = "labtool",
    version,
    about = "Administrative task console for lab machines"
)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a local account.
    CreateUser {
        username: String,
        /// Require a password instead of creating the account without one.
        #[arg(long)]
        with_password: bool,
        /// Mark the password as never expiring.
        #[arg(long)]
        never_expire: bool,
    },
    /// Delete local accounts and their profile folders.
    DeleteUser {
        #[arg(required = true)]
        usernames: Vec<String>,
    },
    /// Delete one account and create another in its place.
    ReplaceUser { old: String, new: String },
    /// Print enabled local accounts, system accounts excluded.
    ListUsers,
    /// Apply a wallpaper and lock it.
    ApplyWallpaper {
        /// Custom image; the bundled default is used when omitted.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Prevent users from changing the wallpaper.
    BlockWallpaper,
    /// Allow users to change the wallpaper again.
    UnblockWallpaper,
    /// Print the direct subfolders of a directory.
    ListFolders { root: PathBuf },
    /// Delete selected subfolders of a directory.
    DeleteFolders {
        root: PathBuf,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print Start Menu shortcuts available for copying.
    ListShortcuts,
    /// Copy Start Menu shortcuts into a folder.
    CopyShortcuts {
        #[arg(long)]
        dest: PathBuf,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Run any script and pass through its output and exit code.
    Run {
        /// Seconds before the script is killed (defaults to config).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,
        /// Working directory for the script.
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Extra environment variable, `KEY=VALUE` (repeatable).
        #[arg(long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
        script: PathBuf,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the interpreter scripts would run with.
    Interpreter,
    /// Write the effective configuration to the config path.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_env_pair(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        bail!("environment variable name must not be empty");
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&LogOptions {
        file: Some(config.log_file.clone()),
        level: config.log_level.clone(),
        console: true,
        env_override: true,
    })?;
    debug!(config = %cli.config.display(), "configuration loaded");

    let invoker = Invoker::from_config(&config);
    let reporter = ConsoleReporter;

    let outcome = match cli.command {
        Command::CreateUser {
            username,
            with_password,
            never_expire,
        } => {
            let user = NewUser {
                username,
                no_password: !with_password,
                never_expire,
            };
            launch("Create user", &reporter, || {
                create_user(&invoker, &config, &user)
            })
        }
        Command::DeleteUser { usernames } => launch("Delete users", &reporter, || {
            delete_users(&invoker, &config, &usernames)
        }),
        Command::ReplaceUser { old, new } => launch("Replace user", &reporter, || {
            replace_user(&invoker, &config, &old, &new)
        }),
        Command::ListUsers => launch("List users", &reporter, || {
            let users = list_users(&invoker)?;
            print_lines(&users);
            Ok(format!("{} user(s) found.", users.len()))
        }),
        Command::ApplyWallpaper { image } => {
            let choice = match image {
                Some(path) => WallpaperChoice::Custom(path),
                None => WallpaperChoice::Default,
            };
            launch("Apply and lock wallpaper", &reporter, || {
                apply_wallpaper(&invoker, &config, &choice)
            })
        }
        Command::BlockWallpaper => launch("Block wallpaper", &reporter, || {
            block_wallpaper(&invoker, &config)
        }),
        Command::UnblockWallpaper => launch("Unblock wallpaper", &reporter, || {
            unblock_wallpaper(&invoker, &config)
        }),
        Command::ListFolders { root } => launch("List folders", &reporter, || {
            let names = list_subfolders(&root)?;
            print_lines(&names);
            Ok(format!("{} folder(s) found.", names.len()))
        }),
        Command::DeleteFolders { root, names } => launch("Batch folder delete", &reporter, || {
            delete_folders(&root, &names)
        }),
        Command::ListShortcuts => launch("List shortcuts", &reporter, || {
            let found = scan_shortcuts(&shortcut_roots(&config));
            for (name, path) in &found {
                println!("{name}\t{}", path.display());
            }
            Ok(format!("{} shortcut(s) found.", found.len()))
        }),
        Command::CopyShortcuts { dest, names } => launch("Copy shortcuts", &reporter, || {
            let available = scan_shortcuts(&shortcut_roots(&config));
            copy_shortcuts(&available, &names, &dest)
        }),
        Command::Run {
            timeout,
            cwd,
            env,
            script,
            args,
        } => return Ok(cmd_run(&invoker, script, args, cwd, env, timeout)),
        Command::Interpreter => launch("Resolve interpreter", &reporter, || {
            Ok(invoker.resolve()?.display().to_string())
        }),
        Command::InitConfig { force } => launch("Write configuration", &reporter, || {
            cmd_init_config(&cli.config, &config, force)
        }),
    };
    Ok(outcome.exit_code())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn shortcut_roots(config: &LabtoolConfig) -> Vec<PathBuf> {
    if config.shortcut_roots.is_empty() {
        default_roots()
    } else {
        config.shortcut_roots.clone()
    }
}

fn cmd_run(
    invoker: &Invoker,
    script: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    timeout: Option<u64>,
) -> i32 {
    let mut request = InvocationRequest::new(script).args(args);
    if let Some(cwd) = cwd {
        request = request.cwd(cwd);
    }
    for (key, value) in env {
        request = request.env(key, value);
    }
    if let Some(secs) = timeout {
        request = request.timeout(Duration::from_secs(secs));
    }

    let result = invoker.invoke(&request);
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
    result.exit_code
}

fn cmd_init_config(path: &Path, config: &LabtoolConfig, force: bool) -> Result<String> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_config(path, config).with_context(|| format!("write {}", path.display()))?;
    Ok(format!("Configuration written to {}.", path.display()))
}
