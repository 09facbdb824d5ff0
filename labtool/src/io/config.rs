//! LabTool configuration stored in `labtool.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::interpreter::{DEFAULT_CANDIDATES, InterpreterSpec, POWERSHELL_PREAMBLE};
use crate::io::invoker::{DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_TIMEOUT};

pub const DEFAULT_CONFIG_FILE: &str = "labtool.toml";

/// LabTool configuration (TOML).
///
/// Meant to be edited by the technician deploying the tool. Missing fields
/// fall back to the defaults the tool ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabtoolConfig {
    /// Log file, truncated on every start.
    pub log_file: PathBuf,

    /// Minimum level written to the log (`RUST_LOG` overrides).
    pub log_level: String,

    /// Directory holding the administrative scripts.
    pub scripts_dir: PathBuf,

    /// Directory holding bundled resources such as the default wallpaper.
    pub resources_dir: PathBuf,

    /// Read-only bundle root. Relative script paths found here are copied to
    /// a temporary directory before running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_dir: Option<PathBuf>,

    /// Per-script wall-clock limit in seconds.
    pub timeout_secs: u64,

    /// Captured bytes kept per output stream.
    pub output_limit_bytes: usize,

    /// Start Menu folders scanned for shortcuts. Empty means the Windows defaults.
    pub shortcut_roots: Vec<PathBuf>,

    pub interpreter: InterpreterConfig,

    pub scripts: ScriptNames,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Executable names probed in order (e.g. `["pwsh.exe","powershell.exe"]`).
    pub candidates: Vec<String>,
    /// Arguments placed before the script path.
    pub args: Vec<String>,
}

/// File names of the scripts each action runs, relative to `scripts_dir`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptNames {
    pub create_user: String,
    pub delete_user: String,
    pub apply_wallpaper: String,
    pub block_wallpaper: String,
    pub unblock_wallpaper: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            args: POWERSHELL_PREAMBLE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InterpreterConfig {
    pub fn to_spec(&self) -> InterpreterSpec {
        InterpreterSpec {
            candidates: self.candidates.clone(),
            preamble: self.args.clone(),
        }
    }
}

impl Default for ScriptNames {
    fn default() -> Self {
        Self {
            create_user: "crear_usuario.ps1".to_string(),
            delete_user: "borrar_usuario_completo.ps1".to_string(),
            apply_wallpaper: "aplicar_fondo.ps1".to_string(),
            block_wallpaper: "bloquear_fondo.ps1".to_string(),
            unblock_wallpaper: "desbloquear_fondo.ps1".to_string(),
        }
    }
}

impl Default for LabtoolConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("labtool.log"),
            log_level: "debug".to_string(),
            scripts_dir: PathBuf::from("powershell"),
            resources_dir: PathBuf::from("resources"),
            bundle_dir: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            shortcut_roots: Vec::new(),
            interpreter: InterpreterConfig::default(),
            scripts: ScriptNames::default(),
        }
    }
}

impl LabtoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        self.log_level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow!("log_level must be one of trace, debug, info, warn, error"))?;
        if self.interpreter.candidates.is_empty()
            || self
                .interpreter
                .candidates
                .iter()
                .any(|name| name.trim().is_empty())
        {
            return Err(anyhow!(
                "interpreter.candidates must be a non-empty array of names"
            ));
        }
        let names = [
            ("create_user", &self.scripts.create_user),
            ("delete_user", &self.scripts.delete_user),
            ("apply_wallpaper", &self.scripts.apply_wallpaper),
            ("block_wallpaper", &self.scripts.block_wallpaper),
            ("unblock_wallpaper", &self.scripts.unblock_wallpaper),
        ];
        for (key, name) in names {
            if name.trim().is_empty() {
                return Err(anyhow!("scripts.{key} must not be empty"));
            }
        }
        Ok(())
    }

    /// Path of a script as handed to the invoker.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    /// Image applied by `apply-wallpaper` when none is given.
    pub fn default_wallpaper(&self) -> PathBuf {
        self.resources_dir.join("fondo.jpg")
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LabtoolConfig::default()`.
pub fn load_config(path: &Path) -> Result<LabtoolConfig> {
    if !path.exists() {
        let cfg = LabtoolConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LabtoolConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LabtoolConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
