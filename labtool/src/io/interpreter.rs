//! Script interpreter discovery.
//!
//! Candidates are probed in order through a [`Lookup`] strategy. The default
//! strategy searches `PATH`; tests pass closures instead.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::io::invoker::InvokeError;

/// PowerShell 7 first, then Windows PowerShell.
pub const DEFAULT_CANDIDATES: &[&str] = &["pwsh.exe", "powershell.exe"];

/// Flags placed between the interpreter and the script path.
pub const POWERSHELL_PREAMBLE: &[&str] = &["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"];

/// Resolves an executable name to a runnable path.
pub trait Lookup {
    fn find(&self, name: &str) -> Option<PathBuf>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn find(&self, name: &str) -> Option<PathBuf> {
        self(name)
    }
}

/// Which interpreter to run scripts with, and how to hand it the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterSpec {
    /// Executable names, first resolvable wins.
    pub candidates: Vec<String>,
    /// Arguments inserted before the script path.
    pub preamble: Vec<String>,
}

impl Default for InterpreterSpec {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            preamble: POWERSHELL_PREAMBLE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Return the first candidate `lookup` can resolve.
pub fn resolve_interpreter<L: Lookup + ?Sized>(
    candidates: &[String],
    lookup: &L,
) -> Result<PathBuf, InvokeError> {
    for name in candidates {
        if let Some(path) = lookup.find(name) {
            debug!(candidate = %name, path = %path.display(), "interpreter resolved");
            return Ok(path);
        }
    }
    warn!(?candidates, "no interpreter candidate found");
    Err(InvokeError::InterpreterNotFound {
        candidates: candidates.to_vec(),
    })
}

/// Searches the directories of a `PATH`-style list.
#[derive(Debug, Clone)]
pub struct PathLookup {
    dirs: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl PathLookup {
    /// Snapshot of the current process `PATH` (and `PATHEXT` on Windows).
    pub fn from_env() -> Self {
        let path = env::var_os("PATH").unwrap_or_default();
        let pathext = if cfg!(windows) {
            env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
        } else {
            String::new()
        };
        Self::new(path, &pathext)
    }

    /// Build from an explicit search list and a `;`-separated extension list.
    pub fn new(path: impl Into<OsString>, pathext: &str) -> Self {
        let path = path.into();
        let dirs = env::split_paths(&path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        let extensions = pathext
            .split(';')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
            .collect();
        Self { dirs, extensions }
    }

    fn candidates_in(&self, dir: &Path, name: &str) -> Vec<PathBuf> {
        let mut out = vec![dir.join(name)];
        if Path::new(name).extension().is_none() {
            out.extend(self.extensions.iter().map(|ext| dir.join(format!("{name}{ext}"))));
        }
        out
    }
}

impl Lookup for PathLookup {
    fn find(&self, name: &str) -> Option<PathBuf> {
        // Names with a separator are taken as paths, not searched.
        if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            let path = PathBuf::from(name);
            return is_executable(&path).then_some(path);
        }
        self.dirs
            .iter()
            .flat_map(|dir| self.candidates_in(dir, name))
            .find(|path| is_executable(path))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_resolvable_candidate_wins() {
        let lookup = |name: &str| match name {
            "powershell.exe" => Some(PathBuf::from("/fake/powershell.exe")),
            "pwsh.exe" => Some(PathBuf::from("/fake/pwsh.exe")),
            _ => None,
        };
        let path = resolve_interpreter(&names(DEFAULT_CANDIDATES), &lookup).expect("resolve");
        assert_eq!(path, PathBuf::from("/fake/pwsh.exe"));
    }

    #[test]
    fn falls_back_to_later_candidate() {
        let lookup =
            |name: &str| (name == "powershell.exe").then(|| PathBuf::from("/fake/powershell.exe"));
        let path = resolve_interpreter(&names(DEFAULT_CANDIDATES), &lookup).expect("resolve");
        assert_eq!(path, PathBuf::from("/fake/powershell.exe"));
    }

    #[test]
    fn nothing_resolvable_is_interpreter_not_found() {
        let lookup = |_: &str| -> Option<PathBuf> { None };
        let err = resolve_interpreter(&names(DEFAULT_CANDIDATES), &lookup).unwrap_err();
        assert!(matches!(err, InvokeError::InterpreterNotFound { .. }));
        let msg = err.to_string();
        assert!(msg.contains("pwsh.exe"));
        assert!(msg.contains("powershell.exe"));
    }

    #[test]
    fn default_spec_uses_powershell_preamble() {
        let spec = InterpreterSpec::default();
        assert_eq!(spec.candidates, names(&["pwsh.exe", "powershell.exe"]));
        assert_eq!(
            spec.preamble,
            names(&["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"])
        );
    }

    #[test]
    fn path_lookup_ignores_missing_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lookup = PathLookup::new(temp.path().join("nope").into_os_string(), "");
        assert!(lookup.find("sh").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn path_lookup_finds_executable_and_skips_plain_files() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let exe = temp.path().join("tool");
        std::fs::write(&exe, "#!/bin/sh\n").expect("write");
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        std::fs::write(temp.path().join("data"), "x").expect("write");

        let lookup = PathLookup::new(temp.path().as_os_str().to_os_string(), "");
        assert_eq!(lookup.find("tool"), Some(exe));
        assert!(lookup.find("data").is_none());
    }

    #[test]
    fn path_lookup_appends_extensions_to_bare_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lookup = PathLookup::new(temp.path().as_os_str().to_os_string(), ".EXE;.CMD");
        let tried = lookup.candidates_in(temp.path(), "pwsh");
        assert_eq!(
            tried,
            vec![
                temp.path().join("pwsh"),
                temp.path().join("pwsh.exe"),
                temp.path().join("pwsh.cmd"),
            ]
        );
        let tried = lookup.candidates_in(temp.path(), "pwsh.exe");
        assert_eq!(tried, vec![temp.path().join("pwsh.exe")]);
    }
}
