//! Staging bundled scripts onto an ordinary filesystem path.
//!
//! Scripts that ship inside the binary, or inside a read-only bundle
//! directory, are copied into a fresh temporary directory before the
//! interpreter sees them. The directory lives exactly as long as the
//! returned [`StagedScript`].

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::io::invoker::InvokeError;

/// Where a script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// A script on disk. Relative paths found under the bundle directory are
    /// staged; anything else is run in place.
    Path(PathBuf),
    /// A script compiled into the binary.
    Embedded {
        file_name: &'static str,
        body: &'static str,
    },
}

impl ScriptSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Short label for logs and error messages.
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Embedded { file_name, .. } => format!("<embedded>/{file_name}"),
        }
    }
}

impl From<PathBuf> for ScriptSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ScriptSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for ScriptSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

/// A script ready to hand to the interpreter.
///
/// When staged, dropping this value deletes the temporary copy.
#[derive(Debug)]
pub struct StagedScript {
    path: PathBuf,
    temp_dir: Option<TempDir>,
}

impl StagedScript {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the temporary copy, if one was made.
    pub fn staging_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }
}

/// Resolve `source` to a runnable path, copying it out of the bundle if needed.
pub fn stage_script(
    source: &ScriptSource,
    bundle_dir: Option<&Path>,
) -> Result<StagedScript, InvokeError> {
    match source {
        ScriptSource::Embedded { file_name, body } => {
            let temp_dir = new_staging_dir()?;
            let target = temp_dir.path().join(file_name);
            fs::write(&target, body).map_err(|source| InvokeError::Staging {
                path: target.clone(),
                source,
            })?;
            debug!(script = %file_name, staged = %target.display(), "staged embedded script");
            Ok(StagedScript {
                path: target,
                temp_dir: Some(temp_dir),
            })
        }
        ScriptSource::Path(path) => match bundled_path(path, bundle_dir) {
            Some(bundled) => {
                let file_name = bundled.file_name().ok_or_else(|| InvokeError::Staging {
                    path: bundled.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "bundled script has no file name",
                    ),
                })?;
                let temp_dir = new_staging_dir()?;
                let target = temp_dir.path().join(file_name);
                fs::copy(&bundled, &target).map_err(|source| InvokeError::Staging {
                    path: bundled.clone(),
                    source,
                })?;
                debug!(
                    bundled = %bundled.display(),
                    staged = %target.display(),
                    "staged bundled script"
                );
                Ok(StagedScript {
                    path: target,
                    temp_dir: Some(temp_dir),
                })
            }
            None => Ok(StagedScript {
                path: path.clone(),
                temp_dir: None,
            }),
        },
    }
}

fn bundled_path(path: &Path, bundle_dir: Option<&Path>) -> Option<PathBuf> {
    let bundle_dir = bundle_dir?;
    if path.is_absolute() {
        return None;
    }
    let candidate = bundle_dir.join(path);
    candidate.is_file().then_some(candidate)
}

fn new_staging_dir() -> Result<TempDir, InvokeError> {
    tempfile::Builder::new()
        .prefix("labtool-")
        .tempdir()
        .map_err(|source| InvokeError::Staging {
            path: std::env::temp_dir(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_is_used_in_place() {
        let staged = stage_script(&ScriptSource::path("scripts/x.ps1"), None).expect("stage");
        assert_eq!(staged.path(), Path::new("scripts/x.ps1"));
        assert!(staged.staging_dir().is_none());
    }

    #[test]
    fn relative_path_under_bundle_is_copied_and_removed_on_drop() {
        let bundle = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(bundle.path().join("powershell")).expect("mkdir");
        fs::write(bundle.path().join("powershell/x.ps1"), "Write-Output hi").expect("write");

        let staged = stage_script(
            &ScriptSource::path("powershell/x.ps1"),
            Some(bundle.path()),
        )
        .expect("stage");
        let dir = staged.staging_dir().expect("staged dir").to_path_buf();
        assert!(!staged.path().starts_with(bundle.path()));
        assert_eq!(
            fs::read_to_string(staged.path()).expect("read"),
            "Write-Output hi"
        );

        drop(staged);
        assert!(!dir.exists());
    }

    #[test]
    fn path_missing_from_bundle_runs_in_place() {
        let bundle = tempfile::tempdir().expect("tempdir");
        let staged =
            stage_script(&ScriptSource::path("other.ps1"), Some(bundle.path())).expect("stage");
        assert_eq!(staged.path(), Path::new("other.ps1"));
        assert!(staged.staging_dir().is_none());
    }

    #[test]
    fn absolute_path_is_never_staged() {
        let bundle = tempfile::tempdir().expect("tempdir");
        let script = bundle.path().join("x.ps1");
        fs::write(&script, "x").expect("write");
        let staged =
            stage_script(&ScriptSource::path(&script), Some(bundle.path())).expect("stage");
        assert_eq!(staged.path(), script.as_path());
    }

    #[test]
    fn embedded_script_is_written_out() {
        let source = ScriptSource::Embedded {
            file_name: "hello.ps1",
            body: "Write-Output hello",
        };
        let staged = stage_script(&source, None).expect("stage");
        assert_eq!(
            staged.path().file_name().and_then(|n| n.to_str()),
            Some("hello.ps1")
        );
        assert_eq!(
            fs::read_to_string(staged.path()).expect("read"),
            "Write-Output hello"
        );
        assert_eq!(source.label(), "<embedded>/hello.ps1");
    }
}
