//! Bulk removal of leftover profile folders.

use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{error, info};

use crate::actions::aggregate_errors;

/// Names of the direct subdirectories of `root`, sorted.
pub fn list_subfolders(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", root.display()))?;
        let is_dir = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?
            .is_dir();
        if is_dir {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Remove the named subdirectories of `root`, attempting every one.
pub fn delete_folders(root: &Path, names: &[String]) -> Result<String> {
    if names.is_empty() {
        bail!("no folders selected");
    }

    let mut errors = Vec::new();
    for name in names {
        match delete_one(root, name) {
            Ok(()) => info!(folder = %root.join(name).display(), "folder deleted"),
            Err(err) => {
                error!(folder = %name, err = %err, "folder deletion failed");
                errors.push(format!("{name}: {err:#}"));
            }
        }
    }
    aggregate_errors(errors)?;
    Ok(format!("{} folder(s) deleted.", names.len()))
}

fn delete_one(root: &Path, name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return Err(anyhow!("not a direct subfolder name")),
    }
    let path = root.join(name);
    if !path.is_dir() {
        bail!("not a folder");
    }
    fs::remove_dir_all(&path).with_context(|| format!("remove {}", path.display()))
}
