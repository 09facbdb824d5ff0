//! Copying Start Menu shortcuts to another folder.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::actions::aggregate_errors;

const START_MENU_PROGRAMS: &[&str] = &["Microsoft", "Windows", "Start Menu", "Programs"];

/// All-users then current-user Start Menu program folders.
pub fn default_roots() -> Vec<PathBuf> {
    ["ProgramData", "APPDATA"]
        .iter()
        .filter_map(|var| env::var_os(var))
        .map(|base| START_MENU_PROGRAMS.iter().fold(PathBuf::from(base), |p, c| p.join(c)))
        .collect()
}

/// Map shortcut name (file stem) to its `.lnk` path.
///
/// Roots are scanned in order and the first shortcut seen for a name wins.
/// Unreadable or missing folders are skipped.
pub fn scan_shortcuts(roots: &[PathBuf]) -> BTreeMap<String, PathBuf> {
    let mut found = BTreeMap::new();
    for root in roots {
        let walker = WalkDir::new(root).sort_by_file_name().into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(root = %root.display(), err = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_shortcut(entry.path()) {
                continue;
            }
            let Some(name) = entry.path().file_stem() else {
                continue;
            };
            found
                .entry(name.to_string_lossy().into_owned())
                .or_insert_with(|| entry.path().to_path_buf());
        }
    }
    found
}

fn is_shortcut(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("lnk"))
}

/// Copy the named shortcuts from `available` into `dest`.
pub fn copy_shortcuts(
    available: &BTreeMap<String, PathBuf>,
    names: &[String],
    dest: &Path,
) -> Result<String> {
    if names.is_empty() {
        bail!("no shortcuts selected");
    }
    if !dest.is_dir() {
        bail!("destination folder {} does not exist", dest.display());
    }

    let mut errors = Vec::new();
    for name in names {
        match copy_one(available, name, dest) {
            Ok(target) => info!(name = %name, target = %target.display(), "shortcut copied"),
            Err(err) => {
                error!(name = %name, err = %err, "shortcut copy failed");
                errors.push(format!("{name}: {err:#}"));
            }
        }
    }
    aggregate_errors(errors)?;
    Ok(format!(
        "{} shortcut(s) copied to {}.",
        names.len(),
        dest.display()
    ))
}

fn copy_one(available: &BTreeMap<String, PathBuf>, name: &str, dest: &Path) -> Result<PathBuf> {
    let source = available
        .get(name)
        .ok_or_else(|| anyhow!("unknown shortcut"))?;
    let file_name = source
        .file_name()
        .ok_or_else(|| anyhow!("shortcut path has no file name"))?;
    let target = dest.join(file_name);
    fs::copy(source, &target)
        .with_context(|| format!("copy {} to {}", source.display(), target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, b"lnk").expect("write");
    }

    #[test]
    fn scan_finds_nested_shortcuts_and_first_root_wins() {
        let common = tempfile::tempdir().expect("tempdir");
        let user = tempfile::tempdir().expect("tempdir");
        touch(&common.path().join("Accessories/Notepad.lnk"));
        touch(&common.path().join("Paint.LNK"));
        touch(&common.path().join("readme.txt"));
        touch(&user.path().join("Notepad.lnk"));
        touch(&user.path().join("Terminal.lnk"));

        let roots = vec![
            common.path().to_path_buf(),
            user.path().to_path_buf(),
            common.path().join("missing"),
        ];
        let found = scan_shortcuts(&roots);

        let names: Vec<&str> = found.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Notepad", "Paint", "Terminal"]);
        assert_eq!(
            found["Notepad"],
            common.path().join("Accessories/Notepad.lnk")
        );
    }

    #[test]
    fn copy_shortcuts_copies_and_reports_unknown_names() {
        let src = tempfile::tempdir().expect("tempdir");
        let dest = tempfile::tempdir().expect("tempdir");
        touch(&src.path().join("Calc.lnk"));
        let available = scan_shortcuts(&[src.path().to_path_buf()]);

        let err = copy_shortcuts(
            &available,
            &["Calc".to_string(), "Ghost".to_string()],
            dest.path(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Ghost: unknown shortcut");
        assert!(dest.path().join("Calc.lnk").exists());
    }

    #[test]
    fn copy_shortcuts_requires_existing_destination() {
        let src = tempfile::tempdir().expect("tempdir");
        touch(&src.path().join("Calc.lnk"));
        let available = scan_shortcuts(&[src.path().to_path_buf()]);
        let err = copy_shortcuts(
            &available,
            &["Calc".to_string()],
            &src.path().join("nope"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn default_roots_end_in_start_menu_programs() {
        for root in default_roots() {
            assert!(root.ends_with(Path::new("Microsoft/Windows/Start Menu/Programs")));
        }
    }
}
