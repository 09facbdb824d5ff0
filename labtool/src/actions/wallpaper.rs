//! Desktop wallpaper actions.

use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::info;

use crate::actions::run_checked;
use crate::io::config::LabtoolConfig;
use crate::io::invoker::{InvocationRequest, ScriptRunner};

/// Which image to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WallpaperChoice {
    /// The image shipped in the resources directory; also becomes the default
    /// for new profiles.
    Default,
    /// An operator-supplied image, applied to the current profile only.
    Custom(PathBuf),
}

/// Apply the chosen image and lock it in place.
pub fn apply_wallpaper<R: ScriptRunner + ?Sized>(
    runner: &R,
    config: &LabtoolConfig,
    choice: &WallpaperChoice,
) -> Result<String> {
    let mut args = vec!["-Image".to_string()];
    match choice {
        WallpaperChoice::Default => {
            args.push(config.default_wallpaper().display().to_string());
            args.push("-Default".to_string());
            args.push("-Current".to_string());
        }
        WallpaperChoice::Custom(path) => {
            if path.as_os_str().is_empty() {
                bail!("select a custom image first");
            }
            args.push(path.display().to_string());
            args.push("-Current".to_string());
        }
    }

    let request =
        InvocationRequest::new(config.script_path(&config.scripts.apply_wallpaper)).args(args);
    run_checked(runner, &request)?;
    info!(?choice, "wallpaper applied and locked");
    Ok("Wallpaper applied and locked.".to_string())
}

pub fn block_wallpaper<R: ScriptRunner + ?Sized>(
    runner: &R,
    config: &LabtoolConfig,
) -> Result<String> {
    let request = InvocationRequest::new(config.script_path(&config.scripts.block_wallpaper));
    let result = run_checked(runner, &request)?;
    info!(stdout = %result.stdout, "wallpaper changes blocked");
    Ok("Wallpaper changes blocked.".to_string())
}

pub fn unblock_wallpaper<R: ScriptRunner + ?Sized>(
    runner: &R,
    config: &LabtoolConfig,
) -> Result<String> {
    let request = InvocationRequest::new(config.script_path(&config.scripts.unblock_wallpaper));
    run_checked(runner, &request)?;
    info!("wallpaper changes unblocked");
    Ok("Wallpaper changes unblocked.".to_string())
}
