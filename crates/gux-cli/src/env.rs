//! `.env` loading for the `gux` binary.
//!
//! Variables already in the process environment always win. The file is
//! either the one named by `--env-file` or the first `.env` found walking
//! up from the working directory, never crossing a `.git` boundary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Pick `--env-file` out of raw arguments. Needed before clap runs, since
/// clap reads `GUX_*` variables while parsing.
pub fn env_file_from_args<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.to_string_lossy().into_owned();
        if arg == "--" {
            break;
        }
        if arg == "--env-file" {
            return args.next().map(PathBuf::from);
        }
        if let Some(value) = arg.strip_prefix("--env-file=") {
            return Some(PathBuf::from(value));
        }
    }
    None
}

/// First `.env` at or above `start`. A directory holding `.git` (a clone's
/// directory or a worktree's file) is the last one searched.
pub fn discover(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(".env");
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        current = dir.parent();
    }
    None
}

/// Load the `.env` file, returning the path that was used. A missing
/// explicit file loads nothing.
pub fn load(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let path = match explicit {
        Some(path) if path.is_file() => path.to_path_buf(),
        Some(_) => return Ok(None),
        None => {
            let cwd = std::env::current_dir().context("read working directory")?;
            let cwd = cwd.canonicalize().unwrap_or(cwd);
            match discover(&cwd) {
                Some(path) => path,
                None => return Ok(None),
            }
        }
    };
    dotenvy::from_path(&path).with_context(|| format!("load env file {}", path.display()))?;
    Ok(Some(path))
}
