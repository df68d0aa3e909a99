//! Destination preparation
//!
//! Before unpacking, a non-empty destination can be moved aside to
//! `<name>_backup_<YYYY-MM-DD_HH-MM-SS>` next to it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Make sure `dest` exists, moving existing content aside first when
/// `backup` is set. Returns where the old content went, if anywhere.
///
/// # Errors
/// Fails if the rename or the directory creation fails.
pub fn prepare_destination(dest: &Path, backup: bool) -> Result<Option<PathBuf>> {
    let moved = if backup && is_non_empty_dir(dest) {
        let target = backup_path(dest, &Local::now().format(TIMESTAMP_FORMAT).to_string());
        fs::rename(dest, &target).map_err(|source| Error::Backup {
            from: dest.to_path_buf(),
            to: target.clone(),
            source,
        })?;
        info!(from = %dest.display(), to = %target.display(), "backed up destination");
        Some(target)
    } else {
        None
    };

    fs::create_dir_all(dest).map_err(|source| Error::Destination {
        path: dest.to_path_buf(),
        source,
    })?;
    Ok(moved)
}

fn is_non_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// First free `<name>_backup_<stamp>[_N]` sibling of `dest`
fn backup_path(dest: &Path, stamp: &str) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let parent = dest.parent().unwrap_or_else(|| Path::new(""));

    let base = format!("{name}_backup_{stamp}");
    let mut candidate = parent.join(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = parent.join(format!("{base}_{n}"));
        n += 1;
    }
    candidate
}
