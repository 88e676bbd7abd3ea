// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Working directory housekeeping.

use crate::error::Result;
use glob::glob;
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Removes `dir` with its contents, then creates it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Removes `dir`; failures are logged and otherwise ignored.
pub fn remove_dir_best_effort(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(dir) {
        warn!("Failed to remove {}: {}", dir.display(), e);
    }
}

/// Removes every entry of `dir` except the one named `keep`. Returns the
/// number of removed entries; a missing `dir` removes nothing.
pub fn prune_except(dir: &Path, keep: &str) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in glob(&format!("{}/*", dir.display()))? {
        let path = entry?;
        if path.file_name().map_or(false, |name| name == keep) {
            continue;
        }
        info!("Removing stale {}", path.display());
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}
