//! Scratch workspace for staging page rewrites.
//!
//! One [`ScratchWorkspace`] is owned by each pipeline run. It is a uniquely
//! named temporary directory that mirrors the part of the site tree being
//! modified: a live path `site_root/rel` maps to `scratch_root/rel`. Pages are
//! copied there, rewritten by the injector, and only then merged back.
//!
//! The handle owns the directory. Dropping it removes the scratch root and
//! everything under it, which covers normal completion, `?` early returns,
//! and unwinding after an interrupt. [`ScratchWorkspace::close`] does the same
//! but reports removal errors.
//!
//! Workspaces are plain values, so independent runs (e.g. parallel tests) each
//! get their own.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create scratch workspace: {0}")]
    Create(#[source] io::Error),
    #[error("Scratch workspace parent {} is inside the site root {}", .parent.display(), .site_root.display())]
    InsideSiteRoot { parent: PathBuf, site_root: PathBuf },
    #[error("{} is outside the site root {}", .path.display(), .site_root.display())]
    OutsideSiteRoot { path: PathBuf, site_root: PathBuf },
    #[error("Failed to stage {}: {source}", .path.display())]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct ScratchWorkspace {
    site_root: PathBuf,
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Allocate a fresh scratch root for `site_root`.
    ///
    /// The directory is created under `parent` when given, otherwise in the
    /// system temp directory. A parent inside the site root is rejected: the
    /// scratch mirror would end up being scanned and published.
    pub fn create(
        site_root: &Path,
        prefix: &str,
        parent: Option<&Path>,
    ) -> Result<Self, WorkspaceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);

        let dir = match parent {
            Some(parent) => {
                let root_abs = site_root
                    .canonicalize()
                    .unwrap_or_else(|_| site_root.to_path_buf());
                if resolve(parent).starts_with(&root_abs) {
                    return Err(WorkspaceError::InsideSiteRoot {
                        parent: parent.to_path_buf(),
                        site_root: site_root.to_path_buf(),
                    });
                }
                fs::create_dir_all(parent).map_err(WorkspaceError::Create)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(WorkspaceError::Create)?;

        debug!(root = %dir.path().display(), "created scratch workspace");
        Ok(Self {
            site_root: site_root.to_path_buf(),
            dir,
        })
    }

    /// The scratch root directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Map a live path under the site root to its scratch counterpart.
    ///
    /// Pure path arithmetic: nothing is created or checked on disk.
    pub fn to_scratch(&self, live: &Path) -> Result<PathBuf, WorkspaceError> {
        let rel = live
            .strip_prefix(&self.site_root)
            .map_err(|_| WorkspaceError::OutsideSiteRoot {
                path: live.to_path_buf(),
                site_root: self.site_root.clone(),
            })?;
        if rel.as_os_str().is_empty() {
            Ok(self.root().to_path_buf())
        } else {
            Ok(self.root().join(rel))
        }
    }

    /// Copy a live file to its scratch path, creating parent directories.
    pub fn stage(&self, live_file: &Path) -> Result<PathBuf, WorkspaceError> {
        let scratch = self.to_scratch(live_file)?;
        let stage_err = |source| WorkspaceError::Stage {
            path: live_file.to_path_buf(),
            source,
        };
        if let Some(parent) = scratch.parent() {
            fs::create_dir_all(parent).map_err(stage_err)?;
        }
        fs::copy(live_file, &scratch).map_err(stage_err)?;
        debug!(live = %live_file.display(), scratch = %scratch.display(), "staged");
        Ok(scratch)
    }

    /// Remove the scratch root now, reporting failures.
    pub fn close(self) -> io::Result<()> {
        debug!(root = %self.dir.path().display(), "removing scratch workspace");
        self.dir.close()
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// rest, so a parent that does not exist yet still compares correctly.
fn resolve(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
        }
    }
}
