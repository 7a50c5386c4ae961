//! Merge engine: promote injected scratch pages back into the live tree.
//!
//! This is the only step that writes to the site root. Files only ever move
//! scratch → live; nothing is deleted.
//!
//! ## Decision per page
//!
//! ```text
//! live missing                         → Created    (write)
//! policy=newer, scratch mtime <= live  → NotNewer   (skip)
//! SHA-256(scratch) == SHA-256(live)    → Unchanged  (skip)
//! otherwise                            → Updated    (write)
//! ```
//!
//! The mtime test is strict: equal timestamps never copy. The content test
//! runs under every policy, so re-running the pipeline over an already
//! injected site writes nothing.
//!
//! ## Atomic writes
//!
//! Bytes go to a temp file in the live page's directory, take the live file's
//! permissions, and are renamed over the live path. A reader never sees a
//! half-written page.

use crate::inject::StagedDir;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Prefix of the temp files written next to live pages during a merge.
const TEMP_PREFIX: &str = ".favicon-stage-";

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// When an injected page replaces its live counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Only when the scratch copy is strictly newer and its content differs.
    #[default]
    Newer,
    /// Whenever the content differs, regardless of timestamps.
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Updated,
    Unchanged,
    NotNewer,
}

impl MergeOutcome {
    pub fn wrote(self) -> bool {
        matches!(self, MergeOutcome::Created | MergeOutcome::Updated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPage {
    pub live: PathBuf,
    pub outcome: MergeOutcome,
}

/// What happened to every page of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub dir: PathBuf,
    pub pages: Vec<MergedPage>,
}

impl MergeReport {
    pub fn count(&self, outcome: MergeOutcome) -> usize {
        self.pages.iter().filter(|p| p.outcome == outcome).count()
    }

    /// Number of live files written.
    pub fn written(&self) -> usize {
        self.pages.iter().filter(|p| p.outcome.wrote()).count()
    }
}

/// Merge every staged page of one directory back into the live tree.
///
/// Stops at the first I/O error; pages merged before it stay merged.
pub fn merge_directory(
    staged: &StagedDir,
    policy: MergePolicy,
) -> Result<MergeReport, MergeError> {
    let mut pages = Vec::with_capacity(staged.pages.len());
    for page in &staged.pages {
        let outcome = merge_file(&page.scratch, &page.live, policy)?;
        debug!(live = %page.live.display(), ?outcome, "merged");
        pages.push(MergedPage {
            live: page.live.clone(),
            outcome,
        });
    }
    Ok(MergeReport {
        dir: staged.dir.clone(),
        pages,
    })
}

/// Merge a single scratch file onto its live path.
pub fn merge_file(
    scratch: &Path,
    live: &Path,
    policy: MergePolicy,
) -> Result<MergeOutcome, MergeError> {
    let live_meta = match fs::metadata(live) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            write_atomic(scratch, live, None)?;
            return Ok(MergeOutcome::Created);
        }
        Err(source) => return Err(read_error(live, source)),
    };

    if policy == MergePolicy::Newer {
        let scratch_time = mtime(scratch)?;
        let live_time = live_meta.modified().map_err(|e| read_error(live, e))?;
        if scratch_time <= live_time {
            return Ok(MergeOutcome::NotNewer);
        }
    }

    let scratch_hash = hash_file(scratch).map_err(|e| read_error(scratch, e))?;
    let live_hash = hash_file(live).map_err(|e| read_error(live, e))?;
    if scratch_hash == live_hash {
        return Ok(MergeOutcome::Unchanged);
    }

    write_atomic(scratch, live, Some(live_meta.permissions()))?;
    Ok(MergeOutcome::Updated)
}

/// SHA-256 of a file's contents, hex encoded.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

fn mtime(path: &Path) -> Result<SystemTime, MergeError> {
    path.metadata()
        .and_then(|m| m.modified())
        .map_err(|e| read_error(path, e))
}

fn read_error(path: &Path, source: io::Error) -> MergeError {
    MergeError::Read {
        path: path.to_path_buf(),
        source,
    }
}

/// Replace `live` with the bytes of `scratch` via temp file + rename.
///
/// `permissions` are applied to the new file; `None` (a new page) copies the
/// scratch file's permissions.
fn write_atomic(
    scratch: &Path,
    live: &Path,
    permissions: Option<Permissions>,
) -> Result<(), MergeError> {
    let write_err = |source| MergeError::Write {
        path: live.to_path_buf(),
        source,
    };
    let bytes = fs::read(scratch).map_err(|e| read_error(scratch, e))?;
    let permissions = match permissions {
        Some(p) => p,
        None => fs::metadata(scratch)
            .map_err(|e| read_error(scratch, e))?
            .permissions(),
    };

    let dir = live.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    fs::set_permissions(tmp.path(), permissions).map_err(write_err)?;
    tmp.persist(live).map_err(|e| write_err(e.error))?;
    Ok(())
}
