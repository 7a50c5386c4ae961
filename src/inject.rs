//! Staged injection for one directory.
//!
//! Copies every page of a [`PageDir`] into the scratch workspace, then calls
//! the [`TagInjector`] once with all staged copies. The live pages are never
//! handed to the injector; the returned [`StagedDir`] pairs each live page with
//! its injected scratch copy for [`crate::merge`].

use crate::bundle::BundleMetadata;
use crate::scan::PageDir;
use crate::tools::{InjectParams, TagInjector, ToolError};
use crate::workspace::{ScratchWorkspace, WorkspaceError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("Injector failed: {0}")]
    Tool(#[from] ToolError),
    #[error("Injector removed staged page {}", .0.display())]
    MissingOutput(PathBuf),
}

/// A live page and its scratch copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPage {
    pub live: PathBuf,
    pub scratch: PathBuf,
}

/// One directory after injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDir {
    /// Live directory.
    pub dir: PathBuf,
    /// Its mirror in the scratch workspace.
    pub scratch_dir: PathBuf,
    pub pages: Vec<StagedPage>,
}

/// Copy a directory's pages into the scratch workspace.
pub fn stage_directory(
    workspace: &ScratchWorkspace,
    dir: &PageDir,
) -> Result<StagedDir, InjectError> {
    let scratch_dir = workspace.to_scratch(&dir.dir)?;
    let pages = dir
        .pages
        .iter()
        .map(|live| {
            Ok(StagedPage {
                live: live.clone(),
                scratch: workspace.stage(live)?,
            })
        })
        .collect::<Result<Vec<_>, InjectError>>()?;
    Ok(StagedDir {
        dir: dir.dir.clone(),
        scratch_dir,
        pages,
    })
}

/// Stage a directory's pages and run the injector over them in one call.
pub fn inject_directory(
    injector: &impl TagInjector,
    workspace: &ScratchWorkspace,
    metadata: &BundleMetadata,
    dir: &PageDir,
) -> Result<StagedDir, InjectError> {
    let staged = stage_directory(workspace, dir)?;
    let params = InjectParams {
        metadata: metadata.path().to_path_buf(),
        scratch_dir: staged.scratch_dir.clone(),
        pages: staged.pages.iter().map(|p| p.scratch.clone()).collect(),
    };

    debug!(dir = %dir.dir.display(), pages = params.pages.len(), "injecting");
    injector.inject(&params)?;

    if let Some(missing) = staged.pages.iter().find(|p| !p.scratch.is_file()) {
        return Err(InjectError::MissingOutput(missing.scratch.clone()));
    }
    Ok(staged)
}
