//! One favicon-stage run, end to end.
//!
//! ```text
//! canonicalize site root
//! create scratch workspace
//! scan site tree                → page dirs + skipped dirs
//! generate bundle (once)        → metadata artifact
//! for each page dir:
//!     stage → inject → merge    → MergeReport
//! remove scratch workspace
//! ```
//!
//! Everything runs sequentially on the calling thread. The workspace is a
//! local owned by [`run`]; every return path drops it, so the scratch root
//! never outlives the run.
//!
//! ## Failures
//!
//! Setup failures (workspace, scan, bundle) abort before the live tree is
//! touched. A failing directory aborts the run when `fail_fast` is set;
//! directories merged before it stay merged. Without `fail_fast` the failure
//! is reported as a [`PipelineEvent::DirectoryFailed`], the remaining
//! directories still run, and the run ends with
//! [`PipelineError::DirectoriesFailed`].
//!
//! ## Interruption
//!
//! [`Interrupt`] is checked between steps, between a directory's injection
//! and its merge, and after every tool failure (a Ctrl-C reaches the child
//! process too, which then fails). An interrupted run returns
//! [`PipelineError::Interrupted`] regardless of `fail_fast`, even when the
//! signal only arrived during the last directory.

use crate::bundle::{self, BundleError, BundleMetadata};
use crate::config::StageConfig;
use crate::inject::{self, InjectError};
use crate::merge::{self, MergeError, MergePolicy, MergeReport};
use crate::scan::{self, PageDir, ScanError, ScanResult};
use crate::tools::{BundleGenerator, GenerateParams, TagInjector};
use crate::workspace::{ScratchWorkspace, WorkspaceError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error("Failed while processing {}: {source}", .dir.display())]
    Directory {
        dir: PathBuf,
        #[source]
        source: DirectoryError,
    },
    #[error("{} directories failed: {}", .failed.len(), display_paths(.failed))]
    DirectoriesFailed { failed: Vec<PathBuf> },
    #[error("Interrupted{}", interrupted_suffix(.dir.as_deref()))]
    Interrupted { dir: Option<PathBuf> },
}

/// Why a single directory could not be processed.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error(transparent)]
    Inject(#[from] InjectError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    /// The interrupt flag was raised while the injector ran.
    #[error("interrupted before merge")]
    Interrupted,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn interrupted_suffix(dir: Option<&Path>) -> String {
    match dir {
        Some(dir) => format!(" while processing {}", dir.display()),
        None => String::new(),
    }
}

/// Shared cancellation flag, set from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Resolved, absolute inputs for one run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub site_root: PathBuf,
    pub page_extensions: Vec<String>,
    pub source_image: PathBuf,
    pub generator_settings: PathBuf,
    /// Bundle directory, relative to the site root.
    pub bundle_dir: PathBuf,
    /// Metadata artifact, relative to the bundle directory.
    pub metadata_file: PathBuf,
    pub merge_policy: MergePolicy,
    pub workspace_prefix: String,
    pub workspace_parent: Option<PathBuf>,
    pub fail_fast: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &StageConfig, project: &Path) -> Self {
        Self {
            site_root: config.site_root_in(project),
            page_extensions: config.page_extensions.clone(),
            source_image: project.join(&config.bundle.source_image),
            generator_settings: project.join(&config.bundle.settings),
            bundle_dir: PathBuf::from(&config.bundle.output_dir),
            metadata_file: PathBuf::from(&config.bundle.metadata_file),
            merge_policy: config.merge.policy,
            workspace_prefix: config.workspace.prefix.clone(),
            workspace_parent: config.workspace_parent_in(project),
            fail_fast: config.pipeline.fail_fast,
        }
    }

    fn generate_params(&self, site_root: &Path) -> GenerateParams {
        let output_dir = site_root.join(&self.bundle_dir);
        GenerateParams {
            source_image: self.source_image.clone(),
            settings: self.generator_settings.clone(),
            metadata: output_dir.join(&self.metadata_file),
            output_dir,
        }
    }
}

/// Progress reported while a run is in flight.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    WorkspaceCreated {
        root: PathBuf,
    },
    Scanned {
        site_root: PathBuf,
        page_dirs: usize,
        pages: usize,
    },
    BundleGenerated {
        metadata: PathBuf,
        tags: usize,
    },
    DirectorySkipped {
        dir: PathBuf,
    },
    DirectoryMerged {
        index: usize,
        total: usize,
        report: MergeReport,
    },
    DirectoryFailed {
        dir: PathBuf,
        error: String,
    },
}

/// Result of a successful run.
#[derive(Debug)]
pub struct RunSummary {
    pub site_root: PathBuf,
    /// Where the (now removed) scratch workspace lived.
    pub scratch_root: PathBuf,
    pub reports: Vec<MergeReport>,
    pub skipped: Vec<PathBuf>,
}

impl RunSummary {
    pub fn pages_total(&self) -> usize {
        self.reports.iter().map(|r| r.pages.len()).sum()
    }

    pub fn pages_written(&self) -> usize {
        self.reports.iter().map(MergeReport::written).sum()
    }
}

fn emit(events: &Option<Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

fn check_interrupt(interrupt: &Interrupt, dir: Option<&Path>) -> Result<(), PipelineError> {
    if interrupt.is_set() {
        Err(PipelineError::Interrupted {
            dir: dir.map(Path::to_path_buf),
        })
    } else {
        Ok(())
    }
}

/// Canonical site root, or [`ScanError::MissingRoot`].
fn resolve_site_root(site_root: &Path) -> Result<PathBuf, ScanError> {
    site_root
        .canonicalize()
        .map_err(|_| ScanError::MissingRoot(site_root.to_path_buf()))
}

/// Scan only: which directories a run would inject and which it would skip.
pub fn check(settings: &PipelineSettings) -> Result<ScanResult, PipelineError> {
    let site_root = resolve_site_root(&settings.site_root)?;
    Ok(scan::scan(&site_root, &settings.page_extensions)?)
}

/// Run the whole pipeline.
pub fn run(
    settings: &PipelineSettings,
    generator: &impl BundleGenerator,
    injector: &impl TagInjector,
    interrupt: &Interrupt,
    events: Option<Sender<PipelineEvent>>,
) -> Result<RunSummary, PipelineError> {
    let site_root = resolve_site_root(&settings.site_root)?;
    let workspace = ScratchWorkspace::create(
        &site_root,
        &settings.workspace_prefix,
        settings.workspace_parent.as_deref(),
    )?;
    let scratch_root = workspace.root().to_path_buf();
    emit(
        &events,
        PipelineEvent::WorkspaceCreated {
            root: scratch_root.clone(),
        },
    );
    check_interrupt(interrupt, None)?;

    let scanned = scan::scan(&site_root, &settings.page_extensions)?;
    info!(
        page_dirs = scanned.page_dirs.len(),
        pages = scanned.page_count(),
        "scanned site"
    );
    emit(
        &events,
        PipelineEvent::Scanned {
            site_root: site_root.clone(),
            page_dirs: scanned.page_dirs.len(),
            pages: scanned.page_count(),
        },
    );
    for dir in &scanned.empty_dirs {
        emit(&events, PipelineEvent::DirectorySkipped { dir: dir.clone() });
    }
    check_interrupt(interrupt, None)?;

    let params = settings.generate_params(&site_root);
    let metadata = match bundle::generate_bundle(generator, &params) {
        Ok(metadata) => metadata,
        Err(e) => {
            check_interrupt(interrupt, None)?;
            return Err(e.into());
        }
    };
    emit(
        &events,
        PipelineEvent::BundleGenerated {
            metadata: metadata.path().to_path_buf(),
            tags: metadata.tag_count(),
        },
    );

    let total = scanned.page_dirs.len();
    let mut reports = Vec::with_capacity(total);
    let mut failed = Vec::new();
    for (i, dir) in scanned.page_dirs.iter().enumerate() {
        check_interrupt(interrupt, Some(&dir.dir))?;
        match process_directory(
            injector,
            &workspace,
            &metadata,
            dir,
            settings.merge_policy,
            interrupt,
        ) {
            Ok(report) => {
                info!(
                    dir = %dir.dir.display(),
                    written = report.written(),
                    pages = report.pages.len(),
                    "merged directory"
                );
                emit(
                    &events,
                    PipelineEvent::DirectoryMerged {
                        index: i + 1,
                        total,
                        report: report.clone(),
                    },
                );
                reports.push(report);
            }
            Err(source) => {
                check_interrupt(interrupt, Some(&dir.dir))?;
                if settings.fail_fast {
                    return Err(PipelineError::Directory {
                        dir: dir.dir.clone(),
                        source,
                    });
                }
                warn!(dir = %dir.dir.display(), error = %source, "directory failed");
                emit(
                    &events,
                    PipelineEvent::DirectoryFailed {
                        dir: dir.dir.clone(),
                        error: source.to_string(),
                    },
                );
                failed.push(dir.dir.clone());
            }
        }
    }

    check_interrupt(interrupt, None)?;
    if !failed.is_empty() {
        return Err(PipelineError::DirectoriesFailed { failed });
    }

    if let Err(e) = workspace.close() {
        warn!(root = %scratch_root.display(), error = %e, "failed to remove scratch workspace");
    }

    Ok(RunSummary {
        site_root,
        scratch_root,
        reports,
        skipped: scanned.empty_dirs,
    })
}

/// Stage, inject, and merge one directory.
///
/// Nothing is merged when the interrupt flag went up during injection, even
/// if the injector itself succeeded.
fn process_directory(
    injector: &impl TagInjector,
    workspace: &ScratchWorkspace,
    metadata: &BundleMetadata,
    dir: &PageDir,
    policy: MergePolicy,
    interrupt: &Interrupt,
) -> Result<MergeReport, DirectoryError> {
    let staged = inject::inject_directory(injector, workspace, metadata, dir)?;
    if interrupt.is_set() {
        return Err(DirectoryError::Interrupted);
    }
    Ok(merge::merge_directory(&staged, policy)?)
}
