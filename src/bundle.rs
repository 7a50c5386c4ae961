//! Favicon bundle generation.
//!
//! Runs the configured [`BundleGenerator`] exactly once per pipeline run and
//! checks that it left a usable metadata artifact behind. Everything after
//! this step reads that artifact, so any failure here aborts the run before
//! a single page is touched.
//!
//! The artifact is opaque to this crate beyond "a JSON object". It is handed
//! to the injector by path; [`BundleMetadata::html_code`] exists for
//! reporting only.

use crate::tools::{BundleGenerator, GenerateParams, ToolError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Missing {what}: {}", .path.display())]
    MissingInput { what: &'static str, path: PathBuf },
    #[error("Failed to create bundle directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Bundle generator failed: {0}")]
    Tool(#[from] ToolError),
    #[error("Bundle generator did not produce the metadata artifact {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("Invalid metadata artifact {}: {reason}", .path.display())]
    InvalidArtifact { path: PathBuf, reason: String },
    #[error("Failed to remove stale metadata artifact {}: {source}", .path.display())]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The parsed metadata artifact.
#[derive(Debug, Clone)]
pub struct BundleMetadata {
    path: PathBuf,
    data: Map<String, Value>,
}

impl BundleMetadata {
    /// Read and validate the artifact at `path`.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        if !path.is_file() {
            return Err(BundleError::MissingArtifact(path.to_path_buf()));
        }
        let invalid = |reason: String| BundleError::InvalidArtifact {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        match value {
            Value::Object(data) => Ok(Self {
                path: path.to_path_buf(),
                data,
            }),
            _ => Err(invalid("expected a JSON object".to_string())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The markup the injector will add, when the generator records it.
    pub fn html_code(&self) -> Option<&str> {
        self.data
            .get("favicon")
            .and_then(|f| f.get("html_code"))
            .and_then(Value::as_str)
    }

    /// Number of markup lines in [`html_code`](Self::html_code).
    pub fn tag_count(&self) -> usize {
        self.html_code()
            .map(|code| code.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0)
    }
}

/// Generate the favicon bundle and load its metadata artifact.
pub fn generate_bundle(
    generator: &impl BundleGenerator,
    params: &GenerateParams,
) -> Result<BundleMetadata, BundleError> {
    require(&params.source_image, "source image")?;
    require(&params.settings, "generator settings")?;

    fs::create_dir_all(&params.output_dir).map_err(|source| BundleError::CreateDir {
        path: params.output_dir.clone(),
        source,
    })?;
    // A stale artifact from a previous run must not mask a generator that
    // silently wrote nothing.
    match fs::remove_file(&params.metadata) {
        Ok(()) => debug!(path = %params.metadata.display(), "removed stale metadata artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(BundleError::RemoveStale {
                path: params.metadata.clone(),
                source,
            });
        }
    }

    info!(output_dir = %params.output_dir.display(), "generating favicon bundle");
    generator.generate(params)?;

    let metadata = BundleMetadata::load(&params.metadata)?;
    debug!(tags = metadata.tag_count(), "loaded metadata artifact");
    Ok(metadata)
}

fn require(path: &Path, what: &'static str) -> Result<(), BundleError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BundleError::MissingInput {
            what,
            path: path.to_path_buf(),
        })
    }
}
