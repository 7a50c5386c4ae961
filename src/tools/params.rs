//! Parameter types for external tool calls.
//!
//! These structs describe *what* a tool call is about, not *how* the tool is
//! run. They sit between the pipeline stages ([`crate::bundle`],
//! [`crate::inject`]) and the [`backend`](super::backend) traits, so tests can
//! swap in mock tools without touching stage logic.

use super::template::Bindings;
use std::path::PathBuf;

/// Placeholders a generator argument template may use.
pub const GENERATOR_PLACEHOLDERS: &[&str] = &["image", "settings", "metadata", "output_dir"];

/// Placeholders an injector argument template may use.
pub const INJECTOR_PLACEHOLDERS: &[&str] = &["metadata", "scratch_dir", "pages"];

/// The injector's list placeholder, always a standalone argument.
pub const PAGES_PLACEHOLDER: &str = "{pages}";

/// One bundle generation: everything the generator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateParams {
    /// Master picture.
    pub source_image: PathBuf,
    /// Generator settings artifact.
    pub settings: PathBuf,
    /// Directory the generated assets land in.
    pub output_dir: PathBuf,
    /// Metadata artifact path, inside `output_dir`.
    pub metadata: PathBuf,
}

impl GenerateParams {
    pub(crate) fn bindings(&self) -> Bindings<'_> {
        Bindings::new()
            .path("image", &self.source_image)
            .path("settings", &self.settings)
            .path("metadata", &self.metadata)
            .path("output_dir", &self.output_dir)
    }
}

/// One batched injection: every staged page of a single directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectParams {
    /// Bundle metadata artifact.
    pub metadata: PathBuf,
    /// Scratch directory holding the staged pages.
    pub scratch_dir: PathBuf,
    /// Staged page files, all directly inside `scratch_dir`.
    pub pages: Vec<PathBuf>,
}

impl InjectParams {
    pub(crate) fn bindings(&self) -> Bindings<'_> {
        Bindings::new()
            .path("metadata", &self.metadata)
            .path("scratch_dir", &self.scratch_dir)
            .paths("pages", &self.pages)
    }
}
