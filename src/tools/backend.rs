//! External tool traits and shared error type.
//!
//! The pipeline talks to its two collaborators only through [`BundleGenerator`]
//! and [`TagInjector`]. The production implementation of both is
//! [`CommandTool`](super::command::CommandTool), which spawns a configured
//! program; tests use the recording mocks in `tests`.

use super::params::{GenerateParams, InjectParams};
use super::template::TemplateError;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{program} not found: {source}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}{}", stderr_suffix(.stderr))]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("bad argument template: {0}")]
    Template(#[from] TemplateError),
    /// Raised by in-process tool implementations.
    #[error("{0}")]
    Other(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Produces the favicon bundle and its metadata artifact.
pub trait BundleGenerator {
    fn generate(&self, params: &GenerateParams) -> Result<(), ToolError>;
}

/// Rewrites staged pages in place to carry the bundle's markup.
pub trait TagInjector {
    fn inject(&self, params: &InjectParams) -> Result<(), ToolError>;
}
