//! Tool backend that spawns a configured program.
//!
//! The program is resolved on `PATH` first (relative paths resolve against
//! the working directory), so a missing binary is reported as
//! [`ToolError::NotFound`] instead of a bare spawn error. The call blocks until
//! the child exits; there is no timeout. Stdout is logged at debug level and
//! stderr is kept for the error message.

use super::backend::{BundleGenerator, TagInjector, ToolError};
use super::params::{GenerateParams, InjectParams};
use super::template::{Bindings, expand};
use crate::config::ToolConfig;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Keep at most this many trailing stderr lines in error messages.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandTool {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: &Path) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.to_path_buf(),
        }
    }

    pub fn from_config(config: &ToolConfig, working_dir: &Path) -> Self {
        Self::new(config.program.clone(), config.args.clone(), working_dir)
    }

    fn run(&self, bindings: &Bindings<'_>) -> Result<(), ToolError> {
        let args = expand(&self.args, bindings)?;
        let program = which::which_in(
            &self.program,
            std::env::var_os("PATH"),
            &self.working_dir,
        )
        .map_err(|source| ToolError::NotFound {
            program: self.program.clone(),
            source,
        })?;

        debug!(program = %program.display(), ?args, "running external tool");
        let output = Command::new(&program)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(program = %self.program, "{}", stdout.trim_end());
        }
        if output.status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
            })
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

impl BundleGenerator for CommandTool {
    fn generate(&self, params: &GenerateParams) -> Result<(), ToolError> {
        self.run(&params.bindings())
    }
}

impl TagInjector for CommandTool {
    fn inject(&self, params: &InjectParams) -> Result<(), ToolError> {
        self.run(&params.bindings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn inject_params(tmp: &Path) -> InjectParams {
        InjectParams {
            metadata: tmp.join("meta.json"),
            scratch_dir: tmp.to_path_buf(),
            pages: vec![tmp.join("a.html"), tmp.join("b.html")],
        }
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let long: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&long);
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[test]
    fn missing_program_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let tool = CommandTool::new(
            "favicon-stage-no-such-tool",
            vec!["{metadata}".into(), "{pages}".into()],
            tmp.path(),
        );
        let result = tool.inject(&inject_params(tmp.path()));
        assert!(matches!(result, Err(ToolError::NotFound { .. })));
    }

    #[test]
    fn bad_template_fails_before_spawning() {
        let tmp = TempDir::new().unwrap();
        let tool = CommandTool::new("sh", vec!["{image}".into()], tmp.path());
        let result = tool.inject(&inject_params(tmp.path()));
        assert!(matches!(result, Err(ToolError::Template(_))));
    }

    #[cfg(unix)]
    #[test]
    fn pages_are_passed_as_separate_arguments() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("args.log");
        let script = format!("printf '%s\\n' \"$@\" > '{}'", log.display());
        let tool = CommandTool::new(
            "sh",
            vec![
                "-c".into(),
                script,
                "injector".into(),
                "{metadata}".into(),
                "{pages}".into(),
            ],
            tmp.path(),
        );
        tool.inject(&inject_params(tmp.path())).unwrap();

        let logged = std::fs::read_to_string(&log).unwrap();
        let args: Vec<&str> = logged.lines().collect();
        assert_eq!(args.len(), 3);
        assert!(args[0].ends_with("meta.json"));
        assert!(args[1].ends_with("a.html"));
        assert!(args[2].ends_with("b.html"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_failed_with_stderr() {
        let tmp = TempDir::new().unwrap();
        let tool = CommandTool::new(
            "sh",
            vec![
                "-c".into(),
                "echo 'bad settings' >&2; exit 3".into(),
                "{metadata}".into(),
            ],
            tmp.path(),
        );
        let err = tool
            .generate(&GenerateParams {
                source_image: tmp.path().join("favicon.png"),
                settings: tmp.path().join("settings.json"),
                output_dir: tmp.path().to_path_buf(),
                metadata: tmp.path().join("meta.json"),
            })
            .unwrap_err();
        match &err {
            ToolError::Failed { stderr, status, .. } => {
                assert_eq!(stderr, "bad settings");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(err.to_string().contains("bad settings"));
    }
}
