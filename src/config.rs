//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `favicon.toml`. The file lives in
//! the project directory (the directory the site generator was run from) and
//! every relative path inside it is resolved against that directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site_root = "public"          # Generated site, relative to the project
//! page_extensions = ["html"]    # Files that receive injected markup
//!
//! [bundle]
//! source_image = "favicon.png"          # Master picture
//! settings = "favicon-settings.json"    # Generator settings
//! output_dir = "favicon"                # Relative to site_root
//! metadata_file = "favicon-data.json"   # Written inside output_dir
//!
//! [generator]
//! program = "real-favicon"
//! args = ["generate", "{settings}", "{metadata}", "{output_dir}"]
//!
//! [injector]
//! program = "real-favicon"
//! args = ["inject", "{metadata}", "{scratch_dir}", "{pages}"]
//!
//! [merge]
//! policy = "newer"              # "newer" or "content"
//!
//! [workspace]
//! prefix = ".favicon-stage-"    # Scratch directory name prefix
//! # parent = "/var/tmp"         # Default: system temp directory
//!
//! [pipeline]
//! fail_fast = true              # Abort on the first failing directory
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. User values are merged on top of the stock
//! defaults at the TOML level, so overriding `injector.program` keeps the
//! default `injector.args`. Unknown keys are rejected to catch typos early.

use crate::merge::MergePolicy;
use crate::tools::params::{GENERATOR_PLACEHOLDERS, INJECTOR_PLACEHOLDERS, PAGES_PLACEHOLDER};
use crate::tools::template;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the project directory.
pub const CONFIG_FILENAME: &str = "favicon.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `favicon.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    /// Generated site directory, relative to the project directory.
    pub site_root: String,
    /// Extensions (without dot, case-insensitive) of page files.
    pub page_extensions: Vec<String>,
    /// Favicon bundle inputs and output layout.
    pub bundle: BundleConfig,
    /// External bundle generator invocation.
    pub generator: ToolConfig,
    /// External tag injector invocation.
    pub injector: ToolConfig,
    /// Copy-back rule for injected pages.
    pub merge: MergeConfig,
    /// Scratch workspace placement.
    pub workspace: WorkspaceConfig,
    /// Failure policy.
    pub pipeline: PipelineConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            site_root: "public".to_string(),
            page_extensions: vec!["html".to_string()],
            bundle: BundleConfig::default(),
            generator: ToolConfig::default_generator(),
            injector: ToolConfig::default_injector(),
            merge: MergeConfig::default(),
            workspace: WorkspaceConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Favicon bundle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    /// Source picture, relative to the project directory.
    pub source_image: String,
    /// Generator settings artifact, relative to the project directory.
    pub settings: String,
    /// Where the generated assets land, relative to the site root.
    pub output_dir: String,
    /// Metadata artifact file name, written inside `output_dir`.
    pub metadata_file: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            source_image: "favicon.png".to_string(),
            settings: "favicon-settings.json".to_string(),
            output_dir: "favicon".to_string(),
            metadata_file: "favicon-data.json".to_string(),
        }
    }
}

/// An external program plus its argument template.
///
/// Arguments may contain `{name}` placeholders that are filled in per call.
/// See [`crate::tools::template`] for the expansion rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolConfig {
    pub fn default_generator() -> Self {
        Self {
            program: "real-favicon".to_string(),
            args: ["generate", "{settings}", "{metadata}", "{output_dir}"]
                .map(String::from)
                .to_vec(),
        }
    }

    pub fn default_injector() -> Self {
        Self {
            program: "real-favicon".to_string(),
            args: ["inject", "{metadata}", "{scratch_dir}", "{pages}"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    pub policy: MergePolicy,
}

/// Scratch workspace placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Prefix of the uniquely named scratch directory.
    pub prefix: String,
    /// Directory to create the scratch root in. When absent, the system
    /// temp directory is used. Relative paths resolve against the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            prefix: ".favicon-stage-".to_string(),
            parent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Abort the run on the first directory whose injection or merge fails.
    /// When false, failures are collected and reported at the end.
    pub fail_fast: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { fail_fast: true }
    }
}

impl StageConfig {
    /// Validate config values are usable before anything runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_root.trim().is_empty() {
            return Err(ConfigError::Validation("site_root must not be empty".into()));
        }
        if self.page_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "page_extensions must not be empty".into(),
            ));
        }
        for ext in &self.page_extensions {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "page_extensions entries are bare extensions like \"html\", got {ext:?}"
                )));
            }
        }
        for (key, value) in [
            ("bundle.output_dir", &self.bundle.output_dir),
            ("bundle.metadata_file", &self.bundle.metadata_file),
        ] {
            let path = Path::new(value);
            if value.is_empty()
                || path.is_absolute()
                || path.components().any(|c| c == Component::ParentDir)
            {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a non-empty relative path without `..`"
                )));
            }
        }
        validate_tool("generator", &self.generator, GENERATOR_PLACEHOLDERS)?;
        validate_tool("injector", &self.injector, INJECTOR_PLACEHOLDERS)?;

        let injector_args = &self.injector.args;
        if injector_args
            .iter()
            .any(|a| a != PAGES_PLACEHOLDER && a.contains(PAGES_PLACEHOLDER))
        {
            return Err(ConfigError::Validation(format!(
                "{PAGES_PLACEHOLDER} expands to several arguments and cannot be embedded in another argument"
            )));
        }
        if !injector_args.iter().any(|a| a == PAGES_PLACEHOLDER) {
            return Err(ConfigError::Validation(format!(
                "injector.args must pass the staged pages as a standalone {PAGES_PLACEHOLDER} argument"
            )));
        }

        if self.workspace.prefix.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "workspace.prefix must be a plain file name prefix".into(),
            ));
        }
        Ok(())
    }

    /// Site root resolved against the project directory.
    pub fn site_root_in(&self, project: &Path) -> PathBuf {
        project.join(&self.site_root)
    }

    /// Workspace parent resolved against the project directory.
    pub fn workspace_parent_in(&self, project: &Path) -> Option<PathBuf> {
        self.workspace.parent.as_ref().map(|p| project.join(p))
    }
}

fn validate_tool(name: &str, tool: &ToolConfig, allowed: &[&str]) -> Result<(), ConfigError> {
    if tool.program.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{name}.program must not be empty"
        )));
    }
    let used = template::placeholders(&tool.args);
    if let Some(unknown) = used.iter().find(|p| !allowed.contains(*p)) {
        return Err(ConfigError::Validation(format!(
            "{name}.args uses unknown placeholder {{{unknown}}}; allowed: {}",
            allowed
                .iter()
                .map(|p| format!("{{{p}}}"))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    if !used.contains(&"metadata") {
        return Err(ConfigError::Validation(format!(
            "{name}.args must reference {{metadata}}"
        )));
    }
    Ok(())
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(StageConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<StageConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: StageConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `favicon.toml` from the project directory.
///
/// A missing file yields the validated stock defaults.
pub fn load_config(project: &Path) -> Result<StageConfig, ConfigError> {
    let path = project.join(CONFIG_FILENAME);
    let overlay = if path.exists() {
        Some(read_toml(&path)?)
    } else {
        None
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Load an explicitly named config file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<StageConfig, ConfigError> {
    let overlay = read_toml(path)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

fn read_toml(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Returns a fully-commented stock `favicon.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# favicon-stage configuration
# ===========================
# All settings are optional. Values shown below are the defaults.
# Relative paths resolve against the project directory (--project).
# Unknown keys cause an error.

# Generated site to rewrite.
site_root = "public"

# Extensions of page files that receive the favicon markup.
page_extensions = ["html"]

# ---------------------------------------------------------------------------
# Favicon bundle
# ---------------------------------------------------------------------------
[bundle]
# Master picture handed to the generator as {image}.
source_image = "favicon.png"

# Generator settings handed over as {settings}.
settings = "favicon-settings.json"

# Assets land here, relative to site_root ({output_dir}).
output_dir = "favicon"

# Metadata artifact written inside output_dir ({metadata}).
metadata_file = "favicon-data.json"

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
# Placeholders available to the generator: {image} {settings} {metadata} {output_dir}
[generator]
program = "real-favicon"
args = ["generate", "{settings}", "{metadata}", "{output_dir}"]

# Placeholders available to the injector: {metadata} {scratch_dir} {pages}
# {pages} must be its own argument; it expands to every staged page of one
# directory so the injector runs once per directory.
[injector]
program = "real-favicon"
args = ["inject", "{metadata}", "{scratch_dir}", "{pages}"]

# ---------------------------------------------------------------------------
# Merge
# ---------------------------------------------------------------------------
[merge]
# "newer":   copy an injected page back only if it is strictly newer than the
#            live page and its content differs.
# "content": copy back whenever the content differs, ignoring timestamps.
policy = "newer"

# ---------------------------------------------------------------------------
# Scratch workspace
# ---------------------------------------------------------------------------
[workspace]
prefix = ".favicon-stage-"
# Directory to create the scratch root in (default: system temp directory).
# Must not be inside site_root.
# parent = "/var/tmp"

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# Abort on the first failing directory. Set to false to keep going and
# report every failed directory at the end (the run still exits nonzero).
fail_fast = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_layout() {
        let config = StageConfig::default();
        assert_eq!(config.site_root, "public");
        assert_eq!(config.page_extensions, vec!["html"]);
        assert_eq!(config.bundle.output_dir, "favicon");
        assert_eq!(config.bundle.metadata_file, "favicon-data.json");
        assert_eq!(config.merge.policy, MergePolicy::Newer);
        assert!(config.pipeline.fail_fast);
        assert!(config.workspace.parent.is_none());
    }

    #[test]
    fn validate_default_config_passes() {
        StageConfig::default().validate().unwrap();
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site_root, "public");
        assert_eq!(config.injector.program, "real-favicon");
    }

    #[test]
    fn partial_tool_override_keeps_default_args() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[injector]
program = "/opt/favicon/bin/real-favicon"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.injector.program, "/opt/favicon/bin/real-favicon");
        assert_eq!(
            config.injector.args,
            vec!["inject", "{metadata}", "{scratch_dir}", "{pages}"]
        );
        assert_eq!(config.generator.program, "real-favicon");
    }

    #[test]
    fn load_config_reads_merge_policy_and_workspace() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
site_root = "dist"
page_extensions = ["html", "htm"]

[merge]
policy = "content"

[workspace]
parent = "scratch"

[pipeline]
fail_fast = false
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site_root_in(tmp.path()), tmp.path().join("dist"));
        assert_eq!(config.page_extensions, vec!["html", "htm"]);
        assert_eq!(config.merge.policy, MergePolicy::Content);
        assert_eq!(
            config.workspace_parent_in(tmp.path()),
            Some(tmp.path().join("scratch"))
        );
        assert!(!config.pipeline.fail_fast);
    }

    #[test]
    fn load_config_file_requires_the_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "site_root = [").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[merge]\npolcy = \"newer\"\n",
        )
        .unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_merge_policy_rejected() {
        let overlay: toml::Value = toml::from_str("[merge]\npolicy = \"always\"\n").unwrap();
        let result = resolve_config(stock_defaults_value(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn with_overlay(toml_src: &str) -> Result<StageConfig, ConfigError> {
        let overlay: toml::Value = toml::from_str(toml_src).unwrap();
        resolve_config(stock_defaults_value(), Some(overlay))
    }

    #[test]
    fn validate_rejects_empty_extensions() {
        let result = with_overlay("page_extensions = []");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_dotted_extension() {
        let result = with_overlay("page_extensions = [\".html\"]");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_absolute_output_dir() {
        let result = with_overlay("[bundle]\noutput_dir = \"/srv/favicon\"");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_output_dir_escaping_site_root() {
        for dir in ["../assets", "favicon/../../assets"] {
            let result = with_overlay(&format!("[bundle]\noutput_dir = \"{dir}\""));
            match result {
                Err(ConfigError::Validation(msg)) => assert!(msg.contains("bundle.output_dir")),
                other => panic!("expected validation error for {dir}, got {other:?}"),
            }
        }
    }

    #[test]
    fn validate_rejects_unknown_placeholder() {
        let result = with_overlay("[generator]\nargs = [\"{metadata}\", \"{pages}\"]");
        match result {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("{pages}")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_requires_pages_in_injector() {
        let result = with_overlay("[injector]\nargs = [\"inject\", \"{metadata}\"]");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_embedded_pages() {
        let result = with_overlay("[injector]\nargs = [\"{metadata}\", \"--pages={pages}\"]");
        match result {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("embedded")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_requires_metadata_placeholder() {
        let result = with_overlay("[injector]\nargs = [\"{pages}\"]");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_empty_program() {
        let result = with_overlay("[generator]\nprogram = \" \"");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_prefix_with_separator() {
        let result = with_overlay("[workspace]\nprefix = \"tmp/stage-\"");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn literal_braces_are_not_placeholders() {
        let config = with_overlay("[generator]\nargs = [\"--json={\\\"a\\\":1}\", \"{metadata}\"]")
            .unwrap();
        assert_eq!(config.generator.args[0], "--json={\"a\":1}");
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_arrays_replace_wholesale() {
        let base: toml::Value = toml::from_str("list = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("list = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["list"].as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let parsed: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value(), Some(parsed)).unwrap();
        let defaults = StageConfig::default();
        assert_eq!(config.site_root, defaults.site_root);
        assert_eq!(config.generator.args, defaults.generator.args);
        assert_eq!(config.injector.args, defaults.injector.args);
        assert_eq!(config.merge.policy, defaults.merge.policy);
        assert_eq!(config.workspace.prefix, defaults.workspace.prefix);
    }

    #[test]
    fn stock_defaults_value_is_table() {
        let value = stock_defaults_value();
        assert!(value.is_table());
        assert!(value.get("workspace").unwrap().get("parent").is_none());
    }
}
