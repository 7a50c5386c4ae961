//! Shared test utilities for the favicon-stage test suite.
//!
//! Provides a throwaway project layout (`project/public/...`), page builders
//! with controlled modification times, and the fake favicon markup used by the
//! mock tools in [`crate::tools::backend::tests`].
//!
//! # Usage
//!
//! ```text
//! use crate::test_helpers::*;
//!
//! let site = SiteFixture::new();
//! site.page("a/index.html");
//! site.page("a/sub/post.html");
//! site.dir("b");
//!
//! let scan = scan(&site.site_root(), &html()).unwrap();
//! assert_eq!(page_dir_names(&scan, &site.site_root()), vec!["a", "a/sub"]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::scan::ScanResult;

/// Markup the mock injector adds to every page.
pub const INJECTED_TAG: &str = r#"<link rel="icon" href="/favicon/favicon.ico">"#;

/// A page as a site generator would emit it, before injection.
pub const PLAIN_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>t</title></head><body></body></html>\n";

/// Insert [`INJECTED_TAG`] after `<head>`, unless it is already there.
pub fn inject_tag(html: &str) -> String {
    if html.contains(INJECTED_TAG) {
        html.to_string()
    } else {
        html.replacen("<head>", &format!("<head>{INJECTED_TAG}"), 1)
    }
}

/// Write a small but valid bundle metadata artifact.
pub fn write_metadata(path: &Path) {
    let json = serde_json::json!({
        "favicon": {
            "html_code": format!("{INJECTED_TAG}\n<meta name=\"theme-color\" content=\"#ffffff\">"),
        },
        "files_location": { "type": "path", "path": "/favicon" },
    });
    fs::write(path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
}

/// Default page extensions.
pub fn html() -> Vec<String> {
    vec!["html".to_string()]
}

/// Set a file's modification time.
pub fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn hours_ago(hours: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(hours * 3600)
}

pub fn hours_from_now(hours: u64) -> SystemTime {
    SystemTime::now() + Duration::from_secs(hours * 3600)
}

// =========================================================================
// Project fixture
// =========================================================================

/// A temp project directory with a `public/` site root, a source image, and
/// a settings artifact.
pub struct SiteFixture {
    tmp: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("public")).unwrap();
        fs::write(tmp.path().join("favicon.png"), b"\x89PNG fake").unwrap();
        fs::write(tmp.path().join("favicon-settings.json"), "{}").unwrap();
        Self { tmp }
    }

    pub fn project(&self) -> &Path {
        self.tmp.path()
    }

    pub fn site_root(&self) -> PathBuf {
        self.tmp.path().join("public")
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.site_root().join(rel)
    }

    /// Create an (empty) directory under the site root.
    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Write a plain page, backdated by an hour so any fresh scratch copy is
    /// strictly newer regardless of filesystem timestamp granularity.
    pub fn page(&self, rel: &str) -> PathBuf {
        self.page_with(rel, PLAIN_PAGE)
    }

    pub fn page_with(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        set_mtime(&path, hours_ago(1));
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    pub fn is_injected(&self, rel: &str) -> bool {
        self.read(rel).contains(INJECTED_TAG)
    }
}

// =========================================================================
// Scan result extractors
// =========================================================================

/// Page directories relative to the site root, `"."` for the root itself.
pub fn page_dir_names(scan: &ScanResult, site_root: &Path) -> Vec<String> {
    scan.page_dirs
        .iter()
        .map(|d| relative_name(&d.dir, site_root))
        .collect()
}

/// Skipped directories relative to the site root.
pub fn empty_dir_names(scan: &ScanResult, site_root: &Path) -> Vec<String> {
    scan.empty_dirs
        .iter()
        .map(|d| relative_name(d, site_root))
        .collect()
}

fn relative_name(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap();
    if rel.as_os_str().is_empty() {
        ".".to_string()
    } else {
        rel.to_string_lossy().replace('\\', "/")
    }
}
