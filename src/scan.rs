//! Site tree scanning.
//!
//! Walks every directory reachable from the site root (the root included) and
//! classifies each one on its own: a directory is a [`PageDir`] when it
//! *directly* contains at least one page file, otherwise it is skipped. No
//! directory's classification depends on its children, so the cost of the
//! later stages is proportional to the number of pages, not directories.
//!
//! ## What counts as a page
//!
//! A regular file whose extension matches one of the configured page
//! extensions, compared case-insensitively (`index.HTML` is a page when
//! `html` is configured). Symlinks are neither followed during the walk nor
//! treated as pages, so the merge step never replaces a link with a file.
//!
//! ## Output
//!
//! ```text
//! public/                 → PageDir { pages: [index.html] }
//! ├── index.html
//! ├── a/                  → PageDir { pages: [about.html, index.html] }
//! │   ├── index.html
//! │   ├── about.html
//! │   └── sub/            → PageDir { pages: [post.html] }
//! │       └── post.html
//! └── b/                  → skipped (no pages)
//!     └── style.css
//! ```
//!
//! Both lists are sorted by path so reports are stable between runs.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Site root does not exist or is not a directory: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("Failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to list {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A directory that directly contains page files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDir {
    pub dir: PathBuf,
    /// Page files directly inside `dir`, sorted.
    pub pages: Vec<PathBuf>,
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub page_dirs: Vec<PageDir>,
    /// Directories without any page file of their own.
    pub empty_dirs: Vec<PathBuf>,
}

impl ScanResult {
    pub fn page_count(&self) -> usize {
        self.page_dirs.iter().map(|d| d.pages.len()).sum()
    }
}

/// Scan the site tree rooted at `root`.
pub fn scan(root: &Path, extensions: &[String]) -> Result<ScanResult, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let mut result = ScanResult::default();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.into_path();
        let pages = collect_pages(&dir, extensions)?;
        if pages.is_empty() {
            debug!(dir = %dir.display(), "no pages, skipping");
            result.empty_dirs.push(dir);
        } else {
            debug!(dir = %dir.display(), pages = pages.len(), "found pages");
            result.page_dirs.push(PageDir { dir, pages });
        }
    }

    result.page_dirs.sort_by(|a, b| a.dir.cmp(&b.dir));
    result.empty_dirs.sort();
    Ok(result)
}

/// Page files directly inside `dir` (non-recursive).
fn collect_pages(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, ScanError> {
    let read_err = |source| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut pages = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_type = entry.file_type().map_err(read_err)?;
        let path = entry.path();
        if file_type.is_file() && is_page(&path, extensions) {
            pages.push(path);
        }
    }
    pages.sort();
    Ok(pages)
}

/// Whether `path` has one of the page extensions (case-insensitive).
pub fn is_page(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}
