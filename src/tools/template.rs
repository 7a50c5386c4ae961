//! Argument templates for external tools.
//!
//! A template is a list of arguments that may contain `{name}` placeholders,
//! where `name` is lowercase ASCII letters and underscores. Anything else
//! between braces is literal text, so JSON snippets pass through untouched.
//!
//! Scalar placeholders are substituted inside an argument. A list placeholder
//! must be a whole argument and expands to one argument per value:
//!
//! ```text
//! ["inject", "{metadata}", "{pages}"]
//!   → ["inject", "/site/favicon/data.json", "/tmp/s/a/index.html", "/tmp/s/a/about.html"]
//! ```
//!
//! Substitution works on `OsStr`, so non-UTF-8 paths survive intact.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    Unknown(String),
    #[error("list placeholder {{{0}}} must be a standalone argument")]
    ListNotStandalone(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Piece<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

fn is_placeholder_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

fn pieces(arg: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut rest = arg;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_placeholder_name(&after[..end]) => {
                if start > 0 {
                    out.push(Piece::Literal(&rest[..start]));
                }
                out.push(Piece::Placeholder(&after[..end]));
                rest = &after[end + 1..];
            }
            _ => {
                out.push(Piece::Literal(&rest[..=start]));
                rest = after;
            }
        }
    }
    if !rest.is_empty() {
        out.push(Piece::Literal(rest));
    }
    out
}

/// All placeholder names used across a template, in order of appearance.
pub fn placeholders(args: &[String]) -> Vec<&str> {
    args.iter()
        .flat_map(|arg| pieces(arg))
        .filter_map(|piece| match piece {
            Piece::Placeholder(name) => Some(name),
            Piece::Literal(_) => None,
        })
        .collect()
}

/// Values available to one expansion.
#[derive(Debug, Default)]
pub struct Bindings<'a> {
    scalars: Vec<(&'static str, &'a OsStr)>,
    list: Option<(&'static str, &'a [PathBuf])>,
}

impl<'a> Bindings<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, name: &'static str, value: &'a Path) -> Self {
        self.scalars.push((name, value.as_os_str()));
        self
    }

    pub fn paths(mut self, name: &'static str, values: &'a [PathBuf]) -> Self {
        self.list = Some((name, values));
        self
    }

    fn scalar(&self, name: &str) -> Option<&'a OsStr> {
        self.scalars
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// Expand a template into concrete arguments.
pub fn expand(args: &[String], bindings: &Bindings<'_>) -> Result<Vec<OsString>, TemplateError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        let parts = pieces(arg);

        if let ([Piece::Placeholder(name)], Some((list_name, values))) =
            (parts.as_slice(), bindings.list)
        {
            if *name == list_name {
                out.extend(values.iter().map(|v| v.as_os_str().to_os_string()));
                continue;
            }
        }

        let mut expanded = OsString::new();
        for part in parts {
            match part {
                Piece::Literal(text) => expanded.push(text),
                Piece::Placeholder(name) => {
                    if let Some(value) = bindings.scalar(name) {
                        expanded.push(value);
                    } else if bindings.list.is_some_and(|(list_name, _)| list_name == name) {
                        return Err(TemplateError::ListNotStandalone(name.to_string()));
                    } else {
                        return Err(TemplateError::Unknown(name.to_string()));
                    }
                }
            }
        }
        out.push(expanded);
    }
    Ok(out)
}
