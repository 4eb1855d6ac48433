//! Label maps: translating raw node and edge labels into display names.
//!
//! A label map file has one `key<sep>value` pair per line. Blank lines are
//! skipped. A missing file is not an error; rendering falls back to the raw
//! labels.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_SEPARATOR: &str = "\t";

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}:{line}: expected exactly two fields separated by {separator:?}")]
    Malformed {
        path: PathBuf,
        line: usize,
        separator: String,
    },
    #[error("label separator must not be empty")]
    EmptySeparator,
}

/// Raw label to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    entries: BTreeMap<String, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Display name for `label`, or the label itself when unmapped.
    pub fn resolve<'a>(&'a self, label: &'a str) -> &'a str {
        self.get(label).unwrap_or(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse label map text. `path` is only used for error messages.
pub fn parse_label_map(content: &str, separator: &str, path: &Path) -> Result<LabelMap, LabelError> {
    if separator.is_empty() {
        return Err(LabelError::EmptySeparator);
    }

    let mut map = LabelMap::new();
    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(separator).collect();
        let [key, value] = fields.as_slice() else {
            return Err(LabelError::Malformed {
                path: path.to_path_buf(),
                line: i + 1,
                separator: separator.to_string(),
            });
        };
        if let Some(previous) = map.insert(key.trim(), value.trim()) {
            warn!(
                path = %path.display(),
                line = i + 1,
                key = key.trim(),
                previous = %previous,
                "duplicate label key, keeping the later value"
            );
        }
    }
    Ok(map)
}

/// Read a label map file. A missing file yields an empty map with a warning.
pub fn read_label_map(path: &Path, separator: &str) -> Result<LabelMap, LabelError> {
    if !path.exists() {
        warn!(path = %path.display(), "label file not found, using raw labels");
        return Ok(LabelMap::new());
    }
    let content = fs::read_to_string(path).map_err(|source| LabelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_label_map(&content, separator, path)
}
