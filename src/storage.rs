//! Loading graph databases and query sets from disk.
//!
//! A graph file is YAML or JSON with a top-level `graphs` list. A directory is
//! walked recursively and every `.yaml`, `.yml` and `.json` file in it is
//! loaded in path order, so the database order is stable across runs.

use crate::algorithm::SearchOutcome;
use crate::pattern::{GraphPattern, PatternError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid graph {index} in {path}: {source}")]
    InvalidGraph {
        path: PathBuf,
        index: usize,
        source: PatternError,
    },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// On-disk container for a list of graphs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub graphs: Vec<GraphPattern>,
}

/// Everything one `search` run produced, as saved for later rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub generated_at: DateTime<Utc>,
    pub directed: bool,
    pub matcher: String,
    pub database_size: usize,
    pub queries: Vec<SearchOutcome>,
}

fn is_graph_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "yaml" || ext == "yml" || ext == "json")
        .unwrap_or(false)
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|ext| ext == "json").unwrap_or(false)
}

/// Parse one graph file and validate every graph in it.
pub fn load_graph_file(path: &Path) -> Result<Vec<GraphPattern>, StorageError> {
    let content = fs::read_to_string(path)?;
    let file: GraphFile = if is_json(path) {
        serde_json::from_str(&content).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|source| StorageError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };

    for (index, graph) in file.graphs.iter().enumerate() {
        graph
            .validate()
            .map_err(|source| StorageError::InvalidGraph {
                path: path.to_path_buf(),
                index,
                source,
            })?;
    }
    Ok(file.graphs)
}

/// Load a graph database from a file or a directory of graph files.
pub fn load_database(path: &Path) -> Result<Vec<GraphPattern>, StorageError> {
    if !path.is_dir() {
        return load_graph_file(path);
    }

    let mut graphs = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_graph_file(entry.path()) {
            graphs.extend(load_graph_file(entry.path())?);
        }
    }
    tracing::debug!(path = %path.display(), graphs = graphs.len(), "loaded graph directory");
    Ok(graphs)
}

/// Load the queries to reformulate. Same format as a database.
pub fn load_queries(path: &Path) -> Result<Vec<GraphPattern>, StorageError> {
    load_database(path)
}

pub fn load_report(path: &Path) -> Result<SearchReport, StorageError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_report(path: &Path, report: &SearchReport) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(report).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json)?;
    Ok(())
}
