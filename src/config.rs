//! Search configuration read from YAML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. The CLI applies its flags on top of the loaded values.

use crate::algorithm::{LatticeAlgorithm, SearchBudget};
use crate::dot::DotOptions;
use crate::generalize::{CandidateGenerator, StructuralGeneralizer};
use crate::labels::{self, DEFAULT_SEPARATOR, LabelError};
use crate::matcher::{EmbeddingMatcher, GraphMatcher};
use crate::score::ScorePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatcherKind {
    /// Injective embedding: distinct pattern nodes map to distinct nodes.
    #[default]
    Subgraph,
    /// Any edge-preserving map.
    Homomorphism,
}

impl MatcherKind {
    pub fn name(self) -> &'static str {
        match self {
            MatcherKind::Subgraph => "subgraph",
            MatcherKind::Homomorphism => "homomorphism",
        }
    }

    pub fn build(self, directed: bool) -> Box<dyn GraphMatcher> {
        match self {
            MatcherKind::Subgraph => Box::new(EmbeddingMatcher::subgraph(directed)),
            MatcherKind::Homomorphism => Box::new(EmbeddingMatcher::homomorphism(directed)),
        }
    }
}

impl std::str::FromStr for MatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subgraph" => Ok(MatcherKind::Subgraph),
            "homomorphism" | "hom" => Ok(MatcherKind::Homomorphism),
            _ => Err(format!(
                "Invalid matcher: {}. Must be subgraph or homomorphism",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    #[default]
    Structural,
}

impl GeneratorKind {
    pub fn build(self) -> Box<dyn CandidateGenerator> {
        match self {
            GeneratorKind::Structural => Box::new(StructuralGeneralizer::default()),
        }
    }
}

impl std::str::FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "structural" => Ok(GeneratorKind::Structural),
            _ => Err(format!("Invalid generator: {}. Must be structural", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_expansions: Option<usize>,
    pub max_nodes: Option<usize>,
    pub max_depth: Option<u32>,
    pub time_limit_secs: Option<f64>,
}

impl BudgetConfig {
    pub fn to_budget(&self) -> SearchBudget {
        SearchBudget {
            max_expansions: self.max_expansions,
            max_nodes: self.max_nodes,
            max_depth: self.max_depth,
            time_limit: self
                .time_limit_secs
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// DOT output folder. No DOT files are written when unset.
    pub folder: Option<PathBuf>,
    pub prefix: String,
    /// Separator used by the label map files.
    pub separator: String,
    pub node_labels: Option<PathBuf>,
    pub edge_labels: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: None,
            prefix: "result".to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            node_labels: None,
            edge_labels: None,
        }
    }
}

impl OutputConfig {
    /// DOT options writing into `folder`, with the label maps loaded.
    pub fn dot_options(&self, folder: &Path, directed: bool) -> Result<DotOptions, LabelError> {
        let mut options = DotOptions::new(folder);
        options.prefix = self.prefix.clone();
        options.directed = directed;
        if let Some(path) = &self.node_labels {
            options.node_labels = labels::read_label_map(path, &self.separator)?;
        }
        if let Some(path) = &self.edge_labels {
            options.edge_labels = labels::read_label_map(path, &self.separator)?;
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub directed: bool,
    pub matcher: MatcherKind,
    pub generator: GeneratorKind,
    pub score: ScorePolicy,
    pub top_k: Option<usize>,
    pub budget: BudgetConfig,
    pub output: OutputConfig,
}

impl SearchConfig {
    /// An algorithm with the configured strategies and no inputs set.
    pub fn build_algorithm(&self) -> LatticeAlgorithm {
        let algorithm = LatticeAlgorithm::new(self.matcher.build(self.directed), self.generator.build())
            .with_policy(self.score);
        match self.top_k {
            Some(k) => algorithm.with_top_k(k),
            None => algorithm,
        }
    }
}

/// Read a configuration file.
pub fn load_config(path: &Path) -> Result<SearchConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(SearchConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}
