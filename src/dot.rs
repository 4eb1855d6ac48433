//! DOT export of search results.
//!
//! Each query's outcome becomes one Graphviz file with one cluster per graph:
//! the query as `Q` and every reformulation in rank order as `R1`, `R2`, ...

use crate::algorithm::{RankedReformulation, SearchOutcome};
use crate::labels::LabelMap;
use crate::lattice::NodeId;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{error, info, warn};

const RESULTS_TEMPLATE: &str = include_str!("templates/results.dot");

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

/// Options for DOT export.
#[derive(Debug, Clone)]
pub struct DotOptions {
    pub output_dir: PathBuf,
    pub prefix: String,
    pub directed: bool,
    pub node_labels: LabelMap,
    pub edge_labels: LabelMap,
}

impl DotOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: "result".to_string(),
            directed: false,
            node_labels: LabelMap::new(),
            edge_labels: LabelMap::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TemplateNode {
    id: String,
    label: String,
}

#[derive(Debug, Serialize)]
struct TemplateEdge {
    source: String,
    target: String,
    label: String,
}

#[derive(Debug, Serialize)]
struct TemplateCluster {
    key: String,
    label: String,
    nodes: Vec<TemplateNode>,
    edges: Vec<TemplateEdge>,
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders outcomes with the embedded template.
pub struct DotExporter {
    tera: Tera,
    options: DotOptions,
}

impl DotExporter {
    pub fn new(options: DotOptions) -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        tera.add_raw_template("results.dot", RESULTS_TEMPLATE)?;
        Ok(Self { tera, options })
    }

    pub fn options(&self) -> &DotOptions {
        &self.options
    }

    fn cluster(
        &self,
        index: usize,
        entry: &RankedReformulation,
        names: &HashMap<NodeId, String>,
    ) -> TemplateCluster {
        let (key, title) = if index == 0 {
            ("q".to_string(), "Q".to_string())
        } else {
            (index.to_string(), format!("R{}", index))
        };

        let label = if index == 0 {
            format!("{}\\nscore {}", title, entry.score)
        } else {
            let chain: Vec<String> = entry
                .chain
                .iter()
                .rev()
                .map(|id| names.get(id).cloned().unwrap_or_else(|| id.to_string()))
                .collect();
            format!("{}\\nscore {}\\n{}", title, entry.score, chain.join(" > "))
        };

        let pattern = &entry.pattern;
        let nodes = pattern
            .nodes()
            .iter()
            .enumerate()
            .map(|(n, raw)| TemplateNode {
                id: format!("{}_{}", index, n),
                label: escape(self.options.node_labels.resolve(raw)),
            })
            .collect();
        let edges = pattern
            .edges()
            .iter()
            .map(|e| TemplateEdge {
                source: format!("{}_{}", index, e.source),
                target: format!("{}_{}", index, e.target),
                label: escape(self.options.edge_labels.resolve(&e.label)),
            })
            .collect();

        TemplateCluster {
            key,
            label,
            nodes,
            edges,
        }
    }

    /// Render one outcome, or `None` when it holds no reformulation.
    pub fn render(&self, outcome: &SearchOutcome, name: &str) -> Result<Option<String>, ExportError> {
        let Some(query) = outcome.query() else {
            return Ok(None);
        };
        let graphs: Vec<&RankedReformulation> = std::iter::once(query)
            .chain(outcome.reformulations())
            .collect();
        if graphs.len() < 2 {
            return Ok(None);
        }

        let names: HashMap<NodeId, String> = graphs
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let name = if i == 0 { "Q".to_string() } else { format!("R{}", i) };
                (r.id, name)
            })
            .collect();
        let clusters: Vec<TemplateCluster> = graphs
            .iter()
            .enumerate()
            .map(|(i, r)| self.cluster(i, r, &names))
            .collect();

        let mut context = Context::new();
        context.insert("kind", if self.options.directed { "digraph" } else { "graph" });
        context.insert("connector", if self.options.directed { "->" } else { "--" });
        context.insert("name", &escape(name));
        context.insert("clusters", &clusters);

        Ok(Some(self.tera.render("results.dot", &context)?))
    }

    /// Write `{prefix}_{n}.dot` for every outcome with at least one
    /// reformulation, `n` being the 1-based query position.
    pub fn export(&self, outcomes: &[SearchOutcome]) -> Result<Vec<PathBuf>, ExportError> {
        let dir = &self.options.output_dir;
        if dir.exists() {
            warn!(folder = %dir.display(), "output folder exists, files might be overwritten");
        }
        fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;

        let mut written = Vec::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            let name = format!("{}_{}", self.options.prefix, i + 1);
            let Some(dot) = self.render(outcome, &name)? else {
                error!(query = i + 1, "result has fewer than two graphs, nothing to draw");
                continue;
            };
            let path = dir.join(format!("{}.dot", name));
            fs::write(&path, dot).map_err(|source| io_error(&path, source))?;
            written.push(path);
        }

        info!(files = written.len(), folder = %dir.display(), "wrote DOT files");
        Ok(written)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Render and write every outcome with `options`.
pub fn export_dot(outcomes: &[SearchOutcome], options: DotOptions) -> Result<Vec<PathBuf>, ExportError> {
    DotExporter::new(options)?.export(outcomes)
}
