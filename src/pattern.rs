//! Labeled graph patterns.
//!
//! A [`GraphPattern`] is both the query being reformulated and every graph in
//! the database. Patterns are immutable: every transformation returns a new
//! pattern.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Label that matches any node or edge label.
pub const WILDCARD: &str = "*";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("edge {edge} references node {endpoint}, but the graph has {nodes} nodes")]
    DanglingEndpoint {
        edge: usize,
        endpoint: usize,
        nodes: usize,
    },
}

/// A labeled edge between two nodes, referenced by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternEdge {
    pub source: usize,
    pub target: usize,
    pub label: String,
}

impl PatternEdge {
    pub fn new(source: usize, target: usize, label: impl Into<String>) -> Self {
        Self {
            source,
            target,
            label: label.into(),
        }
    }

    /// True when the edge touches `node` at either end.
    pub fn touches(&self, node: usize) -> bool {
        self.source == node || self.target == node
    }
}

/// An immutable labeled graph.
///
/// The optional name is metadata only; it never takes part in structural
/// comparisons and is not carried over to derived patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    nodes: Vec<String>,
    #[serde(default)]
    edges: Vec<PatternEdge>,
}

impl GraphPattern {
    /// Build a pattern, rejecting edges whose endpoints are out of range.
    pub fn new<I, S>(nodes: I, edges: Vec<PatternEdge>) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = Self {
            name: None,
            nodes: nodes.into_iter().map(Into::into).collect(),
            edges,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check that every edge endpoint refers to an existing node.
    ///
    /// Deserialized patterns are not checked on construction, so loaders call
    /// this explicitly.
    pub fn validate(&self) -> Result<(), PatternError> {
        for (i, edge) in self.edges.iter().enumerate() {
            for endpoint in [edge.source, edge.target] {
                if endpoint >= self.nodes.len() {
                    return Err(PatternError::DanglingEndpoint {
                        edge: i,
                        endpoint,
                        nodes: self.nodes.len(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[PatternEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_label(&self, node: usize) -> Option<&str> {
        self.nodes.get(node).map(String::as_str)
    }

    pub fn edge_label(&self, edge: usize) -> Option<&str> {
        self.edges.get(edge).map(|e| e.label.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edge endpoints at `node`. A self loop counts twice.
    pub fn degree(&self, node: usize) -> usize {
        self.edges
            .iter()
            .map(|e| usize::from(e.source == node) + usize::from(e.target == node))
            .sum()
    }

    /// A copy of this pattern without edge `edge`.
    pub fn without_edge(&self, edge: usize) -> Option<Self> {
        if edge >= self.edges.len() {
            return None;
        }
        let mut edges = self.edges.clone();
        edges.remove(edge);
        Some(Self {
            name: None,
            nodes: self.nodes.clone(),
            edges,
        })
    }

    /// A copy of this pattern without node `node` and its incident edges.
    ///
    /// Remaining edges are renumbered to the shifted node positions.
    pub fn without_node(&self, node: usize) -> Option<Self> {
        if node >= self.nodes.len() {
            return None;
        }
        let mut nodes = self.nodes.clone();
        nodes.remove(node);
        let shift = |n: usize| if n > node { n - 1 } else { n };
        let edges = self
            .edges
            .iter()
            .filter(|e| !e.touches(node))
            .map(|e| PatternEdge::new(shift(e.source), shift(e.target), e.label.clone()))
            .collect();
        Some(Self {
            name: None,
            nodes,
            edges,
        })
    }

    /// A copy of this pattern with node `node` relabeled.
    pub fn with_node_label(&self, node: usize, label: impl Into<String>) -> Option<Self> {
        let mut nodes = self.nodes.clone();
        *nodes.get_mut(node)? = label.into();
        Some(Self {
            name: None,
            nodes,
            edges: self.edges.clone(),
        })
    }

    /// A copy of this pattern with edge `edge` relabeled.
    pub fn with_edge_label(&self, edge: usize, label: impl Into<String>) -> Option<Self> {
        let mut edges = self.edges.clone();
        edges.get_mut(edge)?.label = label.into();
        Some(Self {
            name: None,
            nodes: self.nodes.clone(),
            edges,
        })
    }
}

impl fmt::Display for GraphPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        write!(f, "[{}]", self.nodes.join(", "))?;
        if !self.edges.is_empty() {
            let edges: Vec<String> = self
                .edges
                .iter()
                .map(|e| format!("{}-{}:{}", e.source, e.target, e.label))
                .collect();
            write!(f, " {{{}}}", edges.join(", "))?;
        }
        Ok(())
    }
}

pub fn is_wildcard(label: &str) -> bool {
    label == WILDCARD
}

/// Whether a pattern label accepts a graph label.
pub fn label_accepts(pattern_label: &str, graph_label: &str) -> bool {
    is_wildcard(pattern_label) || pattern_label == graph_label
}
