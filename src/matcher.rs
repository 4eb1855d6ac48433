//! Pattern-vs-graph matching.
//!
//! The search only relies on the [`GraphMatcher`] contract: a pure function
//! from (pattern, database graph) to a score in `[0, 1]`, where a positive
//! score means the pattern matched. [`EmbeddingMatcher`] is the shipped
//! implementation, a backtracking embedding search in the style of VF2.

use crate::pattern::{GraphPattern, PatternError, label_accepts};
use std::collections::HashMap;
use thiserror::Error;

/// A single comparison that could not be computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("malformed pattern: {0}")]
    MalformedPattern(#[source] PatternError),
    #[error("malformed graph: {0}")]
    MalformedGraph(#[source] PatternError),
}

/// Matching capability consumed by the search.
///
/// Implementations are initialized once by the caller and shared across the
/// scoring worker pool, so they must be `Send + Sync` and free of interior
/// state that changes results between calls.
pub trait GraphMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score `pattern` against one database graph, in `[0, 1]`.
    fn score(&self, pattern: &GraphPattern, graph: &GraphPattern) -> Result<f64, MatchError>;

    fn matches(&self, pattern: &GraphPattern, graph: &GraphPattern) -> Result<bool, MatchError> {
        Ok(self.score(pattern, graph)? > 0.0)
    }
}

/// How pattern nodes may be mapped onto graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    /// Distinct pattern nodes map to distinct graph nodes (subgraph monomorphism).
    Injective,
    /// Pattern nodes may share a graph node (homomorphism).
    Homomorphic,
}

/// Exact embedding matcher: scores 1.0 when the pattern embeds, else 0.0.
///
/// Wildcard labels in the pattern accept any graph label. Edges are treated
/// as a relation: parallel pattern edges with the same endpoints may map onto
/// the same graph edge.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingMatcher {
    directed: bool,
    embedding: Embedding,
}

impl EmbeddingMatcher {
    pub fn subgraph(directed: bool) -> Self {
        Self {
            directed,
            embedding: Embedding::Injective,
        }
    }

    pub fn homomorphism(directed: bool) -> Self {
        Self {
            directed,
            embedding: Embedding::Homomorphic,
        }
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    pub fn embedding(&self) -> Embedding {
        self.embedding
    }

    /// Find one embedding of `pattern` into `graph`, as a pattern-node to
    /// graph-node map indexed by pattern node.
    pub fn find_embedding(
        &self,
        pattern: &GraphPattern,
        graph: &GraphPattern,
    ) -> Result<Option<Vec<usize>>, MatchError> {
        pattern.validate().map_err(MatchError::MalformedPattern)?;
        graph.validate().map_err(MatchError::MalformedGraph)?;

        if self.embedding == Embedding::Injective && pattern.node_count() > graph.node_count() {
            return Ok(None);
        }

        let state = SearchState::new(self, pattern, graph);
        Ok(state.solve())
    }
}

impl GraphMatcher for EmbeddingMatcher {
    fn name(&self) -> &'static str {
        match self.embedding {
            Embedding::Injective => "subgraph",
            Embedding::Homomorphic => "homomorphism",
        }
    }

    fn score(&self, pattern: &GraphPattern, graph: &GraphPattern) -> Result<f64, MatchError> {
        Ok(if self.find_embedding(pattern, graph)?.is_some() {
            1.0
        } else {
            0.0
        })
    }
}

struct SearchState<'a> {
    matcher: &'a EmbeddingMatcher,
    pattern: &'a GraphPattern,
    graph: &'a GraphPattern,
    /// Graph edge labels keyed by endpoint pair (normalized when undirected).
    adjacency: HashMap<(usize, usize), Vec<&'a str>>,
    /// Pattern nodes in assignment order, most constrained first.
    order: Vec<usize>,
}

impl<'a> SearchState<'a> {
    fn new(matcher: &'a EmbeddingMatcher, pattern: &'a GraphPattern, graph: &'a GraphPattern) -> Self {
        let mut adjacency: HashMap<(usize, usize), Vec<&'a str>> = HashMap::new();
        for edge in graph.edges() {
            let key = matcher.pair(edge.source, edge.target);
            adjacency.entry(key).or_default().push(edge.label.as_str());
        }

        let mut order: Vec<usize> = (0..pattern.node_count()).collect();
        order.sort_by_key(|&n| (std::cmp::Reverse(pattern.degree(n)), n));

        Self {
            matcher,
            pattern,
            graph,
            adjacency,
            order,
        }
    }

    fn solve(&self) -> Option<Vec<usize>> {
        let mut mapping: Vec<Option<usize>> = vec![None; self.pattern.node_count()];
        let mut taken = vec![false; self.graph.node_count()];
        if self.extend(0, &mut mapping, &mut taken) {
            Some(mapping.into_iter().map(|m| m.unwrap_or_default()).collect())
        } else {
            None
        }
    }

    fn extend(&self, depth: usize, mapping: &mut [Option<usize>], taken: &mut [bool]) -> bool {
        let Some(&node) = self.order.get(depth) else {
            return true;
        };
        let label = &self.pattern.nodes()[node];

        for candidate in 0..self.graph.node_count() {
            if self.matcher.embedding == Embedding::Injective && taken[candidate] {
                continue;
            }
            if !label_accepts(label, &self.graph.nodes()[candidate]) {
                continue;
            }
            mapping[node] = Some(candidate);
            if self.edges_consistent(node, mapping) {
                taken[candidate] = true;
                if self.extend(depth + 1, mapping, taken) {
                    return true;
                }
                taken[candidate] = false;
            }
            mapping[node] = None;
        }
        false
    }

    /// Every pattern edge between `node` and an already mapped node must exist
    /// in the graph with an accepted label.
    fn edges_consistent(&self, node: usize, mapping: &[Option<usize>]) -> bool {
        self.pattern
            .edges()
            .iter()
            .filter(|e| e.touches(node))
            .all(|e| match (mapping[e.source], mapping[e.target]) {
                (Some(s), Some(t)) => self
                    .adjacency
                    .get(&self.matcher.pair(s, t))
                    .is_some_and(|labels| labels.iter().any(|l| label_accepts(&e.label, l))),
                _ => true,
            })
    }
}

impl EmbeddingMatcher {
    fn pair(&self, source: usize, target: usize) -> (usize, usize) {
        if self.directed || source <= target {
            (source, target)
        } else {
            (target, source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PatternEdge, WILDCARD};

    fn graph(nodes: &[&str], edges: &[(usize, usize, &str)]) -> GraphPattern {
        GraphPattern::new(
            nodes.iter().copied(),
            edges
                .iter()
                .map(|(s, t, l)| PatternEdge::new(*s, *t, *l))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_subgraph_matches_embedded_path() {
        let m = EmbeddingMatcher::subgraph(false);
        let p = graph(&["a", "b"], &[(0, 1, "x")]);
        let g = graph(&["c", "b", "a"], &[(1, 2, "x"), (0, 1, "y")]);
        assert_eq!(m.score(&p, &g), Ok(1.0));
        assert_eq!(m.find_embedding(&p, &g).unwrap(), Some(vec![2, 1]));
    }

    #[test]
    fn test_edge_label_mismatch() {
        let m = EmbeddingMatcher::subgraph(false);
        let p = graph(&["a", "b"], &[(0, 1, "x")]);
        let g = graph(&["a", "b"], &[(0, 1, "y")]);
        assert_eq!(m.score(&p, &g), Ok(0.0));
    }

    #[test]
    fn test_wildcards_accept_any_label() {
        let m = EmbeddingMatcher::subgraph(false);
        let p = graph(&[WILDCARD, "b"], &[(0, 1, WILDCARD)]);
        let g = graph(&["a", "b"], &[(0, 1, "y")]);
        assert_eq!(m.matches(&p, &g), Ok(true));
    }

    #[test]
    fn test_direction_matters_only_when_directed() {
        let p = graph(&["a", "b"], &[(0, 1, "x")]);
        let g = graph(&["a", "b"], &[(1, 0, "x")]);
        assert_eq!(EmbeddingMatcher::subgraph(true).matches(&p, &g), Ok(false));
        assert_eq!(EmbeddingMatcher::subgraph(false).matches(&p, &g), Ok(true));
    }

    #[test]
    fn test_injective_needs_distinct_nodes() {
        let p = graph(&["a", "a"], &[]);
        let g = graph(&["a"], &[]);
        assert_eq!(EmbeddingMatcher::subgraph(false).matches(&p, &g), Ok(false));
        assert_eq!(EmbeddingMatcher::homomorphism(false).matches(&p, &g), Ok(true));
    }

    #[test]
    fn test_homomorphism_folds_cycle_onto_edge() {
        let p = graph(&["n", "n", "n", "n"], &[(0, 1, "e"), (1, 2, "e"), (2, 3, "e"), (3, 0, "e")]);
        let g = graph(&["n", "n"], &[(0, 1, "e")]);
        assert_eq!(EmbeddingMatcher::homomorphism(false).matches(&p, &g), Ok(true));
        assert_eq!(EmbeddingMatcher::subgraph(false).matches(&p, &g), Ok(false));
    }

    #[test]
    fn test_self_loop_requires_self_loop() {
        let m = EmbeddingMatcher::subgraph(true);
        let p = graph(&["a"], &[(0, 0, "l")]);
        assert_eq!(m.matches(&p, &graph(&["a"], &[(0, 0, "l")])), Ok(true));
        assert_eq!(m.matches(&p, &graph(&["a", "a"], &[(0, 1, "l")])), Ok(false));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let m = EmbeddingMatcher::subgraph(false);
        assert_eq!(m.matches(&GraphPattern::default(), &graph(&["a"], &[])), Ok(true));
        assert_eq!(
            m.matches(&GraphPattern::default(), &GraphPattern::default()),
            Ok(true)
        );
    }

    #[test]
    fn test_malformed_inputs_are_reported() {
        let m = EmbeddingMatcher::subgraph(false);
        let bad: GraphPattern = serde_json::from_str(
            r#"{"nodes": ["a"], "edges": [{"source": 0, "target": 5, "label": "x"}]}"#,
        )
        .unwrap();
        let ok = graph(&["a"], &[]);
        assert!(matches!(
            m.score(&bad, &ok),
            Err(MatchError::MalformedPattern(_))
        ));
        assert!(matches!(
            m.score(&ok, &bad),
            Err(MatchError::MalformedGraph(_))
        ));
    }

    #[test]
    fn test_names() {
        assert_eq!(EmbeddingMatcher::subgraph(false).name(), "subgraph");
        assert_eq!(EmbeddingMatcher::homomorphism(false).name(), "homomorphism");
    }
}
