//! Candidate generalizations of a pattern.

use crate::pattern::{GraphPattern, WILDCARD, is_wildcard};

/// Produces broader patterns from a pattern.
///
/// Every candidate must match, under the configured matcher, at least the
/// database graphs its source pattern matches. Output order must be
/// deterministic for a given input.
pub trait CandidateGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn candidates(&self, pattern: &GraphPattern) -> Vec<GraphPattern>;
}

/// One-step structural relaxations.
///
/// Each candidate differs from its source by exactly one relaxation, emitted
/// in this order: drop an edge, relax an edge label to the wildcard, relax a
/// node label to the wildcard, drop an isolated node. All four only remove
/// constraints, so they are sound for both embedding matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralGeneralizer {
    pub drop_edges: bool,
    pub relax_edge_labels: bool,
    pub relax_node_labels: bool,
    pub drop_isolated_nodes: bool,
}

impl Default for StructuralGeneralizer {
    fn default() -> Self {
        Self {
            drop_edges: true,
            relax_edge_labels: true,
            relax_node_labels: true,
            drop_isolated_nodes: true,
        }
    }
}

impl CandidateGenerator for StructuralGeneralizer {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn candidates(&self, pattern: &GraphPattern) -> Vec<GraphPattern> {
        let mut out = Vec::new();

        if self.drop_edges {
            out.extend((0..pattern.edge_count()).filter_map(|e| pattern.without_edge(e)));
        }

        if self.relax_edge_labels {
            for (i, edge) in pattern.edges().iter().enumerate() {
                if !is_wildcard(&edge.label) {
                    out.extend(pattern.with_edge_label(i, WILDCARD));
                }
            }
        }

        if self.relax_node_labels {
            for (i, label) in pattern.nodes().iter().enumerate() {
                if !is_wildcard(label) {
                    out.extend(pattern.with_node_label(i, WILDCARD));
                }
            }
        }

        // Keep at least one node so the search never collapses to the empty pattern.
        if self.drop_isolated_nodes && pattern.node_count() > 1 {
            for node in 0..pattern.node_count() {
                if pattern.degree(node) == 0 {
                    out.extend(pattern.without_node(node));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternEdge;

    #[test]
    fn test_candidate_order_and_count() {
        let p = GraphPattern::new(["a", "b", "c"], vec![PatternEdge::new(0, 1, "x")]).unwrap();
        let candidates = StructuralGeneralizer::default().candidates(&p);

        // 1 edge drop + 1 edge relax + 3 node relax + 1 isolated drop
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0].edge_count(), 0);
        assert_eq!(candidates[1].edge_label(0), Some(WILDCARD));
        assert_eq!(candidates[2].node_label(0), Some(WILDCARD));
        assert_eq!(candidates[4].node_label(2), Some(WILDCARD));
        assert_eq!(candidates[5].node_count(), 2);
    }

    #[test]
    fn test_fully_relaxed_single_node_has_no_candidates() {
        let p = GraphPattern::new([WILDCARD], vec![]).unwrap();
        assert!(StructuralGeneralizer::default().candidates(&p).is_empty());
    }

    #[test]
    fn test_disabled_relaxations_are_skipped() {
        let p = GraphPattern::new(["a", "b"], vec![PatternEdge::new(0, 1, "x")]).unwrap();
        let only_drops = StructuralGeneralizer {
            relax_edge_labels: false,
            relax_node_labels: false,
            ..Default::default()
        };
        let candidates = only_drops.candidates(&p);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].edge_count(), 0);
    }

    #[test]
    fn test_candidates_are_valid() {
        let p = GraphPattern::new(
            ["a", "b", "c", "d"],
            vec![PatternEdge::new(0, 1, "x"), PatternEdge::new(2, 1, "y")],
        )
        .unwrap();
        for candidate in StructuralGeneralizer::default().candidates(&p) {
            assert!(candidate.validate().is_ok(), "invalid candidate {candidate}");
        }
    }
}
