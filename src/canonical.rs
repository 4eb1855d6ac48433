//! Canonical keys for structural pattern equality.
//!
//! Two patterns are the same lattice node iff their canonical keys are equal.
//! The default [`ExactCanonicalizer`] refines node colors by neighborhood
//! (Weisfeiler-Lehman style) and then searches the orderings that respect the
//! color classes for the smallest edge encoding, so the key is exact rather
//! than a heuristic hash of the refinement.

use crate::pattern::{GraphPattern, PatternEdge};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// A 256-bit canonical form digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(pub [u8; 32]);

impl CanonicalKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Structural equality capability.
///
/// Implementations must return equal keys exactly for isomorphic patterns
/// (label preserving, and direction preserving when directed). Node order and
/// label order must not matter.
pub trait Canonicalizer: Send + Sync {
    fn canonical_key(&self, pattern: &GraphPattern) -> CanonicalKey;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactCanonicalizer {
    directed: bool,
}

type Color = [u8; 32];

/// Edges adjacent to one node, restricted to already placed neighbors:
/// (neighbor position, direction tag, label).
type Row<'a> = Vec<(usize, u8, &'a str)>;

// 0 = outgoing, 1 = incoming, 2 = undirected
const OUT: u8 = 0;
const IN: u8 = 1;
const UNDIRECTED: u8 = 2;

/// Edges whose endpoints exist. Malformed edges do not take part in the key.
fn valid_edges(pattern: &GraphPattern) -> impl Iterator<Item = &PatternEdge> {
    let n = pattern.node_count();
    pattern
        .edges()
        .iter()
        .filter(move |e| e.source < n && e.target < n)
}

impl ExactCanonicalizer {
    pub fn new(directed: bool) -> Self {
        Self { directed }
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    fn tags(&self) -> (u8, u8) {
        if self.directed { (OUT, IN) } else { (UNDIRECTED, UNDIRECTED) }
    }

    /// Iteratively refine node colors until the partition stops splitting.
    fn refine_colors(&self, pattern: &GraphPattern) -> Vec<Color> {
        let n = pattern.node_count();
        let mut colors: Vec<Color> = pattern
            .nodes()
            .iter()
            .map(|label| digest(b"NODE", &[label.as_bytes()]))
            .collect();
        let mut classes = distinct(&colors);
        let (tag_out, tag_in) = self.tags();

        for _ in 0..n {
            let mut next = Vec::with_capacity(n);
            for node in 0..n {
                let mut neighborhood: Vec<Vec<u8>> = Vec::new();
                for edge in valid_edges(pattern) {
                    if edge.source == node {
                        neighborhood.push(tagged(tag_out, &edge.label, &colors[edge.target]));
                    }
                    if edge.target == node {
                        neighborhood.push(tagged(tag_in, &edge.label, &colors[edge.source]));
                    }
                }
                neighborhood.sort();
                let mut parts: Vec<&[u8]> = vec![colors[node].as_slice()];
                parts.extend(neighborhood.iter().map(Vec::as_slice));
                next.push(digest(b"REFINE", &parts));
            }
            let next_classes = distinct(&next);
            colors = next;
            if next_classes == classes {
                break;
            }
            classes = next_classes;
        }
        colors
    }

    /// Sorted edge list with undirected endpoints normalized, after renaming
    /// nodes through `map`.
    fn edge_set<'a>(
        &self,
        pattern: &'a GraphPattern,
        map: impl Fn(usize) -> usize,
    ) -> Vec<(usize, usize, &'a str)> {
        let mut edges: Vec<_> = valid_edges(pattern)
            .map(|e| {
                let (s, t) = (map(e.source), map(e.target));
                let (s, t) = if self.directed || s <= t { (s, t) } else { (t, s) };
                (s, t, e.label.as_str())
            })
            .collect();
        edges.sort();
        edges
    }

    /// For each pair of same-colored nodes, whether exchanging them maps the
    /// pattern onto itself. Such nodes yield identical search subtrees.
    fn interchangeable(&self, pattern: &GraphPattern, classes: &[Vec<usize>]) -> Vec<Vec<bool>> {
        let n = pattern.node_count();
        let mut swaps = vec![vec![false; n]; n];
        let edges = self.edge_set(pattern, |node| node);
        for class in classes {
            for (i, &u) in class.iter().enumerate() {
                for &v in &class[i + 1..] {
                    let swapped = self.edge_set(pattern, |node| {
                        if node == u {
                            v
                        } else if node == v {
                            u
                        } else {
                            node
                        }
                    });
                    if swapped == edges {
                        swaps[u][v] = true;
                        swaps[v][u] = true;
                    }
                }
            }
        }
        swaps
    }
}

/// Depth-first search over node orderings that keep color classes
/// contiguous, keeping the ordering with the smallest row encoding.
///
/// Row `p` lists the edges between the node at position `p` and the nodes
/// before it, so a prefix of the ordering fixes a prefix of the encoding.
/// A prefix already larger than the best encoding is abandoned, and of
/// several interchangeable candidates for one position only the first is
/// explored.
struct OrderSearch<'a> {
    pattern: &'a GraphPattern,
    tags: (u8, u8),
    classes: Vec<Vec<usize>>,
    slots: Vec<usize>,
    swaps: Vec<Vec<bool>>,
    position: Vec<Option<usize>>,
    order: Vec<usize>,
    rows: Vec<Row<'a>>,
    best: Option<(Vec<usize>, Vec<Row<'a>>)>,
}

impl<'a> OrderSearch<'a> {
    fn row(&self, node: usize) -> Row<'a> {
        let (tag_out, tag_in) = self.tags;
        let mut row: Row<'a> = Vec::new();
        for edge in valid_edges(self.pattern) {
            if edge.source == node {
                if let Some(pos) = self.position[edge.target] {
                    row.push((pos, tag_out, edge.label.as_str()));
                }
            } else if edge.target == node {
                if let Some(pos) = self.position[edge.source] {
                    row.push((pos, tag_in, edge.label.as_str()));
                }
            }
        }
        row.sort();
        row
    }

    fn worse_than_best(&self) -> bool {
        match &self.best {
            Some((_, best)) => self.rows.as_slice() > &best[..self.rows.len()],
            None => false,
        }
    }

    fn search(&mut self) {
        let depth = self.order.len();
        if depth == self.slots.len() {
            let better = match &self.best {
                Some((_, best)) => self.rows < *best,
                None => true,
            };
            if better {
                self.best = Some((self.order.clone(), self.rows.clone()));
            }
            return;
        }
        let class = self.slots[depth];
        let mut tried: Vec<usize> = Vec::new();
        for i in 0..self.classes[class].len() {
            let node = self.classes[class][i];
            if self.position[node].is_some() || tried.iter().any(|&t| self.swaps[t][node]) {
                continue;
            }
            tried.push(node);

            self.position[node] = Some(depth);
            self.order.push(node);
            let row = self.row(node);
            self.rows.push(row);
            if !self.worse_than_best() {
                self.search();
            }
            self.rows.pop();
            self.order.pop();
            self.position[node] = None;
        }
    }
}

impl Canonicalizer for ExactCanonicalizer {
    fn canonical_key(&self, pattern: &GraphPattern) -> CanonicalKey {
        let colors = self.refine_colors(pattern);

        // Color classes ordered by color value, members by position.
        let mut by_color: BTreeMap<Color, Vec<usize>> = BTreeMap::new();
        for (node, color) in colors.iter().enumerate() {
            by_color.entry(*color).or_default().push(node);
        }
        let classes: Vec<Vec<usize>> = by_color.into_values().collect();
        let slots: Vec<usize> = classes
            .iter()
            .enumerate()
            .flat_map(|(i, class)| std::iter::repeat_n(i, class.len()))
            .collect();
        let n = pattern.node_count();

        let mut search = OrderSearch {
            pattern,
            tags: self.tags(),
            swaps: self.interchangeable(pattern, &classes),
            classes,
            slots,
            position: vec![None; n],
            order: Vec::with_capacity(n),
            rows: Vec::with_capacity(n),
            best: None,
        };
        search.search();
        let (order, rows) = search.best.unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(b"GREF:CANONICAL:v2");
        hasher.update([u8::from(self.directed)]);
        hasher.update((order.len() as u64).to_le_bytes());
        for node in &order {
            write_str(&mut hasher, &pattern.nodes()[*node]);
        }
        for row in &rows {
            hasher.update((row.len() as u64).to_le_bytes());
            for (pos, tag, label) in row {
                hasher.update((*pos as u64).to_le_bytes());
                hasher.update([*tag]);
                write_str(&mut hasher, label);
            }
        }
        CanonicalKey(hasher.finalize().into())
    }
}

fn write_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Length-prefixed, domain-separated SHA-256 over `parts`.
fn digest(domain: &[u8], parts: &[&[u8]]) -> Color {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn tagged(tag: u8, label: &str, color: &Color) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + 8 + label.len() + 32);
    bytes.push(tag);
    bytes.extend_from_slice(&(label.len() as u64).to_le_bytes());
    bytes.extend_from_slice(label.as_bytes());
    bytes.extend_from_slice(color);
    bytes
}

fn distinct(colors: &[Color]) -> usize {
    let mut sorted = colors.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternEdge;

    fn pattern(nodes: &[&str], edges: &[(usize, usize, &str)]) -> GraphPattern {
        GraphPattern::new(
            nodes.iter().copied(),
            edges
                .iter()
                .map(|(s, t, l)| PatternEdge::new(*s, *t, *l))
                .collect(),
        )
        .unwrap()
    }

    fn same(c: &ExactCanonicalizer, a: &GraphPattern, b: &GraphPattern) -> bool {
        c.canonical_key(a) == c.canonical_key(b)
    }

    // --- equality ---

    #[test]
    fn test_node_order_does_not_matter() {
        let c = ExactCanonicalizer::new(false);
        let a = pattern(&["a", "b", "c"], &[(0, 1, "x"), (1, 2, "y")]);
        let b = pattern(&["c", "a", "b"], &[(2, 0, "y"), (1, 2, "x")]);
        assert!(same(&c, &a, &b));
    }

    #[test]
    fn test_undirected_ignores_edge_orientation() {
        let c = ExactCanonicalizer::new(false);
        let a = pattern(&["a", "b"], &[(0, 1, "x")]);
        let b = pattern(&["a", "b"], &[(1, 0, "x")]);
        assert!(same(&c, &a, &b));
    }

    #[test]
    fn test_directed_respects_edge_orientation() {
        let c = ExactCanonicalizer::new(true);
        let a = pattern(&["a", "b"], &[(0, 1, "x")]);
        let b = pattern(&["a", "b"], &[(1, 0, "x")]);
        assert!(!same(&c, &a, &b));
    }

    #[test]
    fn test_labels_distinguish_patterns() {
        let c = ExactCanonicalizer::new(false);
        let a = pattern(&["a", "b"], &[(0, 1, "x")]);
        assert!(!same(&c, &a, &pattern(&["a", "b"], &[(0, 1, "y")])));
        assert!(!same(&c, &a, &pattern(&["a", "c"], &[(0, 1, "x")])));
    }

    #[test]
    fn test_regular_graphs_with_same_colors_are_told_apart() {
        // A 6-cycle and two triangles: every node has the same WL color.
        let c = ExactCanonicalizer::new(false);
        let hexagon = pattern(
            &["n"; 6],
            &[(0, 1, "e"), (1, 2, "e"), (2, 3, "e"), (3, 4, "e"), (4, 5, "e"), (5, 0, "e")],
        );
        let triangles = pattern(
            &["n"; 6],
            &[(0, 1, "e"), (1, 2, "e"), (2, 0, "e"), (3, 4, "e"), (4, 5, "e"), (5, 3, "e")],
        );
        assert!(!same(&c, &hexagon, &triangles));
    }

    #[test]
    fn test_name_is_not_structural() {
        let c = ExactCanonicalizer::new(false);
        let a = pattern(&["a"], &[]);
        let b = pattern(&["a"], &[]).with_name("renamed");
        assert!(same(&c, &a, &b));
    }

    #[test]
    fn test_self_loop_direction_is_kept() {
        let c = ExactCanonicalizer::new(true);
        let a = pattern(&["a", "a"], &[(0, 0, "l"), (0, 1, "x")]);
        let b = pattern(&["a", "a"], &[(1, 1, "l"), (0, 1, "x")]);
        let b_flipped = pattern(&["a", "a"], &[(1, 1, "l"), (1, 0, "x")]);
        assert!(!same(&c, &a, &b));
        assert!(same(&c, &a, &b_flipped));
    }

    // --- symmetric patterns ---

    #[test]
    fn test_many_isolated_wildcards() {
        let c = ExactCanonicalizer::new(false);
        let fourteen = pattern(&["*"; 14], &[]);
        let thirteen = pattern(&["*"; 13], &[]);
        assert_eq!(c.canonical_key(&fourteen), c.canonical_key(&fourteen.clone()));
        assert!(!same(&c, &fourteen, &thirteen));
    }

    #[test]
    fn test_wide_star_center_position_does_not_matter() {
        let c = ExactCanonicalizer::new(true);
        let leaves = 12;
        let labels = vec!["*"; leaves + 1];
        let first: Vec<(usize, usize, &str)> = (1..=leaves).map(|i| (0, i, "e")).collect();
        let last: Vec<(usize, usize, &str)> = (0..leaves).map(|i| (leaves, i, "e")).collect();
        let inward: Vec<(usize, usize, &str)> = (1..=leaves).map(|i| (i, 0, "e")).collect();
        let a = pattern(&labels, &first);
        assert!(same(&c, &a, &pattern(&labels, &last)));
        assert!(!same(&c, &a, &pattern(&labels, &inward)));
    }

    #[test]
    fn test_swapped_twins_in_a_larger_pattern() {
        // Two pairs of leaves that can be exchanged, hanging off a path.
        let c = ExactCanonicalizer::new(false);
        let a = pattern(
            &["b", "c", "b", "a", "a", "a", "a"],
            &[(0, 1, "p"), (1, 2, "p"), (0, 3, "l"), (0, 4, "l"), (2, 5, "l"), (2, 6, "l")],
        );
        let b = pattern(
            &["a", "a", "b", "c", "b", "a", "a"],
            &[(2, 3, "p"), (3, 4, "p"), (4, 0, "l"), (4, 1, "l"), (2, 5, "l"), (6, 2, "l")],
        );
        let unbalanced = pattern(
            &["a", "a", "b", "c", "b", "a", "a"],
            &[(2, 3, "p"), (3, 4, "p"), (4, 0, "l"), (4, 1, "l"), (4, 5, "l"), (6, 2, "l")],
        );
        assert!(same(&c, &a, &b));
        assert!(!same(&c, &a, &unbalanced));
    }

    // --- keys ---

    #[test]
    fn test_empty_pattern_has_a_key() {
        let c = ExactCanonicalizer::new(false);
        let empty = GraphPattern::default();
        assert_eq!(c.canonical_key(&empty), c.canonical_key(&empty));
        assert_ne!(c.canonical_key(&empty), c.canonical_key(&pattern(&["a"], &[])));
    }

    #[test]
    fn test_key_display_is_short_hex() {
        let key = ExactCanonicalizer::new(false).canonical_key(&pattern(&["a"], &[]));
        assert_eq!(key.to_string().len(), 12);
    }
}
