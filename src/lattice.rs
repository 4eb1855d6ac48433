//! The reformulation lattice.
//!
//! Nodes are unique by canonical key and connected by "generalizes" edges
//! running from a more specific node to a broader one. The root is the
//! original query; the lattice grows away from it, toward generalizations.
//! Nodes and edges are only ever added; a merge may shorten a node's
//! generation.

use crate::canonical::{CanonicalKey, Canonicalizer, ExactCanonicalizer};
use crate::pattern::GraphPattern;
use crate::score::NodeScore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Position of a node in its lattice, also its discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LatticeError {
    #[error("edge {parent} -> {node} would close a generalization cycle")]
    DuplicateEdgeViolation { parent: NodeId, node: NodeId },
    #[error("unknown lattice node: {0}")]
    UnknownNode(NodeId),
    #[error("only the root may be inserted without parents")]
    MissingParent,
}

/// Result of [`ReformulationLattice::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Created(NodeId),
    /// A structurally equal node already existed; its provenance was extended.
    Merged(NodeId),
}

impl Insertion {
    pub fn id(&self) -> NodeId {
        match self {
            Insertion::Created(id) | Insertion::Merged(id) => *id,
        }
    }
}

/// One candidate reformulation.
#[derive(Debug)]
pub struct ReformulationNode {
    id: NodeId,
    pattern: GraphPattern,
    key: CanonicalKey,
    generation: u32,
    provenance: BTreeSet<NodeId>,
    score: OnceLock<NodeScore>,
}

impl ReformulationNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn pattern(&self) -> &GraphPattern {
        &self.pattern
    }

    pub fn key(&self) -> CanonicalKey {
        self.key
    }

    /// Length of the shortest known derivation from the root.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Parents this node was derived from, ascending.
    pub fn provenance(&self) -> &BTreeSet<NodeId> {
        &self.provenance
    }

    pub fn score(&self) -> Option<f64> {
        self.score.get().map(|s| s.value)
    }

    pub fn node_score(&self) -> Option<&NodeScore> {
        self.score.get()
    }

    pub fn is_scored(&self) -> bool {
        self.score.get().is_some()
    }
}

pub struct ReformulationLattice {
    canonicalizer: Arc<dyn Canonicalizer>,
    nodes: Vec<ReformulationNode>,
    index: HashMap<CanonicalKey, NodeId>,
    /// Immediate broader neighbors per node.
    up: Vec<BTreeSet<NodeId>>,
}

impl fmt::Debug for ReformulationLattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReformulationLattice")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edge_count())
            .finish()
    }
}

impl ReformulationLattice {
    /// Seed a lattice with the original query as its root.
    pub fn new(root: GraphPattern, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        let key = canonicalizer.canonical_key(&root);
        let root_id = NodeId(0);
        let mut index = HashMap::new();
        index.insert(key, root_id);
        Self {
            canonicalizer,
            nodes: vec![ReformulationNode {
                id: root_id,
                pattern: root,
                key,
                generation: 0,
                provenance: BTreeSet::new(),
                score: OnceLock::new(),
            }],
            index,
            up: vec![BTreeSet::new()],
        }
    }

    /// Seed a lattice that compares patterns with [`ExactCanonicalizer`].
    pub fn seed(root: GraphPattern, directed: bool) -> Self {
        Self::new(root, Arc::new(ExactCanonicalizer::new(directed)))
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn canonicalizer(&self) -> &dyn Canonicalizer {
        self.canonicalizer.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a lattice holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&ReformulationNode> {
        self.nodes.get(id.0)
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &ReformulationNode> {
        self.nodes.iter()
    }

    /// All generalization edges as (specific, general), sorted.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.up
            .iter()
            .enumerate()
            .flat_map(|(i, ups)| ups.iter().map(move |&u| (NodeId(i), u)))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.up.iter().map(BTreeSet::len).sum()
    }

    /// Canonical key of `pattern` under this lattice's canonicalizer.
    pub fn key_of(&self, pattern: &GraphPattern) -> CanonicalKey {
        self.canonicalizer.canonical_key(pattern)
    }

    /// The node structurally equal to `pattern`, if any.
    pub fn find(&self, pattern: &GraphPattern) -> Option<NodeId> {
        self.find_key(&self.key_of(pattern))
    }

    /// The node whose canonical key is `key`, if any.
    pub fn find_key(&self, key: &CanonicalKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Insert `pattern` derived from `parents`.
    ///
    /// When a structurally equal node already exists, `parents` are merged
    /// into its provenance and its id is returned; the node set is unchanged.
    /// Either every new edge is added or none is.
    pub fn insert(
        &mut self,
        pattern: GraphPattern,
        parents: &[NodeId],
    ) -> Result<Insertion, LatticeError> {
        let key = self.key_of(&pattern);
        self.insert_keyed(key, pattern, parents)
    }

    /// [`insert`](Self::insert) with a key already computed by
    /// [`key_of`](Self::key_of) for `pattern`.
    pub fn insert_keyed(
        &mut self,
        key: CanonicalKey,
        pattern: GraphPattern,
        parents: &[NodeId],
    ) -> Result<Insertion, LatticeError> {
        if let Some(&unknown) = parents.iter().find(|p| !self.contains(**p)) {
            return Err(LatticeError::UnknownNode(unknown));
        }
        if parents.is_empty() {
            return Err(LatticeError::MissingParent);
        }

        let generation = parents
            .iter()
            .map(|p| self.nodes[p.0].generation)
            .min()
            .unwrap_or(0)
            + 1;

        if let Some(&existing) = self.index.get(&key) {
            for &parent in parents {
                if parent == existing || self.is_ancestor(parent, existing) {
                    return Err(LatticeError::DuplicateEdgeViolation {
                        parent,
                        node: existing,
                    });
                }
            }
            for &parent in parents {
                self.up[parent.0].insert(existing);
                self.nodes[existing.0].provenance.insert(parent);
            }
            self.shorten(existing, generation);
            return Ok(Insertion::Merged(existing));
        }

        let id = NodeId(self.nodes.len());
        for &parent in parents {
            self.up[parent.0].insert(id);
        }
        self.nodes.push(ReformulationNode {
            id,
            pattern,
            key,
            generation,
            provenance: parents.iter().copied().collect(),
            score: OnceLock::new(),
        });
        self.up.push(BTreeSet::new());
        self.index.insert(key, id);
        Ok(Insertion::Created(id))
    }

    /// Lower the generation of `id` to `generation` and carry the shorter
    /// distance to every broader node.
    fn shorten(&mut self, id: NodeId, generation: u32) {
        let mut queue = VecDeque::from([(id, generation)]);
        while let Some((current, generation)) = queue.pop_front() {
            if self.nodes[current.0].generation <= generation {
                continue;
            }
            self.nodes[current.0].generation = generation;
            for &next in &self.up[current.0] {
                queue.push_back((next, generation + 1));
            }
        }
    }

    /// Cache the score of `id`. Returns false if the node was already scored;
    /// a node's score never changes once set.
    pub fn record_score(&self, id: NodeId, score: NodeScore) -> Result<bool, LatticeError> {
        let node = self.node(id).ok_or(LatticeError::UnknownNode(id))?;
        Ok(node.score.set(score).is_ok())
    }

    /// Immediate broader neighbors of `id`, ascending.
    pub fn neighbors_up(&self, id: NodeId) -> Vec<NodeId> {
        self.up
            .get(id.0)
            .map(|ups| ups.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Immediate more specific neighbors of `id` (its provenance), ascending.
    pub fn neighbors_down(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| n.provenance.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True iff `a` generalizes `b` through one or more edges.
    pub fn is_ancestor(&self, a: NodeId, b: NodeId) -> bool {
        if a == b || !self.contains(a) || !self.contains(b) {
            return false;
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([b]);
        seen[b.0] = true;
        while let Some(current) = queue.pop_front() {
            for &next in &self.up[current.0] {
                if next == a {
                    return true;
                }
                if !seen[next.0] {
                    seen[next.0] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// A derivation path from `id` down to the root, following the earliest
    /// discovered parent at each step. Starts with `id`, ends with the root.
    pub fn provenance_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            chain.push(node.id);
            current = node
                .provenance
                .first()
                .and_then(|parent| self.node(*parent));
        }
        chain
    }
}
