//! Best-first search over the reformulation lattice.
//!
//! [`LatticeAlgorithm`] owns a seeded lattice and a graph database, and grows
//! the lattice from its root toward broader reformulations. The frontier is a
//! max-heap on score, preferring more specific nodes (smaller generation) and
//! then earlier discoveries at equal score. The lattice is only touched by the
//! thread calling [`LatticeAlgorithm::run`]; per-node scoring fans out over
//! rayon and is reduced before the node is inserted.

use crate::generalize::{CandidateGenerator, StructuralGeneralizer};
use crate::lattice::{Insertion, LatticeError, NodeId, ReformulationLattice};
use crate::matcher::{EmbeddingMatcher, GraphMatcher};
use crate::pattern::{GraphPattern, PatternError};
use crate::score::{ScorePolicy, Scoring, score_pattern};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("missing required input: {0}")]
    MissingInput(&'static str),
    #[error("invalid root pattern: {0}")]
    InvalidRoot(#[source] PatternError),
}

/// Limits on one search. Unset limits are unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum number of nodes expanded.
    pub max_expansions: Option<usize>,
    /// Maximum lattice size, root included.
    pub max_nodes: Option<usize>,
    /// Nodes at this generation are kept but not expanded.
    pub max_depth: Option<u32>,
    /// Wall-clock limit, checked once per frontier step.
    pub time_limit: Option<Duration>,
}

impl SearchBudget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_expansions(mut self, n: usize) -> Self {
        self.max_expansions = Some(n);
        self
    }

    pub fn with_max_nodes(mut self, n: usize) -> Self {
        self.max_nodes = Some(n);
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Which budget limit stopped the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLimit {
    Expansions,
    Nodes,
    Time,
}

/// Why a search stopped. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "limit")]
pub enum Termination {
    /// The frontier ran dry.
    Exhausted,
    /// No frontier node could enter the current top-k.
    Saturated,
    BudgetExceeded(BudgetLimit),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MatchFailure,
    DuplicateEdgeViolation,
}

/// A recovered failure recorded during a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// One entry of the ranked result sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedReformulation {
    pub id: NodeId,
    pub pattern: GraphPattern,
    pub score: f64,
    pub generation: u32,
    /// Direct parents, ascending.
    pub provenance: Vec<NodeId>,
    /// Derivation path from this node down to the root.
    pub chain: Vec<NodeId>,
    /// Database positions matched by the pattern.
    pub matched: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// All discovered nodes: score descending, then generation ascending,
    /// then discovery order.
    pub results: Vec<RankedReformulation>,
    pub termination: Termination,
    pub expansions: usize,
    pub lattice_size: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl SearchOutcome {
    pub fn ids(&self) -> Vec<NodeId> {
        self.results.iter().map(|r| r.id).collect()
    }

    /// The seeded query, present in every outcome.
    pub fn query(&self) -> Option<&RankedReformulation> {
        self.results.iter().find(|r| r.provenance.is_empty())
    }

    /// Discovered reformulations in rank order, the query excluded.
    pub fn reformulations(&self) -> impl Iterator<Item = &RankedReformulation> {
        self.results.iter().filter(|r| !r.provenance.is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    score: f64,
    generation: u32,
    id: NodeId,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.generation.cmp(&self.generation))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

/// Lattice search orchestrator.
///
/// Variants differ only in the injected strategies: the matcher, the candidate
/// generator, and the score policy.
pub struct LatticeAlgorithm {
    db: Option<Vec<GraphPattern>>,
    lattice: Option<ReformulationLattice>,
    matcher: Box<dyn GraphMatcher>,
    generator: Box<dyn CandidateGenerator>,
    policy: ScorePolicy,
    top_k: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for LatticeAlgorithm {
    fn default() -> Self {
        Self::new(
            Box::new(EmbeddingMatcher::subgraph(false)),
            Box::new(StructuralGeneralizer::default()),
        )
    }
}

impl LatticeAlgorithm {
    pub fn new(matcher: Box<dyn GraphMatcher>, generator: Box<dyn CandidateGenerator>) -> Self {
        Self {
            db: None,
            lattice: None,
            matcher,
            generator,
            policy: ScorePolicy::default(),
            top_k: None,
            cancel: None,
        }
    }

    /// Replace the graph database.
    ///
    /// Scores cached in the current lattice were computed against the old
    /// database, so the lattice is dropped and must be set again.
    pub fn set_db(&mut self, graphs: Vec<GraphPattern>) {
        self.db = Some(graphs);
        self.lattice = None;
    }

    pub fn set_lattice(&mut self, lattice: ReformulationLattice) {
        self.lattice = Some(lattice);
    }

    pub fn with_matcher(mut self, matcher: Box<dyn GraphMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn CandidateGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_policy(mut self, policy: ScorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stop once no frontier node can displace the current top `k` results.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k.max(1));
        self
    }

    /// Stop at the next frontier step after `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn lattice(&self) -> Option<&ReformulationLattice> {
        self.lattice.as_ref()
    }

    pub fn into_lattice(self) -> Option<ReformulationLattice> {
        self.lattice
    }

    /// Run a bounded best-first search and rank every discovered node.
    ///
    /// Fails only when the database or the lattice was never set. Per-candidate
    /// and per-comparison failures are recovered and listed in
    /// [`SearchOutcome::diagnostics`].
    pub fn run(&mut self, budget: &SearchBudget) -> Result<SearchOutcome, SearchError> {
        let Self {
            db,
            lattice,
            matcher,
            generator,
            policy,
            top_k,
            cancel,
        } = self;
        let db = db.as_deref().ok_or(SearchError::MissingInput("graph database"))?;
        let lattice = lattice
            .as_mut()
            .ok_or(SearchError::MissingInput("reformulation lattice"))?;
        if let Some(root) = lattice.node(lattice.root()) {
            root.pattern().validate().map_err(SearchError::InvalidRoot)?;
        }

        let started = Instant::now();
        let mut diagnostics = Vec::new();

        info!(
            matcher = matcher.name(),
            generator = generator.name(),
            graphs = db.len(),
            "starting lattice search"
        );

        // Score any unscored node handed in with the lattice, root first.
        let unscored: Vec<NodeId> = lattice
            .nodes()
            .filter(|n| !n.is_scored())
            .map(|n| n.id())
            .collect();
        for id in unscored {
            let Some(pattern) = lattice.node(id).map(|n| n.pattern().clone()) else {
                continue;
            };
            let scoring = score_pattern(&**matcher, *policy, &pattern, db);
            record(lattice, id, scoring, &mut diagnostics);
        }

        if db.is_empty() {
            info!("empty graph database, nothing to reformulate against");
            return Ok(finish(lattice, Termination::Exhausted, 0, diagnostics));
        }

        let mut frontier: BinaryHeap<FrontierEntry> = lattice.nodes().map(entry_for).collect();
        let mut expanded: HashSet<NodeId> = HashSet::new();
        let mut expansions = 0;

        let termination = loop {
            if cancel
                .as_ref()
                .is_some_and(|flag| flag.load(AtomicOrdering::Relaxed))
            {
                break Termination::Cancelled;
            }
            if out_of_time(budget, started) {
                break Termination::BudgetExceeded(BudgetLimit::Time);
            }
            if budget.max_expansions.is_some_and(|max| expansions >= max) {
                break Termination::BudgetExceeded(BudgetLimit::Expansions);
            }
            if budget.max_nodes.is_some_and(|max| lattice.len() >= max) {
                break Termination::BudgetExceeded(BudgetLimit::Nodes);
            }

            let Some(next) = frontier.pop() else {
                break Termination::Exhausted;
            };
            if !expanded.insert(next.id) {
                continue;
            }
            if let Some(k) = *top_k {
                if kth_best(lattice, k).is_some_and(|worst_kept| next.score < worst_kept) {
                    break Termination::Saturated;
                }
            }
            let Some((pattern, generation)) = lattice
                .node(next.id)
                .map(|n| (n.pattern().clone(), n.generation()))
            else {
                continue;
            };
            if budget.max_depth.is_some_and(|depth| generation >= depth) {
                debug!(node = %next.id, "depth limit reached, not expanding");
                continue;
            }

            let candidates = generator.candidates(&pattern);
            expansions += 1;
            debug!(
                node = %next.id,
                score = next.score,
                candidates = candidates.len(),
                "expanding"
            );

            for candidate in candidates {
                if out_of_time(budget, started) {
                    break;
                }
                let key = lattice.key_of(&candidate);
                match lattice.find_key(&key) {
                    Some(existing)
                        if existing == next.id || lattice.is_ancestor(next.id, existing) =>
                    {
                        debug!(node = %next.id, candidate = %existing, "candidate is already more specific, discarding");
                    }
                    Some(existing) => match lattice.insert_keyed(key, candidate, &[next.id]) {
                        Ok(insertion) => {
                            if !expanded.contains(&insertion.id()) {
                                if let Some(node) = lattice.node(insertion.id()) {
                                    frontier.push(entry_for(node));
                                }
                            }
                        }
                        Err(e) => reject(existing, e, &mut diagnostics),
                    },
                    None => {
                        if budget.max_nodes.is_some_and(|max| lattice.len() >= max) {
                            break;
                        }
                        let scoring = score_pattern(&**matcher, *policy, &candidate, db);
                        match lattice.insert_keyed(key, candidate, &[next.id]) {
                            Ok(Insertion::Created(id)) | Ok(Insertion::Merged(id)) => {
                                record(lattice, id, scoring, &mut diagnostics);
                                if let Some(node) = lattice.node(id) {
                                    frontier.push(entry_for(node));
                                }
                            }
                            Err(e) => reject(next.id, e, &mut diagnostics),
                        }
                    }
                }
            }
        };

        info!(
            ?termination,
            expansions,
            nodes = lattice.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "lattice search finished"
        );
        Ok(finish(lattice, termination, expansions, diagnostics))
    }
}

fn out_of_time(budget: &SearchBudget, started: Instant) -> bool {
    budget
        .time_limit
        .is_some_and(|limit| started.elapsed() >= limit)
}

fn entry_for(node: &crate::lattice::ReformulationNode) -> FrontierEntry {
    FrontierEntry {
        score: node.score().unwrap_or(0.0),
        generation: node.generation(),
        id: node.id(),
    }
}

fn record(
    lattice: &ReformulationLattice,
    id: NodeId,
    scoring: Scoring,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (graph, error) in scoring.failures {
        warn!(node = %id, graph, error = %error, "match failure, counting as zero");
        diagnostics.push(Diagnostic {
            kind: DiagnosticKind::MatchFailure,
            message: format!("{} vs graph {}: {}", id, graph, error),
        });
    }
    // The lattice is the single writer of scores; an already scored node keeps its score.
    let _ = lattice.record_score(id, scoring.score);
}

fn reject(node: NodeId, error: LatticeError, diagnostics: &mut Vec<Diagnostic>) {
    warn!(node = %node, error = %error, "dropping candidate");
    diagnostics.push(Diagnostic {
        kind: DiagnosticKind::DuplicateEdgeViolation,
        message: error.to_string(),
    });
}

/// Score of the k-th best node discovered so far.
fn kth_best(lattice: &ReformulationLattice, k: usize) -> Option<f64> {
    if lattice.len() < k {
        return None;
    }
    let mut scores: Vec<f64> = lattice.nodes().map(|n| n.score().unwrap_or(0.0)).collect();
    scores.sort_by(|a, b| b.total_cmp(a));
    scores.get(k - 1).copied()
}

fn finish(
    lattice: &ReformulationLattice,
    termination: Termination,
    expansions: usize,
    diagnostics: Vec<Diagnostic>,
) -> SearchOutcome {
    let mut results: Vec<RankedReformulation> = lattice
        .nodes()
        .map(|node| {
            let score = node.node_score();
            RankedReformulation {
                id: node.id(),
                pattern: node.pattern().clone(),
                score: score.map(|s| s.value).unwrap_or(0.0),
                generation: node.generation(),
                provenance: node.provenance().iter().copied().collect(),
                chain: lattice.provenance_chain(node.id()),
                matched: score.map(|s| s.matched.clone()).unwrap_or_default(),
            }
        })
        .collect();
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.generation.cmp(&b.generation))
            .then_with(|| a.id.cmp(&b.id))
    });

    SearchOutcome {
        results,
        termination,
        expansions,
        lattice_size: lattice.len(),
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchError;
    use crate::pattern::{PatternEdge, WILDCARD};

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

    fn db() -> Vec<GraphPattern> {
        vec![
            pattern(&["a", "b"], &[(0, 1, "x")]),
            pattern(&["a", "b", "c"], &[(0, 1, "x"), (1, 2, "y")]),
            pattern(&["a", "b"], &[(0, 1, "y")]),
        ]
    }

    fn algorithm(query: GraphPattern, graphs: Vec<GraphPattern>) -> LatticeAlgorithm {
        let mut algo = LatticeAlgorithm::default();
        algo.set_db(graphs);
        algo.set_lattice(ReformulationLattice::seed(query, false));
        algo
    }

    /// Proposes the same fixed candidates for every pattern.
    struct Fixed(Vec<GraphPattern>);

    impl CandidateGenerator for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn candidates(&self, _: &GraphPattern) -> Vec<GraphPattern> {
            self.0.clone()
        }
    }

    #[test]
    fn test_missing_inputs_are_fatal() {
        let mut algo = LatticeAlgorithm::default();
        assert_eq!(
            algo.run(&SearchBudget::unbounded()),
            Err(SearchError::MissingInput("graph database"))
        );
        algo.set_db(db());
        assert_eq!(
            algo.run(&SearchBudget::unbounded()),
            Err(SearchError::MissingInput("reformulation lattice"))
        );
    }

    #[test]
    fn test_root_is_scored_and_ranked() {
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();

        let query = outcome.query().unwrap();
        assert_eq!(query.score, 2.0);
        assert_eq!(query.matched, vec![0, 1]);
        assert_eq!(outcome.termination, Termination::Exhausted);
        assert_eq!(outcome.results.len(), outcome.lattice_size);
        // Broadest reformulations match all three graphs and come first.
        assert_eq!(outcome.results[0].score, 3.0);
    }

    #[test]
    fn test_results_are_sorted() {
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();
        for pair in outcome.results.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.score > b.score
                    || (a.score == b.score && a.generation < b.generation)
                    || (a.score == b.score && a.generation == b.generation && a.id < b.id)
            );
        }
    }

    #[test]
    fn test_expansion_budget() {
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        let outcome = algo
            .run(&SearchBudget::unbounded().with_max_expansions(1))
            .unwrap();
        assert_eq!(
            outcome.termination,
            Termination::BudgetExceeded(BudgetLimit::Expansions)
        );
        assert_eq!(outcome.expansions, 1);
        // Root plus its four one-step generalizations.
        assert_eq!(outcome.lattice_size, 5);
    }

    #[test]
    fn test_node_budget() {
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        let outcome = algo.run(&SearchBudget::unbounded().with_max_nodes(3)).unwrap();
        assert_eq!(
            outcome.termination,
            Termination::BudgetExceeded(BudgetLimit::Nodes)
        );
        assert_eq!(outcome.lattice_size, 3);
    }

    #[test]
    fn test_depth_budget() {
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        let outcome = algo.run(&SearchBudget::unbounded().with_max_depth(1)).unwrap();
        assert_eq!(outcome.termination, Termination::Exhausted);
        assert!(outcome.results.iter().all(|r| r.generation <= 1));
        assert_eq!(outcome.expansions, 1);
    }

    #[test]
    fn test_cancellation_stops_before_expanding() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db())
            .with_cancellation(flag);
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();
        assert_eq!(outcome.termination, Termination::Cancelled);
        assert_eq!(outcome.lattice_size, 1);
        assert_eq!(outcome.results[0].score, 2.0);
    }

    #[test]
    fn test_time_budget_stops_before_expanding() {
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        let outcome = algo
            .run(&SearchBudget::unbounded().with_time_limit(Duration::ZERO))
            .unwrap();
        assert_eq!(
            outcome.termination,
            Termination::BudgetExceeded(BudgetLimit::Time)
        );
        assert_eq!(outcome.expansions, 0);
        assert_eq!(outcome.lattice_size, 1);
        assert_eq!(outcome.results[0].score, 2.0);
    }

    #[test]
    fn test_time_budget_bounds_symmetric_query() {
        // Twelve interchangeable leaves around one hub.
        let mut nodes = vec!["*"; 13];
        nodes[0] = "a";
        let edges: Vec<(usize, usize, &str)> = (1..13).map(|i| (0, i, "x")).collect();
        let mut algo = algorithm(pattern(&nodes, &edges), db());
        let limit = Duration::from_millis(200);
        let started = Instant::now();
        let outcome = algo
            .run(&SearchBudget::unbounded().with_time_limit(limit))
            .unwrap();
        assert!(started.elapsed() < limit * 10);
        assert!(outcome.lattice_size >= 1);
    }

    #[test]
    fn test_set_db_drops_scored_lattice() {
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        algo.run(&SearchBudget::unbounded().with_max_expansions(1))
            .unwrap();
        algo.set_db(vec![pattern(&["a", "b"], &[(0, 1, "x")])]);
        assert!(algo.lattice().is_none());
        assert_eq!(
            algo.run(&SearchBudget::unbounded()),
            Err(SearchError::MissingInput("reformulation lattice"))
        );

        algo.set_lattice(ReformulationLattice::seed(
            pattern(&["a", "b"], &[(0, 1, "x")]),
            false,
        ));
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();
        assert_eq!(outcome.query().unwrap().score, 1.0);
    }

    #[test]
    fn test_top_k_saturation() {
        let mut algo =
            algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db()).with_top_k(1);
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();
        assert_eq!(outcome.termination, Termination::Saturated);
        assert_eq!(outcome.results[0].score, 3.0);
    }

    #[test]
    fn test_candidate_equal_to_root_is_discarded() {
        let query = pattern(&["a", "b"], &[(0, 1, "x")]);
        let mut algo = LatticeAlgorithm::default()
            .with_generator(Box::new(Fixed(vec![pattern(&["b", "a"], &[(1, 0, "x")])])));
        algo.set_db(db());
        algo.set_lattice(ReformulationLattice::seed(query, false));
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();
        assert_eq!(outcome.lattice_size, 1);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_match_failures_are_recovered() {
        let mut graphs = db();
        graphs.push(
            serde_json::from_str(r#"{"nodes": [], "edges": [{"source": 0, "target": 0, "label": "x"}]}"#)
                .unwrap(),
        );
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), graphs);
        let outcome = algo
            .run(&SearchBudget::unbounded().with_max_expansions(1))
            .unwrap();
        assert_eq!(outcome.query().unwrap().score, 2.0);
        assert!(!outcome.diagnostics.is_empty());
        assert!(
            outcome
                .diagnostics
                .iter()
                .all(|d| d.kind == DiagnosticKind::MatchFailure)
        );
    }

    #[test]
    fn test_empty_database_returns_root_only() {
        let mut algo = algorithm(pattern(&["a"], &[]), Vec::new());
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].score, 0.0);
        assert_eq!(outcome.expansions, 0);
    }

    #[test]
    fn test_malformed_root_is_rejected() {
        let root: GraphPattern = serde_json::from_str(
            r#"{"nodes": ["a"], "edges": [{"source": 0, "target": 3, "label": "x"}]}"#,
        )
        .unwrap();
        let mut algo = algorithm(root, db());
        assert!(matches!(
            algo.run(&SearchBudget::unbounded()),
            Err(SearchError::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_convergent_reformulations_share_a_node() {
        // Relaxing the edge label then the node label, or the other way round,
        // reaches the same pattern once with two parents.
        let mut algo = algorithm(pattern(&["a", "b"], &[(0, 1, "x")]), db());
        algo.run(&SearchBudget::unbounded()).unwrap();
        let lattice = algo.lattice().unwrap();
        let target = pattern(&[WILDCARD, "b"], &[(0, 1, WILDCARD)]);
        let id = lattice.find(&target).unwrap();
        assert_eq!(lattice.neighbors_down(id).len(), 2);
    }

    #[test]
    fn test_frontier_prefers_specific_nodes_at_equal_score() {
        let mut heap = BinaryHeap::new();
        heap.push(FrontierEntry { score: 1.0, generation: 2, id: NodeId(1) });
        heap.push(FrontierEntry { score: 1.0, generation: 1, id: NodeId(3) });
        heap.push(FrontierEntry { score: 1.0, generation: 1, id: NodeId(2) });
        heap.push(FrontierEntry { score: 0.5, generation: 0, id: NodeId(0) });
        let order: Vec<NodeId> = std::iter::from_fn(|| heap.pop().map(|e| e.id)).collect();
        assert_eq!(order, vec![NodeId(2), NodeId(3), NodeId(1), NodeId(0)]);
    }

    #[test]
    fn test_custom_matcher_failure_is_isolated() {
        struct Flaky;
        impl GraphMatcher for Flaky {
            fn name(&self) -> &'static str {
                "flaky"
            }
            fn score(&self, p: &GraphPattern, _: &GraphPattern) -> Result<f64, MatchError> {
                if p.edge_count() == 0 {
                    Err(MatchError::MalformedPattern(
                        crate::pattern::PatternError::DanglingEndpoint {
                            edge: 0,
                            endpoint: 0,
                            nodes: 0,
                        },
                    ))
                } else {
                    Ok(1.0)
                }
            }
        }
        let mut algo = LatticeAlgorithm::default().with_matcher(Box::new(Flaky));
        algo.set_db(db());
        algo.set_lattice(ReformulationLattice::seed(pattern(&["a", "b"], &[(0, 1, "x")]), false));
        let outcome = algo.run(&SearchBudget::unbounded()).unwrap();
        assert_eq!(outcome.query().unwrap().score, 3.0);
        assert!(outcome.lattice_size > 1);
        assert!(outcome.results.iter().any(|r| r.score == 0.0));
    }
}
