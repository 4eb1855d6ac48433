//! Aggregating per-graph match scores into a node score.
//!
//! Scoring one pattern against the database is the dominant cost of a search,
//! so the per-graph comparisons fan out over the rayon pool. Results are
//! collected in database order and reduced sequentially, which keeps the
//! aggregate bit-for-bit deterministic.

use crate::matcher::{GraphMatcher, MatchError};
use crate::pattern::GraphPattern;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How per-graph scores combine into one support value.
///
/// Both policies are non-decreasing when a pattern is generalized (it can only
/// gain matches), which is what makes generalization edges sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorePolicy {
    /// Sum of per-graph scores (number of matched graphs for exact matchers).
    #[default]
    MatchCount,
    /// Mean per-graph score over the database, in `[0, 1]`.
    Support,
}

impl ScorePolicy {
    pub fn aggregate(&self, scores: &[f64]) -> f64 {
        let total: f64 = scores.iter().sum();
        match self {
            ScorePolicy::MatchCount => total,
            ScorePolicy::Support if scores.is_empty() => 0.0,
            ScorePolicy::Support => total / scores.len() as f64,
        }
    }
}

impl std::str::FromStr for ScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "match-count" | "count" => Ok(ScorePolicy::MatchCount),
            "support" => Ok(ScorePolicy::Support),
            _ => Err(format!(
                "Invalid score policy: {}. Must be match-count or support",
                s
            )),
        }
    }
}

/// The cached score of a lattice node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub value: f64,
    /// Database positions the pattern matched, ascending.
    pub matched: Vec<usize>,
}

/// A node score plus the comparisons that failed while computing it.
#[derive(Debug, Clone)]
pub struct Scoring {
    pub score: NodeScore,
    pub failures: Vec<(usize, MatchError)>,
}

/// Score `pattern` against every graph in `db`.
///
/// A failed comparison contributes zero and is reported in
/// [`Scoring::failures`]; it never aborts the scoring of the other graphs.
pub fn score_pattern(
    matcher: &dyn GraphMatcher,
    policy: ScorePolicy,
    pattern: &GraphPattern,
    db: &[GraphPattern],
) -> Scoring {
    let outcomes: Vec<Result<f64, MatchError>> = db
        .par_iter()
        .map(|graph| matcher.score(pattern, graph))
        .collect();

    let mut scores = Vec::with_capacity(outcomes.len());
    let mut matched = Vec::new();
    let mut failures = Vec::new();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(s) => {
                let s = if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) };
                if s > 0.0 {
                    matched.push(i);
                }
                scores.push(s);
            }
            Err(e) => {
                scores.push(0.0);
                failures.push((i, e));
            }
        }
    }

    Scoring {
        score: NodeScore {
            value: policy.aggregate(&scores),
            matched,
        },
        failures,
    }
}
