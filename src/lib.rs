//! gref - Best-first search for broader reformulations of graph queries.
//!
//! A query graph is the root of a lattice of reformulations. Each
//! reformulation generalizes its parents, is scored against a graph database,
//! and is stored once per structural equivalence class. [`LatticeAlgorithm`]
//! explores the lattice best-first within a budget and ranks what it found.

pub mod algorithm;
pub mod canonical;
pub mod config;
pub mod dot;
pub mod generalize;
pub mod labels;
pub mod lattice;
pub mod matcher;
pub mod pattern;
pub mod score;
pub mod storage;

pub use algorithm::{
    BudgetLimit, Diagnostic, DiagnosticKind, LatticeAlgorithm, RankedReformulation, SearchBudget,
    SearchError, SearchOutcome, Termination,
};
pub use canonical::{CanonicalKey, Canonicalizer, ExactCanonicalizer};
pub use config::{ConfigError, GeneratorKind, MatcherKind, SearchConfig, load_config};
pub use dot::{DotExporter, DotOptions, ExportError, export_dot};
pub use generalize::{CandidateGenerator, StructuralGeneralizer};
pub use labels::{LabelError, LabelMap, read_label_map};
pub use lattice::{Insertion, LatticeError, NodeId, ReformulationLattice, ReformulationNode};
pub use matcher::{EmbeddingMatcher, GraphMatcher, MatchError};
pub use pattern::{GraphPattern, PatternEdge, PatternError, WILDCARD};
pub use score::{NodeScore, ScorePolicy};
pub use storage::{
    SearchReport, StorageError, load_database, load_queries, load_report, save_report,
};

/// A graph database: an ordered sequence of graphs.
pub type GraphDatabase = Vec<GraphPattern>;
