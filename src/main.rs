//! gref CLI - search graph query reformulations and draw the results.

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use gref::config::OutputConfig;
use gref::{
    GraphPattern, ReformulationLattice, SearchConfig, SearchOutcome, SearchReport, Termination,
    export_dot, load_config, load_database, load_queries, load_report, save_report,
};
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gref")]
#[command(about = "Best-first search for broader reformulations of graph queries")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reformulate every query against a graph database
    Search {
        /// Graph database (YAML/JSON file or directory)
        #[arg(long)]
        db: PathBuf,

        /// Queries to reformulate (YAML/JSON file or directory)
        #[arg(long)]
        queries: PathBuf,

        /// Search configuration file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Treat graphs as directed
        #[arg(long)]
        directed: bool,

        /// Maximum number of expanded nodes per query
        #[arg(long)]
        max_expansions: Option<usize>,

        /// Maximum lattice size per query, root included
        #[arg(long)]
        max_nodes: Option<usize>,

        /// Do not expand nodes at this generation
        #[arg(long)]
        max_depth: Option<u32>,

        /// Wall-clock limit per query, in seconds
        #[arg(long)]
        time_limit: Option<f64>,

        /// Stop once the top K results cannot change
        #[arg(long)]
        top_k: Option<usize>,

        /// Matcher (subgraph, homomorphism)
        #[arg(long)]
        matcher: Option<String>,

        /// Score policy (match-count, support)
        #[arg(long)]
        score: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Also write the JSON report to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Write one DOT file per query into this folder
        #[arg(long)]
        dot: Option<PathBuf>,

        /// DOT file name prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Node label map file
        #[arg(long)]
        node_labels: Option<PathBuf>,

        /// Edge label map file
        #[arg(long)]
        edge_labels: Option<PathBuf>,

        /// Label map field separator
        #[arg(long)]
        sep: Option<String>,
    },

    /// Draw a saved JSON report as DOT files
    Draw {
        /// Report written by `gref search --save` or `--format json`
        #[arg(long)]
        results: PathBuf,

        /// Output folder
        #[arg(long, default_value = "results")]
        out: PathBuf,

        /// DOT file name prefix
        #[arg(long, default_value = "result")]
        prefix: String,

        /// Node label map file
        #[arg(long)]
        node_labels: Option<PathBuf>,

        /// Edge label map file
        #[arg(long)]
        edge_labels: Option<PathBuf>,

        /// Label map field separator
        #[arg(long, default_value = "\t")]
        sep: String,

        /// Draw directed edges even if the report is undirected
        #[arg(long)]
        directed: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    // stdout carries results; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn is_json(format: &str) -> bool {
    format == "json"
}

fn emit_error(format: &str, code: &str, detail: &str) -> ! {
    if is_json(format) {
        eprintln!("{}", json!({"error": code, "detail": detail}));
    } else {
        eprintln!("{}", format!("Error: {}", detail).red());
    }
    process::exit(1);
}

fn describe(termination: &Termination) -> String {
    match termination {
        Termination::Exhausted => "exhausted".to_string(),
        Termination::Saturated => "saturated".to_string(),
        Termination::BudgetExceeded(limit) => format!("budget exceeded ({:?})", limit).to_lowercase(),
        Termination::Cancelled => "cancelled".to_string(),
    }
}

fn query_title(index: usize, query: &GraphPattern) -> String {
    match query.name() {
        Some(name) => format!("Query {}: {}", index + 1, name),
        None => format!("Query {}", index + 1),
    }
}

fn print_outcome(index: usize, query: &GraphPattern, outcome: &SearchOutcome) {
    println!("{}", query_title(index, query).bold());
    println!(
        "{}",
        format!(
            "{}, {} expansions, {} nodes",
            describe(&outcome.termination),
            outcome.expansions,
            outcome.lattice_size
        )
        .dimmed()
    );

    for (rank, result) in outcome.results.iter().enumerate() {
        let marker = if result.provenance.is_empty() {
            "Q".cyan()
        } else {
            "·".dimmed()
        };
        let from: Vec<String> = result.provenance.iter().map(|p| p.to_string()).collect();
        let from = if from.is_empty() {
            String::new()
        } else {
            format!(" <- {}", from.join(", "))
        };
        println!(
            "  {} {:>3}. {} score {} gen {}{}",
            marker,
            rank + 1,
            result.id.to_string().cyan(),
            result.score.to_string().green(),
            result.generation,
            from.dimmed()
        );
        println!("        {}", result.pattern);
    }

    for diagnostic in &outcome.diagnostics {
        println!("  {} {}", "!".yellow(), diagnostic.message.yellow());
    }
    println!();
}

#[allow(clippy::too_many_arguments)]
fn apply_overrides(
    config: &mut SearchConfig,
    format: &str,
    directed: bool,
    max_expansions: Option<usize>,
    max_nodes: Option<usize>,
    max_depth: Option<u32>,
    time_limit: Option<f64>,
    top_k: Option<usize>,
    matcher: Option<String>,
    score: Option<String>,
) {
    if directed {
        config.directed = true;
    }
    if max_expansions.is_some() {
        config.budget.max_expansions = max_expansions;
    }
    if max_nodes.is_some() {
        config.budget.max_nodes = max_nodes;
    }
    if max_depth.is_some() {
        config.budget.max_depth = max_depth;
    }
    if time_limit.is_some() {
        config.budget.time_limit_secs = time_limit;
    }
    if top_k.is_some() {
        config.top_k = top_k;
    }
    if let Some(m) = matcher {
        config.matcher = m
            .parse()
            .unwrap_or_else(|e: String| emit_error(format, "invalid_argument", &e));
    }
    if let Some(s) = score {
        config.score = s
            .parse()
            .unwrap_or_else(|e: String| emit_error(format, "invalid_argument", &e));
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Search {
            db,
            queries,
            config,
            directed,
            max_expansions,
            max_nodes,
            max_depth,
            time_limit,
            top_k,
            matcher,
            score,
            format,
            save,
            dot,
            prefix,
            node_labels,
            edge_labels,
            sep,
        } => {
            let mut config = match &config {
                Some(path) => load_config(path)
                    .unwrap_or_else(|e| emit_error(&format, "config_error", &e.to_string())),
                None => SearchConfig::default(),
            };
            apply_overrides(
                &mut config,
                &format,
                directed,
                max_expansions,
                max_nodes,
                max_depth,
                time_limit,
                top_k,
                matcher,
                score,
            );
            if dot.is_some() {
                config.output.folder = dot;
            }
            if let Some(p) = prefix {
                config.output.prefix = p;
            }
            if node_labels.is_some() {
                config.output.node_labels = node_labels;
            }
            if edge_labels.is_some() {
                config.output.edge_labels = edge_labels;
            }
            if let Some(s) = sep {
                config.output.separator = s;
            }

            let graphs = load_database(&db)
                .unwrap_or_else(|e| emit_error(&format, "load_error", &e.to_string()));
            let queries = load_queries(&queries)
                .unwrap_or_else(|e| emit_error(&format, "load_error", &e.to_string()));
            let budget = config.budget.to_budget();

            let database_size = graphs.len();
            let mut algorithm = config.build_algorithm();
            algorithm.set_db(graphs);

            let mut outcomes = Vec::with_capacity(queries.len());
            for query in &queries {
                algorithm.set_lattice(ReformulationLattice::seed(query.clone(), config.directed));
                match algorithm.run(&budget) {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => emit_error(&format, "search_error", &e.to_string()),
                }
            }

            let report = SearchReport {
                generated_at: Utc::now(),
                directed: config.directed,
                matcher: config.matcher.name().to_string(),
                database_size,
                queries: outcomes,
            };

            if let Some(path) = &save {
                if let Err(e) = save_report(path, &report) {
                    emit_error(&format, "save_error", &e.to_string());
                }
            }

            let mut written = Vec::new();
            if let Some(folder) = &config.output.folder {
                let options = config
                    .output
                    .dot_options(folder, config.directed)
                    .unwrap_or_else(|e| emit_error(&format, "label_error", &e.to_string()));
                written = export_dot(&report.queries, options)
                    .unwrap_or_else(|e| emit_error(&format, "export_error", &e.to_string()));
            }

            if is_json(&format) {
                match serde_json::to_string_pretty(&report) {
                    Ok(s) => println!("{}", s),
                    Err(e) => emit_error(&format, "serialize_error", &e.to_string()),
                }
            } else {
                for (i, (query, outcome)) in queries.iter().zip(&report.queries).enumerate() {
                    print_outcome(i, query, outcome);
                }
                for path in &written {
                    println!("{}", format!("Wrote {}", path.display()).green());
                }
            }
        }

        Commands::Draw {
            results,
            out,
            prefix,
            node_labels,
            edge_labels,
            sep,
            directed,
            format,
        } => {
            let report = load_report(&results)
                .unwrap_or_else(|e| emit_error(&format, "load_error", &e.to_string()));
            let output = OutputConfig {
                folder: Some(out.clone()),
                prefix,
                separator: sep,
                node_labels,
                edge_labels,
            };
            let options = output
                .dot_options(&out, directed || report.directed)
                .unwrap_or_else(|e| emit_error(&format, "label_error", &e.to_string()));
            let written = export_dot(&report.queries, options)
                .unwrap_or_else(|e| emit_error(&format, "export_error", &e.to_string()));

            if is_json(&format) {
                let files: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
                println!("{}", json!({"success": true, "files": files}));
            } else if written.is_empty() {
                println!("{}", "No results with reformulations to draw".yellow());
            } else {
                for path in &written {
                    println!("{}", format!("Wrote {}", path.display()).green());
                }
            }
        }
    }
}
