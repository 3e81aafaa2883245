//! hret - hybrid retrieval CLI
//!
//! Builds the sparse index, runs hybrid searches, and evaluates retrieval
//! quality against a labeled query set.
//!
//! # Usage
//!
//! ```bash
//! # Index a JSONL corpus (file or directory)
//! hret index --corpus chunks/
//!
//! # Search
//! hret search "meaning of life" --method hybrid
//!
//! # Evaluate with synthetic backends
//! hret eval --dataset eval.json --offline --show-table
//! ```
//!
//! Results go to stdout, logs and errors to stderr. Exit codes: 0 = the run
//! completed (even if some queries degraded), 1 = setup error.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hybrid_retrieval::search::SearchResponse;
use hybrid_retrieval::{
    ArtifactStore, DEFAULT_ARTIFACT_DIR, EvalConfig, EvalHarness, EvalReport, FusionMode,
    HybridConfig, HybridSearcher, Indexer, Reranker, RetrievalMethod, RetrievalStatus, Retriever,
    SparseIndex, UnconfiguredDense, load_dataset,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hret")]
#[command(version)]
#[command(about = "Hybrid sparse + dense retrieval with an evaluation harness")]
#[command(long_about = r#"
hret combines a TF-IDF keyword index with a dense semantic backend.

It provides:
  - Corpus indexing into persistent artifacts
  - Hybrid search with weighted, alpha, or RRF fusion
  - Offline evaluation: Coverage@k, Precision@k, MRR@k, latency

Use --json for machine-readable output.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding index artifacts
    #[arg(long, global = true, default_value = DEFAULT_ARTIFACT_DIR)]
    artifacts: PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the sparse index from JSONL chunk files
    Index {
        /// JSONL file, or directory searched for *.jsonl
        #[arg(long)]
        corpus: PathBuf,
    },

    /// Run one search
    Search {
        /// Search query
        query: String,

        /// Retrieval method
        #[arg(short, long, value_enum, default_value = "hybrid")]
        method: RetrievalMethod,

        /// Maximum results to return
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        #[command(flatten)]
        fusion: FusionArgs,

        /// Rerank results with a cross-encoder (needs the `semantic` feature)
        #[arg(long)]
        rerank: bool,
    },

    /// Evaluate sparse, dense, and hybrid retrieval on a labeled dataset
    Eval {
        /// Dataset (.json array, .jsonl, or .csv with `;`-separated substrings)
        #[arg(long)]
        dataset: PathBuf,

        /// Cutoff for the @k metrics
        #[arg(short, default_value = "5")]
        k: usize,

        #[command(flatten)]
        fusion: FusionArgs,

        /// Print one row per query and method
        #[arg(long)]
        show_table: bool,

        /// Rerank results with a cross-encoder (needs the `semantic` feature)
        #[arg(long)]
        rerank: bool,

        /// Replace both backends with deterministic synthetic generators
        #[arg(long)]
        offline: bool,

        /// Directory for latest_results.json
        #[arg(long, default_value = "eval_results")]
        output_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FusionKind {
    Weighted,
    Alpha,
    Rrf,
}

#[derive(Args)]
struct FusionArgs {
    /// Fusion mode
    #[arg(long, value_enum)]
    fusion: Option<FusionKind>,

    /// Dense weight for alpha fusion, in [0, 1]
    #[arg(long)]
    alpha: Option<f32>,
}

impl FusionArgs {
    fn mode(&self) -> Result<FusionMode> {
        let mode = match (self.fusion, self.alpha) {
            (None | Some(FusionKind::Weighted), None) => FusionMode::default(),
            (None | Some(FusionKind::Alpha), Some(alpha)) => FusionMode::alpha(alpha),
            (Some(FusionKind::Alpha), None) => FusionMode::alpha(0.5),
            (Some(FusionKind::Rrf), None) => FusionMode::rrf(),
            (Some(_), Some(_)) => bail!("--alpha only applies to --fusion alpha"),
        };
        mode.validate()?;
        Ok(mode)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr to keep stdout clean
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    match run_command(&cli).await {
        Ok(output) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_human_readable(&output);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({
                    "error": format!("{e:#}")
                });
                eprintln!("{}", serde_json::to_string_pretty(&err)?);
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: &Cli) -> Result<Output> {
    let store = ArtifactStore::new(&cli.artifacts);

    match &cli.command {
        Commands::Index { corpus } => {
            let indexer = Indexer::new(store);
            let (_, summary) = indexer
                .index_path(corpus)
                .with_context(|| format!("Failed to index {}", corpus.display()))?;
            Ok(Output::Index {
                chunks: summary.manifest.chunk_count,
                terms: summary.manifest.vocab_size,
                duplicates: summary.duplicates,
                artifacts: cli.artifacts.display().to_string(),
            })
        }

        Commands::Search {
            query,
            method,
            limit,
            fusion,
            rerank,
        } => {
            let config = HybridConfig::default()
                .with_fusion(fusion.mode()?)
                .with_top_k(*limit);
            let index = load_index(&store)?;
            let dense = dense_backend(&index);
            let mut searcher = HybridSearcher::new(Arc::new(index), dense, config)?;
            if *rerank {
                searcher = searcher.with_reranker(cross_encoder()?);
            }

            let response = searcher.search_with(*method, query, *limit).await?;
            tracing::debug!(instruments = ?searcher.instruments().snapshot(), "search finished");
            Ok(Output::Search {
                query: query.clone(),
                response,
            })
        }

        Commands::Eval {
            dataset,
            k,
            fusion,
            show_table,
            rerank,
            offline,
            output_dir,
        } => {
            let config = EvalConfig {
                k: *k,
                hybrid: HybridConfig::default().with_fusion(fusion.mode()?),
                ..EvalConfig::default()
            };
            let queries = load_dataset(dataset)?;

            let mut harness = if *offline {
                EvalHarness::offline(config)?
            } else {
                let index = load_index(&store)?;
                let dense = dense_backend(&index);
                EvalHarness::new(Arc::new(index), dense, config)?
            };
            if *rerank {
                harness = harness.with_reranker(cross_encoder()?);
            }

            let report = harness.run(&queries).await;
            let results_path = report
                .save(output_dir)
                .with_context(|| format!("Failed to write results to {}", output_dir.display()))?;

            Ok(Output::Eval {
                report: Box::new(report),
                results_path: results_path.display().to_string(),
                show_table: *show_table,
            })
        }
    }
}

fn load_index(store: &ArtifactStore) -> Result<SparseIndex> {
    store.load().with_context(|| {
        format!(
            "Failed to load index from {} (run `hret index --corpus <path>` first)",
            store.dir().display()
        )
    })
}

#[cfg(feature = "semantic")]
fn dense_backend(index: &SparseIndex) -> Arc<dyn Retriever> {
    let chunks = index.docs().iter().map(|d| d.chunk.clone()).collect();
    match hybrid_retrieval::EmbeddingRetriever::build(chunks) {
        Ok(retriever) => Arc::new(retriever),
        Err(e) => {
            tracing::warn!("Dense backend unavailable: {}", e);
            Arc::new(UnconfiguredDense::new(e.to_string()))
        }
    }
}

#[cfg(not(feature = "semantic"))]
fn dense_backend(_index: &SparseIndex) -> Arc<dyn Retriever> {
    Arc::new(UnconfiguredDense::new(
        "no dense backend configured (build with the `semantic` feature)",
    ))
}

#[cfg(feature = "semantic")]
fn cross_encoder() -> Result<Arc<dyn Reranker>> {
    let reranker = hybrid_retrieval::CrossEncoderReranker::new()
        .context("Failed to load the cross-encoder model")?;
    Ok(Arc::new(reranker))
}

#[cfg(not(feature = "semantic"))]
fn cross_encoder() -> Result<Arc<dyn Reranker>> {
    bail!("--rerank requires the `semantic` feature")
}

#[derive(serde::Serialize)]
#[serde(tag = "type")]
enum Output {
    Index {
        chunks: usize,
        terms: usize,
        duplicates: usize,
        artifacts: String,
    },
    Search {
        query: String,
        #[serde(flatten)]
        response: SearchResponse,
    },
    Eval {
        report: Box<EvalReport>,
        results_path: String,
        #[serde(skip)]
        show_table: bool,
    },
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Index {
            chunks,
            terms,
            duplicates,
            artifacts,
        } => {
            println!("Indexed {} chunks, {} terms", chunks, terms);
            if *duplicates > 0 {
                println!("Skipped {} duplicate chunks", duplicates);
            }
            println!("Artifacts: {}", artifacts);
        }
        Output::Search { query, response } => {
            println!("Search ({}): \"{}\"", response.method, query);
            if let RetrievalStatus::Partial { failed, reason } = &response.status {
                println!("Partial results: {} side failed ({})", failed, reason);
            }
            println!("Found {} results:", response.results.len());
            for (i, r) in response.results.iter().enumerate() {
                println!(
                    "  {:>2}. {:.3} [{:?}] {} {}",
                    i + 1,
                    r.score(),
                    r.source,
                    r.id,
                    preview(&r.text, 80)
                );
            }
        }
        Output::Eval {
            report,
            results_path,
            show_table,
        } => {
            if *show_table {
                println!("{}", report.render_table());
            }
            print!("{}", report.render_summary());
            println!("\nDetailed results saved to: {}", results_path);
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
