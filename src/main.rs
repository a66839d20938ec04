use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use grounded_rag::config::Config;
use grounded_rag::engine::{HealthStatus, RagEngine};
use grounded_rag::error::EngineError;
use grounded_rag::models::{AnswerRequest, Query, SearchType};
use grounded_rag::search::vector::VectorStore;

#[derive(Parser)]
#[command(name = "grounded-rag", version, about = "Search documents and answer questions from them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
}

impl From<SearchMode> for SearchType {
    fn from(mode: SearchMode) -> Self {
        match mode {
            SearchMode::Semantic => SearchType::Semantic,
            SearchMode::Keyword => SearchType::Keyword,
            SearchMode::Hybrid => SearchType::Hybrid,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Rank stored fragments against a query
    Search {
        query: String,
        /// Only search fragments from this source
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
        /// Merge keyword matches into the vector ranking
        #[arg(long)]
        hybrid: bool,
        #[arg(long, value_enum, conflicts_with = "hybrid")]
        search_type: Option<SearchMode>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer a question using only the stored documents
    Ask {
        question: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        min_score: Option<f32>,
        #[arg(long)]
        hybrid: bool,
        #[arg(long, value_enum, conflicts_with = "hybrid")]
        search_type: Option<SearchMode>,
        #[arg(long)]
        json: bool,
    },
    /// Check the embedding service, fragment store and LLM
    Health {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let store = VectorStore::open_or_create(&config.store_path())
        .with_context(|| format!("Failed to open store at {}", config.store_path().display()))?;
    tracing::info!("Loaded {} fragments", store.fragment_count());

    let default_top_k = config.retrieval.default_top_k;
    let default_min_score = config.retrieval.default_min_score;
    let engine = RagEngine::from_config(config, Arc::new(store))?;

    match cli.command {
        Command::Search {
            query,
            source,
            top_k,
            min_score,
            hybrid,
            search_type,
            json,
        } => {
            let search_type = search_type
                .map(SearchType::from)
                .unwrap_or(SearchType::from_hybrid(hybrid));
            let mut q = Query::new(query)
                .with_top_k(top_k.unwrap_or(default_top_k))
                .with_min_score(min_score.unwrap_or(default_min_score))
                .with_search_type(search_type);
            if let Some(source) = source {
                q = q.with_source(source);
            }
            let results = engine.search(&q).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No matching fragments.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "{:>2}. [{:.3}] {} ({:?})",
                        i + 1,
                        r.score,
                        r.fragment.source_name,
                        r.origin
                    );
                    println!("    {}", preview(&r.fragment.text, 160));
                }
            }
        }
        Command::Ask {
            question,
            source,
            min_score,
            hybrid,
            search_type,
            json,
        } => {
            let request = AnswerRequest {
                question,
                source_filter: source,
                hybrid: hybrid.then_some(true),
                search_type: search_type.map(SearchType::from),
                min_score,
            };
            let result = match engine.answer(request).await {
                Ok(result) => result,
                Err(EngineError::Generation(e)) => {
                    eprintln!("{}", e.user_message());
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer);
                if !result.sources.is_empty() {
                    println!("\nSources: {}", result.sources.join(", "));
                }
            }
        }
        Command::Health { json } => {
            let report = engine.health().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("status:     {:?}", report.status);
                println!("embedder:   {:?}", report.embedder);
                println!("repository: {:?}", report.repository);
                println!("generator:  {:?}", report.generator);
            }
            if report.status == HealthStatus::Unhealthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// First `max_chars` characters on one line.
fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
