//! # Kindred CLI
//!
//! The `kindred` binary wraps the offline batch jobs (corpus import,
//! risk-model training) and one-shot invocations of the serving operations.
//!
//! ## Usage
//!
//! ```bash
//! kindred --config ./config/kindred.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kindred init` | Create an empty index snapshot with the schema in place |
//! | `kindred import <corpus.jsonl>` | Validate, embed, and snapshot a story corpus |
//! | `kindred train <labeled.jsonl>` | Fit the risk model and write its snapshot |
//! | `kindred match "<text>"` | Match a description against the corpus |
//! | `kindred moderate "<text>"` | Run the risk classifier over one text |
//! | `kindred chat` | Interactive conversational intake session |
//! | `kindred stats` | Snapshot and readiness overview |

mod chat;
mod config;
mod embedding;
mod error;
mod features;
mod gate;
mod index;
mod ingest;
mod matcher;
mod models;
mod moderator;
mod reply;
mod service;
mod session;
mod stats;
mod train_cmd;

use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::ChatController;
use crate::config::Config;
use crate::error::Error;
use crate::gate::GateOutcome;
use crate::index::StoryIndex;
use crate::moderator::RiskClassifier;
use crate::reply::ChatCompletionsProvider;
use crate::service::MatchService;
use crate::session::MemorySessionStore;

/// Match descriptions of personal struggles to first-person mentor
/// stories, with content-risk screening on both sides.
#[derive(Parser)]
#[command(
    name = "kindred",
    about = "Kindred — an embedding-based peer-story matching engine with conversational intake and content-risk screening",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kindred.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize an empty index snapshot.
    ///
    /// Creates the SQLite file and schema without any stories. Idempotent;
    /// a later `import` fills (or replaces) the contents.
    Init,

    /// Import a story corpus and build the index snapshot.
    ///
    /// Reads JSON Lines records, quarantines records missing the required
    /// `content` field, drops stories below the minimum length, embeds the
    /// rest with the configured provider, and writes the snapshot. This
    /// replaces any previous snapshot contents.
    Import {
        /// Path to the corpus file (JSONL, one story per line).
        corpus: PathBuf,

        /// Write quarantined records to this file for inspection.
        #[arg(long)]
        quarantine: Option<PathBuf>,
    },

    /// Train the risk model from labeled examples.
    ///
    /// Reads JSONL records with `content` and `label` fields, binarizes the
    /// labels via the configured safe-label allow-list, fits the scaler and
    /// classifier, prints validation metrics, and saves the model snapshot.
    Train {
        /// Path to the labeled training data (JSONL).
        data: PathBuf,

        /// Override the output path from config.
        #[arg(long)]
        model_out: Option<PathBuf>,
    },

    /// Match a description against the story corpus.
    ///
    /// Runs the full pipeline: classify the query, rank by similarity,
    /// filter risky candidates, print survivors in rank order.
    Match {
        /// The description of the struggle to match.
        text: String,

        /// Number of matches to return.
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum similarity threshold in [0, 1].
        #[arg(long)]
        min_similarity: Option<f32>,
    },

    /// Run the risk classifier over one text.
    Moderate {
        /// The text to check.
        text: String,
    },

    /// Start an interactive conversational intake session.
    ///
    /// Reads lines from stdin; after enough user turns, story suggestions
    /// are attached to each reply. Requires the chat service to be
    /// configured and reachable.
    Chat {
        /// Reuse an existing session id instead of generating one.
        #[arg(long)]
        session: Option<String>,
    },

    /// Print snapshot and readiness overview.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kindred=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = index::connect(&cfg.index.path, true).await?;
            index::init_schema(&pool).await?;
            pool.close().await;
            println!("Index snapshot initialized at {}", cfg.index.path.display());
        }
        Commands::Import { corpus, quarantine } => {
            ingest::run_import(&cfg, &corpus, quarantine.as_deref()).await?;
        }
        Commands::Train { data, model_out } => {
            train_cmd::run_train(&cfg, &data, model_out.as_deref())?;
        }
        Commands::Match {
            text,
            top_k,
            min_similarity,
        } => {
            let service = load_service(&cfg, true).await?;
            let outcome = service
                .match_stories(
                    &text,
                    top_k.unwrap_or(cfg.matching.top_k),
                    min_similarity.unwrap_or(cfg.matching.min_similarity),
                )
                .await?;
            print_matches(&outcome);
        }
        Commands::Moderate { text } => {
            let classifier = load_classifier(&cfg)?;
            let verdict = classifier.predict(&text);
            println!("is_risky:   {}", verdict.is_risky);
            println!("risk_score: {:.3}", verdict.risk_score);
            println!("confidence: {:.3}", verdict.confidence);
        }
        Commands::Chat { session } => {
            run_chat(&cfg, session).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

/// Load the risk classifier, degrading to untrained when the snapshot is
/// missing. An incompatible snapshot is a hard error; silently mis-scoring
/// is worse than failing.
fn load_classifier(cfg: &Config) -> anyhow::Result<RiskClassifier> {
    match RiskClassifier::load(&cfg.risk.model_path) {
        Ok(classifier) => Ok(classifier),
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            eprintln!(
                "Warning: risk model not found at {}; content screening disabled (all content passes as safe)",
                cfg.risk.model_path.display()
            );
            Ok(RiskClassifier::untrained())
        }
        Err(e) => Err(e.into()),
    }
}

/// Assemble the serving facade from loaded snapshots.
///
/// With `require_index` the command cannot proceed without a snapshot;
/// otherwise (chat) a missing index degrades to reply-only operation with
/// suggestions omitted.
async fn load_service(cfg: &Config, require_index: bool) -> anyhow::Result<Arc<MatchService>> {
    let classifier = Arc::new(load_classifier(cfg)?);

    let (index, embedder) = match StoryIndex::load(&cfg.index.path, cfg.embedding.model.as_deref())
        .await
    {
        Ok(index) => match embedding::create_provider(&cfg.embedding) {
            Ok(provider) => (Some(Arc::new(index)), Some(provider)),
            Err(e) if !require_index => {
                eprintln!(
                    "Warning: embedding provider unavailable ({}); suggestions will be omitted",
                    e
                );
                (None, None)
            }
            Err(e) => return Err(e.into()),
        },
        Err(Error::IndexNotLoaded) if !require_index => {
            eprintln!(
                "Warning: no index snapshot at {}; suggestions will be omitted",
                cfg.index.path.display()
            );
            (None, None)
        }
        Err(Error::IndexNotLoaded) => {
            anyhow::bail!(
                "No index snapshot at {}. Run `kindred import <corpus.jsonl>` first.",
                cfg.index.path.display()
            );
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Arc::new(MatchService::new(
        index,
        embedder,
        classifier,
        cfg.matching.clone(),
        cfg.risk.crisis_threshold,
    )))
}

fn print_matches(outcome: &GateOutcome) {
    if let Some(warning) = outcome.warning {
        println!("warning: {}", warning.as_str());
    }
    if let Some(score) = outcome.user_risk_score {
        println!("user_risk_score: {:.3}", score);
    }

    if outcome.matches.is_empty() {
        println!("No matches.");
        return;
    }

    for (i, m) in outcome.matches.iter().enumerate() {
        let title = m.story.title.as_deref().unwrap_or("(untitled)");
        println!("{}. [{:.2}] {}", i + 1, m.similarity, title);
        if !m.story.tags.is_empty() {
            println!("    tags: {}", m.story.tags.join(", "));
        }
        println!("    excerpt: \"{}\"", excerpt(&m.story.body));
        println!("    id: {}", m.story.id);
        println!();
    }
}

/// First 200 characters of a body, on a char boundary.
fn excerpt(body: &str) -> String {
    let flat = body.replace('\n', " ");
    if flat.chars().count() <= 200 {
        return flat.trim().to_string();
    }
    let cut: String = flat.chars().take(200).collect();
    format!("{}...", cut.trim())
}

/// Interactive intake REPL over stdin.
async fn run_chat(cfg: &Config, session: Option<String>) -> anyhow::Result<()> {
    let service = load_service(cfg, false).await?;
    let replies = Arc::new(ChatCompletionsProvider::from_config(&cfg.chat)?);
    let sessions = Arc::new(MemorySessionStore::new());
    let controller = ChatController::new(service, sessions, replies, cfg.chat.clone());

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    controller.start(&session_id).await;

    println!("Kindred intake session {} (Ctrl-D or 'exit' to quit)", session_id);
    println!("Tell me what's been on your mind.");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" {
            break;
        }

        match controller.send(&session_id, message).await {
            Ok(outcome) => {
                println!();
                println!("{}", outcome.reply);
                println!();
                if let Some(suggestions) = outcome.suggestions {
                    if suggestions.is_empty() {
                        println!("(no matching stories yet; keep going)");
                    } else {
                        println!("Stories from people who have been there:");
                        for (i, m) in suggestions.iter().enumerate() {
                            let title = m.story.title.as_deref().unwrap_or("(untitled)");
                            println!("  {}. [{:.2}] {}", i + 1, m.similarity, title);
                        }
                    }
                    println!();
                }
            }
            Err(Error::ChatServiceUnavailable(msg)) => {
                eprintln!("chat service unavailable: {}", msg);
            }
            Err(e) => {
                eprintln!("error: {}", e);
            }
        }
    }

    Ok(())
}
