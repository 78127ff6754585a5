//! Serving readiness and snapshot overview.
//!
//! Quick summary of what a serving process would load: index snapshot
//! counts and embedding version, risk-model state, and the two readiness
//! flags. Used by `kindred stats` to make the degraded all-safe moderation
//! mode visible instead of silently passing everything through.

use anyhow::Result;

use crate::config::Config;
use crate::error::Error;
use crate::index::StoryIndex;
use crate::moderator::RiskClassifier;

pub async fn run_stats(config: &Config) -> Result<()> {
    println!("Kindred — Serving Readiness");
    println!("===========================");
    println!();

    // Index snapshot. A freshly initialized snapshot has schema but no
    // metadata yet; report it as not built rather than corrupt.
    let index = match StoryIndex::load(&config.index.path, None).await {
        Ok(index) => Some(index),
        Err(Error::IndexNotLoaded) => None,
        Err(Error::Snapshot(reason)) if reason.contains("missing metadata") => None,
        Err(e) => return Err(e.into()),
    };

    let snapshot_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("  Index snapshot:  {}", config.index.path.display());
    match &index {
        Some(index) => {
            println!("    size:          {}", format_bytes(snapshot_size));
            println!("    stories:       {}", index.len());
            println!(
                "    embedding:     {} ({} dims)",
                index.model_name(),
                index.dims()
            );
        }
        None => {
            println!("    not built (run `kindred import <corpus.jsonl>`)");
        }
    }

    // Risk model
    println!();
    println!("  Risk model:      {}", config.risk.model_path.display());
    let moderator_ready = match RiskClassifier::load(&config.risk.model_path) {
        Ok(_) => {
            println!("    trained:       yes");
            true
        }
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("    not trained (run `kindred train <labeled.jsonl>`)");
            false
        }
        Err(e) => {
            println!("    UNUSABLE: {}", e);
            false
        }
    };

    let matcher_ready = index.is_some() && config.embedding.is_enabled();

    println!();
    println!("  matcher_ready:   {}", matcher_ready);
    println!("  moderator_ready: {}", moderator_ready);
    if !moderator_ready {
        println!("  note: with no trained model all content passes as safe (fallback, not a guarantee)");
    }
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
