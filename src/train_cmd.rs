//! Offline risk-model training command.
//!
//! Reads labeled JSONL (`{"content": ..., "label": ...}`), fits the scaler
//! and classifier, prints validation metrics, and writes the model
//! snapshot. This is a batch tool; serving processes only ever load the
//! resulting snapshot.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::moderator::{self, LabeledExample};

/// Load labeled examples from a JSONL file. Malformed lines are counted and
/// skipped with a warning so one bad row never sinks a training run.
pub fn load_labeled(path: &Path) -> Result<Vec<LabeledExample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training data: {}", path.display()))?;

    let mut examples = Vec::new();
    let mut skipped = 0usize;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LabeledExample>(line) {
            Ok(example) => examples.push(example),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        eprintln!(
            "Warning: skipped {} malformed lines in {}",
            skipped,
            path.display()
        );
    }

    Ok(examples)
}

/// Run the training command.
pub fn run_train(config: &Config, data_path: &Path, model_out: Option<&Path>) -> Result<()> {
    let examples = load_labeled(data_path)?;
    if examples.is_empty() {
        bail!("No labeled examples found in {}", data_path.display());
    }

    let (model, report) = moderator::train(&examples, &config.risk.safe_labels);

    println!("train {}", data_path.display());
    println!("  examples: {}", report.examples);
    println!(
        "  labels: {} safe / {} risky (safe allow-list: {})",
        report.safe_count,
        report.risky_count,
        config.risk.safe_labels.join(", ")
    );

    match model {
        Some(model) => {
            let out = model_out.unwrap_or(&config.risk.model_path);
            model.save(out)?;

            println!(
                "  validation accuracy: {:.3}",
                report.accuracy.unwrap_or(0.0)
            );
            println!(
                "  {:<8} {:>9} {:>7} {:>7} {:>8}",
                "CLASS", "PRECISION", "RECALL", "F1", "SUPPORT"
            );
            for c in &report.per_class {
                println!(
                    "  {:<8} {:>9.3} {:>7.3} {:>7.3} {:>8}",
                    c.class, c.precision, c.recall, c.f1, c.support
                );
            }
            println!("  model saved to {}", out.display());
        }
        None => {
            println!("  fewer than two label classes; model left untrained (all-safe default)");
        }
    }

    println!("ok");
    Ok(())
}
