//! Corpus import: validate, embed, snapshot.
//!
//! The import is the offline batch job that produces an index snapshot.
//! Records arrive as JSON Lines with an explicit schema; a record missing
//! the required `content` field is quarantined with a reason rather than
//! guessed at, and a malformed line never aborts the rest of the file.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding;
use crate::index::StoryIndex;
use crate::models::Story;

/// Raw corpus record as it appears on one JSONL line.
#[derive(Debug, Deserialize)]
pub struct StoryRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Required. Declared optional so a missing field quarantines the
    /// record instead of failing deserialization with a less useful error.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A rejected corpus record and why.
#[derive(Debug)]
pub struct QuarantinedRecord {
    pub line: usize,
    pub reason: String,
    pub raw: String,
}

/// Parse a JSONL corpus into validated stories plus quarantined rejects.
pub fn parse_corpus(content: &str) -> (Vec<Story>, Vec<QuarantinedRecord>) {
    let mut stories = Vec::new();
    let mut quarantined = Vec::new();
    let now = Utc::now();

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        let record: StoryRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                quarantined.push(QuarantinedRecord {
                    line: line_no,
                    reason: format!("malformed JSON: {}", e),
                    raw: line.to_string(),
                });
                continue;
            }
        };

        let body = match record.content {
            Some(ref content) if !content.trim().is_empty() => content.clone(),
            _ => {
                quarantined.push(QuarantinedRecord {
                    line: line_no,
                    reason: "missing required field: content".to_string(),
                    raw: line.to_string(),
                });
                continue;
            }
        };

        stories.push(Story {
            id: record.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: record.title,
            body,
            tags: record.tags,
            author_id: record.author_id,
            created_at: record.created_at.unwrap_or(now),
            parent_id: record.parent_id,
            thread_id: record.thread_id,
        });
    }

    (stories, quarantined)
}

/// Run the full import: parse, filter, embed, persist.
pub async fn run_import(
    config: &Config,
    corpus_path: &Path,
    quarantine_out: Option<&Path>,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let provider = embedding::create_provider(&config.embedding)?;

    let content = std::fs::read_to_string(corpus_path)
        .with_context(|| format!("Failed to read corpus file: {}", corpus_path.display()))?;

    let (stories, quarantined) = parse_corpus(&content);
    let records_read = stories.len() + quarantined.len();

    if let Some(out) = quarantine_out {
        if !quarantined.is_empty() {
            let mut lines = String::new();
            for q in &quarantined {
                lines.push_str(&serde_json::to_string(&serde_json::json!({
                    "line": q.line,
                    "reason": q.reason,
                    "record": q.raw,
                }))?);
                lines.push('\n');
            }
            std::fs::write(out, lines)
                .with_context(|| format!("Failed to write quarantine file: {}", out.display()))?;
        }
    }

    if stories.is_empty() {
        bail!(
            "No valid records in {} ({} quarantined)",
            corpus_path.display(),
            quarantined.len()
        );
    }

    let (index, skipped_short) = StoryIndex::build(
        stories,
        provider.as_ref(),
        config.index.min_story_chars,
        config.embedding.batch_size,
    )
    .await?;

    index.save(&config.index.path).await?;

    println!("import {}", corpus_path.display());
    println!("  records read: {}", records_read);
    println!("  quarantined: {}", quarantined.len());
    println!(
        "  skipped short (< {} chars): {}",
        config.index.min_story_chars, skipped_short
    );
    println!("  embedded stories: {}", index.len());
    println!(
        "  embedding model: {} ({} dims)",
        index.model_name(),
        index.dims()
    );
    println!("  snapshot: {}", config.index.path.display());
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_records() {
        let corpus = r#"{"id": "a", "title": "Moving on", "content": "It took a year.", "tags": ["grief"]}
{"content": "No id or title on this one."}
"#;
        let (stories, quarantined) = parse_corpus(corpus);
        assert_eq!(stories.len(), 2);
        assert!(quarantined.is_empty());
        assert_eq!(stories[0].id, "a");
        assert_eq!(stories[0].tags, ["grief"]);
        // Generated id for the second record.
        assert!(!stories[1].id.is_empty());
    }

    #[test]
    fn test_missing_content_is_quarantined() {
        let corpus = r#"{"id": "a", "title": "No body here"}
{"content": "   "}
{"content": "This one is fine."}
"#;
        let (stories, quarantined) = parse_corpus(corpus);
        assert_eq!(stories.len(), 1);
        assert_eq!(quarantined.len(), 2);
        assert!(quarantined[0].reason.contains("content"));
        assert_eq!(quarantined[0].line, 1);
        assert_eq!(quarantined[1].line, 2);
    }

    #[test]
    fn test_malformed_line_does_not_abort_file() {
        let corpus = "not json at all\n{\"content\": \"Still parsed.\"}\n";
        let (stories, quarantined) = parse_corpus(corpus);
        assert_eq!(stories.len(), 1);
        assert_eq!(quarantined.len(), 1);
        assert!(quarantined[0].reason.contains("malformed JSON"));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let corpus = "\n\n{\"content\": \"One story.\"}\n\n";
        let (stories, quarantined) = parse_corpus(corpus);
        assert_eq!(stories.len(), 1);
        assert!(quarantined.is_empty());
    }
}
