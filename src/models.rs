//! Core data models used throughout the matching pipeline.
//!
//! These types represent the stories, match results, risk verdicts, and
//! chat turns that flow between the index, matcher, gate, and controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A first-person mentor story from the corpus.
///
/// Immutable once indexed. `parent_id`/`thread_id` support threaded reply
/// structures upstream and are passthrough here: matching never looks at
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<String>,
    pub thread_id: Option<String>,
}

impl Story {
    /// Text handed to the embedding provider: the title, when present,
    /// prefixed to the body. Titles carry high-signal keywords that improve
    /// recall. The concatenation is computed transiently; it is never stored
    /// in the snapshot and never appears in results.
    pub fn embedding_text(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => format!("{} {}", title, self.body),
            _ => self.body.clone(),
        }
    }
}

/// A ranked match: the story's public fields plus its cosine similarity to
/// the query. Similarity lands in [-1, 1], in practice [0, 1] after
/// threshold filtering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryMatch {
    #[serde(flatten)]
    pub story: Story,
    pub similarity: f32,
}

/// Outcome of a risk prediction over one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskVerdict {
    pub is_risky: bool,
    /// Calibrated probability of the risky class, in [0, 1].
    pub risk_score: f32,
    /// `max(p, 1 - p)`: how far the score sits from the decision boundary.
    pub confidence: f32,
}

impl RiskVerdict {
    /// The fail-safe verdict used whenever no trained model is loaded:
    /// content passes as safe. This favors availability of matching over
    /// strict screening and is a fallback, not a guarantee; operators see
    /// it through the readiness flags.
    pub const fn untrained_default() -> Self {
        Self {
            is_risky: false,
            risk_score: 0.0,
            confidence: 0.5,
        }
    }
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One turn in a conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
