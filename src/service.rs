//! Serving facade composing the index, matcher, and safety gate.
//!
//! One [`MatchService`] is built at process start from loaded snapshots and
//! shared read-only across concurrent requests: the index and risk model
//! are immutable for the process lifetime, so reads take no locks. A new
//! snapshot only takes effect at the next start.

use serde::Serialize;
use std::sync::Arc;

use crate::config::MatchingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::gate::{GateOutcome, SafetyGate};
use crate::index::StoryIndex;
use crate::matcher;
use crate::models::RiskVerdict;
use crate::moderator::RiskClassifier;

/// Operator-facing readiness flags.
///
/// `moderator_ready = false` means the gate is in its all-safe fallback
/// mode: matching still works, but nothing is screened. That state must be
/// visible so it is not mistaken for a validated safe corpus.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Readiness {
    pub matcher_ready: bool,
    pub moderator_ready: bool,
}

/// The one-shot serving API: classify, match, filter, rank, return.
pub struct MatchService {
    index: Option<Arc<StoryIndex>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    classifier: Arc<RiskClassifier>,
    gate: SafetyGate,
    matching: MatchingConfig,
}

impl MatchService {
    pub fn new(
        index: Option<Arc<StoryIndex>>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        classifier: Arc<RiskClassifier>,
        matching: MatchingConfig,
        crisis_threshold: f32,
    ) -> Self {
        let gate = SafetyGate::new(classifier.clone(), crisis_threshold);
        Self {
            index,
            embedder,
            classifier,
            gate,
            matching,
        }
    }

    /// Match a description of a struggle against the story corpus.
    ///
    /// Parameter bounds are enforced before any computation: `top_k` in
    /// `[1, max_top_k]`, `min_similarity` in `[0, 1]`, text within the
    /// configured size limit. Empty or whitespace-only text is defined as
    /// "no results", not an error.
    pub async fn match_stories(
        &self,
        user_text: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<GateOutcome> {
        let index = self.index.as_ref().ok_or(Error::IndexNotLoaded)?;
        let embedder = self.embedder.as_ref().ok_or(Error::IndexNotLoaded)?;

        if top_k < 1 || top_k > self.matching.max_top_k {
            return Err(Error::InvalidInput(format!(
                "top_k must be between 1 and {}",
                self.matching.max_top_k
            )));
        }
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(Error::InvalidInput(
                "min_similarity must be in [0.0, 1.0]".to_string(),
            ));
        }
        if user_text.chars().count() > self.matching.max_query_chars {
            return Err(Error::InvalidInput(format!(
                "text exceeds {} characters",
                self.matching.max_query_chars
            )));
        }

        let candidates =
            matcher::query(index, embedder.as_ref(), user_text, top_k, min_similarity).await?;

        Ok(self.gate.screen(user_text, candidates))
    }

    /// [`MatchService::match_stories`] with the configured defaults.
    pub async fn match_with_defaults(&self, user_text: &str) -> Result<GateOutcome> {
        self.match_stories(user_text, self.matching.top_k, self.matching.min_similarity)
            .await
    }

    /// Check whether a text is risky. Never fails: an untrained classifier
    /// yields the documented safe default.
    pub fn moderate(&self, text: &str) -> RiskVerdict {
        self.classifier.predict(text)
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            matcher_ready: self.index.is_some() && self.embedder.is_some(),
            moderator_ready: self.classifier.is_trained(),
        }
    }

    /// Size bound applied to query text before any computation.
    pub fn max_query_chars(&self) -> usize {
        self.matching.max_query_chars
    }
}
