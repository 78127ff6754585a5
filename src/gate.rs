//! Safety gate: risk screening on both sides of a match.
//!
//! The gate runs strictly after ranking: it only removes entries, never
//! reorders them, and never re-runs matching to backfill removed slots.
//! Callers must tolerate fewer than `top_k` survivors.

use serde::Serialize;
use std::sync::Arc;

use crate::models::StoryMatch;
use crate::moderator::RiskClassifier;

/// A query-side warning. The query is flagged, never suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    CrisisDetected,
}

impl Warning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Warning::CrisisDetected => "crisis_detected",
        }
    }
}

/// Gate output: surviving candidates in rank order plus query-side signals.
#[derive(Debug, Clone, Serialize)]
pub struct GateOutcome {
    pub matches: Vec<StoryMatch>,
    /// Risk score of the user's own text; `None` when no model is loaded.
    pub user_risk_score: Option<f32>,
    pub warning: Option<Warning>,
}

/// Applies the risk classifier to a query and its ranked candidates.
pub struct SafetyGate {
    classifier: Arc<RiskClassifier>,
    crisis_threshold: f32,
}

impl SafetyGate {
    pub fn new(classifier: Arc<RiskClassifier>, crisis_threshold: f32) -> Self {
        Self {
            classifier,
            crisis_threshold,
        }
    }

    /// Screen a ranked candidate list.
    ///
    /// The query is classified once. A risky query above the crisis
    /// threshold raises [`Warning::CrisisDetected`] but matching still
    /// proceeds: someone in acute distress should still reach peer stories,
    /// and the flag lets the caller layer crisis resources on top.
    ///
    /// Each candidate's body is classified once; risky candidates are
    /// dropped outright, preserving the rank order of the survivors.
    ///
    /// With no trained model there is nothing to screen with: every
    /// candidate passes and `user_risk_score` is `None`. The readiness
    /// flags make that degraded mode visible to operators.
    pub fn screen(&self, user_text: &str, candidates: Vec<StoryMatch>) -> GateOutcome {
        if !self.classifier.is_trained() {
            return GateOutcome {
                matches: candidates,
                user_risk_score: None,
                warning: None,
            };
        }

        let verdict = self.classifier.predict(user_text);
        let warning = (verdict.is_risky && verdict.risk_score > self.crisis_threshold)
            .then_some(Warning::CrisisDetected);

        let matches = candidates
            .into_iter()
            .filter(|m| !self.classifier.predict(&m.story.body).is_risky)
            .collect();

        GateOutcome {
            matches,
            user_risk_score: Some(verdict.risk_score),
            warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_NAMES;
    use crate::models::Story;
    use crate::moderator::{LogisticModel, RiskModel, Scaler, DEFAULT_SAFE_LABELS};

    /// A model that flags exclamation-heavy text: identity scaler, weight
    /// 2.0 on exclamation_count, bias -1.0.
    fn shouting_detector() -> Arc<RiskClassifier> {
        let mut weights = vec![0.0; 8];
        weights[3] = 2.0;
        let model = RiskModel {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            safe_labels: DEFAULT_SAFE_LABELS.iter().map(|s| s.to_string()).collect(),
            scaler: Scaler {
                means: vec![0.0; 8],
                stds: vec![1.0; 8],
            },
            classifier: LogisticModel { weights, bias: -1.0 },
            trained_at: 0,
        };
        Arc::new(RiskClassifier::with_model(model).unwrap())
    }

    fn candidate(id: &str, body: &str, similarity: f32) -> StoryMatch {
        StoryMatch {
            story: Story {
                id: id.to_string(),
                title: None,
                body: body.to_string(),
                tags: Vec::new(),
                author_id: None,
                created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                parent_id: None,
                thread_id: None,
            },
            similarity,
        }
    }

    #[test]
    fn test_untrained_classifier_passes_everything() {
        let gate = SafetyGate::new(Arc::new(RiskClassifier::untrained()), 0.8);
        let outcome = gate.screen(
            "whatever!!!",
            vec![candidate("a", "SO MUCH SHOUTING!!!", 0.9)],
        );
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.user_risk_score, None);
        assert_eq!(outcome.warning, None);
    }

    #[test]
    fn test_risky_candidates_dropped_in_rank_order() {
        let gate = SafetyGate::new(shouting_detector(), 0.8);
        let outcome = gate.screen(
            "a calm question about friendships",
            vec![
                candidate("keep1", "A quiet story about moving on.", 0.9),
                candidate("drop", "IT NEVER GETS BETTER!!! EVER!!!", 0.8),
                candidate("keep2", "Slow mornings helped me heal.", 0.7),
            ],
        );
        let ids: Vec<&str> = outcome.matches.iter().map(|m| m.story.id.as_str()).collect();
        assert_eq!(ids, ["keep1", "keep2"]);
        for m in &outcome.matches {
            assert!(!shouting_detector().predict(&m.story.body).is_risky);
        }
    }

    #[test]
    fn test_crisis_query_flagged_but_not_suppressed() {
        let gate = SafetyGate::new(shouting_detector(), 0.8);
        let outcome = gate.screen(
            "I can't go on!!! nothing helps!!!",
            vec![candidate("a", "A gentle story about recovery.", 0.8)],
        );
        assert_eq!(outcome.warning, Some(Warning::CrisisDetected));
        assert!(outcome.user_risk_score.unwrap() > 0.8);
        // Matching still proceeds for a flagged query.
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_moderately_risky_query_not_flagged() {
        // One exclamation: z = -1 + 2 = 1, p ~ 0.73. Risky but below the
        // crisis threshold, so no warning.
        let gate = SafetyGate::new(shouting_detector(), 0.8);
        let outcome = gate.screen("why does this keep happening!", Vec::new());
        assert_eq!(outcome.warning, None);
        let score = outcome.user_risk_score.unwrap();
        assert!(score > 0.5 && score < 0.8, "score: {}", score);
    }
}
