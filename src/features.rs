//! Stylistic feature extraction for the content-risk classifier.
//!
//! The classifier looks only at cheap text statistics, not content
//! semantics. Extraction is pure and total: any input, including the empty
//! string, yields a well-defined vector with all-non-negative entries and
//! `caps_ratio` in [0, 1]. Every division is guarded with
//! `max(denominator, 1)`. There is no separate normalization pass; any
//! `&str` is already acceptable input.

/// Canonical feature order. A persisted risk model must carry exactly this
/// order (checked at load time); predicting through misaligned columns
/// would silently mis-score.
pub const FEATURE_NAMES: [&str; 8] = [
    "word_count",
    "char_count",
    "avg_word_length",
    "exclamation_count",
    "question_count",
    "caps_ratio",
    "sentence_count",
    "avg_sentence_length",
];

/// The eight stylistic features extracted from one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskFeatures {
    pub word_count: f64,
    pub char_count: f64,
    pub avg_word_length: f64,
    pub exclamation_count: f64,
    pub question_count: f64,
    pub caps_ratio: f64,
    pub sentence_count: f64,
    pub avg_sentence_length: f64,
}

impl RiskFeatures {
    /// Flatten into the canonical [`FEATURE_NAMES`] order.
    pub fn to_vec(&self) -> [f64; 8] {
        [
            self.word_count,
            self.char_count,
            self.avg_word_length,
            self.exclamation_count,
            self.question_count,
            self.caps_ratio,
            self.sentence_count,
            self.avg_sentence_length,
        ]
    }
}

/// Extract the stylistic feature vector from a text. Never fails.
pub fn extract_features(text: &str) -> RiskFeatures {
    let word_count = text.split_whitespace().count();
    let char_count = text.chars().count();

    let avg_word_length = char_count as f64 / word_count.max(1) as f64;

    let exclamation_count = text.chars().filter(|c| *c == '!').count();
    let question_count = text.chars().filter(|c| *c == '?').count();

    let mut alpha_count = 0usize;
    let mut upper_count = 0usize;
    for c in text.chars() {
        if c.is_alphabetic() {
            alpha_count += 1;
            if c.is_uppercase() {
                upper_count += 1;
            }
        }
    }
    let caps_ratio = (upper_count as f64 / alpha_count.max(1) as f64).clamp(0.0, 1.0);

    // Heuristic sentence split on terminal punctuation.
    let sentence_count = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    let avg_sentence_length = word_count as f64 / sentence_count.max(1) as f64;

    RiskFeatures {
        word_count: word_count as f64,
        char_count: char_count as f64,
        avg_word_length,
        exclamation_count: exclamation_count as f64,
        question_count: question_count as f64,
        caps_ratio,
        sentence_count: sentence_count as f64,
        avg_sentence_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zeroish() {
        let f = extract_features("");
        assert_eq!(f.word_count, 0.0);
        assert_eq!(f.char_count, 0.0);
        assert_eq!(f.avg_word_length, 0.0);
        assert_eq!(f.exclamation_count, 0.0);
        assert_eq!(f.question_count, 0.0);
        assert_eq!(f.caps_ratio, 0.0);
        assert_eq!(f.sentence_count, 0.0);
        assert_eq!(f.avg_sentence_length, 0.0);
    }

    #[test]
    fn test_all_features_non_negative() {
        let samples = [
            "",
            "   ",
            "hello",
            "WHY IS THIS HAPPENING?! I can't take it anymore!!!",
            "One. Two! Three? Four.",
            "no punctuation at all just words",
            "!!!???...",
            "émotions mêlées, voilà.",
        ];
        for text in samples {
            let f = extract_features(text);
            for value in f.to_vec() {
                assert!(value >= 0.0, "negative feature for {:?}: {}", text, value);
            }
            assert!(
                (0.0..=1.0).contains(&f.caps_ratio),
                "caps_ratio out of range for {:?}: {}",
                text,
                f.caps_ratio
            );
        }
    }

    #[test]
    fn test_basic_counts() {
        let f = extract_features("Hello world! How are you?");
        assert_eq!(f.word_count, 5.0);
        assert_eq!(f.exclamation_count, 1.0);
        assert_eq!(f.question_count, 1.0);
        assert_eq!(f.sentence_count, 2.0);
        assert!((f.avg_sentence_length - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_caps_ratio_ignores_non_letters() {
        // 4 letters, 2 uppercase; digits and punctuation don't count.
        let f = extract_features("AB cd 123 !!");
        assert!((f.caps_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_all_caps() {
        let f = extract_features("HELP ME");
        assert!((f.caps_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_punctuation_only_has_no_sentences() {
        let f = extract_features("!!!???");
        assert_eq!(f.sentence_count, 0.0);
        assert_eq!(f.word_count, 1.0);
    }

    #[test]
    fn test_feature_order_matches_names() {
        assert_eq!(FEATURE_NAMES.len(), extract_features("x").to_vec().len());
    }
}
