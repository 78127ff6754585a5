//! Feature-based content-risk classification.
//!
//! A standardizing scaler plus a logistic-regression head over the eight
//! [`crate::features`] columns. The model is fitted offline
//! (`kindred train`) and loaded read-only by serving processes.
//!
//! With no model loaded, every prediction is the documented fail-safe
//! default: content passes as safe with score 0.0 and confidence 0.5. That
//! trade-off favors keeping matching available over blocking on an absent
//! model; it is a fallback, not a vetted-safe verdict, and the readiness
//! flags surface it to operators.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::features::{extract_features, FEATURE_NAMES};
use crate::models::RiskVerdict;

/// Labels binarized to "safe" when training; every other label is risky.
pub const DEFAULT_SAFE_LABELS: [&str; 3] = ["benign", "recovery_support", "normal"];

/// Per-feature standardization fitted on the training split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Scaler {
    /// Fit means and standard deviations column-wise. Constant columns get
    /// a unit std so transforming never divides by zero.
    pub fn fit(rows: &[[f64; 8]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; 8];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row.iter()) {
                *m += v;
            }
        }
        for m in means.iter_mut() {
            *m /= n;
        }

        let mut stds = vec![0.0; 8];
        for row in rows {
            for ((s, v), m) in stds.iter_mut().zip(row.iter()).zip(means.iter()) {
                *s += (v - m) * (v - m);
            }
        }
        for s in stds.iter_mut() {
            *s = (*s / n).sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }

        Self { means, stds }
    }

    pub fn transform(&self, row: &[f64; 8]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter())
            .zip(self.stds.iter())
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }
}

/// Logistic-regression coefficients over the scaled feature columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    /// Probability of the risky class for one scaled feature row.
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(x.iter())
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// The serialized model bundle: scaler, classifier, and the feature order
/// and safe-label allow-list they were fitted against. All four travel
/// together so a loaded model can be verified against the running
/// extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModel {
    pub feature_names: Vec<String>,
    pub safe_labels: Vec<String>,
    pub scaler: Scaler,
    pub classifier: LogisticModel,
    pub trained_at: i64,
}

impl RiskModel {
    /// Write the model snapshot as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let model: RiskModel = serde_json::from_str(&content)?;
        Ok(model)
    }
}

/// Verify a persisted model lines up with the running feature extractor.
fn check_compatible(model: &RiskModel) -> Result<()> {
    if model.feature_names != FEATURE_NAMES {
        return Err(Error::ModelIncompatible(format!(
            "feature order mismatch: model has {:?}, predictor expects {:?}",
            model.feature_names, FEATURE_NAMES
        )));
    }
    let n = FEATURE_NAMES.len();
    if model.scaler.means.len() != n
        || model.scaler.stds.len() != n
        || model.classifier.weights.len() != n
    {
        return Err(Error::ModelIncompatible(format!(
            "coefficient shape mismatch: means={}, stds={}, weights={}, expected {}",
            model.scaler.means.len(),
            model.scaler.stds.len(),
            model.classifier.weights.len(),
            n
        )));
    }
    Ok(())
}

/// The risk classifier used by the safety gate and the moderate API.
///
/// Holds either a verified trained model or nothing; `predict` is total
/// either way.
#[derive(Debug, Default)]
pub struct RiskClassifier {
    model: Option<RiskModel>,
}

impl RiskClassifier {
    /// A classifier with no model: every prediction is the safe default.
    pub fn untrained() -> Self {
        Self { model: None }
    }

    /// Wrap a trained model, verifying compatibility first.
    pub fn with_model(model: RiskModel) -> Result<Self> {
        check_compatible(&model)?;
        Ok(Self { model: Some(model) })
    }

    /// Load and verify a persisted model snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        Self::with_model(RiskModel::load(path)?)
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Predict whether a text is risky. Never fails.
    pub fn predict(&self, text: &str) -> RiskVerdict {
        let model = match &self.model {
            Some(model) => model,
            None => return RiskVerdict::untrained_default(),
        };

        let row = extract_features(text).to_vec();
        let scaled = model.scaler.transform(&row);
        let p = model.classifier.predict_proba(&scaled);

        RiskVerdict {
            is_risky: p > 0.5,
            risk_score: p as f32,
            confidence: p.max(1.0 - p) as f32,
        }
    }
}

// ============ Offline training ============

/// One labeled training example.
#[derive(Debug, Clone, Deserialize)]
pub struct LabeledExample {
    pub content: String,
    pub label: String,
}

/// Per-class validation metrics.
#[derive(Debug, Clone)]
pub struct ClassMetrics {
    pub class: &'static str,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Summary of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub examples: usize,
    pub safe_count: usize,
    pub risky_count: usize,
    pub trained: bool,
    pub accuracy: Option<f64>,
    pub per_class: Vec<ClassMetrics>,
}

const LEARNING_RATE: f64 = 0.1;
const EPOCHS: usize = 500;

/// Fit a scaler + logistic regression on labeled examples.
///
/// Labels in `safe_labels` map to the safe class; everything else is risky.
/// Class-balanced weighting (`n / (2 * n_class)`) counters label imbalance.
/// The optimization is full-batch gradient descent from zero-initialized
/// weights, so identical inputs reproduce identical models. A stratified
/// validation split (every 5th example per class) is held out for the
/// reported metrics; with fewer than two distinct classes no model is
/// fitted and the all-safe default stands in.
pub fn train(
    examples: &[LabeledExample],
    safe_labels: &[String],
) -> (Option<RiskModel>, TrainingReport) {
    let labels: Vec<bool> = examples
        .iter()
        .map(|e| !safe_labels.iter().any(|s| s == &e.label))
        .collect();
    let safe_count = labels.iter().filter(|r| !**r).count();
    let risky_count = labels.len() - safe_count;

    let mut report = TrainingReport {
        examples: examples.len(),
        safe_count,
        risky_count,
        trained: false,
        accuracy: None,
        per_class: Vec::new(),
    };

    if safe_count == 0 || risky_count == 0 {
        return (None, report);
    }

    let rows: Vec<[f64; 8]> = examples
        .iter()
        .map(|e| extract_features(&e.content).to_vec())
        .collect();

    // Stratified holdout: within each class, every 5th example validates.
    let mut train_idx = Vec::new();
    let mut val_idx = Vec::new();
    for risky in [false, true] {
        for (nth, i) in (0..rows.len()).filter(|i| labels[*i] == risky).enumerate() {
            if nth % 5 == 4 {
                val_idx.push(i);
            } else {
                train_idx.push(i);
            }
        }
    }
    // Tiny classes can leave the holdout empty; evaluate on the training
    // rows in that case rather than reporting nothing.
    if val_idx.is_empty() {
        val_idx = train_idx.clone();
    }

    let train_rows: Vec<[f64; 8]> = train_idx.iter().map(|i| rows[*i]).collect();
    let scaler = Scaler::fit(&train_rows);

    let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();

    // Balanced class weights: n / (2 * n_class) over the training split.
    let n_train = train_idx.len() as f64;
    let n_train_risky = train_idx.iter().filter(|i| labels[**i]).count() as f64;
    let n_train_safe = n_train - n_train_risky;
    let w_risky = n_train / (2.0 * n_train_risky.max(1.0));
    let w_safe = n_train / (2.0 * n_train_safe.max(1.0));

    let mut weights = vec![0.0f64; 8];
    let mut bias = 0.0f64;

    for _ in 0..EPOCHS {
        let mut grad_w = vec![0.0f64; 8];
        let mut grad_b = 0.0f64;

        for &i in &train_idx {
            let x = &scaled[i];
            let y = if labels[i] { 1.0 } else { 0.0 };
            let class_weight = if labels[i] { w_risky } else { w_safe };

            let z: f64 = weights.iter().zip(x.iter()).map(|(w, v)| w * v).sum::<f64>() + bias;
            let err = class_weight * (sigmoid(z) - y);

            for (g, v) in grad_w.iter_mut().zip(x.iter()) {
                *g += err * v;
            }
            grad_b += err;
        }

        for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
            *w -= LEARNING_RATE * g / n_train;
        }
        bias -= LEARNING_RATE * grad_b / n_train;
    }

    let classifier = LogisticModel { weights, bias };

    // Validation metrics.
    let mut correct = 0usize;
    // Confusion counts per class: (true positive, predicted, actual).
    let mut tp = [0usize; 2];
    let mut pred_count = [0usize; 2];
    let mut actual_count = [0usize; 2];

    for &i in &val_idx {
        let p = classifier.predict_proba(&scaled[i]);
        let predicted = p > 0.5;
        let actual = labels[i];
        if predicted == actual {
            correct += 1;
            tp[actual as usize] += 1;
        }
        pred_count[predicted as usize] += 1;
        actual_count[actual as usize] += 1;
    }

    report.accuracy = Some(correct as f64 / val_idx.len() as f64);
    for (class_idx, class) in [(0usize, "safe"), (1usize, "risky")] {
        let precision = tp[class_idx] as f64 / pred_count[class_idx].max(1) as f64;
        let recall = tp[class_idx] as f64 / actual_count[class_idx].max(1) as f64;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        report.per_class.push(ClassMetrics {
            class,
            precision,
            recall,
            f1,
            support: actual_count[class_idx],
        });
    }
    report.trained = true;

    let model = RiskModel {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        safe_labels: safe_labels.to_vec(),
        scaler,
        classifier,
        trained_at: chrono::Utc::now().timestamp(),
    };

    (Some(model), report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_model(weights: Vec<f64>, bias: f64) -> RiskModel {
        RiskModel {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            safe_labels: DEFAULT_SAFE_LABELS.iter().map(|s| s.to_string()).collect(),
            scaler: Scaler {
                means: vec![0.0; 8],
                stds: vec![1.0; 8],
            },
            classifier: LogisticModel { weights, bias },
            trained_at: 0,
        }
    }

    #[test]
    fn test_untrained_returns_exact_safe_default() {
        let clf = RiskClassifier::untrained();
        let verdict = clf.predict("anything");
        assert!(!verdict.is_risky);
        assert_eq!(verdict.risk_score, 0.0);
        assert_eq!(verdict.confidence, 0.5);
    }

    #[test]
    fn test_exclamation_heavy_model_flags_shouting() {
        // Weight only the exclamation_count column (index 3).
        let mut weights = vec![0.0; 8];
        weights[3] = 2.0;
        let clf = RiskClassifier::with_model(identity_model(weights, -1.0)).unwrap();

        let calm = clf.predict("A quiet afternoon walk helped today.");
        assert!(!calm.is_risky);

        let shouting = clf.predict("I hate this!!! Everything is wrong!!!");
        assert!(shouting.is_risky);
        assert!(shouting.risk_score > 0.9);
        assert!((shouting.confidence - shouting.risk_score).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_reflects_distance_from_boundary() {
        let clf = RiskClassifier::with_model(identity_model(vec![0.0; 8], 0.0)).unwrap();
        let verdict = clf.predict("whatever");
        // z = 0 means p = 0.5 exactly: not risky, minimum confidence.
        assert!(!verdict.is_risky);
        assert!((verdict.risk_score - 0.5).abs() < 1e-6);
        assert!((verdict.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_feature_order_mismatch_is_rejected() {
        let mut model = identity_model(vec![0.0; 8], 0.0);
        model.feature_names.swap(0, 1);
        let err = RiskClassifier::with_model(model).unwrap_err();
        assert!(matches!(err, Error::ModelIncompatible(_)));
    }

    #[test]
    fn test_coefficient_shape_mismatch_is_rejected() {
        let mut model = identity_model(vec![0.0; 8], 0.0);
        model.classifier.weights.pop();
        let err = RiskClassifier::with_model(model).unwrap_err();
        assert!(matches!(err, Error::ModelIncompatible(_)));
    }

    #[test]
    fn test_model_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.json");

        let mut weights = vec![0.0; 8];
        weights[5] = 3.5;
        let model = identity_model(weights, -0.25);
        model.save(&path).unwrap();

        let loaded = RiskModel::load(&path).unwrap();
        assert_eq!(loaded.feature_names, model.feature_names);
        assert_eq!(loaded.classifier.weights, model.classifier.weights);
        assert_eq!(loaded.classifier.bias, model.classifier.bias);
        assert_eq!(loaded.scaler.means, model.scaler.means);
        assert_eq!(loaded.safe_labels, model.safe_labels);
    }

    fn labeled(content: &str, label: &str) -> LabeledExample {
        LabeledExample {
            content: content.to_string(),
            label: label.to_string(),
        }
    }

    fn safe_labels() -> Vec<String> {
        DEFAULT_SAFE_LABELS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_train_separable_classes() {
        let mut examples = Vec::new();
        for i in 0..30 {
            examples.push(labeled(
                &format!("Today I took a long walk and wrote down {} calm thoughts.", i),
                "benign",
            ));
            examples.push(labeled(
                &format!("I CANNOT DO THIS ANYMORE!!! WHY {}?! NOBODY LISTENS!!!", i),
                "harmful",
            ));
        }

        let (model, report) = train(&examples, &safe_labels());
        let model = model.expect("two separable classes should produce a model");
        assert!(report.trained);
        assert!(report.accuracy.unwrap() > 0.9, "accuracy: {:?}", report.accuracy);
        assert_eq!(report.safe_count, 30);
        assert_eq!(report.risky_count, 30);

        let clf = RiskClassifier::with_model(model).unwrap();
        assert!(clf.predict("THIS IS UNBEARABLE!!! I HATE ALL OF IT!!!").is_risky);
        assert!(!clf.predict("A peaceful morning with tea and a good book.").is_risky);
    }

    #[test]
    fn test_train_single_class_leaves_model_untrained() {
        let examples: Vec<LabeledExample> = (0..10)
            .map(|i| labeled(&format!("ordinary message number {}", i), "benign"))
            .collect();

        let (model, report) = train(&examples, &safe_labels());
        assert!(model.is_none());
        assert!(!report.trained);
        assert_eq!(report.safe_count, 10);
        assert_eq!(report.risky_count, 0);
    }

    #[test]
    fn test_train_is_deterministic() {
        let examples = vec![
            labeled("calm and steady words here today", "benign"),
            labeled("ANGRY SHOUTING!!! SO MUCH!!!", "harmful"),
            labeled("another gentle note about the garden", "benign"),
            labeled("WHY?! WHY?! WHY?!!!", "harmful"),
            labeled("a third quiet reflection on the week", "benign"),
            labeled("EVERYTHING IS RUINED!!!", "harmful"),
        ];

        let (a, _) = train(&examples, &safe_labels());
        let (b, _) = train(&examples, &safe_labels());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.classifier.weights, b.classifier.weights);
        assert_eq!(a.classifier.bias, b.classifier.bias);
        assert_eq!(a.scaler.means, b.scaler.means);
    }
}
