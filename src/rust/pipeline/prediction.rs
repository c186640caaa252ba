use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use super::artifacts::{ArtifactBlobs, ArtifactSet};
use crate::dataset::Transaction;
use crate::error::{PredictionFailed, Result, SpendcatError};
use crate::features::encode_transaction;
use crate::utils::argmax;

/// Outcome of categorizing one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "predicted_category")]
    pub category: String,
    /// Probability per category, keyed in label order
    pub probabilities: BTreeMap<String, f32>,
}

impl PredictionResult {
    /// Probability of the predicted category
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(&self.category).copied().unwrap_or(0.0)
    }
}

/// Information about a loaded predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorInfo {
    pub run_id: String,
    pub vocabulary_size: usize,
    /// Vocabulary size plus the amount column
    pub feature_width: usize,
    pub num_classes: usize,
    pub class_labels: Vec<String>,
    pub num_trees: usize,
}

/// Categorizes transactions with one matched artifact set.
///
/// A `Predictor` is immutable once built and can be shared between threads
/// behind an [`Arc`].
#[derive(Debug, Clone)]
pub struct Predictor {
    artifacts: ArtifactSet,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Predictor>();
        assert_send_sync::<PredictorHandle>();
    }
};

impl Predictor {
    pub fn new(artifacts: ArtifactSet) -> Self {
        Self { artifacts }
    }

    /// Builds a predictor from the three serialized artifacts.
    ///
    /// # Errors
    /// `ArtifactMismatch` when the blobs were not produced by the same run.
    pub fn load(encoder: &[u8], classifier: &[u8], label_codec: &[u8]) -> Result<Self> {
        let artifacts = ArtifactSet::from_blobs(encoder, classifier, label_codec)?;
        debug!("Loaded artifact set from run {}", artifacts.run_id());
        Ok(Self::new(artifacts))
    }

    pub fn from_blobs(blobs: &ArtifactBlobs) -> Result<Self> {
        Self::load(&blobs.encoder, &blobs.classifier, &blobs.label_codec)
    }

    pub fn save(&self) -> Result<ArtifactBlobs> {
        self.artifacts.to_blobs()
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Predicts the category of one transaction.
    ///
    /// Any internal failure is reported as a single [`PredictionFailed`];
    /// no partial result is ever returned.
    pub fn predict(&self, description: &str, amount: f64) -> Result<PredictionResult, PredictionFailed> {
        self.try_predict(description, amount).map_err(PredictionFailed::from)
    }

    pub fn predict_transaction(&self, transaction: &Transaction) -> Result<PredictionResult, PredictionFailed> {
        self.predict(&transaction.description, transaction.amount)
    }

    /// Predicts every transaction independently; one failure does not affect the others.
    pub fn predict_batch(&self, transactions: &[Transaction]) -> Vec<Result<PredictionResult, PredictionFailed>> {
        transactions.iter().map(|t| self.predict_transaction(t)).collect()
    }

    fn try_predict(&self, description: &str, amount: f64) -> Result<PredictionResult> {
        if !amount.is_finite() {
            return Err(SpendcatError::MalformedInput(format!("amount {} is not finite", amount)));
        }
        let features = encode_transaction(self.artifacts.encoder(), description, amount);
        let probs = self.artifacts.classifier().predict_proba(&features)?;
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(SpendcatError::ArtifactMismatch(
                "classifier produced a non-finite probability".into(),
            ));
        }
        let best = argmax(&probs).ok_or(SpendcatError::IndexOutOfRange {
            index: 0,
            num_classes: 0,
        })?;

        let codec = self.artifacts.codec();
        let category = codec.decode(best)?.to_string();
        let probabilities = probs
            .iter()
            .enumerate()
            .map(|(index, &p)| codec.decode(index).map(|label| (label.to_string(), p)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(PredictionResult { category, probabilities })
    }

    pub fn info(&self) -> PredictorInfo {
        let encoder = self.artifacts.encoder();
        let classifier = self.artifacts.classifier();
        PredictorInfo {
            run_id: self.artifacts.run_id().to_string(),
            vocabulary_size: encoder.len(),
            feature_width: encoder.feature_width(),
            num_classes: classifier.num_classes(),
            class_labels: self.artifacts.codec().class_names().to_vec(),
            num_trees: classifier.num_trees(),
        }
    }
}

/// Process-wide slot holding the current predictor.
///
/// Readers take a cheap clone of the inner `Arc` and predict without holding
/// the lock; [`PredictorHandle::replace`] swaps in a whole new predictor.
#[derive(Debug)]
pub struct PredictorHandle {
    current: RwLock<Arc<Predictor>>,
}

impl PredictorHandle {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            current: RwLock::new(Arc::new(predictor)),
        }
    }

    pub fn current(&self) -> Arc<Predictor> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Installs a new predictor and returns the one it replaced.
    pub fn replace(&self, predictor: Predictor) -> Arc<Predictor> {
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, Arc::new(predictor))
    }

    pub fn predict(&self, description: &str, amount: f64) -> Result<PredictionResult, PredictionFailed> {
        self.current().predict(description, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::dataset::mock_transactions;
    use crate::pipeline::TrainingPipeline;

    fn predictor() -> Predictor {
        TrainingPipeline::new(TrainingConfig::small())
            .unwrap()
            .fit(&mock_transactions())
            .unwrap()
            .into_predictor()
    }

    #[test]
    fn test_probabilities_cover_every_class() {
        let predictor = predictor();
        let result = predictor.predict("WHOLE FOODS MARKET", 80.0).unwrap();
        assert_eq!(result.probabilities.len(), 8);
        let sum: f32 = result.probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        let max = result.probabilities.values().cloned().fold(f32::MIN, f32::max);
        assert_eq!(result.confidence(), max);
    }

    #[test]
    fn test_non_finite_amount_fails() {
        let err = predictor().predict("UBER", f64::NAN).unwrap_err();
        assert!(matches!(err.cause(), SpendcatError::MalformedInput(_)));
        assert!(err.to_string().starts_with("prediction failed"));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let predictor = predictor();
        let batch = vec![
            Transaction::new("NETFLIX", 14.99),
            Transaction::new("UBER", f64::INFINITY),
            Transaction::new("", 0.0),
        ];
        let results = predictor.predict_batch(&batch);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_save_then_load_predicts_identically() {
        let original = predictor();
        let blobs = original.save().unwrap();
        let restored = Predictor::from_blobs(&blobs).unwrap();
        assert_eq!(
            original.predict("MOVIE TICKETS", 12.0).unwrap(),
            restored.predict("MOVIE TICKETS", 12.0).unwrap()
        );
        assert_eq!(original.info(), restored.info());
    }

    #[test]
    fn test_handle_replace_swaps_whole_predictor() {
        let handle = PredictorHandle::new(predictor());
        let before = handle.current();

        let mut config = TrainingConfig::small();
        config.encoder.max_features = 20;
        let replacement = TrainingPipeline::new(config).unwrap().fit(&mock_transactions()).unwrap();
        let old = handle.replace(replacement.into_predictor());

        assert!(Arc::ptr_eq(&before, &old));
        assert_eq!(handle.current().info().vocabulary_size, 20);
        assert!(before.predict("UBER", 10.0).is_ok());
    }

    #[test]
    fn test_serialized_result_shape() {
        let result = predictor().predict("UBER TRIP", 22.5).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("predicted_category").is_some());
        assert_eq!(json["probabilities"].as_object().unwrap().len(), 8);
    }
}
