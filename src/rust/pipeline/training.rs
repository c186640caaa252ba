use std::time::Instant;

use log::{info, warn};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::artifacts::ArtifactSet;
use super::prediction::Predictor;
use crate::booster::GradientBoostedClassifier;
use crate::config::TrainingConfig;
use crate::dataset::TrainingRow;
use crate::error::{Result, SpendcatError};
use crate::features::{feature_matrix, CharNgramEncoder};
use crate::labels::LabelCodec;
use crate::metrics;

/// Scores on the held-out rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationScores {
    pub accuracy: f64,
    pub log_loss: f64,
}

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub total_rows: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub vocabulary_size: usize,
    pub feature_width: usize,
    pub num_classes: usize,
    pub num_trees: usize,
    /// `None` when the hold-out was disabled or skipped
    pub validation: Option<ValidationScores>,
    pub elapsed_ms: u128,
}

/// Artifacts and report produced by [`TrainingPipeline::fit`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: ArtifactSet,
    pub report: TrainingReport,
}

impl TrainingOutcome {
    pub fn into_predictor(self) -> Predictor {
        Predictor::new(self.artifacts)
    }
}

/// Fits the encoder, label codec and classifier as one matched set.
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Runs the whole pipeline over labeled rows.
    ///
    /// Nothing is returned unless every stage succeeds, so a failed run never
    /// yields a partial artifact set.
    ///
    /// # Errors
    /// * `EmptyTrainingSet` when `rows` is empty
    /// * `MalformedInput` for a non-finite amount or an empty category
    pub fn fit(&self, rows: &[TrainingRow]) -> Result<TrainingOutcome> {
        let start = Instant::now();
        if rows.is_empty() {
            return Err(SpendcatError::EmptyTrainingSet);
        }
        for row in rows {
            row.validate()?;
        }
        info!("Training on {} rows", rows.len());

        let descriptions: Vec<&str> = rows.iter().map(|r| r.description.as_str()).collect();
        let encoder = CharNgramEncoder::fit(&descriptions, &self.config.encoder)?;
        info!(
            "Fitted encoder: {} n-grams, feature width {}",
            encoder.len(),
            encoder.feature_width()
        );

        let features = feature_matrix(&encoder, rows.iter().map(|r| (r.description.as_str(), r.amount)))?;

        let categories: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
        let codec = LabelCodec::fit(&categories)?;
        let labels = codec.encode_all(&categories)?;
        info!("Fitted label codec with {} classes", codec.len());

        let (train_idx, val_idx) = self.split(rows.len());
        let train_x = features.select(Axis(0), &train_idx);
        let train_y: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();

        let classifier = GradientBoostedClassifier::fit(train_x.view(), &train_y, codec.len(), &self.config.booster)?;

        let validation = if val_idx.is_empty() {
            None
        } else {
            let val_x = features.select(Axis(0), &val_idx);
            let val_y: Vec<usize> = val_idx.iter().map(|&i| labels[i]).collect();
            Some(evaluate(&classifier, &val_x, &val_y)?)
        };

        let run_id = fingerprint(&self.config, rows)?;
        let report = TrainingReport {
            run_id: run_id.clone(),
            total_rows: rows.len(),
            train_rows: train_idx.len(),
            validation_rows: val_idx.len(),
            vocabulary_size: encoder.len(),
            feature_width: encoder.feature_width(),
            num_classes: codec.len(),
            num_trees: classifier.num_trees(),
            validation,
            elapsed_ms: start.elapsed().as_millis(),
        };
        let artifacts = ArtifactSet::new(run_id, encoder, classifier, codec)?;
        info!("Training run {} finished in {} ms", report.run_id, report.elapsed_ms);

        Ok(TrainingOutcome { artifacts, report })
    }

    /// Seeded shuffle into sorted train and validation index lists.
    fn split(&self, n_rows: usize) -> (Vec<usize>, Vec<usize>) {
        let all: Vec<usize> = (0..n_rows).collect();
        let Some(fraction) = self.config.validation_fraction else {
            return (all, Vec::new());
        };

        let n_val = (n_rows as f64 * fraction as f64).ceil() as usize;
        if n_val == 0 || n_val >= n_rows {
            warn!(
                "Hold-out of {} from {} rows would leave a side empty, training on all rows",
                n_val, n_rows
            );
            return (all, Vec::new());
        }

        let mut shuffled = all;
        shuffled.shuffle(&mut StdRng::seed_from_u64(self.config.split_seed));
        let mut val_idx = shuffled.split_off(n_rows - n_val);
        let mut train_idx = shuffled;
        train_idx.sort_unstable();
        val_idx.sort_unstable();
        (train_idx, val_idx)
    }
}

fn evaluate(classifier: &GradientBoostedClassifier, features: &Array2<f32>, labels: &[usize]) -> Result<ValidationScores> {
    let probabilities = classifier.predict_proba_matrix(features.view())?;
    let scores = ValidationScores {
        accuracy: metrics::accuracy(probabilities.view(), labels),
        log_loss: metrics::log_loss(probabilities.view(), labels),
    };
    info!(
        "Validation on {} rows: accuracy {:.2}%, log-loss {:.4}",
        labels.len(),
        scores.accuracy * 100.0,
        scores.log_loss
    );
    Ok(scores)
}

/// SHA-256 over the config and every row; identical inputs give the same id.
fn fingerprint(config: &TrainingConfig, rows: &[TrainingRow]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(config)?);
    for row in rows {
        hasher.update(row.description.as_bytes());
        hasher.update([0u8]);
        hasher.update(row.amount.to_bits().to_le_bytes());
        hasher.update(row.category.as_bytes());
        hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::mock_transactions;

    fn quick_config() -> TrainingConfig {
        let mut config = TrainingConfig::small();
        config.booster.n_trees = 10;
        config
    }

    #[test]
    fn test_fit_mock_dataset() {
        let outcome = TrainingPipeline::new(quick_config()).unwrap().fit(&mock_transactions()).unwrap();
        let report = &outcome.report;
        assert_eq!(report.total_rows, 8);
        assert_eq!(report.train_rows, 8);
        assert_eq!(report.validation_rows, 0);
        assert!(report.validation.is_none());
        assert_eq!(report.num_classes, 8);
        assert_eq!(report.num_trees, 80);
        assert_eq!(report.feature_width, report.vocabulary_size + 1);
        assert!(report.vocabulary_size <= 50);
        assert_eq!(report.run_id, outcome.artifacts.run_id());
    }

    #[test]
    fn test_holdout_split_is_seeded() {
        let mut config = quick_config();
        config.validation_fraction = Some(0.25);
        let pipeline = TrainingPipeline::new(config).unwrap();
        let (train, val) = pipeline.split(8);
        assert_eq!(val.len(), 2);
        assert_eq!(train.len(), 6);
        assert_eq!(pipeline.split(8), (train.clone(), val.clone()));
        assert!(train.iter().all(|i| !val.contains(i)));

        let outcome = pipeline.fit(&mock_transactions()).unwrap();
        assert_eq!(outcome.report.validation_rows, 2);
        let scores = outcome.report.validation.unwrap();
        assert!((0.0..=1.0).contains(&scores.accuracy));
        assert!(scores.log_loss.is_finite());
    }

    #[test]
    fn test_tiny_holdout_is_skipped() {
        let mut config = quick_config();
        config.validation_fraction = Some(0.5);
        let pipeline = TrainingPipeline::new(config).unwrap();
        let (train, val) = pipeline.split(1);
        assert_eq!(train, vec![0]);
        assert!(val.is_empty());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let pipeline = TrainingPipeline::new(quick_config()).unwrap();
        assert!(matches!(pipeline.fit(&[]), Err(SpendcatError::EmptyTrainingSet)));

        let mut rows = mock_transactions();
        rows[3].amount = f64::INFINITY;
        assert!(matches!(pipeline.fit(&rows), Err(SpendcatError::MalformedInput(_))));
    }

    #[test]
    fn test_run_id_depends_on_data() {
        let config = quick_config();
        let rows = mock_transactions();
        let a = fingerprint(&config, &rows).unwrap();
        assert_eq!(a, fingerprint(&config, &rows).unwrap());
        assert_eq!(a.len(), 64);

        let mut changed = rows.clone();
        changed[0].amount = 60.0;
        assert_ne!(a, fingerprint(&config, &changed).unwrap());
    }
}
