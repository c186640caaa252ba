use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::booster::BoosterParams;
use crate::error::{Result, SpendcatError};

/// Normalization applied to each encoded description vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NormKind {
    /// Scale the vector to unit Euclidean length
    #[default]
    L2,
    /// Leave the weighted counts as they are
    None,
}

/// Settings for fitting the character n-gram encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Maximum number of n-grams kept in the vocabulary
    pub max_features: usize,
    /// Shortest n-gram length (inclusive)
    pub min_ngram: usize,
    /// Longest n-gram length (inclusive)
    pub max_ngram: usize,
    pub norm: NormKind,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_features: 100,
            min_ngram: 2,
            max_ngram: 3,
            norm: NormKind::L2,
        }
    }
}

impl EncoderConfig {
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(SpendcatError::Config("max_features must be at least 1".into()));
        }
        if self.min_ngram == 0 || self.min_ngram > self.max_ngram {
            return Err(SpendcatError::Config(format!(
                "invalid n-gram range ({}, {})",
                self.min_ngram, self.max_ngram
            )));
        }
        Ok(())
    }
}

/// Everything the training pipeline needs besides the data itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub encoder: EncoderConfig,
    pub booster: BoosterParams,
    /// Share of rows held out for validation; `None` trains on everything
    pub validation_fraction: Option<f32>,
    /// Seed for the hold-out shuffle
    pub split_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            booster: BoosterParams::default(),
            validation_fraction: Some(0.2),
            split_seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Settings of the small in-memory pipeline: 50 n-grams, no hold-out.
    pub fn small() -> Self {
        Self {
            encoder: EncoderConfig::default().with_max_features(50),
            validation_fraction: None,
            ..Self::default()
        }
    }

    /// Reads a JSON config file; missing fields fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        self.booster.validate()?;
        if let Some(fraction) = self.validation_fraction {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(SpendcatError::Config(format!(
                    "validation_fraction must be in (0, 1), got {}",
                    fraction
                )));
            }
        }
        Ok(())
    }
}
