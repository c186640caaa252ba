use std::io;

/// Errors raised by the feature, label, classifier and pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum SpendcatError {
    /// Feature width differs between fit time and use time
    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Label was not part of the label set seen at fit time
    #[error("Unknown label: '{0}'")]
    UnknownLabel(String),
    /// Class index outside `0..num_classes`
    #[error("Class index {index} out of range for {num_classes} classes")]
    IndexOutOfRange { index: usize, num_classes: usize },
    /// Fit attempted with no rows
    #[error("Training set is empty")]
    EmptyTrainingSet,
    /// Encoder, classifier and label codec were not fit together
    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),
    /// Caller supplied an unusable transaction
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    /// Artifact or dataset could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Tabular training data could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = SpendcatError> = std::result::Result<T, E>;

/// The single failure surfaced to callers of the prediction pipeline.
///
/// The internal cause is kept as the error source so callers can log it,
/// while the outcome itself stays a generic "prediction failed".
#[derive(Debug, thiserror::Error)]
#[error("prediction failed: {source}")]
pub struct PredictionFailed {
    #[from]
    source: SpendcatError,
}

impl PredictionFailed {
    /// The pipeline error that caused this failure
    pub fn cause(&self) -> &SpendcatError {
        &self.source
    }

    pub fn into_cause(self) -> SpendcatError {
        self.source
    }
}
