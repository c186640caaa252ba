//! Training and prediction pipelines built on the feature, label and
//! booster stages.

mod artifacts;
mod prediction;
mod training;

pub use artifacts::{ArtifactBlobs, ArtifactKind, ArtifactSet, FORMAT_VERSION};
pub use prediction::{PredictionResult, Predictor, PredictorHandle, PredictorInfo};
pub use training::{TrainingOutcome, TrainingPipeline, TrainingReport, ValidationScores};
