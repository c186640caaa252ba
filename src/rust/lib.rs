//! Bank transaction categorization with character n-gram features and
//! gradient-boosted trees.
//!
//! A transaction is a free-text description plus an amount. Training fits a
//! character n-gram TF-IDF encoder, a label codec and a multiclass boosted
//! tree ensemble as one matched artifact set; prediction loads that set and
//! returns the most probable category with a probability for every category.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use spendcat::{mock_transactions, TrainingConfig, TrainingPipeline};
//!
//! let outcome = TrainingPipeline::new(TrainingConfig::small())?.fit(&mock_transactions())?;
//! let predictor = outcome.into_predictor();
//!
//! let result = predictor.predict("AMAZON MKTPLACE PURCHASE", 59.99)?;
//! println!("Predicted category: {} ({:.2})", result.category, result.confidence());
//! # Ok(())
//! # }
//! ```
//!
//! # Persistence
//!
//! The three artifacts travel together. Loading blobs from different
//! training runs fails before any prediction is made:
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use spendcat::{mock_transactions, Predictor, TrainingConfig, TrainingPipeline};
//!
//! let predictor = TrainingPipeline::new(TrainingConfig::small())?
//!     .fit(&mock_transactions())?
//!     .into_predictor();
//! let blobs = predictor.save()?;
//!
//! let restored = Predictor::load(&blobs.encoder, &blobs.classifier, &blobs.label_codec)?;
//! assert_eq!(restored.info(), predictor.info());
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A [`Predictor`] is immutable and can be shared across threads using `Arc`.
//! [`PredictorHandle`] swaps in a freshly trained predictor without blocking
//! readers that already hold the previous one.
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use spendcat::{mock_transactions, PredictorHandle, TrainingConfig, TrainingPipeline};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let predictor = TrainingPipeline::new(TrainingConfig::small())?
//!     .fit(&mock_transactions())?
//!     .into_predictor();
//! let handle = Arc::new(PredictorHandle::new(predictor));
//!
//! let mut handles = vec![];
//! for amount in [10.0, 20.0, 30.0] {
//!     let handle = Arc::clone(&handle);
//!     handles.push(thread::spawn(move || {
//!         handle.predict("UBER TRIP", amount).unwrap();
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod booster;
pub mod config;
pub mod dataset;
mod error;
pub mod features;
pub mod labels;
pub mod metrics;
pub mod pipeline;
pub mod store;
mod utils;

pub use booster::{BoosterParams, GradientBoostedClassifier};
pub use config::{EncoderConfig, NormKind, TrainingConfig};
pub use dataset::{mock_transactions, Transaction, TrainingRow};
pub use error::{PredictionFailed, Result, SpendcatError};
pub use features::{CharNgramEncoder, FeatureVector};
pub use labels::LabelCodec;
pub use pipeline::{
    ArtifactBlobs, ArtifactSet, PredictionResult, Predictor, PredictorHandle, PredictorInfo, TrainingOutcome,
    TrainingPipeline, TrainingReport,
};
pub use store::{ArtifactStore, StoreError};

pub fn init_logger() {
    env_logger::init();
}
