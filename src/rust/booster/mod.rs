//! Multiclass gradient-boosted decision trees.
//!
//! Training is second-order boosting on the softmax log-loss: every round
//! computes per-class gradients and hessians and grows one regression tree
//! per class with exact greedy splits. See [`GradientBoostedClassifier`].

mod grower;
mod model;
mod objective;
mod params;
mod tree;

pub use model::GradientBoostedClassifier;
pub use params::BoosterParams;
pub use tree::{Tree, TreeNode};
