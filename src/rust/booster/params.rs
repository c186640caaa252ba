use serde::{Deserialize, Serialize};

use crate::error::{Result, SpendcatError};

/// Hyperparameters for gradient-boosted tree training.
///
/// Defaults follow the small pipeline: 100 rounds of depth-5 trees with a
/// learning rate of 0.1 and seed 42. `min_child_weight` defaults low so that
/// tiny datasets (a handful of rows per class) can still be split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    /// Number of boosting rounds; each round adds one tree per class
    pub n_trees: u32,
    /// Maximum tree depth (root is depth 0)
    pub max_depth: u32,
    /// Shrinkage applied to every leaf weight
    pub learning_rate: f32,
    /// Seed for row subsampling
    pub seed: u64,
    /// L2 regularization (lambda)
    pub reg_lambda: f32,
    /// L1 regularization (alpha)
    pub reg_alpha: f32,
    /// Minimum gain for a split to be kept (gamma)
    pub min_split_gain: f32,
    /// Minimum hessian sum in each child
    pub min_child_weight: f32,
    /// Fraction of rows sampled per round
    pub subsample: f32,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 5,
            learning_rate: 0.1,
            seed: 42,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            min_split_gain: 0.0,
            min_child_weight: 1e-3,
            subsample: 1.0,
        }
    }
}

impl BoosterParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(SpendcatError::Config("n_trees must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(SpendcatError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.reg_lambda < 0.0 || self.reg_alpha < 0.0 || self.min_child_weight < 0.0 {
            return Err(SpendcatError::Config("regularization terms must be non-negative".into()));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(SpendcatError::Config(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        Ok(())
    }

    /// Split gain:
    ///
    /// ```text
    /// gain = 0.5 * [G_L²/(H_L + λ) + G_R²/(H_R + λ) - G_P²/(H_P + λ)] - γ
    /// ```
    #[inline]
    pub(crate) fn split_gain(
        &self,
        grad_left: f64,
        hess_left: f64,
        grad_right: f64,
        hess_right: f64,
        grad_parent: f64,
        hess_parent: f64,
    ) -> f64 {
        let lambda = self.reg_lambda as f64;
        let score_left = grad_left * grad_left / (hess_left + lambda);
        let score_right = grad_right * grad_right / (hess_right + lambda);
        let score_parent = grad_parent * grad_parent / (hess_parent + lambda);
        0.5 * (score_left + score_right - score_parent) - self.min_split_gain as f64
    }

    #[inline]
    pub(crate) fn is_valid_split(&self, hess_left: f64, hess_right: f64) -> bool {
        let min_weight = self.min_child_weight as f64;
        hess_left >= min_weight && hess_right >= min_weight
    }

    /// Leaf weight with L1 soft-thresholding, already scaled by the learning rate.
    ///
    /// ```text
    /// weight = -sign(G) × max(0, |G| - α) / (H + λ)
    /// ```
    #[inline]
    pub(crate) fn leaf_weight(&self, grad_sum: f64, hess_sum: f64) -> f32 {
        let lambda = self.reg_lambda as f64;
        let alpha = self.reg_alpha as f64;
        let raw = if alpha == 0.0 {
            -grad_sum / (hess_sum + lambda)
        } else {
            let abs_grad = grad_sum.abs();
            if abs_grad <= alpha {
                0.0
            } else {
                -grad_sum.signum() * (abs_grad - alpha) / (hess_sum + lambda)
            }
        };
        (raw * self.learning_rate as f64) as f32
    }
}
