//! Softmax cross-entropy objective for multiclass boosting.
//!
//! Margins, gradients and hessians are stored class-major:
//! `buffer[class * n_rows + row]`.

use crate::utils::softmax_inplace;

const HESS_MIN: f32 = 1e-6;
const PROB_EPS: f64 = 1e-7;

#[derive(Debug, Clone, Copy)]
pub(crate) struct SoftmaxLoss {
    pub num_classes: usize,
}

impl SoftmaxLoss {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes }
    }

    /// Per-class starting margins: log of the class priors.
    pub fn base_scores(&self, labels: &[usize]) -> Vec<f32> {
        let mut counts = vec![0usize; self.num_classes];
        for &label in labels {
            counts[label] += 1;
        }
        let total = labels.len().max(1) as f64;
        counts
            .into_iter()
            .map(|c| (c as f64 / total).clamp(PROB_EPS, 1.0).ln() as f32)
            .collect()
    }

    pub fn compute_gradients(&self, margins: &[f32], labels: &[usize], grad: &mut [f32], hess: &mut [f32]) {
        let k = self.num_classes;
        let n_rows = labels.len();
        debug_assert_eq!(margins.len(), k * n_rows);
        debug_assert_eq!(grad.len(), k * n_rows);

        let mut probs = vec![0.0f32; k];
        for (i, &label) in labels.iter().enumerate() {
            for c in 0..k {
                probs[c] = margins[c * n_rows + i];
            }
            softmax_inplace(&mut probs);

            for c in 0..k {
                let p = probs[c];
                let target = if c == label { 1.0 } else { 0.0 };
                let idx = c * n_rows + i;
                grad[idx] = p - target;
                hess[idx] = (p * (1.0 - p)).max(HESS_MIN);
            }
        }
    }

    /// Mean multiclass log-loss of class-major margins.
    pub fn loss(&self, margins: &[f32], labels: &[usize]) -> f64 {
        let k = self.num_classes;
        let n_rows = labels.len();
        if n_rows == 0 {
            return 0.0;
        }
        let mut probs = vec![0.0f32; k];
        let mut total = 0.0f64;
        for (i, &label) in labels.iter().enumerate() {
            for c in 0..k {
                probs[c] = margins[c * n_rows + i];
            }
            softmax_inplace(&mut probs);
            total -= (probs[label] as f64).max(PROB_EPS).ln();
        }
        total / n_rows as f64
    }
}
