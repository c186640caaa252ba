//! Evaluation metrics for the validation hold-out.

use ndarray::ArrayView2;

use crate::utils::argmax;

const PROB_EPS: f64 = 1e-15;

/// Fraction of rows whose argmax class equals the label.
pub fn accuracy(probabilities: ArrayView2<'_, f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = probabilities
        .rows()
        .into_iter()
        .zip(labels)
        .filter(|(row, label)| row.as_slice().and_then(argmax) == Some(**label))
        .count();
    correct as f64 / labels.len() as f64
}

/// Mean multiclass log-loss, clipping probabilities away from zero.
pub fn log_loss(probabilities: ArrayView2<'_, f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = probabilities
        .rows()
        .into_iter()
        .zip(labels)
        .map(|(row, &label)| -(row[label] as f64).max(PROB_EPS).ln())
        .sum();
    total / labels.len() as f64
}
