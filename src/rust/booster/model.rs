use std::time::Instant;

use log::{debug, info, log_enabled, Level};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

use super::grower::{SortedColumns, TreeGrower};
use super::objective::SoftmaxLoss;
use super::params::BoosterParams;
use super::tree::Tree;
use crate::error::{Result, SpendcatError};
use crate::features::FeatureVector;
use crate::utils::{argmax, softmax_inplace};

/// Multiclass gradient-boosted tree ensemble.
///
/// Each boosting round appends one tree per class, so `trees[round * C + c]`
/// contributes to the margin of class `c`. Probabilities are the softmax of
/// the per-class margins.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedClassifier {
    trees: Vec<Tree>,
    base_scores: Vec<f32>,
    num_features: usize,
    num_classes: usize,
    params: BoosterParams,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<GradientBoostedClassifier>();
    }
};

impl GradientBoostedClassifier {
    /// Trains on a row-major feature matrix and class indices.
    ///
    /// # Errors
    /// * `EmptyTrainingSet` when there are no rows or no classes
    /// * `DimensionMismatch` when labels and rows differ in count
    /// * `IndexOutOfRange` when a label is not below `num_classes`
    pub fn fit(
        features: ArrayView2<'_, f32>,
        labels: &[usize],
        num_classes: usize,
        params: &BoosterParams,
    ) -> Result<Self> {
        params.validate()?;
        let n_rows = features.nrows();
        if n_rows == 0 || num_classes == 0 {
            return Err(SpendcatError::EmptyTrainingSet);
        }
        if labels.len() != n_rows {
            return Err(SpendcatError::DimensionMismatch {
                expected: n_rows,
                actual: labels.len(),
            });
        }
        if let Some(&index) = labels.iter().find(|&&l| l >= num_classes) {
            return Err(SpendcatError::IndexOutOfRange { index, num_classes });
        }

        let start = Instant::now();
        let objective = SoftmaxLoss::new(num_classes);
        let base_scores = objective.base_scores(labels);

        let mut margins = vec![0.0f32; num_classes * n_rows];
        for (c, &score) in base_scores.iter().enumerate() {
            margins[c * n_rows..(c + 1) * n_rows].fill(score);
        }
        let mut grad = vec![0.0f32; num_classes * n_rows];
        let mut hess = vec![0.0f32; num_classes * n_rows];

        let columns = SortedColumns::new(features);
        let grower = TreeGrower::new(features, &columns, params);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let n_sampled = ((n_rows as f64 * params.subsample as f64).ceil() as usize).clamp(1, n_rows);

        let mut trees = Vec::with_capacity(params.n_trees as usize * num_classes);
        for round in 0..params.n_trees {
            objective.compute_gradients(&margins, labels, &mut grad, &mut hess);
            let rows = sample_rows(&mut rng, n_rows, n_sampled);

            for c in 0..num_classes {
                let class_range = c * n_rows..(c + 1) * n_rows;
                let tree = grower.grow(&grad[class_range.clone()], &hess[class_range.clone()], &rows);
                for (margin, row) in margins[class_range].iter_mut().zip(features.rows()) {
                    *margin += tree.predict(row);
                }
                trees.push(tree);
            }

            if log_enabled!(Level::Debug) {
                debug!("[{}] train-mlogloss: {:.5}", round, objective.loss(&margins, labels));
            }
        }

        info!(
            "Trained {} trees ({} rounds x {} classes) on {} rows x {} features in {:.2?}",
            trees.len(),
            params.n_trees,
            num_classes,
            n_rows,
            features.ncols(),
            start.elapsed()
        );

        Ok(Self {
            trees,
            base_scores,
            num_features: features.ncols(),
            num_classes,
            params: params.clone(),
        })
    }

    /// Trains from individual feature vectors, which must all share one width.
    pub fn fit_vectors(
        vectors: &[FeatureVector],
        labels: &[usize],
        num_classes: usize,
        params: &BoosterParams,
    ) -> Result<Self> {
        let width = vectors.first().ok_or(SpendcatError::EmptyTrainingSet)?.width();
        if let Some(bad) = vectors.iter().find(|v| v.width() != width) {
            return Err(SpendcatError::DimensionMismatch {
                expected: width,
                actual: bad.width(),
            });
        }
        let data: Vec<f32> = vectors.iter().flat_map(|v| v.view().to_vec()).collect();
        let matrix = Array2::from_shape_vec((vectors.len(), width), data).map_err(|_| {
            SpendcatError::DimensionMismatch {
                expected: vectors.len() * width,
                actual: vectors.iter().map(FeatureVector::width).sum(),
            }
        })?;
        Self::fit(matrix.view(), labels, num_classes, params)
    }

    /// Restores a model from persisted parts, validating every tree.
    pub fn from_parts(
        trees: Vec<Tree>,
        base_scores: Vec<f32>,
        num_features: usize,
        num_classes: usize,
        params: BoosterParams,
    ) -> Result<Self> {
        if num_classes == 0 {
            return Err(SpendcatError::ArtifactMismatch("classifier has no classes".into()));
        }
        if base_scores.len() != num_classes {
            return Err(SpendcatError::ArtifactMismatch(format!(
                "classifier has {} base scores for {} classes",
                base_scores.len(),
                num_classes
            )));
        }
        if let Some(score) = base_scores.iter().find(|s| !s.is_finite()) {
            return Err(SpendcatError::ArtifactMismatch(format!(
                "classifier base score {} is not finite",
                score
            )));
        }
        if trees.len() % num_classes != 0 {
            return Err(SpendcatError::ArtifactMismatch(format!(
                "{} trees do not divide into {} classes",
                trees.len(),
                num_classes
            )));
        }
        for tree in &trees {
            tree.validate(num_features)?;
        }
        Ok(Self {
            trees,
            base_scores,
            num_features,
            num_classes,
            params,
        })
    }

    /// Raw per-class margins for one row
    pub fn predict_margins(&self, row: ArrayView1<'_, f32>) -> Result<Vec<f32>> {
        if row.len() != self.num_features {
            return Err(SpendcatError::DimensionMismatch {
                expected: self.num_features,
                actual: row.len(),
            });
        }
        let mut margins = self.base_scores.clone();
        for (i, tree) in self.trees.iter().enumerate() {
            margins[i % self.num_classes] += tree.predict(row);
        }
        Ok(margins)
    }

    /// Class probabilities ordered by class index; they sum to 1.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f32>> {
        let mut probs = self.predict_margins(features.view())?;
        softmax_inplace(&mut probs);
        Ok(probs)
    }

    /// Most probable class index; the lowest index wins ties.
    pub fn predict_class(&self, features: &FeatureVector) -> Result<usize> {
        let probs = self.predict_proba(features)?;
        argmax(&probs).ok_or(SpendcatError::EmptyTrainingSet)
    }

    /// Probabilities for every row of a matrix, shape `(rows, classes)`.
    pub fn predict_proba_matrix(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let mut out = Array2::zeros((features.nrows(), self.num_classes));
        for (row, mut target) in features.rows().into_iter().zip(out.rows_mut()) {
            let mut probs = self.predict_margins(row)?;
            softmax_inplace(&mut probs);
            target.assign(&ArrayView1::from(probs.as_slice()));
        }
        Ok(out)
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn base_scores(&self) -> &[f32] {
        &self.base_scores
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }
}

/// Sorted row indices for one round; all rows when nothing is subsampled.
fn sample_rows(rng: &mut StdRng, n_rows: usize, n_sampled: usize) -> Vec<u32> {
    if n_sampled >= n_rows {
        return (0..n_rows as u32).collect();
    }
    let mut rows: Vec<u32> = sample(rng, n_rows, n_sampled)
        .into_iter()
        .map(|i| i as u32)
        .collect();
    rows.sort_unstable();
    rows
}
