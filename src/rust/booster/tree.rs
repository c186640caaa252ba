use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpendcatError};

/// One node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    /// Rows with `x[feature] < threshold` go left, everything else right
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf { value: f32 },
}

/// A regression tree stored as a flat node array, root at index 0.
///
/// Children always sit after their parent, so traversal terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub(crate) fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, TreeNode::Leaf { .. })).count()
    }

    /// Depth of the deepest leaf (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = node {
                depths[*left] = depths[i] + 1;
                depths[*right] = depths[i] + 1;
                max_depth = max_depth.max(depths[i] + 1);
            }
        }
        max_depth
    }

    /// Leaf value reached by `row`. The caller guarantees the row is at least
    /// as wide as the largest split feature.
    #[inline]
    pub fn predict(&self, row: ArrayView1<'_, f32>) -> f32 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split { feature, threshold, left, right } => {
                    node = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Structural checks run on trees loaded from an artifact.
    pub(crate) fn validate(&self, num_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(SpendcatError::ArtifactMismatch("tree has no nodes".into()));
        }
        let n = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split { feature, threshold, left, right } => {
                    if *feature >= num_features {
                        return Err(SpendcatError::ArtifactMismatch(format!(
                            "node {} splits on feature {} but the model has {} features",
                            i, feature, num_features
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(SpendcatError::ArtifactMismatch(format!("node {} has a NaN threshold", i)));
                    }
                    if *left <= i || *right <= i || *left >= n || *right >= n || left == right {
                        return Err(SpendcatError::ArtifactMismatch(format!(
                            "node {} has invalid children ({}, {})",
                            i, left, right
                        )));
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(SpendcatError::ArtifactMismatch(format!("leaf {} is not finite", i)));
                    }
                }
            }
        }
        Ok(())
    }
}
