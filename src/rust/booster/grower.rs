//! Depth-wise tree growing with exact greedy split search.
//!
//! Every feature column is sorted once per training run. At each depth the
//! grower scans each sorted column a single time, routing rows to the node
//! they currently sit in and evaluating every boundary between distinct
//! values. Feature columns are scanned in parallel and reduced in feature
//! order, so the result does not depend on thread scheduling.

use ndarray::ArrayView2;
use rayon::prelude::*;

use super::params::BoosterParams;
use super::tree::{Tree, TreeNode};

const NO_SLOT: u32 = u32::MAX;

/// Per-feature `(row, value)` pairs sorted by value, then by row.
pub(crate) struct SortedColumns {
    columns: Vec<Vec<(u32, f32)>>,
}

impl SortedColumns {
    pub fn new(features: ArrayView2<'_, f32>) -> Self {
        let columns = (0..features.ncols())
            .into_par_iter()
            .map(|f| {
                let mut column: Vec<(u32, f32)> = features
                    .column(f)
                    .iter()
                    .enumerate()
                    .map(|(row, &value)| (row as u32, value))
                    .collect();
                column.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                column
            })
            .collect();
        Self { columns }
    }
}

/// A node waiting to be split or turned into a leaf.
#[derive(Debug, Clone, Copy)]
struct PendingNode {
    node: usize,
    grad: f64,
    hess: f64,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f32,
    gain: f64,
    left_grad: f64,
    left_hess: f64,
}

pub(crate) struct TreeGrower<'a, 'f> {
    features: ArrayView2<'f, f32>,
    columns: &'a SortedColumns,
    params: &'a BoosterParams,
}

impl<'a, 'f> TreeGrower<'a, 'f> {
    pub fn new(features: ArrayView2<'f, f32>, columns: &'a SortedColumns, params: &'a BoosterParams) -> Self {
        Self { features, columns, params }
    }

    /// Grows one tree on the given gradient pairs, using only `rows`.
    pub fn grow(&self, grad: &[f32], hess: &[f32], rows: &[u32]) -> Tree {
        let mut slot = vec![NO_SLOT; self.features.nrows()];
        let (mut grad_sum, mut hess_sum) = (0.0f64, 0.0f64);
        for &r in rows {
            slot[r as usize] = 0;
            grad_sum += grad[r as usize] as f64;
            hess_sum += hess[r as usize] as f64;
        }

        let mut nodes = vec![TreeNode::Leaf { value: 0.0 }];
        let mut frontier = vec![PendingNode { node: 0, grad: grad_sum, hess: hess_sum }];
        let max_depth = self.params.max_depth as usize;

        for depth in 0..=max_depth {
            if frontier.is_empty() {
                break;
            }
            let splits = if depth < max_depth {
                self.find_splits(&frontier, &slot, grad, hess)
            } else {
                vec![None; frontier.len()]
            };

            let mut next = Vec::new();
            let mut child_slots: Vec<Option<(u32, u32)>> = vec![None; frontier.len()];
            for (k, (pending, split)) in frontier.iter().zip(&splits).enumerate() {
                match split {
                    None => {
                        nodes[pending.node] = TreeNode::Leaf {
                            value: self.params.leaf_weight(pending.grad, pending.hess),
                        };
                    }
                    Some(split) => {
                        let left = nodes.len();
                        let right = left + 1;
                        nodes.push(TreeNode::Leaf { value: 0.0 });
                        nodes.push(TreeNode::Leaf { value: 0.0 });
                        nodes[pending.node] = TreeNode::Split {
                            feature: split.feature,
                            threshold: split.threshold,
                            left,
                            right,
                        };
                        next.push(PendingNode { node: left, grad: split.left_grad, hess: split.left_hess });
                        next.push(PendingNode {
                            node: right,
                            grad: pending.grad - split.left_grad,
                            hess: pending.hess - split.left_hess,
                        });
                        child_slots[k] = Some(((next.len() - 2) as u32, (next.len() - 1) as u32));
                    }
                }
            }

            for &r in rows {
                let r = r as usize;
                let k = slot[r];
                if k == NO_SLOT {
                    continue;
                }
                slot[r] = match (child_slots[k as usize], &splits[k as usize]) {
                    (Some((left, right)), Some(split)) => {
                        if self.features[[r, split.feature]] < split.threshold {
                            left
                        } else {
                            right
                        }
                    }
                    _ => NO_SLOT,
                };
            }
            frontier = next;
        }

        Tree::from_nodes(nodes)
    }

    fn find_splits(
        &self,
        frontier: &[PendingNode],
        slot: &[u32],
        grad: &[f32],
        hess: &[f32],
    ) -> Vec<Option<SplitCandidate>> {
        let per_feature: Vec<Vec<Option<SplitCandidate>>> = (0..self.features.ncols())
            .into_par_iter()
            .map(|f| self.scan_feature(f, frontier, slot, grad, hess))
            .collect();

        let mut best: Vec<Option<SplitCandidate>> = vec![None; frontier.len()];
        for candidates in per_feature {
            for (current, candidate) in best.iter_mut().zip(candidates) {
                if let Some(candidate) = candidate {
                    if current.map_or(true, |c| candidate.gain > c.gain) {
                        *current = Some(candidate);
                    }
                }
            }
        }
        best
    }

    fn scan_feature(
        &self,
        feature: usize,
        frontier: &[PendingNode],
        slot: &[u32],
        grad: &[f32],
        hess: &[f32],
    ) -> Vec<Option<SplitCandidate>> {
        let m = frontier.len();
        let mut left_grad = vec![0.0f64; m];
        let mut left_hess = vec![0.0f64; m];
        let mut last: Vec<Option<f32>> = vec![None; m];
        let mut best: Vec<Option<SplitCandidate>> = vec![None; m];

        for &(row, value) in &self.columns.columns[feature] {
            let k = slot[row as usize];
            if k == NO_SLOT {
                continue;
            }
            let k = k as usize;
            if let Some(prev) = last[k] {
                if value != prev {
                    let parent = &frontier[k];
                    let (gl, hl) = (left_grad[k], left_hess[k]);
                    let (gr, hr) = (parent.grad - gl, parent.hess - hl);
                    if self.params.is_valid_split(hl, hr) {
                        let gain = self.params.split_gain(gl, hl, gr, hr, parent.grad, parent.hess);
                        if gain > 0.0 && best[k].map_or(true, |b| gain > b.gain) {
                            best[k] = Some(SplitCandidate {
                                feature,
                                threshold: midpoint(prev, value),
                                gain,
                                left_grad: gl,
                                left_hess: hl,
                            });
                        }
                    }
                }
            }
            left_grad[k] += grad[row as usize] as f64;
            left_hess[k] += hess[row as usize] as f64;
            last[k] = Some(value);
        }
        best
    }
}

/// Threshold strictly above `lo` and at most `hi`, so `lo` goes left and `hi` right.
fn midpoint(lo: f32, hi: f32) -> f32 {
    let mid = lo + (hi - lo) / 2.0;
    if mid > lo {
        mid
    } else {
        hi
    }
}
