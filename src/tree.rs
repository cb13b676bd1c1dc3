//! Histogram-based regression trees fitted on gradient statistics.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Per-feature split candidates derived from the training distribution.
///
/// A value `x` of feature `f` falls into bin `k` when
/// `bounds[f][k - 1] < x <= bounds[f][k]`. Splitting after bin `k` sends
/// every row with `x <= bounds[f][k]` to the left child.
#[derive(Debug, Clone)]
pub struct FeatureBins {
    bounds: Vec<Vec<f64>>,
}

impl FeatureBins {
    pub fn fit(x: ArrayView2<'_, f64>, max_bin: usize) -> Self {
        let bounds = x
            .axis_iter(Axis(1))
            .map(|column| feature_bounds(column, max_bin))
            .collect();
        FeatureBins { bounds }
    }

    pub fn n_features(&self) -> usize {
        self.bounds.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.bounds[feature].len() + 1
    }

    /// Missing values land in the first bin, in line with `RegressionTree::predict_row`.
    pub fn bin(&self, feature: usize, value: f64) -> usize {
        if value.is_nan() {
            return 0;
        }
        self.bounds[feature].partition_point(|&b| b < value)
    }

    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.bounds[feature][bin]
    }

    pub fn quantize(&self, x: ArrayView2<'_, f64>) -> Array2<u16> {
        let mut binned = Array2::<u16>::zeros(x.dim());
        for (mut out, row) in binned.outer_iter_mut().zip(x.outer_iter()) {
            for (feature, (slot, &value)) in out.iter_mut().zip(row.iter()).enumerate() {
                *slot = self.bin(feature, value) as u16;
            }
        }
        binned
    }
}

fn feature_bounds(column: ArrayView1<'_, f64>, max_bin: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    if distinct.len() <= max_bin {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    let n = sorted.len();
    let mut bounds: Vec<f64> = (1..max_bin).map(|q| sorted[q * n / max_bin]).collect();
    bounds.dedup();
    if bounds.last() == distinct.last() {
        bounds.pop();
    }
    bounds
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    #[cfg(test)]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { weight } => return *weight,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row[*feature];
                    idx = if value.is_nan() || value <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Feature index of every split node.
    pub fn split_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            Node::Split { feature, .. } => Some(*feature),
            Node::Leaf { .. } => None,
        })
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub learning_rate: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
}

impl TreeParams {
    fn leaf_weight(&self, grad: f64, hess: f64) -> f64 {
        let denom = hess + self.reg_lambda;
        if denom <= 0.0 {
            0.0
        } else {
            -self.learning_rate * grad / denom
        }
    }

    fn score(&self, grad: f64, hess: f64) -> f64 {
        let denom = hess + self.reg_lambda;
        if denom <= 0.0 {
            0.0
        } else {
            grad * grad / denom
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Grows one tree depth-first over `rows`, using the already weighted
/// gradient and hessian of every training row.
pub struct TreeBuilder<'a> {
    bins: &'a FeatureBins,
    binned: &'a Array2<u16>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: TreeParams,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        bins: &'a FeatureBins,
        binned: &'a Array2<u16>,
        grad: &'a [f64],
        hess: &'a [f64],
        params: TreeParams,
    ) -> Self {
        TreeBuilder {
            bins,
            binned,
            grad,
            hess,
            params,
            nodes: Vec::new(),
        }
    }

    pub fn build(mut self, rows: Vec<usize>) -> RegressionTree {
        self.grow(rows, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let (grad, hess) = rows
            .iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.grad[r], h + self.hess[r]));
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            weight: self.params.leaf_weight(grad, hess),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(split) = self.best_split(&rows, grad, hess) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| (self.binned[[r, split.feature]] as usize) <= split.bin);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: self.bins.threshold(split.feature, split.bin),
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], grad: f64, hess: f64) -> Option<SplitCandidate> {
        let parent = self.params.score(grad, hess);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.bins.n_features() {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }
            let mut hist = vec![(0.0f64, 0.0f64); n_bins];
            for &r in rows {
                let slot = &mut hist[self.binned[[r, feature]] as usize];
                slot.0 += self.grad[r];
                slot.1 += self.hess[r];
            }

            let (mut gl, mut hl) = (0.0, 0.0);
            for (bin, &(g, h)) in hist.iter().enumerate().take(n_bins - 1) {
                gl += g;
                hl += h;
                let (gr, hr) = (grad - gl, hess - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = self.params.score(gl, hl) + self.params.score(gr, hr) - parent;
                if gain > self.params.gamma && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }
        best
    }
}
