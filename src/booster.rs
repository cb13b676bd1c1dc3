// Gradient-boosted trees over the logistic loss, fitted through linfa's ParamGuard/Fit

use std::collections::BTreeMap;

use linfa::traits::{Fit, PredictInplace};
use linfa::{DatasetBase, ParamGuard};
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::tree::{FeatureBins, RegressionTree, TreeBuilder, TreeParams};

const SAMPLING_HESSIAN_WEIGHT: f64 = 0.1;
const PROB_EPS: f64 = 1e-15;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMethod {
    Uniform,
    // kept in proportion to the regularised gradient, reweighted by 1/p
    #[default]
    GradientBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportanceType {
    Weight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoosterValidParams {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    max_bin: usize,
    gamma: f64,
    min_child_weight: f64,
    subsample: f64,
    sampling_method: SamplingMethod,
    reg_lambda: f64,
    early_stopping_rounds: Option<usize>,
    seed: u64,
}

impl BoosterValidParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
            gamma: self.gamma,
            min_child_weight: self.min_child_weight,
            reg_lambda: self.reg_lambda,
        }
    }
}

// Defaults follow XGBoost
#[derive(Debug, Clone, PartialEq)]
pub struct BoosterParams(BoosterValidParams);

impl Default for BoosterParams {
    fn default() -> Self {
        BoosterParams(BoosterValidParams {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            max_bin: 256,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            sampling_method: SamplingMethod::Uniform,
            reg_lambda: 1.0,
            early_stopping_rounds: None,
            seed: 0,
        })
    }
}

impl BoosterParams {
    pub fn n_estimators(mut self, n_estimators: usize) -> Self {
        self.0.n_estimators = n_estimators;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.0.learning_rate = learning_rate;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.0.max_depth = max_depth;
        self
    }

    pub fn max_bin(mut self, max_bin: usize) -> Self {
        self.0.max_bin = max_bin;
        self
    }

    pub fn gamma(mut self, gamma: f64) -> Self {
        self.0.gamma = gamma;
        self
    }

    pub fn min_child_weight(mut self, min_child_weight: f64) -> Self {
        self.0.min_child_weight = min_child_weight;
        self
    }

    pub fn subsample(mut self, subsample: f64) -> Self {
        self.0.subsample = subsample;
        self
    }

    pub fn sampling_method(mut self, sampling_method: SamplingMethod) -> Self {
        self.0.sampling_method = sampling_method;
        self
    }

    pub fn reg_lambda(mut self, reg_lambda: f64) -> Self {
        self.0.reg_lambda = reg_lambda;
        self
    }

    pub fn early_stopping_rounds(mut self, rounds: Option<usize>) -> Self {
        self.0.early_stopping_rounds = rounds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }

    /// Checks the parameters and fits with `eval` as the early-stopping set.
    pub fn fit_with_eval(
        &self,
        train: &BoosterDataset,
        eval: &BoosterDataset,
    ) -> Result<GradientBoostedTrees> {
        let params = self.check_ref()?;
        params.train(
            train.records().view(),
            train.targets().view(),
            Some((eval.records().view(), eval.targets().view())),
        )
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> PipelineError {
    PipelineError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

impl ParamGuard for BoosterParams {
    type Checked = BoosterValidParams;
    type Error = PipelineError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if p.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1"));
        }
        if !(p.learning_rate.is_finite() && p.learning_rate > 0.0) {
            return Err(invalid(
                "learning_rate",
                format!("{} must be positive", p.learning_rate),
            ));
        }
        if p.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if !(2..=u16::MAX as usize).contains(&p.max_bin) {
            return Err(invalid("max_bin", format!("{} is not in 2..=65535", p.max_bin)));
        }
        if !(p.gamma >= 0.0) {
            return Err(invalid("gamma", format!("{} must be non-negative", p.gamma)));
        }
        if !(p.min_child_weight >= 0.0) {
            return Err(invalid(
                "min_child_weight",
                format!("{} must be non-negative", p.min_child_weight),
            ));
        }
        if !(p.subsample > 0.0 && p.subsample <= 1.0) {
            return Err(invalid("subsample", format!("{} is not in (0, 1]", p.subsample)));
        }
        if !(p.reg_lambda >= 0.0) {
            return Err(invalid(
                "reg_lambda",
                format!("{} must be non-negative", p.reg_lambda),
            ));
        }
        if p.early_stopping_rounds == Some(0) {
            return Err(invalid("early_stopping_rounds", "must be at least 1"));
        }
        Ok(p)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

pub type BoosterDataset = DatasetBase<Array2<f64>, Array1<bool>>;

impl Fit<Array2<f64>, Array1<bool>, PipelineError> for BoosterValidParams {
    type Object = GradientBoostedTrees;

    fn fit(&self, dataset: &BoosterDataset) -> Result<Self::Object> {
        self.train(dataset.records().view(), dataset.targets().view(), None)
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

fn log_loss(margins: &Array1<f64>, labels: ArrayView1<'_, bool>) -> f64 {
    let total: f64 = margins
        .iter()
        .zip(labels.iter())
        .map(|(&m, &y)| {
            let p = sigmoid(m).clamp(PROB_EPS, 1.0 - PROB_EPS);
            if y {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / margins.len().max(1) as f64
}

impl BoosterValidParams {
    fn train(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, bool>,
        eval: Option<(ArrayView2<'_, f64>, ArrayView1<'_, bool>)>,
    ) -> Result<GradientBoostedTrees> {
        let n = x.nrows();
        if n == 0 {
            return Err(PipelineError::EmptyDataset("cannot fit booster on zero rows"));
        }
        if y.len() != n {
            return Err(PipelineError::ShapeMismatch {
                expected: n,
                actual: y.len(),
            });
        }
        if let Some((ex, ey)) = eval {
            if ex.ncols() != x.ncols() {
                return Err(PipelineError::ShapeMismatch {
                    expected: x.ncols(),
                    actual: ex.ncols(),
                });
            }
            if ex.nrows() != ey.len() {
                return Err(PipelineError::ShapeMismatch {
                    expected: ex.nrows(),
                    actual: ey.len(),
                });
            }
        }

        let positives = y.iter().filter(|&&l| l).count();
        let base_rate = (positives as f64 / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (base_rate / (1.0 - base_rate)).ln();
        info!(
            rows = n,
            features = x.ncols(),
            positives,
            base_score,
            "Training gradient-boosted trees"
        );

        let bins = FeatureBins::fit(x, self.max_bin);
        let binned = bins.quantize(x);
        let tree_params = self.tree_params();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut margins = Array1::from_elem(n, base_score);
        let mut eval_margins = eval.map(|(ex, _)| Array1::from_elem(ex.nrows(), base_score));
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];

        let mut trees: Vec<RegressionTree> = Vec::with_capacity(self.n_estimators);
        let mut eval_history = Vec::new();
        let mut best: Option<(usize, f64)> = None;

        for round in 0..self.n_estimators {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                let label = if y[i] { 1.0 } else { 0.0 };
                grad[i] = p - label;
                hess[i] = (p * (1.0 - p)).max(1e-16);
            }

            let sample = sample_rows(&grad, &hess, self.subsample, self.sampling_method, &mut rng);
            let mut weighted_grad = vec![0.0; n];
            let mut weighted_hess = vec![0.0; n];
            let mut rows = Vec::with_capacity(sample.len());
            for &(row, weight) in &sample {
                weighted_grad[row] = grad[row] * weight;
                weighted_hess[row] = hess[row] * weight;
                rows.push(row);
            }

            let tree =
                TreeBuilder::new(&bins, &binned, &weighted_grad, &weighted_hess, tree_params)
                    .build(rows);
            for (margin, row) in margins.iter_mut().zip(x.outer_iter()) {
                *margin += tree.predict_row(row);
            }

            if let (Some((ex, ey)), Some(em)) = (eval, eval_margins.as_mut()) {
                for (margin, row) in em.iter_mut().zip(ex.outer_iter()) {
                    *margin += tree.predict_row(row);
                }
                let loss = log_loss(em, ey);
                eval_history.push(loss);
                debug!(
                    round,
                    sampled = sample.len(),
                    leaves = tree.n_leaves(),
                    eval_logloss = loss,
                    "Boosting round"
                );
                if best.map_or(true, |(_, b)| loss < b) {
                    best = Some((round, loss));
                }
            } else {
                debug!(round, sampled = sample.len(), leaves = tree.n_leaves(), "Boosting round");
            }
            trees.push(tree);

            if let (Some(patience), Some((best_round, _))) = (self.early_stopping_rounds, best) {
                if round - best_round >= patience {
                    info!(round, best_round, "Early stopping");
                    break;
                }
            }
        }

        let best_iteration = best.map(|(round, _)| round);
        info!(
            trees = trees.len(),
            best_iteration = ?best_iteration,
            best_logloss = ?best.map(|(_, loss)| loss),
            "Booster trained"
        );

        Ok(GradientBoostedTrees {
            base_score,
            trees,
            best_iteration,
            n_features: x.ncols(),
            eval_history,
        })
    }
}

// Rows for one boosting round with their gradient weights
fn sample_rows(
    grad: &[f64],
    hess: &[f64],
    subsample: f64,
    method: SamplingMethod,
    rng: &mut StdRng,
) -> Vec<(usize, f64)> {
    let n = grad.len();
    if subsample >= 1.0 {
        return (0..n).map(|i| (i, 1.0)).collect();
    }

    match method {
        SamplingMethod::Uniform => (0..n)
            .filter(|_| rng.gen::<f64>() < subsample)
            .map(|i| (i, 1.0))
            .collect(),
        SamplingMethod::GradientBased => {
            let scores: Vec<f64> = grad
                .iter()
                .zip(hess)
                .map(|(g, h)| (g * g + SAMPLING_HESSIAN_WEIGHT * h * h).sqrt())
                .collect();
            let threshold = sampling_threshold(&scores, subsample * n as f64);
            scores
                .iter()
                .enumerate()
                .filter_map(|(i, &score)| {
                    let p = if threshold > 0.0 {
                        (score / threshold).min(1.0)
                    } else {
                        subsample
                    };
                    (p > 0.0 && rng.gen::<f64>() < p).then(|| (i, 1.0 / p))
                })
                .collect()
        }
    }
}

/// Smallest `u` with `sum(min(1, s / u)) == target`. Returns `0.0` when every
/// score is zero.
fn sampling_threshold(scores: &[f64], target: f64) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let mut suffix: f64 = sorted.iter().sum();
    if suffix <= 0.0 || target <= 0.0 {
        return 0.0;
    }
    for (m, &score) in sorted.iter().enumerate() {
        let remaining = target - m as f64;
        if remaining <= 0.0 {
            return score;
        }
        let u = suffix / remaining;
        if score <= u {
            return u;
        }
        suffix -= score;
    }
    0.0
}

#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    base_score: f64,
    trees: Vec<RegressionTree>,
    best_iteration: Option<usize>,
    n_features: usize,
    eval_history: Vec<f64>,
}

impl GradientBoostedTrees {
    pub fn params() -> BoosterParams {
        BoosterParams::default()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn eval_history(&self) -> &[f64] {
        &self.eval_history
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn active_trees(&self) -> &[RegressionTree] {
        match self.best_iteration {
            Some(best) => &self.trees[..=best],
            None => &self.trees,
        }
    }

    pub fn predict_margin(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        let trees = self.active_trees();
        x.outer_iter()
            .map(|row| {
                self.base_score + trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect()
    }

    pub fn predict_fraud_proba(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        self.predict_margin(x).mapv(sigmoid)
    }

    /// `[P(regular), P(fraud)]` for each row.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let fraud = self.predict_fraud_proba(x);
        let mut out = Array2::zeros((fraud.len(), 2));
        for (mut row, p) in out.outer_iter_mut().zip(fraud.iter()) {
            row[0] = 1.0 - p;
            row[1] = *p;
        }
        out
    }

    /// Importance scores keyed by feature code `f<index>`; features never
    /// used in a split are absent.
    pub fn get_score(&self, importance_type: ImportanceType) -> BTreeMap<String, f64> {
        let mut scores = BTreeMap::new();
        match importance_type {
            ImportanceType::Weight => {
                for feature in self.trees.iter().flat_map(|t| t.split_features()) {
                    *scores.entry(format!("f{feature}")).or_insert(0.0) += 1.0;
                }
            }
        }
        scores
    }
}

impl<D: Data<Elem = f64>> PredictInplace<ArrayBase<D, Ix2>, Array1<bool>> for GradientBoostedTrees {
    fn predict_inplace<'a>(&'a self, x: &'a ArrayBase<D, Ix2>, y: &mut Array1<bool>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        let margins = self.predict_margin(x.view());
        for (target, margin) in y.iter_mut().zip(margins.iter()) {
            *target = *margin > 0.0;
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<bool> {
        Array1::from_elem(x.nrows(), false)
    }
}
