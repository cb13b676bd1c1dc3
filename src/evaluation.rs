//! Classification metrics for the fraud class.

use ndarray::{Array1, ArrayView1};
use tracing::info;

use crate::error::{PipelineError, Result};

/// Labels rows whose fraud probability is strictly above `threshold`.
pub fn apply_threshold(probabilities: ArrayView1<'_, f64>, threshold: f64) -> Array1<bool> {
    probabilities.mapv(|p| p > threshold)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ConfusionMatrix {
    pub fn from_predictions(
        y_true: ArrayView1<'_, bool>,
        y_pred: ArrayView1<'_, bool>,
    ) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }
        let mut cm = ConfusionMatrix::default();
        for (&actual, &predicted) in y_true.iter().zip(y_pred.iter()) {
            match (actual, predicted) {
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_positive += 1,
                (true, false) => cm.false_negative += 1,
                (true, true) => cm.true_positive += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Cell fractions over all rows: `[[tn, fp], [fn, tp]]`, rows are the
    /// actual label.
    pub fn normalized(&self) -> [[f64; 2]; 2] {
        let total = self.total();
        [
            [ratio(self.true_negative, total), ratio(self.false_positive, total)],
            [ratio(self.false_negative, total), ratio(self.true_positive, total)],
        ]
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    /// Zero when there are no true positives.
    pub fn f1(&self) -> f64 {
        ratio(
            2 * self.true_positive,
            2 * self.true_positive + self.false_positive + self.false_negative,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Score at which each point is reached; the first point uses `+inf`.
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// One point per distinct score, starting at `(0, 0)`.
    pub fn compute(y_true: ArrayView1<'_, bool>, scores: ArrayView1<'_, f64>) -> Result<Self> {
        if y_true.len() != scores.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: y_true.len(),
                actual: scores.len(),
            });
        }
        let positives = y_true.iter().filter(|&&l| l).count();
        let negatives = y_true.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(PipelineError::SingleClass("both labels in y_true"));
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut curve = RocCurve {
            fpr: vec![0.0],
            tpr: vec![0.0],
            thresholds: vec![f64::INFINITY],
        };
        let (mut tp, mut fp) = (0usize, 0usize);
        for (k, &i) in order.iter().enumerate() {
            if y_true[i] {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_tie = order
                .get(k + 1)
                .map_or(true, |&next| scores[next] != scores[i]);
            if last_of_tie {
                curve.fpr.push(fp as f64 / negatives as f64);
                curve.tpr.push(tp as f64 / positives as f64);
                curve.thresholds.push(scores[i]);
            }
        }
        Ok(curve)
    }

    /// Trapezoidal area under the curve.
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }
}

/// All metrics for one labelled prediction run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub name: String,
    pub confusion: ConfusionMatrix,
    pub roc: RocCurve,
    pub roc_auc: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub accuracy: f64,
}

impl EvaluationReport {
    pub fn log(&self) {
        let [[tn, fp], [fn_, tp]] = self.confusion.normalized();
        info!(
            run = %self.name,
            roc_auc = format!("{:.4}%", self.roc_auc * 100.0),
            f1 = format!("{:.4}%", self.f1 * 100.0),
            precision = self.precision,
            recall = self.recall,
            accuracy = self.accuracy,
            "Evaluation"
        );
        info!(
            run = %self.name,
            tn = format!("{:.4}%", tn * 100.0),
            fp = format!("{:.4}%", fp * 100.0),
            fn_ = format!("{:.4}%", fn_ * 100.0),
            tp = format!("{:.4}%", tp * 100.0),
            "Normalized confusion matrix"
        );
    }
}

/// Scores hard labels `y_pred` and fraud probabilities `scores` against `y_true`.
pub fn evaluate(
    name: impl Into<String>,
    y_true: ArrayView1<'_, bool>,
    y_pred: ArrayView1<'_, bool>,
    scores: ArrayView1<'_, f64>,
) -> Result<EvaluationReport> {
    let confusion = ConfusionMatrix::from_predictions(y_true, y_pred)?;
    let roc = RocCurve::compute(y_true, scores)?;
    Ok(EvaluationReport {
        name: name.into(),
        roc_auc: roc.auc(),
        f1: confusion.f1(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        accuracy: confusion.accuracy(),
        confusion,
        roc,
    })
}
