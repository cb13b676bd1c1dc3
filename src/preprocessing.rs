// Encoding, imputation, splitting and scaling of the transaction features

use std::collections::BTreeSet;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::csv_reader::{Transaction, MONETARY_COLUMNS};
use crate::error::{PipelineError, Result};

pub const CATEGORICAL_COLUMNS: [&str; 3] = ["Type", "Customer Type", "Destination Type"];

#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub names: Vec<String>,
    // NaN where the source field was empty
    pub values: Array2<f64>,
    pub labels: Array1<bool>,
}

impl FeatureFrame {
    pub fn n_features(&self) -> usize {
        self.names.len()
    }
}

fn categorical_values(tx: &Transaction) -> [Option<&str>; 3] {
    [
        Some(tx.tx_type.label()),
        tx.customer_type.as_deref(),
        tx.destination_type.as_deref(),
    ]
}

// Indicator columns are `<Column>_<Category>`, categories sorted. A missing
// category leaves every indicator at zero.
pub fn encode_features(transactions: &[Transaction]) -> FeatureFrame {
    let mut categories: [BTreeSet<&str>; 3] = Default::default();
    for tx in transactions {
        for (set, value) in categories.iter_mut().zip(categorical_values(tx)) {
            if let Some(value) = value {
                set.insert(value);
            }
        }
    }

    let mut names: Vec<String> = MONETARY_COLUMNS.iter().map(|c| c.to_string()).collect();
    names.extend(MONETARY_COLUMNS.iter().map(|c| format!("{c} (Log)")));
    let mut offsets = [0usize; 3];
    for (i, (column, set)) in CATEGORICAL_COLUMNS.iter().zip(&categories).enumerate() {
        offsets[i] = names.len();
        names.extend(set.iter().map(|category| format!("{column}_{category}")));
    }

    let n_monetary = MONETARY_COLUMNS.len();
    let mut values = Array2::<f64>::zeros((transactions.len(), names.len()));
    for (mut row, tx) in values.outer_iter_mut().zip(transactions) {
        for (j, value) in tx.monetary().iter().enumerate() {
            let value = value.unwrap_or(f64::NAN);
            row[j] = value;
            row[n_monetary + j] = value.ln_1p();
        }
        for (i, value) in categorical_values(tx).iter().enumerate() {
            if let Some(value) = value {
                if let Some(pos) = categories[i].iter().position(|c| c == value) {
                    row[offsets[i] + pos] = 1.0;
                }
            }
        }
    }

    let labels = transactions.iter().map(|tx| tx.fraud).collect();
    debug!(columns = ?names, "Encoded feature columns");
    info!(
        rows = transactions.len(),
        features = names.len(),
        "Built feature frame"
    );

    FeatureFrame {
        names,
        values,
        labels,
    }
}

#[derive(Debug, Clone)]
pub struct MeanImputer {
    means: Array1<f64>,
}

impl MeanImputer {
    // all-missing columns fill with 0.0
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let means = x
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(j, column)| {
                let (sum, count) = column
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if count == 0 {
                    warn!(column = j, "Column has no observed values, imputing 0.0");
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect();
        MeanImputer { means }
    }

    #[cfg(test)]
    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_width(self.means.len(), x.ncols())?;
        let mut out = x.to_owned();
        let mut filled = 0usize;
        for mut row in out.outer_iter_mut() {
            for (value, mean) in row.iter_mut().zip(self.means.iter()) {
                if value.is_nan() {
                    *value = *mean;
                    filled += 1;
                }
            }
        }
        debug!(filled, "Imputed missing values");
        Ok(out)
    }

    pub fn fit_transform(x: ArrayView2<'_, f64>) -> Result<(Self, Array2<f64>)> {
        let imputer = Self::fit(x);
        let out = imputer.transform(x)?;
        Ok((imputer, out))
    }
}

#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<bool>,
    pub y_test: Array1<bool>,
}

/// Seeded train/test split that keeps the fraud rate of both parts equal to
/// the fraud rate of `y` up to rounding.
pub fn stratified_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, bool>,
    train_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "train_fraction",
            reason: format!("{train_fraction} is not in (0, 1)"),
        });
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();
    for class in [false, true] {
        let mut idx: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);
        let n_train = (idx.len() as f64 * train_fraction).round() as usize;
        train_idx.extend_from_slice(&idx[..n_train]);
        test_idx.extend_from_slice(&idx[n_train..]);
    }
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(PipelineError::EmptyDataset("train/test split has an empty side"));
    }
    train_idx.shuffle(&mut rng);
    test_idx.shuffle(&mut rng);

    let split = TrainTestSplit {
        x_train: x.select(Axis(0), &train_idx),
        x_test: x.select(Axis(0), &test_idx),
        y_train: y.select(Axis(0), &train_idx),
        y_test: y.select(Axis(0), &test_idx),
    };
    info!(
        train_rows = split.y_train.len(),
        test_rows = split.y_test.len(),
        train_fraud = split.y_train.iter().filter(|&&l| l).count(),
        test_fraud = split.y_test.iter().filter(|&&l| l).count(),
        "Stratified split"
    );
    Ok(split)
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalerFit {
    #[default]
    PerSplit,
    TrainOnly,
}

#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    min: Array1<f64>,
    range: Array1<f64>,
}

impl MinMaxScaler {
    /// A constant column gets a range of `1.0`, so it maps to `x - min`.
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyDataset("cannot fit scaler on zero rows"));
        }
        let min: Array1<f64> = x.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
        let max: Array1<f64> = x.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let range = (&max - &min).mapv(|r| if r == 0.0 || !r.is_finite() { 1.0 } else { r });
        Ok(MinMaxScaler { min, range })
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_width(self.min.len(), x.ncols())?;
        Ok((&x - &self.min) / &self.range)
    }

    pub fn fit_transform(x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        Self::fit(x)?.transform(x)
    }
}

/// Scales a train/test pair according to `policy`.
pub fn scale_split(
    train: ArrayView2<'_, f64>,
    test: ArrayView2<'_, f64>,
    policy: ScalerFit,
) -> Result<(Array2<f64>, Array2<f64>)> {
    let scaler = MinMaxScaler::fit(train)?;
    let scaled_train = scaler.transform(train)?;
    let scaled_test = match policy {
        ScalerFit::PerSplit => MinMaxScaler::fit_transform(test)?,
        ScalerFit::TrainOnly => scaler.transform(test)?,
    };
    debug!(policy = ?policy, "Scaled train and test matrices");
    Ok((scaled_train, scaled_test))
}

fn check_width(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::ShapeMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::read_transactions_from;
    use ndarray::array;
    use rand::Rng;

    fn sample() -> Vec<Transaction> {
        let csv = "type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud\n\
                   TRANSFER,100.0,C1,100.0,0.0,C2,0.0,0.0,1,1\n\
                   PAYMENT,20.0,C3,50.0,30.0,M4,,,0,0\n\
                   CASH_OUT,0.0,7,400.0,100.0,C8,5.0,305.0,0,0\n";
        read_transactions_from(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_feature_layout() {
        let frame = encode_features(&sample());
        let expected = [
            "Amount",
            "Customer Before",
            "Customer After",
            "Destination Before",
            "Destination After",
            "Amount (Log)",
            "Customer Before (Log)",
            "Customer After (Log)",
            "Destination Before (Log)",
            "Destination After (Log)",
            "Type_Cash Out",
            "Type_Payment",
            "Type_Transfer",
            "Customer Type_C",
            "Destination Type_C",
            "Destination Type_M",
        ];
        assert_eq!(frame.names, expected);
        assert_eq!(frame.values.dim(), (3, expected.len()));
        assert_eq!(frame.labels, array![true, false, false]);
    }

    #[test]
    fn test_one_hot_and_missing_category() {
        let frame = encode_features(&sample());
        // TRANSFER from C1 to C2
        assert_eq!(
            frame.values.row(0).slice(ndarray::s![10..]).to_vec(),
            vec![0.0, 0.0, 1.0, 1.0, 1.0, 0.0]
        );
        // customer id "7" has no prefix, so no customer indicator is set
        assert_eq!(frame.values[[2, 13]], 0.0);
        assert_eq!(frame.values[[2, 10]], 1.0);
    }

    #[test]
    fn test_log_columns() {
        let frame = encode_features(&sample());
        assert_eq!(frame.values[[2, 5]], 0.0);
        assert!((frame.values[[0, 5]] - 101f64.ln()).abs() < 1e-12);
        assert!(frame.values[[1, 8]].is_nan());
        assert!(frame.values[[1, 3]].is_nan());
    }

    #[test]
    fn test_log1p_properties() {
        assert_eq!(0f64.ln_1p(), 0.0);
        let amounts: [f64; 6] = [0.0, 0.01, 1.0, 181.0, 9_839.64, 10_000_000.0];
        for pair in amounts.windows(2) {
            assert!(pair[0].ln_1p() < pair[1].ln_1p());
        }
        for amount in amounts {
            let recovered = amount.ln_1p().exp_m1();
            assert!((recovered - amount).abs() <= 1e-9 * amount.max(1.0));
        }
    }

    #[test]
    fn test_mean_imputer() {
        let x = array![
            [1.0, f64::NAN, f64::NAN],
            [3.0, 4.0, f64::NAN],
            [f64::NAN, 8.0, f64::NAN]
        ];
        let (imputer, out) = MeanImputer::fit_transform(x.view()).unwrap();
        assert_eq!(imputer.means(), &array![2.0, 6.0, 0.0]);
        assert_eq!(out, array![[1.0, 6.0, 0.0], [3.0, 4.0, 0.0], [2.0, 8.0, 0.0]]);
    }

    #[test]
    fn test_imputer_rejects_wrong_width() {
        let imputer = MeanImputer::fit(array![[1.0, 2.0]].view());
        assert!(matches!(
            imputer.transform(array![[1.0, 2.0, 3.0]].view()),
            Err(PipelineError::ShapeMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_stratified_split_preserves_fraud_rate() {
        let n = 20_000;
        let mut rng = StdRng::seed_from_u64(7);
        let y: Array1<bool> = (0..n).map(|_| rng.gen_bool(0.013)).collect();
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);

        let split = stratified_split(x.view(), y.view(), 0.7, 42).unwrap();
        let rate = |labels: &Array1<bool>| {
            labels.iter().filter(|&&l| l).count() as f64 / labels.len() as f64
        };
        let overall = rate(&y);

        assert_eq!(split.y_train.len() + split.y_test.len(), n);
        assert_eq!(split.x_train.nrows(), split.y_train.len());
        assert!((split.y_train.len() as f64 / n as f64 - 0.7).abs() < 0.001);
        assert!((rate(&split.y_train) - overall).abs() < 0.01);
        assert!((rate(&split.y_test) - overall).abs() < 0.01);
    }

    #[test]
    fn test_stratified_split_keeps_rows_aligned() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y: Array1<bool> = (0..40).map(|i| i % 4 == 0).collect();
        let split = stratified_split(x.view(), y.view(), 0.7, 1).unwrap();
        for (row, label) in split.x_train.outer_iter().zip(split.y_train.iter()) {
            assert_eq!((row[0] as usize) % 4 == 0, *label);
        }
        for (row, label) in split.x_test.outer_iter().zip(split.y_test.iter()) {
            assert_eq!((row[0] as usize) % 4 == 0, *label);
        }
    }

    #[test]
    fn test_stratified_split_is_seeded() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| i as f64);
        let y: Array1<bool> = (0..100).map(|i| i % 10 == 0).collect();
        let a = stratified_split(x.view(), y.view(), 0.7, 3).unwrap();
        let b = stratified_split(x.view(), y.view(), 0.7, 3).unwrap();
        assert_eq!(a.x_train, b.x_train);
        assert_eq!(a.y_test, b.y_test);
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let x = Array2::<f64>::zeros((4, 1));
        let y = array![true, false, true, false];
        assert!(matches!(
            stratified_split(x.view(), y.view(), 1.0, 0),
            Err(PipelineError::InvalidParameter { name: "train_fraction", .. })
        ));
    }

    #[test]
    fn test_min_max_scaler() {
        let x = array![[0.0, 5.0, 2.0], [10.0, 5.0, 4.0], [5.0, 5.0, 3.0]];
        let scaled = MinMaxScaler::fit_transform(x.view()).unwrap();
        assert_eq!(scaled, array![[0.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.5, 0.0, 0.5]]);
    }

    #[test]
    fn test_scale_split_policies() {
        let train = array![[0.0], [10.0]];
        let test = array![[5.0], [15.0]];

        let (tr, te) = scale_split(train.view(), test.view(), ScalerFit::PerSplit).unwrap();
        assert_eq!(tr, array![[0.0], [1.0]]);
        assert_eq!(te, array![[0.0], [1.0]]);

        let (tr, te) = scale_split(train.view(), test.view(), ScalerFit::TrainOnly).unwrap();
        assert_eq!(tr, array![[0.0], [1.0]]);
        assert_eq!(te, array![[0.5], [1.5]]);
    }
}
