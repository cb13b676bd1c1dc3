use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Keeps every fraud row and an equally sized random draw of regular rows.
///
/// The draw is without replacement, so it is capped at the number of regular
/// rows available. Regular rows come first in the output, then fraud rows.
pub fn undersample(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, bool>,
    seed: u64,
) -> Result<(Array2<f64>, Array1<bool>)> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    let (fraud, regular): (Vec<usize>, Vec<usize>) = (0..y.len()).partition(|&i| y[i]);
    if fraud.is_empty() {
        return Err(PipelineError::EmptyDataset("no fraud rows to undersample against"));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows: Vec<usize> = regular
        .choose_multiple(&mut rng, fraud.len())
        .copied()
        .collect();
    let kept_regular = rows.len();
    rows.extend_from_slice(&fraud);

    info!(
        fraud = fraud.len(),
        regular = kept_regular,
        dropped = regular.len() - kept_regular,
        "Undersampled training set"
    );
    Ok((x.select(Axis(0), &rows), y.select(Axis(0), &rows)))
}
