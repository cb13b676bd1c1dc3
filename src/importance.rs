use std::collections::BTreeMap;

use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub code: String,
    pub feature: String,
    pub value: f64,
}

/// Inner-joins booster scores keyed by `f<index>` with the feature names at
/// those positions, sorted by descending score.
///
/// Features the booster never split on have no score and are left out.
pub fn join_feature_names(
    scores: &BTreeMap<String, f64>,
    names: &[String],
) -> Vec<FeatureImportance> {
    let mut joined: Vec<FeatureImportance> = names
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            let code = format!("f{index}");
            scores.get(&code).map(|&value| FeatureImportance {
                code,
                feature: name.clone(),
                value,
            })
        })
        .collect();
    joined.sort_by(|a, b| b.value.total_cmp(&a.value));
    joined
}

pub fn top_features(importances: &[FeatureImportance], n: usize) -> &[FeatureImportance] {
    &importances[..n.min(importances.len())]
}

pub fn log_importances(importances: &[FeatureImportance]) {
    for (rank, imp) in importances.iter().enumerate() {
        info!(
            rank = rank + 1,
            feature = %imp.feature,
            code = %imp.code,
            weight = imp.value,
            "Feature importance"
        );
    }
}
