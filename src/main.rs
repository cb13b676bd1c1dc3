// Entry point for the transaction fraud classifier. Loads the transaction log, trains the
// boosted-tree model, evaluates it under the default threshold, a lowered threshold and an
// undersampled retrain, and renders every figure.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use linfa::Dataset;
use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::booster::{GradientBoostedTrees, ImportanceType};
use crate::config::{AppConfig, LoggingConfig};
use crate::csv_reader::read_transactions;
use crate::evaluation::{apply_threshold, evaluate, EvaluationReport};
use crate::importance::{join_feature_names, log_importances, top_features, FeatureImportance};
use crate::preprocessing::{encode_features, scale_split, stratified_split, MeanImputer};
use crate::profile::{summarize, DatasetSummary};
use crate::resampling::undersample;
use crate::visualize::{
    render_feature_importance, render_overview, render_roc_confusion, ChartStyle,
};

mod booster;
mod config;
mod csv_reader;
mod error;
mod evaluation;
mod importance;
mod preprocessing;
mod profile;
mod resampling;
mod tree;
mod visualize;

// Everything one run produces besides the figures
#[derive(Debug)]
pub struct PipelineReport {
    pub summary: DatasetSummary,
    pub feature_names: Vec<String>,
    pub baseline: EvaluationReport,
    pub lowered_threshold: EvaluationReport,
    pub undersampled: EvaluationReport,
    pub importances: Vec<FeatureImportance>,
}

// Fits the configured booster on a scaled training set, stopping early on the test set,
// and returns the model with its fraud probabilities for the test rows
fn fit_and_score(
    config: &AppConfig,
    x_train: ArrayView2<'_, f64>,
    y_train: ArrayView1<'_, bool>,
    x_test: ArrayView2<'_, f64>,
    y_test: ArrayView1<'_, bool>,
) -> Result<(GradientBoostedTrees, Array1<f64>)> {
    let train = Dataset::new(x_train.to_owned(), y_train.to_owned());
    let eval = Dataset::new(x_test.to_owned(), y_test.to_owned());
    let model = config
        .model
        .booster_params()
        .fit_with_eval(&train, &eval)
        .context("Failed to train booster")?;
    let fraud_proba = model.predict_proba(x_test).column(1).to_owned();
    Ok((model, fraud_proba))
}

// Scores one prediction run, logs it and renders its ROC/confusion figure
fn report_run(
    config: &AppConfig,
    name: String,
    file_name: &str,
    y_test: ArrayView1<'_, bool>,
    fraud_proba: ArrayView1<'_, f64>,
    threshold: f64,
) -> Result<EvaluationReport> {
    let predicted = apply_threshold(fraud_proba, threshold);
    let report = evaluate(name, y_test, predicted.view(), fraud_proba)?;
    report.log();
    render_roc_confusion(
        &report,
        &config.output.figures_dir.join(file_name),
        config.output.evaluation_size,
        &ChartStyle::white(),
    )
    .with_context(|| format!("Failed to render {file_name}"))?;
    Ok(report)
}

// Runs every stage in order
// Inputs: the run configuration
// Outputs: the metrics of the three evaluation runs and the feature importances
// Key steps:
// 1. Load, profile and plot the transaction log
// 2. Encode, impute, split and scale the features
// 3. Train and evaluate at the default threshold, then at the lowered threshold
// 4. Undersample the training split, retrain and evaluate again
// 5. Report the top weight importances of the last fitted booster
pub fn run_pipeline(config: &AppConfig) -> Result<PipelineReport> {
    let csv_path = &config.data.csv_path;
    let transactions = read_transactions(csv_path)
        .with_context(|| format!("Failed to load {}", csv_path.display()))?;
    let summary = summarize(&transactions);
    summary.log();

    let figures: &Path = &config.output.figures_dir;
    fs::create_dir_all(figures)
        .with_context(|| format!("Failed to create {}", figures.display()))?;
    render_overview(
        &transactions,
        config.data.preview_rows,
        &figures.join("overview.svg"),
        config.output.overview_size,
        &ChartStyle::white_grid(),
    )
    .context("Failed to render overview")?;

    let frame = encode_features(&transactions);
    info!(features = frame.n_features(), "Features encoded");
    let (_, imputed) = MeanImputer::fit_transform(frame.values.view())?;
    let pre = &config.preprocessing;
    let split = stratified_split(
        imputed.view(),
        frame.labels.view(),
        pre.train_fraction,
        pre.seed,
    )?;
    let (x_train, x_test) =
        scale_split(split.x_train.view(), split.x_test.view(), pre.scaler_fit)?;

    let evaluation = &config.evaluation;
    let (model, fraud_proba) = fit_and_score(
        config,
        x_train.view(),
        split.y_train.view(),
        x_test.view(),
        split.y_test.view(),
    )?;
    info!(
        trees = model.n_trees(),
        features = model.n_features(),
        best_iteration = ?model.best_iteration(),
        "Baseline booster fitted"
    );
    let baseline = report_run(
        config,
        "baseline".to_string(),
        "roc_baseline.svg",
        split.y_test.view(),
        fraud_proba.view(),
        evaluation.threshold,
    )?;
    let lowered_threshold = report_run(
        config,
        format!("threshold {}", evaluation.alternate_threshold),
        "roc_threshold.svg",
        split.y_test.view(),
        fraud_proba.view(),
        evaluation.alternate_threshold,
    )?;

    let (x_under, y_under) = undersample(
        split.x_train.view(),
        split.y_train.view(),
        evaluation.undersample_seed,
    )?;
    let (x_under, x_test_under) =
        scale_split(x_under.view(), split.x_test.view(), pre.scaler_fit)?;
    let (model, fraud_proba) = fit_and_score(
        config,
        x_under.view(),
        y_under.view(),
        x_test_under.view(),
        split.y_test.view(),
    )?;
    let undersampled = report_run(
        config,
        "undersampled".to_string(),
        "roc_undersampled.svg",
        split.y_test.view(),
        fraud_proba.view(),
        evaluation.threshold,
    )?;

    let scores = model.get_score(ImportanceType::Weight);
    let importances = join_feature_names(&scores, &frame.names);
    let top = top_features(&importances, evaluation.top_features);
    log_importances(top);
    render_feature_importance(
        top,
        &figures.join("feature_importance.svg"),
        config.output.importance_size,
        &ChartStyle::white_grid(),
    )
    .context("Failed to render feature importances")?;

    Ok(PipelineReport {
        summary,
        feature_names: frame.names,
        baseline,
        lowered_threshold,
        undersampled,
        importances,
    })
}

// RUST_LOG wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("fraud_boost={}", logging.level))
            .with_context(|| format!("Invalid log level `{}`", logging.level))?,
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let (config, source) = AppConfig::load()?;
    init_tracing(&config.logging)?;
    source.log();
    info!(csv = %config.data.csv_path.display(), "Starting fraud classification run");

    let report = run_pipeline(&config)?;
    info!(
        rows = report.summary.rows,
        features = report.feature_names.len(),
        baseline_auc = report.baseline.roc_auc,
        lowered_threshold_recall = report.lowered_threshold.recall,
        undersampled_auc = report.undersampled.roc_auc,
        figures = %config.output.figures_dir.display(),
        "Run complete"
    );
    Ok(())
}
