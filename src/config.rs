// Configuration for the fraud classification run

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use tracing::info;

use crate::booster::{BoosterParams, GradientBoostedTrees, SamplingMethod};
use crate::preprocessing::ScalerFit;

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub preprocessing: PreprocessingConfig,
    pub model: ModelConfig,
    pub evaluation: EvaluationConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Transaction log location
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub csv_path: PathBuf,
    /// Rows used by the count plot and the amount histogram
    pub preview_rows: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/paysim.csv"),
            preview_rows: 100_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub train_fraction: f64,
    pub scaler_fit: ScalerFit,
    /// Seed of the stratified split
    pub seed: u64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            scaler_fit: ScalerFit::PerSplit,
            seed: 42,
        }
    }
}

/// Booster hyperparameters, checked when the booster is fitted
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub max_bin: usize,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub subsample: f64,
    pub sampling_method: SamplingMethod,
    pub reg_lambda: f64,
    /// Rounds without eval log-loss improvement before training stops
    pub early_stopping_rounds: Option<usize>,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            max_bin: 256,
            gamma: 0.1,
            min_child_weight: 2.0,
            subsample: 0.1,
            sampling_method: SamplingMethod::GradientBased,
            reg_lambda: 2.0,
            early_stopping_rounds: Some(5),
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn booster_params(&self) -> BoosterParams {
        GradientBoostedTrees::params()
            .n_estimators(self.n_estimators)
            .learning_rate(self.learning_rate)
            .max_depth(self.max_depth)
            .max_bin(self.max_bin)
            .gamma(self.gamma)
            .min_child_weight(self.min_child_weight)
            .subsample(self.subsample)
            .sampling_method(self.sampling_method)
            .reg_lambda(self.reg_lambda)
            .early_stopping_rounds(self.early_stopping_rounds)
            .seed(self.seed)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub threshold: f64,
    /// Threshold of the recall-oriented rerun
    pub alternate_threshold: f64,
    pub top_features: usize,
    pub undersample_seed: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            alternate_threshold: 0.01,
            top_features: 15,
            undersample_seed: 42,
        }
    }
}

/// Figure directory and pixel sizes
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub figures_dir: PathBuf,
    pub overview_size: (u32, u32),
    pub evaluation_size: (u32, u32),
    pub importance_size: (u32, u32),
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            figures_dir: PathBuf::from("figures"),
            overview_size: (1200, 1200),
            evaluation_size: (1600, 800),
            importance_size: (1600, 600),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults(PathBuf),
}

impl ConfigSource {
    // Called once tracing is installed, since loading happens before it
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                info!(path = %path.display(), "Loaded configuration file")
            }
            ConfigSource::Defaults(path) => {
                info!(path = %path.display(), "No configuration file, using defaults")
            }
        }
    }
}

impl AppConfig {
    /// Loads `config/config.toml`, or the defaults when that file is absent.
    pub fn load() -> Result<(Self, ConfigSource)> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::load_from_path(path)?, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())))
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .with_context(|| {
                format!("Failed to build configuration from {}", path.as_ref().display())
            })?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.preprocessing.train_fraction, 0.7);
        assert_eq!(config.preprocessing.scaler_fit, ScalerFit::PerSplit);
        assert_eq!(config.evaluation.threshold, 0.5);
        assert_eq!(config.evaluation.alternate_threshold, 0.01);
        assert_eq!(config.evaluation.top_features, 15);
        assert_eq!(config.data.preview_rows, 100_000);
        assert_eq!(config.model.early_stopping_rounds, Some(5));
    }

    #[test]
    fn test_default_booster_params_are_valid() {
        use linfa::ParamGuard;
        let params = AppConfig::default().model.booster_params();
        assert!(params.check().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_toml(
            r#"
            [preprocessing]
            scaler_fit = "train_only"

            [model]
            n_estimators = 20
            sampling_method = "uniform"

            [output]
            figures_dir = "out"
            overview_size = [800, 800]
            "#,
        );
        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.preprocessing.scaler_fit, ScalerFit::TrainOnly);
        assert_eq!(config.preprocessing.train_fraction, 0.7);
        assert_eq!(config.model.n_estimators, 20);
        assert_eq!(config.model.sampling_method, SamplingMethod::Uniform);
        assert_eq!(config.model.learning_rate, 0.1);
        assert_eq!(config.output.figures_dir, PathBuf::from("out"));
        assert_eq!(config.output.overview_size, (800, 800));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_unknown_scaler_policy_is_rejected() {
        let file = write_toml("[preprocessing]\nscaler_fit = \"global\"\n");
        assert!(AppConfig::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load_from_path("does/not/exist.toml").is_err());
    }

    #[test]
    fn test_load_or_default_reports_its_source() {
        let (config, source) = AppConfig::load_or_default("does/not/exist.toml").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(source, ConfigSource::Defaults(PathBuf::from("does/not/exist.toml")));

        let file = write_toml("[evaluation]\ntop_features = 3\n");
        let (config, source) = AppConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.evaluation.top_features, 3);
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
    }
}
