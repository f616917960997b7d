//! Run configuration, loaded from JSON.

use std::path::{Path, PathBuf};

use crate::dataset::{DatasetLayout, DEFAULT_ARTIFACT_EXTENSION, DEFAULT_MANIFEST_NAME};
use crate::error::{EvalError, Result};
use crate::scoring::ScoringConfig;

/// Settings of one `evaluate` run.
///
/// Every field is optional in JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Threshold grid and robust-fit parameters.
    pub scoring: ScoringConfig,
    /// Worker threads for pair scoring; `None` uses rayon's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Manifest file name inside the dataset directory.
    pub manifest_name: String,
    /// Extension of correspondence artifact files.
    pub artifact_extension: String,
    /// Decimals written to the overall tables.
    pub csv_precision: usize,
    /// Write `<algorithm>_{mma,hom}.csv` next to the overall tables.
    pub write_pair_rows: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            workers: None,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            csv_precision: 2,
            write_pair_rows: true,
        }
    }
}

impl EvalConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| EvalError::parse(path, Some(e.line()), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.fit.validate()?;
        if self.workers == Some(0) {
            return Err(EvalError::Config("workers must be at least 1".into()));
        }
        if self.manifest_name.trim().is_empty() {
            return Err(EvalError::Config("manifest_name is empty".into()));
        }
        if self.csv_precision > 12 {
            return Err(EvalError::Config(format!(
                "csv_precision {} is out of range (0..=12)",
                self.csv_precision
            )));
        }
        Ok(())
    }

    /// Dataset/results layout using this configuration's file names.
    pub fn layout(&self, dataset_dir: &Path, results_dir: &Path) -> DatasetLayout {
        DatasetLayout::new(dataset_dir, results_dir)
            .with_manifest_name(self.manifest_name.clone())
            .with_artifact_extension(self.artifact_extension.clone())
    }
}

/// One hyperparameter value of a sweep.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SweepValue {
    /// Label recorded for winning curves, e.g. `"0.85"`.
    pub label: String,
    /// Results directory of this value; defaults to `<results-root>/<label>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_dir: Option<PathBuf>,
    /// Per-layer ratio thresholds the matcher used for this value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layer_ratios: Vec<f64>,
}

impl SweepValue {
    pub fn from_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            results_dir: None,
            layer_ratios: Vec::new(),
        }
    }

    pub fn results_dir(&self, root: &Path) -> PathBuf {
        match &self.results_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.join(&self.label),
        }
    }
}

/// Ordered hyperparameter values; order decides AUC ties.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SweepConfig {
    pub values: Vec<SweepValue>,
}

impl SweepConfig {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: labels.into_iter().map(SweepValue::from_label).collect(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| EvalError::parse(path, Some(e.line()), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(EvalError::Config("sweep has no values".into()));
        }
        for (i, v) in self.values.iter().enumerate() {
            if v.label.trim().is_empty() {
                return Err(EvalError::Config(format!("sweep value {i} has an empty label")));
            }
            if self.values[..i].iter().any(|o| o.label == v.label) {
                return Err(EvalError::Config(format!(
                    "duplicate sweep label '{}'",
                    v.label
                )));
            }
            if let Some(r) = v.layer_ratios.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
                return Err(EvalError::Config(format!(
                    "sweep value '{}' has invalid layer ratio {r}",
                    v.label
                )));
            }
        }
        Ok(())
    }
}
