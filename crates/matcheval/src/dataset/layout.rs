//! On-disk layout of a dataset and of an evaluation results directory.

use std::path::{Path, PathBuf};

use super::manifest::PairRecord;
use crate::aggregate::TableKind;

pub const DEFAULT_MANIFEST_NAME: &str = "image_pairs.txt";
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "json";

/// Paths of one (dataset, results directory) evaluation.
///
/// ```text
/// <dataset>/image_pairs.txt
/// <dataset>/<split>/<subscene>/{imageA, imageB, H}
/// <results>/<algorithm>/outputs/<split>/<subscene>/<stemA>_<stemB>_matches.json
/// <results>/overall_results_{mma,hom}.csv
/// <results>/<algorithm>_{mma,hom}.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    dataset_dir: PathBuf,
    results_dir: PathBuf,
    manifest_name: String,
    artifact_extension: String,
}

impl DatasetLayout {
    pub fn new(dataset_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
            results_dir: results_dir.into(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
        }
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    pub fn with_artifact_extension(mut self, extension: impl Into<String>) -> Self {
        self.artifact_extension = extension.into();
        self
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dataset_dir.join(&self.manifest_name)
    }

    /// Resolve a manifest-relative path against the dataset directory.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.dataset_dir.join(relative)
    }

    pub fn artifact_path(&self, algorithm: &str, record: &PairRecord) -> PathBuf {
        let mut file = record.artifact_stem();
        if !self.artifact_extension.is_empty() {
            file.push('.');
            file.push_str(&self.artifact_extension);
        }
        self.results_dir
            .join(algorithm)
            .join("outputs")
            .join(record.split.as_str())
            .join(&record.subscene)
            .join(file)
    }

    pub fn table_path(&self, kind: TableKind) -> PathBuf {
        self.results_dir
            .join(format!("overall_results_{}.csv", kind.file_stem()))
    }

    pub fn pair_rows_path(&self, algorithm: &str, kind: TableKind) -> PathBuf {
        self.results_dir
            .join(format!("{algorithm}_{}.csv", kind.file_stem()))
    }
}
