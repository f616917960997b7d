//! Evaluation driver: parallel pair scoring, then per-algorithm aggregation.
//!
//! Dataset inputs (manifest, ground truth, image sizes) are loaded once and
//! shared read-only by every algorithm. Pair scores are collected into a
//! vector indexed by manifest position, so completion order never matters.

use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use crate::aggregate::{
    pair_rows_csv, summarize_algorithm, AggregatedTable, AlgorithmSummary, TableKind,
};
use crate::config::EvalConfig;
use crate::dataset::{
    load_artifact, load_homography, load_image_size, load_manifest, DatasetLayout, PairRecord,
};
use crate::error::{EvalError, Result};
use crate::geometry::Homography;
use crate::scoring::{score_pair, MatchStatus, PairInput, PairScores};

/// Manifest pairs with their ground truth and image-A size.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub pairs: Vec<PairRecord>,
    pub ground_truth: Vec<Homography>,
    pub image_sizes: Vec<[u32; 2]>,
}

impl LoadedDataset {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Scores and summary of one algorithm.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlgorithmEvaluation {
    pub summary: AlgorithmSummary,
    /// Aligned with [`LoadedDataset::pairs`].
    pub scores: Vec<PairScores>,
}

/// An algorithm whose run was aborted.
#[derive(Debug)]
pub struct AlgorithmFailure {
    pub algorithm: String,
    pub error: EvalError,
}

/// Outcome of evaluating several algorithms on one dataset.
#[derive(Debug)]
pub struct DatasetEvaluation {
    pub pairs: Vec<PairRecord>,
    /// Successful algorithms, in request order.
    pub algorithms: Vec<AlgorithmEvaluation>,
    pub failures: Vec<AlgorithmFailure>,
}

impl DatasetEvaluation {
    pub fn summaries(&self) -> Vec<AlgorithmSummary> {
        self.algorithms.iter().map(|a| a.summary.clone()).collect()
    }

    pub fn table(&self, kind: TableKind, config: &EvalConfig) -> Result<AggregatedTable> {
        AggregatedTable::from_summaries(kind, config.scoring.thresholds.clone(), &self.summaries())
    }

    /// Write the overall tables and, if enabled, per-pair rows. Returns the
    /// written paths.
    pub fn write_outputs(
        &self,
        layout: &DatasetLayout,
        config: &EvalConfig,
    ) -> Result<Vec<PathBuf>> {
        let results_dir = layout.results_dir();
        std::fs::create_dir_all(results_dir).map_err(|e| EvalError::io(results_dir, e))?;

        let mut written = Vec::new();
        for kind in TableKind::ALL {
            let path = layout.table_path(kind);
            self.table(kind, config)?.write_csv(&path, config.csv_precision)?;
            written.push(path);

            if config.write_pair_rows {
                for a in &self.algorithms {
                    let path = layout.pair_rows_path(&a.summary.algorithm, kind);
                    let csv =
                        pair_rows_csv(kind, &config.scoring.thresholds, &self.pairs, &a.scores);
                    std::fs::write(&path, csv).map_err(|e| EvalError::io(&path, e))?;
                    written.push(path);
                }
            }
        }
        Ok(written)
    }
}

/// Runs evaluations on a dedicated worker pool.
pub struct Evaluator {
    config: EvalConfig,
    layout: DatasetLayout,
    pool: rayon::ThreadPool,
}

impl Evaluator {
    pub fn new(config: EvalConfig, layout: DatasetLayout) -> Result<Self> {
        config.validate()?;
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|idx| format!("matcheval-{idx}"));
        if let Some(n) = config.workers {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| EvalError::Config(format!("failed to build worker pool: {e}")))?;
        Ok(Self {
            config,
            layout,
            pool,
        })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Parse the manifest and load every ground-truth matrix and image size.
    pub fn load_dataset(&self) -> Result<LoadedDataset> {
        let manifest_path = self.layout.manifest_path();
        let pairs = load_manifest(&manifest_path)?;
        tracing::info!(
            n_pairs = pairs.len(),
            "Loaded manifest {}",
            manifest_path.display()
        );

        let loaded: Vec<(Homography, [u32; 2])> = self.pool.install(|| {
            pairs
                .par_iter()
                .map(|record| {
                    let h = load_homography(&self.layout.resolve(&record.homography))?;
                    let size = load_image_size(&self.layout.resolve(&record.image_a))?;
                    Ok((h, size))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        let (ground_truth, image_sizes) = loaded.into_iter().unzip();

        Ok(LoadedDataset {
            pairs,
            ground_truth,
            image_sizes,
        })
    }

    /// Score every pair of `dataset` for `algorithm` and aggregate.
    ///
    /// A missing or malformed artifact aborts this algorithm's run.
    pub fn evaluate_algorithm(
        &self,
        dataset: &LoadedDataset,
        algorithm: &str,
    ) -> Result<AlgorithmEvaluation> {
        let started = Instant::now();
        let scoring = &self.config.scoring;
        let base_seed = scoring.fit.seed;

        let scores: Vec<PairScores> = self.pool.install(|| {
            dataset
                .pairs
                .par_iter()
                .enumerate()
                .map(|(i, record)| {
                    let path = self.layout.artifact_path(algorithm, record);
                    let correspondences = load_artifact(&path, algorithm)?;
                    let input = PairInput {
                        correspondences: &correspondences,
                        ground_truth: &dataset.ground_truth[i],
                        image_size: dataset.image_sizes[i],
                    };
                    let seed = base_seed.wrapping_add(record.index as u64);
                    let scores = score_pair(&input, scoring, seed);
                    if scores.mma.status == MatchStatus::EmptyMatchSet {
                        tracing::debug!(algorithm, pair = record.index, "empty match set");
                    }
                    if let Some(failure) = &scores.hea.failure {
                        tracing::debug!(
                            algorithm,
                            pair = record.index,
                            %failure,
                            "homography fit failed"
                        );
                    }
                    Ok(scores)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let summary =
            summarize_algorithm(algorithm, &dataset.pairs, &scores, &scoring.thresholds)?;
        let d = &summary.diagnostics;
        if d.empty_match_sets > 0 || d.failed_fits > 0 {
            tracing::warn!(
                algorithm,
                empty_match_sets = d.empty_match_sets,
                failed_fits = d.failed_fits,
                "pairs scored as zero"
            );
        }
        tracing::info!(
            algorithm,
            n_pairs = d.n_pairs,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evaluated algorithm"
        );

        Ok(AlgorithmEvaluation { summary, scores })
    }

    /// Evaluate each algorithm in turn. Per-algorithm errors are collected
    /// in [`DatasetEvaluation::failures`]; dataset-level errors are returned.
    ///
    /// Algorithm names must be unique, since each names one table row.
    pub fn evaluate(&self, algorithms: &[String]) -> Result<DatasetEvaluation> {
        if let Some(dup) = algorithms
            .iter()
            .enumerate()
            .find_map(|(i, a)| algorithms[..i].contains(a).then_some(a))
        {
            return Err(EvalError::Config(format!(
                "algorithm '{dup}' is listed more than once"
            )));
        }
        let dataset = self.load_dataset()?;
        let mut evaluation = DatasetEvaluation {
            pairs: dataset.pairs.clone(),
            algorithms: Vec::with_capacity(algorithms.len()),
            failures: Vec::new(),
        };
        for algorithm in algorithms {
            match self.evaluate_algorithm(&dataset, algorithm) {
                Ok(result) => evaluation.algorithms.push(result),
                Err(error) => {
                    tracing::error!(algorithm = %algorithm, "{error}");
                    evaluation.failures.push(AlgorithmFailure {
                        algorithm: algorithm.clone(),
                        error,
                    });
                }
            }
        }
        Ok(evaluation)
    }
}
