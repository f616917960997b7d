//! matcheval — accuracy evaluation of keypoint matchers against ground-truth
//! homographies.
//!
//! For every image pair of a dataset and every evaluated algorithm, the
//! stages are:
//!
//! 1. **Dataset** – manifest parsing, ground-truth homography and image size
//!    loading.
//! 2. **Correspondences** – matched keypoint artifacts produced by the
//!    algorithm under test.
//! 3. **MMA** – fraction of matches whose ground-truth reprojection error is
//!    within each pixel threshold.
//! 4. **HEA** – robust homography fit (RANSAC / MSAC) and the mean image-corner
//!    displacement against ground truth, as a step curve over the thresholds.
//! 5. **Aggregate** – per-split mean curves written as two-level CSV tables.
//! 6. **Sweep** – selection of the best hyperparameter value per
//!    (algorithm, split) by area under the curve.
//!
//! # Public API
//! - [`Evaluator`] with [`EvalConfig`] runs stages 1–5 over a results
//!   directory
//! - [`score_pair`] scores a single pair
//! - [`fit_homography_robust`] is the standalone robust fitter
//! - [`run_sweep`] / [`select_best`] cover stage 6

mod aggregate;
mod config;
mod correspondence;
mod dataset;
mod error;
mod evaluate;
mod geometry;
mod homography;
mod scoring;
mod sweep;
mod thresholds;

#[cfg(test)]
pub(crate) mod test_utils;

pub use aggregate::{
    mean_block, pair_rows_csv, summarize_algorithm, AggregatedTable, AlgorithmSummary,
    Diagnostics, SplitBlock, SplitGroup, TableKind, TableRow,
};
pub use config::{EvalConfig, SweepConfig, SweepValue};
pub use correspondence::{
    normalize_matches, Correspondences, MatchIndexPair, RawMatches, UNMATCHED,
};
pub use dataset::{
    load_artifact, load_homography, load_image_size, load_manifest, parse_artifact,
    parse_homography, parse_manifest, DatasetLayout, PairRecord, Split,
    DEFAULT_ARTIFACT_EXTENSION, DEFAULT_MANIFEST_NAME,
};
pub use error::{EvalError, Result};
pub use evaluate::{
    AlgorithmEvaluation, AlgorithmFailure, DatasetEvaluation, Evaluator, LoadedDataset,
};
pub use geometry::{
    image_corners, mean_corner_displacement, reprojection_error, reprojection_errors,
    Homography, MatchedPoints, Point2,
};
pub use homography::{
    estimate_homography_dlt, fit_homography_robust, FitFailure, HomographyFit, RobustFitConfig,
    RobustScoring, MIN_SAMPLE,
};
pub use scoring::{
    hea_curve, mma_curve, score_pair, HeaRow, MatchStatus, MmaRow, PairInput, PairScores,
    ScoringConfig,
};
pub use sweep::{load_candidates, run_sweep, select_best, BestCurve, SweepCandidate, SweepResult};
pub use thresholds::{trapezoid_auc, ScoreVector, ThresholdGrid};
