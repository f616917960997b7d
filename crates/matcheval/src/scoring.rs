//! Per-pair MMA and HEA scoring.

use crate::correspondence::Correspondences;
use crate::geometry::{mean_corner_displacement, reprojection_errors, Homography};
use crate::homography::{fit_homography_robust, FitFailure, RobustFitConfig};
use crate::thresholds::{ScoreVector, ThresholdGrid};

/// Threshold grid and fitter settings shared by every pair of a run.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: ThresholdGrid,
    pub fit: RobustFitConfig,
}

/// Everything needed to score one image pair.
#[derive(Debug, Clone, Copy)]
pub struct PairInput<'a> {
    pub correspondences: &'a Correspondences,
    pub ground_truth: &'a Homography,
    /// Image A `[width, height]` in pixels.
    pub image_size: [u32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scored,
    /// No matches were supplied; the MMA curve is all-zero by definition.
    EmptyMatchSet,
}

/// MMA row of one pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MmaRow {
    pub curve: ScoreVector,
    /// `(|A| + |B|) / 2`.
    pub mean_features: f64,
    pub n_matches: usize,
    pub status: MatchStatus,
}

impl MmaRow {
    /// Auxiliary table columns: `#Features`, `#Matches`.
    pub fn aux(&self) -> [f64; 2] {
        [self.mean_features, self.n_matches as f64]
    }
}

/// HEA row of one pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HeaRow {
    pub curve: ScoreVector,
    pub n_matches: usize,
    /// Zero when the fit failed.
    pub n_inliers: usize,
    /// Mean corner displacement between ground truth and estimate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_error_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<Homography>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FitFailure>,
}

impl HeaRow {
    /// Auxiliary table columns: `#Matches`, `#Inliers`.
    pub fn aux(&self) -> [f64; 2] {
        [self.n_matches as f64, self.n_inliers as f64]
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PairScores {
    pub mma: MmaRow,
    pub hea: HeaRow,
}

/// Fraction of distances `<= t` for every threshold `t`.
///
/// Empty input yields the all-zero curve.
pub fn mma_curve(distances: &[f64], grid: &ThresholdGrid) -> ScoreVector {
    if distances.is_empty() {
        return grid.zeros();
    }
    let mut sorted = distances.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    ScoreVector(
        grid.values()
            .iter()
            .map(|&t| sorted.partition_point(|&d| d <= t) as f64 / n)
            .collect(),
    )
}

/// Step curve: `1.0` where `corner_error <= t`, else `0.0`.
pub fn hea_curve(corner_error: f64, grid: &ThresholdGrid) -> ScoreVector {
    ScoreVector(
        grid.values()
            .iter()
            .map(|&t| if corner_error <= t { 1.0 } else { 0.0 })
            .collect(),
    )
}

/// Score one pair. `seed` replaces `config.fit.seed` for this pair's fit.
pub fn score_pair(input: &PairInput<'_>, config: &ScoringConfig, seed: u64) -> PairScores {
    let grid = &config.thresholds;
    let matched = input.correspondences.matched_points();
    let n_matches = matched.len();

    let (mma_values, status) = if matched.is_empty() {
        (grid.zeros(), MatchStatus::EmptyMatchSet)
    } else {
        let distances = reprojection_errors(input.ground_truth, &matched);
        (mma_curve(&distances, grid), MatchStatus::Scored)
    };
    let mma = MmaRow {
        curve: mma_values,
        mean_features: input.correspondences.mean_feature_count(),
        n_matches,
        status,
    };

    let fit_config = RobustFitConfig { seed, ..config.fit };
    let hea = match fit_homography_robust(&matched, &fit_config) {
        Ok(fit) => {
            let err =
                mean_corner_displacement(input.ground_truth, &fit.homography, input.image_size);
            HeaRow {
                curve: hea_curve(err, grid),
                n_matches,
                n_inliers: fit.n_inliers,
                corner_error_px: Some(err),
                estimate: Some(fit.homography),
                failure: None,
            }
        }
        Err(failure) => HeaRow {
            curve: grid.zeros(),
            n_matches,
            n_inliers: 0,
            corner_error_px: None,
            estimate: None,
            failure: Some(failure),
        },
    };

    PairScores { mma, hea }
}
