//! Shared synthetic data for unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::{Homography, MatchedPoints, Point2};

/// Mild perspective warp of a 640×480 image.
pub(crate) fn synthetic_homography() -> Homography {
    Homography::from_rows([
        [0.95, 0.08, 12.0],
        [-0.05, 1.02, 7.5],
        [1.2e-4, -8.0e-5, 1.0],
    ])
    .unwrap()
}

/// `n` correspondences under `h` inside a 640×480 frame.
///
/// The first `outlier_frac` share of destinations is replaced with uniform random
/// points at least 20 px from the true projection; inliers get uniform noise
/// in `±noise` per coordinate. Returns the points and the ground-truth
/// inlier flags.
pub(crate) fn synthetic_correspondences(
    h: &Homography,
    n: usize,
    outlier_frac: f64,
    noise: f64,
    seed: u64,
) -> (MatchedPoints, Vec<bool>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_outliers = (n as f64 * outlier_frac).round() as usize;
    let mut points = MatchedPoints::default();
    let mut truth = Vec::with_capacity(n);
    for i in 0..n {
        let src: Point2 = [rng.gen_range(0.0..639.0), rng.gen_range(0.0..479.0)];
        let proj = h.project(src).unwrap();
        let is_outlier = i < n_outliers;
        let dst = if is_outlier {
            loop {
                let cand: Point2 = [rng.gen_range(0.0..639.0), rng.gen_range(0.0..479.0)];
                if (cand[0] - proj[0]).hypot(cand[1] - proj[1]) > 20.0 {
                    break cand;
                }
            }
        } else if noise > 0.0 {
            [
                proj[0] + rng.gen_range(-noise..noise),
                proj[1] + rng.gen_range(-noise..noise),
            ]
        } else {
            proj
        };
        points.src.push(src);
        points.dst.push(dst);
        truth.push(!is_outlier);
    }
    (points, truth)
}

/// Write a blank grayscale PNG of the given size.
pub(crate) fn write_blank_png(path: &std::path::Path, width: u32, height: u32) {
    image::GrayImage::new(width, height).save(path).unwrap();
}
