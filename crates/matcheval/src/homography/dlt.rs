//! Normalized Direct Linear Transform with Hartley conditioning.

use nalgebra::{DMatrix, Matrix3};

use crate::geometry::{Homography, Point2};

/// Minimum |sin| of the angle spanned by three sample points.
const MIN_TRIPLE_SINE: f64 = 1e-4;
/// Points closer than this (px) count as coincident.
const MIN_SEGMENT_LEN: f64 = 1e-9;

/// Translate the centroid to the origin and scale so the mean distance from
/// it is sqrt(2). Returns the conditioning transform and normalized points.
pub(crate) fn normalize_points(pts: &[Point2]) -> (Matrix3<f64>, Vec<Point2>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| (p[0] - cx).hypot(p[1] - cy))
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

/// Estimate `H` with `dst ≈ H(src)` from ≥4 correspondences.
///
/// Solves for the eigenvector of the smallest eigenvalue of `AᵀA` in
/// normalized coordinates, then denormalizes with `T_dst⁻¹ · H · T_src`.
/// Returns `None` for too few points or a singular result.
pub fn estimate_homography_dlt(src: &[Point2], dst: &[Point2]) -> Option<Homography> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let [sx, sy] = src_n[i];
        let [dx, dy] = dst_n[i];

        // Row 2i:   [  0  0  0 | -sx -sy -1 | dy*sx  dy*sy  dy ]
        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        // Row 2i+1: [ sx  sy  1 |  0  0  0 | -dx*sx -dx*sy -dx ]
        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;
    let h = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse()?;
    Homography::try_new(t_dst_inv * h_norm * t_src)
}

/// True when any three points of the sample are (nearly) collinear or
/// coincident in either image.
pub(crate) fn is_degenerate_sample(src: &[Point2], dst: &[Point2]) -> bool {
    has_collinear_triple(src) || has_collinear_triple(dst)
}

fn has_collinear_triple(pts: &[Point2]) -> bool {
    let n = pts.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if triple_is_degenerate(pts[i], pts[j], pts[k]) {
                    return true;
                }
            }
        }
    }
    false
}

fn triple_is_degenerate(a: Point2, b: Point2, c: Point2) -> bool {
    let u = [b[0] - a[0], b[1] - a[1]];
    let v = [c[0] - a[0], c[1] - a[1]];
    let lu = u[0].hypot(u[1]);
    let lv = v[0].hypot(v[1]);
    if lu < MIN_SEGMENT_LEN || lv < MIN_SEGMENT_LEN {
        return true;
    }
    let cross = u[0] * v[1] - u[1] * v[0];
    (cross / (lu * lv)).abs() < MIN_TRIPLE_SINE
}
