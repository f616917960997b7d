//! Planar homography type, projection, and reprojection-error helpers.

use nalgebra::{Matrix3, Vector3};

/// Pixel coordinates `(x, y)`.
pub type Point2 = [f64; 2];

/// Below this magnitude the homogeneous `w` is treated as zero.
const W_EPS: f64 = 1e-12;
/// Minimum ratio of smallest to largest singular value for a usable matrix.
const MIN_CONDITION_RATIO: f64 = 1e-12;

/// Non-degenerate 3×3 homography.
///
/// The matrix is stored scaled to unit Frobenius norm; projection is scale
/// invariant, so two homographies differing only by scale compare equal
/// after construction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    /// Validate and wrap a matrix. Returns `None` for non-finite or
    /// (near-)singular input.
    pub fn try_new(m: Matrix3<f64>) -> Option<Self> {
        if !m.iter().all(|v| v.is_finite()) {
            return None;
        }
        let norm = m.norm();
        if norm <= 0.0 {
            return None;
        }
        let m = m / norm;
        let sv = m.singular_values();
        let (min_sv, max_sv) = sv
            .iter()
            .fold((f64::INFINITY, 0.0f64), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        if max_sv <= 0.0 || min_sv / max_sv < MIN_CONDITION_RATIO {
            return None;
        }
        Some(Self { m })
    }

    /// Row-major construction, see [`Homography::try_new`].
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Option<Self> {
        Self::try_new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity() / 3.0f64.sqrt(),
        }
    }

    /// Stored (unit-norm) matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Row-major matrix rescaled so that `h33 = 1` when possible.
    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let scale = self.m[(2, 2)];
        let m = if scale.abs() > W_EPS {
            self.m / scale
        } else {
            self.m
        };
        matrix3_to_array(&m)
    }

    /// Project `p` through the homography: `H * [x, y, 1]^T → [u, v]`.
    ///
    /// Returns `None` when the homogeneous third component is (near) zero.
    pub fn project(&self, p: Point2) -> Option<Point2> {
        let q = self.m * Vector3::new(p[0], p[1], 1.0);
        let (x, y, w) = (q[0], q[1], q[2]);
        // Threshold relative to the numerator magnitude.
        let w_scale = (x.abs() + y.abs()).max(1.0);
        if w.abs() <= W_EPS * w_scale {
            return None;
        }
        Some([x / w, y / w])
    }
}

impl TryFrom<[[f64; 3]; 3]> for Homography {
    type Error = String;

    fn try_from(rows: [[f64; 3]; 3]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
            .ok_or_else(|| "homography matrix is non-finite or singular".to_string())
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_rows()
    }
}

pub(crate) fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// Matched point pairs: `dst[i]` is the counterpart of `src[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedPoints {
    pub src: Vec<Point2>,
    pub dst: Vec<Point2>,
}

impl MatchedPoints {
    pub fn len(&self) -> usize {
        self.src.len().min(self.dst.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn pairs(&self) -> impl Iterator<Item = (&Point2, &Point2)> {
        self.src.iter().zip(&self.dst)
    }
}

#[inline]
pub(crate) fn distance(a: Point2, b: Point2) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Reprojection error of one pair: `||H(src) - dst||`, or `+inf` when the
/// projection is undefined.
#[inline]
pub fn reprojection_error(h: &Homography, src: Point2, dst: Point2) -> f64 {
    match h.project(src) {
        Some(p) => distance(p, dst),
        None => f64::INFINITY,
    }
}

/// Per-pair reprojection errors, aligned with `points`.
pub fn reprojection_errors(h: &Homography, points: &MatchedPoints) -> Vec<f64> {
    points
        .pairs()
        .map(|(s, d)| reprojection_error(h, *s, *d))
        .collect()
}

/// Pixel-centre corners of an image of size `[width, height]`:
/// top-left, top-right, bottom-left, bottom-right.
pub fn image_corners(size: [u32; 2]) -> [Point2; 4] {
    let w = f64::from(size[0].max(1) - 1);
    let h = f64::from(size[1].max(1) - 1);
    [[0.0, 0.0], [w, 0.0], [0.0, h], [w, h]]
}

/// Mean displacement of the image corners projected through `reference`
/// and `estimate`. Infinite when any corner projection is undefined.
pub fn mean_corner_displacement(
    reference: &Homography,
    estimate: &Homography,
    size: [u32; 2],
) -> f64 {
    let corners = image_corners(size);
    let mut sum = 0.0;
    for c in corners {
        match (reference.project(c), estimate.project(c)) {
            (Some(a), Some(b)) => sum += distance(a, b),
            _ => return f64::INFINITY,
        }
    }
    sum / corners.len() as f64
}
