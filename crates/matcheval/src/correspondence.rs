//! Keypoint sets and index matches of one image pair.
//!
//! Matches arrive in one of two encodings (explicit index pairs or a
//! per-A sentinel array); [`normalize_matches`] is the single place that
//! converts them to [`MatchIndexPair`]s.

use crate::geometry::{MatchedPoints, Point2};

/// `index_a` in set A corresponds to `index_b` in set B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MatchIndexPair {
    pub index_a: usize,
    pub index_b: usize,
}

impl MatchIndexPair {
    pub fn new(index_a: usize, index_b: usize) -> Self {
        Self { index_a, index_b }
    }
}

/// Match list as stored in an artifact.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum RawMatches {
    /// `m × 2` rows of `(index_a, index_b)`.
    Pairs(Vec<[i64; 2]>),
    /// One entry per A point: matched B index, or `-1` for unmatched.
    Sentinel(Vec<i64>),
}

/// Sentinel value meaning "no match".
pub const UNMATCHED: i64 = -1;

/// Convert either match encoding to explicit index pairs.
///
/// Indices are only checked for sign and encoding shape here; bounds are
/// validated by [`Correspondences::new`].
pub fn normalize_matches(raw: &RawMatches, n_a: usize) -> Result<Vec<MatchIndexPair>, String> {
    match raw {
        RawMatches::Pairs(rows) => rows
            .iter()
            .enumerate()
            .map(|(row, &[a, b])| {
                let index_a = usize::try_from(a)
                    .map_err(|_| format!("match row {row}: negative index_a {a}"))?;
                let index_b = usize::try_from(b)
                    .map_err(|_| format!("match row {row}: negative index_b {b}"))?;
                Ok(MatchIndexPair::new(index_a, index_b))
            })
            .collect(),
        RawMatches::Sentinel(values) => {
            if values.len() != n_a {
                return Err(format!(
                    "sentinel match array has length {}, expected one entry per A point ({n_a})",
                    values.len()
                ));
            }
            let mut out = Vec::new();
            for (index_a, &v) in values.iter().enumerate() {
                if v == UNMATCHED {
                    continue;
                }
                let index_b = usize::try_from(v)
                    .map_err(|_| format!("sentinel entry {index_a}: invalid value {v}"))?;
                out.push(MatchIndexPair::new(index_a, index_b));
            }
            Ok(out)
        }
    }
}

/// Keypoints of both images and the validated matches between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Correspondences {
    points_a: Vec<Point2>,
    points_b: Vec<Point2>,
    matches: Vec<MatchIndexPair>,
}

impl Correspondences {
    /// Validate that every match index is in bounds.
    ///
    /// Duplicate `index_a` (or `index_b`) values are kept; each match row is
    /// scored on its own.
    pub fn new(
        points_a: Vec<Point2>,
        points_b: Vec<Point2>,
        matches: Vec<MatchIndexPair>,
    ) -> Result<Self, String> {
        if let Some((row, m)) = matches
            .iter()
            .enumerate()
            .find(|(_, m)| m.index_a >= points_a.len() || m.index_b >= points_b.len())
        {
            return Err(format!(
                "match row {row}: ({}, {}) out of bounds for |A| = {}, |B| = {}",
                m.index_a,
                m.index_b,
                points_a.len(),
                points_b.len()
            ));
        }
        let non_finite = points_a
            .iter()
            .chain(&points_b)
            .find(|p| !p.iter().all(|v| v.is_finite()));
        if let Some(p) = non_finite {
            return Err(format!("non-finite keypoint ({}, {})", p[0], p[1]));
        }
        Ok(Self {
            points_a,
            points_b,
            matches,
        })
    }

    pub fn points_a(&self) -> &[Point2] {
        &self.points_a
    }

    pub fn points_b(&self) -> &[Point2] {
        &self.points_b
    }

    pub fn matches(&self) -> &[MatchIndexPair] {
        &self.matches
    }

    /// Mean of the two keypoint counts.
    pub fn mean_feature_count(&self) -> f64 {
        (self.points_a.len() + self.points_b.len()) as f64 / 2.0
    }

    /// Matched point pairs in match-list order.
    pub fn matched_points(&self) -> MatchedPoints {
        let (src, dst) = self
            .matches
            .iter()
            .map(|m| (self.points_a[m.index_a], self.points_b[m.index_b]))
            .unzip();
        MatchedPoints { src, dst }
    }
}
