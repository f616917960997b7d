//! Pixel threshold grid and threshold-aligned score vectors.

use crate::error::{EvalError, Result};

/// Ordered, strictly increasing, positive pixel thresholds.
///
/// Its length is the dimensionality of every MMA/HEA curve.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ThresholdGrid(Vec<f64>);

impl ThresholdGrid {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(EvalError::Config("threshold grid is empty".into()));
        }
        if let Some(bad) = values.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(EvalError::Config(format!(
                "thresholds must be finite and positive, got {bad}"
            )));
        }
        if values.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EvalError::Config(
                "thresholds must be strictly increasing".into(),
            ));
        }
        Ok(Self(values))
    }

    /// Integer grid `1..=max_px`.
    pub fn pixels(max_px: u32) -> Self {
        Self((1..=max_px.max(1)).map(f64::from).collect())
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Column labels, e.g. `"1px"`, `"2.5px"`.
    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|t| format!("{t}px")).collect()
    }

    /// Parse a label produced by [`ThresholdGrid::labels`].
    pub(crate) fn parse_label(label: &str) -> Option<f64> {
        label.trim().strip_suffix("px")?.parse().ok()
    }

    pub fn zeros(&self) -> ScoreVector {
        ScoreVector(vec![0.0; self.len()])
    }
}

impl Default for ThresholdGrid {
    fn default() -> Self {
        Self::pixels(10)
    }
}

impl TryFrom<Vec<f64>> for ThresholdGrid {
    type Error = EvalError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<ThresholdGrid> for Vec<f64> {
    fn from(grid: ThresholdGrid) -> Self {
        grid.0
    }
}

/// One value per threshold of a [`ThresholdGrid`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ScoreVector(pub Vec<f64>);

impl ScoreVector {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trapezoid area under the curve, see [`trapezoid_auc`].
    pub fn auc(&self) -> f64 {
        trapezoid_auc(&self.0)
    }
}

/// Unit-spaced trapezoid rule: `Σ (v[i] + v[i+1]) / 2`.
///
/// Not normalized by the curve length, so a constant curve `c` over `k`
/// thresholds has area `c·(k−1)`.
pub fn trapezoid_auc(values: &[f64]) -> f64 {
    values.windows(2).map(|w| (w[0] + w[1]) / 2.0).sum()
}
