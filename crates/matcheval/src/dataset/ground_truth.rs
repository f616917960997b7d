//! Plain-text ground-truth homographies: 9 whitespace-separated reals.

use std::path::Path;

use crate::error::{EvalError, Result};
use crate::geometry::Homography;

/// Parse a row-major 3×3 matrix. Wrong token count, non-numeric tokens and
/// degenerate matrices are parse errors.
pub fn parse_homography(text: &str, path: &Path) -> Result<Homography> {
    let mut values = [0.0f64; 9];
    let mut count = 0usize;
    for (line_no, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let v: f64 = token.parse().map_err(|_| {
                EvalError::parse(path, Some(line_no + 1), format!("invalid number '{token}'"))
            })?;
            if count < values.len() {
                values[count] = v;
            }
            count += 1;
        }
    }
    if count != values.len() {
        return Err(EvalError::parse(
            path,
            None,
            format!("expected 9 matrix entries, found {count}"),
        ));
    }
    let rows = [
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
    ];
    Homography::from_rows(rows)
        .ok_or_else(|| EvalError::parse(path, None, "homography is non-finite or singular"))
}

pub fn load_homography(path: &Path) -> Result<Homography> {
    let text = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    parse_homography(&text, path)
}
