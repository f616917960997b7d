//! Correspondence artifacts written by matcher wrappers.
//!
//! JSON object with `pointsA` (n₁×2), `pointsB` (n₂×2) and `matches` in
//! either encoding accepted by [`crate::RawMatches`].

use std::path::Path;

use crate::correspondence::{normalize_matches, Correspondences, RawMatches};
use crate::error::{EvalError, Result};
use crate::geometry::Point2;

#[derive(Debug, serde::Deserialize)]
struct ArtifactFile {
    #[serde(rename = "pointsA")]
    points_a: Vec<Point2>,
    #[serde(rename = "pointsB")]
    points_b: Vec<Point2>,
    matches: RawMatches,
}

/// Decode artifact JSON and normalize its matches.
pub fn parse_artifact(text: &str, path: &Path) -> Result<Correspondences> {
    let file: ArtifactFile = serde_json::from_str(text)
        .map_err(|e| EvalError::parse(path, Some(e.line()), e.to_string()))?;
    let matches = normalize_matches(&file.matches, file.points_a.len())
        .map_err(|msg| EvalError::parse(path, None, msg))?;
    Correspondences::new(file.points_a, file.points_b, matches)
        .map_err(|msg| EvalError::parse(path, None, msg))
}

/// Load the artifact of `algorithm` at `path`; a missing file is
/// [`EvalError::MissingArtifact`].
pub fn load_artifact(path: &Path, algorithm: &str) -> Result<Correspondences> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EvalError::MissingArtifact {
                algorithm: algorithm.to_string(),
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(EvalError::io(path, e)),
    };
    parse_artifact(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correspondence::MatchIndexPair;

    #[test]
    fn parses_pair_encoding() {
        let text = r#"{"pointsA": [[0, 0], [5, 5]], "pointsB": [[1, 1]], "matches": [[1, 0]]}"#;
        let c = parse_artifact(text, Path::new("a.json")).unwrap();
        assert_eq!(c.matches(), &[MatchIndexPair::new(1, 0)]);
        assert_eq!(c.points_a().len(), 2);
    }

    #[test]
    fn parses_sentinel_encoding() {
        let text = r#"{"pointsA": [[0, 0], [5, 5]], "pointsB": [[1, 1]], "matches": [-1, 0]}"#;
        let c = parse_artifact(text, Path::new("a.json")).unwrap();
        assert_eq!(c.matches(), &[MatchIndexPair::new(1, 0)]);
    }

    #[test]
    fn out_of_bounds_index_is_parse_error() {
        let text = r#"{"pointsA": [[0, 0]], "pointsB": [[1, 1]], "matches": [[0, 3]]}"#;
        let err = parse_artifact(text, Path::new("a.json")).unwrap_err();
        assert!(matches!(err, EvalError::Parse { .. }), "{err}");
        assert!(err.to_string().starts_with("a.json: match row 0"), "{err}");
    }

    #[test]
    fn malformed_json_reports_line() {
        let text = "{\n\"pointsA\": [[0, 0]],\n\"pointsB\": oops\n}";
        match parse_artifact(text, Path::new("a.json")).unwrap_err() {
            EvalError::Parse { line, .. } => assert_eq!(line, Some(3)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        match load_artifact(&path, "sift").unwrap_err() {
            EvalError::MissingArtifact { algorithm, path: p } => {
                assert_eq!(algorithm, "sift");
                assert_eq!(p, path);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
