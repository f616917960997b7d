//! Image-pair manifest: one `<imageA> <imageB> <homography>` line per pair.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{EvalError, Result};

/// Dataset partition of a pair, taken from the first path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Split {
    Illumination,
    Viewpoint,
    /// Any other label; contributes to the overall block only.
    Other(String),
}

impl Split {
    pub fn from_label(label: &str) -> Self {
        match label {
            "illumination" => Self::Illumination,
            "viewpoint" => Self::Viewpoint,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Illumination => "illumination",
            Self::Viewpoint => "viewpoint",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Split {
    fn from(s: String) -> Self {
        Self::from_label(&s)
    }
}

impl From<Split> for String {
    fn from(s: Split) -> Self {
        s.as_str().to_string()
    }
}

/// One evaluation unit of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PairRecord {
    /// 0-based position among the manifest's pairs.
    pub index: usize,
    pub split: Split,
    pub subscene: String,
    pub stem_a: String,
    pub stem_b: String,
    /// Paths relative to the dataset directory.
    pub image_a: PathBuf,
    pub image_b: PathBuf,
    pub homography: PathBuf,
}

impl PairRecord {
    /// File stem of this pair's correspondence artifact.
    pub fn artifact_stem(&self) -> String {
        format!("{}_{}_matches", self.stem_a, self.stem_b)
    }
}

struct ManifestPath<'a> {
    split: &'a str,
    subscene: &'a str,
    file: &'a str,
}

fn split_manifest_path(field: &str) -> std::result::Result<ManifestPath<'_>, String> {
    let parts: Vec<&str> = field.split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [split, subscene, .., file] => Ok(ManifestPath {
            split: *split,
            subscene: *subscene,
            file: *file,
        }),
        _ => Err(format!(
            "path '{field}' must have the form <split>/<subscene>/<file>"
        )),
    }
}

fn file_stem(file: &str) -> &str {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}

fn parse_line(index: usize, line: &str) -> std::result::Result<PairRecord, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [image_a, image_b, homography] = fields.as_slice() else {
        return Err(format!("expected 3 fields, got {}", fields.len()));
    };
    let a = split_manifest_path(image_a)?;
    let b = split_manifest_path(image_b)?;
    let h = split_manifest_path(homography)?;
    for other in [&b, &h] {
        if other.split != a.split || other.subscene != a.subscene {
            return Err(format!(
                "fields disagree on split/subscene: '{}/{}' vs '{}/{}'",
                a.split, a.subscene, other.split, other.subscene
            ));
        }
    }

    Ok(PairRecord {
        index,
        split: Split::from_label(a.split),
        subscene: a.subscene.to_string(),
        stem_a: file_stem(a.file).to_string(),
        stem_b: file_stem(b.file).to_string(),
        image_a: PathBuf::from(image_a),
        image_b: PathBuf::from(image_b),
        homography: PathBuf::from(homography),
    })
}

/// Parse manifest text. Blank lines are skipped; any other malformed line is
/// a parse error naming `path` and the 1-based line number.
pub fn parse_manifest(text: &str, path: &Path) -> Result<Vec<PairRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_line(records.len(), line)
            .map_err(|msg| EvalError::parse(path, Some(line_no + 1), msg))?;
        records.push(record);
    }
    Ok(records)
}

pub fn load_manifest(path: &Path) -> Result<Vec<PairRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    parse_manifest(&text, path)
}
