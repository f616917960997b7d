//! Dataset inputs: manifest, ground-truth homographies, correspondence
//! artifacts, and their on-disk layout.

mod artifact;
mod ground_truth;
mod layout;
mod manifest;

use std::path::Path;

pub use artifact::{load_artifact, parse_artifact};
pub use ground_truth::{load_homography, parse_homography};
pub use layout::{DatasetLayout, DEFAULT_ARTIFACT_EXTENSION, DEFAULT_MANIFEST_NAME};
pub use manifest::{load_manifest, parse_manifest, PairRecord, Split};

use crate::error::{EvalError, Result};

/// Pixel `[width, height]` of an image, read from its header only.
pub fn load_image_size(path: &Path) -> Result<[u32; 2]> {
    let (w, h) = image::image_dimensions(path).map_err(|source| EvalError::ImageSize {
        path: path.to_path_buf(),
        source,
    })?;
    Ok([w, h])
}
