//! Error taxonomy for evaluation runs.
//!
//! Only conditions that abort a scope (a dataset or one algorithm's run) are
//! errors. Numerical degeneracies inside a pair (no matches, failed fit) are
//! carried as values in [`crate::PairScores`].

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Malformed manifest line, homography file, artifact, or match index.
    #[error("{}{}: {message}", .path.display(), line_suffix(.line))]
    Parse {
        path: PathBuf,
        /// 1-based line number, when the cause is line-addressable.
        line: Option<usize>,
        message: String,
    },

    /// Correspondence artifact for one (algorithm, pair) does not exist.
    #[error("missing artifact for algorithm '{algorithm}': {}", .path.display())]
    MissingArtifact { algorithm: String, path: PathBuf },

    #[error("failed to read image size of {}: {source}", .path.display())]
    ImageSize {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Sweep candidates cannot be compared (kind or threshold grid differ).
    #[error("sweep mismatch: {0}")]
    SweepMismatch(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(":{n}"),
        None => String::new(),
    }
}

impl EvalError {
    pub(crate) fn parse(
        path: impl Into<PathBuf>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
