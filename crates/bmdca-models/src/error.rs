use std::path::PathBuf;

use bmdca_core::ShapeError;

/// Errors raised while reading or writing model tensors and alignments.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    NpyWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("cannot read {path}: {source}")]
    NpyRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    /// Malformed text input, with the 1-based line number.
    #[error("{path}:{line}: {reason}")]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("category {value} out of range for alphabet size {q}")]
    CategoryOutOfRange { value: usize, q: usize },

    /// Sequence weights that cannot define frequencies.
    #[error("invalid sequence weights: {0}")]
    InvalidWeights(String),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl ModelError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn format(path: &std::path::Path, line: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}
