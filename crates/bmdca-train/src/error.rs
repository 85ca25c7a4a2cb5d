use std::path::PathBuf;

use bmdca_core::ConfigError;
use bmdca_models::ModelError;

/// Errors that stop a training run.
///
/// Loss of coherence during reweighting and an exhausted step budget are
/// normal outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid initial sample {path}: {reason}")]
    InitialSample { path: PathBuf, reason: String },
}

impl TrainError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
