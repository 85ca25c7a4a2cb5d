use std::path::PathBuf;

/// Fatal configuration errors. Any of these aborts a run before sampling starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML.
    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A key in the `[bmDCA]` table has no registered setter.
    #[error("unknown parameter '{0}'")]
    UnknownKey(String),

    /// A value has the wrong type for its key.
    #[error("invalid value for '{key}': expected {expected}, got {value}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },

    /// A value parsed but violates a range constraint.
    #[error("'{key}' out of range: {reason}")]
    OutOfRange { key: &'static str, reason: String },

    /// The effective configuration could not be written back out.
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A tensor handed to a constructor does not match the run's dimensions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{what}: expected shape {expected:?}, got {found:?}")]
pub struct ShapeError {
    pub what: &'static str,
    pub expected: Vec<usize>,
    pub found: Vec<usize>,
}
