use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SplitError>;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("feature {index} has no property '{property}'")]
    MissingProperty { index: usize, property: String },

    #[error("could not serialize feature collection: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("feature collection failed to re-parse: {0}")]
    Consistency(String),

    #[error("group name '{name}' does not give a safe file name ('{stem}')")]
    UnsafeGroupName { name: String, stem: String },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
