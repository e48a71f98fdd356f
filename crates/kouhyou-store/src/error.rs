use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    NotFound(PathBuf),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{path}: missing column `{column}`")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}: row {row}: {detail}")]
    Malformed {
        path: PathBuf,
        row: usize,
        detail: String,
    },

    #[error("cannot replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
