/// Error types shared by the codec, pipeline and converter
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::table::DataType;

/// Everything that can abort a conversion run.
#[derive(Debug, Error)]
pub enum SplatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on '{}': {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid pipeline config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid PLY data: {0}")]
    Ply(String),

    /// A format was recognised but its content breaks that format's rules.
    #[error("malformed input '{source_name}': {detail}")]
    MalformedInput { source_name: String, detail: String },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("column '{name}' has {actual} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{name}' is {actual:?}, expected {expected:?}")]
    DataTypeMismatch {
        name: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("row index {index} out of range for {num_rows} rows")]
    IndexOutOfRange { index: usize, num_rows: usize },

    #[error("indices are not a permutation of {0} rows")]
    NotAPermutation(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no data to write")]
    NoData,
}

pub type Result<T> = std::result::Result<T, SplatError>;

impl SplatError {
    pub fn malformed(source_name: &str, detail: impl Into<String>) -> Self {
        SplatError::MalformedInput {
            source_name: source_name.to_string(),
            detail: detail.into(),
        }
    }

    /// I/O failure tied to a file.
    pub fn file(path: &Path, source: std::io::Error) -> Self {
        SplatError::File {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Attaches the input file to a container error raised while reading it.
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            SplatError::Io(source) => SplatError::file(path, source),
            SplatError::Ply(detail) => SplatError::malformed(&path.display().to_string(), detail),
            other => other,
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        SplatError::InvalidConfig(detail.into())
    }
}
