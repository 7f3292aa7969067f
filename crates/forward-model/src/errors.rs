use std::path::PathBuf;

/// Validation and io tier errors for the external text-file formats (spec
/// §6): observation files, image files, and STM forward-model descriptors.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse { path: PathBuf, line: usize, message: String },

    #[error(
        "forward model returned {got} response values but observation carries {expected}"
    )]
    ResponseLengthMismatch { expected: usize, got: usize },

    #[error("unknown direction id {0}, expected 0 (x), 1 (y), or 2 (z)")]
    UnknownDirection(i64),

    #[error("unknown hierarchical noise model tag '{0}'")]
    UnknownNoiseModel(String),

    #[error("section '{0}' missing from STM descriptor")]
    MissingSection(&'static str),
}

pub type Result<T> = std::result::Result<T, FormatError>;
