use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the core library.
///
/// Arithmetic degeneracies (NaN adjusted scores, empty candidate sets) are
/// not represented here — they are recovered in-band per the classifier spec
/// and never reach this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error reading/writing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?}:{line}: {detail}")]
    Format {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("expected {expected} fields, got {got} on line {line} of {path:?}")]
    Arity {
        path: PathBuf,
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
