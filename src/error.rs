//! Crate-wide error type.
//!
//! Framing and type-tag problems surface as [`EclError::Format`] and always
//! abort the read in progress.  Absence errors (`Index`, `Key`, `Lookup`) are
//! ordinary, recoverable outcomes of a query; see [`EclError::is_absent`].

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EclError>;

#[derive(Error, Debug)]
pub enum EclError {
    /// Malformed record framing, mismatched markers, unknown type tag or a
    /// payload that does not match its header.
    #[error("Format error at offset {offset}: {detail}")]
    Format { offset: u64, detail: String },

    #[error("Size mismatch: keyword {name} has {actual} elements, expected {expected}")]
    SizeMismatch { name: String, expected: usize, actual: usize },

    #[error("Index {index} out of range for length {len}")]
    Index { index: i64, len: usize },

    #[error("No keyword named {0:?}")]
    Key(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Cell ({i}, {j}, {k}) is inactive")]
    InactiveCell { i: usize, j: usize, k: usize },

    #[error("Invalid arguments: {0}")]
    Argument(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Invalid keyword name {0:?}")]
    InvalidName(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Stream is read-only")]
    ReadOnly,

    #[error("Stream has been closed")]
    StreamClosed,

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Index sidecar error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EclError {
    pub(crate) fn format(offset: u64, detail: impl Into<String>) -> Self {
        EclError::Format { offset, detail: detail.into() }
    }

    /// True for the "valid but absent" family: out-of-range positions,
    /// unknown names and unmatched restart queries.
    pub fn is_absent(&self) -> bool {
        matches!(self, EclError::Index { .. } | EclError::Key(_) | EclError::Lookup(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, EclError::Format { .. })
    }
}

/// Resolve a possibly negative position against `len`, Python style.
pub(crate) fn wrap_index(index: i64, len: usize) -> Result<usize> {
    let len_i = len as i64;
    let resolved = if index < 0 { index + len_i } else { index };
    if resolved < 0 || resolved >= len_i {
        return Err(EclError::Index { index, len });
    }
    Ok(resolved as usize)
}
