//! Error taxonomy for the session processing core.
//!
//! Kinds mirror the failure modes a caller needs to distinguish: which ones
//! are fatal for the session (status becomes `Failed`) and which are
//! recovered locally (a line is skipped, processing continues).

use thiserror::Error;

/// Errors produced while parsing, replaying, or processing a recording.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input was empty or otherwise not a readable recording at all.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The header's `version` field was present but not `3`.
    #[error("unsupported asciicast version: {0}")]
    InvalidVersion(u64),

    /// The header was missing both `term.cols`/`term.rows` and `width`/`height`.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A single NDJSON line failed to parse. Recovered by the reader: the
    /// line is skipped and a counter is incremented, but this variant is
    /// also what gets surfaced to a caller who wants to know *why*.
    #[error("malformed line {line_number}: {raw}")]
    MalformedLine {
        /// 1-based line number within the byte stream.
        line_number: usize,
        /// The raw (untrimmed) line content that failed to parse.
        raw: String,
    },

    /// The VT engine rejected an input it cannot recover from.
    #[error("VT engine failure: {0}")]
    VtFailure(String),

    /// The repository rejected a write.
    #[error("repository failure: {0}")]
    RepositoryFailure(String),

    /// The caller's cancel token was observed set at a suspension point.
    /// No partial results are published when this occurs.
    #[error("processing cancelled")]
    Cancelled,

    /// A JSON encoding/decoding step failed (snapshot serialization, config).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying I/O failure reading the byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// True for errors that are fatal to the whole session (as opposed to
    /// `MalformedLine`, which is recovered locally by the NDJSON reader).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CoreError::MalformedLine { .. })
    }
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, CoreError>;
