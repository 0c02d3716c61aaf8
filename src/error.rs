//! Error types shared by every stage of the checker.
//!
//! Failures abort the query for the statement pair being processed; no
//! partially built relation is ever handed back to a caller. A barrier
//! without an originating statement is *not* an error and never shows up
//! here: the schedule walk simply skips it.

use thiserror::Error;

/// Which side of a statement pair a message refers to.
pub type PairRole = &'static str;

/// Errors produced while classifying inames, building schedules, or
/// composing statement-instance orderings.
#[derive(Error, Debug)]
pub enum CheckerError {
    /// A requested statement id never occurs in the linearization
    #[error("statement '{statement_id}' ({role}) does not appear in the linearization")]
    MissingStatement {
        statement_id: String,
        role: PairRole,
    },

    /// An iname carries hardware-axis tags that cannot hold at the same time
    #[error("invalid concurrency tag on iname '{iname}': {reason}")]
    InvalidConcurrencyTag { iname: String, reason: String },

    /// The kernel has no domain recorded for this statement
    #[error("no domain recorded for statement '{0}'")]
    MissingDomain(String),

    /// A loop entered around a statement is not a dimension of its domain
    #[error("iname '{iname}' encloses statement '{statement_id}' but is not in its domain")]
    UnknownIname {
        statement_id: String,
        iname: String,
    },

    /// An iname collides with the names the checker introduces
    #[error("iname '{0}' uses the reserved prefix '_lp_linchk_'")]
    ReservedName(String),

    /// Two relations could not be aligned by dimension name
    #[error("cannot align relation dimensions: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// isl rejected a set or map string
    #[error("failed to parse isl {kind} '{text}'")]
    IslParse { kind: &'static str, text: String },

    /// A line of a textual linearization could not be understood
    #[error("linearization line {line}: {message}")]
    LinearizationParse { line: usize, message: String },

    /// I/O error when reading kernel descriptions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed kernel description JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Allow CheckerError to be converted to String for callers that still
/// report errors as plain text
impl From<CheckerError> for String {
    fn from(err: CheckerError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, CheckerError>;
