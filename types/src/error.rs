//! Failure classes shared by every component error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse cause of a failed operation.
///
/// Each crate has its own error enum with one variant per concrete cause;
/// `kind()` on those enums maps the variant into this taxonomy so callers
/// can branch without matching every component's variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unknown task, dispute, entry, session or node id.
    NotFound,
    /// Wrong status, insufficient evidence or votes, quota or reputation
    /// below threshold, window closed.
    Precondition,
    /// Caller is not the recorded participant or signer.
    Unauthorized,
    /// Re-registration, double vote, second dispute for a task.
    Duplicate,
    /// Hash or signature mismatch.
    Integrity,
    /// Durable storage or serialization failure.
    Storage,
}

impl ErrorKind {
    /// Expected, recoverable control flow (a late bid, a double vote).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::Precondition | ErrorKind::Duplicate)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Storage => "storage",
        };
        f.write_str(s)
    }
}
