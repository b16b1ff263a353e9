//! Error types for codefix-edit.
//!
//! Every variant describes an edit set that cannot be applied to the text it
//! targets. None of them are I/O failures: edits operate on in-memory snapshots.

use codefix_types::{Span, UnitId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// The span ends past the end of the text, or starts after it ends.
    #[error("span {span} out of bounds for text of {len} bytes")]
    OutOfBounds { span: Span, len: usize },

    /// A span boundary falls inside a multi-byte character.
    #[error("offset {offset} is not on a char boundary")]
    NotCharBoundary { offset: usize },

    /// Two edits in one set touch the same bytes.
    #[error("edits {first} and {second} overlap")]
    Overlapping { first: Span, second: Span },

    /// The target unit is not part of the snapshot.
    #[error("unit {0} not found in snapshot")]
    UnknownUnit(UnitId),
}

/// Result type alias using EditError.
pub type EditResult<T> = Result<T, EditError>;
