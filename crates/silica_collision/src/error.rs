//! Broadphase error types

use std::fmt;

/// Error returned by structural [`DynamicTree`](crate::DynamicTree) operations
///
/// Both variants mean the caller's view of which objects are tracked has
/// drifted from the tree's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// `insert` was called for an object the tree already tracks
    DuplicateInsertion,
    /// `remove` or `update` was called for an object the tree does not track
    NotFound,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::DuplicateInsertion => write!(f, "object is already tracked by the tree"),
            TreeError::NotFound => write!(f, "object is not tracked by the tree"),
        }
    }
}

impl std::error::Error for TreeError {}
