//! Patch authoring errors

use cfunc_resource::{DocumentError, ResourceIdentity};

/// Errors raised while authoring patches
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// List item lacks its key field
    #[error("item for '{path}' has no string value at key '{key}'")]
    MissingItemKey {
        /// List field path
        path: String,
        /// Key field
        key: String,
    },

    /// Path cannot hold a list
    #[error("invalid list path: '{0}'")]
    InvalidPath(String),

    /// Operation addressed to a different resource
    #[error("operation targets {found}, patch targets {expected}")]
    TargetMismatch {
        /// Patch target
        expected: ResourceIdentity,
        /// Operation target
        found: ResourceIdentity,
    },

    /// Same list declared with two different keys
    #[error("field '{path}' declared as {declared}, requested {requested}")]
    ConflictingStrategy {
        /// Field path
        path: String,
        /// Existing declaration
        declared: String,
        /// New declaration
        requested: String,
    },

    /// Underlying document error
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl PatchError {
    /// Create missing item key error
    #[inline]
    #[must_use]
    pub fn missing_item_key(path: impl ToString, key: impl Into<String>) -> Self {
        Self::MissingItemKey {
            path: path.to_string(),
            key: key.into(),
        }
    }
}
