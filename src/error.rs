//! Unified error types for chatweave.
//!
//! The parsing and merge engine itself never fails: structurally unparseable
//! lines fold into the previous message, unparseable timestamps become
//! `None`, and unresolvable attachments are surfaced in the data model as
//! `missing`. Errors exist only at the I/O boundary — reading sources from
//! disk, resolving media bytes, and writing output.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for chatweave operations.
///
/// # Example
///
/// ```rust
/// use chatweave::error::Result;
/// use chatweave::merge::Conversation;
///
/// fn my_function() -> Result<Vec<Conversation>> {
///     // ... operations that may fail
///     Ok(vec![])
/// }
/// ```
pub type Result<T> = std::result::Result<T, ChatweaveError>;

/// The error type for all chatweave operations.
///
/// Each variant carries context about what went wrong and, where applicable,
/// the underlying source error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatweaveError {
    /// An I/O error occurred while reading sources or writing output.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error while writing the conversation model.
    #[cfg(feature = "json-output")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A media descriptor's content accessor failed to produce bytes.
    #[error("Failed to read media '{name}': {source}")]
    Media {
        /// Display name of the media file that failed to load
        name: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An import path is neither a text export nor a directory containing one.
    #[error("No chat exports found under {}", path.display())]
    NoExports {
        /// The path that was scanned
        path: PathBuf,
    },
}

impl ChatweaveError {
    /// Creates a media access error.
    pub fn media(name: impl Into<String>, source: io::Error) -> Self {
        ChatweaveError::Media {
            name: name.into(),
            source,
        }
    }

    /// Creates a no-exports error for a scanned path.
    pub fn no_exports(path: impl Into<PathBuf>) -> Self {
        ChatweaveError::NoExports { path: path.into() }
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, ChatweaveError::Io(_))
    }

    /// Returns `true` if this is a media access error.
    pub fn is_media(&self) -> bool {
        matches!(self, ChatweaveError::Media { .. })
    }
}
