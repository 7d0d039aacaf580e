//! # Chatweave
//!
//! A Rust library that turns exported chat-log text — the loosely structured
//! `.txt` files messaging apps produce, with locale-dependent date prefixes,
//! multi-line bodies, system notices, attachment markers, and reply
//! quotations — into a normalized, deduplicated, time-ordered conversation
//! model.
//!
//! The format has no fixed grammar; it is reverse-engineered from
//! real-world export variants. Correctness therefore rests on reproducible
//! heuristics: date-order voting, fuzzy attachment-to-media matching with a
//! least-used tie-break, and signature-based duplicate elimination across
//! repeated imports of the same chat.
//!
//! ## Quick Start
//!
//! ```rust
//! use chatweave::media::MediaIndex;
//! use chatweave::merge::merge_conversations;
//! use chatweave::parser::ParseSession;
//!
//! let text = "\
//! 1/2/2023, 9:00 AM - Alice: Hi
//! 1/2/2023, 9:01 AM - Bob: see you tomorrow";
//!
//! let session = ParseSession::new();
//! let mut media = MediaIndex::default();
//! let parsed = session.parse_source(text, "Alice", &mut media).unwrap();
//!
//! let conversations = merge_conversations(vec![parsed]);
//! assert_eq!(conversations[0].messages.len(), 2);
//! assert_eq!(conversations[0].participants.len(), 2);
//! ```
//!
//! ## Importing from disk
//!
//! The [`import`] module is the built-in filesystem collaborator: it
//! discovers `.txt` exports in a folder, scopes each source's media to the
//! files co-located with it, and wires lazy memoizing byte accessors.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use chatweave::import::import_path;
//! use chatweave::merge::merge_conversations;
//! use chatweave::parser::ParseSession;
//!
//! fn main() -> chatweave::Result<()> {
//!     let session = ParseSession::new();
//!     let parsed = import_path(&session, Path::new("exports/"))?;
//!     let conversations = merge_conversations(parsed);
//!     println!("{} conversation(s)", conversations.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`parser`] — parse session and hydration pipeline
//!   - [`ParseSession`](parser::ParseSession), [`ParsedConversation`](parser::ParsedConversation)
//! - [`merge`] — cross-import merging and deduplication
//!   - [`merge_conversations`](merge::merge_conversations), [`Conversation`](merge::Conversation)
//! - [`message`] — the normalized data model
//!   - [`Message`](message::Message), [`Attachment`](message::Attachment), [`MediaKind`](message::MediaKind)
//! - [`media`] — media descriptors, index, and attachment resolution
//!   - [`MediaIndex`](media::MediaIndex), [`ContentAccessor`](media::ContentAccessor)
//! - [`segment`], [`dates`], [`extract`], [`text`] — the pipeline stages
//! - [`import`] — filesystem collaborator
//! - [`config`] — [`ParseConfig`](config::ParseConfig)
//! - [`error`] — [`ChatweaveError`], [`Result`]

pub mod config;
pub mod dates;
pub mod error;
pub mod extract;
pub mod import;
pub mod media;
pub mod merge;
pub mod message;
pub mod parser;
pub mod segment;
pub mod text;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export the main types at the crate root for convenience
pub use error::{ChatweaveError, Result};
pub use message::Message;

/// Convenient re-exports for common usage.
///
/// Import everything you need with a single line:
///
/// ```rust
/// use chatweave::prelude::*;
/// ```
pub mod prelude {
    // Core message model
    pub use crate::message::{Attachment, MediaKind, Message, Participant, ReplyContext};

    // Error types
    pub use crate::error::{ChatweaveError, Result};

    // Parsing
    pub use crate::config::ParseConfig;
    pub use crate::parser::{ParseSession, ParsedConversation};

    // Merging
    pub use crate::merge::{merge_conversations, Conversation};

    // Media
    pub use crate::media::{ContentAccessor, MediaDescriptor, MediaIndex};

    // Filesystem import
    pub use crate::import::{import_dir, import_file, import_path};
}
