//! The normalized message model.
//!
//! [`Message`] is the durable unit every parsed record hydrates into. It
//! keeps the original date/time text alongside the reconstructed timestamp
//! so display and duplicate detection still work when reconstruction fails,
//! and it carries a precomputed lowercase search index over every
//! user-visible field.
//!
//! # Ordering
//!
//! Each message carries a `sequence` number issued by its parse session.
//! The sequence is the only total order guaranteed when timestamps are
//! absent or equal; it is unique within a session and never changes after
//! creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::ContentAccessor;

/// Identity used for messages whose sender name normalizes to nothing.
pub const EMPTY_SENDER_KEY: &str = "__EMPTY__";

/// Display label for the empty-sender sentinel.
pub const EMPTY_SENDER_LABEL: &str = "Unnamed Sender";

/// Separator joining signature components; chosen for a negligible chance
/// of appearing in real message text (U+241F is SYMBOL FOR UNIT SEPARATOR).
const SIGNATURE_SEPARATOR: &str = "|\u{241F}|";

/// Classified kind of a media file or attachment.
///
/// `Missing` is never assigned to a physical media record; it marks an
/// "omitted" placeholder that could not be resolved to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (jpg, png, heic, bmp, plain webp)
    Image,
    /// Sticker (`stk-*.webp`)
    Sticker,
    /// Animated gif, by extension or `gif-` filename prefix
    Gif,
    /// Video file
    Video,
    /// Audio file, including voice notes
    Audio,
    /// Anything else, and named attachments that failed to resolve
    Document,
    /// Unresolved "omitted" placeholder
    Missing,
}

impl MediaKind {
    /// Lowercase label, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Sticker => "sticker",
            MediaKind::Gif => "gif",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Missing => "missing",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attachment declared by a message.
///
/// When resolution against the media index fails, `missing` is true, the
/// accessor is absent, and `kind` degrades to [`MediaKind::Document`] for a
/// named attachment or [`MediaKind::Missing`] for an unresolved "omitted"
/// placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Name shown to the user: the resolved file's basename, or the declared
    /// filename when resolution failed
    pub display_name: String,
    /// Classified media kind
    pub kind: MediaKind,
    /// Resolved or guessed MIME type; empty for unresolved placeholders
    pub mime_type: String,
    /// Normalized filename key; `"omitted"` for placeholders
    pub lookup_key: String,
    /// Capability to load the bytes; `None` when resolution failed
    #[serde(skip)]
    pub accessor: Option<ContentAccessor>,
    /// True when no media record matched
    pub missing: bool,
}

impl Attachment {
    /// Builds the unresolved placeholder attachment for an "omitted" marker.
    pub fn omitted_placeholder() -> Self {
        Self {
            display_name: "Media omitted".to_string(),
            kind: MediaKind::Missing,
            mime_type: String::new(),
            lookup_key: "omitted".to_string(),
            accessor: None,
            missing: true,
        }
    }
}

/// Reply quotation extracted from a message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContext {
    /// Who the reply targets, as written in the quotation header
    pub target_name: String,
    /// The quoted line with surrounding quote marks stripped; may be empty
    pub quoted_text: String,
}

/// One non-system sender of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Normalized sender key (possibly the empty-sender sentinel)
    pub key: String,
    /// Display label
    pub label: String,
    /// Number of non-system messages sent
    pub count: usize,
}

/// A fully hydrated chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Session-wide monotonically increasing number assigned at hydration
    pub sequence: u64,
    /// Reconstructed instant; `None` when the date/time text failed to parse
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Date field exactly as written, kept for display fallback and the
    /// duplicate signature
    pub raw_date: String,
    /// Time field exactly as written
    pub raw_time: String,
    /// Normalized sender identity; the empty-sender sentinel when the name
    /// was blank, empty for system messages
    pub sender_key: String,
    /// Display label derived from the sender key
    pub sender: String,
    /// True when no `": "` separator was found or the candidate name failed
    /// the length sanity bound
    pub is_system: bool,
    /// Body with attachment declarations and reply quotations removed
    pub text: String,
    /// Declared attachment, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub attachment: Option<Attachment>,
    /// Reply quotation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub reply_context: Option<ReplyContext>,
    /// Precomputed lowercase concatenation of all searchable fields
    pub search_index: String,
}

impl Message {
    /// Composite key used to detect exact-duplicate messages across merges.
    ///
    /// Two genuinely distinct messages with the same sender, trimmed text,
    /// timestamp state, attachment key, and system flag produce the same
    /// signature and collapse into one at merge time. Inherited behavior;
    /// changing the key needs a requirements decision.
    pub fn signature(&self) -> String {
        let timestamp_part = self
            .timestamp
            .map_or_else(|| self.raw_date.clone(), |ts| ts.timestamp_millis().to_string());
        let attachment_part = self.attachment.as_ref().map_or("", |a| {
            if a.lookup_key.is_empty() {
                a.display_name.as_str()
            } else {
                a.lookup_key.as_str()
            }
        });

        [
            timestamp_part.as_str(),
            self.raw_time.as_str(),
            self.sender_key.as_str(),
            self.text.trim(),
            attachment_part,
            if self.is_system { "1" } else { "0" },
        ]
        .join(SIGNATURE_SEPARATOR)
    }

    /// Returns `true` if this message's text is empty or whitespace-only.
    pub fn is_empty_text(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Builds the lowercase search index over every searchable field.
pub(crate) fn build_search_index(
    sender: &str,
    text: &str,
    raw_date: &str,
    raw_time: &str,
    attachment_label: &str,
    reply_target: &str,
    reply_quote: &str,
) -> String {
    [
        sender,
        text,
        raw_date,
        raw_time,
        attachment_label,
        reply_target,
        reply_quote,
    ]
    .join(" ")
    .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(sequence: u64) -> Message {
        Message {
            sequence,
            timestamp: None,
            raw_date: "1/2/2023".to_string(),
            raw_time: "9:00 AM".to_string(),
            sender_key: "Alice".to_string(),
            sender: "Alice".to_string(),
            is_system: false,
            text: "hello".to_string(),
            attachment: None,
            reply_context: None,
            search_index: String::new(),
        }
    }

    #[test]
    fn test_signature_ignores_sequence() {
        let a = message(1);
        let b = message(2);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_uses_timestamp_when_present() {
        let mut a = message(1);
        let mut b = message(1);
        a.timestamp = Some(Utc.with_ymd_and_hms(2023, 2, 1, 9, 0, 0).unwrap());
        b.timestamp = Some(Utc.with_ymd_and_hms(2023, 2, 1, 9, 0, 1).unwrap());
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_falls_back_to_raw_date() {
        let mut a = message(1);
        let mut b = message(1);
        a.raw_date = "1/2/2023".to_string();
        b.raw_date = "2/2/2023".to_string();
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_trims_text() {
        let mut a = message(1);
        let mut b = message(1);
        a.text = "hello".to_string();
        b.text = "  hello  ".to_string();
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_distinguishes_system_flag() {
        let mut a = message(1);
        let mut b = message(1);
        b.is_system = true;
        b.sender_key = String::new();
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_prefers_attachment_lookup_key() {
        let mut a = message(1);
        a.attachment = Some(Attachment {
            display_name: "IMG-0001.jpg".to_string(),
            kind: MediaKind::Image,
            mime_type: "image/jpeg".to_string(),
            lookup_key: "img-0001.jpg".to_string(),
            accessor: None,
            missing: false,
        });
        assert!(a.signature().contains("img-0001.jpg"));
    }

    #[test]
    fn test_omitted_placeholder_shape() {
        let att = Attachment::omitted_placeholder();
        assert!(att.missing);
        assert_eq!(att.kind, MediaKind::Missing);
        assert_eq!(att.lookup_key, "omitted");
        assert!(att.accessor.is_none());
    }

    #[test]
    fn test_search_index_lowercases_everything() {
        let index = build_search_index("Alice", "Hello World", "1/2/2023", "9:00 AM", "IMG.jpg", "", "");
        assert!(index.contains("alice"));
        assert!(index.contains("hello world"));
        assert!(index.contains("img.jpg"));
        assert!(!index.contains("Alice"));
    }

    #[test]
    fn test_serialization_skips_none_fields() {
        let msg = message(1);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("timestamp"));
        assert!(!json.contains("attachment"));
        assert!(json.contains("Alice"));
    }

    #[test]
    fn test_media_kind_labels() {
        assert_eq!(MediaKind::Image.as_str(), "image");
        assert_eq!(MediaKind::Missing.to_string(), "missing");
        assert_eq!(serde_json::to_string(&MediaKind::Gif).unwrap(), "\"gif\"");
    }
}
