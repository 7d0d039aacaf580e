//! The parse session and message hydration pipeline.
//!
//! [`ParseSession`] owns the sequence counter and configuration for one run.
//! [`parse_source`](ParseSession::parse_source) takes one source's full text
//! plus its media index and produces a [`ParsedConversation`]: segmentation,
//! date-order inference, then per-record hydration (sender classification,
//! attachment extraction, reply extraction, timestamp reconstruction).
//!
//! The pipeline is a pure, synchronous transformation — the same text and
//! media set yield byte-identical messages given the same starting sequence.
//! Sources may be parsed concurrently from one session; the atomic counter
//! keeps sequence numbers unique, and the merge step makes batch ordering
//! irrelevant to the final result.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ParseConfig;
use crate::dates::{infer_date_order, parse_timestamp, DateOrder};
use crate::extract::{extract_attachment, extract_reply, split_sender, AttachmentDeclaration};
use crate::media::{normalize_file_key, MediaIndex, ResolvedMedia};
use crate::message::{
    build_search_index, Attachment, MediaKind, Message, EMPTY_SENDER_KEY, EMPTY_SENDER_LABEL,
};
use crate::segment::{segment, RawRecord};
use crate::text::strip_bom;

/// One source's parsed output, before merging.
#[derive(Debug, Clone)]
pub struct ParsedConversation {
    /// Normalized title key shared by all imports of the same chat
    pub identity_key: String,
    /// Title as supplied by the import layer
    pub title: String,
    /// Hydrated messages in source order
    pub messages: Vec<Message>,
}

/// Lowercases, trims, and collapses internal whitespace of a title into the
/// conversation identity key.
pub fn normalize_identity_key(title: &str) -> String {
    crate::text::collapse_whitespace(&title.to_lowercase())
}

/// A parse run: configuration plus the session-owned sequence counter.
///
/// The counter is the authoritative tie-break for message ordering, so it is
/// issued atomically and never reused — a session is safe to share across
/// threads hydrating independent sources.
///
/// # Example
///
/// ```
/// use chatweave::media::MediaIndex;
/// use chatweave::parser::ParseSession;
///
/// let session = ParseSession::new();
/// let mut media = MediaIndex::default();
/// let parsed = session
///     .parse_source("1/2/2023, 9:00 AM - Alice: Hi", "Alice", &mut media)
///     .unwrap();
/// assert_eq!(parsed.messages.len(), 1);
/// assert_eq!(parsed.messages[0].sender, "Alice");
/// ```
#[derive(Debug, Default)]
pub struct ParseSession {
    config: ParseConfig,
    next_sequence: AtomicU64,
}

impl ParseSession {
    /// Creates a session with default configuration, counting from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with custom configuration.
    pub fn with_config(config: ParseConfig) -> Self {
        Self {
            config,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Sets the starting sequence number (for deterministic tests and for
    /// continuing a numbering scheme across sessions).
    #[must_use]
    pub fn starting_at(self, sequence: u64) -> Self {
        self.next_sequence.store(sequence, Ordering::SeqCst);
        self
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// The next sequence number that would be issued.
    pub fn peek_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    fn issue_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Parses one source's full text into a conversation.
    ///
    /// Returns `None` when segmentation finds no message starts — the source
    /// yields no conversation, and the batch continues. Nothing in here is
    /// fatal: unparseable timestamps become `None`, unresolvable attachments
    /// are marked missing.
    pub fn parse_source(
        &self,
        text: &str,
        title: &str,
        media: &mut MediaIndex,
    ) -> Option<ParsedConversation> {
        let records = segment(strip_bom(text));
        if records.is_empty() {
            return None;
        }

        let date_order = infer_date_order(&records);
        let messages = records
            .iter()
            .map(|record| self.hydrate(record, date_order, media))
            .collect();

        Some(ParsedConversation {
            identity_key: normalize_identity_key(title),
            title: title.to_string(),
            messages,
        })
    }

    /// Hydrates one raw record into a [`Message`].
    fn hydrate(&self, record: &RawRecord, date_order: DateOrder, media: &mut MediaIndex) -> Message {
        let split = split_sender(&record.body);
        let timestamp = parse_timestamp(&record.raw_date, &record.raw_time, date_order);

        let scan = extract_attachment(&split.text);
        let reply = extract_reply(&scan.remaining_text);
        let text = reply
            .as_ref()
            .map_or(scan.remaining_text.clone(), |r| r.body_text.clone());

        let attachment = scan.declaration.map(|declaration| match declaration {
            AttachmentDeclaration::File { name } => match media.resolve(&name) {
                Some(resolved) => resolved_attachment(resolved),
                None => Attachment {
                    lookup_key: normalize_file_key(&name),
                    display_name: name,
                    kind: MediaKind::Document,
                    mime_type: "application/octet-stream".to_string(),
                    accessor: None,
                    missing: true,
                },
            },
            AttachmentDeclaration::Omitted { kind } => {
                if self.config.infer_omitted_media {
                    media
                        .resolve_omitted(kind)
                        .map_or_else(Attachment::omitted_placeholder, resolved_attachment)
                } else {
                    Attachment::omitted_placeholder()
                }
            }
        });

        let (sender_key, sender) = if split.is_system {
            (String::new(), String::new())
        } else if split.sender.is_empty() {
            (EMPTY_SENDER_KEY.to_string(), EMPTY_SENDER_LABEL.to_string())
        } else {
            (split.sender.clone(), split.sender.clone())
        };

        let reply_context = reply.map(|r| r.context);
        let search_index = build_search_index(
            &sender,
            &text,
            &record.raw_date,
            &record.raw_time,
            attachment.as_ref().map_or("", |a| &a.display_name),
            reply_context.as_ref().map_or("", |r| &r.target_name),
            reply_context.as_ref().map_or("", |r| &r.quoted_text),
        );

        Message {
            sequence: self.issue_sequence(),
            timestamp,
            raw_date: record.raw_date.clone(),
            raw_time: record.raw_time.clone(),
            sender_key,
            sender,
            is_system: split.is_system,
            text,
            attachment,
            reply_context,
            search_index,
        }
    }
}

/// Converts a resolved media record into a non-missing attachment.
fn resolved_attachment(resolved: ResolvedMedia) -> Attachment {
    Attachment {
        display_name: resolved.display_name,
        kind: resolved.kind,
        mime_type: resolved.mime_type,
        lookup_key: resolved.lookup_key,
        accessor: Some(resolved.accessor),
        missing: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ContentAccessor, MediaDescriptor};
    use chrono::Timelike;

    fn index(paths: &[&str]) -> MediaIndex {
        MediaIndex::build(
            paths
                .iter()
                .map(|path| MediaDescriptor::new(*path, ContentAccessor::from_bytes(vec![]))),
        )
    }

    #[test]
    fn test_empty_source_yields_none() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        assert!(session.parse_source("", "Chat", &mut media).is_none());
        assert!(session
            .parse_source("no date prefix anywhere", "Chat", &mut media)
            .is_none());
    }

    #[test]
    fn test_sequences_are_unique_and_monotonic() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let text = "1/2/2023, 9:00 AM - Alice: one\n1/2/2023, 9:01 AM - Bob: two";

        let first = session.parse_source(text, "Chat", &mut media).unwrap();
        let second = session.parse_source(text, "Chat", &mut media).unwrap();

        assert_eq!(first.messages[0].sequence, 0);
        assert_eq!(first.messages[1].sequence, 1);
        assert_eq!(second.messages[0].sequence, 2);
        assert_eq!(session.peek_sequence(), 4);
    }

    #[test]
    fn test_starting_sequence() {
        let session = ParseSession::new().starting_at(100);
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source("1/2/2023, 9:00 AM - Alice: Hi", "Chat", &mut media)
            .unwrap();
        assert_eq!(parsed.messages[0].sequence, 100);
    }

    #[test]
    fn test_bom_stripped_before_segmentation() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source("\u{FEFF}1/2/2023, 9:00 AM - Alice: Hi", "Chat", &mut media)
            .unwrap();
        assert_eq!(parsed.messages.len(), 1);
    }

    #[test]
    fn test_system_message_classification() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source(
                "1/2/2023, 9:00 AM - Messages are end-to-end encrypted",
                "Chat",
                &mut media,
            )
            .unwrap();

        let message = &parsed.messages[0];
        assert!(message.is_system);
        assert!(message.sender.is_empty());
        assert!(message.sender_key.is_empty());
        assert_eq!(message.text, "Messages are end-to-end encrypted");
    }

    #[test]
    fn test_blank_sender_gets_sentinel() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source("1/2/2023, 9:00 AM - \u{200E}: hello", "Chat", &mut media)
            .unwrap();

        let message = &parsed.messages[0];
        assert!(!message.is_system);
        assert_eq!(message.sender_key, EMPTY_SENDER_KEY);
        assert_eq!(message.sender, EMPTY_SENDER_LABEL);
    }

    #[test]
    fn test_attachment_resolved_from_index() {
        let session = ParseSession::new();
        let mut media = index(&["media/clip.mp4"]);
        let parsed = session
            .parse_source(
                "1/2/2023, 9:01 AM - Bob: <attached: clip.mp4>",
                "Chat",
                &mut media,
            )
            .unwrap();

        let attachment = parsed.messages[0].attachment.as_ref().unwrap();
        assert!(!attachment.missing);
        assert_eq!(attachment.kind, MediaKind::Video);
        assert_eq!(attachment.display_name, "clip.mp4");
        assert!(attachment.accessor.is_some());
        assert_eq!(parsed.messages[0].text, "");
    }

    #[test]
    fn test_unresolved_named_attachment_degrades_to_document() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source(
                "1/2/2023, 9:01 AM - Bob: lost.png (file attached)\ncaption",
                "Chat",
                &mut media,
            )
            .unwrap();

        let attachment = parsed.messages[0].attachment.as_ref().unwrap();
        assert!(attachment.missing);
        assert_eq!(attachment.kind, MediaKind::Document);
        assert_eq!(attachment.display_name, "lost.png");
        assert_eq!(attachment.lookup_key, "lost.png");
        assert!(attachment.accessor.is_none());
        assert_eq!(parsed.messages[0].text, "caption");
    }

    #[test]
    fn test_omitted_placeholder_stays_missing_by_default() {
        let session = ParseSession::new();
        let mut media = index(&["photo.jpg"]);
        let parsed = session
            .parse_source("1/2/2023, 9:01 AM - Bob: <image omitted>", "Chat", &mut media)
            .unwrap();

        let attachment = parsed.messages[0].attachment.as_ref().unwrap();
        assert!(attachment.missing);
        assert_eq!(attachment.kind, MediaKind::Missing);
        assert_eq!(attachment.display_name, "Media omitted");
    }

    #[test]
    fn test_omitted_inference_when_enabled() {
        let session =
            ParseSession::with_config(ParseConfig::new().with_infer_omitted_media(true));
        let mut media = index(&["photo.jpg"]);
        let parsed = session
            .parse_source("1/2/2023, 9:01 AM - Bob: <image omitted>", "Chat", &mut media)
            .unwrap();

        let attachment = parsed.messages[0].attachment.as_ref().unwrap();
        assert!(!attachment.missing);
        assert_eq!(attachment.display_name, "photo.jpg");
        assert_eq!(attachment.kind, MediaKind::Image);
    }

    #[test]
    fn test_reply_context_extracted_after_attachment() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source(
                "1/2/2023, 9:02 AM - Bob: You replied to Alice\n\"the plan\"\nworks for me",
                "Chat",
                &mut media,
            )
            .unwrap();

        let message = &parsed.messages[0];
        let reply = message.reply_context.as_ref().unwrap();
        assert_eq!(reply.target_name, "Alice");
        assert_eq!(reply.quoted_text, "the plan");
        assert_eq!(message.text, "works for me");
        assert!(message.search_index.contains("alice"));
        assert!(message.search_index.contains("the plan"));
    }

    #[test]
    fn test_unparseable_time_keeps_message() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source("1/2/2023, blah - Alice: Hi", "Chat", &mut media)
            .unwrap();

        let message = &parsed.messages[0];
        assert!(message.timestamp.is_none());
        assert_eq!(message.raw_time, "blah");
        assert_eq!(message.text, "Hi");
    }

    #[test]
    fn test_date_order_applied_per_source() {
        let session = ParseSession::new();
        let mut media = MediaIndex::default();
        let parsed = session
            .parse_source(
                "01/13/2024, 9:00 AM - A: x\n01/14/2024, 9:00 AM - A: y",
                "Chat",
                &mut media,
            )
            .unwrap();
        // Month-first inferred, so hour parses and the 13th is a day.
        let ts = parsed.messages[0].timestamp.unwrap();
        assert_eq!(ts.hour(), 9);
        use chrono::Datelike;
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.day(), 13);
    }

    #[test]
    fn test_identity_key_normalization() {
        assert_eq!(normalize_identity_key("  Family   Group "), "family group");
        assert_eq!(normalize_identity_key("ALICE"), "alice");
    }
}
