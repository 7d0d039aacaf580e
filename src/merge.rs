//! Cross-import conversation merging and duplicate elimination.
//!
//! People re-export the same chat repeatedly — after new messages arrive,
//! from another device, or with and without media. Imports of the same chat
//! are recognized by normalized title, their message sequences concatenated,
//! exact duplicates dropped by signature, and a canonical order established.
//!
//! The merge is associative and commutative over message sets: signature
//! dedup plus the full resort make the ordering of input batches irrelevant
//! to the final result, so batches may be parsed and merged in any order —
//! including re-merging previously merged [`Conversation`]s with fresh
//! imports.

use std::collections::{HashMap, HashSet};
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Participant, EMPTY_SENDER_KEY, EMPTY_SENDER_LABEL};
use crate::parser::{normalize_identity_key, ParsedConversation};
use crate::text::collapse_whitespace;

/// A merged, deduplicated, canonically ordered conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Identity key (normalized title)
    pub id: String,
    /// Title of the first import seen for this identity
    pub title: String,
    /// Deduplicated messages in canonical order
    pub messages: Vec<Message>,
    /// Non-system senders, ordered by descending message count then label
    pub participants: Vec<Participant>,
    /// Suggested "self" sender: the empty-sender sentinel when present,
    /// else the most prolific participant, else empty
    pub default_self_sender_key: String,
    /// Timestamp of the final message, when it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Sequence of the final message
    pub last_sequence: u64,
    /// One-line summary of the final message
    pub preview: String,
}

impl From<Conversation> for ParsedConversation {
    /// Feeds a previously merged conversation back into a merge.
    fn from(conversation: Conversation) -> Self {
        ParsedConversation {
            identity_key: conversation.id,
            title: conversation.title,
            messages: conversation.messages,
        }
    }
}

/// Canonical message order: timestamp when both sides have a distinct one,
/// otherwise parse sequence. Sequence keeps the sort total when timestamps
/// are absent or collide.
fn compare_messages(a: &Message, b: &Message) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(ts_a), Some(ts_b)) if ts_a != ts_b => ts_a.cmp(&ts_b),
        _ => a.sequence.cmp(&b.sequence),
    }
}

/// Conversation list order: most recent activity first.
fn compare_conversations(a: &Conversation, b: &Conversation) -> Ordering {
    match b.last_timestamp.cmp(&a.last_timestamp) {
        Ordering::Equal => b.last_sequence.cmp(&a.last_sequence),
        unequal => unequal,
    }
}

/// Builds the preview line for a conversation's final message.
fn build_preview(last_message: &Message) -> String {
    if let Some(attachment) = &last_message.attachment {
        return format!("Attachment: {}", attachment.display_name);
    }
    let collapsed = collapse_whitespace(&last_message.text);
    if collapsed.is_empty() {
        "(empty)".to_string()
    } else {
        collapsed
    }
}

/// Counts non-system messages per sender, in first-seen order, then sorts
/// by descending count and label.
fn collect_participants(messages: &[Message]) -> Vec<Participant> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut participants: Vec<Participant> = Vec::new();

    for message in messages {
        if message.is_system {
            continue;
        }
        let key = if message.sender_key.is_empty() {
            EMPTY_SENDER_KEY
        } else {
            message.sender_key.as_str()
        };

        if let Some(&slot) = by_key.get(key) {
            participants[slot].count += 1;
        } else {
            let label = if key == EMPTY_SENDER_KEY {
                EMPTY_SENDER_LABEL.to_string()
            } else {
                message.sender.clone()
            };
            by_key.insert(key.to_string(), participants.len());
            participants.push(Participant {
                key: key.to_string(),
                label,
                count: 1,
            });
        }
    }

    participants.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    participants
}

/// Prefers the empty-sender sentinel (exports usually leave the export
/// owner's own name blank), else the most prolific participant.
fn pick_default_self_sender(participants: &[Participant]) -> String {
    if participants.is_empty() {
        return String::new();
    }
    if participants.iter().any(|p| p.key == EMPTY_SENDER_KEY) {
        return EMPTY_SENDER_KEY.to_string();
    }
    participants[0].key.clone()
}

/// Dedupes, orders, and summarizes one identity group.
///
/// Returns `None` when every message was a duplicate of one already seen —
/// the group is dropped entirely.
fn finalize(id: String, title: String, messages: Vec<Message>) -> Option<Conversation> {
    let mut seen_signatures = HashSet::new();
    let mut deduped: Vec<Message> = messages
        .into_iter()
        .filter(|message| seen_signatures.insert(message.signature()))
        .collect();

    deduped.sort_by(compare_messages);
    let last_message = deduped.last()?;

    let participants = collect_participants(&deduped);
    let default_self_sender_key = pick_default_self_sender(&participants);
    let last_timestamp = last_message.timestamp;
    let last_sequence = last_message.sequence;
    let preview = build_preview(last_message);

    Some(Conversation {
        id,
        title,
        messages: deduped,
        participants,
        default_self_sender_key,
        last_timestamp,
        last_sequence,
        preview,
    })
}

/// Merges parsed conversations (and/or previously merged conversations)
/// into the final conversation list.
///
/// Conversations sharing a normalized title are combined; exact-duplicate
/// messages are dropped by first-seen signature; each survivor group is
/// canonically ordered and summarized. Groups that dedupe to nothing are
/// omitted. The result is sorted by last activity, most recent first.
///
/// # Example
///
/// ```
/// use chatweave::media::MediaIndex;
/// use chatweave::merge::merge_conversations;
/// use chatweave::parser::ParseSession;
///
/// let session = ParseSession::new();
/// let mut media = MediaIndex::default();
/// let text = "1/2/2023, 9:00 AM - Alice: Hi";
/// let once = session.parse_source(text, "Alice", &mut media).unwrap();
/// let twice = session.parse_source(text, "Alice", &mut media).unwrap();
///
/// // The same export supplied twice merges to a single message.
/// let merged = merge_conversations(vec![once, twice]);
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].messages.len(), 1);
/// ```
pub fn merge_conversations(
    conversations: impl IntoIterator<Item = ParsedConversation>,
) -> Vec<Conversation> {
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, String, Vec<Message>)> = Vec::new();

    for conversation in conversations {
        if conversation.messages.is_empty() {
            continue;
        }

        let key = normalize_identity_key(&conversation.title);
        match group_index.get(&key) {
            Some(&slot) => groups[slot].2.extend(conversation.messages),
            None => {
                group_index.insert(key.clone(), groups.len());
                groups.push((key, conversation.title, conversation.messages));
            }
        }
    }

    let mut merged: Vec<Conversation> = groups
        .into_iter()
        .filter_map(|(id, title, messages)| finalize(id, title, messages))
        .collect();

    merged.sort_by(compare_conversations);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(sequence: u64, sender: &str, text: &str) -> Message {
        Message {
            sequence,
            timestamp: None,
            raw_date: "1/2/2023".to_string(),
            raw_time: "9:00 AM".to_string(),
            sender_key: sender.to_string(),
            sender: sender.to_string(),
            is_system: false,
            text: text.to_string(),
            attachment: None,
            reply_context: None,
            search_index: String::new(),
        }
    }

    fn timestamped(mut msg: Message, hour: u32, minute: u32) -> Message {
        msg.timestamp = Some(Utc.with_ymd_and_hms(2023, 2, 1, hour, minute, 0).unwrap());
        msg
    }

    fn parsed(title: &str, messages: Vec<Message>) -> ParsedConversation {
        ParsedConversation {
            identity_key: normalize_identity_key(title),
            title: title.to_string(),
            messages,
        }
    }

    #[test]
    fn test_titles_merge_case_insensitively() {
        let merged = merge_conversations(vec![
            parsed("Family  Group", vec![message(0, "Alice", "one")]),
            parsed("family group", vec![message(1, "Bob", "two")]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Family  Group");
        assert_eq!(merged[0].id, "family group");
        assert_eq!(merged[0].messages.len(), 2);
    }

    #[test]
    fn test_exact_duplicates_removed() {
        // Same raw date/time, sender, text: one survivor, first occurrence.
        // The differing sequence does not enter the signature.
        let merged = merge_conversations(vec![
            parsed("Chat", vec![message(0, "Alice", "hello")]),
            parsed("Chat", vec![message(1, "Alice", "hello")]),
        ]);
        assert_eq!(merged[0].messages.len(), 1);
        assert_eq!(merged[0].messages[0].sequence, 0);

        let merged = merge_conversations(vec![parsed(
            "Chat",
            vec![message(0, "Alice", "hello"), message(1, "Alice", "bye")],
        )]);
        assert_eq!(merged[0].messages.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let conversation = parsed(
            "Chat",
            vec![message(0, "Alice", "one"), message(1, "Bob", "two")],
        );

        let once = merge_conversations(vec![conversation.clone()]);
        let twice = merge_conversations(vec![conversation.clone(), conversation]);

        assert_eq!(once[0].messages.len(), twice[0].messages.len());
        let sigs_once: Vec<_> = once[0].messages.iter().map(Message::signature).collect();
        let sigs_twice: Vec<_> = twice[0].messages.iter().map(Message::signature).collect();
        assert_eq!(sigs_once, sigs_twice);
    }

    #[test]
    fn test_remerge_of_merged_output() {
        let first = merge_conversations(vec![parsed("Chat", vec![message(0, "Alice", "one")])]);
        let update = parsed("CHAT", vec![message(5, "Bob", "late addition")]);

        let combined = merge_conversations(
            first
                .into_iter()
                .map(ParsedConversation::from)
                .chain([update]),
        );
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].messages.len(), 2);
    }

    #[test]
    fn test_timestamp_order_wins_over_sequence() {
        let late = timestamped(message(0, "Alice", "late"), 12, 0);
        let early = timestamped(message(1, "Bob", "early"), 9, 0);
        let merged = merge_conversations(vec![parsed("Chat", vec![late, early])]);

        assert_eq!(merged[0].messages[0].text, "early");
        assert_eq!(merged[0].messages[1].text, "late");
    }

    #[test]
    fn test_null_and_equal_timestamps_fall_back_to_sequence() {
        let a = message(3, "Alice", "third");
        let b = message(1, "Bob", "first");
        let merged = merge_conversations(vec![parsed("Chat", vec![a, b])]);
        assert_eq!(merged[0].messages[0].text, "first");

        let same_ts_a = timestamped(message(7, "Alice", "a"), 9, 0);
        let same_ts_b = timestamped(message(4, "Bob", "b"), 9, 0);
        let merged = merge_conversations(vec![parsed("Chat", vec![same_ts_a, same_ts_b])]);
        assert_eq!(merged[0].messages[0].text, "b");
    }

    #[test]
    fn test_participants_counted_and_ordered() {
        let merged = merge_conversations(vec![parsed(
            "Chat",
            vec![
                message(0, "Alice", "1"),
                message(1, "Bob", "2"),
                message(2, "Bob", "3"),
                {
                    let mut sys = message(3, "", "Alice added Bob");
                    sys.is_system = true;
                    sys.sender_key = String::new();
                    sys.sender = String::new();
                    sys
                },
            ],
        )]);

        let participants = &merged[0].participants;
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].key, "Bob");
        assert_eq!(participants[0].count, 2);
        assert_eq!(participants[1].key, "Alice");
        assert_eq!(participants[1].count, 1);
        assert_eq!(merged[0].default_self_sender_key, "Bob");
    }

    #[test]
    fn test_empty_sender_sentinel_preferred_as_self() {
        let mut own = message(0, EMPTY_SENDER_KEY, "mine");
        own.sender = EMPTY_SENDER_LABEL.to_string();
        let merged = merge_conversations(vec![parsed(
            "Chat",
            vec![own, message(1, "Bob", "2"), message(2, "Bob", "3")],
        )]);

        assert_eq!(merged[0].default_self_sender_key, EMPTY_SENDER_KEY);
        let unnamed = merged[0]
            .participants
            .iter()
            .find(|p| p.key == EMPTY_SENDER_KEY)
            .unwrap();
        assert_eq!(unnamed.label, EMPTY_SENDER_LABEL);
    }

    #[test]
    fn test_preview_variants() {
        let merged = merge_conversations(vec![parsed(
            "Chat",
            vec![message(0, "Alice", "  hello\n  world  ")],
        )]);
        assert_eq!(merged[0].preview, "hello world");

        let mut with_attachment = message(0, "Alice", "");
        with_attachment.attachment = Some(crate::message::Attachment {
            display_name: "clip.mp4".to_string(),
            kind: crate::message::MediaKind::Video,
            mime_type: "video/mp4".to_string(),
            lookup_key: "clip.mp4".to_string(),
            accessor: None,
            missing: false,
        });
        let merged = merge_conversations(vec![parsed("Media", vec![with_attachment])]);
        assert_eq!(merged[0].preview, "Attachment: clip.mp4");

        let merged = merge_conversations(vec![parsed("Blank", vec![message(0, "Alice", "   ")])]);
        assert_eq!(merged[0].preview, "(empty)");
    }

    #[test]
    fn test_conversations_sorted_by_recency() {
        let old = parsed("Old", vec![timestamped(message(0, "A", "x"), 8, 0)]);
        let new = parsed("New", vec![timestamped(message(1, "B", "y"), 10, 0)]);
        let undated = parsed("Undated", vec![message(2, "C", "z")]);

        let merged = merge_conversations(vec![old, new, undated]);
        assert_eq!(merged[0].title, "New");
        assert_eq!(merged[1].title, "Old");
        assert_eq!(merged[2].title, "Undated");
    }

    #[test]
    fn test_empty_inputs_dropped() {
        let merged = merge_conversations(vec![parsed("Empty", vec![])]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_last_fields_follow_canonical_order() {
        let merged = merge_conversations(vec![parsed(
            "Chat",
            vec![
                timestamped(message(0, "Alice", "newest"), 11, 0),
                timestamped(message(1, "Bob", "older"), 9, 0),
            ],
        )]);

        assert_eq!(merged[0].last_sequence, 0);
        assert_eq!(merged[0].preview, "newest");
        assert_eq!(
            merged[0].last_timestamp,
            Some(Utc.with_ymd_and_hms(2023, 2, 1, 11, 0, 0).unwrap())
        );
    }
}
