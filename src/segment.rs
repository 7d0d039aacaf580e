//! Message-boundary segmentation.
//!
//! A chat export is a line-oriented stream where each logical message begins
//! with a date/time prefix and everything up to the next prefix — newlines
//! included — belongs to the message. Two surface forms exist in the wild:
//!
//! - Android: `1/2/2023, 9:00 AM - Alice: Hi`
//! - iOS:     `[1/2/2023, 9:00:12 AM] Alice: Hi`
//!
//! There is no escaping in the format, so a continuation line that happens
//! to start with a valid-looking prefix is misparsed as a new message. That
//! is a documented limitation of the export format, not corrected here.

use std::sync::LazyLock;

use regex::Regex;

use crate::text::replace_narrow_nbsp;

/// `D/M/Y, TIME - REST` (Android-style export lines).
static PLAIN_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}/\d{1,2}/\d{2,4}),\s(.+?)\s-\s(.*)$").unwrap()
});

/// `[D/M/Y, TIME] REST` (iOS-style export lines).
static BRACKET_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d{1,2}/\d{1,2}/\d{2,4}),\s(.+?)\]\s(.*)$").unwrap()
});

/// One logical message span before structural interpretation.
///
/// Transient: produced by [`segment`], consumed once by hydration. The body
/// accumulates continuation lines verbatim, embedded newlines included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Date field exactly as written, e.g. `1/2/2023`
    pub raw_date: String,
    /// Time field exactly as written, e.g. `9:00 AM`
    pub raw_time: String,
    /// Message body: first-line remainder plus folded continuation lines
    pub body: String,
}

/// The pieces of a recognized message-start line.
struct MessageStart {
    date_part: String,
    time_part: String,
    rest: String,
}

/// Tries to interpret one line as the start of a new message.
///
/// Narrow no-break spaces are treated as ordinary spaces before matching;
/// the captured fields come from the normalized line.
fn parse_message_start(line: &str) -> Option<MessageStart> {
    let normalized = replace_narrow_nbsp(line);

    for pattern in [&*PLAIN_START, &*BRACKET_START] {
        if let Some(caps) = pattern.captures(&normalized) {
            return Some(MessageStart {
                date_part: caps[1].to_string(),
                time_part: caps[2].to_string(),
                rest: caps[3].to_string(),
            });
        }
    }

    None
}

/// Splits normalized source text into raw message records.
///
/// Lines that match neither surface form are appended, with a newline
/// separator, to the body of the currently open record — or dropped when no
/// record is open yet (preamble junk before the first message).
///
/// # Example
///
/// ```
/// use chatweave::segment::segment;
///
/// let records = segment("1/2/2023, 9:00 AM - Alice: Hi\nsecond line");
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].body, "Alice: Hi\nsecond line");
/// ```
pub fn segment(text: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut current: Option<RawRecord> = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(start) = parse_message_start(line) {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(RawRecord {
                raw_date: start.date_part,
                raw_time: start.time_part,
                body: start.rest,
            });
            continue;
        }

        // Continuation lines keep their original bytes; only the matched
        // start line went through narrow-nbsp normalization.
        if let Some(record) = current.as_mut() {
            record.body.push('\n');
            record.body.push_str(line);
        }
    }

    if let Some(record) = current {
        records.push(record);
    }

    records
}
