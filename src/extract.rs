//! Sender classification and attachment/reply extraction.
//!
//! These stages run on a record's body in a fixed order: sender split,
//! attachment declaration, reply quotation. Each cascade is an ordered list
//! of patterns evaluated with early exit, so the priority contract is a
//! visible data structure rather than buried control flow.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::MAX_SENDER_CHARS;
use crate::message::{MediaKind, ReplyContext};
use crate::text::clean_invisible_marks;

/// `NAME (file attached)` with an optional caption on following lines.
static FILE_ATTACHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([^\n]+?)\s*\(file attached\)(?s:(.*))$").unwrap()
});

/// Inline `<attached: NAME>` token, anywhere in the text.
static ATTACHED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<attached:\s*([^>]+)>").unwrap());

/// Bracketed omitted placeholder, e.g. `<Media omitted>`.
static OMITTED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<[^>]*omitted>$").unwrap());

/// Kind-hint capture inside the bracketed form, e.g. `<video omitted>`.
static OMITTED_CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<([^>]+?)\s+omitted>$").unwrap());

/// Legacy bare placeholder, e.g. `image omitted`.
static LEGACY_OMITTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(image|video|audio|gif|sticker|document)\s+omitted$").unwrap()
});

/// First-line reply-quotation patterns, tried in order; the last capture
/// group of the first matching pattern names the reply target.
static REPLY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^You replied to\s+(.+)$",
        r"(?i)^(.+?) replied to you$",
        r"(?i)^(.+?) replied to\s+(.+)$",
        r"(?i)^Replying to\s+(.+)$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Result of the sender/system classification of a record body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderSplit {
    /// Cleaned candidate name; empty for system messages
    pub sender: String,
    /// The working text for further extraction
    pub text: String,
    /// True when no valid separator was found
    pub is_system: bool,
}

/// Splits a record body into an optional sender name and remaining text.
///
/// The first `": "` is the separator. A missing separator, or a candidate
/// name longer than the sanity bound, classifies the record as a system
/// message whose full body becomes the text — the bound guards against
/// bodies that merely contain a colon-space before any real separator.
///
/// # Example
///
/// ```
/// use chatweave::extract::split_sender;
///
/// let split = split_sender("Alice: hello");
/// assert_eq!(split.sender, "Alice");
/// assert_eq!(split.text, "hello");
/// assert!(!split.is_system);
///
/// assert!(split_sender("Messages are end-to-end encrypted").is_system);
/// ```
pub fn split_sender(body: &str) -> SenderSplit {
    let system = || SenderSplit {
        sender: String::new(),
        text: body.to_string(),
        is_system: true,
    };

    let Some(separator) = body.find(": ") else {
        return system();
    };

    let candidate = clean_invisible_marks(&body[..separator]).trim().to_string();
    if candidate.chars().count() > MAX_SENDER_CHARS {
        return system();
    }

    SenderSplit {
        sender: candidate,
        text: body[separator + 2..].to_string(),
        is_system: false,
    }
}

/// Normalized kind hint from an "omitted" placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OmittedKind {
    /// Unspecified or unrecognized hint
    #[default]
    Media,
    Image,
    Video,
    Audio,
    Sticker,
    Gif,
    Document,
}

impl OmittedKind {
    /// Normalizes a free-form hint by substring matching.
    ///
    /// # Example
    ///
    /// ```
    /// use chatweave::extract::OmittedKind;
    ///
    /// assert_eq!(OmittedKind::normalize("Voice message"), OmittedKind::Audio);
    /// assert_eq!(OmittedKind::normalize("GIF"), OmittedKind::Gif);
    /// assert_eq!(OmittedKind::normalize("something else"), OmittedKind::Media);
    /// ```
    pub fn normalize(raw: &str) -> Self {
        let value = clean_invisible_marks(raw).trim().to_lowercase();
        if value.is_empty() || value == "media" {
            OmittedKind::Media
        } else if value.contains("image") {
            OmittedKind::Image
        } else if value.contains("video") {
            OmittedKind::Video
        } else if value.contains("audio") || value.contains("voice") {
            OmittedKind::Audio
        } else if value.contains("sticker") {
            OmittedKind::Sticker
        } else if value.contains("gif") {
            OmittedKind::Gif
        } else if value.contains("document") || value.contains("file") {
            OmittedKind::Document
        } else {
            OmittedKind::Media
        }
    }

    /// Whether a media record of `kind` satisfies this hint.
    ///
    /// A gif hint also accepts video records — exports store converted gifs
    /// as video files.
    pub fn accepts(self, kind: MediaKind) -> bool {
        match self {
            OmittedKind::Media => true,
            OmittedKind::Image => kind == MediaKind::Image,
            OmittedKind::Video => kind == MediaKind::Video,
            OmittedKind::Audio => kind == MediaKind::Audio,
            OmittedKind::Sticker => kind == MediaKind::Sticker,
            OmittedKind::Gif => kind == MediaKind::Gif || kind == MediaKind::Video,
            OmittedKind::Document => kind == MediaKind::Document,
        }
    }
}

/// An attachment declaration found in the working text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentDeclaration {
    /// A declaration naming a concrete file
    File {
        /// Declared filename
        name: String,
    },
    /// An "omitted" placeholder with a normalized kind hint
    Omitted {
        /// Normalized kind hint
        kind: OmittedKind,
    },
}

/// Result of scanning the working text for an attachment declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentScan {
    /// The declaration, if one of the patterns matched
    pub declaration: Option<AttachmentDeclaration>,
    /// The text left over once the declaration is removed (caption or body)
    pub remaining_text: String,
}

/// The attachment patterns, in priority order. First match wins.
#[derive(Debug, Clone, Copy)]
enum AttachmentPattern {
    /// `NAME (file attached)` + optional trailing caption
    FileAttached,
    /// Inline `<attached: NAME>` token
    AttachedToken,
    /// First line is an omitted placeholder (bracketed or legacy bare form)
    OmittedLine,
}

const ATTACHMENT_PATTERNS: [AttachmentPattern; 3] = [
    AttachmentPattern::FileAttached,
    AttachmentPattern::AttachedToken,
    AttachmentPattern::OmittedLine,
];

impl AttachmentPattern {
    fn try_extract(self, text: &str) -> Option<AttachmentScan> {
        match self {
            AttachmentPattern::FileAttached => {
                let caps = FILE_ATTACHED.captures(text)?;
                let name = clean_invisible_marks(&caps[1]).trim().to_string();
                Some(AttachmentScan {
                    declaration: Some(AttachmentDeclaration::File { name }),
                    remaining_text: caps[2].trim().to_string(),
                })
            }
            AttachmentPattern::AttachedToken => {
                let found = ATTACHED_TOKEN.captures(text)?;
                let name = clean_invisible_marks(&found[1]).trim().to_string();
                let whole = found.get(0).expect("group 0 always present");
                let mut remaining = String::with_capacity(text.len());
                remaining.push_str(&text[..whole.start()]);
                remaining.push_str(&text[whole.end()..]);
                Some(AttachmentScan {
                    declaration: Some(AttachmentDeclaration::File { name }),
                    remaining_text: remaining.trim().to_string(),
                })
            }
            AttachmentPattern::OmittedLine => {
                let mut lines = text.split('\n');
                let first_line = lines.next().unwrap_or("").trim();

                let hint = if let Some(caps) = OMITTED_CAPTURE.captures(first_line) {
                    caps[1].to_string()
                } else if let Some(caps) = LEGACY_OMITTED.captures(first_line) {
                    caps[1].to_string()
                } else if OMITTED_LINE.is_match(first_line) {
                    String::new()
                } else {
                    return None;
                };

                let caption = lines.collect::<Vec<_>>().join("\n").trim().to_string();
                Some(AttachmentScan {
                    declaration: Some(AttachmentDeclaration::Omitted {
                        kind: OmittedKind::normalize(&hint),
                    }),
                    remaining_text: caption,
                })
            }
        }
    }
}

/// Scans the sender-classified working text for an attachment declaration.
///
/// # Example
///
/// ```
/// use chatweave::extract::{extract_attachment, AttachmentDeclaration};
///
/// let scan = extract_attachment("photo.jpg (file attached)\nnice shot");
/// assert_eq!(
///     scan.declaration,
///     Some(AttachmentDeclaration::File { name: "photo.jpg".to_string() })
/// );
/// assert_eq!(scan.remaining_text, "nice shot");
/// ```
pub fn extract_attachment(text: &str) -> AttachmentScan {
    let cleaned = clean_invisible_marks(text);
    let cleaned = cleaned.trim_end();

    for pattern in ATTACHMENT_PATTERNS {
        if let Some(scan) = pattern.try_extract(cleaned) {
            return scan;
        }
    }

    AttachmentScan {
        declaration: None,
        remaining_text: cleaned.trim().to_string(),
    }
}

/// A recognized reply quotation plus the real message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyExtract {
    /// Target and quoted line
    pub context: ReplyContext,
    /// Lines after the quotation, rejoined; replaces the working text
    pub body_text: String,
}

/// Strips one leading and one trailing quote mark, then trims.
fn strip_quote_marks(value: &str) -> String {
    let value = value
        .strip_prefix(['"', '\u{201C}'])
        .unwrap_or(value);
    let value = value
        .strip_suffix(['"', '\u{201D}'])
        .unwrap_or(value);
    value.trim().to_string()
}

/// Inspects the text remaining after attachment extraction for a reply
/// quotation.
///
/// Needs at least two lines: the quotation header and the quoted line. The
/// header is tested against [`REPLY_PATTERNS`] in order; no match (or an
/// empty target after cleanup) leaves the text unchanged.
///
/// # Example
///
/// ```
/// use chatweave::extract::extract_reply;
///
/// let reply = extract_reply("You replied to Bob\n\u{201C}see you at 5\u{201D}\nsure!").unwrap();
/// assert_eq!(reply.context.target_name, "Bob");
/// assert_eq!(reply.context.quoted_text, "see you at 5");
/// assert_eq!(reply.body_text, "sure!");
/// ```
pub fn extract_reply(text: &str) -> Option<ReplyExtract> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 2 {
        return None;
    }

    let first_line = clean_invisible_marks(lines[0]).trim().to_string();
    if first_line.is_empty() {
        return None;
    }

    let target_raw = REPLY_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.captures(&first_line)?;
        let last_group = caps.iter().skip(1).flatten().last()?;
        Some(last_group.as_str().to_string())
    })?;

    let target_name = clean_invisible_marks(&target_raw).trim().to_string();
    if target_name.is_empty() {
        return None;
    }

    let quoted_candidate = clean_invisible_marks(lines[1]).trim().to_string();
    let quoted_text = strip_quote_marks(&quoted_candidate);
    let body_text = lines[2..].join("\n").trim().to_string();

    Some(ReplyExtract {
        context: ReplyContext {
            target_name,
            quoted_text,
        },
        body_text,
    })
}
