//! Text normalization helpers shared by every parsing stage.
//!
//! Chat exports carry a surprising amount of invisible Unicode: a BOM at the
//! start of the file, bidirectional embedding marks around names written in
//! RTL scripts, and narrow no-break spaces inside time fields. These helpers
//! strip or normalize those marks so the downstream pattern matching only
//! ever sees plain text.

/// Invisible formatting marks stripped from names, times, and attachment
/// text: ZWNJ, ZWJ, LRM/RLM, directional embeddings/overrides, and the
/// directional isolate range.
fn is_invisible_mark(c: char) -> bool {
    matches!(c,
        '\u{200C}' | '\u{200D}' | '\u{200E}' | '\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2066}'..='\u{2069}'
    )
}

/// Removes invisible bidi/formatting marks from a string.
///
/// # Example
///
/// ```
/// use chatweave::text::clean_invisible_marks;
///
/// assert_eq!(clean_invisible_marks("\u{202A}Alice\u{202C}"), "Alice");
/// assert_eq!(clean_invisible_marks("plain"), "plain");
/// ```
pub fn clean_invisible_marks(value: &str) -> String {
    if value.chars().any(is_invisible_mark) {
        value.chars().filter(|c| !is_invisible_mark(*c)).collect()
    } else {
        value.to_string()
    }
}

/// Strips a single leading byte-order mark, if present.
pub fn strip_bom(value: &str) -> &str {
    value.strip_prefix('\u{FEFF}').unwrap_or(value)
}

/// Replaces narrow no-break spaces (U+202F) with ordinary spaces.
///
/// iOS exports separate the time from the meridiem marker with U+202F
/// rather than a plain space.
pub fn replace_narrow_nbsp(value: &str) -> String {
    value.replace('\u{202F}', " ")
}

/// Collapses runs of whitespace to single spaces and trims the ends.
///
/// Used for conversation identity keys and preview text.
pub fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_gap = true;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_gap {
                out.push(' ');
                in_gap = true;
            }
        } else {
            out.push(c);
            in_gap = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}
