//! Date-order inference and timestamp reconstruction.
//!
//! Export date fields are locale-dependent: `1/2/2023` is January 2nd in a
//! US export and February 1st in most others, and nothing in the file says
//! which. The only reliable evidence is a day value above 12, so the
//! inferencer samples the leading records and votes.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::config::DATE_ORDER_SAMPLE;
use crate::segment::RawRecord;
use crate::text::{clean_invisible_marks, replace_narrow_nbsp};

/// `H[:MM[:SS]]` with an optional meridiem marker, already lowercased.
static TIME_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?\s*(am|pm)?$").unwrap()
});

/// Interpretation order of the slash-separated date field.
///
/// Fixed once per source and applied uniformly to every record from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    /// Day/Month/Year — the default when the evidence is absent or tied.
    #[default]
    DayFirst,
    /// Month/Day/Year — wins only on a strict vote majority.
    MonthFirst,
}

/// Votes between day-first and month-first over the leading records.
///
/// A record votes day-first when its first date part exceeds 12 and the
/// second does not, and month-first in the mirrored case. Anything else
/// (both ≤ 12, both > 12, malformed fields) abstains.
///
/// # Example
///
/// ```
/// use chatweave::dates::{infer_date_order, DateOrder};
/// use chatweave::segment::RawRecord;
///
/// let record = |d: &str| RawRecord {
///     raw_date: d.to_string(),
///     raw_time: "9:00".to_string(),
///     body: String::new(),
/// };
///
/// let records = vec![record("13/01/2024"), record("14/01/2024")];
/// assert_eq!(infer_date_order(&records), DateOrder::DayFirst);
///
/// let records = vec![record("01/13/2024"), record("01/14/2024")];
/// assert_eq!(infer_date_order(&records), DateOrder::MonthFirst);
/// ```
pub fn infer_date_order(records: &[RawRecord]) -> DateOrder {
    let mut day_first_votes = 0u32;
    let mut month_first_votes = 0u32;

    for record in records.iter().take(DATE_ORDER_SAMPLE) {
        let parts: Vec<&str> = record.raw_date.split('/').collect();
        if parts.len() != 3 {
            continue;
        }
        let (Ok(first), Ok(second)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) else {
            continue;
        };

        if first > 12 && second <= 12 {
            day_first_votes += 1;
        } else if second > 12 && first <= 12 {
            month_first_votes += 1;
        }
    }

    if month_first_votes > day_first_votes {
        DateOrder::MonthFirst
    } else {
        DateOrder::DayFirst
    }
}

/// Reconstructs an absolute instant from raw date and time fields.
///
/// Two-digit years are interpreted as 2000+YY. The time accepts 12- or
/// 24-hour clock with an optional case-insensitive meridiem marker: 12am
/// maps to hour 0, 12pm stays 12, any other pm hour gains 12. Any failure to
/// match the date or time structure — or a value that is not a valid
/// calendar date or clock time — yields `None`; the caller keeps the record
/// and orders it by sequence alone.
///
/// # Example
///
/// ```
/// use chatweave::dates::{parse_timestamp, DateOrder};
/// use chrono::Timelike;
///
/// let ts = parse_timestamp("5/6/23", "11:59 pm", DateOrder::DayFirst).unwrap();
/// assert_eq!(ts.hour(), 23);
/// assert!(parse_timestamp("5/6/23", "not a time", DateOrder::DayFirst).is_none());
/// ```
pub fn parse_timestamp(raw_date: &str, raw_time: &str, order: DateOrder) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = raw_date.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let numbers: Vec<i32> = parts
        .iter()
        .map(|part| part.parse::<i32>())
        .collect::<Result<_, _>>()
        .ok()?;

    let (day, month, mut year) = match order {
        DateOrder::MonthFirst => (numbers[1], numbers[0], numbers[2]),
        DateOrder::DayFirst => (numbers[0], numbers[1], numbers[2]),
    };
    if year < 100 {
        year += 2000;
    }

    let cleaned_time = replace_narrow_nbsp(&clean_invisible_marks(raw_time))
        .trim()
        .to_lowercase();
    let caps = TIME_SHAPE.captures(&cleaned_time)?;

    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;

    match caps.get(4).map(|m| m.as_str()) {
        Some("pm") if hour != 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }

    let date = NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)?;
    let naive = date.and_hms_opt(hour, minute, second)?;
    Some(naive.and_utc())
}
