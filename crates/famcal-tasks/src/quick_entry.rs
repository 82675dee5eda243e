//! Quick-entry token parser.
//!
//! Splits free text such as `"Dentist tomorrow at 5pm P1"` into highlighted
//! segments (date, time, location, priority and plain text) and resolves them
//! into form fields. Patterns are evaluated in a fixed category order; matches
//! are sorted by start offset and a match starting inside the previous kept
//! match is dropped. Nothing here returns an error: unrecognised or invalid
//! input simply stays plain text.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use famcal_calendar::Priority;
use famcal_core::Language;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Text,
    Date,
    Time,
    Location,
    Priority,
}

/// A classified span of the input. `start..end` are byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSegment {
    pub kind: SegmentKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("quick-entry pattern should compile - this is a bug")
}

type PatternTable = Vec<(SegmentKind, Regex)>;

static EN_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    vec![
        (SegmentKind::Priority, compile(r"(?i)\bp[1-3]\b")),
        (
            SegmentKind::Date,
            compile(r"(?i)\b(?:day after tomorrow|today|tonight|tomorrow|next week|this weekend)\b"),
        ),
        (
            SegmentKind::Date,
            compile(r"(?i)\b(?:(?:on|next)\s+)?(?:sunday|monday|tuesday|wednesday|thursday|friday|saturday)\b"),
        ),
        (
            SegmentKind::Date,
            compile(r"\b(?P<a>\d{1,2})[./-](?P<b>\d{1,2})(?:[./-](?P<y>\d{4}|\d{2}))?\b"),
        ),
        (
            SegmentKind::Time,
            compile(r"(?i)\b(?:at\s+)?(?P<h>\d{1,2})(?::(?P<m>[0-5]\d))?\s*(?P<ampm>am|pm)\b"),
        ),
        (
            SegmentKind::Time,
            compile(r"(?i)\b(?:at\s+)?(?P<h>[01]?\d|2[0-3]):(?P<m>[0-5]\d)\b"),
        ),
        (
            SegmentKind::Location,
            compile(r"\b(?:at|in)\s+(?:the\s+)?[A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)*"),
        ),
        (SegmentKind::Location, compile(r"@[^\s@]+")),
    ]
});

static HE_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    vec![
        (SegmentKind::Priority, compile(r"(?i)\bp[1-3]\b")),
        (
            SegmentKind::Date,
            compile(r"\b(?:מחרתיים|היום|הערב|מחר|בשבוע הבא|שבוע הבא|השבוע)\b"),
        ),
        (
            SegmentKind::Date,
            compile(r"\bב?יום\s+(?:ראשון|שני|שלישי|רביעי|חמישי|שישי)\b|\bב?שבת\b"),
        ),
        (
            SegmentKind::Date,
            compile(r"\b(?P<a>\d{1,2})[./-](?P<b>\d{1,2})(?:[./-](?P<y>\d{4}|\d{2}))?\b"),
        ),
        (
            SegmentKind::Time,
            compile(r"(?:\bב?שעה\s+)?\b(?P<h>[01]?\d|2[0-3]):(?P<m>[0-5]\d)\b"),
        ),
        (SegmentKind::Time, compile(r"\bב?שעה\s+(?P<h>\d{1,2})\b")),
        (
            SegmentKind::Location,
            compile(r"\b(?:ב?מיקום|בכתובת):?\s+[^\s,.;!?]+"),
        ),
        (SegmentKind::Location, compile(r"@[^\s@]+")),
    ]
});

fn patterns(language: Language) -> &'static PatternTable {
    match language {
        Language::En => &EN_PATTERNS,
        Language::He => &HE_PATTERNS,
    }
}

fn number(caps: &Captures, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

/// Month and day of a numeric date, in the language's field order.
fn month_day(caps: &Captures, language: Language) -> Option<(u32, u32)> {
    let (a, b) = (number(caps, "a")?, number(caps, "b")?);
    Some(match language {
        Language::En => (a, b),
        Language::He => (b, a),
    })
}

fn explicit_year(caps: &Captures) -> Option<i32> {
    let y = caps.name("y")?;
    let value: i32 = y.as_str().parse().ok()?;
    Some(if y.as_str().len() == 2 { 2000 + value } else { value })
}

fn time_of(caps: &Captures) -> Option<NaiveTime> {
    let hour = number(caps, "h")?;
    let minute = number(caps, "m").unwrap_or(0);
    let hour = match caps.name("ampm").map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ampm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (ampm.as_str(), hour) {
                ("am", 12) => 0,
                ("pm", 12) => 12,
                ("pm", h) => h + 12,
                (_, h) => h,
            }
        }
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Rejects numeric dates and times that do not exist.
fn is_valid(kind: SegmentKind, caps: &Captures, language: Language) -> bool {
    match kind {
        SegmentKind::Date if caps.name("a").is_some() => {
            let Some((month, day)) = month_day(caps, language) else {
                return false;
            };
            // 2024 is a leap year, so Feb 29 passes when no year is given
            let year = explicit_year(caps).unwrap_or(2024);
            NaiveDate::from_ymd_opt(year, month, day).is_some()
        }
        SegmentKind::Time => time_of(caps).is_some(),
        _ => true,
    }
}

/// Classify `text` into contiguous segments covering `[0, text.len())`.
pub fn parse_segments(text: &str, language: Language) -> Vec<ParsedSegment> {
    let mut matches: Vec<(usize, usize, SegmentKind)> = Vec::new();
    for (kind, regex) in patterns(language) {
        for caps in regex.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if m.start() == m.end() {
                continue;
            }
            if is_valid(*kind, &caps, language) {
                matches.push((m.start(), m.end(), *kind));
            } else {
                tracing::debug!(text = m.as_str(), "Ignoring invalid {:?} token", kind);
            }
        }
    }
    // stable: equal starts keep registration order
    matches.sort_by_key(|(start, _, _)| *start);

    let mut segments = Vec::new();
    let mut cursor = 0;
    for (start, end, kind) in matches {
        if start < cursor {
            continue;
        }
        if start > cursor {
            segments.push(segment(text, SegmentKind::Text, cursor, start));
        }
        segments.push(segment(text, kind, start, end));
        cursor = end;
    }
    if cursor < text.len() {
        segments.push(segment(text, SegmentKind::Text, cursor, text.len()));
    }
    segments
}

fn segment(text: &str, kind: SegmentKind, start: usize, end: usize) -> ParsedSegment {
    ParsedSegment {
        kind,
        text: text[start..end].to_string(),
        start,
        end,
    }
}

/// First capture of any pattern of `kind` inside a segment's own text.
fn captures_in<'t>(
    kind: SegmentKind,
    language: Language,
    text: &'t str,
) -> impl Iterator<Item = Captures<'t>> + 't {
    patterns(language)
        .iter()
        .filter(move |(k, _)| *k == kind)
        .filter_map(move |(_, regex)| regex.captures(text))
}

fn next_weekday(from: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (7 + target.num_days_from_sunday() - from.weekday().num_days_from_sunday()) % 7;
    from + Duration::days(if ahead == 0 { 7 } else { i64::from(ahead) })
}

fn weekday_named(word: &str) -> Option<Weekday> {
    match word.trim_start_matches('ב') {
        "sunday" | "ראשון" => Some(Weekday::Sun),
        "monday" | "שני" => Some(Weekday::Mon),
        "tuesday" | "שלישי" => Some(Weekday::Tue),
        "wednesday" | "רביעי" => Some(Weekday::Wed),
        "thursday" | "חמישי" => Some(Weekday::Thu),
        "friday" | "שישי" => Some(Weekday::Fri),
        "saturday" | "שבת" => Some(Weekday::Sat),
        _ => None,
    }
}

fn resolve_date(text: &str, language: Language, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text.trim().to_lowercase();
    match lowered.as_str() {
        "today" | "tonight" | "היום" | "הערב" | "השבוע" => return Some(today),
        "tomorrow" | "מחר" => return Some(today + Duration::days(1)),
        "day after tomorrow" | "מחרתיים" => return Some(today + Duration::days(2)),
        "next week" | "שבוע הבא" | "בשבוע הבא" => return Some(today + Duration::days(7)),
        "this weekend" if today.weekday() == Weekday::Sat => return Some(today),
        "this weekend" => return Some(next_weekday(today, Weekday::Sat)),
        _ => {}
    }

    if let Some(day) = lowered.split_whitespace().find_map(weekday_named) {
        return Some(next_weekday(today, day));
    }

    let caps = captures_in(SegmentKind::Date, language, text).find(|c| c.name("a").is_some())?;
    let (month, day) = month_day(&caps, language)?;
    match explicit_year(&caps) {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

fn resolve_time(text: &str, language: Language) -> Option<NaiveTime> {
    captures_in(SegmentKind::Time, language, text).find_map(|caps| time_of(&caps))
}

fn resolve_location(text: &str) -> String {
    let trimmed = text.trim();
    let stripped = if let Some(rest) = trimmed.strip_prefix('@') {
        rest
    } else if let Some((prefix, rest)) = trimmed.split_once(char::is_whitespace) {
        match prefix.trim_end_matches(':') {
            "at" | "in" | "מיקום" | "במיקום" | "בכתובת" => rest,
            _ => trimmed,
        }
    } else {
        trimmed
    };
    stripped.trim().to_string()
}

fn resolve_priority(text: &str) -> Option<Priority> {
    match text.trim().chars().last()? {
        '1' => Some(Priority::High),
        '2' => Some(Priority::Medium),
        '3' => Some(Priority::Low),
        _ => None,
    }
}

/// Form fields pre-filled from quick-entry text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickEntry {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub priority: Option<Priority>,
    pub segments: Vec<ParsedSegment>,
}

impl QuickEntry {
    /// Parse `text`; relative dates resolve against `today`. The first
    /// segment of each kind wins.
    pub fn from_text(text: &str, language: Language, today: NaiveDate) -> Self {
        let segments = parse_segments(text, language);

        let mut title_parts = Vec::new();
        let mut entry = QuickEntry {
            title: String::new(),
            date: None,
            time: None,
            location: None,
            priority: None,
            segments: Vec::new(),
        };

        for seg in &segments {
            match seg.kind {
                SegmentKind::Text => title_parts.push(seg.text.as_str()),
                SegmentKind::Date if entry.date.is_none() => {
                    entry.date = resolve_date(&seg.text, language, today);
                }
                SegmentKind::Time if entry.time.is_none() => {
                    entry.time = resolve_time(&seg.text, language);
                }
                SegmentKind::Location if entry.location.is_none() => {
                    entry.location = Some(resolve_location(&seg.text)).filter(|l| !l.is_empty());
                }
                SegmentKind::Priority if entry.priority.is_none() => {
                    entry.priority = resolve_priority(&seg.text);
                }
                _ => {}
            }
        }

        entry.title = title_parts
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        entry.segments = segments;
        entry
    }
}
