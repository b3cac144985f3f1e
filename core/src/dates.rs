//! Lenient date and time parsing for extracted or typed values.
//!
//! Dates resolve relative phrases against an injected `today`; anything that
//! cannot be read falls back to `today`. Times come back as 24-hour `HH:MM`.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate, NaiveDateTime};
use regex::Regex;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d-%m-%Y",
    "%m-%d-%Y",
];

/// Parse a date phrase, resolving `today`/`yesterday`/`tomorrow` relative to `today`.
/// Returns `None` if nothing matches.
pub fn try_parse_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = input.trim().to_lowercase();
    match text.as_str() {
        "" => return None,
        "today" | "now" => return Some(today),
        "yesterday" => return today.checked_sub_days(Days::new(1)),
        "tomorrow" => return today.checked_add_days(Days::new(1)),
        _ => {}
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return Some(date);
        }
    }
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .ok()
}

/// Like [`try_parse_date`], but unreadable input resolves to `today`.
pub fn parse_date_flexibly(input: &str, today: NaiveDate) -> NaiveDate {
    try_parse_date(input, today).unwrap_or_else(|| {
        if !input.trim().is_empty() {
            tracing::warn!(input, %today, "Could not parse date, using today");
        }
        today
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Half {
    Am,
    Pm,
}

struct DayPeriod {
    phrase: &'static str,
    default: &'static str,
    half: Option<Half>,
}

const fn period(phrase: &'static str, default: &'static str, half: Option<Half>) -> DayPeriod {
    DayPeriod {
        phrase,
        default,
        half,
    }
}

/// Longest phrase first so "late afternoon" wins over "afternoon" and
/// "midnight" over "night".
static DAY_PERIODS: LazyLock<Vec<DayPeriod>> = LazyLock::new(|| {
    let mut periods = vec![
        period("early morning", "07:00", Some(Half::Am)),
        period("dawn", "06:00", Some(Half::Am)),
        period("sunrise", "06:30", Some(Half::Am)),
        period("morning", "09:00", Some(Half::Am)),
        period("mid morning", "10:30", Some(Half::Am)),
        period("mid-morning", "10:30", Some(Half::Am)),
        period("late morning", "11:30", Some(Half::Am)),
        period("noon", "12:00", None),
        period("midday", "12:00", None),
        period("lunch", "12:30", None),
        period("lunch time", "12:30", None),
        period("lunchtime", "12:30", None),
        period("afternoon", "14:00", Some(Half::Pm)),
        period("early afternoon", "13:30", Some(Half::Pm)),
        period("mid afternoon", "15:00", Some(Half::Pm)),
        period("mid-afternoon", "15:00", Some(Half::Pm)),
        period("late afternoon", "16:30", Some(Half::Pm)),
        period("evening", "18:00", Some(Half::Pm)),
        period("early evening", "17:30", Some(Half::Pm)),
        period("late evening", "20:00", Some(Half::Pm)),
        period("dinner", "19:00", Some(Half::Pm)),
        period("dinner time", "19:00", Some(Half::Pm)),
        period("dinnertime", "19:00", Some(Half::Pm)),
        period("night", "21:00", Some(Half::Pm)),
        period("late night", "23:00", Some(Half::Pm)),
        period("midnight", "00:00", None),
        period("mid night", "00:00", None),
        period("mid-night", "00:00", None),
        period("start of day", "08:00", None),
        period("end of day", "17:00", None),
        period("close of business", "17:00", None),
        period("business hours", "14:00", None),
    ];
    periods.sort_by(|a, b| b.phrase.len().cmp(&a.phrase.len()));
    periods
});

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})\s*(am|pm)?").expect("valid clock regex"));
static HOUR_HALF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*(am|pm)\b").expect("valid hour regex"));
static APPROX_HOUR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:around|about|at)\s+(\d{1,2})\b").expect("valid approx regex")
});
static BARE_HOUR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})$").expect("valid bare hour regex"));

struct ClockReading {
    hour: u32,
    minute: u32,
    half: Option<Half>,
}

fn parse_half(raw: Option<regex::Match<'_>>) -> Option<Half> {
    match raw.map(|m| m.as_str()) {
        Some("am") => Some(Half::Am),
        Some("pm") => Some(Half::Pm),
        _ => None,
    }
}

fn read_clock(text: &str, allow_bare: bool) -> Option<ClockReading> {
    if let Some(caps) = CLOCK_RE.captures(text) {
        return Some(ClockReading {
            hour: caps[1].parse().ok()?,
            minute: caps[2].parse().ok()?,
            half: parse_half(caps.get(3)),
        });
    }
    if let Some(caps) = HOUR_HALF_RE.captures(text) {
        return Some(ClockReading {
            hour: caps[1].parse().ok()?,
            minute: 0,
            half: parse_half(caps.get(2)),
        });
    }
    let caps = APPROX_HOUR_RE
        .captures(text)
        .or_else(|| allow_bare.then(|| BARE_HOUR_RE.captures(text)).flatten())?;
    Some(ClockReading {
        hour: caps[1].parse().ok()?,
        minute: 0,
        half: None,
    })
}

/// Turn a spoken time expression into `HH:MM`.
///
/// Handles clock times (`9:15`, `4:10 PM`), approximate hours (`around 9`),
/// day periods (`late afternoon`, `noon`) and combinations (`evening around 6`).
pub fn parse_time_expression(input: &str) -> Option<String> {
    let text = input.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    let period = DAY_PERIODS.iter().find(|p| text.contains(p.phrase));
    let Some(mut reading) = read_clock(&text, period.is_none()) else {
        return period.map(|p| p.default.to_string());
    };

    match (reading.half, period.and_then(|p| p.half)) {
        (Some(Half::Pm), _) if reading.hour != 12 => reading.hour += 12,
        (Some(Half::Am), _) if reading.hour == 12 => reading.hour = 0,
        (None, Some(Half::Am)) if reading.hour > 12 => reading.hour -= 12,
        (None, Some(Half::Pm)) if reading.hour < 12 => reading.hour += 12,
        _ => {}
    }

    if reading.hour > 23 || reading.minute > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", reading.hour, reading.minute))
}
