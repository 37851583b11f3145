use core::time::Duration;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rand::Rng;
use regex::Regex;
use scraper::ElementRef;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A parsed timestamp: the wall-clock time as written by the source, plus the
/// offset when the source stated one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub wall: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl Stamp {
    /// Same instant expressed as naive UTC; offset-less stamps are taken as-is.
    pub fn utc_naive(self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => self.wall - TimeDelta::seconds(i64::from(offset.local_minus_utc())),
            None => self.wall,
        }
    }
}

static RE_DMY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap()
});
static RE_YMD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap()
});
static RE_HMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2}):(\d{2})(?::(\d{2}))?\b").unwrap()
});
static RE_GMT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"GMT\s*([+-])\s*(\d{1,2})(?::?(\d{2}))?").unwrap()
});

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
];

/// Lenient timestamp parser for scraped text.
///
/// Strict ISO-8601 / RFC 3339 forms are tried first. Anything else is scanned
/// for a day-first `dd/mm/yyyy` (or a `yyyy-mm-dd`) date, an optional
/// `hh:mm[:ss]` time and an optional `GMT+7` style offset, so strings such as
/// `"Thứ sáu, 17/10/2025, 08:30 (GMT+7)"` parse.
pub fn parse_stamp(text: &str) -> Option<Stamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let zulu = text.strip_suffix('Z').map(|s| format!("{s}+00:00"));
    let candidate = zulu.as_deref().unwrap_or(text);

    if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
        return Some(Stamp { wall: dt.naive_local(), offset: Some(*dt.offset()) });
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(Stamp { wall: dt.naive_local(), offset: Some(*dt.offset()) });
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(wall) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Stamp { wall, offset: None });
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Some(Stamp { wall: date.and_time(NaiveTime::MIN), offset: None });
    }

    fuzzy_stamp(text)
}

fn fuzzy_stamp(text: &str) -> Option<Stamp> {
    let (date, rest) = if let Some(c) = RE_DMY.captures(text) {
        let day = c[1].parse().ok()?;
        let month = c[2].parse().ok()?;
        let year = c[3].parse().ok()?;
        (NaiveDate::from_ymd_opt(year, month, day)?, c.get(0)?.end())
    } else {
        let c = RE_YMD.captures(text)?;
        let year = c[1].parse().ok()?;
        let month = c[2].parse().ok()?;
        let day = c[3].parse().ok()?;
        (NaiveDate::from_ymd_opt(year, month, day)?, c.get(0)?.end())
    };

    let time = RE_HMS
        .captures(&text[rest..])
        .and_then(|c| {
            let h = c[1].parse().ok()?;
            let m = c[2].parse().ok()?;
            let s = c.get(3).map_or(Some(0), |s| s.as_str().parse().ok())?;
            NaiveTime::from_hms_opt(h, m, s)
        })
        .unwrap_or(NaiveTime::MIN);

    let offset = RE_GMT.captures(text).and_then(|c| {
        let hours: i32 = c[2].parse().ok()?;
        let minutes: i32 = c.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let secs = (hours * 60 + minutes) * 60;
        if &c[1] == "-" {
            FixedOffset::west_opt(secs)
        } else {
            FixedOffset::east_opt(secs)
        }
    });

    Some(Stamp { wall: date.and_time(time), offset })
}

/// Calendar date at the start of `text` (`YYYY-MM-DD`, optionally followed by
/// a time part).
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text.get(..10)?, DATE_FORMAT).ok()
}

/// Every day from `start` to `end`, both inclusive.
pub fn each_day(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Text of an element with every text node trimmed, empty ones dropped and the
/// rest joined by single spaces.
pub fn squash_text(element: ElementRef) -> String {
    let mut out = String::new();
    for piece in element.text().map(str::trim).filter(|t| !t.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(piece);
    }
    out
}

/// A random pause in `[lo, hi)` seconds.
pub fn jitter(lo: f64, hi: f64) -> Duration {
    if hi <= lo {
        return Duration::from_secs_f64(lo.max(0.0));
    }
    Duration::from_secs_f64(rand::rng().random_range(lo..hi))
}
