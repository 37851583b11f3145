use core::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub const fn new(year: i32, month: u32) -> Option<Self> {
        if month >= 1 && month <= 12 {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn of(t: NaiveDateTime) -> Self {
        Self {
            year: t.year(),
            month: t.month(),
        }
    }

    pub const fn pred(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub const fn succ(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// `self` moved `n` months into the past.
    pub fn back(self, n: u32) -> Self {
        (0..n).fold(self, |m, _| m.pred())
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(self) -> NaiveDate {
        self.succ().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    pub fn start(self) -> NaiveDateTime {
        self.first_day().and_time(NaiveTime::MIN)
    }

    /// `23:59:59` on the last day of the month.
    pub fn end(self) -> NaiveDateTime {
        self.last_day()
            .and_hms_opt(23, 59, 59)
            .unwrap_or(NaiveDateTime::MAX)
    }

    pub fn contains(self, t: NaiveDateTime) -> bool {
        self.start() <= t && t <= self.end()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("expected YYYY-MM, got {s:?}"))?;
        Self::new(y.parse()?, m.parse()?).ok_or_else(|| anyhow::anyhow!("month out of range in {s:?}"))
    }
}

/// A contiguous run of whole calendar months, `first..=last`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonthWindow {
    pub first: YearMonth,
    pub last: YearMonth,
}

impl MonthWindow {
    pub fn start(&self) -> NaiveDateTime {
        self.first.start()
    }

    pub fn end(&self) -> NaiveDateTime {
        self.last.end()
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start() <= t && t <= self.end()
    }

    pub fn months(&self) -> u32 {
        let span = (self.last.year - self.first.year) * 12 + self.last.month as i32 - self.first.month as i32;
        span.max(-1) as u32 + 1
    }
}

impl fmt::Display for MonthWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start().date(), self.end().date())
    }
}

/// How far back the trailing selection may grow.
#[derive(Clone, Copy, Debug)]
pub struct TrailingPolicy {
    pub min_months: u32,
    pub max_months: u32,
    pub min_rows: usize,
}

/// How a step picks its months.
#[derive(Clone, Copy, Debug)]
pub enum Selection {
    Trailing(TrailingPolicy),
    Absolute(MonthWindow),
}

impl Selection {
    /// The window for a set of row timestamps; `None` only for a trailing
    /// selection over no rows.
    pub fn resolve(self, times: &[NaiveDateTime]) -> Option<MonthWindow> {
        match self {
            Self::Trailing(policy) => trailing(times, policy),
            Self::Absolute(window) => Some(window),
        }
    }
}

/// The month before the month of the newest timestamp: the newest month that
/// is guaranteed to be complete.
pub fn last_full_month(newest: NaiveDateTime) -> YearMonth {
    YearMonth::of(newest).pred()
}

/// Trailing whole-month window ending at the last full month.
///
/// Starts with `min_months` months and grows backward one month at a time
/// until the window holds at least `min_rows` timestamps or spans
/// `max_months`. Returns `None` when there are no timestamps at all.
pub fn trailing(times: &[NaiveDateTime], policy: TrailingPolicy) -> Option<MonthWindow> {
    let newest = times.iter().max()?;
    let last = last_full_month(*newest);
    let min_months = policy.min_months.max(1);
    let max_months = policy.max_months.max(min_months);

    let mut per_month = hashbrown::HashMap::<YearMonth, usize>::new();
    for t in times {
        *per_month.entry(YearMonth::of(*t)).or_default() += 1;
    }

    let mut total = 0;
    let mut first = last;
    for k in 1..=max_months {
        if k > 1 {
            first = first.pred();
        }
        total += per_month.get(&first).copied().unwrap_or(0);
        if k >= min_months && total >= policy.min_rows {
            break;
        }
    }

    Some(MonthWindow { first, last })
}

/// Fixed window `[from, to]`, inclusive on whole months.
pub fn absolute(from: YearMonth, to: YearMonth) -> MonthWindow {
    if from <= to {
        MonthWindow { first: from, last: to }
    } else {
        MonthWindow { first: to, last: from }
    }
}
