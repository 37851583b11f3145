use core::{cmp::Ordering, fmt};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use compact_str::CompactString;
use hashbrown::{HashMap, hash_map::Entry};
use serde::Serialize;

use crate::{
    chart::entry::CHART_TYPE,
    store::{Table, write_table},
    util::{DATE_FORMAT, parse_day, parse_stamp},
};

#[rustfmt::skip]
pub const CLEAN_HEADER: [&str; 10] = [
    "date", "region", "chart_type", "rank", "previous_rank",
    "rank_delta", "movement", "track_name", "artists", "release_date",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Movement {
    New,
    Up,
    Down,
    Same,
}

impl Movement {
    /// `NEW` without a previous rank, otherwise the sign of the delta. A
    /// missing current rank leaves no delta and counts as `SAME`.
    pub fn classify(previous_rank: Option<i64>, rank_delta: Option<i64>) -> Self {
        match (previous_rank, rank_delta) {
            (None, _) => Self::New,
            (Some(_), Some(d)) if d > 0 => Self::Up,
            (Some(_), Some(d)) if d < 0 => Self::Down,
            _ => Self::Same,
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "NEW",
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Same => "SAME",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CleanChartRow {
    #[serde(serialize_with = "ser_date")]
    pub date: Option<NaiveDate>,
    pub region: CompactString,
    pub chart_type: CompactString,
    pub rank: Option<i64>,
    pub previous_rank: Option<i64>,
    pub rank_delta: Option<i64>,
    pub movement: Movement,
    pub track_name: String,
    pub artists: String,
    pub release_date: String,
}

fn ser_date<S: serde::Serializer>(d: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.collect_str(&d.format(DATE_FORMAT)),
        None => s.serialize_str(""),
    }
}

/// Integer cell; integral floats such as `3.0` are accepted.
fn int_cell(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        let f = s.parse::<f64>().ok()?;
        (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
    })
}

/// `(chart_type, region, date, track_name, artists)`. Only columns of the
/// clean schema take part, so cleaning a cleaned table finds the same keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Key {
    chart_type: CompactString,
    region: CompactString,
    date: Option<NaiveDate>,
    track_name: String,
    artists: String,
}

impl Key {
    fn of(row: &CleanChartRow) -> Self {
        Self {
            chart_type: row.chart_type.clone(),
            region: row.region.clone(),
            date: row.date,
            track_name: row.track_name.clone(),
            artists: row.artists.clone(),
        }
    }
}

struct Candidate {
    row: CleanChartRow,
    retrieved_at: Option<NaiveDateTime>,
}

fn none_last<T: Ord>(a: Option<&T>, b: Option<&T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpotifyReport {
    pub read: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub written: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Normalizes, deduplicates and enriches a raw chart table.
///
/// Only `viral_daily` rows survive. Rows sharing chart, region, day, title
/// and artists collapse to the latest retrieval when the table carries
/// retrieval times, otherwise to the best rank.
pub fn clean_rows(table: &Table) -> (Vec<CleanChartRow>, SpotifyReport) {
    let col = |name| table.column(name);
    let (chart_type, region, date, rank, previous_rank) =
        (col("chart_type"), col("region"), col("date"), col("rank"), col("previous_rank"));
    let (track_name, artists, release_date, retrieved_at) =
        (col("track_name"), col("artists"), col("release_date"), col("retrieved_at_utc"));

    let mut report = SpotifyReport { read: table.rows.len(), ..SpotifyReport::default() };
    let mut candidates = Vec::<Candidate>::new();
    for row in &table.rows {
        let kind = chart_type.get(row).trim().to_lowercase();
        let kind = if kind.is_empty() { CHART_TYPE.to_owned() } else { kind };
        if kind != CHART_TYPE {
            report.skipped += 1;
            continue;
        }

        let rank = int_cell(rank.get(row));
        let previous_rank = int_cell(previous_rank.get(row));
        let rank_delta = previous_rank.zip(rank).and_then(|(p, r)| p.checked_sub(r));

        candidates.push(Candidate {
            row: CleanChartRow {
                date: parse_day(date.get(row)),
                region: region.get(row).trim().to_lowercase().into(),
                chart_type: kind.into(),
                rank,
                previous_rank,
                rank_delta,
                movement: Movement::classify(previous_rank, rank_delta),
                track_name: track_name.get(row).trim().to_owned(),
                artists: artists.get(row).trim().to_owned(),
                release_date: release_date.get(row).trim().to_owned(),
            },
            retrieved_at: parse_stamp(retrieved_at.get(row)).map(|s| s.utc_naive()),
        });
    }

    let by_retrieval = candidates.iter().any(|c| c.retrieved_at.is_some());
    let mut kept = Vec::<Candidate>::with_capacity(candidates.len());
    let mut index = HashMap::<Key, usize>::new();

    for cand in candidates {
        match index.entry(Key::of(&cand.row)) {
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(cand);
            }
            Entry::Occupied(slot) => {
                report.duplicates += 1;
                let current = &mut kept[*slot.get()];
                // missing retrieval times sort first; on a tie the later row wins
                let replace = if by_retrieval {
                    cand.retrieved_at >= current.retrieved_at
                } else {
                    none_last(cand.row.rank.as_ref(), current.row.rank.as_ref()).is_lt()
                };
                if replace {
                    *current = cand;
                }
            }
        }
    }

    let mut rows = kept.into_iter().map(|c| c.row).collect::<Vec<_>>();
    rows.sort_by(|a, b| {
        none_last(a.date.as_ref(), b.date.as_ref())
            .then_with(|| a.region.cmp(&b.region))
            .then_with(|| none_last(a.rank.as_ref(), b.rank.as_ref()))
    });

    report.written = rows.len();
    report.first_date = rows.iter().filter_map(|r| r.date).min();
    report.last_date = rows.iter().filter_map(|r| r.date).max();
    (rows, report)
}

/// Reads `input`, cleans it and writes the fixed ten-column table to `output`.
pub fn clean(input: &Path, output: &Path) -> anyhow::Result<SpotifyReport> {
    let table = Table::read(input, true)?;
    let (rows, report) = clean_rows(&table);
    write_table(output, &CLEAN_HEADER, rows, true)?;

    tracing::info!(
        target: "etl",
        "\x1b[32mspotify\x1b[0m: read {}, dropped {} non-viral, merged {} duplicates, wrote {} → {}",
        report.read, report.skipped, report.duplicates, report.written, output.display()
    );
    if let (Some(first), Some(last)) = (report.first_date, report.last_date) {
        tracing::info!(target: "etl", "date range {first} → {last}");
    }
    Ok(report)
}
