use chrono::{DateTime, NaiveDate, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

pub const CHART_TYPE: &str = "viral_daily";
pub const PERIOD: &str = "daily";

#[rustfmt::skip]
pub const RAW_HEADER: [&str; 13] = [
    "chart_type", "period", "date", "region", "retrieved_at_utc",
    "rank", "previous_rank", "weeks_on_chart",
    "track_name", "artists", "artist_uris", "track_id", "release_date",
];

#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(default)]
    pub track_metadata: Option<TrackMetadata>,
    #[serde(default)]
    pub chart_entry_data: Option<ChartEntryData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub track_name: Option<String>,
    pub track_uri: Option<String>,
    pub uri: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub release_date: Option<String>,
}

impl TrackMetadata {
    /// No recognized field is set. An object holding only unknown keys counts
    /// as empty too, since it would flatten to a row without a track.
    fn is_empty(&self) -> bool {
        self.track_name.is_none()
            && self.track_uri.is_none()
            && self.uri.is_none()
            && self.artists.is_empty()
            && self.release_date.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub name: Option<String>,
    pub spotify_uri: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntryData {
    pub current_rank: Option<i64>,
    pub previous_rank: Option<i64>,
    pub weeks_on_chart: Option<i64>,
}

/// One row of the raw chart CSV, in [`RAW_HEADER`] order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartEntry {
    pub chart_type: CompactString,
    pub period: CompactString,
    pub date: String,
    pub region: CompactString,
    pub retrieved_at_utc: String,
    pub rank: Option<i64>,
    pub previous_rank: Option<i64>,
    pub weeks_on_chart: Option<i64>,
    pub track_name: Option<String>,
    pub artists: Option<String>,
    pub artist_uris: Option<String>,
    pub track_id: Option<String>,
    pub release_date: Option<String>,
}

/// `<id>` out of `spotify:track:<id>`.
fn track_id(uri: &str) -> Option<String> {
    let mut parts = uri.rsplit(':');
    let id = parts.next()?;
    (parts.next()? == "track" && !id.is_empty()).then(|| id.to_owned())
}

fn non_empty(v: Vec<String>, sep: &str) -> Option<String> {
    (!v.is_empty()).then(|| v.join(sep))
}

/// Flattens a snapshot into rows. Entries without track metadata (ads,
/// podcasts) are skipped; a previous rank of zero or below is the API's "no
/// previous rank" and is stored as absent.
pub fn flatten(
    snapshot: Snapshot,
    region: &str,
    day: NaiveDate,
    retrieved_at: DateTime<Utc>,
) -> Vec<ChartEntry> {
    let retrieved_at = retrieved_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let region = CompactString::from(region.to_lowercase());
    let date = day.format(crate::util::DATE_FORMAT).to_string();

    snapshot
        .entries
        .into_iter()
        .filter_map(|entry| {
            let tm = entry.track_metadata.filter(|tm| !tm.is_empty())?;
            let ce = entry.chart_entry_data.unwrap_or_default();

            let mut names = Vec::new();
            let mut uris = Vec::new();
            for artist in tm.artists {
                if let Some(name) = artist.name.filter(|n| !n.is_empty()) {
                    names.push(name);
                }
                if let Some(uri) = artist.spotify_uri.or(artist.uri).filter(|u| !u.is_empty()) {
                    uris.push(uri);
                }
            }

            let track_id = tm.track_uri.as_deref().or(tm.uri.as_deref()).and_then(track_id);

            Some(ChartEntry {
                chart_type: CHART_TYPE.into(),
                period: PERIOD.into(),
                date: date.clone(),
                region: region.clone(),
                retrieved_at_utc: retrieved_at.clone(),
                rank: ce.current_rank,
                previous_rank: ce.previous_rank.filter(|r| *r > 0),
                weeks_on_chart: ce.weeks_on_chart,
                track_name: tm.track_name,
                artists: non_empty(names, ", "),
                artist_uris: non_empty(uris, ";"),
                track_id,
                release_date: tm.release_date,
            })
        })
        .collect()
}
