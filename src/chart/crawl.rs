use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use compact_str::{CompactString, format_compact};
use serde_json::Value;

use super::entry::{RAW_HEADER, Snapshot, flatten};
use crate::{
    config::constants::CHART_TIMEOUT,
    limiter::TokenBucket,
    scrape::{FetchError, Fetched, Session},
    store::CsvSink,
    util::{DATE_FORMAT, each_day},
};

/// One (day, region) chart snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartTask {
    pub day: NaiveDate,
    pub region: CompactString,
}

impl ChartTask {
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}/viral-{}-daily/{}",
            base.trim_end_matches('/'),
            self.region,
            self.day.format(DATE_FORMAT)
        )
    }

    pub fn cache_path(&self, raw_dir: &Path) -> PathBuf {
        raw_dir.join(format!("{}_{}_viral_daily.json", self.day.format(DATE_FORMAT), self.region))
    }
}

/// Every day of `[start, end]` crossed with every region, day-major.
pub fn tasks(start: NaiveDate, end: NaiveDate, regions: &[CompactString]) -> Vec<ChartTask> {
    each_day(start, end)
        .flat_map(|day| {
            regions.iter().map(move |r| ChartTask {
                day,
                region: r.to_lowercase().into(),
            })
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct CrawlOptions {
    pub base: String,
    pub raw_dir: PathBuf,
    pub out_csv: PathBuf,
    pub resume: bool,
    pub rps: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub cached: usize,
    pub fetched: usize,
    pub not_found: usize,
    pub failed: usize,
    pub rows: usize,
}

/// Writes the snapshot next to its final path, then renames it into place so
/// an interrupted run never leaves a truncated cache file behind.
async fn write_cache(cache: &Path, value: &Value) -> anyhow::Result<()> {
    let mut part = cache.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);
    tokio::fs::write(&part, serde_json::to_vec(value)?).await?;
    tokio::fs::rename(&part, cache).await?;
    Ok(())
}

/// Reads the cached snapshot when resuming, otherwise fetches (and caches) it.
/// An unreadable cache file is fetched again.
async fn load(
    session: &Session,
    limiter: &TokenBucket,
    task: &ChartTask,
    opts: &CrawlOptions,
    stats: &mut CrawlStats,
) -> anyhow::Result<Option<Value>> {
    let cache = task.cache_path(&opts.raw_dir);

    if opts.resume && tokio::fs::try_exists(&cache).await.unwrap_or(false) {
        let bytes = tokio::fs::read(&cache).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                stats.cached += 1;
                return Ok(Some(value));
            }
            Err(e) => log::warn!(target: "chart", "corrupt cache {}: {e}, fetching again", cache.display()),
        }
    }

    limiter.acquire().await;
    let url = task.url(&opts.base);
    match session.chart_json(&url, CHART_TIMEOUT).await? {
        Fetched::NotFound => {
            stats.not_found += 1;
            Ok(None)
        }
        Fetched::Found(value) => {
            write_cache(&cache, &value)
                .await
                .with_context(|| format!("caching {}", cache.display()))?;
            stats.fetched += 1;
            Ok(Some(value))
        }
    }
}

/// Runs every task in order, appending flattened rows to `opts.out_csv`.
///
/// Per-task failures are logged and skipped; an unauthorized response aborts
/// the whole crawl.
pub async fn crawl(session: &Session, tasks: &[ChartTask], opts: &CrawlOptions) -> anyhow::Result<CrawlStats> {
    tokio::fs::create_dir_all(&opts.raw_dir).await?;
    let sink = CsvSink::append(&opts.out_csv, &RAW_HEADER)?;
    let limiter = TokenBucket::new(opts.rps, None);
    let mut stats = CrawlStats::default();

    for (i, task) in tasks.iter().enumerate() {
        let target = format_compact!("chart-{}", task.region);
        let value = match load(session, &limiter, task, opts, &mut stats).await {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(e) => {
                if e.downcast_ref::<FetchError>().is_some_and(FetchError::is_fatal) {
                    tracing::error!(target: "chart", "\x1b[31m{e}\x1b[0m");
                    return Err(e);
                }
                stats.failed += 1;
                log::warn!(target: &target, "[{}] {e:#}", task.day);
                continue;
            }
        };

        let snapshot = match serde_json::from_value::<Snapshot>(value) {
            Ok(s) => s,
            Err(e) => {
                stats.failed += 1;
                log::warn!(target: &target, "[{}] unexpected snapshot shape: {e}", task.day);
                continue;
            }
        };

        let rows = flatten(snapshot, &task.region, task.day, Utc::now());
        for row in &rows {
            sink.serialize(row)?;
        }
        stats.rows += rows.len();
        log::info!(target: &target, "\x1b[36m[{}/{}] {} +{} rows\x1b[0m", i + 1, tasks.len(), task.day, rows.len());
    }

    tracing::info!(
        target: "chart",
        "done: {} fetched, {} cached, {} missing, {} failed, {} rows → {}",
        stats.fetched, stats.cached, stats.not_found, stats.failed, stats.rows, sink.path().display()
    );
    Ok(stats)
}
