use core::time::Duration;
use std::path::{Path, PathBuf};

use anyhow::Context;
use compact_str::{CompactString, format_compact};
use reqwest::Url;

use super::{
    article::{ARTICLE_HEADER, ArticleExtractor, ArticleRecord},
    listing::{LINK_HEADER, ListingExtractor, page_url},
    sitemap,
};
use crate::{
    config::{
        CATEGORIES,
        constants::{ARTICLE_TIMEOUT, LISTING_TIMEOUT, VNE_SITEMAP_INDEX},
    },
    limiter::TokenBucket,
    pool::{self, PoolStats},
    scrape::{RetryPolicy, Session},
    store::{CsvSink, Table, load_column, write_table},
    util::{DATETIME_FORMAT, jitter, parse_stamp},
    window::{MonthWindow, Selection, YearMonth},
};

/// File layout of one data directory.
#[derive(Clone, Debug)]
pub struct Paths {
    pub links: PathBuf,
    pub articles: PathBuf,
    pub clean: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            links: dir.join("data_raw").join("vnexpress_links.csv"),
            articles: dir.join("data_raw").join("vnexpress_articles_raw.csv"),
            clean: dir.join("data_clean").join("vnexpress_clean.csv"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LinkOptions {
    pub pages_per_category: u32,
    pub categories: Vec<(CompactString, String)>,
    /// Random pause between two pages, in seconds.
    pub pause: (f64, f64),
    /// Multiplied by the number of consecutive failures.
    pub fail_backoff: Duration,
    pub max_fails: u32,
    pub policy: RetryPolicy,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            pages_per_category: 30,
            categories: CATEGORIES.iter().map(|(name, url)| ((*name).into(), (*url).to_owned())).collect(),
            pause: (0.6, 1.6),
            fail_backoff: Duration::from_millis(2500),
            max_fails: 3,
            policy: RetryPolicy::default(),
        }
    }
}

/// Walks the listing pages of every category and appends unseen article
/// links. Returns the number of new links.
pub async fn crawl_links(session: &Session, paths: &Paths, opts: &LinkOptions) -> anyhow::Result<usize> {
    let mut seen = load_column(&paths.links, "Url")?;
    let sink = CsvSink::append(&paths.links, &LINK_HEADER)?;
    let extractor = ListingExtractor::new();
    let mut total_new = 0;

    for (category, base) in &opts.categories {
        let target = format_compact!("links-{category}");
        let base_url = Url::parse(base).with_context(|| format!("bad category url {base}"))?;
        tracing::info!(target: "links", "\x1b[1m==> [{category}]\x1b[0m {base}");

        let mut fails = 0;
        for page in 1..=opts.pages_per_category {
            let url = page_url(base, page);
            let html = match session.html(&url, LISTING_TIMEOUT, opts.policy).await {
                Ok(html) => html,
                Err(e) => {
                    fails += 1;
                    log::warn!(target: &target, "page {page} failed ({fails}): {e}");
                    if fails >= opts.max_fails {
                        log::warn!(target: &target, "\x1b[31mskipping category\x1b[0m");
                        break;
                    }
                    tokio::time::sleep(opts.fail_backoff * fails).await;
                    continue;
                }
            };
            fails = 0;

            let items = extractor.extract(&html, &base_url);
            if items.is_empty() {
                log::info!(target: &target, "page {page}: empty, category done");
                break;
            }

            let mut fresh = 0;
            for item in items {
                if seen.insert(item.url.as_str().into()) {
                    sink.write([item.title.as_str(), item.url.as_str(), category.as_str()])?;
                    fresh += 1;
                }
            }
            total_new += fresh;
            log::info!(target: &target, "page {page}: \x1b[32m+{fresh}\x1b[0m (total new {total_new})");

            tokio::time::sleep(jitter(opts.pause.0, opts.pause.1)).await;
        }
    }

    tracing::info!(target: "links", "\x1b[32mdone\x1b[0m: {total_new} new links → {}", sink.path().display());
    Ok(total_new)
}

#[derive(Clone, Debug)]
pub struct SitemapOptions {
    pub index_url: String,
    pub months: Vec<YearMonth>,
    pub max_per_month: usize,
    pub hard_cap: usize,
    pub policy: RetryPolicy,
}

impl SitemapOptions {
    pub fn new(months: Vec<YearMonth>) -> Self {
        Self {
            index_url: VNE_SITEMAP_INDEX.to_owned(),
            months,
            max_per_month: 220,
            hard_cap: 1200,
            policy: RetryPolicy::default(),
        }
    }
}

async fn fetch_locs(session: &Session, url: &str, policy: RetryPolicy) -> anyhow::Result<Vec<String>> {
    let xml = session.html(url, LISTING_TIMEOUT, policy).await?;
    sitemap::parse_locs(&xml).with_context(|| format!("malformed sitemap {url}"))
}

/// Samples article URLs from the monthly sitemaps of `opts.months` and appends
/// the unseen ones as link rows without title or category. Returns the number
/// of new links.
pub async fn crawl_sitemaps(session: &Session, paths: &Paths, opts: &SitemapOptions) -> anyhow::Result<usize> {
    let index = fetch_locs(session, &opts.index_url, opts.policy).await?;
    let maps = sitemap::month_sitemaps(&index, &opts.months);
    if maps.is_empty() {
        tracing::warn!(target: "sitemap", "no sitemap in {} matches the requested months", opts.index_url);
        return Ok(0);
    }

    let mut seen = load_column(&paths.links, "Url")?;
    let sink = CsvSink::append(&paths.links, &LINK_HEADER)?;
    let (mut taken, mut total_new) = (0, 0);

    for (month, url) in maps {
        if taken >= opts.hard_cap {
            break;
        }
        let locs = match fetch_locs(session, &url, opts.policy).await {
            Ok(locs) => locs,
            Err(e) => {
                tracing::warn!(target: "sitemap", "{month}: {e:#}");
                continue;
            }
        };
        let picked = sitemap::sample(locs, opts.max_per_month.min(opts.hard_cap - taken));
        let mut fresh = 0;
        for loc in &picked {
            if seen.insert(loc.as_str().into()) {
                sink.write(["", loc.as_str(), ""])?;
                fresh += 1;
            }
        }
        taken += picked.len();
        total_new += fresh;
        tracing::info!(target: "sitemap", "{month} {url}: took {}, \x1b[32m+{fresh}\x1b[0m new", picked.len());
    }

    tracing::info!(target: "sitemap", "\x1b[32mdone\x1b[0m: {total_new} new links → {}", sink.path().display());
    Ok(total_new)
}

#[derive(Clone, Debug)]
pub struct MetaOptions {
    pub concurrency: usize,
    pub rps: f64,
    /// At most this many link rows are considered; `0` means no cap.
    pub max_links: usize,
    pub policy: RetryPolicy,
}

impl Default for MetaOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            rps: 4.0,
            max_links: 2000,
            policy: RetryPolicy::default(),
        }
    }
}

struct LinkRow {
    title: String,
    url: String,
    category: String,
}

fn pending_links(paths: &Paths, max_links: usize) -> anyhow::Result<Vec<LinkRow>> {
    if !paths.links.exists() {
        anyhow::bail!("{} does not exist, collect links first", paths.links.display());
    }
    let table = Table::read(&paths.links, false)?;
    let (title, url, category) = (table.column("Title"), table.column("Url"), table.column("Category"));
    if !url.exists() {
        anyhow::bail!("{} has no Url column", paths.links.display());
    }

    let cap = if max_links == 0 { usize::MAX } else { max_links };
    if table.rows.len() > cap {
        tracing::info!(target: "meta", "capping to the first {cap} of {} links", table.rows.len());
    }

    let mut done = load_column(&paths.articles, "Url")?;
    let before = done.len();
    let rows = table
        .rows
        .iter()
        .take(cap)
        .filter(|row| {
            let u = url.get(row).trim();
            !u.is_empty() && done.insert(u.into())
        })
        .map(|row| LinkRow {
            title: title.get(row).trim().to_owned(),
            url: url.get(row).trim().to_owned(),
            category: category.get(row).trim().to_owned(),
        })
        .collect::<Vec<_>>();

    if before > 0 {
        tracing::info!(target: "meta", "resume: {before} articles already hydrated");
    }
    Ok(rows)
}

/// Hydrates every pending link through the worker pool, appending one article
/// row per success. URLs already in the article file are skipped, so a failed
/// or interrupted run is finished by running it again.
pub async fn crawl_meta(session: &Session, paths: &Paths, opts: &MetaOptions) -> anyhow::Result<PoolStats> {
    let links = pending_links(paths, opts.max_links)?;
    let sink = CsvSink::append(&paths.articles, &ARTICLE_HEADER)?;
    if links.is_empty() {
        tracing::info!(target: "meta", "nothing to hydrate");
        return Ok(PoolStats::default());
    }

    let limiter = TokenBucket::new(opts.rps, Some(opts.rps * 2.0));
    let extractor = ArticleExtractor::new();
    let policy = opts.policy;
    tracing::info!(
        target: "meta",
        "hydrating {} links with {} workers at {} rps",
        links.len(), opts.concurrency, limiter.rate()
    );

    let (sink_ref, extractor) = (&sink, &extractor);
    let stats = pool::run(links, opts.concurrency, Some(&limiter), |link| async move {
        let html = session.html(&link.url, ARTICLE_TIMEOUT, policy).await?;
        let meta = extractor.extract(&html, &link.title, &link.category);
        sink_ref.serialize(&meta.into_record(link.url))
    })
    .await;

    tracing::info!(
        target: "meta",
        "\x1b[32mdone\x1b[0m: {} hydrated, {} failed → {}",
        stats.done, stats.failed, sink.path().display()
    );
    Ok(stats)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterReport {
    pub window: MonthWindow,
    pub rows: usize,
    pub undated: usize,
}

/// Cuts the article file down to whole calendar months and writes the clean
/// file sorted by date. Returns `None` when there is no dated article at all.
pub fn filter_months(paths: &Paths, selection: Selection) -> anyhow::Result<Option<FilterReport>> {
    if !paths.articles.exists() {
        tracing::warn!(target: "filter", "{} does not exist", paths.articles.display());
        return Ok(None);
    }
    let table = Table::read(&paths.articles, false)?;
    let [title, date, category, description, url] = ARTICLE_HEADER.map(|h| table.column(h));

    let mut dated = table
        .rows
        .iter()
        .filter_map(|row| {
            let at = parse_stamp(date.get(row))?.wall;
            Some((at, row))
        })
        .collect::<Vec<_>>();
    let undated = table.rows.len() - dated.len();
    if dated.is_empty() {
        tracing::warn!(target: "filter", "no row with a valid date in {}", paths.articles.display());
        return Ok(None);
    }

    let times = dated.iter().map(|(at, _)| *at).collect::<Vec<_>>();
    let Some(window) = selection.resolve(&times) else {
        return Ok(None);
    };

    dated.retain(|(at, _)| window.contains(*at));
    dated.sort_by_key(|(at, _)| *at);

    let records = dated.iter().map(|(at, row)| ArticleRecord {
        title: title.get(row).to_owned(),
        date: at.format(DATETIME_FORMAT).to_string(),
        category: category.get(row).to_owned(),
        description: description.get(row).to_owned(),
        url: url.get(row).to_owned(),
    });
    let rows = write_table(&paths.clean, &ARTICLE_HEADER, records, true)?;

    tracing::info!(
        target: "filter",
        "\x1b[32m{window}\x1b[0m ({} months) rows={rows}, {undated} undated dropped → {}",
        window.months(), paths.clean.display()
    );
    Ok(Some(FilterReport { window, rows, undated }))
}
