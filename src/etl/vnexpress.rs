use std::path::Path;

use chrono::NaiveDateTime;
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use serde::Serialize;

use crate::{
    config::{CATEGORY_CANON, CATEGORY_OTHER},
    store::{Table, write_table},
    util::{DATETIME_FORMAT, parse_stamp},
    window::{MonthWindow, Selection, YearMonth},
};

pub const CLEAN_HEADER: [&str; 4] = ["Title", "Date", "Category", "Description"];
pub const SUMMARY_HEADER: [&str; 3] = ["Month", "Count", "__section__"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub date: NaiveDateTime,
    pub category: String,
    pub description: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CleanRecord<'a> {
    title: &'a str,
    date: String,
    category: &'a str,
    description: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Month")]
    pub label: String,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "__section__")]
    pub section: &'static str,
}

/// Folds known spellings of a section into its canonical name. Matching is a
/// case-insensitive substring test; unknown names are kept trimmed, empty ones
/// become [`CATEGORY_OTHER`].
pub fn canon_category(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return CATEGORY_OTHER.to_owned();
    }
    let lower = raw.to_lowercase();
    CATEGORY_CANON
        .iter()
        .find(|(_, variants)| variants.iter().any(|v| lower.contains(&v.to_lowercase())))
        .map_or_else(|| raw.to_owned(), |(canon, _)| (*canon).to_owned())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VnexpressReport {
    pub read: usize,
    pub undated: usize,
    pub duplicates: usize,
    pub window: MonthWindow,
    pub kept: usize,
}

/// Dated, canonicalized and deduplicated articles in file order. Dates with
/// an offset are converted to UTC.
pub fn load_articles(table: &Table) -> (Vec<Article>, usize, usize) {
    let [title, date, category, description] = CLEAN_HEADER.map(|h| table.column(h));
    let url = table.column("Url");

    let mut seen_urls = HashSet::<CompactString>::new();
    let mut seen_titles = HashSet::<(String, NaiveDateTime)>::new();
    let (mut undated, mut duplicates) = (0, 0);
    let mut out = Vec::new();

    for row in &table.rows {
        let Some(at) = parse_stamp(date.get(row)).map(|s| s.utc_naive()) else {
            undated += 1;
            continue;
        };
        let article = Article {
            title: title.get(row).trim().to_owned(),
            date: at,
            category: canon_category(category.get(row)),
            description: description.get(row).trim().to_owned(),
        };

        let link = url.get(row).trim();
        let fresh = if link.is_empty() {
            seen_titles.insert((article.title.clone(), at))
        } else {
            seen_urls.insert(link.into())
        };
        if fresh {
            out.push(article);
        } else {
            duplicates += 1;
        }
    }
    (out, undated, duplicates)
}

/// Per-month counts (chronological) followed by per-category counts (most
/// frequent first).
pub fn summarize(articles: &[Article]) -> Vec<SummaryRow> {
    let mut months = HashMap::<YearMonth, usize>::new();
    let mut categories = HashMap::<&str, usize>::new();
    for a in articles {
        *months.entry(YearMonth::of(a.date)).or_default() += 1;
        *categories.entry(a.category.as_str()).or_default() += 1;
    }

    let mut months = months.into_iter().collect::<Vec<_>>();
    months.sort_unstable();
    let mut categories = categories.into_iter().collect::<Vec<_>>();
    categories.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let by_month = months.into_iter().map(|(m, count)| SummaryRow {
        label: m.to_string(),
        count,
        section: "ByMonth",
    });
    let by_category = categories.into_iter().map(|(c, count)| SummaryRow {
        label: c.to_owned(),
        count,
        section: "ByCategory",
    });
    by_month.chain(by_category).collect()
}

/// Cleans the article file into `output` and writes the summary next to it.
/// Returns `None` when no row carries a valid date.
pub fn clean(
    input: &Path,
    output: &Path,
    summary: &Path,
    selection: Selection,
) -> anyhow::Result<Option<VnexpressReport>> {
    let table = Table::read(input, false)?;
    if table.is_empty() {
        tracing::warn!(target: "etl", "{} has no rows", input.display());
        return Ok(None);
    }

    let (mut articles, undated, duplicates) = load_articles(&table);
    let times = articles.iter().map(|a| a.date).collect::<Vec<_>>();
    let Some(window) = selection.resolve(&times) else {
        tracing::warn!(target: "etl", "no valid date in {}", input.display());
        return Ok(None);
    };

    articles.retain(|a| window.contains(a.date));
    articles.sort_by_key(|a| a.date);

    let records = articles.iter().map(|a| CleanRecord {
        title: &a.title,
        date: a.date.format(DATETIME_FORMAT).to_string(),
        category: &a.category,
        description: &a.description,
    });
    let kept = write_table(output, &CLEAN_HEADER, records, true)?;
    let lines = write_table(summary, &SUMMARY_HEADER, summarize(&articles), true)?;

    tracing::info!(
        target: "etl",
        "\x1b[32mvnexpress\x1b[0m: {window} ({} months), kept {kept} of {}, {undated} undated, {duplicates} duplicates",
        window.months(), table.rows.len()
    );
    tracing::info!(target: "etl", "clean → {} | summary ({lines} lines) → {}", output.display(), summary.display());

    Ok(Some(VnexpressReport {
        read: table.rows.len(),
        undated,
        duplicates,
        window,
        kept,
    }))
}
