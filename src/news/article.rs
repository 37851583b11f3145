use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::Value;

use crate::util::{DATETIME_FORMAT, parse_stamp, squash_text};

pub const ARTICLE_HEADER: [&str; 5] = ["Title", "Date", "Category", "Description", "Url"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArticleMeta {
    pub title: String,
    pub date: Option<NaiveDateTime>,
    pub category: String,
    pub description: String,
}

impl ArticleMeta {
    pub fn into_record(self, url: String) -> ArticleRecord {
        ArticleRecord {
            title: self.title,
            date: self.date.map(|d| d.format(DATETIME_FORMAT).to_string()).unwrap_or_default(),
            category: self.category,
            description: self.description,
            url,
        }
    }
}

/// One row of the article CSV, in [`ARTICLE_HEADER`] order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArticleRecord {
    pub title: String,
    pub date: String,
    pub category: String,
    pub description: String,
    pub url: String,
}

/// Detail-page heuristics; every field has a metadata fallback.
pub struct ArticleExtractor {
    sel_title: Selector,
    sel_og_title: Selector,
    sel_date: Selector,
    sel_published: Selector,
    sel_ld_json: Selector,
    sel_breadcrumb: Selector,
    sel_section: Selector,
    sel_description: Selector,
    sel_meta_description: Selector,
}

impl Default for ArticleExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn content(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .find_map(|m| m.attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToOwned::to_owned)
}

fn stripped(element: ElementRef) -> String {
    element.text().map(str::trim).collect()
}

/// `datePublished` (or `dateModified`) of the first JSON-LD object carrying
/// a parseable one. Documents may be a single object or an array.
fn ld_json_date(raw: &str) -> Option<NaiveDateTime> {
    let value = serde_json::from_str::<Value>(raw).ok()?;
    let objects = match value {
        Value::Array(list) => list,
        other => vec![other],
    };
    objects.iter().find_map(|obj| {
        let v = obj
            .get("datePublished")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| obj.get("dateModified").and_then(Value::as_str))?;
        parse_stamp(v).map(|s| s.wall)
    })
}

impl ArticleExtractor {
    pub fn new() -> Self {
        let s = |css: &str| Selector::parse(css).unwrap();
        Self {
            sel_title: s("h1.title-detail, h1.title-page"),
            sel_og_title: s(r#"meta[property="og:title"]"#),
            sel_date: s("span.date, .date"),
            sel_published: s(r#"meta[property="article:published_time"]"#),
            sel_ld_json: s(r#"script[type="application/ld+json"]"#),
            sel_breadcrumb: s("ul.breadcrumb li a"),
            sel_section: s(r#"meta[property="article:section"]"#),
            sel_description: s("p.description, .sidebar-1 p.description"),
            sel_meta_description: s(r#"meta[name="description"], meta[property="og:description"]"#),
        }
    }

    pub fn extract(&self, html: &str, fallback_title: &str, fallback_category: &str) -> ArticleMeta {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.sel_title)
            .next()
            .map(stripped)
            .filter(|t| !t.is_empty())
            .or_else(|| content(&document, &self.sel_og_title))
            .unwrap_or_else(|| fallback_title.to_owned());

        let date = document
            .select(&self.sel_date)
            .next()
            .and_then(|el| parse_stamp(&squash_text(el)))
            .or_else(|| content(&document, &self.sel_published).and_then(|c| parse_stamp(&c)))
            .map(|s| s.wall)
            .or_else(|| {
                document.select(&self.sel_ld_json).find_map(|script| {
                    let raw = script.text().collect::<String>();
                    ld_json_date(&raw)
                })
            });

        let category = document
            .select(&self.sel_breadcrumb)
            .next()
            .map(stripped)
            .filter(|c| !c.is_empty())
            .or_else(|| content(&document, &self.sel_section))
            .unwrap_or_else(|| fallback_category.to_owned());

        let description = document
            .select(&self.sel_description)
            .next()
            .map(squash_text)
            .or_else(|| content(&document, &self.sel_meta_description))
            .unwrap_or_default();

        ArticleMeta {
            title,
            date,
            category,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn full_detail_page() {
        let html = r#"
            <html><head>
              <meta property="og:title" content="OG title">
              <meta name="description" content="meta desc">
            </head><body>
              <ul class="breadcrumb"><li><a href="/the-thao"> Thể thao </a></li><li><a>Bóng đá</a></li></ul>
              <span class="date">Thứ năm, 4/9/2025, 21:05 (GMT+7)</span>
              <h1 class="title-detail">  Tiêu đề bài viết </h1>
              <p class="description"><span class="location">Hà Nội</span> Mô tả ngắn.</p>
            </body></html>
        "#;
        let meta = ArticleExtractor::new().extract(html, "fallback", "Khác");
        assert_eq!(meta.title, "Tiêu đề bài viết");
        assert_eq!(meta.date, Some(dt("2025-09-04 21:05:00")));
        assert_eq!(meta.category, "Thể thao");
        assert_eq!(meta.description, "Hà Nội Mô tả ngắn.");
    }

    #[test]
    fn metadata_fallbacks() {
        let html = r#"
            <html><head>
              <meta property="og:title" content=" OG title ">
              <meta property="article:section" content="Kinh doanh">
              <meta property="og:description" content="og desc">
              <script type="application/ld+json">not json</script>
              <script type="application/ld+json">[{"@type":"Org"},{"datePublished":"2025-08-01T07:00:00+07:00"}]</script>
            </head><body></body></html>
        "#;
        let meta = ArticleExtractor::new().extract(html, "fallback", "Khác");
        assert_eq!(meta.title, "OG title");
        assert_eq!(meta.date, Some(dt("2025-08-01 07:00:00")));
        assert_eq!(meta.category, "Kinh doanh");
        assert_eq!(meta.description, "og desc");
    }

    #[test]
    fn published_time_before_ld_json() {
        let html = r#"<head>
            <meta property="article:published_time" content="2025-07-15T10:20:30+07:00">
            <script type="application/ld+json">{"datePublished":"2020-01-01T00:00:00Z"}</script>
        </head>"#;
        let meta = ArticleExtractor::new().extract(html, "T", "C");
        assert_eq!(meta.date, Some(dt("2025-07-15 10:20:30")));
        assert_eq!((meta.title.as_str(), meta.category.as_str()), ("T", "C"));
        assert_eq!(meta.description, "");
    }

    #[test]
    fn record_formats_date() {
        let meta = ArticleMeta {
            title: "t".into(),
            date: Some(dt("2025-01-02 03:04:05")),
            category: "c".into(),
            description: String::new(),
        };
        let rec = meta.into_record("https://x".into());
        assert_eq!(rec.date, "2025-01-02 03:04:05");
        assert_eq!(rec.url, "https://x");
    }
}
