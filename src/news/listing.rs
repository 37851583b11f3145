use hashbrown::HashSet;
use reqwest::Url;
use scraper::{Html, Selector};

pub const LINK_HEADER: [&str; 3] = ["Title", "Url", "Category"];

/// Candidate article anchors, most specific first.
const ITEM_SELECTORS: [&str; 6] = [
    "article.item-news h3.title-news a",
    "article.item-news h3.title a",
    ".list-news .item-news h3.title-news a",
    "h3.title-news a",
    "h3.title a",
    "a.thumb",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListItem {
    pub title: String,
    pub url: String,
}

pub struct ListingExtractor {
    selectors: Vec<Selector>,
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingExtractor {
    pub fn new() -> Self {
        Self {
            selectors: ITEM_SELECTORS
                .iter()
                .map(|s| Selector::parse(s).unwrap())
                .collect(),
        }
    }

    /// Article links of one listing page, in selector order, without
    /// duplicates. Root-relative hrefs are resolved against `base`.
    pub fn extract(&self, html: &str, base: &Url) -> Vec<ListItem> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for sel in &self.selectors {
            for a in document.select(sel) {
                let Some(href) = a.attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
                    continue;
                };
                let url = if href.starts_with('/') {
                    match base.join(href) {
                        Ok(u) => u.to_string(),
                        Err(_) => continue,
                    }
                } else {
                    href.to_owned()
                };
                if !seen.insert(url.clone()) {
                    continue;
                }

                let mut title = a.text().map(str::trim).collect::<String>();
                if title.is_empty() {
                    title = a.attr("title").unwrap_or_default().trim().to_owned();
                }
                items.push(ListItem { title, url });
            }
        }
        items
    }
}

/// Page `p` of a category listing: the base URL itself, then `<base>-p<p>`.
pub fn page_url(base: &str, page: u32) -> String {
    if page <= 1 {
        base.to_owned()
    } else {
        format!("{base}-p{page}")
    }
}
