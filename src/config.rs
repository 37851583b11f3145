//! Build-time defaults and the static site tables.
//!
//! Every default can be overridden at compile time through the environment
//! (`VNE_DATA_DIR=... cargo build`) and most of them again at run time through
//! the command line of each binary.

macro_rules! env_or_default {
    ($name:expr, $default:expr) => {
        if let Some(s) = option_env!($name) {
            s
        } else {
            $default
        }
    };
}

pub mod constants {
    use core::time::Duration;

    pub const USER_AGENT: &str = env_or_default!(
        "SCRAPER_USER_AGENT",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
    );
    pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
    pub const ACCEPT_LANGUAGE: &str = "vi-VN,vi;q=0.9,en-US;q=0.8";

    pub const VNE_DATA_DIR: &str = env_or_default!("VNE_DATA_DIR", "data");
    pub const VNE_SITEMAP_INDEX: &str = env_or_default!("VNE_SITEMAP_INDEX", "https://vnexpress.net/sitemap.xml");

    pub const SPOTIFY_CHARTS_BASE: &str = env_or_default!(
        "SPOTIFY_CHARTS_BASE",
        "https://charts-spotify-com-service.spotify.com/auth/v0/charts"
    );
    pub const SPOTIFY_RAW_DIR: &str = env_or_default!("SPOTIFY_RAW_DIR", "data_raw/raw_json");
    pub const SPOTIFY_RAW_CSV: &str = env_or_default!("SPOTIFY_RAW_CSV", "data_raw/spotify_viral_global_vn.csv");
    pub const SPOTIFY_CLEAN_CSV: &str = env_or_default!("SPOTIFY_CLEAN_CSV", "data_clean/clean_data.csv");

    pub const LISTING_TIMEOUT: Duration = Duration::from_secs(20);
    pub const ARTICLE_TIMEOUT: Duration = Duration::from_secs(15);
    pub const CHART_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

    /// Used when a 429 carries no usable `Retry-After`.
    pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);
}

/// VNExpress sections crawled by the listing collector, with their first page.
#[rustfmt::skip]
pub const CATEGORIES: [(&str, &str); 12] = [
    ("Thời sự",    "https://vnexpress.net/thoi-su"),
    ("Kinh doanh", "https://vnexpress.net/kinh-doanh"),
    ("Thế giới",   "https://vnexpress.net/the-gioi"),
    ("Giải trí",   "https://vnexpress.net/giai-tri"),
    ("Thể thao",   "https://vnexpress.net/the-thao"),
    ("Pháp luật",  "https://vnexpress.net/phap-luat"),
    ("Giáo dục",   "https://vnexpress.net/giao-duc"),
    ("Sức khỏe",   "https://vnexpress.net/suc-khoe"),
    ("Đời sống",   "https://vnexpress.net/doi-song"),
    ("Du lịch",    "https://vnexpress.net/du-lich"),
    ("Khoa học",   "https://vnexpress.net/khoa-hoc"),
    ("Số hóa",     "https://vnexpress.net/so-hoa"),
];

/// Canonical category name and the spellings folded into it.
#[rustfmt::skip]
pub const CATEGORY_CANON: [(&str, &[&str]); 5] = [
    ("Thời sự",    &["Thời sự", "Thoi su"]),
    ("Kinh doanh", &["Kinh doanh", "Kinh tế"]),
    ("Thế giới",   &["Thế giới", "The gioi"]),
    ("Giải trí",   &["Giải trí", "Giai tri"]),
    ("Thể thao",   &["Thể thao", "The thao"]),
];

pub const CATEGORY_OTHER: &str = "Khác";
