//! VNExpress collector: listing pages and monthly sitemaps feed a links CSV,
//! articles are hydrated through the rate-limited pool, and the result is cut
//! down to whole calendar months.

pub mod article;
pub mod listing;
pub mod pipeline;
pub mod sitemap;

pub use article::{ARTICLE_HEADER, ArticleExtractor, ArticleMeta, ArticleRecord};
pub use listing::{LINK_HEADER, ListItem, ListingExtractor};
pub use pipeline::{
    FilterReport, LinkOptions, MetaOptions, Paths, SitemapOptions, crawl_links,
    crawl_meta, crawl_sitemaps, filter_months,
};
