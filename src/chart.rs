//! Spotify viral-daily charts: snapshot flattening and the cached crawl.

pub mod crawl;
pub mod entry;

pub use crawl::{ChartTask, CrawlOptions, CrawlStats, crawl, tasks};
pub use entry::{ChartEntry, RAW_HEADER, Snapshot, flatten};
