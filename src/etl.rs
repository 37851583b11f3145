//! Cleaning steps that turn the raw CSV stores into fixed-schema tables.

pub mod spotify;
pub mod vnexpress;

pub use spotify::{CleanChartRow, Movement, SpotifyReport};
pub use vnexpress::{SummaryRow, VnexpressReport, canon_category};
