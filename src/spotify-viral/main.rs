#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::absolute_paths,
    clippy::arithmetic_side_effects,
    clippy::as_conversions,
    clippy::cast_lossless, // u32 -> u64
    clippy::cast_possible_truncation, // u64 -> u32
    clippy::cast_possible_wrap, // u32 -> i32
    clippy::cast_sign_loss, // i32 -> u32
    clippy::option_if_let_else,
    clippy::future_not_send,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::host_endian_bytes,
    clippy::implicit_return,
    clippy::indexing_slicing,
    clippy::inline_always,
    clippy::integer_division,
    clippy::min_ident_chars,
    clippy::missing_assert_message,
    clippy::missing_trait_methods,
    clippy::module_name_repetitions,
    clippy::multiple_unsafe_ops_per_block,
    clippy::needless_pass_by_value,
    clippy::non_ascii_literal,
    clippy::single_char_lifetime_names,
    clippy::pattern_type_mismatch,
    clippy::pub_use,
    clippy::question_mark_used,
    clippy::ref_patterns,
    clippy::self_named_module_files,
    clippy::shadow_reuse,
    clippy::shadow_unrelated,
    clippy::similar_names,
    clippy::single_call_fn,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::string_add,
    clippy::unseparated_literal_suffix,
    clippy::wildcard_enum_match_arm,
    internal_features,
    non_snake_case,
)]

use std::path::PathBuf;

use compact_str::CompactString;
use tscr::config::constants::{SPOTIFY_CHARTS_BASE, SPOTIFY_RAW_CSV, SPOTIFY_RAW_DIR};

/// Crawl Spotify viral-daily charts into the raw CSV store.
#[derive(clap::Parser)]
#[command(version)]
struct Args {
    /// Chart regions, e.g. `global vn us`
    #[arg(long, num_args = 1.., default_values = ["global", "vn"])]
    regions: Vec<String>,
    /// First day, YYYY-MM-DD
    #[arg(long)]
    start: chrono::NaiveDate,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long)]
    end: chrono::NaiveDate,
    /// Network requests per second
    #[arg(long, default_value_t = 0.30)]
    rps: f64,
    /// Reuse cached JSON snapshots instead of fetching them again
    #[arg(long)]
    resume: bool,
    #[arg(long, env = "SPOTIFY_BEARER", hide_env_values = true)]
    token: String,
    #[arg(long, default_value = SPOTIFY_RAW_DIR)]
    raw_dir: PathBuf,
    #[arg(long, default_value = SPOTIFY_RAW_CSV)]
    out: PathBuf,
    #[arg(long, default_value = SPOTIFY_CHARTS_BASE)]
    base: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;
    use tscr::{chart, scrape};

    pretty_env_logger::init_timed();
    let args = Args::parse();

    if args.token.trim().is_empty() {
        anyhow::bail!("SPOTIFY_BEARER is empty");
    }
    if args.end < args.start {
        anyhow::bail!("--end {} is before --start {}", args.end, args.start);
    }

    let regions = args.regions.iter().map(|r| CompactString::from(r.trim())).collect::<Vec<_>>();
    let tasks = chart::tasks(args.start, args.end, &regions);
    tracing::info!(
        target: "chart",
        "regions {regions:?}, {} → {}, {} tasks, rps={} resume={}",
        args.start, args.end, tasks.len(), args.rps, args.resume
    );

    let session = scrape::Session::new(scrape::bearer(&args.token)?);
    let opts = chart::CrawlOptions {
        base: args.base,
        raw_dir: args.raw_dir,
        out_csv: args.out,
        resume: args.resume,
        rps: args.rps,
    };
    chart::crawl(&session, &tasks, &opts).await?;
    Ok(())
}
