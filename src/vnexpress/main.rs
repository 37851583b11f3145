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

use tscr::{
    config::constants::VNE_DATA_DIR,
    news::{self, LinkOptions, MetaOptions, Paths, SitemapOptions},
    scrape::{self, RetryPolicy, Session},
    window::{self, Selection, TrailingPolicy, YearMonth},
};

/// VNExpress collector: listing/sitemap links, article metadata, month filter.
#[derive(clap::Parser)]
#[command(version)]
struct Args {
    /// Holds `data_raw/` and `data_clean/`
    #[arg(long, env = "VNE_DATA_DIR", default_value = VNE_DATA_DIR, global = true)]
    data_dir: PathBuf,
    /// Retries for a failed page fetch
    #[arg(long, default_value_t = 5, global = true)]
    retries: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct LinkArgs {
    #[arg(long, default_value_t = 30)]
    pages_per_category: u32,
}

#[derive(clap::Args)]
struct MetaArgs {
    #[arg(long, default_value_t = 10)]
    concurrency: usize,
    /// Requests per second across all workers
    #[arg(long, default_value_t = 4.0)]
    rps: f64,
    /// Only the first N links are hydrated, 0 for all
    #[arg(long, default_value_t = 2000)]
    max_links: usize,
}

#[derive(clap::Args)]
struct FilterArgs {
    #[arg(long, default_value_t = 1000)]
    min_rows: usize,
    #[arg(long, default_value_t = 6)]
    max_months: u32,
    /// First month of an absolute range, YYYY-MM (requires --to)
    #[arg(long, requires = "to")]
    from: Option<YearMonth>,
    /// Last month of an absolute range, YYYY-MM (requires --from)
    #[arg(long, requires = "from")]
    to: Option<YearMonth>,
}

impl FilterArgs {
    fn selection(&self) -> Selection {
        match (self.from, self.to) {
            (Some(from), Some(to)) => Selection::Absolute(window::absolute(from, to)),
            _ => Selection::Trailing(TrailingPolicy {
                min_months: 1,
                max_months: self.max_months,
                min_rows: self.min_rows,
            }),
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Walk category listing pages and append new article links
    Links(LinkArgs),
    /// Sample article links from the monthly sitemaps
    Sitemap {
        /// Months to sample, YYYY-MM
        #[arg(long, num_args = 1.., required = true)]
        months: Vec<YearMonth>,
        #[arg(long, default_value_t = 220)]
        max_per_month: usize,
        #[arg(long, default_value_t = 1200)]
        hard_cap: usize,
    },
    /// Fetch article metadata for every link not hydrated yet
    Meta(MetaArgs),
    /// Keep whole calendar months of the hydrated articles
    Filter(FilterArgs),
    /// links, then meta, then filter
    All {
        #[command(flatten)]
        links: LinkArgs,
        #[command(flatten)]
        meta: MetaArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

fn link_options(args: &LinkArgs, policy: RetryPolicy) -> LinkOptions {
    LinkOptions {
        pages_per_category: args.pages_per_category,
        policy,
        ..LinkOptions::default()
    }
}

fn meta_options(args: &MetaArgs, policy: RetryPolicy) -> MetaOptions {
    MetaOptions {
        concurrency: args.concurrency,
        rps: args.rps,
        max_links: args.max_links,
        policy,
    }
}

fn filter(paths: &Paths, args: &FilterArgs) -> anyhow::Result<()> {
    if news::filter_months(paths, args.selection())?.is_none() {
        tracing::warn!(target: "filter", "nothing written");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();
    let args = Args::parse();

    let paths = Paths::new(&args.data_dir);
    let policy = RetryPolicy { retries: args.retries, ..RetryPolicy::default() };
    let session = Session::new(scrape::basic()?);

    match args.command {
        Commands::Links(links) => {
            news::crawl_links(&session, &paths, &link_options(&links, policy)).await?;
        }
        Commands::Sitemap { months, max_per_month, hard_cap } => {
            let opts = SitemapOptions {
                max_per_month,
                hard_cap,
                policy,
                ..SitemapOptions::new(months)
            };
            news::crawl_sitemaps(&session, &paths, &opts).await?;
        }
        Commands::Meta(meta) => {
            news::crawl_meta(&session, &paths, &meta_options(&meta, policy)).await?;
        }
        Commands::Filter(args) => filter(&paths, &args)?,
        Commands::All { links, meta, filter: filter_args } => {
            news::crawl_links(&session, &paths, &link_options(&links, policy)).await?;
            news::crawl_meta(&session, &paths, &meta_options(&meta, policy)).await?;
            filter(&paths, &filter_args)?;
        }
    }

    tracing::info!(target: "vnexpress", "\x1b[32mfinished\x1b[0m, {} requests sent", session.requests_sent());
    Ok(())
}
