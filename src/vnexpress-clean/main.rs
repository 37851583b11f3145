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
    window::{self, Selection, TrailingPolicy, YearMonth},
};

/// Clean hydrated VNExpress articles into whole-month data plus a summary.
#[derive(clap::Parser)]
#[command(version)]
struct Args {
    #[arg(long, env = "VNE_DATA_DIR", default_value = VNE_DATA_DIR)]
    data_dir: PathBuf,
    /// Defaults to `<data-dir>/data_raw/vnexpress_articles_raw.csv`
    #[arg(long)]
    inp: Option<PathBuf>,
    /// Defaults to `<data-dir>/data_clean/clean_data.csv`
    #[arg(long)]
    out: Option<PathBuf>,
    /// Defaults to `summary.csv` next to the clean file
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Whole months to start the trailing window with
    #[arg(long, default_value_t = 3)]
    n_months: u32,
    #[arg(long, default_value_t = 1000)]
    min_rows: usize,
    #[arg(long, default_value_t = 24)]
    max_months: u32,
    #[arg(long, requires = "to")]
    from: Option<YearMonth>,
    #[arg(long, requires = "from")]
    to: Option<YearMonth>,
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();
    let args = Args::parse();

    let inp = args
        .inp
        .unwrap_or_else(|| args.data_dir.join("data_raw").join("vnexpress_articles_raw.csv"));
    let out = args
        .out
        .unwrap_or_else(|| args.data_dir.join("data_clean").join("clean_data.csv"));
    let summary = args
        .summary
        .unwrap_or_else(|| out.with_file_name("summary.csv"));

    let selection = match (args.from, args.to) {
        (Some(from), Some(to)) => Selection::Absolute(window::absolute(from, to)),
        _ => Selection::Trailing(TrailingPolicy {
            min_months: args.n_months,
            max_months: args.max_months,
            min_rows: args.min_rows,
        }),
    };

    if tscr::etl::vnexpress::clean(&inp, &out, &summary, selection)?.is_none() {
        anyhow::bail!("no dated article in {}", inp.display());
    }
    Ok(())
}
