mod common;

use std::fs;

use chrono::NaiveDate;
use common::{Reply, Server, session};
use compact_str::CompactString;
use tscr::{
    chart::{self, CrawlOptions},
    etl::spotify,
    scrape::FetchError,
    store::Table,
};

fn snapshot(day: &str) -> String {
    let (rank_a, prev_a) = if day.ends_with("01") { (1, 0) } else { (2, 1) };
    format!(
        r#"{{"entries":[
            {{"chartEntryData":{{"currentRank":{rank_a},"previousRank":{prev_a},"weeksOnChart":1}},
              "trackMetadata":{{"trackName":"Alpha","trackUri":"spotify:track:a1","artists":[{{"name":"X","spotifyUri":"spotify:artist:x"}}]}}}},
            {{"chartEntryData":{{"currentRank":3,"previousRank":3}},
              "trackMetadata":{{"trackName":"Beta","trackUri":"spotify:track:b2","artists":[{{"name":"Y"}},{{"name":"Z"}}]}}}},
            {{"chartEntryData":{{"currentRank":4}}}}
        ]}}"#
    )
}

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn options(server: &Server, dir: &tempfile::TempDir, resume: bool) -> CrawlOptions {
    CrawlOptions {
        base: server.base.clone(),
        raw_dir: dir.path().join("raw_json"),
        out_csv: dir.path().join("raw.csv"),
        resume,
        rps: 1000.0,
    }
}

#[tokio::test]
async fn resume_reads_cache_without_network() {
    let server = Server::start(|path, _| {
        let day = path.rsplit('/').next().unwrap_or_default();
        if path.contains("-us-") { Reply::status(404) } else { Reply::ok(snapshot(day)) }
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let regions = [CompactString::from("vn"), CompactString::from("US")];
    let tasks = chart::tasks(day("2025-07-01"), day("2025-07-02"), &regions);

    let first = session();
    let stats = chart::crawl(&first, &tasks, &options(&server, &dir, false)).await.unwrap();
    assert_eq!((stats.fetched, stats.not_found, stats.rows), (2, 2, 4));
    assert_eq!(first.requests_sent(), 4);
    assert!(dir.path().join("raw_json/2025-07-02_vn_viral_daily.json").exists());

    let second = session();
    let stats = chart::crawl(&second, &tasks[..1], &options(&server, &dir, true)).await.unwrap();
    assert_eq!((stats.cached, stats.fetched, stats.rows), (1, 0, 2));
    assert_eq!(second.requests_sent(), 0);
    assert_eq!(server.total_hits(), 4);

    let table = Table::read(&dir.path().join("raw.csv"), false).unwrap();
    assert_eq!(table.rows.len(), 6);
    assert_eq!(table.headers[0], "chart_type");
}

#[tokio::test]
async fn unauthorized_aborts_the_crawl() {
    let server = Server::start(|path, _| {
        if path.ends_with("2025-07-02") { Reply::status(401) } else { Reply::ok(snapshot("2025-07-01")) }
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let tasks = chart::tasks(day("2025-07-01"), day("2025-07-03"), &["global".into()]);

    let err = chart::crawl(&session(), &tasks, &options(&server, &dir, false)).await.unwrap_err();
    assert!(err.downcast_ref::<FetchError>().is_some_and(FetchError::is_fatal));
    assert_eq!(server.total_hits(), 2);
}

#[tokio::test]
async fn crawl_then_clean() {
    let server = Server::start(|path, _| Reply::ok(snapshot(path.rsplit('/').next().unwrap_or_default()))).await;
    let dir = tempfile::tempdir().unwrap();
    let tasks = chart::tasks(day("2025-07-01"), day("2025-07-02"), &["vn".into()]);
    let opts = options(&server, &dir, false);
    chart::crawl(&session(), &tasks, &opts).await.unwrap();
    // a second pass appends the same snapshots again
    chart::crawl(&session(), &tasks, &CrawlOptions { resume: true, ..opts.clone() }).await.unwrap();

    let out = dir.path().join("clean/clean_data.csv");
    let report = spotify::clean(&opts.out_csv, &out).unwrap();
    assert_eq!(report.duplicates, 4);
    assert_eq!(report.written, 4);

    let text = fs::read_to_string(&out).unwrap();
    let lines = text.trim_start_matches('\u{feff}').lines().collect::<Vec<_>>();
    assert_eq!(
        lines,
        [
            "date,region,chart_type,rank,previous_rank,rank_delta,movement,track_name,artists,release_date",
            "2025-07-01,vn,viral_daily,1,,,NEW,Alpha,X,",
            "2025-07-01,vn,viral_daily,3,3,0,SAME,Beta,\"Y, Z\",",
            "2025-07-02,vn,viral_daily,2,1,-1,DOWN,Alpha,X,",
            "2025-07-02,vn,viral_daily,3,3,0,SAME,Beta,\"Y, Z\",",
        ]
    );

    let again = dir.path().join("clean/again.csv");
    let report = spotify::clean(&out, &again).unwrap();
    assert_eq!(report.duplicates, 0);
    assert_eq!(fs::read(&out).unwrap(), fs::read(&again).unwrap());
}

#[tokio::test]
async fn item_errors_are_skipped() {
    let server = Server::start(|path, _| {
        if path.ends_with("2025-07-02") {
            Reply::status(500)
        } else if path.ends_with("2025-07-03") {
            Reply::ok(r#"{"entries": [truncated"#)
        } else {
            Reply::ok(snapshot(path.rsplit('/').next().unwrap_or_default()))
        }
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let tasks = chart::tasks(day("2025-07-01"), day("2025-07-04"), &["vn".into()]);

    let stats = chart::crawl(&session(), &tasks, &options(&server, &dir, false)).await.unwrap();
    assert_eq!((stats.fetched, stats.failed, stats.rows), (2, 2, 4));
    assert_eq!(server.hits("/viral-vn-daily/2025-07-04"), 1);
    assert!(!dir.path().join("raw_json/2025-07-02_vn_viral_daily.json").exists());
    assert!(!dir.path().join("raw_json/2025-07-03_vn_viral_daily.json").exists());
}

#[tokio::test]
async fn truncated_cache_is_fetched_again() {
    let server = Server::start(|path, _| Reply::ok(snapshot(path.rsplit('/').next().unwrap_or_default()))).await;
    let dir = tempfile::tempdir().unwrap();
    let tasks = chart::tasks(day("2025-07-01"), day("2025-07-02"), &["vn".into()]);
    let cache = dir.path().join("raw_json/2025-07-01_vn_viral_daily.json");
    fs::create_dir_all(cache.parent().unwrap()).unwrap();
    fs::write(&cache, r#"{"entries":[{"chartEnt"#).unwrap();

    let stats = chart::crawl(&session(), &tasks, &options(&server, &dir, true)).await.unwrap();
    assert_eq!((stats.cached, stats.fetched, stats.failed), (0, 2, 0));
    assert_eq!(server.hits("/viral-vn-daily/2025-07-01"), 1);
    let cached = fs::read_to_string(&cache).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&cached).is_ok());
    assert!(!dir.path().join("raw_json/2025-07-01_vn_viral_daily.json.part").exists());

    let again = chart::crawl(&session(), &tasks, &options(&server, &dir, true)).await.unwrap();
    assert_eq!((again.cached, again.fetched), (2, 0));
}
