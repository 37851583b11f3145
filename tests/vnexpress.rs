mod common;

use core::time::Duration;
use std::{
    fs,
    sync::{Arc, OnceLock},
};

use common::{Reply, Server, session};
use tscr::{
    etl::vnexpress,
    news::{self, LinkOptions, MetaOptions, Paths, SitemapOptions},
    scrape::RetryPolicy,
    store::{Table, load_column},
    window::{Selection, TrailingPolicy},
};

fn listing(hrefs: &[&str]) -> String {
    let items = hrefs
        .iter()
        .map(|h| format!(r#"<article class="item-news"><h3 class="title-news"><a href="{h}">Title {h}</a></h3></article>"#))
        .collect::<String>();
    format!("<html><body><div class=\"list-news\">{items}</div></body></html>")
}

fn article(date: &str) -> String {
    format!(
        r#"<html><head><meta property="article:section" content="Thời sự"></head><body>
           <h1 class="title-detail">Heading</h1>
           <span class="date">Thứ hai, {date}, 08:15 (GMT+7)</span>
           <p class="description">Lead text.</p>
        </body></html>"#
    )
}

fn site(path: &str, _seen: usize) -> Reply {
    match path {
        "/thoi-su" => Reply::ok(listing(&["/a-1.html", "/a-2.html"])),
        "/thoi-su-p2" => Reply::ok(listing(&["/a-2.html", "/a-3.html", "/broken.html"])),
        "/thoi-su-p3" => Reply::ok(listing(&[])),
        "/a-1.html" => Reply::ok(article("02/06/2025")),
        "/a-2.html" => Reply::ok(article("15/07/2025")),
        "/a-3.html" => Reply::ok(article("1/8/2025")),
        _ => Reply::status(500),
    }
}

fn link_options(server: &Server) -> LinkOptions {
    LinkOptions {
        pages_per_category: 10,
        categories: vec![("Thời sự".into(), server.url("/thoi-su"))],
        pause: (0.0, 0.0),
        fail_backoff: Duration::ZERO,
        max_fails: 3,
        policy: RetryPolicy::NONE,
    }
}

fn meta_options() -> MetaOptions {
    MetaOptions {
        concurrency: 3,
        rps: 500.0,
        max_links: 0,
        policy: RetryPolicy::NONE,
    }
}

#[tokio::test]
async fn links_meta_filter_with_resume() {
    let server = Server::start(site).await;
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());

    let new = news::crawl_links(&session(), &paths, &link_options(&server)).await.unwrap();
    assert_eq!(new, 4);
    assert_eq!(server.hits("/thoi-su-p4"), 0);
    let urls = load_column(&paths.links, "Url").unwrap();
    assert!(urls.contains(server.url("/a-3.html").as_str()));

    // listing again finds nothing new
    let again = news::crawl_links(&session(), &paths, &link_options(&server)).await.unwrap();
    assert_eq!(again, 0);

    let first = session();
    let stats = news::crawl_meta(&first, &paths, &meta_options()).await.unwrap();
    assert_eq!((stats.done, stats.failed), (3, 1));
    assert_eq!(first.requests_sent(), 4);

    let table = Table::read(&paths.articles, false).unwrap();
    assert_eq!(table.rows.len(), 3);
    let (title, date, category) = (table.column("Title"), table.column("Date"), table.column("Category"));
    let row = table.rows.iter().find(|r| date.get(r).starts_with("2025-07-15")).unwrap();
    assert_eq!(title.get(row), "Heading");
    assert_eq!(date.get(row), "2025-07-15 08:15:00");
    assert_eq!(category.get(row), "Thời sự");

    // only the failed link is tried again
    let second = session();
    let stats = news::crawl_meta(&second, &paths, &meta_options()).await.unwrap();
    assert_eq!((stats.done, stats.failed), (0, 1));
    assert_eq!(second.requests_sent(), 1);
    assert_eq!(server.hits("/broken.html"), 2);

    let policy = TrailingPolicy { min_months: 1, max_months: 6, min_rows: 2 };
    let report = news::filter_months(&paths, Selection::Trailing(policy)).unwrap().unwrap();
    assert_eq!(report.window.to_string(), "2025-06-01 → 2025-07-31");
    assert_eq!(report.rows, 2);

    let text = fs::read_to_string(&paths.clean).unwrap();
    let dates = text
        .lines()
        .skip(1)
        .map(|l| l.split(',').nth(1).unwrap().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(dates, ["2025-06-02 08:15:00", "2025-07-15 08:15:00"]);

    let out = dir.path().join("data_clean/clean_data.csv");
    let summary = dir.path().join("data_clean/summary.csv");
    let policy = TrailingPolicy { min_months: 3, max_months: 24, min_rows: 1000 };
    let report = vnexpress::clean(&paths.articles, &out, &summary, Selection::Trailing(policy))
        .unwrap()
        .unwrap();
    assert_eq!(report.kept, 2);
    assert_eq!(report.window.months(), 24);
    assert!(fs::read_to_string(&summary).unwrap().contains("Thời sự,2,ByCategory"));
}

#[tokio::test]
async fn failing_category_is_skipped_after_three_failures() {
    let server = Server::start(|_, _| Reply::status(503)).await;
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());

    let new = news::crawl_links(&session(), &paths, &link_options(&server)).await.unwrap();
    assert_eq!(new, 0);
    assert_eq!(server.total_hits(), 3);
    assert_eq!(server.hits("/thoi-su-p4"), 0);
}

#[tokio::test]
async fn sitemap_links_are_sampled_per_month() {
    let base = Arc::new(OnceLock::<String>::new());
    let host = Arc::clone(&base);
    let server = Server::start(move |path, _| {
        let base = host.get().map_or("", String::as_str);
        match path {
            "/sitemap.xml" => Reply::ok(format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                  <sitemap><loc>{base}/sm-2025-06.xml</loc></sitemap>
                  <sitemap><loc>{base}/sm-2025-07.xml</loc></sitemap>
                  <sitemap><loc>{base}/sm-2025-08.xml</loc></sitemap>
                </sitemapindex>"#
            )),
            "/sm-2025-07.xml" | "/sm-2025-08.xml" => {
                let month = &path[4..11];
                let urls = (0..5)
                    .map(|i| format!("<url><loc>https://vnexpress.net/{month}-{i}.html</loc></url>"))
                    .collect::<String>();
                Reply::ok(format!("<urlset>{urls}</urlset>"))
            }
            _ => Reply::status(404),
        }
    })
    .await;
    base.set(server.base.clone()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let opts = SitemapOptions {
        index_url: server.url("/sitemap.xml"),
        max_per_month: 2,
        hard_cap: 3,
        policy: RetryPolicy::NONE,
        ..SitemapOptions::new(vec!["2025-07".parse().unwrap(), "2025-08".parse().unwrap()])
    };

    let new = news::crawl_sitemaps(&session(), &paths, &opts).await.unwrap();
    assert_eq!(new, 3);
    assert_eq!(server.hits("/sm-2025-06.xml"), 0);
    assert_eq!(server.hits("/sm-2025-08.xml"), 1);

    let table = Table::read(&paths.links, false).unwrap();
    let (title, url, category) = (table.column("Title"), table.column("Url"), table.column("Category"));
    assert_eq!(table.rows.len(), 3);
    let july = table.rows.iter().filter(|r| url.get(r).contains("2025-07")).count();
    assert_eq!(july, 2);
    assert!(table.rows.iter().all(|r| title.get(r).is_empty() && category.get(r).is_empty()));
}
