use quick_xml::{Reader, events::Event};
use rand::seq::SliceRandom;

use crate::window::YearMonth;

/// Every `<loc>` of a sitemap or sitemap index, in document order.
pub fn parse_locs(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = Vec::new();
    let mut in_loc = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"loc" => in_loc = true,
            Event::End(e) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Event::Text(t) if in_loc => {
                let text = t.unescape()?;
                let text = text.trim();
                if !text.is_empty() {
                    locs.push(text.to_owned());
                }
            }
            Event::CData(c) if in_loc => {
                let text = String::from_utf8_lossy(&c).trim().to_owned();
                if !text.is_empty() {
                    locs.push(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(locs)
}

/// Entries of a sitemap index that belong to one of `months`, recognised by
/// a `YYYY-MM` tag in their URL. Sorted by URL.
pub fn month_sitemaps(index: &[String], months: &[YearMonth]) -> Vec<(YearMonth, String)> {
    let mut out = index
        .iter()
        .filter_map(|url| {
            let month = months.iter().find(|m| url.contains(&m.to_string()))?;
            Some((*month, url.clone()))
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| a.1.cmp(&b.1));
    out
}

/// A random sample of at most `cap` URLs.
pub fn sample(mut urls: Vec<String>, cap: usize) -> Vec<String> {
    urls.shuffle(&mut rand::rng());
    urls.truncate(cap);
    urls
}
