// src/ingest/feed.rs
//! RSS 2.0 / Atom documents into flat, not yet classified items.

use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Deserialize;
use thiserror::Error;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Error)]
pub enum FeedFormatError {
    #[error("document has no root element")]
    Empty,
    #[error("unsupported feed root <{0}>")]
    UnsupportedRoot(String),
    #[error("malformed feed xml: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// One feed item with the fields the pipeline cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<Text>,
    content: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Element text, ignoring attributes such as `type` or `isPermaLink`.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse a whole feed document. The root element decides the dialect.
pub fn parse_document(xml: &str) -> Result<Vec<RawItem>, FeedFormatError> {
    let t0 = std::time::Instant::now();
    let xml = scrub_html_entities_for_xml(xml);

    let items = match root_name(&xml).as_deref() {
        Some("rss") => parse_rss(&xml)?,
        Some("feed") => parse_atom(&xml)?,
        Some(other) => return Err(FeedFormatError::UnsupportedRoot(other.to_string())),
        None => return Err(FeedFormatError::Empty),
    };

    histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(items)
}

fn parse_rss(xml: &str) -> Result<Vec<RawItem>, FeedFormatError> {
    let rss: Rss = from_str(xml)?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| RawItem {
            id: it
                .guid
                .map(|g| g.value.trim().to_string())
                .filter(|g| !g.is_empty())
                .or_else(|| non_empty(it.link.as_deref())),
            title: it.title.map(|t| t.trim().to_string()),
            link: non_empty(it.link.as_deref()),
            published_at: it.pub_date.as_deref().and_then(parse_rfc2822_utc),
            summary: it.description,
        })
        .collect())
}

fn parse_atom(xml: &str) -> Result<Vec<RawItem>, FeedFormatError> {
    let feed: AtomFeed = from_str(xml)?;
    Ok(feed
        .entry
        .into_iter()
        .map(|e| {
            let link = e
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| e.links.first())
                .and_then(|l| non_empty(Some(l.href.as_str())));
            RawItem {
                id: non_empty(e.id.as_deref()).or_else(|| link.clone()),
                title: e.title.map(|t| t.value.trim().to_string()),
                link,
                published_at: e
                    .published
                    .as_deref()
                    .and_then(parse_rfc3339_utc)
                    .or_else(|| e.updated.as_deref().and_then(parse_rfc3339_utc)),
                summary: e.summary.or(e.content).map(|t| t.value),
            }
        })
        .collect())
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn root_name(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn to_chrono(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    let utc = dt.to_offset(UtcOffset::UTC);
    DateTime::from_timestamp(utc.unix_timestamp(), utc.nanosecond())
}

/// RSS `pubDate`. Falls back to chrono for obsolete zone names (`EST`, `UT`).
pub fn parse_rfc2822_utc(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(to_chrono)
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

/// Atom `published` / `updated`.
pub fn parse_rfc3339_utc(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(to_chrono)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&laquo;", "\"")
        .replace("&raquo;", "\"")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Hazards</title>
    <item>
      <title> Storm Warning </title>
      <link>http://example.com/storm</link>
      <guid isPermaLink="false">storm-1</guid>
      <pubDate>Sat, 06 Sep 2025 12:00:00 +0300</pubDate>
      <description><![CDATA[<b>Severe</b> wind&nbsp;gusts]]></description>
    </item>
    <item>
      <title>No guid</title>
      <link>http://example.com/fog</link>
      <pubDate>Sat, 06 Sep 2025 10:00:00 GMT</pubDate>
      <description>Fog</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Hazards</title>
  <entry>
    <id>urn:hazard:1</id>
    <title type="text">Heat</title>
    <link rel="self" href="http://example.com/self"/>
    <link rel="alternate" href="http://example.com/heat"/>
    <updated>2025-09-06T09:30:00Z</updated>
    <summary>Extreme heat</summary>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_are_flattened_and_dates_converted_to_utc() {
        let items = parse_document(RSS).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("storm-1"));
        assert_eq!(items[0].title.as_deref(), Some("Storm Warning"));
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap())
        );
        assert!(items[0].summary.as_deref().unwrap().contains("Severe"));
        // guid missing: link is the identity
        assert_eq!(items[1].id.as_deref(), Some("http://example.com/fog"));
        assert_eq!(
            items[1].published_at,
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn atom_entries_prefer_alternate_link_and_fall_back_to_updated() {
        let items = parse_document(ATOM).unwrap();
        assert_eq!(items.len(), 1);
        let it = &items[0];
        assert_eq!(it.id.as_deref(), Some("urn:hazard:1"));
        assert_eq!(it.link.as_deref(), Some("http://example.com/heat"));
        assert_eq!(
            it.published_at,
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 9, 30, 0).unwrap())
        );
        assert_eq!(it.summary.as_deref(), Some("Extreme heat"));
    }

    #[test]
    fn atom_unparsable_published_falls_back_to_updated() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>urn:hazard:2</id>
    <published>not a date</published>
    <updated>2025-09-06T10:00:00Z</updated>
    <summary>Severe</summary>
  </entry>
</feed>"#;
        let items = parse_document(xml).unwrap();
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn unknown_root_is_rejected() {
        assert!(matches!(
            parse_document("<html><body/></html>"),
            Err(FeedFormatError::UnsupportedRoot(r)) if r == "html"
        ));
        assert!(matches!(parse_document(""), Err(FeedFormatError::Empty)));
    }
}
