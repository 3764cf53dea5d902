// tests/parse_feeds.rs
//
// Feed parsing over StaticFetcher: URL validation, RSS and Atom dialects,
// per-entry rejections and the fail-fast policy.

mod common;

use chrono::{TimeZone, Utc};
use hazard_feed::classify::SeverityClassifier;
use hazard_feed::ingest::{ClassificationPolicy, FeedParser, ParseError, RejectReason, StaticFetcher};
use hazard_feed::types::HazardSeverity;

use common::{ATOM_FIXTURE, DEFAULT_FEED, RSS_FIXTURE};

fn classifier() -> SeverityClassifier {
    SeverityClassifier::new(vec![
        HazardSeverity::new("Severe"),
        HazardSeverity::new("Moderate"),
    ])
    .expect("valid patterns")
}

#[tokio::test]
async fn malformed_url_is_skipped_and_valid_feed_still_parsed() {
    let fetcher = StaticFetcher::new().with_document(DEFAULT_FEED, RSS_FIXTURE);
    let cls = classifier();
    let urls = vec!["not a url".to_string(), DEFAULT_FEED.to_string()];

    let out = FeedParser::new(&fetcher, &cls)
        .parse_feeds(&urls)
        .await
        .expect("collect policy never fails");

    assert_eq!(out.skipped_urls, vec!["not a url".to_string()]);
    assert_eq!(out.entries.len(), 2, "storm + fog classified");

    let storm = &out.entries[0];
    assert_eq!(storm.external_id, "storm-001");
    assert_eq!(storm.title, "Storm Warning");
    assert_eq!(storm.link, "http://example.com/alerts/1");
    assert_eq!(storm.severity.title, "Severe");
    assert_eq!(
        storm.published_at,
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    );
    assert!(!storm.delivered);

    // no guid: the link is the identity
    let fog = &out.entries[1];
    assert_eq!(fog.external_id, "http://example.com/alerts/3");
    assert_eq!(fog.severity.title, "Moderate");
}

#[tokio::test]
async fn unclassified_entries_are_reported_not_stored() {
    let fetcher = StaticFetcher::new().with_document(DEFAULT_FEED, RSS_FIXTURE);
    let cls = classifier();

    let out = FeedParser::new(&fetcher, &cls)
        .parse_feeds(&[DEFAULT_FEED.to_string()])
        .await
        .unwrap();

    assert_eq!(out.rejected.len(), 1);
    let r = &out.rejected[0];
    assert_eq!(r.reason, RejectReason::Unclassified);
    assert_eq!(r.external_id.as_deref(), Some("outlook-002"));
    assert_eq!(r.title.as_deref(), Some("Daily outlook"));
    assert!(out
        .entries
        .iter()
        .all(|e| e.external_id != "outlook-002"));
}

#[tokio::test]
async fn fail_fast_stops_on_first_unclassified_entry() {
    let fetcher = StaticFetcher::new().with_document(DEFAULT_FEED, RSS_FIXTURE);
    let cls = classifier();

    let err = FeedParser::new(&fetcher, &cls)
        .with_policy(ClassificationPolicy::FailFast)
        .parse_feeds(&[DEFAULT_FEED.to_string()])
        .await
        .expect_err("outlook entry has no hazard level");

    match err {
        ParseError::Unclassified { external_id, .. } => assert_eq!(external_id, "outlook-002"),
    }
}

#[tokio::test]
async fn empty_classifier_rejects_everything() {
    let fetcher = StaticFetcher::new().with_document(DEFAULT_FEED, RSS_FIXTURE);
    let cls = SeverityClassifier::default();

    let out = FeedParser::new(&fetcher, &cls)
        .parse_feeds(&[DEFAULT_FEED.to_string()])
        .await
        .unwrap();

    assert!(out.entries.is_empty());
    assert_eq!(out.rejected.len(), 3);
}

#[tokio::test]
async fn atom_feed_uses_alternate_link_and_content_fallback() {
    let atom_url = "http://example.com/atom";
    let fetcher = StaticFetcher::new().with_document(atom_url, ATOM_FIXTURE);
    let cls = classifier();

    let out = FeedParser::new(&fetcher, &cls)
        .parse_feeds(&[atom_url.to_string()])
        .await
        .unwrap();

    assert_eq!(out.entries.len(), 1);
    let frost = &out.entries[0];
    assert_eq!(frost.external_id, "urn:hazard:frost-7");
    assert_eq!(frost.link, "http://example.com/atom/7");
    assert_eq!(
        frost.published_at,
        Utc.with_ymd_and_hms(2025, 9, 6, 6, 0, 0).unwrap()
    );

    assert_eq!(out.rejected.len(), 1);
    assert_eq!(
        out.rejected[0].external_id.as_deref(),
        Some("urn:hazard:note-8")
    );
}

#[tokio::test]
async fn unreachable_and_broken_feeds_are_skipped() {
    let broken = "http://example.com/broken";
    let fetcher = StaticFetcher::new()
        .with_document(broken, "<html><body>maintenance</body></html>")
        .with_document(DEFAULT_FEED, RSS_FIXTURE);
    let cls = classifier();
    let urls = vec![
        "http://example.com/missing".to_string(),
        broken.to_string(),
        "ftp://example.com/rss".to_string(),
        DEFAULT_FEED.to_string(),
    ];

    let out = FeedParser::new(&fetcher, &cls)
        .parse_feeds(&urls)
        .await
        .unwrap();

    assert_eq!(out.skipped_urls.len(), 3);
    assert_eq!(out.entries.len(), 2);
}

#[tokio::test]
async fn entries_without_identity_or_date_are_rejected() {
    let url = "http://example.com/incomplete";
    let fetcher = StaticFetcher::new().with_document(
        url,
        include_str!("fixtures/hazard_rss_incomplete.xml"),
    );
    let cls = classifier();

    let out = FeedParser::new(&fetcher, &cls)
        .with_policy(ClassificationPolicy::FailFast)
        .parse_feeds(&[url.to_string()])
        .await
        .expect("only unclassified entries abort under fail-fast");

    assert_eq!(out.entries.len(), 1);
    assert_eq!(out.entries[0].external_id, "storm-010");
    assert_eq!(out.entries[0].link, "");

    assert_eq!(out.rejected.len(), 2);
    let no_id = &out.rejected[0];
    assert_eq!(no_id.reason, RejectReason::MissingId);
    assert_eq!(no_id.external_id, None);
    assert_eq!(no_id.title.as_deref(), Some("Anonymous bulletin"));

    let no_date = &out.rejected[1];
    assert_eq!(no_date.reason, RejectReason::MissingPublishedAt);
    assert_eq!(no_date.external_id.as_deref(), Some("undated-009"));
}
