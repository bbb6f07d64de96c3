#![allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]

mod common;

use common::{MemoryDatastore, StaticFeed, book};
use core::num::NonZeroUsize;
use core::time::Duration;
use mockito::Matcher;
use pretty_assertions::assert_eq;
use serde_json::json;
use shelfsync_core::errors::SyncError;
use shelfsync_core::feed::client::GoodreadsFeedClient;
use shelfsync_core::feed::parser::parse_feed;
use shelfsync_core::run_sync;

const FEED: &str = include_str!("support/goodreads_feed.xml");

fn batch_size(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap()
}

#[tokio::test]
async fn goodreads_feed_lands_in_the_database_and_a_rerun_writes_nothing() {
    let mut server = mockito::Server::new_async().await;
    let feed_mock = server
        .mock("GET", "/review/list_rss/4242")
        .match_query(Matcher::UrlEncoded("shelf".into(), "#ALL#".into()))
        .with_status(200)
        .with_body(FEED)
        .expect(2)
        .create_async()
        .await;
    let feed = GoodreadsFeedClient::new(&server.url(), "4242", Duration::from_secs(5)).unwrap();

    let store = MemoryDatastore::new(1);
    store.seed("left-hand", 18423, "read");
    store.seed("recursion", 42_046_112, "read");

    let report = run_sync(&feed, &store, batch_size(25)).await.unwrap();

    assert_eq!(report.fetched, 4);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert!(report.is_clean());
    assert_eq!(store.row_count(), 4);

    let mut writes = store.writes();
    writes.sort();
    assert_eq!(
        writes,
        vec![
            "create:50202953".to_owned(),
            "create:54493401".to_owned(),
            "update:left-hand".to_owned(),
        ]
    );
    assert_eq!(
        store.properties_of(18423).unwrap()["Shelf"],
        json!({ "multi_select": [{ "name": "currently-reading" }] })
    );
    let hail_mary = store.properties_of(54_493_401).unwrap();
    assert_eq!(
        hail_mary["Date"],
        json!({ "date": { "start": "2023-11-20", "end": "2024-01-02" } })
    );
    assert_eq!(
        hail_mary["URL"],
        json!({ "url": "https://www.goodreads.com/book/show/54493401" })
    );

    let rerun = run_sync(&feed, &store, batch_size(25)).await.unwrap();

    feed_mock.assert_async().await;
    assert_eq!(rerun.indexed, 4);
    assert_eq!(rerun.created, 0);
    assert_eq!(rerun.updated, 0);
    assert_eq!(rerun.unchanged, 4);
    assert_eq!(store.writes().len(), 3);
}

#[tokio::test]
async fn unreadable_feed_aborts_before_any_write() {
    let store = MemoryDatastore::new(10);
    store.seed("a", 1, "read");

    let result = run_sync(&StaticFeed::broken(), &store, batch_size(25)).await;

    assert!(matches!(result, Err(SyncError::Feed(_))));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn rejected_writes_are_reported_and_the_rest_still_land() {
    let store = MemoryDatastore::new(10).failing_on(&[3, 60]);
    store.seed("p3", 3, "to-read");
    let books: Vec<_> = (1..=60).map(|id| book(id, "read")).collect();

    let report = run_sync(&StaticFeed::new(books), &store, batch_size(25))
        .await
        .unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.created, 58);
    assert_eq!(report.updated, 0);
    let mut failed: Vec<(i64, Option<String>)> = report
        .failures
        .iter()
        .map(|failure| (failure.external_id, failure.record_id.clone()))
        .collect();
    failed.sort();
    assert_eq!(failed, vec![(3, Some("p3".to_owned())), (60, None)]);
    assert_eq!(store.row_count(), 59);
}

#[tokio::test]
async fn duplicate_feed_entries_are_written_once() {
    let store = MemoryDatastore::new(10);
    let feed = StaticFeed::new(vec![book(8, "currently-reading"), book(8, "to-read")]);

    let report = run_sync(&feed, &store, batch_size(25)).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(
        store.properties_of(8).unwrap()["Shelf"],
        json!({ "multi_select": [{ "name": "currently-reading" }] })
    );
}

#[tokio::test]
async fn items_without_a_book_id_never_reach_the_database() {
    let xml = "<rss><channel><title>Shelf</title>\
               <item><title>Alpha</title><book_id></book_id></item>\
               <item><title>Beta</title><book_id>n/a</book_id></item>\
               <item><title>Known</title><book_id>11</book_id></item>\
               </channel></rss>";
    let books = parse_feed(xml).unwrap().books;
    let store = MemoryDatastore::new(10);

    let report = run_sync(&StaticFeed::new(books), &store, batch_size(25))
        .await
        .unwrap();

    assert_eq!(report.unkeyed, 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.created, 1);
    assert_eq!(store.writes(), vec!["create:11".to_owned()]);
    assert!(store.properties_of(0).is_none());

    let stray = parse_feed(
        "<rss><channel><item><title>Gamma</title><book_id>?</book_id></item></channel></rss>",
    )
    .unwrap()
    .books;
    let rerun = run_sync(&StaticFeed::new(stray), &store, batch_size(25))
        .await
        .unwrap();

    assert_eq!(rerun.unkeyed, 1);
    assert_eq!(rerun.updated, 0);
    assert_eq!(store.writes().len(), 1);
}
