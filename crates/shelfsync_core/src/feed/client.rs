use crate::book::Book;
use crate::config::SyncConfig;
use crate::feed::errors::FeedError;
use crate::feed::parser::parse_feed;
use crate::sync::BookSource;
use core::time::Duration;
use log::info;
use reqwest::redirect::Policy;
use reqwest::{ClientBuilder, header};
use urlencoding::encode;

/// Shelf filter that makes Goodreads include every shelf in the feed.
const ALL_SHELVES: &str = "#ALL#";

pub struct GoodreadsFeedClient {
    /// A HTTP client used to execute the GET request for the feed
    http_client: reqwest::Client,
    /// Fully built `list_rss` URL of the configured user
    feed_url: String,
}

impl GoodreadsFeedClient {
    /// Create a new HTTP client for the feed of the given Goodreads user
    /// # Errors
    /// Fails in case any of the reqwest `ClientBuilder` methods fail
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per program run"
    )]
    pub fn new(base_url: &str, user_id: &str, timeout: Duration) -> Result<Self, FeedError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "application/rss+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        let http_client = ClientBuilder::new()
            .user_agent(concat!("shelfsync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .redirect(Policy::limited(10))
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            feed_url: feed_url(base_url, user_id),
        })
    }

    /// Create the feed client from the run configuration
    /// # Errors
    /// Fails in case the HTTP client cannot be built
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per program run"
    )]
    pub fn from_config(config: &SyncConfig) -> Result<Self, FeedError> {
        Self::new(
            &config.goodreads_url,
            &config.goodreads_id,
            config.request_timeout,
        )
    }

    /// Downloads and parses the feed.
    /// # Errors
    /// Returns an error if the request fails, Goodreads answers with a non-success status or the
    /// body is not a readable feed
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per sync run"
    )]
    pub async fn fetch(&self) -> Result<Vec<Book>, FeedError> {
        let response = self.http_client.get(&self.feed_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let feed = parse_feed(&response.text().await?)?;
        if let Some(title) = &feed.title {
            info!("Fetching books from: {title}");
        }
        info!("{} books retrieved from Goodreads", feed.books.len());

        Ok(feed.books)
    }
}

impl BookSource for GoodreadsFeedClient {
    async fn fetch_books(&self) -> Result<Vec<Book>, FeedError> {
        self.fetch().await
    }
}

/// `list_rss` URL of a user's feed covering all shelves.
#[must_use]
#[inline]
pub fn feed_url(base_url: &str, user_id: &str) -> String {
    format!(
        "{}/review/list_rss/{}?shelf={}",
        base_url.trim_end_matches('/'),
        encode(user_id),
        encode(ALL_SHELVES)
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    const FEED: &str = include_str!("../../tests/support/goodreads_feed.xml");

    #[test]
    fn builds_all_shelves_url() {
        assert_eq!(
            feed_url("https://www.goodreads.com/", "4242"),
            "https://www.goodreads.com/review/list_rss/4242?shelf=%23ALL%23"
        );
    }

    #[tokio::test]
    async fn fetches_and_parses_the_feed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/review/list_rss/4242")
            .match_query(Matcher::UrlEncoded("shelf".into(), "#ALL#".into()))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(FEED)
            .create_async()
            .await;

        let client =
            GoodreadsFeedClient::new(&server.url(), "4242", Duration::from_secs(5)).unwrap();
        let books = client.fetch_books().await.unwrap();

        mock.assert_async().await;
        assert_eq!(books.len(), 4);
        assert_eq!(books[0].title, "Project Hail Mary");
    }

    #[tokio::test]
    async fn error_status_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/review/list_rss/4242")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client =
            GoodreadsFeedClient::new(&server.url(), "4242", Duration::from_secs(5)).unwrap();
        let result = client.fetch_books().await;

        assert!(matches!(
            result,
            Err(FeedError::Status(status)) if status.as_u16() == 503
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_fatal() {
        // Bind and release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = GoodreadsFeedClient::new(
            &format!("http://127.0.0.1:{port}"),
            "4242",
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(matches!(
            client.fetch_books().await,
            Err(FeedError::Request(_))
        ));
    }

    #[tokio::test]
    async fn unreadable_body_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/review/list_rss/4242")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html><body>maintenance</body></html>")
            .create_async()
            .await;

        let client =
            GoodreadsFeedClient::new(&server.url(), "4242", Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.fetch_books().await,
            Err(FeedError::Parse(_))
        ));
    }
}
