use crate::config::SyncConfig;
use crate::notion::errors::NotionError;
use crate::notion::types::{
    Cover, CreatePageRequest, PageReference, PageWrite, Parent, QueryPage, QueryRequest,
    UpdatePageRequest,
};
use crate::sync::Datastore;
use core::time::Duration;
use log::debug;
use reqwest::redirect::Policy;
use reqwest::{ClientBuilder, Response, header};

/// API version the request and response shapes in [`crate::notion::types`] follow.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Largest page size Notion accepts for database queries.
const QUERY_PAGE_SIZE: u8 = 100;

pub struct NotionClient {
    /// A HTTP client carrying the integration token and API version on every request
    http_client: reqwest::Client,
    base_url: String,
    database_id: String,
}

impl NotionClient {
    /// Create a new client for one database
    /// # Errors
    /// Fails if the token is not a valid header value or the reqwest `ClientBuilder` fails
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per program run"
    )]
    pub fn new(
        base_url: &str,
        token: &str,
        database_id: &str,
        timeout: Duration,
    ) -> Result<Self, NotionError> {
        let mut authorization = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| NotionError::InvalidCredential)?;
        authorization.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(
            header::HeaderName::from_static("notion-version"),
            header::HeaderValue::from_static(NOTION_VERSION),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http_client = ClientBuilder::new()
            .user_agent(concat!("shelfsync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .redirect(Policy::limited(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            database_id: database_id.to_owned(),
        })
    }

    /// Create the Notion client from the run configuration
    /// # Errors
    /// Fails if the token is not a valid header value or the HTTP client cannot be built
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per program run"
    )]
    pub fn from_config(config: &SyncConfig) -> Result<Self, NotionError> {
        Self::new(
            &config.notion_api_url,
            &config.notion_key,
            &config.database_id,
            config.request_timeout,
        )
    }

    /// Requests one page of database rows, starting at `cursor` or at the beginning.
    /// # Errors
    /// Returns an error if the request fails or Notion answers with a non-success status
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per result page"
    )]
    pub async fn query_database(&self, cursor: Option<&str>) -> Result<QueryPage, NotionError> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);
        let body = QueryRequest {
            page_size: QUERY_PAGE_SIZE,
            start_cursor: cursor,
        };
        debug!("Querying database {} from cursor {cursor:?}", self.database_id);

        let response = self.http_client.post(&url).json(&body).send().await?;
        Ok(checked(response).await?.json().await?)
    }

    /// Creates a page in the database and returns its ID.
    /// # Errors
    /// Returns an error if the request fails or Notion answers with a non-success status
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per created book"
    )]
    pub async fn create_page(&self, page: &PageWrite) -> Result<String, NotionError> {
        let url = format!("{}/v1/pages", self.base_url);
        let body = CreatePageRequest {
            parent: Parent {
                database_id: &self.database_id,
            },
            cover: page.cover_url.as_deref().map(Cover::external),
            properties: &page.properties,
        };

        let response = self.http_client.post(&url).json(&body).send().await?;
        let created: PageReference = checked(response).await?.json().await?;
        Ok(created.id)
    }

    /// Overwrites cover and properties of an existing page, returns the page's ID.
    /// # Errors
    /// Returns an error if the request fails or Notion answers with a non-success status
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per updated book"
    )]
    pub async fn update_page(&self, page_id: &str, page: &PageWrite) -> Result<String, NotionError> {
        let url = format!("{}/v1/pages/{page_id}", self.base_url);
        let body = UpdatePageRequest {
            cover: page.cover_url.as_deref().map(Cover::external),
            properties: &page.properties,
        };

        let response = self.http_client.patch(&url).json(&body).send().await?;
        let updated: PageReference = checked(response).await?.json().await?;
        Ok(updated.id)
    }
}

impl Datastore for NotionClient {
    async fn query_page(&self, cursor: Option<&str>) -> Result<QueryPage, NotionError> {
        self.query_database(cursor).await
    }

    async fn create_page(&self, page: &PageWrite) -> Result<String, NotionError> {
        Self::create_page(self, page).await
    }

    async fn update_page(&self, record_id: &str, page: &PageWrite) -> Result<String, NotionError> {
        Self::update_page(self, record_id, page).await
    }
}

/// Passes successful responses through, turns everything else into [`NotionError::Api`].
async fn checked(response: Response) -> Result<Response, NotionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotionError::from_response_body(status.as_u16(), &body))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::book::Book;
    use crate::notion::properties::{page_write, to_properties};
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client(server: &mockito::Server) -> NotionClient {
        NotionClient::new(&server.url(), "secret_abc", "db-1", Duration::from_secs(5)).unwrap()
    }

    fn book() -> Book {
        Book::new(
            42,
            None,
            "Kindred".to_owned(),
            "Octavia E. Butler".to_owned(),
            None,
            None,
            "read",
            Some("https://covers.example/kindred.jpg".to_owned()),
        )
    }

    #[tokio::test]
    async fn query_sends_cursor_and_auth_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/databases/db-1/query")
            .match_header("authorization", "Bearer secret_abc")
            .match_header("notion-version", NOTION_VERSION)
            .match_body(Matcher::Json(
                json!({ "page_size": 100, "start_cursor": "cursor-2" }),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "object": "list",
                    "results": [
                        { "object": "page", "id": "page-a", "properties": { "Book ID": { "number": 7 } } }
                    ],
                    "next_cursor": null,
                    "has_more": false
                })
                .to_string(),
            )
            .create_async()
            .await;

        let page = client(&server).query_page(Some("cursor-2")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].id, "page-a");
        assert_eq!(page.next(), None);
    }

    #[tokio::test]
    async fn first_query_omits_the_cursor() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/databases/db-1/query")
            .match_body(Matcher::Json(json!({ "page_size": 100 })))
            .with_status(200)
            .with_body(
                json!({ "results": [], "next_cursor": "cursor-2", "has_more": true }).to_string(),
            )
            .create_async()
            .await;

        let page = client(&server).query_page(None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.next(), Some("cursor-2"));
    }

    #[tokio::test]
    async fn create_posts_parent_cover_and_properties() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/pages")
            .match_body(Matcher::PartialJson(json!({
                "parent": { "database_id": "db-1" },
                "cover": { "type": "external", "external": { "url": "https://covers.example/kindred.jpg" } },
                "properties": {
                    "Book ID": { "number": 42 },
                    "Shelf": { "multi_select": [{ "name": "read" }] },
                    "URL": { "url": "https://www.goodreads.com/book/show/42" }
                }
            })))
            .with_status(200)
            .with_body(json!({ "object": "page", "id": "new-page" }).to_string())
            .create_async()
            .await;

        let id = client(&server)
            .create_page(&page_write(&book()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(id, "new-page");
    }

    #[tokio::test]
    async fn update_patches_the_page_without_empty_cover() {
        let mut server = mockito::Server::new_async().await;
        let mut uncovered = book();
        uncovered.cover_image_url = None;
        let mock = server
            .mock("PATCH", "/v1/pages/page-a")
            .match_body(Matcher::Json(json!({
                "properties": to_properties(&uncovered)
            })))
            .with_status(200)
            .with_body(json!({ "object": "page", "id": "page-a" }).to_string())
            .create_async()
            .await;

        let id = client(&server)
            .update_page("page-a", &page_write(&uncovered))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(id, "page-a");
    }

    #[tokio::test]
    async fn api_errors_carry_notion_code_and_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/pages")
            .with_status(400)
            .with_body(
                json!({
                    "object": "error",
                    "status": 400,
                    "code": "validation_error",
                    "message": "Shelf is not a property that exists."
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = client(&server).create_page(&page_write(&book())).await;

        match result {
            Err(NotionError::Api {
                status,
                code,
                message,
            }) => {
                assert_eq!(status, 400);
                assert_eq!(code, "validation_error");
                assert_eq!(message, "Shelf is not a property that exists.");
            }
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/databases/db-1/query")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let result = client(&server).query_page(None).await;

        match result {
            Err(NotionError::Api { status, message, .. }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let result = NotionClient::new(
            "http://localhost",
            "secret\nabc",
            "db-1",
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(NotionError::InvalidCredential)));
    }
}
