//! In-memory stand-ins for the feed and the Notion database.
#![allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
#![allow(dead_code, reason = "Not every test file uses every helper")]

use serde_json::{Value, json};
use shelfsync_core::book::Book;
use shelfsync_core::feed::errors::FeedError;
use shelfsync_core::notion::errors::NotionError;
use shelfsync_core::notion::types::{PageObject, PageWrite, QueryPage};
use shelfsync_core::sync::{BookSource, Datastore};
use std::collections::HashSet;
use std::sync::Mutex;

/// Database rows kept in a vector, served `page_size` rows per query with the row offset as
/// cursor.
pub struct MemoryDatastore {
    page_size: usize,
    rows: Mutex<Vec<PageObject>>,
    failing: HashSet<i64>,
    writes: Mutex<Vec<String>>,
}

impl MemoryDatastore {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            rows: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Rejects every write for the given book IDs.
    pub fn failing_on(mut self, ids: &[i64]) -> Self {
        self.failing = ids.iter().copied().collect();
        self
    }

    /// Adds a row the way an earlier run would have left it.
    pub fn seed(&self, id: &str, book_id: i64, shelf: &str) {
        self.rows.lock().unwrap().push(PageObject::new(
            id.to_owned(),
            json!({
                "Book ID": { "type": "number", "number": book_id },
                "Shelf": { "type": "multi_select", "multi_select": [{ "name": shelf }] }
            }),
        ));
    }

    /// Every create and update so far, as `create:<book id>` or `update:<page id>`.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Properties of the row holding `book_id`.
    pub fn properties_of(&self, book_id: i64) -> Option<Value> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.properties["Book ID"]["number"] == json!(book_id))
            .map(|row| row.properties.clone())
    }

    fn check(&self, page: &PageWrite) -> Result<(), NotionError> {
        let book_id = page.properties.book_id.number.unwrap();
        if self.failing.contains(&book_id) {
            return Err(NotionError::Api {
                status: 400,
                code: "validation_error".to_owned(),
                message: format!("rejected book {book_id}"),
            });
        }
        Ok(())
    }
}

impl Datastore for MemoryDatastore {
    async fn query_page(&self, cursor: Option<&str>) -> Result<QueryPage, NotionError> {
        let rows = self.rows.lock().unwrap();
        let start: usize = cursor.map_or(0, |c| c.parse().unwrap());
        let end = (start + self.page_size).min(rows.len());
        let has_more = end < rows.len();

        Ok(QueryPage::new(
            rows[start..end].to_vec(),
            has_more.then(|| end.to_string()),
            has_more,
        ))
    }

    async fn create_page(&self, page: &PageWrite) -> Result<String, NotionError> {
        self.check(page)?;
        let mut rows = self.rows.lock().unwrap();
        let id = format!("page-{}", rows.len());
        rows.push(PageObject::new(
            id.clone(),
            serde_json::to_value(&page.properties).unwrap(),
        ));
        self.writes
            .lock()
            .unwrap()
            .push(format!("create:{}", page.properties.book_id.number.unwrap()));
        Ok(id)
    }

    async fn update_page(&self, record_id: &str, page: &PageWrite) -> Result<String, NotionError> {
        self.check(page)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == record_id)
            .ok_or_else(|| NotionError::Api {
                status: 404,
                code: "object_not_found".to_owned(),
                message: format!("no page {record_id}"),
            })?;
        row.properties = serde_json::to_value(&page.properties).unwrap();
        self.writes
            .lock()
            .unwrap()
            .push(format!("update:{record_id}"));
        Ok(record_id.to_owned())
    }
}

/// A feed that always returns the same books, or fails when built with [`StaticFeed::broken`].
pub struct StaticFeed {
    books: Option<Vec<Book>>,
}

impl StaticFeed {
    pub const fn new(books: Vec<Book>) -> Self {
        Self { books: Some(books) }
    }

    pub const fn broken() -> Self {
        Self { books: None }
    }
}

impl BookSource for StaticFeed {
    async fn fetch_books(&self) -> Result<Vec<Book>, FeedError> {
        self.books
            .clone()
            .ok_or_else(|| FeedError::Parse("feed is unavailable".to_owned()))
    }
}

pub fn book(external_id: i64, shelf: &str) -> Book {
    Book::new(
        external_id,
        None,
        format!("Book {external_id}"),
        "Author".to_owned(),
        None,
        None,
        shelf,
        None,
    )
}
