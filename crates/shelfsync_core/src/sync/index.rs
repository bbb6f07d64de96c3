use crate::notion::errors::NotionError;
use crate::notion::types::PageObject;
use crate::sync::Datastore;
use log::warn;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// A database row reduced to what reconciliation needs.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Notion page ID
    pub record_id: String,
    pub external_id: i64,
    /// First option of the row's `Shelf` property
    pub shelf: Option<String>,
}

impl IndexEntry {
    #[must_use]
    #[inline]
    pub const fn new(record_id: String, external_id: i64, shelf: Option<String>) -> Self {
        Self {
            record_id,
            external_id,
            shelf,
        }
    }
}

/// Book ID to database row, built once per run and read-only afterwards.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BookIndex {
    entries: HashMap<i64, IndexEntry>,
}

impl BookIndex {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. A later entry for the same book ID replaces the earlier one, which is
    /// returned.
    #[inline]
    pub fn insert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        match self.entries.entry(entry.external_id) {
            Entry::Occupied(mut occupied) => Some(occupied.insert(entry)),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                None
            }
        }
    }

    #[must_use]
    #[inline]
    pub fn get(&self, external_id: i64) -> Option<&IndexEntry> {
        self.entries.get(&external_id)
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<IndexEntry> for BookIndex {
    #[inline]
    fn from_iter<T: IntoIterator<Item = IndexEntry>>(iter: T) -> Self {
        let mut index = Self::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}

/// Pages through the whole database and indexes every row by its book ID.
///
/// Nothing is returned until the last page has been read; a failed page fails the whole index.
/// Rows sharing a book ID resolve to the one read last.
/// # Errors
/// Returns the first error any page request fails with
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per sync run"
)]
pub async fn fetch_index<D: Datastore>(store: &D) -> Result<BookIndex, NotionError> {
    let mut index = BookIndex::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = store.query_page(cursor.as_deref()).await?;
        for row in &page.results {
            let Some(entry) = index_entry(row) else {
                warn!("Skipping Notion page {} without a Book ID", row.id);
                continue;
            };
            if let Some(displaced) = index.insert(entry) {
                warn!(
                    "Book ID {} is on more than one Notion page, using {} over {}",
                    displaced.external_id, row.id, displaced.record_id
                );
            }
        }

        match page.next() {
            Some(next) => cursor = Some(next.to_owned()),
            None => break,
        }
    }

    Ok(index)
}

/// Reads book ID and first shelf out of a row. Rows without a numeric book ID yield `None`.
#[must_use]
#[allow(
    clippy::indexing_slicing,
    reason = "`serde_json::Value` indexing never panics"
)]
#[allow(clippy::missing_inline_in_public_items, reason = "Called once per row")]
pub fn index_entry(page: &PageObject) -> Option<IndexEntry> {
    let external_id = as_book_id(&page.properties["Book ID"]["number"])?;
    let shelf = page.properties["Shelf"]["multi_select"][0]["name"]
        .as_str()
        .map(str::to_owned);

    Some(IndexEntry::new(page.id.clone(), external_id, shelf))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::as_conversions,
    reason = "Book IDs are whole numbers well inside the i64 range"
)]
fn as_book_id(number: &Value) -> Option<i64> {
    number
        .as_i64()
        .or_else(|| number.as_f64().filter(|n| n.fract() == 0.0).map(|n| n as i64))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::notion::types::{PageWrite, QueryPage};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves fixed pages, chained by cursor `"1"`, `"2"`, ... and records requested cursors.
    struct PagedStore {
        pages: Vec<Result<QueryPage, u16>>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl PagedStore {
        fn new(pages: Vec<Vec<PageObject>>) -> Self {
            let last = pages.len().saturating_sub(1);
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(number, rows)| {
                    let more = number < last;
                    Ok(QueryPage::new(
                        rows,
                        more.then(|| (number + 1).to_string()),
                        more,
                    ))
                })
                .collect();
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl Datastore for PagedStore {
        async fn query_page(&self, cursor: Option<&str>) -> Result<QueryPage, NotionError> {
            self.requested
                .lock()
                .unwrap()
                .push(cursor.map(str::to_owned));
            let number: usize = cursor.map_or(0, |c| c.parse().unwrap());
            match &self.pages[number] {
                Ok(page) => Ok(page.clone()),
                Err(status) => Err(NotionError::Api {
                    status: *status,
                    code: "internal_server_error".to_owned(),
                    message: "boom".to_owned(),
                }),
            }
        }

        async fn create_page(&self, _page: &PageWrite) -> Result<String, NotionError> {
            unreachable!("indexing never writes")
        }

        async fn update_page(
            &self,
            _record_id: &str,
            _page: &PageWrite,
        ) -> Result<String, NotionError> {
            unreachable!("indexing never writes")
        }
    }

    fn row(id: &str, book_id: i64, shelf: Option<&str>) -> PageObject {
        let shelf = shelf.map_or_else(Vec::new, |name| vec![json!({ "name": name })]);
        PageObject::new(
            id.to_owned(),
            json!({
                "Book ID": { "type": "number", "number": book_id },
                "Shelf": { "type": "multi_select", "multi_select": shelf }
            }),
        )
    }

    #[tokio::test]
    async fn follows_cursors_until_the_last_page() {
        let store = PagedStore::new(vec![
            vec![row("a", 1, Some("read")), row("b", 2, None)],
            vec![row("c", 3, Some("to-read"))],
            vec![row("d", 4, Some("currently-reading"))],
        ]);

        let index = fetch_index(&store).await.unwrap();

        assert_eq!(index.len(), 4);
        assert_eq!(
            *store.requested.lock().unwrap(),
            vec![None, Some("1".to_owned()), Some("2".to_owned())]
        );
        assert_eq!(
            index.get(1),
            Some(&IndexEntry::new("a".to_owned(), 1, Some("read".to_owned())))
        );
        assert_eq!(index.get(2).unwrap().shelf, None);
        assert_eq!(index.get(4).unwrap().record_id, "d");
    }

    #[tokio::test]
    async fn failed_page_fails_the_whole_index() {
        let mut store = PagedStore::new(vec![vec![row("a", 1, None)], vec![row("b", 2, None)]]);
        store.pages[1] = Err(500);

        let result = fetch_index(&store).await;

        assert!(matches!(result, Err(NotionError::Api { status: 500, .. })));
    }

    #[tokio::test]
    async fn duplicate_book_ids_resolve_to_the_last_row_read() {
        let store = PagedStore::new(vec![
            vec![row("first", 7, Some("to-read"))],
            vec![row("second", 7, Some("read"))],
        ]);

        let index = fetch_index(&store).await.unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get(7),
            Some(&IndexEntry::new(
                "second".to_owned(),
                7,
                Some("read".to_owned())
            ))
        );
    }

    #[tokio::test]
    async fn rows_without_a_book_id_are_skipped() {
        let empty = PageObject::new(
            "blank".to_owned(),
            json!({ "Book ID": { "type": "number", "number": null } }),
        );
        let no_properties = PageObject::new("bare".to_owned(), Value::Null);
        let store = PagedStore::new(vec![vec![empty, no_properties, row("ok", 9, None)]]);

        let index = fetch_index(&store).await.unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.get(9).is_some());
    }

    #[test]
    fn float_book_ids_are_accepted() {
        let page = PageObject::new(
            "f".to_owned(),
            json!({ "Book ID": { "number": 12345.0 } }),
        );
        assert_eq!(index_entry(&page).unwrap().external_id, 12345);

        let fractional = PageObject::new(
            "g".to_owned(),
            json!({ "Book ID": { "number": 1.5 } }),
        );
        assert_eq!(index_entry(&fractional), None);
    }
}
