use crate::book::Book;
use crate::sync::index::BookIndex;
use log::warn;
use std::collections::HashSet;

/// A book that already has a page, to be overwritten with the feed's version.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Notion page ID
    pub record_id: String,
    pub book: Book,
}

impl PendingUpdate {
    #[must_use]
    #[inline]
    pub const fn new(record_id: String, book: Book) -> Self {
        Self { record_id, book }
    }
}

/// Writes needed to bring the database in line with the feed. Both lists keep feed order.
#[non_exhaustive]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_create: Vec<Book>,
    pub to_update: Vec<PendingUpdate>,
    /// Books whose page already has the feed's shelf
    pub unchanged: usize,
    /// Later feed entries for a book ID seen earlier in the same feed
    pub duplicates: usize,
    /// Feed entries without a usable book ID, never written
    pub unkeyed: usize,
}

impl SyncPlan {
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }
}

/// Sorts books into creates and updates by looking each one up in the index.
///
/// A book without a page is created. A book whose page carries a different shelf (a missing shelf
/// counts as different) is updated. Everything else is left alone. When the feed lists a book ID
/// twice only the first entry counts, the feed lists the most recent edit first. Books without a
/// positive book ID cannot be joined against the database and are left out.
#[must_use]
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per sync run"
)]
pub fn reconcile(books: Vec<Book>, index: &BookIndex) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut seen = HashSet::with_capacity(books.len());

    for book in books {
        if book.external_id <= 0 {
            warn!(
                "Skipping {:?}, the feed gave it no usable book ID",
                book.title
            );
            plan.unkeyed += 1;
            continue;
        }
        if !seen.insert(book.external_id) {
            warn!(
                "Book ID {} appears more than once in the feed, skipping {:?}",
                book.external_id, book.title
            );
            plan.duplicates += 1;
            continue;
        }

        match index.get(book.external_id) {
            None => plan.to_create.push(book),
            Some(entry) if entry.shelf.as_deref() != Some(book.shelf.as_str()) => plan
                .to_update
                .push(PendingUpdate::new(entry.record_id.clone(), book)),
            Some(_) => plan.unchanged += 1,
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::index::IndexEntry;
    use pretty_assertions::assert_eq;

    fn book(external_id: i64, shelf: &str) -> Book {
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

    fn entry(record_id: &str, external_id: i64, shelf: Option<&str>) -> IndexEntry {
        IndexEntry::new(record_id.to_owned(), external_id, shelf.map(str::to_owned))
    }

    #[test]
    fn splits_books_into_creates_and_updates() {
        let index = BookIndex::from_iter([entry("a", 101, Some("read"))]);
        let books = vec![book(101, "currently-reading"), book(202, "read")];

        let plan = reconcile(books, &index);

        assert_eq!(
            plan.to_update,
            vec![PendingUpdate::new(
                "a".to_owned(),
                book(101, "currently-reading")
            )]
        );
        assert_eq!(plan.to_create, vec![book(202, "read")]);
        assert_eq!(plan.unchanged, 0);
    }

    #[test]
    fn same_shelf_is_skipped() {
        let index = BookIndex::from_iter([entry("a", 1, Some("read")), entry("b", 2, Some("to-read"))]);

        let plan = reconcile(vec![book(1, ""), book(2, "to-read")], &index);

        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 2);
    }

    #[test]
    fn page_without_shelf_is_updated() {
        let index = BookIndex::from_iter([entry("a", 1, None)]);

        let plan = reconcile(vec![book(1, "")], &index);

        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].book.shelf, "read");
    }

    #[test]
    fn reconciling_a_synced_database_is_a_no_op() {
        let books = vec![
            book(1, ""),
            book(2, "currently-reading"),
            book(3, "to-read"),
        ];
        let first = reconcile(books.clone(), &BookIndex::new());
        assert_eq!(first.to_create.len(), 3);

        // The database after the first run holds every created book with its shelf
        let synced: BookIndex = first
            .to_create
            .iter()
            .enumerate()
            .map(|(n, created)| {
                entry(
                    &format!("page-{n}"),
                    created.external_id,
                    Some(created.shelf.as_str()),
                )
            })
            .collect();

        let second = reconcile(books, &synced);
        assert!(second.is_empty());
        assert_eq!(second.unchanged, 3);
    }

    #[test]
    fn first_feed_entry_wins_for_duplicate_ids() {
        let books = vec![book(5, "currently-reading"), book(6, "read"), book(5, "to-read")];

        let plan = reconcile(books, &BookIndex::new());

        assert_eq!(plan.duplicates, 1);
        assert_eq!(
            plan.to_create,
            vec![book(5, "currently-reading"), book(6, "read")]
        );
    }

    #[test]
    fn books_without_an_id_are_never_written() {
        let index = BookIndex::from_iter([entry("page-0", 0, Some("read"))]);
        let books = vec![book(0, "read"), book(0, "to-read"), book(3, "read")];

        let plan = reconcile(books, &index);

        assert_eq!(plan.unkeyed, 2);
        assert_eq!(plan.duplicates, 0);
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.to_create, vec![book(3, "read")]);
    }

    #[test]
    fn buckets_keep_feed_order() {
        let index = BookIndex::from_iter([
            entry("p3", 3, Some("read")),
            entry("p1", 1, Some("read")),
        ]);
        let books = vec![
            book(4, "read"),
            book(3, "to-read"),
            book(2, "read"),
            book(1, "to-read"),
        ];

        let plan = reconcile(books, &index);

        let created: Vec<i64> = plan.to_create.iter().map(|b| b.external_id).collect();
        let updated: Vec<&str> = plan
            .to_update
            .iter()
            .map(|u| u.record_id.as_str())
            .collect();
        assert_eq!(created, vec![4, 2]);
        assert_eq!(updated, vec!["p3", "p1"]);
    }
}
