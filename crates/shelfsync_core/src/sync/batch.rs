//! Batched writes. Items inside a batch are written concurrently, batches run one after another,
//! so at most one batch worth of requests is in flight.
use crate::book::Book;
use crate::notion::errors::NotionError;
use crate::notion::properties::page_write;
use crate::sync::Datastore;
use crate::sync::reconcile::PendingUpdate;
use core::num::NonZeroUsize;
use core::slice::Chunks;
use futures::future::join_all;
use log::{debug, error, info};

/// A write that did not go through.
#[non_exhaustive]
#[derive(Debug)]
pub struct WriteFailure {
    pub external_id: i64,
    pub title: String,
    /// Page that was being updated, `None` for a failed create
    pub record_id: Option<String>,
    pub error: NotionError,
}

impl WriteFailure {
    #[must_use]
    #[inline]
    pub const fn new(
        external_id: i64,
        title: String,
        record_id: Option<String>,
        error: NotionError,
    ) -> Self {
        Self {
            external_id,
            title,
            record_id,
            error,
        }
    }
}

/// Result of writing one list of books. A failed item never stops the remaining items or batches.
#[non_exhaustive]
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub batches: usize,
    pub failures: Vec<WriteFailure>,
}

/// Splits `items` into consecutive groups of `batch_size`, the last one possibly shorter.
#[inline]
pub fn batches<T>(items: &[T], batch_size: NonZeroUsize) -> Chunks<'_, T> {
    items.chunks(batch_size.get())
}

/// Creates a page for every book.
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per sync run"
)]
pub async fn create_all<D: Datastore>(
    store: &D,
    books: &[Book],
    batch_size: NonZeroUsize,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for batch in batches(books, batch_size) {
        let results = join_all(batch.iter().map(|book| async move {
            let page = page_write(book);
            (book, store.create_page(&page).await)
        }))
        .await;

        for (book, result) in results {
            match result {
                Ok(page_id) => {
                    debug!("Created page {page_id} for {:?}", book.title);
                    outcome.succeeded += 1;
                }
                Err(err) => {
                    error!(
                        "Failed to create page for book {} ({:?}): {err}",
                        book.external_id, book.title
                    );
                    outcome.failures.push(WriteFailure::new(
                        book.external_id,
                        book.title.clone(),
                        None,
                        err,
                    ));
                }
            }
        }
        outcome.batches += 1;
        info!("Completed create batch of size {}", batch.len());
    }

    outcome
}

/// Overwrites the page of every pending update.
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per sync run"
)]
pub async fn update_all<D: Datastore>(
    store: &D,
    updates: &[PendingUpdate],
    batch_size: NonZeroUsize,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for batch in batches(updates, batch_size) {
        let results = join_all(batch.iter().map(|update| async move {
            let page = page_write(&update.book);
            (update, store.update_page(&update.record_id, &page).await)
        }))
        .await;

        for (update, result) in results {
            match result {
                Ok(page_id) => {
                    debug!("Updated page {page_id} for {:?}", update.book.title);
                    outcome.succeeded += 1;
                }
                Err(err) => {
                    error!(
                        "Failed to update page {} for book {} ({:?}): {err}",
                        update.record_id, update.book.external_id, update.book.title
                    );
                    outcome.failures.push(WriteFailure::new(
                        update.book.external_id,
                        update.book.title.clone(),
                        Some(update.record_id.clone()),
                        err,
                    ));
                }
            }
        }
        outcome.batches += 1;
        info!("Completed update batch of size {}", batch.len());
    }

    outcome
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::notion::types::{PageWrite, QueryPage};
    use core::sync::atomic::{AtomicUsize, Ordering};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every write and the highest number of writes in flight at once.
    #[derive(Default)]
    struct RecordingStore {
        failing: HashSet<i64>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        created: Mutex<Vec<i64>>,
        updated: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn failing_on(ids: &[i64]) -> Self {
            Self {
                failing: ids.iter().copied().collect(),
                ..Self::default()
            }
        }

        async fn write(&self, page: &PageWrite) -> Result<i64, NotionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let id = page.properties.book_id.number.unwrap();
            if self.failing.contains(&id) {
                return Err(NotionError::Api {
                    status: 409,
                    code: "conflict_error".to_owned(),
                    message: format!("conflict on {id}"),
                });
            }
            Ok(id)
        }
    }

    impl Datastore for RecordingStore {
        async fn query_page(&self, _cursor: Option<&str>) -> Result<QueryPage, NotionError> {
            unreachable!("writers never query")
        }

        async fn create_page(&self, page: &PageWrite) -> Result<String, NotionError> {
            let id = self.write(page).await?;
            self.created.lock().unwrap().push(id);
            Ok(format!("page-{id}"))
        }

        async fn update_page(&self, record_id: &str, page: &PageWrite) -> Result<String, NotionError> {
            self.write(page).await?;
            self.updated.lock().unwrap().push(record_id.to_owned());
            Ok(record_id.to_owned())
        }
    }

    fn books(count: i64) -> Vec<Book> {
        (1..=count)
            .map(|id| {
                Book::new(
                    id,
                    None,
                    format!("Book {id}"),
                    "Author".to_owned(),
                    None,
                    None,
                    "",
                    None,
                )
            })
            .collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn partitions_into_fixed_size_batches() {
        let items: Vec<usize> = (0..53).collect();

        let groups: Vec<&[usize]> = batches(&items, size(25)).collect();

        let sizes: Vec<usize> = groups.iter().map(|group| group.len()).collect();
        assert_eq!(sizes, vec![25, 25, 3]);
        let flattened: Vec<usize> = groups.concat();
        assert_eq!(flattened, items);
    }

    #[test]
    fn batch_size_larger_than_input_gives_one_batch() {
        let items = [1, 2, 3];
        assert_eq!(batches(&items, size(25)).count(), 1);
        assert_eq!(batches::<u8>(&[], size(25)).count(), 0);
    }

    #[tokio::test]
    async fn creates_every_book_once_with_bounded_concurrency() {
        let store = RecordingStore::default();
        let books = books(53);

        let outcome = create_all(&store, &books, size(25)).await;

        assert_eq!(outcome.succeeded, 53);
        assert_eq!(outcome.batches, 3);
        assert!(outcome.failures.is_empty());
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 25);

        let mut created = store.created.lock().unwrap().clone();
        created.sort_unstable();
        assert_eq!(created, (1..=53).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn failed_writes_are_collected_and_later_batches_still_run() {
        let store = RecordingStore::failing_on(&[2, 7]);
        let books = books(10);

        let outcome = create_all(&store, &books, size(4)).await;

        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.succeeded, 8);
        let failed: Vec<i64> = outcome
            .failures
            .iter()
            .map(|failure| failure.external_id)
            .collect();
        assert_eq!(failed, vec![2, 7]);
        assert_eq!(outcome.failures[0].record_id, None);
        assert_eq!(store.created.lock().unwrap().len(), 8);
        assert!(store.created.lock().unwrap().contains(&10));
    }

    #[tokio::test]
    async fn updates_target_their_record_and_report_it_on_failure() {
        let store = RecordingStore::failing_on(&[3]);
        let updates: Vec<PendingUpdate> = books(3)
            .into_iter()
            .map(|book| PendingUpdate::new(format!("rec-{}", book.external_id), book))
            .collect();

        let outcome = update_all(&store, &updates, size(2)).await;

        assert_eq!(outcome.batches, 2);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(
            *store.updated.lock().unwrap(),
            vec!["rec-1".to_owned(), "rec-2".to_owned()]
        );
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].record_id.as_deref(), Some("rec-3"));
        assert_eq!(outcome.failures[0].title, "Book 3");
    }
}
