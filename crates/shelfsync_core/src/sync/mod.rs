//! Sync run
//!
//! One run goes through four phases, each a separate function so it can be driven on its own:
//! index the database ([`index::fetch_index`]), read the feed ([`BookSource::fetch_books`]), decide
//! what to write ([`reconcile::reconcile`]) and write it ([`batch::create_all`],
//! [`batch::update_all`]). [`run_sync`] chains them.
pub mod batch;
pub mod index;
pub mod reconcile;

use crate::book::Book;
use crate::errors::SyncError;
use crate::feed::errors::FeedError;
use crate::notion::errors::NotionError;
use crate::notion::types::{PageWrite, QueryPage};
use batch::{WriteFailure, create_all, update_all};
use core::future::Future;
use core::num::NonZeroUsize;
use index::fetch_index;
use log::info;
use reconcile::reconcile;

/// Where the books of a run come from.
pub trait BookSource: Send + Sync {
    /// Fetches every book currently in the feed, in feed order.
    fn fetch_books(&self) -> impl Future<Output = Result<Vec<Book>, FeedError>> + Send;
}

/// The database the books are written to.
pub trait Datastore: Send + Sync {
    /// Fetches one page of rows, starting at `cursor` or at the beginning.
    fn query_page(
        &self,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<QueryPage, NotionError>> + Send;

    /// Creates a row and returns its ID.
    fn create_page(
        &self,
        page: &PageWrite,
    ) -> impl Future<Output = Result<String, NotionError>> + Send;

    /// Overwrites an existing row and returns its ID.
    fn update_page(
        &self,
        record_id: &str,
        page: &PageWrite,
    ) -> impl Future<Output = Result<String, NotionError>> + Send;
}

/// What a run did. Failed writes are listed, not raised, so every batch gets attempted.
#[non_exhaustive]
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Books read from the feed
    pub fetched: usize,
    /// Rows found in the database with a usable book ID
    pub indexed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Feed entries dropped because an earlier entry had the same book ID
    pub duplicates: usize,
    /// Feed entries skipped because they carry no usable book ID
    pub unkeyed: usize,
    pub failures: Vec<WriteFailure>,
}

impl SyncReport {
    /// `true` if every planned write went through.
    #[must_use]
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs one full sync: index, fetch, reconcile, then create and update in batches.
/// # Errors
/// Fails if the database cannot be indexed or the feed cannot be read. Failed writes do not fail
/// the run, they are listed in the returned report.
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per program run"
)]
pub async fn run_sync<S, D>(
    source: &S,
    store: &D,
    batch_size: NonZeroUsize,
) -> Result<SyncReport, SyncError>
where
    S: BookSource,
    D: Datastore,
{
    let index = fetch_index(store).await?;
    info!("{} books found in Notion", index.len());

    let books = source.fetch_books().await?;
    let fetched = books.len();
    info!("{fetched} books fetched from Goodreads");

    let plan = reconcile(books, &index);
    info!(
        "{} new books to add, {} books to update, {} unchanged",
        plan.to_create.len(),
        plan.to_update.len(),
        plan.unchanged
    );

    let created = create_all(store, &plan.to_create, batch_size).await;
    info!(
        "{} pages created in {} batches",
        created.succeeded, created.batches
    );
    let updated = update_all(store, &plan.to_update, batch_size).await;
    info!(
        "{} pages updated in {} batches",
        updated.succeeded, updated.batches
    );

    let mut failures = created.failures;
    failures.extend(updated.failures);

    Ok(SyncReport {
        fetched,
        indexed: index.len(),
        created: created.succeeded,
        updated: updated.succeeded,
        unchanged: plan.unchanged,
        duplicates: plan.duplicates,
        unkeyed: plan.unkeyed,
        failures,
    })
}
