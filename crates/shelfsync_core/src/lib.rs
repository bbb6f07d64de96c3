//! `shelfsync_core`
//!
//! Core library for keeping a Notion database in step with a Goodreads shelf feed. The crate holds
//! every phase of a sync run (reading the feed, indexing the database, deciding what changed and
//! writing it back) so that the binary only has to wire configuration and logging around it.

pub mod book;

pub mod config;

pub mod errors;

pub mod feed;

pub mod notion;

pub mod sync;

pub use sync::{SyncReport, run_sync};
