//! Goodreads feed reader
//!
//! Fetches a user's `list_rss` feed and turns every `<item>` into a [`crate::book::Book`].
pub mod client;
pub mod errors;
pub mod parser;
