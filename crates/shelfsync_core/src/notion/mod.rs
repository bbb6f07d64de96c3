//! Notion database access
//!
//! A minimal client for the three Notion endpoints a sync run needs (query a database, create a
//! page, update a page) and the typed property schema the synced database uses.
pub mod client;
pub mod errors;
pub mod properties;
pub mod types;
