//! Error types shared across a sync run.
pub use crate::config::ConfigError;
pub use crate::feed::errors::FeedError;
pub use crate::notion::errors::NotionError;

/// Any condition that ends a sync run before the write phase. Configuration is loaded before a
/// run starts, so [`ConfigError`] is reported on its own.
///
/// Failed writes are not part of this type: they are collected in the run's report so that every
/// batch still gets attempted.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("notion error: {0}")]
    Notion(#[from] NotionError),
}
