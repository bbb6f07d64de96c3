use reqwest::StatusCode;

/// Everything that can make the feed unusable for a run. None of these are recoverable: a run
/// without the feed must not go on to write anything.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Error that occurs during the HTTP request to Goodreads, originating from `reqwest`.
    #[error("failed to fetch feed: {0}")]
    Request(#[from] reqwest::Error),

    /// Goodreads answered, but not with a success status.
    #[error("feed request returned {0}")]
    Status(StatusCode),

    /// The body is not a well-formed RSS document.
    #[error("failed to parse feed: {0}")]
    Parse(String),
}

#[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
impl From<quick_xml::Error> for FeedError {
    fn from(error: quick_xml::Error) -> Self {
        Self::Parse(error.to_string())
    }
}
