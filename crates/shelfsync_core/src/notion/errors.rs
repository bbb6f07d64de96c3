use serde::Deserialize;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    /// Error that occurs during the HTTP request to Notion, originating from `reqwest`.
    #[error("request to Notion failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Notion answered with a non-success status.
    #[error("Notion API returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The integration token cannot be sent as a header value.
    #[error("Notion integration token contains invalid characters")]
    InvalidCredential,
}

/// Error object Notion returns alongside a non-success status.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl NotionError {
    /// Builds an [`NotionError::Api`] from a failed response, keeping Notion's error code when the
    /// body carries one and the raw body otherwise.
    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Error path only")]
    pub fn from_response_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(error) => Self::Api {
                status,
                code: error.code,
                message: error.message,
            },
            Err(_) => Self::Api {
                status,
                code: "unknown".to_owned(),
                message: body.trim().to_owned(),
            },
        }
    }
}
