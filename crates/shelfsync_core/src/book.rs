use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Shelf label Goodreads reports as an empty string for books on the default shelf.
pub const DEFAULT_SHELF: &str = "read";

/// A single book as read from the feed. Rebuilt on every run, never persisted locally.
#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Book {
    /// Goodreads book ID, the key used to find the book's page in Notion.
    pub external_id: i64,
    pub isbn: Option<i64>,
    pub title: String,
    pub author_name: String,
    pub date_added: Option<NaiveDate>,
    pub date_finished: Option<NaiveDate>,
    /// Reading status, never empty.
    pub shelf: String,
    pub cover_image_url: Option<String>,
}

impl Book {
    #[allow(
        clippy::too_many_arguments,
        reason = "Constructor, cannot have fewer arguments"
    )]
    #[must_use]
    #[inline]
    pub fn new(
        external_id: i64,
        isbn: Option<i64>,
        title: String,
        author_name: String,
        date_added: Option<NaiveDate>,
        date_finished: Option<NaiveDate>,
        shelf: &str,
        cover_image_url: Option<String>,
    ) -> Self {
        Self {
            external_id,
            isbn,
            title,
            author_name,
            date_added,
            date_finished,
            shelf: normalize_shelf(shelf),
            cover_image_url,
        }
    }

    /// The reading period as stored in Notion: `(start, end)`. The end never precedes the start;
    /// with only one of the two dates known it becomes the start of an open range.
    #[must_use]
    #[inline]
    pub fn reading_range(&self) -> Option<(NaiveDate, Option<NaiveDate>)> {
        match (self.date_added, self.date_finished) {
            (Some(added), Some(finished)) => Some((added, Some(finished.max(added)))),
            (Some(added), None) => Some((added, None)),
            (None, Some(finished)) => Some((finished, None)),
            (None, None) => None,
        }
    }
}

/// Takes the first of a comma separated list of shelves, falling back to [`DEFAULT_SHELF`].
#[must_use]
#[inline]
pub fn normalize_shelf(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .find(|label| !label.is_empty())
        .unwrap_or(DEFAULT_SHELF)
        .to_owned()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn book_with_dates(added: Option<&str>, finished: Option<&str>) -> Book {
        Book::new(
            1,
            None,
            "Dune".to_owned(),
            "Frank Herbert".to_owned(),
            added.map(date),
            finished.map(date),
            "",
            None,
        )
    }

    #[test]
    fn empty_shelf_becomes_read() {
        assert_eq!(normalize_shelf(""), "read");
        assert_eq!(normalize_shelf("   "), "read");
        assert_eq!(normalize_shelf(" , "), "read");
    }

    #[test]
    fn first_listed_shelf_wins() {
        assert_eq!(normalize_shelf("currently-reading"), "currently-reading");
        assert_eq!(normalize_shelf("to-read, favourites"), "to-read");
    }

    #[test]
    fn finished_before_added_is_clamped() {
        let book = book_with_dates(Some("2023-05-10"), Some("2023-01-02"));
        assert_eq!(
            book.reading_range(),
            Some((date("2023-05-10"), Some(date("2023-05-10"))))
        );
    }

    #[test]
    fn finished_after_added_is_kept() {
        let book = book_with_dates(Some("2023-01-02"), Some("2023-05-10"));
        assert_eq!(
            book.reading_range(),
            Some((date("2023-01-02"), Some(date("2023-05-10"))))
        );
    }

    #[test]
    fn single_known_date_opens_the_range() {
        assert_eq!(
            book_with_dates(Some("2023-01-02"), None).reading_range(),
            Some((date("2023-01-02"), None))
        );
        assert_eq!(
            book_with_dates(None, Some("2023-05-10")).reading_range(),
            Some((date("2023-05-10"), None))
        );
        assert_eq!(book_with_dates(None, None).reading_range(), None);
    }
}
