//! Maps a [`Book`] onto the property schema of the synced database. Pure, no I/O.
use crate::book::{Book, normalize_shelf};
use crate::notion::types::{
    DateProperty, DateRange, MultiSelectProperty, NumberProperty, PageWrite, PropertySet,
    RichText, RichTextProperty, SelectOption, TitleProperty, UrlProperty,
};

/// Goodreads book pages live at this path followed by the book ID.
pub const BOOK_PAGE_BASE_URL: &str = "https://www.goodreads.com/book/show/";

#[must_use]
#[inline]
pub fn book_url(external_id: i64) -> String {
    format!("{BOOK_PAGE_BASE_URL}{external_id}")
}

#[must_use]
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per written book"
)]
pub fn to_properties(book: &Book) -> PropertySet {
    let date = book
        .reading_range()
        .map(|(start, end)| DateRange { start, end });

    PropertySet::new(
        TitleProperty {
            title: vec![RichText::plain(&book.title)],
        },
        NumberProperty {
            number: Some(book.external_id),
        },
        NumberProperty { number: book.isbn },
        RichTextProperty {
            rich_text: vec![RichText::plain(&book.author_name)],
        },
        MultiSelectProperty {
            multi_select: vec![SelectOption {
                name: normalize_shelf(&book.shelf),
            }],
        },
        DateProperty { date },
        UrlProperty {
            url: book_url(book.external_id),
        },
    )
}

/// Properties plus the cover image. An empty cover URL is dropped, Notion rejects it.
#[must_use]
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per written book"
)]
pub fn page_write(book: &Book) -> PageWrite {
    let cover_url = book
        .cover_image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_owned);

    PageWrite::new(cover_url, to_properties(book))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn sample_books() -> Vec<Book> {
        let mut unnormalized = Book::new(
            5,
            None,
            "Raw".to_owned(),
            "Someone".to_owned(),
            None,
            None,
            "x",
            Some(String::new()),
        );
        unnormalized.shelf = String::new();

        vec![
            Book::new(
                1,
                Some(9_780_441_013_593),
                "Dune".to_owned(),
                "Frank Herbert".to_owned(),
                Some(date("2023-01-02")),
                Some(date("2023-03-04")),
                "",
                Some("https://covers.example/dune.jpg".to_owned()),
            ),
            Book::new(
                2,
                None,
                "Hyperion".to_owned(),
                "Dan Simmons".to_owned(),
                Some(date("2023-05-10")),
                Some(date("2022-12-31")),
                "currently-reading",
                None,
            ),
            Book::new(
                3,
                None,
                "Anathem".to_owned(),
                "Neal Stephenson".to_owned(),
                None,
                Some(date("2021-07-07")),
                "to-read",
                None,
            ),
            unnormalized,
        ]
    }

    #[test]
    fn serializes_to_the_database_schema() {
        let properties = to_properties(&sample_books()[0]);

        assert_eq!(
            serde_json::to_value(&properties).unwrap(),
            json!({
                "Name": { "title": [{ "type": "text", "text": { "content": "Dune" } }] },
                "Book ID": { "number": 1 },
                "Book ISBN": { "number": 9_780_441_013_593_i64 },
                "Author": { "rich_text": [{ "type": "text", "text": { "content": "Frank Herbert" } }] },
                "Shelf": { "multi_select": [{ "name": "read" }] },
                "Date": { "date": { "start": "2023-01-02", "end": "2023-03-04" } },
                "URL": { "url": "https://www.goodreads.com/book/show/1" }
            })
        );
    }

    #[test]
    fn empty_shelf_maps_to_read() {
        for book in sample_books() {
            let shelf = to_properties(&book).shelf.multi_select;
            if book.shelf.is_empty() || book.shelf == "read" {
                assert_eq!(shelf, vec![SelectOption { name: "read".to_owned() }]);
            }
        }
        let raw = &sample_books()[3];
        assert_eq!(
            to_properties(raw).shelf.multi_select[0].name,
            "read".to_owned()
        );
    }

    #[test]
    fn date_range_never_ends_before_it_starts() {
        for book in sample_books() {
            if let Some(range) = to_properties(&book).date.date {
                if let Some(end) = range.end {
                    assert!(end >= range.start, "{} ends before it starts", book.title);
                }
            }
        }
        let hyperion = to_properties(&sample_books()[1]).date.date.unwrap();
        assert_eq!(hyperion.start, date("2023-05-10"));
        assert_eq!(hyperion.end, Some(date("2023-05-10")));
    }

    #[test]
    fn missing_dates_serialize_as_null() {
        let raw = to_properties(&sample_books()[3]);
        assert_eq!(
            serde_json::to_value(raw.date).unwrap(),
            json!({ "date": null })
        );
        assert_eq!(
            serde_json::to_value(raw.book_isbn).unwrap(),
            json!({ "number": null })
        );
    }

    #[test]
    fn url_is_base_path_plus_id() {
        for book in sample_books() {
            assert_eq!(
                to_properties(&book).url.url,
                format!("https://www.goodreads.com/book/show/{}", book.external_id)
            );
        }
    }

    #[test]
    fn blank_cover_is_dropped() {
        let books = sample_books();
        assert_eq!(
            page_write(&books[0]).cover_url.as_deref(),
            Some("https://covers.example/dune.jpg")
        );
        assert_eq!(page_write(&books[1]).cover_url, None);
        assert_eq!(page_write(&books[3]).cover_url, None);
    }
}
