use crate::book::Book;
use crate::feed::errors::FeedError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, warn};
use quick_xml::events::{BytesText, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used, reason = "Pattern is a literal")]
static CDATA_WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?:<!)?\[CDATA\[(.*?)\]\]>?\s*$").expect("Regex must be valid")
});

#[allow(clippy::expect_used, reason = "Pattern is a literal")]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("Regex must be valid"));

/// The books of one feed document, in feed order.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Title of the `<channel>`, names the shelf the feed was generated for
    pub title: Option<String>,
    pub books: Vec<Book>,
}

/// Leaf elements of an `<item>` that end up in a [`Book`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    BookId,
    Isbn,
    Title,
    AuthorName,
    DateAdded,
    DateFinished,
    Shelves,
    CoverImage,
}

impl ItemField {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"book_id" => Some(Self::BookId),
            b"isbn" => Some(Self::Isbn),
            b"title" => Some(Self::Title),
            b"author_name" => Some(Self::AuthorName),
            b"user_date_created" => Some(Self::DateAdded),
            b"user_read_at" => Some(Self::DateFinished),
            b"user_shelves" => Some(Self::Shelves),
            b"book_large_image_url" => Some(Self::CoverImage),
            _ => None,
        }
    }

    const fn tag(self) -> &'static [u8] {
        match self {
            Self::BookId => b"book_id",
            Self::Isbn => b"isbn",
            Self::Title => b"title",
            Self::AuthorName => b"author_name",
            Self::DateAdded => b"user_date_created",
            Self::DateFinished => b"user_read_at",
            Self::Shelves => b"user_shelves",
            Self::CoverImage => b"book_large_image_url",
        }
    }
}

/// Element whose text is currently being collected.
#[derive(Debug, Clone, Copy)]
enum Capture {
    ChannelTitle,
    Item(ItemField),
}

impl Capture {
    const fn tag(self) -> &'static [u8] {
        match self {
            Self::ChannelTitle => b"title",
            Self::Item(field) => field.tag(),
        }
    }
}

/// Raw text of one `<item>`, converted into a [`Book`] once the item closes.
#[derive(Debug, Default)]
struct RawItem {
    book_id: String,
    isbn: String,
    title: String,
    author_name: String,
    date_added: String,
    date_finished: String,
    shelves: String,
    cover_image: String,
}

impl RawItem {
    fn set(&mut self, field: ItemField, text: String) {
        let slot = match field {
            ItemField::BookId => &mut self.book_id,
            ItemField::Isbn => &mut self.isbn,
            ItemField::Title => &mut self.title,
            ItemField::AuthorName => &mut self.author_name,
            ItemField::DateAdded => &mut self.date_added,
            ItemField::DateFinished => &mut self.date_finished,
            ItemField::Shelves => &mut self.shelves,
            ItemField::CoverImage => &mut self.cover_image,
        };
        *slot = text;
    }

    fn into_book(self) -> Book {
        let title = clean_text(&self.title);
        let external_id = parse_integer(&self.book_id).unwrap_or_else(|| {
            warn!("Feed item {title:?} has no usable book_id ({:?})", self.book_id);
            0
        });
        let cover_image_url = Some(clean_text(&self.cover_image)).filter(|url| !url.is_empty());

        Book::new(
            external_id,
            parse_integer(&self.isbn),
            title,
            clean_text(&self.author_name),
            parse_date(&self.date_added),
            parse_date(&self.date_finished),
            &clean_text(&self.shelves),
            cover_image_url,
        )
    }
}

/// Parses a Goodreads `list_rss` document.
///
/// Only malformed XML or a document without a `<channel>` fails the whole parse. Fields that are
/// missing or unreadable inside an item become absent values on that item's book.
/// # Errors
/// Returns [`FeedError::Parse`] if the XML is malformed or holds no channel
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called once per sync run"
)]
pub fn parse_feed(xml: &str) -> Result<ParsedFeed, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut seen_channel = false;
    let mut channel_title = None;
    let mut books = Vec::new();
    let mut item: Option<RawItem> = None;
    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let name = start.local_name();
                match name.as_ref() {
                    b"channel" => seen_channel = true,
                    b"item" if seen_channel => {
                        item = Some(RawItem::default());
                        capture = None;
                    }
                    tag if capture.is_none() => {
                        capture = if item.is_some() {
                            ItemField::from_tag(tag).map(Capture::Item)
                        } else if seen_channel && channel_title.is_none() && tag == b"title" {
                            Some(Capture::ChannelTitle)
                        } else {
                            None
                        };
                        text.clear();
                    }
                    _ => (),
                }
            }
            Event::Text(content) if capture.is_some() => text.push_str(&unescape_or_raw(&content)),
            Event::CData(content) if capture.is_some() => {
                text.push_str(&String::from_utf8_lossy(&content.into_inner()));
            }
            Event::End(end) => {
                let name = end.local_name();
                match capture {
                    Some(active) if active.tag() == name.as_ref() => {
                        let value = core::mem::take(&mut text);
                        match active {
                            Capture::ChannelTitle => channel_title = Some(clean_text(&value)),
                            Capture::Item(field) => {
                                if let Some(raw) = item.as_mut() {
                                    raw.set(field, value);
                                }
                            }
                        }
                        capture = None;
                    }
                    _ => {
                        if name.as_ref() == b"item" {
                            if let Some(raw) = item.take() {
                                books.push(raw.into_book());
                            }
                            capture = None;
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    if !seen_channel {
        return Err(FeedError::Parse(
            "document has no <channel> element".to_owned(),
        ));
    }

    Ok(ParsedFeed {
        title: channel_title,
        books,
    })
}

/// Unknown entities inside a single field should not fail the whole feed.
fn unescape_or_raw(content: &BytesText<'_>) -> String {
    content.unescape().map_or_else(
        |err| {
            debug!("Keeping raw text, failed to unescape: {err}");
            String::from_utf8_lossy(content).into_owned()
        },
        |text| text.into_owned(),
    )
}

/// Unwraps text that still carries a literal `[CDATA[...]]` or `<![CDATA[...]]>` wrapper, returns
/// any other text unchanged.
#[must_use]
#[inline]
pub fn strip_cdata(text: &str) -> &str {
    CDATA_WRAPPER
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map_or(text, |inner| inner.as_str())
}

/// CDATA-stripped, trimmed text with inner runs of whitespace collapsed to a single space.
#[must_use]
#[inline]
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RUN
        .replace_all(strip_cdata(text).trim(), " ")
        .into_owned()
}

fn parse_integer(text: &str) -> Option<i64> {
    strip_cdata(text).trim().parse().ok()
}

/// Best-effort conversion of a feed timestamp into a calendar date. Zoned timestamps are moved to
/// UTC first. Anything unrecognised is `None`.
#[must_use]
#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Called twice per feed item"
)]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let value = strip_cdata(text).trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc2822(value) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(timestamp.date());
    }

    debug!("Unrecognised date {value:?}");
    None
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEED: &str = include_str!("../../tests/support/goodreads_feed.xml");

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_every_item_in_feed_order() {
        let feed = parse_feed(FEED).unwrap();

        assert_eq!(feed.title.as_deref(), Some("Ada's bookshelf: all"));
        let ids: Vec<i64> = feed.books.iter().map(|book| book.external_id).collect();
        assert_eq!(ids, vec![54_493_401, 18423, 50_202_953, 42_046_112]);
    }

    #[test]
    fn parses_a_complete_item() {
        let feed = parse_feed(FEED).unwrap();

        let expected = Book::new(
            54_493_401,
            Some(593_135_202),
            "Project Hail Mary".to_owned(),
            "Andy Weir".to_owned(),
            Some(date("2023-11-20")),
            Some(date("2024-01-02")),
            "",
            Some(
                "https://i.gr-assets.com/images/S/compressed.photo.goodreads.com/books/1597695864i/54493401.jpg"
                    .to_owned(),
            ),
        );
        assert_eq!(feed.books[0], expected);
        assert_eq!(feed.books[0].shelf, "read");
    }

    #[test]
    fn degrades_missing_and_malformed_fields() {
        let feed = parse_feed(FEED).unwrap();

        let left_hand = &feed.books[1];
        assert_eq!(
            left_hand.title,
            "The Left Hand of Darkness (Hainish Cycle, #4)"
        );
        assert_eq!(left_hand.isbn, None);
        assert_eq!(left_hand.date_finished, None);
        // 18:01 at -08:00 is already the next day in UTC
        assert_eq!(left_hand.date_added, Some(date("2024-01-03")));
        assert_eq!(left_hand.shelf, "currently-reading");

        let piranesi = &feed.books[2];
        assert_eq!(piranesi.isbn, None);
        assert_eq!(piranesi.date_finished, None);
        assert_eq!(piranesi.cover_image_url, None);
        assert_eq!(piranesi.shelf, "to-read");

        let recursion = &feed.books[3];
        assert_eq!(recursion.shelf, "read");
        assert_eq!(recursion.cover_image_url, None);
        assert_eq!(recursion.date_finished, Some(date("2023-09-01")));
    }

    #[test]
    fn channel_image_title_does_not_replace_channel_title() {
        let xml = "<rss><channel><title>First</title><image><title>Second</title></image></channel></rss>";
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.title.as_deref(), Some("First"));
        assert!(feed.books.is_empty());
    }

    #[test]
    fn item_without_book_id_gets_zero() {
        let xml = "<rss><channel><item><title>Untracked</title><book_id>n/a</book_id></item></channel></rss>";
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.books.len(), 1);
        assert_eq!(feed.books[0].external_id, 0);
        assert_eq!(feed.books[0].title, "Untracked");
    }

    #[test]
    fn nested_elements_inside_an_item_are_ignored() {
        let xml = "<rss><channel><item><book id=\"7\"><num_pages>300</num_pages></book>\
                   <book_id>7</book_id><title>Nested</title></item></channel></rss>";
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.books[0].external_id, 7);
        assert_eq!(feed.books[0].title, "Nested");
    }

    #[test]
    fn unknown_entity_keeps_raw_text() {
        let xml = "<rss><channel><item><book_id>9</book_id><title>Caf&eacute;</title></item></channel></rss>";
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.books[0].title, "Caf&eacute;");
    }

    #[test]
    fn mismatched_tags_fail_the_parse() {
        let xml = "<rss><channel><item><title>Broken</item></channel></rss>";
        assert!(matches!(parse_feed(xml), Err(FeedError::Parse(_))));
    }

    #[test]
    fn document_without_channel_fails_the_parse() {
        let html = "<html><body><p>Sorry, that page does not exist.</p></body></html>";
        assert!(matches!(parse_feed(html), Err(FeedError::Parse(_))));
    }

    #[test]
    fn strips_cdata_wrappers() {
        assert_eq!(strip_cdata("[CDATA[Some Title]]"), "Some Title");
        assert_eq!(strip_cdata("<![CDATA[Some Title]]>"), "Some Title");
        assert_eq!(strip_cdata("  <![CDATA[multi\nline]]>  "), "multi\nline");
        assert_eq!(strip_cdata("Some Title"), "Some Title");
        assert_eq!(strip_cdata("[CDATA[unterminated"), "[CDATA[unterminated");
    }

    #[test]
    fn cleans_free_text() {
        assert_eq!(clean_text("  [CDATA[ A   Title ]]  "), "A Title");
        assert_eq!(clean_text("Plain\n\t  text"), "Plain text");
    }

    #[test]
    fn parses_known_date_forms() {
        assert_eq!(
            parse_date("Mon, 20 Nov 2023 10:15:00 -0800"),
            Some(date("2023-11-20"))
        );
        assert_eq!(
            parse_date("<![CDATA[Tue, 02 Jan 2024 00:00:00 +0000]]>"),
            Some(date("2024-01-02"))
        );
        assert_eq!(
            parse_date("2023-06-01T23:30:00-02:00"),
            Some(date("2023-06-02"))
        );
        assert_eq!(parse_date("2023-06-01"), Some(date("2023-06-01")));
        assert_eq!(parse_date("2023/06/01"), Some(date("2023-06-01")));
        assert_eq!(parse_date("2023-06-01 12:00:00"), Some(date("2023-06-01")));
    }

    #[test]
    fn unparsable_date_is_absent() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("sometime last summer"), None);
        assert_eq!(parse_date("2023-02-30"), None);
        assert_eq!(parse_date("[CDATA[]]"), None);
    }
}
