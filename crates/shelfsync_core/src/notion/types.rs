use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Properties of a page in the synced database, keyed by the database's column names.
#[non_exhaustive]
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PropertySet {
    #[serde(rename = "Name")]
    pub name: TitleProperty,
    #[serde(rename = "Book ID")]
    pub book_id: NumberProperty,
    #[serde(rename = "Book ISBN")]
    pub book_isbn: NumberProperty,
    #[serde(rename = "Author")]
    pub author: RichTextProperty,
    #[serde(rename = "Shelf")]
    pub shelf: MultiSelectProperty,
    #[serde(rename = "Date")]
    pub date: DateProperty,
    #[serde(rename = "URL")]
    pub url: UrlProperty,
}

impl PropertySet {
    #[allow(
        clippy::too_many_arguments,
        reason = "Constructor, cannot have fewer arguments"
    )]
    #[must_use]
    #[inline]
    pub const fn new(
        name: TitleProperty,
        book_id: NumberProperty,
        book_isbn: NumberProperty,
        author: RichTextProperty,
        shelf: MultiSelectProperty,
        date: DateProperty,
        url: UrlProperty,
    ) -> Self {
        Self {
            name,
            book_id,
            book_isbn,
            author,
            shelf,
            date,
            url,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RichText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: TextContent,
}

impl RichText {
    #[must_use]
    #[inline]
    pub fn plain(content: &str) -> Self {
        Self {
            kind: "text".to_owned(),
            text: TextContent {
                content: content.to_owned(),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    pub content: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TitleProperty {
    pub title: Vec<RichText>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RichTextProperty {
    pub rich_text: Vec<RichText>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberProperty {
    pub number: Option<i64>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MultiSelectProperty {
    pub multi_select: Vec<SelectOption>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateProperty {
    pub date: Option<DateRange>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UrlProperty {
    pub url: String,
}

/// Everything written to a page on create or update.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWrite {
    /// External cover image, `None` leaves the cover untouched
    pub cover_url: Option<String>,
    pub properties: PropertySet,
}

impl PageWrite {
    #[must_use]
    #[inline]
    pub const fn new(cover_url: Option<String>, properties: PropertySet) -> Self {
        Self {
            cover_url,
            properties,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Parent<'a> {
    pub database_id: &'a str,
}

#[derive(Serialize, Debug)]
pub struct ExternalFile<'a> {
    pub url: &'a str,
}

#[derive(Serialize, Debug)]
pub struct Cover<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub external: ExternalFile<'a>,
}

impl<'a> Cover<'a> {
    #[must_use]
    #[inline]
    pub const fn external(url: &'a str) -> Self {
        Self {
            kind: "external",
            external: ExternalFile { url },
        }
    }
}

/// Body of `POST /v1/pages`
#[derive(Serialize, Debug)]
pub struct CreatePageRequest<'a> {
    pub parent: Parent<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<Cover<'a>>,
    pub properties: &'a PropertySet,
}

/// Body of `PATCH /v1/pages/{page_id}`
#[derive(Serialize, Debug)]
pub struct UpdatePageRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<Cover<'a>>,
    pub properties: &'a PropertySet,
}

/// Body of `POST /v1/databases/{database_id}/query`
#[derive(Serialize, Debug)]
pub struct QueryRequest<'a> {
    pub page_size: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<&'a str>,
}

/// One page of database query results.
#[non_exhaustive]
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub results: Vec<PageObject>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

impl QueryPage {
    #[must_use]
    #[inline]
    pub const fn new(results: Vec<PageObject>, next_cursor: Option<String>, has_more: bool) -> Self {
        Self {
            results,
            next_cursor,
            has_more,
        }
    }

    /// Cursor for the following page, `None` once Notion reports no more results.
    #[must_use]
    #[inline]
    pub fn next(&self) -> Option<&str> {
        if self.has_more {
            self.next_cursor.as_deref()
        } else {
            None
        }
    }
}

/// A database row as returned by a query. Properties are kept as raw JSON, only a few are read.
#[non_exhaustive]
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PageObject {
    pub id: String,
    #[serde(default)]
    pub properties: Value,
}

impl PageObject {
    #[must_use]
    #[inline]
    pub const fn new(id: String, properties: Value) -> Self {
        Self { id, properties }
    }
}

/// The only field of a created or updated page the sync cares about.
#[derive(Deserialize, Debug)]
pub struct PageReference {
    pub id: String,
}
