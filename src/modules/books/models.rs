use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::{FieldError, LibraryError};

/// Informational status of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Issued,
    Lost,
}

impl BookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Issued => "issued",
            BookStatus::Lost => "lost",
        }
    }

    /// Status implied by an availability count. `Lost` is never derived.
    pub fn for_availability(available: i64) -> Self {
        if available > 0 {
            BookStatus::Available
        } else {
            BookStatus::Issued
        }
    }
}

impl std::str::FromStr for BookStatus {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookStatus::Available),
            "issued" => Ok(BookStatus::Issued),
            "lost" => Ok(BookStatus::Lost),
            other => Err(LibraryError::Corrupt(format!("unknown book status '{other}'"))),
        }
    }
}

/// A title in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: Option<i32>,
    pub genre: String,
    /// Class grouping the title is shelved under
    pub class_name: String,
    /// Physical copies owned
    pub copies: i64,
    /// Copies currently on the shelf; `0 <= available <= copies`
    pub available: i64,
    pub status: BookStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Request body for adding a title.
///
/// Every field is optional at the wire level so that missing fields come back
/// as field-level validation details rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub class_name: Option<String>,
    pub copies: Option<i64>,
    pub available: Option<i64>,
    pub status: Option<BookStatus>,
}

/// A validated [`CreateBook`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub year: Option<i32>,
    pub genre: String,
    pub class_name: String,
    pub copies: i64,
    pub available: i64,
    pub status: BookStatus,
}

fn required(field: &'static str, value: Option<String>, errors: &mut Vec<FieldError>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            errors.push(FieldError::new(field, "required"));
            String::new()
        }
    }
}

impl CreateBook {
    pub fn validate(self) -> Result<NewBook, LibraryError> {
        let mut errors = Vec::new();

        let title = required("title", self.title, &mut errors);
        let author = required("author", self.author, &mut errors);
        let class_name = required("className", self.class_name, &mut errors);

        let copies = self.copies.unwrap_or(1);
        if copies < 1 {
            errors.push(FieldError::new("copies", "must be at least 1"));
        }

        let available = self.available.unwrap_or(copies);
        if available < 0 || available > copies {
            errors.push(FieldError::new("available", "must be between 0 and copies"));
        }

        if !errors.is_empty() {
            return Err(LibraryError::Validation(errors));
        }

        let status = match self.status {
            Some(BookStatus::Lost) => BookStatus::Lost,
            _ => BookStatus::for_availability(available),
        };

        Ok(NewBook {
            title,
            author,
            year: self.year,
            genre: self.genre.map(|g| g.trim().to_string()).unwrap_or_default(),
            class_name,
            copies,
            available,
            status,
        })
    }
}

/// Query string of `GET /api/books`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub class_name: Option<String>,
    pub search: Option<String>,
}

/// Resolved catalog filter. A class filter wins over a search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogFilter {
    All,
    Class(String),
    Search(String),
}

impl From<BookQuery> for CatalogFilter {
    fn from(query: BookQuery) -> Self {
        let non_empty = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        if let Some(class_name) = non_empty(query.class_name) {
            CatalogFilter::Class(class_name)
        } else if let Some(term) = non_empty(query.search) {
            CatalogFilter::Search(term)
        } else {
            CatalogFilter::All
        }
    }
}

/// Request body of `POST /api/books/issue`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub book_id: Option<String>,
    /// Student id or admission number of the borrower
    pub student_id: Option<String>,
}

impl IssueRequest {
    /// Returns `(book_id, borrower_reference)`.
    pub fn validate(self) -> Result<(String, String), LibraryError> {
        let mut errors = Vec::new();
        let book_id = required("bookId", self.book_id, &mut errors);
        let student_id = required("studentId", self.student_id, &mut errors);

        if errors.is_empty() {
            Ok((book_id, student_id))
        } else {
            Err(LibraryError::Validation(errors))
        }
    }
}

/// One loan in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub id: String,
    pub book_id: String,
    pub student_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issue_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    pub returned: bool,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub returned_at: Option<OffsetDateTime>,
    pub fine: Decimal,
}

impl IssueRecord {
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        !self.returned && self.due_date < now
    }
}

/// Ledger row joined with the book and borrower it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedBook {
    /// Issue record id
    pub id: String,
    pub book_id: String,
    pub title: String,
    pub class_name: String,
    pub student_id: String,
    pub borrower_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issue_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    pub returned: bool,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub returned_at: Option<OffsetDateTime>,
    pub fine: Decimal,
    pub overdue: bool,
}
