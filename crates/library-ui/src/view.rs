//! Row models for the catalog table and the issue ledger.
//!
//! A view is only ever built from one successful API response. A failed
//! reload leaves the previous view untouched.

use time::OffsetDateTime;

use crate::models::{Book, IssuedBook};

#[derive(Debug, Clone, PartialEq)]
pub struct BookRow {
    pub book: Book,
    /// Issue is offered only while a copy is on the shelf.
    pub can_issue: bool,
    pub can_delete: bool,
    /// Editing has no backend route yet; the action is shown disabled.
    pub can_edit: bool,
}

impl From<Book> for BookRow {
    fn from(book: Book) -> Self {
        Self {
            can_issue: book.available >= 1,
            can_delete: true,
            can_edit: false,
            book,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogView {
    pub rows: Vec<BookRow>,
}

impl CatalogView {
    pub fn from_books(books: Vec<Book>) -> Self {
        Self {
            rows: books.into_iter().map(BookRow::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.book.id.as_str())
    }

    pub fn find(&self, book_id: &str) -> Option<&BookRow> {
        self.rows.iter().find(|row| row.book.id == book_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub record: IssuedBook,
    pub overdue: bool,
    pub can_return: bool,
}

impl LedgerRow {
    /// The server flags overdue loans at query time. The flag is recomputed
    /// against `now` so a long-lived view stays honest.
    pub fn new(record: IssuedBook, now: OffsetDateTime) -> Self {
        Self {
            overdue: !record.returned && (record.overdue || record.due_date < now),
            can_return: !record.returned,
            record,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.record.returned {
            "Returned"
        } else {
            "Issued"
        }
    }

    pub fn fine_label(&self) -> String {
        if self.record.fine.is_zero() {
            "-".to_string()
        } else {
            format!("Ksh {:.2}", self.record.fine)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerView {
    pub rows: Vec<LedgerRow>,
}

impl LedgerView {
    pub fn from_records(records: Vec<IssuedBook>, now: OffsetDateTime) -> Self {
        Self {
            rows: records.into_iter().map(|r| LedgerRow::new(r, now)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.rows.iter().filter(|row| row.can_return).count()
    }

    pub fn overdue_count(&self) -> usize {
        self.rows.iter().filter(|row| row.overdue).count()
    }
}
