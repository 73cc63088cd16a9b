//! SQL side of the catalog and the issue ledger.
//!
//! Availability is only ever changed by single conditional `UPDATE`
//! statements, and every workflow step that touches both tables runs inside
//! one transaction. Concurrent requests (or concurrent server processes
//! sharing the database file) are serialised by SQLite itself.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::LibraryError;
use super::models::{Book, BookStatus, CatalogFilter, IssueRecord, IssuedBook, NewBook};
use super::policy::LibraryPolicy;
use crate::modules::students::store::find_by_reference;

const BOOK_COLUMNS: &str =
    "id, title, author, year, genre, class_name, copies, available, status, created_at";

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: String,
    title: String,
    author: String,
    year: Option<i32>,
    genre: String,
    class_name: String,
    copies: i64,
    available: i64,
    status: String,
    created_at: OffsetDateTime,
}

impl TryFrom<BookRow> for Book {
    type Error = LibraryError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Book {
            status: BookStatus::from_str(&row.status)?,
            id: row.id,
            title: row.title,
            author: row.author,
            year: row.year,
            genre: row.genre,
            class_name: row.class_name,
            copies: row.copies,
            available: row.available,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IssueRow {
    id: String,
    book_id: String,
    student_id: String,
    issue_date: OffsetDateTime,
    due_date: OffsetDateTime,
    returned: bool,
    returned_at: Option<OffsetDateTime>,
    fine: String,
}

fn parse_fine(raw: &str) -> Result<Decimal, LibraryError> {
    Decimal::from_str(raw).map_err(|e| LibraryError::Corrupt(format!("fine '{raw}': {e}")))
}

impl TryFrom<IssueRow> for IssueRecord {
    type Error = LibraryError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        Ok(IssueRecord {
            fine: parse_fine(&row.fine)?,
            id: row.id,
            book_id: row.book_id,
            student_id: row.student_id,
            issue_date: row.issue_date,
            due_date: row.due_date,
            returned: row.returned,
            returned_at: row.returned_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IssuedBookRow {
    id: String,
    book_id: String,
    title: String,
    class_name: String,
    student_id: String,
    borrower_name: String,
    issue_date: OffsetDateTime,
    due_date: OffsetDateTime,
    returned: bool,
    returned_at: Option<OffsetDateTime>,
    fine: String,
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone)]
pub struct LibraryStore {
    pool: SqlitePool,
}

impl LibraryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_book(&self, new: NewBook, now: OffsetDateTime) -> Result<Book, LibraryError> {
        let book = Book {
            id: Uuid::now_v7().to_string(),
            title: new.title,
            author: new.author,
            year: new.year,
            genre: new.genre,
            class_name: new.class_name,
            copies: new.copies,
            available: new.available,
            status: new.status,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO books (id, title, author, year, genre, class_name, copies, available, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .bind(&book.genre)
        .bind(&book.class_name)
        .bind(book.copies)
        .bind(book.available)
        .bind(book.status.as_str())
        .bind(book.created_at)
        .execute(&self.pool)
        .await?;

        Ok(book)
    }

    pub async fn get_book(&self, id: &str) -> Result<Option<Book>, LibraryError> {
        let row = sqlx::query_as::<_, BookRow>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Book::try_from).transpose()
    }

    pub async fn list_books(&self, filter: &CatalogFilter) -> Result<Vec<Book>, LibraryError> {
        let rows = match filter {
            CatalogFilter::All => {
                sqlx::query_as::<_, BookRow>(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books ORDER BY title COLLATE NOCASE, created_at"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            CatalogFilter::Class(class_name) => {
                sqlx::query_as::<_, BookRow>(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books WHERE class_name = ? ORDER BY title COLLATE NOCASE, created_at"
                ))
                .bind(class_name)
                .fetch_all(&self.pool)
                .await?
            }
            CatalogFilter::Search(term) => {
                sqlx::query_as::<_, BookRow>(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books
                     WHERE title LIKE ?1 ESCAPE '\\' OR author LIKE ?1 ESCAPE '\\' OR genre LIKE ?1 ESCAPE '\\'
                     ORDER BY title COLLATE NOCASE, created_at"
                ))
                .bind(like_pattern(term))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Book::try_from).collect()
    }

    /// Delete a title. With `deny_open_loans` the open-loan check and the
    /// delete are the same statement.
    pub async fn delete_book(&self, id: &str, deny_open_loans: bool) -> Result<(), LibraryError> {
        let deleted = sqlx::query(
            "DELETE FROM books
             WHERE id = ?1
               AND (?2 = 0 OR NOT EXISTS (
                    SELECT 1 FROM issue_records WHERE book_id = ?1 AND returned = 0))",
        )
        .bind(id)
        .bind(deny_open_loans)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted == 1 {
            return Ok(());
        }

        if self.get_book(id).await?.is_none() {
            return Err(LibraryError::BookNotFound(id.to_string()));
        }

        let (open,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM issue_records WHERE book_id = ? AND returned = 0")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Err(LibraryError::OpenLoans {
            book_id: id.to_string(),
            open,
        })
    }

    /// Take one copy off the shelf and open a ledger entry for it.
    ///
    /// `borrower` is a student id or admission number. Nothing is written
    /// unless the book has a copy available and the borrower exists.
    pub async fn issue(
        &self,
        book_id: &str,
        borrower: &str,
        issued_at: OffsetDateTime,
        due_date: OffsetDateTime,
    ) -> Result<IssueRecord, LibraryError> {
        let student = {
            let mut conn = self.pool.acquire().await?;
            find_by_reference(&mut conn, borrower)
                .await?
                .ok_or_else(|| LibraryError::StudentNotFound(borrower.to_string()))?
        };

        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query(
            "UPDATE books
             SET available = available - 1,
                 status = CASE WHEN status = 'lost' THEN status
                               WHEN available - 1 = 0 THEN 'issued'
                               ELSE 'available' END
             WHERE id = ? AND available > 0",
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if taken == 0 {
            let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM books WHERE id = ?")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => LibraryError::NoCopiesAvailable(book_id.to_string()),
                None => LibraryError::BookNotFound(book_id.to_string()),
            });
        }

        let record = IssueRecord {
            id: Uuid::now_v7().to_string(),
            book_id: book_id.to_string(),
            student_id: student.id,
            issue_date: issued_at,
            due_date,
            returned: false,
            returned_at: None,
            fine: Decimal::ZERO,
        };

        sqlx::query(
            "INSERT INTO issue_records (id, book_id, student_id, issue_date, due_date, returned, fine)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&record.id)
        .bind(&record.book_id)
        .bind(&record.student_id)
        .bind(record.issue_date)
        .bind(record.due_date)
        .bind(record.fine.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    /// Close an open ledger entry, settle its fine and put the copy back on
    /// the shelf (never above `copies`).
    pub async fn return_issue(
        &self,
        issue_id: &str,
        returned_at: OffsetDateTime,
        policy: &LibraryPolicy,
    ) -> Result<IssueRecord, LibraryError> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, IssueRow>(
            "UPDATE issue_records
             SET returned = 1, returned_at = ?
             WHERE id = ? AND returned = 0
             RETURNING id, book_id, student_id, issue_date, due_date, returned, returned_at, fine",
        )
        .bind(returned_at)
        .bind(issue_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = closed else {
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT id FROM issue_records WHERE id = ?")
                    .bind(issue_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                Some(_) => LibraryError::AlreadyReturned(issue_id.to_string()),
                None => LibraryError::IssueNotFound(issue_id.to_string()),
            });
        };

        let mut record = IssueRecord::try_from(row)?;
        record.fine = policy.fine_for(record.due_date, returned_at);

        sqlx::query("UPDATE issue_records SET fine = ? WHERE id = ?")
            .bind(record.fine.to_string())
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        let restocked = sqlx::query(
            "UPDATE books
             SET available = MIN(available + 1, copies),
                 status = CASE WHEN status = 'lost' THEN status ELSE 'available' END
             WHERE id = ?",
        )
        .bind(&record.book_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if restocked == 0 {
            tracing::warn!(
                issue_id = %record.id,
                book_id = %record.book_id,
                "returned copy belongs to a book no longer in the catalog"
            );
        }

        tx.commit().await?;
        Ok(record)
    }

    /// The ledger, open loans first, newest issue first within each group.
    pub async fn list_issued(&self, now: OffsetDateTime) -> Result<Vec<IssuedBook>, LibraryError> {
        let rows = sqlx::query_as::<_, IssuedBookRow>(
            "SELECT r.id,
                    r.book_id,
                    COALESCE(b.title, 'Unknown') AS title,
                    COALESCE(b.class_name, 'Ungrouped') AS class_name,
                    r.student_id,
                    COALESCE(s.name, 'Unknown') AS borrower_name,
                    r.issue_date,
                    r.due_date,
                    r.returned,
                    r.returned_at,
                    r.fine
             FROM issue_records r
             LEFT JOIN books b ON b.id = r.book_id
             LEFT JOIN students s ON s.id = r.student_id
             ORDER BY r.returned ASC, r.issue_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(IssuedBook {
                    fine: parse_fine(&row.fine)?,
                    overdue: !row.returned && row.due_date < now,
                    id: row.id,
                    book_id: row.book_id,
                    title: row.title,
                    class_name: row.class_name,
                    student_id: row.student_id,
                    borrower_name: row.borrower_name,
                    issue_date: row.issue_date,
                    due_date: row.due_date,
                    returned: row.returned,
                    returned_at: row.returned_at,
                })
            })
            .collect()
    }

    pub async fn count_books(&self) -> Result<i64, LibraryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_open_issues(&self) -> Result<i64, LibraryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM issue_records WHERE returned = 0")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("river"), "%river%");
        assert_eq!(like_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
    }
}
