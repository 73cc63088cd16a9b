use std::sync::Arc;

use sqlx::SqlitePool;
use time::OffsetDateTime;

use super::error::LibraryError;
use super::models::{Book, CatalogFilter, CreateBook, IssueRecord, IssueRequest, IssuedBook};
use super::policy::LibraryPolicy;
use super::store::LibraryStore;

/// Catalog, ledger and the issue/return workflow over them.
///
/// Callers pass `now` explicitly so the workflow never reads the clock itself.
#[derive(Debug, Clone)]
pub struct LibraryService {
    store: LibraryStore,
    policy: Arc<LibraryPolicy>,
}

impl LibraryService {
    pub fn new(pool: SqlitePool, policy: LibraryPolicy) -> Self {
        Self {
            store: LibraryStore::new(pool),
            policy: Arc::new(policy),
        }
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub async fn list_books(&self, filter: CatalogFilter) -> Result<Vec<Book>, LibraryError> {
        let books = self.store.list_books(&filter).await?;
        tracing::debug!(?filter, count = books.len(), "catalog queried");
        Ok(books)
    }

    pub async fn add_book(&self, request: CreateBook, now: OffsetDateTime) -> Result<Book, LibraryError> {
        let book = self.store.insert_book(request.validate()?, now).await?;
        tracing::info!(
            book_id = %book.id,
            title = %book.title,
            copies = book.copies,
            "book added to catalog"
        );
        Ok(book)
    }

    pub async fn delete_book(&self, book_id: &str) -> Result<(), LibraryError> {
        self.store
            .delete_book(book_id, self.policy.deny_delete_with_open_loans())
            .await?;
        tracing::info!(%book_id, "book removed from catalog");
        Ok(())
    }

    pub async fn issue(&self, request: IssueRequest, now: OffsetDateTime) -> Result<IssueRecord, LibraryError> {
        let (book_id, borrower) = request.validate()?;
        let due_date = self.policy.due_date(now);

        let record = self.store.issue(&book_id, &borrower, now, due_date).await?;
        tracing::info!(
            issue_id = %record.id,
            book_id = %record.book_id,
            student_id = %record.student_id,
            due_date = %record.due_date,
            "book issued"
        );
        Ok(record)
    }

    pub async fn return_book(&self, issue_id: &str, now: OffsetDateTime) -> Result<IssueRecord, LibraryError> {
        let record = self.store.return_issue(issue_id, now, &self.policy).await?;
        tracing::info!(
            issue_id = %record.id,
            book_id = %record.book_id,
            fine = %record.fine,
            "book returned"
        );
        Ok(record)
    }

    pub async fn issued(&self, now: OffsetDateTime) -> Result<Vec<IssuedBook>, LibraryError> {
        self.store.list_issued(now).await
    }
}
