//! Drives the library screens: owns the catalog and ledger views, the
//! selection and the filter, and reloads after every mutation.

use csv::{QuoteStyle, WriterBuilder};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::client::LibraryApi;
use crate::debounce::Debouncer;
use crate::error::ClientError;
use crate::models::{Book, CatalogQuery, IssueRecord, NewBook};
use crate::notify::Notification;
use crate::selection::Selection;
use crate::view::{CatalogView, LedgerView};

/// Outcome of a bulk delete. Deletions that succeeded stay deleted even
/// when later ones fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BulkDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub contents: String,
}

pub struct LibraryController<A> {
    api: A,
    query: CatalogQuery,
    catalog: CatalogView,
    ledger: LedgerView,
    selection: Selection,
    notifications: Vec<Notification>,
    initialized: bool,
}

impl<A: LibraryApi> LibraryController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            query: CatalogQuery::default(),
            catalog: CatalogView::default(),
            ledger: LedgerView::default(),
            selection: Selection::new(),
            notifications: Vec::new(),
            initialized: false,
        }
    }

    /// Load both views. Only the first call does anything; returns whether
    /// this call performed the initialisation.
    pub async fn init(&mut self) -> bool {
        if self.initialized {
            tracing::debug!("library controller already initialised");
            return false;
        }
        self.initialized = true;
        self.reload().await;
        tracing::debug!(
            books = self.catalog.len(),
            issued = self.ledger.len(),
            "library controller initialised"
        );
        true
    }

    pub async fn reload(&mut self) {
        self.reload_catalog().await;
        self.reload_ledger().await;
    }

    /// Replace the catalog view from the API. On failure the previous view
    /// is kept and an error notification is queued.
    pub async fn reload_catalog(&mut self) -> bool {
        match self.api.list_books(&self.query).await {
            Ok(books) => {
                self.catalog = CatalogView::from_books(books);
                self.selection.retain_known(self.catalog.ids());
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "catalog reload failed");
                self.notify(Notification::error(format!("Failed to load library books: {err}")));
                false
            }
        }
    }

    pub async fn reload_ledger(&mut self) -> bool {
        match self.api.issued().await {
            Ok(records) => {
                self.ledger = LedgerView::from_records(records, OffsetDateTime::now_utc());
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "ledger reload failed");
                self.notify(Notification::error(format!("Failed to load issued books: {err}")));
                false
            }
        }
    }

    pub async fn set_query(&mut self, query: CatalogQuery) -> bool {
        self.query = query;
        self.reload_catalog().await
    }

    pub async fn set_class_filter(&mut self, class_name: Option<String>) -> bool {
        self.query.class_name = class_name;
        self.reload_catalog().await
    }

    pub async fn set_search(&mut self, search: impl Into<String>) -> bool {
        self.query.search = Some(search.into());
        self.reload_catalog().await
    }

    /// Apply each term that settles out of `input` until every
    /// [`crate::DebounceInput`] for it is dropped.
    pub async fn follow_search(&mut self, input: &mut Debouncer<String>) {
        while let Some(term) = input.settled().await {
            tracing::debug!(search = %term, "search settled");
            self.set_search(term).await;
        }
    }

    pub async fn add_book(&mut self, book: &NewBook) -> Result<Book, ClientError> {
        let result = self.api.add_book(book).await;
        self.settle(&result, "Book added successfully", "Failed to add book");
        if result.is_ok() {
            self.reload_catalog().await;
        }
        result
    }

    pub async fn issue(&mut self, book_id: &str, student: &str) -> Result<IssueRecord, ClientError> {
        let result = self.api.issue(book_id, student).await;
        self.settle(&result, "Book issued successfully", "Failed to issue book");
        if result.is_ok() {
            self.reload().await;
        }
        result
    }

    pub async fn return_issue(&mut self, issue_id: &str) -> Result<IssueRecord, ClientError> {
        let result = self.api.return_issue(issue_id).await;
        self.settle(&result, "Book returned successfully", "Failed to return book");
        if result.is_ok() {
            self.reload().await;
        }
        result
    }

    pub async fn delete_book(&mut self, book_id: &str) -> Result<(), ClientError> {
        let result = self.api.delete_book(book_id).await;
        self.settle(&result, "Book deleted", "Failed to delete book");
        if result.is_ok() {
            self.selection.remove(book_id);
            self.reload_catalog().await;
        }
        result
    }

    /// Delete every selected book, one request at a time. A failure does not
    /// stop the run and nothing is rolled back.
    pub async fn bulk_delete(&mut self) -> BulkDeleteReport {
        let mut report = BulkDeleteReport::default();
        for id in self.selection.ids() {
            match self.api.delete_book(&id).await {
                Ok(()) => {
                    self.selection.remove(&id);
                    report.deleted.push(id);
                }
                Err(err) => {
                    tracing::warn!(book_id = %id, error = %err, "bulk delete item failed");
                    report.failed.push((id, err.to_string()));
                }
            }
        }

        if report.deleted.is_empty() && report.failed.is_empty() {
            return report;
        }

        if report.is_complete() {
            self.notify(Notification::success("Selected books deleted"));
        } else {
            let attempted = report.deleted.len() + report.failed.len();
            self.notify(Notification::error(format!(
                "Some deletions failed ({} of {attempted})",
                report.failed.len()
            )));
        }

        self.reload_catalog().await;
        report
    }

    /// CSV of the selected books, looked up in the unfiltered catalog.
    /// Returns `None` (with a notification) when there is nothing to export.
    pub async fn export_selected(&mut self, today: Date) -> Result<Option<CsvExport>, ClientError> {
        if self.selection.is_empty() {
            self.notify(Notification::warning("Select books to export"));
            return Ok(None);
        }

        let books = match self.api.list_books(&CatalogQuery::default()).await {
            Ok(books) => books,
            Err(err) => {
                self.notify(Notification::error(format!("Export failed: {err}")));
                return Err(err);
            }
        };

        let selected: Vec<&Book> = books
            .iter()
            .filter(|book| self.selection.contains(&book.id))
            .collect();
        if selected.is_empty() {
            self.notify(Notification::error("No matching books found"));
            return Ok(None);
        }

        let contents = match books_csv(&selected) {
            Ok(contents) => contents,
            Err(err) => {
                self.notify(Notification::error(format!("Export failed: {err}")));
                return Err(err);
            }
        };
        let export = CsvExport {
            file_name: export_file_name(today),
            contents,
        };
        self.notify(Notification::success("Exported selected books"));
        Ok(Some(export))
    }

    fn settle<T>(&mut self, result: &Result<T, ClientError>, success: &str, failure: &str) {
        match result {
            Ok(_) => self.notify(Notification::success(success)),
            Err(err) => {
                tracing::warn!(error = %err, "{failure}");
                self.notify(Notification::error(err.to_string()));
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn catalog(&self) -> &CatalogView {
        &self.catalog
    }

    pub fn ledger(&self) -> &LedgerView {
        &self.ledger
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Select the given ids that appear in the current catalog view and
    /// return the ones that do not.
    pub fn select(&mut self, ids: &[String]) -> Vec<String> {
        let mut unknown = Vec::new();
        for id in ids {
            if self.catalog.find(id).is_some() {
                self.selection.set(id, true);
            } else {
                unknown.push(id.clone());
            }
        }
        unknown
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn query(&self) -> &CatalogQuery {
        &self.query
    }

    pub fn book_count(&self) -> usize {
        self.catalog.len()
    }

    pub fn issued_count(&self) -> usize {
        self.ledger.len()
    }
}

fn export_file_name(today: Date) -> String {
    let date = today
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| today.to_string());
    format!("library_export_{date}.csv")
}

const EXPORT_HEADER: [&str; 6] = ["Title", "Author", "Class", "Status", "Available", "Genre"];

/// Header row bare, data fields quoted unless numeric.
pub fn books_csv(books: &[&Book]) -> Result<String, ClientError> {
    let mut header = WriterBuilder::new().from_writer(Vec::new());
    header.write_record(EXPORT_HEADER)?;
    let buffer = header.into_inner().map_err(|err| csv::Error::from(err.into_error()))?;

    let mut rows = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(buffer);
    for book in books {
        let available = book.available.to_string();
        rows.write_record([
            book.title.as_str(),
            book.author.as_str(),
            book.class_name.as_str(),
            book.status.as_str(),
            available.as_str(),
            book.genre.as_str(),
        ])?;
    }
    let bytes = rows.into_inner().map_err(|err| csv::Error::from(err.into_error()))?;
    String::from_utf8(bytes).map_err(|err| {
        ClientError::Export(csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssuedBook;
    use crate::debounce::SEARCH_DEBOUNCE;
    use crate::notify::Level;
    use crate::view::fixtures::book;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;
    use time::macros::date;

    #[derive(Default)]
    struct State {
        books: Vec<Book>,
        records: Vec<IssueRecord>,
        queries: Vec<CatalogQuery>,
        fail_deletes: HashSet<String>,
        offline: bool,
    }

    #[derive(Default)]
    struct FakeApi {
        state: Mutex<State>,
    }

    impl FakeApi {
        fn with_books(books: Vec<Book>) -> Self {
            let api = FakeApi::default();
            api.state.lock().unwrap().books = books;
            api
        }

        fn down() -> ClientError {
            ClientError::Api {
                status: 503,
                message: "service unavailable".into(),
            }
        }
    }

    #[async_trait]
    impl LibraryApi for FakeApi {
        async fn list_books(&self, query: &CatalogQuery) -> Result<Vec<Book>, ClientError> {
            let mut state = self.state.lock().unwrap();
            if state.offline {
                return Err(Self::down());
            }
            state.queries.push(query.clone());
            Ok(state.books.clone())
        }

        async fn add_book(&self, new: &NewBook) -> Result<Book, ClientError> {
            let mut state = self.state.lock().unwrap();
            let mut added = book(&format!("b{}", state.books.len() + 1), &new.title, new.copies);
            added.copies = new.copies;
            state.books.push(added.clone());
            Ok(added)
        }

        async fn delete_book(&self, book_id: &str) -> Result<(), ClientError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_deletes.contains(book_id) {
                return Err(ClientError::Api {
                    status: 409,
                    message: format!("book {book_id} has 1 copies on loan"),
                });
            }
            state.books.retain(|b| b.id != book_id);
            Ok(())
        }

        async fn issue(&self, book_id: &str, student: &str) -> Result<IssueRecord, ClientError> {
            let mut state = self.state.lock().unwrap();
            let Some(book) = state.books.iter_mut().find(|b| b.id == book_id) else {
                return Err(ClientError::Api {
                    status: 404,
                    message: format!("book {book_id} not found"),
                });
            };
            if book.available < 1 {
                return Err(ClientError::Api {
                    status: 409,
                    message: format!("no copies of book {book_id} are available"),
                });
            }
            book.available -= 1;
            let now = OffsetDateTime::now_utc();
            let record = IssueRecord {
                id: format!("r{}", state.records.len() + 1),
                book_id: book_id.into(),
                student_id: student.into(),
                issue_date: now,
                due_date: now + time::Duration::days(14),
                returned: false,
                returned_at: None,
                fine: Decimal::ZERO,
            };
            state.records.push(record.clone());
            Ok(record)
        }

        async fn issued(&self) -> Result<Vec<IssuedBook>, ClientError> {
            let state = self.state.lock().unwrap();
            if state.offline {
                return Err(Self::down());
            }
            Ok(state
                .records
                .iter()
                .map(|r| IssuedBook {
                    id: r.id.clone(),
                    book_id: r.book_id.clone(),
                    title: "Unknown".into(),
                    class_name: "Ungrouped".into(),
                    student_id: r.student_id.clone(),
                    borrower_name: "Unknown".into(),
                    issue_date: r.issue_date,
                    due_date: r.due_date,
                    returned: r.returned,
                    returned_at: r.returned_at,
                    fine: r.fine,
                    overdue: false,
                })
                .collect())
        }

        async fn return_issue(&self, issue_id: &str) -> Result<IssueRecord, ClientError> {
            let mut state = self.state.lock().unwrap();
            let Some(record) = state.records.iter_mut().find(|r| r.id == issue_id) else {
                return Err(ClientError::Api {
                    status: 404,
                    message: format!("issue record {issue_id} not found"),
                });
            };
            if record.returned {
                return Err(ClientError::Api {
                    status: 409,
                    message: format!("issue record {issue_id} has already been returned"),
                });
            }
            record.returned = true;
            let record = record.clone();
            if let Some(book) = state.books.iter_mut().find(|b| b.id == record.book_id) {
                book.available = (book.available + 1).min(book.copies);
            }
            Ok(record)
        }
    }

    fn shelf() -> Vec<Book> {
        vec![book("b1", "The Promised Land", 1), book("b2", "Land Without Thunder", 2), book("b3", "The Strange Bride", 0)]
    }

    #[tokio::test]
    async fn init_runs_once() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));

        assert!(controller.init().await);
        assert!(!controller.init().await);

        assert_eq!(controller.book_count(), 3);
        assert_eq!(controller.api.state.lock().unwrap().queries.len(), 1);
        assert!(controller.take_notifications().is_empty());
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_view() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));
        controller.init().await;

        controller.api.state.lock().unwrap().offline = true;
        assert!(!controller.set_search("land").await);

        assert_eq!(controller.book_count(), 3);
        let notes = controller.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, Level::Error);
        assert!(notes[0].message.contains("service unavailable"));
    }

    #[tokio::test]
    async fn filter_changes_are_sent_to_the_api() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));
        controller.set_search("land").await;
        controller.set_class_filter(Some("Form 3".into())).await;

        let queries = controller.api.state.lock().unwrap().queries.clone();
        assert_eq!(queries[0].search.as_deref(), Some("land"));
        assert_eq!(queries[1].class_name.as_deref(), Some("Form 3"));
        assert_eq!(controller.query().to_pairs(), vec![("className", "Form 3".to_string())]);
    }

    #[tokio::test]
    async fn issue_and_return_reload_both_views() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));
        controller.init().await;

        let record = controller.issue("b1", "ADM-001").await.unwrap();
        assert!(!controller.catalog().find("b1").unwrap().can_issue);
        assert_eq!(controller.ledger().open_count(), 1);

        let err = controller.issue("b1", "ADM-001").await.unwrap_err();
        assert_eq!(err.status(), Some(409));

        controller.return_issue(&record.id).await.unwrap();
        assert!(controller.catalog().find("b1").unwrap().can_issue);
        assert_eq!(controller.ledger().open_count(), 0);
        assert_eq!(controller.issued_count(), 1);

        let levels: Vec<Level> = controller.take_notifications().iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![Level::Success, Level::Error, Level::Success]);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_sends_one_search() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));
        let (typed, mut settled) = crate::debounce::debounce(SEARCH_DEBOUNCE);

        let typist = tokio::spawn(async move {
            for term in ["l", "la", "lan", "land"] {
                assert!(typed.push(term.to_string()));
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        });
        controller.follow_search(&mut settled).await;
        typist.await.unwrap();

        let queries = controller.api.state.lock().unwrap().queries.clone();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].search.as_deref(), Some("land"));
        assert_eq!(controller.query().search.as_deref(), Some("land"));
    }

    #[tokio::test]
    async fn add_book_reloads_catalog() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));
        controller.init().await;

        controller
            .add_book(&NewBook {
                title: "Dilemma".into(),
                author: "Francis Imbuga".into(),
                class_name: "Form 4".into(),
                copies: 2,
                ..NewBook::default()
            })
            .await
            .unwrap();

        assert_eq!(controller.book_count(), 4);
    }

    #[tokio::test]
    async fn bulk_delete_reports_partial_failure() {
        let api = FakeApi::with_books(shelf());
        api.state.lock().unwrap().fail_deletes.insert("b2".into());
        let mut controller = LibraryController::new(api);
        controller.init().await;
        controller.selection_mut().set_all(["b1", "b2", "b3"], true);

        let report = controller.bulk_delete().await;

        assert_eq!(report.deleted, vec!["b1".to_string(), "b3".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b2");
        assert!(!report.is_complete());

        assert_eq!(controller.book_count(), 1);
        assert_eq!(controller.selection().ids(), vec!["b2".to_string()]);
        let notes = controller.take_notifications();
        assert_eq!(notes.last().unwrap().message, "Some deletions failed (1 of 3)");
    }

    #[tokio::test]
    async fn select_skips_ids_outside_the_catalog() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));
        controller.init().await;

        let unknown = controller.select(&["b2".to_string(), "gone".to_string()]);

        assert_eq!(unknown, vec!["gone".to_string()]);
        assert_eq!(controller.selection().ids(), vec!["b2".to_string()]);
    }

    #[tokio::test]
    async fn reload_prunes_selection() {
        let mut controller = LibraryController::new(FakeApi::with_books(shelf()));
        controller.init().await;
        controller.selection_mut().set_all(["b1", "b3"], true);

        controller.api.state.lock().unwrap().books.retain(|b| b.id != "b3");
        controller.reload_catalog().await;

        assert_eq!(controller.selection().ids(), vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn export_writes_selected_books_as_csv() {
        let mut books = shelf();
        books[0].title = "Say \"Hello\"".into();
        books[2].title = "Mine Boy, \"Xuma\" edition".into();
        let mut controller = LibraryController::new(FakeApi::with_books(books));
        controller.init().await;

        assert_eq!(controller.export_selected(date!(2026 - 03 - 02)).await.unwrap(), None);
        assert_eq!(controller.take_notifications()[0].level, Level::Warning);

        controller.selection_mut().set_all(["b1", "b3"], true);
        let export = controller
            .export_selected(date!(2026 - 03 - 02))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(export.file_name, "library_export_2026-03-02.csv");
        assert_eq!(
            export.contents,
            concat!(
                "Title,Author,Class,Status,Available,Genre\n",
                "\"Say \"\"Hello\"\"\",\"Grace Ogot\",\"Form 3\",\"available\",1,\"Novel\"\n",
                "\"Mine Boy, \"\"Xuma\"\" edition\",\"Grace Ogot\",\"Form 3\",\"issued\",0,\"Novel\"\n",
            )
        );
    }
}
