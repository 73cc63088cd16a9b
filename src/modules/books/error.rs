use school_http::error::AppError;
use serde::Serialize;
use thiserror::Error;

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: &'static str,
}

impl FieldError {
    pub fn new(field: &'static str, error: &'static str) -> Self {
        Self { field, error }
    }
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("book {0} not found")]
    BookNotFound(String),

    #[error("issue record {0} not found")]
    IssueNotFound(String),

    #[error("student {0} not found")]
    StudentNotFound(String),

    #[error("no copies of book {0} are available")]
    NoCopiesAvailable(String),

    #[error("issue record {0} has already been returned")]
    AlreadyReturned(String),

    #[error("book {book_id} has {open} copies on loan")]
    OpenLoans { book_id: String, open: i64 },

    #[error("invalid request")]
    Validation(Vec<FieldError>),

    #[error("stored data is inconsistent: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::BookNotFound(_)
            | LibraryError::IssueNotFound(_)
            | LibraryError::StudentNotFound(_) => AppError::not_found(err.to_string()),
            LibraryError::NoCopiesAvailable(_) => {
                AppError::conflict_with_code("no_copies_available", err.to_string())
            }
            LibraryError::AlreadyReturned(_) => {
                AppError::conflict_with_code("already_returned", err.to_string())
            }
            LibraryError::OpenLoans { .. } => {
                AppError::conflict_with_code("open_loans", err.to_string())
            }
            LibraryError::Validation(fields) => AppError::validation(
                fields
                    .iter()
                    .map(|f| serde_json::json!({ "field": f.field, "error": f.error }))
                    .collect(),
                "request failed validation",
            ),
            LibraryError::Corrupt(_) | LibraryError::Database(_) => {
                AppError::Internal(anyhow::Error::new(err))
            }
        }
    }
}
