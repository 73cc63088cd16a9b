//! Presentation layer for the school library.
//!
//! [`LibraryClient`] talks to the HTTP API, [`LibraryController`] owns the
//! catalog and ledger view state and drives the issue/return workflow, and
//! the [`render`] functions turn that state into HTML rows or text tables.

pub mod client;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod models;
pub mod notify;
pub mod render;
pub mod selection;
pub mod view;

pub use client::{LibraryApi, LibraryClient};
pub use controller::{BulkDeleteReport, CsvExport, LibraryController};
pub use debounce::{debounce, DebounceInput, Debouncer, SEARCH_DEBOUNCE};
pub use error::ClientError;
pub use models::{Book, CatalogQuery, IssueRecord, IssuedBook, NewBook};
pub use notify::{Level, Notification};
pub use selection::Selection;
pub use view::{BookRow, CatalogView, LedgerRow, LedgerView};
