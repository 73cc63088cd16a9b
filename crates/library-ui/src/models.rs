//! Wire types as the library API serialises them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: String,
    pub class_name: String,
    pub copies: i64,
    pub available: i64,
    pub status: String,
}

/// Body of `POST /api/books`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub genre: String,
    pub class_name: String,
    pub copies: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
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
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub returned_at: Option<OffsetDateTime>,
    pub fine: Decimal,
}

/// One row of `GET /api/books/issued`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedBook {
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
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub returned_at: Option<OffsetDateTime>,
    pub fine: Decimal,
    pub overdue: bool,
}

/// Catalog filter. A class filter, when set, is sent instead of the search
/// term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub class_name: Option<String>,
    pub search: Option<String>,
}

impl CatalogQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(class_name) = non_empty(&self.class_name) {
            vec![("className", class_name)]
        } else if let Some(search) = non_empty(&self.search) {
            vec![("search", search)]
        } else {
            Vec::new()
        }
    }
}
