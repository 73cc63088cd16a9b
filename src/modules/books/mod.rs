pub mod error;
pub mod models;
pub mod policy;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use school_kernel::{settings::Settings, InitCtx, Migration, Module};
use sqlx::SqlitePool;

use policy::LibraryPolicy;
use service::LibraryService;

/// Library module: book catalog, issue ledger and the issue/return workflow.
pub struct BooksModule {
    service: LibraryService,
}

impl BooksModule {
    pub fn new(service: LibraryService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            loan_period_days = ?ctx.settings.library.loan_period_days,
            fine = ?ctx.settings.library.fine,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::api(self.service.clone())
    }

    fn root_routes(&self) -> Router {
        routes::root(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE books (
                    id         TEXT PRIMARY KEY,
                    title      TEXT NOT NULL CHECK (title <> ''),
                    author     TEXT NOT NULL CHECK (author <> ''),
                    year       INTEGER,
                    genre      TEXT NOT NULL DEFAULT '',
                    class_name TEXT NOT NULL CHECK (class_name <> ''),
                    copies     INTEGER NOT NULL CHECK (copies >= 1),
                    available  INTEGER NOT NULL,
                    status     TEXT NOT NULL CHECK (status IN ('available', 'issued', 'lost')),
                    created_at TEXT NOT NULL,
                    CHECK (available >= 0 AND available <= copies)
                );
                CREATE INDEX books_class_name ON books (class_name);

                CREATE TABLE issue_records (
                    id          TEXT PRIMARY KEY,
                    book_id     TEXT NOT NULL,
                    student_id  TEXT NOT NULL,
                    issue_date  TEXT NOT NULL,
                    due_date    TEXT NOT NULL,
                    returned    INTEGER NOT NULL DEFAULT 0,
                    returned_at TEXT,
                    fine        TEXT NOT NULL DEFAULT '0'
                );
                CREATE INDEX issue_records_book_open ON issue_records (book_id, returned);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let store = self.service.store();
        let books = store.count_books().await?;
        let open_loans = store.count_open_issues().await?;
        tracing::info!(module = self.name(), books, open_loans, "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module. Fails when the library policy is incomplete.
pub fn create_module(pool: SqlitePool, settings: &Settings) -> anyhow::Result<Arc<dyn Module>> {
    let policy = LibraryPolicy::from_settings(&settings.library)
        .context("invalid library policy configuration")?;
    Ok(Arc::new(BooksModule::new(LibraryService::new(pool, policy))))
}

fn openapi_fragment() -> serde_json::Value {
    let error = |description: &str| {
        serde_json::json!({
            "description": description,
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
        })
    };
    let issue_record = serde_json::json!({
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/IssueRecord" } } }
    });

    serde_json::json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "description": "className takes precedence over search when both are given",
                    "tags": ["Library"],
                    "parameters": [
                        { "name": "className", "in": "query", "required": false, "schema": { "type": "string" } },
                        { "name": "search", "in": "query", "required": false, "schema": { "type": "string" } }
                    ],
                    "responses": {
                        "200": {
                            "description": "Matching books",
                            "content": { "application/json": { "schema": {
                                "type": "array", "items": { "$ref": "#/components/schemas/Book" }
                            } } }
                        },
                        "401": error("Missing or invalid bearer token")
                    }
                },
                "post": {
                    "summary": "Add a book to the catalog",
                    "tags": ["Library"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CreateBook" } } }
                    },
                    "responses": {
                        "201": {
                            "description": "Book created",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Book" } } }
                        },
                        "403": error("Caller is not library staff"),
                        "422": error("Validation error")
                    }
                }
            },
            "/{id}": {
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Library"],
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "responses": {
                        "200": { "description": "Book deleted" },
                        "404": error("Book not found"),
                        "409": error("Book has copies on loan")
                    }
                }
            },
            "/issue": {
                "post": {
                    "summary": "Issue a copy to a student",
                    "tags": ["Library"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/IssueRequest" } } }
                    },
                    "responses": {
                        "201": { "description": "Copy issued", "content": issue_record["content"].clone() },
                        "404": error("Book or student not found"),
                        "409": error("No copies available")
                    }
                }
            },
            "/issued": {
                "get": {
                    "summary": "Issue ledger joined with book and borrower",
                    "tags": ["Library"],
                    "responses": {
                        "200": {
                            "description": "Ledger rows, open loans first",
                            "content": { "application/json": { "schema": {
                                "type": "array", "items": { "$ref": "#/components/schemas/IssuedBook" }
                            } } }
                        }
                    }
                }
            }
        },
        "root_paths": {
            "/library/return/{issueId}": {
                "post": {
                    "summary": "Return an issued copy",
                    "tags": ["Library"],
                    "parameters": [
                        { "name": "issueId", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "responses": {
                        "200": { "description": "Loan closed", "content": issue_record["content"].clone() },
                        "404": error("Issue record not found"),
                        "409": error("Already returned")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "year": { "type": ["integer", "null"] },
                        "genre": { "type": "string" },
                        "className": { "type": "string" },
                        "copies": { "type": "integer", "minimum": 1 },
                        "available": { "type": "integer", "minimum": 0 },
                        "status": { "type": "string", "enum": ["available", "issued", "lost"] },
                        "createdAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "author", "genre", "className", "copies", "available", "status", "createdAt"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "year": { "type": "integer" },
                        "genre": { "type": "string" },
                        "className": { "type": "string" },
                        "copies": { "type": "integer", "minimum": 1 },
                        "available": { "type": "integer", "minimum": 0 },
                        "status": { "type": "string", "enum": ["available", "issued", "lost"] }
                    },
                    "required": ["title", "author", "className"]
                },
                "IssueRequest": {
                    "type": "object",
                    "properties": {
                        "bookId": { "type": "string" },
                        "studentId": { "type": "string", "description": "Student id or admission number" }
                    },
                    "required": ["bookId", "studentId"]
                },
                "IssueRecord": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "bookId": { "type": "string" },
                        "studentId": { "type": "string" },
                        "issueDate": { "type": "string", "format": "date-time" },
                        "dueDate": { "type": "string", "format": "date-time" },
                        "returned": { "type": "boolean" },
                        "returnedAt": { "type": ["string", "null"], "format": "date-time" },
                        "fine": { "type": "string", "description": "Decimal amount" }
                    },
                    "required": ["id", "bookId", "studentId", "issueDate", "dueDate", "returned", "fine"]
                },
                "IssuedBook": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "bookId": { "type": "string" },
                        "title": { "type": "string" },
                        "className": { "type": "string" },
                        "studentId": { "type": "string" },
                        "borrowerName": { "type": "string" },
                        "issueDate": { "type": "string", "format": "date-time" },
                        "dueDate": { "type": "string", "format": "date-time" },
                        "returned": { "type": "boolean" },
                        "returnedAt": { "type": ["string", "null"], "format": "date-time" },
                        "fine": { "type": "string" },
                        "overdue": { "type": "boolean" }
                    },
                    "required": ["id", "bookId", "title", "className", "studentId", "borrowerName",
                                 "issueDate", "dueDate", "returned", "fine", "overdue"]
                }
            }
        }
    })
}
