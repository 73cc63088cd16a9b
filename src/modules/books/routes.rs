use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use school_authz::{Claims, Role};
use school_http::error::AppError;
use serde_json::json;
use time::OffsetDateTime;

use super::models::{Book, BookQuery, CreateBook, IssueRecord, IssueRequest, IssuedBook};
use super::service::LibraryService;

/// Routes mounted under `/api/books`.
pub fn api(service: LibraryService) -> Router {
    Router::new()
        .route("/", get(list_books).post(add_book))
        .route("/issue", post(issue_book))
        .route("/issued", get(list_issued))
        .route("/{id}", delete(delete_book))
        .with_state(service)
}

/// Routes mounted at the server root.
pub fn root(service: LibraryService) -> Router {
    Router::new()
        .route("/library/return/{issue_id}", post(return_book))
        .with_state(service)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(inner)| inner)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

async fn list_books(
    State(service): State<LibraryService>,
    Query(query): Query<BookQuery>,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(service.list_books(query.into()).await?))
}

async fn add_book(
    State(service): State<LibraryService>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    claims.require_role(Role::LIBRARY_STAFF)?;
    let request = json_body(body)?;

    let book = service.add_book(request, OffsetDateTime::now_utc()).await?;
    tracing::debug!(book_id = %book.id, actor = %claims.sub, "add book handled");
    Ok((StatusCode::CREATED, Json(book)))
}

async fn delete_book(
    State(service): State<LibraryService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    claims.require_role(Role::LIBRARY_STAFF)?;

    service.delete_book(&id).await?;
    tracing::debug!(book_id = %id, actor = %claims.sub, "delete book handled");
    Ok(Json(json!({ "message": "book deleted", "id": id })))
}

async fn issue_book(
    State(service): State<LibraryService>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssueRecord>), AppError> {
    claims.require_role(Role::LIBRARY_STAFF)?;
    let request = json_body(body)?;

    let record = service.issue(request, OffsetDateTime::now_utc()).await?;
    tracing::debug!(issue_id = %record.id, actor = %claims.sub, "issue handled");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_issued(State(service): State<LibraryService>) -> Result<Json<Vec<IssuedBook>>, AppError> {
    Ok(Json(service.issued(OffsetDateTime::now_utc()).await?))
}

async fn return_book(
    State(service): State<LibraryService>,
    Extension(claims): Extension<Claims>,
    Path(issue_id): Path<String>,
) -> Result<Json<IssueRecord>, AppError> {
    claims.require_role(Role::LIBRARY_STAFF)?;

    let record = service
        .return_book(&issue_id, OffsetDateTime::now_utc())
        .await?;
    tracing::debug!(issue_id = %record.id, actor = %claims.sub, "return handled");
    Ok(Json(record))
}
