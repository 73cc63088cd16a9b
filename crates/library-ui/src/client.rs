//! HTTP client for the library API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::ClientError;
use crate::models::{Book, CatalogQuery, IssueRecord, IssuedBook, NewBook};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the controller needs from the library backend.
#[async_trait]
pub trait LibraryApi: Send + Sync {
    async fn list_books(&self, query: &CatalogQuery) -> Result<Vec<Book>, ClientError>;
    async fn add_book(&self, book: &NewBook) -> Result<Book, ClientError>;
    async fn delete_book(&self, book_id: &str) -> Result<(), ClientError>;
    async fn issue(&self, book_id: &str, student: &str) -> Result<IssueRecord, ClientError>;
    async fn issued(&self) -> Result<Vec<IssuedBook>, ClientError>;
    async fn return_issue(&self, issue_id: &str) -> Result<IssueRecord, ClientError>;
}

/// Every request carries an `Authorization` header. Without a token the
/// header is sent empty and the server answers 401.
#[derive(Debug, Clone)]
pub struct LibraryClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl LibraryClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let authorization = match &self.token {
            Some(token) => format!("Bearer {token}"),
            None => String::new(),
        };
        tracing::debug!(%method, %url, "library api request");
        self.http.request(method, url).header(AUTHORIZATION, authorization)
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let err = ClientError::from_body(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), error = %err, "library api call failed");
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl LibraryApi for LibraryClient {
    async fn list_books(&self, query: &CatalogQuery) -> Result<Vec<Book>, ClientError> {
        let url = self.url(&["api", "books"])?;
        Self::decode(self.request(Method::GET, url).query(&query.to_pairs())).await
    }

    async fn add_book(&self, book: &NewBook) -> Result<Book, ClientError> {
        let url = self.url(&["api", "books"])?;
        Self::decode(self.request(Method::POST, url).json(book)).await
    }

    async fn delete_book(&self, book_id: &str) -> Result<(), ClientError> {
        let url = self.url(&["api", "books", book_id])?;
        Self::check(self.request(Method::DELETE, url).send().await?).await?;
        Ok(())
    }

    async fn issue(&self, book_id: &str, student: &str) -> Result<IssueRecord, ClientError> {
        let url = self.url(&["api", "books", "issue"])?;
        let body = json!({ "bookId": book_id, "studentId": student });
        Self::decode(self.request(Method::POST, url).json(&body)).await
    }

    async fn issued(&self) -> Result<Vec<IssuedBook>, ClientError> {
        let url = self.url(&["api", "books", "issued"])?;
        Self::decode(self.request(Method::GET, url)).await
    }

    async fn return_issue(&self, issue_id: &str) -> Result<IssueRecord, ClientError> {
        let url = self.url(&["library", "return", issue_id])?;
        Self::decode(self.request(Method::POST, url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, RawQuery};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get};
    use axum::{Json, Router};

    fn auth(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<absent>")
            .to_string()
    }

    async fn mock_server() -> String {
        let app = Router::new()
            .route(
                "/api/books",
                get(|headers: HeaderMap, RawQuery(query): RawQuery| async move {
                    if auth(&headers).is_empty() {
                        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "message": "missing bearer token" }))));
                    }
                    Ok(Json(json!([{
                        "id": "b1",
                        "title": query.unwrap_or_default(),
                        "author": auth(&headers),
                        "genre": "Novel",
                        "className": "Form 2",
                        "copies": 1,
                        "available": 1,
                        "status": "available",
                        "createdAt": "2026-03-02T08:00:00Z"
                    }])))
                }),
            )
            .route(
                "/api/books/{id}",
                delete(|Path(id): Path<String>| async move {
                    if id == "on loan" {
                        (StatusCode::CONFLICT, Json(json!({ "message": "book on loan has 1 copies on loan" })))
                    } else {
                        (StatusCode::OK, Json(json!({ "message": "book deleted", "id": id })))
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}/")
    }

    #[tokio::test]
    async fn bearer_token_and_query_are_sent() {
        let base = mock_server().await;
        let client = LibraryClient::new(&base, Some("abc".into())).unwrap();

        let books = client
            .list_books(&CatalogQuery {
                class_name: Some("Form 2".into()),
                search: None,
            })
            .await
            .unwrap();

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].author, "Bearer abc");
        assert_eq!(books[0].title, "className=Form+2");
    }

    #[tokio::test]
    async fn missing_token_sends_empty_header() {
        let base = mock_server().await;
        let client = LibraryClient::new(&base, None).unwrap();

        let err = client.list_books(&CatalogQuery::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "missing bearer token");
    }

    #[tokio::test]
    async fn error_message_surfaces_from_api() {
        let base = mock_server().await;
        let client = LibraryClient::new(&base, Some("abc".into())).unwrap();

        client.delete_book("b1").await.unwrap();
        let err = client.delete_book("on loan").await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.to_string(), "book on loan has 1 copies on loan");
    }

    #[test]
    fn urls_are_built_from_segments() {
        let client = LibraryClient::new("http://localhost:5000/school", None).unwrap();
        assert_eq!(
            client.url(&["library", "return", "a/b"]).unwrap().as_str(),
            "http://localhost:5000/school/library/return/a%2Fb"
        );

        assert!(matches!(
            LibraryClient::new("not a url", None),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
