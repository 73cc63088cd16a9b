pub mod models;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use school_authz::{Claims, Role};
use school_http::error::AppError;
use school_kernel::{InitCtx, Migration, Module};
use serde_json::json;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use models::{CreateStudent, Student, StudentQuery};
use store::{NewStudent, StudentError, StudentStore};

/// Borrower directory: the students that books can be issued to.
pub struct StudentsModule {
    store: StudentStore,
}

impl StudentsModule {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: StudentStore::new(pool),
        }
    }
}

#[async_trait]
impl Module for StudentsModule {
    fn name(&self) -> &'static str {
        "students"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_students).post(create_student))
            .with_state(self.store.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List students",
                        "tags": ["Students"],
                        "parameters": [
                            { "name": "className", "in": "query", "required": false, "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "Registered students",
                                "content": { "application/json": { "schema": {
                                    "type": "array", "items": { "$ref": "#/components/schemas/Student" }
                                } } }
                            }
                        }
                    },
                    "post": {
                        "summary": "Register a student",
                        "tags": ["Students"],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CreateStudent" } } }
                        },
                        "responses": {
                            "201": {
                                "description": "Student registered",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Student" } } }
                            },
                            "409": {
                                "description": "Admission number already registered",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
                            },
                            "422": {
                                "description": "Validation error",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Student": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "name": { "type": "string" },
                            "admissionNumber": { "type": "string" },
                            "className": { "type": "string" },
                            "createdAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "name", "admissionNumber", "className", "createdAt"]
                    },
                    "CreateStudent": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "admissionNumber": { "type": "string" },
                            "className": { "type": "string" }
                        },
                        "required": ["name", "admissionNumber", "className"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE students (
                    id               TEXT PRIMARY KEY,
                    name             TEXT NOT NULL CHECK (name <> ''),
                    admission_number TEXT NOT NULL UNIQUE CHECK (admission_number <> ''),
                    class_name       TEXT NOT NULL CHECK (class_name <> ''),
                    created_at       TEXT NOT NULL
                );
                CREATE INDEX students_class_name ON students (class_name);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let registered = self.store.count().await?;
        tracing::info!(module = self.name(), registered, "students module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "students module stopped");
        Ok(())
    }
}

impl From<StudentError> for AppError {
    fn from(err: StudentError) -> Self {
        match err {
            StudentError::DuplicateAdmission(_) => {
                AppError::conflict_with_code("duplicate_admission_number", err.to_string())
            }
            StudentError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

fn validate(body: CreateStudent) -> Result<NewStudent, AppError> {
    let mut details = Vec::new();
    let mut field = |name: &str, value: Option<String>| {
        let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
        if value.is_empty() {
            details.push(json!({ "field": name, "error": "required" }));
        }
        value
    };

    let student = NewStudent {
        name: field("name", body.name),
        admission_number: field("admissionNumber", body.admission_number),
        class_name: field("className", body.class_name),
    };

    if details.is_empty() {
        Ok(student)
    } else {
        Err(AppError::validation(details, "request failed validation"))
    }
}

async fn list_students(
    State(store): State<StudentStore>,
    Query(query): Query<StudentQuery>,
) -> Result<Json<Vec<Student>>, AppError> {
    let class_name = query
        .class_name
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    Ok(Json(store.list(class_name).await?))
}

async fn create_student(
    State(store): State<StudentStore>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CreateStudent>, JsonRejection>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    claims.require_role(&[Role::Admin])?;
    let Json(body) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let student = store.insert(validate(body)?, OffsetDateTime::now_utc()).await?;
    tracing::info!(
        student_id = %student.id,
        admission_number = %student.admission_number,
        actor = %claims.sub,
        "student registered"
    );

    Ok((StatusCode::CREATED, Json(student)))
}

/// Create a new instance of the students module
pub fn create_module(pool: SqlitePool) -> Arc<dyn Module> {
    Arc::new(StudentsModule::new(pool))
}
