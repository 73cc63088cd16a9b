use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::models::Student;

#[derive(Debug, Error)]
pub enum StudentError {
    #[error("admission number {0} is already registered")]
    DuplicateAdmission(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Validated student registration.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub admission_number: String,
    pub class_name: String,
}

#[derive(Debug, Clone)]
pub struct StudentStore {
    pool: SqlitePool,
}

impl StudentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: NewStudent, now: OffsetDateTime) -> Result<Student, StudentError> {
        let student = Student {
            id: Uuid::now_v7().to_string(),
            name: new.name,
            admission_number: new.admission_number,
            class_name: new.class_name,
            created_at: now,
        };

        let inserted = sqlx::query(
            "INSERT INTO students (id, name, admission_number, class_name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&student.id)
        .bind(&student.name)
        .bind(&student.admission_number)
        .bind(&student.class_name)
        .bind(student.created_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(student),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StudentError::DuplicateAdmission(student.admission_number))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list(&self, class_name: Option<&str>) -> Result<Vec<Student>, StudentError> {
        let students = match class_name {
            Some(class_name) => {
                sqlx::query_as::<_, Student>(
                    "SELECT id, name, admission_number, class_name, created_at FROM students WHERE class_name = ? ORDER BY name",
                )
                .bind(class_name)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Student>(
                    "SELECT id, name, admission_number, class_name, created_at FROM students ORDER BY class_name, name",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(students)
    }

    pub async fn count(&self) -> Result<i64, StudentError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Look a borrower up by id or admission number on an existing connection.
/// An id match wins over an admission number match.
pub async fn find_by_reference(
    conn: &mut SqliteConnection,
    reference: &str,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(
        "SELECT id, name, admission_number, class_name, created_at FROM students
         WHERE id = ?1 OR admission_number = ?1
         ORDER BY (id = ?1) DESC
         LIMIT 1",
    )
    .bind(reference)
    .fetch_optional(conn)
    .await
}
