use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A registered student; the borrower side of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub admission_number: String,
    pub class_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    pub name: Option<String>,
    pub admission_number: Option<String>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuery {
    pub class_name: Option<String>,
}
