//! Book model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::author::AuthorSummary;

/// Full book model from database.
///
/// The custody fields (`patron_id`, `borrowed_at`, `due_back`, `returned_at`)
/// are mutated only by the loans service; the generic update path never
/// touches them. `authors` is loaded from the junction table after the row
/// fetch.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub isbn: String,
    pub publication_date: NaiveDate,
    /// Patron currently holding the book, if any
    pub patron_id: Option<i64>,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub due_back: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub authors: Vec<AuthorSummary>,
}

/// Short book form for author listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
}

/// Book currently held by a patron
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowedBook {
    pub id: i64,
    pub title: String,
    pub borrowed_at: DateTime<Utc>,
    pub due_back: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: String,
    #[validate(length(min = 1, message = "isbn must not be empty"))]
    pub isbn: String,
    pub publication_date: NaiveDate,
    /// Author IDs to associate with the book
    #[validate(length(min = 1, message = "at least one author is required"))]
    pub authors: Vec<i64>,
}

/// Update book request; only present fields are applied. A present `authors`
/// list fully replaces the book's author set.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "isbn must not be empty"))]
    pub isbn: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub authors: Option<Vec<i64>>,
}
