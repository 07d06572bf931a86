//! Authors repository for database operations

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, CreateAuthor, UpdateAuthor},
        book::BookSummary,
    },
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Sqlite>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get author by ID, with their books
    pub async fn get_by_id(&self, id: i64) -> AppResult<Author> {
        let mut author = sqlx::query_as::<_, Author>(
            "SELECT id, first_name, last_name, created_at, updated_at \
             FROM authors WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))?;

        author.books = self.get_author_books(id).await?;
        Ok(author)
    }

    /// List all active authors with their books
    pub async fn list(&self) -> AppResult<Vec<Author>> {
        let mut authors = sqlx::query_as::<_, Author>(
            "SELECT id, first_name, last_name, created_at, updated_at \
             FROM authors WHERE deleted_at IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query(
            "SELECT ba.author_id, b.id, b.title \
             FROM book_authors ba \
             JOIN books b ON b.id = ba.book_id \
             WHERE b.deleted_at IS NULL \
             ORDER BY ba.author_id, b.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_author: HashMap<i64, Vec<BookSummary>> = HashMap::new();
        for row in rows {
            by_author
                .entry(row.get::<i64, _>("author_id"))
                .or_default()
                .push(BookSummary {
                    id: row.get("id"),
                    title: row.get("title"),
                });
        }

        for author in authors.iter_mut() {
            author.books = by_author.remove(&author.id).unwrap_or_default();
        }
        Ok(authors)
    }

    /// Verify every given author ID references an active author
    pub async fn ensure_exist(&self, ids: &[i64]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut qb = sqlx::QueryBuilder::<Sqlite>::new(
            "SELECT id FROM authors WHERE deleted_at IS NULL AND id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");

        let existing: Vec<i64> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        for id in ids {
            if !existing.contains(id) {
                return Err(AppError::Validation(format!(
                    "Author with id {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }

    async fn get_author_books(&self, author_id: i64) -> AppResult<Vec<BookSummary>> {
        let books = sqlx::query_as::<_, BookSummary>(
            "SELECT b.id, b.title \
             FROM book_authors ba \
             JOIN books b ON b.id = ba.book_id \
             WHERE ba.author_id = ? AND b.deleted_at IS NULL \
             ORDER BY b.id",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Create an author; an optional book list is attached additively
    pub async fn create(&self, author: &CreateAuthor) -> AppResult<Author> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let author_id = sqlx::query(
            "INSERT INTO authors (first_name, last_name, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&author.first_name)
        .bind(&author.last_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        if let Some(ref book_ids) = author.books {
            for book_id in book_ids {
                sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES (?, ?)")
                    .bind(*book_id)
                    .bind(author_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        self.get_by_id(author_id).await
    }

    /// Partial update; a present `books` list replaces the author's book set
    pub async fn update(&self, id: i64, update: &UpdateAuthor) -> AppResult<Author> {
        self.get_by_id(id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE authors SET \
                first_name = COALESCE(?, first_name), \
                last_name = COALESCE(?, last_name), \
                updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(ref book_ids) = update.books {
            sqlx::query("DELETE FROM book_authors WHERE author_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for book_id in book_ids {
                sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES (?, ?)")
                    .bind(*book_id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Detach all book associations and soft-delete the author. Authors have
    /// no in-use guard.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.get_by_id(id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM book_authors WHERE author_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE authors SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
