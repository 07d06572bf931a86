//! Patrons repository for database operations

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BorrowedBook,
        patron::{CreatePatron, Patron, UpdatePatron},
    },
};

#[derive(Clone)]
pub struct PatronsRepository {
    pool: Pool<Sqlite>,
}

impl PatronsRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get patron by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Patron> {
        let mut patron = sqlx::query_as::<_, Patron>(
            "SELECT id, name, email, phone, created_at, updated_at \
             FROM patrons WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Patron with id {} not found", id)))?;

        patron.borrowed_books = self.get_borrowed_books(id).await?;
        Ok(patron)
    }

    /// List all active patrons with their currently borrowed books
    pub async fn list(&self) -> AppResult<Vec<Patron>> {
        let mut patrons = sqlx::query_as::<_, Patron>(
            "SELECT id, name, email, phone, created_at, updated_at \
             FROM patrons WHERE deleted_at IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query(
            "SELECT patron_id, id, title, borrowed_at, due_back \
             FROM books \
             WHERE patron_id IS NOT NULL AND deleted_at IS NULL \
             ORDER BY patron_id, borrowed_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_patron: HashMap<i64, Vec<BorrowedBook>> = HashMap::new();
        for row in rows {
            by_patron
                .entry(row.get::<i64, _>("patron_id"))
                .or_default()
                .push(BorrowedBook {
                    id: row.get("id"),
                    title: row.get("title"),
                    borrowed_at: row.get("borrowed_at"),
                    due_back: row.get("due_back"),
                });
        }

        for patron in patrons.iter_mut() {
            patron.borrowed_books = by_patron.remove(&patron.id).unwrap_or_default();
        }
        Ok(patrons)
    }

    /// Books currently held by the patron (projection over books.patron_id)
    async fn get_borrowed_books(&self, patron_id: i64) -> AppResult<Vec<BorrowedBook>> {
        let books = sqlx::query_as::<_, BorrowedBook>(
            "SELECT id, title, borrowed_at, due_back \
             FROM books \
             WHERE patron_id = ? AND deleted_at IS NULL \
             ORDER BY borrowed_at",
        )
        .bind(patron_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Create a patron
    pub async fn create(&self, patron: &CreatePatron) -> AppResult<Patron> {
        let now = Utc::now();
        let patron_id = sqlx::query(
            "INSERT INTO patrons (name, email, phone, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&patron.name)
        .bind(&patron.email)
        .bind(&patron.phone)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_by_id(patron_id).await
    }

    /// Partial update; only present fields are applied
    pub async fn update(&self, id: i64, update: &UpdatePatron) -> AppResult<Patron> {
        self.get_by_id(id).await?;

        sqlx::query(
            "UPDATE patrons SET \
                name = COALESCE(?, name), \
                email = COALESCE(?, email), \
                phone = COALESCE(?, phone), \
                updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.phone)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_by_id(id).await
    }

    /// Soft-delete a patron. Fails with `Conflict` while any book lists the
    /// patron as holder; the guard and the delete run in one transaction.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM patrons WHERE id = ? AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Patron with id {} not found", id)));
        }

        let has_books: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE patron_id = ? AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if has_books {
            return Err(AppError::Conflict(
                "Patron has associated books and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("UPDATE patrons SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
