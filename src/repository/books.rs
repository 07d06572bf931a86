//! Books repository for database operations.
//!
//! Owns both the catalog side of a book (title, ISBN, author associations)
//! and its custody fields. Custody transitions are single conditional UPDATE
//! statements so that check-and-set is atomic per row.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sqlx::{Pool, Row, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorSummary,
        book::{Book, CreateBook, UpdateBook},
    },
};

const BOOK_COLUMNS: &str = "id, title, description, isbn, publication_date, \
     patron_id, borrowed_at, due_back, returned_at, created_at, updated_at";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Sqlite>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Get book by ID, with its authors
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        let mut book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        book.authors = self.get_book_authors(id).await?;
        Ok(book)
    }

    /// List all active books with their authors
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let mut books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE deleted_at IS NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.load_authors(&mut books).await?;
        Ok(books)
    }

    /// Books whose title matches exactly and that have at least one of the
    /// given authors. Title matching is equality, not substring.
    pub async fn search_by_title_and_authors(
        &self,
        title: &str,
        author_ids: &[i64],
    ) -> AppResult<Vec<Book>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT DISTINCT {} FROM books b \
             JOIN book_authors ba ON ba.book_id = b.id \
             WHERE b.deleted_at IS NULL AND b.title = ",
            BOOK_COLUMNS
                .split(", ")
                .map(|c| format!("b.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        qb.push_bind(title);
        qb.push(" AND ba.author_id IN (");
        let mut separated = qb.separated(", ");
        for id in author_ids {
            separated.push_bind(*id);
        }
        qb.push(") ORDER BY b.id");

        let mut books = qb.build_query_as::<Book>().fetch_all(&self.pool).await?;
        self.load_authors(&mut books).await?;
        Ok(books)
    }

    /// All active books associated with the given author, regardless of
    /// custody state
    pub async fn list_by_author(&self, author_id: i64) -> AppResult<Vec<Book>> {
        let mut books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books \
             WHERE deleted_at IS NULL \
               AND id IN (SELECT book_id FROM book_authors WHERE author_id = ?) \
             ORDER BY id"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        self.load_authors(&mut books).await?;
        Ok(books)
    }

    /// Check if an ISBN is already taken by another active book
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = ? AND id != ? AND deleted_at IS NULL)",
            )
            .bind(isbn)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = ? AND deleted_at IS NULL)",
            )
            .bind(isbn)
            .fetch_one(&self.pool)
            .await?
        };
        Ok(exists)
    }

    /// Verify every given book ID references an active book
    pub async fn ensure_exist(&self, ids: &[i64]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut qb = sqlx::QueryBuilder::<Sqlite>::new(
            "SELECT id FROM books WHERE deleted_at IS NULL AND id IN (",
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
                    "Book with id {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Load all authors for a single book via the junction table
    async fn get_book_authors(&self, book_id: i64) -> AppResult<Vec<AuthorSummary>> {
        let authors = sqlx::query_as::<_, AuthorSummary>(
            "SELECT a.id, a.first_name, a.last_name \
             FROM book_authors ba \
             JOIN authors a ON a.id = ba.author_id \
             WHERE ba.book_id = ? AND a.deleted_at IS NULL \
             ORDER BY a.id",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    /// Batch-load authors for a list of books
    async fn load_authors(&self, books: &mut [Book]) -> AppResult<()> {
        if books.is_empty() {
            return Ok(());
        }

        let rows = sqlx::query(
            "SELECT ba.book_id, a.id, a.first_name, a.last_name \
             FROM book_authors ba \
             JOIN authors a ON a.id = ba.author_id \
             WHERE a.deleted_at IS NULL \
             ORDER BY ba.book_id, a.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_book: HashMap<i64, Vec<AuthorSummary>> = HashMap::new();
        for row in rows {
            by_book
                .entry(row.get::<i64, _>("book_id"))
                .or_default()
                .push(AuthorSummary {
                    id: row.get("id"),
                    first_name: row.get("first_name"),
                    last_name: row.get("last_name"),
                });
        }

        for book in books.iter_mut() {
            book.authors = by_book.remove(&book.id).unwrap_or_default();
        }
        Ok(())
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Create a book and attach its authors
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        if self.isbn_exists(&book.isbn, None).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                book.isbn
            )));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let book_id = sqlx::query(
            "INSERT INTO books (title, description, isbn, publication_date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&book.title)
        .bind(&book.description)
        .bind(&book.isbn)
        .bind(book.publication_date)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for author_id in &book.authors {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES (?, ?)")
                .bind(book_id)
                .bind(*author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_by_id(book_id).await
    }

    /// Partial update. Custody fields are never touched here. A present
    /// `authors` list replaces the association set; an absent one leaves it
    /// alone.
    pub async fn update(&self, id: i64, update: &UpdateBook) -> AppResult<Book> {
        // Existence check up front so an empty update still 404s properly
        self.get_by_id(id).await?;

        if let Some(ref isbn) = update.isbn {
            if self.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "A book with ISBN {} already exists",
                    isbn
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE books SET \
                title = COALESCE(?, title), \
                description = COALESCE(?, description), \
                isbn = COALESCE(?, isbn), \
                publication_date = COALESCE(?, publication_date), \
                updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.isbn)
        .bind(update.publication_date)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(ref author_ids) = update.authors {
            sqlx::query("DELETE FROM book_authors WHERE book_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for author_id in author_ids {
                sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES (?, ?)")
                    .bind(id)
                    .bind(*author_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Soft-delete a book. Fails with `Conflict` while the book is borrowed.
    /// The guard and the delete share one transaction, and the delete itself
    /// re-checks custody, so a borrow landing in between makes it fail.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let patron_id: Option<i64> =
            sqlx::query_scalar("SELECT patron_id FROM books WHERE id = ? AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if patron_id.is_some() {
            return Err(AppError::Conflict(
                "Book is currently borrowed and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM book_authors WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE books SET deleted_at = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL AND patron_id IS NULL",
        )
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "Book is currently borrowed and cannot be deleted".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // CUSTODY
    // =========================================================================

    /// Atomically take custody of a book for a patron.
    ///
    /// Returns `Ok(false)` when the book is already held by anyone, including
    /// the same patron. The holder test and the assignment are one statement,
    /// so two concurrent borrows of the same book cannot both succeed.
    pub async fn borrow(&self, book_id: i64, patron_id: i64, period: Duration) -> AppResult<bool> {
        // A nonexistent book must be a NotFound, never "holder unset"
        self.get_by_id(book_id).await?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE books SET \
                patron_id = ?, borrowed_at = ?, due_back = ?, returned_at = NULL, updated_at = ? \
             WHERE id = ? AND patron_id IS NULL AND deleted_at IS NULL",
        )
        .bind(patron_id)
        .bind(now)
        .bind(now + period)
        .bind(now)
        .bind(book_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release custody of a book, scoped to its current holder.
    ///
    /// Stamps `returned_at` and clears the custody fields so the book becomes
    /// borrowable again. Fails with `NotFound` when the book does not exist,
    /// is not borrowed, or is held by a different patron.
    pub async fn return_from(&self, book_id: i64, patron_id: i64) -> AppResult<Book> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE books SET \
                patron_id = NULL, borrowed_at = NULL, due_back = NULL, returned_at = ?, updated_at = ? \
             WHERE id = ? AND patron_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(book_id)
        .bind(patron_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Book with id {} not currently borrowed by patron {}",
                book_id, patron_id
            )));
        }

        self.get_by_id(book_id).await
    }

    /// True iff the book currently has a holder
    pub async fn is_borrowed(&self, book_id: i64) -> AppResult<bool> {
        let patron_id: Option<i64> =
            sqlx::query_scalar("SELECT patron_id FROM books WHERE id = ? AND deleted_at IS NULL")
                .bind(book_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        Ok(patron_id.is_some())
    }
}
