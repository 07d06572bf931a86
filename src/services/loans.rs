//! Loan management service.
//!
//! Enforces single-custody-at-a-time semantics for books. Custody state
//! lives on the book row itself; this service is the only write path for it.

use chrono::Duration;

use crate::{error::AppResult, models::book::Book, repository::Repository};

use super::cache::QueryCache;

/// Days a borrowed book may be kept before it is due back
pub const LOAN_PERIOD_DAYS: i64 = 14;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    cache: QueryCache,
}

impl LoansService {
    pub fn new(repository: Repository, cache: QueryCache) -> Self {
        Self { repository, cache }
    }

    /// Borrow a book for a patron.
    ///
    /// Returns `Ok(false)` when the book is already held by anyone. That is
    /// an expected outcome the caller must branch on, not an error. Fails
    /// with `NotFound` when the patron or the book does not exist.
    pub async fn borrow_book(&self, patron_id: i64, book_id: i64) -> AppResult<bool> {
        // Verify patron exists
        self.repository.patrons.get_by_id(patron_id).await?;

        let borrowed = self
            .repository
            .books
            .borrow(book_id, patron_id, Duration::days(LOAN_PERIOD_DAYS))
            .await?;

        if borrowed {
            tracing::info!(patron_id, book_id, "book borrowed");
            self.cache.clear().await;
        }
        Ok(borrowed)
    }

    /// Return a borrowed book, scoped to its current holder.
    ///
    /// Stamps `returned_at` and clears the custody fields so the book is
    /// immediately borrowable again. Fails with `NotFound` when the book is
    /// not currently held by the given patron.
    pub async fn return_book(&self, patron_id: i64, book_id: i64) -> AppResult<Book> {
        let book = self.repository.books.return_from(book_id, patron_id).await?;
        tracing::info!(patron_id, book_id, "book returned");
        self.cache.clear().await;
        Ok(book)
    }

    /// True iff the book currently has a holder
    pub async fn is_borrowed(&self, book_id: i64) -> AppResult<bool> {
        self.repository.books.is_borrowed(book_id).await
    }
}
