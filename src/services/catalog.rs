//! Catalog management service: book and author CRUD, search, and the
//! author-to-books projection.
//!
//! Read projections go through the query cache; every mutation clears it.
//! Delete-time custody guards are enforced in the repository inside a single
//! transaction.

use crate::{
    error::AppResult,
    models::{
        author::{Author, CreateAuthor, UpdateAuthor},
        book::{Book, CreateBook, UpdateBook},
    },
    repository::Repository,
};

use super::cache::QueryCache;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    cache: QueryCache,
}

impl CatalogService {
    pub fn new(repository: Repository, cache: QueryCache) -> Self {
        Self { repository, cache }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    /// List all books with their authors
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        if let Some(books) = self.cache.get_json::<Vec<Book>>("books:list").await {
            return Ok(books);
        }
        let books = self.repository.books.list().await?;
        self.cache.put_json("books:list", &books).await;
        Ok(books)
    }

    /// Create a book. Every author ID must reference an existing author.
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        self.repository.authors.ensure_exist(&book.authors).await?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, "book created");
        self.cache.clear().await;
        Ok(created)
    }

    /// Partial book update. A present `authors` list fully replaces the
    /// book's author set; custody fields are never touched.
    pub async fn update_book(&self, id: i64, update: UpdateBook) -> AppResult<Book> {
        if let Some(ref author_ids) = update.authors {
            self.repository.authors.ensure_exist(author_ids).await?;
        }
        let updated = self.repository.books.update(id, &update).await?;
        self.cache.clear().await;
        Ok(updated)
    }

    /// Delete a book. Fails with `Conflict` while the book is borrowed;
    /// otherwise detaches its authors and soft-deletes it.
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "book deleted");
        self.cache.clear().await;
        Ok(())
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    /// List all authors with their books
    pub async fn list_authors(&self) -> AppResult<Vec<Author>> {
        self.repository.authors.list().await
    }

    /// Get author by ID
    pub async fn get_author(&self, id: i64) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    /// Create an author; an optional `books` list is attached additively
    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        if let Some(ref book_ids) = author.books {
            self.repository.books.ensure_exist(book_ids).await?;
        }
        let created = self.repository.authors.create(&author).await?;
        tracing::info!(author_id = created.id, "author created");
        self.cache.clear().await;
        Ok(created)
    }

    /// Partial author update; a present `books` list fully replaces the
    /// author's book set
    pub async fn update_author(&self, id: i64, update: UpdateAuthor) -> AppResult<Author> {
        if let Some(ref book_ids) = update.books {
            self.repository.books.ensure_exist(book_ids).await?;
        }
        let updated = self.repository.authors.update(id, &update).await?;
        self.cache.clear().await;
        Ok(updated)
    }

    /// Delete an author, detaching all book associations first
    pub async fn delete_author(&self, id: i64) -> AppResult<()> {
        self.repository.authors.delete(id).await?;
        tracing::info!(author_id = id, "author deleted");
        self.cache.clear().await;
        Ok(())
    }

    // =========================================================================
    // SEARCH / LOOKUP
    // =========================================================================

    /// Books whose title matches `title` exactly and that are associated
    /// with at least one of the given authors
    pub async fn search_books(&self, title: &str, author_ids: &[i64]) -> AppResult<Vec<Book>> {
        let key = format!("books:search:{}:{:?}", title, author_ids);
        if let Some(books) = self.cache.get_json::<Vec<Book>>(&key).await {
            return Ok(books);
        }
        let books = self
            .repository
            .books
            .search_by_title_and_authors(title, author_ids)
            .await?;
        self.cache.put_json(&key, &books).await;
        Ok(books)
    }

    /// All books associated with the given author, unfiltered by custody
    pub async fn books_by_author(&self, author_id: i64) -> AppResult<Vec<Book>> {
        // Verify author exists
        self.repository.authors.get_by_id(author_id).await?;

        let key = format!("books:by_author:{}", author_id);
        if let Some(books) = self.cache.get_json::<Vec<Book>>(&key).await {
            return Ok(books);
        }
        let books = self.repository.books.list_by_author(author_id).await?;
        self.cache.put_json(&key, &books).await;
        Ok(books)
    }
}
