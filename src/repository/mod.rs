//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod patrons;

use sqlx::{Pool, Sqlite};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Sqlite>,
    pub books: books::BooksRepository,
    pub authors: authors::AuthorsRepository,
    pub patrons: patrons::PatronsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            authors: authors::AuthorsRepository::new(pool.clone()),
            patrons: patrons::PatronsRepository::new(pool.clone()),
            pool,
        }
    }
}
