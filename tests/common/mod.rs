//! Shared test harness: application state over an in-memory SQLite database

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use shelfmark_server::{
    config::AppConfig,
    models::{author::CreateAuthor, book::CreateBook, patron::CreatePatron},
    repository::Repository,
    services::{cache::QueryCache, Services},
    AppState,
};

/// Build a fully wired application state against a fresh in-memory database.
///
/// A single pooled connection keeps every statement on the same in-memory
/// database instance.
pub async fn setup_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let repository = Repository::new(pool);
    let cache = QueryCache::new(true, Duration::from_secs(3600));

    AppState {
        config: Arc::new(AppConfig::default()),
        services: Arc::new(Services::new(repository, cache)),
    }
}

pub async fn seed_author(state: &AppState, first_name: &str, last_name: &str) -> i64 {
    state
        .services
        .catalog
        .create_author(CreateAuthor {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            books: None,
        })
        .await
        .expect("failed to create author")
        .id
}

pub async fn seed_book(state: &AppState, title: &str, isbn: &str, author_ids: Vec<i64>) -> i64 {
    state
        .services
        .catalog
        .create_book(CreateBook {
            title: title.to_string(),
            description: format!("{} (description)", title),
            isbn: isbn.to_string(),
            publication_date: chrono::NaiveDate::from_ymd_opt(1965, 8, 1).unwrap(),
            authors: author_ids,
        })
        .await
        .expect("failed to create book")
        .id
}

pub async fn seed_patron(state: &AppState, name: &str, email: &str) -> i64 {
    state
        .services
        .patrons
        .create_patron(CreatePatron {
            name: name.to_string(),
            email: email.to_string(),
            phone: "+15550100".to_string(),
        })
        .await
        .expect("failed to create patron")
        .id
}
