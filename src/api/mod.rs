//! API handlers for Shelfmark REST endpoints

pub mod authors;
pub mod books;
pub mod health;
pub mod openapi;
pub mod patrons;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::AppState;

/// Simple message response body
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books))
        .route("/books", post(books::create_book))
        .route("/books/search", get(books::search_books))
        .route("/books/:id", put(books::update_book))
        .route("/books/:id", delete(books::delete_book))
        // Authors
        .route("/authors", get(authors::list_authors))
        .route("/authors", post(authors::create_author))
        .route("/authors/:id", get(authors::get_author))
        .route("/authors/:id", put(authors::update_author))
        .route("/authors/:id", delete(authors::delete_author))
        .route("/authors/:id/books", get(authors::books_by_author))
        // Patrons
        .route("/patrons", get(patrons::list_patrons))
        .route("/patrons", post(patrons::create_patron))
        .route("/patrons/:id", put(patrons::update_patron))
        .route("/patrons/:id", delete(patrons::delete_patron))
        // Borrow / return lifecycle
        .route(
            "/patrons/:patron_id/books/:book_id/borrow",
            post(patrons::borrow_book),
        )
        .route(
            "/patrons/:patron_id/books/:book_id/return",
            post(patrons::return_book),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
