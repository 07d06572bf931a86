//! Router-level API tests driven through `tower::ServiceExt::oneshot`

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{seed_author, seed_book, seed_patron, setup_state};
use shelfmark_server::api;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let state = setup_state().await;
    let app = api::router(state);

    let (status, body) = send(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn full_borrow_return_delete_scenario() {
    let state = setup_state().await;
    let app = api::router(state.clone());

    let (status, author) = send(
        &app,
        "POST",
        "/api/v1/authors",
        Some(json!({"first_name": "Frank", "last_name": "Herbert"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let author_id = author["id"].as_i64().unwrap();

    let (status, book) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(json!({
            "title": "Dune",
            "description": "Desert planet epic",
            "isbn": "9780441013593",
            "publication_date": "1965-08-01",
            "authors": [author_id]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let book_id = book["id"].as_i64().unwrap();

    let p1 = seed_patron(&state, "Paul", "paul@example.com").await;
    let p2 = seed_patron(&state, "Leto", "leto@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/patrons/{p1}/books/{book_id}/borrow"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book borrowed successfully");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/patrons/{p2}/books/{book_id}/borrow"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book is already borrowed");

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/books/{book_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/patrons/{p1}/books/{book_id}/return"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book returned successfully");
    assert!(body["book"]["patron_id"].is_null());
    assert!(body["book"]["returned_at"].is_string());

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/books/{book_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, books) = send(&app, "GET", "/api/v1/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn create_book_rejects_missing_or_unknown_authors() {
    let state = setup_state().await;
    let app = api::router(state);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(json!({
            "title": "Dune",
            "description": "Desert planet epic",
            "isbn": "9780441013593",
            "publication_date": "1965-08-01",
            "authors": []
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(json!({
            "title": "Dune",
            "description": "Desert planet epic",
            "isbn": "9780441013593",
            "publication_date": "1965-08-01",
            "authors": [42]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");
}

#[tokio::test]
async fn duplicate_isbn_is_a_conflict() {
    let state = setup_state().await;
    let app = api::router(state.clone());

    let author = seed_author(&state, "Frank", "Herbert").await;
    seed_book(&state, "Dune", "9780441013593", vec![author]).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/books",
        Some(json!({
            "title": "Dune Messiah",
            "description": "Sequel",
            "isbn": "9780441013593",
            "publication_date": "1969-10-01",
            "authors": [author]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn search_is_exact_title_match_with_author_overlap() {
    let state = setup_state().await;
    let app = api::router(state.clone());

    let author = seed_author(&state, "Frank", "Herbert").await;
    seed_book(&state, "Dune", "9780441013593", vec![author]).await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/books/search?title=Dune&authors={author}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"].as_array().unwrap().len(), 1);
    assert_eq!(body["books"][0]["title"], "Dune");

    // Prefix of the title is not a match: equality, not substring
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/books/search?title=Dun&authors={author}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // No author overlap means no result
    let (status, _) = send(&app, "GET", "/api/v1/books/search?title=Dune&authors=999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_book_syncs_author_set_only_when_present() {
    let state = setup_state().await;
    let app = api::router(state.clone());

    let a1 = seed_author(&state, "Frank", "Herbert").await;
    let a2 = seed_author(&state, "Brian", "Herbert").await;
    let book_id = seed_book(&state, "Dune", "9780441013593", vec![a1]).await;

    // Update without an authors field leaves associations untouched
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/books/{book_id}"),
        Some(json!({"title": "Dune (revised)"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune (revised)");
    assert_eq!(body["authors"][0]["id"].as_i64(), Some(a1));

    // A present authors list fully replaces the set
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/books/{book_id}"),
        Some(json!({"authors": [a2]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let authors = body["authors"].as_array().unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0]["id"].as_i64(), Some(a2));
}

#[tokio::test]
async fn author_delete_detaches_books_unconditionally() {
    let state = setup_state().await;
    let app = api::router(state.clone());

    let author = seed_author(&state, "Frank", "Herbert").await;
    let book_id = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    // Even a borrowed book does not protect its author from deletion
    assert!(state.services.loans.borrow_book(patron, book_id).await.unwrap());

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/authors/{author}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/api/v1/authors/{author}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, books) = send(&app, "GET", "/api/v1/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books[0]["authors"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn books_by_author_ignores_custody_state() {
    let state = setup_state().await;
    let app = api::router(state.clone());

    let author = seed_author(&state, "Frank", "Herbert").await;
    let book_id = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    assert!(state.services.loans.borrow_book(patron, book_id).await.unwrap());

    let (status, books) = send(&app, "GET", &format!("/api/v1/authors/{author}/books"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().unwrap().len(), 1);
    assert_eq!(books[0]["id"].as_i64(), Some(book_id));

    let (status, _) = send(&app, "GET", "/api/v1/authors/999/books", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patron_crud_over_http() {
    let state = setup_state().await;
    let app = api::router(state);

    let (status, patron) = send(
        &app,
        "POST",
        "/api/v1/patrons",
        Some(json!({"name": "Paul Atreides", "email": "paul@example.com", "phone": "+15550100"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let patron_id = patron["id"].as_i64().unwrap();

    // Invalid email is rejected up front
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/patrons",
        Some(json!({"name": "Leto", "email": "not-an-email", "phone": "+15550101"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Partial update touches only the given fields
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/patrons/{patron_id}"),
        Some(json!({"phone": "+15550199"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Paul Atreides");
    assert_eq!(body["phone"], "+15550199");

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/patrons/{patron_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", "/api/v1/patrons/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patron_listing_projects_borrowed_books() {
    let state = setup_state().await;
    let app = api::router(state.clone());

    let author = seed_author(&state, "Frank", "Herbert").await;
    let book_id = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    assert!(state.services.loans.borrow_book(patron, book_id).await.unwrap());

    let (status, patrons) = send(&app, "GET", "/api/v1/patrons", None).await;
    assert_eq!(status, StatusCode::OK);
    let borrowed = patrons[0]["borrowed_books"].as_array().unwrap();
    assert_eq!(borrowed.len(), 1);
    assert_eq!(borrowed[0]["id"].as_i64(), Some(book_id));
    assert_eq!(borrowed[0]["title"], "Dune");
}
