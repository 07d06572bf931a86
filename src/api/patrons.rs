//! Patron management and borrow/return lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        patron::{CreatePatron, Patron, UpdatePatron},
    },
};

use super::MessageResponse;

/// Return response with the updated book
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub message: String,
    pub book: Book,
}

/// List all patrons with their currently borrowed books
#[utoipa::path(
    get,
    path = "/patrons",
    tag = "patrons",
    responses(
        (status = 200, description = "List of patrons", body = Vec<Patron>)
    )
)]
pub async fn list_patrons(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Patron>>> {
    let patrons = state.services.patrons.list_patrons().await?;
    Ok(Json(patrons))
}

/// Create a new patron
#[utoipa::path(
    post,
    path = "/patrons",
    tag = "patrons",
    request_body = CreatePatron,
    responses(
        (status = 201, description = "Patron created", body = Patron),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_patron(
    State(state): State<crate::AppState>,
    Json(patron): Json<CreatePatron>,
) -> AppResult<(StatusCode, Json<Patron>)> {
    patron.validate()?;

    let created = state.services.patrons.create_patron(patron).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing patron
#[utoipa::path(
    put,
    path = "/patrons/{id}",
    tag = "patrons",
    params(
        ("id" = i64, Path, description = "Patron ID")
    ),
    request_body = UpdatePatron,
    responses(
        (status = 200, description = "Patron updated", body = Patron),
        (status = 404, description = "Patron not found")
    )
)]
pub async fn update_patron(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Json(patron): Json<UpdatePatron>,
) -> AppResult<Json<Patron>> {
    patron.validate()?;

    let updated = state.services.patrons.update_patron(id, patron).await?;
    Ok(Json(updated))
}

/// Delete a patron. Patrons holding borrowed books cannot be deleted.
#[utoipa::path(
    delete,
    path = "/patrons/{id}",
    tag = "patrons",
    params(
        ("id" = i64, Path, description = "Patron ID")
    ),
    responses(
        (status = 200, description = "Patron deleted", body = MessageResponse),
        (status = 404, description = "Patron not found"),
        (status = 409, description = "Patron has associated books")
    )
)]
pub async fn delete_patron(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.services.patrons.delete_patron(id).await?;
    Ok(Json(MessageResponse {
        message: "Patron deleted successfully".to_string(),
    }))
}

/// Borrow a book for a patron.
///
/// Answers 400 with "Book is already borrowed" when the book already has a
/// holder; this is the expected branch for callers racing over a popular
/// book, not a server fault.
#[utoipa::path(
    post,
    path = "/patrons/{patron_id}/books/{book_id}/borrow",
    tag = "loans",
    params(
        ("patron_id" = i64, Path, description = "Patron ID"),
        ("book_id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book borrowed", body = MessageResponse),
        (status = 400, description = "Book is already borrowed"),
        (status = 404, description = "Patron or book not found")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    Path((patron_id, book_id)): Path<(i64, i64)>,
) -> AppResult<Json<MessageResponse>> {
    let borrowed = state.services.loans.borrow_book(patron_id, book_id).await?;

    if !borrowed {
        return Err(AppError::BadRequest("Book is already borrowed".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Book borrowed successfully".to_string(),
    }))
}

/// Return a borrowed book from a patron. Only the current holder can return
/// a book.
#[utoipa::path(
    post,
    path = "/patrons/{patron_id}/books/{book_id}/return",
    tag = "loans",
    params(
        ("patron_id" = i64, Path, description = "Patron ID"),
        ("book_id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Book not currently borrowed by this patron")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    Path((patron_id, book_id)): Path<(i64, i64)>,
) -> AppResult<Json<ReturnResponse>> {
    let book = state.services.loans.return_book(patron_id, book_id).await?;

    Ok(Json(ReturnResponse {
        message: "Book returned successfully".to_string(),
        book,
    }))
}
