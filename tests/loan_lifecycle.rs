//! Custody lifecycle tests for the loans service

mod common;

use chrono::Duration;
use shelfmark_server::{models::book::UpdateBook, AppError, AppState};

use common::{seed_author, seed_book, seed_patron, setup_state};

async fn fetch_book(state: &AppState, book_id: i64) -> shelfmark_server::models::book::Book {
    state
        .services
        .catalog
        .list_books()
        .await
        .expect("list_books failed")
        .into_iter()
        .find(|b| b.id == book_id)
        .expect("book not in listing")
}

#[tokio::test]
async fn borrow_sets_due_back_fourteen_days_after_borrowed_at() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    let borrowed = state.services.loans.borrow_book(patron, book).await.unwrap();
    assert!(borrowed);

    let book = fetch_book(&state, book).await;
    let borrowed_at = book.borrowed_at.expect("borrowed_at not set");
    let due_back = book.due_back.expect("due_back not set");
    assert_eq!(due_back, borrowed_at + Duration::days(14));
    assert_eq!(book.patron_id, Some(patron));
    assert!(book.returned_at.is_none());
}

#[tokio::test]
async fn second_borrow_reports_already_borrowed_and_keeps_first_holder() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let p1 = seed_patron(&state, "Paul", "paul@example.com").await;
    let p2 = seed_patron(&state, "Leto", "leto@example.com").await;

    assert!(state.services.loans.borrow_book(p1, book).await.unwrap());
    // Second borrow is a normal "already borrowed" outcome, not an error
    assert!(!state.services.loans.borrow_book(p2, book).await.unwrap());
    // Same patron asking again gets the same answer
    assert!(!state.services.loans.borrow_book(p1, book).await.unwrap());

    let book = fetch_book(&state, book).await;
    assert_eq!(book.patron_id, Some(p1));
}

#[tokio::test]
async fn return_requires_matching_holder() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let p1 = seed_patron(&state, "Paul", "paul@example.com").await;
    let p2 = seed_patron(&state, "Leto", "leto@example.com").await;

    // Not borrowed at all
    let err = state.services.loans.return_book(p1, book).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(state.services.loans.borrow_book(p1, book).await.unwrap());

    // Wrong patron cannot return someone else's book
    let err = state.services.loans.return_book(p2, book).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let book = fetch_book(&state, book).await;
    assert_eq!(book.patron_id, Some(p1));
}

#[tokio::test]
async fn return_clears_custody_and_book_is_borrowable_again() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book_id = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let p1 = seed_patron(&state, "Paul", "paul@example.com").await;
    let p2 = seed_patron(&state, "Leto", "leto@example.com").await;

    assert!(state.services.loans.borrow_book(p1, book_id).await.unwrap());

    let returned = state.services.loans.return_book(p1, book_id).await.unwrap();
    assert!(returned.returned_at.is_some());
    assert!(returned.patron_id.is_none());
    assert!(returned.borrowed_at.is_none());
    assert!(returned.due_back.is_none());

    // A returned book is immediately borrowable by another patron
    assert!(state.services.loans.borrow_book(p2, book_id).await.unwrap());

    // The new borrow supersedes the previous return stamp
    let book = fetch_book(&state, book_id).await;
    assert_eq!(book.patron_id, Some(p2));
    assert!(book.returned_at.is_none());
}

#[tokio::test]
async fn borrow_missing_book_or_patron_is_not_found() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    // Nonexistent book must not be treated as "holder unset"
    let err = state.services.loans.borrow_book(patron, 9999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state.services.loans.borrow_book(9999, book).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn borrowed_book_cannot_be_deleted_until_returned() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    assert!(state.services.loans.borrow_book(patron, book).await.unwrap());
    assert!(state.services.loans.is_borrowed(book).await.unwrap());

    let err = state.services.catalog.delete_book(book).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    state.services.loans.return_book(patron, book).await.unwrap();
    assert!(!state.services.loans.is_borrowed(book).await.unwrap());

    state.services.catalog.delete_book(book).await.unwrap();
    let books = state.services.catalog.list_books().await.unwrap();
    assert!(books.iter().all(|b| b.id != book));
}

#[tokio::test]
async fn patron_with_outstanding_loan_cannot_be_deleted() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    assert!(state.services.loans.borrow_book(patron, book).await.unwrap());

    let err = state.services.patrons.delete_patron(patron).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    state.services.loans.return_book(patron, book).await.unwrap();
    state.services.patrons.delete_patron(patron).await.unwrap();

    let err = state.services.patrons.delete_patron(9999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn empty_update_leaves_custody_and_authors_untouched() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book_id = seed_book(&state, "Dune", "9780441013593", vec![author]).await;
    let patron = seed_patron(&state, "Paul", "paul@example.com").await;

    assert!(state.services.loans.borrow_book(patron, book_id).await.unwrap());
    let before = fetch_book(&state, book_id).await;

    let after = state
        .services
        .catalog
        .update_book(book_id, UpdateBook::default())
        .await
        .unwrap();

    assert_eq!(after.patron_id, before.patron_id);
    assert_eq!(after.borrowed_at, before.borrowed_at);
    assert_eq!(after.due_back, before.due_back);
    assert_eq!(after.returned_at, before.returned_at);
    assert_eq!(
        after.authors.iter().map(|a| a.id).collect::<Vec<_>>(),
        before.authors.iter().map(|a| a.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn concurrent_borrows_have_exactly_one_winner() {
    let state = setup_state().await;
    let author = seed_author(&state, "Frank", "Herbert").await;
    let book = seed_book(&state, "Dune", "9780441013593", vec![author]).await;

    let mut patrons = Vec::new();
    for i in 0..8 {
        patrons.push(seed_patron(&state, &format!("Patron {i}"), &format!("p{i}@example.com")).await);
    }

    let mut handles = Vec::new();
    for patron in patrons {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.services.loans.borrow_book(patron, book).await.unwrap()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}
