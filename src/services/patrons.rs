//! Patron management service

use crate::{
    error::AppResult,
    models::patron::{CreatePatron, Patron, UpdatePatron},
    repository::Repository,
};

#[derive(Clone)]
pub struct PatronsService {
    repository: Repository,
}

impl PatronsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List all patrons with their currently borrowed books
    pub async fn list_patrons(&self) -> AppResult<Vec<Patron>> {
        self.repository.patrons.list().await
    }

    /// Create a patron
    pub async fn create_patron(&self, patron: CreatePatron) -> AppResult<Patron> {
        let created = self.repository.patrons.create(&patron).await?;
        tracing::info!(patron_id = created.id, "patron created");
        Ok(created)
    }

    /// Partial patron update
    pub async fn update_patron(&self, id: i64, update: UpdatePatron) -> AppResult<Patron> {
        self.repository.patrons.update(id, &update).await
    }

    /// Delete a patron. Fails with `Conflict` while the patron holds any
    /// book, and `NotFound` for a nonexistent patron.
    pub async fn delete_patron(&self, id: i64) -> AppResult<()> {
        self.repository.patrons.delete(id).await?;
        tracing::info!(patron_id = id, "patron deleted");
        Ok(())
    }
}
