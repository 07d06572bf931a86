//! Business logic services

pub mod cache;
pub mod catalog;
pub mod loans;
pub mod patrons;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub patrons: patrons::PatronsService,
}

impl Services {
    /// Create all services with the given repository and query cache
    pub fn new(repository: Repository, cache: cache::QueryCache) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), cache.clone()),
            loans: loans::LoansService::new(repository.clone(), cache),
            patrons: patrons::PatronsService::new(repository),
        }
    }
}
