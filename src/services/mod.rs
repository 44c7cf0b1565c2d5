//! Business logic services

pub mod auth;
pub mod authors;
pub mod borrowings;
pub mod catalog;
pub mod categories;
pub mod members;
pub mod publishers;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub authors: authors::AuthorsService,
    pub publishers: publishers::PublishersService,
    pub categories: categories::CategoriesService,
    pub members: members::MembersService,
    pub borrowings: borrowings::BorrowingsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            catalog: catalog::CatalogService::new(repository.clone()),
            authors: authors::AuthorsService::new(repository.clone()),
            publishers: publishers::PublishersService::new(repository.clone()),
            categories: categories::CategoriesService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            borrowings: borrowings::BorrowingsService::new(repository.clone()),
            repository,
        }
    }

    /// Round-trip to the backing store
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}

/// Edits must say which version of the record they were made against
pub(crate) fn required_version(version: Option<i32>) -> AppResult<i32> {
    version.ok_or_else(|| AppError::BadRequest("version is required when editing".to_string()))
}
