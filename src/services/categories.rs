//! Category management service

use crate::{
    error::{AppError, AppResult},
    models::{
        category::{CategoryInput, NewCategory},
        Category,
    },
    repository::{BookInclude, CategoryInclude, Repository},
    services::required_version,
    validation::validate,
};

#[derive(Clone)]
pub struct CategoriesService {
    repository: Repository,
}

impl CategoriesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Category with its books and their authors
    pub async fn get(&self, id: i32) -> AppResult<Category> {
        self.repository
            .categories_find(id, CategoryInclude::with_books(BookInclude::NONE.with_author()))
            .await
    }

    pub async fn create(&self, input: CategoryInput) -> AppResult<Category> {
        validate(&input).map_err(AppError::Validation)?;

        let category = self
            .repository
            .insert_category(NewCategory::from(input))
            .await?;
        tracing::info!("Category created: id={}", category.id);
        Ok(category)
    }

    pub async fn update(&self, id: i32, input: CategoryInput) -> AppResult<Category> {
        let version = required_version(input.version)?;
        validate(&input).map_err(AppError::Validation)?;

        let category = self
            .repository
            .update_category(&Category {
                id,
                category_name: NewCategory::from(input).category_name,
                version,
                books: None,
            })
            .await?;
        tracing::info!(
            "Category updated: id={} version={}",
            category.id,
            category.version
        );
        Ok(category)
    }

    /// Drops the category's book links along with it
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.delete_category(id).await?;
        tracing::info!("Category deleted: id={}", id);
        Ok(())
    }
}
