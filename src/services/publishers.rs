//! Publisher management service

use crate::{
    error::{AppError, AppResult},
    models::{
        book::sort_by_title,
        publisher::{NewPublisher, PublisherInput},
        Publisher,
    },
    repository::{BookInclude, PublisherInclude, Repository},
    services::required_version,
    validation::validate,
};

#[derive(Clone)]
pub struct PublishersService {
    repository: Repository,
}

impl PublishersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Publisher with its books
    pub async fn get(&self, id: i32) -> AppResult<Publisher> {
        let mut publisher = self
            .repository
            .publishers_find(id, PublisherInclude::with_books(BookInclude::NONE.with_author()))
            .await?;
        if let Some(ref mut books) = publisher.books {
            sort_by_title(books);
        }
        Ok(publisher)
    }

    pub async fn create(&self, input: PublisherInput) -> AppResult<Publisher> {
        validate(&input).map_err(AppError::Validation)?;

        let publisher = self
            .repository
            .insert_publisher(NewPublisher::from(input))
            .await?;
        tracing::info!("Publisher created: id={}", publisher.id);
        Ok(publisher)
    }

    pub async fn update(&self, id: i32, input: PublisherInput) -> AppResult<Publisher> {
        let version = required_version(input.version)?;
        validate(&input).map_err(AppError::Validation)?;

        let publisher = self
            .repository
            .update_publisher(&Publisher {
                id,
                publisher_name: NewPublisher::from(input).publisher_name,
                version,
                books: None,
            })
            .await?;
        tracing::info!(
            "Publisher updated: id={} version={}",
            publisher.id,
            publisher.version
        );
        Ok(publisher)
    }

    /// Refused while the publisher still has books
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.delete_publisher(id).await?;
        tracing::info!("Publisher deleted: id={}", id);
        Ok(())
    }
}
