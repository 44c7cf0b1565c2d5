//! Author management service

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{AuthorInput, NewAuthor},
        book::sort_by_title,
        Author,
    },
    repository::{AuthorInclude, BookInclude, Repository},
    services::required_version,
    validation::validate,
};

#[derive(Clone)]
pub struct AuthorsService {
    repository: Repository,
}

impl AuthorsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// All authors, by last then first name
    pub async fn list(&self) -> AppResult<Vec<Author>> {
        let mut authors = self.repository.authors_list(AuthorInclude::NONE).await?;
        authors.sort_by(|a, b| {
            (a.last_name.to_lowercase(), a.first_name.to_lowercase(), a.id).cmp(&(
                b.last_name.to_lowercase(),
                b.first_name.to_lowercase(),
                b.id,
            ))
        });
        Ok(authors)
    }

    /// Author with their books
    pub async fn get(&self, id: i32) -> AppResult<Author> {
        let mut author = self
            .repository
            .authors_find(id, AuthorInclude::with_books(BookInclude::NONE.with_publisher()))
            .await?;
        if let Some(ref mut books) = author.books {
            sort_by_title(books);
        }
        Ok(author)
    }

    pub async fn create(&self, input: AuthorInput) -> AppResult<Author> {
        validate(&input).map_err(AppError::Validation)?;

        let author = self.repository.insert_author(NewAuthor::from(input)).await?;
        tracing::info!("Author created: id={}", author.id);
        Ok(author)
    }

    pub async fn update(&self, id: i32, input: AuthorInput) -> AppResult<Author> {
        let version = required_version(input.version)?;
        validate(&input).map_err(AppError::Validation)?;

        let fields = NewAuthor::from(input);
        let author = self
            .repository
            .update_author(&Author {
                id,
                first_name: fields.first_name,
                last_name: fields.last_name,
                version,
                books: None,
            })
            .await?;
        tracing::info!("Author updated: id={} version={}", author.id, author.version);
        Ok(author)
    }

    /// Refused while the author still has books
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.delete_author(id).await?;
        tracing::info!("Author deleted: id={}", id);
        Ok(())
    }
}
