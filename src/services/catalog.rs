//! Catalog queries and book management

use std::collections::BTreeSet;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{sort_by_title, BookInput, NewBook},
        index::{
            AssignedCategoryData, BookFormData, BookIndexData, BookQuery, CategoryIndexData,
            PublisherIndexData, SortKey,
        },
        Book, Category,
    },
    repository::{
        AuthorInclude, BookInclude, CategoryInclude, LinkChange, PublisherInclude, Repository,
        Select,
    },
    services::required_version,
    validation::{validate, FieldErrors},
};

/// Reading after a failed lookup on edit means the row vanished under the caller
pub(crate) fn deleted_since_read(entity: &str, id: i32) -> impl FnOnce(AppError) -> AppError + '_ {
    move |e| match e {
        AppError::NotFound(_) => AppError::ConcurrencyConflict(format!(
            "{} {} was deleted since it was read",
            entity, id
        )),
        e => e,
    }
}

const UNKNOWN_CATEGORIES: &str = "One or more selected categories do not exist.";

pub(crate) fn sort_categories(categories: &mut [Category]) {
    categories.sort_by(|a, b| {
        a.category_name
            .to_lowercase()
            .cmp(&b.category_name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // =========================================================================
    // LISTINGS
    // =========================================================================

    /// All categories by name, each with its books
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut categories = self
            .repository
            .categories_list(CategoryInclude::with_books(BookInclude::NONE.with_author()))
            .await?;
        sort_categories(&mut categories);
        Ok(categories)
    }

    /// Books linked to one category
    pub async fn books_in_category(&self, category_id: i32) -> AppResult<Vec<Book>> {
        let category = self
            .repository
            .categories_find(category_id, CategoryInclude::with_books(BookInclude::CATALOG))
            .await?;
        Ok(category.books.unwrap_or_default())
    }

    pub async fn category_index(&self, selected: Option<i32>) -> AppResult<CategoryIndexData> {
        let categories = self.list_categories().await?;
        let books = match selected {
            Some(id) => Some(self.books_in_category(id).await?),
            None => None,
        };

        Ok(CategoryIndexData {
            categories,
            selected_category_id: selected,
            books,
        })
    }

    /// Books whose title or author name contains `search_text`, ordered by `sort`
    pub async fn list_books(&self, search_text: Option<&str>, sort: SortKey) -> AppResult<Vec<Book>> {
        let query = BookQuery::new(search_text, sort);
        tracing::debug!("Book search: {:?}", query);
        self.repository.books_search(query, BookInclude::CATALOG).await
    }

    pub async fn book_index(&self, search_text: Option<&str>, sort: SortKey) -> AppResult<BookIndexData> {
        let query = BookQuery::new(search_text, sort);
        let books = self
            .repository
            .books_search(query.clone(), BookInclude::CATALOG)
            .await?;

        Ok(BookIndexData {
            books,
            search_text: query.search_text,
            sort_key: query.sort,
        })
    }

    pub async fn books_by_publisher(&self, publisher_id: i32) -> AppResult<Vec<Book>> {
        let publisher = self
            .repository
            .publishers_find(publisher_id, PublisherInclude::with_books(BookInclude::CATALOG))
            .await?;
        let mut books = publisher.books.unwrap_or_default();
        sort_by_title(&mut books);
        Ok(books)
    }

    pub async fn publisher_index(&self, selected: Option<i32>) -> AppResult<PublisherIndexData> {
        let mut publishers = self.repository.publishers_list(PublisherInclude::NONE).await?;
        publishers.sort_by(|a, b| {
            a.publisher_name
                .to_lowercase()
                .cmp(&b.publisher_name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        let books = match selected {
            Some(id) => Some(self.books_by_publisher(id).await?),
            None => None,
        };

        Ok(PublisherIndexData {
            publishers,
            selected_publisher_id: selected,
            books,
        })
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books_find(id, BookInclude::CATALOG).await
    }

    /// Choices for the create form, or for editing `id` with its categories checked
    pub async fn book_form(&self, id: Option<i32>) -> AppResult<BookFormData> {
        let book = match id {
            Some(id) => Some(self.get_book(id).await?),
            None => None,
        };

        let mut authors = self.repository.authors_list(AuthorInclude::NONE).await?;
        authors.sort_by(|a, b| {
            a.full_name()
                .to_lowercase()
                .cmp(&b.full_name().to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        let mut publishers = self.repository.publishers_list(PublisherInclude::NONE).await?;
        publishers.sort_by(|a, b| {
            a.publisher_name
                .to_lowercase()
                .cmp(&b.publisher_name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        let mut categories = self.repository.categories_list(CategoryInclude::NONE).await?;
        sort_categories(&mut categories);

        let assigned: BTreeSet<i32> = book
            .as_ref()
            .and_then(|b| b.category_ids())
            .unwrap_or_default()
            .into_iter()
            .collect();
        let categories = categories
            .into_iter()
            .map(|c| AssignedCategoryData {
                assigned: assigned.contains(&c.id),
                category_id: c.id,
                category_name: c.category_name,
            })
            .collect();

        Ok(BookFormData {
            book,
            authors,
            publishers,
            categories,
        })
    }

    /// Rule-table errors plus any dangling author, publisher or category reference
    async fn categories_exist(&self, selected: &[i32]) -> AppResult<bool> {
        let wanted: BTreeSet<i32> = selected.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(true);
        }
        let found = self
            .repository
            .categories(Select::Ids(wanted.iter().copied().collect()))
            .await?;
        Ok(found.len() == wanted.len())
    }

    async fn check_book_input(&self, input: &BookInput) -> AppResult<()> {
        let mut errors: FieldErrors = validate(input).err().unwrap_or_default();

        if self
            .repository
            .authors(Select::Ids(vec![input.author_id]))
            .await?
            .is_empty()
        {
            errors
                .entry("author_id".to_string())
                .or_insert_with(|| "The selected author does not exist.".to_string());
        }
        if self
            .repository
            .publishers(Select::Ids(vec![input.publisher_id]))
            .await?
            .is_empty()
        {
            errors
                .entry("publisher_id".to_string())
                .or_insert_with(|| "The selected publisher does not exist.".to_string());
        }
        if let Some(ref selected) = input.selected_categories {
            if !self.categories_exist(selected).await? {
                errors.insert(
                    "selected_categories".to_string(),
                    UNKNOWN_CATEGORIES.to_string(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    pub async fn create_book(&self, input: BookInput) -> AppResult<Book> {
        self.check_book_input(&input).await?;

        let category_ids = input.selected_categories.clone().unwrap_or_default();
        let created = self
            .repository
            .insert_book(NewBook::from(&input), category_ids)
            .await?;
        tracing::info!("Book created: id={} title={:?}", created.id, created.title);

        self.get_book(created.id).await
    }

    /// Update fields and, when `selected_categories` is given, the category set
    pub async fn update_book(&self, id: i32, input: BookInput) -> AppResult<Book> {
        let version = required_version(input.version)?;
        self.check_book_input(&input).await?;

        let current = self
            .repository
            .books_find(id, BookInclude::NONE.with_categories())
            .await
            .map_err(deleted_since_read("Book", id))?;

        let links = match input.selected_categories {
            Some(ref selected) => {
                LinkChange::between(&current.category_ids().unwrap_or_default(), selected)
            }
            None => LinkChange::default(),
        };

        let fields = NewBook::from(&input);
        let book = Book {
            id,
            title: fields.title,
            price: fields.price,
            publishing_date: fields.publishing_date,
            author_id: fields.author_id,
            publisher_id: fields.publisher_id,
            version,
            author: None,
            publisher: None,
            categories: None,
            borrowings: None,
        };
        let updated = self.repository.update_book(&book, links).await?;
        tracing::info!("Book updated: id={} version={}", updated.id, updated.version);

        self.get_book(id).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.delete_book(id).await?;
        tracing::info!("Book deleted: id={}", id);
        Ok(())
    }

    /// Make the book's categories exactly `selected`, touching only the difference
    pub async fn assign_categories(&self, book_id: i32, selected: &[i32]) -> AppResult<()> {
        let current = self
            .repository
            .books_find(book_id, BookInclude::NONE.with_categories())
            .await?;
        if !self.categories_exist(selected).await? {
            return Err(AppError::field("selected_categories", UNKNOWN_CATEGORIES));
        }
        let change = LinkChange::between(&current.category_ids().unwrap_or_default(), selected);

        if change.is_empty() {
            tracing::debug!("Category assignment unchanged for book {}", book_id);
            return Ok(());
        }

        self.repository.apply_book_categories(book_id, change.clone()).await?;
        tracing::info!(
            "Categories of book {} updated: added {:?}, removed {:?}",
            book_id,
            change.insert,
            change.remove
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        author::NewAuthor, category::NewCategory, publisher::NewPublisher,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    struct Fixture {
        service: CatalogService,
        repository: Repository,
        author_id: i32,
        publisher_id: i32,
    }

    async fn fixture() -> Fixture {
        let repository = Repository::in_memory();
        let author = repository
            .insert_author(NewAuthor {
                first_name: "J.R.R.".into(),
                last_name: "Tolkien".into(),
            })
            .await
            .unwrap();
        let publisher = repository
            .insert_publisher(NewPublisher {
                publisher_name: "Allen & Unwin".into(),
            })
            .await
            .unwrap();
        for name in ["Fantasy", "Adventure", "Classic"] {
            repository
                .insert_category(NewCategory {
                    category_name: name.into(),
                })
                .await
                .unwrap();
        }
        Fixture {
            service: CatalogService::new(repository.clone()),
            repository,
            author_id: author.id,
            publisher_id: publisher.id,
        }
    }

    fn input(f: &Fixture, title: &str, categories: Option<Vec<i32>>) -> BookInput {
        BookInput {
            title: title.into(),
            price: Decimal::new(2500, 2),
            publishing_date: NaiveDate::from_ymd_opt(1954, 7, 29).unwrap(),
            author_id: f.author_id,
            publisher_id: f.publisher_id,
            selected_categories: categories,
            version: None,
        }
    }

    async fn linked_ids(f: &Fixture, book_id: i32) -> Vec<i32> {
        let book = f.service.get_book(book_id).await.unwrap();
        let mut ids = book.category_ids().unwrap();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn assign_categories_reaches_selected_set() {
        let f = fixture().await;
        let book = f
            .service
            .create_book(input(&f, "The Hobbit", Some(vec![1, 2])))
            .await
            .unwrap();

        f.service.assign_categories(book.id, &[2, 3]).await.unwrap();
        assert_eq!(linked_ids(&f, book.id).await, vec![2, 3]);

        f.service.assign_categories(book.id, &[3, 2]).await.unwrap();
        assert_eq!(linked_ids(&f, book.id).await, vec![2, 3]);

        f.service.assign_categories(book.id, &[]).await.unwrap();
        assert!(linked_ids(&f, book.id).await.is_empty());
    }

    #[tokio::test]
    async fn assign_unknown_category_is_a_field_error() {
        let f = fixture().await;
        let book = f
            .service
            .create_book(input(&f, "The Hobbit", Some(vec![1])))
            .await
            .unwrap();

        let err = f.service.assign_categories(book.id, &[1, 99]).await.unwrap_err();
        match err {
            AppError::Validation(fields) => assert!(fields.contains_key("selected_categories")),
            other => panic!("expected a validation error, got {:?}", other),
        }
        assert_eq!(linked_ids(&f, book.id).await, vec![1]);
    }

    #[tokio::test]
    async fn books_in_category_has_no_duplicates_or_omissions() {
        let f = fixture().await;
        let hobbit = f
            .service
            .create_book(input(&f, "The Hobbit", Some(vec![1, 2])))
            .await
            .unwrap();
        let silmarillion = f
            .service
            .create_book(input(&f, "The Silmarillion", Some(vec![1])))
            .await
            .unwrap();
        f.service
            .create_book(input(&f, "Unfinished Tales", Some(vec![3])))
            .await
            .unwrap();

        let ids: Vec<i32> = f
            .service
            .books_in_category(1)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![hobbit.id, silmarillion.id]);

        assert!(matches!(
            f.service.books_in_category(99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_books_filters_on_title_or_author() {
        let f = fixture().await;
        let other = f
            .repository
            .insert_author(NewAuthor {
                first_name: "Ursula".into(),
                last_name: "Le Guin".into(),
            })
            .await
            .unwrap();
        f.service
            .create_book(input(&f, "The Hobbit", None))
            .await
            .unwrap();
        let mut earthsea = input(&f, "A Wizard of Earthsea", None);
        earthsea.author_id = other.id;
        f.service.create_book(earthsea).await.unwrap();

        let found = f.service.list_books(Some("tolkien"), SortKey::Title).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "The Hobbit");
        assert!(found[0].author.is_some());

        let by_title = f.service.list_books(Some("WIZARD"), SortKey::Title).await.unwrap();
        assert_eq!(by_title.len(), 1);

        let all = f.service.list_books(Some("  "), SortKey::Title).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["A Wizard of Earthsea", "The Hobbit"]);

        let by_author = f.service.list_books(None, SortKey::Author).await.unwrap();
        assert_eq!(by_author[0].title, "The Hobbit");
    }

    #[tokio::test]
    async fn second_update_from_same_read_conflicts() {
        let f = fixture().await;
        let book = f
            .service
            .create_book(input(&f, "The Hobbit", None))
            .await
            .unwrap();

        let mut first = input(&f, "The Hobbit, or There and Back Again", None);
        first.version = Some(book.version);
        let mut second = input(&f, "The Hobbit (annotated)", None);
        second.version = Some(book.version);

        f.service.update_book(book.id, first).await.unwrap();
        assert!(matches!(
            f.service.update_book(book.id, second).await,
            Err(AppError::ConcurrencyConflict(_))
        ));
    }

    #[tokio::test]
    async fn create_reports_dangling_references_as_field_errors() {
        let f = fixture().await;
        let mut bad = input(&f, "No", Some(vec![42]));
        bad.author_id = 404;

        match f.service.create_book(bad).await {
            Err(AppError::Validation(fields)) => {
                assert!(fields.contains_key("title"));
                assert!(fields.contains_key("author_id"));
                assert!(fields.contains_key("selected_categories"));
                assert!(!fields.contains_key("publisher_id"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn book_form_marks_assigned_categories() {
        let f = fixture().await;
        let book = f
            .service
            .create_book(input(&f, "The Hobbit", Some(vec![1])))
            .await
            .unwrap();

        let form = f.service.book_form(Some(book.id)).await.unwrap();
        let assigned: Vec<(&str, bool)> = form
            .categories
            .iter()
            .map(|c| (c.category_name.as_str(), c.assigned))
            .collect();
        assert_eq!(
            assigned,
            vec![("Adventure", false), ("Classic", false), ("Fantasy", true)]
        );
        assert_eq!(form.authors.len(), 1);
    }
}
