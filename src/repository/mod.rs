//! Persistence gateway.
//!
//! [`Store`] is the backend contract (row-level reads and transactional writes),
//! implemented for PostgreSQL and for an in-memory table set. [`Repository`] wraps
//! a store and provides the typed collections used by the services, attaching
//! exactly the relations named by the include specifications.

pub mod include;
pub mod memory;
pub mod postgres;

use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::NewAuthor,
        book::{sort_by_title, NewBook},
        borrowing::NewBorrowing,
        category::NewCategory,
        identity::NewIdentity,
        index::BookQuery,
        member::NewMember,
        publisher::NewPublisher,
        Author, Book, BookCategory, Borrowing, Category, Identity, Member, Publisher,
    },
};

pub use include::{
    AuthorInclude, BookInclude, BorrowingInclude, CategoryInclude, MemberInclude,
    PublisherInclude,
};

/// Row selection for tables addressed only by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select {
    All,
    Ids(Vec<i32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookSelect {
    All,
    Ids(Vec<i32>),
    Authors(Vec<i32>),
    Publishers(Vec<i32>),
    /// Filtered and ordered per the query instead of by id
    Query(BookQuery),
}

/// Junction rows by either side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSelect {
    Books(Vec<i32>),
    Categories(Vec<i32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberSelect {
    All,
    Ids(Vec<i32>),
    Identity(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowingSelect {
    All,
    Ids(Vec<i32>),
    Members(Vec<i32>),
    Books(Vec<i32>),
}

/// Junction rows to add and drop for one book
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkChange {
    pub insert: Vec<i32>,
    pub remove: Vec<i32>,
}

impl LinkChange {
    /// Symmetric difference between the linked and the selected category ids.
    /// Categories present on both sides appear in neither list.
    pub fn between(current: &[i32], selected: &[i32]) -> Self {
        let current: BTreeSet<i32> = current.iter().copied().collect();
        let selected: BTreeSet<i32> = selected.iter().copied().collect();

        Self {
            insert: selected.difference(&current).copied().collect(),
            remove: current.difference(&selected).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.remove.is_empty()
    }
}

/// Backend contract. Reads return rows with every relation left unloaded, ordered
/// by id unless the selection says otherwise. Updates compare the row's `version`
/// and fail with `ConcurrencyConflict` when the stored row moved on or is gone.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    async fn authors(&self, select: Select) -> AppResult<Vec<Author>>;
    async fn insert_author(&self, author: NewAuthor) -> AppResult<Author>;
    async fn update_author(&self, author: &Author) -> AppResult<Author>;
    async fn delete_author(&self, id: i32) -> AppResult<()>;

    async fn publishers(&self, select: Select) -> AppResult<Vec<Publisher>>;
    async fn insert_publisher(&self, publisher: NewPublisher) -> AppResult<Publisher>;
    async fn update_publisher(&self, publisher: &Publisher) -> AppResult<Publisher>;
    async fn delete_publisher(&self, id: i32) -> AppResult<()>;

    async fn categories(&self, select: Select) -> AppResult<Vec<Category>>;
    async fn insert_category(&self, category: NewCategory) -> AppResult<Category>;
    async fn update_category(&self, category: &Category) -> AppResult<Category>;
    async fn delete_category(&self, id: i32) -> AppResult<()>;

    async fn books(&self, select: BookSelect) -> AppResult<Vec<Book>>;
    /// Insert the book and its initial category links in one transaction
    async fn insert_book(&self, book: NewBook, category_ids: Vec<i32>) -> AppResult<Book>;
    /// Update the book's fields and apply the link change in one transaction
    async fn update_book(&self, book: &Book, links: LinkChange) -> AppResult<Book>;
    async fn delete_book(&self, id: i32) -> AppResult<()>;

    async fn book_categories(&self, select: LinkSelect) -> AppResult<Vec<BookCategory>>;
    /// All-or-nothing; any failing insert or delete yields `PartialUpdate`
    async fn apply_book_categories(&self, book_id: i32, links: LinkChange) -> AppResult<()>;

    async fn members(&self, select: MemberSelect) -> AppResult<Vec<Member>>;
    async fn insert_member(&self, member: NewMember) -> AppResult<Member>;
    /// Never touches `email` or `identity_id`
    async fn update_member(&self, member: &Member) -> AppResult<Member>;
    async fn delete_member(&self, id: i32) -> AppResult<()>;

    async fn borrowings(&self, select: BorrowingSelect) -> AppResult<Vec<Borrowing>>;
    async fn insert_borrowing(&self, borrowing: NewBorrowing) -> AppResult<Borrowing>;
    async fn update_borrowing(&self, borrowing: &Borrowing) -> AppResult<Borrowing>;
    async fn delete_borrowing(&self, id: i32) -> AppResult<()>;

    async fn identity_by_email(&self, email: &str) -> AppResult<Option<Identity>>;
    async fn insert_identity(&self, identity: NewIdentity) -> AppResult<Identity>;
    /// Identity plus linked member in one transaction
    async fn register_member(
        &self,
        identity: NewIdentity,
        member: NewMember,
    ) -> AppResult<(Identity, Member)>;
}

/// Typed collections over a [`Store`], shared by all services
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Deref for Repository {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Repository backed by the given PostgreSQL pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self::new(Arc::new(postgres::PgStore::new(pool)))
    }

    /// Repository backed by an empty in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(memory::MemoryStore::new()))
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn books_list(&self, include: BookInclude) -> AppResult<Vec<Book>> {
        self.books_where(BookSelect::All, include).await
    }

    pub async fn books_search(&self, query: BookQuery, include: BookInclude) -> AppResult<Vec<Book>> {
        self.books_where(BookSelect::Query(query), include).await
    }

    pub async fn books_find(&self, id: i32, include: BookInclude) -> AppResult<Book> {
        single(self.books_where(BookSelect::Ids(vec![id]), include).await?, "Book", id)
    }

    pub async fn books_where(&self, select: BookSelect, include: BookInclude) -> AppResult<Vec<Book>> {
        let mut books = self.store.books(select).await?;
        self.attach_book_relations(&mut books, include).await?;
        Ok(books)
    }

    async fn attach_book_relations(&self, books: &mut [Book], include: BookInclude) -> AppResult<()> {
        if books.is_empty() {
            return Ok(());
        }
        let book_ids = distinct(books.iter().map(|b| b.id));

        if include.author {
            let ids = distinct(books.iter().map(|b| b.author_id));
            let authors = by_id(self.store.authors(Select::Ids(ids)).await?, |a| a.id);
            for book in books.iter_mut() {
                book.author = authors.get(&book.author_id).cloned();
            }
        }

        if include.publisher {
            let ids = distinct(books.iter().map(|b| b.publisher_id));
            let publishers = by_id(self.store.publishers(Select::Ids(ids)).await?, |p| p.id);
            for book in books.iter_mut() {
                book.publisher = publishers.get(&book.publisher_id).cloned();
            }
        }

        if include.categories {
            let links = self
                .store
                .book_categories(LinkSelect::Books(book_ids.clone()))
                .await?;
            let ids = distinct(links.iter().map(|l| l.category_id));
            let categories = by_id(self.store.categories(Select::Ids(ids)).await?, |c| c.id);

            for book in books.iter_mut() {
                let mut linked: Vec<Category> = links
                    .iter()
                    .filter(|l| l.book_id == book.id)
                    .filter_map(|l| categories.get(&l.category_id).cloned())
                    .collect();
                linked.sort_by(|a, b| {
                    a.category_name
                        .cmp(&b.category_name)
                        .then(a.id.cmp(&b.id))
                });
                linked.dedup_by_key(|c| c.id);
                book.categories = Some(linked);
            }
        }

        if include.borrowings {
            let rows = self.store.borrowings(BorrowingSelect::Books(book_ids)).await?;
            for book in books.iter_mut() {
                book.borrowings = Some(
                    rows.iter()
                        .filter(|b| b.book_id == book.id)
                        .cloned()
                        .collect(),
                );
            }
        }

        Ok(())
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn categories_list(&self, include: CategoryInclude) -> AppResult<Vec<Category>> {
        self.categories_where(Select::All, include).await
    }

    pub async fn categories_find(&self, id: i32, include: CategoryInclude) -> AppResult<Category> {
        single(
            self.categories_where(Select::Ids(vec![id]), include).await?,
            "Category",
            id,
        )
    }

    async fn categories_where(&self, select: Select, include: CategoryInclude) -> AppResult<Vec<Category>> {
        let mut categories = self.store.categories(select).await?;

        if let (Some(book_include), false) = (include.books, categories.is_empty()) {
            let category_ids = distinct(categories.iter().map(|c| c.id));
            let links = self
                .store
                .book_categories(LinkSelect::Categories(category_ids))
                .await?;
            let book_ids = distinct(links.iter().map(|l| l.book_id));
            let books = by_id(
                self.books_where(BookSelect::Ids(book_ids), book_include).await?,
                |b| b.id,
            );

            for category in categories.iter_mut() {
                let mut linked: Vec<Book> = links
                    .iter()
                    .filter(|l| l.category_id == category.id)
                    .filter_map(|l| books.get(&l.book_id).cloned())
                    .collect();
                sort_by_title(&mut linked);
                linked.dedup_by_key(|b| b.id);
                category.books = Some(linked);
            }
        }

        Ok(categories)
    }

    // =========================================================================
    // AUTHORS / PUBLISHERS
    // =========================================================================

    pub async fn authors_list(&self, include: AuthorInclude) -> AppResult<Vec<Author>> {
        self.authors_where(Select::All, include).await
    }

    pub async fn authors_find(&self, id: i32, include: AuthorInclude) -> AppResult<Author> {
        single(self.authors_where(Select::Ids(vec![id]), include).await?, "Author", id)
    }

    async fn authors_where(&self, select: Select, include: AuthorInclude) -> AppResult<Vec<Author>> {
        let mut authors = self.store.authors(select).await?;

        if let (Some(book_include), false) = (include.books, authors.is_empty()) {
            let ids = distinct(authors.iter().map(|a| a.id));
            let books = self.books_where(BookSelect::Authors(ids), book_include).await?;
            for author in authors.iter_mut() {
                let mut own: Vec<Book> = books
                    .iter()
                    .filter(|b| b.author_id == author.id)
                    .cloned()
                    .collect();
                sort_by_title(&mut own);
                author.books = Some(own);
            }
        }

        Ok(authors)
    }

    pub async fn publishers_list(&self, include: PublisherInclude) -> AppResult<Vec<Publisher>> {
        self.publishers_where(Select::All, include).await
    }

    pub async fn publishers_find(&self, id: i32, include: PublisherInclude) -> AppResult<Publisher> {
        single(
            self.publishers_where(Select::Ids(vec![id]), include).await?,
            "Publisher",
            id,
        )
    }

    async fn publishers_where(&self, select: Select, include: PublisherInclude) -> AppResult<Vec<Publisher>> {
        let mut publishers = self.store.publishers(select).await?;

        if let (Some(book_include), false) = (include.books, publishers.is_empty()) {
            let ids = distinct(publishers.iter().map(|p| p.id));
            let books = self.books_where(BookSelect::Publishers(ids), book_include).await?;
            for publisher in publishers.iter_mut() {
                let mut own: Vec<Book> = books
                    .iter()
                    .filter(|b| b.publisher_id == publisher.id)
                    .cloned()
                    .collect();
                sort_by_title(&mut own);
                publisher.books = Some(own);
            }
        }

        Ok(publishers)
    }

    // =========================================================================
    // MEMBERS / BORROWINGS
    // =========================================================================

    pub async fn members_list(&self, include: MemberInclude) -> AppResult<Vec<Member>> {
        self.members_where(MemberSelect::All, include).await
    }

    pub async fn members_find(&self, id: i32, include: MemberInclude) -> AppResult<Member> {
        single(
            self.members_where(MemberSelect::Ids(vec![id]), include).await?,
            "Member",
            id,
        )
    }

    /// Member linked to an identity, if any
    pub async fn members_by_identity(&self, identity_id: i32) -> AppResult<Option<Member>> {
        Ok(self
            .store
            .members(MemberSelect::Identity(identity_id))
            .await?
            .into_iter()
            .next())
    }

    async fn members_where(&self, select: MemberSelect, include: MemberInclude) -> AppResult<Vec<Member>> {
        let mut members = self.store.members(select).await?;

        if let (Some(borrowing_include), false) = (include.borrowings, members.is_empty()) {
            let ids = distinct(members.iter().map(|m| m.id));
            let borrowings = self
                .borrowings_where(BorrowingSelect::Members(ids), borrowing_include)
                .await?;
            for member in members.iter_mut() {
                member.borrowings = Some(
                    borrowings
                        .iter()
                        .filter(|b| b.member_id == member.id)
                        .cloned()
                        .collect(),
                );
            }
        }

        Ok(members)
    }

    pub async fn borrowings_list(&self, include: BorrowingInclude) -> AppResult<Vec<Borrowing>> {
        self.borrowings_where(BorrowingSelect::All, include).await
    }

    pub async fn borrowings_find(&self, id: i32, include: BorrowingInclude) -> AppResult<Borrowing> {
        single(
            self.borrowings_where(BorrowingSelect::Ids(vec![id]), include).await?,
            "Borrowing",
            id,
        )
    }

    pub async fn borrowings_where(
        &self,
        select: BorrowingSelect,
        include: BorrowingInclude,
    ) -> AppResult<Vec<Borrowing>> {
        let mut borrowings = self.store.borrowings(select).await?;
        if borrowings.is_empty() {
            return Ok(borrowings);
        }

        if include.member {
            let ids = distinct(borrowings.iter().map(|b| b.member_id));
            let members = by_id(self.store.members(MemberSelect::Ids(ids)).await?, |m| m.id);
            for borrowing in borrowings.iter_mut() {
                borrowing.member = members.get(&borrowing.member_id).cloned();
            }
        }

        if let Some(book_include) = include.book {
            let ids = distinct(borrowings.iter().map(|b| b.book_id));
            let books = by_id(
                self.books_where(BookSelect::Ids(ids), book_include).await?,
                |b| b.id,
            );
            for borrowing in borrowings.iter_mut() {
                borrowing.book = books.get(&borrowing.book_id).cloned();
            }
        }

        Ok(borrowings)
    }
}

/// Exactly one row must match; zero is `NotFound`, more than one is an error too.
pub fn single<T>(mut rows: Vec<T>, entity: &str, id: i32) -> AppResult<T> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        0 => Err(AppError::NotFound(format!("{} with id {} not found", entity, id))),
        n => Err(AppError::Internal(format!(
            "{} id {} matched {} rows",
            entity, id, n
        ))),
    }
}

fn distinct(ids: impl Iterator<Item = i32>) -> Vec<i32> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

fn by_id<T>(rows: Vec<T>, id: impl Fn(&T) -> i32) -> HashMap<i32, T> {
    rows.into_iter().map(|row| (id(&row), row)).collect()
}
