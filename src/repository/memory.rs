//! In-memory store used by tests and by the `memory` backend.
//!
//! All tables sit behind one `RwLock`; every write takes the lock once and checks
//! all of its preconditions before mutating anything, so multi-row writes are
//! all-or-nothing like their PostgreSQL counterparts.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{BookSelect, BorrowingSelect, LinkChange, LinkSelect, MemberSelect, Select, Store};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::NewAuthor,
        book::NewBook,
        borrowing::NewBorrowing,
        category::NewCategory,
        identity::NewIdentity,
        index::{BookQuery, SortKey},
        member::NewMember,
        publisher::NewPublisher,
        Author, Book, BookCategory, Borrowing, Category, Identity, Member, Publisher,
    },
};

const MISSING_REFERENCE: &str = "A referenced record does not exist";
const STILL_REFERENCED: &str = "The record is still referenced by other records";

/// Stored row: id access plus a copy with every relation unloaded
trait Row: Clone {
    fn id(&self) -> i32;

    fn detached(&self) -> Self {
        self.clone()
    }
}

trait Versioned: Row {
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
}

macro_rules! versioned_row {
    ($ty:ty, $($relation:ident),*) => {
        impl Row for $ty {
            fn id(&self) -> i32 {
                self.id
            }

            fn detached(&self) -> Self {
                Self {
                    $($relation: None,)*
                    ..self.clone()
                }
            }
        }

        impl Versioned for $ty {
            fn version(&self) -> i32 {
                self.version
            }

            fn set_version(&mut self, version: i32) {
                self.version = version;
            }
        }
    };
}

versioned_row!(Author, books);
versioned_row!(Publisher, books);
versioned_row!(Category, books);
versioned_row!(Book, author, publisher, categories, borrowings);
versioned_row!(Member, borrowings);
versioned_row!(Borrowing, member, book);

impl Row for BookCategory {
    fn id(&self) -> i32 {
        self.id
    }
}

impl Row for Identity {
    fn id(&self) -> i32 {
        self.id
    }
}

struct Table<T> {
    rows: BTreeMap<i32, T>,
    last_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T: Row> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(i32) -> T) -> T {
        self.last_id += 1;
        let row = build(self.last_id);
        self.rows.insert(row.id(), row.clone());
        row
    }

    fn contains(&self, id: i32) -> bool {
        self.rows.contains_key(&id)
    }

    fn filter(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.values().filter(|row| keep(row)).cloned().collect()
    }

    fn select(&self, select: &Select) -> Vec<T> {
        match select {
            Select::All => self.rows.values().cloned().collect(),
            Select::Ids(ids) => self.filter(|row| ids.contains(&row.id())),
        }
    }

    fn remove(&mut self, id: i32, entity: &str) -> AppResult<T> {
        self.rows
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("{} with id {} not found", entity, id)))
    }
}

impl<T: Versioned> Table<T> {
    /// Optimistic update; `merge` receives the stored row and the incoming one
    fn update(&mut self, row: &T, entity: &str, merge: impl FnOnce(&T, T) -> T) -> AppResult<T> {
        let stored = self
            .rows
            .get(&row.id())
            .filter(|stored| stored.version() == row.version())
            .ok_or_else(|| conflict(entity, row.id()))?;

        let mut next = merge(stored, row.detached());
        next.set_version(row.version() + 1);
        self.rows.insert(next.id(), next.clone());
        Ok(next)
    }

    fn check_version(&self, row: &T, entity: &str) -> AppResult<()> {
        match self.rows.get(&row.id()) {
            Some(stored) if stored.version() == row.version() => Ok(()),
            _ => Err(conflict(entity, row.id())),
        }
    }
}

fn conflict(entity: &str, id: i32) -> AppError {
    AppError::ConcurrencyConflict(format!(
        "{} {} was modified or deleted since it was read",
        entity, id
    ))
}

fn keep_incoming<T>(_: &T, incoming: T) -> T {
    incoming
}

#[derive(Default)]
struct Tables {
    authors: Table<Author>,
    publishers: Table<Publisher>,
    categories: Table<Category>,
    books: Table<Book>,
    book_categories: Table<BookCategory>,
    members: Table<Member>,
    borrowings: Table<Borrowing>,
    identities: Table<Identity>,
}

impl Tables {
    fn author_name(&self, author_id: i32) -> String {
        self.authors
            .rows
            .get(&author_id)
            .map(|a| a.full_name())
            .unwrap_or_default()
    }

    fn search_books(&self, query: &BookQuery) -> Vec<Book> {
        let needle = query.search_text.as_ref().map(|s| s.to_lowercase());

        let mut matches: Vec<(String, Book)> = self
            .books
            .rows
            .values()
            .filter_map(|book| {
                let author = self.author_name(book.author_id);
                let keep = match needle {
                    Some(ref needle) => {
                        book.title.to_lowercase().contains(needle.as_str())
                            || author.to_lowercase().contains(needle.as_str())
                    }
                    None => true,
                };
                let key = match query.sort {
                    SortKey::Title => book.title.to_lowercase(),
                    SortKey::Author => author.to_lowercase(),
                };
                keep.then(|| (key, book.clone()))
            })
            .collect();

        matches.sort_by(|(a_key, a), (b_key, b)| a_key.cmp(b_key).then(a.id.cmp(&b.id)));
        matches.into_iter().map(|(_, book)| book).collect()
    }

    fn check_book_references(&self, author_id: i32, publisher_id: i32) -> AppResult<()> {
        if self.authors.contains(author_id) && self.publishers.contains(publisher_id) {
            Ok(())
        } else {
            Err(AppError::BadRequest(MISSING_REFERENCE.to_string()))
        }
    }

    fn linked_category_ids(&self, book_id: i32) -> Vec<i32> {
        self.book_categories
            .rows
            .values()
            .filter(|l| l.book_id == book_id)
            .map(|l| l.category_id)
            .collect()
    }

    /// Validate the whole change before touching the junction table
    fn check_links(&self, book_id: i32, links: &LinkChange) -> AppResult<()> {
        let linked = self.linked_category_ids(book_id);

        for category_id in &links.insert {
            if !self.categories.contains(*category_id) {
                return Err(AppError::PartialUpdate(format!(
                    "category {} does not exist",
                    category_id
                )));
            }
            if linked.contains(category_id) {
                return Err(AppError::PartialUpdate(format!(
                    "book {} is already linked to category {}",
                    book_id, category_id
                )));
            }
        }
        for category_id in &links.remove {
            if !linked.contains(category_id) {
                return Err(AppError::PartialUpdate(format!(
                    "book {} is not linked to category {}",
                    book_id, category_id
                )));
            }
        }
        Ok(())
    }

    fn apply_links(&mut self, book_id: i32, links: &LinkChange) {
        self.book_categories
            .rows
            .retain(|_, l| !(l.book_id == book_id && links.remove.contains(&l.category_id)));
        for category_id in &links.insert {
            self.book_categories.insert_with(|id| BookCategory {
                id,
                book_id,
                category_id: *category_id,
            });
        }
    }

    fn insert_identity(&mut self, identity: NewIdentity) -> AppResult<Identity> {
        let taken = self
            .identities
            .rows
            .values()
            .any(|i| i.email.eq_ignore_ascii_case(&identity.email));
        if taken {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        Ok(self.identities.insert_with(|id| Identity {
            id,
            email: identity.email,
            password_hash: identity.password_hash,
            roles: identity.roles,
            created_at: Utc::now(),
        }))
    }

    fn insert_member(&mut self, member: NewMember) -> AppResult<Member> {
        if let Some(identity_id) = member.identity_id {
            let linked = self
                .members
                .rows
                .values()
                .any(|m| m.identity_id == Some(identity_id));
            if !self.identities.contains(identity_id) || linked {
                return Err(AppError::BadRequest(MISSING_REFERENCE.to_string()));
            }
        }

        Ok(self.members.insert_with(|id| Member {
            id,
            first_name: member.first_name,
            last_name: member.last_name,
            address: member.address,
            email: member.email,
            phone: member.phone,
            identity_id: member.identity_id,
            version: 1,
            borrowings: None,
        }))
    }
}

/// Store keeping every table in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    // --- authors ---

    async fn authors(&self, select: Select) -> AppResult<Vec<Author>> {
        Ok(self.tables.read().await.authors.select(&select))
    }

    async fn insert_author(&self, author: NewAuthor) -> AppResult<Author> {
        let mut tables = self.tables.write().await;
        Ok(tables.authors.insert_with(|id| Author {
            id,
            first_name: author.first_name,
            last_name: author.last_name,
            version: 1,
            books: None,
        }))
    }

    async fn update_author(&self, author: &Author) -> AppResult<Author> {
        let mut tables = self.tables.write().await;
        tables.authors.update(author, "Author", keep_incoming)
    }

    async fn delete_author(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables.books.rows.values().any(|b| b.author_id == id) {
            return Err(AppError::Conflict(STILL_REFERENCED.to_string()));
        }
        tables.authors.remove(id, "Author").map(|_| ())
    }

    // --- publishers ---

    async fn publishers(&self, select: Select) -> AppResult<Vec<Publisher>> {
        Ok(self.tables.read().await.publishers.select(&select))
    }

    async fn insert_publisher(&self, publisher: NewPublisher) -> AppResult<Publisher> {
        let mut tables = self.tables.write().await;
        Ok(tables.publishers.insert_with(|id| Publisher {
            id,
            publisher_name: publisher.publisher_name,
            version: 1,
            books: None,
        }))
    }

    async fn update_publisher(&self, publisher: &Publisher) -> AppResult<Publisher> {
        let mut tables = self.tables.write().await;
        tables.publishers.update(publisher, "Publisher", keep_incoming)
    }

    async fn delete_publisher(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables.books.rows.values().any(|b| b.publisher_id == id) {
            return Err(AppError::Conflict(STILL_REFERENCED.to_string()));
        }
        tables.publishers.remove(id, "Publisher").map(|_| ())
    }

    // --- categories ---

    async fn categories(&self, select: Select) -> AppResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.select(&select))
    }

    async fn insert_category(&self, category: NewCategory) -> AppResult<Category> {
        let mut tables = self.tables.write().await;
        Ok(tables.categories.insert_with(|id| Category {
            id,
            category_name: category.category_name,
            version: 1,
            books: None,
        }))
    }

    async fn update_category(&self, category: &Category) -> AppResult<Category> {
        let mut tables = self.tables.write().await;
        tables.categories.update(category, "Category", keep_incoming)
    }

    async fn delete_category(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.categories.remove(id, "Category")?;
        tables.book_categories.rows.retain(|_, l| l.category_id != id);
        Ok(())
    }

    // --- books ---

    async fn books(&self, select: BookSelect) -> AppResult<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(match select {
            BookSelect::All => tables.books.select(&Select::All),
            BookSelect::Ids(ids) => tables.books.select(&Select::Ids(ids)),
            BookSelect::Authors(ids) => tables.books.filter(|b| ids.contains(&b.author_id)),
            BookSelect::Publishers(ids) => tables.books.filter(|b| ids.contains(&b.publisher_id)),
            BookSelect::Query(query) => tables.search_books(&query),
        })
    }

    async fn insert_book(&self, book: NewBook, category_ids: Vec<i32>) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        tables.check_book_references(book.author_id, book.publisher_id)?;
        if category_ids.iter().any(|id| !tables.categories.contains(*id)) {
            return Err(AppError::BadRequest(MISSING_REFERENCE.to_string()));
        }

        let created = tables.books.insert_with(|id| Book {
            id,
            title: book.title,
            price: book.price,
            publishing_date: book.publishing_date,
            author_id: book.author_id,
            publisher_id: book.publisher_id,
            version: 1,
            author: None,
            publisher: None,
            categories: None,
            borrowings: None,
        });
        let links = LinkChange::between(&[], &category_ids);
        tables.apply_links(created.id, &links);
        Ok(created)
    }

    async fn update_book(&self, book: &Book, links: LinkChange) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        tables.books.check_version(book, "Book")?;
        tables.check_book_references(book.author_id, book.publisher_id)?;
        tables.check_links(book.id, &links)?;

        let updated = tables.books.update(book, "Book", keep_incoming)?;
        tables.apply_links(book.id, &links);
        Ok(updated)
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.books.remove(id, "Book")?;
        tables.book_categories.rows.retain(|_, l| l.book_id != id);
        tables.borrowings.rows.retain(|_, b| b.book_id != id);
        Ok(())
    }

    // --- junction ---

    async fn book_categories(&self, select: LinkSelect) -> AppResult<Vec<BookCategory>> {
        let tables = self.tables.read().await;
        Ok(match select {
            LinkSelect::Books(ids) => tables.book_categories.filter(|l| ids.contains(&l.book_id)),
            LinkSelect::Categories(ids) => {
                tables.book_categories.filter(|l| ids.contains(&l.category_id))
            }
        })
    }

    async fn apply_book_categories(&self, book_id: i32, links: LinkChange) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.books.contains(book_id) {
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }
        tables.check_links(book_id, &links)?;
        tables.apply_links(book_id, &links);
        Ok(())
    }

    // --- members ---

    async fn members(&self, select: MemberSelect) -> AppResult<Vec<Member>> {
        let tables = self.tables.read().await;
        Ok(match select {
            MemberSelect::All => tables.members.select(&Select::All),
            MemberSelect::Ids(ids) => tables.members.select(&Select::Ids(ids)),
            MemberSelect::Identity(identity_id) => tables
                .members
                .filter(|m| m.identity_id == Some(identity_id)),
        })
    }

    async fn insert_member(&self, member: NewMember) -> AppResult<Member> {
        self.tables.write().await.insert_member(member)
    }

    async fn update_member(&self, member: &Member) -> AppResult<Member> {
        let mut tables = self.tables.write().await;
        tables.members.update(member, "Member", |stored, incoming| Member {
            email: stored.email.clone(),
            identity_id: stored.identity_id,
            ..incoming
        })
    }

    async fn delete_member(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.members.remove(id, "Member")?;
        tables.borrowings.rows.retain(|_, b| b.member_id != id);
        Ok(())
    }

    // --- borrowings ---

    async fn borrowings(&self, select: BorrowingSelect) -> AppResult<Vec<Borrowing>> {
        let tables = self.tables.read().await;
        Ok(match select {
            BorrowingSelect::All => tables.borrowings.select(&Select::All),
            BorrowingSelect::Ids(ids) => tables.borrowings.select(&Select::Ids(ids)),
            BorrowingSelect::Members(ids) => {
                tables.borrowings.filter(|b| ids.contains(&b.member_id))
            }
            BorrowingSelect::Books(ids) => tables.borrowings.filter(|b| ids.contains(&b.book_id)),
        })
    }

    async fn insert_borrowing(&self, borrowing: NewBorrowing) -> AppResult<Borrowing> {
        let mut tables = self.tables.write().await;
        if !tables.members.contains(borrowing.member_id) || !tables.books.contains(borrowing.book_id) {
            return Err(AppError::BadRequest(MISSING_REFERENCE.to_string()));
        }
        Ok(tables.borrowings.insert_with(|id| Borrowing {
            id,
            member_id: borrowing.member_id,
            book_id: borrowing.book_id,
            return_date: None,
            version: 1,
            member: None,
            book: None,
        }))
    }

    async fn update_borrowing(&self, borrowing: &Borrowing) -> AppResult<Borrowing> {
        let mut tables = self.tables.write().await;
        tables.borrowings.update(borrowing, "Borrowing", keep_incoming)
    }

    async fn delete_borrowing(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.borrowings.remove(id, "Borrowing").map(|_| ())
    }

    // --- identities ---

    async fn identity_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .identities
            .rows
            .values()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_identity(&self, identity: NewIdentity) -> AppResult<Identity> {
        self.tables.write().await.insert_identity(identity)
    }

    async fn register_member(
        &self,
        identity: NewIdentity,
        member: NewMember,
    ) -> AppResult<(Identity, Member)> {
        let mut tables = self.tables.write().await;
        let identity = tables.insert_identity(identity)?;
        let member = NewMember {
            identity_id: Some(identity.id),
            ..member
        };
        match tables.insert_member(member) {
            Ok(member) => Ok((identity, member)),
            Err(e) => {
                tables.identities.rows.remove(&identity.id);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    async fn seeded() -> (MemoryStore, Book) {
        let store = MemoryStore::new();
        let author = store
            .insert_author(NewAuthor {
                first_name: "Liviu".into(),
                last_name: "Rebreanu".into(),
            })
            .await
            .unwrap();
        let publisher = store
            .insert_publisher(NewPublisher {
                publisher_name: "Polirom".into(),
            })
            .await
            .unwrap();
        for name in ["Novel", "Classic", "Drama"] {
            store
                .insert_category(NewCategory {
                    category_name: name.into(),
                })
                .await
                .unwrap();
        }
        let book = store
            .insert_book(
                NewBook {
                    title: "Ion".into(),
                    price: Decimal::new(3500, 2),
                    publishing_date: NaiveDate::from_ymd_opt(1920, 11, 1).unwrap(),
                    author_id: author.id,
                    publisher_id: publisher.id,
                },
                vec![1, 2],
            )
            .await
            .unwrap();
        (store, book)
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let (store, book) = seeded().await;

        let mut first = book.clone();
        first.title = "Ion (ed. 2)".into();
        let mut second = book.clone();
        second.title = "Ion (ed. 3)".into();

        let updated = store.update_book(&first, LinkChange::default()).await.unwrap();
        assert_eq!(updated.version, book.version + 1);

        let err = store.update_book(&second, LinkChange::default()).await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn failed_link_change_leaves_junction_untouched() {
        let (store, book) = seeded().await;

        let change = LinkChange {
            insert: vec![3, 99],
            remove: vec![1],
        };
        let err = store.apply_book_categories(book.id, change).await.unwrap_err();
        assert!(matches!(err, AppError::PartialUpdate(_)));

        let links = store
            .book_categories(LinkSelect::Books(vec![book.id]))
            .await
            .unwrap();
        let mut ids: Vec<i32> = links.iter().map(|l| l.category_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn deleting_book_cascades_links_and_borrowings() {
        let (store, book) = seeded().await;
        let member = store
            .insert_member(NewMember {
                first_name: "Ana".into(),
                last_name: "Pop".into(),
                address: None,
                email: "ana.pop@example.com".into(),
                phone: "0722-123-123".into(),
                identity_id: None,
            })
            .await
            .unwrap();
        store
            .insert_borrowing(NewBorrowing {
                member_id: member.id,
                book_id: book.id,
            })
            .await
            .unwrap();

        assert!(matches!(
            store.delete_author(book.author_id).await,
            Err(AppError::Conflict(_))
        ));

        store.delete_book(book.id).await.unwrap();
        assert!(store
            .book_categories(LinkSelect::Books(vec![book.id]))
            .await
            .unwrap()
            .is_empty());
        assert!(store.borrowings(BorrowingSelect::All).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_book(book.id).await,
            Err(AppError::NotFound(_))
        ));
        store.delete_author(book.author_id).await.unwrap();
    }

    #[tokio::test]
    async fn member_update_keeps_email() {
        let store = MemoryStore::new();
        let member = store
            .insert_member(NewMember {
                first_name: "Ana".into(),
                last_name: "Pop".into(),
                address: None,
                email: "ana.pop@example.com".into(),
                phone: "0722-123-123".into(),
                identity_id: None,
            })
            .await
            .unwrap();

        let mut edited = member.clone();
        edited.email = "someone.else@example.com".into();
        edited.phone = "0744.555.666".into();
        let updated = store.update_member(&edited).await.unwrap();

        assert_eq!(updated.email, "ana.pop@example.com");
        assert_eq!(updated.phone, "0744.555.666");
    }
}
