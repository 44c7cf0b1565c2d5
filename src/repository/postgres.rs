//! PostgreSQL store

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres};

use super::{BookSelect, BorrowingSelect, LinkChange, LinkSelect, MemberSelect, Select, Store};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::NewAuthor,
        book::NewBook,
        borrowing::NewBorrowing,
        category::NewCategory,
        identity::NewIdentity,
        index::SortKey,
        member::NewMember,
        publisher::NewPublisher,
        Author, Book, BookCategory, Borrowing, Category, Identity, Member, Publisher,
    },
};

const AUTHOR_COLUMNS: &str = "id, first_name, last_name, version";
const PUBLISHER_COLUMNS: &str = "id, publisher_name, version";
const CATEGORY_COLUMNS: &str = "id, category_name, version";
const BOOK_COLUMNS: &str =
    "id, title, price, publishing_date, author_id, publisher_id, version";
const MEMBER_COLUMNS: &str =
    "id, first_name, last_name, address, email, phone, identity_id, version";
const BORROWING_COLUMNS: &str = "id, member_id, book_id, return_date, version";
const IDENTITY_COLUMNS: &str = "id, email, password_hash, roles, created_at";

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

fn sql_state(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|code| code.into_owned())
}

/// Insert/update failure: a dangling reference is the caller's fault
fn write_error(e: sqlx::Error) -> AppError {
    match sql_state(&e).as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => {
            AppError::BadRequest("A referenced record does not exist".to_string())
        }
        Some(UNIQUE_VIOLATION) => AppError::Conflict("The record already exists".to_string()),
        _ => AppError::Database(e),
    }
}

/// Delete failure: restricted by rows that still point at the record
fn delete_error(e: sqlx::Error) -> AppError {
    match sql_state(&e).as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => AppError::Conflict(
            "The record is still referenced by other records".to_string(),
        ),
        _ => AppError::Database(e),
    }
}

fn conflict(entity: &str, id: i32) -> AppError {
    AppError::ConcurrencyConflict(format!(
        "{} {} was modified or deleted since it was read",
        entity, id
    ))
}

fn not_found(entity: &str, id: i32) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", entity, id))
}

/// `SELECT <columns> FROM <table>` with the id filter of a [`Select`]
fn select_sql(columns: &str, table: &str, select: &Select) -> String {
    match select {
        Select::All => format!("SELECT {} FROM {} ORDER BY id", columns, table),
        Select::Ids(_) => format!(
            "SELECT {} FROM {} WHERE id = ANY($1) ORDER BY id",
            columns, table
        ),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn select_rows<T>(&self, columns: &str, table: &str, select: Select) -> AppResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let sql = select_sql(columns, table, &select);
        let mut query = sqlx::query_as::<_, T>(&sql);
        if let Select::Ids(ids) = select {
            query = query.bind(ids);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn delete_row(&self, table: &str, entity: &str, id: i32) -> AppResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(delete_error)?;

        if result.rows_affected() == 0 {
            return Err(not_found(entity, id));
        }
        Ok(())
    }
}

/// Apply a link change inside the caller's transaction; any miss aborts it
async fn apply_links(conn: &mut PgConnection, book_id: i32, links: &LinkChange) -> AppResult<()> {
    for category_id in &links.remove {
        let result =
            sqlx::query("DELETE FROM book_categories WHERE book_id = $1 AND category_id = $2")
                .bind(book_id)
                .bind(category_id)
                .execute(&mut *conn)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::PartialUpdate(format!(
                "book {} is not linked to category {}",
                book_id, category_id
            )));
        }
    }

    for category_id in &links.insert {
        sqlx::query("INSERT INTO book_categories (book_id, category_id) VALUES ($1, $2)")
            .bind(book_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::PartialUpdate(format!(
                    "linking book {} to category {} failed: {}",
                    book_id, category_id, e
                ))
            })?;
    }
    Ok(())
}

async fn insert_member_row(conn: &mut PgConnection, member: &NewMember) -> AppResult<Member> {
    let sql = format!(
        "INSERT INTO members (first_name, last_name, address, email, phone, identity_id) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
        MEMBER_COLUMNS
    );
    sqlx::query_as::<_, Member>(&sql)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.address)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(member.identity_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(write_error)
}

async fn insert_identity_row(conn: &mut PgConnection, identity: &NewIdentity) -> AppResult<Identity> {
    let sql = format!(
        "INSERT INTO identities (email, password_hash, roles) VALUES ($1, $2, $3) RETURNING {}",
        IDENTITY_COLUMNS
    );
    sqlx::query_as::<_, Identity>(&sql)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.roles)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match sql_state(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => {
                AppError::Conflict("An account with this email already exists".to_string())
            }
            _ => AppError::Database(e),
        })
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // AUTHORS / PUBLISHERS / CATEGORIES
    // =========================================================================

    async fn authors(&self, select: Select) -> AppResult<Vec<Author>> {
        self.select_rows(AUTHOR_COLUMNS, "authors", select).await
    }

    async fn insert_author(&self, author: NewAuthor) -> AppResult<Author> {
        let sql = format!(
            "INSERT INTO authors (first_name, last_name) VALUES ($1, $2) RETURNING {}",
            AUTHOR_COLUMNS
        );
        sqlx::query_as::<_, Author>(&sql)
            .bind(&author.first_name)
            .bind(&author.last_name)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error)
    }

    async fn update_author(&self, author: &Author) -> AppResult<Author> {
        let sql = format!(
            "UPDATE authors SET first_name = $1, last_name = $2, version = version + 1 \
             WHERE id = $3 AND version = $4 RETURNING {}",
            AUTHOR_COLUMNS
        );
        sqlx::query_as::<_, Author>(&sql)
            .bind(&author.first_name)
            .bind(&author.last_name)
            .bind(author.id)
            .bind(author.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?
            .ok_or_else(|| conflict("Author", author.id))
    }

    async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.delete_row("authors", "Author", id).await
    }

    async fn publishers(&self, select: Select) -> AppResult<Vec<Publisher>> {
        self.select_rows(PUBLISHER_COLUMNS, "publishers", select).await
    }

    async fn insert_publisher(&self, publisher: NewPublisher) -> AppResult<Publisher> {
        let sql = format!(
            "INSERT INTO publishers (publisher_name) VALUES ($1) RETURNING {}",
            PUBLISHER_COLUMNS
        );
        sqlx::query_as::<_, Publisher>(&sql)
            .bind(&publisher.publisher_name)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error)
    }

    async fn update_publisher(&self, publisher: &Publisher) -> AppResult<Publisher> {
        let sql = format!(
            "UPDATE publishers SET publisher_name = $1, version = version + 1 \
             WHERE id = $2 AND version = $3 RETURNING {}",
            PUBLISHER_COLUMNS
        );
        sqlx::query_as::<_, Publisher>(&sql)
            .bind(&publisher.publisher_name)
            .bind(publisher.id)
            .bind(publisher.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?
            .ok_or_else(|| conflict("Publisher", publisher.id))
    }

    async fn delete_publisher(&self, id: i32) -> AppResult<()> {
        self.delete_row("publishers", "Publisher", id).await
    }

    async fn categories(&self, select: Select) -> AppResult<Vec<Category>> {
        self.select_rows(CATEGORY_COLUMNS, "categories", select).await
    }

    async fn insert_category(&self, category: NewCategory) -> AppResult<Category> {
        let sql = format!(
            "INSERT INTO categories (category_name) VALUES ($1) RETURNING {}",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(&category.category_name)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error)
    }

    async fn update_category(&self, category: &Category) -> AppResult<Category> {
        let sql = format!(
            "UPDATE categories SET category_name = $1, version = version + 1 \
             WHERE id = $2 AND version = $3 RETURNING {}",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(&category.category_name)
            .bind(category.id)
            .bind(category.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?
            .ok_or_else(|| conflict("Category", category.id))
    }

    async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.delete_row("categories", "Category", id).await
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    async fn books(&self, select: BookSelect) -> AppResult<Vec<Book>> {
        let (column, ids) = match select {
            BookSelect::All => {
                let sql = format!("SELECT {} FROM books ORDER BY id", BOOK_COLUMNS);
                return Ok(sqlx::query_as::<_, Book>(&sql).fetch_all(&self.pool).await?);
            }
            BookSelect::Ids(ids) => ("id", ids),
            BookSelect::Authors(ids) => ("author_id", ids),
            BookSelect::Publishers(ids) => ("publisher_id", ids),
            BookSelect::Query(query) => {
                let sort = match query.sort {
                    SortKey::Title => "lower(b.title)",
                    SortKey::Author => "lower(a.first_name || ' ' || a.last_name)",
                };
                let sql = format!(
                    r#"
                    SELECT b.id, b.title, b.price, b.publishing_date,
                           b.author_id, b.publisher_id, b.version
                    FROM books b
                    JOIN authors a ON a.id = b.author_id
                    WHERE $1::text IS NULL
                       OR strpos(lower(b.title), lower($1)) > 0
                       OR strpos(lower(a.first_name || ' ' || a.last_name), lower($1)) > 0
                    ORDER BY {} COLLATE "C", b.id
                    "#,
                    sort
                );
                let books = sqlx::query_as::<_, Book>(&sql)
                    .bind(query.search_text)
                    .fetch_all(&self.pool)
                    .await?;
                return Ok(books);
            }
        };

        let sql = format!(
            "SELECT {} FROM books WHERE {} = ANY($1) ORDER BY id",
            BOOK_COLUMNS, column
        );
        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn insert_book(&self, book: NewBook, category_ids: Vec<i32>) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO books (title, price, publishing_date, author_id, publisher_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            BOOK_COLUMNS
        );
        let created = sqlx::query_as::<_, Book>(&sql)
            .bind(&book.title)
            .bind(book.price)
            .bind(book.publishing_date)
            .bind(book.author_id)
            .bind(book.publisher_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error)?;

        let links = LinkChange::between(&[], &category_ids);
        apply_links(&mut tx, created.id, &links).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_book(&self, book: &Book, links: LinkChange) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE books SET title = $1, price = $2, publishing_date = $3, author_id = $4, \
             publisher_id = $5, version = version + 1 \
             WHERE id = $6 AND version = $7 RETURNING {}",
            BOOK_COLUMNS
        );
        let updated = sqlx::query_as::<_, Book>(&sql)
            .bind(&book.title)
            .bind(book.price)
            .bind(book.publishing_date)
            .bind(book.author_id)
            .bind(book.publisher_id)
            .bind(book.id)
            .bind(book.version)
            .fetch_optional(&mut *tx)
            .await
            .map_err(write_error)?
            .ok_or_else(|| conflict("Book", book.id))?;

        apply_links(&mut tx, book.id, &links).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.delete_row("books", "Book", id).await
    }

    async fn book_categories(&self, select: LinkSelect) -> AppResult<Vec<BookCategory>> {
        let (column, ids) = match select {
            LinkSelect::Books(ids) => ("book_id", ids),
            LinkSelect::Categories(ids) => ("category_id", ids),
        };
        let sql = format!(
            "SELECT id, book_id, category_id FROM book_categories WHERE {} = ANY($1) ORDER BY id",
            column
        );
        let links = sqlx::query_as::<_, BookCategory>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(links)
    }

    async fn apply_book_categories(&self, book_id: i32, links: LinkChange) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(not_found("Book", book_id));
        }

        apply_links(&mut tx, book_id, &links).await?;
        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // MEMBERS / BORROWINGS
    // =========================================================================

    async fn members(&self, select: MemberSelect) -> AppResult<Vec<Member>> {
        match select {
            MemberSelect::All => self.select_rows(MEMBER_COLUMNS, "members", Select::All).await,
            MemberSelect::Ids(ids) => {
                self.select_rows(MEMBER_COLUMNS, "members", Select::Ids(ids)).await
            }
            MemberSelect::Identity(identity_id) => {
                let sql = format!(
                    "SELECT {} FROM members WHERE identity_id = $1 ORDER BY id",
                    MEMBER_COLUMNS
                );
                let members = sqlx::query_as::<_, Member>(&sql)
                    .bind(identity_id)
                    .fetch_all(&self.pool)
                    .await?;
                Ok(members)
            }
        }
    }

    async fn insert_member(&self, member: NewMember) -> AppResult<Member> {
        let mut conn = self.pool.acquire().await?;
        insert_member_row(&mut conn, &member).await
    }

    async fn update_member(&self, member: &Member) -> AppResult<Member> {
        let sql = format!(
            "UPDATE members SET first_name = $1, last_name = $2, address = $3, phone = $4, \
             version = version + 1 WHERE id = $5 AND version = $6 RETURNING {}",
            MEMBER_COLUMNS
        );
        sqlx::query_as::<_, Member>(&sql)
            .bind(&member.first_name)
            .bind(&member.last_name)
            .bind(&member.address)
            .bind(&member.phone)
            .bind(member.id)
            .bind(member.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?
            .ok_or_else(|| conflict("Member", member.id))
    }

    async fn delete_member(&self, id: i32) -> AppResult<()> {
        self.delete_row("members", "Member", id).await
    }

    async fn borrowings(&self, select: BorrowingSelect) -> AppResult<Vec<Borrowing>> {
        let (column, ids) = match select {
            BorrowingSelect::All => {
                let sql = format!("SELECT {} FROM borrowings ORDER BY id", BORROWING_COLUMNS);
                return Ok(sqlx::query_as::<_, Borrowing>(&sql)
                    .fetch_all(&self.pool)
                    .await?);
            }
            BorrowingSelect::Ids(ids) => ("id", ids),
            BorrowingSelect::Members(ids) => ("member_id", ids),
            BorrowingSelect::Books(ids) => ("book_id", ids),
        };
        let sql = format!(
            "SELECT {} FROM borrowings WHERE {} = ANY($1) ORDER BY id",
            BORROWING_COLUMNS, column
        );
        let borrowings = sqlx::query_as::<_, Borrowing>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(borrowings)
    }

    async fn insert_borrowing(&self, borrowing: NewBorrowing) -> AppResult<Borrowing> {
        let sql = format!(
            "INSERT INTO borrowings (member_id, book_id) VALUES ($1, $2) RETURNING {}",
            BORROWING_COLUMNS
        );
        sqlx::query_as::<_, Borrowing>(&sql)
            .bind(borrowing.member_id)
            .bind(borrowing.book_id)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error)
    }

    async fn update_borrowing(&self, borrowing: &Borrowing) -> AppResult<Borrowing> {
        let sql = format!(
            "UPDATE borrowings SET member_id = $1, book_id = $2, return_date = $3, \
             version = version + 1 WHERE id = $4 AND version = $5 RETURNING {}",
            BORROWING_COLUMNS
        );
        sqlx::query_as::<_, Borrowing>(&sql)
            .bind(borrowing.member_id)
            .bind(borrowing.book_id)
            .bind(borrowing.return_date)
            .bind(borrowing.id)
            .bind(borrowing.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?
            .ok_or_else(|| conflict("Borrowing", borrowing.id))
    }

    async fn delete_borrowing(&self, id: i32) -> AppResult<()> {
        self.delete_row("borrowings", "Borrowing", id).await
    }

    // =========================================================================
    // IDENTITIES
    // =========================================================================

    async fn identity_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        let sql = format!(
            "SELECT {} FROM identities WHERE lower(email) = lower($1)",
            IDENTITY_COLUMNS
        );
        let identity = sqlx::query_as::<_, Identity>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(identity)
    }

    async fn insert_identity(&self, identity: NewIdentity) -> AppResult<Identity> {
        let mut conn = self.pool.acquire().await?;
        insert_identity_row(&mut conn, &identity).await
    }

    async fn register_member(
        &self,
        identity: NewIdentity,
        member: NewMember,
    ) -> AppResult<(Identity, Member)> {
        let mut tx = self.pool.begin().await?;

        let identity = insert_identity_row(&mut tx, &identity).await?;
        let member = NewMember {
            identity_id: Some(identity.id),
            ..member
        };
        let member = insert_member_row(&mut tx, &member).await?;

        tx.commit().await?;
        Ok((identity, member))
    }
}
