//! Borrowing service: members taking books out and bringing them back

use chrono::NaiveDate;

use crate::{
    error::{AppError, AppResult},
    models::{borrowing::NewBorrowing, Borrowing, UserClaims},
    repository::{BookInclude, BorrowingInclude, BorrowingSelect, MemberInclude, Repository},
};

/// Member and book (with its author): what the borrowing pages display
const DISPLAY: BorrowingInclude = BorrowingInclude::NONE
    .with_member()
    .with_book(BookInclude::NONE.with_author());

#[derive(Clone)]
pub struct BorrowingsService {
    repository: Repository,
}

impl BorrowingsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Open a borrowing. There is no cap on how many books a member holds, and
    /// the same book may be borrowed again before it comes back.
    pub async fn borrow(&self, member_id: i32, book_id: i32) -> AppResult<Borrowing> {
        self.repository.members_find(member_id, MemberInclude::NONE).await?;
        self.repository.books_find(book_id, BookInclude::NONE).await?;

        let borrowing = self
            .repository
            .insert_borrowing(NewBorrowing { member_id, book_id })
            .await?;
        tracing::info!(
            "Book {} borrowed by member {}: borrowing id={}",
            book_id,
            member_id,
            borrowing.id
        );

        self.get(borrowing.id).await
    }

    pub async fn return_book(&self, borrowing_id: i32, return_date: NaiveDate) -> AppResult<Borrowing> {
        let mut borrowing = self
            .repository
            .borrowings_find(borrowing_id, BorrowingInclude::NONE)
            .await?;
        if borrowing.is_returned() {
            return Err(AppError::AlreadyReturned(borrowing_id));
        }

        borrowing.return_date = Some(return_date);
        self.repository.update_borrowing(&borrowing).await?;
        tracing::info!("Borrowing {} returned on {}", borrowing_id, return_date);

        self.get(borrowing_id).await
    }

    /// Every borrowing, newest first
    pub async fn list(&self) -> AppResult<Vec<Borrowing>> {
        let mut borrowings = self.repository.borrowings_list(DISPLAY).await?;
        borrowings.reverse();
        Ok(borrowings)
    }

    pub async fn list_for_member(&self, member_id: i32) -> AppResult<Vec<Borrowing>> {
        let mut borrowings = self
            .repository
            .borrowings_where(BorrowingSelect::Members(vec![member_id]), DISPLAY)
            .await?;
        borrowings.reverse();
        Ok(borrowings)
    }

    /// What the caller may see: everything for admins, their own borrowings otherwise
    pub async fn list_visible_to(&self, claims: &UserClaims) -> AppResult<Vec<Borrowing>> {
        if claims.is_admin() {
            return self.list().await;
        }
        match claims.member_id {
            Some(member_id) => self.list_for_member(member_id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get(&self, id: i32) -> AppResult<Borrowing> {
        self.repository.borrowings_find(id, DISPLAY).await
    }

    /// Borrowing `id`, provided the caller owns it or is an admin
    pub async fn get_visible_to(&self, id: i32, claims: &UserClaims) -> AppResult<Borrowing> {
        let borrowing = self.get(id).await?;
        if claims.is_admin() || claims.member_id == Some(borrowing.member_id) {
            Ok(borrowing)
        } else {
            Err(AppError::Authorization(
                "This borrowing belongs to another member".to_string(),
            ))
        }
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.delete_borrowing(id).await?;
        tracing::info!("Borrowing deleted: id={}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        author::NewAuthor, book::NewBook, member::NewMember, publisher::NewPublisher,
    };
    use crate::repository::MockStore;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    async fn seeded() -> (BorrowingsService, i32, i32) {
        let repository = Repository::in_memory();
        let author = repository
            .insert_author(NewAuthor {
                first_name: "Marin".into(),
                last_name: "Preda".into(),
            })
            .await
            .unwrap();
        let publisher = repository
            .insert_publisher(NewPublisher {
                publisher_name: "Cartea Romaneasca".into(),
            })
            .await
            .unwrap();
        let book = repository
            .insert_book(
                NewBook {
                    title: "Morometii".into(),
                    price: Decimal::new(3900, 2),
                    publishing_date: NaiveDate::from_ymd_opt(1955, 1, 1).unwrap(),
                    author_id: author.id,
                    publisher_id: publisher.id,
                },
                Vec::new(),
            )
            .await
            .unwrap();
        let member = repository
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
        (BorrowingsService::new(repository), member.id, book.id)
    }

    #[tokio::test]
    async fn borrow_then_return_once() {
        let (service, member_id, book_id) = seeded().await;

        let borrowing = service.borrow(member_id, book_id).await.unwrap();
        assert_eq!(borrowing.return_date, None);
        assert_eq!(borrowing.book.as_ref().map(|b| b.title.as_str()), Some("Morometii"));

        let today = Utc::now().date_naive();
        let returned = service.return_book(borrowing.id, today).await.unwrap();
        assert_eq!(returned.return_date, Some(today));

        assert!(matches!(
            service.return_book(borrowing.id, today).await,
            Err(AppError::AlreadyReturned(id)) if id == borrowing.id
        ));
    }

    #[tokio::test]
    async fn borrowing_needs_existing_member_and_book() {
        let (service, member_id, book_id) = seeded().await;
        assert!(matches!(
            service.borrow(member_id + 100, book_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.borrow(member_id, book_id + 100).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.return_book(555, Utc::now().date_naive()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn same_book_can_be_borrowed_twice() {
        let (service, member_id, book_id) = seeded().await;
        service.borrow(member_id, book_id).await.unwrap();
        service.borrow(member_id, book_id).await.unwrap();
        assert_eq!(service.list_for_member(member_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_member_short_circuits_before_insert() {
        let mut store = MockStore::new();
        store.expect_members().times(1).returning(|_| Ok(Vec::new()));
        store.expect_books().never();
        store.expect_insert_borrowing().never();

        let service = BorrowingsService::new(Repository::new(Arc::new(store)));
        assert!(matches!(
            service.borrow(1, 1).await,
            Err(AppError::NotFound(_))
        ));
    }
}
