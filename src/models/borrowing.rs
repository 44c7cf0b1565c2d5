//! Borrowing model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{book::Book, member::Member};

/// A member holding (or having held) a book. `return_date == None` means the
/// book is still out.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct Borrowing {
    pub id: i32,
    pub member_id: i32,
    pub book_id: i32,
    pub return_date: Option<NaiveDate>,
    pub version: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<Book>,
}

impl Borrowing {
    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBorrowing {
    pub member_id: i32,
    pub book_id: i32,
}

/// Borrow request. Admins may name any member; everyone else borrows for
/// the member linked to their identity.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub member_id: Option<i32>,
}

/// Return request; the date defaults to today
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub return_date: Option<NaiveDate>,
}
