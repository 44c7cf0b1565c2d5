//! Book model, the book/category junction, and book inputs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{author::Author, borrowing::Borrowing, category::Category, publisher::Publisher};
use crate::validation::{Check, FieldRule, FieldValue, Validated};

/// Book row. Relation fields stay `None` unless requested through a `BookInclude`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub price: Decimal,
    pub publishing_date: NaiveDate,
    pub author_id: i32,
    pub publisher_id: i32,
    pub version: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrowings: Option<Vec<Borrowing>>,
}

impl Book {
    /// Ids of the linked categories, when they were loaded
    pub fn category_ids(&self) -> Option<Vec<i32>> {
        self.categories
            .as_ref()
            .map(|categories| categories.iter().map(|c| c.id).collect())
    }
}

/// Order books by title, case-insensitively, ties by id
pub fn sort_by_title(books: &mut [Book]) {
    books.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then(a.id.cmp(&b.id))
    });
}

/// Junction row linking a book to a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct BookCategory {
    pub id: i32,
    pub book_id: i32,
    pub category_id: i32,
}

/// Create/edit book request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BookInput {
    pub title: String,
    pub price: Decimal,
    pub publishing_date: NaiveDate,
    pub author_id: i32,
    pub publisher_id: i32,
    /// Checked categories; on edit, `None` leaves the current assignment untouched
    pub selected_categories: Option<Vec<i32>>,
    /// Version read before editing; required on edit
    pub version: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub price: Decimal,
    pub publishing_date: NaiveDate,
    pub author_id: i32,
    pub publisher_id: i32,
}

impl From<&BookInput> for NewBook {
    fn from(input: &BookInput) -> Self {
        Self {
            title: input.title.trim().to_string(),
            price: input.price,
            publishing_date: input.publishing_date,
            author_id: input.author_id,
            publisher_id: input.publisher_id,
        }
    }
}

static BOOK_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new("title", Check::Required, "The Title field is required."),
        FieldRule::new(
            "title",
            Check::Length { min: 3, max: 150 },
            "The Title must be between 3 and 150 characters.",
        ),
        FieldRule::new(
            "price",
            Check::Range {
                min: Decimal::new(1, 2),
                max: Decimal::new(500, 0),
            },
            "The Price must be between 0.01 and 500.",
        ),
        FieldRule::new(
            "price",
            Check::Scale(2),
            "The Price can have at most 2 decimals.",
        ),
    ]
});

impl Validated for BookInput {
    fn rules() -> &'static [FieldRule] {
        &BOOK_RULES
    }

    fn value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "title" => FieldValue::Text(Some(self.title.trim())),
            "price" => FieldValue::Number(self.price),
            _ => FieldValue::Text(None),
        }
    }
}
