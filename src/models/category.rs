//! Category model

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::Book;
use crate::validation::{Check, FieldRule, FieldValue, Validated};

/// Category row. `books` is filled only when the include spec reaches through
/// the book_categories junction.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i32,
    pub category_name: String,
    pub version: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Book>>,
}

/// Create/edit category request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryInput {
    pub category_name: String,
    pub version: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub category_name: String,
}

impl From<CategoryInput> for NewCategory {
    fn from(input: CategoryInput) -> Self {
        Self {
            category_name: input.category_name.trim().to_string(),
        }
    }
}

static CATEGORY_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new(
            "category_name",
            Check::Required,
            "The Category Name field is required.",
        ),
        FieldRule::new(
            "category_name",
            Check::Length { min: 1, max: 100 },
            "The Category Name cannot exceed 100 characters.",
        ),
    ]
});

impl Validated for CategoryInput {
    fn rules() -> &'static [FieldRule] {
        &CATEGORY_RULES
    }

    fn value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "category_name" => FieldValue::Text(Some(&self.category_name)),
            _ => FieldValue::Text(None),
        }
    }
}
