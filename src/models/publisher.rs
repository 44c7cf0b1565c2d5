//! Publisher model

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::Book;
use crate::validation::{Check, FieldRule, FieldValue, Validated};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct Publisher {
    pub id: i32,
    pub publisher_name: String,
    pub version: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Book>>,
}

/// Create/edit publisher request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublisherInput {
    pub publisher_name: String,
    pub version: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPublisher {
    pub publisher_name: String,
}

impl From<PublisherInput> for NewPublisher {
    fn from(input: PublisherInput) -> Self {
        Self {
            publisher_name: input.publisher_name.trim().to_string(),
        }
    }
}

static PUBLISHER_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new(
            "publisher_name",
            Check::Required,
            "The Publisher Name field is required.",
        ),
        FieldRule::new(
            "publisher_name",
            Check::Length { min: 1, max: 100 },
            "The Publisher Name cannot exceed 100 characters.",
        ),
    ]
});

impl Validated for PublisherInput {
    fn rules() -> &'static [FieldRule] {
        &PUBLISHER_RULES
    }

    fn value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "publisher_name" => FieldValue::Text(Some(&self.publisher_name)),
            _ => FieldValue::Text(None),
        }
    }
}
