//! Author model and related types

use once_cell::sync::Lazy;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::Book;
use crate::validation::{Check, FieldRule, FieldValue, Validated};

/// Author row, optionally carrying the books requested by an include spec
#[derive(Debug, Clone, PartialEq, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub version: i32,
    #[sqlx(skip)]
    pub books: Option<Vec<Book>>,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// Hand-written so that `full_name` is emitted without ever being stored.
impl Serialize for Author {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.books.is_some() { 6 } else { 5 };
        let mut state = serializer.serialize_struct("Author", len)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("first_name", &self.first_name)?;
        state.serialize_field("last_name", &self.last_name)?;
        state.serialize_field("full_name", &self.full_name())?;
        state.serialize_field("version", &self.version)?;
        if let Some(ref books) = self.books {
            state.serialize_field("books", books)?;
        }
        state.end()
    }
}

/// Create/edit author request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AuthorInput {
    pub first_name: String,
    pub last_name: String,
    /// Version read before editing; required on edit
    pub version: Option<i32>,
}

/// Author insert payload
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuthor {
    pub first_name: String,
    pub last_name: String,
}

impl From<AuthorInput> for NewAuthor {
    fn from(input: AuthorInput) -> Self {
        Self {
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
        }
    }
}

static AUTHOR_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule::new("first_name", Check::Required, "The First Name field is required."),
        FieldRule::new(
            "first_name",
            Check::Length { min: 1, max: 50 },
            "The First Name cannot exceed 50 characters.",
        ),
        FieldRule::new("last_name", Check::Required, "The Last Name field is required."),
        FieldRule::new(
            "last_name",
            Check::Length { min: 1, max: 50 },
            "The Last Name cannot exceed 50 characters.",
        ),
    ]
});

impl Validated for AuthorInput {
    fn rules() -> &'static [FieldRule] {
        &AUTHOR_RULES
    }

    fn value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "first_name" => FieldValue::Text(Some(&self.first_name)),
            "last_name" => FieldValue::Text(Some(&self.last_name)),
            _ => FieldValue::Text(None),
        }
    }
}
