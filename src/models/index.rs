//! Per-request view aggregations handed to the rendering layer

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{author::Author, book::Book, category::Category, publisher::Publisher};

/// Book list ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    #[serde(alias = "Title")]
    Title,
    #[serde(alias = "Author")]
    Author,
}

/// Book search criteria passed down to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    /// Case-insensitive fragment of the title or the author's full name
    pub search_text: Option<String>,
    pub sort: SortKey,
}

impl BookQuery {
    pub fn new(search_text: Option<&str>, sort: SortKey) -> Self {
        let search_text = search_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self { search_text, sort }
    }
}

/// Categories page: every category, plus the books of the selected one
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryIndexData {
    pub categories: Vec<Category>,
    pub selected_category_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Book>>,
}

/// Books page: the filtered, sorted listing and the criteria that produced it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookIndexData {
    pub books: Vec<Book>,
    pub search_text: Option<String>,
    pub sort_key: SortKey,
}

/// Publishers page: every publisher, plus the books of the selected one
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublisherIndexData {
    pub publishers: Vec<Publisher>,
    pub selected_publisher_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<Book>>,
}

/// One checkbox of the book form's category list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AssignedCategoryData {
    pub category_id: i32,
    pub category_name: String,
    pub assigned: bool,
}

/// Data backing the book create/edit forms
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookFormData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<Book>,
    pub authors: Vec<Author>,
    pub publishers: Vec<Publisher>,
    pub categories: Vec<AssignedCategoryData>,
}
