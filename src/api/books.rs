//! Book pages

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        book::BookInput,
        index::{BookFormData, BookIndexData, SortKey},
        Book,
    },
    AppState,
};

use super::IdQuery;

/// Book list criteria
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookIndexQuery {
    /// Fragment of the title or of the author's name
    #[serde(rename = "searchText")]
    pub search_text: Option<String>,
    /// `title` (default) or `author`
    #[serde(rename = "sortKey")]
    #[param(value_type = Option<String>)]
    pub sort_key: Option<SortKey>,
}

/// Category selection of one book
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignCategoriesRequest {
    pub selected_categories: Vec<i32>,
}

/// Catalog listing, open to everyone
#[utoipa::path(
    get,
    path = "/Books/Index",
    tag = "books",
    params(BookIndexQuery),
    responses(
        (status = 200, description = "Filtered and sorted books", body = BookIndexData)
    )
)]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<BookIndexQuery>,
) -> AppResult<Json<BookIndexData>> {
    let data = state
        .services
        .catalog
        .book_index(query.search_text.as_deref(), query.sort_key.unwrap_or_default())
        .await?;
    Ok(Json(data))
}

#[utoipa::path(
    get,
    path = "/Books/Details",
    tag = "books",
    params(IdQuery),
    responses(
        (status = 200, description = "Book with author, publisher and categories", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn details(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(query.require("book")?).await?;
    Ok(Json(book))
}

/// Choices for the create form
#[utoipa::path(
    get,
    path = "/Books/Create",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authors, publishers and categories", body = BookFormData),
        (status = 302, description = "Not signed in")
    )
)]
pub async fn create_form(State(state): State<AppState>) -> AppResult<Json<BookFormData>> {
    Ok(Json(state.services.catalog.book_form(None).await?))
}

#[utoipa::path(
    post,
    path = "/Books/Create",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<BookInput>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create_book(input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Edit form: the book plus every choice, its categories checked
#[utoipa::path(
    get,
    path = "/Books/Edit",
    tag = "books",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Book and form choices", body = BookFormData),
        (status = 404, description = "Book not found")
    )
)]
pub async fn edit_form(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<BookFormData>> {
    let id = query.require("book")?;
    Ok(Json(state.services.catalog.book_form(Some(id)).await?))
}

#[utoipa::path(
    post,
    path = "/Books/Edit",
    tag = "books",
    security(("bearer_auth" = [])),
    params(IdQuery),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse),
        (status = 409, description = "Edited concurrently", body = crate::error::ErrorResponse)
    )
)]
pub async fn edit(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(input): Json<BookInput>,
) -> AppResult<Json<Book>> {
    let id = query.require("book")?;
    Ok(Json(state.services.catalog.update_book(id, input).await?))
}

/// Delete confirmation
#[utoipa::path(
    get,
    path = "/Books/Delete",
    tag = "books",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Book to delete", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_confirm(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Book>> {
    details(State(state), Query(query)).await
}

#[utoipa::path(
    post,
    path = "/Books/Delete",
    tag = "books",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 204, description = "Book, its category links and borrowings deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(query.require("book")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the book's categories with the selection
#[utoipa::path(
    post,
    path = "/Books/AssignCategories",
    tag = "books",
    security(("bearer_auth" = [])),
    params(IdQuery),
    request_body = AssignCategoriesRequest,
    responses(
        (status = 200, description = "Book with its categories", body = Book),
        (status = 400, description = "Unknown category selected", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found"),
        (status = 500, description = "Assignment rolled back", body = crate::error::ErrorResponse)
    )
)]
pub async fn assign_categories(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(request): Json<AssignCategoriesRequest>,
) -> AppResult<Json<Book>> {
    let id = query.require("book")?;
    state
        .services
        .catalog
        .assign_categories(id, &request.selected_categories)
        .await?;
    Ok(Json(state.services.catalog.get_book(id).await?))
}
