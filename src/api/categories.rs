//! Category pages (administrators)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{category::CategoryInput, index::CategoryIndexData, Category},
    AppState,
};

use super::IdQuery;

/// Every category with its books; `id` selects one whose books are listed in full
#[utoipa::path(
    get,
    path = "/Categories/Index",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Categories sorted by name", body = CategoryIndexData),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Selected category not found")
    )
)]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<CategoryIndexData>> {
    Ok(Json(state.services.catalog.category_index(query.id).await?))
}

#[utoipa::path(
    get,
    path = "/Categories/Details",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Category with its books", body = Category),
        (status = 404, description = "Category not found")
    )
)]
pub async fn details(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Category>> {
    let category = state.services.categories.get(query.require("category")?).await?;
    Ok(Json(category))
}

#[utoipa::path(
    post,
    path = "/Categories/Create",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = state.services.categories.create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    post,
    path = "/Categories/Edit",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(IdQuery),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 409, description = "Edited concurrently", body = crate::error::ErrorResponse)
    )
)]
pub async fn edit(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    let id = query.require("category")?;
    Ok(Json(state.services.categories.update(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/Categories/Delete",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 204, description = "Category and its book links deleted"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<StatusCode> {
    state.services.categories.delete(query.require("category")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
