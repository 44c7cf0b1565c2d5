//! Author pages (administrators)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{author::AuthorInput, Author},
    AppState,
};

use super::IdQuery;

#[utoipa::path(
    get,
    path = "/Authors/Index",
    tag = "authors",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authors by last name", body = Vec<Author>)
    )
)]
pub async fn index(State(state): State<AppState>) -> AppResult<Json<Vec<Author>>> {
    Ok(Json(state.services.authors.list().await?))
}

#[utoipa::path(
    get,
    path = "/Authors/Details",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Author with their books", body = Author),
        (status = 404, description = "Author not found")
    )
)]
pub async fn details(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Author>> {
    Ok(Json(state.services.authors.get(query.require("author")?).await?))
}

#[utoipa::path(
    post,
    path = "/Authors/Create",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = AuthorInput,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<AuthorInput>,
) -> AppResult<(StatusCode, Json<Author>)> {
    let author = state.services.authors.create(input).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[utoipa::path(
    post,
    path = "/Authors/Edit",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(IdQuery),
    request_body = AuthorInput,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 409, description = "Edited concurrently", body = crate::error::ErrorResponse)
    )
)]
pub async fn edit(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(input): Json<AuthorInput>,
) -> AppResult<Json<Author>> {
    let id = query.require("author")?;
    Ok(Json(state.services.authors.update(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/Authors/Delete",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 204, description = "Author deleted"),
        (status = 404, description = "Author not found"),
        (status = 409, description = "Author still has books", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<StatusCode> {
    state.services.authors.delete(query.require("author")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
