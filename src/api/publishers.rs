//! Publisher pages (administrators)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{index::PublisherIndexData, publisher::PublisherInput, Publisher},
    AppState,
};

use super::IdQuery;

/// Publishers by name; `id` selects one whose books are listed
#[utoipa::path(
    get,
    path = "/Publishers/Index",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Publishers, with the selected one's books", body = PublisherIndexData),
        (status = 404, description = "Selected publisher not found")
    )
)]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<PublisherIndexData>> {
    Ok(Json(state.services.catalog.publisher_index(query.id).await?))
}

#[utoipa::path(
    get,
    path = "/Publishers/Details",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Publisher with its books", body = Publisher),
        (status = 404, description = "Publisher not found")
    )
)]
pub async fn details(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Publisher>> {
    let publisher = state.services.publishers.get(query.require("publisher")?).await?;
    Ok(Json(publisher))
}

#[utoipa::path(
    post,
    path = "/Publishers/Create",
    tag = "publishers",
    security(("bearer_auth" = [])),
    request_body = PublisherInput,
    responses(
        (status = 201, description = "Publisher created", body = Publisher),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<PublisherInput>,
) -> AppResult<(StatusCode, Json<Publisher>)> {
    let publisher = state.services.publishers.create(input).await?;
    Ok((StatusCode::CREATED, Json(publisher)))
}

#[utoipa::path(
    post,
    path = "/Publishers/Edit",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(IdQuery),
    request_body = PublisherInput,
    responses(
        (status = 200, description = "Publisher updated", body = Publisher),
        (status = 409, description = "Edited concurrently", body = crate::error::ErrorResponse)
    )
)]
pub async fn edit(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(input): Json<PublisherInput>,
) -> AppResult<Json<Publisher>> {
    let id = query.require("publisher")?;
    Ok(Json(state.services.publishers.update(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/Publishers/Delete",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 204, description = "Publisher deleted"),
        (status = 404, description = "Publisher not found"),
        (status = 409, description = "Publisher still has books", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<StatusCode> {
    state.services.publishers.delete(query.require("publisher")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
