//! Member pages (administrators)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{member::MemberInput, Member},
    AppState,
};

use super::IdQuery;

#[utoipa::path(
    get,
    path = "/Members/Index",
    tag = "members",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Members by last name", body = Vec<Member>),
        (status = 302, description = "Not signed in"),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn index(State(state): State<AppState>) -> AppResult<Json<Vec<Member>>> {
    Ok(Json(state.services.members.list().await?))
}

#[utoipa::path(
    get,
    path = "/Members/Details",
    tag = "members",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Member with their borrowings", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn details(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Member>> {
    Ok(Json(state.services.members.get(query.require("member")?).await?))
}

#[utoipa::path(
    post,
    path = "/Members/Create",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = MemberInput,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<MemberInput>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let member = state.services.members.create(input).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Edit a member; the email recorded at creation cannot change
#[utoipa::path(
    post,
    path = "/Members/Edit",
    tag = "members",
    security(("bearer_auth" = [])),
    params(IdQuery),
    request_body = MemberInput,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 400, description = "Validation failed or email changed", body = crate::error::ErrorResponse),
        (status = 409, description = "Edited concurrently", body = crate::error::ErrorResponse)
    )
)]
pub async fn edit(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(input): Json<MemberInput>,
) -> AppResult<Json<Member>> {
    let id = query.require("member")?;
    Ok(Json(state.services.members.update(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/Members/Delete",
    tag = "members",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 204, description = "Member and their borrowings deleted"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<StatusCode> {
    state.services.members.delete(query.require("member")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
