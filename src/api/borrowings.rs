//! Borrowing pages

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::{BorrowRequest, ReturnRequest},
        Borrowing,
    },
    AppState,
};

use super::{AuthenticatedUser, IdQuery, OptionalJson};

/// `?bookID=` of the borrow action
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BorrowQuery {
    #[serde(rename = "bookID")]
    pub book_id: Option<i32>,
}

/// Admins see every borrowing, members only their own
#[utoipa::path(
    get,
    path = "/Borrowings/Index",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrowings, newest first", body = Vec<Borrowing>),
        (status = 302, description = "Not signed in")
    )
)]
pub async fn index(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Borrowing>>> {
    Ok(Json(state.services.borrowings.list_visible_to(&claims).await?))
}

#[utoipa::path(
    get,
    path = "/Borrowings/Details",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 200, description = "Borrowing with member and book", body = Borrowing),
        (status = 403, description = "Borrowing of another member"),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn details(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Borrowing>> {
    let id = query.require("borrowing")?;
    Ok(Json(state.services.borrowings.get_visible_to(id, &claims).await?))
}

/// Borrow a book; admins may borrow on behalf of any member
#[utoipa::path(
    post,
    path = "/Borrowings/Create",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    request_body(content = BorrowRequest, description = "Optional: member to borrow for (administrators only)"),
    responses(
        (status = 201, description = "Borrowing opened", body = Borrowing),
        (status = 400, description = "Malformed body", body = crate::error::ErrorResponse),
        (status = 403, description = "Borrowing for another member"),
        (status = 404, description = "Book or member not found")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
    OptionalJson(body): OptionalJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Borrowing>)> {
    let book_id = query
        .book_id
        .ok_or_else(|| AppError::NotFound("No book id was given".to_string()))?;
    let request = body.unwrap_or_default();
    let member_id = claims.acting_member(request.member_id)?;

    let borrowing = state.services.borrowings.borrow(member_id, book_id).await?;
    Ok((StatusCode::CREATED, Json(borrowing)))
}

/// Record the return of a borrowed book, today unless a date is given
#[utoipa::path(
    post,
    path = "/Borrowings/Return",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(IdQuery),
    request_body(content = ReturnRequest, description = "Optional return date"),
    responses(
        (status = 200, description = "Borrowing closed", body = Borrowing),
        (status = 400, description = "Malformed body", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrowing not found"),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<IdQuery>,
    OptionalJson(body): OptionalJson<ReturnRequest>,
) -> AppResult<Json<Borrowing>> {
    let id = query.require("borrowing")?;
    state.services.borrowings.get_visible_to(id, &claims).await?;

    let return_date = body
        .and_then(|r| r.return_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(
        state.services.borrowings.return_book(id, return_date).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/Borrowings/Delete",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(IdQuery),
    responses(
        (status = 204, description = "Borrowing deleted"),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<IdQuery>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.borrowings.delete(query.require("borrowing")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
