//! Account endpoints: registration, sign-in and the signed-in profile

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::identity::{LoginRequest, RegisterRequest},
    services::auth::{AccountProfile, LoginResponse},
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoginPageQuery {
    /// Page the caller was sent away from
    #[serde(rename = "ReturnUrl")]
    pub return_url: Option<String>,
}

/// What the login redirect lands on
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginPage {
    pub message: String,
    pub return_url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/Identity/Account/Register",
    tag = "identity",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account and member created, signed in", body = LoginResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    let response = state.services.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/Identity/Account/Login",
    tag = "identity",
    params(LoginPageQuery),
    responses(
        (status = 200, description = "Sign-in instructions", body = LoginPage)
    )
)]
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        message: "Sign in by posting email and password to /Identity/Account/Login".to_string(),
        return_url: query.return_url,
    })
}

#[utoipa::path(
    post,
    path = "/Identity/Account/Login",
    tag = "identity",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let response = state
        .services
        .auth
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/Identity/Account/Manage",
    tag = "identity",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Signed-in identity and member profile", body = AccountProfile),
        (status = 302, description = "Not signed in")
    )
)]
pub async fn manage(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AccountProfile>> {
    Ok(Json(state.services.auth.profile(&claims).await?))
}
