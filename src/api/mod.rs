//! HTTP handlers for the Bookshelf pages

pub mod authors;
pub mod books;
pub mod borrowings;
pub mod categories;
pub mod gate;
pub mod health;
pub mod identity;
pub mod members;
pub mod openapi;
pub mod publishers;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    middleware,
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::IntoParams;

use crate::{error::AppError, models::UserClaims, AppState};

/// Extractor for the caller's claims, as validated by the authorization gate
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserClaims>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| AppError::Authentication("Sign in to continue".to_string()))
    }
}

/// JSON body that may be left out entirely. An empty body yields `None`; anything
/// else must parse, or the request fails with 400.
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }

        serde_json::from_slice(&bytes)
            .map(|value| OptionalJson(Some(value)))
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
    }
}

/// `?id=` of the Details/Edit/Delete pages
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    /// Record id; a missing id is reported as not found
    pub id: Option<i32>,
}

impl IdQuery {
    pub fn require(&self, entity: &str) -> Result<i32, AppError> {
        self.id
            .ok_or_else(|| AppError::NotFound(format!("No {} id was given", entity)))
    }
}

/// Create the page router; every matched route passes the authorization gate first
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Books
        .route("/Books/Index", get(books::index))
        .route("/Books/Details", get(books::details))
        .route("/Books/Create", get(books::create_form).post(books::create))
        .route("/Books/Edit", get(books::edit_form).post(books::edit))
        .route("/Books/Delete", get(books::delete_confirm).post(books::delete))
        .route("/Books/AssignCategories", post(books::assign_categories))
        // Categories
        .route("/Categories/Index", get(categories::index))
        .route("/Categories/Details", get(categories::details))
        .route("/Categories/Create", post(categories::create))
        .route("/Categories/Edit", get(categories::details).post(categories::edit))
        .route("/Categories/Delete", get(categories::details).post(categories::delete))
        // Publishers
        .route("/Publishers/Index", get(publishers::index))
        .route("/Publishers/Details", get(publishers::details))
        .route("/Publishers/Create", post(publishers::create))
        .route("/Publishers/Edit", get(publishers::details).post(publishers::edit))
        .route("/Publishers/Delete", get(publishers::details).post(publishers::delete))
        // Authors
        .route("/Authors/Index", get(authors::index))
        .route("/Authors/Details", get(authors::details))
        .route("/Authors/Create", post(authors::create))
        .route("/Authors/Edit", get(authors::details).post(authors::edit))
        .route("/Authors/Delete", get(authors::details).post(authors::delete))
        // Members
        .route("/Members/Index", get(members::index))
        .route("/Members/Details", get(members::details))
        .route("/Members/Create", post(members::create))
        .route("/Members/Edit", get(members::details).post(members::edit))
        .route("/Members/Delete", get(members::details).post(members::delete))
        // Borrowings
        .route("/Borrowings/Index", get(borrowings::index))
        .route("/Borrowings/Details", get(borrowings::details))
        .route("/Borrowings/Create", post(borrowings::create))
        .route("/Borrowings/Return", post(borrowings::return_book))
        .route("/Borrowings/Delete", get(borrowings::details).post(borrowings::delete))
        // Identity
        .route("/Identity/Account/Register", post(identity::register))
        .route("/Identity/Account/Login", get(identity::login_page).post(identity::login))
        .route("/Identity/Account/Manage", get(identity::manage))
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::authorize))
        .with_state(state)
        .merge(openapi::create_openapi_router())
}
