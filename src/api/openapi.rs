//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, books, borrowings, categories, health, identity, members, publishers};

/// Registers the bearer scheme the page handlers refer to
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "1.0.0",
        description = "Library catalog: books, authors, publishers, categories, members and borrowings",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Identity
        identity::register,
        identity::login_page,
        identity::login,
        identity::manage,
        // Books
        books::index,
        books::details,
        books::create_form,
        books::create,
        books::edit_form,
        books::edit,
        books::delete_confirm,
        books::delete,
        books::assign_categories,
        // Categories
        categories::index,
        categories::details,
        categories::create,
        categories::edit,
        categories::delete,
        // Publishers
        publishers::index,
        publishers::details,
        publishers::create,
        publishers::edit,
        publishers::delete,
        // Authors
        authors::index,
        authors::details,
        authors::create,
        authors::edit,
        authors::delete,
        // Members
        members::index,
        members::details,
        members::create,
        members::edit,
        members::delete,
        // Borrowings
        borrowings::index,
        borrowings::details,
        borrowings::create,
        borrowings::return_book,
        borrowings::delete,
    ),
    components(
        schemas(
            // Catalog
            crate::models::Book,
            crate::models::BookCategory,
            crate::models::Author,
            crate::models::Publisher,
            crate::models::Category,
            crate::models::book::BookInput,
            crate::models::author::AuthorInput,
            crate::models::publisher::PublisherInput,
            crate::models::category::CategoryInput,
            crate::models::index::SortKey,
            crate::models::index::BookIndexData,
            crate::models::index::CategoryIndexData,
            crate::models::index::PublisherIndexData,
            crate::models::index::BookFormData,
            crate::models::index::AssignedCategoryData,
            books::AssignCategoriesRequest,
            // Members and borrowings
            crate::models::Member,
            crate::models::member::MemberInput,
            crate::models::Borrowing,
            crate::models::borrowing::BorrowRequest,
            crate::models::borrowing::ReturnRequest,
            // Identity
            crate::models::Identity,
            crate::models::identity::LoginRequest,
            crate::models::identity::RegisterRequest,
            crate::services::auth::LoginResponse,
            crate::services::auth::AccountProfile,
            identity::LoginPage,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "identity", description = "Registration and sign-in"),
        (name = "books", description = "Catalog browsing and book management"),
        (name = "categories", description = "Category management"),
        (name = "publishers", description = "Publisher management"),
        (name = "authors", description = "Author management"),
        (name = "members", description = "Member management"),
        (name = "borrowings", description = "Borrowing and returning books")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
