//! API integration tests
//!
//! Drive the full router (authorization gate included) in-process against the
//! in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{
    api,
    config::{AppConfig, AuthConfig, StorageBackend},
    repository::Repository,
    services::Services,
    AppState,
};

const ADMIN_EMAIL: &str = "admin@bookshelf.test";
const ADMIN_PASSWORD: &str = "admin-password";

async fn test_app() -> Router {
    let mut config = AppConfig::default();
    config.database.backend = StorageBackend::Memory;
    config.auth = AuthConfig {
        jwt_secret: "integration-test-secret".to_string(),
        jwt_expiration_hours: 1,
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
    };

    let services = Services::new(Repository::in_memory(), config.auth.clone());
    services.auth.ensure_admin().await.unwrap();

    api::create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/Identity/Account/Login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &Router) -> String {
    login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// Register a member account and return its token
async fn member_token(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/Identity/Account/Register",
        None,
        Some(json!({
            "email": email,
            "password": "secret-password",
            "first_name": "Maria",
            "last_name": "Popescu",
            "address": "Strada Lunga 1",
            "phone": "0722-123-123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn create(app: &Router, token: &str, uri: &str, body: Value) -> Value {
    let (status, body) = send(app, Method::POST, uri, Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create at {} failed: {}", uri, body);
    body
}

/// Seed two authors, a publisher and three books; returns the book ids
async fn seed_catalog(app: &Router, token: &str) -> Vec<i64> {
    let tolkien = create(
        app,
        token,
        "/Authors/Create",
        json!({ "first_name": "John", "last_name": "Tolkien" }),
    )
    .await;
    let herbert = create(
        app,
        token,
        "/Authors/Create",
        json!({ "first_name": "Frank", "last_name": "Herbert" }),
    )
    .await;
    let publisher = create(
        app,
        token,
        "/Publishers/Create",
        json!({ "publisher_name": "Allen & Unwin" }),
    )
    .await;

    let mut ids = Vec::new();
    for (title, author) in [
        ("The Hobbit", &tolkien),
        ("Dune", &herbert),
        ("The Silmarillion", &tolkien),
    ] {
        let book = create(
            app,
            token,
            "/Books/Create",
            json!({
                "title": title,
                "price": "12.50",
                "publishing_date": "1960-01-01",
                "author_id": author["id"],
                "publisher_id": publisher["id"]
            }),
        )
        .await;
        ids.push(book["id"].as_i64().unwrap());
    }
    ids
}

fn titles(body: &Value) -> Vec<String> {
    body["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_catalog_is_public() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/Books/Index", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["books"].as_array().unwrap().is_empty());
    assert_eq!(body["sort_key"], "title");
}

#[tokio::test]
async fn test_anonymous_admin_page_redirects_to_login() {
    let app = test_app().await;

    let request = Request::builder()
        .uri("/Members/Index")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert_eq!(location, "/Identity/Account/Login?ReturnUrl=/Members/Index");
}

#[tokio::test]
async fn test_invalid_token_counts_as_anonymous() {
    let app = test_app().await;

    let request = Request::builder()
        .uri("/Books/Create")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_admin_pages_require_admin_role() {
    let app = test_app().await;
    let member = member_token(&app, "maria@bookshelf.test").await;
    let admin = admin_token(&app).await;

    let (status, body) = send(&app, Method::GET, "/Members/Index", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, body) = send(&app, Method::GET, "/Members/Index", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let members = body.as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["email"], "maria@bookshelf.test");
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/Identity/Account/Login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
async fn test_register_twice_is_rejected() {
    let app = test_app().await;
    member_token(&app, "twice@bookshelf.test").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/Identity/Account/Register",
        None,
        Some(json!({
            "email": "twice@bookshelf.test",
            "password": "secret-password",
            "first_name": "Maria",
            "last_name": "Popescu",
            "phone": "0722 123 123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_manage_shows_member_profile() {
    let app = test_app().await;
    let token = member_token(&app, "profile@bookshelf.test").await;

    let (status, body) = send(&app, Method::GET, "/Identity/Account/Manage", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"]["email"], "profile@bookshelf.test");
    assert_eq!(body["member"]["full_name"], "Maria Popescu");
    assert!(body["identity"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_book_search_and_sort() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    seed_catalog(&app, &admin).await;

    let (status, body) = send(&app, Method::GET, "/Books/Index", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Dune", "The Hobbit", "The Silmarillion"]);

    // Matches on the author's full name, case-insensitively
    let (_, body) = send(&app, Method::GET, "/Books/Index?searchText=TOLKIEN", None, None).await;
    assert_eq!(titles(&body), vec!["The Hobbit", "The Silmarillion"]);
    assert_eq!(body["search_text"], "TOLKIEN");

    let (_, body) = send(&app, Method::GET, "/Books/Index?sortKey=author", None, None).await;
    assert_eq!(titles(&body), vec!["Dune", "The Hobbit", "The Silmarillion"]);
    assert_eq!(body["books"][0]["author"]["last_name"], "Herbert");

    let (_, body) = send(&app, Method::GET, "/Books/Index?searchText=nothing", None, None).await;
    assert!(titles(&body).is_empty());
}

#[tokio::test]
async fn test_book_validation_errors_are_reported_per_field() {
    let app = test_app().await;
    let admin = admin_token(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/Books/Create",
        Some(&admin),
        Some(json!({
            "title": "ab",
            "price": "0",
            "publishing_date": "2000-01-01",
            "author_id": 99,
            "publisher_id": 99
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = &body["fields"];
    assert!(fields["title"].is_string());
    assert!(fields["price"].is_string());
    assert!(fields["author_id"].is_string());
    assert!(fields["publisher_id"].is_string());
}

#[tokio::test]
async fn test_assign_categories_replaces_selection() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let books = seed_catalog(&app, &admin).await;

    let fantasy = create(&app, &admin, "/Categories/Create", json!({ "category_name": "Fantasy" })).await;
    let classic = create(&app, &admin, "/Categories/Create", json!({ "category_name": "Classic" })).await;
    let hobbit = books[0];

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Books/AssignCategories?id={}", hobbit),
        Some(&admin),
        Some(json!({ "selected_categories": [fantasy["id"], classic["id"]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"].as_array().unwrap().len(), 2);

    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/Books/AssignCategories?id={}", hobbit),
        Some(&admin),
        Some(json!({ "selected_categories": [classic["id"]] })),
    )
    .await;
    let categories = body["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["category_name"], "Classic");

    // The category page lists the books of the selected category
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/Categories/Index?id={}", fantasy["id"]),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["books"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_edit_is_a_concurrency_conflict() {
    let app = test_app().await;
    let admin = admin_token(&app).await;

    let category = create(&app, &admin, "/Categories/Create", json!({ "category_name": "Poetry" })).await;
    let id = category["id"].as_i64().unwrap();
    let version = category["version"].clone();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Categories/Edit?id={}", id),
        Some(&admin),
        Some(json!({ "category_name": "Verse", "version": version })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category_name"], "Verse");

    // Second editor still holds the original version
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Categories/Edit?id={}", id),
        Some(&admin),
        Some(json!({ "category_name": "Lyrics", "version": version })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ConcurrencyConflict");
}

#[tokio::test]
async fn test_member_phone_validation() {
    let app = test_app().await;
    let admin = admin_token(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/Members/Create",
        Some(&admin),
        Some(json!({
            "first_name": "Ion",
            "last_name": "Ionescu",
            "email": "ion@bookshelf.test",
            "phone": "12345"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["phone"].is_string());
    assert!(body["fields"].get("first_name").is_none());
}

#[tokio::test]
async fn test_member_email_cannot_change() {
    let app = test_app().await;
    let admin = admin_token(&app).await;

    let member = create(
        &app,
        &admin,
        "/Members/Create",
        json!({
            "first_name": "Ion",
            "last_name": "Ionescu",
            "email": "ion@bookshelf.test",
            "phone": "0722.123.123"
        }),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Members/Edit?id={}", member["id"]),
        Some(&admin),
        Some(json!({
            "first_name": "Ion",
            "last_name": "Ionescu",
            "email": "other@bookshelf.test",
            "phone": "0722.123.123",
            "version": member["version"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["email"].is_string());
}

#[tokio::test]
async fn test_borrow_and_return() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let books = seed_catalog(&app, &admin).await;
    let member = member_token(&app, "reader@bookshelf.test").await;

    let (status, borrowing) = send(
        &app,
        Method::POST,
        &format!("/Borrowings/Create?bookID={}", books[1]),
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(borrowing["return_date"].is_null());
    let id = borrowing["id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::GET, "/Borrowings/Index", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["book"]["title"], "Dune");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Borrowings/Return?id={}", id),
        Some(&member),
        Some(json!({ "return_date": "2024-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["return_date"], "2024-06-01");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Borrowings/Return?id={}", id),
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyReturned");
}

#[tokio::test]
async fn test_members_only_see_their_own_borrowings() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let books = seed_catalog(&app, &admin).await;
    let first = member_token(&app, "first@bookshelf.test").await;
    let second = member_token(&app, "second@bookshelf.test").await;

    let (_, borrowing) = send(
        &app,
        Method::POST,
        &format!("/Borrowings/Create?bookID={}", books[0]),
        Some(&first),
        None,
    )
    .await;
    let uri = format!("/Borrowings/Details?id={}", borrowing["id"]);

    let (status, _) = send(&app, Method::GET, &uri, Some(&second), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, "/Borrowings/Index", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member"]["email"], "first@bookshelf.test");
}

#[tokio::test]
async fn test_missing_id_is_not_found() {
    let app = test_app().await;
    let admin = admin_token(&app).await;

    let (status, body) = send(&app, Method::GET, "/Books/Details", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchData");

    let (status, _) = send(&app, Method::GET, "/Authors/Details?id=42", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_publisher_with_books_cannot_be_deleted() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    seed_catalog(&app, &admin).await;

    let (_, publishers) = send(&app, Method::GET, "/Publishers/Index", Some(&admin), None).await;
    let id = publishers["publishers"][0]["id"].clone();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Publishers/Delete?id={}", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Referenced");
}

#[tokio::test]
async fn test_malformed_return_date_is_rejected() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let books = seed_catalog(&app, &admin).await;
    let member = member_token(&app, "dates@bookshelf.test").await;

    let (_, borrowing) = send(
        &app,
        Method::POST,
        &format!("/Borrowings/Create?bookID={}", books[0]),
        Some(&member),
        None,
    )
    .await;
    let uri = format!("/Borrowings/Return?id={}", borrowing["id"]);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&member),
        Some(json!({ "return_date": "01/06/2024" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    // The borrowing is still open
    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/Borrowings/Details?id={}", borrowing["id"]),
        Some(&member),
        None,
    )
    .await;
    assert!(body["return_date"].is_null());
}

#[tokio::test]
async fn test_malformed_borrow_body_is_rejected() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let books = seed_catalog(&app, &admin).await;
    member_token(&app, "target@bookshelf.test").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/Borrowings/Create?bookID={}", books[0]),
        Some(&admin),
        Some(json!({ "member_id": "first" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (_, body) = send(&app, Method::GET, "/Borrowings/Index", Some(&admin), None).await;
    assert!(body.as_array().unwrap().is_empty());
}
