//! Bookshelf Library Catalog
//!
//! A Rust server for a small library: a public catalog of books with their
//! authors, publishers and categories, member accounts, and borrowings,
//! exposed as a JSON API with page-style routes.

use std::sync::Arc;

pub mod api;
pub mod authz;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod validation;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
