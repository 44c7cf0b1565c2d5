//! Data models for Bookshelf

pub mod author;
pub mod book;
pub mod borrowing;
pub mod category;
pub mod identity;
pub mod index;
pub mod member;
pub mod publisher;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookCategory};
pub use borrowing::Borrowing;
pub use category::Category;
pub use identity::{Identity, UserClaims};
pub use member::Member;
pub use publisher::Publisher;
