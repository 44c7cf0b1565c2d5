//! Include specifications: which relations the gateway attaches to loaded rows.
//!
//! A relation left out of the spec stays `None` on the returned entities; a
//! requested collection is always `Some`, possibly empty.

/// Relations of a book
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookInclude {
    pub author: bool,
    pub publisher: bool,
    pub categories: bool,
    pub borrowings: bool,
}

impl BookInclude {
    pub const NONE: Self = Self {
        author: false,
        publisher: false,
        categories: false,
        borrowings: false,
    };

    /// Author, publisher and categories: what the catalog listings display
    pub const CATALOG: Self = Self {
        author: true,
        publisher: true,
        categories: true,
        borrowings: false,
    };

    pub const fn with_author(self) -> Self {
        Self {
            author: true,
            ..self
        }
    }

    pub const fn with_publisher(self) -> Self {
        Self {
            publisher: true,
            ..self
        }
    }

    pub const fn with_categories(self) -> Self {
        Self {
            categories: true,
            ..self
        }
    }

    pub const fn with_borrowings(self) -> Self {
        Self {
            borrowings: true,
            ..self
        }
    }
}

/// Category → book_categories → books
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryInclude {
    pub books: Option<BookInclude>,
}

impl CategoryInclude {
    pub const NONE: Self = Self { books: None };

    pub const fn with_books(books: BookInclude) -> Self {
        Self { books: Some(books) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorInclude {
    pub books: Option<BookInclude>,
}

impl AuthorInclude {
    pub const NONE: Self = Self { books: None };

    pub const fn with_books(books: BookInclude) -> Self {
        Self { books: Some(books) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherInclude {
    pub books: Option<BookInclude>,
}

impl PublisherInclude {
    pub const NONE: Self = Self { books: None };

    pub const fn with_books(books: BookInclude) -> Self {
        Self { books: Some(books) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorrowingInclude {
    pub member: bool,
    pub book: Option<BookInclude>,
}

impl BorrowingInclude {
    pub const NONE: Self = Self {
        member: false,
        book: None,
    };

    pub const fn with_member(self) -> Self {
        Self {
            member: true,
            ..self
        }
    }

    pub const fn with_book(self, book: BookInclude) -> Self {
        Self {
            book: Some(book),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberInclude {
    pub borrowings: Option<BorrowingInclude>,
}

impl MemberInclude {
    pub const NONE: Self = Self { borrowings: None };

    pub const fn with_borrowings(borrowings: BorrowingInclude) -> Self {
        Self {
            borrowings: Some(borrowings),
        }
    }
}
