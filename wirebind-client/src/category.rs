//! Failure categories and the static tag → category table.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Semantic classification of a failure, independent of its concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// The server is rate limiting the caller.
    Throttling,
    /// The server failed (5xx).
    Server,
    /// Authentication or authorization failed.
    Auth,
    /// The request was rejected as invalid.
    Validation,
    /// The addressed resource does not exist.
    NotFound,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 5] = [
        Category::Throttling,
        Category::Server,
        Category::Auth,
        Category::Validation,
        Category::NotFound,
    ];

    fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Get the category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Throttling => "throttling",
            Category::Server => "server",
            Category::Auth => "auth",
            Category::Validation => "validation",
            Category::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of zero or more categories.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CategorySet(u8);

impl CategorySet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if the set contains a category.
    pub fn contains(&self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    /// Add a category.
    pub fn insert(&mut self, category: Category) {
        self.0 |= category.bit();
    }

    /// Return a set with the category added.
    pub fn with(mut self, category: Category) -> Self {
        self.insert(category);
        self
    }

    /// Union of two sets.
    pub fn union(self, other: CategorySet) -> Self {
        Self(self.0 | other.0)
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over the contained categories.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<T: IntoIterator<Item = Category>>(iter: T) -> Self {
        iter.into_iter()
            .fold(CategorySet::empty(), |set, c| set.with(c))
    }
}

impl<const N: usize> From<[Category; N]> for CategorySet {
    fn from(categories: [Category; N]) -> Self {
        categories.into_iter().collect()
    }
}

impl From<Category> for CategorySet {
    fn from(category: Category) -> Self {
        CategorySet::empty().with(category)
    }
}

impl std::fmt::Debug for CategorySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Standard failure tags.
pub mod tags {
    /// HTTP 429.
    pub const RATE_LIMIT: &str = "RateLimitError";
    /// HTTP 5xx.
    pub const SERVER: &str = "ServerError";
    /// HTTP 401.
    pub const AUTHENTICATION: &str = "AuthenticationError";
    /// HTTP 403.
    pub const AUTHORIZATION: &str = "AuthorizationError";
    /// HTTP 400 and 422.
    pub const VALIDATION: &str = "ValidationError";
    /// HTTP 404.
    pub const NOT_FOUND: &str = "NotFoundError";
    /// Any other HTTP error status.
    pub const UNKNOWN: &str = "UnknownError";
    /// The response body did not decode.
    pub const PARSE: &str = "ParseError";
    /// The network call did not complete.
    pub const TRANSPORT: &str = "TransportError";
    /// The input could not be rendered into a request.
    pub const REQUEST: &str = "RequestError";
}

/// Tag for an HTTP error status that matched no declared error shape.
pub fn tag_for_status(status: u16) -> &'static str {
    match status {
        401 => tags::AUTHENTICATION,
        403 => tags::AUTHORIZATION,
        404 => tags::NOT_FOUND,
        400 | 422 => tags::VALIDATION,
        429 => tags::RATE_LIMIT,
        500..=599 => tags::SERVER,
        _ => tags::UNKNOWN,
    }
}

static STANDARD: LazyLock<CategoryTable> = LazyLock::new(|| {
    CategoryTable::builder()
        .entry(tags::RATE_LIMIT, Category::Throttling)
        .entry(tags::SERVER, Category::Server)
        .entry(tags::AUTHENTICATION, Category::Auth)
        .entry(tags::AUTHORIZATION, Category::Auth)
        .entry(tags::VALIDATION, Category::Validation)
        .entry(tags::NOT_FOUND, Category::NotFound)
        .build()
});

/// Read-only mapping from failure tag to categories.
///
/// Tags absent from the table have no categories.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    entries: HashMap<Cow<'static, str>, CategorySet>,
}

impl CategoryTable {
    /// The table of standard tags.
    pub fn standard() -> &'static CategoryTable {
        &STANDARD
    }

    /// Start a new, empty table.
    pub fn builder() -> CategoryTableBuilder {
        CategoryTableBuilder::default()
    }

    /// Start a table pre-populated with the standard entries.
    pub fn extend_standard() -> CategoryTableBuilder {
        CategoryTableBuilder {
            table: STANDARD.clone(),
        }
    }

    /// Look up the categories of a tag.
    pub fn categories_of(&self, tag: &str) -> CategorySet {
        self.entries.get(tag).copied().unwrap_or_default()
    }

    /// Number of tags in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`CategoryTable`]. Entries for the same tag accumulate.
#[derive(Debug, Default)]
pub struct CategoryTableBuilder {
    table: CategoryTable,
}

impl CategoryTableBuilder {
    /// Associate a tag with one or more categories.
    pub fn entry(
        mut self,
        tag: impl Into<Cow<'static, str>>,
        categories: impl Into<CategorySet>,
    ) -> Self {
        let slot = self.table.entries.entry(tag.into()).or_default();
        *slot = slot.union(categories.into());
        self
    }

    /// Freeze the table.
    pub fn build(self) -> CategoryTable {
        self.table
    }
}
