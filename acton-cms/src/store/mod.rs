//! Store interfaces
//!
//! Content, templates, settings and theme rows are owned by external
//! collaborators. These traits are the only way the core reaches them.
//! In-memory implementations back tests and seeded demo sites. Theme rows
//! and settings also have SQLite implementations sharing one database, so
//! the CLI and a running server agree on both.

mod memory;
mod sql;
mod sql_settings;

pub use memory::{ContentSeed, MemoryContentStore, MemorySettingsStore, MemoryThemeStore, TermLink};
pub use sql::SqlThemeStore;
pub use sql_settings::SqlSettingsStore;

use crate::error::StoreError;
use crate::model::{Content, Menu, Page, Pagination, PostType, TaxonomyTerm, Template};
use crate::theme::Theme;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Content lookup capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Find an entry by slug
    ///
    /// `post_type_id = None` searches page-like (root) post types only.
    async fn find_by_slug_and_type(
        &self,
        slug: &str,
        post_type_id: Option<i64>,
    ) -> StoreResult<Option<Content>>;

    /// Find a post type by route prefix or slug
    async fn find_post_type(&self, route_prefix_or_slug: &str) -> StoreResult<Option<PostType>>;

    /// Post type by id
    async fn post_type(&self, id: i64) -> StoreResult<Option<PostType>>;

    /// All post types ordered by id
    async fn post_types(&self) -> StoreResult<Vec<PostType>>;

    /// Visible entries, newest first
    ///
    /// `post_type_id = None` lists every public post type.
    async fn published_content(
        &self,
        post_type_id: Option<i64>,
        pagination: Pagination,
    ) -> StoreResult<Page<Content>>;

    /// Every visible entry of a post type, newest first
    async fn all_published(&self, post_type_id: i64) -> StoreResult<Vec<Content>>;

    /// Visible entries whose title, excerpt or body contains `query`
    async fn search(&self, query: &str, pagination: Pagination) -> StoreResult<Page<Content>>;

    /// Terms attached to an entry
    async fn terms_for(&self, content_id: i64) -> StoreResult<Vec<TaxonomyTerm>>;

    /// Every public term
    async fn public_terms(&self) -> StoreResult<Vec<TaxonomyTerm>>;

    /// Navigation menus
    async fn menus(&self) -> StoreResult<Vec<Menu>>;

    /// Increment and return the view counter
    async fn increment_view_count(&self, content_id: i64) -> StoreResult<u64>;

    /// Create (id 0) or update a post type
    async fn save_post_type(&self, post_type: PostType) -> StoreResult<PostType>;

    /// Delete a post type, returning whether it existed
    async fn delete_post_type(&self, id: i64) -> StoreResult<bool>;
}

/// Stored template rows
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Template by id
    async fn template(&self, id: i64) -> StoreResult<Option<Template>>;

    /// Every template row
    async fn templates(&self) -> StoreResult<Vec<Template>>;

    /// Active row overriding a logical name
    async fn active_template(&self, slug: &str) -> StoreResult<Option<Template>> {
        Ok(self
            .templates()
            .await?
            .into_iter()
            .find(|template| template.is_active && template.slug == slug))
    }

    /// Create (id 0) or update a template row
    async fn save_template(&self, template: Template) -> StoreResult<Template>;
}

/// Theme row persistence
#[async_trait]
pub trait ThemeStore: Send + Sync {
    /// Every installed theme ordered by slug
    async fn all(&self) -> StoreResult<Vec<Theme>>;

    /// Theme by slug
    async fn find(&self, slug: &str) -> StoreResult<Option<Theme>>;

    /// The active theme, if any
    async fn active(&self) -> StoreResult<Option<Theme>>;

    /// Insert a new row
    ///
    /// Fails with [`StoreError::Conflict`] when the slug exists.
    async fn insert(&self, theme: Theme) -> StoreResult<Theme>;

    /// Persist customizer values
    async fn update_customizer(
        &self,
        slug: &str,
        values: serde_json::Map<String, Value>,
    ) -> StoreResult<bool>;

    /// Deactivate every row and activate `slug` as one atomic step
    ///
    /// Returns `false`, changing nothing, when `slug` is not installed.
    async fn activate(&self, slug: &str) -> StoreResult<bool>;

    /// Delete a row, returning whether it existed
    async fn delete(&self, slug: &str) -> StoreResult<bool>;
}

/// Generic key/value settings with optional expiry
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Value for `key` if present and not expired
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Store a value; `ttl = None` keeps it until overwritten
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove a value
    async fn forget(&self, key: &str) -> StoreResult<()>;
}
