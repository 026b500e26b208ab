//! In-memory stores
//!
//! Back tests and seeded demo sites. All state sits behind a
//! `parking_lot::RwLock`; no lock is ever held across an `.await`.

use super::{ContentStore, SettingsStore, StoreResult, TemplateStore, ThemeStore};
use crate::error::StoreError;
use crate::model::{Content, Menu, Page, Pagination, PostType, TaxonomyTerm, Template};
use crate::theme::Theme;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Link between an entry and a taxonomy term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermLink {
    /// Entry id
    pub content_id: i64,
    /// Term id
    pub term_id: i64,
}

/// Seed document for [`MemoryContentStore`]
///
/// ```json
/// {
///   "post_types": [{"id": 1, "name": "Pages", "slug": "page", "route_prefix": null}],
///   "content": [{"id": 1, "post_type_id": 1, "title": "About", "slug": "about",
///                "status": "published", "published_at": "2024-01-01T00:00:00Z"}],
///   "terms": [], "term_links": [], "menus": [], "templates": []
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSeed {
    /// Post types
    #[serde(default)]
    pub post_types: Vec<PostType>,
    /// Entries
    #[serde(default)]
    pub content: Vec<Content>,
    /// Taxonomy terms
    #[serde(default)]
    pub terms: Vec<TaxonomyTerm>,
    /// Entry/term links
    #[serde(default)]
    pub term_links: Vec<TermLink>,
    /// Menus
    #[serde(default)]
    pub menus: Vec<Menu>,
    /// Stored templates
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl ContentSeed {
    /// Read a seed document from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Content and template store held in memory
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    data: RwLock<ContentSeed>,
}

impl MemoryContentStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a seed document
    #[must_use]
    pub fn seeded(seed: ContentSeed) -> Self {
        Self {
            data: RwLock::new(seed),
        }
    }

    /// Add or replace an entry
    pub fn put_content(&self, content: Content) {
        let mut data = self.data.write();
        data.content.retain(|existing| existing.id != content.id);
        data.content.push(content);
    }

    /// Add or replace a term
    pub fn put_term(&self, term: TaxonomyTerm) {
        let mut data = self.data.write();
        data.terms.retain(|existing| existing.id != term.id);
        data.terms.push(term);
    }

    /// Attach a term to an entry
    pub fn link_term(&self, content_id: i64, term_id: i64) {
        let link = TermLink {
            content_id,
            term_id,
        };
        let mut data = self.data.write();
        if !data.term_links.contains(&link) {
            data.term_links.push(link);
        }
    }

    /// Add or replace a menu by location
    pub fn put_menu(&self, menu: Menu) {
        let mut data = self.data.write();
        data.menus.retain(|existing| existing.location != menu.location);
        data.menus.push(menu);
    }

    fn visible_sorted(data: &ContentSeed, filter: impl Fn(&Content) -> bool) -> Vec<Content> {
        let now = Utc::now();
        let public: Vec<i64> = data
            .post_types
            .iter()
            .filter(|pt| pt.is_public)
            .map(|pt| pt.id)
            .collect();
        let mut rows: Vec<Content> = data
            .content
            .iter()
            .filter(|c| c.is_visible_at(now) && public.contains(&c.post_type_id) && filter(c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        rows
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn find_by_slug_and_type(
        &self,
        slug: &str,
        post_type_id: Option<i64>,
    ) -> StoreResult<Option<Content>> {
        let data = self.data.read();
        let type_matches = |content: &Content| match post_type_id {
            Some(id) => content.post_type_id == id,
            None => data
                .post_types
                .iter()
                .any(|pt| pt.id == content.post_type_id && pt.is_page_like()),
        };
        Ok(data
            .content
            .iter()
            .find(|content| content.slug == slug && type_matches(content))
            .cloned())
    }

    async fn find_post_type(&self, route_prefix_or_slug: &str) -> StoreResult<Option<PostType>> {
        let data = self.data.read();
        let wanted = route_prefix_or_slug.trim_matches('/');
        let by_prefix = data
            .post_types
            .iter()
            .find(|pt| pt.normalized_prefix() == Some(wanted));
        Ok(by_prefix
            .or_else(|| data.post_types.iter().find(|pt| pt.slug == wanted))
            .cloned())
    }

    async fn post_type(&self, id: i64) -> StoreResult<Option<PostType>> {
        Ok(self.data.read().post_types.iter().find(|pt| pt.id == id).cloned())
    }

    async fn post_types(&self) -> StoreResult<Vec<PostType>> {
        let mut types = self.data.read().post_types.clone();
        types.sort_by_key(|pt| pt.id);
        Ok(types)
    }

    async fn published_content(
        &self,
        post_type_id: Option<i64>,
        pagination: Pagination,
    ) -> StoreResult<Page<Content>> {
        let data = self.data.read();
        let rows = Self::visible_sorted(&data, |c| {
            post_type_id.is_none_or(|id| c.post_type_id == id)
        });
        Ok(Page::from_all(rows, pagination))
    }

    async fn all_published(&self, post_type_id: i64) -> StoreResult<Vec<Content>> {
        let data = self.data.read();
        Ok(Self::visible_sorted(&data, |c| c.post_type_id == post_type_id))
    }

    async fn search(&self, query: &str, pagination: Pagination) -> StoreResult<Page<Content>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Page::from_all(Vec::new(), pagination));
        }
        let data = self.data.read();
        let rows = Self::visible_sorted(&data, |c| {
            c.title.to_lowercase().contains(&needle)
                || c.content.to_lowercase().contains(&needle)
                || c.excerpt
                    .as_deref()
                    .is_some_and(|excerpt| excerpt.to_lowercase().contains(&needle))
        });
        Ok(Page::from_all(rows, pagination))
    }

    async fn terms_for(&self, content_id: i64) -> StoreResult<Vec<TaxonomyTerm>> {
        let data = self.data.read();
        Ok(data
            .term_links
            .iter()
            .filter(|link| link.content_id == content_id)
            .filter_map(|link| data.terms.iter().find(|term| term.id == link.term_id))
            .cloned()
            .collect())
    }

    async fn public_terms(&self) -> StoreResult<Vec<TaxonomyTerm>> {
        let mut terms: Vec<TaxonomyTerm> = self
            .data
            .read()
            .terms
            .iter()
            .filter(|term| term.is_public)
            .cloned()
            .collect();
        terms.sort_by(|a, b| a.taxonomy.cmp(&b.taxonomy).then(a.slug.cmp(&b.slug)));
        Ok(terms)
    }

    async fn menus(&self) -> StoreResult<Vec<Menu>> {
        Ok(self.data.read().menus.clone())
    }

    async fn increment_view_count(&self, content_id: i64) -> StoreResult<u64> {
        let mut data = self.data.write();
        let content = data
            .content
            .iter_mut()
            .find(|content| content.id == content_id)
            .ok_or_else(|| StoreError::Conflict(format!("content {content_id} does not exist")))?;
        content.view_count += 1;
        Ok(content.view_count)
    }

    async fn save_post_type(&self, mut post_type: PostType) -> StoreResult<PostType> {
        let mut data = self.data.write();
        if data
            .post_types
            .iter()
            .any(|pt| pt.slug == post_type.slug && pt.id != post_type.id)
        {
            return Err(StoreError::Conflict(format!(
                "post type slug '{}' is taken",
                post_type.slug
            )));
        }
        if post_type.id == 0 {
            post_type.id = data.post_types.iter().map(|pt| pt.id).max().unwrap_or(0) + 1;
        }
        data.post_types.retain(|pt| pt.id != post_type.id);
        data.post_types.push(post_type.clone());
        Ok(post_type)
    }

    async fn delete_post_type(&self, id: i64) -> StoreResult<bool> {
        let mut data = self.data.write();
        let before = data.post_types.len();
        data.post_types.retain(|pt| pt.id != id);
        Ok(data.post_types.len() != before)
    }
}

#[async_trait]
impl TemplateStore for MemoryContentStore {
    async fn template(&self, id: i64) -> StoreResult<Option<Template>> {
        Ok(self.data.read().templates.iter().find(|t| t.id == id).cloned())
    }

    async fn templates(&self) -> StoreResult<Vec<Template>> {
        Ok(self.data.read().templates.clone())
    }

    async fn save_template(&self, mut template: Template) -> StoreResult<Template> {
        let mut data = self.data.write();
        if template.id == 0 {
            template.id = data.templates.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        }
        data.templates.retain(|t| t.id != template.id);
        data.templates.push(template.clone());
        Ok(template)
    }
}

/// Theme rows held in memory
///
/// Activation happens under a single write lock, so readers never observe
/// zero or two active themes.
#[derive(Debug, Default)]
pub struct MemoryThemeStore {
    themes: RwLock<BTreeMap<String, Theme>>,
}

impl MemoryThemeStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThemeStore for MemoryThemeStore {
    async fn all(&self) -> StoreResult<Vec<Theme>> {
        Ok(self.themes.read().values().cloned().collect())
    }

    async fn find(&self, slug: &str) -> StoreResult<Option<Theme>> {
        Ok(self.themes.read().get(slug).cloned())
    }

    async fn active(&self) -> StoreResult<Option<Theme>> {
        Ok(self.themes.read().values().find(|t| t.is_active).cloned())
    }

    async fn insert(&self, theme: Theme) -> StoreResult<Theme> {
        let mut themes = self.themes.write();
        if themes.contains_key(&theme.slug) {
            return Err(StoreError::Conflict(format!(
                "theme '{}' already exists",
                theme.slug
            )));
        }
        themes.insert(theme.slug.clone(), theme.clone());
        Ok(theme)
    }

    async fn update_customizer(&self, slug: &str, values: Map<String, Value>) -> StoreResult<bool> {
        Ok(self
            .themes
            .write()
            .get_mut(slug)
            .map(|theme| theme.customizer_values = values)
            .is_some())
    }

    async fn activate(&self, slug: &str) -> StoreResult<bool> {
        let mut themes = self.themes.write();
        if !themes.get(slug).is_some_and(|t| t.is_installed) {
            return Ok(false);
        }
        for (key, theme) in themes.iter_mut() {
            theme.is_active = key == slug;
        }
        Ok(true)
    }

    async fn delete(&self, slug: &str) -> StoreResult<bool> {
        Ok(self.themes.write().remove(slug).is_some())
    }
}

/// Key/value settings with expiry, held in memory
///
/// Expiry uses `tokio::time::Instant`, so paused test clocks apply.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: RwLock<HashMap<String, (Value, Option<Instant>)>>,
}

impl MemorySettingsStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires)) if expires.is_none_or(|at| at > now) => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
            }
        }
        self.entries.write().remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.write().insert(key.to_string(), (value, expires));
        Ok(())
    }

    async fn forget(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
