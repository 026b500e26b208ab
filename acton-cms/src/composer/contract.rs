//! The data contract handed to every template and component

use crate::config::SiteSettings;
use crate::model::{Content, Menu, Page, PostType, TaxonomyTerm};
use crate::template::RenderKind;
use crate::theme::{Theme, ThemeKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Site-wide values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteView {
    /// Site name
    pub name: String,
    /// Absolute base URL without trailing slash
    pub url: String,
    /// Tagline
    pub description: Option<String>,
    /// Locale, e.g. `en`
    pub locale: String,
}

impl From<&SiteSettings> for SiteView {
    fn from(site: &SiteSettings) -> Self {
        Self {
            name: site.name.clone(),
            url: site.base_url.trim_end_matches('/').to_string(),
            description: (!site.description.is_empty()).then(|| site.description.clone()),
            locale: site.locale.clone(),
        }
    }
}

/// Active theme values exposed to templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeView {
    /// Slug
    pub slug: String,
    /// Display name
    pub name: String,
    /// Version
    pub version: String,
    /// Rendering technology
    pub kind: ThemeKind,
    /// Customizer defaults overlaid with saved values
    pub settings: Map<String, Value>,
    /// Published asset URLs by group
    pub assets: BTreeMap<String, Vec<String>>,
    /// Feature flags
    pub supports: Vec<String>,
}

impl From<&Theme> for ThemeView {
    fn from(theme: &Theme) -> Self {
        Self {
            slug: theme.slug.clone(),
            name: theme.name.clone(),
            version: theme.version.clone(),
            kind: theme.kind,
            settings: theme.settings(),
            assets: theme.asset_urls(),
            supports: theme.supports.iter().cloned().collect(),
        }
    }
}

/// Listing position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationView {
    /// Current page (1-based)
    pub page: u32,
    /// Items per page
    pub per_page: u32,
    /// Total items
    pub total: u64,
    /// Last page number
    pub last_page: u32,
    /// Whether a later page exists
    pub has_more: bool,
}

impl<T> From<&Page<T>> for PaginationView {
    fn from(page: &Page<T>) -> Self {
        let last_page = page.last_page();
        Self {
            page: page.pagination.page,
            per_page: page.pagination.per_page,
            total: page.total,
            last_page,
            has_more: page.pagination.page < last_page,
        }
    }
}

/// Page-level metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Document title
    pub title: String,
    /// Meta description
    pub description: Option<String>,
    /// Request path
    pub url: String,
    /// Kind of page
    pub kind: RenderKind,
    /// Search query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Everything a template can see
///
/// The same value is used as component props, as the markup render context
/// and as the body of the plain JSON view when nothing could render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataContract {
    /// Entry for single pages
    pub post: Option<Content>,
    /// Entries for listings
    #[serde(default)]
    pub posts: Vec<Content>,
    /// Listing position
    pub pagination: Option<PaginationView>,
    /// Post type being rendered
    pub post_type: Option<PostType>,
    /// Site values
    pub site: SiteView,
    /// Active theme, if any
    pub theme: Option<ThemeView>,
    /// Menus keyed by location
    #[serde(default)]
    pub menus: BTreeMap<String, Menu>,
    /// Terms attached to `post`
    #[serde(default)]
    pub terms: Vec<TaxonomyTerm>,
    /// Page metadata
    pub meta: PageMeta,
    /// Rendered fragments (`header`, `content`, `footer`) during layout
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, String>,
}

impl DataContract {
    /// Contract with site values and no page data
    #[must_use]
    pub fn new(site: SiteView, meta: PageMeta) -> Self {
        Self {
            post: None,
            posts: Vec::new(),
            pagination: None,
            post_type: None,
            site,
            theme: None,
            menus: BTreeMap::new(),
            terms: Vec::new(),
            meta,
            slots: BTreeMap::new(),
        }
    }

    /// Attach the active theme
    #[must_use]
    pub fn with_theme(mut self, theme: Option<&Theme>) -> Self {
        self.theme = theme.map(ThemeView::from);
        self
    }

    /// Attach menus
    #[must_use]
    pub fn with_menus(mut self, menus: Vec<Menu>) -> Self {
        self.menus = menus
            .into_iter()
            .map(|menu| (menu.location.clone(), menu))
            .collect();
        self
    }

    /// Copy of this contract with a rendered slot
    #[must_use]
    pub fn with_slot(&self, name: &str, html: String) -> Self {
        let mut contract = self.clone();
        contract.slots.insert(name.to_string(), html);
        contract
    }
}
