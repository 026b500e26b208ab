//! Content model shared by the resolver, composer and sitemap
//!
//! Post types, content entries, taxonomy terms and menus are owned by an
//! external content store; this module only defines their shape and the URL
//! rules every consumer must agree on.

mod template;

pub use template::{Template, TemplateType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Editor-defined content schema ("news", "page", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostType {
    /// Primary key
    pub id: i64,
    /// Display name
    pub name: String,
    /// Unique slug
    pub slug: String,
    /// Public route prefix; `None`, `""` and `"/"` all mean root
    #[serde(default)]
    pub route_prefix: Option<String>,
    /// Entries may have parents
    #[serde(default)]
    pub is_hierarchical: bool,
    /// Listed in the sitemap and served publicly
    #[serde(default = "default_true")]
    pub is_public: bool,
    /// Template row used for single entries, overriding theme resolution
    #[serde(default)]
    pub single_template_ref: Option<i64>,
    /// Template row used for listings, overriding theme resolution
    #[serde(default)]
    pub archive_template_ref: Option<i64>,
    /// Feature flags ("excerpt", "thumbnail", ...)
    #[serde(default)]
    pub supports: BTreeSet<String>,
}

const fn default_true() -> bool {
    true
}

impl PostType {
    /// Route prefix with surrounding slashes removed, `None` for root types
    #[must_use]
    pub fn normalized_prefix(&self) -> Option<&str> {
        normalize_route_prefix(self.route_prefix.as_deref())
    }

    /// Page-like types live at the site root
    #[must_use]
    pub fn is_page_like(&self) -> bool {
        self.normalized_prefix().is_none()
    }

    /// Public URL of the listing for this post type
    #[must_use]
    pub fn archive_path(&self) -> String {
        self.normalized_prefix()
            .map_or_else(|| "/".to_string(), |prefix| format!("/{prefix}"))
    }

    /// Whether a request path segment addresses this post type
    #[must_use]
    pub fn matches_route(&self, prefix_or_slug: &str) -> bool {
        let wanted = prefix_or_slug.trim_matches('/');
        self.normalized_prefix().is_some_and(|prefix| prefix == wanted) || self.slug == wanted
    }
}

/// Normalize a route prefix
///
/// `None`, `""`, `"/"` and any string made only of slashes collapse to `None`.
///
/// # Examples
///
/// ```rust
/// use acton_cms::model::normalize_route_prefix;
///
/// assert_eq!(normalize_route_prefix(Some("/news/")), Some("news"));
/// assert_eq!(normalize_route_prefix(Some("/")), None);
/// assert_eq!(normalize_route_prefix(None), None);
/// ```
#[must_use]
pub fn normalize_route_prefix(prefix: Option<&str>) -> Option<&str> {
    prefix
        .map(|p| p.trim().trim_matches('/'))
        .filter(|p| !p.is_empty())
}

/// Errors producing a public URL for a row
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    /// Slug is empty
    #[error("empty slug")]
    EmptySlug,
    /// Slug contains characters that cannot appear in a path segment
    #[error("slug '{0}' is not a valid path segment")]
    InvalidSlug(String),
}

/// Public path for a slug under an optional route prefix
///
/// # Errors
///
/// Returns [`UrlError`] if the slug is empty or contains `/`, whitespace or `?`.
pub fn content_path(route_prefix: Option<&str>, slug: &str) -> Result<String, UrlError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(UrlError::EmptySlug);
    }
    if slug.contains(['/', '?', '#']) || slug.chars().any(char::is_whitespace) {
        return Err(UrlError::InvalidSlug(slug.to_string()));
    }
    Ok(normalize_route_prefix(route_prefix).map_or_else(
        || format!("/{slug}"),
        |prefix| format!("/{prefix}/{slug}"),
    ))
}

/// Publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    /// Not visible
    #[default]
    Draft,
    /// Visible once `published_at` has passed
    Published,
    /// Visible to authorized users only
    Private,
    /// Retired
    Archived,
}

/// A post or page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Primary key
    pub id: i64,
    /// Owning post type
    pub post_type_id: i64,
    /// Title
    pub title: String,
    /// Slug, unique within the post type
    pub slug: String,
    /// Status
    #[serde(default)]
    pub status: ContentStatus,
    /// Publication time
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Last modification time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Raw body markup
    #[serde(default)]
    pub content: String,
    /// Summary
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Featured image URL
    #[serde(default)]
    pub featured_image: Option<String>,
    /// SEO title
    #[serde(default)]
    pub meta_title: Option<String>,
    /// SEO description
    #[serde(default)]
    pub meta_description: Option<String>,
    /// Render counter
    #[serde(default)]
    pub view_count: u64,
    /// Parent entry for hierarchical types
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Opaque key/value bag
    #[serde(default)]
    pub meta_data: serde_json::Map<String, serde_json::Value>,
}

impl Content {
    /// `status == published && published_at <= now`
    #[must_use]
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ContentStatus::Published
            && self.published_at.is_some_and(|at| at <= now)
    }

    /// Visible right now
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_visible_at(Utc::now())
    }

    /// Editor-chosen template name stored under the `template` meta key
    #[must_use]
    pub fn template_hint(&self) -> Option<&str> {
        self.meta_data
            .get("template")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
    }

    /// Best timestamp for "last modified"
    #[must_use]
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.published_at)
    }
}

/// Taxonomy term (category, tag, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTerm {
    /// Primary key
    pub id: i64,
    /// Taxonomy slug ("category", "tag")
    pub taxonomy: String,
    /// Display name
    pub name: String,
    /// Slug
    pub slug: String,
    /// Parent term
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Listed publicly
    #[serde(default = "default_true")]
    pub is_public: bool,
}

impl TaxonomyTerm {
    /// Public URL path `/{taxonomy}/{slug}`
    ///
    /// # Errors
    ///
    /// Returns [`UrlError`] for unusable slugs.
    pub fn path(&self) -> Result<String, UrlError> {
        content_path(Some(&self.taxonomy), &self.slug)
    }
}

/// Navigation menu assigned to a theme location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    /// Theme location ("primary", "footer")
    pub location: String,
    /// Display name
    pub name: String,
    /// Items
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

/// Menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Link label
    pub label: String,
    /// Link target
    pub url: String,
    /// Nested entries
    #[serde(default)]
    pub children: Vec<MenuItem>,
}

/// Page request for listings (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number, starting at 1
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl Pagination {
    /// Create a page request, clamping zeros to 1
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Number of rows to skip
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// Request that produced it
    pub pagination: Pagination,
    /// Total rows across all pages
    pub total: u64,
}

impl<T> Page<T> {
    /// Total number of pages (at least 1)
    #[must_use]
    pub fn last_page(&self) -> u32 {
        let per_page = u64::from(self.pagination.per_page);
        u32::try_from(self.total.div_ceil(per_page).max(1)).unwrap_or(u32::MAX)
    }

    /// Slice a full, already ordered result set
    #[must_use]
    pub fn from_all(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.per_page as usize)
            .collect();
        Self {
            items,
            pagination,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn post_type(prefix: Option<&str>) -> PostType {
        PostType {
            id: 1,
            name: "News".into(),
            slug: "news".into(),
            route_prefix: prefix.map(String::from),
            is_hierarchical: false,
            is_public: true,
            single_template_ref: None,
            archive_template_ref: None,
            supports: BTreeSet::new(),
        }
    }

    #[test]
    fn test_root_prefixes_are_equivalent() {
        for prefix in [None, Some(""), Some("/")] {
            assert!(post_type(prefix).is_page_like());
            assert_eq!(content_path(prefix, "about").unwrap(), "/about");
        }
    }

    #[test]
    fn test_prefixed_path() {
        assert_eq!(content_path(Some("news"), "hello").unwrap(), "/news/hello");
        assert_eq!(content_path(Some("/news/"), "hello").unwrap(), "/news/hello");
        assert_eq!(post_type(Some("/news")).archive_path(), "/news");
    }

    #[test]
    fn test_invalid_slugs() {
        assert_eq!(content_path(None, "  "), Err(UrlError::EmptySlug));
        assert!(matches!(
            content_path(None, "a/b"),
            Err(UrlError::InvalidSlug(_))
        ));
    }

    #[test]
    fn test_matches_route() {
        let pt = post_type(Some("news"));
        assert!(pt.matches_route("news"));
        assert!(pt.matches_route("/news/"));
        assert!(!pt.matches_route("blog"));
    }

    #[test]
    fn test_visibility() {
        let now = Utc::now();
        let mut content = Content {
            id: 1,
            post_type_id: 1,
            title: "Hello".into(),
            slug: "hello".into(),
            status: ContentStatus::Published,
            published_at: Some(now - Duration::minutes(5)),
            updated_at: None,
            content: String::new(),
            excerpt: None,
            featured_image: None,
            meta_title: None,
            meta_description: None,
            view_count: 0,
            parent_id: None,
            meta_data: serde_json::Map::new(),
        };
        assert!(content.is_visible_at(now));

        content.published_at = Some(now + Duration::minutes(5));
        assert!(!content.is_visible_at(now));

        content.published_at = Some(now - Duration::minutes(5));
        content.status = ContentStatus::Draft;
        assert!(!content.is_visible_at(now));
    }

    #[test]
    fn test_page_slicing() {
        let page = Page::from_all((1..=25).collect::<Vec<_>>(), Pagination::new(3, 10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.last_page(), 3);

        let empty: Page<i32> = Page::from_all(Vec::new(), Pagination::new(0, 0));
        assert_eq!(empty.pagination.page, 1);
        assert_eq!(empty.last_page(), 1);
    }

    proptest! {
        #[test]
        fn prop_root_prefix_never_double_slashes(slug in "[a-z0-9][a-z0-9-]{0,20}", slashes in "/{0,3}") {
            let with_slashes = content_path(Some(&slashes), &slug).unwrap();
            let none = content_path(None, &slug).unwrap();
            prop_assert_eq!(&with_slashes, &none);
            prop_assert!(!with_slashes.contains("//"));
        }

        #[test]
        fn prop_prefix_slashes_are_trimmed(prefix in "[a-z]{1,10}", slug in "[a-z0-9-]{1,10}") {
            let bare = content_path(Some(&prefix), &slug).unwrap();
            let wrapped = content_path(Some(&format!("/{prefix}/")), &slug).unwrap();
            prop_assert_eq!(bare, wrapped);
        }
    }
}
