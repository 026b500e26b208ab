//! Template resolution
//!
//! Given a render request, picks the one template that renders it. The
//! first source that answers wins:
//!
//! 1. the post type's stored template override (`single_template_ref` for
//!    single entries, `archive_template_ref` for listings)
//! 2. the editor's template name hint, if the request carries one
//! 3. the active theme's manifest entry for the conventional name
//!    (`news` for the `news` listing, `single-news` for a news entry,
//!    `search` for search results)
//! 4. the theme's `templates/` directory by convention
//!    (`templates/single.html`, `templates/news.html`, ...)
//! 5. generic theme templates: `page` or `post` for entries, `posts` then
//!    `index` for listings
//!
//! Without an active theme only the stored override can match. A total miss
//! is `None`; the caller degrades to the plain data view.
//!
//! Post type resolutions are cached per `(theme, post type, kind)` and the
//! cache is cleared whenever the active theme changes.

mod cache;

pub use cache::{CacheKey, ResolutionCache};

use crate::model::PostType;
use crate::store::TemplateStore;
use crate::theme::{ActiveThemeProvider, Theme};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What is being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    /// One entry
    Single,
    /// Listing of one post type
    Archive,
    /// Front page or post type index
    Index,
    /// Search results
    Search,
}

impl RenderKind {
    /// Lowercase name, also the conventional file stem
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Archive => "archive",
            Self::Index => "index",
            Self::Search => "search",
        }
    }

    const fn is_listing(self) -> bool {
        matches!(self, Self::Archive | Self::Index)
    }
}

impl fmt::Display for RenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolution request
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Kind of page
    pub kind: RenderKind,
    /// Post type being rendered, if any
    pub post_type: Option<&'a PostType>,
    /// Editor-chosen template name
    pub template_name_hint: Option<&'a str>,
}

impl<'a> RenderRequest<'a> {
    /// Request for a single entry
    #[must_use]
    pub const fn single(post_type: &'a PostType) -> Self {
        Self {
            kind: RenderKind::Single,
            post_type: Some(post_type),
            template_name_hint: None,
        }
    }

    /// Request for a post type listing
    #[must_use]
    pub const fn archive(post_type: &'a PostType) -> Self {
        Self {
            kind: RenderKind::Archive,
            post_type: Some(post_type),
            template_name_hint: None,
        }
    }

    /// Request for an index page, optionally scoped to a post type
    #[must_use]
    pub const fn index(post_type: Option<&'a PostType>) -> Self {
        Self {
            kind: RenderKind::Index,
            post_type,
            template_name_hint: None,
        }
    }

    /// Request for search results
    #[must_use]
    pub const fn search() -> Self {
        Self {
            kind: RenderKind::Search,
            post_type: None,
            template_name_hint: None,
        }
    }

    /// Attach a template name hint
    #[must_use]
    pub const fn with_hint(mut self, hint: Option<&'a str>) -> Self {
        self.template_name_hint = hint;
        self
    }
}

/// Where a resolved template body lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TemplateSource {
    /// A stored template row
    Stored {
        /// Row id
        id: i64,
    },
    /// A file inside the active theme
    Theme {
        /// Absolute file path
        path: PathBuf,
    },
}

/// A resolved template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    /// Logical name ("page", "single-news", "header", ...)
    pub name: String,
    /// Body location
    pub source: TemplateSource,
    /// Theme that was active when this was resolved
    pub theme: Option<String>,
}

impl TemplateRef {
    /// File path for theme templates
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            TemplateSource::Theme { path } => Some(path),
            TemplateSource::Stored { .. } => None,
        }
    }

    /// Stored row id
    #[must_use]
    pub const fn stored_id(&self) -> Option<i64> {
        match self.source {
            TemplateSource::Stored { id } => Some(id),
            TemplateSource::Theme { .. } => None,
        }
    }

    /// File extension without the dot
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.path()?.extension()?.to_str()
    }
}

/// Resolves render requests against the active theme
#[derive(Clone)]
pub struct TemplateResolver {
    provider: Arc<ActiveThemeProvider>,
    templates: Arc<dyn TemplateStore>,
    cache: ResolutionCache,
}

impl fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResolver")
            .field("provider", &self.provider)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl TemplateResolver {
    /// Create a resolver and subscribe its cache to theme changes
    #[must_use]
    pub fn new(provider: Arc<ActiveThemeProvider>, templates: Arc<dyn TemplateStore>) -> Self {
        let cache = ResolutionCache::new();
        let subscribed = cache.clone();
        provider.on_change(move |theme| {
            tracing::debug!(theme = ?theme.map(|t| &t.slug), "clearing template resolution cache");
            subscribed.clear();
        });
        Self {
            provider,
            templates,
            cache,
        }
    }

    /// Active theme provider
    #[must_use]
    pub const fn provider(&self) -> &Arc<ActiveThemeProvider> {
        &self.provider
    }

    /// Resolution cache
    #[must_use]
    pub const fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Forget cached resolutions for a post type
    pub fn invalidate_post_type(&self, post_type_id: i64) {
        self.cache.invalidate_post_type(post_type_id);
    }

    /// Resolve a request to a template reference
    #[must_use]
    pub fn resolve(&self, request: &RenderRequest<'_>) -> Option<TemplateRef> {
        let theme = self.provider.current();
        let theme_slug = theme.as_ref().map(|t| t.slug.clone());

        if let Some(id) = stored_override(request) {
            tracing::debug!(kind = %request.kind, template_id = id, "stored template override");
            return Some(TemplateRef {
                name: format!("template-{id}"),
                source: TemplateSource::Stored { id },
                theme: theme_slug,
            });
        }

        let theme = theme?;

        if let Some(hint) = request.template_name_hint {
            if let Some(found) = lookup(&theme, hint) {
                tracing::debug!(hint, "template name hint matched");
                return Some(found);
            }
        }

        let key = CacheKey {
            theme: theme.slug.clone(),
            post_type_id: request.post_type.map(|pt| pt.id),
            kind: request.kind,
        };
        if let Some(cached) = self.cache.get(&key) {
            return Some(cached);
        }

        let resolved = resolve_in_theme(&theme, request);
        match &resolved {
            Some(found) => {
                tracing::debug!(kind = %request.kind, template = %found.name, theme = %theme.slug, "template resolved");
                self.cache.insert(key, found.clone());
            }
            None => {
                tracing::debug!(kind = %request.kind, theme = %theme.slug, "no template in theme");
            }
        }
        resolved
    }

    /// Resolve a named partial (`header`, `footer`, `layout`, ...)
    ///
    /// Looks in the manifest's partials, then its templates, then
    /// `partials/{name}.{ext}`, then `templates/{name}.{ext}`, and finally an
    /// active stored template row with that slug.
    pub async fn resolve_partial(&self, name: &str) -> Option<TemplateRef> {
        let theme = self.provider.current();
        if let Some(theme) = &theme {
            let found = manifest_entry(theme, &theme.partials, name)
                .or_else(|| manifest_entry(theme, &theme.templates, name))
                .or_else(|| on_disk(theme, "partials", name))
                .or_else(|| on_disk(theme, "templates", name));
            if found.is_some() {
                return found;
            }
        }

        match self.templates.active_template(name).await {
            Ok(row) => row.map(|row| TemplateRef {
                name: name.to_string(),
                source: TemplateSource::Stored { id: row.id },
                theme: theme.map(|t| t.slug.clone()),
            }),
            Err(e) => {
                tracing::warn!(partial = name, error = %e, "stored partial lookup failed");
                None
            }
        }
    }
}

fn stored_override(request: &RenderRequest<'_>) -> Option<i64> {
    let post_type = request.post_type?;
    match request.kind {
        RenderKind::Single => post_type.single_template_ref,
        RenderKind::Archive | RenderKind::Index => post_type.archive_template_ref,
        RenderKind::Search => None,
    }
}

fn stem(post_type: &PostType) -> &str {
    post_type.normalized_prefix().unwrap_or(&post_type.slug)
}

fn conventional_name(request: &RenderRequest<'_>) -> Option<String> {
    match (request.kind, request.post_type) {
        (RenderKind::Search, _) => Some("search".to_string()),
        (RenderKind::Single, Some(pt)) => Some(format!("single-{}", stem(pt))),
        (RenderKind::Archive | RenderKind::Index, Some(pt)) => Some(stem(pt).to_string()),
        (_, None) => None,
    }
}

fn convention_file(request: &RenderRequest<'_>) -> String {
    match request.post_type.and_then(PostType::normalized_prefix) {
        Some(prefix) if request.kind.is_listing() => prefix.to_string(),
        _ => request.kind.as_str().to_string(),
    }
}

fn generic_names(request: &RenderRequest<'_>) -> &'static [&'static str] {
    match request.kind {
        RenderKind::Single if request.post_type.is_none_or(PostType::is_page_like) => &["page"],
        RenderKind::Single => &["post"],
        RenderKind::Archive | RenderKind::Index | RenderKind::Search => &["posts", "index"],
    }
}

fn resolve_in_theme(theme: &Theme, request: &RenderRequest<'_>) -> Option<TemplateRef> {
    if let Some(name) = conventional_name(request) {
        if let Some(found) = manifest_entry(theme, &theme.templates, &name) {
            return Some(found);
        }
    }

    if let Some(found) = on_disk(theme, "templates", &convention_file(request)) {
        return Some(found);
    }

    generic_names(request)
        .iter()
        .find_map(|name| lookup(theme, name))
}

/// Manifest entry, then `templates/{name}.{ext}`
fn lookup(theme: &Theme, name: &str) -> Option<TemplateRef> {
    manifest_entry(theme, &theme.templates, name).or_else(|| on_disk(theme, "templates", name))
}

fn manifest_entry(
    theme: &Theme,
    entries: &std::collections::BTreeMap<String, String>,
    name: &str,
) -> Option<TemplateRef> {
    let path = theme.resolve_path(entries.get(name)?)?;
    Some(theme_ref(theme, name, path))
}

fn on_disk(theme: &Theme, dir: &str, name: &str) -> Option<TemplateRef> {
    let relative = format!("{dir}/{name}.{}", theme.template_extension);
    let path = theme.resolve_path(&relative).filter(|path| path.is_file())?;
    Some(theme_ref(theme, name, path))
}

fn theme_ref(theme: &Theme, name: &str, path: PathBuf) -> TemplateRef {
    TemplateRef {
        name: name.to_string(),
        source: TemplateSource::Theme { path },
        theme: Some(theme.slug.clone()),
    }
}
