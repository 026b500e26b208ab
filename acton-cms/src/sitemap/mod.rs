//! Sitemap aggregation
//!
//! Walks public content and taxonomy terms into a `urlset` document. The
//! document lives in the settings store under the configured TTL.
//! Regeneration is single-flighted and replaces the stored document with one
//! write, so readers keep getting the previous document until the new one is
//! in place.

mod xml;

pub use xml::{escape, render_urlset, write_urlset, ChangeFrequency, UrlEntry};

use crate::config::SitemapDefaults;
use crate::error::{CmsError, StoreError};
use crate::model::{content_path, PostType};
use crate::store::{ContentStore, SettingsStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Settings key for [`SitemapSettings`]
pub const SETTINGS_KEY: &str = "sitemap.settings";

/// Settings key for the cached document
pub const DOCUMENT_KEY: &str = "sitemap.document";

/// Shortest accepted cache TTL
pub const MIN_TTL_SECONDS: u64 = 60;

/// Longest accepted cache TTL
pub const MAX_TTL_SECONDS: u64 = 86_400;

/// Administrator-edited sitemap settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapSettings {
    /// Post types to include; `None` includes every public type
    #[serde(default)]
    pub included_post_type_ids: Option<BTreeSet<i64>>,
    /// Emit taxonomy term URLs
    pub include_taxonomies: bool,
    /// Keep the generated document
    pub enable_cache: bool,
    /// Document lifetime
    pub cache_ttl_seconds: u64,
    /// Time of the last regeneration
    #[serde(default)]
    pub last_generated_at: Option<DateTime<Utc>>,
}

impl From<&SitemapDefaults> for SitemapSettings {
    fn from(defaults: &SitemapDefaults) -> Self {
        Self {
            included_post_type_ids: None,
            include_taxonomies: defaults.include_taxonomies,
            enable_cache: defaults.enable_cache,
            cache_ttl_seconds: defaults.cache_ttl_seconds,
            last_generated_at: None,
        }
    }
}

impl SitemapSettings {
    /// Check administrator input
    ///
    /// # Errors
    ///
    /// Returns [`CmsError::InvalidSettings`] if the TTL is outside
    /// `60..=86400` seconds.
    pub fn validate(&self) -> Result<(), CmsError> {
        if (MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&self.cache_ttl_seconds) {
            Ok(())
        } else {
            Err(CmsError::InvalidSettings(format!(
                "cacheTtlSeconds must be between {MIN_TTL_SECONDS} and {MAX_TTL_SECONDS}, got {}",
                self.cache_ttl_seconds
            )))
        }
    }

    /// Cache TTL, clamped to the accepted range
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds.clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS))
    }

    /// Whether a post type contributes entries
    #[must_use]
    pub fn includes(&self, post_type: &PostType) -> bool {
        post_type.is_public
            && self
                .included_post_type_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&post_type.id))
    }
}

/// Builds and caches the sitemap document
pub struct SitemapAggregator {
    content: Arc<dyn ContentStore>,
    settings: Arc<dyn SettingsStore>,
    base_url: String,
    defaults: SitemapSettings,
    regenerating: Mutex<()>,
}

impl fmt::Debug for SitemapAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SitemapAggregator")
            .field("base_url", &self.base_url)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl SitemapAggregator {
    /// Create an aggregator for a site
    #[must_use]
    pub fn new(
        content: Arc<dyn ContentStore>,
        settings: Arc<dyn SettingsStore>,
        base_url: &str,
        defaults: &SitemapDefaults,
    ) -> Self {
        Self {
            content,
            settings,
            base_url: base_url.trim_end_matches('/').to_string(),
            defaults: SitemapSettings::from(defaults),
            regenerating: Mutex::new(()),
        }
    }

    /// Current settings, or the configured defaults
    pub async fn settings(&self) -> SitemapSettings {
        match self.settings.get(SETTINGS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored sitemap settings unreadable, using defaults");
                self.defaults.clone()
            }),
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "sitemap settings unavailable, using defaults");
                self.defaults.clone()
            }
        }
    }

    /// The sitemap document
    ///
    /// Returns the cached document while it is fresh and caching is enabled;
    /// otherwise regenerates it.
    pub async fn build_document(&self) -> String {
        if self.settings().await.enable_cache {
            if let Some(document) = self.cached().await {
                return document;
            }
        }

        let _guard = self.regenerating.lock().await;
        let settings = self.settings().await;
        if settings.enable_cache {
            if let Some(document) = self.cached().await {
                tracing::debug!("sitemap regenerated by a concurrent request");
                return document;
            }
        }
        self.recompute(settings).await
    }

    /// Regenerate regardless of cache freshness
    pub async fn regenerate(&self) -> String {
        let _guard = self.regenerating.lock().await;
        let settings = self.settings().await;
        self.recompute(settings).await
    }

    /// Drop the cached document
    pub async fn invalidate(&self) {
        match self.settings.forget(DOCUMENT_KEY).await {
            Ok(()) => tracing::debug!("sitemap cache invalidated"),
            Err(e) => tracing::warn!(error = %e, "sitemap cache invalidation failed"),
        }
    }

    /// Validate and store settings, then invalidate the cached document
    ///
    /// `last_generated_at` is preserved from the stored settings.
    ///
    /// # Errors
    ///
    /// Returns [`CmsError::InvalidSettings`] for out-of-range values, or a
    /// store error if the settings cannot be written.
    pub async fn save_settings(
        &self,
        mut settings: SitemapSettings,
    ) -> Result<SitemapSettings, CmsError> {
        settings.validate()?;

        let _guard = self.regenerating.lock().await;
        settings.last_generated_at = self.settings().await.last_generated_at;
        let value = serde_json::to_value(&settings).map_err(StoreError::from)?;
        self.settings.set(SETTINGS_KEY, value, None).await?;
        self.invalidate().await;

        tracing::info!(
            ttl_seconds = settings.cache_ttl_seconds,
            enable_cache = settings.enable_cache,
            "sitemap settings saved"
        );
        Ok(settings)
    }

    async fn cached(&self) -> Option<String> {
        match self.settings.get(DOCUMENT_KEY).await {
            Ok(Some(Value::String(document))) => Some(document),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "cached sitemap unavailable");
                None
            }
        }
    }

    async fn recompute(&self, mut settings: SitemapSettings) -> String {
        let entries = self.collect(&settings).await;
        let document = render_urlset(&entries);

        if settings.enable_cache {
            let stored = self
                .settings
                .set(DOCUMENT_KEY, Value::String(document.clone()), Some(settings.ttl()))
                .await;
            if let Err(e) = stored {
                tracing::warn!(error = %e, "sitemap not cached");
            }
        }

        settings.last_generated_at = Some(Utc::now());
        match serde_json::to_value(&settings) {
            Ok(value) => {
                if let Err(e) = self.settings.set(SETTINGS_KEY, value, None).await {
                    tracing::warn!(error = %e, "sitemap generation time not recorded");
                }
            }
            Err(e) => tracing::warn!(error = %e, "sitemap settings not serializable"),
        }

        tracing::info!(urls = entries.len(), "sitemap generated");
        document
    }

    async fn collect(&self, settings: &SitemapSettings) -> Vec<UrlEntry> {
        let mut entries = vec![UrlEntry::root(&self.base_url)];

        let post_types = match self.content.post_types().await {
            Ok(post_types) => post_types,
            Err(e) => {
                tracing::warn!(error = %e, "content store unavailable, emitting root only");
                return entries;
            }
        };

        for post_type in post_types.iter().filter(|pt| settings.includes(pt)) {
            let rows = match self.content.all_published(post_type.id).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(post_type = %post_type.slug, error = %e, "skipping post type");
                    continue;
                }
            };
            let (changefreq, priority) = if post_type.is_page_like() {
                (ChangeFrequency::Monthly, 0.8)
            } else {
                (ChangeFrequency::Weekly, 0.6)
            };
            for row in rows {
                match content_path(post_type.route_prefix.as_deref(), &row.slug) {
                    Ok(path) => entries.push(UrlEntry {
                        loc: self.absolute(&path),
                        lastmod: row.last_modified(),
                        changefreq,
                        priority,
                    }),
                    Err(e) => {
                        tracing::warn!(content_id = row.id, error = %e, "skipping sitemap entry");
                    }
                }
            }
        }

        if settings.include_taxonomies {
            match self.content.public_terms().await {
                Ok(terms) => {
                    for term in terms {
                        match term.path() {
                            Ok(path) => entries.push(UrlEntry {
                                loc: self.absolute(&path),
                                lastmod: None,
                                changefreq: ChangeFrequency::Weekly,
                                priority: 0.4,
                            }),
                            Err(e) => {
                                tracing::warn!(term_id = term.id, error = %e, "skipping sitemap term");
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "taxonomy terms unavailable"),
            }
        }

        entries
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}
