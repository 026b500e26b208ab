//! Application state
//!
//! Wires the stores, theme registry, resolver, renderers, composer, sitemap
//! and admin service into one cloneable value shared by axum handlers and
//! the CLI.

use crate::admin::CmsAdmin;
use crate::auth::{AllowAll, PermissionChecker};
use crate::composer::{PageComposer, SiteView};
use crate::config::CmsConfig;
use crate::error::StoreError;
use crate::render::{ComponentRegistry, ComponentRenderer, MarkupRenderer, Renderer};
use crate::sitemap::SitemapAggregator;
use crate::store::{
    ContentSeed, ContentStore, MemoryContentStore, MemorySettingsStore, MemoryThemeStore,
    SettingsStore, SqlSettingsStore, SqlThemeStore, TemplateStore, ThemeStore,
};
use crate::template::TemplateResolver;
use crate::theme::{ActiveThemeProvider, AssetPublisher, ThemeRegistry};
use anyhow::Context;
use std::fmt;
use std::sync::Arc;

/// External collaborators the core runs against
#[derive(Clone)]
pub struct Backends {
    /// Content lookup
    pub content: Arc<dyn ContentStore>,
    /// Stored templates
    pub templates: Arc<dyn TemplateStore>,
    /// Theme rows
    pub themes: Arc<dyn ThemeStore>,
    /// Key/value settings with TTL
    pub settings: Arc<dyn SettingsStore>,
    /// Permission checks for administrative operations
    pub permissions: Arc<dyn PermissionChecker>,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

impl Backends {
    /// Everything in memory, every operation permitted
    #[must_use]
    pub fn in_memory(content: Arc<MemoryContentStore>) -> Self {
        Self {
            content: content.clone(),
            templates: content,
            themes: Arc::new(MemoryThemeStore::new()),
            settings: Arc::new(MemorySettingsStore::new()),
            permissions: Arc::new(AllowAll),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct CmsState {
    config: Arc<CmsConfig>,
    content: Arc<dyn ContentStore>,
    themes: Arc<dyn ThemeStore>,
    registry: ThemeRegistry,
    resolver: TemplateResolver,
    components: Arc<ComponentRegistry>,
    composer: PageComposer,
    sitemap: Arc<SitemapAggregator>,
    admin: CmsAdmin,
}

impl fmt::Debug for CmsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsState")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("composer", &self.composer)
            .finish_non_exhaustive()
    }
}

impl CmsState {
    /// Build state from configuration
    ///
    /// Theme rows and settings live in the configured SQLite database, so
    /// every state opened on the same file shares activations and the cached
    /// sitemap. Content and templates are held in memory, seeded from
    /// `content.seed_file` when set. Administrative operations are
    /// unrestricted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated, or the
    /// seed file cannot be read.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use acton_cms::{config::CmsConfig, state::CmsState};
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let config = CmsConfig::load_for_service("my-site")?;
    /// let state = CmsState::from_config(config).await?;
    /// let app = acton_cms::web::router(state);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_config(config: CmsConfig) -> anyhow::Result<Self> {
        let themes = SqlThemeStore::connect(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("opening theme database {}", config.database.url))?;
        let settings = SqlSettingsStore::new(themes.pool().clone());
        settings
            .migrate()
            .await
            .with_context(|| format!("migrating settings in {}", config.database.url))?;

        let content = match &config.content.seed_file {
            Some(path) => {
                let seed = ContentSeed::from_file(path)
                    .await
                    .with_context(|| format!("loading content seed {}", path.display()))?;
                tracing::info!(
                    path = %path.display(),
                    post_types = seed.post_types.len(),
                    entries = seed.content.len(),
                    "content seeded"
                );
                MemoryContentStore::seeded(seed)
            }
            None => MemoryContentStore::new(),
        };

        let mut backends = Backends::in_memory(Arc::new(content));
        backends.themes = Arc::new(themes);
        backends.settings = Arc::new(settings);
        Ok(Self::assemble(config, backends, Arc::new(ComponentRegistry::new())).await?)
    }

    /// Build state over explicit backends
    ///
    /// # Errors
    ///
    /// Returns a store error if the active theme cannot be loaded.
    pub async fn assemble(
        config: CmsConfig,
        backends: Backends,
        components: Arc<ComponentRegistry>,
    ) -> Result<Self, StoreError> {
        let provider = Arc::new(ActiveThemeProvider::load(backends.themes.clone()).await?);
        let resolver = TemplateResolver::new(provider.clone(), backends.templates.clone());
        let registry = ThemeRegistry::new(
            config.themes.themes_root.clone(),
            config.themes.manifest_files.clone(),
            backends.themes.clone(),
            provider.clone(),
            AssetPublisher::new(config.themes.public_root.clone()),
        );

        let renderers = vec![
            Renderer::Markup(MarkupRenderer::new(
                provider.clone(),
                backends.templates.clone(),
                config.themes.markup_extensions.clone(),
            )),
            Renderer::Component(ComponentRenderer::new(provider.clone(), components.clone())),
        ];
        let composer = PageComposer::new(
            backends.content.clone(),
            resolver.clone(),
            renderers,
            SiteView::from(&config.site),
        );
        let sitemap = Arc::new(SitemapAggregator::new(
            backends.content.clone(),
            backends.settings,
            &config.site.base_url,
            &config.sitemap,
        ));
        let admin = CmsAdmin::new(
            backends.permissions,
            registry.clone(),
            resolver.clone(),
            backends.content.clone(),
            backends.templates,
            sitemap.clone(),
        );

        tracing::info!(
            site = %config.site.name,
            active_theme = ?provider.current_slug(),
            "cms state assembled"
        );

        Ok(Self {
            config: Arc::new(config),
            content: backends.content,
            themes: backends.themes,
            registry,
            resolver,
            components,
            composer,
            sitemap,
            admin,
        })
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &CmsConfig {
        &self.config
    }

    /// Content store
    #[must_use]
    pub const fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    /// Theme row store
    #[must_use]
    pub const fn themes(&self) -> &Arc<dyn ThemeStore> {
        &self.themes
    }

    /// Theme registry
    #[must_use]
    pub const fn registry(&self) -> &ThemeRegistry {
        &self.registry
    }

    /// Active theme provider
    #[must_use]
    pub fn provider(&self) -> &Arc<ActiveThemeProvider> {
        self.registry.provider()
    }

    /// Template resolver
    #[must_use]
    pub const fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Component registry for component themes
    #[must_use]
    pub const fn components(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    /// Page composer
    #[must_use]
    pub const fn composer(&self) -> &PageComposer {
        &self.composer
    }

    /// Sitemap aggregator
    #[must_use]
    pub const fn sitemap(&self) -> &Arc<SitemapAggregator> {
        &self.sitemap
    }

    /// Administrative operations
    #[must_use]
    pub const fn admin(&self) -> &CmsAdmin {
        &self.admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assemble_in_memory() {
        let state = CmsState::assemble(
            CmsConfig::default(),
            Backends::in_memory(Arc::new(MemoryContentStore::new())),
            Arc::new(ComponentRegistry::new()),
        )
        .await
        .unwrap();
        assert!(state.provider().current().is_none());
        assert_eq!(state.config().site.per_page, 10);
        assert!(state.resolver().cache().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_with_memory_database_and_seed() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(
            &seed,
            r#"{"post_types": [{"id": 1, "name": "Pages", "slug": "page"}]}"#,
        )
        .unwrap();

        let mut config = CmsConfig::default();
        config.database.url = "sqlite::memory:".into();
        config.content.seed_file = Some(seed);

        let state = CmsState::from_config(config).await.unwrap();
        assert_eq!(state.content().post_types().await.unwrap().len(), 1);
        assert!(state.themes().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_missing_seed_fails() {
        let mut config = CmsConfig::default();
        config.database.url = "sqlite::memory:".into();
        config.content.seed_file = Some("/nonexistent/seed.json".into());
        assert!(CmsState::from_config(config).await.is_err());
    }
}
