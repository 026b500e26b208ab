//! Theme registry
//!
//! Discovers theme packages under the themes root and manages the installed
//! set: install, activate, uninstall, customize and publish assets.

use super::{ActiveThemeProvider, AssetPublisher, PublishReport, Theme, ThemeManifest};
use crate::error::{StoreError, ThemeError};
use crate::store::ThemeStore;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Filesystem discovery plus installed-theme lifecycle
#[derive(Clone)]
pub struct ThemeRegistry {
    themes_root: PathBuf,
    manifest_files: Vec<String>,
    store: Arc<dyn ThemeStore>,
    provider: Arc<ActiveThemeProvider>,
    publisher: AssetPublisher,
}

impl std::fmt::Debug for ThemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeRegistry")
            .field("themes_root", &self.themes_root)
            .field("manifest_files", &self.manifest_files)
            .field("provider", &self.provider)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl ThemeRegistry {
    /// Create a registry
    #[must_use]
    pub fn new(
        themes_root: impl Into<PathBuf>,
        manifest_files: Vec<String>,
        store: Arc<dyn ThemeStore>,
        provider: Arc<ActiveThemeProvider>,
        publisher: AssetPublisher,
    ) -> Self {
        Self {
            themes_root: themes_root.into(),
            manifest_files,
            store,
            provider,
            publisher,
        }
    }

    /// Active theme provider shared with the resolver
    #[must_use]
    pub const fn provider(&self) -> &Arc<ActiveThemeProvider> {
        &self.provider
    }

    /// Asset publisher for the configured public root
    #[must_use]
    pub const fn publisher(&self) -> &AssetPublisher {
        &self.publisher
    }

    /// Scan the themes root for packages
    ///
    /// Malformed manifests are logged and skipped. A missing root yields an
    /// empty list. Results are sorted by slug.
    #[must_use]
    pub fn discover_themes(&self) -> Vec<ThemeManifest> {
        let entries = match std::fs::read_dir(&self.themes_root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(root = %self.themes_root.display(), error = %e, "themes root not readable");
                return Vec::new();
            }
        };

        let mut manifests: Vec<ThemeManifest> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter_map(|dir| match ThemeManifest::load(&dir, &self.manifest_files) {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(directory = %dir.display(), error = %e, "skipping theme package");
                    None
                }
            })
            .collect();

        manifests.sort_by(|a, b| a.slug.cmp(&b.slug));
        manifests
    }

    /// Find a discoverable package by slug
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::PackageNotFound`] if no package has that slug.
    pub fn find_package(&self, slug: &str) -> Result<ThemeManifest, ThemeError> {
        self.discover_themes()
            .into_iter()
            .find(|manifest| manifest.slug == slug)
            .ok_or_else(|| ThemeError::PackageNotFound(slug.to_string()))
    }

    /// Every installed theme ordered by slug
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Store`] if the store cannot be read.
    pub async fn installed(&self) -> Result<Vec<Theme>, ThemeError> {
        Ok(self.store.all().await?)
    }

    /// Installed theme by slug
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::NotInstalled`] if there is none.
    pub async fn theme(&self, slug: &str) -> Result<Theme, ThemeError> {
        self.store
            .find(slug)
            .await?
            .ok_or_else(|| ThemeError::NotInstalled(slug.to_string()))
    }

    /// Persist a discovered package as installed and inactive
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::AlreadyInstalled`] if the slug exists.
    pub async fn install_theme(
        &self,
        manifest: &ThemeManifest,
        installed_by: Option<i64>,
    ) -> Result<Theme, ThemeError> {
        if self.store.find(&manifest.slug).await?.is_some() {
            return Err(ThemeError::AlreadyInstalled(manifest.slug.clone()));
        }
        let theme = self
            .store
            .insert(Theme::from_manifest(manifest, installed_by))
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => ThemeError::AlreadyInstalled(manifest.slug.clone()),
                other => other.into(),
            })?;
        tracing::info!(theme = %theme.slug, version = %theme.version, "theme installed");
        Ok(theme)
    }

    /// Make `slug` the only active theme
    ///
    /// Returns `false`, changing nothing, when the theme is not installed. On
    /// success the provider is refreshed, which clears the resolver cache,
    /// before this returns. Concurrent activations are serialized by the
    /// provider, so the last one to finish is what both hold.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Store`] if the store fails.
    pub async fn activate_theme(&self, slug: &str) -> Result<bool, ThemeError> {
        if !self.provider.activate(slug).await? {
            tracing::debug!(theme = %slug, "activation refused: not installed");
            return Ok(false);
        }
        tracing::info!(theme = %slug, "theme activated");
        Ok(true)
    }

    /// Remove an inactive theme and its published assets
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::ThemeActive`] for the active theme and
    /// [`ThemeError::NotInstalled`] for unknown slugs.
    pub async fn uninstall_theme(&self, slug: &str) -> Result<(), ThemeError> {
        let theme = self.theme(slug).await?;
        if theme.is_active {
            return Err(ThemeError::ThemeActive(slug.to_string()));
        }
        self.store.delete(slug).await?;
        self.publisher.remove(slug).await?;
        tracing::info!(theme = %slug, "theme uninstalled");
        Ok(())
    }

    /// Validate and persist customizer values
    ///
    /// Values are merged over previously saved ones. Returns the effective
    /// settings (schema defaults overlaid by saved values).
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::InvalidCustomizerValue`] for unknown keys or
    /// values the schema rejects; nothing is saved in that case.
    pub async fn save_customizer(
        &self,
        slug: &str,
        values: Map<String, Value>,
    ) -> Result<Map<String, Value>, ThemeError> {
        let mut theme = self.theme(slug).await?;
        for (key, value) in &values {
            let field = theme.customizer_schema.get(key).ok_or_else(|| {
                ThemeError::InvalidCustomizerValue {
                    key: key.clone(),
                    reason: "not declared by the theme".to_string(),
                }
            })?;
            field.validate(key, value)?;
        }

        theme.customizer_values.extend(values);
        self.store
            .update_customizer(slug, theme.customizer_values.clone())
            .await?;
        if theme.is_active {
            self.provider.refresh().await?;
        }
        Ok(theme.settings())
    }

    /// Copy an installed theme's assets to the public root
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::NotInstalled`], [`ThemeError::UnsafeAssetPath`]
    /// or [`ThemeError::Io`].
    pub async fn publish_assets(&self, slug: &str) -> Result<PublishReport, ThemeError> {
        let theme = self.theme(slug).await?;
        self.publisher.publish(&theme).await
    }
}
