//! Administrative operations
//!
//! Every mutating operation asks the [`PermissionChecker`] first and fails
//! with [`CmsError::Forbidden`] on denial. Writes that affect resolution or
//! the sitemap invalidate the matching cache before returning.

use crate::auth::{Ability, Actor, PermissionChecker};
use crate::error::CmsError;
use crate::model::{PostType, Template};
use crate::sitemap::{SitemapAggregator, SitemapSettings};
use crate::store::{ContentStore, TemplateStore};
use crate::template::TemplateResolver;
use crate::theme::{PublishReport, Theme, ThemeRegistry};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Administrative surface over the registry, stores and caches
#[derive(Clone)]
pub struct CmsAdmin {
    permissions: Arc<dyn PermissionChecker>,
    registry: ThemeRegistry,
    resolver: TemplateResolver,
    content: Arc<dyn ContentStore>,
    templates: Arc<dyn TemplateStore>,
    sitemap: Arc<SitemapAggregator>,
}

impl fmt::Debug for CmsAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsAdmin")
            .field("registry", &self.registry)
            .field("sitemap", &self.sitemap)
            .finish_non_exhaustive()
    }
}

impl CmsAdmin {
    /// Create the admin service
    #[must_use]
    pub fn new(
        permissions: Arc<dyn PermissionChecker>,
        registry: ThemeRegistry,
        resolver: TemplateResolver,
        content: Arc<dyn ContentStore>,
        templates: Arc<dyn TemplateStore>,
        sitemap: Arc<SitemapAggregator>,
    ) -> Self {
        Self {
            permissions,
            registry,
            resolver,
            content,
            templates,
            sitemap,
        }
    }

    async fn authorize(&self, actor: &Actor, ability: Ability) -> Result<(), CmsError> {
        if self.permissions.can(actor, ability).await {
            Ok(())
        } else {
            tracing::warn!(user_id = actor.id, ?ability, "permission denied");
            Err(CmsError::Forbidden(format!(
                "user {} may not {}",
                actor.id,
                ability_label(ability)
            )))
        }
    }

    /// Install a discovered theme package
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `PackageNotFound` or `AlreadyInstalled`.
    pub async fn install_theme(&self, actor: &Actor, slug: &str) -> Result<Theme, CmsError> {
        self.authorize(actor, Ability::ManageThemes).await?;
        let manifest = self.registry.find_package(slug)?;
        Ok(self.registry.install_theme(&manifest, Some(actor.id)).await?)
    }

    /// Activate an installed theme
    ///
    /// Returns `false` when the theme is not installed.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` or a store error.
    pub async fn activate_theme(&self, actor: &Actor, slug: &str) -> Result<bool, CmsError> {
        self.authorize(actor, Ability::ManageThemes).await?;
        Ok(self.registry.activate_theme(slug).await?)
    }

    /// Uninstall an inactive theme
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `NotInstalled` or `ThemeActive`.
    pub async fn uninstall_theme(&self, actor: &Actor, slug: &str) -> Result<(), CmsError> {
        self.authorize(actor, Ability::ManageThemes).await?;
        Ok(self.registry.uninstall_theme(slug).await?)
    }

    /// Publish a theme's assets
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `NotInstalled`, `UnsafeAssetPath` or an I/O error.
    pub async fn publish_assets(&self, actor: &Actor, slug: &str) -> Result<PublishReport, CmsError> {
        self.authorize(actor, Ability::ManageThemes).await?;
        Ok(self.registry.publish_assets(slug).await?)
    }

    /// Save customizer values, returning the effective settings
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `NotInstalled` or `InvalidCustomizerValue`.
    pub async fn save_customizer(
        &self,
        actor: &Actor,
        slug: &str,
        values: Map<String, Value>,
    ) -> Result<Map<String, Value>, CmsError> {
        self.authorize(actor, Ability::CustomizeThemes).await?;
        Ok(self.registry.save_customizer(slug, values).await?)
    }

    /// Create (`id == 0`) or update a stored template
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`, `InvalidSettings` for an empty slug, or a store
    /// error.
    pub async fn save_template(&self, actor: &Actor, template: Template) -> Result<Template, CmsError> {
        self.authorize(actor, Ability::EditTemplates).await?;
        if template.slug.trim().is_empty() {
            return Err(CmsError::InvalidSettings("template slug is empty".to_string()));
        }
        let undeclared: Vec<String> = template
            .placeholders()
            .difference(&template.variables)
            .cloned()
            .collect();
        if !undeclared.is_empty() {
            tracing::debug!(template = %template.slug, ?undeclared, "placeholders without declared variables");
        }
        let saved = self.templates.save_template(template).await?;
        tracing::info!(template_id = saved.id, slug = %saved.slug, "template saved");
        Ok(saved)
    }

    /// Render a stored template with sample values
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` or `NotFound`.
    pub async fn preview_template(
        &self,
        actor: &Actor,
        template_id: i64,
        values: &Map<String, Value>,
    ) -> Result<String, CmsError> {
        self.authorize(actor, Ability::EditTemplates).await?;
        let template = self
            .templates
            .template(template_id)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("template {template_id}")))?;
        Ok(template.render_with_data(values))
    }

    /// Create (`id == 0`) or update a post type
    ///
    /// Cached resolutions for the post type are dropped before returning.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` or a store error (duplicate slug is a conflict).
    pub async fn save_post_type(&self, actor: &Actor, post_type: PostType) -> Result<PostType, CmsError> {
        self.authorize(actor, Ability::EditPostTypes).await?;
        let saved = self.content.save_post_type(post_type).await?;
        self.resolver.invalidate_post_type(saved.id);
        self.sitemap.invalidate().await;
        tracing::info!(post_type = %saved.slug, id = saved.id, "post type saved");
        Ok(saved)
    }

    /// Delete a post type
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` or a store error.
    pub async fn delete_post_type(&self, actor: &Actor, id: i64) -> Result<bool, CmsError> {
        self.authorize(actor, Ability::EditPostTypes).await?;
        let deleted = self.content.delete_post_type(id).await?;
        self.resolver.invalidate_post_type(id);
        if deleted {
            self.sitemap.invalidate().await;
            tracing::info!(id, "post type deleted");
        }
        Ok(deleted)
    }

    /// Save sitemap settings
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` or `InvalidSettings`.
    pub async fn save_sitemap_settings(
        &self,
        actor: &Actor,
        settings: SitemapSettings,
    ) -> Result<SitemapSettings, CmsError> {
        self.authorize(actor, Ability::ManageSitemap).await?;
        self.sitemap.save_settings(settings).await
    }

    /// Force sitemap regeneration
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`.
    pub async fn regenerate_sitemap(&self, actor: &Actor) -> Result<String, CmsError> {
        self.authorize(actor, Ability::ManageSitemap).await?;
        Ok(self.sitemap.regenerate().await)
    }
}

const fn ability_label(ability: Ability) -> &'static str {
    match ability {
        Ability::ManageThemes => "manage themes",
        Ability::CustomizeThemes => "customize themes",
        Ability::EditTemplates => "edit templates",
        Ability::EditPostTypes => "edit post types",
        Ability::ManageSitemap => "manage the sitemap",
    }
}
