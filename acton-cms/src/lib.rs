//! acton-cms: themes, template resolution and page composition for content sites
//!
//! A request for a page flows through four pieces:
//!
//! 1. [`composer::PageComposer`] builds the data contract (entry or listing,
//!    site values, theme settings, menus, terms).
//! 2. [`template::TemplateResolver`] picks a template: a stored override on
//!    the post type, then the active theme's manifest, conventional files and
//!    generic fallbacks.
//! 3. The [`render`] adapters (markup templates or registered components)
//!    try the template, the theme's declared kind first.
//! 4. If nothing renders, the caller gets the contract back and serves it
//!    as JSON.
//!
//! [`theme::ThemeRegistry`] discovers, installs and activates theme packages;
//! [`sitemap::SitemapAggregator`] publishes a cached sitemap over the same
//! content model.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use acton_cms::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     acton_cms::observability::init()?;
//!
//!     let config = CmsConfig::load_for_service("my-site")?;
//!     let state = CmsState::from_config(config).await?;
//!     acton_cms::web::serve(state).await
//! }
//! ```

pub mod admin;
pub mod auth;
pub mod composer;
pub mod config;
pub mod error;
pub mod health;
pub mod model;
pub mod observability;
pub mod render;
pub mod sitemap;
pub mod state;
pub mod store;
pub mod template;
pub mod theme;
pub mod web;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use acton_cms::prelude::*;
    //! ```

    pub use crate::admin::CmsAdmin;
    pub use crate::auth::{Ability, Actor, AllowAll, PermissionChecker, StaticPermissions};
    pub use crate::composer::{DataContract, IndexOverrides, PageComposer, PageResult, RenderedPage};
    pub use crate::config::CmsConfig;
    pub use crate::error::{CmsError, ManifestError, StoreError, ThemeError};
    pub use crate::model::{Content, ContentStatus, Page, Pagination, PostType, Template, TemplateType};
    pub use crate::render::{Component, ComponentRegistry, RendererAdapter};
    pub use crate::sitemap::{SitemapAggregator, SitemapSettings};
    pub use crate::state::{Backends, CmsState};
    pub use crate::store::{ContentStore, SettingsStore, TemplateStore, ThemeStore};
    pub use crate::template::{RenderKind, RenderRequest, TemplateRef, TemplateResolver};
    pub use crate::theme::{ActiveThemeProvider, Theme, ThemeKind, ThemeManifest, ThemeRegistry};

    pub use axum;
    pub use serde_json::json;
}
