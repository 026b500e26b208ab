//! Themes: manifests, registry, active theme tracking
//!
//! A theme is a directory under the configured themes root containing a
//! manifest (`theme.json` or `theme.toml`), templates, partials and assets.
//! Exactly one installed theme is active at a time.
//!
//! ```text
//! themes/
//! └── flexia/
//!     ├── theme.json
//!     ├── templates/
//!     │   ├── page.html
//!     │   └── posts.html
//!     ├── partials/
//!     │   ├── header.html
//!     │   └── footer.html
//!     └── assets/
//!         └── app.css
//! ```

mod assets;
mod customizer;
mod manifest;
mod provider;
mod registry;

pub use assets::{AssetPublisher, PublishReport};
pub use customizer::{CustomizerField, FieldType};
pub use manifest::{AssetRef, ThemeManifest};
pub use provider::ActiveThemeProvider;
pub use registry::ThemeRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Rendering technology a theme is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKind {
    /// Text templates rendered on the server
    #[default]
    Markup,
    /// Registered components rendered into a page envelope
    Component,
}

impl ThemeKind {
    /// The other kind, tried as a last resort
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Markup => Self::Component,
            Self::Component => Self::Markup,
        }
    }

    /// Template file extension used when the manifest declares none
    #[must_use]
    pub const fn default_extension(self) -> &'static str {
        match self {
            Self::Markup => "html",
            Self::Component => "tsx",
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Component => "component",
        }
    }
}

/// An installed theme row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Unique URL-safe slug
    pub slug: String,
    /// Display name
    pub name: String,
    /// Version string from the manifest
    pub version: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Author
    #[serde(default)]
    pub author: Option<String>,
    /// Rendering technology
    pub kind: ThemeKind,
    /// Template file extension without the dot
    pub template_extension: String,
    /// Theme package directory
    pub directory_path: PathBuf,
    /// Logical template name to theme-relative path
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    /// Partial name to theme-relative path
    #[serde(default)]
    pub partials: BTreeMap<String, String>,
    /// Asset group to path(s)
    #[serde(default)]
    pub assets: BTreeMap<String, AssetRef>,
    /// Customizer schema
    #[serde(default)]
    pub customizer_schema: BTreeMap<String, CustomizerField>,
    /// Saved customizer values
    #[serde(default)]
    pub customizer_values: Map<String, Value>,
    /// Feature flags
    #[serde(default)]
    pub supports: BTreeSet<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Installed flag
    pub is_installed: bool,
    /// Active flag
    pub is_active: bool,
    /// Installation time
    pub installed_at: DateTime<Utc>,
    /// Installing user
    #[serde(default)]
    pub installed_by: Option<i64>,
}

impl Theme {
    /// Build an installed (inactive) theme row from a parsed manifest
    #[must_use]
    pub fn from_manifest(manifest: &ThemeManifest, installed_by: Option<i64>) -> Self {
        Self {
            slug: manifest.slug.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            description: manifest.description.clone(),
            author: manifest.author.clone(),
            kind: manifest.kind,
            template_extension: manifest.template_extension(),
            directory_path: manifest.directory.clone(),
            templates: manifest.templates.clone(),
            partials: manifest.partials.clone(),
            assets: manifest.assets.clone(),
            customizer_schema: manifest.customizer.clone(),
            customizer_values: Map::new(),
            supports: manifest.supports.clone(),
            tags: manifest.tags.clone(),
            is_installed: true,
            is_active: false,
            installed_at: Utc::now(),
            installed_by,
        }
    }

    /// Absolute path of a theme-relative file
    ///
    /// Returns `None` when the relative path would escape the theme directory.
    #[must_use]
    pub fn resolve_path(&self, relative: &str) -> Option<PathBuf> {
        safe_join(&self.directory_path, relative)
    }

    /// Customizer defaults overlaid with saved values
    #[must_use]
    pub fn settings(&self) -> Map<String, Value> {
        let mut settings: Map<String, Value> = self
            .customizer_schema
            .iter()
            .map(|(key, field)| (key.clone(), field.default.clone()))
            .collect();
        for (key, value) in &self.customizer_values {
            settings.insert(key.clone(), value.clone());
        }
        settings
    }

    /// Public URLs of published assets grouped like the manifest
    #[must_use]
    pub fn asset_urls(&self) -> BTreeMap<String, Vec<String>> {
        self.assets
            .iter()
            .map(|(group, asset)| {
                let urls = asset
                    .paths()
                    .map(|path| format!("/themes/{}/{}", self.slug, path.trim_start_matches("./")))
                    .collect();
                (group.clone(), urls)
            })
            .collect()
    }

    /// Whether the theme declares a feature flag
    #[must_use]
    pub fn supports(&self, feature: &str) -> bool {
        self.supports.contains(feature)
    }
}

/// Join a relative path onto a base, rejecting absolute paths and `..`
#[must_use]
pub fn safe_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative.trim_start_matches("./"));
    let safe = relative.components().all(|component| {
        matches!(component, std::path::Component::Normal(_) | std::path::Component::CurDir)
    });
    (safe && !relative.as_os_str().is_empty()).then(|| base.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn theme() -> Theme {
        let manifest: ThemeManifest = serde_json::from_value(json!({
            "slug": "flexia",
            "name": "Flexia",
            "version": "1.2.0",
            "assets": {"css": ["assets/app.css"], "js": "assets/app.js"},
            "customizer": {
                "accent": {"type": "color", "default": "#336699"},
                "layout": {"type": "select", "default": "wide", "options": ["wide", "boxed"]}
            },
            "supports": ["menus"]
        }))
        .unwrap();
        Theme::from_manifest(&manifest.with_directory(PathBuf::from("/themes/flexia")), Some(1))
    }

    #[test]
    fn test_from_manifest() {
        let theme = theme();
        assert!(theme.is_installed);
        assert!(!theme.is_active);
        assert_eq!(theme.template_extension, "html");
        assert_eq!(theme.installed_by, Some(1));
        assert!(theme.supports("menus"));
    }

    #[test]
    fn test_settings_overlay() {
        let mut theme = theme();
        assert_eq!(theme.settings()["accent"], json!("#336699"));

        theme.customizer_values.insert("accent".into(), json!("#000"));
        let settings = theme.settings();
        assert_eq!(settings["accent"], json!("#000"));
        assert_eq!(settings["layout"], json!("wide"));
    }

    #[test]
    fn test_asset_urls() {
        let urls = theme().asset_urls();
        assert_eq!(urls["css"], vec!["/themes/flexia/assets/app.css"]);
        assert_eq!(urls["js"], vec!["/themes/flexia/assets/app.js"]);
    }

    #[test]
    fn test_safe_join() {
        let base = Path::new("/themes/flexia");
        assert_eq!(
            safe_join(base, "templates/page.html"),
            Some(PathBuf::from("/themes/flexia/templates/page.html"))
        );
        assert_eq!(safe_join(base, "../other/theme.json"), None);
        assert_eq!(safe_join(base, "/etc/passwd"), None);
        assert_eq!(safe_join(base, ""), None);
    }

    #[test]
    fn test_kind_other() {
        assert_eq!(ThemeKind::Markup.other(), ThemeKind::Component);
        assert_eq!(ThemeKind::Component.default_extension(), "tsx");
    }
}
