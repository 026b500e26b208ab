//! Theme manifest schema
//!
//! Manifests are parsed and validated once, at discovery time. Every optional
//! key has a documented default so downstream code never re-checks:
//!
//! | key                 | default                              |
//! |---------------------|--------------------------------------|
//! | `slug`              | theme directory name                 |
//! | `name`              | slug                                 |
//! | `version`           | `"0.0.0"`                            |
//! | `type`              | `markup`                             |
//! | `templateExtension` | `html` (markup) / `tsx` (component)  |
//! | `templates`, `partials`, `assets`, `customizer` | empty map |
//! | `supports`, `tags`  | empty list                           |

use super::{safe_join, CustomizerField, FieldType, ThemeKind};
use crate::error::ManifestError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

static SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("slug pattern is valid"));

/// One asset path or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetRef {
    /// Single path
    Single(String),
    /// Several paths
    Many(Vec<String>),
}

impl AssetRef {
    /// Iterate the declared paths
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        let paths: &[String] = match self {
            Self::Single(path) => std::slice::from_ref(path),
            Self::Many(paths) => paths,
        };
        paths.iter().map(String::as_str)
    }
}

/// Parsed and validated theme manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeManifest {
    /// Unique URL-safe slug
    #[serde(default)]
    pub slug: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Version
    #[serde(default = "default_version")]
    pub version: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Author
    #[serde(default)]
    pub author: Option<String>,
    /// Rendering technology
    #[serde(default, rename = "type")]
    pub kind: ThemeKind,
    /// Template file extension
    #[serde(default)]
    pub template_extension: Option<String>,
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
    pub customizer: BTreeMap<String, CustomizerField>,
    /// Feature flags
    #[serde(default)]
    pub supports: BTreeSet<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Directory the manifest was loaded from
    #[serde(skip)]
    pub directory: PathBuf,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

impl ThemeManifest {
    /// Load the manifest from a theme directory
    ///
    /// Tries `manifest_files` in order. Returns `Ok(None)` when the directory
    /// has no manifest at all (not a theme package).
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the manifest cannot be read, parsed or
    /// validated.
    pub fn load(dir: &Path, manifest_files: &[String]) -> Result<Option<Self>, ManifestError> {
        let Some(path) = manifest_files
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
        else {
            return Ok(None);
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;

        let manifest = Self::parse(&path, &raw)?;
        manifest.with_directory(dir.to_path_buf()).validated(&path).map(Some)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ManifestError> {
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let parsed = if is_toml {
            toml::from_str::<Self>(raw).map_err(|e| e.to_string())
        } else {
            serde_json::from_str::<Self>(raw).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ManifestError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Attach the package directory and fill directory-derived defaults
    #[must_use]
    pub fn with_directory(mut self, directory: PathBuf) -> Self {
        if self.slug.trim().is_empty() {
            if let Some(name) = directory.file_name().and_then(|n| n.to_str()) {
                self.slug = name.to_lowercase();
            }
        }
        if self.name.trim().is_empty() {
            self.name.clone_from(&self.slug);
        }
        self.directory = directory;
        self
    }

    fn validated(self, path: &Path) -> Result<Self, ManifestError> {
        let invalid = |reason: String| ManifestError::Invalid {
            path: path.to_path_buf(),
            reason,
        };

        if !SLUG.is_match(&self.slug) {
            return Err(invalid(format!("slug '{}' is not URL-safe", self.slug)));
        }

        let ext = self.template_extension();
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(format!("template extension '{ext}' is not valid")));
        }

        let declared = self
            .templates
            .values()
            .chain(self.partials.values())
            .map(String::as_str)
            .chain(self.assets.values().flat_map(AssetRef::paths));
        for relative in declared {
            if safe_join(&self.directory, relative).is_none() {
                return Err(invalid(format!("path '{relative}' escapes the theme directory")));
            }
        }

        for (key, field) in &self.customizer {
            if field.field_type == FieldType::Select && field.options.is_empty() {
                return Err(invalid(format!("customizer select '{key}' has no options")));
            }
        }

        Ok(self)
    }

    /// Declared template extension without a leading dot, or the kind default
    #[must_use]
    pub fn template_extension(&self) -> String {
        self.template_extension
            .as_deref()
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .unwrap_or_else(|| self.kind.default_extension().to_string())
    }
}
