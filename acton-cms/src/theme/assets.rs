//! Theme asset publishing
//!
//! Declared asset files (and directories, recursively) are copied from the
//! theme package into `{public_root}/themes/{slug}/`, keeping their
//! theme-relative paths:
//!
//! ```text
//! themes/flexia/assets/app.css  ->  public/themes/flexia/assets/app.css
//! ```
//!
//! Each file is written to a temporary sibling and renamed into place, so a
//! concurrent reader sees either the old or the new file, and repeated
//! publishes leave the same tree behind.

use super::Theme;
use crate::error::ThemeError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use walkdir::WalkDir;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Outcome of a publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Published files, relative to the theme's public directory
    pub copied: Vec<PathBuf>,
    /// Declared paths with no source on disk
    pub missing: Vec<String>,
    /// SHA-256 over the published paths and contents
    pub fingerprint: String,
}

/// Copies theme assets into the public root
#[derive(Debug, Clone)]
pub struct AssetPublisher {
    public_root: PathBuf,
}

impl AssetPublisher {
    /// Create a publisher for a public root directory
    #[must_use]
    pub fn new(public_root: impl Into<PathBuf>) -> Self {
        Self {
            public_root: public_root.into(),
        }
    }

    /// Public directory of a theme
    #[must_use]
    pub fn target_dir(&self, slug: &str) -> PathBuf {
        self.public_root.join("themes").join(slug)
    }

    /// Publish every declared asset of a theme
    ///
    /// All declared paths are checked before anything is copied.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::UnsafeAssetPath`] if any path escapes the theme
    /// directory, or [`ThemeError::Io`] if a copy fails.
    pub async fn publish(&self, theme: &Theme) -> Result<PublishReport, ThemeError> {
        let mut sources = Vec::new();
        for path in theme.assets.values().flat_map(super::AssetRef::paths) {
            let source = theme
                .resolve_path(path)
                .ok_or_else(|| ThemeError::UnsafeAssetPath(path.to_string()))?;
            sources.push((path.to_string(), source));
        }

        let target = self.target_dir(&theme.slug);
        let mut files: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        let mut report = PublishReport::default();

        for (declared, source) in sources {
            if source.is_dir() {
                for entry in WalkDir::new(&source)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                {
                    if let Ok(relative) = entry.path().strip_prefix(&theme.directory_path) {
                        files.insert(relative.to_path_buf(), entry.path().to_path_buf());
                    }
                }
            } else if source.is_file() {
                if let Ok(relative) = source.strip_prefix(&theme.directory_path) {
                    files.insert(relative.to_path_buf(), source.clone());
                }
            } else {
                tracing::warn!(theme = %theme.slug, asset = %declared, "declared asset not found");
                report.missing.push(declared);
            }
        }

        let mut hasher = Sha256::new();
        for (relative, source) in &files {
            let bytes = fs::read(source).await?;
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0]);
            hasher.update(&bytes);
            write_atomically(&target.join(relative), &bytes).await?;
        }

        report.copied = files.into_keys().collect();
        report.fingerprint = hex::encode(hasher.finalize());
        tracing::info!(
            theme = %theme.slug,
            copied = report.copied.len(),
            missing = report.missing.len(),
            "published theme assets"
        );
        Ok(report)
    }

    /// Remove a theme's published directory
    ///
    /// Returns `false` if nothing was published.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Io`] if removal fails.
    pub async fn remove(&self, slug: &str) -> Result<bool, ThemeError> {
        let target = self.target_dir(slug);
        match fs::remove_dir_all(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_atomically(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut temp = dest.as_os_str().to_owned();
    temp.push(format!(".{}.{counter}.tmp", std::process::id()));
    let temp = PathBuf::from(temp);

    fs::write(&temp, bytes).await?;
    if let Err(e) = fs::rename(&temp, dest).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}
