//! Resolution cache
//!
//! Maps `(active theme, post type, kind)` to the resolved template reference.
//! Entries live until invalidated; there is no TTL.

use super::{RenderKind, TemplateRef, TemplateSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Active theme slug
    pub theme: String,
    /// Post type id, `None` for site-wide listings
    pub post_type_id: Option<i64>,
    /// Requested kind
    pub kind: RenderKind,
}

/// Shared resolution cache
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    entries: Arc<RwLock<HashMap<CacheKey, TemplateRef>>>,
}

impl ResolutionCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached reference, if still consistent with the filesystem
    ///
    /// A theme-file entry whose file has vanished is dropped and reported as
    /// a miss.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<TemplateRef> {
        let cached = self.entries.read().get(key).cloned()?;
        if let TemplateSource::Theme { path } = &cached.source {
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "cached template vanished");
                self.entries.write().remove(key);
                return None;
            }
        }
        Some(cached)
    }

    /// Store a resolution
    pub fn insert(&self, key: CacheKey, template: TemplateRef) {
        self.entries.write().insert(key, template);
    }

    /// Drop every entry for a post type
    pub fn invalidate_post_type(&self, post_type_id: i64) {
        self.entries
            .write()
            .retain(|key, _| key.post_type_id != Some(post_type_id));
    }

    /// Drop everything
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(post_type_id: i64) -> CacheKey {
        CacheKey {
            theme: "flexia".into(),
            post_type_id: Some(post_type_id),
            kind: RenderKind::Single,
        }
    }

    fn stored(id: i64) -> TemplateRef {
        TemplateRef {
            name: format!("template-{id}"),
            source: TemplateSource::Stored { id },
            theme: Some("flexia".into()),
        }
    }

    #[test]
    fn test_insert_and_invalidate_post_type() {
        let cache = ResolutionCache::new();
        cache.insert(key(1), stored(7));
        cache.insert(key(2), stored(8));
        assert_eq!(cache.get(&key(1)), Some(stored(7)));

        cache.invalidate_post_type(1);
        assert!(cache.get(&key(1)).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_vanished_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "x").unwrap();

        let cache = ResolutionCache::new();
        cache.insert(
            key(1),
            TemplateRef {
                name: "page".into(),
                source: TemplateSource::Theme { path: path.clone() },
                theme: Some("flexia".into()),
            },
        );
        assert!(cache.get(&key(1)).is_some());

        std::fs::remove_file(&path).unwrap();
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());
    }
}
