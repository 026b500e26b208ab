//! SQLite theme store

use super::{StoreResult, ThemeStore};
use crate::error::StoreError;
use crate::theme::{AssetRef, CustomizerField, Theme, ThemeKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS themes (
    slug               TEXT PRIMARY KEY NOT NULL,
    name               TEXT NOT NULL,
    version            TEXT NOT NULL,
    description        TEXT,
    author             TEXT,
    kind               TEXT NOT NULL,
    template_extension TEXT NOT NULL,
    directory_path     TEXT NOT NULL,
    templates          TEXT NOT NULL,
    partials           TEXT NOT NULL,
    assets             TEXT NOT NULL,
    customizer_schema  TEXT NOT NULL,
    customizer_values  TEXT NOT NULL,
    supports           TEXT NOT NULL,
    tags               TEXT NOT NULL,
    is_installed       INTEGER NOT NULL DEFAULT 1,
    is_active          INTEGER NOT NULL DEFAULT 0,
    installed_at       TEXT NOT NULL,
    installed_by       INTEGER
)
";

const COLUMNS: &str = "slug, name, version, description, author, kind, template_extension, \
    directory_path, templates, partials, assets, customizer_schema, customizer_values, \
    supports, tags, is_installed, is_active, installed_at, installed_by";

#[derive(Debug, FromRow)]
struct ThemeRow {
    slug: String,
    name: String,
    version: String,
    description: Option<String>,
    author: Option<String>,
    kind: String,
    template_extension: String,
    directory_path: String,
    templates: Json<BTreeMap<String, String>>,
    partials: Json<BTreeMap<String, String>>,
    assets: Json<BTreeMap<String, AssetRef>>,
    customizer_schema: Json<BTreeMap<String, CustomizerField>>,
    customizer_values: Json<Map<String, Value>>,
    supports: Json<BTreeSet<String>>,
    tags: Json<Vec<String>>,
    is_installed: bool,
    is_active: bool,
    installed_at: DateTime<Utc>,
    installed_by: Option<i64>,
}

impl TryFrom<ThemeRow> for Theme {
    type Error = StoreError;

    fn try_from(row: ThemeRow) -> Result<Self, Self::Error> {
        let kind = [ThemeKind::Markup, ThemeKind::Component]
            .into_iter()
            .find(|kind| kind.as_str() == row.kind)
            .ok_or_else(|| {
                StoreError::Corrupt(format!("theme '{}' has unknown kind '{}'", row.slug, row.kind))
            })?;
        Ok(Self {
            slug: row.slug,
            name: row.name,
            version: row.version,
            description: row.description,
            author: row.author,
            kind,
            template_extension: row.template_extension,
            directory_path: PathBuf::from(row.directory_path),
            templates: row.templates.0,
            partials: row.partials.0,
            assets: row.assets.0,
            customizer_schema: row.customizer_schema.0,
            customizer_values: row.customizer_values.0,
            supports: row.supports.0,
            tags: row.tags.0,
            is_installed: row.is_installed,
            is_active: row.is_active,
            installed_at: row.installed_at,
            installed_by: row.installed_by,
        })
    }
}

/// Theme rows persisted in SQLite
///
/// The table is created on [`SqlThemeStore::migrate`]. Activation is a single
/// `UPDATE` statement, so SQLite applies deactivate-all and activate-one as
/// one atomic write.
#[derive(Debug, Clone)]
pub struct SqlThemeStore {
    pool: SqlitePool,
}

impl SqlThemeStore {
    /// Wrap an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool and create the schema
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be opened.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        // An in-memory database lives only as long as its single connection
        let options = if is_memory_url(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = options.connect(url).await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create the `themes` table if it does not exist
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the statement fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ThemeStore for SqlThemeStore {
    async fn all(&self) -> StoreResult<Vec<Theme>> {
        let rows = sqlx::query_as::<_, ThemeRow>(&format!(
            "SELECT {COLUMNS} FROM themes ORDER BY slug"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Theme::try_from).collect()
    }

    async fn find(&self, slug: &str) -> StoreResult<Option<Theme>> {
        let row = sqlx::query_as::<_, ThemeRow>(&format!(
            "SELECT {COLUMNS} FROM themes WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Theme::try_from).transpose()
    }

    async fn active(&self) -> StoreResult<Option<Theme>> {
        let row = sqlx::query_as::<_, ThemeRow>(&format!(
            "SELECT {COLUMNS} FROM themes WHERE is_active = 1 ORDER BY slug LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Theme::try_from).transpose()
    }

    async fn insert(&self, theme: Theme) -> StoreResult<Theme> {
        let result = sqlx::query(&format!(
            "INSERT INTO themes ({COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&theme.slug)
        .bind(&theme.name)
        .bind(&theme.version)
        .bind(&theme.description)
        .bind(&theme.author)
        .bind(theme.kind.as_str())
        .bind(&theme.template_extension)
        .bind(theme.directory_path.to_string_lossy().into_owned())
        .bind(Json(&theme.templates))
        .bind(Json(&theme.partials))
        .bind(Json(&theme.assets))
        .bind(Json(&theme.customizer_schema))
        .bind(Json(&theme.customizer_values))
        .bind(Json(&theme.supports))
        .bind(Json(&theme.tags))
        .bind(theme.is_installed)
        .bind(theme.is_active)
        .bind(theme.installed_at)
        .bind(theme.installed_by)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(theme),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict(
                format!("theme '{}' already exists", theme.slug),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_customizer(&self, slug: &str, values: Map<String, Value>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE themes SET customizer_values = ? WHERE slug = ?")
            .bind(Json(values))
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn activate(&self, slug: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE themes
            SET is_active = CASE WHEN slug = ?1 THEN 1 ELSE 0 END
            WHERE EXISTS (SELECT 1 FROM themes WHERE slug = ?1 AND is_installed = 1)
            ",
        )
        .bind(slug)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, slug: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM themes WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Whether a database URL points at an in-memory SQLite database
#[must_use]
pub fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeManifest;
    use serde_json::json;

    async fn store() -> SqlThemeStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqlThemeStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    fn theme(slug: &str) -> Theme {
        let manifest: ThemeManifest = serde_json::from_value(json!({
            "slug": slug,
            "name": slug,
            "type": "component",
            "templates": {"page": "Pages/Page.tsx"},
            "assets": {"css": ["assets/app.css"]},
            "customizer": {"accent": {"type": "color", "default": "#fff"}}
        }))
        .unwrap();
        Theme::from_manifest(&manifest, Some(7))
    }

    #[tokio::test]
    async fn test_insert_and_find_round_trips_columns() {
        let store = store().await;
        store.insert(theme("flexia")).await.unwrap();

        let found = store.find("flexia").await.unwrap().unwrap();
        assert_eq!(found.kind, ThemeKind::Component);
        assert_eq!(found.templates["page"], "Pages/Page.tsx");
        assert_eq!(found.installed_by, Some(7));
        assert!(found.is_installed);
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = store().await;
        store.insert(theme("flexia")).await.unwrap();
        assert!(matches!(
            store.insert(theme("flexia")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_activate_switches_exactly_one() {
        let store = store().await;
        store.insert(theme("alpha")).await.unwrap();
        store.insert(theme("beta")).await.unwrap();

        assert!(store.activate("alpha").await.unwrap());
        assert!(store.activate("beta").await.unwrap());
        assert_eq!(store.active().await.unwrap().unwrap().slug, "beta");

        let active = store.all().await.unwrap().into_iter().filter(|t| t.is_active).count();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn test_activate_unknown_changes_nothing() {
        let store = store().await;
        store.insert(theme("alpha")).await.unwrap();
        store.activate("alpha").await.unwrap();

        assert!(!store.activate("ghost").await.unwrap());
        assert_eq!(store.active().await.unwrap().unwrap().slug, "alpha");
    }

    #[tokio::test]
    async fn test_update_customizer_and_delete() {
        let store = store().await;
        store.insert(theme("alpha")).await.unwrap();

        let mut values = Map::new();
        values.insert("accent".into(), json!("#000"));
        assert!(store.update_customizer("alpha", values).await.unwrap());
        assert_eq!(
            store.find("alpha").await.unwrap().unwrap().customizer_values["accent"],
            json!("#000")
        );

        assert!(store.delete("alpha").await.unwrap());
        assert!(!store.delete("alpha").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_corrupt_not_markup() {
        let store = store().await;
        store.insert(theme("alpha")).await.unwrap();
        store.activate("alpha").await.unwrap();
        sqlx::query("UPDATE themes SET kind = 'vue' WHERE slug = 'alpha'")
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(store.find("alpha").await, Err(StoreError::Corrupt(_))));
        assert!(matches!(store.active().await, Err(StoreError::Corrupt(_))));
        assert!(matches!(store.all().await, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_is_memory_url() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file?mode=memory"));
        assert!(!is_memory_url("sqlite://./acton-cms.db?mode=rwc"));
    }
}
