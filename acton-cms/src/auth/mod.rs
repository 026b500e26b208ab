//! Permission checks
//!
//! Authentication and role storage live outside this crate. The core only
//! asks a [`PermissionChecker`] before every mutating operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The user performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// User id
    pub id: i64,
    /// Display name, for logs
    pub name: String,
}

impl Actor {
    /// Create an actor
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Abilities checked by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    /// Install, activate, uninstall themes and publish assets
    ManageThemes,
    /// Save customizer values
    CustomizeThemes,
    /// Create and edit stored templates
    EditTemplates,
    /// Create, edit and delete post types
    EditPostTypes,
    /// Edit sitemap settings and regenerate
    ManageSitemap,
}

/// Permission-check capability provided by the host application
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Whether `actor` may perform `ability`
    async fn can(&self, actor: &Actor, ability: Ability) -> bool;
}

/// Grants everything; for CLI operators and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionChecker for AllowAll {
    async fn can(&self, _actor: &Actor, _ability: Ability) -> bool {
        true
    }
}

/// Fixed grants per user id
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    grants: HashMap<i64, HashSet<Ability>>,
}

impl StaticPermissions {
    /// Create an empty grant table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant abilities to a user
    #[must_use]
    pub fn grant(mut self, user_id: i64, abilities: impl IntoIterator<Item = Ability>) -> Self {
        self.grants.entry(user_id).or_default().extend(abilities);
        self
    }
}

#[async_trait]
impl PermissionChecker for StaticPermissions {
    async fn can(&self, actor: &Actor, ability: Ability) -> bool {
        self.grants
            .get(&actor.id)
            .is_some_and(|abilities| abilities.contains(&ability))
    }
}
