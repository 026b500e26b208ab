//! Active theme provider
//!
//! One injected service answers "which theme is active" for the whole
//! process. It is refreshed from the theme store on activation and notifies
//! registered listeners (the resolver cache) before the refresh returns.
//!
//! Activations and refreshes are serialized: a store read and the write of
//! its result into the provider happen under one lock, so a slow read can
//! never replace the value a later activation installed.

use super::Theme;
use crate::error::StoreError;
use crate::store::ThemeStore;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

type Listener = Box<dyn Fn(Option<&Theme>) + Send + Sync>;

/// Holds the currently active theme
pub struct ActiveThemeProvider {
    store: Arc<dyn ThemeStore>,
    current: RwLock<Option<Arc<Theme>>>,
    listeners: RwLock<Vec<Listener>>,
    switching: Mutex<()>,
}

impl fmt::Debug for ActiveThemeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveThemeProvider")
            .field("current", &self.current.read().as_ref().map(|t| t.slug.clone()))
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}

impl ActiveThemeProvider {
    /// Create a provider with no active theme loaded yet
    #[must_use]
    pub fn new(store: Arc<dyn ThemeStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
            switching: Mutex::new(()),
        }
    }

    /// Create a provider and load the active theme
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    pub async fn load(store: Arc<dyn ThemeStore>) -> Result<Self, StoreError> {
        let provider = Self::new(store);
        provider.refresh().await?;
        Ok(provider)
    }

    /// The active theme, if any
    #[must_use]
    pub fn current(&self) -> Option<Arc<Theme>> {
        self.current.read().clone()
    }

    /// Slug of the active theme
    #[must_use]
    pub fn current_slug(&self) -> Option<String> {
        self.current.read().as_ref().map(|theme| theme.slug.clone())
    }

    /// Reload from the store and notify listeners
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read. The previous value
    /// is kept in that case.
    pub async fn refresh(&self) -> Result<Option<Arc<Theme>>, StoreError> {
        let _guard = self.switching.lock().await;
        self.reload().await
    }

    /// Activate `slug` in the store and reload, as one step
    ///
    /// Returns `false`, changing nothing, when the store refuses the slug.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn activate(&self, slug: &str) -> Result<bool, StoreError> {
        let _guard = self.switching.lock().await;
        if !self.store.activate(slug).await? {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    /// Reload only when the stored active theme differs from the held one
    ///
    /// Picks up activations and customizer saves made by another process
    /// sharing the store. Returns whether listeners were notified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    pub async fn sync(&self) -> Result<bool, StoreError> {
        let _guard = self.switching.lock().await;
        let stored = self.store.active().await?;
        if stored.as_ref() == self.current.read().as_deref() {
            return Ok(false);
        }
        tracing::info!(theme = ?stored.as_ref().map(|t| &t.slug), "active theme changed in store");
        self.install(stored.map(Arc::new));
        Ok(true)
    }

    async fn reload(&self) -> Result<Option<Arc<Theme>>, StoreError> {
        let active = self.store.active().await?.map(Arc::new);
        self.install(active.clone());
        Ok(active)
    }

    fn install(&self, active: Option<Arc<Theme>>) {
        *self.current.write() = active.clone();
        tracing::debug!(theme = ?active.as_ref().map(|t| &t.slug), "active theme refreshed");
        self.notify(active.as_deref());
    }

    /// Register a callback fired after every refresh
    pub fn on_change(&self, listener: impl Fn(Option<&Theme>) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    fn notify(&self, theme: Option<&Theme>) {
        for listener in self.listeners.read().iter() {
            listener(theme);
        }
    }
}
