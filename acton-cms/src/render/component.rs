//! Component renderer
//!
//! Component themes register their page components at startup, keyed by
//! theme slug and component name. A template reference is matched by its
//! theme-relative path without extension (`Pages/Page` for
//! `Pages/Page.tsx`), then by its logical name.
//!
//! The composed page is wrapped in a server-rendered envelope carrying the
//! component name, its props, the URL and the theme version:
//!
//! ```html
//! <div id="app" data-page="{&quot;component&quot;:&quot;Pages/Page&quot;,...}">...</div>
//! ```

use super::RendererAdapter;
use crate::composer::DataContract;
use crate::template::TemplateRef;
use crate::theme::{ActiveThemeProvider, Theme, ThemeKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A server-side page component
pub trait Component: Send + Sync {
    /// Render with the data contract as props
    ///
    /// # Errors
    ///
    /// Any error is logged and the component treated as unable to render.
    fn render(&self, props: &Value) -> anyhow::Result<String>;
}

impl<F> Component for F
where
    F: Fn(&Value) -> anyhow::Result<String> + Send + Sync,
{
    fn render(&self, props: &Value) -> anyhow::Result<String> {
        self(props)
    }
}

/// Components registered per theme
#[derive(Default)]
pub struct ComponentRegistry {
    components: RwLock<HashMap<(String, String), Arc<dyn Component>>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .components
            .read()
            .keys()
            .map(|(theme, name)| format!("{theme}:{name}"))
            .collect();
        names.sort();
        f.debug_struct("ComponentRegistry").field("components", &names).finish()
    }
}

impl ComponentRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component for a theme
    pub fn register(
        &self,
        theme: impl Into<String>,
        name: impl Into<String>,
        component: impl Component + 'static,
    ) {
        let key = (theme.into(), name.into());
        tracing::debug!(theme = %key.0, component = %key.1, "component registered");
        self.components.write().insert(key, Arc::new(component));
    }

    /// Look up a component
    #[must_use]
    pub fn get(&self, theme: &str, name: &str) -> Option<Arc<dyn Component>> {
        self.components
            .read()
            .get(&(theme.to_string(), name.to_string()))
            .cloned()
    }

    /// Whether a theme registered anything
    #[must_use]
    pub fn has_theme(&self, theme: &str) -> bool {
        self.components.read().keys().any(|(slug, _)| slug == theme)
    }
}

/// Renders component themes
#[derive(Clone)]
pub struct ComponentRenderer {
    provider: Arc<ActiveThemeProvider>,
    registry: Arc<ComponentRegistry>,
}

impl fmt::Debug for ComponentRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRenderer")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ComponentRenderer {
    /// Create a renderer over a registry
    #[must_use]
    pub const fn new(provider: Arc<ActiveThemeProvider>, registry: Arc<ComponentRegistry>) -> Self {
        Self { provider, registry }
    }

    /// Registered components
    #[must_use]
    pub const fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    fn component_theme(&self) -> Option<Arc<Theme>> {
        self.provider
            .current()
            .filter(|theme| theme.kind == ThemeKind::Component)
    }

    fn matching(&self, theme: &Theme, template: &TemplateRef) -> Option<(String, Arc<dyn Component>)> {
        let by_path = template.path().and_then(|path| {
            let relative = path.strip_prefix(&theme.directory_path).ok()?;
            let stem = relative.with_extension("");
            Some(stem.to_string_lossy().replace('\\', "/"))
        });
        by_path
            .into_iter()
            .chain(std::iter::once(template.name.clone()))
            .find_map(|name| {
                let component = self.registry.get(&theme.slug, &name)?;
                Some((name, component))
            })
    }
}

#[async_trait]
impl RendererAdapter for ComponentRenderer {
    fn kind(&self) -> ThemeKind {
        ThemeKind::Component
    }

    async fn try_render(&self, template: &TemplateRef, contract: &DataContract) -> Option<String> {
        let theme = self.component_theme()?;
        let (name, component) = self.matching(&theme, template)?;

        let props = match serde_json::to_value(contract) {
            Ok(props) => props,
            Err(e) => {
                tracing::warn!(component = %name, error = %e, "props serialization failed");
                return None;
            }
        };
        match component.render(&props) {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!(component = %name, error = %e, "component render failed");
                None
            }
        }
    }

    fn finalize(&self, body: String, template: &TemplateRef, contract: &DataContract) -> String {
        let Some(theme) = self.component_theme() else {
            return body;
        };
        let component = self
            .matching(&theme, template)
            .map_or_else(|| template.name.clone(), |(name, _)| name);

        let mut props = contract.clone();
        props.slots.clear();
        let page = json!({
            "component": component,
            "props": props,
            "url": contract.meta.url,
            "version": theme.version,
        });
        format!(
            r#"<div id="app" data-page="{}">{body}</div>"#,
            escape_attribute(&page.to_string())
        )
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}
