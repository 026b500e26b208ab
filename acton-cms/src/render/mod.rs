//! Renderer adapters
//!
//! Two implementations of one [`RendererAdapter`] trait: [`MarkupRenderer`]
//! for text-template themes and [`ComponentRenderer`] for component themes.
//! `try_render` returning `None` means "not mine"; the composer then tries
//! the next adapter. Adapter failures are logged and reported as `None`.

mod component;
mod markup;

pub use component::{Component, ComponentRegistry, ComponentRenderer};
pub use markup::MarkupRenderer;

use crate::composer::DataContract;
use crate::template::TemplateRef;
use crate::theme::ThemeKind;
use async_trait::async_trait;

/// Turns a template reference and a data contract into markup
#[async_trait]
pub trait RendererAdapter: Send + Sync {
    /// Theme kind this adapter is built for
    fn kind(&self) -> ThemeKind;

    /// Render, or decline with `None`
    async fn try_render(&self, template: &TemplateRef, contract: &DataContract) -> Option<String>;

    /// Wrap a fully composed page rendered by this adapter
    fn finalize(&self, body: String, _template: &TemplateRef, _contract: &DataContract) -> String {
        body
    }
}

/// The two concrete adapters
#[derive(Debug, Clone)]
pub enum Renderer {
    /// Text templates
    Markup(MarkupRenderer),
    /// Registered components
    Component(ComponentRenderer),
}

#[async_trait]
impl RendererAdapter for Renderer {
    fn kind(&self) -> ThemeKind {
        match self {
            Self::Markup(markup) => markup.kind(),
            Self::Component(component) => component.kind(),
        }
    }

    async fn try_render(&self, template: &TemplateRef, contract: &DataContract) -> Option<String> {
        match self {
            Self::Markup(markup) => markup.try_render(template, contract).await,
            Self::Component(component) => component.try_render(template, contract).await,
        }
    }

    fn finalize(&self, body: String, template: &TemplateRef, contract: &DataContract) -> String {
        match self {
            Self::Markup(markup) => markup.finalize(body, template, contract),
            Self::Component(component) => component.finalize(body, template, contract),
        }
    }
}

/// Adapters ordered for a theme kind: declared kind first, the other last
#[must_use]
pub fn ordered_for(renderers: &[Renderer], declared: ThemeKind) -> Vec<&Renderer> {
    let mut ordered: Vec<&Renderer> = renderers.iter().filter(|r| r.kind() == declared).collect();
    ordered.extend(renderers.iter().filter(|r| r.kind() == declared.other()));
    ordered
}
