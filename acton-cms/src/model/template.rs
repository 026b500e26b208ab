//! Database-stored template overrides

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Role of a stored template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    /// Full page layout
    Layout,
    /// Reusable fragment
    Partial,
    /// Single entry
    Single,
    /// Listing
    Archive,
    /// Page header
    Header,
    /// Page footer
    Footer,
}

/// Template row edited by administrators
///
/// Stored templates form an override layer above theme files: an active row
/// whose slug matches a logical template name replaces the theme's file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Primary key
    pub id: i64,
    /// Display name
    pub name: String,
    /// Logical name the row overrides ("header", "page", ...)
    pub slug: String,
    /// Role
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    /// Raw body with `{{name}}` placeholders
    pub content: String,
    /// Declared placeholder names
    #[serde(default)]
    pub variables: BTreeSet<String>,
    /// Default template for its type
    #[serde(default)]
    pub is_default: bool,
    /// Participates in overrides
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl Template {
    /// Substitute `{{name}}` placeholders with scalar values
    ///
    /// Strings, numbers and booleans are substituted. Arrays, objects, nulls
    /// and unknown names leave the placeholder untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_cms::model::{Template, TemplateType};
    /// use serde_json::json;
    ///
    /// let template = Template {
    ///     id: 1,
    ///     name: "Greeting".into(),
    ///     slug: "greeting".into(),
    ///     template_type: TemplateType::Partial,
    ///     content: "Hello {{ name }}, {{tags}}".into(),
    ///     variables: Default::default(),
    ///     is_default: false,
    ///     is_active: true,
    /// };
    /// let values = json!({"name": "Ada", "tags": ["a"]});
    /// let rendered = template.render_with_data(values.as_object().unwrap());
    /// assert_eq!(rendered, "Hello Ada, {{tags}}");
    /// ```
    #[must_use]
    pub fn render_with_data(&self, values: &Map<String, Value>) -> String {
        PLACEHOLDER
            .replace_all(&self.content, |caps: &Captures<'_>| {
                values
                    .get(&caps[1])
                    .and_then(scalar_to_string)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Declared variables without a scalar value in `values`
    #[must_use]
    pub fn missing_variables(&self, values: &Map<String, Value>) -> Vec<String> {
        self.variables
            .iter()
            .filter(|name| values.get(name.as_str()).and_then(scalar_to_string).is_none())
            .cloned()
            .collect()
    }

    /// Placeholder names that appear in the body
    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(&self.content)
            .map(|caps| caps[1].to_string())
            .collect()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
