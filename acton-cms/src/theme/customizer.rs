//! Theme customizer schema and value validation

use crate::error::ThemeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Customizer control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line text
    #[default]
    Text,
    /// Multi-line text
    Textarea,
    /// `#rgb` or `#rrggbb`
    Color,
    /// One of `options`
    Select,
    /// Boolean toggle
    Boolean,
    /// Numeric value
    Number,
    /// Image URL
    Image,
}

/// One customizer setting declared by a theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizerField {
    /// Control type
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Value used until an administrator saves one
    #[serde(default)]
    pub default: Value,
    /// Allowed values for `select`
    #[serde(default)]
    pub options: Vec<String>,
    /// Human label
    #[serde(default)]
    pub label: Option<String>,
}

impl CustomizerField {
    /// Check a submitted value against this field
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::InvalidCustomizerValue`] describing the mismatch.
    pub fn validate(&self, key: &str, value: &Value) -> Result<(), ThemeError> {
        let reject = |reason: &str| ThemeError::InvalidCustomizerValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        match self.field_type {
            FieldType::Text | FieldType::Textarea | FieldType::Image => {
                if !value.is_string() {
                    return Err(reject("expected a string"));
                }
            }
            FieldType::Color => {
                let valid = value.as_str().is_some_and(is_hex_color);
                if !valid {
                    return Err(reject("expected a #rgb or #rrggbb color"));
                }
            }
            FieldType::Select => {
                let valid = value
                    .as_str()
                    .is_some_and(|v| self.options.iter().any(|option| option == v));
                if !valid {
                    return Err(reject("value is not one of the declared options"));
                }
            }
            FieldType::Boolean => {
                if !value.is_boolean() {
                    return Err(reject("expected a boolean"));
                }
            }
            FieldType::Number => {
                if !value.is_number() {
                    return Err(reject("expected a number"));
                }
            }
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
