//! JSON-schema descriptions for tool parameters.
//!
//! A deliberately small subset of JSON Schema: enough to describe tool
//! signatures to a provider API. Serializes to the standard wire shape
//! (`{"type": "object", "properties": ...}`).

use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        items: Box<JsonSchema>,
    },
    Object {
        properties: BTreeMap<String, JsonSchema>,
        #[serde(skip_serializing_if = "Option::is_none")]
        required: Option<Vec<String>>,
        #[serde(
            rename = "additionalProperties",
            skip_serializing_if = "Option::is_none"
        )]
        additional_properties: Option<bool>,
    },
}

impl JsonSchema {
    pub fn string(description: impl Into<String>) -> Self {
        Self::String {
            description: Some(description.into()),
        }
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::Integer {
            description: Some(description.into()),
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::Number {
            description: Some(description.into()),
        }
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::Boolean {
            description: Some(description.into()),
        }
    }

    /// An object schema from `(name, schema, required)` triples.
    pub fn object(fields: Vec<(&str, JsonSchema, bool)>) -> Self {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for (name, schema, is_required) in fields {
            if is_required {
                required.push(name.to_string());
            }
            properties.insert(name.to_string(), schema);
        }
        Self::Object {
            properties,
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
            additional_properties: Some(false),
        }
    }

    /// An object schema with no parameters.
    pub fn empty_object() -> Self {
        Self::Object {
            properties: BTreeMap::new(),
            required: None,
            additional_properties: Some(false),
        }
    }
}
