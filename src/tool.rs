//! Tool (function) definitions, calls, and choice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request, made by the assistant, to invoke a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn default_kind() -> String {
    "function".to_string()
}

/// `arguments` is always a JSON-encoded string, per vendor convention —
/// callers parse it themselves once they've matched it to a `Tool`
/// definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A tool (function) definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub function: FunctionDefinition,
}

impl Tool {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: ParametersSchema) -> Self {
        Tool {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParametersSchema,
}

/// A restricted JSON-schema shape: always an object at the top level,
/// with named properties and an ordered `required` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParametersSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Property>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// Which tool (if any) the model must use on its next turn. Carries its
/// own `Serialize`/`Deserialize` derive for `Config`'s persistence format;
/// each vendor translator still encodes it into that vendor's own wire
/// shape separately (string vs. object, differing field names) rather
/// than reusing this representation on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto { disable_parallel: bool },
    Any { disable_parallel: bool },
    Specific { name: String, disable_parallel: bool },
    None,
}

impl ToolChoice {
    pub fn auto() -> Self {
        ToolChoice::Auto { disable_parallel: false }
    }

    pub fn any() -> Self {
        ToolChoice::Any { disable_parallel: false }
    }

    pub fn specific(name: impl Into<String>) -> Self {
        ToolChoice::Specific {
            name: name.into(),
            disable_parallel: false,
        }
    }

    pub fn none() -> Self {
        ToolChoice::None
    }

    pub fn disabling_parallel(self) -> Self {
        match self {
            ToolChoice::Auto { .. } => ToolChoice::Auto { disable_parallel: true },
            ToolChoice::Any { .. } => ToolChoice::Any { disable_parallel: true },
            ToolChoice::Specific { name, .. } => ToolChoice::Specific {
                name,
                disable_parallel: true,
            },
            ToolChoice::None => ToolChoice::None,
        }
    }
}
