//! JSON-schema-lite validation of tool calls and structured-output schemas.
//!
//! Deliberately restricted to the shape `ParametersSchema`/`Property`
//! support rather than full JSON Schema: no `$ref`, no `oneOf`/`anyOf`, no
//! numeric `minimum`/`maximum`. That restriction is the schema type
//! itself, not a shortcut taken here.

use serde_json::Value;

use crate::tool::{ParametersSchema, Property, PropertyType, Tool, ToolCall};

/// A single schema violation, named by its JSON-pointer-ish path within
/// the argument value (e.g. `"$.city"`, `"$.items[2]"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate a JSON value against a top-level parameters schema. Returns an
/// empty list iff `value` fully satisfies `schema`.
pub fn validate_parameters(value: &Value, schema: &ParametersSchema) -> Vec<Violation> {
    let mut violations = Vec::new();
    validate_object(value, &schema.properties, &schema.required, "$", &mut violations);
    violations
}

/// Validate a tool call's `arguments` (a JSON-encoded string) against the
/// matching `Tool` definition. Finds the `Tool` by name; an unknown tool
/// name or unparseable arguments string is itself a violation rather than
/// a synchronous error, since this runs on both outbound requests and
/// vendor-originated tool calls that callers may want to merely log.
pub fn validate_tool_call(call: &ToolCall, tools: &[Tool]) -> Vec<Violation> {
    let Some(tool) = tools.iter().find(|t| t.function.name == call.function.name) else {
        return vec![Violation::new("$", format!("no tool named '{}' is defined", call.function.name))];
    };

    let arguments: Value = match serde_json::from_str(&call.function.arguments) {
        Ok(v) => v,
        Err(e) => return vec![Violation::new("$", format!("arguments are not valid JSON: {e}"))],
    };

    validate_parameters(&arguments, &tool.function.parameters)
}

fn validate_object(
    value: &Value,
    properties: &std::collections::BTreeMap<String, Property>,
    required: &[String],
    path: &str,
    violations: &mut Vec<Violation>,
) {
    let Value::Object(map) = value else {
        violations.push(Violation::new(path, format!("expected an object, got {}", type_name(value))));
        return;
    };

    for name in required {
        if !map.contains_key(name) {
            violations.push(Violation::new(format!("{path}.{name}"), "required property is missing".to_string()));
        }
    }

    for (name, prop_value) in map {
        let Some(property) = properties.get(name) else {
            // Unknown properties are tolerated: vendors commonly echo back
            // extra fields (ids, metadata) alongside the schema-declared
            // ones.
            continue;
        };
        validate_property(prop_value, property, &format!("{path}.{name}"), violations);
    }
}

fn validate_property(value: &Value, property: &Property, path: &str, violations: &mut Vec<Violation>) {
    let type_ok = match property.property_type {
        PropertyType::String => value.is_string(),
        PropertyType::Number => value.is_number(),
        PropertyType::Integer => value.is_i64() || value.is_u64(),
        PropertyType::Boolean => value.is_boolean(),
        PropertyType::Array => value.is_array(),
        PropertyType::Object => value.is_object(),
    };

    if !type_ok {
        violations.push(Violation::new(
            path,
            format!("expected {:?}, got {}", property.property_type, type_name(value)),
        ));
        return;
    }

    if let (Some(allowed), Value::String(s)) = (&property.r#enum, value) {
        if !allowed.contains(s) {
            violations.push(Violation::new(path, format!("'{s}' is not one of the allowed values")));
        }
    }

    if let (Some(item_schema), Value::Array(items)) = (&property.items, value) {
        for (i, item) in items.iter().enumerate() {
            validate_property(item, item_schema, &format!("{path}[{i}]"), violations);
        }
    }

    if let Some(nested) = &property.properties {
        let required = property.required.clone().unwrap_or_default();
        validate_object(value, nested, &required, path, violations);
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn weather_tool() -> Tool {
        let mut properties = BTreeMap::new();
        properties.insert(
            "city".to_string(),
            Property {
                property_type: PropertyType::String,
                description: None,
                items: None,
                r#enum: None,
                properties: None,
                required: None,
            },
        );
        properties.insert(
            "unit".to_string(),
            Property {
                property_type: PropertyType::String,
                description: None,
                items: None,
                r#enum: Some(vec!["celsius".to_string(), "fahrenheit".to_string()]),
                properties: None,
                required: None,
            },
        );

        Tool::function(
            "get_weather",
            "Look up the weather",
            ParametersSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec!["city".to_string()],
            },
        )
    }

    #[test]
    fn valid_arguments_produce_no_violations() {
        let call = ToolCall {
            id: "1".to_string(),
            kind: "function".to_string(),
            function: crate::tool::FunctionCall {
                name: "get_weather".to_string(),
                arguments: json!({"city": "Lisbon", "unit": "celsius"}).to_string(),
            },
        };
        assert!(validate_tool_call(&call, &[weather_tool()]).is_empty());
    }

    #[test]
    fn missing_required_property_is_a_violation() {
        let call = ToolCall {
            id: "1".to_string(),
            kind: "function".to_string(),
            function: crate::tool::FunctionCall {
                name: "get_weather".to_string(),
                arguments: json!({"unit": "celsius"}).to_string(),
            },
        };
        let violations = validate_tool_call(&call, &[weather_tool()]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "$.city");
    }

    #[test]
    fn enum_violation_is_reported() {
        let call = ToolCall {
            id: "1".to_string(),
            kind: "function".to_string(),
            function: crate::tool::FunctionCall {
                name: "get_weather".to_string(),
                arguments: json!({"city": "Lisbon", "unit": "kelvin"}).to_string(),
            },
        };
        let violations = validate_tool_call(&call, &[weather_tool()]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "$.unit");
    }
}
