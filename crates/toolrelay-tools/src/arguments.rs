//! Schema-driven coercion of model text into structured tool arguments.
//!
//! Models do not always emit a JSON object for a tool call. A bare ticker
//! symbol, a quoted string or a number is common when a tool takes a single
//! parameter. The adapter reads the tool's advertised input schema once and
//! decides how such text maps onto the parameters.

use serde_json::{Map, Number, Value};

use crate::ToolError;

/// JSON Schema primitive type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// No type, or one we don't coerce
    Any,
}

impl ParamType {
    fn from_schema(schema: &Value) -> Self {
        // `"type": ["string", "null"]` uses the first non-null entry
        let ty = match schema.get("type") {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).find(|t| *t != "null"),
            _ => None,
        };
        match ty {
            Some("string") => ParamType::String,
            Some("number") => ParamType::Number,
            Some("integer") => ParamType::Integer,
            Some("boolean") => ParamType::Boolean,
            Some("array") => ParamType::Array,
            Some("object") => ParamType::Object,
            _ => ParamType::Any,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }
}

/// Maps free-form tool input onto a tool's parameter object.
#[derive(Debug, Clone, Default)]
pub struct ArgumentAdapter {
    properties: Vec<(String, ParamType)>,
    required: Vec<String>,
}

impl ArgumentAdapter {
    /// Derive an adapter from a JSON Schema object.
    pub fn from_schema(schema: &Value) -> Self {
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| (name.clone(), ParamType::from_schema(prop)))
                    .collect()
            })
            .unwrap_or_default();

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|req| req.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        Self { properties, required }
    }

    /// Required parameter names.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// The parameter that non-object input is bound to: the only required
    /// property, else the only property.
    pub fn target_field(&self) -> Option<(&str, ParamType)> {
        if self.required.len() == 1 {
            let name = self.required[0].as_str();
            let ty = self
                .properties
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, t)| *t)
                .unwrap_or(ParamType::Any);
            return Some((name, ty));
        }
        if self.required.is_empty() && self.properties.len() == 1 {
            let (name, ty) = &self.properties[0];
            return Some((name.as_str(), *ty));
        }
        None
    }

    /// Turn model-supplied text into a JSON object of arguments.
    pub fn coerce(&self, input: &str) -> Result<Value, ToolError> {
        let text = input.trim();

        if text.is_empty() {
            return match self.required.first() {
                None => Ok(Value::Object(Map::new())),
                Some(name) => Err(ToolError::missing_param(name)),
            };
        }

        let parsed = serde_json::from_str::<Value>(text).ok();

        if let Some(Value::Object(map)) = parsed {
            return self.check_required(map);
        }

        let (field, ty) = self.target_field().ok_or_else(|| {
            ToolError::invalid_args(format!(
                "expected a JSON object with parameters [{}]",
                self.properties
                    .iter()
                    .map(|(n, _)| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        let value = convert(field, ty, text, parsed)?;
        let mut map = Map::new();
        map.insert(field.to_string(), value);
        Ok(Value::Object(map))
    }

    fn check_required(&self, map: Map<String, Value>) -> Result<Value, ToolError> {
        if let Some(missing) = self.required.iter().find(|r| !map.contains_key(r.as_str())) {
            return Err(ToolError::missing_param(missing));
        }
        Ok(Value::Object(map))
    }
}

/// Convert a scalar input to the declared type of `field`.
fn convert(field: &str, ty: ParamType, raw: &str, parsed: Option<Value>) -> Result<Value, ToolError> {
    // A quoted JSON string contributes its contents, not its quotes
    let text = match parsed {
        Some(Value::String(ref s)) => s.trim().to_string(),
        _ => raw.to_string(),
    };

    match ty {
        ParamType::String => Ok(Value::String(text)),
        ParamType::Number => match parsed {
            Some(Value::Number(n)) => Ok(Value::Number(n)),
            _ => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ToolError::wrong_type(field, ty.name())),
        },
        ParamType::Integer => match parsed {
            Some(Value::Number(ref n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n.clone())),
            _ => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| ToolError::wrong_type(field, ty.name())),
        },
        ParamType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(ToolError::wrong_type(field, ty.name())),
        },
        ParamType::Array => match parsed {
            Some(v @ Value::Array(_)) => Ok(v),
            _ => Err(ToolError::wrong_type(field, ty.name())),
        },
        ParamType::Object => Err(ToolError::wrong_type(field, ty.name())),
        ParamType::Any => Ok(match parsed {
            Some(Value::String(_)) | None => Value::String(text),
            Some(v) => v,
        }),
    }
}
