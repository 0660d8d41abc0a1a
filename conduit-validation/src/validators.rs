// Built-in validators over JSON values

use crate::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Canonical UUID pattern used by id fields.
pub static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

/// Returns true for values that count as "not provided": missing, null, empty
/// string or empty array.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// JSON type a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    /// Check whether `value` has this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Magnitude used by min/max: numeric value for numbers, length for strings and arrays.
fn measure(value: &Value) -> Option<(f64, &'static str)> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| (v, "")),
        Value::String(s) => Some((s.chars().count() as f64, " characters")),
        Value::Array(items) => Some((items.len() as f64, " items")),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Validates that a value is present and not blank
pub struct Required;

impl Required {
    pub fn validate(value: Option<&Value>, field: &str) -> Result<(), ValidationError> {
        if is_blank(value) {
            Err(ValidationError::new(field, format!("{} is required", field))
                .with_constraint("required"))
        } else {
            Ok(())
        }
    }
}

/// Validates the JSON type of a value
pub struct IsType(pub FieldType);

impl IsType {
    pub fn validate(&self, value: &Value, field: &str) -> Result<(), ValidationError> {
        if self.0.matches(value) {
            Ok(())
        } else {
            Err(
                ValidationError::new(field, format!("{} must be of type {}", field, self.0))
                    .with_constraint("type")
                    .with_value(describe(value)),
            )
        }
    }
}

/// Lower bound on a number, or on the length of a string or array
pub struct Min(pub f64);

impl Min {
    pub fn validate(&self, value: &Value, field: &str) -> Result<(), ValidationError> {
        match measure(value) {
            Some((actual, unit)) if actual < self.0 => Err(ValidationError::new(
                field,
                format!("{} must be at least {}{}", field, self.0, unit),
            )
            .with_constraint("min")
            .with_value(describe(value))),
            _ => Ok(()),
        }
    }
}

/// Upper bound on a number, or on the length of a string or array
pub struct Max(pub f64);

impl Max {
    pub fn validate(&self, value: &Value, field: &str) -> Result<(), ValidationError> {
        match measure(value) {
            Some((actual, unit)) if actual > self.0 => Err(ValidationError::new(
                field,
                format!("{} must be at most {}{}", field, self.0, unit),
            )
            .with_constraint("max")
            .with_value(describe(value))),
            _ => Ok(()),
        }
    }
}

/// Validates that a string matches a regex pattern
pub struct Matches<'a>(pub &'a Regex);

impl Matches<'_> {
    pub fn validate(&self, value: &Value, field: &str) -> Result<(), ValidationError> {
        match value {
            Value::String(s) if !self.0.is_match(s) => Err(ValidationError::new(
                field,
                format!("{} has an invalid format", field),
            )
            .with_constraint("pattern")
            .with_value(s.clone())),
            _ => Ok(()),
        }
    }
}

/// Validates that a value is one of an allowed set
pub struct OneOf<'a>(pub &'a [Value]);

impl OneOf<'_> {
    pub fn validate(&self, value: &Value, field: &str) -> Result<(), ValidationError> {
        if self.0.iter().any(|allowed| allowed == value || same_number(allowed, value)) {
            return Ok(());
        }
        let allowed: Vec<String> = self.0.iter().map(describe).collect();
        Err(ValidationError::new(
            field,
            format!("{} must be one of: {}", field, allowed.join(", ")),
        )
        .with_constraint("enum")
        .with_value(describe(value)))
    }
}

// 1 and 1.0 are different serde_json numbers but the same enum member.
fn same_number(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
