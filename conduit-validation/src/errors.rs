// Validation errors

use std::collections::BTreeMap;
use std::fmt;

/// One failed rule on one field.
///
/// `constraint` names the rule kind (`required`, `type`, `min`, `max`,
/// `pattern`, `enum` or `custom`); `value` carries a short rendering of the
/// rejected input when the rule saw one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub constraint: String,
    pub value: Option<String>,
}

impl ValidationError {
    /// A `custom` failure with no captured value.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            constraint: "custom".into(),
            value: None,
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {} (got {})", self.field, self.message, value),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors, in the order the descriptor declared the fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Failures recorded against `field`, in declaration order.
    pub fn for_field(&self, field: &str) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// Names of the fields that failed, without duplicates
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for error in &self.errors {
            if !fields.contains(&error.field.as_str()) {
                fields.push(&error.field);
            }
        }
        fields
    }

    /// Field name to ordered messages
    pub fn to_field_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            map.entry(error.field.clone())
                .or_default()
                .push(error.message.clone());
        }
        map
    }

    /// Convert to the JSON map returned to clients
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_field_map()).unwrap_or(serde_json::Value::Null)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::new(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_map_groups_messages() {
        let errors = ValidationErrors::new(vec![
            ValidationError::new("name", "name is required"),
            ValidationError::new("version", "version must be at least 0"),
            ValidationError::new("name", "name must be of type string"),
        ]);

        let map = errors.to_field_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["name"].len(), 2);
        assert_eq!(errors.fields(), vec!["name", "version"]);
    }

    #[test]
    fn test_to_json_shape() {
        let errors = ValidationErrors::new(vec![ValidationError::new("id", "id is required")]);
        assert_eq!(
            errors.to_json(),
            serde_json::json!({ "id": ["id is required"] })
        );
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::default().into_result().is_ok());
        let errors = ValidationErrors::new(vec![ValidationError::new("a", "bad")]);
        assert!(errors.into_result().is_err());
    }
}
