// Validation descriptors

use crate::{
    FieldType, IsType, Matches, Max, Min, OneOf, Required, ValidationError, ValidationErrors,
    is_blank,
};
use regex::Regex;
use serde_json::Value;

/// A single rule attached to a field. Presence is tracked by
/// [`FieldRules::required`] since it is checked before any rule runs.
#[derive(Debug, Clone)]
pub enum Rule {
    Type(FieldType),
    Min(f64),
    Max(f64),
    Pattern(Regex),
    Enum(Vec<Value>),
}

impl Rule {
    fn check(&self, value: &Value, field: &str) -> Result<(), ValidationError> {
        match self {
            Rule::Type(ty) => IsType(*ty).validate(value, field),
            Rule::Min(min) => Min(*min).validate(value, field),
            Rule::Max(max) => Max(*max).validate(value, field),
            Rule::Pattern(re) => Matches(re).validate(value, field),
            Rule::Enum(allowed) => OneOf(allowed).validate(value, field),
        }
    }
}

/// Ordered rules for one field
#[derive(Debug, Clone)]
pub struct FieldRules {
    field: String,
    required: bool,
    rules: Vec<Rule>,
}

impl FieldRules {
    /// Create new validation rules for a field
    pub fn for_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            required: false,
            rules: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn of_type(mut self, ty: FieldType) -> Self {
        self.rules.push(Rule::Type(ty));
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.rules.push(Rule::Min(min));
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.rules.push(Rule::Max(max));
        self
    }

    pub fn pattern(mut self, pattern: &Regex) -> Self {
        self.rules.push(Rule::Pattern(pattern.clone()));
        self
    }

    pub fn one_of<I, V>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rules
            .push(Rule::Enum(allowed.into_iter().map(Into::into).collect()));
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Validate one field's value, appending failures to `errors`.
    ///
    /// Blank optional values skip every rule. A type mismatch stops the
    /// remaining rules since bounds and patterns are meaningless on it.
    pub fn validate_into(&self, value: Option<&Value>, errors: &mut ValidationErrors) {
        if is_blank(value) {
            if self.required {
                if let Err(e) = Required::validate(value, &self.field) {
                    errors.add(e);
                }
            }
            return;
        }
        let Some(value) = value else { return };

        for rule in &self.rules {
            if let Err(e) = rule.check(value, &self.field) {
                let stop = matches!(rule, Rule::Type(_));
                errors.add(e);
                if stop {
                    break;
                }
            }
        }
    }
}

/// Validation descriptor for a command or query: field name to ordered rules.
#[derive(Debug, Clone, Default)]
pub struct ValidationDescriptor {
    fields: Vec<FieldRules>,
}

impl ValidationDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules for a field
    pub fn field(mut self, rules: FieldRules) -> Self {
        self.fields.push(rules);
        self
    }

    pub fn fields(&self) -> &[FieldRules] {
        &self.fields
    }

    /// Validate a JSON document. Non-object input is treated as having no fields.
    pub fn validate(&self, data: &Value) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let object = data.as_object();

        for rules in &self.fields {
            let value = object.and_then(|o| o.get(rules.field()));
            rules.validate_into(value, &mut errors);
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UUID_PATTERN;
    use serde_json::json;

    fn create_example() -> ValidationDescriptor {
        ValidationDescriptor::new()
            .field(
                FieldRules::for_field("name")
                    .required()
                    .of_type(FieldType::String)
                    .min(1.0)
                    .max(100.0),
            )
            .field(
                FieldRules::for_field("version")
                    .required()
                    .of_type(FieldType::Number)
                    .min(0.0),
            )
            .field(
                FieldRules::for_field("type")
                    .of_type(FieldType::String)
                    .one_of(["Default", "Other"]),
            )
    }

    #[test]
    fn test_valid_document() {
        let data = json!({ "name": "widget", "version": 2, "type": "Other" });
        assert!(create_example().validate(&data).is_ok());
    }

    #[test]
    fn test_errors_keyed_by_invalid_fields_only() {
        let data = json!({ "version": -1, "type": "Other" });
        let errors = create_example().validate(&data).unwrap_err();
        assert_eq!(errors.fields(), vec!["name", "version"]);
        assert_eq!(errors.to_field_map()["name"], vec!["name is required"]);
    }

    #[test]
    fn test_optional_blank_field_skips_rules() {
        let data = json!({ "name": "widget", "version": 0, "type": "" });
        assert!(create_example().validate(&data).is_ok());
    }

    #[test]
    fn test_type_mismatch_stops_field_rules() {
        let data = json!({ "name": 42, "version": 0 });
        let errors = create_example().validate(&data).unwrap_err();
        assert_eq!(errors.for_field("name").count(), 1);
        assert_eq!(errors.errors[0].constraint, "type");
    }

    #[test]
    fn test_pattern_rule() {
        let descriptor = ValidationDescriptor::new().field(
            FieldRules::for_field("id")
                .required()
                .of_type(FieldType::String)
                .pattern(&UUID_PATTERN),
        );
        assert!(descriptor.validate(&json!({ "id": "abc" })).is_err());
        assert!(
            descriptor
                .validate(&json!({ "id": "1b4e28ba-2fa1-4d2e-883f-0016d3cca427" }))
                .is_ok()
        );
    }

    #[test]
    fn test_required_is_a_flag_not_a_rule() {
        let rules = FieldRules::for_field("name").required().of_type(FieldType::String);
        assert!(rules.is_required());
        assert_eq!(rules.rules().len(), 1);
        assert!(matches!(rules.rules()[0], Rule::Type(FieldType::String)));
    }

    #[test]
    fn test_non_object_input() {
        let errors = create_example().validate(&json!(null)).unwrap_err();
        assert_eq!(errors.fields(), vec!["name", "version"]);
    }
}
