// Validation traits

use crate::{ValidationDescriptor, ValidationError, ValidationErrors};
use serde::Serialize;
use serde_json::Value;

/// Types that carry a validation descriptor.
///
/// Validation runs on the JSON form so that raw request bodies can be checked
/// before they are deserialized into the typed value.
pub trait Validate {
    /// Field rules for this type
    fn validation() -> ValidationDescriptor
    where
        Self: Sized;

    /// Validate a raw JSON document against [`Validate::validation`]
    fn validate_json(data: &Value) -> Result<(), ValidationErrors>
    where
        Self: Sized,
    {
        Self::validation().validate(data)
    }

    /// Validate an already-typed value through its JSON form
    fn validate(&self) -> Result<(), ValidationErrors>
    where
        Self: Serialize + Sized,
    {
        let value = serde_json::to_value(self).map_err(|e| {
            ValidationErrors::new(vec![
                ValidationError::new("$", format!("value could not be serialized: {}", e))
                    .with_constraint("serialize"),
            ])
        })?;
        Self::validate_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldRules, FieldType};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Rename {
        name: String,
    }

    impl Validate for Rename {
        fn validation() -> ValidationDescriptor {
            ValidationDescriptor::new().field(
                FieldRules::for_field("name")
                    .required()
                    .of_type(FieldType::String)
                    .max(5.0),
            )
        }
    }

    #[test]
    fn test_validate_typed_value() {
        assert!(Rename { name: "abc".into() }.validate().is_ok());
        let errors = Rename { name: "abcdefgh".into() }.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["name"]);
    }

    #[test]
    fn test_validate_raw_json() {
        assert!(Rename::validate_json(&serde_json::json!({})).is_err());
    }
}
