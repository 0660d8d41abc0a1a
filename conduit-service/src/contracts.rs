//! Commands and queries accepted by the example service

use conduit_cqrs::{Command, Query};
use conduit_validation::{FieldRules, FieldType, UUID_PATTERN, Validate, ValidationDescriptor};
use serde::{Deserialize, Serialize};

use crate::domain::{Example, ExampleType, MetadataPatch};

fn example_id() -> FieldRules {
    FieldRules::for_field("id")
        .required()
        .of_type(FieldType::String)
        .pattern(&UUID_PATTERN)
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExample {
    pub name: String,
    pub description: String,
    pub version: f64,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub example_type: Option<String>,
}

impl Validate for CreateExample {
    fn validation() -> ValidationDescriptor {
        ValidationDescriptor::new()
            .field(
                FieldRules::for_field("name")
                    .required()
                    .of_type(FieldType::String)
                    .min(1.0)
                    .max(100.0),
            )
            .field(
                FieldRules::for_field("description")
                    .required()
                    .of_type(FieldType::String)
                    .min(1.0),
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
                    .one_of(ExampleType::names()),
            )
    }
}

impl Command for CreateExample {
    type Output = Example;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExample {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataPatch>,
    /// Type id
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub example_type: Option<i64>,
}

impl Validate for UpdateExample {
    fn validation() -> ValidationDescriptor {
        ValidationDescriptor::new()
            .field(example_id())
            .field(
                FieldRules::for_field("name")
                    .of_type(FieldType::String)
                    .min(1.0)
                    .max(100.0),
            )
            .field(FieldRules::for_field("metadata").of_type(FieldType::Object))
            .field(
                FieldRules::for_field("type")
                    .of_type(FieldType::Integer)
                    .one_of(ExampleType::ids()),
            )
    }
}

impl Command for UpdateExample {
    type Output = Example;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteExample {
    pub id: String,
}

impl Validate for DeleteExample {
    fn validation() -> ValidationDescriptor {
        ValidationDescriptor::new().field(example_id())
    }
}

impl Command for DeleteExample {
    type Output = bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVersion {
    pub id: String,
    pub new_version: f64,
}

impl Validate for UpdateVersion {
    fn validation() -> ValidationDescriptor {
        ValidationDescriptor::new().field(example_id()).field(
            FieldRules::for_field("newVersion")
                .required()
                .of_type(FieldType::Number)
                .min(0.0),
        )
    }
}

impl Command for UpdateVersion {
    type Output = bool;
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetExampleById {
    pub id: String,
}

impl Validate for GetExampleById {
    fn validation() -> ValidationDescriptor {
        ValidationDescriptor::new().field(example_id())
    }
}

impl Query for GetExampleById {
    type Output = Example;
}

/// All examples, optionally filtered by a case-insensitive name fragment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetAllExamples {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Validate for GetAllExamples {
    fn validation() -> ValidationDescriptor {
        ValidationDescriptor::new().field(
            FieldRules::for_field("name")
                .of_type(FieldType::String)
                .max(100.0),
        )
    }
}

impl Query for GetAllExamples {
    type Output = Vec<Example>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetExampleByName {
    pub name: String,
}

impl Validate for GetExampleByName {
    fn validation() -> ValidationDescriptor {
        ValidationDescriptor::new().field(
            FieldRules::for_field("name")
                .required()
                .of_type(FieldType::String)
                .max(100.0),
        )
    }
}

impl Query for GetExampleByName {
    type Output = Example;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_example_reports_each_invalid_field() {
        let errors = CreateExample::validate_json(&json!({
            "name": "",
            "description": "ok",
            "version": -1,
            "type": "Unknown"
        }))
        .unwrap_err();

        assert_eq!(errors.fields(), vec!["name", "version", "type"]);
    }

    #[test]
    fn test_create_example_type_is_optional() {
        assert!(
            CreateExample::validate_json(&json!({
                "name": "first",
                "description": "a thing",
                "version": 0
            }))
            .is_ok()
        );
    }

    #[test]
    fn test_update_example_requires_uuid_and_known_type() {
        let errors = UpdateExample::validate_json(&json!({ "id": "nope", "type": 9 })).unwrap_err();
        assert_eq!(errors.fields(), vec!["id", "type"]);

        assert!(
            UpdateExample::validate_json(&json!({
                "id": "0b9e8a52-3f4c-4d5e-9a1b-2c3d4e5f6a7b",
                "type": 1,
                "metadata": { "version": 2 }
            }))
            .is_ok()
        );
    }

    #[test]
    fn test_update_version_rejects_negative() {
        let errors = UpdateVersion::validate_json(&json!({
            "id": "0b9e8a52-3f4c-4d5e-9a1b-2c3d4e5f6a7b",
            "newVersion": -3
        }))
        .unwrap_err();
        assert_eq!(errors.fields(), vec!["newVersion"]);
    }

    #[test]
    fn test_query_names() {
        assert_eq!(GetAllExamples::name(), "GetAllExamples");
        assert_eq!(CreateExample::name(), "CreateExample");
    }

    #[test]
    fn test_get_by_name_requires_name() {
        let errors = GetExampleByName::validate_json(&json!({})).unwrap_err();
        assert_eq!(errors.fields(), vec!["name"]);
        assert!(GetAllExamples::validate_json(&json!({})).is_ok());
    }
}
