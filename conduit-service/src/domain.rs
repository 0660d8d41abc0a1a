//! Example aggregate and its value types

use std::fmt;

use chrono::Utc;
use conduit_events::{DomainEvents, HasDomainEvents};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::events::{ExampleCreated, ExampleDeleted, ExampleMetadataUpdated, ExampleTypeChanged};

/// Enumeration of example kinds, serialized as `{ "id": .., "name": .. }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExampleType {
    #[default]
    Default,
    Other,
}

impl ExampleType {
    pub const ALL: [ExampleType; 2] = [ExampleType::Default, ExampleType::Other];

    pub fn id(&self) -> i64 {
        match self {
            ExampleType::Default => 0,
            ExampleType::Other => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExampleType::Default => "Default",
            ExampleType::Other => "Other",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(|t| t.name())
    }

    pub fn ids() -> impl Iterator<Item = i64> {
        Self::ALL.into_iter().map(|t| t.id())
    }
}

impl fmt::Display for ExampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ExampleType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExampleType", 2)?;
        state.serialize_field("id", &self.id())?;
        state.serialize_field("name", self.name())?;
        state.end()
    }
}

/// Description and version of an example
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExampleMetadata {
    pub description: String,
    pub version: f64,
}

impl ExampleMetadata {
    pub fn new(description: impl Into<String>, version: f64) -> Self {
        Self {
            description: description.into(),
            version,
        }
    }

    /// Overwrite the fields present in `patch`
    pub fn update(&mut self, patch: &MetadataPatch) {
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
    }
}

/// Partial metadata update
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f64>,
}

impl MetadataPatch {
    pub fn version(version: f64) -> Self {
        Self {
            description: None,
            version: Some(version),
        }
    }
}

/// Example aggregate root.
///
/// Behaviour methods change state and record a domain event; the events stay
/// buffered until the repository publishes them after a write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    pub id: String,
    pub name: String,
    pub metadata: ExampleMetadata,
    #[serde(rename = "type")]
    pub example_type: ExampleType,
    #[serde(skip)]
    events: DomainEvents,
}

impl Example {
    pub fn new(name: impl Into<String>, metadata: ExampleMetadata, example_type: ExampleType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            metadata,
            example_type,
            events: DomainEvents::new(),
        }
    }

    pub fn create(&mut self) {
        self.events.add(ExampleCreated {
            example_id: self.id.clone(),
            date_time_occurred: Utc::now(),
        });
    }

    pub fn delete(&mut self) {
        self.events.add(ExampleDeleted {
            example_id: self.id.clone(),
            date_time_occurred: Utc::now(),
        });
    }

    pub fn change_type(&mut self, new_type: ExampleType) {
        self.example_type = new_type;
        self.events.add(ExampleTypeChanged {
            example_id: self.id.clone(),
            new_type,
            date_time_occurred: Utc::now(),
        });
    }

    pub fn change_metadata(&mut self, patch: &MetadataPatch) {
        self.metadata.update(patch);
        self.events.add(ExampleMetadataUpdated {
            example_id: self.id.clone(),
            metadata: self.metadata.clone(),
            date_time_occurred: Utc::now(),
        });
    }

    /// Copy of the aggregate without its pending events
    pub fn snapshot(&self) -> Self {
        Self {
            events: DomainEvents::new(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl HasDomainEvents for Example {
    fn domain_events(&self) -> &DomainEvents {
        &self.events
    }

    fn domain_events_mut(&mut self) -> &mut DomainEvents {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn example() -> Example {
        Example::new("first", ExampleMetadata::new("a thing", 1.0), ExampleType::Default)
    }

    #[test]
    fn test_type_lookup() {
        assert_eq!(ExampleType::from_name("Other"), Some(ExampleType::Other));
        assert_eq!(ExampleType::from_id(0), Some(ExampleType::Default));
        assert_eq!(ExampleType::from_id(7), None);
        assert_eq!(ExampleType::names().collect::<Vec<_>>(), vec!["Default", "Other"]);
    }

    #[test]
    fn test_type_serializes_as_enumeration() {
        assert_eq!(
            serde_json::to_value(ExampleType::Other).unwrap(),
            json!({ "id": 1, "name": "Other" })
        );
    }

    #[test]
    fn test_metadata_patch_keeps_missing_fields() {
        let mut metadata = ExampleMetadata::new("before", 1.0);
        metadata.update(&MetadataPatch::version(2.0));
        assert_eq!(metadata, ExampleMetadata::new("before", 2.0));
    }

    #[test]
    fn test_behaviours_record_events_in_order() {
        let mut example = example();
        example.create();
        example.change_type(ExampleType::Other);
        example.change_metadata(&MetadataPatch::version(3.0));
        example.delete();

        assert_eq!(
            example.domain_events().names(),
            vec![
                "ExampleCreated",
                "ExampleTypeChanged",
                "ExampleMetadataUpdated",
                "ExampleDeleted"
            ]
        );
        assert_eq!(example.example_type, ExampleType::Other);
        assert_eq!(example.metadata.version, 3.0);
    }

    #[test]
    fn test_snapshot_drops_pending_events() {
        let mut example = example();
        example.create();
        let snapshot = example.snapshot();
        assert!(snapshot.domain_events().is_empty());
        assert_eq!(snapshot.id, example.id);
        assert_eq!(example.domain_events().len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(example()).unwrap();
        assert_eq!(value["name"], "first");
        assert_eq!(value["type"]["name"], "Default");
        assert_eq!(value["metadata"]["version"], 1.0);
        assert!(value.get("events").is_none());
    }
}
