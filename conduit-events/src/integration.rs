//! Integration envelope

use crate::event::short_type_name;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Wire envelope for an event crossing a transport boundary.
///
/// Serialized as `{ "name", "data", "eventId" }`. Fields are private so an
/// envelope cannot be altered once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    name: String,
    data: Value,
    #[serde(rename = "eventId")]
    event_id: String,
}

impl Integration {
    /// Wrap `payload`, naming the envelope after the payload's type.
    pub fn new<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Self::named(short_type_name::<T>(), payload)
    }

    /// Wrap `payload` under an explicit name.
    pub fn named<T: Serialize + ?Sized>(
        name: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::from_value(name, serde_json::to_value(payload)?))
    }

    /// Wrap an already-encoded payload under a fresh event id.
    pub fn from_value(name: impl Into<String>, data: Value) -> Self {
        Self::from_parts(name, data, Uuid::new_v4().to_string())
    }

    /// Build an envelope from already-encoded parts, keeping the given id.
    pub fn from_parts(
        name: impl Into<String>,
        data: Value,
        event_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            event_id: event_id.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Deduplication key, `name:eventId`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.event_id)
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Encode the envelope for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode an envelope from the wire.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn into_data(self) -> Value {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct ItemCreated {
        id: String,
    }

    #[test]
    fn test_name_from_type() {
        let integration = Integration::new(&ItemCreated { id: "x".into() }).unwrap();
        assert_eq!(integration.name(), "ItemCreated");
        assert_eq!(integration.data(), &json!({ "id": "x" }));
        assert!(Uuid::parse_str(integration.event_id()).is_ok());
    }

    #[test]
    fn test_fresh_ids() {
        let a = Integration::named("Ping", &json!({})).unwrap();
        let b = Integration::named("Ping", &json!({})).unwrap();
        assert_ne!(a.event_id(), b.event_id());
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_wire_format() {
        let integration = Integration::from_parts("ItemCreated", json!({ "id": "x" }), "e1");
        let wire: Value = serde_json::from_slice(&integration.to_bytes().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({ "name": "ItemCreated", "data": { "id": "x" }, "eventId": "e1" })
        );
        assert_eq!(integration.key(), "ItemCreated:e1");

        let back = Integration::from_slice(&integration.to_bytes().unwrap()).unwrap();
        assert_eq!(back.decode::<ItemCreated>().unwrap().id, "x");
    }

    #[test]
    fn test_undecodable_body() {
        assert!(Integration::from_slice(b"not json").is_err());
        assert!(Integration::from_slice(br#"{"name":"x"}"#).is_err());
    }
}
