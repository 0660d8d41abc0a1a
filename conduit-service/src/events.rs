//! Domain events recorded by the example aggregate

use chrono::{DateTime, Utc};
use conduit_events::DomainEvent;
use serde::Serialize;

use crate::domain::{ExampleMetadata, ExampleType};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleCreated {
    pub example_id: String,
    pub date_time_occurred: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleDeleted {
    pub example_id: String,
    pub date_time_occurred: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleTypeChanged {
    pub example_id: String,
    pub new_type: ExampleType,
    pub date_time_occurred: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleMetadataUpdated {
    pub example_id: String,
    pub metadata: ExampleMetadata,
    pub date_time_occurred: DateTime<Utc>,
}

macro_rules! domain_event {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl DomainEvent for $ty {
                fn date_time_occurred(&self) -> DateTime<Utc> {
                    self.date_time_occurred
                }
            }
        )+
    };
}

domain_event!(ExampleCreated, ExampleDeleted, ExampleTypeChanged, ExampleMetadataUpdated);
