//! In-memory example store that publishes aggregate events after each write

use std::collections::HashMap;
use std::sync::Arc;

use conduit_cqrs::Mediator;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::domain::Example;

/// Example repository backed by a map.
///
/// Stored copies carry no pending events. After every successful write the
/// caller's aggregate has its events published through the mediator; a
/// publish failure is logged and does not undo the write.
pub struct ExampleRepository {
    examples: RwLock<HashMap<String, Example>>,
    mediator: Arc<Mediator>,
}

impl ExampleRepository {
    pub fn new(mediator: Arc<Mediator>) -> Self {
        Self {
            examples: RwLock::new(HashMap::new()),
            mediator,
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<Example> {
        self.examples.read().get(id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Example> {
        self.examples
            .read()
            .values()
            .find(|example| example.name == name)
            .cloned()
    }

    /// Every example, sorted by name
    pub fn find_all(&self) -> Vec<Example> {
        self.search(None)
    }

    /// Examples whose name contains `fragment`, ignoring case
    pub fn search(&self, fragment: Option<&str>) -> Vec<Example> {
        let needle = fragment.map(str::to_lowercase);
        let mut found: Vec<Example> = self
            .examples
            .read()
            .values()
            .filter(|example| match &needle {
                Some(needle) => example.name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        found
    }

    pub fn len(&self) -> usize {
        self.examples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn insert(&self, example: &mut Example) {
        self.store(example);
        debug!(example_id = %example.id, "Example inserted");
        self.publish(example).await;
    }

    pub async fn update(&self, example: &mut Example) {
        self.store(example);
        debug!(example_id = %example.id, "Example updated");
        self.publish(example).await;
    }

    /// Remove `example`; returns false when it was not stored
    pub async fn delete(&self, example: &mut Example) -> bool {
        let removed = self.examples.write().remove(&example.id).is_some();
        if removed {
            debug!(example_id = %example.id, "Example deleted");
            self.publish(example).await;
        }
        removed
    }

    fn store(&self, example: &Example) {
        self.examples
            .write()
            .insert(example.id.clone(), example.snapshot());
    }

    async fn publish(&self, example: &mut Example) {
        if let Err(e) = self.mediator.publish_events(example).await {
            error!(example_id = %example.id, error = %e, "Failed to publish example events");
        }
    }
}
