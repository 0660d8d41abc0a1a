//! Integration tests for the example service over the in-process bus.

use std::time::Duration;

use conduit::prelude::*;
use conduit_service::{
    CreateExample, DeleteExample, ExampleService, GetAllExamples, GetExampleById, UpdateExample,
};
use serde_json::json;

async fn start() -> ExampleService {
    ExampleService::start(&BusConfig::default()).await.unwrap()
}

#[tokio::test]
async fn test_example_lifecycle() {
    let service = start().await;
    let mut client = service.notifications.connect("browser");

    let created = service
        .mediator
        .send_command::<CreateExample>(json!({
            "name": "Widget",
            "description": "A widget",
            "version": 1,
            "type": "Other"
        }))
        .await
        .unwrap();
    assert_eq!(created.example_type.name(), "Other");

    service
        .mediator
        .send_command::<UpdateExample>(json!({ "id": created.id, "type": 0 }))
        .await
        .unwrap();

    assert!(
        service
            .mediator
            .send_command::<DeleteExample>(json!({ "id": created.id }))
            .await
            .unwrap()
    );

    let mut topics = Vec::new();
    while topics.len() < 3 {
        let notification = tokio::time::timeout(Duration::from_secs(1), client.recv())
            .await
            .unwrap()
            .unwrap();
        topics.push(notification.topic);
    }
    // ExampleTypeChanged has no event handler and arrives through the forwarder,
    // so it may overtake or trail the others.
    topics.sort();
    assert_eq!(topics, vec!["ExampleCreated", "ExampleDeleted", "ExampleTypeChanged"]);
    assert!(client.try_recv().is_err());

    let err = service
        .mediator
        .send_query::<GetExampleById>(json!({ "id": created.id }))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, ApiError::NOT_FOUND);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_search_filters_by_name() {
    let service = start().await;
    for name in ["Red widget", "Blue widget", "Gadget"] {
        service
            .mediator
            .send_command::<CreateExample>(json!({
                "name": name,
                "description": "thing",
                "version": 0
            }))
            .await
            .unwrap();
    }

    let widgets = service
        .mediator
        .send_query::<GetAllExamples>(json!({ "name": "WIDGET" }))
        .await
        .unwrap();
    assert_eq!(widgets.len(), 2);

    let all = service
        .mediator
        .send_query::<GetAllExamples>(json!({}))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_validation_error_shape() {
    let service = start().await;
    let err = service
        .mediator
        .send_command::<UpdateExample>(json!({ "id": "not-a-uuid" }))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_json(),
        json!({
            "statusCode": 400,
            "message": "Validation failed",
            "errors": { "id": ["id has an invalid format"] }
        })
    );
}
