//! Realtime notification fan-out to connected client sessions.
//!
//! Sessions are channel senders; whatever owns the receiving end (a websocket
//! task, a test) turns notifications into frames.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use conduit_events::{DomainEvent, LocalEmitter};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One message pushed to a client session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub topic: String,
    pub payload: Value,
}

/// What to do with one field of an event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMapping {
    Keep,
    Rename(String),
}

/// Projection of event payloads onto the fields clients should see.
///
/// Fields not listed are dropped; listed fields missing from the payload are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct EventMapper {
    fields: Vec<(String, FieldMapping)>,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldMapping::Keep));
        self
    }

    pub fn rename(mut self, field: impl Into<String>, to: impl Into<String>) -> Self {
        self.fields
            .push((field.into(), FieldMapping::Rename(to.into())));
        self
    }

    pub fn apply(&self, payload: &Value) -> Value {
        let mut mapped = Map::new();
        for (field, mapping) in &self.fields {
            let Some(value) = payload.get(field) else {
                continue;
            };
            let target = match mapping {
                FieldMapping::Keep => field.clone(),
                FieldMapping::Rename(to) => to.clone(),
            };
            mapped.insert(target, value.clone());
        }
        Value::Object(mapped)
    }
}

type Session = mpsc::UnboundedSender<Notification>;

/// Connected sessions and the users and applications bound to them
#[derive(Default)]
pub struct ClientMap {
    sessions: HashMap<String, Session>,
    applications: HashMap<String, String>,
    users: HashMap<String, Vec<String>>,
}

impl ClientMap {
    fn disconnect(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
        self.applications.retain(|_, id| id != session_id);
        for sessions in self.users.values_mut() {
            sessions.retain(|id| id != session_id);
        }
    }

    fn send(&self, session_id: &str, notification: Notification) -> bool {
        match self.sessions.get(session_id) {
            Some(session) => session.send(notification).is_ok(),
            None => false,
        }
    }
}

impl fmt::Display for ClientMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sessions: {}", self.sessions.len())?;
        let mut ids: Vec<&String> = self.sessions.keys().collect();
        ids.sort();
        for id in ids {
            writeln!(f, "  {}", id)?;
        }

        writeln!(f, "Applications: {}", self.applications.len())?;
        let mut apps: Vec<(&String, &String)> = self.applications.iter().collect();
        apps.sort();
        for (app, id) in apps {
            writeln!(f, "  {}: {}", app, id)?;
        }

        writeln!(f, "Users: {}", self.users.len())?;
        let mut users: Vec<(&String, &Vec<String>)> = self.users.iter().collect();
        users.sort();
        for (user, ids) in users {
            writeln!(f, "  {}: [{}]", user, ids.join(", "))?;
        }
        Ok(())
    }
}

/// Pushes notifications to connected client sessions
#[derive(Default)]
pub struct NotificationService {
    clients: RwLock<ClientMap>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return the stream of notifications for it
    pub fn connect(&self, session_id: impl Into<String>) -> mpsc::UnboundedReceiver<Notification> {
        let session_id = session_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(session = %session_id, "Client connected");
        self.clients.write().sessions.insert(session_id, tx);
        rx
    }

    /// Drop a session and every user or application binding to it
    pub fn disconnect(&self, session_id: &str) {
        self.clients.write().disconnect(session_id);
        debug!(session = %session_id, "Client disconnected");
    }

    /// Bind a session to an application id, replacing any previous one
    pub fn remember(&self, session_id: &str, app_id: impl Into<String>) {
        self.clients
            .write()
            .applications
            .insert(app_id.into(), session_id.to_string());
    }

    pub fn forget(&self, app_id: &str) {
        self.clients.write().applications.remove(app_id);
    }

    /// Add a session to a user's sessions
    pub fn login(&self, session_id: &str, user_id: impl Into<String>) {
        let mut clients = self.clients.write();
        let sessions = clients.users.entry(user_id.into()).or_default();
        sessions.retain(|id| id != session_id);
        sessions.push(session_id.to_string());
    }

    pub fn logout(&self, user_id: &str) {
        self.clients.write().users.remove(user_id);
    }

    pub fn session_count(&self) -> usize {
        self.clients.read().sessions.len()
    }

    /// Send to every connected session, returning how many accepted it
    pub fn notify(&self, topic: &str, payload: Value) -> usize {
        let clients = self.clients.read();
        let delivered = clients
            .sessions
            .values()
            .filter(|session| {
                session
                    .send(Notification {
                        topic: topic.to_string(),
                        payload: payload.clone(),
                    })
                    .is_ok()
            })
            .count();
        debug!(topic = %topic, delivered, "Domain event notification sent");
        delivered
    }

    /// Send a domain event to every session under its event name, optionally
    /// projected through `mapper`
    pub fn notify_event(&self, event: &dyn DomainEvent, mapper: Option<&EventMapper>) -> usize {
        let topic = event.event_name();
        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Event payload could not be serialized");
                return 0;
            }
        };
        let payload = match mapper {
            Some(mapper) => mapper.apply(&payload),
            None => payload,
        };
        self.notify(topic, payload)
    }

    /// Send to every session of `user_id`
    pub fn notify_user(&self, user_id: &str, topic: &str, payload: Value) -> usize {
        let clients = self.clients.read();
        let Some(sessions) = clients.users.get(user_id) else {
            return 0;
        };
        sessions
            .iter()
            .filter(|id| {
                clients.send(
                    id,
                    Notification {
                        topic: topic.to_string(),
                        payload: payload.clone(),
                    },
                )
            })
            .count()
    }

    /// Send to the session remembered for `app_id`
    pub fn notify_app(&self, app_id: &str, topic: &str, payload: Value) -> bool {
        let clients = self.clients.read();
        let Some(session_id) = clients.applications.get(app_id) else {
            warn!(app = %app_id, topic = %topic, "No session for application");
            return false;
        };
        clients.send(
            session_id,
            Notification {
                topic: topic.to_string(),
                payload,
            },
        )
    }

    /// Forward the emitter's observer stream into [`NotificationService::notify`]
    /// for every topic `filter` accepts
    pub fn spawn_forwarder<F>(self: &Arc<Self>, emitter: &LocalEmitter, filter: F) -> JoinHandle<()>
    where
        F: Fn(&str) -> bool + Send + 'static,
    {
        let mut notifications = emitter.notifications();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(notification) if filter(&notification.topic) => {
                        service.notify(&notification.topic, notification.payload);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notification forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            info!("Notification forwarder stopped");
        })
    }
}

impl fmt::Display for NotificationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clients.read())
    }
}
