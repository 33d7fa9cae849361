//! Post-mutation view invalidation.
//!
//! After a record is created, updated or deleted the listing page and that
//! record's detail page are stale. The mutation layer announces this through an
//! [`InvalidationSink`] and moves on: delivery is best effort, and a sink error
//! is logged, never returned to the writer.

use crate::errors::AppResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum ViewKey {
    Collection,
    Record(String),
}

impl ViewKey {
    pub fn path(&self) -> String {
        match self {
            Self::Collection => "/".to_string(),
            Self::Record(id) => format!("/view/{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "record.created",
            Self::Updated => "record.updated",
            Self::Deleted => "record.deleted",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationEvent {
    pub event_id: String,
    pub kind: MutationKind,
    pub record_id: String,
    pub views: Vec<ViewKey>,
    pub timestamp: DateTime<Utc>,
}

impl InvalidationEvent {
    pub fn for_mutation(kind: MutationKind, record_id: &str) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            record_id: record_id.to_string(),
            views: vec![ViewKey::Collection, ViewKey::Record(record_id.to_string())],
            timestamp: Utc::now(),
        }
    }
}

pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self, event: &InvalidationEvent) -> AppResult<()>;
}

/// Sink for callers that render nothing and need no notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidation;

impl InvalidationSink for NoopInvalidation {
    fn invalidate(&self, _event: &InvalidationEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Fan-out of invalidation events to any number of view subscribers.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    sender: broadcast::Sender<InvalidationEvent>,
}

impl InvalidationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.sender.subscribe()
    }
}

impl InvalidationSink for InvalidationBus {
    fn invalidate(&self, event: &InvalidationEvent) -> AppResult<()> {
        match self.sender.send(event.clone()) {
            Ok(receivers) => {
                tracing::debug!(event = event.kind.as_str(), record_id = %event.record_id, receivers, "views invalidated");
            }
            Err(_) => {
                tracing::debug!(event = event.kind.as_str(), record_id = %event.record_id, "no view subscribers to invalidate");
            }
        }
        Ok(())
    }
}

/// Fire-and-forget notification used by the mutation layer.
pub(crate) fn signal(sink: &dyn InvalidationSink, kind: MutationKind, record_id: &str) {
    let event = InvalidationEvent::for_mutation(kind, record_id);
    if let Err(error) = sink.invalidate(&event) {
        tracing::warn!(event = kind.as_str(), record_id = %record_id, error = %error, "view invalidation failed");
    }
}

/// Sink that always fails; exercises the swallow-and-log path.
#[cfg(test)]
pub(crate) struct FailingInvalidation;

#[cfg(test)]
impl InvalidationSink for FailingInvalidation {
    fn invalidate(&self, _event: &InvalidationEvent) -> AppResult<()> {
        Err(crate::errors::AppError::Internal("view cache unavailable".to_string()))
    }
}
