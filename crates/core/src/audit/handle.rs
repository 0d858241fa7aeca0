use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::AuditEvent;
use crate::metrics::AUDIT_EVENTS_DROPPED;

/// An event stamped with the time it was emitted, not the time it was stored.
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEventEnvelope {
    fn now(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Sending side of the audit trail.
///
/// Cloned into the lifecycle engine and the thread synchronizer. The writer
/// stops once every clone is dropped.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Queue an event, waiting for room in the channel.
    pub async fn emit(&self, event: AuditEvent) {
        let event_type = event.event_type();
        if self.tx.send(AuditEventEnvelope::now(event)).await.is_err() {
            dropped(event_type, "channel_closed");
        }
    }

    /// Queue an event if there is room, without waiting.
    ///
    /// Lifecycle transitions hold per-user locks while emitting, so they use
    /// this. Returns false if the event was dropped.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        let event_type = event.event_type();
        match self.tx.try_send(AuditEventEnvelope::now(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped(event_type, "channel_full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                dropped(event_type, "channel_closed");
                false
            }
        }
    }
}

fn dropped(event_type: &str, reason: &str) {
    tracing::warn!("Dropped {} audit event: {}", event_type, reason);
    AUDIT_EVENTS_DROPPED.with_label_values(&[reason]).inc();
}
